// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds the configured adapters.

use std::sync::Arc;
use std::time::Duration;

use chorus_config::ChorusConfig;
use chorus_config::model::expand_home;
use chorus_core::{AdapterMap, Platform, PlatformAdapter};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::adapter::{PlatformProfile, SyncAdapter};
use crate::poller::{Poller, PollerOptions};
use crate::profiles::{
    DiscordProfile, EmailProfile, SignalProfile, TelegramProfile, WhatsappProfile,
};
use crate::spool::SpoolSource;

/// Upper bound on the delay between polls while a spool keeps failing.
const MAX_POLL_BACKOFF: Duration = Duration::from_secs(600);

/// One spool-backed adapter per enabled platform. Disabled platforms are
/// absent from the map.
pub fn build_adapters(config: &ChorusConfig) -> AdapterMap {
    let mut adapters = AdapterMap::new();
    for platform in Platform::ALL {
        if !config.is_enabled(platform) {
            debug!(platform = %platform, "platform disabled in config");
            continue;
        }
        let adapter = match platform {
            Platform::Signal => spool_adapter(
                config,
                platform,
                SignalProfile::new(
                    config.signal.data_dir(),
                    config.self_handle(platform).map(str::to_string),
                ),
                Vec::new(),
            ),
            Platform::Telegram => spool_adapter(
                config,
                platform,
                TelegramProfile::new(
                    config.telegram.session_file.as_deref().map(expand_home),
                    config.telegram.api_id.is_some() && config.telegram.api_hash.is_some(),
                ),
                Vec::new(),
            ),
            Platform::Whatsapp => spool_adapter(
                config,
                platform,
                WhatsappProfile::new(
                    config.whatsapp.session_dir.as_deref().map(expand_home),
                    config.self_handle(platform).map(str::to_string),
                ),
                Vec::new(),
            ),
            Platform::Discord => spool_adapter(
                config,
                platform,
                DiscordProfile::new(
                    config.discord.token.clone(),
                    config.discord.token_file.as_deref().map(expand_home),
                ),
                Vec::new(),
            ),
            Platform::Email => spool_adapter(
                config,
                platform,
                EmailProfile::new(
                    config.email.username.clone(),
                    config.email.password.is_some(),
                    config.email.password_file.as_deref().map(expand_home),
                ),
                config.email.mailboxes.clone(),
            ),
        };
        adapters.insert(platform, adapter);
    }
    adapters
}

fn spool_adapter<P>(
    config: &ChorusConfig,
    platform: Platform,
    profile: P,
    scopes: Vec<String>,
) -> Arc<dyn PlatformAdapter>
where
    P: PlatformProfile,
    P::Record: DeserializeOwned,
{
    let source = SpoolSource::<P::Record>::new(config.spool_dir(platform)).with_scopes(scopes);
    let poller = Poller::new(
        source,
        PollerOptions {
            interval: config.poll_interval(platform),
            max_backoff: MAX_POLL_BACKOFF,
        },
    );
    Arc::new(SyncAdapter::new(profile, poller))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_platforms_are_skipped() {
        let config = chorus_config::load_config_from_str(
            "[telegram]\nenabled = false\n[discord]\nenabled = false\n",
        )
        .unwrap();
        let adapters = build_adapters(&config);
        assert!(!adapters.contains_key(&Platform::Telegram));
        assert!(!adapters.contains_key(&Platform::Discord));
        assert_eq!(adapters.len(), 3);
        for (platform, adapter) in &adapters {
            assert_eq!(adapter.platform(), *platform);
        }
    }

    #[tokio::test]
    async fn credentials_come_from_config() {
        let config = chorus_config::load_config_from_str(
            "[discord]\ntoken = \"secret\"\n[email]\nusername = \"me@example.com\"\npassword = \"pw\"\n",
        )
        .unwrap();
        let adapters = build_adapters(&config);
        assert!(adapters[&Platform::Discord].is_authenticated().await);
        assert!(adapters[&Platform::Email].is_authenticated().await);
        assert!(!adapters[&Platform::Whatsapp].is_authenticated().await);
    }
}
