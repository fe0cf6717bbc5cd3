// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ingest pipeline: normalized adapter messages into the content store
//! and search index.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chorus_core::{
    AccountId, Author, ChorusError, Direction, MessageId, MessageSource, NormalizedMessage,
    Platform, Tags, Visibility,
};
use chorus_search::SearchIndex;
use chorus_store::{AccountSpec, ContentStore, NewMessage, ThreadSpec};
use tracing::{debug, info, warn};

/// What happened to one ingested message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Newly stored (and indexed, unless indexing failed).
    Stored(MessageId),
    /// Already present; nothing changed.
    Duplicate(MessageId),
}

impl IngestOutcome {
    pub fn id(&self) -> &MessageId {
        match self {
            Self::Stored(id) | Self::Duplicate(id) => id,
        }
    }
}

/// Resolves accounts and threads, stamps direction and stores messages.
///
/// Storage writes are retried on transient errors with exponential delay.
/// Search indexing happens after a successful insert and never fails the
/// ingest.
pub struct Ingestor {
    store: Arc<ContentStore>,
    search: Arc<SearchIndex>,
    attempts: u32,
    base_delay: Duration,
    self_accounts: RwLock<HashMap<Platform, AccountId>>,
}

impl Ingestor {
    pub fn new(
        store: Arc<ContentStore>,
        search: Arc<SearchIndex>,
        attempts: u32,
        base_delay: Duration,
    ) -> Self {
        Self {
            store,
            search,
            attempts: attempts.max(1),
            base_delay,
            self_accounts: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<ContentStore> {
        &self.store
    }

    /// Determines the self account of `platform`.
    ///
    /// A configured handle creates (or finds) the self account. Without a
    /// handle, or when the store already names a different self account,
    /// the stored one wins. Returns `None` when neither is known, in which
    /// case every message is incoming.
    pub async fn resolve_self(
        &self,
        platform: Platform,
        handle: Option<&str>,
    ) -> Result<Option<AccountId>, ChorusError> {
        let resolved = match handle {
            Some(handle) => {
                let spec = AccountSpec::new(platform, handle, handle).self_account();
                match self.store.get_or_create_account(spec).await {
                    Ok(account) => Some(account.id),
                    Err(ChorusError::Validation(reason)) => {
                        warn!(platform = %platform, handle, reason = %reason, "configured self handle rejected");
                        self.store.self_account(platform).map(|a| a.id)
                    }
                    Err(e) => return Err(e),
                }
            }
            None => self.store.self_account(platform).map(|a| a.id),
        };

        let mut accounts = self.write_selves();
        match &resolved {
            Some(id) => {
                debug!(platform = %platform, account_id = %id, "self account resolved");
                accounts.insert(platform, id.clone());
            }
            None => {
                info!(platform = %platform, "no self account known, messages will be treated as incoming");
                accounts.remove(&platform);
            }
        }
        Ok(resolved)
    }

    pub fn self_account(&self, platform: Platform) -> Option<AccountId> {
        self.read_selves().get(&platform).cloned()
    }

    /// Stores one message, retrying transient failures.
    pub async fn ingest(
        &self,
        platform: Platform,
        message: &NormalizedMessage,
    ) -> Result<IngestOutcome, ChorusError> {
        let mut attempt = 0;
        loop {
            match self.try_ingest(platform, message).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transient() && attempt + 1 < self.attempts => {
                    let delay = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    warn!(
                        platform = %platform,
                        platform_id = %message.platform_id,
                        attempt,
                        error = %e,
                        "ingest failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_ingest(
        &self,
        platform: Platform,
        message: &NormalizedMessage,
    ) -> Result<IngestOutcome, ChorusError> {
        let author = self
            .store
            .get_or_create_account(AccountSpec::new(
                platform,
                &message.author.handle,
                message.author.name.clone().unwrap_or_default(),
            ))
            .await?;
        let self_id = self.self_account(platform);

        let mut participants = vec![author.id.clone()];
        for participant in &message.thread.participants {
            let account = self
                .store
                .get_or_create_account(AccountSpec::new(
                    platform,
                    &participant.handle,
                    participant.name.clone().unwrap_or_default(),
                ))
                .await?;
            if !participants.contains(&account.id) {
                participants.push(account.id);
            }
        }
        if let Some(id) = &self_id
            && !participants.contains(id)
        {
            participants.push(id.clone());
        }

        let thread = self
            .store
            .get_or_create_thread(ThreadSpec {
                platform,
                conversation_id: message.thread.conversation_id.clone(),
                title: message.thread.title.clone(),
                kind: message.thread.kind,
                participants,
            })
            .await?;

        let reply_to = message
            .reply_to
            .as_deref()
            .and_then(|native| self.store.find_by_source(platform, native));

        let direction = if self_id.as_ref() == Some(&author.id) {
            Direction::Outgoing
        } else {
            Direction::Incoming
        };
        let mut tags = message.tags.clone();
        tags.insert(Tags::DIRECTION, direction.to_string());

        let write = self
            .store
            .create_message(NewMessage {
                kind: message.kind,
                content: message.content.clone(),
                account_id: author.id.clone(),
                author: Author {
                    name: message
                        .author
                        .name
                        .clone()
                        .unwrap_or_else(|| author.display_name.clone()),
                    handle: message.author.handle.clone(),
                },
                created_at: message.created_at,
                thread_id: thread.id,
                reply_to,
                source: MessageSource {
                    platform,
                    platform_id: message.platform_id.clone(),
                },
                tags,
                visibility: Visibility::Private,
            })
            .await?;

        let id = write.message.id.clone();
        // Duplicates are indexed too; rows already present are ignored.
        match self.search.index(&write.message).await {
            Ok(true) if !write.inserted => {
                info!(platform = %platform, message_id = %id, "indexed previously stored message");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(platform = %platform, message_id = %id, error = %e, "search indexing failed; rebuild the index to recover");
            }
        }
        if !write.inserted {
            debug!(platform = %platform, message_id = %id, "duplicate message skipped");
            return Ok(IngestOutcome::Duplicate(id));
        }
        Ok(IngestOutcome::Stored(id))
    }

    fn read_selves(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Platform, AccountId>> {
        self.self_accounts.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_selves(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Platform, AccountId>> {
        self.self_accounts.write().unwrap_or_else(|e| e.into_inner())
    }
}
