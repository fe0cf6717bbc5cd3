// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end daemon testing.
//!
//! `TestHarness` assembles a complete platform manager over mock adapters,
//! a temp content store, search index and state database.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chorus_core::{AdapterMap, ChorusError, Platform, PlatformAdapter};
use chorus_daemon::{ManagerOptions, PlatformManager, RestartPolicy};
use chorus_health::HealthPolicy;
use chorus_search::SearchIndex;
use chorus_state::{StateManager, StateOptions};
use chorus_store::ContentStore;

use crate::mock_adapter::MockAdapter;

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const WAIT_STEP: Duration = Duration::from_millis(10);

/// Builder for test environments.
pub struct TestHarnessBuilder {
    adapters: Vec<Arc<MockAdapter>>,
    options: ManagerOptions,
    restart: Option<Arc<dyn RestartPolicy>>,
    dir: Option<PathBuf>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            adapters: Vec::new(),
            options: ManagerOptions {
                shutdown_timeout: Duration::from_secs(5),
                retry_base_delay: Duration::from_millis(1),
                ..ManagerOptions::default()
            },
            restart: None,
            dir: None,
        }
    }

    /// Registers an authenticated mock adapter for `platform`.
    pub fn with_platform(self, platform: Platform) -> Self {
        self.with_adapter(Arc::new(MockAdapter::new(platform)))
    }

    pub fn with_adapter(mut self, adapter: Arc<MockAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn with_self_handle(mut self, platform: Platform, handle: &str) -> Self {
        self.options.self_handles.insert(platform, handle.to_string());
        self
    }

    pub fn with_health_policy(mut self, policy: HealthPolicy) -> Self {
        self.options.health = policy;
        self
    }

    pub fn with_options(mut self, options: ManagerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_restart_policy(mut self, policy: Arc<dyn RestartPolicy>) -> Self {
        self.restart = Some(policy);
        self
    }

    /// Reuses an existing data directory instead of a fresh temp dir.
    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    pub async fn build(self) -> Result<TestHarness, ChorusError> {
        let (temp_dir, root) = match self.dir {
            Some(dir) => (None, dir),
            None => {
                let temp = tempfile::TempDir::new()?;
                let root = temp.path().to_path_buf();
                (Some(temp), root)
            }
        };

        let store = Arc::new(ContentStore::open(root.join("store")).await?);
        let search = Arc::new(SearchIndex::open(&root.join("search.db")).await?);
        let state =
            Arc::new(StateManager::open(&root.join("state.db"), StateOptions::default()).await?);

        let mut adapters = AdapterMap::new();
        let mut mocks = BTreeMap::new();
        for adapter in self.adapters {
            let platform = adapter.platform();
            adapters.insert(platform, adapter.clone() as Arc<dyn PlatformAdapter>);
            mocks.insert(platform, adapter);
        }

        let mut manager = PlatformManager::new(adapters, store, search, state, self.options);
        if let Some(policy) = self.restart {
            manager = manager.with_restart_policy(policy);
        }

        Ok(TestHarness {
            manager,
            adapters: mocks,
            root,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete daemon over temporary storage.
pub struct TestHarness {
    pub manager: PlatformManager,
    pub adapters: BTreeMap<Platform, Arc<MockAdapter>>,
    root: PathBuf,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The mock registered for `platform`.
    ///
    /// # Panics
    ///
    /// If no adapter was registered for `platform`.
    pub fn adapter(&self, platform: Platform) -> &Arc<MockAdapter> {
        match self.adapters.get(&platform) {
            Some(adapter) => adapter,
            None => panic!("no mock adapter registered for {platform}"),
        }
    }

    /// Data directory holding the store and both databases.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Waits until the store holds `count` messages.
    ///
    /// # Panics
    ///
    /// After five seconds without reaching `count`.
    pub async fn wait_for_messages(&self, count: u64) {
        let store = self.manager.store().clone();
        wait_until("stored message count", || {
            let store = store.clone();
            async move { store.stats().messages >= count }
        })
        .await;
    }
}

/// Polls `check` until it returns `true`.
///
/// # Panics
///
/// After five seconds.
pub async fn wait_until<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return;
        }
        tokio::time::sleep(WAIT_STEP).await;
    }
    panic!("timed out waiting for {what}");
}
