//! Per-activation context handed to every component.
//!
//! The hosting process may be torn down between wake-ups, so nothing here
//! caches suspension metadata: components read through [`MetadataStore`]
//! and observe the host afresh on every call.
//!
//! Within one process, operations that load the envelope, await the host and
//! write the envelope back hold [`Activation::metadata_lock`] for the whole
//! sequence so concurrent handlers and timers cannot overwrite each other.

use crate::config::SuspensionConfig;
use crate::host::HostPlatform;
use crate::kv::{KeyValueStore, MemoryKvStore};
use crate::lease::ReconcileLease;
use crate::placeholder::{self, PlaceholderParams};
use crate::store::MetadataStore;
use crate::Result;
use dormant_types::Settings;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Sync-scope key holding [`Settings`].
pub const SETTINGS_KEY: &str = "settings";

/// Everything one activation needs: host, persistence scopes, tunables and
/// the reconciliation lease.
pub struct Activation<H> {
    host: Arc<H>,
    local: Arc<dyn KeyValueStore>,
    sync: Arc<dyn KeyValueStore>,
    config: SuspensionConfig,
    lease: Arc<ReconcileLease>,
    metadata: Arc<Mutex<()>>,
}

impl<H> Clone for Activation<H> {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            local: self.local.clone(),
            sync: self.sync.clone(),
            config: self.config.clone(),
            lease: self.lease.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

impl<H: HostPlatform> Activation<H> {
    pub fn new(
        host: Arc<H>,
        local: Arc<dyn KeyValueStore>,
        sync: Arc<dyn KeyValueStore>,
        config: SuspensionConfig,
        lease: Arc<ReconcileLease>,
    ) -> Self {
        Self {
            host,
            local,
            sync,
            config,
            lease,
            metadata: Arc::new(Mutex::new(())),
        }
    }

    /// An activation backed by volatile stores and a fresh lease.
    pub fn with_memory_stores(host: Arc<H>, config: SuspensionConfig) -> Self {
        let lease = Arc::new(ReconcileLease::new(config.lease_ttl(), config.reconcile_cooldown()));
        Self::new(
            host,
            Arc::new(MemoryKvStore::new()),
            Arc::new(MemoryKvStore::new()),
            config,
            lease,
        )
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &SuspensionConfig {
        &self.config
    }

    pub fn lease(&self) -> &ReconcileLease {
        &self.lease
    }

    /// Exclusive access to the persisted metadata for a read-modify-write.
    ///
    /// Not reentrant: callers holding the guard must not call another
    /// operation that takes it.
    pub async fn metadata_lock(&self) -> MutexGuard<'_, ()> {
        self.metadata.lock().await
    }

    pub fn store(&self) -> MetadataStore {
        MetadataStore::new(self.local.clone())
    }

    /// Current user settings; missing or unreadable settings fall back to defaults.
    pub fn settings(&self) -> Result<Settings> {
        match self.sync.get(SETTINGS_KEY)? {
            Some(value) => match serde_json::from_value(value) {
                Ok(settings) => Ok(settings),
                Err(e) => {
                    warn!(target: "dormant::store", "Unreadable settings, using defaults: {}", e);
                    Ok(Settings::default())
                }
            },
            None => Ok(Settings::default()),
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.sync.set(SETTINGS_KEY, &serde_json::to_value(settings)?)
    }

    pub fn is_placeholder(&self, url: &str) -> bool {
        placeholder::is_placeholder(&self.config.placeholder_base, url)
    }

    pub fn placeholder_url(&self, original_url: &str, title: &str, favicon: &str) -> String {
        placeholder::build(&self.config.placeholder_base, original_url, title, favicon)
    }

    pub fn placeholder_params(&self, url: &str) -> Option<PlaceholderParams> {
        placeholder::parse(&self.config.placeholder_base, url)
    }
}
