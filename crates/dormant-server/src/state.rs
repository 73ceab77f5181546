//! Shared application state.

use crate::config::Config;
use dormant_core::{
    Activation, MemoryHost, ReconcileLease, SeedPage, SqliteKvStore, LOCAL_SCOPE, SYNC_SCOPE,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub host: Arc<MemoryHost>,
    pub activation: Activation<MemoryHost>,
    pub config: Config,
}

impl AppState {
    /// State whose in-process host starts with `seed` open.
    pub fn with_seed(config: Config, seed: &[SeedPage]) -> dormant_core::Result<Self> {
        let local = Arc::new(SqliteKvStore::open(&config.db_path, LOCAL_SCOPE)?);
        let sync = Arc::new(SqliteKvStore::open(&config.db_path, SYNC_SCOPE)?.with_quota(config.sync_quota_bytes));
        let suspension = config.suspension.clone();
        let lease = Arc::new(ReconcileLease::new(suspension.lease_ttl(), suspension.reconcile_cooldown()));
        let host = Arc::new(MemoryHost::from_seed(seed));
        let activation = Activation::new(host.clone(), local, sync, suspension, lease);

        Ok(Self {
            host,
            activation,
            config,
        })
    }
}
