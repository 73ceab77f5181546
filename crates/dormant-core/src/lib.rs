//! Suspended-page state reconciliation for Dormant.

mod config;
mod context;
mod controller;
mod dispatch;
mod error;
mod host;
mod janitor;
mod kv;
mod lease;
mod live_index;
mod memory_host;
pub mod placeholder;
mod reconciler;
mod state;
mod store;
pub mod whitelist;

pub use config::SuspensionConfig;
pub use context::{Activation, SETTINGS_KEY};
pub use controller::{BatchReport, RestoreOutcome, SkipReason, SuspendOutcome, SuspensionController};
pub use dispatch::{handle_message, parse_request};
pub use error::DormantError;
pub use host::HostPlatform;
pub use janitor::{JanitorReport, MetadataJanitor};
pub use kv::{
    KeyValueStore, MemoryKvStore, SqliteKvStore, LOCAL_SCOPE, SYNC_QUOTA_BYTES_PER_ITEM, SYNC_SCOPE,
};
pub use lease::{LeaseDenied, LeaseGuard, ReconcileLease};
pub use live_index::{LiveTabIndex, PlaceholderPage};
pub use memory_host::{MemoryHost, Notification, SeedPage, DEFAULT_WINDOW};
pub use placeholder::PlaceholderParams;
pub use reconciler::{ReconcileOutcome, ReconcileReport, Reconciler, Recreation, SessionRestoreCheck};
pub use state::SuspensionState;
pub use store::{MetadataStore, SUSPENDED_STATE_KEY};

/// Result type for Dormant operations.
pub type Result<T> = std::result::Result<T, DormantError>;
