//! Engine tuning parameters.

use chrono::Duration;
use serde::Deserialize;

/// Tunables for reconciliation, suspension and cleanup.
///
/// The timing constants are independent of one another and are kept as
/// separate knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct SuspensionConfig {
    /// URL prefix of the internal placeholder page.
    #[serde(default = "default_placeholder_base")]
    pub placeholder_base: String,
    /// Page opened to move focus away from a group being suspended.
    #[serde(default = "default_blank_page_url")]
    pub blank_page_url: String,
    /// Fraction of placeholder URLs that must also be open as ordinary pages
    /// for an activation to count as a bulk session restore (inclusive).
    #[serde(default = "default_restore_threshold")]
    pub restore_threshold: f64,
    /// Delay between process start and the first reconciliation pass.
    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,
    /// Minimum time between two completed reconciliation passes.
    #[serde(default = "default_reconcile_cooldown_secs")]
    pub reconcile_cooldown_secs: u64,
    /// How long a reconciliation lease is honoured before it is considered crashed.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
    /// Age after which an orphaned active record is demoted to the lost list.
    #[serde(default = "default_orphan_grace_secs")]
    pub orphan_grace_secs: u64,
    /// Age after which a lost entry is discarded.
    #[serde(default = "default_lost_retention_secs")]
    pub lost_retention_secs: u64,
    /// Period of the metadata janitor.
    #[serde(default = "default_janitor_interval_secs")]
    pub janitor_interval_secs: u64,
}

fn default_placeholder_base() -> String {
    "chrome-extension://dormant/suspended.html".to_string()
}

fn default_blank_page_url() -> String {
    "about:blank".to_string()
}

fn default_restore_threshold() -> f64 {
    0.3
}

fn default_startup_delay_secs() -> u64 {
    3
}

fn default_reconcile_cooldown_secs() -> u64 {
    30
}

fn default_lease_ttl_secs() -> u64 {
    120
}

fn default_orphan_grace_secs() -> u64 {
    5 * 60
}

fn default_lost_retention_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_janitor_interval_secs() -> u64 {
    3 * 60
}

impl Default for SuspensionConfig {
    fn default() -> Self {
        Self {
            placeholder_base: default_placeholder_base(),
            blank_page_url: default_blank_page_url(),
            restore_threshold: default_restore_threshold(),
            startup_delay_secs: default_startup_delay_secs(),
            reconcile_cooldown_secs: default_reconcile_cooldown_secs(),
            lease_ttl_secs: default_lease_ttl_secs(),
            orphan_grace_secs: default_orphan_grace_secs(),
            lost_retention_secs: default_lost_retention_secs(),
            janitor_interval_secs: default_janitor_interval_secs(),
        }
    }
}

impl SuspensionConfig {
    pub fn startup_delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.startup_delay_secs)
    }

    pub fn janitor_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.janitor_interval_secs.max(1))
    }

    pub fn reconcile_cooldown(&self) -> Duration {
        Duration::seconds(self.reconcile_cooldown_secs as i64)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::seconds(self.lease_ttl_secs as i64)
    }

    pub fn orphan_grace(&self) -> Duration {
        Duration::seconds(self.orphan_grace_secs as i64)
    }

    pub fn lost_retention(&self) -> Duration {
        Duration::seconds(self.lost_retention_secs as i64)
    }
}
