//! Single-flight lease for reconciliation passes.
//!
//! At most one pass holds the lease at a time. A completed pass starts a
//! cooldown during which new passes are refused outright. A lease that is
//! never released expires after its TTL, so a pass that died midway cannot
//! wedge reconciliation forever.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Mutex;
use tracing::warn;

/// Why a lease could not be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LeaseDenied {
    /// Another pass holds an unexpired lease.
    InFlight,
    /// The previous pass completed less than a cooldown ago.
    CoolingDown,
}

#[derive(Debug, Default)]
struct LeaseState {
    held_until: Option<DateTime<Utc>>,
    generation: u64,
    last_completed: Option<DateTime<Utc>>,
}

/// Single-flight lease with expiry and cooldown.
#[derive(Debug)]
pub struct ReconcileLease {
    state: Mutex<LeaseState>,
    ttl: Duration,
    cooldown: Duration,
}

impl ReconcileLease {
    pub fn new(ttl: Duration, cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(LeaseState::default()),
            ttl,
            cooldown,
        }
    }

    /// Try to take the lease at `now`.
    pub fn try_acquire(&self, now: DateTime<Utc>) -> Result<LeaseGuard<'_>, LeaseDenied> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(until) = state.held_until {
            if now < until {
                return Err(LeaseDenied::InFlight);
            }
            warn!(target: "dormant::reconcile", "Reconciliation lease expired at {}; taking over", until);
        }

        if let Some(done) = state.last_completed {
            if now < done + self.cooldown {
                return Err(LeaseDenied::CoolingDown);
            }
        }

        state.generation += 1;
        state.held_until = Some(now + self.ttl);
        Ok(LeaseGuard {
            lease: self,
            generation: state.generation,
            completed: false,
        })
    }

    /// Forget the cooldown so the next pass may run immediately.
    pub fn reset_cooldown(&self) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).last_completed = None;
    }

    fn release(&self, generation: u64, completed_at: Option<DateTime<Utc>>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        // A guard whose lease expired and was taken over must not release the newer holder.
        if state.generation != generation {
            return;
        }
        state.held_until = None;
        if completed_at.is_some() {
            state.last_completed = completed_at;
        }
    }
}

/// Proof of holding the lease. Dropping it without [`LeaseGuard::complete`]
/// releases the lease without starting a cooldown.
#[derive(Debug)]
pub struct LeaseGuard<'a> {
    lease: &'a ReconcileLease,
    generation: u64,
    completed: bool,
}

impl LeaseGuard<'_> {
    /// Release the lease and start the cooldown at `now`.
    pub fn complete(mut self, now: DateTime<Utc>) {
        self.completed = true;
        self.lease.release(self.generation, Some(now));
    }
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.lease.release(self.generation, None);
        }
    }
}
