//! Quota pacing for Gmail API calls
//!
//! Gmail charges per-user "quota units", refilled at 250 units per second.
//! messages.list, messages.get and messages.trash all cost 5 units, so a
//! chunk of 100 metadata fetches would burst past the limit without pacing.
//!
//! This is a token bucket: calls wait until enough units have accumulated.
//! It never retries anything.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Gmail API quota costs of the calls this tool makes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaCost {
    /// messages.list
    List,
    /// messages.get
    Get,
    /// messages.trash
    Trash,
    /// users.getProfile
    Profile,
}

impl QuotaCost {
    pub fn units(&self) -> u32 {
        match self {
            QuotaCost::List => 5,
            QuotaCost::Get => 5,
            QuotaCost::Trash => 5,
            QuotaCost::Profile => 1,
        }
    }
}

/// Token bucket shared by every call of one client
#[derive(Debug, Clone)]
pub struct QuotaRateLimiter {
    inner: Arc<Mutex<RateLimiterState>>,
}

#[derive(Debug)]
struct RateLimiterState {
    available_units: f64,
    max_units: f64,
    refill_rate: f64,
    last_refill: Instant,
    total_consumed: u64,
    total_operations: u64,
}

impl RateLimiterState {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.available_units = (self.available_units + elapsed * self.refill_rate).min(self.max_units);
        self.last_refill = now;
    }
}

impl QuotaRateLimiter {
    /// Gmail's per-user default: 250 units/sec, one second of burst
    pub fn new() -> Self {
        Self::with_config(250.0, 250.0)
    }

    pub fn with_config(refill_rate: f64, max_units: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiterState {
                available_units: max_units,
                max_units,
                refill_rate,
                last_refill: Instant::now(),
                total_consumed: 0,
                total_operations: 0,
            })),
        }
    }

    /// Wait until `cost` units are available, then consume them
    pub async fn acquire(&self, cost: QuotaCost) {
        let units_needed = cost.units() as f64;

        loop {
            let wait_time = {
                let mut state = self.inner.lock().await;
                state.refill();

                trace!(
                    "Quota state: {:.1}/{:.1} units available, requesting {:.0}",
                    state.available_units,
                    state.max_units,
                    units_needed
                );

                if state.available_units >= units_needed {
                    state.available_units -= units_needed;
                    state.total_consumed += units_needed as u64;
                    state.total_operations += 1;
                    return;
                }

                let units_deficit = units_needed - state.available_units;
                Duration::from_secs_f64(units_deficit / state.refill_rate)
            };

            // Sleep outside the lock so other callers can refill-check
            debug!(
                "Quota exhausted, waiting {:.2}s for {} units",
                wait_time.as_secs_f64(),
                units_needed
            );
            tokio::time::sleep(wait_time).await;
        }
    }

    /// Units and calls consumed so far, across every clone
    pub async fn stats(&self) -> QuotaStats {
        let state = self.inner.lock().await;
        QuotaStats {
            total_consumed: state.total_consumed,
            total_operations: state.total_operations,
        }
    }
}

impl Default for QuotaRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct QuotaStats {
    pub total_consumed: u64,
    pub total_operations: u64,
}
