//! Core rate limiter implementation.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::decision::Decision;
use super::key::CounterKey;

/// Daily limit used when none is configured.
pub const DEFAULT_DAILY_LIMIT: u64 = 50;

/// The core rate limiter that manages per-client daily counters.
///
/// Each counter is keyed by client and calendar day, so a new day starts
/// from zero without any explicit reset. The store is sharded; the
/// read-decide-write for one key runs under that key's shard lock, which
/// serializes concurrent checks for the same client.
pub struct RateLimiter {
    /// Admitted request counts indexed by (client, day)
    counters: DashMap<CounterKey, u64>,
    /// Maximum admitted requests per client per day
    limit: u64,
    /// Source of the current day
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a new rate limiter using the local system clock.
    pub fn new(limit: u64) -> Self {
        Self::with_clock(limit, Arc::new(SystemClock::default()))
    }

    /// Create a new rate limiter with an explicit clock.
    pub fn with_clock(limit: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: DashMap::new(),
            limit,
            clock,
        }
    }

    /// The daily limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Check today's quota for `client` and count the request if admitted.
    ///
    /// Denied requests leave the stored count unchanged. Any string is a
    /// valid identity, including the empty string.
    pub fn check_and_increment(&self, client: &str) -> Decision {
        let key = CounterKey::new(client, self.clock.today());

        trace!(key = %key, "Checking rate limit");

        match self.counters.entry(key) {
            Entry::Occupied(mut entry) => {
                if *entry.get() >= self.limit {
                    debug!(
                        key = %entry.key(),
                        count = *entry.get(),
                        limit = self.limit,
                        "Rate limit exceeded"
                    );
                    return Decision::deny(self.limit);
                }
                let count = entry.get_mut();
                *count += 1;
                Decision::admit(self.limit, *count)
            }
            Entry::Vacant(entry) => {
                if self.limit == 0 {
                    return Decision::deny(self.limit);
                }
                debug!(key = %entry.key(), limit = self.limit, "Creating new daily counter");
                entry.insert(1);
                Decision::admit(self.limit, 1)
            }
        }
    }

    /// Get today's admitted count for a client.
    ///
    /// Returns `None` if the client has made no admitted request today.
    pub fn counter_value(&self, client: &str) -> Option<u64> {
        let key = CounterKey::new(client, self.clock.today());
        self.counters.get(&key).map(|count| *count)
    }

    /// Remove counters for days before today.
    ///
    /// Returns the number of counters removed.
    pub fn sweep_expired(&self) -> usize {
        let today = self.clock.today();
        let mut removed = 0;
        self.counters.retain(|key, _| {
            let keep = key.day() >= today;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Clear all counters.
    pub fn clear(&self) {
        self.counters.clear();
    }

    /// Get the number of stored counters across all days.
    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_DAILY_LIMIT)
    }
}
