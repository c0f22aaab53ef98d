//! Background eviction of counters from past days.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::limiter::RateLimiter;
use crate::error::{DaygateError, Result};

/// Spawn a task that calls [`RateLimiter::sweep_expired`] every `interval`.
///
/// The task runs until the returned handle is aborted. A zero interval is
/// rejected with [`DaygateError::Config`].
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, interval: Duration) -> Result<JoinHandle<()>> {
    if interval.is_zero() {
        return Err(DaygateError::Config(
            "sweep interval must be greater than zero".to_string(),
        ));
    }

    info!(interval_secs = interval.as_secs(), "Starting stale counter sweeper");

    Ok(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = limiter.sweep_expired();
            debug!(
                removed = removed,
                remaining = limiter.counter_count(),
                "Swept stale counters"
            );
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::ManualClock;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_sweeper_evicts_past_days() {
        let clock = Arc::new(ManualClock::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        let limiter = Arc::new(RateLimiter::with_clock(10, clock.clone()));
        limiter.check_and_increment("10.0.0.1");
        clock.advance_days(1);

        let handle = spawn_sweeper(limiter.clone(), Duration::from_millis(10)).unwrap();

        let mut evicted = false;
        for _ in 0..100 {
            if limiter.counter_count() == 0 {
                evicted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert!(evicted);
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let limiter = Arc::new(RateLimiter::new(10));

        let result = spawn_sweeper(limiter, Duration::ZERO);

        assert!(matches!(result, Err(DaygateError::Config(_))));
    }
}
