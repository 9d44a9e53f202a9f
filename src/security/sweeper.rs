//! Periodic eviction of expired limiter windows and suspicion records.
//!
//! The sweep interval is independent of every window length; between sweeps
//! expired entries are simply replaced on their next lookup.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::observability::metrics;
use crate::security::filter::SecurityFilter;
use crate::security::rate_limit::{RateLimitScope, RateLimiters};

pub struct Sweeper {
    limiters: Arc<RateLimiters>,
    filter: Arc<SecurityFilter>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(limiters: Arc<RateLimiters>, filter: Arc<SecurityFilter>, interval: Duration) -> Self {
        Self {
            limiters,
            filter,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Store sweeper starting");

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately; nothing can have expired yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Store sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one sweep over every store. Returns the number of entries removed.
    pub fn sweep_once(&self) -> usize {
        let windows = self.limiters.sweep();
        let records = self.filter.sweep();

        for scope in [RateLimitScope::Global, RateLimitScope::Chat, RateLimitScope::Nutrition] {
            metrics::record_store_size(scope.as_str(), self.limiters.limiter(scope).tracked_clients());
        }
        metrics::record_store_size("suspicion", self.filter.tracked_clients());

        tracing::debug!(windows, records, "Expired entries swept");
        windows + records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitsConfig;
    use crate::security::clock::ManualClock;
    use crate::security::filter::SecuritySettings;
    use crate::security::identity::ClientIdentity;
    use chrono::{DateTime, TimeDelta};

    #[tokio::test]
    async fn test_sweep_once_clears_all_stores() {
        let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let limiters = Arc::new(RateLimiters::in_memory(&RateLimitsConfig::default(), Arc::new(clock.clone())));
        let filter = Arc::new(SecurityFilter::in_memory(SecuritySettings::default(), Arc::new(clock.clone())));

        let client = ClientIdentity::from("c");
        limiters.check(&client, RateLimitScope::Chat).unwrap();
        let request = axum::http::Request::post("/")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(r#"{"x":"jailbreak"}"#))
            .unwrap();
        assert!(filter.validate_request(request, &client).await.is_err());

        let sweeper = Sweeper::new(limiters.clone(), filter.clone(), Duration::from_secs(300));
        assert_eq!(sweeper.sweep_once(), 0);

        clock.advance(TimeDelta::hours(2));
        // global + chat windows, one suspicion record
        assert_eq!(sweeper.sweep_once(), 3);
        assert_eq!(filter.tracked_clients(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let limiters = Arc::new(RateLimiters::in_memory(&RateLimitsConfig::default(), clock.clone()));
        let filter = Arc::new(SecurityFilter::in_memory(SecuritySettings::default(), clock));
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(Sweeper::new(limiters, filter, Duration::from_millis(10)).run(rx));
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should exit on shutdown")
            .unwrap();
    }
}
