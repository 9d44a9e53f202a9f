//! State stores for the rate limiter and the suspicion tracker.
//!
//! Both stores are traits so a deployment running several instances can back
//! them with a shared external store without touching the limiter or filter.
//! The in-memory implementations use `DashMap`, whose entry API gives
//! per-key atomicity for the read-modify-write each request performs.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt::Debug;

/// One fixed window for one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Requests seen in this window, including rejected ones.
    pub count: u32,
    /// Instant after which the window is replaced.
    pub reset_time: DateTime<Utc>,
}

impl RateWindow {
    /// A window holding its first request.
    pub fn open(now: DateTime<Utc>, length: TimeDelta) -> Self {
        Self {
            count: 1,
            reset_time: now
                .checked_add_signed(length)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.reset_time
    }
}

/// Port for rate window storage.
pub trait RateStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Option<RateWindow>;

    fn set(&self, key: &str, window: RateWindow);

    fn delete(&self, key: &str);

    /// Apply one request to `key` atomically and return the updated window.
    ///
    /// A missing or expired window is replaced by a fresh one holding this
    /// request; otherwise the count is incremented.
    fn record_hit(&self, key: &str, now: DateTime<Utc>, length: TimeDelta) -> RateWindow;

    /// Remove windows whose reset time has passed. Returns the number removed.
    fn sweep(&self, now: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local rate window store.
#[derive(Debug, Default)]
pub struct MemoryRateStore {
    windows: DashMap<String, RateWindow>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateStore for MemoryRateStore {
    fn get(&self, key: &str) -> Option<RateWindow> {
        self.windows.get(key).map(|r| *r.value())
    }

    fn set(&self, key: &str, window: RateWindow) {
        self.windows.insert(key.to_string(), window);
    }

    fn delete(&self, key: &str) {
        self.windows.remove(key);
    }

    fn record_hit(&self, key: &str, now: DateTime<Utc>, length: TimeDelta) -> RateWindow {
        match self.windows.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let window = occupied.get_mut();
                if window.is_expired(now) {
                    *window = RateWindow::open(now, length);
                } else {
                    window.count = window.count.saturating_add(1);
                }
                *window
            }
            Entry::Vacant(vacant) => *vacant.insert(RateWindow::open(now, length)),
        }
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.is_expired(now));
        before.saturating_sub(self.windows.len())
    }

    fn len(&self) -> usize {
        self.windows.len()
    }
}

/// Suspicious-attempt counter for one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspicionRecord {
    pub count: u32,
    /// One TTL after the most recent increment.
    pub expires_at: DateTime<Utc>,
}

impl SuspicionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Port for suspicious-attempt storage.
pub trait SuspicionStore: Send + Sync + Debug {
    fn get(&self, client: &str) -> Option<SuspicionRecord>;

    fn set(&self, client: &str, record: SuspicionRecord);

    fn delete(&self, client: &str);

    /// Live attempt count; expired records count as zero.
    fn count(&self, client: &str, now: DateTime<Utc>) -> u32 {
        self.get(client)
            .filter(|record| !record.is_expired(now))
            .map_or(0, |record| record.count)
    }

    /// Record one attempt atomically, pushing expiry to `now + ttl`.
    /// Returns the new live count.
    fn increment(&self, client: &str, now: DateTime<Utc>, ttl: TimeDelta) -> u32;

    /// Remove expired records. Returns the number removed.
    fn sweep(&self, now: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local suspicion store.
#[derive(Debug, Default)]
pub struct MemorySuspicionStore {
    records: DashMap<String, SuspicionRecord>,
}

impl MemorySuspicionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SuspicionStore for MemorySuspicionStore {
    fn get(&self, client: &str) -> Option<SuspicionRecord> {
        self.records.get(client).map(|r| *r.value())
    }

    fn set(&self, client: &str, record: SuspicionRecord) {
        self.records.insert(client.to_string(), record);
    }

    fn delete(&self, client: &str) {
        self.records.remove(client);
    }

    fn increment(&self, client: &str, now: DateTime<Utc>, ttl: TimeDelta) -> u32 {
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut record = self
            .records
            .entry(client.to_string())
            .or_insert(SuspicionRecord { count: 0, expires_at });

        if record.is_expired(now) {
            record.count = 0;
        }
        record.count = record.count.saturating_add(1);
        record.expires_at = expires_at;
        record.count
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        before.saturating_sub(self.records.len())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
