//! Usage tracking with per-id rate limiting.
//!
//! Increments are capped per fixed one-second bucket per id; the 11th call
//! (at the default cap of 10) within a bucket is reported as rate limited and
//! mutates nothing. Buckets are independent across ids. The tracker only
//! marks itself dirty; the debounced snapshot flush lives with the server.

use crate::catalog::model::UsageRecord;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Outcome of one `track` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackOutcome {
    pub rate_limited: bool,
    pub usage_count: u64,
}

/// Per-id fixed-window counter.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    /// Bucket key: unix epoch second.
    window: i64,
    count: u32,
}

/// In-memory usage state, persisted via the store's usage snapshot.
#[derive(Debug)]
pub struct UsageTracker {
    records: HashMap<String, UsageRecord>,
    buckets: HashMap<String, Bucket>,
    rate_limit: u32,
    dirty: bool,
}

impl UsageTracker {
    pub fn new(records: HashMap<String, UsageRecord>, rate_limit: u32) -> Self {
        Self {
            records,
            buckets: HashMap::new(),
            rate_limit,
            dirty: false,
        }
    }

    /// Record one usage of `id` at `now`.
    ///
    /// `first_seen_ts` is set on the first ever increment and never
    /// overwritten afterwards, even across snapshot reloads.
    pub fn track(&mut self, id: &str, now: DateTime<Utc>) -> TrackOutcome {
        let window = now.timestamp();
        let bucket = self
            .buckets
            .entry(id.to_string())
            .or_insert(Bucket { window, count: 0 });
        if bucket.window != window {
            bucket.window = window;
            bucket.count = 0;
        }

        if bucket.count >= self.rate_limit {
            let usage_count = self.records.get(id).map(|r| r.usage_count).unwrap_or(0);
            return TrackOutcome {
                rate_limited: true,
                usage_count,
            };
        }
        bucket.count += 1;

        let record = self
            .records
            .entry(id.to_string())
            .or_insert_with(|| UsageRecord {
                usage_count: 0,
                first_seen_ts: now,
                last_used_at: now,
            });
        record.usage_count += 1;
        record.last_used_at = now;
        self.dirty = true;

        TrackOutcome {
            rate_limited: false,
            usage_count: record.usage_count,
        }
    }

    /// Top `n` ids by usage count, ties broken by id for stable output.
    pub fn hotset(&self, n: usize) -> Vec<(String, UsageRecord)> {
        let mut all: Vec<(String, UsageRecord)> = self
            .records
            .iter()
            .map(|(id, rec)| (id.clone(), rec.clone()))
            .collect();
        all.sort_by(|a, b| b.1.usage_count.cmp(&a.1.usage_count).then(a.0.cmp(&b.0)));
        all.truncate(n);
        all
    }

    pub fn get(&self, id: &str) -> Option<&UsageRecord> {
        self.records.get(id)
    }

    pub fn records(&self) -> &HashMap<String, UsageRecord> {
        &self.records
    }

    /// Whether there are unsaved increments.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Called after the snapshot has been written.
    pub fn mark_flushed(&mut self) {
        self.dirty = false;
    }

    /// Drop usage state for removed entry ids.
    pub fn forget(&mut self, id: &str) {
        if self.records.remove(id).is_some() {
            self.dirty = true;
        }
        self.buckets.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(sec: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + sec, 0).unwrap()
    }

    #[test]
    fn eleventh_call_in_window_is_rate_limited() {
        let mut tracker = UsageTracker::new(HashMap::new(), 10);
        for i in 1..=10 {
            let out = tracker.track("e1", at(0));
            assert!(!out.rate_limited, "call {} unexpectedly limited", i);
            assert_eq!(out.usage_count, i);
        }
        let out = tracker.track("e1", at(0));
        assert!(out.rate_limited);
        // Counters unchanged by the limited call.
        assert_eq!(out.usage_count, 10);
        assert_eq!(tracker.get("e1").unwrap().usage_count, 10);
    }

    #[test]
    fn other_ids_are_unaffected() {
        let mut tracker = UsageTracker::new(HashMap::new(), 10);
        for _ in 0..11 {
            tracker.track("hot", at(0));
        }
        let out = tracker.track("cold", at(0));
        assert!(!out.rate_limited);
        assert_eq!(out.usage_count, 1);
    }

    #[test]
    fn window_resets_after_a_second() {
        let mut tracker = UsageTracker::new(HashMap::new(), 10);
        for _ in 0..10 {
            tracker.track("e1", at(0));
        }
        assert!(tracker.track("e1", at(0)).rate_limited);
        let out = tracker.track("e1", at(1));
        assert!(!out.rate_limited);
        assert_eq!(out.usage_count, 11);
    }

    #[test]
    fn first_seen_is_set_once() {
        let mut tracker = UsageTracker::new(HashMap::new(), 10);
        tracker.track("e1", at(0));
        let first = tracker.get("e1").unwrap().first_seen_ts;
        tracker.track("e1", at(5));
        assert_eq!(tracker.get("e1").unwrap().first_seen_ts, first);
        assert_eq!(tracker.get("e1").unwrap().last_used_at, at(5));
    }

    #[test]
    fn hotset_orders_by_count_then_id() {
        let mut tracker = UsageTracker::new(HashMap::new(), 100);
        for _ in 0..3 {
            tracker.track("busy", at(0));
        }
        tracker.track("beta", at(0));
        tracker.track("alpha", at(0));

        let hot = tracker.hotset(2);
        assert_eq!(hot[0].0, "busy");
        assert_eq!(hot[1].0, "alpha");
    }

    #[test]
    fn dirty_flag_tracks_flush_lifecycle() {
        let mut tracker = UsageTracker::new(HashMap::new(), 10);
        assert!(!tracker.is_dirty());
        tracker.track("e1", at(0));
        assert!(tracker.is_dirty());
        tracker.mark_flushed();
        assert!(!tracker.is_dirty());
        // A limited call does not re-dirty.
        for _ in 0..10 {
            tracker.track("e1", at(1));
        }
        tracker.mark_flushed();
        assert!(tracker.track("e1", at(1)).rate_limited);
        assert!(!tracker.is_dirty());
    }
}
