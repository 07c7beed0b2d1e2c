//! In-process counters surfaced through `metrics.snapshot`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct MethodCounters {
    calls: u64,
    errors: u64,
}

/// Shared metrics sink. Cheap to clone behind an `Arc` at the server layer.
#[derive(Debug)]
pub struct Metrics {
    started_at: DateTime<Utc>,
    connections_accepted: AtomicU64,
    connections_rejected: AtomicU64,
    frames_read: AtomicU64,
    frames_written: AtomicU64,
    validation_rejections: AtomicU64,
    per_method: Mutex<HashMap<String, MethodCounters>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            connections_accepted: AtomicU64::new(0),
            connections_rejected: AtomicU64::new(0),
            frames_read: AtomicU64::new(0),
            frames_written: AtomicU64::new(0),
            validation_rejections: AtomicU64::new(0),
            per_method: Mutex::new(HashMap::new()),
        }
    }

    pub fn connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_read(&self) {
        self.frames_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_written(&self) {
        self.frames_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn validation_rejected(&self) {
        self.validation_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn method_called(&self, method: &str, ok: bool) {
        let mut guard = match self.per_method.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let counters = guard.entry(method.to_string()).or_default();
        counters.calls += 1;
        if !ok {
            counters.errors += 1;
        }
    }

    /// Full snapshot as a wire-ready JSON object.
    pub fn snapshot(&self) -> Value {
        let uptime_secs = (Utc::now() - self.started_at).num_seconds().max(0);
        let methods: serde_json::Map<String, Value> = {
            let guard = match self.per_method.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            let mut names: Vec<&String> = guard.keys().collect();
            names.sort();
            names
                .into_iter()
                .map(|name| {
                    let c = &guard[name];
                    (
                        name.clone(),
                        serde_json::json!({"calls": c.calls, "errors": c.errors}),
                    )
                })
                .collect()
        };
        serde_json::json!({
            "startedAt": self.started_at.to_rfc3339(),
            "uptimeSecs": uptime_secs,
            "connections": {
                "accepted": self.connections_accepted.load(Ordering::Relaxed),
                "rejected": self.connections_rejected.load(Ordering::Relaxed),
            },
            "frames": {
                "read": self.frames_read.load(Ordering::Relaxed),
                "written": self.frames_written.load(Ordering::Relaxed),
            },
            "validationRejections": self.validation_rejections.load(Ordering::Relaxed),
            "methods": methods,
        })
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
