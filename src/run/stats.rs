//! Atomic emit counters shared across pipeline tasks.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters incremented from any task; snapshots are consistent per
/// counter but not linearized across them.
#[derive(Debug)]
pub struct EmitterStats {
    started_at: DateTime<Utc>,
    traces: AtomicU64,
    spans: AtomicU64,
}

#[derive(Clone, Debug, Serialize)]
pub struct StatsSnapshot {
    pub status: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: f64,
    pub emitted_traces: u64,
    pub emitted_spans: u64,
}

impl EmitterStats {
    pub fn new() -> Self {
        EmitterStats {
            started_at: Utc::now(),
            traces: AtomicU64::new(0),
            spans: AtomicU64::new(0),
        }
    }

    pub fn add(&self, traces: u64, spans: u64) {
        if traces > 0 {
            self.traces.fetch_add(traces, Ordering::Relaxed);
        }
        if spans > 0 {
            self.spans.fetch_add(spans, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let now = Utc::now();
        StatsSnapshot {
            status: "ok",
            started_at: self.started_at,
            uptime_seconds: (now - self.started_at)
                .to_std()
                .unwrap_or_default()
                .as_secs_f64(),
            emitted_traces: self.traces.load(Ordering::Relaxed),
            emitted_spans: self.spans.load(Ordering::Relaxed),
        }
    }
}

impl Default for EmitterStats {
    fn default() -> Self {
        Self::new()
    }
}
