//! Session counters for the relay and the submission bot.
//!
//! Counters are monotonically non-decreasing within a process and reset only
//! at start. Each counter has a single writing component; snapshots are taken
//! lock-free for the status server and shutdown summary.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter snapshot source for the status server.
pub trait StatsReport: Send + Sync {
    fn report(&self) -> serde_json::Value;
}

/// Relay pipeline counters.
#[derive(Debug, Default)]
pub struct RelayStats {
    received: AtomicU64,
    forwarded: AtomicU64,
    filtered: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelaySnapshot {
    pub received: u64,
    pub forwarded: u64,
    pub filtered: u64,
    pub errors: u64,
}

impl RelayStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RelaySnapshot {
        RelaySnapshot {
            received: self.received.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl StatsReport for RelayStats {
    fn report(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or_default()
    }
}

/// Submission bot counters.
#[derive(Debug, Default)]
pub struct SubmissionStats {
    received: AtomicU64,
    approved: AtomicU64,
    rejected: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionSnapshot {
    pub received: u64,
    pub approved: u64,
    pub rejected: u64,
    pub errors: u64,
}

impl SubmissionStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_approved(&self) {
        self.approved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SubmissionSnapshot {
        SubmissionSnapshot {
            received: self.received.load(Ordering::Relaxed),
            approved: self.approved.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl StatsReport for SubmissionStats {
    fn report(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_counters_accumulate() {
        let stats = RelayStats::default();
        stats.record_received();
        stats.record_received();
        stats.record_forwarded();
        stats.record_filtered();
        let snap = stats.snapshot();
        assert_eq!(snap.received, 2);
        assert_eq!(snap.forwarded, 1);
        assert_eq!(snap.filtered, 1);
        assert_eq!(snap.errors, 0);
    }

    #[test]
    fn submission_report_serializes_counters() {
        let stats = SubmissionStats::default();
        stats.record_received();
        stats.record_rejected();
        let report = stats.report();
        assert_eq!(report.get("received").and_then(|v| v.as_u64()), Some(1));
        assert_eq!(report.get("rejected").and_then(|v| v.as_u64()), Some(1));
        assert_eq!(report.get("approved").and_then(|v| v.as_u64()), Some(0));
    }
}
