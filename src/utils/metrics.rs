//! Observability and Metrics
//!
//! Handshake counters for monitoring session churn and peer behaviour.
//!
//! Uses atomic counters so handlers for distinct sessions can record concurrently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Per-server metrics collector for handshake operations
#[derive(Debug)]
pub struct Metrics {
    /// Sessions created by an accepted OPEN_CONNECTION_REQUEST_1
    pub sessions_created: AtomicU64,
    /// Sessions closed for any reason
    pub sessions_closed: AtomicU64,
    /// Sessions that reached CONNECTED
    pub handshakes_completed: AtomicU64,
    /// CONNECTION_REQUEST rejected (GUID mismatch or security requested)
    pub handshakes_failed: AtomicU64,
    /// Packets dropped as stray, duplicate, malformed or out of order
    pub packets_dropped: AtomicU64,
    /// Replies handed to the transport
    pub replies_sent: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            sessions_created: AtomicU64::new(0),
            sessions_closed: AtomicU64::new(0),
            handshakes_completed: AtomicU64::new(0),
            handshakes_failed: AtomicU64::new(0),
            packets_dropped: AtomicU64::new(0),
            replies_sent: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_completed(&self) {
        self.handshakes_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reply_sent(&self) {
        self.replies_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_closed: self.sessions_closed.load(Ordering::Relaxed),
            handshakes_completed: self.handshakes_completed.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            replies_sent: self.replies_sent.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            sessions_created = snapshot.sessions_created,
            sessions_closed = snapshot.sessions_closed,
            handshakes_completed = snapshot.handshakes_completed,
            handshakes_failed = snapshot.handshakes_failed,
            packets_dropped = snapshot.packets_dropped,
            replies_sent = snapshot.replies_sent,
            uptime_seconds = snapshot.uptime_seconds,
            "Handshake metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sessions_created: u64,
    pub sessions_closed: u64,
    pub handshakes_completed: u64,
    pub handshakes_failed: u64,
    pub packets_dropped: u64,
    pub replies_sent: u64,
    pub uptime_seconds: u64,
}
