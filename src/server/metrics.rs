//! Server metrics collection.
//!
//! Aggregate counters only; nothing here identifies a peer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server metrics collector.
pub struct ServerMetrics {
    start_time: Instant,
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    /// Connections that completed the Replicant handshake
    established_connections: AtomicU64,
    /// Handshakes that failed validation, key agreement or I/O
    handshake_errors: AtomicU64,
    /// Handshakes that ran past the deadline
    handshake_timeouts: AtomicU64,
    /// Forward target unreachable
    forward_errors: AtomicU64,
    /// Plaintext sent to clients
    bytes_sent: AtomicU64,
    /// Plaintext received from clients
    bytes_received: AtomicU64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            established_connections: AtomicU64::new(0),
            handshake_errors: AtomicU64::new(0),
            handshake_timeouts: AtomicU64::new(0),
            forward_errors: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    /// Increment total and active connections.
    pub fn increment_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn increment_established(&self) {
        self.established_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_handshake_errors(&self) {
        self.handshake_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_handshake_timeouts(&self) {
        self.handshake_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_forward_errors(&self) {
        self.forward_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn established_connections(&self) -> u64 {
        self.established_connections.load(Ordering::Relaxed)
    }

    pub fn handshake_errors(&self) -> u64 {
        self.handshake_errors.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            total_connections: self.total_connections(),
            active_connections: self.active_connections(),
            established_connections: self.established_connections(),
            handshake_errors: self.handshake_errors(),
            handshake_timeouts: self.handshake_timeouts.load(Ordering::Relaxed),
            forward_errors: self.forward_errors.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent(),
            bytes_received: self.bytes_received(),
        }
    }

    /// Format metrics as a simple text report.
    pub fn format_report(&self) -> String {
        let snapshot = self.snapshot();

        format!(
            r#"Replicant Server Metrics
========================
Uptime: {} seconds

Connections:
  Total:         {}
  Active:        {}
  Established:   {}

Traffic:
  Sent:     {} bytes
  Received: {} bytes

Errors:
  Handshake Errors:   {}
  Handshake Timeouts: {}
  Forward Errors:     {}
"#,
            snapshot.uptime_secs,
            snapshot.total_connections,
            snapshot.active_connections,
            snapshot.established_connections,
            snapshot.bytes_sent,
            snapshot.bytes_received,
            snapshot.handshake_errors,
            snapshot.handshake_timeouts,
            snapshot.forward_errors,
        )
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of all metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub total_connections: u64,
    pub active_connections: u64,
    pub established_connections: u64,
    pub handshake_errors: u64,
    pub handshake_timeouts: u64,
    pub forward_errors: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl MetricsSnapshot {
    /// Fraction of connections that completed the handshake.
    pub fn handshake_success_rate(&self) -> f64 {
        if self.total_connections == 0 {
            0.0
        } else {
            self.established_connections as f64 / self.total_connections as f64
        }
    }

    pub fn throughput_bps(&self) -> f64 {
        if self.uptime_secs == 0 {
            0.0
        } else {
            (self.bytes_sent + self.bytes_received) as f64 / self.uptime_secs as f64
        }
    }
}
