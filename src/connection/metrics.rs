//! FEC counters.
//!
//! Aggregates shared by every connection of a stack; nothing here identifies a
//! particular flow.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// FEC metrics collector.
#[derive(Debug, Default)]
pub struct FecMetrics {
    /// Valid FEC options received
    options_received: AtomicU64,
    /// Options that failed to decode and were ignored
    decode_failures: AtomicU64,
    /// Segments received carrying redundancy data
    encoded_received: AtomicU64,
    /// Loss reports received from peers
    loss_reports_received: AtomicU64,
    /// Options written into outgoing segments
    options_sent: AtomicU64,
    /// Options left out for lack of option space or an unencodable range
    options_omitted: AtomicU64,
    /// Handshakes that enabled FEC
    negotiations_succeeded: AtomicU64,
    /// Handshakes that ended with FEC disabled
    negotiations_declined: AtomicU64,
}

/// Point-in-time copy of [`FecMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Valid FEC options received
    pub options_received: u64,
    /// Options that failed to decode
    pub decode_failures: u64,
    /// Redundancy segments received
    pub encoded_received: u64,
    /// Loss reports received
    pub loss_reports_received: u64,
    /// Options sent
    pub options_sent: u64,
    /// Options omitted
    pub options_omitted: u64,
    /// Handshakes that enabled FEC
    pub negotiations_succeeded: u64,
    /// Handshakes that ended with FEC disabled
    pub negotiations_declined: u64,
}

impl FecMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn increment_options_received(&self) {
        self.options_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_decode_failures(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_encoded_received(&self) {
        self.encoded_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_loss_reports(&self) {
        self.loss_reports_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_options_sent(&self) {
        self.options_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_options_omitted(&self) {
        self.options_omitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_negotiation(&self, enabled: bool) {
        if enabled {
            self.negotiations_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.negotiations_declined.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            options_received: self.options_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            encoded_received: self.encoded_received.load(Ordering::Relaxed),
            loss_reports_received: self.loss_reports_received.load(Ordering::Relaxed),
            options_sent: self.options_sent.load(Ordering::Relaxed),
            options_omitted: self.options_omitted.load(Ordering::Relaxed),
            negotiations_succeeded: self.negotiations_succeeded.load(Ordering::Relaxed),
            negotiations_declined: self.negotiations_declined.load(Ordering::Relaxed),
        }
    }
}
