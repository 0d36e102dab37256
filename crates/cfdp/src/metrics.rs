// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-entity protocol counters.
//!
//! Lock-free atomic counters updated on the PDU hot path and sampled through
//! [`EntityMetrics::snapshot`]. All updates use Relaxed ordering; counters are
//! monotone and independent, so no cross-counter consistency is implied by a
//! snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

/// Entity-wide protocol counters.
#[derive(Debug, Default)]
pub struct EntityMetrics {
    /// Outbound PDUs handed to the send callback.
    pdus_sent: AtomicU64,
    /// Inbound buffers offered to `process_pdu` (including undecodable ones).
    pdus_received: AtomicU64,
    /// NAK PDUs emitted by receive transactions.
    naks_sent: AtomicU64,
    /// NAK PDUs consumed by send transactions.
    naks_received: AtomicU64,
    /// FileData PDUs re-emitted in response to NAK requests.
    segments_retransmitted: AtomicU64,
    /// Inbound buffers discarded because they did not decode.
    decode_errors: AtomicU64,
    /// Transactions that reached a terminal state successfully.
    transactions_completed: AtomicU64,
    /// Transactions that reached a terminal state with a fault or cancel.
    transactions_failed: AtomicU64,
}

/// Point-in-time copy of [`EntityMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub pdus_sent: u64,
    pub pdus_received: u64,
    pub naks_sent: u64,
    pub naks_received: u64,
    pub segments_retransmitted: u64,
    pub decode_errors: u64,
    pub transactions_completed: u64,
    pub transactions_failed: u64,
}

impl EntityMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr_pdus_sent(&self) {
        self.pdus_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_pdus_received(&self) {
        self.pdus_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_naks_sent(&self) {
        self.naks_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_naks_received(&self) {
        self.naks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_segments_retransmitted(&self) {
        self.segments_retransmitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_decode_errors(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completion(&self, success: bool) {
        if success {
            self.transactions_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.transactions_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Load every counter.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pdus_sent: self.pdus_sent.load(Ordering::Relaxed),
            pdus_received: self.pdus_received.load(Ordering::Relaxed),
            naks_sent: self.naks_sent.load(Ordering::Relaxed),
            naks_received: self.naks_received.load(Ordering::Relaxed),
            segments_retransmitted: self.segments_retransmitted.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            transactions_completed: self.transactions_completed.load(Ordering::Relaxed),
            transactions_failed: self.transactions_failed.load(Ordering::Relaxed),
        }
    }
}
