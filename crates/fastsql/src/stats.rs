//! Batch engine statistics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time statistics for a [`crate::BatchEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BatchStats {
    /// Successful flushes
    flushes: u64,
    /// Rows written by successful flushes
    rows_flushed: u64,
    /// Flushes that failed during prepare or execute
    failed_flushes: u64,
    /// Statements prepared for collapsed batches
    statements_prepared: u64,
    /// Rows buffered and not yet flushed, across all statements
    pending_rows: usize,
    /// Distinct statements currently tracked
    shapes: usize,
}

impl BatchStats {
    /// Get the number of successful flushes
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Get the number of rows written by successful flushes
    pub fn rows_flushed(&self) -> u64 {
        self.rows_flushed
    }

    /// Get the number of failed flushes
    pub fn failed_flushes(&self) -> u64 {
        self.failed_flushes
    }

    /// Get the number of batch statements prepared
    pub fn statements_prepared(&self) -> u64 {
        self.statements_prepared
    }

    /// Get the number of rows waiting to be flushed
    pub fn pending_rows(&self) -> usize {
        self.pending_rows
    }

    /// Get the number of distinct statements being batched
    pub fn shapes(&self) -> usize {
        self.shapes
    }

    /// Average rows per successful flush
    ///
    /// Returns 0.0 if nothing has been flushed yet.
    pub fn average_batch_size(&self) -> f64 {
        if self.flushes == 0 {
            0.0
        } else {
            self.rows_flushed as f64 / self.flushes as f64
        }
    }
}

/// Live counters behind [`BatchStats`]
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    flushes: AtomicU64,
    rows_flushed: AtomicU64,
    failed_flushes: AtomicU64,
    pending_rows: AtomicUsize,
}

impl StatsCounters {
    pub(crate) fn row_buffered(&self) {
        self.pending_rows.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn flushed(&self, rows: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.rows_flushed.fetch_add(rows as u64, Ordering::Relaxed);
        self.pending_rows.fetch_sub(rows, Ordering::Relaxed);
    }

    pub(crate) fn flush_failed(&self) {
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rows_discarded(&self, rows: usize) {
        self.pending_rows.fetch_sub(rows, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, statements_prepared: u64, shapes: usize) -> BatchStats {
        BatchStats {
            flushes: self.flushes.load(Ordering::Relaxed),
            rows_flushed: self.rows_flushed.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
            statements_prepared,
            pending_rows: self.pending_rows.load(Ordering::Relaxed),
            shapes,
        }
    }
}
