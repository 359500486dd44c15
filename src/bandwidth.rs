//! Transfer rate measurement.
//!
//! This module provides the rolling-rate monitors the choker reads. The
//! network I/O path records bytes as they move; the choker only reads totals
//! and rates, so a monitor is shared behind an [`Arc`].
//!
//! Totals are atomic counters that only ever grow. Rates are computed over a
//! sliding window guarded by a short-lived lock. A reader may observe a rate
//! and a total from slightly different instants; the next review corrects
//! that.
//!
//! # Example
//!
//! ```
//! use rchoke::TransferStats;
//! use std::time::{Duration, Instant};
//!
//! let stats = TransferStats::new();
//! let start = Instant::now();
//!
//! stats.record_download_at(start, 16_384);
//! stats.record_download_at(start + Duration::from_secs(1), 16_384);
//!
//! assert_eq!(stats.downloaded(), 32_768);
//! assert!(stats.download_rate_at(start + Duration::from_secs(2)) > 0.0);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::constants::{RATE_CALC_WINDOW, RATE_SAMPLE_RETENTION};

/// A rolling throughput monitor for one direction of traffic.
///
/// Keeps timestamped byte samples and reports the average rate over the most
/// recent window, alongside a monotonic cumulative total.
pub struct RateMonitor {
    total: AtomicU64,
    window: Mutex<RateWindow>,
}

struct RateWindow {
    samples: VecDeque<(Instant, u64)>,
    length: Duration,
}

impl RateWindow {
    fn prune(&mut self, now: Instant) {
        let horizon = self.length * RATE_SAMPLE_RETENTION;
        while let Some(&(at, _)) = self.samples.front() {
            if now.saturating_duration_since(at) > horizon {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}

impl RateMonitor {
    /// Creates a monitor averaging over the default window.
    pub fn new() -> Self {
        Self::with_window(RATE_CALC_WINDOW)
    }

    /// Creates a monitor averaging over `window`.
    pub fn with_window(window: Duration) -> Self {
        Self {
            total: AtomicU64::new(0),
            window: Mutex::new(RateWindow {
                samples: VecDeque::new(),
                length: window,
            }),
        }
    }

    pub fn record(&self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    /// Records `bytes` transferred at `now`.
    ///
    /// The total saturates instead of wrapping.
    pub fn record_at(&self, now: Instant, bytes: u64) {
        let mut current = self.total.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_add(bytes);
            match self.total.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        let mut window = self.window.lock();
        window.prune(now);
        window.samples.push_back((now, bytes));
    }

    pub fn rate(&self) -> f64 {
        self.rate_at(Instant::now())
    }

    /// Returns the average bytes/sec over the window ending at `now`.
    pub fn rate_at(&self, now: Instant) -> f64 {
        let mut window = self.window.lock();
        window.prune(now);

        let length = window.length;
        if length.is_zero() {
            return 0.0;
        }

        let bytes: u64 = window
            .samples
            .iter()
            .filter(|(at, _)| now.saturating_duration_since(*at) <= length)
            .map(|(_, bytes)| *bytes)
            .sum();

        bytes as f64 / length.as_secs_f64()
    }

    /// Returns the cumulative number of bytes recorded.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for RateMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Upload and download monitors for a peer or a whole torrent.
///
/// "Upload" is data we send; "download" is data we receive.
#[derive(Default)]
pub struct TransferStats {
    upload: RateMonitor,
    download: RateMonitor,
}

impl TransferStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_window(window: Duration) -> Arc<Self> {
        Arc::new(Self {
            upload: RateMonitor::with_window(window),
            download: RateMonitor::with_window(window),
        })
    }

    pub fn record_upload(&self, bytes: u64) {
        self.upload.record(bytes);
    }

    pub fn record_download(&self, bytes: u64) {
        self.download.record(bytes);
    }

    pub fn record_upload_at(&self, now: Instant, bytes: u64) {
        self.upload.record_at(now, bytes);
    }

    pub fn record_download_at(&self, now: Instant, bytes: u64) {
        self.download.record_at(now, bytes);
    }

    /// Total bytes sent.
    pub fn uploaded(&self) -> u64 {
        self.upload.total()
    }

    /// Total bytes received.
    pub fn downloaded(&self) -> u64 {
        self.download.total()
    }

    pub fn upload_rate_at(&self, now: Instant) -> f64 {
        self.upload.rate_at(now)
    }

    pub fn download_rate_at(&self, now: Instant) -> f64 {
        self.download.rate_at(now)
    }

    pub fn upload_monitor(&self) -> &RateMonitor {
        &self.upload
    }

    pub fn download_monitor(&self) -> &RateMonitor {
        &self.download
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_over_window() {
        let monitor = RateMonitor::with_window(Duration::from_secs(4));
        let start = Instant::now();

        monitor.record_at(start, 1000);
        monitor.record_at(start + Duration::from_secs(1), 1000);
        monitor.record_at(start + Duration::from_secs(2), 2000);

        let rate = monitor.rate_at(start + Duration::from_secs(2));
        assert!((rate - 1000.0).abs() < f64::EPSILON);
        assert_eq!(monitor.total(), 4000);
    }

    #[test]
    fn test_old_samples_leave_the_window() {
        let monitor = RateMonitor::with_window(Duration::from_secs(2));
        let start = Instant::now();

        monitor.record_at(start, 10_000);
        assert!(monitor.rate_at(start) > 0.0);

        let later = start + Duration::from_secs(3);
        assert_eq!(monitor.rate_at(later), 0.0);
        // the total never shrinks
        assert_eq!(monitor.total(), 10_000);
    }

    #[test]
    fn test_total_saturates() {
        let monitor = RateMonitor::new();
        monitor.record(u64::MAX - 1);
        monitor.record(10);
        assert_eq!(monitor.total(), u64::MAX);
    }

    #[test]
    fn test_zero_window_reports_zero() {
        let monitor = RateMonitor::with_window(Duration::ZERO);
        let now = Instant::now();
        monitor.record_at(now, 500);
        assert_eq!(monitor.rate_at(now), 0.0);
    }

    #[test]
    fn test_transfer_stats_directions_are_independent() {
        let stats = TransferStats::new();
        let now = Instant::now();

        stats.record_upload_at(now, 300);
        stats.record_download_at(now, 700);

        assert_eq!(stats.uploaded(), 300);
        assert_eq!(stats.downloaded(), 700);
        assert!(stats.download_rate_at(now) > stats.upload_rate_at(now));
    }
}
