//! Rate-limited error logging
//!
//! A sink that cannot reach its endpoint fails on every flush. This logger
//! reports at most once per interval and carries the number of errors
//! suppressed since the last report.
//!
//! # Example
//!
//! ```ignore
//! let logger = RateLimitedLogger::new("write_http", Duration::from_secs(10));
//!
//! // Only logs once per 10 seconds, even if called frequently
//! for _ in 0..1000 {
//!     logger.error("post failed", &err);
//! }
//! ```

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default interval for rate-limited logging
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Maximum payload length included in a log line
pub const MAX_DATA_LOG_LENGTH: usize = 256;

/// Error logger that reports at most once per interval
pub struct RateLimitedLogger {
    /// Sink name attached to every line
    sink: String,

    /// Minimum interval between log messages
    min_interval: Duration,

    last_log_time: Mutex<Option<Instant>>,

    /// Errors since last log
    error_count: AtomicU64,

    total_errors: AtomicU64,
}

impl RateLimitedLogger {
    pub fn new(sink: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            sink: sink.into(),
            min_interval,
            last_log_time: Mutex::new(None),
            error_count: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
        }
    }

    /// Logger using [`DEFAULT_LOG_INTERVAL`]
    pub fn with_default_interval(sink: impl Into<String>) -> Self {
        Self::new(sink, DEFAULT_LOG_INTERVAL)
    }

    /// Record an error and log if enough time has passed
    ///
    /// Returns true if the error was logged, false if it was suppressed.
    pub fn error(&self, message: &str, error: &dyn Display) -> bool {
        let Some((suppressed, total)) = self.record() else {
            return false;
        };

        tracing::error!(
            sink = %self.sink,
            message = %message,
            error = %error,
            suppressed_count = suppressed,
            total_errors = total,
            "sink error (rate-limited)"
        );
        true
    }

    /// Record an error with a payload excerpt, e.g. a response body
    ///
    /// Data is truncated to [`MAX_DATA_LOG_LENGTH`] bytes.
    pub fn error_with_data(&self, message: &str, error: &dyn Display, data: &[u8]) -> bool {
        let Some((suppressed, total)) = self.record() else {
            return false;
        };

        tracing::error!(
            sink = %self.sink,
            message = %message,
            error = %error,
            data = %truncate(data),
            suppressed_count = suppressed,
            total_errors = total,
            "sink error with data (rate-limited)"
        );
        true
    }

    /// Errors recorded since the last emitted line
    pub fn pending_error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn total_error_count(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.error_count.store(0, Ordering::Relaxed);
        self.total_errors.store(0, Ordering::Relaxed);
        *self.last_log_time.lock() = None;
    }

    /// Count one error; returns (suppressed, total) when a line is due
    fn record(&self) -> Option<(u64, u64)> {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        self.total_errors.fetch_add(1, Ordering::Relaxed);

        {
            let mut last_time = self.last_log_time.lock();
            let now = Instant::now();
            match *last_time {
                Some(last) if now.duration_since(last) < self.min_interval => return None,
                _ => *last_time = Some(now),
            }
        }

        let count = self.error_count.swap(0, Ordering::Relaxed);
        Some((
            count.saturating_sub(1),
            self.total_errors.load(Ordering::Relaxed),
        ))
    }
}

fn truncate(data: &[u8]) -> String {
    if data.len() > MAX_DATA_LOG_LENGTH {
        format!(
            "{}... (truncated from {} bytes)",
            String::from_utf8_lossy(&data[..MAX_DATA_LOG_LENGTH]),
            data.len()
        )
    } else {
        String::from_utf8_lossy(data).into_owned()
    }
}
