//! Periodic activity report scheduling.
//!
//! Nodes send a small activity report on a fixed interval so the server can
//! tell a quiet node from a dead one. The ticker only answers "is a report
//! due"; the host loop decides when to ask and what to send, which keeps the
//! cadence testable without a clock mock.

use chrono::{DateTime, TimeDelta, Utc};
use gatenode_core::constants::REPORT_INTERVAL_SECS;

/// Tracks when the next periodic report is due.
#[derive(Debug, Clone)]
pub struct ReportTicker {
    interval: TimeDelta,
    last_sent: Option<DateTime<Utc>>,
}

impl Default for ReportTicker {
    fn default() -> Self {
        Self::new(REPORT_INTERVAL_SECS)
    }
}

impl ReportTicker {
    /// Create a ticker with the given interval in seconds.
    #[must_use]
    pub fn new(interval_secs: i64) -> Self {
        Self {
            interval: TimeDelta::seconds(interval_secs),
            last_sent: None,
        }
    }

    /// Whether a report is due at `now`.
    ///
    /// Always due before the first report.
    #[must_use]
    pub fn due(&self, now: DateTime<Utc>) -> bool {
        match self.last_sent {
            None => true,
            Some(last) => now - last >= self.interval,
        }
    }

    /// Record that a report was sent at `now`.
    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.last_sent = Some(now);
    }
}
