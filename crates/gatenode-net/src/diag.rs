//! Diagnostics log: bounded error history with durable mirrors.
//!
//! Every classified failure lands here once, regardless of whether it was
//! also propagated to the caller. The in-memory ring holds the recent
//! history for the status endpoints; two blobs mirror it for post-mortem
//! use: a structured JSON snapshot and a human-readable text log that is
//! truncated to its newer half when it outgrows its budget.
//!
//! Records are never deleted on recovery. A later successful action flips
//! the matching record's `recovered` flag in place, so the history shows
//! both the failure and that it cleared.

use gatenode_core::constants::{
    BLOB_ERROR_LOG, BLOB_ERROR_LOG_TEXT, ERROR_LOG_CAPACITY, TEXT_LOG_MAX_BYTES,
};
use gatenode_core::{BoundedRing, ErrorCode, NetError, Severity};
use gatenode_storage::BlobStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

#[derive(Debug, Serialize, Deserialize)]
struct LogSnapshot {
    errors: Vec<NetError>,
}

/// Bounded error history with JSON and text mirrors.
#[derive(Debug)]
pub struct DiagnosticsLog<S: BlobStore> {
    ring: BoundedRing<NetError>,
    last: Option<NetError>,
    store: S,
    text_max: usize,
}

impl<S: BlobStore> DiagnosticsLog<S> {
    /// Create an empty log with the default capacity.
    pub fn new(store: S) -> Self {
        Self {
            ring: BoundedRing::new(ERROR_LOG_CAPACITY),
            last: None,
            store,
            text_max: TEXT_LOG_MAX_BYTES,
        }
    }

    /// Number of records currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Whether the log holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// The most recently logged record.
    #[must_use]
    pub fn last_error(&self) -> Option<&NetError> {
        self.last.as_ref()
    }

    /// Whether any unrecovered record of `Critical` severity remains.
    #[must_use]
    pub fn has_unrecovered_critical(&self) -> bool {
        self.ring
            .iter()
            .any(|e| e.severity == Severity::Critical && !e.recovered)
    }

    /// Record a failure.
    ///
    /// Emits a tracing event at the record's severity, appends to the ring
    /// (evicting the oldest record when full), and refreshes both durable
    /// mirrors. Mirror write failures are absorbed: a dying flash chip must
    /// not take the error reporting path down with it.
    pub async fn log(&mut self, err: NetError) {
        match err.severity {
            Severity::Info => info!(code = %err.code, "{}", err.message),
            Severity::Warning => warn!(code = %err.code, "{}", err.message),
            Severity::Error | Severity::Critical => {
                error!(code = %err.code, severity = %err.severity, "{}", err.message);
            }
        }

        self.last = Some(err.clone());
        self.ring.push(err);
        self.persist().await;
        self.append_text_line().await;
    }

    /// Flip the most recent unrecovered record with `code` to recovered.
    ///
    /// Returns whether a record was updated. Called after a success on the
    /// same path that previously failed (a delivered request recovers a
    /// `LINK_DOWN`, a fresh token recovers an `AUTH_ERROR`).
    pub async fn mark_recovered(&mut self, code: ErrorCode) -> bool {
        // Newest-first: the most recent failure is the one that cleared.
        let mut newest_match: Option<&mut NetError> = None;
        for record in self.ring.iter_mut() {
            if record.code == code && !record.recovered {
                newest_match = Some(record);
            }
        }
        let Some(record) = newest_match else {
            return false;
        };
        record.recovered = true;

        debug!(code = %code, "failure marked recovered");
        if let Some(last) = &mut self.last
            && last.code == code
        {
            last.recovered = true;
        }
        self.persist().await;
        true
    }

    /// Export the newest `limit` records as a JSON document, newest first.
    ///
    /// Shape: `{"errors": [...], "count": N}`.
    #[must_use]
    pub fn export_json(&self, limit: usize) -> String {
        let newest_first: Vec<&NetError> = self.ring.iter().rev().take(limit).collect();
        serde_json::json!({
            "errors": newest_first,
            "count": newest_first.len(),
        })
        .to_string()
    }

    /// Reload the structured history from the blob store.
    pub async fn load(&mut self) {
        match self.store.read(BLOB_ERROR_LOG).await {
            Ok(Some(raw)) => match serde_json::from_slice::<LogSnapshot>(&raw) {
                Ok(snapshot) => {
                    self.last = snapshot.errors.last().cloned();
                    self.ring.restore(snapshot.errors);
                    debug!(entries = self.ring.len(), "restored error log");
                }
                Err(e) => {
                    warn!(error = %e, "discarding corrupt error log blob");
                    let _ = self.store.remove(BLOB_ERROR_LOG).await;
                }
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "error log blob unreadable"),
        }
    }

    /// Drop all records and both durable mirrors.
    pub async fn clear(&mut self) {
        self.ring.clear();
        self.last = None;
        let _ = self.store.remove(BLOB_ERROR_LOG).await;
        let _ = self.store.remove(BLOB_ERROR_LOG_TEXT).await;
    }

    async fn persist(&mut self) {
        let snapshot = LogSnapshot {
            errors: self.ring.iter().cloned().collect(),
        };
        match serde_json::to_vec(&snapshot) {
            Ok(raw) => {
                if let Err(e) = self.store.write(BLOB_ERROR_LOG, &raw).await {
                    warn!(error = %e, "failed to persist error log");
                }
            }
            Err(e) => warn!(error = %e, "error log serialization failed"),
        }
    }

    /// Append the latest record to the text mirror, truncating to the newer
    /// half past the size budget.
    async fn append_text_line(&mut self) {
        let Some(record) = &self.last else { return };
        let line = format!(
            "{} [{}] [{}] {}\n",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.severity,
            record.code,
            record.message
        );

        let mut text = match self.store.read(BLOB_ERROR_LOG_TEXT).await {
            Ok(Some(raw)) => String::from_utf8_lossy(&raw).into_owned(),
            Ok(None) => String::new(),
            Err(e) => {
                warn!(error = %e, "text log unreadable, skipping mirror");
                return;
            }
        };
        text.push_str(&line);

        if text.len() > self.text_max {
            // Keep the newer half, starting at a line boundary.
            let midpoint = text.len() / 2;
            let cut = text[midpoint..]
                .find('\n')
                .map_or(midpoint, |n| midpoint + n + 1);
            text = text[cut..].to_string();
        }

        if let Err(e) = self.store.write(BLOB_ERROR_LOG_TEXT, text.as_bytes()).await {
            warn!(error = %e, "failed to write text log");
        }
    }
}
