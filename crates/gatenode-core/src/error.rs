//! Error taxonomy for the Gatenode network client.
//!
//! Errors are classified by [`ErrorCode`] (the kind of failure, not the
//! transport-specific cause) and carry a [`Severity`] plus a recovery flag so
//! the diagnostics log can track whether a later action cleared them. The
//! same record type is both the propagated error (`Result<T, NetError>`) and
//! the entry stored in the diagnostics ring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classified failure kind.
///
/// The taxonomy is deliberately coarse: callers and the retry policy only
/// care about the class of failure, not the underlying OS or TLS error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// WiFi link is down; the request never left the device.
    LinkDown,
    /// Transport-level failure with no HTTP response.
    HttpError,
    /// Server responded with a non-2xx status.
    ServerError,
    /// The exchange exceeded its response or connect timeout.
    TimeoutError,
    /// Request or response body could not be parsed as JSON.
    JsonError,
    /// Hostname resolution failed.
    DnsError,
    /// No usable trust configuration for a secure URL.
    TlsError,
    /// Peer certificate fingerprint did not match the pinned value.
    CertVerifyError,
    /// 401/403 from the server, or a token response missing its token.
    AuthError,
    /// Persistent store unavailable or rejected a write.
    StorageError,
    /// Allocation failure; recovery policy is a device restart.
    MemoryError,
    /// Connection closed mid-exchange.
    ConnectionReset,
}

impl ErrorCode {
    /// Whether this class is retried locally and queued when retries fail.
    ///
    /// Security failures and auth rejections are excluded: they must not be
    /// silently retried into success.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorCode::LinkDown
                | ErrorCode::HttpError
                | ErrorCode::TimeoutError
                | ErrorCode::ConnectionReset
                | ErrorCode::DnsError
        )
    }

    /// Whether the retry loop may attempt this class again at all.
    ///
    /// Broader than [`is_transient`](Self::is_transient): a `ServerError`
    /// is worth retrying within one backoff window but is never persisted
    /// to the offline queue.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        self.is_transient() || matches!(self, ErrorCode::ServerError)
    }

    /// Default severity used when a record for this code is logged.
    #[must_use]
    pub fn default_severity(self) -> Severity {
        match self {
            ErrorCode::LinkDown | ErrorCode::TimeoutError => Severity::Warning,
            ErrorCode::TlsError | ErrorCode::CertVerifyError | ErrorCode::MemoryError => {
                Severity::Critical
            }
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ErrorCode::LinkDown => "LINK_DOWN",
            ErrorCode::HttpError => "HTTP_ERROR",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::TimeoutError => "TIMEOUT",
            ErrorCode::JsonError => "JSON_ERROR",
            ErrorCode::DnsError => "DNS_ERROR",
            ErrorCode::TlsError => "TLS_ERROR",
            ErrorCode::CertVerifyError => "CERT_VERIFY_ERROR",
            ErrorCode::AuthError => "AUTH_ERROR",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::MemoryError => "MEMORY_ERROR",
            ErrorCode::ConnectionReset => "CONNECTION_RESET",
        };
        write!(f, "{name}")
    }
}

/// Severity attached to a logged error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        write!(f, "{name}")
    }
}

/// A classified network error.
///
/// Doubles as the propagated error type and the diagnostics log record.
/// `recovered` starts out `false` and is flipped in place by the diagnostics
/// log when a later recovery action succeeds for the same code.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct NetError {
    /// Failure classification.
    pub code: ErrorCode,
    /// Human-readable detail for the status endpoints and text log.
    pub message: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
    /// Severity assigned at log time.
    pub severity: Severity,
    /// Whether a later recovery action cleared this failure.
    pub recovered: bool,
}

impl NetError {
    /// Create an error with the default severity for its code.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatenode_core::{ErrorCode, NetError, Severity};
    ///
    /// let err = NetError::new(ErrorCode::LinkDown, "wifi link down");
    /// assert_eq!(err.severity, Severity::Warning);
    /// assert!(!err.recovered);
    /// ```
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            timestamp: Utc::now(),
            severity: code.default_severity(),
            recovered: false,
        }
    }

    /// Override the severity assigned by [`new`](Self::new).
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Shorthand for the common link-down failure.
    pub fn link_down() -> Self {
        Self::new(ErrorCode::LinkDown, "network link is down")
    }
}

/// Specialized result type for network client operations.
pub type Result<T> = std::result::Result<T, NetError>;
