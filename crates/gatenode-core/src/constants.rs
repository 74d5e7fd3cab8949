//! Core constants for the Gatenode network client.
//!
//! This module defines the tuning values shared by the dispatcher, offline
//! queue, trust manager, token manager, and diagnostics log. The values are
//! sized for small access-control nodes reporting over an intermittent WiFi
//! link: queues stay small, backoff stays short, and everything that must
//! survive a reboot fits in a handful of flash blobs.
//!
//! # Usage
//!
//! ```
//! use gatenode_core::constants::*;
//! use std::time::Duration;
//!
//! let first_delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);
//! assert_eq!(first_delay.as_millis(), 1000);
//! assert!(DEFAULT_QUEUE_CAPACITY >= DRAIN_MAX_ITEMS);
//! ```

// ============================================================================
// Retry / backoff
// ============================================================================

/// Maximum retry attempts after the initial try of a dispatched request.
///
/// A request is attempted at most `MAX_HTTP_RETRIES + 1` times before it is
/// either queued (transient failure) or surfaced to the caller.
pub const MAX_HTTP_RETRIES: u32 = 3;

/// Base delay before the first retry, in milliseconds.
///
/// The delay doubles on every subsequent attempt (1s, 2s, 4s, ...).
pub const INITIAL_RETRY_DELAY_MS: u64 = 1000;

/// Jitter applied to every backoff delay, in milliseconds.
///
/// Each delay is perturbed by up to ±`RETRY_JITTER_MS` so that a fleet of
/// nodes losing the same server does not retry in lockstep.
pub const RETRY_JITTER_MS: u64 = 100;

/// Lower bound for any backoff delay after jitter, in milliseconds.
pub const MIN_RETRY_DELAY_MS: u64 = 100;

// ============================================================================
// Offline queue
// ============================================================================

/// Maximum number of requests held in the offline queue.
///
/// When the queue is full the oldest entry is evicted first: data freshness
/// is preferred over completeness.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Maximum retries for a single queued request before it is dropped.
pub const MAX_QUEUE_RETRIES: u32 = 3;

/// Maximum queue entries resent per drain cycle.
pub const DRAIN_MAX_ITEMS: usize = 5;

// ============================================================================
// Timeouts
// ============================================================================

/// Response timeout for a single HTTP exchange, in milliseconds.
pub const RESPONSE_TIMEOUT_MS: u64 = 5000;

/// Connect timeout for a single HTTP exchange, in milliseconds.
pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Token authentication
// ============================================================================

/// Safety margin before token expiry, in seconds.
///
/// A token with less than this much lifetime left is treated as invalid so a
/// refresh happens proactively instead of mid-flight.
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 3600;

/// Assumed token lifetime when the server omits `expires_in`, in seconds.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 30 * 24 * 3600;

/// Path of the token endpoint relative to the server base URL.
pub const AUTH_TOKEN_PATH: &str = "/api/auth/token";

// ============================================================================
// Certificate trust
// ============================================================================

/// Window in which an operator may approve a changed certificate, in seconds.
///
/// A mismatched fingerprint observed outside this window (or never approved
/// within it) keeps the connection refused.
pub const CERT_APPROVAL_WINDOW_SECS: i64 = 300;

// ============================================================================
// Diagnostics log
// ============================================================================

/// Capacity of the in-memory error ring.
pub const ERROR_LOG_CAPACITY: usize = 32;

/// Size threshold for the plain-text error mirror, in bytes.
///
/// Once the mirror grows past this it is truncated to its second half to
/// bound flash wear.
pub const TEXT_LOG_MAX_BYTES: usize = 8192;

// ============================================================================
// Periodic reporting
// ============================================================================

/// Default interval between activity reports, in seconds.
pub const REPORT_INTERVAL_SECS: i64 = 600;

// ============================================================================
// Persistent blob keys
// ============================================================================

/// Blob key for the serialized offline queue.
pub const BLOB_OFFLINE_QUEUE: &str = "offline_queue";

/// Blob key for the structured error log.
pub const BLOB_ERROR_LOG: &str = "error_log";

/// Blob key for the plain-text error mirror.
pub const BLOB_ERROR_LOG_TEXT: &str = "error_log.txt";

/// Blob key for the API token.
pub const BLOB_API_TOKEN: &str = "api_token";

/// Blob key for the pinned certificate fingerprint.
pub const BLOB_CERT_FINGERPRINT: &str = "cert_fingerprint";
