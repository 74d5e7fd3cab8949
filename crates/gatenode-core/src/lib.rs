//! Core types for the Gatenode network client.
//!
//! This crate is the dependency floor of the workspace: the error taxonomy
//! shared by every layer, the request/link vocabulary types, certificate
//! fingerprints, the bounded ring both queues are built on, and the tuning
//! constants. It performs no I/O.
//!
//! - [`ErrorCode`] / [`NetError`] - classified failures, doubling as
//!   diagnostics log records
//! - [`HttpMethod`], [`ConnectionState`], [`NodeIdentity`] - dispatcher
//!   vocabulary
//! - [`Fingerprint`] - SHA-256 certificate fingerprint with constant-time
//!   comparison
//! - [`BoundedRing`] - fixed-capacity FIFO with evict-oldest overflow
//! - [`constants`] - tuning values and persistent blob keys

pub mod constants;
pub mod error;
pub mod ring;
pub mod types;

pub use error::{ErrorCode, NetError, Result, Severity};
pub use ring::BoundedRing;
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
