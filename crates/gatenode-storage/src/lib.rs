//! Flash-style blob persistence for Gatenode.
//!
//! The network client keeps four independent blobs (offline queue, error
//! log, API token, certificate fingerprint) in a key-value store with no
//! filesystem guarantees beyond "write the whole blob, then close". This
//! crate provides that store:
//!
//! - [`BlobStore`] - the storage trait consumed by the network client
//! - [`FileStore`] - directory-backed implementation for gateway hosts
//! - [`MemoryStore`] - in-memory implementation for tests and emulation
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT), eliminating the need for the `async_trait` macro.
//!
//! # Example
//!
//! ```no_run
//! use gatenode_storage::{BlobStore, FileStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileStore::new("/var/lib/gatenode")?;
//! store.write("api_token", br#"{"token":"..."}"#).await?;
//! assert!(store.read("api_token").await?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use store::{BlobStore, FileStore, MemoryStore};
