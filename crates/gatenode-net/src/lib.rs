//! Resilient network client for Gatenode access-control nodes.
//!
//! This crate turns "send this report to the server" into a best-effort,
//! crash-and-reboot-safe delivery over an intermittent WiFi link: bearer
//! token authentication, certificate trust with fingerprint pinning, retry
//! with exponential backoff and jitter, a durable offline queue, and a
//! diagnostics log exposed as JSON.
//!
//! # Architecture
//!
//! ```text
//! Caller (reporter, config UI)
//!     │
//!     └─> NetClient ──────────> Transport ───(HTTP/HTTPS)──> Server
//!            │                     ▲
//!            ├─> TrustManager ─────┘ (TLS policy, TOFU pinning)
//!            ├─> TokenManager       (bearer token lifecycle)
//!            ├─> OfflineQueue       (durable FIFO, critical-first drain)
//!            └─> DiagnosticsLog     (classified error ring + JSON export)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gatenode_net::{ClientConfig, HttpTransport, NetClient, StaticLink};
//! use gatenode_storage::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("https://server.local:5000");
//! let mut client = NetClient::new(
//!     HttpTransport::new(),
//!     StaticLink::connected(),
//!     MemoryStore::new(),
//!     config,
//! );
//! client.load_state().await;
//!
//! client
//!     .send_post("https://server.local:5000/api/activity", br#"{"count":4}"#, true)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Design Principles
//!
//! - **Single logical task**: every manager is `&mut self`; no locks guard
//!   the queue, token, or trust state. The one concurrency boundary is the
//!   TLS stack, which the transport owns.
//! - **Fail closed on security errors**: a missing trust configuration or a
//!   changed certificate refuses the connection; it is never downgraded.
//! - **Blocking retries**: backoff delays block the caller. Callers that
//!   cannot tolerate that pass `retry = false` and rely on the queue.

pub mod client;
pub mod connectivity;
pub mod diag;
pub mod queue;
pub mod report;
pub mod retry;
pub mod token;
pub mod transport;
pub mod trust;

pub use client::{ClientConfig, NetClient};
pub use connectivity::{ConnectivitySupervisor, StaticLink};
pub use diag::DiagnosticsLog;
pub use queue::{OfflineQueue, QueuedRequest};
pub use report::ReportTicker;
pub use retry::{Operation, RetryPolicy, retry_with_backoff};
pub use token::{AuthToken, TokenManager};
pub use transport::{HttpTransport, TlsPolicy, Transport, WireFailure, WireRequest, WireResponse};
pub use trust::{TrustManager, TrustMode};
