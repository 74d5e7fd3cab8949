//! Request dispatcher: the public face of the network client.
//!
//! [`NetClient`] owns the offline queue, trust manager, token manager, and
//! diagnostics log, and routes every outgoing request through one pipeline:
//! link check, TLS policy resolution, bearer attachment, dispatch with
//! retry, then queueing or recovery bookkeeping depending on the outcome.
//!
//! The dispatcher is deliberately `&mut self` throughout: one logical task
//! drives it, so there is nothing to lock and every state transition is
//! sequential and observable.

use crate::connectivity::ConnectivitySupervisor;
use crate::diag::DiagnosticsLog;
use crate::queue::{OfflineQueue, QueuedRequest};
use crate::retry::{Operation, RetryPolicy, retry_with_backoff};
use crate::token::TokenManager;
use crate::transport::{TlsPolicy, Transport, WireFailure, WireRequest, WireResponse};
use crate::trust::{TrustManager, TrustMode};
use chrono::{DateTime, Utc};
use gatenode_core::constants::{DEFAULT_QUEUE_CAPACITY, DRAIN_MAX_ITEMS, MAX_QUEUE_RETRIES};
use gatenode_core::{ErrorCode, Fingerprint, HttpMethod, NetError, Result, Severity};
use gatenode_storage::BlobStore;
use tracing::{debug, info, warn};

/// Tuning knobs for a [`NetClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL, e.g. `https://server.local:5000`.
    pub base_url: String,
    /// Rewrite `http://` URLs to `https://` before dispatch.
    pub force_https: bool,
    /// Accept any server certificate. Emulation and lab benches only.
    pub allow_insecure: bool,
    /// Backoff policy for dispatched requests.
    pub retry: RetryPolicy,
    /// Offline queue capacity.
    pub queue_capacity: usize,
    /// Resend attempts per queued entry before it is dropped.
    pub queue_retry_cap: u32,
    /// Queue entries resent per drain cycle.
    pub drain_max_items: usize,
}

impl ClientConfig {
    /// Config with the defaults sized for small access-control nodes.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            force_https: false,
            allow_insecure: false,
            retry: RetryPolicy::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            queue_retry_cap: MAX_QUEUE_RETRIES,
            drain_max_items: DRAIN_MAX_ITEMS,
        }
    }
}

/// One dispatch through the transport, driven by the retry loop.
///
/// Holds only shared borrows so the dispatcher can update its managers once
/// the loop returns. Captures the peer fingerprint seen across attempts,
/// including the one on a rejected handshake.
struct DispatchOp<'a, T: Transport> {
    transport: &'a T,
    method: HttpMethod,
    url: &'a str,
    body: Option<&'a [u8]>,
    bearer: Option<&'a str>,
    tls: TlsPolicy,
    seen: Option<Fingerprint>,
}

impl<T: Transport> Operation for DispatchOp<'_, T> {
    type Output = WireResponse;

    async fn attempt(&mut self) -> Result<WireResponse> {
        let mut request = WireRequest::new(self.method, self.url, self.body);
        request.bearer = self.bearer;
        request.tls = self.tls.clone();

        match self.transport.execute(request).await {
            Ok(response) => {
                if let Some(fp) = &response.peer_fingerprint {
                    self.seen = Some(fp.clone());
                }
                match response.status {
                    200 | 201 | 202 => Ok(response),
                    401 | 403 => Err(NetError::new(
                        ErrorCode::AuthError,
                        format!("HTTP {} from {}", response.status, self.url),
                    )),
                    status => Err(NetError::new(
                        ErrorCode::ServerError,
                        format!("HTTP {status} from {}", self.url),
                    )),
                }
            }
            Err(failure) => {
                if let WireFailure::CertificateRejected { seen: Some(fp), .. } = &failure {
                    self.seen = Some(fp.clone());
                }
                Err(NetError::new(failure.code(), failure.to_string()))
            }
        }
    }
}

/// Whether a successful exchange is evidence that failures of this class
/// have cleared.
fn success_recovers(code: ErrorCode) -> bool {
    code.is_retryable() || code == ErrorCode::AuthError
}

/// Resilient request dispatcher.
///
/// Generic over its transport, blob store, and connectivity supervisor so
/// firmware, gateway hosts, and tests inject their own; see the crate docs
/// for the assembled picture.
#[derive(Debug)]
pub struct NetClient<T, S, C>
where
    T: Transport,
    S: BlobStore,
    C: ConnectivitySupervisor,
{
    transport: T,
    link: C,
    config: ClientConfig,
    queue: OfflineQueue<S>,
    trust: TrustManager<S>,
    token: TokenManager<S>,
    diag: DiagnosticsLog<S>,
    last_activity: Option<DateTime<Utc>>,
}

impl<T, S, C> NetClient<T, S, C>
where
    T: Transport,
    S: BlobStore,
    C: ConnectivitySupervisor,
{
    /// Assemble a client. Each manager gets its own handle to `store`.
    pub fn new(transport: T, link: C, store: S, config: ClientConfig) -> Self {
        let mut trust = TrustManager::new(store.clone());
        if config.allow_insecure {
            trust.set_mode(TrustMode::Insecure);
        }
        Self {
            transport,
            link,
            queue: OfflineQueue::new(store.clone(), config.queue_capacity),
            trust,
            token: TokenManager::new(store.clone()),
            diag: DiagnosticsLog::new(store),
            config,
            last_activity: None,
        }
    }

    /// Restore queue, pinned fingerprint, token, and error history from the
    /// blob store. Call once after construction.
    pub async fn load_state(&mut self) {
        self.queue.load().await;
        self.trust.load().await;
        self.token.load().await;
        self.diag.load().await;
        info!(
            queued = self.queue.len(),
            pinned = self.trust.pinned().is_some(),
            token = self.token.has_valid_token(),
            "state restored"
        );
    }

    /// GET a resource.
    ///
    /// # Errors
    /// See [`send`](Self::send).
    pub async fn send_get(&mut self, url: &str) -> Result<String> {
        self.send(HttpMethod::Get, url, &[], true).await
    }

    /// POST a JSON payload.
    ///
    /// # Errors
    /// See [`send`](Self::send).
    pub async fn send_post(&mut self, url: &str, payload: &[u8], retry: bool) -> Result<String> {
        self.send(HttpMethod::Post, url, payload, retry).await
    }

    /// PUT a JSON payload.
    ///
    /// # Errors
    /// See [`send`](Self::send).
    pub async fn send_put(&mut self, url: &str, payload: &[u8], retry: bool) -> Result<String> {
        self.send(HttpMethod::Put, url, payload, retry).await
    }

    /// DELETE a resource.
    ///
    /// # Errors
    /// See [`send`](Self::send).
    pub async fn send_delete(&mut self, url: &str) -> Result<String> {
        self.send(HttpMethod::Delete, url, &[], true).await
    }

    /// Dispatch one request and return the response body.
    ///
    /// With `retry` the request goes through the backoff loop and, if it
    /// still fails with a transient class, is parked in the offline queue.
    /// Without `retry` a single attempt is made and nothing is queued; the
    /// drain cycle uses this mode so failed entries stay where they are.
    ///
    /// Blocks through backoff delays; see the crate docs.
    ///
    /// # Errors
    ///
    /// Returns the classified failure. `LINK_DOWN` means the request never
    /// left the device (it was queued when `retry` was set); security
    /// failures (`TLS_ERROR`, `CERT_VERIFY_ERROR`) are never retried or
    /// queued.
    pub async fn send(
        &mut self,
        method: HttpMethod,
        url: &str,
        payload: &[u8],
        retry: bool,
    ) -> Result<String> {
        let url = self.effective_url(url);

        if !self.link.is_connected() {
            let err = NetError::link_down();
            self.diag.log(err.clone()).await;
            if retry {
                self.park(QueuedRequest::new(url, method, payload.to_vec(), false))
                    .await;
            }
            self.link.request_reconnect();
            return Err(err);
        }

        let tls = match self.trust.policy_for(url.starts_with("https://")) {
            Ok(tls) => tls,
            Err(err) => {
                self.diag.log(err.clone()).await;
                return Err(err);
            }
        };
        let bearer = self.token.bearer().map(str::to_owned);

        let mut op = DispatchOp {
            transport: &self.transport,
            method,
            url: &url,
            body: method.has_body().then_some(payload),
            bearer: bearer.as_deref(),
            tls,
            seen: None,
        };
        let policy = if retry {
            self.config.retry.clone()
        } else {
            RetryPolicy::no_retry()
        };
        let outcome = retry_with_backoff(&mut op, &policy).await;
        let seen = op.seen;

        match outcome {
            Ok(response) => {
                if let Some(fp) = &seen {
                    self.trust.observe_fingerprint(fp).await;
                }
                self.last_activity = Some(Utc::now());
                if let Some(last) = self.diag.last_error()
                    && !last.recovered
                    && success_recovers(last.code)
                {
                    let code = last.code;
                    self.diag.mark_recovered(code).await;
                }
                debug!(method = %method, url = %url, status = response.status, "delivered");
                Ok(response.body)
            }
            Err(err) => {
                match err.code {
                    ErrorCode::CertVerifyError => {
                        if let Some(fp) = seen {
                            self.trust.note_mismatch(fp);
                        }
                    }
                    ErrorCode::AuthError => self.token.mark_refresh_needed(),
                    _ => {}
                }
                self.diag.log(err.clone()).await;
                if retry && err.code.is_transient() {
                    self.park(QueuedRequest::new(url, method, payload.to_vec(), false))
                        .await;
                }
                Err(err)
            }
        }
    }

    /// Park a request directly in the offline queue without dispatching it.
    ///
    /// `critical` entries are resent ahead of routine ones when the queue
    /// drains.
    pub async fn queue_request(
        &mut self,
        url: &str,
        method: HttpMethod,
        payload: Vec<u8>,
        critical: bool,
    ) {
        let url = self.effective_url(url);
        self.park(QueuedRequest::new(url, method, payload, critical))
            .await;
    }

    /// Resend queued requests, critical entries first.
    ///
    /// At most `drain_max_items` entries are attempted per cycle, each with
    /// a single try. A delivered entry is removed; a failed entry has its
    /// retry count bumped and, once over the cap, is dropped so one
    /// undeliverable request cannot wedge the queue. A failure on an entry
    /// still under the cap ends the cycle, since later entries would most
    /// likely fail the same way.
    ///
    /// Returns the number of entries delivered. A down link delivers zero
    /// and touches nothing.
    pub async fn drain(&mut self) -> usize {
        if self.queue.is_empty() || !self.link.is_connected() {
            return 0;
        }

        self.queue.prioritize().await;
        let mut delivered = 0;

        for _ in 0..self.config.drain_max_items {
            let Some(entry) = self.queue.front().cloned() else {
                break;
            };

            match self
                .send(entry.method, &entry.url, &entry.payload, false)
                .await
            {
                Ok(_) => {
                    self.queue.pop_front().await;
                    delivered += 1;
                }
                Err(err) => {
                    let exhausted = {
                        let Some(front) = self.queue.front_mut() else {
                            break;
                        };
                        front.retries += 1;
                        front.retries > self.config.queue_retry_cap
                    };

                    if exhausted {
                        if let Some(dropped) = self.queue.pop_front().await {
                            let severity = if dropped.critical {
                                Severity::Critical
                            } else {
                                Severity::Warning
                            };
                            self.diag
                                .log(
                                    NetError::new(
                                        err.code,
                                        format!(
                                            "dropped queued request to {} after {} attempts",
                                            dropped.url, dropped.retries
                                        ),
                                    )
                                    .with_severity(severity),
                                )
                                .await;
                        }
                        // A dropped entry frees the slot; keep draining.
                        continue;
                    }

                    self.queue.persist().await;
                    debug!(code = %err.code, "drain cycle stopped on retained entry");
                    break;
                }
            }
        }

        if delivered > 0 {
            info!(delivered, remaining = self.queue.len(), "queue drained");
        }
        delivered
    }

    /// Refresh the bearer token when it is stale or a refresh was flagged.
    ///
    /// Returns whether a refresh was performed.
    ///
    /// # Errors
    ///
    /// Propagates token endpoint failures after logging them.
    pub async fn refresh_token(&mut self) -> Result<bool> {
        let base = self.effective_url(&self.config.base_url);

        match self
            .token
            .refresh_if_needed(&self.transport, &mut self.trust, &base)
            .await
        {
            Ok(refreshed) => {
                if refreshed {
                    self.diag.mark_recovered(ErrorCode::AuthError).await;
                }
                Ok(refreshed)
            }
            Err(err) => {
                self.diag.log(err.clone()).await;
                Err(err)
            }
        }
    }

    /// Whether the client is healthy: link up and no unrecovered critical
    /// failure in the history.
    #[must_use]
    pub fn health_check(&self) -> bool {
        self.link.is_connected() && !self.diag.has_unrecovered_critical()
    }

    /// Status snapshot for the config UI, as a JSON document.
    #[must_use]
    pub fn status_json(&self) -> String {
        serde_json::json!({
            "link": self.link.state().to_string(),
            "healthy": self.health_check(),
            "queued": self.queue.len(),
            "token_valid": self.token.has_valid_token(),
            "pinned_fingerprint": self.trust.pinned().map(Fingerprint::as_str),
            "pending_fingerprint": self.trust.pending_fingerprint().map(Fingerprint::as_str),
            "last_activity": self.last_activity,
            "last_error": self.diag.last_error(),
        })
        .to_string()
    }

    /// Export the newest `limit` error records as JSON, newest first.
    #[must_use]
    pub fn error_log_json(&self, limit: usize) -> String {
        self.diag.export_json(limit)
    }

    /// The configured tuning knobs.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The injected transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The offline queue, for status reporting.
    #[must_use]
    pub fn queue(&self) -> &OfflineQueue<S> {
        &self.queue
    }

    /// The diagnostics log.
    #[must_use]
    pub fn diag(&self) -> &DiagnosticsLog<S> {
        &self.diag
    }

    /// The trust manager, for operator actions (approve, reset, configure).
    pub fn trust_mut(&mut self) -> &mut TrustManager<S> {
        &mut self.trust
    }

    /// The token manager, for configuring node credentials.
    pub fn token_mut(&mut self) -> &mut TokenManager<S> {
        &mut self.token
    }

    /// The connectivity supervisor, for driving link transitions.
    pub fn link_mut(&mut self) -> &mut C {
        &mut self.link
    }

    async fn park(&mut self, request: QueuedRequest) {
        let critical = request.critical;
        debug!(url = %request.url, critical, "request parked in offline queue");
        if let Some(evicted) = self.queue.enqueue(request).await
            && evicted.critical
        {
            self.diag
                .log(
                    NetError::new(
                        ErrorCode::StorageError,
                        format!("critical request to {} evicted from full queue", evicted.url),
                    )
                    .with_severity(Severity::Critical),
                )
                .await;
        } else if self.queue.is_full() {
            warn!(capacity = self.queue.len(), "offline queue at capacity");
        }
    }

    fn effective_url(&self, url: &str) -> String {
        if self.config.force_https
            && let Some(rest) = url.strip_prefix("http://")
        {
            return format!("https://{rest}");
        }
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::StaticLink;
    use gatenode_core::ConnectionState;
    use gatenode_storage::MemoryStore;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedTransport {
        script: Mutex<VecDeque<std::result::Result<WireResponse, WireFailure>>>,
        calls: Mutex<Vec<(HttpMethod, String, Option<String>)>>,
    }

    impl ScriptedTransport {
        fn new() -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn push_ok(&self, status: u16, body: &str) {
            self.script.lock().unwrap().push_back(Ok(WireResponse {
                status,
                body: body.to_string(),
                peer_fingerprint: None,
            }));
        }

        fn push_ok_with_fingerprint(&self, status: u16, body: &str, fp: Fingerprint) {
            self.script.lock().unwrap().push_back(Ok(WireResponse {
                status,
                body: body.to_string(),
                peer_fingerprint: Some(fp),
            }));
        }

        fn push_err(&self, failure: WireFailure) {
            self.script.lock().unwrap().push_back(Err(failure));
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Transport for ScriptedTransport {
        async fn execute(
            &self,
            request: WireRequest<'_>,
        ) -> std::result::Result<WireResponse, WireFailure> {
            self.calls.lock().unwrap().push((
                request.method,
                request.url.to_string(),
                request.bearer.map(str::to_owned),
            ));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted")
        }
    }

    fn client(
        transport: ScriptedTransport,
        link: StaticLink,
    ) -> NetClient<ScriptedTransport, MemoryStore, StaticLink> {
        NetClient::new(
            transport,
            link,
            MemoryStore::new(),
            ClientConfig::new("http://server.local:5000"),
        )
    }

    #[tokio::test]
    async fn test_successful_post_returns_body() {
        let transport = ScriptedTransport::new();
        transport.push_ok(200, r#"{"ok":true}"#);
        let mut client = client(transport, StaticLink::connected());

        let body = client
            .send_post("http://server.local:5000/api/activity", b"{}", true)
            .await
            .unwrap();
        assert_eq!(body, r#"{"ok":true}"#);
        assert!(client.queue().is_empty());
    }

    #[tokio::test]
    async fn test_link_down_queues_and_requests_reconnect() {
        let mut client = client(ScriptedTransport::new(), StaticLink::disconnected());

        let err = client
            .send_post("http://server.local:5000/api/activity", b"{}", true)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::LinkDown);
        assert_eq!(client.queue().len(), 1);
        assert_eq!(client.link_mut().reconnect_requests(), 1);
        assert!(!client.health_check());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retries_then_queues() {
        let transport = ScriptedTransport::new();
        for _ in 0..4 {
            transport.push_err(WireFailure::Timeout("no response".into()));
        }
        let mut client = client(transport, StaticLink::connected());

        let err = client
            .send_post("http://server.local:5000/api/activity", b"{}", true)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TimeoutError);
        // Initial attempt plus three retries, then the request is parked.
        assert_eq!(client.transport.call_count(), 4);
        assert_eq!(client.queue().len(), 1);
        assert_eq!(client.queue().front().unwrap().retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_retried_but_never_queued() {
        let transport = ScriptedTransport::new();
        for _ in 0..4 {
            transport.push_ok(503, "unavailable");
        }
        let mut client = client(transport, StaticLink::connected());

        let err = client
            .send_post("http://server.local:5000/api/activity", b"{}", true)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ServerError);
        assert_eq!(client.transport.call_count(), 4);
        assert!(client.queue().is_empty());
    }

    #[tokio::test]
    async fn test_auth_rejection_flags_refresh_not_queued() {
        let transport = ScriptedTransport::new();
        transport.push_ok(401, "unauthorized");
        let mut client = client(transport, StaticLink::connected());

        let err = client
            .send_post("http://server.local:5000/api/activity", b"{}", true)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthError);
        assert!(client.queue().is_empty());
        assert_eq!(client.diag().last_error().unwrap().code, ErrorCode::AuthError);
    }

    #[tokio::test]
    async fn test_cert_rejection_parks_pending_fingerprint() {
        let imposter = Fingerprint::of_der(b"imposter certificate");
        let transport = ScriptedTransport::new();
        transport.push_err(WireFailure::CertificateRejected {
            message: "certificate fingerprint mismatch".into(),
            seen: Some(imposter.clone()),
        });
        let mut config = ClientConfig::new("https://server.local:5000");
        config.force_https = true;
        let mut client = NetClient::new(
            transport,
            StaticLink::connected(),
            MemoryStore::new(),
            config,
        );

        let err = client
            .send_post("https://server.local:5000/api/activity", b"{}", true)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CertVerifyError);
        // Single attempt: security failures are never retried.
        assert_eq!(client.transport.call_count(), 1);
        assert!(client.queue().is_empty());
        assert_eq!(client.trust_mut().pending_fingerprint(), Some(&imposter));
        assert!(!client.health_check());
    }

    #[tokio::test]
    async fn test_success_marks_previous_failure_recovered() {
        let transport = ScriptedTransport::new();
        transport.push_ok(200, "ok");
        let mut client = client(transport, StaticLink::disconnected());

        let _ = client
            .send_post("http://server.local:5000/api/activity", b"{}", true)
            .await;
        assert!(!client.diag().last_error().unwrap().recovered);

        client.link_mut().set_state(ConnectionState::Connected);
        client.drain().await;
        assert!(client.diag().last_error().unwrap().recovered);
    }

    #[tokio::test]
    async fn test_drain_delivers_critical_first() {
        let transport = ScriptedTransport::new();
        transport.push_ok(200, "ok");
        transport.push_ok(200, "ok");
        transport.push_ok(200, "ok");
        let mut client = client(transport, StaticLink::connected());

        client
            .queue_request("http://s/routine-1", HttpMethod::Post, b"{}".to_vec(), false)
            .await;
        client
            .queue_request("http://s/critical", HttpMethod::Post, b"{}".to_vec(), true)
            .await;
        client
            .queue_request("http://s/routine-2", HttpMethod::Post, b"{}".to_vec(), false)
            .await;

        assert_eq!(client.drain().await, 3);
        let urls: Vec<_> = client
            .transport
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, url, _)| url.clone())
            .collect();
        assert_eq!(
            urls,
            vec!["http://s/critical", "http://s/routine-1", "http://s/routine-2"]
        );
        assert!(client.queue().is_empty());
    }

    #[tokio::test]
    async fn test_drain_partial_failure_bumps_front_only() {
        let transport = ScriptedTransport::new();
        transport.push_err(WireFailure::Timeout("no response".into()));
        let mut client = client(transport, StaticLink::connected());

        for url in ["http://s/1", "http://s/2", "http://s/3"] {
            client
                .queue_request(url, HttpMethod::Post, b"{}".to_vec(), false)
                .await;
        }

        assert_eq!(client.drain().await, 0);
        let retries: Vec<u32> = client.queue().iter().map(|r| r.retries).collect();
        assert_eq!(retries, vec![1, 0, 0]);
        assert_eq!(client.queue().len(), 3);
    }

    #[tokio::test]
    async fn test_drain_drops_entry_over_retry_cap_and_continues() {
        let transport = ScriptedTransport::new();
        transport.push_err(WireFailure::Timeout("still down".into()));
        transport.push_ok(200, "ok");
        let mut config = ClientConfig::new("http://server.local:5000");
        config.queue_retry_cap = 0;
        let mut client = NetClient::new(
            transport,
            StaticLink::connected(),
            MemoryStore::new(),
            config,
        );

        client
            .queue_request("http://s/doomed", HttpMethod::Post, b"{}".to_vec(), false)
            .await;
        client
            .queue_request("http://s/fine", HttpMethod::Post, b"{}".to_vec(), false)
            .await;

        assert_eq!(client.drain().await, 1);
        assert!(client.queue().is_empty());
    }

    #[tokio::test]
    async fn test_drain_respects_per_cycle_cap() {
        let transport = ScriptedTransport::new();
        for _ in 0..DRAIN_MAX_ITEMS {
            transport.push_ok(200, "ok");
        }
        let mut client = client(transport, StaticLink::connected());

        for i in 0..8 {
            client
                .queue_request(
                    &format!("http://s/{i}"),
                    HttpMethod::Post,
                    b"{}".to_vec(),
                    false,
                )
                .await;
        }

        assert_eq!(client.drain().await, DRAIN_MAX_ITEMS);
        assert_eq!(client.queue().len(), 8 - DRAIN_MAX_ITEMS);
    }

    #[tokio::test]
    async fn test_force_https_rewrites_url() {
        let transport = ScriptedTransport::new();
        transport.push_ok(200, "ok");
        let mut config = ClientConfig::new("http://server.local:5000");
        config.force_https = true;
        config.allow_insecure = true;
        let mut client = NetClient::new(
            transport,
            StaticLink::connected(),
            MemoryStore::new(),
            config,
        );

        client
            .send_get("http://server.local:5000/api/status")
            .await
            .unwrap();
        let calls = client.transport.calls.lock().unwrap();
        assert_eq!(calls[0].1, "https://server.local:5000/api/status");
    }

    #[tokio::test]
    async fn test_fail_closed_without_trust_source() {
        let transport = ScriptedTransport::new();
        let mut client = client(transport, StaticLink::connected());
        client.trust_mut().set_tofu(false);

        let err = client
            .send_post("https://server.local:5000/api/activity", b"{}", true)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TlsError);
        // Never dispatched, never queued.
        assert_eq!(client.transport.call_count(), 0);
        assert!(client.queue().is_empty());
    }

    #[tokio::test]
    async fn test_status_json_shape() {
        let transport = ScriptedTransport::new();
        let mut client = client(transport, StaticLink::connected());
        client
            .queue_request("http://s/1", HttpMethod::Post, b"{}".to_vec(), true)
            .await;

        let status: serde_json::Value =
            serde_json::from_str(&client.status_json()).unwrap();
        assert_eq!(status["link"], "connected");
        assert_eq!(status["queued"], 1);
        assert_eq!(status["healthy"], true);
        assert_eq!(status["token_valid"], false);
        assert!(status["pinned_fingerprint"].is_null());
    }

    #[tokio::test]
    async fn test_bearer_attached_when_token_present() {
        let transport = ScriptedTransport::new();
        transport.push_ok(200, r#"{"access_token":"tok-9","expires_in":86400}"#);
        transport.push_ok(200, "ok");
        let mut client = client(transport, StaticLink::connected());
        client
            .token_mut()
            .set_identity(gatenode_core::NodeIdentity::new("node-7", "hunter2"));

        assert!(client.refresh_token().await.unwrap());
        client
            .send_post("http://server.local:5000/api/activity", b"{}", true)
            .await
            .unwrap();

        let calls = client.transport.calls.lock().unwrap();
        // Token request itself carries no bearer; the data request does.
        assert_eq!(calls[0].2, None);
        assert_eq!(calls[1].2.as_deref(), Some("tok-9"));
    }

    #[tokio::test]
    async fn test_token_refresh_pins_first_fingerprint() {
        let fp = Fingerprint::parse(&"ef".repeat(32)).unwrap();
        let transport = ScriptedTransport::new();
        transport.push_ok_with_fingerprint(
            200,
            r#"{"access_token":"tok-tls","expires_in":86400}"#,
            fp.clone(),
        );
        let mut client = NetClient::new(
            transport,
            StaticLink::connected(),
            MemoryStore::new(),
            ClientConfig::new("https://server.local:5000"),
        );
        client
            .token_mut()
            .set_identity(gatenode_core::NodeIdentity::new("node-7", "hunter2"));

        assert!(client.refresh_token().await.unwrap());

        // The auth exchange was the first TLS contact, so its certificate
        // became the pin.
        assert_eq!(client.trust_mut().pinned(), Some(&fp));
        assert!(client.token_mut().has_valid_token());
    }
}
