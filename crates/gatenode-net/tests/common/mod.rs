//! Common test utilities for network client integration tests.
//!
//! Provides a scripted [`Transport`] so tests can drive the full client
//! pipeline (dispatch, retry, queue, trust, token) without a server, plus
//! small builders for the usual client wiring.

use gatenode_core::{Fingerprint, HttpMethod};
use gatenode_net::{
    ClientConfig, NetClient, StaticLink, Transport, WireFailure, WireRequest, WireResponse,
};
use gatenode_storage::MemoryStore;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One exchange recorded by the mock transport.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: HttpMethod,
    pub url: String,
    pub bearer: Option<String>,
}

/// Transport that replays a script of outcomes and records every call.
///
/// Each exchange pops the next outcome; running past the script panics,
/// which catches tests that dispatch more than they meant to.
pub struct MockTransport {
    script: Mutex<VecDeque<Result<WireResponse, WireFailure>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Script a successful response.
    pub fn push_response(&self, status: u16, body: &str) {
        self.push_response_with_fingerprint(status, body, None);
    }

    /// Script a successful response that presented a certificate.
    pub fn push_response_with_fingerprint(
        &self,
        status: u16,
        body: &str,
        fingerprint: Option<Fingerprint>,
    ) {
        self.script.lock().unwrap().push_back(Ok(WireResponse {
            status,
            body: body.to_string(),
            peer_fingerprint: fingerprint,
        }));
    }

    /// Script a transport failure.
    pub fn push_failure(&self, failure: WireFailure) {
        self.script.lock().unwrap().push_back(Err(failure));
    }

    /// Script `n` timeouts in a row.
    pub fn push_timeouts(&self, n: usize) {
        for _ in 0..n {
            self.push_failure(WireFailure::Timeout("no response within 5000ms".into()));
        }
    }

    /// Everything dispatched so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// URLs dispatched so far, in order.
    pub fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }
}

impl Transport for MockTransport {
    async fn execute(&self, request: WireRequest<'_>) -> Result<WireResponse, WireFailure> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method,
            url: request.url.to_string(),
            bearer: request.bearer.map(str::to_owned),
        });
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("mock transport script exhausted")
    }
}

/// Standard test server base URL.
pub const SERVER_URL: &str = "http://server.local:5000";

/// Assemble a client over a fresh mock transport and the given store/link.
pub fn build_client(
    link: StaticLink,
    store: MemoryStore,
) -> NetClient<MockTransport, MemoryStore, StaticLink> {
    NetClient::new(
        MockTransport::new(),
        link,
        store,
        ClientConfig::new(SERVER_URL),
    )
}

/// Fingerprint standing in for the real server certificate.
pub fn server_fingerprint() -> Fingerprint {
    Fingerprint::of_der(b"integration test server certificate")
}
