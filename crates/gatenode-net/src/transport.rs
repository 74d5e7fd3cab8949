//! Transport provider: the injected capability that performs one HTTP
//! exchange.
//!
//! The dispatcher never talks to the network directly; it hands a
//! [`WireRequest`] to a [`Transport`] and classifies the outcome. The
//! production implementation, [`HttpTransport`], drives reqwest over rustls
//! and realizes fingerprint pinning with a custom certificate verifier that
//! hashes the presented leaf certificate. Tests substitute a scripted
//! transport.
//!
//! # TLS policy
//!
//! The trust manager resolves each request to exactly one [`TlsPolicy`]:
//!
//! | Policy | Verification |
//! |--------|--------------|
//! | `PlainHttp` | none (cleartext) |
//! | `CaCert` | chain validation against the configured root |
//! | `Pinned` | SHA-256 fingerprint of the leaf must match |
//! | `TrustOnFirstUse` | any certificate accepted, fingerprint reported back |
//! | `Insecure` | any certificate accepted |
//!
//! The transport reports the observed peer fingerprint back in
//! [`WireResponse`] (and in the `CertificateRejected` failure) so the trust
//! manager can pin on first use and record mismatches for operator review.

#![allow(async_fn_in_trait)]

use gatenode_core::constants::{CONNECT_TIMEOUT_MS, RESPONSE_TIMEOUT_MS};
use gatenode_core::{ErrorCode, Fingerprint, HttpMethod};
use rustls::DigitallySignedStruct;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Trust configuration for a single exchange.
#[derive(Debug, Clone)]
pub enum TlsPolicy {
    /// Cleartext HTTP; no TLS involved.
    PlainHttp,
    /// Validate the chain against this PEM-encoded CA certificate.
    CaCert(String),
    /// Require the leaf certificate to match this fingerprint exactly.
    Pinned(Fingerprint),
    /// Accept any certificate without reporting (explicitly allowed only).
    Insecure,
    /// First contact: accept any certificate and report its fingerprint.
    TrustOnFirstUse,
}

/// One logical HTTP request handed to the transport.
#[derive(Debug)]
pub struct WireRequest<'a> {
    /// HTTP verb.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: &'a str,
    /// JSON body, absent for GET.
    pub body: Option<&'a [u8]>,
    /// Bearer token to attach, when one is valid.
    pub bearer: Option<&'a str>,
    /// Trust configuration resolved by the trust manager.
    pub tls: TlsPolicy,
    /// Connection phase timeout.
    pub connect_timeout: Duration,
    /// Whole-exchange timeout.
    pub response_timeout: Duration,
}

impl<'a> WireRequest<'a> {
    /// Build a request with the default timeouts.
    #[must_use]
    pub fn new(method: HttpMethod, url: &'a str, body: Option<&'a [u8]>) -> Self {
        Self {
            method,
            url,
            body,
            bearer: None,
            tls: TlsPolicy::PlainHttp,
            connect_timeout: Duration::from_millis(CONNECT_TIMEOUT_MS),
            response_timeout: Duration::from_millis(RESPONSE_TIMEOUT_MS),
        }
    }
}

/// Outcome of an exchange that produced an HTTP response.
#[derive(Debug, Clone)]
pub struct WireResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
    /// Fingerprint of the peer certificate, when the policy observed one.
    pub peer_fingerprint: Option<Fingerprint>,
}

/// Transport-level failure: no usable HTTP response was produced.
#[derive(Debug, Error)]
pub enum WireFailure {
    /// The exchange exceeded a timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Hostname resolution failed.
    #[error("DNS resolution failed: {0}")]
    Dns(String),

    /// Peer closed the connection mid-exchange.
    #[error("connection reset: {0}")]
    ConnectionReset(String),

    /// The presented certificate failed fingerprint verification.
    #[error("certificate rejected: {message}")]
    CertificateRejected {
        message: String,
        /// Fingerprint the peer actually presented, for operator review.
        seen: Option<Fingerprint>,
    },

    /// TLS setup or handshake failure unrelated to pinning.
    #[error("TLS failure: {0}")]
    Tls(String),

    /// Any other failure without a response.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl WireFailure {
    /// Map onto the client error taxonomy.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            WireFailure::Timeout(_) => ErrorCode::TimeoutError,
            WireFailure::Dns(_) => ErrorCode::DnsError,
            WireFailure::ConnectionReset(_) => ErrorCode::ConnectionReset,
            WireFailure::CertificateRejected { .. } => ErrorCode::CertVerifyError,
            WireFailure::Tls(_) => ErrorCode::TlsError,
            WireFailure::Transport(_) => ErrorCode::HttpError,
        }
    }
}

/// Capability that performs one HTTP exchange.
///
/// **NOTE**: not object-safe (Edition 2024 RPITIT); use generic type
/// parameters, as [`NetClient`](crate::NetClient) does.
pub trait Transport: Send + Sync {
    /// Perform the exchange and return the response or a classified failure.
    ///
    /// # Errors
    ///
    /// Returns a [`WireFailure`] when no usable HTTP response was produced;
    /// non-2xx statuses are NOT failures at this layer.
    async fn execute(&self, request: WireRequest<'_>) -> Result<WireResponse, WireFailure>;
}

/// Certificate verifier that pins by SHA-256 fingerprint.
///
/// Records the fingerprint of every leaf certificate it sees so the trust
/// manager can pin on first use. With an expected fingerprint configured, a
/// mismatch fails the handshake; chain and hostname validation are
/// deliberately skipped, the pin is the trust decision.
#[derive(Debug)]
struct FingerprintVerifier {
    expected: Option<Fingerprint>,
    seen: Mutex<Option<Fingerprint>>,
    provider: Arc<CryptoProvider>,
}

impl FingerprintVerifier {
    fn new(expected: Option<Fingerprint>, provider: Arc<CryptoProvider>) -> Self {
        Self {
            expected,
            seen: Mutex::new(None),
            provider,
        }
    }

    fn seen_fingerprint(&self) -> Option<Fingerprint> {
        self.seen.lock().expect("verifier lock poisoned").clone()
    }
}

impl ServerCertVerifier for FingerprintVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let observed = Fingerprint::of_der(end_entity.as_ref());
        trace!(fingerprint = %observed, "peer certificate observed");
        *self.seen.lock().expect("verifier lock poisoned") = Some(observed.clone());

        if let Some(expected) = &self.expected
            && observed != *expected
        {
            warn!(
                expected = %expected,
                observed = %observed,
                "certificate fingerprint mismatch"
            );
            return Err(rustls::Error::General(
                "certificate fingerprint mismatch".to_string(),
            ));
        }

        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Production transport over reqwest + rustls.
///
/// Clients are built per exchange because the TLS policy can change between
/// exchanges (TOFU promotes to pinned after the first contact). Exchange
/// rates on these nodes are a few requests per minute, so builder cost is
/// irrelevant next to the radio.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport;

impl HttpTransport {
    /// Create the transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn crypto_provider() -> Arc<CryptoProvider> {
        Arc::new(rustls::crypto::ring::default_provider())
    }

    fn pinning_tls_config(
        expected: Option<Fingerprint>,
    ) -> (rustls::ClientConfig, Arc<FingerprintVerifier>) {
        let provider = Self::crypto_provider();
        let verifier = Arc::new(FingerprintVerifier::new(expected, provider.clone()));
        let config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .expect("ring provider supports default protocol versions")
            .dangerous()
            .with_custom_certificate_verifier(verifier.clone())
            .with_no_client_auth();
        (config, verifier)
    }

    fn build_client(
        request: &WireRequest<'_>,
    ) -> Result<(reqwest::Client, Option<Arc<FingerprintVerifier>>), WireFailure> {
        let builder = reqwest::Client::builder()
            .connect_timeout(request.connect_timeout)
            .timeout(request.response_timeout);

        let (builder, verifier) = match &request.tls {
            TlsPolicy::PlainHttp => (builder, None),
            TlsPolicy::CaCert(pem) => {
                let cert = reqwest::Certificate::from_pem(pem.as_bytes())
                    .map_err(|e| WireFailure::Tls(format!("invalid CA certificate: {e}")))?;
                (
                    builder
                        .use_rustls_tls()
                        .tls_built_in_root_certs(false)
                        .add_root_certificate(cert),
                    None,
                )
            }
            TlsPolicy::Pinned(fp) => {
                let (config, verifier) = Self::pinning_tls_config(Some(fp.clone()));
                (builder.use_preconfigured_tls(config), Some(verifier))
            }
            TlsPolicy::TrustOnFirstUse => {
                let (config, verifier) = Self::pinning_tls_config(None);
                (builder.use_preconfigured_tls(config), Some(verifier))
            }
            TlsPolicy::Insecure => (
                builder.use_rustls_tls().danger_accept_invalid_certs(true),
                None,
            ),
        };

        let client = builder
            .build()
            .map_err(|e| WireFailure::Transport(format!("client build failed: {e}")))?;
        Ok((client, verifier))
    }

    fn classify(
        error: reqwest::Error,
        verifier: Option<&Arc<FingerprintVerifier>>,
    ) -> WireFailure {
        if error.is_timeout() {
            return WireFailure::Timeout(error.to_string());
        }

        // The interesting cause is usually buried in the source chain
        // (hyper -> rustls / io), so collect the whole chain for matching.
        let mut detail = error.to_string();
        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            detail.push_str(": ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }
        let lowered = detail.to_ascii_lowercase();

        if lowered.contains("fingerprint mismatch") {
            return WireFailure::CertificateRejected {
                message: detail,
                seen: verifier.and_then(|v| v.seen_fingerprint()),
            };
        }
        if lowered.contains("dns") || lowered.contains("failed to lookup") {
            return WireFailure::Dns(detail);
        }
        if lowered.contains("reset") || lowered.contains("broken pipe") {
            return WireFailure::ConnectionReset(detail);
        }
        if lowered.contains("certificate") || lowered.contains("handshake") || lowered.contains("tls")
        {
            return WireFailure::Tls(detail);
        }
        WireFailure::Transport(detail)
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, request: WireRequest<'_>) -> Result<WireResponse, WireFailure> {
        let (client, verifier) = Self::build_client(&request)?;

        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        };

        let mut builder = client.request(method, request.url);
        if let Some(body) = request.body {
            builder = builder
                .header("Content-Type", "application/json")
                .body(body.to_vec());
        }
        if let Some(token) = request.bearer {
            builder = builder.bearer_auth(token);
        }

        debug!(method = %request.method, url = request.url, "executing exchange");
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Err(Self::classify(e, verifier.as_ref())),
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Err(Self::classify(e, verifier.as_ref())),
        };
        trace!(status, bytes = body.len(), "exchange completed");

        Ok(WireResponse {
            status,
            body,
            peer_fingerprint: verifier.as_ref().and_then(|v| v.seen_fingerprint()),
        })
    }
}
