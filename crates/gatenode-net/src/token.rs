//! Bearer token lifecycle: request, persist, proactively refresh.
//!
//! The node authenticates with a long-lived bearer token obtained from the
//! server's token endpoint using its node id and shared secret. The token is
//! persisted so a reboot does not re-authenticate, and it is refreshed
//! proactively once less than the expiry margin remains, instead of waiting
//! for a mid-flight 401.

use crate::transport::{Transport, WireFailure, WireRequest};
use crate::trust::TrustManager;
use chrono::{DateTime, TimeDelta, Utc};
use gatenode_core::constants::{
    AUTH_TOKEN_PATH, BLOB_API_TOKEN, DEFAULT_TOKEN_LIFETIME_SECS, TOKEN_EXPIRY_MARGIN_SECS,
};
use gatenode_core::{ErrorCode, HttpMethod, NetError, NodeIdentity, Result};
use gatenode_storage::BlobStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A bearer token with its expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    /// Opaque token value presented as `Authorization: Bearer <token>`.
    pub token: String,
    /// Expiry instant reported by (or assumed for) the server.
    pub expiry: DateTime<Utc>,
    /// Node the token was issued to.
    pub node_id: String,
}

impl AuthToken {
    /// Whether the token is still usable at all.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.expiry > now
    }

    /// Whether the token has at least `margin` of lifetime left.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: TimeDelta) -> bool {
        self.expiry - now > margin
    }
}

/// Shape of the token endpoint response.
///
/// Servers differ on the field name; both `access_token` and `token` are
/// accepted.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token: Option<String>,
    expires_in: Option<i64>,
}

/// Owns the bearer token and its durable copy.
#[derive(Debug)]
pub struct TokenManager<S: BlobStore> {
    token: Option<AuthToken>,
    identity: Option<NodeIdentity>,
    margin: TimeDelta,
    refresh_requested: bool,
    store: S,
}

impl<S: BlobStore> TokenManager<S> {
    /// Create a token manager with no credentials configured.
    pub fn new(store: S) -> Self {
        Self {
            token: None,
            identity: None,
            margin: TimeDelta::seconds(TOKEN_EXPIRY_MARGIN_SECS),
            refresh_requested: false,
            store,
        }
    }

    /// Configure the node credentials used to request tokens.
    pub fn set_identity(&mut self, identity: NodeIdentity) {
        self.identity = Some(identity);
    }

    /// Whether a token exists with more than the expiry margin remaining.
    #[must_use]
    pub fn has_valid_token(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| t.is_fresh(Utc::now(), self.margin))
    }

    /// Token value to attach to outgoing requests.
    ///
    /// A token inside the expiry margin is still attached; only a token past
    /// its expiry is withheld.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.token
            .as_ref()
            .filter(|t| t.is_usable(Utc::now()))
            .map(|t| t.token.as_str())
    }

    /// Force a refresh on the next [`refresh_if_needed`](Self::refresh_if_needed).
    ///
    /// Called by the dispatcher after a 401/403 so the next cycle
    /// re-authenticates instead of replaying a revoked token.
    pub fn mark_refresh_needed(&mut self) {
        self.refresh_requested = true;
    }

    fn refresh_needed(&self) -> bool {
        self.refresh_requested || !self.has_valid_token()
    }

    /// Restore the persisted token.
    ///
    /// An expired or corrupt blob is discarded.
    pub async fn load(&mut self) {
        match self.store.read(BLOB_API_TOKEN).await {
            Ok(Some(raw)) => match serde_json::from_slice::<AuthToken>(&raw) {
                Ok(token) if token.is_usable(Utc::now()) => {
                    debug!(node_id = %token.node_id, expiry = %token.expiry, "restored token");
                    self.token = Some(token);
                }
                Ok(_) => {
                    debug!("persisted token expired, discarding");
                    let _ = self.store.remove(BLOB_API_TOKEN).await;
                }
                Err(e) => {
                    warn!(error = %e, "discarding corrupt token blob");
                    let _ = self.store.remove(BLOB_API_TOKEN).await;
                }
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "token blob unreadable"),
        }
    }

    /// Request a new token from the server's token endpoint.
    ///
    /// The exchange goes through `trust` like any other: the TLS policy is
    /// resolved from it, the observed peer fingerprint feeds trust-on-first-
    /// use pinning (the auth request is often the node's first TLS contact),
    /// and a rejected certificate is parked for operator review.
    ///
    /// On success the token replaces the current one and is persisted
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` when no credentials are configured, the server
    /// rejects them, or the response carries no token; `TlsError` when no
    /// trust source resolves; transport failures and other non-2xx statuses
    /// map to their usual codes.
    pub async fn request_token<T: Transport>(
        &mut self,
        transport: &T,
        trust: &mut TrustManager<S>,
        base_url: &str,
    ) -> Result<()> {
        let Some(identity) = &self.identity else {
            return Err(NetError::new(
                ErrorCode::AuthError,
                "no node credentials configured",
            ));
        };

        let url = format!("{}{}", base_url.trim_end_matches('/'), AUTH_TOKEN_PATH);
        let body = serde_json::to_vec(&serde_json::json!({
            "node_id": identity.node_id,
            "secret": identity.secret,
            "device_info": { "firmware": gatenode_core::VERSION },
        }))
        .map_err(|e| NetError::new(ErrorCode::JsonError, e.to_string()))?;

        let mut request = WireRequest::new(HttpMethod::Post, &url, Some(&body));
        request.tls = trust.policy_for(url.starts_with("https://"))?;

        debug!(url = %url, node_id = %identity.node_id, "requesting token");
        let response = match transport.execute(request).await {
            Ok(response) => response,
            Err(failure) => {
                if let WireFailure::CertificateRejected { seen: Some(fp), .. } = &failure {
                    trust.note_mismatch(fp.clone());
                }
                return Err(NetError::new(failure.code(), failure.to_string()));
            }
        };
        // The handshake completed; capture the fingerprint regardless of
        // the HTTP status.
        if let Some(fp) = &response.peer_fingerprint {
            trust.observe_fingerprint(fp).await;
        }

        match response.status {
            200 | 201 | 202 => {}
            401 | 403 => {
                return Err(NetError::new(
                    ErrorCode::AuthError,
                    format!("credentials rejected: HTTP {}", response.status),
                ));
            }
            status => {
                return Err(NetError::new(
                    ErrorCode::ServerError,
                    format!("token endpoint returned HTTP {status}"),
                ));
            }
        }

        let parsed: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|e| NetError::new(ErrorCode::JsonError, format!("token response: {e}")))?;
        let Some(value) = parsed.access_token.or(parsed.token) else {
            return Err(NetError::new(
                ErrorCode::AuthError,
                "token response carried no token",
            ));
        };

        let lifetime = parsed.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let token = AuthToken {
            token: value,
            expiry: Utc::now() + TimeDelta::seconds(lifetime),
            node_id: identity.node_id.clone(),
        };
        info!(node_id = %token.node_id, expiry = %token.expiry, "token issued");

        self.persist(&token).await;
        self.token = Some(token);
        self.refresh_requested = false;
        Ok(())
    }

    /// Refresh the token when it is missing, inside the expiry margin, or a
    /// refresh was requested. Returns whether a refresh was performed.
    ///
    /// Without configured credentials this is a no-op: anonymous nodes keep
    /// working against open servers.
    ///
    /// # Errors
    ///
    /// Propagates [`request_token`](Self::request_token) failures.
    pub async fn refresh_if_needed<T: Transport>(
        &mut self,
        transport: &T,
        trust: &mut TrustManager<S>,
        base_url: &str,
    ) -> Result<bool> {
        if self.identity.is_none() || !self.refresh_needed() {
            return Ok(false);
        }
        self.request_token(transport, trust, base_url).await?;
        Ok(true)
    }

    async fn persist(&self, token: &AuthToken) {
        match serde_json::to_vec(token) {
            Ok(raw) => {
                if let Err(e) = self.store.write(BLOB_API_TOKEN, &raw).await {
                    // Token survives in memory; re-requested after reboot.
                    warn!(error = %e, "failed to persist token");
                }
            }
            Err(e) => warn!(error = %e, "token serialization failed"),
        }
    }
}
