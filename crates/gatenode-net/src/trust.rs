//! Certificate trust: CA validation, fingerprint pinning, trust-on-first-use.
//!
//! The trust manager resolves every HTTPS request to a single
//! [`TlsPolicy`] and owns the pinned fingerprint across reboots. Resolution
//! is fail-closed: with no trust source configured and TOFU disabled, secure
//! URLs are refused rather than silently downgraded.
//!
//! # Trust-on-first-use
//!
//! Fresh nodes have no fingerprint to pin. With TOFU enabled the first
//! successful TLS exchange records the peer's fingerprint as the pin; every
//! later exchange must present the same certificate. A changed certificate
//! is refused and parked as a pending mismatch that an operator can approve
//! within a bounded window (server certificate rotations are expected, but
//! only a human decides they were legitimate).

use crate::transport::TlsPolicy;
use chrono::{DateTime, TimeDelta, Utc};
use gatenode_core::constants::{BLOB_CERT_FINGERPRINT, CERT_APPROVAL_WINDOW_SECS};
use gatenode_core::{ErrorCode, Fingerprint, NetError, Result};
use gatenode_storage::BlobStore;
use tracing::{debug, info, warn};

/// Configured trust source, in descending precedence.
#[derive(Debug, Clone)]
pub enum TrustMode {
    /// Pin to this exact certificate fingerprint.
    Fingerprint(Fingerprint),
    /// Validate chains against this PEM-encoded CA certificate.
    CaCert(String),
    /// Accept any certificate. Emulation and lab benches only.
    Insecure,
}

#[derive(Debug, Clone)]
struct PendingMismatch {
    seen: Fingerprint,
    deadline: DateTime<Utc>,
}

/// Owns the trust configuration and the durable pinned fingerprint.
#[derive(Debug)]
pub struct TrustManager<S: BlobStore> {
    mode: Option<TrustMode>,
    pending: Option<PendingMismatch>,
    tofu_enabled: bool,
    approval_window: TimeDelta,
    store: S,
}

impl<S: BlobStore> TrustManager<S> {
    /// Create a trust manager with no configured source and TOFU enabled.
    pub fn new(store: S) -> Self {
        Self {
            mode: None,
            pending: None,
            tofu_enabled: true,
            approval_window: TimeDelta::seconds(CERT_APPROVAL_WINDOW_SECS),
            store,
        }
    }

    /// Set the configured trust source, replacing any learned pin.
    pub fn set_mode(&mut self, mode: TrustMode) {
        self.mode = Some(mode);
        self.pending = None;
    }

    /// Enable or disable trust-on-first-use pinning.
    pub fn set_tofu(&mut self, enabled: bool) {
        self.tofu_enabled = enabled;
    }

    /// The currently pinned fingerprint, if any.
    #[must_use]
    pub fn pinned(&self) -> Option<&Fingerprint> {
        match &self.mode {
            Some(TrustMode::Fingerprint(fp)) => Some(fp),
            _ => None,
        }
    }

    /// Fingerprint of the certificate awaiting operator approval, if any.
    #[must_use]
    pub fn pending_fingerprint(&self) -> Option<&Fingerprint> {
        self.pending.as_ref().map(|p| &p.seen)
    }

    /// Restore the pinned fingerprint from the blob store.
    ///
    /// A configured `CaCert` or `Insecure` mode takes precedence over a
    /// previously learned pin and is left untouched. A corrupt blob is
    /// discarded; the node then re-pins on the next contact.
    pub async fn load(&mut self) {
        if self.mode.is_some() {
            return;
        }
        match self.store.read(BLOB_CERT_FINGERPRINT).await {
            Ok(Some(raw)) => match Fingerprint::parse(&String::from_utf8_lossy(&raw)) {
                Ok(fp) => {
                    debug!(fingerprint = %fp, "restored pinned fingerprint");
                    self.mode = Some(TrustMode::Fingerprint(fp));
                }
                Err(e) => {
                    warn!(error = %e, "discarding corrupt fingerprint blob");
                    let _ = self.store.remove(BLOB_CERT_FINGERPRINT).await;
                }
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "fingerprint blob unreadable"),
        }
    }

    /// Resolve the TLS policy for one request.
    ///
    /// # Errors
    ///
    /// Returns `TlsError` for a secure URL when no trust source is
    /// configured and TOFU is disabled.
    pub fn policy_for(&self, https: bool) -> Result<TlsPolicy> {
        if !https {
            return Ok(TlsPolicy::PlainHttp);
        }
        match &self.mode {
            Some(TrustMode::Fingerprint(fp)) => Ok(TlsPolicy::Pinned(fp.clone())),
            Some(TrustMode::CaCert(pem)) => Ok(TlsPolicy::CaCert(pem.clone())),
            Some(TrustMode::Insecure) => Ok(TlsPolicy::Insecure),
            None if self.tofu_enabled => Ok(TlsPolicy::TrustOnFirstUse),
            None => Err(NetError::new(
                ErrorCode::TlsError,
                "no trust source configured for secure connection",
            )),
        }
    }

    /// Record the fingerprint observed on a successful exchange.
    ///
    /// Pins it (and persists the pin) when no trust source is configured yet
    /// and TOFU is enabled. A successful exchange also clears any pending
    /// mismatch for the same fingerprint.
    pub async fn observe_fingerprint(&mut self, seen: &Fingerprint) {
        if let Some(pending) = &self.pending
            && pending.seen == *seen
        {
            self.pending = None;
        }
        if self.mode.is_none() && self.tofu_enabled {
            info!(fingerprint = %seen, "pinning server certificate on first use");
            self.mode = Some(TrustMode::Fingerprint(seen.clone()));
            self.persist_pin().await;
        }
    }

    /// Whether `seen` matches the pinned fingerprint.
    ///
    /// Always `false` when nothing is pinned.
    #[must_use]
    pub fn verify_fingerprint(&self, seen: &Fingerprint) -> bool {
        self.pinned().is_some_and(|pinned| pinned == seen)
    }

    /// Park a rejected certificate for operator review.
    ///
    /// Starts (or restarts) the approval window. The connection stays
    /// refused until [`approve_pending`](Self::approve_pending) is called.
    pub fn note_mismatch(&mut self, seen: Fingerprint) {
        let deadline = Utc::now() + self.approval_window;
        warn!(
            fingerprint = %seen,
            deadline = %deadline,
            "certificate mismatch parked for approval"
        );
        self.pending = Some(PendingMismatch { seen, deadline });
    }

    /// Adopt the pending mismatched certificate as the new pin.
    ///
    /// # Errors
    ///
    /// Returns `CertVerifyError` when nothing is pending or the approval
    /// window has expired (the expired entry is discarded).
    pub async fn approve_pending(&mut self) -> Result<Fingerprint> {
        self.approve_pending_at(Utc::now()).await
    }

    async fn approve_pending_at(&mut self, now: DateTime<Utc>) -> Result<Fingerprint> {
        let Some(pending) = self.pending.take() else {
            return Err(NetError::new(
                ErrorCode::CertVerifyError,
                "no certificate mismatch pending approval",
            ));
        };
        if now > pending.deadline {
            return Err(NetError::new(
                ErrorCode::CertVerifyError,
                "certificate approval window expired",
            ));
        }
        info!(fingerprint = %pending.seen, "operator approved new certificate");
        self.mode = Some(TrustMode::Fingerprint(pending.seen.clone()));
        self.persist_pin().await;
        Ok(pending.seen)
    }

    /// Forget the pinned fingerprint and any pending mismatch.
    ///
    /// The next contact re-pins via TOFU (when enabled).
    pub async fn reset(&mut self) {
        if matches!(self.mode, Some(TrustMode::Fingerprint(_))) {
            self.mode = None;
        }
        self.pending = None;
        if let Err(e) = self.store.remove(BLOB_CERT_FINGERPRINT).await {
            warn!(error = %e, "failed to clear persisted fingerprint");
        }
    }

    async fn persist_pin(&self) {
        let Some(fp) = self.pinned() else { return };
        if let Err(e) = self
            .store
            .write(BLOB_CERT_FINGERPRINT, fp.as_str().as_bytes())
            .await
        {
            // Pin survives in memory for this boot; re-pinned next boot.
            warn!(error = %e, "failed to persist pinned fingerprint");
        }
    }
}
