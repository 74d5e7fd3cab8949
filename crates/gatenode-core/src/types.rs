use crate::error::{ErrorCode, NetError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

/// HTTP verb supported by the dispatcher.
///
/// The client is not a general-purpose HTTP library: exactly these verbs,
/// JSON bodies, and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Wire representation of the verb.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Whether this verb carries a request body.
    #[must_use]
    pub fn has_body(self) -> bool {
        !matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            other => Err(NetError::new(
                ErrorCode::JsonError,
                format!("unsupported HTTP method: {other}"),
            )),
        }
    }
}

/// Link state as reported by the connectivity supervisor.
///
/// The core only reads this state; transitions are driven by whatever owns
/// the radio (or the OS network stack on gateway hosts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No association with an access point.
    Disconnected,
    /// Association in progress.
    Connecting,
    /// Link up; requests may be dispatched.
    Connected,
    /// Node fell back to its own configuration access point.
    AccessPointFallback,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::AccessPointFallback => "ap_fallback",
        };
        write!(f, "{name}")
    }
}

/// SHA-256 fingerprint of a DER-encoded certificate.
///
/// Stored and displayed as uppercase colon-separated hex
/// (`AB:12:...`, 32 byte pairs).
///
/// # Security
/// Comparison is constant-time to avoid leaking how many leading bytes of a
/// presented fingerprint matched the pinned one.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parse a fingerprint from its hex form.
    ///
    /// Accepts upper/lower case and optional colon separators; normalizes to
    /// the canonical colon-separated uppercase form.
    ///
    /// # Errors
    /// Returns `ErrorCode::CertVerifyError` if the input is not exactly 32
    /// hex byte pairs.
    pub fn parse(s: &str) -> Result<Self> {
        let hex: String = s
            .chars()
            .filter(|c| *c != ':')
            .collect::<String>()
            .to_ascii_uppercase();

        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(NetError::new(
                ErrorCode::CertVerifyError,
                format!("malformed certificate fingerprint: {s:?}"),
            ));
        }

        let pairs: Vec<String> = hex
            .as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).into_owned())
            .collect();

        Ok(Fingerprint(pairs.join(":")))
    }

    /// Compute the fingerprint of a DER-encoded certificate.
    #[must_use]
    pub fn of_der(der: &[u8]) -> Self {
        let digest = Sha256::digest(der);
        let pairs: Vec<String> = digest.iter().map(|b| format!("{b:02X}")).collect();
        Fingerprint(pairs.join(":"))
    }

    /// Get the canonical hex form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Fingerprint {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        Fingerprint::parse(s)
    }
}

/// Constant-time comparison implementation for Fingerprint
impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::hash::Hash for Fingerprint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Node identity used for token authentication.
///
/// The secret never appears in `Debug` output or status JSON.
#[derive(Clone, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Stable node identifier known to the server.
    pub node_id: String,
    /// Shared secret presented during token requests.
    pub secret: String,
}

impl NodeIdentity {
    /// Create a node identity.
    pub fn new(node_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("node_id", &self.node_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}
