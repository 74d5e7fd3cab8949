//! Host configuration loaded from a JSON file.

use anyhow::Context;
use gatenode_core::constants::REPORT_INTERVAL_SECS;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Node configuration, one JSON document on disk.
///
/// Only `server_url` is required; everything else has a working default so
/// a bench setup is two lines of JSON.
#[derive(Debug, Deserialize)]
pub struct NodeConfig {
    /// Server base URL, e.g. `https://server.local:5000`.
    pub server_url: String,
    /// Node identifier for token authentication.
    #[serde(default)]
    pub node_id: Option<String>,
    /// Shared secret for token authentication.
    #[serde(default)]
    pub node_secret: Option<String>,
    /// Directory for the durable blobs (queue, token, fingerprint, log).
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// Rewrite `http://` URLs to `https://` before dispatch.
    #[serde(default)]
    pub force_https: bool,
    /// Accept any server certificate. Lab benches only.
    #[serde(default)]
    pub allow_insecure: bool,
    /// Seconds between periodic activity reports.
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: i64,
    /// PEM file with the CA certificate to validate against.
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,
    /// Expected server certificate fingerprint (hex, colons optional).
    #[serde(default)]
    pub pinned_fingerprint: Option<String>,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("gatenode-data")
}

fn default_report_interval() -> i64 {
    REPORT_INTERVAL_SECS
}

impl NodeConfig {
    /// Load and parse the configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: NodeConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: NodeConfig =
            serde_json::from_str(r#"{"server_url":"http://server.local:5000"}"#).unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("gatenode-data"));
        assert_eq!(config.report_interval_secs, REPORT_INTERVAL_SECS);
        assert!(!config.force_https);
        assert!(!config.allow_insecure);
        assert!(config.node_id.is_none());
    }

    #[test]
    fn test_full_config_parses() {
        let config: NodeConfig = serde_json::from_str(
            r#"{
                "server_url": "https://server.local:5000",
                "node_id": "gate-07",
                "node_secret": "hunter2",
                "storage_dir": "/var/lib/gatenode",
                "force_https": true,
                "report_interval_secs": 60,
                "pinned_fingerprint": "ab:cd"
            }"#,
        )
        .unwrap();
        assert_eq!(config.node_id.as_deref(), Some("gate-07"));
        assert_eq!(config.report_interval_secs, 60);
        assert!(config.force_https);
    }
}
