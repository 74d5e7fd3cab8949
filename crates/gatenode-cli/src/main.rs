//! Gatenode host daemon.
//!
//! Runs the resilient network client on a gateway host: keeps the bearer
//! token fresh, drains the offline queue, and sends the periodic activity
//! report. Firmware builds embed `gatenode-net` directly; this binary is the
//! reference host wiring and the lab-bench harness.

mod config;

use anyhow::Context;
use chrono::Utc;
use config::NodeConfig;
use gatenode_core::{Fingerprint, NodeIdentity};
use gatenode_net::{ClientConfig, HttpTransport, NetClient, ReportTicker, StaticLink, TrustMode};
use gatenode_storage::FileStore;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Cadence of the maintenance cycle (token refresh, queue drain, report).
const CYCLE_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("gatenode.json"), PathBuf::from);
    let node = NodeConfig::load(&config_path)?;
    info!(
        version = gatenode_core::VERSION,
        server = %node.server_url,
        config = %config_path.display(),
        "gatenode starting"
    );

    let store = FileStore::new(&node.storage_dir)
        .with_context(|| format!("opening blob store at {}", node.storage_dir.display()))?;

    let mut client_config = ClientConfig::new(&node.server_url);
    client_config.force_https = node.force_https;
    client_config.allow_insecure = node.allow_insecure;

    let mut client = NetClient::new(
        HttpTransport::new(),
        StaticLink::connected(),
        store,
        client_config,
    );
    client.load_state().await;

    if let Some(path) = &node.ca_cert_path {
        let pem = std::fs::read_to_string(path)
            .with_context(|| format!("reading CA certificate {}", path.display()))?;
        client.trust_mut().set_mode(TrustMode::CaCert(pem));
        info!(path = %path.display(), "trust: CA certificate");
    } else if let Some(hex) = &node.pinned_fingerprint {
        let fp = Fingerprint::parse(hex)
            .map_err(|e| anyhow::anyhow!("invalid pinned_fingerprint: {e}"))?;
        info!(fingerprint = %fp, "trust: pinned fingerprint");
        client.trust_mut().set_mode(TrustMode::Fingerprint(fp));
    }

    match (&node.node_id, &node.node_secret) {
        (Some(id), Some(secret)) => {
            client
                .token_mut()
                .set_identity(NodeIdentity::new(id, secret));
        }
        (Some(_), None) | (None, Some(_)) => {
            anyhow::bail!("node_id and node_secret must be configured together");
        }
        (None, None) => warn!("no node credentials configured, running unauthenticated"),
    }

    let report_url = format!(
        "{}/api/nodes/activity",
        node.server_url.trim_end_matches('/')
    );
    let mut ticker = ReportTicker::new(node.report_interval_secs);
    let mut cycle = tokio::time::interval(CYCLE_INTERVAL);
    cycle.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!("entering maintenance loop");
    loop {
        tokio::select! {
            _ = cycle.tick() => {
                run_cycle(&mut client, &mut ticker, &report_url, node.node_id.as_deref()).await;
            }
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for shutdown signal")?;
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!(queued = client.queue().len(), "gatenode stopped");
    Ok(())
}

/// One maintenance cycle: refresh the token, drain the queue, and send the
/// activity report when due. Failures are logged and the loop carries on;
/// the client's own queue and diagnostics already hold the details.
async fn run_cycle<T, S, C>(
    client: &mut NetClient<T, S, C>,
    ticker: &mut ReportTicker,
    report_url: &str,
    node_id: Option<&str>,
) where
    T: gatenode_net::Transport,
    S: gatenode_storage::BlobStore,
    C: gatenode_net::ConnectivitySupervisor,
{
    if let Err(e) = client.refresh_token().await {
        error!(error = %e, "token refresh failed");
    }

    client.drain().await;

    let now = Utc::now();
    if ticker.due(now) {
        let report = serde_json::json!({
            "node_id": node_id,
            "timestamp": now,
            "queued": client.queue().len(),
            "healthy": client.health_check(),
            "firmware": gatenode_core::VERSION,
        });
        match client
            .send_post(report_url, report.to_string().as_bytes(), true)
            .await
        {
            Ok(_) => ticker.mark_sent(now),
            // Queued on transient failure; the ticker stays due so the
            // next successful report resets the cadence.
            Err(e) => warn!(error = %e, "activity report not delivered"),
        }
    }
}
