//! # fpcollect
//!
//! Opens a page in a running Chrome/Chromium, collects one fingerprint
//! record and writes it as JSON to stdout (or `--output`).
//!
//! ## Environment variables
//! - `FPCOLLECT_CDP_ENDPOINT`: DevTools endpoint (default: ws://localhost:9222)
//! - `FPCOLLECT_TARGET_URL`: page to fingerprint (default: about:blank)
//! - `FPCOLLECT_SETTLE_DELAY_MS`: fault battery settle delay (default: 250)
//! - `RUST_LOG`: log filter; falls back to the configured log level
//!
//! Logs go to stderr so stdout carries only the record.

use anyhow::{Context, Result};
use clap::Parser;
use fpcollect::{
    cdp::{CdpBrowser, CdpBrowserImpl},
    CdpProbeHost, Config, FingerprintOrchestrator, PageSession,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "fpcollect", version)]
#[command(about = "Collect a browser environment fingerprint over the Chrome DevTools Protocol")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// DevTools endpoint, e.g. ws://localhost:9222
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Page to fingerprint
    #[arg(short, long)]
    url: Option<String>,

    /// Fault battery settle delay in milliseconds
    #[arg(long, value_name = "MS")]
    settle_delay_ms: Option<u64>,

    /// Pretty-print the record
    #[arg(long)]
    pretty: bool,

    /// Write the record to a file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(endpoint) = &self.endpoint {
            config.cdp_endpoint = endpoint.clone();
        }
        if let Some(url) = &self.url {
            config.target_url = url.clone();
        }
        if let Some(ms) = self.settle_delay_ms {
            config.fault_settle_delay_ms = ms;
        }
        if self.pretty {
            config.pretty = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_ref()).context("failed to load configuration")?;
    args.apply(&mut config);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("fpcollect v{}", fpcollect::VERSION);
    info!("Configuration loaded: endpoint={}, url={}", config.cdp_endpoint, config.target_url);

    let browser: Arc<dyn CdpBrowser> = Arc::new(
        CdpBrowserImpl::new(config.cdp_endpoint.clone())
            .with_timeouts(config.cdp_timeouts())
            .with_load_wait(Duration::from_millis(config.load_wait_ms)),
    );

    match browser.get_version().await {
        Ok(version) => info!(
            "Connected to {} (protocol {}, headless: {})",
            version.product,
            version.protocol_version,
            version.is_headless()
        ),
        Err(e) => warn!("Could not read browser version: {}", e),
    }

    let session = PageSession::open(browser.clone(), &config.target_url)
        .await
        .with_context(|| format!("failed to open {}", config.target_url))?;
    if !session.loaded() {
        warn!("{} did not finish loading; collecting anyway", config.target_url);
    }

    let orchestrator = FingerprintOrchestrator::builder(Arc::new(CdpProbeHost::new(session.client())))
        .settle_delay(config.fault_settle_delay())
        .build();

    let record = tokio::select! {
        record = orchestrator.generate() => record,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C signal, closing target");
            session.close().await;
            let _ = browser.close().await;
            return Ok(());
        }
    };

    session.close().await;
    if let Err(e) = browser.close().await {
        warn!("Failed to close browser connections: {}", e);
    }

    let json = if config.pretty {
        serde_json::to_string_pretty(&record)?
    } else {
        serde_json::to_string(&record)?
    };

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Record {} written to {}", record.run_id(), path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
