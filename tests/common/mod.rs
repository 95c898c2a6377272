//! Common test utilities
//!
//! Shared helpers for the integration tests.

#![allow(dead_code)]

use fpcollect::cdp::{CdpClient, CdpClientImpl, CdpWebSocketConnection};
use fpcollect::FingerprintOrchestrator;
use fpcollect::CdpProbeHost;
use std::sync::Arc;
use std::time::Duration;

/// Settle delay used by integration runs
pub const TEST_SETTLE_DELAY: Duration = Duration::from_millis(20);

/// Attach a CDP client to a WebSocket debugger URL
pub async fn connect_client(ws_url: &str) -> Result<Arc<dyn CdpClient>, Box<dyn std::error::Error>> {
    let connection = CdpWebSocketConnection::new(ws_url).await?;
    let client = CdpClientImpl::new(connection).with_load_wait(Duration::from_millis(500));

    client.enable_domain("Page").await?;
    client.enable_domain("Runtime").await?;

    Ok(Arc::new(client))
}

/// Orchestrator over a CDP client with the short test settle delay
pub fn orchestrator_for(client: Arc<dyn CdpClient>) -> FingerprintOrchestrator {
    FingerprintOrchestrator::builder(Arc::new(CdpProbeHost::new(client)))
        .settle_delay(TEST_SETTLE_DELAY)
        .build()
}

/// Get test HTML content
pub fn get_test_html() -> String {
    r#"
<!DOCTYPE html>
<html>
<head>
    <title>fpcollect test page</title>
</head>
<body>
    <h1 id="title">Fingerprint</h1>
    <canvas id="scratch" width="1" height="1"></canvas>
</body>
</html>
    "#.to_string()
}

/// Test page as a data URL
pub fn get_test_url() -> String {
    "data:text/html;charset=utf-8,".to_string()
        + &urlencoding::encode(&get_test_html())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_is_encoded() {
        let url = get_test_url();
        assert!(url.starts_with("data:text/html;charset=utf-8,"));
        assert!(!url.contains(' '));
        assert!(url.contains("fpcollect"));
    }
}
