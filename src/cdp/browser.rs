//! CDP browser control implementation
//!
//! Page targets are opened and closed through the DevTools HTTP endpoints;
//! everything else goes over the per-target WebSocket.

use super::client::CdpClientImpl;
use super::connection::{CdpTimeouts, CdpWebSocketConnection};
use super::traits::*;
use crate::Error;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// CDP browser implementation
#[derive(Debug)]
pub struct CdpBrowserImpl {
    /// Browser endpoint (e.g., "ws://localhost:9222")
    endpoint: String,
    /// HTTP client for the /json endpoints
    http: reqwest::Client,
    /// Transport timeouts handed to every connection
    timeouts: CdpTimeouts,
    /// Load wait handed to every client
    load_wait: Duration,
    /// Active connections (target_id -> connection)
    connections: Mutex<HashMap<String, Arc<dyn CdpConnection>>>,
}

impl CdpBrowserImpl {
    /// Create a new CDP browser controller
    ///
    /// # Arguments
    /// * `endpoint` - Browser endpoint (e.g., "ws://localhost:9222")
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        let endpoint = endpoint.into();
        info!("Creating CDP browser controller for endpoint: {}", endpoint);
        Self {
            endpoint,
            http: reqwest::Client::new(),
            timeouts: CdpTimeouts::default(),
            load_wait: Duration::from_secs(5),
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Use explicit transport timeouts for new connections
    pub fn with_timeouts(mut self, timeouts: CdpTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Use an explicit load wait for new clients
    pub fn with_load_wait(mut self, load_wait: Duration) -> Self {
        self.load_wait = load_wait;
        self
    }

    /// HTTP form of the endpoint
    fn http_endpoint(&self) -> String {
        self.endpoint
            .trim_end_matches('/')
            .replace("ws://", "http://")
            .replace("wss://", "https://")
    }

    /// Target id is the last path segment of its debugger URL
    fn target_id_from_ws_url(ws_url: &str) -> String {
        ws_url.rsplit('/').next().unwrap_or("unknown").to_string()
    }

    /// Field of a /json response as a string
    fn string_field(json: &serde_json::Value, key: &str) -> String {
        json.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

#[async_trait]
impl CdpBrowser for CdpBrowserImpl {
    async fn create_client(&self, target_ws_url: &str) -> Result<Arc<dyn CdpClient>, Error> {
        info!("Creating CDP client for target: {}", target_ws_url);

        let connection = CdpWebSocketConnection::with_timeouts(target_ws_url, self.timeouts.clone()).await?;

        self.connections.lock().await.insert(
            Self::target_id_from_ws_url(target_ws_url),
            Arc::clone(&connection) as Arc<dyn CdpConnection>,
        );

        let client = Arc::new(CdpClientImpl::new(connection).with_load_wait(self.load_wait));

        client.enable_domain("Page").await?;
        client.enable_domain("Runtime").await?;

        Ok(client)
    }

    async fn create_target(&self, url: &str) -> Result<TargetInfo, Error> {
        info!("Creating new target with URL: {}", url);

        let new_url = format!("{}/json/new?{}", self.http_endpoint(), url);
        debug!("Creating new page via HTTP API: {}", new_url);

        let response = self.http.put(&new_url).send().await.map_err(|e| {
            Error::cdp(format!(
                "Failed to reach DevTools endpoint {}. Start the browser with --remote-debugging-port. Original error: {}",
                self.endpoint, e
            ))
        })?;

        let target_json: serde_json::Value = response.error_for_status()?.json().await?;

        let ws_url = target_json
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::cdp("No webSocketDebuggerUrl in new target response"))?;

        Ok(TargetInfo {
            target_id: target_json
                .get("id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| Self::target_id_from_ws_url(ws_url)),
            ws_url: ws_url.to_string(),
            url: Self::string_field(&target_json, "url"),
        })
    }

    async fn close_target(&self, target_id: &str) -> Result<(), Error> {
        info!("Closing target {}", target_id);

        let connection = self.connections.lock().await.remove(target_id);
        if let Some(connection) = connection {
            if let Err(e) = connection.close().await {
                warn!("Failed to close connection to {}: {}", target_id, e);
            }
        }

        let url = format!("{}/json/close/{}", self.http_endpoint(), target_id);
        let response = self.http.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::target_not_found(target_id));
        }
        response.error_for_status()?;

        Ok(())
    }

    async fn get_version(&self) -> Result<BrowserVersion, Error> {
        let url = format!("{}/json/version", self.http_endpoint());
        debug!("Fetching browser version from {}", url);

        let version_json: serde_json::Value = self.http.get(&url).send().await?.error_for_status()?.json().await?;

        Ok(BrowserVersion {
            protocol_version: Self::string_field(&version_json, "Protocol-Version"),
            product: Self::string_field(&version_json, "Browser"),
            user_agent: Self::string_field(&version_json, "User-Agent"),
            js_version: Self::string_field(&version_json, "WebKit-Version"),
        })
    }

    async fn close(&self) -> Result<(), Error> {
        let connections: Vec<_> = self.connections.lock().await.drain().collect();

        if connections.is_empty() {
            debug!("CdpBrowser::close: No active connections to close");
            return Ok(());
        }

        info!("CdpBrowser::close: Closing {} active CDP connections", connections.len());

        for (target_id, connection) in connections {
            if let Err(e) = connection.close().await {
                warn!("CdpBrowser::close: Failed to close connection to {}: {}", target_id, e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_endpoint_conversion() {
        let browser = CdpBrowserImpl::new("ws://localhost:9222/");
        assert_eq!(browser.http_endpoint(), "http://localhost:9222");

        let browser = CdpBrowserImpl::new("wss://remote.example.com:9222");
        assert_eq!(browser.http_endpoint(), "https://remote.example.com:9222");
    }

    #[test]
    fn test_target_id_from_ws_url() {
        assert_eq!(
            CdpBrowserImpl::target_id_from_ws_url("ws://localhost:9222/devtools/page/7A3F"),
            "7A3F"
        );
    }

    #[tokio::test]
    async fn test_close_without_connections() {
        let browser = CdpBrowserImpl::new("ws://localhost:9222");
        assert!(browser.close().await.is_ok());
    }
}
