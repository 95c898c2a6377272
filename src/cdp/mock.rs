//! Mock CDP implementation for testing
//!
//! `MockCdpClient` answers `Runtime.evaluate` through a caller-supplied
//! responder, so page-side behaviour can be scripted without a browser.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cdp::traits::*;
use crate::Error;

/// Evaluation responder: `(script, await_promise) -> result`
pub type EvalResponder = Arc<dyn Fn(&str, bool) -> Result<EvaluationResult, Error> + Send + Sync>;

fn default_responder() -> EvalResponder {
    Arc::new(|script, _| {
        if script.contains("document.readyState") {
            Ok(EvaluationResult::String("complete".to_string()))
        } else {
            Ok(EvaluationResult::Null)
        }
    })
}

/// Mock CDP connection
#[derive(Debug)]
pub struct MockCdpConnection {
    is_active: AtomicBool,
    next_id: AtomicU64,
}

impl MockCdpConnection {
    /// Create a new mock CDP connection
    pub fn new() -> Self {
        Self {
            is_active: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for MockCdpConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpConnection for MockCdpConnection {
    async fn send_command(&self, method: &str, _params: serde_json::Value) -> Result<CdpResponse, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::websocket("Connection is not active"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let result = match method {
            "Page.navigate" => serde_json::json!({
                "frameId": uuid::Uuid::new_v4().to_string(),
                "loaderId": uuid::Uuid::new_v4().to_string(),
            }),
            _ => serde_json::json!({}),
        };

        Ok(CdpResponse {
            id,
            result: Some(result),
            error: None,
        })
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Relaxed)
    }
}

/// Mock CDP client
pub struct MockCdpClient {
    connection: Arc<MockCdpConnection>,
    url: Mutex<Option<String>>,
    responder: EvalResponder,
    evaluated: Mutex<Vec<String>>,
}

impl std::fmt::Debug for MockCdpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCdpClient")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl MockCdpClient {
    /// Create a mock client whose page is always loaded and evaluates to `null`
    pub fn new() -> Self {
        Self::with_responder_arc(default_responder())
    }

    /// Create a mock client with a scripted evaluation responder
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str, bool) -> Result<EvaluationResult, Error> + Send + Sync + 'static,
    {
        Self::with_responder_arc(Arc::new(responder))
    }

    fn with_responder_arc(responder: EvalResponder) -> Self {
        Self {
            connection: Arc::new(MockCdpConnection::new()),
            url: Mutex::new(None),
            responder,
            evaluated: Mutex::new(Vec::new()),
        }
    }

    /// Every script passed to `evaluate`, in call order
    pub async fn evaluated_scripts(&self) -> Vec<String> {
        self.evaluated.lock().await.clone()
    }

    /// Last URL passed to `navigate`
    pub async fn current_url(&self) -> Option<String> {
        self.url.lock().await.clone()
    }
}

impl Default for MockCdpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpClient for MockCdpClient {
    fn connection(&self) -> Arc<dyn CdpConnection> {
        self.connection.clone()
    }

    async fn navigate(&self, url: &str) -> Result<NavigationResult, Error> {
        *self.url.lock().await = Some(url.to_string());
        Ok(NavigationResult {
            loader_id: Some(uuid::Uuid::new_v4().to_string()),
            url: url.to_string(),
            loaded: true,
        })
    }

    async fn evaluate(&self, script: &str, await_promise: bool) -> Result<EvaluationResult, Error> {
        if !self.connection.is_active() {
            return Err(Error::websocket("Connection is not active"));
        }
        self.evaluated.lock().await.push(script.to_string());
        (self.responder)(script, await_promise)
    }

    async fn enable_domain(&self, _domain: &str) -> Result<(), Error> {
        Ok(())
    }

    async fn call_method(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, Error> {
        let response = self.connection.send_command(method, params).await?;
        response.result.ok_or_else(|| Error::cdp("No result in response"))
    }
}

/// Mock CDP browser
pub struct MockCdpBrowser {
    is_active: AtomicBool,
    responder: EvalResponder,
    closed_targets: Mutex<Vec<String>>,
}

impl std::fmt::Debug for MockCdpBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCdpBrowser")
            .field("is_active", &self.is_active.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl MockCdpBrowser {
    /// Create a new mock CDP browser
    pub fn new() -> Self {
        Self::with_responder_arc(default_responder())
    }

    /// Mock browser whose clients share a scripted evaluation responder
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str, bool) -> Result<EvaluationResult, Error> + Send + Sync + 'static,
    {
        Self::with_responder_arc(Arc::new(responder))
    }

    fn with_responder_arc(responder: EvalResponder) -> Self {
        Self {
            is_active: AtomicBool::new(true),
            responder,
            closed_targets: Mutex::new(Vec::new()),
        }
    }

    /// Targets closed so far
    pub async fn closed_targets(&self) -> Vec<String> {
        self.closed_targets.lock().await.clone()
    }
}

impl Default for MockCdpBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpBrowser for MockCdpBrowser {
    async fn create_client(&self, _target_ws_url: &str) -> Result<Arc<dyn CdpClient>, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::cdp("Browser is closed"));
        }

        Ok(Arc::new(MockCdpClient::with_responder_arc(Arc::clone(&self.responder))))
    }

    async fn create_target(&self, url: &str) -> Result<TargetInfo, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::cdp("Browser is closed"));
        }

        let target_id = uuid::Uuid::new_v4().to_string();
        let ws_url = format!("ws://localhost:9222/devtools/page/{}", target_id);
        tracing::debug!("Mock: Created target {} for {}", target_id, url);

        Ok(TargetInfo {
            target_id,
            ws_url,
            url: url.to_string(),
        })
    }

    async fn close_target(&self, target_id: &str) -> Result<(), Error> {
        self.closed_targets.lock().await.push(target_id.to_string());
        Ok(())
    }

    async fn get_version(&self) -> Result<BrowserVersion, Error> {
        Ok(BrowserVersion {
            protocol_version: "1.3".to_string(),
            product: "HeadlessChrome/131.0.6778.85".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) HeadlessChrome/131.0.6778.85 Safari/537.36".to_string(),
            js_version: "537.36".to_string(),
        })
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::Relaxed);
        Ok(())
    }
}
