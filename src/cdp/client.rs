//! CDP client implementation
//!
//! Typed `Page`/`Runtime` operations over a [`CdpConnection`].

use super::traits::*;
use super::types::*;
use crate::Error;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Interval between `document.readyState` polls after navigation
const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// CDP client implementation
#[derive(Debug, Clone)]
pub struct CdpClientImpl {
    /// Underlying CDP connection
    connection: Arc<dyn CdpConnection>,
    /// How long `navigate` polls for the load to complete
    load_wait: Duration,
}

impl CdpClientImpl {
    /// Create a new CDP client
    ///
    /// # Arguments
    /// * `connection` - CDP connection instance
    pub fn new(connection: Arc<dyn CdpConnection>) -> Self {
        Self {
            connection,
            load_wait: Duration::from_secs(5),
        }
    }

    /// Override how long `navigate` waits for the document to load
    pub fn with_load_wait(mut self, load_wait: Duration) -> Self {
        self.load_wait = load_wait;
        self
    }

    /// Parse remote object value to evaluation result
    fn parse_remote_object(obj: &RemoteObject) -> EvaluationResult {
        match obj.r#type.as_str() {
            "string" => EvaluationResult::String(
                obj.value
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
            ),
            "number" => match (&obj.value, &obj.unserializable_value) {
                (Some(v), _) => EvaluationResult::Number(v.as_f64().unwrap_or(0.0)),
                // NaN, Infinity and -0 only come through as text
                (None, Some(text)) => EvaluationResult::String(text.clone()),
                (None, None) => EvaluationResult::Null,
            },
            "boolean" => EvaluationResult::Bool(
                obj.value.as_ref().and_then(|v| v.as_bool()).unwrap_or(false),
            ),
            "bigint" => EvaluationResult::String(obj.unserializable_value.clone().unwrap_or_default()),
            "object" => match &obj.value {
                Some(serde_json::Value::Null) | None => EvaluationResult::Null,
                Some(value) => EvaluationResult::Object(value.clone()),
            },
            _ => EvaluationResult::Null,
        }
    }

    /// Poll `document.readyState` until it reports "complete" or the wait runs out
    async fn wait_for_load(&self) -> bool {
        let attempts = (self.load_wait.as_millis() / LOAD_POLL_INTERVAL.as_millis()).max(1);

        for attempt in 0..attempts {
            tokio::time::sleep(LOAD_POLL_INTERVAL).await;

            match self.evaluate("document.readyState", false).await {
                Ok(EvaluationResult::String(state)) if state == "complete" => {
                    debug!("Page loaded on attempt {}", attempt + 1);
                    return true;
                }
                Ok(state) => debug!("Document ready state on attempt {}: {:?}", attempt + 1, state),
                Err(e) => debug!("Error checking ready state on attempt {}: {}", attempt + 1, e),
            }
        }

        false
    }
}

#[async_trait]
impl CdpClient for CdpClientImpl {
    fn connection(&self) -> Arc<dyn CdpConnection> {
        Arc::clone(&self.connection)
    }

    async fn navigate(&self, url: &str) -> Result<NavigationResult, Error> {
        info!("Navigating to {}", url);

        let params = NavigateParams {
            url: url.to_string(),
            referrer: None,
        };

        let result = self.call_method("Page.navigate", serde_json::to_value(params)?).await?;

        if let Some(error_text) = result.get("errorText").and_then(|v| v.as_str()) {
            return Err(Error::navigation_failed(format!("{}: {}", url, error_text)));
        }

        let loaded = self.wait_for_load().await;
        if !loaded {
            info!("Page load polling timed out for {} - continuing anyway", url);
        }

        Ok(NavigationResult {
            loader_id: result
                .get("loaderId")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            url: url.to_string(),
            loaded,
        })
    }

    async fn evaluate(&self, script: &str, await_promise: bool) -> Result<EvaluationResult, Error> {
        debug!("Evaluating script ({} bytes, await_promise={})", script.len(), await_promise);

        let params = EvaluateParams::by_value(script, await_promise);
        let result = self
            .call_method("Runtime.evaluate", serde_json::to_value(params)?)
            .await?;

        let response: EvaluateResponse = serde_json::from_value(result)
            .map_err(|e| Error::cdp(format!("Failed to parse EvaluateResponse: {}", e)))?;

        if let Some(exception) = response.exception_details {
            return Err(Error::script_execution_failed(exception.describe()));
        }

        Ok(Self::parse_remote_object(&response.result))
    }

    async fn enable_domain(&self, domain: &str) -> Result<(), Error> {
        debug!("Enabling domain: {}", domain);
        self.call_method(&format!("{}.enable", domain), serde_json::json!({})).await?;
        Ok(())
    }

    async fn call_method(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, Error> {
        let response = self.connection.send_command(method, params).await?;
        response.result.ok_or_else(|| Error::cdp("No result in response"))
    }
}
