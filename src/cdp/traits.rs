//! CDP (Chrome DevTools Protocol) layer traits
//!
//! This module defines the abstract interfaces for CDP communication.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// CDP response representation
#[derive(Debug, Clone)]
pub struct CdpResponse {
    /// Response ID (matches request ID)
    pub id: u64,
    /// Response result
    pub result: Option<Value>,
    /// Error if any
    pub error: Option<CdpError>,
}

/// CDP error representation
#[derive(Debug, Clone)]
pub struct CdpError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    pub data: Option<Value>,
}

/// CDP connection trait
///
/// Represents a WebSocket connection to a Chrome DevTools Protocol target.
#[async_trait]
pub trait CdpConnection: Send + Sync + std::fmt::Debug {
    /// Send a CDP command and wait for response
    async fn send_command(&self, method: &str, params: Value) -> Result<CdpResponse, crate::Error>;

    /// Close the connection
    async fn close(&self) -> Result<(), crate::Error>;

    /// Check if connection is active
    fn is_active(&self) -> bool;
}

/// CDP client trait
///
/// Typed page-level operations on top of a [`CdpConnection`].
#[async_trait]
pub trait CdpClient: Send + Sync + std::fmt::Debug {
    /// Get the underlying connection
    fn connection(&self) -> Arc<dyn CdpConnection>;

    /// Navigate to a URL and wait for the document to finish loading
    async fn navigate(&self, url: &str) -> Result<NavigationResult, crate::Error>;

    /// Evaluate JavaScript in the page, returning the value by value
    async fn evaluate(&self, script: &str, await_promise: bool) -> Result<EvaluationResult, crate::Error>;

    /// Enable a domain
    async fn enable_domain(&self, domain: &str) -> Result<(), crate::Error>;

    /// Call a raw CDP method (returns JSON Value)
    async fn call_method(&self, method: &str, params: Value) -> Result<Value, crate::Error>;
}

/// Navigation result
#[derive(Debug, Clone)]
pub struct NavigationResult {
    /// Loader ID of the navigation
    pub loader_id: Option<String>,
    /// URL after navigation
    pub url: String,
    /// Whether `document.readyState` reached "complete" before the wait ran out
    pub loaded: bool,
}

/// JavaScript evaluation result
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationResult {
    /// String value
    String(String),
    /// Number value
    Number(f64),
    /// Boolean value
    Bool(bool),
    /// `null` or `undefined`
    Null,
    /// Object/Array (as JSON)
    Object(Value),
}

impl EvaluationResult {
    /// Convert into a plain JSON value
    pub fn into_json(self) -> Value {
        match self {
            EvaluationResult::String(s) => Value::String(s),
            EvaluationResult::Number(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            EvaluationResult::Bool(b) => Value::Bool(b),
            EvaluationResult::Null => Value::Null,
            EvaluationResult::Object(v) => v,
        }
    }
}

/// CDP browser trait
///
/// Browser-level operations over the DevTools HTTP endpoints.
#[async_trait]
pub trait CdpBrowser: Send + Sync + std::fmt::Debug {
    /// Attach a CDP client to a target's WebSocket debugger URL
    async fn create_client(&self, target_ws_url: &str) -> Result<Arc<dyn CdpClient>, crate::Error>;

    /// Open a new page target
    async fn create_target(&self, url: &str) -> Result<TargetInfo, crate::Error>;

    /// Close a page target
    async fn close_target(&self, target_id: &str) -> Result<(), crate::Error>;

    /// Get browser version
    async fn get_version(&self) -> Result<BrowserVersion, crate::Error>;

    /// Close every connection opened through this browser
    async fn close(&self) -> Result<(), crate::Error>;
}

/// Browser version information
#[derive(Debug, Clone)]
pub struct BrowserVersion {
    /// Protocol version
    pub protocol_version: String,
    /// Product name
    pub product: String,
    /// User agent
    pub user_agent: String,
    /// JavaScript engine version
    pub js_version: String,
}

impl BrowserVersion {
    /// Whether the browser reports itself as headless
    pub fn is_headless(&self) -> bool {
        self.product.contains("Headless") || self.user_agent.contains("Headless")
    }
}

/// Page target information
#[derive(Debug, Clone)]
pub struct TargetInfo {
    /// Target ID
    pub target_id: String,
    /// WebSocket debugger URL
    pub ws_url: String,
    /// Target URL
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_evaluation_result_into_json() {
        assert_eq!(EvaluationResult::String("x".into()).into_json(), json!("x"));
        assert_eq!(EvaluationResult::Number(8.0).into_json(), json!(8.0));
        assert_eq!(EvaluationResult::Number(f64::NAN).into_json(), Value::Null);
        assert_eq!(EvaluationResult::Bool(true).into_json(), json!(true));
        assert_eq!(EvaluationResult::Null.into_json(), Value::Null);
        assert_eq!(
            EvaluationResult::Object(json!([1, 2])).into_json(),
            json!([1, 2])
        );
    }

    #[test]
    fn test_headless_detection() {
        let version = BrowserVersion {
            protocol_version: "1.3".to_string(),
            product: "HeadlessChrome/131.0.6778.85".to_string(),
            user_agent: "Mozilla/5.0 HeadlessChrome/131.0.6778.85".to_string(),
            js_version: "537.36".to_string(),
        };
        assert!(version.is_headless());

        let version = BrowserVersion {
            product: "Chrome/131.0.6778.85".to_string(),
            user_agent: "Mozilla/5.0 Chrome/131.0.6778.85".to_string(),
            ..version
        };
        assert!(!version.is_headless());
    }
}
