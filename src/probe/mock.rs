//! Mock probe host for testing
//!
//! Script bodies are answered from a table (unknown bodies yield `null`) and
//! battery faults are looked up by operation name. An out-of-band fault is
//! appended to every observer installed when its operation is issued, the
//! way page-global error events reach every listener.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{Error, Result};

use super::traits::{FaultOperation, FaultSlot, ProbeHost, ProbeResult};

/// Message Chromium reports for `azeaze + 3`
pub const UNDEFINED_REFERENCE_MESSAGE: &str = "azeaze is not defined";

/// Message Chromium reports for `new WebSocket('itsgonnafail')`
pub const MALFORMED_WEBSOCKET_MESSAGE: &str = "Failed to construct 'WebSocket': The URL 'itsgonnafail' is invalid.";

/// Scripted in-memory probe host
#[derive(Debug, Default)]
pub struct MockProbeHost {
    scripts: HashMap<String, ProbeResult>,
    inline_faults: HashMap<String, String>,
    logged_faults: HashMap<String, String>,
    latency: Duration,
    failing: AtomicBool,
    observers: Mutex<HashMap<String, Vec<String>>>,
    calls: Mutex<Vec<String>>,
    fault_window: Arc<tokio::sync::Mutex<()>>,
}

impl MockProbeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host that faults the standard battery the way stock Chromium does
    pub fn chromium() -> Self {
        Self::new()
            .with_inline_fault("undefinedReference", UNDEFINED_REFERENCE_MESSAGE)
            .with_inline_fault("malformedWebSocket", MALFORMED_WEBSOCKET_MESSAGE)
    }

    /// Answer a script body with a fixed result
    pub fn with_script<S: Into<String>>(mut self, body: S, result: ProbeResult) -> Self {
        self.scripts.insert(body.into(), result);
        self
    }

    /// Fault the named battery operation inline
    pub fn with_inline_fault<N: Into<String>, M: Into<String>>(mut self, operation: N, message: M) -> Self {
        self.inline_faults.insert(operation.into(), message.into());
        self
    }

    /// Fault the named battery operation out of band
    pub fn with_logged_fault<N: Into<String>, M: Into<String>>(mut self, operation: N, message: M) -> Self {
        self.logged_faults.insert(operation.into(), message.into());
        self
    }

    /// Delay every host round trip
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every call fail as if the connection dropped
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Observers installed and not yet drained
    pub fn active_observers(&self) -> Vec<String> {
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Host calls in order, e.g. `"batch:3"`, `"install:<run>"`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn round_trip(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::websocket("Connection is not active"));
        }
        Ok(())
    }

    fn answer(&self, body: &str) -> ProbeResult {
        self.scripts.get(body).cloned().unwrap_or(Ok(Value::Null))
    }
}

#[async_trait]
impl ProbeHost for MockProbeHost {
    async fn evaluate_batch(&self, bodies: &[String]) -> Result<Vec<ProbeResult>> {
        self.round_trip(format!("batch:{}", bodies.len())).await?;
        Ok(bodies.iter().map(|body| self.answer(body)).collect())
    }

    async fn evaluate_async(&self, body: &str) -> Result<ProbeResult> {
        self.round_trip("async".to_string()).await?;
        Ok(self.answer(body))
    }

    fn fault_window(&self) -> Arc<tokio::sync::Mutex<()>> {
        self.fault_window.clone()
    }

    async fn install_fault_observer(&self, run_id: &str) -> Result<()> {
        self.round_trip(format!("install:{}", run_id)).await?;
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(run_id.to_string())
            .or_default();
        Ok(())
    }

    async fn issue_faults(&self, run_id: &str, operations: &[FaultOperation]) -> Result<Vec<FaultSlot>> {
        self.round_trip(format!("battery:{}", run_id)).await?;

        let mut observers = self.observers.lock().unwrap_or_else(|e| e.into_inner());
        for message in operations.iter().filter_map(|op| self.logged_faults.get(&op.name)) {
            for log in observers.values_mut() {
                log.push(message.clone());
            }
        }

        Ok(operations
            .iter()
            .map(|op| self.inline_faults.get(&op.name).cloned())
            .collect())
    }

    async fn drain_fault_observer(&self, run_id: &str) -> Result<Vec<String>> {
        self.round_trip(format!("drain:{}", run_id)).await?;
        Ok(self
            .observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(run_id)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::traits::Fault;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_answers() {
        let host = MockProbeHost::new()
            .with_script("return 42;", Ok(json!(42)))
            .with_script("throw 'boom';", Err(Fault::from("boom")));

        let results = host
            .evaluate_batch(&["return 42;".to_string(), "throw 'boom';".to_string(), "return 1;".to_string()])
            .await
            .unwrap();
        assert_eq!(results, vec![Ok(json!(42)), Err(Fault::from("boom")), Ok(Value::Null)]);
    }

    #[tokio::test]
    async fn test_observer_lifecycle() {
        let host = MockProbeHost::new().with_logged_fault("reject", "late");
        let operations = vec![FaultOperation::out_of_band("reject", "Promise.reject('late');")];

        host.install_fault_observer("r1").await.unwrap();
        assert_eq!(host.active_observers(), vec!["r1".to_string()]);
        assert_eq!(host.issue_faults("r1", &operations).await.unwrap(), vec![None]);

        assert_eq!(host.drain_fault_observer("r1").await.unwrap(), vec!["late".to_string()]);
        assert!(host.active_observers().is_empty());
        assert!(host.drain_fault_observer("r1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logged_faults_reach_every_installed_observer() {
        let host = MockProbeHost::new().with_logged_fault("reject", "from b");
        let quiet = vec![FaultOperation::out_of_band("settle", "Promise.resolve();")];
        let loud = vec![FaultOperation::out_of_band("reject", "Promise.reject('from b');")];

        host.install_fault_observer("a").await.unwrap();
        host.install_fault_observer("b").await.unwrap();
        host.issue_faults("a", &quiet).await.unwrap();
        host.issue_faults("b", &loud).await.unwrap();

        assert_eq!(host.drain_fault_observer("a").await.unwrap(), vec!["from b".to_string()]);
        assert_eq!(host.drain_fault_observer("b").await.unwrap(), vec!["from b".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_host() {
        let host = MockProbeHost::new();
        host.set_failing(true);

        assert!(host.evaluate_async("return 1;").await.is_err());
        assert_eq!(host.calls(), vec!["async".to_string()]);
    }
}
