//! ProbeHost over a CDP page client

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::cdp::{CdpClient, EvaluationResult};
use crate::{Error, Result};

use super::scripts;
use super::traits::{Fault, FaultOperation, FaultSlot, ProbeHost, ProbeResult};

/// Runs probes inside the page behind a CDP client
///
/// Clones share the client and the fault window.
#[derive(Debug, Clone)]
pub struct CdpProbeHost {
    client: Arc<dyn CdpClient>,
    fault_window: Arc<Mutex<()>>,
}

impl CdpProbeHost {
    pub fn new(client: Arc<dyn CdpClient>) -> Self {
        Self {
            client,
            fault_window: Arc::new(Mutex::new(())),
        }
    }

    pub fn client(&self) -> &Arc<dyn CdpClient> {
        &self.client
    }

    /// Decode one `{ok}` / `{fault}` entry produced by the wrappers
    fn decode_entry(entry: Value) -> Result<ProbeResult> {
        match entry {
            Value::Object(mut object) => {
                if let Some(fault) = object.remove("fault") {
                    let message = match fault {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    return Ok(Err(Fault::Message(message)));
                }
                match object.remove("ok") {
                    Some(value) => Ok(Ok(value)),
                    None => Err(Error::cdp("Probe wrapper returned neither a value nor a fault")),
                }
            }
            other => Err(Error::cdp(format!("Unexpected probe wrapper result: {}", other))),
        }
    }

    /// Expect a JSON array back from the page
    fn expect_array(result: EvaluationResult, what: &str) -> Result<Vec<Value>> {
        match result.into_json() {
            Value::Array(items) => Ok(items),
            other => Err(Error::cdp(format!("Expected an array from {}, got {}", what, other))),
        }
    }
}

#[async_trait]
impl ProbeHost for CdpProbeHost {
    async fn evaluate_batch(&self, bodies: &[String]) -> Result<Vec<ProbeResult>> {
        if bodies.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Evaluating {} sync probe bodies in one batch", bodies.len());
        let result = self.client.evaluate(&scripts::batch_script(bodies)?, false).await?;
        let entries = Self::expect_array(result, "probe batch")?;

        if entries.len() != bodies.len() {
            return Err(Error::cdp(format!(
                "Probe batch returned {} results for {} bodies",
                entries.len(),
                bodies.len()
            )));
        }

        entries.into_iter().map(Self::decode_entry).collect()
    }

    async fn evaluate_async(&self, body: &str) -> Result<ProbeResult> {
        let result = self.client.evaluate(&scripts::async_script(body)?, true).await?;
        Self::decode_entry(result.into_json())
    }

    fn fault_window(&self) -> Arc<Mutex<()>> {
        self.fault_window.clone()
    }

    async fn install_fault_observer(&self, run_id: &str) -> Result<()> {
        let result = self.client.evaluate(&scripts::observe_script(run_id)?, false).await?;
        if result == EvaluationResult::Bool(false) {
            debug!("Fault observer for run {} was already installed", run_id);
        }
        Ok(())
    }

    async fn issue_faults(&self, run_id: &str, operations: &[FaultOperation]) -> Result<Vec<FaultSlot>> {
        trace!("Issuing {} battery operations for run {}", operations.len(), run_id);
        let result = self.client.evaluate(&scripts::battery_script(operations)?, false).await?;

        Ok(Self::expect_array(result, "fault battery")?
            .into_iter()
            .map(|slot| match slot {
                Value::Null => None,
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            })
            .collect())
    }

    async fn drain_fault_observer(&self, run_id: &str) -> Result<Vec<String>> {
        let result = self.client.evaluate(&scripts::drain_script(run_id)?, false).await?;

        Ok(Self::expect_array(result, "fault observer")?
            .into_iter()
            .map(|entry| match entry {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect())
    }
}
