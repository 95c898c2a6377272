//! Probe runner
//!
//! Turns every way a probe can fail (a thrown fault, a rejected promise, a
//! panic, a dropped host connection) into an [`ErrorOutcome`] under that
//! probe's name.
//!
//! [`ErrorOutcome`]: super::outcome::ErrorOutcome

use futures::FutureExt;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

use super::outcome::ProbeOutcome;
use super::traits::{DeferredFn, Executor, Fault, NativeFn, Probe, ProbeHost, ProbeKind, ProbeResult};

/// Executes probes against one host
#[derive(Debug, Clone)]
pub struct ProbeRunner {
    host: Arc<dyn ProbeHost>,
}

impl ProbeRunner {
    pub fn new(host: Arc<dyn ProbeHost>) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &Arc<dyn ProbeHost> {
        &self.host
    }

    /// Run a single probe of either kind
    pub async fn run(&self, probe: &Probe) -> ProbeOutcome {
        match probe.kind {
            ProbeKind::Sync => self
                .run_sync_batch(std::slice::from_ref(probe))
                .await
                .pop()
                .unwrap_or_else(|| ProbeOutcome::error("probe produced no outcome")),
            ProbeKind::Async => self.run_async(probe).await,
        }
    }

    /// Run synchronous probes; outcomes come back in input order.
    ///
    /// Natives run inline, script bodies share one host turn.
    pub async fn run_sync_batch(&self, probes: &[Probe]) -> Vec<ProbeOutcome> {
        let mut outcomes: Vec<Option<ProbeOutcome>> = vec![None; probes.len()];
        let mut script_slots = Vec::new();
        let mut bodies = Vec::new();

        for (index, probe) in probes.iter().enumerate() {
            match &probe.executor {
                Executor::Native(f) => outcomes[index] = Some(Self::settle(probe, run_native(f))),
                Executor::Script(body) => {
                    script_slots.push(index);
                    bodies.push(body.clone());
                }
                Executor::Deferred(_) => {
                    outcomes[index] = Some(Self::settle(
                        probe,
                        Err(Fault::error(
                            "OrchestrationDefect",
                            format!("synchronous probe '{}' has a deferred executor", probe.name),
                        )),
                    ));
                }
            }
        }

        if !bodies.is_empty() {
            match self.host.evaluate_batch(&bodies).await {
                Ok(results) => {
                    for (index, result) in script_slots.into_iter().zip(results) {
                        outcomes[index] = Some(Self::settle(&probes[index], result));
                    }
                }
                Err(e) => {
                    warn!("Sync probe batch of {} failed: {}", bodies.len(), e);
                    let message = e.to_string();
                    for index in script_slots {
                        outcomes[index] = Some(ProbeOutcome::error(message.clone()));
                    }
                }
            }
        }

        outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap_or_else(|| ProbeOutcome::error("probe produced no outcome")))
            .collect()
    }

    /// Run one asynchronous probe to settlement
    pub async fn run_async(&self, probe: &Probe) -> ProbeOutcome {
        let result = match &probe.executor {
            Executor::Native(f) => run_native(f),
            Executor::Deferred(f) => run_deferred(f).await,
            Executor::Script(body) => match self.host.evaluate_async(body).await {
                Ok(result) => result,
                Err(e) => {
                    if e.is_transport() {
                        warn!("Async probe '{}' lost its host: {}", probe.name, e);
                    } else {
                        debug!("Async probe '{}' host error: {}", probe.name, e);
                    }
                    Err(Fault::from(e))
                }
            },
        };
        Self::settle(probe, result)
    }

    fn settle(probe: &Probe, result: ProbeResult) -> ProbeOutcome {
        if let Err(fault) = &result {
            debug!("Probe '{}' faulted: {}", probe.name, fault);
        }
        ProbeOutcome::from(result)
    }
}

fn run_native(f: &NativeFn) -> ProbeResult {
    catch_unwind(AssertUnwindSafe(|| f())).unwrap_or_else(|payload| Err(panic_fault(payload)))
}

async fn run_deferred(f: &DeferredFn) -> ProbeResult {
    // Building the future may itself panic before the first poll
    let future = match catch_unwind(AssertUnwindSafe(|| f())) {
        Ok(future) => future,
        Err(payload) => return Err(panic_fault(payload)),
    };

    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(panic_fault(payload)))
}

fn panic_fault(payload: Box<dyn Any + Send>) -> Fault {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "probe panicked".to_string()
    };
    Fault::error("Panic", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::mock::MockProbeHost;
    use serde_json::json;

    fn runner(host: MockProbeHost) -> ProbeRunner {
        ProbeRunner::new(Arc::new(host))
    }

    #[tokio::test]
    async fn test_native_sync_outcomes() {
        let runner = runner(MockProbeHost::new());

        let ok = Probe::new("ok", ProbeKind::Sync, Executor::native(|| Ok(json!("fine"))));
        let thrown = Probe::new("thrown", ProbeKind::Sync, Executor::native(|| Err(Fault::from("exception"))));

        assert_eq!(runner.run(&ok).await, ProbeOutcome::Value(json!("fine")));
        assert_eq!(runner.run(&thrown).await, ProbeOutcome::error("exception"));
    }

    #[tokio::test]
    async fn test_panics_are_isolated() {
        let runner = runner(MockProbeHost::new());

        let sync = Probe::new("sync", ProbeKind::Sync, Executor::native(|| panic!("native blew up")));
        let deferred = Probe::new(
            "deferred",
            ProbeKind::Async,
            Executor::deferred(|| async {
                let detail = "deferred blew up".to_string();
                if !detail.is_empty() {
                    panic!("{}", detail);
                }
                Ok(json!(null))
            }),
        );

        assert_eq!(runner.run(&sync).await, ProbeOutcome::error("native blew up"));
        assert_eq!(runner.run(&deferred).await, ProbeOutcome::error("deferred blew up"));
    }

    #[tokio::test]
    async fn test_kind_executor_matrix() {
        let runner = runner(MockProbeHost::new());

        let sync_deferred = Probe::new("mismatch", ProbeKind::Sync, Executor::deferred(|| async { Ok(json!(1)) }));
        let outcome = runner.run(&sync_deferred).await;
        assert_eq!(
            outcome.error_message(),
            Some("synchronous probe 'mismatch' has a deferred executor")
        );

        let async_native = Probe::new("plain", ProbeKind::Async, Executor::native(|| Ok(json!(7))));
        assert_eq!(runner.run(&async_native).await, ProbeOutcome::Value(json!(7)));
    }

    #[tokio::test]
    async fn test_sync_batch_keeps_order() {
        let host = MockProbeHost::new()
            .with_script("return 'a';", Ok(json!("a")))
            .with_script("throw 'b';", Err(Fault::from("b")));
        let runner = runner(host);

        let probes = vec![
            Probe::new("a", ProbeKind::Sync, Executor::script("return 'a';")),
            Probe::new("n", ProbeKind::Sync, Executor::native(|| Ok(json!(0)))),
            Probe::new("b", ProbeKind::Sync, Executor::script("throw 'b';")),
        ];

        let outcomes = runner.run_sync_batch(&probes).await;
        assert_eq!(
            outcomes,
            vec![
                ProbeOutcome::Value(json!("a")),
                ProbeOutcome::Value(json!(0)),
                ProbeOutcome::error("b"),
            ]
        );
    }

    #[tokio::test]
    async fn test_host_failure_becomes_outcomes() {
        let host = MockProbeHost::new();
        host.set_failing(true);
        let runner = runner(host);

        let probes = vec![
            Probe::new("s", ProbeKind::Sync, Executor::script("return 1;")),
            Probe::new("n", ProbeKind::Sync, Executor::native(|| Ok(json!(true)))),
        ];
        let outcomes = runner.run_sync_batch(&probes).await;
        assert!(outcomes[0].is_error());
        assert_eq!(outcomes[1], ProbeOutcome::Value(json!(true)));

        let a = Probe::new("a", ProbeKind::Async, Executor::script("return 1;"));
        let outcome = runner.run(&a).await;
        assert!(outcome.error_message().unwrap().contains("Connection is not active"));
    }
}
