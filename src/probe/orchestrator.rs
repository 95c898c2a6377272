//! Fingerprint orchestrator
//!
//! One `generate()` call is one run: snapshot the catalog, run sync and
//! async probes, run the fault battery, assemble the record. Runs share
//! nothing but the catalog and the host.

use chrono::Utc;
use futures::future::join_all;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, Span};
use uuid::Uuid;

use super::catalog::ProbeCatalog;
use super::faults::FaultProbeSequence;
use super::outcome::{FingerprintRecord, ProbeOutcome};
use super::runner::ProbeRunner;
use super::traits::{Executor, Probe, ProbeHost, ProbeKind};

/// Drives the catalog through the runner and merges the fault sequence
#[derive(Debug)]
pub struct FingerprintOrchestrator {
    catalog: Arc<ProbeCatalog>,
    runner: ProbeRunner,
    faults: FaultProbeSequence,
}

impl FingerprintOrchestrator {
    /// Built-in catalog and the standard fault battery
    pub fn new(host: Arc<dyn ProbeHost>) -> Self {
        Self::builder(host).build()
    }

    pub fn builder(host: Arc<dyn ProbeHost>) -> FingerprintOrchestratorBuilder {
        FingerprintOrchestratorBuilder {
            host,
            catalog: None,
            faults: None,
            settle_delay: None,
        }
    }

    pub fn catalog(&self) -> &Arc<ProbeCatalog> {
        &self.catalog
    }

    pub fn fault_sequence(&self) -> &FaultProbeSequence {
        &self.faults
    }

    /// Register a probe for collections started from now on
    pub fn register<S: Into<String>>(&self, name: S, kind: ProbeKind, executor: Executor) {
        self.catalog.register(name, kind, executor);
    }

    /// Collect one fingerprint record. Never fails.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn generate(&self) -> FingerprintRecord {
        let run_id = Uuid::new_v4();
        Span::current().record("run_id", tracing::field::display(run_id));

        let started_at = Utc::now();
        let clock = Instant::now();

        let snapshot = self.catalog.snapshot();
        let (sync_probes, async_probes): (Vec<Probe>, Vec<Probe>) =
            snapshot.iter().cloned().partition(|p| !p.kind.is_async());
        debug!(
            "Collecting {} sync and {} async probes",
            sync_probes.len(),
            async_probes.len()
        );

        let (sync_outcomes, async_outcomes) = futures::join!(
            self.runner.run_sync_batch(&sync_probes),
            join_all(async_probes.iter().map(|probe| self.runner.run_async(probe))),
        );

        let mut settled: HashMap<String, ProbeOutcome> = sync_probes
            .into_iter()
            .zip(sync_outcomes)
            .chain(async_probes.into_iter().zip(async_outcomes))
            .map(|(probe, outcome)| (probe.name, outcome))
            .collect();

        debug!("Probes settled, running fault battery");
        let faults = self
            .faults
            .run(self.runner.host().as_ref(), &run_id.to_string())
            .await;

        let outcomes: IndexMap<String, ProbeOutcome> = snapshot
            .into_iter()
            .map(|probe| {
                let outcome = settled
                    .remove(&probe.name)
                    .unwrap_or_else(|| ProbeOutcome::error("probe produced no outcome"));
                (probe.name, outcome)
            })
            .collect();

        let elapsed = clock.elapsed();

        let failed = outcomes.values().filter(|o| o.is_error()).count();
        info!(
            "Collected {} probes ({} failed) in {:?}",
            outcomes.len(),
            failed,
            elapsed
        );

        FingerprintRecord::new(run_id, started_at, elapsed, outcomes, faults)
    }
}

/// Builder for [`FingerprintOrchestrator`]
#[derive(Debug)]
pub struct FingerprintOrchestratorBuilder {
    host: Arc<dyn ProbeHost>,
    catalog: Option<Arc<ProbeCatalog>>,
    faults: Option<FaultProbeSequence>,
    settle_delay: Option<Duration>,
}

impl FingerprintOrchestratorBuilder {
    /// Share an existing catalog
    pub fn catalog(mut self, catalog: Arc<ProbeCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Replace the fault battery
    pub fn fault_sequence(mut self, faults: FaultProbeSequence) -> Self {
        self.faults = Some(faults);
        self
    }

    /// Override the battery's settle delay
    pub fn settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = Some(settle_delay);
        self
    }

    pub fn build(self) -> FingerprintOrchestrator {
        let mut faults = self.faults.unwrap_or_default();
        if let Some(settle_delay) = self.settle_delay {
            faults = faults.with_settle_delay(settle_delay);
        }

        FingerprintOrchestrator {
            catalog: self.catalog.unwrap_or_else(|| Arc::new(ProbeCatalog::with_builtins())),
            runner: ProbeRunner::new(self.host),
            faults,
        }
    }
}
