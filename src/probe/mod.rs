//! # Probe orchestration engine
//!
//! Runs a catalogue of independent probes against a [`ProbeHost`], isolates
//! every failure into the record, and appends the fault sequence.
//!
//! ## Module structure
//! - `traits`: probe types and the `ProbeHost` seam
//! - `outcome`: outcomes and the fingerprint record
//! - `catalog`: ordered, mutable probe table
//! - `builtin`: the built-in probe bodies
//! - `runner`: per-probe failure isolation
//! - `faults`: the fault battery and its correlation
//! - `orchestrator`: one collection run end to end
//! - `scripts`: page-side wrappers
//! - `host`: `ProbeHost` over CDP
//! - `mock`: scripted host for tests
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use fpcollect::probe::{Executor, FingerprintOrchestrator, MockProbeHost, ProbeKind};
//!
//! # async fn example() {
//! let orchestrator = FingerprintOrchestrator::new(Arc::new(MockProbeHost::chromium()));
//! orchestrator.register("alwaysThrows", ProbeKind::Sync, Executor::script("throw 'boom';"));
//!
//! let record = orchestrator.generate().await;
//! println!("{}", record.to_json());
//! # }
//! ```

pub mod traits;
pub mod outcome;
pub mod catalog;
pub mod builtin;
pub mod runner;
pub mod faults;
pub mod orchestrator;
pub mod scripts;
pub mod host;
pub mod mock;

#[cfg(test)]
mod tests;

pub use traits::{
    Executor, Fault, FaultDelivery, FaultOperation, FaultSlot, Probe, ProbeHost, ProbeKind, ProbeResult,
};
pub use outcome::{ErrorOutcome, FingerprintRecord, ProbeOutcome, FAULT_SEQUENCE_KEY};
pub use catalog::ProbeCatalog;
pub use runner::ProbeRunner;
pub use faults::{FaultProbeSequence, DEFAULT_SETTLE_DELAY};
pub use orchestrator::{FingerprintOrchestrator, FingerprintOrchestratorBuilder};
pub use host::CdpProbeHost;
pub use mock::MockProbeHost;
