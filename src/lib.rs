//! fpcollect: browser environment fingerprint collector
//!
//! Runs a catalogue of environment probes inside a page reached over the
//! Chrome DevTools Protocol and assembles one flat fingerprint record,
//! including the fault sequence used to tell instrumented hosts apart.

pub mod error;
pub mod config;

pub mod cdp;
pub mod probe;
pub mod session;

// Re-exports
pub use error::{Error, Result};
pub use config::Config;
pub use probe::{
    CdpProbeHost, Executor, Fault, FaultProbeSequence, FingerprintOrchestrator, FingerprintRecord,
    ProbeCatalog, ProbeHost, ProbeKind, ProbeOutcome,
};
pub use session::PageSession;

/// fpcollect library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
