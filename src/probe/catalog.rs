//! Probe catalog
//!
//! Ordered, mutable table of probe definitions. Collections work on a
//! snapshot, so registration never races an in-flight run.

use indexmap::IndexMap;
use std::sync::RwLock;
use tracing::{debug, warn};

use super::builtin;
use super::outcome::FAULT_SEQUENCE_KEY;
use super::traits::{Executor, Probe, ProbeKind};

/// Ordered mapping from probe name to definition
#[derive(Debug)]
pub struct ProbeCatalog {
    probes: RwLock<IndexMap<String, Probe>>,
}

impl ProbeCatalog {
    /// Catalog pre-populated with the built-in probes
    pub fn with_builtins() -> Self {
        let catalog = Self::empty();
        {
            let mut probes = catalog.probes.write().unwrap_or_else(|e| e.into_inner());
            for probe in builtin::probes() {
                probes.insert(probe.name.clone(), probe);
            }
        }
        catalog
    }

    /// Catalog with no probes
    pub fn empty() -> Self {
        Self {
            probes: RwLock::new(IndexMap::new()),
        }
    }

    /// Insert or overwrite a probe; an overwritten probe keeps its position
    pub fn register<S: Into<String>>(&self, name: S, kind: ProbeKind, executor: Executor) {
        let name = name.into();
        if name == FAULT_SEQUENCE_KEY {
            warn!("Probe '{}' is shadowed by the fault sequence in serialized records", name);
        }

        let mut probes = self.probes.write().unwrap_or_else(|e| e.into_inner());
        let replaced = probes
            .insert(name.clone(), Probe::new(name.clone(), kind, executor))
            .is_some();
        debug!("Registered probe '{}' ({:?}, replaced: {})", name, kind, replaced);
    }

    /// Point-in-time copy of the registered probes, in catalog order
    pub fn snapshot(&self) -> Vec<Probe> {
        self.probes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.probes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.probes.read().unwrap_or_else(|e| e.into_inner()).contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.probes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}

impl Default for ProbeCatalog {
    fn default() -> Self {
        Self::with_builtins()
    }
}
