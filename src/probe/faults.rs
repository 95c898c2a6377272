//! Fault probe sequence
//!
//! Issues a fixed battery of deliberately faulting operations and records
//! which positions faulted. Inline faults are caught where they happen;
//! out-of-band faults are seen only by a per-run global observer and are
//! matched to operations by ordinal, which assumes the host reports them in
//! issue order. Runs sharing a host take turns through its fault window.

use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::traits::{FaultDelivery, FaultOperation, FaultSlot, ProbeHost};

/// Wait between issuing the battery and draining the observer
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(250);

/// Standard battery: (name, delivery, body)
const STANDARD_BATTERY: [(&str, FaultDelivery, &str); 8] = [
    ("undefinedReference", FaultDelivery::Inline, "azeaze + 3;"),
    (
        "permissionsQuerySource",
        FaultDelivery::Inline,
        "Function.prototype.toString.call(navigator.permissions.query);",
    ),
    ("webglContext", FaultDelivery::Inline, "document.createElement('canvas').getContext('webgl');"),
    ("resolvedTimeZone", FaultDelivery::Inline, "new Intl.DateTimeFormat().resolvedOptions().timeZone;"),
    ("blobSize", FaultDelivery::Inline, "new Blob(['fpcollect']).size;"),
    (
        "permissionsRejection",
        FaultDelivery::OutOfBand,
        "navigator.permissions.query({ name: 'notifications' }).then(() => {});",
    ),
    (
        "animationFrameTimer",
        FaultDelivery::OutOfBand,
        "setTimeout(() => { requestAnimationFrame(() => {}); }, 0);",
    ),
    ("malformedWebSocket", FaultDelivery::Inline, "new WebSocket('itsgonnafail');"),
];

/// Ordered battery plus its settle delay
#[derive(Debug, Clone)]
pub struct FaultProbeSequence {
    operations: Vec<FaultOperation>,
    settle_delay: Duration,
}

impl FaultProbeSequence {
    /// The standard eight-operation battery
    pub fn standard() -> Self {
        Self::new(
            STANDARD_BATTERY
                .iter()
                .map(|(name, delivery, body)| FaultOperation {
                    name: name.to_string(),
                    delivery: *delivery,
                    body: body.to_string(),
                })
                .collect(),
        )
    }

    /// Custom battery with the default settle delay
    pub fn new(operations: Vec<FaultOperation>) -> Self {
        Self {
            operations,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn operations(&self) -> &[FaultOperation] {
        &self.operations
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Run the battery once; host failures degrade to `None` slots.
    ///
    /// The host's fault window is held for the whole run, so a concurrent run
    /// on the same host waits here instead of logging this run's faults.
    #[instrument(skip(self, host), fields(operations = self.operations.len()))]
    pub async fn run(&self, host: &dyn ProbeHost, run_id: &str) -> Vec<FaultSlot> {
        let window = host.fault_window();
        let _window = window.lock().await;

        let installed = match host.install_fault_observer(run_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to install fault observer: {}", e);
                false
            }
        };

        let inline = match host.issue_faults(run_id, &self.operations).await {
            Ok(slots) => slots,
            Err(e) => {
                warn!("Failed to issue fault battery: {}", e);
                Vec::new()
            }
        };

        let log = if installed {
            tokio::time::sleep(self.settle_delay).await;
            match host.drain_fault_observer(run_id).await {
                Ok(log) => log,
                Err(e) => {
                    warn!("Failed to drain fault observer: {}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        debug!("Battery produced {} inline slots and {} logged faults", inline.len(), log.len());
        correlate(&self.operations, inline, log)
    }
}

impl Default for FaultProbeSequence {
    fn default() -> Self {
        Self::standard()
    }
}

/// Build one slot per operation.
///
/// An inline fault wins its own position. Otherwise the k-th out-of-band
/// operation without an inline fault takes the k-th logged fault.
pub fn correlate(operations: &[FaultOperation], mut inline: Vec<FaultSlot>, log: Vec<String>) -> Vec<FaultSlot> {
    if inline.len() != operations.len() {
        warn!(
            "Host returned {} inline slots for {} operations",
            inline.len(),
            operations.len()
        );
        inline.resize(operations.len(), None);
    }

    let mut logged = log.into_iter();
    let slots: Vec<FaultSlot> = operations
        .iter()
        .zip(inline)
        .map(|(operation, slot)| match (slot, operation.delivery) {
            (Some(message), _) => Some(message),
            (None, FaultDelivery::OutOfBand) => logged.next(),
            (None, FaultDelivery::Inline) => None,
        })
        .collect();

    let unmatched: Vec<String> = logged.collect();
    if !unmatched.is_empty() {
        warn!("{} logged faults matched no out-of-band operation: {:?}", unmatched.len(), unmatched);
    }

    slots
}
