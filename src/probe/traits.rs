//! Probe engine traits and core types
//!
//! A probe is a name, a kind and an executor. Executors either run inside the
//! host page (`Script`) or in-process (`Native`, `Deferred`); the runner
//! treats all three through the same [`ProbeResult`] boundary.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of running one executor, before normalization
pub type ProbeResult = std::result::Result<Value, Fault>;

/// One position of the fault sequence: `None` when nothing faulted there
pub type FaultSlot = Option<String>;

/// In-process synchronous executor
pub type NativeFn = Arc<dyn Fn() -> ProbeResult + Send + Sync>;

/// In-process deferred executor
pub type DeferredFn = Arc<dyn Fn() -> BoxFuture<'static, ProbeResult> + Send + Sync>;

/// Whether a probe completes immediately or yields a deferred computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    /// Runs to completion without suspending
    Sync,
    /// Produces a computation that is awaited
    Async,
}

impl ProbeKind {
    /// Map the boolean `is_async` registration flag to a kind
    pub fn from_async_flag(is_async: bool) -> Self {
        if is_async {
            ProbeKind::Async
        } else {
            ProbeKind::Sync
        }
    }

    pub fn is_async(self) -> bool {
        matches!(self, ProbeKind::Async)
    }
}

/// A fault raised by an executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// A bare value raised as a fault, stringified
    Message(String),
    /// A structured fault carrying a kind and a message
    Error { kind: String, message: String },
}

impl Fault {
    /// Structured fault
    pub fn error<K: Into<String>, M: Into<String>>(kind: K, message: M) -> Self {
        Fault::Error {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Text recorded in the outcome: verbatim for bare faults, the message field otherwise
    pub fn message(&self) -> &str {
        match self {
            Fault::Message(message) => message,
            Fault::Error { message, .. } => message,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl From<&str> for Fault {
    fn from(message: &str) -> Self {
        Fault::Message(message.to_string())
    }
}

impl From<String> for Fault {
    fn from(message: String) -> Self {
        Fault::Message(message)
    }
}

impl From<crate::Error> for Fault {
    fn from(err: crate::Error) -> Self {
        let kind = if err.is_transport() { "TransportError" } else { "HostError" };
        Fault::error(kind, err.to_string())
    }
}

/// How a probe produces its value
#[derive(Clone)]
pub enum Executor {
    /// JavaScript function body evaluated in the host page
    Script(String),
    /// In-process closure
    Native(NativeFn),
    /// In-process closure returning a future
    Deferred(DeferredFn),
}

impl Executor {
    pub fn script<S: Into<String>>(body: S) -> Self {
        Executor::Script(body.into())
    }

    pub fn native<F>(f: F) -> Self
    where
        F: Fn() -> ProbeResult + Send + Sync + 'static,
    {
        Executor::Native(Arc::new(f))
    }

    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProbeResult> + Send + 'static,
    {
        Executor::Deferred(Arc::new(move || f().boxed()))
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Executor::Script(body) => f.debug_tuple("Script").field(&format_args!("{} bytes", body.len())).finish(),
            Executor::Native(_) => f.write_str("Native(..)"),
            Executor::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// A registered probe
#[derive(Debug, Clone)]
pub struct Probe {
    pub name: String,
    pub kind: ProbeKind,
    pub executor: Executor,
}

impl Probe {
    pub fn new<S: Into<String>>(name: S, kind: ProbeKind, executor: Executor) -> Self {
        Self {
            name: name.into(),
            kind,
            executor,
        }
    }
}

/// Where a battery operation's fault becomes visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FaultDelivery {
    /// Faults synchronously and is caught at the call site
    Inline,
    /// Schedules work whose fault only reaches the global observer
    OutOfBand,
}

/// One deliberately faulting operation of the fault battery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultOperation {
    pub name: String,
    pub delivery: FaultDelivery,
    /// JavaScript statement(s) issued in the host
    pub body: String,
}

impl FaultOperation {
    pub fn inline<N: Into<String>, B: Into<String>>(name: N, body: B) -> Self {
        Self {
            name: name.into(),
            delivery: FaultDelivery::Inline,
            body: body.into(),
        }
    }

    pub fn out_of_band<N: Into<String>, B: Into<String>>(name: N, body: B) -> Self {
        Self {
            name: name.into(),
            delivery: FaultDelivery::OutOfBand,
            body: body.into(),
        }
    }
}

/// The environment probes run against
///
/// Errors returned here are host failures (transport, decoding). Faults
/// raised by probe bodies come back as `Err` entries inside `Ok` results.
///
/// Fault observers see page-global events, so every observer installed at
/// the same time logs every out-of-band fault. Callers hold
/// [`ProbeHost::fault_window`] from install to drain so that only one
/// battery is in flight per host. Hosts cloned from one another share the
/// window; orchestrators collecting from the same page must share a host.
#[async_trait]
pub trait ProbeHost: Send + Sync + fmt::Debug {
    /// Run synchronous script bodies in one host turn, one result per body
    async fn evaluate_batch(&self, bodies: &[String]) -> crate::Result<Vec<ProbeResult>>;

    /// Run one asynchronous script body and await its settlement
    ///
    /// A body that never settles is bounded by the host's own round-trip
    /// limit. Over CDP that is the `Runtime.evaluate` command timeout, after
    /// which the probe's outcome is the timeout error rather than an
    /// indefinitely delayed record.
    async fn evaluate_async(&self, body: &str) -> crate::Result<ProbeResult>;

    /// Lock serializing install, issue, settle and drain of fault batteries
    fn fault_window(&self) -> Arc<Mutex<()>>;

    /// Install the global fault observer for a run
    async fn install_fault_observer(&self, run_id: &str) -> crate::Result<()>;

    /// Issue the battery in order; returns the inline fault slots
    async fn issue_faults(&self, run_id: &str, operations: &[FaultOperation]) -> crate::Result<Vec<FaultSlot>>;

    /// Return the run's observed fault log and uninstall its observer
    async fn drain_fault_observer(&self, run_id: &str) -> crate::Result<Vec<String>>;
}
