//! Probe outcomes and the fingerprint record

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use super::traits::{FaultSlot, ProbeResult};

/// Record key holding the fault sequence slots
pub const FAULT_SEQUENCE_KEY: &str = "errorsGenerated";

/// Structured error marker, serialized as `{"error": true, "message": ...}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorOutcome {
    pub message: String,
}

impl ErrorOutcome {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self { message: message.into() }
    }

    /// Recognize the marker shape in a JSON value
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.len() != 2 || object.get("error") != Some(&Value::Bool(true)) {
            return None;
        }
        object
            .get("message")
            .and_then(|m| m.as_str())
            .map(ErrorOutcome::new)
    }
}

impl Serialize for ErrorOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("error", &true)?;
        map.serialize_entry("message", &self.message)?;
        map.end()
    }
}

/// Normalized result of one probe
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Value(Value),
    Error(ErrorOutcome),
}

impl ProbeOutcome {
    pub fn error<S: Into<String>>(message: S) -> Self {
        ProbeOutcome::Error(ErrorOutcome::new(message))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ProbeOutcome::Error(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            ProbeOutcome::Value(value) => Some(value),
            ProbeOutcome::Error(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ProbeOutcome::Value(_) => None,
            ProbeOutcome::Error(e) => Some(&e.message),
        }
    }

    /// JSON form as it appears in the record
    pub fn to_json(&self) -> Value {
        match self {
            ProbeOutcome::Value(value) => value.clone(),
            ProbeOutcome::Error(e) => serde_json::json!({ "error": true, "message": e.message }),
        }
    }
}

impl From<ProbeResult> for ProbeOutcome {
    fn from(result: ProbeResult) -> Self {
        match result {
            Ok(value) => ProbeOutcome::Value(value),
            Err(fault) => ProbeOutcome::error(fault.message()),
        }
    }
}

impl Serialize for ProbeOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ProbeOutcome::Value(value) => value.serialize(serializer),
            ProbeOutcome::Error(e) => e.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ProbeOutcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match ErrorOutcome::from_json(&value) {
            Some(e) => ProbeOutcome::Error(e),
            None => ProbeOutcome::Value(value),
        })
    }
}

/// Everything one collection run produced
#[derive(Debug, Clone)]
pub struct FingerprintRecord {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    elapsed: Duration,
    outcomes: IndexMap<String, ProbeOutcome>,
    faults: Vec<FaultSlot>,
}

impl FingerprintRecord {
    pub(crate) fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        outcomes: IndexMap<String, ProbeOutcome>,
        faults: Vec<FaultSlot>,
    ) -> Self {
        Self {
            run_id,
            started_at,
            elapsed,
            outcomes,
            faults,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Outcome of a probe by name
    pub fn outcome(&self, name: &str) -> Option<&ProbeOutcome> {
        self.outcomes.get(name)
    }

    /// All probe outcomes in snapshot order
    pub fn outcomes(&self) -> &IndexMap<String, ProbeOutcome> {
        &self.outcomes
    }

    /// Fault sequence slots in issue order
    pub fn faults(&self) -> &[FaultSlot] {
        &self.faults
    }

    /// Probe names in snapshot order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.outcomes.keys().map(|k| k.as_str())
    }

    /// Number of probe outcomes (the fault entry is not counted)
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Flat JSON object: one key per probe plus `errorsGenerated`
    pub fn to_json(&self) -> Value {
        let mut object = serde_json::Map::with_capacity(self.outcomes.len() + 1);
        for (name, outcome) in &self.outcomes {
            if name != FAULT_SEQUENCE_KEY {
                object.insert(name.clone(), outcome.to_json());
            }
        }
        object.insert(
            FAULT_SEQUENCE_KEY.to_string(),
            Value::Array(
                self.faults
                    .iter()
                    .map(|slot| slot.clone().map(Value::String).unwrap_or(Value::Null))
                    .collect(),
            ),
        );
        Value::Object(object)
    }
}

impl Serialize for FingerprintRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let shadowed = self.outcomes.contains_key(FAULT_SEQUENCE_KEY) as usize;
        let mut map = serializer.serialize_map(Some(self.outcomes.len() - shadowed + 1))?;
        for (name, outcome) in &self.outcomes {
            if name != FAULT_SEQUENCE_KEY {
                map.serialize_entry(name, outcome)?;
            }
        }
        map.serialize_entry(FAULT_SEQUENCE_KEY, &self.faults)?;
        map.end()
    }
}
