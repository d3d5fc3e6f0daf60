use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Form body posted to the control service. Serializes flat, e.g.
/// `action=set_classifiers&value=water`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlRequest {
    GetLatestMeta,
    SetClassifiers { value: String },
    SetFixedSetpoint { value: String },
    SetTemperatureTarget { value: String },
    SetHobOff,
    Quit,
}

impl ControlRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetLatestMeta => "get_latest_meta",
            Self::SetClassifiers { .. } => "set_classifiers",
            Self::SetFixedSetpoint { .. } => "set_fixed_setpoint",
            Self::SetTemperatureTarget { .. } => "set_temperature_target",
            Self::SetHobOff => "set_hob_off",
            Self::Quit => "quit",
        }
    }

    /// Builds an actuator command from its wire name. `get_latest_meta` is
    /// not a command and is rejected.
    pub fn command(name: &str, value: Option<String>) -> Option<Self> {
        match (name, value) {
            ("set_classifiers", Some(value)) => Some(Self::SetClassifiers { value }),
            ("set_fixed_setpoint", Some(value)) => Some(Self::SetFixedSetpoint { value }),
            ("set_temperature_target", Some(value)) => Some(Self::SetTemperatureTarget { value }),
            ("set_hob_off", None) => Some(Self::SetHobOff),
            ("quit", None) => Some(Self::Quit),
            _ => None,
        }
    }
}

/// One reading of the remote process state, replaced as a whole on every
/// successful poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: TelemetryAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryAttributes {
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub interval: Option<f64>,
    #[serde(default)]
    pub classification_data: HashMap<String, HashMap<String, Classification>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub boolean: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl TelemetrySnapshot {
    pub fn interval(&self) -> Option<f64> {
        self.attributes.interval
    }

    /// `None` when the snapshot carries no result for `model`/`label`.
    pub fn classification(&self, model: &str, label: &str) -> Option<bool> {
        self.attributes
            .classification_data
            .get(model)?
            .get(label)
            .map(|result| result.boolean)
    }

    /// Parses a `get_latest_meta` body. The control service sometimes
    /// returns the meta object encoded a second time as a JSON string.
    pub fn from_json_value(value: Value) -> serde_json::Result<Self> {
        match value {
            Value::String(raw) => serde_json::from_str(&raw),
            other => serde_json::from_value(other),
        }
    }
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(raw)) => raw.trim().parse::<f64>().ok(),
        _ => None,
    })
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
