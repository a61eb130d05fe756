//! # Client Message Channel
//!
//! Records exchanged between a [`VirtualElement`](crate::VirtualElement) and the
//! host. Outbound commands are posted to the `audio` script handler as
//! `{id, action, data}`; inbound events arrive as `{id, action, ...fields}`
//! with the action in wire form (`onPlay`, `onTimeUpdate`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ElementError, Result};

/// Prefix every inbound wire action carries.
pub const EVENT_PREFIX: &str = "on";

/// Plain event names an element dispatches to its listeners.
pub const EVENT_NAMES: [&str; 17] = [
    "play",
    "playing",
    "pause",
    "ended",
    "seeking",
    "seeked",
    "stalled",
    "loadedmetadata",
    "loadeddata",
    "timeupdate",
    "ratechange",
    "durationchange",
    "volumechange",
    "canplay",
    "canplaythrough",
    "next",
    "previous",
];

/// Transport into the host's script message handlers.
///
/// Posting is fire-and-forget: the host never replies on this path, results
/// come back later as events.
pub trait ScriptChannel: Send + Sync {
    fn post_message(&self, handler: &str, body: Value);
}

/// Command sent from an element to its native session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl OutboundCommand {
    /// Session-less global initialisation.
    pub fn enable() -> Self {
        Self {
            id: None,
            action: "enable",
            data: None,
        }
    }

    pub fn new(id: &str, action: &'static str) -> Self {
        Self {
            id: Some(id.to_string()),
            action,
            data: None,
        }
    }

    pub fn with_data(id: &str, action: &'static str, data: impl Into<Value>) -> Self {
        Self {
            id: Some(id.to_string()),
            action,
            data: Some(data.into()),
        }
    }

    pub fn to_value(&self) -> Value {
        // Plain strings and JSON values only; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Event delivered from a native session.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InboundEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl InboundEvent {
    pub fn new(id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let event: InboundEvent = serde_json::from_value(value)?;
        if event.action.is_empty() {
            return Err(ElementError::MissingAction);
        }
        Ok(event)
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Plain listener name for this event, e.g. `onTimeUpdate` → `timeupdate`.
    ///
    /// `None` for unprefixed or unknown actions.
    pub fn event_name(&self) -> Option<String> {
        let rest = self.action.strip_prefix(EVENT_PREFIX)?;
        let name = rest.to_lowercase();
        EVENT_NAMES.contains(&name.as_str()).then_some(name)
    }
}
