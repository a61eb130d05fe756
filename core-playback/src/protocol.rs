//! # Message Channel Records
//!
//! Wire format shared by the scripted element and the bridge.
//!
//! Commands travel script → bridge as `{id, action, data?}`; events travel
//! bridge → script as `{id, action, rate?, time?, duration?, volume?}` where
//! `action` is the reserved `on` prefix followed by the PascalCase canonical
//! name (`onPlay`, `onTimeUpdate`, ...).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{PlaybackError, Result};

/// Correlation id shared by a virtual element and its native session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Metadata fields accepted by `setMetadata`. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MetadataUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Number or string with a leading 4-digit year.
    pub year: Option<Value>,
    /// Cover art URL.
    pub cover: Option<String>,
    /// Duration hint in seconds.
    pub length: Option<f64>,
}

/// Parsed script command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandAction {
    Enable,
    SetSource(String),
    SetMetadata(MetadataUpdate),
    SetRate(f64),
    SetVolume(f64),
    Load,
    Play,
    Pause,
    Seek(f64),
    Destroy,
}

impl CommandAction {
    pub fn name(&self) -> &'static str {
        match self {
            CommandAction::Enable => "enable",
            CommandAction::SetSource(_) => "setSource",
            CommandAction::SetMetadata(_) => "setMetadata",
            CommandAction::SetRate(_) => "setRate",
            CommandAction::SetVolume(_) => "setVolume",
            CommandAction::Load => "load",
            CommandAction::Play => "play",
            CommandAction::Pause => "pause",
            CommandAction::Seek(_) => "seek",
            CommandAction::Destroy => "destroy",
        }
    }
}

/// A command record after validation. `id` is `None` only for `enable`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCommand {
    pub id: Option<SessionId>,
    pub action: CommandAction,
}

#[derive(Deserialize)]
struct RawCommand {
    #[serde(default)]
    id: Option<String>,
    action: String,
    #[serde(default)]
    data: Option<Value>,
}

impl ScriptCommand {
    /// Validates a raw message posted by the script.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::MalformedCommand`] for a missing or mistyped `id` or
    /// `data`, a non-finite number, or an unknown action.
    pub fn parse(value: Value) -> Result<Self> {
        let raw: RawCommand = serde_json::from_value(value)
            .map_err(|e| PlaybackError::MalformedCommand(e.to_string()))?;

        let action = match raw.action.as_str() {
            "enable" => {
                return Ok(Self {
                    id: None,
                    action: CommandAction::Enable,
                })
            }
            "setSource" => CommandAction::SetSource(string_data(&raw)?),
            "setMetadata" => {
                let data = raw.data.clone().ok_or_else(|| missing_data(&raw.action))?;
                if !data.is_object() {
                    return Err(PlaybackError::MalformedCommand(
                        "setMetadata expects an object".to_string(),
                    ));
                }
                let update = serde_json::from_value(data)
                    .map_err(|e| PlaybackError::MalformedCommand(e.to_string()))?;
                CommandAction::SetMetadata(update)
            }
            "setRate" => CommandAction::SetRate(number_data(&raw)?),
            "setVolume" => CommandAction::SetVolume(number_data(&raw)?),
            "load" => CommandAction::Load,
            "play" => CommandAction::Play,
            "pause" => CommandAction::Pause,
            "seek" => CommandAction::Seek(number_data(&raw)?),
            "destroy" => CommandAction::Destroy,
            other => {
                return Err(PlaybackError::MalformedCommand(format!(
                    "unknown action '{}'",
                    other
                )))
            }
        };

        let id = match raw.id {
            Some(id) if !id.is_empty() => SessionId::from(id),
            _ => {
                return Err(PlaybackError::MalformedCommand(format!(
                    "{} requires an id",
                    action.name()
                )))
            }
        };

        Ok(Self {
            id: Some(id),
            action,
        })
    }
}

fn missing_data(action: &str) -> PlaybackError {
    PlaybackError::MalformedCommand(format!("{} requires data", action))
}

fn string_data(raw: &RawCommand) -> Result<String> {
    match &raw.data {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(PlaybackError::MalformedCommand(format!(
            "{} expects a string",
            raw.action
        ))),
        None => Err(missing_data(&raw.action)),
    }
}

fn number_data(raw: &RawCommand) -> Result<f64> {
    match raw.data.as_ref().and_then(Value::as_f64) {
        Some(n) if n.is_finite() => Ok(n),
        Some(_) => Err(PlaybackError::MalformedCommand(format!(
            "{} expects a finite number",
            raw.action
        ))),
        None if raw.data.is_none() => Err(missing_data(&raw.action)),
        None => Err(PlaybackError::MalformedCommand(format!(
            "{} expects a number",
            raw.action
        ))),
    }
}

/// Canonical event vocabulary.
///
/// Serialized as the wire action (`on` + PascalCase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaAction {
    #[serde(rename = "onPlay")]
    Play,
    #[serde(rename = "onPlaying")]
    Playing,
    #[serde(rename = "onPause")]
    Pause,
    #[serde(rename = "onEnded")]
    Ended,
    #[serde(rename = "onSeeking")]
    Seeking,
    #[serde(rename = "onSeeked")]
    Seeked,
    #[serde(rename = "onStalled")]
    Stalled,
    #[serde(rename = "onLoadedMetadata")]
    LoadedMetadata,
    #[serde(rename = "onLoadedData")]
    LoadedData,
    #[serde(rename = "onTimeUpdate")]
    TimeUpdate,
    #[serde(rename = "onRateChange")]
    RateChange,
    #[serde(rename = "onDurationChange")]
    DurationChange,
    #[serde(rename = "onVolumeChange")]
    VolumeChange,
    #[serde(rename = "onCanPlay")]
    CanPlay,
    #[serde(rename = "onCanPlayThrough")]
    CanPlayThrough,
    #[serde(rename = "onNext")]
    Next,
    #[serde(rename = "onPrevious")]
    Previous,
}

impl MediaAction {
    pub const ALL: [MediaAction; 17] = [
        MediaAction::Play,
        MediaAction::Playing,
        MediaAction::Pause,
        MediaAction::Ended,
        MediaAction::Seeking,
        MediaAction::Seeked,
        MediaAction::Stalled,
        MediaAction::LoadedMetadata,
        MediaAction::LoadedData,
        MediaAction::TimeUpdate,
        MediaAction::RateChange,
        MediaAction::DurationChange,
        MediaAction::VolumeChange,
        MediaAction::CanPlay,
        MediaAction::CanPlayThrough,
        MediaAction::Next,
        MediaAction::Previous,
    ];

    /// Event name as dispatched to element listeners.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            MediaAction::Play => "play",
            MediaAction::Playing => "playing",
            MediaAction::Pause => "pause",
            MediaAction::Ended => "ended",
            MediaAction::Seeking => "seeking",
            MediaAction::Seeked => "seeked",
            MediaAction::Stalled => "stalled",
            MediaAction::LoadedMetadata => "loadedmetadata",
            MediaAction::LoadedData => "loadeddata",
            MediaAction::TimeUpdate => "timeupdate",
            MediaAction::RateChange => "ratechange",
            MediaAction::DurationChange => "durationchange",
            MediaAction::VolumeChange => "volumechange",
            MediaAction::CanPlay => "canplay",
            MediaAction::CanPlayThrough => "canplaythrough",
            MediaAction::Next => "next",
            MediaAction::Previous => "previous",
        }
    }

    /// Action string as it appears in an event record.
    pub fn wire_name(&self) -> &'static str {
        match self {
            MediaAction::Play => "onPlay",
            MediaAction::Playing => "onPlaying",
            MediaAction::Pause => "onPause",
            MediaAction::Ended => "onEnded",
            MediaAction::Seeking => "onSeeking",
            MediaAction::Seeked => "onSeeked",
            MediaAction::Stalled => "onStalled",
            MediaAction::LoadedMetadata => "onLoadedMetadata",
            MediaAction::LoadedData => "onLoadedData",
            MediaAction::TimeUpdate => "onTimeUpdate",
            MediaAction::RateChange => "onRateChange",
            MediaAction::DurationChange => "onDurationChange",
            MediaAction::VolumeChange => "onVolumeChange",
            MediaAction::CanPlay => "onCanPlay",
            MediaAction::CanPlayThrough => "onCanPlayThrough",
            MediaAction::Next => "onNext",
            MediaAction::Previous => "onPrevious",
        }
    }
}

/// Event record delivered to a content view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: SessionId,
    pub action: MediaAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl EventRecord {
    pub fn new(id: SessionId, action: MediaAction) -> Self {
        Self {
            id,
            action,
            rate: None,
            time: None,
            duration: None,
            volume: None,
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| PlaybackError::Internal(e.to_string()))
    }
}
