//! # Event Multiplexer
//!
//! Pure translation of session-level notifications into canonical event
//! records addressed to one element.
//!
//! The notification → action mapping is an explicit table. Two notifications
//! expand into a pair of records so that the element sees the same sequence a
//! built-in media object would produce:
//!
//! - `Play` → `play`, `playing`
//! - `Seeked` → `seeking`, `seeked`
//!
//! The native layer never produces `playing` or `seeking` itself.

use crate::protocol::{EventRecord, MediaAction, SessionId};

/// Notifications a native session raises for its element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeNotification {
    Play,
    Pause,
    Ended,
    Seeked,
    Stalled,
    Meta,
    Loaded,
    Time,
    Rate,
    Duration,
    Volume,
    CanPlay,
    CanPlayThrough,
    Next,
    Previous,
}

/// Numeric fields attached to a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Payload {
    pub rate: Option<f64>,
    pub time: Option<f64>,
    pub duration: Option<f64>,
    pub volume: Option<f64>,
}

impl Payload {
    pub fn rate(rate: f64) -> Self {
        Self {
            rate: Some(rate),
            ..Self::default()
        }
    }

    pub fn time(time: f64) -> Self {
        Self {
            time: Some(time),
            ..Self::default()
        }
    }

    pub fn duration(duration: Option<f64>) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn volume(volume: f64) -> Self {
        Self {
            volume: Some(volume),
            ..Self::default()
        }
    }
}

/// Canonical action for a notification.
pub fn action_for(notification: NativeNotification) -> MediaAction {
    match notification {
        NativeNotification::Play => MediaAction::Play,
        NativeNotification::Pause => MediaAction::Pause,
        NativeNotification::Ended => MediaAction::Ended,
        NativeNotification::Seeked => MediaAction::Seeked,
        NativeNotification::Stalled => MediaAction::Stalled,
        NativeNotification::Meta => MediaAction::LoadedMetadata,
        NativeNotification::Loaded => MediaAction::LoadedData,
        NativeNotification::Time => MediaAction::TimeUpdate,
        NativeNotification::Rate => MediaAction::RateChange,
        NativeNotification::Duration => MediaAction::DurationChange,
        NativeNotification::Volume => MediaAction::VolumeChange,
        NativeNotification::CanPlay => MediaAction::CanPlay,
        NativeNotification::CanPlayThrough => MediaAction::CanPlayThrough,
        NativeNotification::Next => MediaAction::Next,
        NativeNotification::Previous => MediaAction::Previous,
    }
}

/// Synthetic record inserted around the mapped one.
enum Synthetic {
    Before(MediaAction),
    After(MediaAction),
}

fn synthetic_for(notification: NativeNotification) -> Option<Synthetic> {
    match notification {
        NativeNotification::Play => Some(Synthetic::After(MediaAction::Playing)),
        NativeNotification::Seeked => Some(Synthetic::Before(MediaAction::Seeking)),
        _ => None,
    }
}

/// Translates one notification into the records the element receives, in
/// delivery order.
pub fn translate(id: &SessionId, notification: NativeNotification, payload: Payload) -> Vec<EventRecord> {
    let record = |action| EventRecord {
        id: id.clone(),
        action,
        rate: payload.rate,
        time: payload.time,
        duration: payload.duration,
        volume: payload.volume,
    };

    let primary = record(action_for(notification));
    match synthetic_for(notification) {
        Some(Synthetic::Before(action)) => vec![record(action), primary],
        Some(Synthetic::After(action)) => vec![primary, record(action)],
        None => vec![primary],
    }
}

/// Translates a batch of notifications, preserving order.
pub fn translate_all(
    id: &SessionId,
    notifications: impl IntoIterator<Item = (NativeNotification, Payload)>,
) -> Vec<EventRecord> {
    notifications
        .into_iter()
        .flat_map(|(notification, payload)| translate(id, notification, payload))
        .collect()
}
