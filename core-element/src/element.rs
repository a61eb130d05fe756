//! # Virtual Element
//!
//! Script-side stand-in for a media playback object. Every setter updates an
//! optimistic shadow copy of the state and posts a command to the native
//! session; confirmed values flow back through [`VirtualElement::receive`].
//!
//! ## Shadow state
//!
//! | Field | Default | Updated by |
//! |-------|---------|------------|
//! | `src` | `""` | [`set_src`](VirtualElement::set_src) |
//! | `current_time` | `0.0` | `time` payloads |
//! | `pending_seek` | `None` | [`set_current_time`](VirtualElement::set_current_time), cleared on confirmation |
//! | `playback_rate` | `0.0` | setter, `rate` payloads |
//! | `duration` | `None` | `duration` payloads |
//! | `volume` | `1.0` | setter, `volume` payloads |
//! | `muted` | `0.0` | pre-mute volume while muted |
//! | `preload` | `"none"` | [`set_preload`](VirtualElement::set_preload) |
//! | `paused` | `true` | play/playing/pause/ended events |
//!
//! `playback_rate` mirrors the native rate, so a paused element reports `0.0`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bridge_traits::AUDIO_HANDLER;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::channel::{InboundEvent, OutboundCommand, ScriptChannel};
use crate::error::Result;

pub const DEFAULT_PRELOAD: &str = "none";
pub const DEFAULT_SEEK_TOLERANCE: f64 = 1.0;

/// Metadata an element forwards to the system Now-Playing display.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ElementMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// Year as a number or a date-like string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<Value>,
    /// Cover art URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    /// Length in seconds, used until the native duration is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
}

/// Event handed to listeners after the shadow state was updated.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementEvent {
    /// Plain event name, e.g. `timeupdate`.
    pub name: String,
    pub record: InboundEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&ElementEvent) + Send>;

#[derive(Debug, Clone, PartialEq)]
struct ShadowState {
    src: String,
    current_time: f64,
    pending_seek: Option<f64>,
    playback_rate: f64,
    duration: Option<f64>,
    volume: f64,
    muted: f64,
    metadata: ElementMetadata,
    preload: String,
    paused: bool,
}

impl Default for ShadowState {
    fn default() -> Self {
        Self {
            src: String::new(),
            current_time: 0.0,
            pending_seek: None,
            playback_rate: 0.0,
            duration: None,
            volume: 1.0,
            muted: 0.0,
            metadata: ElementMetadata::default(),
            preload: DEFAULT_PRELOAD.to_string(),
            paused: true,
        }
    }
}

pub struct VirtualElement {
    id: String,
    channel: Arc<dyn ScriptChannel>,
    state: ShadowState,
    destroyed: bool,
    torn_down: bool,
    seek_tolerance: f64,
    listeners: HashMap<String, Vec<(ListenerId, Listener)>>,
    next_listener: u64,
}

impl VirtualElement {
    pub fn new(channel: Arc<dyn ScriptChannel>) -> Self {
        Self::with_tolerance(channel, DEFAULT_SEEK_TOLERANCE)
    }

    /// Creates an element whose pending seeks clear once a confirmed time
    /// lands within `seek_tolerance` of the target.
    pub fn with_tolerance(channel: Arc<dyn ScriptChannel>, seek_tolerance: f64) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        debug!(element = %id, "Virtual element created");
        Self {
            id,
            channel,
            state: ShadowState::default(),
            destroyed: false,
            torn_down: false,
            seek_tolerance,
            listeners: HashMap::new(),
            next_listener: 1,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn post(&self, command: OutboundCommand) {
        trace!(element = %self.id, action = command.action, "Posting command");
        self.channel.post_message(AUDIO_HANDLER, command.to_value());
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub fn play(&self) {
        self.post(OutboundCommand::new(&self.id, "play"));
    }

    pub fn pause(&self) {
        self.post(OutboundCommand::new(&self.id, "pause"));
    }

    /// Seeks without recording an optimistic position.
    pub fn fast_seek(&self, time: f64) {
        self.post(OutboundCommand::with_data(&self.id, "seek", time));
    }

    // ------------------------------------------------------------------
    // Shadowed properties
    // ------------------------------------------------------------------

    /// Pending seek target if one is outstanding, else the confirmed time.
    pub fn current_time(&self) -> f64 {
        self.state
            .pending_seek
            .unwrap_or(self.state.current_time)
            .max(0.0)
    }

    /// Records an optimistic position and seeks. A non-finite time clears
    /// any pending seek and sends nothing.
    pub fn set_current_time(&mut self, time: f64) {
        if !time.is_finite() {
            self.state.pending_seek = None;
            return;
        }
        self.state.pending_seek = Some(time);
        self.post(OutboundCommand::with_data(&self.id, "seek", time));
    }

    pub fn pending_seek(&self) -> Option<f64> {
        self.state.pending_seek
    }

    pub fn src(&self) -> &str {
        &self.state.src
    }

    /// Assigns a new source. An empty source destroys the element.
    pub fn set_src(&mut self, src: &str) {
        if src.is_empty() {
            self.set_destroyed(true);
            return;
        }

        self.destroyed = false;
        self.state.src = src.to_string();
        self.post(OutboundCommand::with_data(&self.id, "setSource", src));

        if self.state.preload == "auto" {
            self.post(OutboundCommand::new(&self.id, "load"));
        }
    }

    pub fn preload(&self) -> &str {
        &self.state.preload
    }

    /// `""` and `"auto"` request buffering immediately if a source is set;
    /// other values are stored only.
    pub fn set_preload(&mut self, preload: &str) {
        self.state.preload = preload.to_string();
        let requests_load = preload.is_empty() || preload == "auto";
        if requests_load && !self.state.src.is_empty() {
            self.post(OutboundCommand::new(&self.id, "load"));
        }
    }

    pub fn volume(&self) -> f64 {
        self.state.volume
    }

    /// A nonzero volume also drops the remembered pre-mute level.
    pub fn set_volume(&mut self, volume: f64) {
        let volume = volume.clamp(0.0, 1.0);
        self.state.volume = volume;
        if volume != 0.0 {
            self.state.muted = 0.0;
        }
        self.post(OutboundCommand::with_data(&self.id, "setVolume", volume));
    }

    pub fn muted(&self) -> bool {
        self.state.muted != 0.0
    }

    pub fn set_muted(&mut self, muted: bool) {
        if muted {
            if self.state.volume == 0.0 {
                return;
            }
            self.state.muted = self.state.volume;
            self.state.volume = 0.0;
            self.post(OutboundCommand::with_data(&self.id, "setVolume", 0.0));
        } else {
            if self.state.muted == 0.0 {
                return;
            }
            let restored = std::mem::take(&mut self.state.muted);
            self.state.volume = restored;
            self.post(OutboundCommand::with_data(&self.id, "setVolume", restored));
        }
    }

    pub fn playback_rate(&self) -> f64 {
        self.state.playback_rate
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        self.state.playback_rate = rate;
        self.post(OutboundCommand::with_data(&self.id, "setRate", rate));
    }

    /// `None` until the native side reports a duration.
    pub fn duration(&self) -> Option<f64> {
        self.state.duration
    }

    pub fn metadata(&self) -> &ElementMetadata {
        &self.state.metadata
    }

    pub fn set_metadata(&mut self, metadata: ElementMetadata) {
        let data = serde_json::to_value(&metadata).unwrap_or(Value::Null);
        self.state.metadata = metadata;
        self.post(OutboundCommand::with_data(&self.id, "setMetadata", data));
    }

    pub fn paused(&self) -> bool {
        self.state.paused
    }

    pub fn destroyed(&self) -> bool {
        self.destroyed
    }

    /// Destroying resets the shadow state and tears down the native session.
    ///
    /// Only the first `true` write has an effect; `false` is ignored, a new
    /// source revives the element instead.
    pub fn set_destroyed(&mut self, destroyed: bool) {
        if !destroyed || self.destroyed {
            return;
        }

        self.state = ShadowState::default();
        self.destroyed = true;
        debug!(element = %self.id, "Virtual element destroyed");
        self.post(OutboundCommand::new(&self.id, "destroy"));
    }

    /// Unload hook. Destroys the element the first time it runs.
    pub fn teardown(&mut self) {
        if std::mem::replace(&mut self.torn_down, true) {
            return;
        }
        self.set_destroyed(true);
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn add_event_listener<F>(&mut self, name: &str, listener: F) -> ListenerId
    where
        F: FnMut(&ElementEvent) + Send + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners
            .entry(name.to_string())
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        for listeners in self.listeners.values_mut() {
            if let Some(index) = listeners.iter().position(|(lid, _)| *lid == id) {
                listeners.remove(index);
                return true;
            }
        }
        false
    }

    /// Decodes a raw event record and applies it.
    pub fn receive_value(&mut self, value: Value) -> Result<()> {
        let event = InboundEvent::from_value(value)?;
        self.receive(event);
        Ok(())
    }

    /// Applies an event record addressed to this element.
    pub fn receive(&mut self, event: InboundEvent) {
        if event.id != self.id || self.destroyed {
            return;
        }

        if let Some(rate) = event.rate {
            self.state.playback_rate = rate;
        }
        if let Some(time) = event.time {
            self.confirm_time(time);
        }
        if let Some(duration) = event.duration {
            self.state.duration = Some(duration);
        }
        if let Some(volume) = event.volume {
            self.state.volume = volume;
            if volume != 0.0 {
                self.state.muted = 0.0;
            }
        }

        let Some(name) = event.event_name() else {
            trace!(element = %self.id, action = %event.action, "Ignoring unknown action");
            return;
        };

        match name.as_str() {
            "play" | "playing" => self.state.paused = false,
            "pause" | "ended" => self.state.paused = true,
            _ => {}
        }

        let dispatched = ElementEvent {
            name,
            record: event,
        };
        if let Some(listeners) = self.listeners.get_mut(&dispatched.name) {
            for (_, listener) in listeners.iter_mut() {
                listener(&dispatched);
            }
        }
    }

    fn confirm_time(&mut self, time: f64) {
        self.state.current_time = time;
        if let Some(pending) = self.state.pending_seek {
            if (time - pending).abs() <= self.seek_tolerance {
                self.state.pending_seek = None;
            }
        }
    }
}

impl Drop for VirtualElement {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for VirtualElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualElement")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("destroyed", &self.destroyed)
            .field(
                "listeners",
                &self.listeners.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}
