//! Client runtime installed into a content view.

use std::sync::Arc;

use bridge_traits::{AUDIO_HANDLER, FEEDBACK_HANDLER};
use core_runtime::PlaybackSettings;
use serde_json::Value;
use tracing::debug;

use crate::channel::{OutboundCommand, ScriptChannel};
use crate::element::VirtualElement;

/// Entry point of the scripted side: global commands and element factory.
#[derive(Clone)]
pub struct Client {
    channel: Arc<dyn ScriptChannel>,
    seek_tolerance: f64,
}

impl Client {
    pub fn new(channel: Arc<dyn ScriptChannel>) -> Self {
        Self::with_settings(channel, &PlaybackSettings::default())
    }

    pub fn with_settings(channel: Arc<dyn ScriptChannel>, settings: &PlaybackSettings) -> Self {
        Self {
            channel,
            seek_tolerance: settings.seek_confirm_tolerance,
        }
    }

    /// Asks the host to configure the audio session. Safe to repeat.
    pub fn enable(&self) {
        self.channel
            .post_message(AUDIO_HANDLER, OutboundCommand::enable().to_value());
    }

    /// Posts a bare haptic type string; the host ignores unknown values.
    pub fn feedback(&self, kind: &str) {
        debug!(kind, "Haptic feedback");
        self.channel
            .post_message(FEEDBACK_HANDLER, Value::String(kind.to_string()));
    }

    pub fn create_element(&self) -> VirtualElement {
        VirtualElement::with_tolerance(Arc::clone(&self.channel), self.seek_tolerance)
    }

    /// Creates an element and assigns `src` right away when it is non-empty.
    pub fn create_element_with_src(&self, src: &str) -> VirtualElement {
        let mut element = self.create_element();
        if !src.is_empty() {
            element.set_src(src);
        }
        element
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("seek_tolerance", &self.seek_tolerance)
            .finish_non_exhaustive()
    }
}
