//! # Virtual Element
//!
//! The scripted side of the media session bridge. A [`VirtualElement`] stands
//! in for a media playback object inside a content view: it keeps an
//! optimistic shadow of playback state, posts commands to the host through a
//! [`ScriptChannel`] and reconciles the shadow with confirmed native events.
//!
//! ```ignore
//! let client = Client::new(channel);
//! client.enable();
//!
//! let mut element = client.create_element();
//! element.add_event_listener("timeupdate", |event| { /* ... */ });
//! element.set_src("https://example.com/track.mp3");
//! element.play();
//!
//! // Host events are routed back by the embedder:
//! element.receive_value(event_json)?;
//! ```

pub mod channel;
pub mod client;
pub mod element;
pub mod error;

pub use channel::{InboundEvent, OutboundCommand, ScriptChannel, EVENT_NAMES};
pub use client::Client;
pub use element::{ElementEvent, ElementMetadata, ListenerId, VirtualElement};
pub use error::{ElementError, Result};
