//! # Media Session Bridge
//!
//! Maps scripted audio elements to native playback sessions.
//!
//! ## Overview
//!
//! This crate handles:
//! - The message channel records exchanged with the script ([`protocol`])
//! - Translation of native notifications into element events ([`multiplexer`])
//! - One native session per element ([`session`])
//! - Arbitration of the single current session and the OS control surface
//!   ([`arbitrator`])
//! - The serialized state machine and its runtime task ([`bridge`], [`runtime`])
//!
//! All state lives on one tokio task. Hosts talk to it through a
//! [`BridgeHandle`].

pub mod arbitrator;
pub mod bridge;
pub mod error;
pub mod metadata;
pub mod multiplexer;
pub mod protocol;
pub mod runtime;
pub mod session;

pub use arbitrator::{Arbitrator, Promotion, Rejection};
pub use bridge::{BridgeMessage, BridgeSnapshot, Completion, MediaBridge};
pub use error::{PlaybackError, Result};
pub use multiplexer::{NativeNotification, Payload};
pub use protocol::{CommandAction, EventRecord, MediaAction, MetadataUpdate, ScriptCommand, SessionId};
pub use runtime::{BridgeHandle, BridgeRuntime};
pub use session::NativeSession;
