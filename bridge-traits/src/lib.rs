//! # Host Bridge Traits
//!
//! Platform abstraction traits that each host must implement for the media
//! session bridge.
//!
//! ## Overview
//!
//! The bridge core never talks to a platform API directly. Everything it needs
//! from the host is expressed as a trait in this crate:
//!
//! ### Media
//! - [`MediaEngine`](media::MediaEngine) - audio session setup, device volume, player factory
//! - [`NativePlayer`](media::NativePlayer) - one player per session; async load, seek, observers
//! - [`ArtworkFetcher`](media::ArtworkFetcher) - best-effort cover art download
//!
//! ### System Integration
//! - [`ControlSurface`](surface::ControlSurface) - OS transport controls (lock screen, headset)
//! - [`NowPlayingCenter`](surface::NowPlayingCenter) - system Now-Playing metadata
//! - [`ContentView`](view::ContentView) - event delivery into the scripted page
//! - [`HapticFeedback`](feedback::HapticFeedback) - one-shot device effects
//!
//! ### Utilities
//! - [`LoggerSink`](log::LoggerSink) - forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it with an actionable message; the core
//! treats every adapter failure as non-fatal.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`. The core calls them from a single
//! serialized task, but background work (loading, seeking, artwork) holds
//! shared handles on other tasks.

pub mod error;
pub mod feedback;
pub mod log;
pub mod media;
pub mod surface;
pub mod view;

pub use error::BridgeError;

pub use feedback::{FeedbackKind, HapticFeedback};
pub use log::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media::{
    Artwork, ArtworkFetcher, ItemStatus, MediaEngine, NativePlayer, NativeSignal, ObserverHandle,
    PreparedItem, SignalSink,
};
pub use surface::{
    BindingGeneration, CommandBinding, CommandStatus, ControlSurface, NowPlayingCenter,
    NowPlayingInfo, SurfaceBindings, TransportCommand, TransportKind,
};
pub use view::{ContentView, ViewId, AUDIO_HANDLER, FEEDBACK_HANDLER};
