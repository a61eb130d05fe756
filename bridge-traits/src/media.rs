//! Native media engine traits.
//!
//! The host owns the actual decode/render pipeline. From the bridge's point of
//! view it is a black box that plays a stream given a URL, reports a handful of
//! state changes through observers, and exposes a single device-wide volume.
//!
//! One [`NativePlayer`] is created per bridge session through
//! [`MediaEngine::create_player`]. Players are shared (`Arc`) because
//! asynchronous work such as loading or seeking runs on background tasks that
//! hold their own handle.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Readiness of the item currently installed in a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// No item installed, or the item has not resolved yet.
    Unknown,
    /// The installed item can start playback immediately.
    ReadyToPlay,
    /// The installed item failed to load.
    Failed,
}

/// An item whose asset finished loading and can be installed into a player.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedItem {
    /// Source URL the item was created from.
    pub url: String,
    /// Duration in seconds, when the asset reports a finite one.
    pub duration: Option<f64>,
    /// Opaque handle the engine uses to find its native object again.
    pub native_handle: u64,
}

impl PreparedItem {
    pub fn new(url: impl Into<String>, duration: Option<f64>, native_handle: u64) -> Self {
        Self {
            url: url.into(),
            duration: duration.filter(|d| d.is_finite() && *d >= 0.0),
            native_handle,
        }
    }
}

/// State changes a player reports to its registered observers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeSignal {
    /// Playback rate changed. `0.0` means paused.
    RateChanged { rate: f64 },
    /// The installed item played to its end.
    PlayedToEnd,
    /// Playback time jumped discontinuously (seek, scrub).
    TimeJumped { time: f64 },
    /// Playback stalled waiting for data.
    Stalled,
    /// Buffer sufficiency changed (`likely to keep up`).
    BufferStatus { sufficient: bool },
}

/// Callback target a player invokes for every observed [`NativeSignal`].
///
/// The sink is cheap to clone; the bridge hands one to a player per
/// registration and the player may call it from any thread.
#[derive(Clone)]
pub struct SignalSink {
    inner: Arc<dyn Fn(NativeSignal) + Send + Sync>,
}

impl SignalSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(NativeSignal) + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    pub fn emit(&self, signal: NativeSignal) {
        (self.inner)(signal)
    }
}

impl fmt::Debug for SignalSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSink").finish_non_exhaustive()
    }
}

/// Token returned by [`NativePlayer::add_observer`]; pass it back to remove
/// exactly that registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(pub u64);

/// Per-session native player.
///
/// Synchronous methods must not block; they mirror the fire-and-forget calls
/// of a platform player. `prepare`, `probe_duration` and `seek` complete later
/// and are driven from background tasks.
#[async_trait]
pub trait NativePlayer: Send + Sync {
    /// Resolve the asset behind `url` until it is ready to play.
    async fn prepare(&self, url: &str) -> Result<PreparedItem>;

    /// Load only the duration of the asset behind `url`.
    async fn probe_duration(&self, url: &str) -> Result<Option<f64>>;

    /// Install `item` as the current item, or clear the player with `None`.
    fn replace_item(&self, item: Option<PreparedItem>);

    /// Start buffering the installed item without starting playback.
    fn begin_buffering(&self);

    fn play(&self);

    fn pause(&self);

    fn set_rate(&self, rate: f64);

    fn rate(&self) -> f64;

    /// Current playback time in seconds.
    fn current_time(&self) -> f64;

    /// Readiness of the installed item. Periodic time updates only run while
    /// this reports [`ItemStatus::ReadyToPlay`].
    fn status(&self) -> ItemStatus;

    /// Move the playhead immediately without waiting for confirmation.
    fn jump_to(&self, time: f64);

    /// Seek and resolve with the confirmed playback time.
    async fn seek(&self, time: f64) -> Result<f64>;

    fn add_observer(&self, sink: SignalSink) -> Result<ObserverHandle>;

    fn remove_observer(&self, handle: ObserverHandle) -> Result<()>;
}

/// Process-wide media engine.
pub trait MediaEngine: Send + Sync {
    /// Configure the audio output category for background playback.
    fn configure_session(&self) -> Result<()>;

    /// Create a fresh player for a new session.
    fn create_player(&self) -> Result<Arc<dyn NativePlayer>>;

    /// Device output volume in `0.0..=1.0`.
    ///
    /// Volume is a device-level concept shared by every player.
    fn device_volume(&self) -> f64;

    fn set_device_volume(&self, volume: f64) -> Result<()>;
}

/// Encoded cover art. Decoding is left to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub data: Bytes,
    pub mime_type: Option<String>,
}

impl Artwork {
    pub fn new(data: impl Into<Bytes>, mime_type: Option<String>) -> Self {
        Self {
            data: data.into(),
            mime_type,
        }
    }
}

/// Fetches cover art for Now-Playing metadata.
#[async_trait]
pub trait ArtworkFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Artwork>;
}
