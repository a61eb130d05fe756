//! # Bridge Configuration
//!
//! Builder-based configuration for the media session bridge.
//!
//! ## Overview
//!
//! [`BridgeConfig`] bundles the host capabilities the bridge drives together
//! with the tunable [`PlaybackSettings`]. The builder fails fast when a
//! required capability is missing so that a misconfigured host is caught at
//! startup rather than on the first `play()`.
//!
//! ## Required Capabilities
//!
//! - `MediaEngine` - native player factory and device volume
//! - `NowPlayingCenter` - system Now-Playing metadata target
//! - `ControlSurface` - OS transport controls
//!
//! ## Optional Capabilities
//!
//! - `ArtworkFetcher` - cover art download (skipped when absent)
//! - `HapticFeedback` - feedback relay (requests ignored when absent)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::BridgeConfig;
//! use std::sync::Arc;
//!
//! let config = BridgeConfig::builder()
//!     .media_engine(Arc::new(MyEngine::new()))
//!     .now_playing(Arc::new(MyNowPlaying))
//!     .control_surface(Arc::new(MyRemoteCommands))
//!     .time_update_interval(Duration::from_millis(250))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{ArtworkFetcher, ControlSurface, HapticFeedback, MediaEngine, NowPlayingCenter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Tunable playback behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Interval of the periodic time observer while a session is playing.
    ///
    /// Default: 500ms.
    #[serde(default = "default_time_update_interval", with = "duration_millis")]
    pub time_update_interval: Duration,

    /// Rate applied while a seek-forward/backward control is held.
    ///
    /// Default: 3.0.
    #[serde(default = "default_seek_hold_rate")]
    pub seek_hold_rate: f64,

    /// Whether the skip-forward control is enabled on the surface.
    #[serde(default)]
    pub skip_forward_enabled: bool,

    /// Whether the skip-backward control is enabled on the surface.
    #[serde(default)]
    pub skip_backward_enabled: bool,

    /// Distance (seconds) within which a confirmed time settles an optimistic
    /// seek on the client side.
    ///
    /// Default: 1.0.
    #[serde(default = "default_seek_confirm_tolerance")]
    pub seek_confirm_tolerance: f64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            time_update_interval: default_time_update_interval(),
            seek_hold_rate: default_seek_hold_rate(),
            skip_forward_enabled: false,
            skip_backward_enabled: false,
            seek_confirm_tolerance: default_seek_confirm_tolerance(),
        }
    }
}

impl PlaybackSettings {
    pub fn validate(&self) -> Result<()> {
        if self.time_update_interval.is_zero() {
            return Err(Error::Config(
                "Time update interval must be greater than 0ms".to_string(),
            ));
        }

        if self.time_update_interval >= Duration::from_secs(1) {
            return Err(Error::Config(
                "Time update interval must be below one second".to_string(),
            ));
        }

        if !self.seek_hold_rate.is_finite() || self.seek_hold_rate <= 1.0 {
            return Err(Error::Config(
                "Seek hold rate must be a finite value greater than 1.0".to_string(),
            ));
        }

        if !self.seek_confirm_tolerance.is_finite() || self.seek_confirm_tolerance < 0.0 {
            return Err(Error::Config(
                "Seek confirm tolerance must be a finite, non-negative value".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_time_update_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_seek_hold_rate() -> f64 {
    3.0
}

fn default_seek_confirm_tolerance() -> f64 {
    1.0
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Complete bridge configuration. Build with [`BridgeConfig::builder`].
#[derive(Clone)]
pub struct BridgeConfig {
    pub media_engine: Arc<dyn MediaEngine>,
    pub now_playing: Arc<dyn NowPlayingCenter>,
    pub control_surface: Arc<dyn ControlSurface>,
    pub artwork_fetcher: Option<Arc<dyn ArtworkFetcher>>,
    pub haptics: Option<Arc<dyn HapticFeedback>>,
    pub settings: PlaybackSettings,
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("media_engine", &"MediaEngine { ... }")
            .field("now_playing", &"NowPlayingCenter { ... }")
            .field("control_surface", &"ControlSurface { ... }")
            .field(
                "artwork_fetcher",
                &self.artwork_fetcher.as_ref().map(|_| "ArtworkFetcher { ... }"),
            )
            .field(
                "haptics",
                &self.haptics.as_ref().map(|_| "HapticFeedback { ... }"),
            )
            .field("settings", &self.settings)
            .finish()
    }
}

impl BridgeConfig {
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        self.settings.validate()
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

/// Builder for [`BridgeConfig`].
#[derive(Default)]
pub struct BridgeConfigBuilder {
    media_engine: Option<Arc<dyn MediaEngine>>,
    now_playing: Option<Arc<dyn NowPlayingCenter>>,
    control_surface: Option<Arc<dyn ControlSurface>>,
    artwork_fetcher: Option<Arc<dyn ArtworkFetcher>>,
    haptics: Option<Arc<dyn HapticFeedback>>,
    settings: PlaybackSettings,
}

impl BridgeConfigBuilder {
    /// Sets the native media engine (required).
    pub fn media_engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.media_engine = Some(engine);
        self
    }

    /// Sets the Now-Playing centre (required).
    pub fn now_playing(mut self, center: Arc<dyn NowPlayingCenter>) -> Self {
        self.now_playing = Some(center);
        self
    }

    /// Sets the OS control surface (required).
    pub fn control_surface(mut self, surface: Arc<dyn ControlSurface>) -> Self {
        self.control_surface = Some(surface);
        self
    }

    /// Sets the cover art fetcher. Without one, `cover` metadata is ignored.
    pub fn artwork_fetcher(mut self, fetcher: Arc<dyn ArtworkFetcher>) -> Self {
        self.artwork_fetcher = Some(fetcher);
        self
    }

    /// Sets the haptic feedback relay. Without one, feedback is ignored.
    pub fn haptics(mut self, haptics: Arc<dyn HapticFeedback>) -> Self {
        self.haptics = Some(haptics);
        self
    }

    /// Replaces all playback settings at once.
    pub fn settings(mut self, settings: PlaybackSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn time_update_interval(mut self, interval: Duration) -> Self {
        self.settings.time_update_interval = interval;
        self
    }

    pub fn seek_hold_rate(mut self, rate: f64) -> Self {
        self.settings.seek_hold_rate = rate;
        self
    }

    pub fn skip_controls(mut self, forward: bool, backward: bool) -> Self {
        self.settings.skip_forward_enabled = forward;
        self.settings.skip_backward_enabled = backward;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityMissing`] when a required capability was not
    /// provided, and [`Error::Config`] when a setting is out of range.
    pub fn build(self) -> Result<BridgeConfig> {
        let media_engine = self.media_engine.ok_or_else(|| {
            capability_missing(
                "MediaEngine",
                "A MediaEngine is required to create native players. \
                 Inject the platform player adapter (AVPlayer, ExoPlayer, ...).",
            )
        })?;

        let now_playing = self.now_playing.ok_or_else(|| {
            capability_missing(
                "NowPlayingCenter",
                "A NowPlayingCenter is required to publish metadata. \
                 Desktop: use bridge_desktop::HeadlessNowPlaying.",
            )
        })?;

        let control_surface = self.control_surface.ok_or_else(|| {
            capability_missing(
                "ControlSurface",
                "A ControlSurface is required for transport controls. \
                 Desktop: use bridge_desktop::HeadlessControlSurface.",
            )
        })?;

        let config = BridgeConfig {
            media_engine,
            now_playing,
            control_surface,
            artwork_fetcher: self.artwork_fetcher,
            haptics: self.haptics,
            settings: self.settings,
        };

        config.validate()?;
        Ok(config)
    }
}
