//! Headless system integration for desktop hosts.
//!
//! Desktop builds have no lock screen or remote-command centre to drive, so
//! these adapters keep the published state in memory where a host UI (tray
//! icon, media keys) can read it.

use bridge_traits::{
    error::{BridgeError, Result},
    feedback::{FeedbackKind, HapticFeedback},
    surface::{BindingGeneration, ControlSurface, NowPlayingCenter, NowPlayingInfo, SurfaceBindings},
};
use parking_lot::RwLock;
use tracing::{debug, info, trace};

/// In-memory Now-Playing centre.
#[derive(Default)]
pub struct HeadlessNowPlaying {
    info: RwLock<Option<NowPlayingInfo>>,
}

impl HeadlessNowPlaying {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently published info, if any.
    pub fn snapshot(&self) -> Option<NowPlayingInfo> {
        self.info.read().clone()
    }
}

impl NowPlayingCenter for HeadlessNowPlaying {
    fn publish(&self, info: &NowPlayingInfo) {
        debug!(
            title = info.title.as_deref().unwrap_or_default(),
            has_artwork = info.artwork.is_some(),
            "Now playing"
        );
        *self.info.write() = Some(info.clone());
    }

    fn update_playback(&self, elapsed: f64, rate: f64) {
        trace!(elapsed, rate, "Now playing position");
        if let Some(info) = self.info.write().as_mut() {
            info.elapsed = Some(elapsed);
            info.rate = Some(rate);
        }
    }

    fn clear(&self) {
        debug!("Now playing cleared");
        *self.info.write() = None;
    }
}

/// In-memory control surface holding the installed binding set.
#[derive(Default)]
pub struct HeadlessControlSurface {
    installed: RwLock<Option<SurfaceBindings>>,
}

impl HeadlessControlSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn installed(&self) -> Option<SurfaceBindings> {
        self.installed.read().clone()
    }

    /// Generation to tag forwarded media-key commands with.
    pub fn generation(&self) -> Option<BindingGeneration> {
        self.installed.read().as_ref().map(|b| b.generation)
    }
}

impl ControlSurface for HeadlessControlSurface {
    fn install(&self, bindings: &SurfaceBindings) -> Result<()> {
        let mut installed = self.installed.write();
        if let Some(existing) = installed.as_ref() {
            return Err(BridgeError::OperationFailed(format!(
                "Bindings {} still installed",
                existing.generation.0
            )));
        }
        info!(generation = bindings.generation.0, "Control surface installed");
        *installed = Some(bindings.clone());
        Ok(())
    }

    fn remove(&self, generation: BindingGeneration) -> Result<()> {
        let mut installed = self.installed.write();
        match installed.as_ref() {
            Some(existing) if existing.generation == generation => {
                *installed = None;
                info!(generation = generation.0, "Control surface removed");
                Ok(())
            }
            _ => Err(BridgeError::OperationFailed(format!(
                "Bindings {} not installed",
                generation.0
            ))),
        }
    }
}

/// Haptics for hosts without a vibration motor: log the request.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHaptics;

impl HapticFeedback for TracingHaptics {
    fn trigger(&self, kind: FeedbackKind) {
        debug!(kind = kind.as_str(), "Haptic feedback");
    }
}
