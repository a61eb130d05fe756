//! System control surface and Now-Playing abstractions.
//!
//! The control surface is the OS-level set of transport controls (lock
//! screen, headset buttons, remote accessories). The bridge installs a full
//! set of [`CommandBinding`]s when a session first becomes current, replaces
//! the whole set on every hand-off and removes it when the current session is
//! destroyed. The host forwards OS commands back to the bridge together with
//! the [`BindingGeneration`] it was installed with, so commands aimed at a
//! previous binding set can be rejected.

use chrono::NaiveDate;

use crate::error::Result;
use crate::media::Artwork;

/// Transport commands the OS can send.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportCommand {
    Play,
    Pause,
    /// Scrub to an absolute position in seconds.
    ChangePlaybackPosition(f64),
    /// Press-and-hold fast forward. `begin == false` marks the release.
    SeekForward { begin: bool },
    /// Press-and-hold rewind. `begin == false` marks the release.
    SeekBackward { begin: bool },
    NextTrack,
    PreviousTrack,
    SkipForward { interval: f64 },
    SkipBackward { interval: f64 },
}

impl TransportCommand {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportCommand::Play => TransportKind::Play,
            TransportCommand::Pause => TransportKind::Pause,
            TransportCommand::ChangePlaybackPosition(_) => TransportKind::ChangePlaybackPosition,
            TransportCommand::SeekForward { .. } => TransportKind::SeekForward,
            TransportCommand::SeekBackward { .. } => TransportKind::SeekBackward,
            TransportCommand::NextTrack => TransportKind::NextTrack,
            TransportCommand::PreviousTrack => TransportKind::PreviousTrack,
            TransportCommand::SkipForward { .. } => TransportKind::SkipForward,
            TransportCommand::SkipBackward { .. } => TransportKind::SkipBackward,
        }
    }
}

/// Payload-free discriminant of [`TransportCommand`], used for bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Play,
    Pause,
    ChangePlaybackPosition,
    SeekForward,
    SeekBackward,
    NextTrack,
    PreviousTrack,
    SkipForward,
    SkipBackward,
}

impl TransportKind {
    pub const ALL: [TransportKind; 9] = [
        TransportKind::Play,
        TransportKind::Pause,
        TransportKind::ChangePlaybackPosition,
        TransportKind::SeekForward,
        TransportKind::SeekBackward,
        TransportKind::NextTrack,
        TransportKind::PreviousTrack,
        TransportKind::SkipForward,
        TransportKind::SkipBackward,
    ];
}

/// Result reported back to the OS for a transport command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Failed,
}

impl CommandStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandStatus::Success)
    }
}

/// Identifies one installed binding set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingGeneration(pub u64);

/// A single command target within an installed binding set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandBinding {
    pub kind: TransportKind,
    pub enabled: bool,
}

/// Full set of bindings installed on the surface at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceBindings {
    pub generation: BindingGeneration,
    pub bindings: Vec<CommandBinding>,
}

impl SurfaceBindings {
    pub fn is_enabled(&self, kind: TransportKind) -> bool {
        self.bindings
            .iter()
            .any(|binding| binding.kind == kind && binding.enabled)
    }
}

/// OS transport control surface.
///
/// `install` and `remove` are the only mutations; bindings are never patched in
/// place.
pub trait ControlSurface: Send + Sync {
    fn install(&self, bindings: &SurfaceBindings) -> Result<()>;

    fn remove(&self, generation: BindingGeneration) -> Result<()>;
}

/// Metadata published to the system Now-Playing centre.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlayingInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub artwork: Option<Artwork>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// Elapsed playback time in seconds.
    pub elapsed: Option<f64>,
    pub rate: Option<f64>,
}

impl NowPlayingInfo {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.release_date.is_none()
            && self.artwork.is_none()
            && self.duration.is_none()
    }
}

/// System Now-Playing centre.
pub trait NowPlayingCenter: Send + Sync {
    /// Replace the published info.
    fn publish(&self, info: &NowPlayingInfo);

    /// Update elapsed time and rate of the published info.
    fn update_playback(&self, elapsed: f64, rate: f64);

    fn clear(&self);
}
