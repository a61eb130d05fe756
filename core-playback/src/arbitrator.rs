//! # Session Arbitrator
//!
//! Decides which session is current and owns the system control surface.
//!
//! ## States
//!
//! - **Idle**: no current session, no bindings installed.
//! - **Active**: one current session, a full binding set installed for it.
//!
//! `Idle → Active` on the first promotion, `Active → Active` on every
//! hand-off (old bindings removed, new ones installed under a fresh
//! [`BindingGeneration`]) and `Active → Idle` only when the current session is
//! destroyed.
//!
//! Only the current session may publish Now-Playing information; the
//! publishing helpers here silently ignore every other session.

use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::{
    BindingGeneration, CommandBinding, ControlSurface, NowPlayingCenter, NowPlayingInfo,
    SignalSink, SurfaceBindings, TransportKind,
};
use core_runtime::PlaybackSettings;
use tracing::{debug, info, warn};

use crate::protocol::SessionId;
use crate::session::NativeSession;

/// How a promotion changed the arbitrator state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promotion {
    /// The session was already current; nothing changed.
    AlreadyCurrent,
    /// Idle → Active.
    FromIdle,
    /// Active → Active; `previous` was stopped.
    HandOff { previous: SessionId },
}

/// Why a transport command was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Idle,
    StaleGeneration,
    Disabled,
}

pub struct Arbitrator {
    current: Option<SessionId>,
    bindings: Option<SurfaceBindings>,
    next_generation: u64,
    surface: Arc<dyn ControlSurface>,
    now_playing: Arc<dyn NowPlayingCenter>,
    skip_forward_enabled: bool,
    skip_backward_enabled: bool,
}

impl Arbitrator {
    pub fn new(
        surface: Arc<dyn ControlSurface>,
        now_playing: Arc<dyn NowPlayingCenter>,
        settings: &PlaybackSettings,
    ) -> Self {
        Self {
            current: None,
            bindings: None,
            next_generation: 0,
            surface,
            now_playing,
            skip_forward_enabled: settings.skip_forward_enabled,
            skip_backward_enabled: settings.skip_backward_enabled,
        }
    }

    pub fn current(&self) -> Option<&SessionId> {
        self.current.as_ref()
    }

    pub fn is_current(&self, id: &SessionId) -> bool {
        self.current.as_ref() == Some(id)
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Generation of the installed binding set, if any.
    pub fn generation(&self) -> Option<BindingGeneration> {
        self.bindings.as_ref().map(|b| b.generation)
    }

    /// Makes `id` the current session.
    ///
    /// The previous current session is stopped before anything else happens,
    /// then the binding set is replaced, the new session starts observing with
    /// `sink` and its metadata is published.
    pub fn promote(
        &mut self,
        sessions: &mut HashMap<SessionId, NativeSession>,
        id: &SessionId,
        sink: SignalSink,
    ) -> Promotion {
        if self.is_current(id) {
            return Promotion::AlreadyCurrent;
        }

        let previous = self.current.take();
        if let Some(previous_id) = &previous {
            if let Some(old) = sessions.get_mut(previous_id) {
                old.stop();
            }
        }

        self.remove_bindings();
        self.install_bindings();
        self.current = Some(id.clone());

        if let Some(session) = sessions.get_mut(id) {
            session.start_observing(sink);
            self.now_playing.publish(&session.now_playing());
        }

        match previous {
            Some(previous) => {
                info!(from = %previous, to = %id, "Session hand-off");
                Promotion::HandOff { previous }
            }
            None => {
                info!(session = %id, "Session became current");
                Promotion::FromIdle
            }
        }
    }

    /// Returns to Idle if `id` is current. Returns `true` if it was.
    pub fn release(&mut self, id: &SessionId) -> bool {
        if !self.is_current(id) {
            return false;
        }

        self.current = None;
        self.remove_bindings();
        self.now_playing.clear();
        info!(session = %id, "Current session released");
        true
    }

    /// Publishes full metadata for `id` if it is current.
    pub fn publish(&self, id: &SessionId, info: &NowPlayingInfo) -> bool {
        if !self.is_current(id) {
            debug!(session = %id, "Ignoring publish from non-current session");
            return false;
        }
        self.now_playing.publish(info);
        true
    }

    /// Updates elapsed time and rate for `id` if it is current.
    pub fn update_playback(&self, id: &SessionId, elapsed: f64, rate: f64) -> bool {
        if !self.is_current(id) {
            return false;
        }
        self.now_playing.update_playback(elapsed, rate);
        true
    }

    /// Checks whether a transport command may run and returns its target.
    pub fn authorize(
        &self,
        generation: BindingGeneration,
        kind: TransportKind,
    ) -> Result<SessionId, Rejection> {
        let (Some(current), Some(bindings)) = (&self.current, &self.bindings) else {
            return Err(Rejection::Idle);
        };
        if bindings.generation != generation {
            return Err(Rejection::StaleGeneration);
        }
        if !bindings.is_enabled(kind) {
            return Err(Rejection::Disabled);
        }
        Ok(current.clone())
    }

    fn install_bindings(&mut self) {
        self.next_generation += 1;
        let bindings = SurfaceBindings {
            generation: BindingGeneration(self.next_generation),
            bindings: TransportKind::ALL
                .iter()
                .map(|&kind| CommandBinding {
                    kind,
                    enabled: self.is_kind_enabled(kind),
                })
                .collect(),
        };

        if let Err(e) = self.surface.install(&bindings) {
            warn!(generation = bindings.generation.0, error = %e, "Failed to install control surface");
        }
        self.bindings = Some(bindings);
    }

    fn remove_bindings(&mut self) {
        if let Some(bindings) = self.bindings.take() {
            if let Err(e) = self.surface.remove(bindings.generation) {
                warn!(generation = bindings.generation.0, error = %e, "Failed to remove control surface");
            }
        }
    }

    fn is_kind_enabled(&self, kind: TransportKind) -> bool {
        match kind {
            TransportKind::SkipForward => self.skip_forward_enabled,
            TransportKind::SkipBackward => self.skip_backward_enabled,
            _ => true,
        }
    }
}
