//! # Media Bridge
//!
//! The state machine behind the message channel. One [`MediaBridge`] owns the
//! session registry and the [`Arbitrator`] and is driven exclusively by the
//! runtime task, one [`BridgeMessage`] at a time. Background work (source
//! loading, duration probes, seeks, cover art) is spawned onto tokio and
//! reports back as a [`Completion`] on the same queue; completions carrying an
//! outdated load token or metadata generation are discarded.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use bridge_traits::error::Result as AdapterResult;
use bridge_traits::{
    Artwork, ArtworkFetcher, BindingGeneration, CommandStatus, ContentView, ItemStatus,
    MediaEngine, NativeSignal, PreparedItem, SignalSink, TransportCommand, ViewId,
};
use core_runtime::logging::redact_url;
use core_runtime::{BridgeConfig, PlaybackSettings};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::arbitrator::{Arbitrator, Promotion};
use crate::error::{PlaybackError, Result};
use crate::multiplexer::{NativeNotification, Payload};
use crate::protocol::{CommandAction, MetadataUpdate, ScriptCommand, SessionId};
use crate::session::NativeSession;

/// Messages processed by the bridge queue.
pub enum BridgeMessage {
    /// Raw command posted by a script, with the view it came from.
    Command {
        view: Arc<dyn ContentView>,
        payload: Value,
    },
    /// Observer callback from a native player.
    Native { id: SessionId, signal: NativeSignal },
    /// Result of spawned background work.
    Completion(Completion),
    /// OS transport command awaiting a status.
    Transport {
        generation: BindingGeneration,
        command: TransportCommand,
        reply: oneshot::Sender<CommandStatus>,
    },
    /// The view closed; its sessions must go.
    ViewClosed(ViewId),
    /// Read-only state query.
    Inspect(oneshot::Sender<BridgeSnapshot>),
    Shutdown,
}

impl std::fmt::Debug for BridgeMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeMessage::Command { view, payload } => f
                .debug_struct("Command")
                .field("view", &view.id())
                .field("payload", payload)
                .finish(),
            BridgeMessage::Native { id, signal } => f
                .debug_struct("Native")
                .field("id", id)
                .field("signal", signal)
                .finish(),
            BridgeMessage::Completion(completion) => {
                f.debug_tuple("Completion").field(completion).finish()
            }
            BridgeMessage::Transport {
                generation,
                command,
                ..
            } => f
                .debug_struct("Transport")
                .field("generation", generation)
                .field("command", command)
                .finish(),
            BridgeMessage::ViewClosed(view) => f.debug_tuple("ViewClosed").field(view).finish(),
            BridgeMessage::Inspect(_) => f.write_str("Inspect"),
            BridgeMessage::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Results of background work, tagged for staleness checks.
#[derive(Debug)]
pub enum Completion {
    Prepared {
        id: SessionId,
        token: u64,
        result: AdapterResult<PreparedItem>,
    },
    DurationProbed {
        id: SessionId,
        token: u64,
        result: AdapterResult<Option<f64>>,
    },
    Seeked {
        id: SessionId,
        token: u64,
        result: AdapterResult<f64>,
    },
    Artwork {
        id: SessionId,
        generation: u64,
        result: AdapterResult<Artwork>,
    },
}

/// Point-in-time view of bridge state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BridgeSnapshot {
    pub current: Option<SessionId>,
    pub sessions: Vec<SessionId>,
    pub generation: Option<BindingGeneration>,
}

pub struct MediaBridge {
    sessions: HashMap<SessionId, NativeSession>,
    arbitrator: Arbitrator,
    engine: Arc<dyn MediaEngine>,
    artwork_fetcher: Option<Arc<dyn ArtworkFetcher>>,
    settings: PlaybackSettings,
    queue: mpsc::UnboundedSender<BridgeMessage>,
    enabled: bool,
    last_device_volume: f64,
}

impl MediaBridge {
    pub fn new(config: BridgeConfig, queue: mpsc::UnboundedSender<BridgeMessage>) -> Self {
        let arbitrator = Arbitrator::new(
            Arc::clone(&config.control_surface),
            Arc::clone(&config.now_playing),
            &config.settings,
        );
        let last_device_volume = config.media_engine.device_volume();

        Self {
            sessions: HashMap::new(),
            arbitrator,
            engine: config.media_engine,
            artwork_fetcher: config.artwork_fetcher,
            settings: config.settings,
            queue,
            enabled: false,
            last_device_volume,
        }
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> BridgeSnapshot {
        let mut sessions: Vec<SessionId> = self.sessions.keys().cloned().collect();
        sessions.sort();
        BridgeSnapshot {
            current: self.arbitrator.current().cloned(),
            sessions,
            generation: self.arbitrator.generation(),
        }
    }

    /// Processes one queue message. Breaks on shutdown.
    pub fn handle(&mut self, message: BridgeMessage) -> ControlFlow<()> {
        match message {
            BridgeMessage::Command { view, payload } => self.handle_command(view, payload),
            BridgeMessage::Native { id, signal } => self.handle_signal(&id, signal),
            BridgeMessage::Completion(completion) => self.handle_completion(completion),
            BridgeMessage::Transport {
                generation,
                command,
                reply,
            } => {
                let status = self.handle_transport(generation, command);
                let _ = reply.send(status);
            }
            BridgeMessage::ViewClosed(view) => self.view_closed(view),
            BridgeMessage::Inspect(reply) => {
                let _ = reply.send(self.snapshot());
            }
            BridgeMessage::Shutdown => {
                self.shutdown();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Whether the periodic time observer should run.
    pub fn timer_armed(&self) -> bool {
        self.playing_session().is_some()
    }

    /// Periodic observer: time for the playing current session and device
    /// volume changes.
    pub fn tick(&mut self) {
        if let Some(session) = self.playing_session() {
            let player = session.player();
            let rate = player.rate();
            let time = player.current_time();
            self.arbitrator.update_playback(session.id(), time, rate);
            session.notify(NativeNotification::Time, Payload::time(time));
        }
        self.refresh_device_volume();
    }

    /// Destroys every session.
    pub fn shutdown(&mut self) {
        let ids: Vec<SessionId> = self.sessions.keys().cloned().collect();
        for id in &ids {
            self.destroy(id);
        }
        info!(sessions = ids.len(), "Bridge shut down");
    }

    fn current_session(&self) -> Option<&NativeSession> {
        self.arbitrator
            .current()
            .and_then(|id| self.sessions.get(id))
    }

    /// The current session, if its item is ready and the player is moving.
    fn playing_session(&self) -> Option<&NativeSession> {
        self.current_session().filter(|session| {
            let player = session.player();
            session.is_ready()
                && player.status() == ItemStatus::ReadyToPlay
                && player.rate() != 0.0
        })
    }

    // ------------------------------------------------------------------
    // Script commands
    // ------------------------------------------------------------------

    fn handle_command(&mut self, view: Arc<dyn ContentView>, payload: Value) {
        let command = match ScriptCommand::parse(payload) {
            Ok(command) => command,
            Err(e) => {
                debug!(view = %view.id(), error = %e, "Dropping malformed command");
                return;
            }
        };

        debug!(
            view = %view.id(),
            session = ?command.id.as_ref().map(SessionId::as_str),
            action = command.action.name(),
            "Command"
        );

        match self.dispatch(view, command) {
            Ok(()) => {}
            Err(e) if e.is_client_error() => debug!(error = %e, "Command dropped"),
            Err(e) => warn!(error = %e, "Command failed"),
        }
    }

    fn dispatch(&mut self, view: Arc<dyn ContentView>, command: ScriptCommand) -> Result<()> {
        let (id, action) = match (command.id, command.action) {
            (_, CommandAction::Enable) => {
                self.enable();
                return Ok(());
            }
            (None, action) => {
                return Err(PlaybackError::MalformedCommand(format!(
                    "{} requires an id",
                    action.name()
                )))
            }
            (Some(id), CommandAction::SetSource(url)) => return self.set_source(view, id, url),
            (Some(id), action) => (id, action),
        };

        if !self.sessions.contains_key(&id) {
            return Err(PlaybackError::UnknownSession(id));
        }

        match action {
            CommandAction::SetMetadata(update) => self.set_metadata(&id, update),
            CommandAction::SetRate(rate) => self.set_rate(&id, rate),
            CommandAction::SetVolume(volume) => self.set_volume(volume),
            CommandAction::Load => self.load(&id),
            CommandAction::Play => self.play(&id),
            CommandAction::Pause => self.pause(&id),
            CommandAction::Seek(time) => self.seek(&id, time),
            CommandAction::Destroy => self.destroy(&id),
            CommandAction::Enable | CommandAction::SetSource(_) => {}
        }
        Ok(())
    }

    fn enable(&mut self) {
        if self.enabled {
            return;
        }
        self.enabled = true;
        match self.engine.configure_session() {
            Ok(()) => info!("Audio session configured"),
            Err(e) => warn!(error = %e, "Failed to configure audio session"),
        }
    }

    fn set_source(&mut self, view: Arc<dyn ContentView>, id: SessionId, url: String) -> Result<()> {
        if !self.sessions.contains_key(&id) {
            let player = self.engine.create_player()?;
            info!(session = %id, view = %view.id(), "Session created");
            self.sessions
                .insert(id.clone(), NativeSession::new(id.clone(), view, player));
        }

        let Some(session) = self.sessions.get_mut(&id) else {
            return Err(PlaybackError::UnknownSession(id));
        };

        debug!(session = %id, src = %redact_url(&url), "Loading source");
        let ticket = session.begin_load(url);

        let queue = self.queue.clone();
        let load = ticket.clone();
        let load_id = id.clone();
        tokio::spawn(async move {
            let result = load.player.prepare(&load.url).await;
            let _ = queue.send(BridgeMessage::Completion(Completion::Prepared {
                id: load_id,
                token: load.token,
                result,
            }));
        });

        let queue = self.queue.clone();
        tokio::spawn(async move {
            let result = ticket.player.probe_duration(&ticket.url).await;
            let _ = queue.send(BridgeMessage::Completion(Completion::DurationProbed {
                id,
                token: ticket.token,
                result,
            }));
        });

        Ok(())
    }

    fn load(&mut self, id: &SessionId) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.request_buffering();
        }
    }

    fn play(&mut self, id: &SessionId) {
        let Some(session) = self.sessions.get_mut(id) else {
            return;
        };
        let ready = session.is_ready();
        if !ready {
            session.set_play_when_ready(true);
        }

        self.promote(id);

        if ready {
            if let Some(session) = self.sessions.get(id) {
                session.player().play();
            }
        }
    }

    fn pause(&mut self, id: &SessionId) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.set_play_when_ready(false);
            session.player().pause();
        }
    }

    fn seek(&mut self, id: &SessionId, time: f64) {
        let Some(ticket) = self.sessions.get(id).and_then(NativeSession::ticket) else {
            debug!(session = %id, "Seek without a source");
            return;
        };

        let target = time.max(0.0);
        let queue = self.queue.clone();
        let id = id.clone();
        tokio::spawn(async move {
            let result = ticket.player.seek(target).await;
            let _ = queue.send(BridgeMessage::Completion(Completion::Seeked {
                id,
                token: ticket.token,
                result,
            }));
        });
    }

    fn set_rate(&mut self, id: &SessionId, rate: f64) {
        if rate != 0.0 && !self.arbitrator.is_current(id) {
            self.promote(id);
        }
        if let Some(session) = self.sessions.get(id) {
            session.player().set_rate(rate);
        }
    }

    fn set_volume(&mut self, volume: f64) {
        let volume = volume.clamp(0.0, 1.0);
        if let Err(e) = self.engine.set_device_volume(volume) {
            warn!(volume, error = %e, "Failed to set device volume");
        }
        self.refresh_device_volume();
    }

    fn set_metadata(&mut self, id: &SessionId, update: MetadataUpdate) {
        let Some(session) = self.sessions.get_mut(id) else {
            return;
        };

        let cover = session.apply_metadata(&update);
        self.arbitrator.publish(id, &session.now_playing());

        let Some((generation, url)) = cover else {
            return;
        };
        let Some(fetcher) = self.artwork_fetcher.clone() else {
            debug!(session = %id, "No artwork fetcher configured, skipping cover");
            return;
        };

        debug!(session = %id, cover = %redact_url(&url), generation, "Fetching cover");
        let queue = self.queue.clone();
        let id = id.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch(&url).await;
            let _ = queue.send(BridgeMessage::Completion(Completion::Artwork {
                id,
                generation,
                result,
            }));
        });
    }

    fn destroy(&mut self, id: &SessionId) {
        let Some(mut session) = self.sessions.remove(id) else {
            debug!(session = %id, "Destroy for unknown session");
            return;
        };

        session.teardown();
        self.arbitrator.release(id);
        info!(session = %id, "Session destroyed");
    }

    fn view_closed(&mut self, view: ViewId) {
        let owned: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|session| session.view().id() == view)
            .map(|session| session.id().clone())
            .collect();

        for id in &owned {
            self.destroy(id);
        }
        info!(%view, sessions = owned.len(), "View closed");
    }

    fn promote(&mut self, id: &SessionId) -> Promotion {
        let sink = self.signal_sink(id);
        self.arbitrator.promote(&mut self.sessions, id, sink)
    }

    fn signal_sink(&self, id: &SessionId) -> SignalSink {
        let queue = self.queue.clone();
        let id = id.clone();
        SignalSink::new(move |signal| {
            let _ = queue.send(BridgeMessage::Native {
                id: id.clone(),
                signal,
            });
        })
    }

    fn refresh_device_volume(&mut self) {
        let volume = self.engine.device_volume();
        if volume == self.last_device_volume {
            return;
        }
        self.last_device_volume = volume;

        if let Some(session) = self.current_session() {
            session.notify(NativeNotification::Volume, Payload::volume(volume));
        }
    }

    // ------------------------------------------------------------------
    // Native signals and completions
    // ------------------------------------------------------------------

    fn handle_signal(&mut self, id: &SessionId, signal: NativeSignal) {
        let Some(session) = self.sessions.get_mut(id) else {
            trace!(session = %id, ?signal, "Signal for unknown session");
            return;
        };
        if !session.is_observed() {
            trace!(session = %id, ?signal, "Signal for unobserved session");
            return;
        }

        session.handle_signal(signal);

        if matches!(
            signal,
            NativeSignal::RateChanged { .. } | NativeSignal::TimeJumped { .. }
        ) {
            let player = session.player();
            self.arbitrator
                .update_playback(id, player.current_time(), player.rate());
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        let result = match completion {
            Completion::Prepared { id, token, result } => self.on_prepared(id, token, result),
            Completion::DurationProbed { id, token, result } => {
                self.on_duration_probed(id, token, result)
            }
            Completion::Seeked { id, token, result } => self.on_seeked(id, token, result),
            Completion::Artwork {
                id,
                generation,
                result,
            } => self.on_artwork(id, generation, result),
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_stale() => trace!(error = %e, "Discarding completion"),
            Err(e) => warn!(error = %e, "Background work failed"),
        }
    }

    /// A failed load is reported to the log only; the element hears nothing.
    fn on_prepared(
        &mut self,
        id: SessionId,
        token: u64,
        result: AdapterResult<PreparedItem>,
    ) -> Result<()> {
        let device_volume = self.engine.device_volume();
        let session = live_session(&mut self.sessions, &id, token)?;

        let item = result.map_err(|e| PlaybackError::LoadFailed {
            url: session.src().map(redact_url).unwrap_or_default(),
            reason: e.to_string(),
        })?;

        let follow_up = session.complete_load(item, device_volume);
        let info = session.now_playing();
        let player = Arc::clone(session.player());

        let is_current = self.arbitrator.publish(&id, &info);
        if follow_up.play_requested && is_current {
            player.play();
        }
        Ok(())
    }

    fn on_duration_probed(
        &mut self,
        id: SessionId,
        token: u64,
        result: AdapterResult<Option<f64>>,
    ) -> Result<()> {
        let session = live_session(&mut self.sessions, &id, token)?;

        match result {
            Ok(Some(duration)) => {
                if session.apply_probed_duration(duration) {
                    let info = session.now_playing();
                    self.arbitrator.publish(&id, &info);
                }
            }
            Ok(None) => {}
            Err(e) => debug!(session = %id, error = %e, "Duration probe failed"),
        }
        Ok(())
    }

    fn on_seeked(&mut self, id: SessionId, token: u64, result: AdapterResult<f64>) -> Result<()> {
        let session = live_session(&mut self.sessions, &id, token)?;

        match result {
            Ok(time) => {
                let rate = session.player().rate();
                if self.arbitrator.update_playback(&id, time, rate) {
                    session.notify(NativeNotification::Time, Payload::time(time));
                }
            }
            Err(e) => debug!(session = %id, error = %e, "Seek failed"),
        }
        Ok(())
    }

    fn on_artwork(
        &mut self,
        id: SessionId,
        generation: u64,
        result: AdapterResult<Artwork>,
    ) -> Result<()> {
        let Some(session) = self.sessions.get_mut(&id) else {
            return Err(PlaybackError::StaleCallback(id));
        };

        match result {
            Ok(artwork) => {
                if !session.apply_artwork(generation, artwork) {
                    return Err(PlaybackError::StaleCallback(id));
                }
                let info = session.now_playing();
                self.arbitrator.publish(&id, &info);
            }
            Err(e) => debug!(session = %id, error = %e, "Cover art fetch failed"),
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transport commands
    // ------------------------------------------------------------------

    fn handle_transport(
        &mut self,
        generation: BindingGeneration,
        command: TransportCommand,
    ) -> CommandStatus {
        match self.apply_transport(generation, command) {
            Ok(()) => CommandStatus::Success,
            Err(e) => {
                debug!(?command, error = %e, "Transport command failed");
                CommandStatus::Failed
            }
        }
    }

    fn apply_transport(
        &mut self,
        generation: BindingGeneration,
        command: TransportCommand,
    ) -> Result<()> {
        let id = self
            .arbitrator
            .authorize(generation, command.kind())
            .map_err(|rejection| {
                PlaybackError::SurfaceCommandFailed(format!("{:?} binding", rejection))
            })?;
        let Some(session) = self.sessions.get(&id) else {
            return Err(PlaybackError::UnknownSession(id));
        };

        let player = Arc::clone(session.player());
        let duration = session.duration();
        let hold_rate = self.settings.seek_hold_rate;
        debug!(session = %id, ?command, "Transport command");

        match command {
            TransportCommand::Play => {
                if player.rate() != 0.0 {
                    return Err(not_applicable("already playing"));
                }
                self.play(&id);
            }
            TransportCommand::Pause => {
                if player.rate() == 0.0 {
                    return Err(not_applicable("already paused"));
                }
                self.pause(&id);
            }
            TransportCommand::ChangePlaybackPosition(time) => {
                if !time.is_finite() {
                    return Err(not_applicable("non-finite position"));
                }
                self.seek(&id, time);
            }
            TransportCommand::SeekForward { begin } => {
                player.set_rate(if begin { hold_rate } else { 1.0 });
            }
            TransportCommand::SeekBackward { begin } => {
                player.set_rate(if begin { -hold_rate } else { 1.0 });
            }
            TransportCommand::NextTrack => {
                if let Some(duration) = duration {
                    self.seek(&id, duration);
                }
                self.notify(&id, NativeNotification::Next);
            }
            TransportCommand::PreviousTrack => {
                self.seek(&id, 0.0);
                self.notify(&id, NativeNotification::Previous);
            }
            TransportCommand::SkipForward { interval } => {
                if !interval.is_finite() {
                    return Err(not_applicable("non-finite interval"));
                }
                self.seek(&id, player.current_time() + interval);
            }
            TransportCommand::SkipBackward { interval } => {
                if !interval.is_finite() {
                    return Err(not_applicable("non-finite interval"));
                }
                self.seek(&id, player.current_time() - interval);
            }
        }

        Ok(())
    }

    fn notify(&self, id: &SessionId, notification: NativeNotification) {
        if let Some(session) = self.sessions.get(id) {
            session.notify(notification, Payload::default());
        }
    }
}

fn not_applicable(reason: &str) -> PlaybackError {
    PlaybackError::SurfaceCommandFailed(reason.to_string())
}

/// Session for a completion carrying `token`.
fn live_session<'a>(
    sessions: &'a mut HashMap<SessionId, NativeSession>,
    id: &SessionId,
    token: u64,
) -> Result<&'a mut NativeSession> {
    match sessions.get_mut(id) {
        Some(session) if session.is_current_token(token) => Ok(session),
        _ => Err(PlaybackError::StaleCallback(id.clone())),
    }
}
