//! # Native Session
//!
//! Native-side counterpart of one virtual element.
//!
//! A session owns a [`NativePlayer`], the source it is loading or playing, and
//! the Now-Playing metadata accumulated from the script. Everything here is
//! synchronous; the bridge spawns the asynchronous parts (load, probe, seek,
//! artwork) and feeds their completions back through the methods below after
//! checking the load token.
//!
//! Observers are only registered while the session is current. Signals that
//! reach an unobserved session are dropped by the bridge before they get here.

use std::sync::Arc;

use bridge_traits::{
    ContentView, NativePlayer, NativeSignal, NowPlayingInfo, ObserverHandle, PreparedItem,
    SignalSink,
};
use tracing::{debug, trace, warn};

use crate::metadata;
use crate::multiplexer::{self, NativeNotification, Payload};
use crate::protocol::{EventRecord, MetadataUpdate, SessionId};

/// Everything a background load or seek needs to report back.
#[derive(Clone)]
pub struct LoadTicket {
    pub token: u64,
    pub url: String,
    pub player: Arc<dyn NativePlayer>,
}

/// What the bridge must do after a source became ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadyFollowUp {
    /// A `play` arrived before the source was ready.
    pub play_requested: bool,
}

pub struct NativeSession {
    id: SessionId,
    view: Arc<dyn ContentView>,
    player: Arc<dyn NativePlayer>,
    src: Option<String>,
    load_token: u64,
    ready: bool,
    buffering_requested: bool,
    buffering_started: bool,
    play_when_ready: bool,
    metadata: NowPlayingInfo,
    metadata_generation: u64,
    cover_url: Option<String>,
    length_hint: Option<f64>,
    observer: Option<ObserverHandle>,
    last_rate: f64,
    buffer_sufficient: bool,
    destroyed: bool,
}

impl NativeSession {
    pub fn new(id: SessionId, view: Arc<dyn ContentView>, player: Arc<dyn NativePlayer>) -> Self {
        Self {
            id,
            view,
            player,
            src: None,
            load_token: 0,
            ready: false,
            buffering_requested: false,
            buffering_started: false,
            play_when_ready: false,
            metadata: NowPlayingInfo::default(),
            metadata_generation: 0,
            cover_url: None,
            length_hint: None,
            observer: None,
            last_rate: 0.0,
            buffer_sufficient: false,
            destroyed: false,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn view(&self) -> &Arc<dyn ContentView> {
        &self.view
    }

    pub fn player(&self) -> &Arc<dyn NativePlayer> {
        &self.player
    }

    pub fn src(&self) -> Option<&str> {
        self.src.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_observed(&self) -> bool {
        self.observer.is_some()
    }

    #[cfg(test)]
    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    #[cfg(test)]
    fn metadata_generation(&self) -> u64 {
        self.metadata_generation
    }

    pub fn duration(&self) -> Option<f64> {
        self.metadata.duration
    }

    /// Metadata with the live elapsed time and rate filled in.
    pub fn now_playing(&self) -> NowPlayingInfo {
        let mut info = self.metadata.clone();
        info.elapsed = Some(self.player.current_time());
        info.rate = Some(self.player.rate());
        info
    }

    /// Delivers records to the owning view. Delivery failures are logged.
    pub fn emit(&self, records: Vec<EventRecord>) {
        for record in records {
            let value = match record.to_value() {
                Ok(value) => value,
                Err(e) => {
                    warn!(session = %self.id, error = %e, "Failed to encode event");
                    continue;
                }
            };
            if let Err(e) = self.view.deliver_event(value) {
                debug!(
                    session = %self.id,
                    view = %self.view.id(),
                    action = record.action.canonical_name(),
                    error = %e,
                    "Event delivery failed"
                );
            }
        }
    }

    pub fn notify(&self, notification: NativeNotification, payload: Payload) {
        self.emit(multiplexer::translate(&self.id, notification, payload));
    }

    // ------------------------------------------------------------------
    // Source loading
    // ------------------------------------------------------------------

    /// Records a new source and invalidates in-flight completions.
    ///
    /// The installed item keeps playing until the new load completes. The
    /// duration falls back to the script's `length` hint until the new item
    /// reports one.
    pub fn begin_load(&mut self, url: String) -> LoadTicket {
        self.load_token += 1;
        self.src = Some(url.clone());
        self.ready = false;
        self.buffering_requested = false;
        self.buffering_started = false;
        self.play_when_ready = false;
        self.buffer_sufficient = false;
        self.metadata.duration = self.length_hint;

        LoadTicket {
            token: self.load_token,
            url,
            player: Arc::clone(&self.player),
        }
    }

    /// Ticket for work that must be invalidated by the next load (seeks).
    pub fn ticket(&self) -> Option<LoadTicket> {
        self.src.as_ref().map(|url| LoadTicket {
            token: self.load_token,
            url: url.clone(),
            player: Arc::clone(&self.player),
        })
    }

    pub fn is_current_token(&self, token: u64) -> bool {
        !self.destroyed && token == self.load_token
    }

    /// Installs a prepared item and emits the readiness sequence.
    pub fn complete_load(&mut self, item: PreparedItem, device_volume: f64) -> ReadyFollowUp {
        if let Some(duration) = item.duration {
            self.metadata.duration = Some(duration);
        }
        self.player.replace_item(Some(item));
        self.ready = true;

        let duration = self.metadata.duration;
        self.emit(multiplexer::translate_all(
            &self.id,
            [
                (NativeNotification::Meta, Payload::duration(duration)),
                (NativeNotification::Duration, Payload::duration(duration)),
                (NativeNotification::Loaded, Payload::default()),
                (NativeNotification::CanPlay, Payload::default()),
                (NativeNotification::Volume, Payload::volume(device_volume)),
            ],
        ));

        if self.buffering_requested && !self.buffering_started {
            self.player.begin_buffering();
            self.buffering_started = true;
        }

        let play_requested = std::mem::take(&mut self.play_when_ready);
        ReadyFollowUp { play_requested }
    }

    /// Applies an early duration probe. Returns `true` if the duration changed.
    pub fn apply_probed_duration(&mut self, duration: f64) -> bool {
        if !duration.is_finite() || duration < 0.0 || self.metadata.duration == Some(duration) {
            return false;
        }
        self.metadata.duration = Some(duration);
        self.notify(NativeNotification::Duration, Payload::duration(Some(duration)));
        true
    }

    /// Starts buffering now if the source is ready, otherwise on readiness.
    pub fn request_buffering(&mut self) {
        self.buffering_requested = true;
        if self.ready && !self.buffering_started {
            self.player.begin_buffering();
            self.buffering_started = true;
        }
    }

    pub fn set_play_when_ready(&mut self, value: bool) {
        self.play_when_ready = value;
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// Registers the session's observer once. A second call is a no-op.
    pub fn start_observing(&mut self, sink: SignalSink) {
        if self.observer.is_some() {
            return;
        }
        match self.player.add_observer(sink) {
            Ok(handle) => {
                self.observer = Some(handle);
                self.last_rate = self.player.rate();
            }
            Err(e) => warn!(session = %self.id, error = %e, "Failed to register observer"),
        }
    }

    /// Removes the observer if one is registered.
    pub fn stop_observing(&mut self) {
        if let Some(handle) = self.observer.take() {
            if let Err(e) = self.player.remove_observer(handle) {
                debug!(session = %self.id, error = %e, "Failed to remove observer");
            }
        }
    }

    /// Stops a session that is losing current status: pause, zero rate, rewind,
    /// and stop observing.
    ///
    /// The element will not hear the resulting rate change through the
    /// observer, so a `pause` is delivered directly if it was playing.
    pub fn stop(&mut self) {
        let was_playing = self.player.rate() != 0.0;

        self.player.pause();
        self.player.set_rate(0.0);
        self.player.jump_to(0.0);
        self.stop_observing();
        self.play_when_ready = false;
        self.last_rate = 0.0;

        if was_playing {
            self.notify(NativeNotification::Pause, Payload::default());
            self.notify(NativeNotification::Rate, Payload::rate(0.0));
        }
    }

    // ------------------------------------------------------------------
    // Native signals
    // ------------------------------------------------------------------

    /// Translates an observed native signal into element events.
    pub fn handle_signal(&mut self, signal: NativeSignal) {
        trace!(session = %self.id, ?signal, "Native signal");

        match signal {
            NativeSignal::RateChanged { rate } => {
                let previous = std::mem::replace(&mut self.last_rate, rate);
                let mut notifications = Vec::with_capacity(2);
                if previous == 0.0 && rate != 0.0 {
                    notifications.push((NativeNotification::Play, Payload::default()));
                } else if previous != 0.0 && rate == 0.0 {
                    notifications.push((NativeNotification::Pause, Payload::default()));
                }
                notifications.push((NativeNotification::Rate, Payload::rate(rate)));
                self.emit(multiplexer::translate_all(&self.id, notifications));
            }
            NativeSignal::PlayedToEnd => {
                self.notify(NativeNotification::Ended, Payload::default());
            }
            NativeSignal::TimeJumped { time } => {
                self.notify(NativeNotification::Seeked, Payload::time(time));
            }
            NativeSignal::Stalled => {
                self.notify(NativeNotification::Stalled, Payload::default());
            }
            NativeSignal::BufferStatus { sufficient } => {
                let was_sufficient = std::mem::replace(&mut self.buffer_sufficient, sufficient);
                if sufficient && !was_sufficient {
                    self.notify(NativeNotification::CanPlayThrough, Payload::default());
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    /// Merges a metadata update and returns the cover URL to fetch, if any,
    /// together with the metadata generation the fetch belongs to.
    ///
    /// The generation only moves when the cover changes, so an unchanged cover
    /// keeps an in-flight fetch valid.
    pub fn apply_metadata(&mut self, update: &MetadataUpdate) -> Option<(u64, String)> {
        metadata::apply_update(&mut self.metadata, update);
        if let Some(length) = update.length.filter(|l| l.is_finite() && *l >= 0.0) {
            self.length_hint = Some(length);
        }

        if update.cover == self.cover_url {
            return None;
        }

        self.metadata_generation += 1;
        self.metadata.artwork = None;
        self.cover_url = update.cover.clone();
        self.cover_url
            .clone()
            .map(|cover| (self.metadata_generation, cover))
    }

    /// Stores fetched artwork. Returns `false` for a stale generation.
    pub fn apply_artwork(&mut self, generation: u64, artwork: bridge_traits::Artwork) -> bool {
        if self.destroyed || generation != self.metadata_generation {
            return false;
        }
        self.metadata.artwork = Some(artwork);
        true
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Releases every native resource the session holds. Idempotent.
    pub fn teardown(&mut self) {
        if self.destroyed {
            return;
        }

        self.stop_observing();
        self.player.pause();
        self.player.jump_to(0.0);
        self.player.replace_item(None);

        self.metadata = NowPlayingInfo::default();
        self.cover_url = None;
        self.length_hint = None;
        self.metadata_generation += 1;
        self.src = None;
        self.load_token += 1;
        self.ready = false;
        self.buffering_requested = false;
        self.buffering_started = false;
        self.play_when_ready = false;
        self.last_rate = 0.0;
        self.destroyed = true;
    }
}

impl std::fmt::Debug for NativeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeSession")
            .field("id", &self.id)
            .field("view", &self.view.id())
            .field("load_token", &self.load_token)
            .field("ready", &self.ready)
            .field("observed", &self.observer.is_some())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{BridgeError, ItemStatus, ViewId};
    use parking_lot::Mutex;
    use serde_json::Value;

    #[derive(Default)]
    struct StubPlayer {
        ops: Mutex<Vec<String>>,
        rate: Mutex<f64>,
        observers: Mutex<u64>,
    }

    impl StubPlayer {
        fn ops(&self) -> Vec<String> {
            self.ops.lock().clone()
        }

        fn record(&self, op: impl Into<String>) {
            self.ops.lock().push(op.into());
        }
    }

    #[async_trait]
    impl NativePlayer for StubPlayer {
        async fn prepare(&self, url: &str) -> BridgeResult<PreparedItem> {
            Ok(PreparedItem::new(url, None, 1))
        }

        async fn probe_duration(&self, _url: &str) -> BridgeResult<Option<f64>> {
            Ok(None)
        }

        fn replace_item(&self, item: Option<PreparedItem>) {
            match item {
                Some(item) => self.record(format!("replace:{}", item.url)),
                None => self.record("replace:none"),
            }
        }

        fn begin_buffering(&self) {
            self.record("buffer");
        }

        fn play(&self) {
            *self.rate.lock() = 1.0;
            self.record("play");
        }

        fn pause(&self) {
            *self.rate.lock() = 0.0;
            self.record("pause");
        }

        fn set_rate(&self, rate: f64) {
            *self.rate.lock() = rate;
            self.record(format!("rate:{}", rate));
        }

        fn rate(&self) -> f64 {
            *self.rate.lock()
        }

        fn current_time(&self) -> f64 {
            0.0
        }

        fn status(&self) -> ItemStatus {
            ItemStatus::Unknown
        }

        fn jump_to(&self, time: f64) {
            self.record(format!("jump:{}", time));
        }

        async fn seek(&self, time: f64) -> BridgeResult<f64> {
            Ok(time)
        }

        fn add_observer(&self, _sink: SignalSink) -> BridgeResult<ObserverHandle> {
            let mut count = self.observers.lock();
            if *count > 0 {
                return Err(BridgeError::AlreadyObserved);
            }
            *count += 1;
            self.record("observe");
            Ok(ObserverHandle(1))
        }

        fn remove_observer(&self, _handle: ObserverHandle) -> BridgeResult<()> {
            let mut count = self.observers.lock();
            if *count == 0 {
                return Err(BridgeError::NotObserved);
            }
            *count -= 1;
            self.record("unobserve");
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubView {
        events: Mutex<Vec<Value>>,
    }

    impl StubView {
        fn actions(&self) -> Vec<String> {
            self.events
                .lock()
                .iter()
                .filter_map(|e| e["action"].as_str().map(str::to_string))
                .collect()
        }
    }

    impl ContentView for StubView {
        fn id(&self) -> ViewId {
            ViewId(1)
        }

        fn deliver_event(&self, event: Value) -> BridgeResult<()> {
            self.events.lock().push(event);
            Ok(())
        }
    }

    fn session() -> (NativeSession, Arc<StubPlayer>, Arc<StubView>) {
        let player = Arc::new(StubPlayer::default());
        let view = Arc::new(StubView::default());
        let session = NativeSession::new(SessionId::from("a1"), view.clone(), player.clone());
        (session, player, view)
    }

    fn sink() -> SignalSink {
        SignalSink::new(|_| {})
    }

    #[test]
    fn test_begin_load_bumps_token() {
        let (mut session, _, _) = session();
        let first = session.begin_load("a.mp3".into());
        let second = session.begin_load("b.mp3".into());

        assert!(second.token > first.token);
        assert!(!session.is_current_token(first.token));
        assert!(session.is_current_token(second.token));
        assert_eq!(session.src(), Some("b.mp3"));
    }

    #[test]
    fn test_ready_sequence_and_deferred_buffering() {
        let (mut session, player, view) = session();
        session.begin_load("a.mp3".into());
        session.request_buffering();
        session.set_play_when_ready(true);

        let follow_up = session.complete_load(PreparedItem::new("a.mp3", Some(30.0), 1), 0.5);

        assert!(follow_up.play_requested);
        assert!(session.is_ready());
        assert_eq!(session.duration(), Some(30.0));
        assert_eq!(player.ops(), vec!["replace:a.mp3", "buffer"]);
        assert_eq!(
            view.actions(),
            vec![
                "onLoadedMetadata",
                "onDurationChange",
                "onLoadedData",
                "onCanPlay",
                "onVolumeChange"
            ]
        );
        assert_eq!(view.events.lock()[4]["volume"], 0.5);
    }

    #[test]
    fn test_request_buffering_is_idempotent() {
        let (mut session, player, _) = session();
        session.begin_load("a.mp3".into());
        session.complete_load(PreparedItem::new("a.mp3", None, 1), 1.0);

        session.request_buffering();
        session.request_buffering();

        assert_eq!(player.ops().iter().filter(|op| *op == "buffer").count(), 1);
    }

    #[test]
    fn test_rate_transitions() {
        let (mut session, _, view) = session();

        session.handle_signal(NativeSignal::RateChanged { rate: 1.0 });
        session.handle_signal(NativeSignal::RateChanged { rate: 2.0 });
        session.handle_signal(NativeSignal::RateChanged { rate: 0.0 });

        assert_eq!(
            view.actions(),
            vec![
                "onPlay",
                "onPlaying",
                "onRateChange",
                "onRateChange",
                "onPause",
                "onRateChange"
            ]
        );
    }

    #[test]
    fn test_buffer_status_is_edge_triggered() {
        let (mut session, _, view) = session();

        session.handle_signal(NativeSignal::BufferStatus { sufficient: true });
        session.handle_signal(NativeSignal::BufferStatus { sufficient: true });
        session.handle_signal(NativeSignal::BufferStatus { sufficient: false });
        session.handle_signal(NativeSignal::BufferStatus { sufficient: true });

        assert_eq!(view.actions(), vec!["onCanPlayThrough", "onCanPlayThrough"]);
    }

    #[test]
    fn test_stop_rewinds_and_reports_pause() {
        let (mut session, player, view) = session();
        session.start_observing(sink());
        player.play();

        session.stop();

        assert_eq!(
            player.ops(),
            vec!["observe", "play", "pause", "rate:0", "jump:0", "unobserve"]
        );
        assert!(!session.is_observed());
        assert_eq!(view.actions(), vec!["onPause", "onRateChange"]);
    }

    #[test]
    fn test_observer_registration_is_paired() {
        let (mut session, player, _) = session();

        session.start_observing(sink());
        session.start_observing(sink());
        session.stop_observing();
        session.stop_observing();

        assert_eq!(player.ops(), vec!["observe", "unobserve"]);
    }

    #[test]
    fn test_cover_change_bumps_generation() {
        let (mut session, _, _) = session();
        let update = MetadataUpdate {
            cover: Some("https://example.com/c.jpg".into()),
            ..MetadataUpdate::default()
        };

        let (generation, url) = session.apply_metadata(&update).unwrap();
        assert_eq!(url, "https://example.com/c.jpg");

        // Same cover again: nothing new to fetch and the first fetch stays valid.
        assert!(session.apply_metadata(&update).is_none());
        assert_eq!(session.metadata_generation(), generation);

        // Cover removed: the in-flight fetch is now stale.
        assert!(session.apply_metadata(&MetadataUpdate::default()).is_none());
        assert!(!session.apply_artwork(generation, bridge_traits::Artwork::new(vec![1u8], None)));
    }

    #[test]
    fn test_length_hint_survives_source_replacement() {
        let (mut session, _, _) = session();
        session.begin_load("a.mp3".into());
        session.apply_metadata(&MetadataUpdate {
            length: Some(200.0),
            ..MetadataUpdate::default()
        });
        assert_eq!(session.duration(), Some(200.0));

        session.begin_load("b.mp3".into());
        assert_eq!(session.duration(), Some(200.0));

        // A duration reported by the item still wins over the hint.
        session.complete_load(PreparedItem::new("b.mp3", Some(90.0), 1), 1.0);
        assert_eq!(session.duration(), Some(90.0));

        session.begin_load("c.mp3".into());
        session.complete_load(PreparedItem::new("c.mp3", None, 1), 1.0);
        assert_eq!(session.duration(), Some(200.0));
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let (mut session, player, _) = session();
        session.begin_load("a.mp3".into());
        session.start_observing(sink());

        session.teardown();
        session.teardown();

        assert!(session.is_destroyed());
        assert_eq!(session.src(), None);
        assert_eq!(
            player.ops(),
            vec!["observe", "unobserve", "pause", "jump:0", "replace:none"]
        );
    }
}
