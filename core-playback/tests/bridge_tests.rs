//! End-to-end tests for the media session bridge
//!
//! This suite drives a real `BridgeRuntime` through its handle and verifies:
//! - Event sequences delivered to content views
//! - Hand-off ordering between sessions (via a shared operation log)
//! - Control surface and Now-Playing ownership
//! - Stale completion handling and malformed command tolerance

use async_trait::async_trait;
use bridge_traits::error::Result as AdapterResult;
use bridge_traits::{
    Artwork, ArtworkFetcher, BindingGeneration, BridgeError, CommandStatus, ContentView,
    ControlSurface, ItemStatus, MediaEngine, NativePlayer, NativeSignal, NowPlayingCenter,
    NowPlayingInfo, ObserverHandle, PreparedItem, SignalSink, SurfaceBindings, TransportCommand,
    ViewId,
};
use core_playback::{BridgeHandle, BridgeRuntime, PlaybackError, SessionId};
use core_runtime::BridgeConfig;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

type OpLog = Arc<Mutex<Vec<String>>>;

// ============================================================================
// Mock NativePlayer
// ============================================================================

struct MockPlayer {
    label: String,
    log: OpLog,
    rate: Mutex<f64>,
    time: Mutex<f64>,
    item: Mutex<Option<String>>,
    item_failed: AtomicBool,
    observers: Mutex<HashMap<u64, SignalSink>>,
    next_observer: AtomicU64,
    load_delays: Arc<Mutex<HashMap<String, Duration>>>,
}

impl MockPlayer {
    fn record(&self, op: impl AsRef<str>) {
        self.log.lock().push(format!("{}.{}", self.label, op.as_ref()));
    }

    /// Delivers a signal to every registered observer, as the platform would.
    fn emit(&self, signal: NativeSignal) {
        let sinks: Vec<SignalSink> = self.observers.lock().values().cloned().collect();
        for sink in sinks {
            sink.emit(signal);
        }
    }

    fn change_rate(&self, rate: f64) {
        let changed = {
            let mut current = self.rate.lock();
            let changed = *current != rate;
            *current = rate;
            changed
        };
        if changed {
            self.emit(NativeSignal::RateChanged { rate });
        }
    }

    /// Marks the installed item as failed without touching the rate.
    fn fail_item(&self) {
        self.item_failed.store(true, Ordering::SeqCst);
    }

    fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }
}

#[async_trait]
impl NativePlayer for MockPlayer {
    async fn prepare(&self, url: &str) -> AdapterResult<PreparedItem> {
        let delay = self.load_delays.lock().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if url.contains("broken") {
            return Err(BridgeError::LoadFailed {
                url: url.to_string(),
                reason: "unsupported".into(),
            });
        }
        Ok(PreparedItem::new(url, Some(120.0), 1))
    }

    async fn probe_duration(&self, _url: &str) -> AdapterResult<Option<f64>> {
        Ok(None)
    }

    fn replace_item(&self, item: Option<PreparedItem>) {
        match &item {
            Some(item) => self.record(format!("replace:{}", item.url)),
            None => self.record("replace:none"),
        }
        *self.item.lock() = item.map(|i| i.url);
    }

    fn begin_buffering(&self) {
        self.record("buffer");
    }

    fn play(&self) {
        self.record("play");
        self.change_rate(1.0);
    }

    fn pause(&self) {
        self.record("pause");
        self.change_rate(0.0);
    }

    fn set_rate(&self, rate: f64) {
        self.record(format!("rate:{}", rate));
        self.change_rate(rate);
    }

    fn rate(&self) -> f64 {
        *self.rate.lock()
    }

    fn current_time(&self) -> f64 {
        *self.time.lock()
    }

    fn status(&self) -> ItemStatus {
        if self.item_failed.load(Ordering::SeqCst) {
            ItemStatus::Failed
        } else if self.item.lock().is_some() {
            ItemStatus::ReadyToPlay
        } else {
            ItemStatus::Unknown
        }
    }

    fn jump_to(&self, time: f64) {
        self.record(format!("jump:{}", time));
        *self.time.lock() = time;
    }

    async fn seek(&self, time: f64) -> AdapterResult<f64> {
        self.record(format!("seek:{}", time));
        *self.time.lock() = time;
        self.emit(NativeSignal::TimeJumped { time });
        Ok(time)
    }

    fn add_observer(&self, sink: SignalSink) -> AdapterResult<ObserverHandle> {
        self.record("observe");
        let handle = self.next_observer.fetch_add(1, Ordering::SeqCst);
        self.observers.lock().insert(handle, sink);
        Ok(ObserverHandle(handle))
    }

    fn remove_observer(&self, handle: ObserverHandle) -> AdapterResult<()> {
        self.record("unobserve");
        self.observers
            .lock()
            .remove(&handle.0)
            .map(|_| ())
            .ok_or(BridgeError::NotObserved)
    }
}

// ============================================================================
// Mock MediaEngine
// ============================================================================

struct MockEngine {
    log: OpLog,
    players: Mutex<Vec<Arc<MockPlayer>>>,
    volume: Mutex<f64>,
    configured: Mutex<u32>,
    load_delays: Arc<Mutex<HashMap<String, Duration>>>,
}

impl MockEngine {
    fn new(log: OpLog) -> Self {
        Self {
            log,
            players: Mutex::new(Vec::new()),
            volume: Mutex::new(1.0),
            configured: Mutex::new(0),
            load_delays: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn player(&self, index: usize) -> Arc<MockPlayer> {
        Arc::clone(&self.players.lock()[index])
    }

    fn delay_load(&self, url: &str, delay: Duration) {
        self.load_delays.lock().insert(url.to_string(), delay);
    }
}

impl MediaEngine for MockEngine {
    fn configure_session(&self) -> AdapterResult<()> {
        *self.configured.lock() += 1;
        Ok(())
    }

    fn create_player(&self) -> AdapterResult<Arc<dyn NativePlayer>> {
        let mut players = self.players.lock();
        let player = Arc::new(MockPlayer {
            label: format!("p{}", players.len() + 1),
            log: Arc::clone(&self.log),
            rate: Mutex::new(0.0),
            time: Mutex::new(0.0),
            item: Mutex::new(None),
            item_failed: AtomicBool::new(false),
            observers: Mutex::new(HashMap::new()),
            next_observer: AtomicU64::new(1),
            load_delays: Arc::clone(&self.load_delays),
        });
        players.push(Arc::clone(&player));
        Ok(player)
    }

    fn device_volume(&self) -> f64 {
        *self.volume.lock()
    }

    fn set_device_volume(&self, volume: f64) -> AdapterResult<()> {
        self.log.lock().push(format!("engine.volume:{}", volume));
        *self.volume.lock() = volume;
        Ok(())
    }
}

// ============================================================================
// Mock system integration
// ============================================================================

struct MockSurface {
    log: OpLog,
    installed: Mutex<Option<BindingGeneration>>,
}

impl ControlSurface for MockSurface {
    fn install(&self, bindings: &SurfaceBindings) -> AdapterResult<()> {
        self.log
            .lock()
            .push(format!("surface.install:{}", bindings.generation.0));
        *self.installed.lock() = Some(bindings.generation);
        Ok(())
    }

    fn remove(&self, generation: BindingGeneration) -> AdapterResult<()> {
        self.log.lock().push(format!("surface.remove:{}", generation.0));
        let mut installed = self.installed.lock();
        if *installed == Some(generation) {
            *installed = None;
        }
        Ok(())
    }
}

struct MockNowPlaying {
    log: OpLog,
    published: Mutex<Vec<NowPlayingInfo>>,
}

impl NowPlayingCenter for MockNowPlaying {
    fn publish(&self, info: &NowPlayingInfo) {
        self.log.lock().push("np.publish".to_string());
        self.published.lock().push(info.clone());
    }

    fn update_playback(&self, elapsed: f64, rate: f64) {
        self.log.lock().push(format!("np.update:{}:{}", elapsed, rate));
    }

    fn clear(&self) {
        self.log.lock().push("np.clear".to_string());
    }
}

struct MockArtwork;

#[async_trait]
impl ArtworkFetcher for MockArtwork {
    async fn fetch(&self, url: &str) -> AdapterResult<Artwork> {
        if url.contains("missing") {
            return Err(BridgeError::OperationFailed("404".into()));
        }
        Ok(Artwork::new(url.as_bytes().to_vec(), Some("image/jpeg".into())))
    }
}

struct MockView {
    id: ViewId,
    events: Mutex<Vec<Value>>,
}

impl MockView {
    fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: ViewId(id),
            events: Mutex::new(Vec::new()),
        })
    }

    fn actions(&self, session: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e["id"] == session)
            .filter_map(|e| e["action"].as_str().map(str::to_string))
            .collect()
    }

    fn events_named(&self, session: &str, action: &str) -> Vec<Value> {
        self.events
            .lock()
            .iter()
            .filter(|e| e["id"] == session && e["action"] == action)
            .cloned()
            .collect()
    }

    fn has(&self, session: &str, action: &str) -> bool {
        !self.events_named(session, action).is_empty()
    }

    fn clear(&self) {
        self.events.lock().clear();
    }
}

impl ContentView for MockView {
    fn id(&self) -> ViewId {
        self.id
    }

    fn deliver_event(&self, event: Value) -> AdapterResult<()> {
        self.events.lock().push(event);
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    runtime: BridgeRuntime,
    handle: BridgeHandle,
    engine: Arc<MockEngine>,
    surface: Arc<MockSurface>,
    now_playing: Arc<MockNowPlaying>,
    log: OpLog,
}

impl Harness {
    fn new() -> Self {
        Self::with_interval(Duration::from_millis(500))
    }

    fn with_interval(interval: Duration) -> Self {
        let log: OpLog = Arc::new(Mutex::new(Vec::new()));
        let engine = Arc::new(MockEngine::new(Arc::clone(&log)));
        let surface = Arc::new(MockSurface {
            log: Arc::clone(&log),
            installed: Mutex::new(None),
        });
        let now_playing = Arc::new(MockNowPlaying {
            log: Arc::clone(&log),
            published: Mutex::new(Vec::new()),
        });

        let config = BridgeConfig::builder()
            .media_engine(engine.clone())
            .now_playing(now_playing.clone())
            .control_surface(surface.clone())
            .artwork_fetcher(Arc::new(MockArtwork))
            .time_update_interval(interval)
            .build()
            .unwrap();

        let runtime = BridgeRuntime::spawn(config);
        let handle = runtime.handle();

        Self {
            runtime,
            handle,
            engine,
            surface,
            now_playing,
            log,
        }
    }

    fn send(&self, view: &Arc<MockView>, payload: Value) {
        let view: Arc<dyn ContentView> = view.clone();
        self.handle.post_command(view, payload).unwrap();
    }

    fn command(&self, view: &Arc<MockView>, id: &str, action: &str) {
        self.send(view, json!({"id": id, "action": action}));
    }

    fn command_with(&self, view: &Arc<MockView>, id: &str, action: &str, data: Value) {
        self.send(view, json!({"id": id, "action": action, "data": data}));
    }

    /// Creates a session and waits until its source is ready.
    async fn ready_session(&self, view: &Arc<MockView>, id: &str, url: &str) {
        self.command_with(view, id, "setSource", json!(url));
        eventually("source ready", || view.has(id, "onCanPlay")).await;
    }

    /// Round-trips through the queue so that everything posted before has
    /// been processed.
    async fn settle(&self) {
        self.handle.snapshot().await.unwrap();
    }

    fn ops(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn position(&self, op: &str) -> usize {
        self.ops()
            .iter()
            .position(|o| o == op)
            .unwrap_or_else(|| panic!("operation {} not found in {:?}", op, self.ops()))
    }

    fn generation(&self) -> BindingGeneration {
        self.surface.installed.lock().expect("surface installed")
    }
}

async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ============================================================================
// Tests: Event sequences
// ============================================================================

#[tokio::test]
async fn test_ready_sequence_after_set_source() {
    let h = Harness::new();
    let view = MockView::new(1);

    h.ready_session(&view, "a", "https://example.com/a.mp3").await;

    assert_eq!(
        view.actions("a"),
        vec![
            "onLoadedMetadata",
            "onDurationChange",
            "onLoadedData",
            "onCanPlay",
            "onVolumeChange"
        ]
    );
    assert_eq!(view.events_named("a", "onDurationChange")[0]["duration"], 120.0);
    // setSource never autoplays.
    assert!(!h.ops().contains(&"p1.play".to_string()));
}

#[tokio::test]
async fn test_play_then_seek_end_to_end() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.ready_session(&view, "a", "a.mp3").await;
    view.clear();

    h.command(&view, "a", "play");
    eventually("playing", || view.has("a", "onPlaying")).await;

    h.command_with(&view, "a", "seek", json!(10.0));
    eventually("seeked", || view.has("a", "onSeeked")).await;
    eventually("time update", || view.has("a", "onTimeUpdate")).await;

    let actions = view.actions("a");
    let play = actions.iter().position(|a| a == "onPlay").unwrap();
    assert_eq!(actions[play + 1], "onPlaying");

    let seeked = actions.iter().position(|a| a == "onSeeked").unwrap();
    assert_eq!(actions[seeked - 1], "onSeeking");
    assert!(seeked > play);

    let confirmed = view.events_named("a", "onSeeked")[0]["time"].as_f64().unwrap();
    assert!((confirmed - 10.0).abs() <= 1.0);
    assert!(view
        .events_named("a", "onTimeUpdate")
        .iter()
        .any(|e| e["time"] == 10.0));
}

#[tokio::test]
async fn test_play_before_ready_starts_on_readiness() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.engine.delay_load("slow.mp3", Duration::from_millis(50));

    h.command_with(&view, "a", "setSource", json!("slow.mp3"));
    h.command(&view, "a", "play");
    eventually("playing", || view.has("a", "onPlaying")).await;

    assert!(h.position("p1.replace:slow.mp3") < h.position("p1.play"));
    assert!(h.position("p1.observe") < h.position("p1.play"));
}

#[tokio::test]
async fn test_load_requests_buffering_once() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.engine.delay_load("slow.mp3", Duration::from_millis(30));

    h.command_with(&view, "a", "setSource", json!("slow.mp3"));
    h.command(&view, "a", "load");
    h.command(&view, "a", "load");
    eventually("source ready", || view.has("a", "onCanPlay")).await;
    h.command(&view, "a", "load");
    h.settle().await;

    let buffers = h.ops().iter().filter(|o| *o == "p1.buffer").count();
    assert_eq!(buffers, 1);
}

#[tokio::test]
async fn test_native_signals_translate_for_current_session() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.ready_session(&view, "a", "a.mp3").await;
    h.command(&view, "a", "play");
    eventually("playing", || view.has("a", "onPlaying")).await;
    view.clear();

    let player = h.engine.player(0);
    player.emit(NativeSignal::Stalled);
    player.emit(NativeSignal::BufferStatus { sufficient: true });
    player.emit(NativeSignal::BufferStatus { sufficient: true });
    player.emit(NativeSignal::PlayedToEnd);
    eventually("ended", || view.has("a", "onEnded")).await;

    let actions: Vec<String> = view
        .actions("a")
        .into_iter()
        .filter(|a| a != "onTimeUpdate")
        .collect();
    assert_eq!(actions, vec!["onStalled", "onCanPlayThrough", "onEnded"]);
}

#[tokio::test]
async fn test_failed_load_is_silent() {
    let h = Harness::new();
    let view = MockView::new(1);

    h.command_with(&view, "a", "setSource", json!("broken.mp3"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.settle().await;

    assert!(view.actions("a").is_empty());
    assert!(!h.ops().iter().any(|o| o.starts_with("p1.replace")));
}

// ============================================================================
// Tests: Arbitration
// ============================================================================

#[tokio::test]
async fn test_hand_off_stops_previous_before_new_play() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.ready_session(&view, "a", "a.mp3").await;
    h.ready_session(&view, "b", "b.mp3").await;

    h.command(&view, "a", "play");
    eventually("a playing", || view.has("a", "onPlaying")).await;
    h.command(&view, "b", "play");
    eventually("b playing", || view.has("b", "onPlaying")).await;

    let b_play = h.position("p2.play");
    for op in ["p1.pause", "p1.rate:0", "p1.jump:0", "p1.unobserve"] {
        assert!(h.position(op) < b_play, "{} must precede p2.play", op);
    }
    assert!(h.position("p1.pause") < h.position("p1.rate:0"));
    assert!(h.position("p1.rate:0") < h.position("p1.jump:0"));
    assert!(h.position("p1.jump:0") < h.position("p1.unobserve"));

    // Bindings are replaced, never patched.
    assert!(h.position("surface.remove:1") < h.position("surface.install:2"));

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.current, Some(SessionId::from("b")));
    assert_eq!(snapshot.generation, Some(BindingGeneration(2)));
    assert!(view.has("a", "onPause"));
    assert_eq!(h.engine.player(0).observer_count(), 0);
    assert_eq!(h.engine.player(1).observer_count(), 1);
}

#[tokio::test]
async fn test_only_current_session_gets_time_and_publishes() {
    let h = Harness::with_interval(Duration::from_millis(20));
    let view = MockView::new(1);
    h.ready_session(&view, "a", "a.mp3").await;
    h.command_with(
        &view,
        "a",
        "setMetadata",
        json!({"title": "First", "artist": "A"}),
    );
    h.ready_session(&view, "b", "b.mp3").await;
    h.command_with(
        &view,
        "b",
        "setMetadata",
        json!({"title": "Second", "artist": "B"}),
    );

    h.command(&view, "a", "play");
    eventually("a playing", || view.has("a", "onPlaying")).await;
    h.command(&view, "b", "play");
    eventually("b playing", || view.has("b", "onPlaying")).await;
    view.clear();

    eventually("b time updates", || {
        view.events_named("b", "onTimeUpdate").len() >= 3
    })
    .await;
    assert!(view.events_named("a", "onTimeUpdate").is_empty());

    // A late signal for the previous session is dropped.
    h.handle
        .native_signal(SessionId::from("a"), NativeSignal::PlayedToEnd)
        .unwrap();
    h.settle().await;
    assert!(!view.has("a", "onEnded"));

    let titles: Vec<String> = h
        .now_playing
        .published
        .lock()
        .iter()
        .filter_map(|info| info.title.clone())
        .collect();
    assert_eq!(titles, vec!["First", "Second"]);
}

#[tokio::test]
async fn test_time_updates_stop_when_item_fails() {
    let h = Harness::with_interval(Duration::from_millis(20));
    let view = MockView::new(1);
    h.ready_session(&view, "a", "a.mp3").await;

    h.command(&view, "a", "play");
    eventually("time updates", || view.has("a", "onTimeUpdate")).await;

    h.engine.player(0).fail_item();
    h.settle().await;
    view.clear();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.engine.player(0).rate(), 1.0);
    assert!(!view.has("a", "onTimeUpdate"));
}

#[tokio::test]
async fn test_set_rate_promotes_only_when_nonzero() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.ready_session(&view, "a", "a.mp3").await;

    h.command_with(&view, "a", "setRate", json!(0.0));
    h.settle().await;
    assert_eq!(h.handle.snapshot().await.unwrap().current, None);

    h.command_with(&view, "a", "setRate", json!(1.5));
    eventually("rate change", || view.has("a", "onRateChange")).await;

    assert_eq!(
        h.handle.snapshot().await.unwrap().current,
        Some(SessionId::from("a"))
    );
    assert_eq!(view.events_named("a", "onRateChange")[0]["rate"], 1.5);
}

#[tokio::test]
async fn test_volume_is_device_global() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.ready_session(&view, "a", "a.mp3").await;
    h.ready_session(&view, "b", "b.mp3").await;
    h.command(&view, "a", "play");
    eventually("a playing", || view.has("a", "onPlaying")).await;
    view.clear();

    // Set from the non-current session, observed by the current one.
    h.command_with(&view, "b", "setVolume", json!(0.3));
    eventually("volume change", || view.has("a", "onVolumeChange")).await;

    assert_eq!(*h.engine.volume.lock(), 0.3);
    assert_eq!(view.events_named("a", "onVolumeChange")[0]["volume"], 0.3);
    assert!(!view.has("b", "onVolumeChange"));
}

// ============================================================================
// Tests: Cancellation and robustness
// ============================================================================

#[tokio::test]
async fn test_stale_readiness_is_discarded() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.engine.delay_load("slow.mp3", Duration::from_millis(80));

    h.command_with(&view, "a", "setSource", json!("slow.mp3"));
    h.command_with(&view, "a", "setSource", json!("fast.mp3"));
    eventually("fast ready", || view.has("a", "onCanPlay")).await;

    tokio::time::sleep(Duration::from_millis(150)).await;
    h.settle().await;

    let ops = h.ops();
    assert!(ops.contains(&"p1.replace:fast.mp3".to_string()));
    assert!(!ops.contains(&"p1.replace:slow.mp3".to_string()));
    assert_eq!(view.events_named("a", "onLoadedMetadata").len(), 1);
}

#[tokio::test]
async fn test_malformed_commands_are_dropped() {
    let h = Harness::new();
    let view = MockView::new(1);

    h.send(&view, json!({"action": "play"}));
    h.send(&view, json!({"id": "a", "action": "warp"}));
    h.send(&view, json!({"id": "a", "action": "seek", "data": "soon"}));
    h.send(&view, json!({"id": "a", "action": "setSource"}));
    h.send(&view, json!({"id": "ghost", "action": "play"}));
    h.send(&view, json!(42));
    h.settle().await;

    let snapshot = h.handle.snapshot().await.unwrap();
    assert!(snapshot.sessions.is_empty());
    assert!(view.events.lock().is_empty());

    // The queue is still alive.
    h.ready_session(&view, "a", "a.mp3").await;
}

#[tokio::test]
async fn test_enable_configures_session_once() {
    let h = Harness::new();
    let view = MockView::new(1);

    h.send(&view, json!({"action": "enable"}));
    h.send(&view, json!({"action": "enable"}));
    h.settle().await;

    assert_eq!(*h.engine.configured.lock(), 1);
}

#[tokio::test]
async fn test_destroy_twice_is_harmless() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.ready_session(&view, "a", "a.mp3").await;
    h.command(&view, "a", "play");
    eventually("playing", || view.has("a", "onPlaying")).await;

    h.command(&view, "a", "destroy");
    h.command(&view, "a", "destroy");
    h.settle().await;

    let ops = h.ops();
    let count = |op: &str| ops.iter().filter(|o| *o == op).count();
    assert_eq!(count("p1.unobserve"), 1);
    assert_eq!(count("p1.replace:none"), 1);
    assert_eq!(count("np.clear"), 1);
    assert_eq!(count("surface.remove:1"), 1);

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.current, None);
    assert!(snapshot.sessions.is_empty());
    assert_eq!(h.engine.player(0).observer_count(), 0);
}

#[tokio::test]
async fn test_destroying_non_current_session_keeps_surface() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.ready_session(&view, "a", "a.mp3").await;
    h.ready_session(&view, "b", "b.mp3").await;
    h.command(&view, "a", "play");
    eventually("playing", || view.has("a", "onPlaying")).await;

    h.command(&view, "b", "destroy");
    h.settle().await;

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.current, Some(SessionId::from("a")));
    assert_eq!(snapshot.sessions, vec![SessionId::from("a")]);
    assert!(!h.ops().contains(&"np.clear".to_string()));
}

#[tokio::test]
async fn test_view_closed_destroys_owned_sessions() {
    let h = Harness::new();
    let first = MockView::new(1);
    let second = MockView::new(2);
    h.ready_session(&first, "a", "a.mp3").await;
    h.ready_session(&first, "b", "b.mp3").await;
    h.ready_session(&second, "c", "c.mp3").await;

    h.handle.view_closed(ViewId(1)).unwrap();
    h.settle().await;

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.sessions, vec![SessionId::from("c")]);
}

// ============================================================================
// Tests: Metadata
// ============================================================================

#[tokio::test]
async fn test_metadata_defaults_year_and_cover() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.ready_session(&view, "a", "a.mp3").await;
    h.command(&view, "a", "play");
    eventually("playing", || view.has("a", "onPlaying")).await;

    h.command_with(
        &view,
        "a",
        "setMetadata",
        json!({"year": "2001-09-11", "cover": "https://example.com/cover.jpg"}),
    );
    eventually("artwork published", || {
        h.now_playing
            .published
            .lock()
            .iter()
            .any(|info| info.artwork.is_some())
    })
    .await;

    let published = h.now_playing.published.lock().clone();
    let last = published.last().unwrap();
    assert_eq!(last.title.as_deref(), Some("Untitled"));
    assert_eq!(last.artist.as_deref(), Some("Unknown"));
    assert_eq!(
        last.release_date,
        chrono::NaiveDate::from_ymd_opt(2001, 1, 1)
    );
    assert_eq!(last.duration, Some(120.0));
}

#[tokio::test]
async fn test_missing_cover_is_ignored() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.ready_session(&view, "a", "a.mp3").await;
    h.command(&view, "a", "play");
    eventually("playing", || view.has("a", "onPlaying")).await;

    h.command_with(
        &view,
        "a",
        "setMetadata",
        json!({"title": "Song", "cover": "https://example.com/missing.jpg"}),
    );
    tokio::time::sleep(Duration::from_millis(30)).await;
    h.settle().await;

    let published = h.now_playing.published.lock().clone();
    assert!(published.iter().all(|info| info.artwork.is_none()));
    assert_eq!(published.last().unwrap().title.as_deref(), Some("Song"));
}

// ============================================================================
// Tests: Transport commands
// ============================================================================

#[tokio::test]
async fn test_transport_commands_fail_when_idle() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.ready_session(&view, "a", "a.mp3").await;

    for command in [
        TransportCommand::Play,
        TransportCommand::Pause,
        TransportCommand::NextTrack,
        TransportCommand::ChangePlaybackPosition(5.0),
    ] {
        assert_eq!(
            h.handle.transport(BindingGeneration(1), command).await,
            CommandStatus::Failed
        );
    }
    assert!(!h.ops().iter().any(|o| o.starts_with("p1.play") || o.starts_with("p1.seek")));
}

#[tokio::test]
async fn test_transport_play_pause_applicability() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.ready_session(&view, "a", "a.mp3").await;
    h.command(&view, "a", "play");
    eventually("playing", || view.has("a", "onPlaying")).await;
    let generation = h.generation();

    assert_eq!(
        h.handle.transport(generation, TransportCommand::Play).await,
        CommandStatus::Failed
    );
    assert_eq!(
        h.handle.transport(generation, TransportCommand::Pause).await,
        CommandStatus::Success
    );
    assert_eq!(
        h.handle.transport(generation, TransportCommand::Pause).await,
        CommandStatus::Failed
    );
    assert_eq!(
        h.handle.transport(generation, TransportCommand::Play).await,
        CommandStatus::Success
    );
    assert_eq!(
        h.handle
            .transport(BindingGeneration(generation.0 + 1), TransportCommand::Pause)
            .await,
        CommandStatus::Failed
    );
}

#[tokio::test]
async fn test_transport_seek_hold_and_track_navigation() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.ready_session(&view, "a", "a.mp3").await;
    h.command(&view, "a", "play");
    eventually("playing", || view.has("a", "onPlaying")).await;
    let generation = h.generation();

    let status = h
        .handle
        .transport(generation, TransportCommand::SeekForward { begin: true })
        .await;
    assert!(status.is_success());
    assert_eq!(h.engine.player(0).rate(), 3.0);

    h.handle
        .transport(generation, TransportCommand::SeekForward { begin: false })
        .await;
    assert_eq!(h.engine.player(0).rate(), 1.0);

    h.handle
        .transport(generation, TransportCommand::SeekBackward { begin: true })
        .await;
    assert_eq!(h.engine.player(0).rate(), -3.0);

    h.handle
        .transport(generation, TransportCommand::NextTrack)
        .await;
    h.handle
        .transport(generation, TransportCommand::PreviousTrack)
        .await;
    eventually("navigation events", || {
        view.has("a", "onNext") && view.has("a", "onPrevious")
    })
    .await;
    eventually("navigation seeks", || {
        let ops = h.ops();
        ops.contains(&"p1.seek:120".to_string()) && ops.contains(&"p1.seek:0".to_string())
    })
    .await;

    // Skip controls are disabled by default.
    assert_eq!(
        h.handle
            .transport(generation, TransportCommand::SkipForward { interval: 15.0 })
            .await,
        CommandStatus::Failed
    );
}

// ============================================================================
// Tests: Runtime lifecycle
// ============================================================================

#[tokio::test]
async fn test_shutdown_destroys_sessions_and_closes_queue() {
    let h = Harness::new();
    let view = MockView::new(1);
    h.ready_session(&view, "a", "a.mp3").await;
    h.command(&view, "a", "play");
    eventually("playing", || view.has("a", "onPlaying")).await;

    let handle = h.handle.clone();
    h.runtime.shutdown().await.unwrap();

    assert!(h.log.lock().contains(&"np.clear".to_string()));
    let view: Arc<dyn ContentView> = view;
    assert!(matches!(
        handle.post_command(view, json!({"action": "enable"})),
        Err(PlaybackError::QueueClosed)
    ));
    assert_eq!(
        handle
            .transport(BindingGeneration(1), TransportCommand::Play)
            .await,
        CommandStatus::Failed
    );
}
