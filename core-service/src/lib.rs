//! Host service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (media engine,
//! Now-Playing centre, control surface, haptics) into the media session
//! bridge and routes script messages to it. A host registers the handler
//! names from [`UiNativeService::handler_names`] with every content view,
//! forwards each posted message to [`UiNativeService::handle_script_message`]
//! and reports view closure once through [`UiNativeService::view_closed`].
//!
//! Desktop apps typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) and boot through [`bootstrap_desktop`].

pub mod error;

pub use error::{Result, ServiceError};

use std::sync::Arc;

use bridge_traits::{
    BindingGeneration, CommandStatus, ContentView, FeedbackKind, HapticFeedback, TransportCommand,
    ViewId, AUDIO_HANDLER, FEEDBACK_HANDLER,
};
use core_playback::{BridgeHandle, BridgeRuntime, BridgeSnapshot};
use core_runtime::BridgeConfig;
use serde_json::Value;
use tracing::{debug, info};

#[cfg(feature = "desktop-shims")]
use bridge_traits::MediaEngine;
#[cfg(feature = "desktop-shims")]
use core_runtime::PlaybackSettings;

/// Primary façade exposed to host applications.
pub struct UiNativeService {
    runtime: BridgeRuntime,
    handle: BridgeHandle,
    haptics: Option<Arc<dyn HapticFeedback>>,
}

impl UiNativeService {
    /// Validate `config` and start the bridge on the current tokio runtime.
    pub fn start(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ServiceError::InitializationFailed(
                "UiNativeService must be started inside a tokio runtime".to_string(),
            ));
        }

        let haptics = config.haptics.clone();
        let runtime = BridgeRuntime::spawn(config);
        let handle = runtime.handle();
        info!(haptics = haptics.is_some(), "UI native service started");

        Ok(Self {
            runtime,
            handle,
            haptics,
        })
    }

    /// Script message handlers a content view must register before first use.
    pub fn handler_names() -> [&'static str; 2] {
        [FEEDBACK_HANDLER, AUDIO_HANDLER]
    }

    /// Route a message posted by a script to the handler it named.
    ///
    /// Malformed bodies are not errors: audio commands are validated on the
    /// bridge queue and unknown feedback types are ignored.
    pub fn handle_script_message(
        &self,
        view: Arc<dyn ContentView>,
        handler: &str,
        body: Value,
    ) -> Result<()> {
        match handler {
            AUDIO_HANDLER => {
                self.handle.post_command(view, body)?;
                Ok(())
            }
            FEEDBACK_HANDLER => {
                self.feedback(&body);
                Ok(())
            }
            other => Err(ServiceError::UnknownHandler(other.to_string())),
        }
    }

    fn feedback(&self, body: &Value) {
        let Some(kind) = body.as_str().and_then(|s| s.parse::<FeedbackKind>().ok()) else {
            debug!(?body, "Ignoring unknown feedback type");
            return;
        };
        match &self.haptics {
            Some(haptics) => haptics.trigger(kind),
            None => debug!(kind = kind.as_str(), "No haptics configured"),
        }
    }

    /// Tear down every session the view still owns. Call once per view.
    pub fn view_closed(&self, view: ViewId) -> Result<()> {
        self.handle.view_closed(view)?;
        Ok(())
    }

    /// Forward an OS transport command and resolve with its status.
    pub async fn transport(
        &self,
        generation: BindingGeneration,
        command: TransportCommand,
    ) -> CommandStatus {
        self.handle.transport(generation, command).await
    }

    pub async fn snapshot(&self) -> Result<BridgeSnapshot> {
        Ok(self.handle.snapshot().await?)
    }

    /// Cloneable handle for hosts that post from other threads.
    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    /// Destroy all sessions and stop the bridge.
    pub async fn shutdown(self) -> Result<()> {
        self.runtime.shutdown().await?;
        info!("UI native service stopped");
        Ok(())
    }
}

impl std::fmt::Debug for UiNativeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiNativeService")
            .field("handle", &self.handle)
            .field("haptics", &self.haptics.is_some())
            .finish()
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Uses the headless Now-Playing centre and control surface, the reqwest
/// artwork fetcher and logging haptics from `bridge-desktop`; only the media
/// engine comes from the host.
///
/// ```ignore
/// let service = core_service::bootstrap_desktop(engine, PlaybackSettings::default())?;
/// service.handle_script_message(view, "audio", payload)?;
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(
    engine: Arc<dyn MediaEngine>,
    settings: PlaybackSettings,
) -> Result<UiNativeService> {
    use bridge_desktop::{
        HeadlessControlSurface, HeadlessNowPlaying, HttpArtworkFetcher, TracingHaptics,
    };

    let config = BridgeConfig::builder()
        .media_engine(engine)
        .now_playing(Arc::new(HeadlessNowPlaying::new()))
        .control_surface(Arc::new(HeadlessControlSurface::new()))
        .artwork_fetcher(Arc::new(HttpArtworkFetcher::new()?))
        .haptics(Arc::new(TracingHaptics))
        .settings(settings)
        .build()?;

    UiNativeService::start(config)
}
