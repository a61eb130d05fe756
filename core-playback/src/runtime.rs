//! # Bridge Runtime
//!
//! Spawns the serialized queue task that owns the [`MediaBridge`] and hands
//! out cloneable [`BridgeHandle`]s for posting into it.
//!
//! ```ignore
//! let runtime = BridgeRuntime::spawn(config);
//! let handle = runtime.handle();
//!
//! handle.post_command(view, payload)?;
//! let status = handle.transport(generation, TransportCommand::Pause).await;
//!
//! runtime.shutdown().await?;
//! ```

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{BindingGeneration, CommandStatus, ContentView, NativeSignal, TransportCommand, ViewId};
use core_runtime::BridgeConfig;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bridge::{BridgeMessage, BridgeSnapshot, MediaBridge};
use crate::error::{PlaybackError, Result};
use crate::protocol::SessionId;

/// Cloneable sender side of the bridge queue.
#[derive(Clone)]
pub struct BridgeHandle {
    queue: mpsc::UnboundedSender<BridgeMessage>,
}

impl BridgeHandle {
    fn send(&self, message: BridgeMessage) -> Result<()> {
        self.queue
            .send(message)
            .map_err(|_| PlaybackError::QueueClosed)
    }

    /// Posts a raw script command received from `view`.
    pub fn post_command(&self, view: Arc<dyn ContentView>, payload: Value) -> Result<()> {
        self.send(BridgeMessage::Command { view, payload })
    }

    /// Forwards a native observer callback for session `id`.
    pub fn native_signal(&self, id: SessionId, signal: NativeSignal) -> Result<()> {
        self.send(BridgeMessage::Native { id, signal })
    }

    /// Routes an OS transport command to the current session.
    ///
    /// Resolves to [`CommandStatus::Failed`] if the bridge is gone.
    pub async fn transport(
        &self,
        generation: BindingGeneration,
        command: TransportCommand,
    ) -> CommandStatus {
        let (reply, response) = oneshot::channel();
        if self
            .send(BridgeMessage::Transport {
                generation,
                command,
                reply,
            })
            .is_err()
        {
            return CommandStatus::Failed;
        }
        response.await.unwrap_or(CommandStatus::Failed)
    }

    /// Destroys every session owned by `view`.
    pub fn view_closed(&self, view: ViewId) -> Result<()> {
        self.send(BridgeMessage::ViewClosed(view))
    }

    /// Current session, registered sessions and binding generation.
    pub async fn snapshot(&self) -> Result<BridgeSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(BridgeMessage::Inspect(reply))?;
        response.await.map_err(|_| PlaybackError::QueueClosed)
    }

    /// Asks the queue to destroy all sessions and stop.
    pub fn shutdown(&self) -> Result<()> {
        self.send(BridgeMessage::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

impl std::fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("closed", &self.queue.is_closed())
            .finish()
    }
}

/// The running queue task.
pub struct BridgeRuntime {
    handle: BridgeHandle,
    task: JoinHandle<()>,
}

impl BridgeRuntime {
    /// Starts the queue task on the current tokio runtime.
    pub fn spawn(config: BridgeConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let period = config.settings.time_update_interval;
        let bridge = MediaBridge::new(config, tx.clone());

        let task = tokio::spawn(run(bridge, rx, period));
        info!(interval_ms = period.as_millis() as u64, "Bridge runtime started");

        Self {
            handle: BridgeHandle { queue: tx },
            task,
        }
    }

    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    /// Requests shutdown and waits for the queue task to finish.
    pub async fn shutdown(self) -> Result<()> {
        // Already stopped is fine.
        let _ = self.handle.shutdown();
        self.task
            .await
            .map_err(|e| PlaybackError::Internal(format!("bridge task failed: {}", e)))
    }
}

async fn run(
    mut bridge: MediaBridge,
    mut queue: mpsc::UnboundedReceiver<BridgeMessage>,
    period: Duration,
) {
    let mut ticker: Option<Interval> = None;

    loop {
        sync_ticker(&mut ticker, bridge.timer_armed(), period);

        tokio::select! {
            message = queue.recv() => {
                let Some(message) = message else {
                    debug!("Bridge queue closed");
                    bridge.shutdown();
                    break;
                };
                if let ControlFlow::Break(()) = bridge.handle(message) {
                    break;
                }
            }
            _ = next_tick(&mut ticker) => bridge.tick(),
        }
    }

    if !queue.is_empty() {
        warn!(pending = queue.len(), "Bridge stopped with pending messages");
    }
}

/// Arms the interval while the current session plays and drops it otherwise.
fn sync_ticker(ticker: &mut Option<Interval>, armed: bool, period: Duration) {
    match (armed, ticker.is_some()) {
        (true, false) => {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            *ticker = Some(interval);
        }
        (false, true) => *ticker = None,
        _ => {}
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
