//! Playback engine handle
//!
//! All state lives in a single task that owns the [`PlaybackController`].
//! User commands, native events and library events reach it over one channel
//! and are applied strictly one after another, so no command ever observes
//! another half-applied. [`PlaybackEngine`] is the cheap, cloneable handle to
//! that task.
//!
//! ```text
//!  UI ──┐
//!  native player ──┼──▶ mpsc ──▶ actor (controller) ──▶ watch<PlaybackSnapshot>
//!  library ──┘                                     └──▶ broadcast<PlaybackEvent>
//! ```

use cadence_core::{
    LibraryEvent, MutationOutcome, NativeEvent, PlaybackSource, RepeatMode, TrackId,
};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::controller::{EngineDeps, PlaybackController};
use crate::error::{PlaybackError, Result};
use crate::events::PlaybackEvent;
use crate::queue::PlaybackQueue;
use crate::snapshot::PlaybackSnapshot;
use crate::synchronizer::BufferWindow;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    PlayFrom {
        source: PlaybackSource,
        track_id: Option<TrackId>,
        reply: Reply<()>,
    },
    Play(Reply<()>),
    Pause(Reply<()>),
    PlayToggle(Reply<()>),
    SkipNext(Reply<()>),
    SkipPrev(Reply<()>),
    SeekTo(Duration, Reply<()>),
    EnqueueNext(Vec<TrackId>, Reply<()>),
    DequeueAt(usize, Reply<()>),
    DequeueIds(HashSet<TrackId>, Reply<()>),
    ToggleShuffle(Reply<()>),
    CycleRepeat(Reply<RepeatMode>),
    SetRepeat(RepeatMode, Reply<()>),
    ToggleFavorite(TrackId, Reply<MutationOutcome>),
    Native(NativeEvent, Reply<()>),
    Library(LibraryEvent, Reply<()>),
    QueueState(Reply<PlaybackQueue>),
    Window(Reply<BufferWindow>),
    Shutdown(Reply<()>),
}

/// Handle to a running playback engine
#[derive(Clone)]
pub struct PlaybackEngine {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<PlaybackSnapshot>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackEngine {
    /// Start the engine task
    ///
    /// Persisted state is restored before the first command is handled.
    /// Must be called from within a Tokio runtime.
    pub fn spawn(deps: EngineDeps, config: EngineConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer);
        let (snapshot_tx, snapshot_rx) = watch::channel(PlaybackSnapshot::default());
        let (event_tx, _) = broadcast::channel(config.event_buffer);

        let controller = PlaybackController::new(deps, config, snapshot_tx, event_tx.clone());
        tokio::spawn(run(controller, command_rx));

        Self {
            commands: command_tx,
            snapshot: snapshot_rx,
            events: event_tx,
        }
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| PlaybackError::EngineClosed)?;
        response.await.map_err(|_| PlaybackError::EngineClosed)
    }

    // ===== Observation =====

    /// Latest published state
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that wakes on every published state change
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot.clone()
    }

    /// Discrete playback events
    pub fn events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Copy of the queue model
    pub async fn queue_state(&self) -> Result<PlaybackQueue> {
        self.request(Command::QueueState).await
    }

    /// What the engine believes the native player holds
    pub async fn window(&self) -> Result<BufferWindow> {
        self.request(Command::Window).await
    }

    // ===== Commands =====

    /// Play `source`, starting at `track_id` when given
    pub async fn play_from(&self, source: PlaybackSource, track_id: Option<TrackId>) -> Result<()> {
        self.request(|reply| Command::PlayFrom {
            source,
            track_id,
            reply,
        })
        .await
    }

    pub async fn play(&self) -> Result<()> {
        self.request(Command::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await
    }

    pub async fn play_toggle(&self) -> Result<()> {
        self.request(Command::PlayToggle).await
    }

    pub async fn skip_next(&self) -> Result<()> {
        self.request(Command::SkipNext).await
    }

    pub async fn skip_prev(&self) -> Result<()> {
        self.request(Command::SkipPrev).await
    }

    /// Seek to `position_ms`; negative positions are logged and ignored
    pub async fn seek_to(&self, position_ms: i64) -> Result<()> {
        let Ok(ms) = u64::try_from(position_ms) else {
            warn!("{}", PlaybackError::InvalidSeekPosition(position_ms));
            return Ok(());
        };
        self.request(|reply| Command::SeekTo(Duration::from_millis(ms), reply))
            .await
    }

    /// Play `ids` after the current track, ahead of the rest of the list
    pub async fn enqueue_next(&self, ids: Vec<TrackId>) -> Result<()> {
        self.request(|reply| Command::EnqueueNext(ids, reply)).await
    }

    pub async fn dequeue_at(&self, index: usize) -> Result<()> {
        self.request(|reply| Command::DequeueAt(index, reply)).await
    }

    pub async fn dequeue_ids(&self, ids: HashSet<TrackId>) -> Result<()> {
        self.request(|reply| Command::DequeueIds(ids, reply)).await
    }

    pub async fn toggle_shuffle(&self) -> Result<()> {
        self.request(Command::ToggleShuffle).await
    }

    /// Advance the repeat mode, returning the new one
    pub async fn cycle_repeat(&self) -> Result<RepeatMode> {
        self.request(Command::CycleRepeat).await
    }

    pub async fn set_repeat(&self, mode: RepeatMode) -> Result<()> {
        self.request(|reply| Command::SetRepeat(mode, reply)).await
    }

    pub async fn toggle_favorite(&self, track_id: TrackId) -> Result<MutationOutcome> {
        self.request(|reply| Command::ToggleFavorite(track_id, reply))
            .await
    }

    // ===== Collaborator events =====

    /// Feed an event from the native player
    pub async fn native_event(&self, event: NativeEvent) -> Result<()> {
        self.request(|reply| Command::Native(event, reply)).await
    }

    /// Feed a change notification from the library
    pub async fn library_event(&self, event: LibraryEvent) -> Result<()> {
        self.request(|reply| Command::Library(event, reply)).await
    }

    /// Flush pending work, persist and stop the engine task
    pub async fn shutdown(&self) -> Result<()> {
        self.request(Command::Shutdown).await
    }
}

async fn run(mut controller: PlaybackController, mut commands: mpsc::Receiver<Command>) {
    controller.restore().await;
    controller.settle().await;
    info!("Playback engine started");

    loop {
        let deadline = controller.refresh_deadline();
        let command = tokio::select! {
            biased;

            _ = wait_until(deadline) => {
                controller.flush_refresh().await;
                controller.settle().await;
                continue;
            }
            command = commands.recv() => command,
        };

        let Some(command) = command else {
            debug!("All engine handles dropped");
            controller.shutdown().await;
            break;
        };
        if !dispatch(&mut controller, command).await {
            break;
        }
    }

    info!("Playback engine stopped");
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Publish the new state, then answer the caller
async fn finish<T>(controller: &mut PlaybackController, reply: Reply<T>, value: T) {
    controller.settle().await;
    // Caller may have given up waiting
    let _ = reply.send(value);
}

/// Apply one command; returns `false` once the engine should stop
async fn dispatch(controller: &mut PlaybackController, command: Command) -> bool {
    match command {
        Command::PlayFrom {
            source,
            track_id,
            reply,
        } => {
            controller.play_from(source, track_id).await;
            finish(controller, reply, ()).await;
        }
        Command::Play(reply) => {
            controller.play().await;
            finish(controller, reply, ()).await;
        }
        Command::Pause(reply) => {
            controller.pause().await;
            finish(controller, reply, ()).await;
        }
        Command::PlayToggle(reply) => {
            controller.play_toggle().await;
            finish(controller, reply, ()).await;
        }
        Command::SkipNext(reply) => {
            controller.skip_next().await;
            finish(controller, reply, ()).await;
        }
        Command::SkipPrev(reply) => {
            controller.skip_prev().await;
            finish(controller, reply, ()).await;
        }
        Command::SeekTo(position, reply) => {
            controller.seek_to(position).await;
            finish(controller, reply, ()).await;
        }
        Command::EnqueueNext(ids, reply) => {
            controller.enqueue_next(ids).await;
            finish(controller, reply, ()).await;
        }
        Command::DequeueAt(index, reply) => {
            controller.dequeue_at(index).await;
            finish(controller, reply, ()).await;
        }
        Command::DequeueIds(ids, reply) => {
            controller.dequeue_ids(ids).await;
            finish(controller, reply, ()).await;
        }
        Command::ToggleShuffle(reply) => {
            controller.toggle_shuffle().await;
            finish(controller, reply, ()).await;
        }
        Command::CycleRepeat(reply) => {
            let mode = controller.cycle_repeat().await;
            finish(controller, reply, mode).await;
        }
        Command::SetRepeat(mode, reply) => {
            controller.set_repeat(mode).await;
            finish(controller, reply, ()).await;
        }
        Command::ToggleFavorite(track_id, reply) => {
            let outcome = controller.toggle_favorite(track_id).await;
            finish(controller, reply, outcome).await;
        }
        Command::Native(event, reply) => {
            controller.handle_native_event(event).await;
            finish(controller, reply, ()).await;
        }
        Command::Library(event, reply) => {
            controller.handle_library_event(event).await;
            finish(controller, reply, ()).await;
        }
        Command::QueueState(reply) => {
            let _ = reply.send(controller.queue().clone());
        }
        Command::Window(reply) => {
            let _ = reply.send(controller.window().clone());
        }
        Command::Shutdown(reply) => {
            controller.shutdown().await;
            finish(controller, reply, ()).await;
            return false;
        }
    }
    true
}
