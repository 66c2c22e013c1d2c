//! Playback controller
//!
//! Owns the queue, the synchronizer and the recent list, and implements every
//! user command and native event. It is driven by exactly one task (the
//! engine actor), so each method sees and leaves a whole state.
//!
//! Control flow for a command:
//! 1. mutate the queue
//! 2. persist it
//! 3. let the synchronizer mirror it into the player (failures are logged)
//! 4. `settle()`: refresh cached metadata, publish the snapshot, emit events

use cadence_core::{
    default_source_name, KeyValueStore, MutationOutcome, NativeEvent, NativePlayer, NativeState,
    PlaybackSource, RepeatMode, Track, TrackId, TrackRole, TrackStore,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::PlaybackError;
use crate::events::{PlaybackEvent, ResetReason};
use crate::persistence::PersistenceAdapter;
use crate::queue::{Advance, PlayFromOutcome, PlaybackQueue, Purge};
use crate::recent::RecentSources;
use crate::snapshot::PlaybackSnapshot;
use crate::synchronizer::{BufferSynchronizer, BufferWindow, Transition};

/// Upper bound on vanished-track purges while completing one sync step
const MAX_VANISHED_RETRIES: usize = 8;

/// Collaborators the engine runs against
#[derive(Clone)]
pub struct EngineDeps {
    pub store: Arc<dyn TrackStore>,
    pub player: Arc<dyn NativePlayer>,
    pub kv: Arc<dyn KeyValueStore>,
}

#[derive(Debug, Clone, Copy)]
enum SyncStep {
    Preload,
    RefreshNext,
    ReloadCurrent { force_restart: bool },
}

pub struct PlaybackController {
    pub(crate) config: EngineConfig,
    pub(crate) store: Arc<dyn TrackStore>,
    pub(crate) queue: PlaybackQueue,
    pub(crate) sync: BufferSynchronizer,
    pub(crate) recent: RecentSources,
    persistence: PersistenceAdapter,

    /// Metadata of the active track
    current_track: Option<Track>,
    is_playing: bool,
    /// Last known position inside the active track
    resume_position: Duration,
    /// Pending trailing-edge refresh after jump-queue removals
    refresh_deadline: Option<Instant>,

    published: PlaybackSnapshot,
    snapshot_tx: watch::Sender<PlaybackSnapshot>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackController {
    pub fn new(
        deps: EngineDeps,
        config: EngineConfig,
        snapshot_tx: watch::Sender<PlaybackSnapshot>,
        events: broadcast::Sender<PlaybackEvent>,
    ) -> Self {
        Self {
            sync: BufferSynchronizer::new(deps.player, deps.store.clone()),
            persistence: PersistenceAdapter::new(deps.kv, &config),
            recent: RecentSources::new(config.recent_list_size),
            store: deps.store,
            queue: PlaybackQueue::new(),
            config,
            current_track: None,
            is_playing: false,
            resume_position: Duration::ZERO,
            refresh_deadline: None,
            published: PlaybackSnapshot::default(),
            snapshot_tx,
            events,
        }
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    pub fn window(&self) -> &BufferWindow {
        self.sync.window()
    }

    pub fn refresh_deadline(&self) -> Option<Instant> {
        self.refresh_deadline
    }

    // ===== Lifecycle =====

    /// Rehydrate persisted state and preload the player
    pub async fn restore(&mut self) {
        match self.persistence.load_recent().await {
            Ok(Some(mut recent)) => {
                recent.set_max_size(self.config.recent_list_size);
                self.recent = recent;
            }
            Ok(None) => {}
            Err(e) => warn!("Could not read recent list: {}", e),
        }

        let restored = match self.persistence.load_queue().await {
            Ok(Some(restored)) => restored,
            Ok(None) => return,
            Err(e) => {
                warn!("Could not read persisted queue: {}", e);
                return;
            }
        };
        self.queue = restored.queue;
        self.resume_position = restored.resume_position;
        if self.queue.repair() {
            info!("Repaired inconsistent persisted queue");
            self.persist().await;
        }

        let Some(active) = self.queue.active_track_id().cloned() else {
            return;
        };
        match self.store.track(&active).await {
            Ok(Some(track)) => self.current_track = Some(track),
            Ok(None) => {
                warn!("Restored track {} no longer exists", active);
                self.reset_playback(ResetReason::TrackVanished).await;
                return;
            }
            Err(e) => warn!("Could not verify restored track {}: {}", active, e),
        }

        let was_loaded = self.sync.is_loaded().await.unwrap_or(true);
        self.sync_step(SyncStep::Preload).await;
        info!(
            "Restored {:?} at position {:?}",
            self.queue.source(),
            self.queue.position()
        );

        if !was_loaded && !self.resume_position.is_zero() && !self.sync.is_empty() {
            if let Err(e) = self.sync.seek(self.resume_position).await {
                warn!("Could not restore playback position: {}", e);
            }
        }
    }

    /// Flush pending work and persist before the actor exits
    pub async fn shutdown(&mut self) {
        if self.refresh_deadline.is_some() {
            self.flush_refresh().await;
        }
        self.persist().await;
        self.persist_recent().await;
        debug!("Playback controller shut down");
    }

    // ===== Commands =====

    /// Play `source`, optionally starting at `track_id`
    pub async fn play_from(&mut self, source: PlaybackSource, track_id: Option<TrackId>) {
        if self.queue.is_playing_from(&source) {
            match self.queue.play_from_current_source(track_id.as_ref()) {
                PlayFromOutcome::Resumed => {
                    self.play().await;
                    return;
                }
                PlayFromOutcome::Jumped => {
                    self.resume_position = Duration::ZERO;
                    self.persist().await;
                    self.sync_step(SyncStep::ReloadCurrent { force_restart: true })
                        .await;
                    self.play().await;
                    return;
                }
                // Reload the list from the store
                PlayFromOutcome::NotInList
                | PlayFromOutcome::Loaded
                | PlayFromOutcome::EmptySource => {}
            }
        }

        let ids = match self.store.track_ids_for_source(&source).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not load tracks of {}: {}", source, e);
                self.emit(PlaybackEvent::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        let outcome = self
            .queue
            .play_from_new_source(source.clone(), ids, track_id.as_ref());
        if outcome == PlayFromOutcome::EmptySource {
            info!("{} has no tracks, ignoring", source);
            return;
        }
        info!("Playing from {} at {:?}", source, self.queue.position());

        let name = self.resolve_source_name(&source).await;
        self.queue.set_source_name(name);
        self.recent.push(source);
        self.persist_recent().await;

        self.resume_position = Duration::ZERO;
        self.persist().await;
        self.sync_step(SyncStep::ReloadCurrent {
            force_restart: track_id.is_some(),
        })
        .await;
        self.play().await;
    }

    pub async fn play(&mut self) {
        if self.queue.active_track_id().is_none() {
            debug!("Nothing to play");
            return;
        }

        self.sync_step(SyncStep::Preload).await;
        if self.queue.active_track_id().is_none() {
            return;
        }

        self.is_playing = true;
        if let Err(e) = self.sync.play().await {
            warn!("Native play failed: {}", e);
        }
    }

    pub async fn pause(&mut self) {
        self.is_playing = false;
        if let Err(e) = self.sync.pause().await {
            warn!("Native pause failed: {}", e);
        }
        self.persist().await;
    }

    pub async fn play_toggle(&mut self) {
        if self.is_playing {
            self.pause().await;
        } else {
            self.play().await;
        }
    }

    /// User-requested next track
    ///
    /// Ignores `RepeatOne`. At the end of the list under `NoRepeat` the queue
    /// rewinds to the first track and pauses.
    pub async fn skip_next(&mut self) {
        match self.queue.skip_forward() {
            Advance::Idle => return,
            Advance::EndOfQueue => {
                self.end_of_queue(true).await;
                return;
            }
            Advance::FromQueue(_) | Advance::Repeated(_) | Advance::Moved(_) => {}
        }

        self.downgrade_repeat_one();
        self.resume_position = Duration::ZERO;
        self.persist().await;
        self.sync_step(SyncStep::ReloadCurrent {
            force_restart: true,
        })
        .await;
        self.resume_if_playing().await;
    }

    /// User-requested previous track
    ///
    /// Restarts the current track instead when it has played past the
    /// configured threshold.
    pub async fn skip_prev(&mut self) {
        if !self.sync.is_empty() {
            let played = self.sync.position().await.unwrap_or_else(|e| {
                warn!("Could not read playback position: {}", e);
                Duration::ZERO
            });
            if played > self.config.restart_threshold() {
                debug!("Restarting current track ({:?} played)", played);
                if let Err(e) = self.sync.seek(Duration::ZERO).await {
                    warn!("Native seek failed: {}", e);
                }
                self.resume_position = Duration::ZERO;
                return;
            }
        }

        if self.queue.retreat().is_none() {
            return;
        }

        self.downgrade_repeat_one();
        self.resume_position = Duration::ZERO;
        self.persist().await;
        self.sync_step(SyncStep::ReloadCurrent {
            force_restart: true,
        })
        .await;
        self.resume_if_playing().await;
    }

    /// Seek inside the active track; callers reject negative positions
    pub async fn seek_to(&mut self, position: Duration) {
        if self.queue.active_track_id().is_none() {
            return;
        }

        self.sync_step(SyncStep::Preload).await;
        match self.sync.seek(position).await {
            Ok(()) => {
                self.resume_position = position;
                self.persist().await;
            }
            Err(e) => warn!("Native seek failed: {}", e),
        }
    }

    pub async fn enqueue_next(&mut self, ids: Vec<TrackId>) {
        if ids.is_empty() {
            return;
        }
        let head_changed = self.queue.enqueue_next(ids);
        self.persist().await;
        if head_changed {
            self.sync_step(SyncStep::RefreshNext).await;
        }
    }

    pub async fn dequeue_at(&mut self, index: usize) {
        if self.queue.dequeue_at(index).is_some() {
            self.persist().await;
            self.schedule_refresh();
        }
    }

    pub async fn dequeue_ids(&mut self, ids: HashSet<TrackId>) {
        let before = self.queue.jump_queue().len();
        self.queue.dequeue_ids(&ids);
        if self.queue.jump_queue().len() != before {
            self.persist().await;
            self.schedule_refresh();
        }
    }

    pub async fn toggle_shuffle(&mut self) {
        self.queue.toggle_shuffle();
        info!("Shuffle {}", if self.queue.is_shuffled() { "on" } else { "off" });
        self.persist().await;
        self.sync_step(SyncStep::RefreshNext).await;
    }

    pub async fn cycle_repeat(&mut self) -> RepeatMode {
        let mode = self.queue.cycle_repeat();
        info!("Repeat mode: {}", mode);
        self.persist().await;
        self.sync_step(SyncStep::RefreshNext).await;
        mode
    }

    pub async fn set_repeat(&mut self, mode: RepeatMode) {
        if self.queue.repeat_mode() == mode {
            return;
        }
        self.queue.set_repeat_mode(mode);
        self.persist().await;
        self.sync_step(SyncStep::RefreshNext).await;
    }

    /// Flip the favorite flag of a track
    ///
    /// An applied write resynchronizes the favorites playlist right away; a
    /// pending one waits for the store's own `TracksChanged` event.
    pub async fn toggle_favorite(&mut self, track_id: TrackId) -> MutationOutcome {
        let favorite = match self.store.is_favorite(&track_id).await {
            Ok(favorite) => favorite,
            Err(e) => {
                warn!("Could not read favorite state of {}: {}", track_id, e);
                return MutationOutcome::Failed(e.to_string());
            }
        };

        let outcome = self.store.set_favorite(&track_id, !favorite).await;
        match &outcome {
            MutationOutcome::Applied => {
                self.on_tracks_changed(&PlaybackSource::favorites()).await;
            }
            MutationOutcome::Pending => debug!("Favorite write for {} pending", track_id),
            MutationOutcome::Failed(reason) => {
                warn!("Favorite toggle for {} failed: {}", track_id, reason);
            }
        }
        outcome
    }

    // ===== Native events =====

    pub async fn handle_native_event(&mut self, event: NativeEvent) {
        match event {
            NativeEvent::ActiveTrackChanged { track_id, role } => {
                self.on_native_transition(track_id, role).await;
            }
            NativeEvent::QueueEnded => {
                debug!("Native queue ran out");
                self.sync.on_queue_ended();
                self.on_track_finished().await;
            }
            NativeEvent::StateChanged { state } => match state {
                NativeState::Paused | NativeState::Stopped if self.is_playing => {
                    info!("Native player stopped on its own ({:?})", state);
                    self.is_playing = false;
                    self.persist().await;
                }
                NativeState::Playing => self.is_playing = true,
                NativeState::Paused | NativeState::Stopped | NativeState::Buffering => {}
            },
            NativeEvent::Progress { position } => self.resume_position = position,
            NativeEvent::Error { track_id, message } => {
                warn!("Native playback error on {:?}: {}", track_id, message);
                self.emit(PlaybackEvent::Error { message });
                if track_id.is_some() && track_id.as_ref() == self.queue.active_track_id() {
                    self.reset_playback(ResetReason::PlaybackFailed).await;
                }
            }
            NativeEvent::RemotePlay => self.play().await,
            NativeEvent::RemotePause => self.pause().await,
            NativeEvent::RemoteNext => self.skip_next().await,
            NativeEvent::RemotePrevious => self.skip_prev().await,
            NativeEvent::RemoteSeek { position } => self.seek_to(position).await,
        }
    }

    async fn on_native_transition(&mut self, track_id: TrackId, role: Option<TrackRole>) {
        match self.sync.on_transition(&track_id, role) {
            Transition::Expected(Some(TrackRole::EndOfList)) => {
                self.end_of_queue(false).await;
            }
            Transition::Expected(_) => {
                let outcome = self.queue.advance();
                self.resume_position = Duration::ZERO;
                self.persist().await;
                if outcome.track_id() == Some(&track_id) {
                    self.sync_step(SyncStep::RefreshNext).await;
                } else {
                    warn!(
                        "Player moved to {} but queue advanced to {:?}",
                        track_id,
                        outcome.track_id()
                    );
                    self.sync_step(SyncStep::ReloadCurrent {
                        force_restart: false,
                    })
                    .await;
                }
            }
            Transition::Unexpected => {
                debug!("Stale transition to {}, recomputing", track_id);
                self.on_track_finished().await;
            }
        }
    }

    /// The active track ended without a usable next slot
    async fn on_track_finished(&mut self) {
        match self.queue.advance() {
            Advance::Idle if self.queue.active_track_id().is_some() => {
                self.reset_playback(ResetReason::QueueExhausted).await;
            }
            Advance::Idle => {}
            Advance::EndOfQueue => self.end_of_queue(false).await,
            Advance::FromQueue(_) | Advance::Repeated(_) | Advance::Moved(_) => {
                self.resume_position = Duration::ZERO;
                self.persist().await;
                self.sync_step(SyncStep::ReloadCurrent {
                    force_restart: false,
                })
                .await;
                self.resume_if_playing().await;
            }
        }
    }

    /// Rewind to the head of the list and pause
    async fn end_of_queue(&mut self, force_restart: bool) {
        info!("Reached end of queue");
        self.queue.rewind();
        self.is_playing = false;
        self.resume_position = Duration::ZERO;
        self.persist().await;
        self.sync_step(SyncStep::ReloadCurrent { force_restart })
            .await;
        if let Err(e) = self.sync.pause().await {
            warn!("Native pause failed: {}", e);
        }
        self.emit(PlaybackEvent::QueueEnded);
    }

    // ===== Debounced refresh =====

    fn schedule_refresh(&mut self) {
        self.refresh_deadline = Some(Instant::now() + self.config.removal_debounce());
    }

    /// Run the refresh coalesced from jump-queue removals
    pub async fn flush_refresh(&mut self) {
        debug!("Flushing debounced refresh");
        self.refresh_next_now().await;
    }

    pub(crate) async fn refresh_next_now(&mut self) {
        self.sync_step(SyncStep::RefreshNext).await;
    }

    // ===== Shared steps =====

    /// Run one synchronizer step, absorbing its failures
    ///
    /// A vanished active track resets playback; any other vanished track is
    /// purged from the queue and the step retried. Other failures are logged:
    /// the queue already reflects the user's intent and the next step
    /// recomputes the window from scratch.
    async fn sync_step(&mut self, step: SyncStep) {
        self.refresh_deadline = None;

        for _ in 0..MAX_VANISHED_RETRIES {
            let result = match step {
                SyncStep::Preload => self.sync.preload(&self.queue).await,
                SyncStep::RefreshNext => self.sync.refresh_next(&self.queue).await,
                SyncStep::ReloadCurrent { force_restart } => {
                    self.sync.reload_current(&self.queue, force_restart).await
                }
            };

            match result {
                Ok(()) => return,
                Err(PlaybackError::TrackVanished(id)) => {
                    if self.queue.active_track_id() == Some(&id) {
                        self.reset_playback(ResetReason::TrackVanished).await;
                        return;
                    }
                    warn!("Track {} vanished, dropping it from the queue", id);
                    if self.queue.purge(&HashSet::from([id])) == Purge::Unchanged {
                        return;
                    }
                    self.persist().await;
                }
                Err(e) => {
                    warn!("Native sync ({:?}) failed: {}", step, e);
                    self.emit(PlaybackEvent::Error {
                        message: e.to_string(),
                    });
                    return;
                }
            }
        }
    }

    /// Clear the queue and stop the player
    pub(crate) async fn reset_playback(&mut self, reason: ResetReason) {
        info!("Resetting playback ({:?})", reason);
        self.queue.reset();
        self.is_playing = false;
        self.current_track = None;
        self.resume_position = Duration::ZERO;
        self.refresh_deadline = None;
        if let Err(e) = self.sync.clear().await {
            warn!("Native reset failed: {}", e);
        }
        self.persist().await;
        self.emit(PlaybackEvent::Reset { reason });
    }

    async fn resume_if_playing(&mut self) {
        if !self.is_playing || self.sync.is_empty() {
            return;
        }
        if let Err(e) = self.sync.play().await {
            warn!("Native play failed: {}", e);
        }
    }

    /// A manual skip leaves `RepeatOne` unless configured otherwise
    fn downgrade_repeat_one(&mut self) {
        if !self.config.repeat_one_on_skip && self.queue.repeat_mode() == RepeatMode::RepeatOne {
            debug!("Manual skip, switching RepeatOne to RepeatAll");
            self.queue.set_repeat_mode(RepeatMode::RepeatAll);
        }
    }

    pub(crate) async fn resolve_source_name(&self, source: &PlaybackSource) -> String {
        match self.store.source_name(source).await {
            Ok(name) => name,
            Err(e) => {
                warn!("Could not resolve name of {}: {}", source, e);
                default_source_name(source)
            }
        }
    }

    pub(crate) async fn persist(&self) {
        if let Err(e) = self
            .persistence
            .save_queue(&self.queue, self.resume_position)
            .await
        {
            warn!("Failed to persist queue: {}", e);
        }
    }

    pub(crate) async fn persist_recent(&self) {
        if let Err(e) = self.persistence.save_recent(&self.recent).await {
            warn!("Failed to persist recent list: {}", e);
        }
    }

    pub(crate) fn emit(&self, event: PlaybackEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Re-read the active track's metadata on the next `settle()`
    pub(crate) fn invalidate_current_track(&mut self) {
        self.current_track = None;
    }

    // ===== Publication =====

    /// Bring cached metadata in line with the queue and publish the result
    pub async fn settle(&mut self) {
        self.refresh_current_track().await;

        let snapshot = self.snapshot();
        if snapshot.current_track_id() != self.published.current_track_id() {
            self.emit(PlaybackEvent::TrackChanged {
                track_id: snapshot.current_track_id().cloned(),
                previous_track_id: self.published.current_track_id().cloned(),
            });
        }
        if snapshot.is_playing != self.published.is_playing {
            self.emit(PlaybackEvent::StateChanged {
                is_playing: snapshot.is_playing,
            });
        }
        if snapshot.queue_list != self.published.queue_list {
            self.emit(PlaybackEvent::QueueChanged {
                length: snapshot.queue_list.len(),
            });
        }

        self.published = snapshot.clone();
        self.snapshot_tx.send_replace(snapshot);
    }

    async fn refresh_current_track(&mut self) {
        let active = self.queue.active_track_id().cloned();
        if self.current_track.as_ref().map(|track| &track.id) == active.as_ref() {
            return;
        }

        let Some(active) = active else {
            self.current_track = None;
            return;
        };
        match self.store.track(&active).await {
            Ok(Some(track)) => self.current_track = Some(track),
            Ok(None) => {
                warn!("Active track {} vanished", active);
                self.reset_playback(ResetReason::TrackVanished).await;
            }
            Err(e) => {
                warn!("Could not load metadata of {}: {}", active, e);
                self.current_track = None;
            }
        }
    }

    fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            current_track: self.current_track.clone(),
            is_playing: self.is_playing,
            source: self.queue.source().cloned(),
            source_name: self.queue.source_name().to_string(),
            queue_list: self.queue.upcoming(self.config.queue_list_limit),
            repeat_mode: self.queue.repeat_mode(),
            shuffle_enabled: self.queue.is_shuffled(),
            position: self.queue.position(),
            in_jump_queue: self.queue.in_jump_queue(),
            recent_sources: self.recent.to_vec(),
        }
    }
}
