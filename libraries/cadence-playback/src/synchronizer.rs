//! Native buffer synchronization
//!
//! The native player only ever holds two tracks:
//!
//! ```text
//! ┌──────────────┐  ┌──────────────┐
//! │ current slot │→ │  next slot   │   (everything else lives in the queue)
//! └──────────────┘  └──────────────┘
//! ```
//!
//! [`BufferSynchronizer`] is the only writer to the player. Every call
//! re-derives the desired window from the queue it is handed and issues the
//! difference against its mirror of what the player holds, so a stale
//! operation followed by a fresher one converges on the fresher state.

use cadence_core::{NativePlayer, Track, TrackId, TrackRole, TrackStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::error::{PlaybackError, Result};
use crate::queue::{NextTrack, PlaybackQueue};

/// Mirror of what the native player has loaded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BufferWindow {
    pub current_track_id: Option<TrackId>,
    pub current_role: Option<TrackRole>,
    pub next_track_id: Option<TrackId>,
    pub next_track_role: Option<TrackRole>,
}

impl BufferWindow {
    /// Contents of the next slot
    pub fn next(&self) -> Option<NextTrack> {
        self.next_track_id.clone().map(|track_id| NextTrack {
            track_id,
            role: self.next_track_role,
        })
    }

    fn set_next(&mut self, next: Option<NextTrack>) {
        match next {
            Some(next) => {
                self.next_track_id = Some(next.track_id);
                self.next_track_role = next.role;
            }
            None => {
                self.next_track_id = None;
                self.next_track_role = None;
            }
        }
    }
}

/// How a native slot transition relates to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The player moved into the track we appended, with this role
    Expected(Option<TrackRole>),
    /// The player moved into something we no longer expected
    Unexpected,
}

pub struct BufferSynchronizer {
    player: Arc<dyn NativePlayer>,
    store: Arc<dyn TrackStore>,
    window: BufferWindow,
    /// Adopted a player we did not fill; its next slot is unknown
    next_unknown: bool,
}

impl BufferSynchronizer {
    pub fn new(player: Arc<dyn NativePlayer>, store: Arc<dyn TrackStore>) -> Self {
        Self {
            player,
            store,
            window: BufferWindow::default(),
            next_unknown: false,
        }
    }

    pub fn window(&self) -> &BufferWindow {
        &self.window
    }

    pub fn is_empty(&self) -> bool {
        self.window.current_track_id.is_none()
    }

    async fn fetch(&self, id: &TrackId) -> Result<Track> {
        self.store
            .track(id)
            .await?
            .ok_or_else(|| PlaybackError::TrackVanished(id.clone()))
    }

    /// Fill an empty player with the active track, then the look-ahead
    ///
    /// A player that is already loaded (e.g. it outlived a previous engine)
    /// is adopted as-is instead of being restarted.
    pub async fn preload(&mut self, queue: &PlaybackQueue) -> Result<()> {
        let Some(active) = queue.active_track_id() else {
            return Ok(());
        };

        if self.player.is_loaded().await? {
            if self.is_empty() {
                self.window.current_track_id = self.player.active_track_id().await?;
                self.window.current_role = None;
                self.window.set_next(None);
                self.next_unknown = true;
                debug!(
                    "Adopted loaded player (current: {:?})",
                    self.window.current_track_id
                );
            }
            return self.refresh_next(queue).await;
        }

        let track = self.fetch(active).await?;
        let role = queue.current_role();
        self.player.load_current(&track, role).await?;
        self.window = BufferWindow {
            current_track_id: Some(active.clone()),
            current_role: Some(role),
            ..BufferWindow::default()
        };
        self.next_unknown = false;
        info!("Preloaded {} ({:?})", active, role);

        self.refresh_next(queue).await
    }

    /// Make the next slot hold what a natural advance would play
    ///
    /// No-op while the player is empty, and when the slot already matches.
    pub async fn refresh_next(&mut self, queue: &PlaybackQueue) -> Result<()> {
        if self.is_empty() {
            trace!("Player empty, nothing to append to");
            return Ok(());
        }

        let desired = queue.peek_next();
        if !self.next_unknown && desired == self.window.next() {
            trace!("Next slot already up to date");
            return Ok(());
        }

        if self.next_unknown || self.window.next_track_id.is_some() {
            self.player.remove_next().await?;
            self.window.set_next(None);
            self.next_unknown = false;
        }

        let Some(next) = desired else {
            return Ok(());
        };
        let track = self.fetch(&next.track_id).await?;
        self.player.append_next(&track, next.role).await?;
        debug!("Next slot: {} ({:?})", next.track_id, next.role);
        self.window.set_next(Some(next));
        Ok(())
    }

    /// Put the active track in the current slot, then refresh the look-ahead
    ///
    /// Loads into an empty player like [`preload`](Self::preload). If the
    /// player already holds the active track and `force_restart` is false,
    /// the current slot is left alone.
    pub async fn reload_current(&mut self, queue: &PlaybackQueue, force_restart: bool) -> Result<()> {
        let Some(active) = queue.active_track_id() else {
            return self.clear().await;
        };

        if !self.player.is_loaded().await? {
            self.window = BufferWindow::default();
            self.next_unknown = false;
            return self.preload(queue).await;
        }

        let playing = self.player.active_track_id().await?;
        if !force_restart && playing.as_ref() == Some(active) {
            debug!("{} already current, not restarting", active);
            self.window.current_track_id = playing;
            self.window.current_role = Some(queue.current_role());
            return self.refresh_next(queue).await;
        }

        let track = self.fetch(active).await?;
        let role = queue.current_role();
        self.player.load_current(&track, role).await?;
        self.player.seek(Duration::ZERO).await?;
        self.window.current_track_id = Some(active.clone());
        self.window.current_role = Some(role);
        debug!("Loaded {} as current ({:?})", active, role);

        self.refresh_next(queue).await
    }

    /// Stop and unload everything
    pub async fn clear(&mut self) -> Result<()> {
        self.window = BufferWindow::default();
        self.next_unknown = false;
        self.player.reset().await?;
        Ok(())
    }

    /// Record that the player moved into its next slot
    ///
    /// After an unexpected transition the player's next slot can hold
    /// anything, so the following refresh clears it first.
    pub fn on_transition(&mut self, track_id: &TrackId, role: Option<TrackRole>) -> Transition {
        let expected = !self.next_unknown
            && self.window.next_track_id.as_ref() == Some(track_id)
            && self.window.next_track_role == role;

        self.window = BufferWindow {
            current_track_id: Some(track_id.clone()),
            current_role: role,
            ..BufferWindow::default()
        };
        self.next_unknown = !expected;

        if expected {
            Transition::Expected(role)
        } else {
            Transition::Unexpected
        }
    }

    /// Record that the player ran out of tracks
    pub fn on_queue_ended(&mut self) {
        self.window = BufferWindow::default();
        self.next_unknown = false;
    }

    pub async fn play(&self) -> Result<()> {
        Ok(self.player.play().await?)
    }

    pub async fn pause(&self) -> Result<()> {
        Ok(self.player.pause().await?)
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        Ok(self.player.seek(position).await?)
    }

    /// Position inside the current track
    pub async fn position(&self) -> Result<Duration> {
        Ok(self.player.position().await?)
    }

    pub async fn is_loaded(&self) -> Result<bool> {
        Ok(self.player.is_loaded().await?)
    }
}
