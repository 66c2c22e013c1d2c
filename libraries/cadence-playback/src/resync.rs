//! Library resynchronization
//!
//! Reacts to changes in the music library while something is playing: the
//! queue is patched in place, and the player only reloads when the track it
//! plays is gone.

use cadence_core::{LibraryEvent, PlaybackSource, TrackId};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::controller::PlaybackController;
use crate::events::ResetReason;
use crate::queue::{Purge, ReplaceOptions};

impl PlaybackController {
    pub async fn handle_library_event(&mut self, event: LibraryEvent) {
        debug!("Library event: {:?}", event);
        match event {
            LibraryEvent::SourcesDeleted { sources } => self.on_sources_deleted(&sources).await,
            LibraryEvent::SourceRenamed { old, new } => self.on_source_renamed(&old, new).await,
            LibraryEvent::TracksChanged { source } => self.on_tracks_changed(&source).await,
            LibraryEvent::TrackVanished { track_id } => {
                self.on_tracks_removed(HashSet::from([track_id])).await;
            }
            LibraryEvent::TracksDeleted { track_ids } => {
                self.on_tracks_removed(track_ids.into_iter().collect()).await;
            }
            LibraryEvent::TracksModified { track_ids } => self.on_tracks_modified(&track_ids),
            LibraryEvent::LibraryRescanned { track_ids } => {
                self.on_library_rescanned(track_ids).await;
            }
        }
    }

    async fn on_sources_deleted(&mut self, sources: &[PlaybackSource]) {
        if self.recent.remove_all(sources) {
            self.persist_recent().await;
        }

        let playing_deleted = self
            .queue
            .source()
            .is_some_and(|current| sources.contains(current));
        if playing_deleted {
            info!("Playing source was deleted");
            self.reset_playback(ResetReason::SourceDeleted).await;
        }
    }

    async fn on_source_renamed(&mut self, old: &PlaybackSource, new: PlaybackSource) {
        if self.recent.replace(old, new.clone()) {
            self.persist_recent().await;
        }

        if self.queue.rename_source(old, new.clone()) {
            let name = self.resolve_source_name(&new).await;
            info!("Playing source renamed to {} ({})", new, name);
            self.queue.set_source_name(name);
            self.persist().await;
        }
    }

    /// Re-read the track list of `source` if it is the one playing
    ///
    /// The active track keeps playing even if it left the list; playback
    /// continues from the nearest surviving neighbor afterwards.
    pub(crate) async fn on_tracks_changed(&mut self, source: &PlaybackSource) {
        if !self.queue.is_playing_from(source) {
            return;
        }
        if let Some(ids) = self.fetch_track_ids(source).await {
            self.apply_track_list(source, ids).await;
        }
    }

    async fn fetch_track_ids(&self, source: &PlaybackSource) -> Option<Vec<TrackId>> {
        match self.store.track_ids_for_source(source).await {
            Ok(ids) => Some(ids),
            Err(e) => {
                warn!("Could not reload tracks of {}: {}", source, e);
                None
            }
        }
    }

    /// Swap in a freshly fetched list for the playing source
    async fn apply_track_list(&mut self, source: &PlaybackSource, ids: Vec<TrackId>) {
        if ids.is_empty() {
            info!("{} is now empty", source);
            self.reset_playback(ResetReason::SourceEmptied).await;
            return;
        }

        self.queue.replace_list(
            ids,
            ReplaceOptions {
                context_aware: true,
                start_track_id: None,
            },
        );
        self.persist().await;
        self.refresh_next_now().await;
    }

    async fn on_tracks_removed(&mut self, ids: HashSet<TrackId>) {
        match self.queue.purge(&ids) {
            Purge::ActiveRemoved => {
                info!("Playing track was removed from the library");
                self.reset_playback(ResetReason::TrackVanished).await;
            }
            Purge::Changed => {
                self.persist().await;
                self.refresh_next_now().await;
            }
            Purge::Unchanged => {}
        }
    }

    fn on_tracks_modified(&mut self, ids: &[TrackId]) {
        let active_modified = self
            .queue
            .active_track_id()
            .is_some_and(|active| ids.contains(active));
        if active_modified {
            self.invalidate_current_track();
        }
    }

    /// A full rescan may have changed any source; reload ours if it overlaps
    ///
    /// The overlap is checked against the source's current list in the
    /// store, so newly discovered tracks count.
    async fn on_library_rescanned(&mut self, ids: Vec<TrackId>) {
        let Some(source) = self.queue.source().cloned() else {
            return;
        };
        let Some(fresh) = self.fetch_track_ids(&source).await else {
            return;
        };

        let rescanned: HashSet<TrackId> = ids.into_iter().collect();
        let affected = fresh
            .iter()
            .chain(self.queue.ordered_ids())
            .chain(self.queue.jump_queue())
            .any(|id| rescanned.contains(id));
        if affected {
            debug!("Rescan touched {}, reloading its tracks", source);
            self.apply_track_list(&source, fresh).await;
        }
    }
}
