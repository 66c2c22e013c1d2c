//! Library change handling
//!
//! Library edits arrive while something is playing. The queue must follow
//! them without interrupting the track that is sounding, unless that track
//! itself is gone.

use cadence_core::{LibraryEvent, PlaybackSource, Track, TrackId};
use cadence_playback::memory::{MemoryKeyValueStore, MemoryTrackStore, PlayerCall, RecordingPlayer};
use cadence_playback::{EngineConfig, EngineDeps, PlaybackEngine, PlaybackEvent, ResetReason};
use std::sync::Arc;

// ===== Test Helpers =====

struct Harness {
    store: Arc<MemoryTrackStore>,
    player: Arc<RecordingPlayer>,
    engine: PlaybackEngine,
}

fn id(name: &str) -> TrackId {
    TrackId::new(name)
}

fn ids(names: &[&str]) -> Vec<TrackId> {
    names.iter().map(|name| id(name)).collect()
}

fn track(name: &str) -> Track {
    Track::new(name, format!("Track {}", name), format!("file:///music/{}.flac", name))
}

fn road_trip() -> PlaybackSource {
    PlaybackSource::playlist("road-trip")
}

fn start(names: &[&str]) -> Harness {
    let store = Arc::new(MemoryTrackStore::new());
    store.insert_tracks(names.iter().map(|name| track(name)));
    store.set_source(road_trip(), ids(names));

    let player = Arc::new(RecordingPlayer::new());
    let engine = PlaybackEngine::spawn(
        EngineDeps {
            store: store.clone(),
            player: player.clone(),
            kv: Arc::new(MemoryKeyValueStore::new()),
        },
        EngineConfig::default(),
    );
    Harness {
        store,
        player,
        engine,
    }
}

impl Harness {
    async fn play(&self, start: &str) {
        self.engine
            .play_from(road_trip(), Some(id(start)))
            .await
            .unwrap();
        self.player.take_calls();
    }

    async fn library_event(&self, event: LibraryEvent) {
        self.engine.library_event(event).await.unwrap();
    }

    async fn tracks_changed(&self) {
        self.library_event(LibraryEvent::TracksChanged {
            source: road_trip(),
        })
        .await;
    }

    fn current_id(&self) -> Option<TrackId> {
        self.engine.snapshot().current_track_id().cloned()
    }

    fn buffer_mutations(&self) -> Vec<PlayerCall> {
        self.player
            .take_calls()
            .into_iter()
            .filter(PlayerCall::is_buffer_mutation)
            .collect()
    }
}

fn resets(events: &mut tokio::sync::broadcast::Receiver<PlaybackEvent>) -> Vec<ResetReason> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PlaybackEvent::Reset { reason } = event {
            out.push(reason);
        }
    }
    out
}

// ===== Reordered Or Edited Lists =====

#[tokio::test]
async fn test_removing_an_earlier_track_keeps_the_active_one() {
    let h = start(&["A", "B", "C"]);
    h.play("B").await;

    h.store.set_source(road_trip(), ids(&["B", "C"]));
    h.tracks_changed().await;

    let queue = h.engine.queue_state().await.unwrap();
    assert_eq!(queue.ordered_ids(), ids(&["B", "C"]).as_slice());
    assert_eq!(queue.position(), Some(0));
    assert_eq!(queue.active_track_id(), Some(&id("B")));
    assert!(h.buffer_mutations().is_empty());
}

#[tokio::test]
async fn test_active_track_leaving_the_list_keeps_playing() {
    let h = start(&["A", "B", "C"]);
    h.play("B").await;

    h.store.set_source(road_trip(), ids(&["A", "C"]));
    h.tracks_changed().await;

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.current_track_id(), Some(&id("B")));
    assert_eq!(snapshot.position, Some(0));
    assert!(snapshot.in_jump_queue);
    assert_eq!(h.player.current(), Some(id("B")));
    assert_eq!(h.player.next(), Some((id("C"), None)));
    assert!(h.buffer_mutations().is_empty());

    // Playback continues after the surviving neighbor
    let event = h.player.finish_current();
    h.engine.native_event(event).await.unwrap();
    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.current_track_id(), Some(&id("C")));
    assert_eq!(snapshot.position, Some(1));
    assert!(!snapshot.in_jump_queue);
}

#[tokio::test]
async fn test_reorder_restages_the_next_slot() {
    let h = start(&["A", "B", "C", "D"]);
    h.play("A").await;

    h.store.set_source(road_trip(), ids(&["A", "D", "B", "C"]));
    h.tracks_changed().await;

    assert_eq!(h.current_id(), Some(id("A")));
    assert_eq!(h.player.next(), Some((id("D"), None)));
    assert_eq!(
        h.buffer_mutations(),
        vec![PlayerCall::RemoveNext, PlayerCall::AppendNext(id("D"), None)]
    );
}

#[tokio::test]
async fn test_emptied_source_resets() {
    let h = start(&["A", "B"]);
    h.play("A").await;
    let mut events = h.engine.events();

    h.store.set_source(road_trip(), Vec::new());
    h.tracks_changed().await;

    assert_eq!(h.engine.snapshot().source, None);
    assert_eq!(h.player.current(), None);
    assert_eq!(resets(&mut events), vec![ResetReason::SourceEmptied]);
}

#[tokio::test]
async fn test_change_to_another_source_is_ignored() {
    let h = start(&["A", "B"]);
    h.play("A").await;

    h.store
        .set_source(PlaybackSource::album("elsewhere"), ids(&["B"]));
    h.library_event(LibraryEvent::TracksChanged {
        source: PlaybackSource::album("elsewhere"),
    })
    .await;

    assert_eq!(h.engine.snapshot().queue_list, ids(&["B"]));
    assert!(h.player.take_calls().is_empty());
}

#[tokio::test]
async fn test_unavailable_store_leaves_queue_alone() {
    let h = start(&["A", "B", "C"]);
    h.play("A").await;

    h.store.set_unavailable(true);
    h.tracks_changed().await;
    h.store.set_unavailable(false);

    let queue = h.engine.queue_state().await.unwrap();
    assert_eq!(queue.ordered_ids(), ids(&["A", "B", "C"]).as_slice());
    assert_eq!(h.current_id(), Some(id("A")));
}

// ===== Deleted Tracks =====

#[tokio::test]
async fn test_deleting_the_active_track_resets_playback() {
    let h = start(&["A", "B", "C"]);
    h.play("B").await;
    let mut events = h.engine.events();

    h.store.remove_track(&id("B"));
    h.library_event(LibraryEvent::TrackVanished { track_id: id("B") })
        .await;

    let queue = h.engine.queue_state().await.unwrap();
    assert_eq!(queue.source(), None);
    assert_eq!(queue.active_track_id(), None);
    assert_eq!(queue.position(), None);
    assert_eq!(h.buffer_mutations(), vec![PlayerCall::Reset]);
    assert_eq!(resets(&mut events), vec![ResetReason::TrackVanished]);
    assert_eq!(h.engine.snapshot().current_track, None);
}

#[tokio::test]
async fn test_deleting_the_next_track_restages() {
    let h = start(&["A", "B", "C", "D"]);
    h.play("B").await;

    h.store.remove_track(&id("C"));
    h.library_event(LibraryEvent::TracksDeleted {
        track_ids: ids(&["C"]),
    })
    .await;

    let queue = h.engine.queue_state().await.unwrap();
    assert_eq!(queue.ordered_ids(), ids(&["A", "B", "D"]).as_slice());
    assert_eq!(queue.position(), Some(1));
    assert_eq!(h.player.current(), Some(id("B")));
    assert_eq!(h.player.next(), Some((id("D"), None)));
}

#[tokio::test]
async fn test_deleted_tracks_leave_the_jump_queue() {
    let h = start(&["A", "B", "X", "Y"]);
    h.store.set_source(road_trip(), ids(&["A", "B"]));
    h.play("A").await;
    h.engine.enqueue_next(ids(&["X", "Y"])).await.unwrap();

    h.library_event(LibraryEvent::TracksDeleted {
        track_ids: ids(&["X"]),
    })
    .await;

    assert_eq!(h.engine.snapshot().queue_list, ids(&["Y", "B"]));
    assert_eq!(
        h.player.next(),
        Some((id("Y"), Some(cadence_core::TrackRole::FromQueue)))
    );
}

#[tokio::test]
async fn test_silently_vanished_track_is_dropped_during_sync() {
    let h = start(&["A", "B", "C", "D"]);
    h.play("A").await;

    // No library event: the engine finds out while staging C
    h.store.remove_track(&id("C"));
    h.engine.skip_next().await.unwrap();

    let queue = h.engine.queue_state().await.unwrap();
    assert_eq!(queue.ordered_ids(), ids(&["A", "B", "D"]).as_slice());
    assert_eq!(h.current_id(), Some(id("B")));
    assert_eq!(h.player.current(), Some(id("B")));
    assert_eq!(h.player.next(), Some((id("D"), None)));
}

// ===== Sources =====

#[tokio::test]
async fn test_deleting_the_playing_source_resets() {
    let h = start(&["A", "B"]);
    h.play("A").await;
    let mut events = h.engine.events();

    h.store.remove_source(&road_trip());
    h.library_event(LibraryEvent::SourcesDeleted {
        sources: vec![road_trip()],
    })
    .await;

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.source, None);
    assert!(snapshot.recent_sources.is_empty());
    assert_eq!(h.player.current(), None);
    assert_eq!(resets(&mut events), vec![ResetReason::SourceDeleted]);
}

#[tokio::test]
async fn test_deleting_another_source_only_updates_recent() {
    let h = start(&["A", "B"]);
    let album = PlaybackSource::album("7");
    h.store.set_source(album.clone(), ids(&["B"]));
    h.engine.play_from(album.clone(), None).await.unwrap();
    h.play("A").await;
    assert_eq!(
        h.engine.snapshot().recent_sources,
        vec![road_trip(), album.clone()]
    );

    h.library_event(LibraryEvent::SourcesDeleted {
        sources: vec![album],
    })
    .await;

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.recent_sources, vec![road_trip()]);
    assert_eq!(snapshot.current_track_id(), Some(&id("A")));
    assert!(h.player.take_calls().is_empty());
}

#[tokio::test]
async fn test_renaming_the_playing_source() {
    let h = start(&["A", "B"]);
    h.play("A").await;
    let renamed = PlaybackSource::playlist("summer-road-trip");

    h.store.rename_source(&road_trip(), renamed.clone());
    h.store.set_source_name(&renamed, "Summer Road Trip");
    h.library_event(LibraryEvent::SourceRenamed {
        old: road_trip(),
        new: renamed.clone(),
    })
    .await;

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.source, Some(renamed.clone()));
    assert_eq!(snapshot.source_name, "Summer Road Trip");
    assert_eq!(snapshot.recent_sources, vec![renamed.clone()]);
    assert!(h.player.take_calls().is_empty());

    // Later edits are matched against the new identity
    h.store.set_source(renamed.clone(), ids(&["A"]));
    h.library_event(LibraryEvent::TracksChanged { source: renamed })
        .await;
    assert!(h.engine.snapshot().queue_list.is_empty());
    assert_eq!(
        h.player.next(),
        Some((id("A"), Some(cadence_core::TrackRole::EndOfList)))
    );
}

// ===== Rescans And Metadata =====

#[tokio::test]
async fn test_rescan_touching_the_queue_reloads_it() {
    let h = start(&["A", "B", "C"]);
    h.play("A").await;

    h.store.set_source(road_trip(), ids(&["A", "C", "B"]));
    h.library_event(LibraryEvent::LibraryRescanned {
        track_ids: ids(&["Z"]),
    })
    .await;
    assert_eq!(h.engine.snapshot().queue_list, ids(&["B", "C"]));

    h.library_event(LibraryEvent::LibraryRescanned {
        track_ids: ids(&["C"]),
    })
    .await;
    assert_eq!(h.engine.snapshot().queue_list, ids(&["C", "B"]));
    assert_eq!(h.player.next(), Some((id("C"), None)));
}

#[tokio::test]
async fn test_rescan_finds_tracks_added_to_the_playing_source() {
    let h = start(&["A", "B", "C"]);
    h.play("C").await;
    assert_eq!(
        h.player.next(),
        Some((id("A"), Some(cadence_core::TrackRole::EndOfList)))
    );

    h.store.insert_track(track("D"));
    h.store.set_source(road_trip(), ids(&["A", "B", "C", "D"]));
    h.library_event(LibraryEvent::LibraryRescanned {
        track_ids: ids(&["D"]),
    })
    .await;

    let queue = h.engine.queue_state().await.unwrap();
    assert_eq!(queue.ordered_ids(), ids(&["A", "B", "C", "D"]).as_slice());
    assert_eq!(queue.active_track_id(), Some(&id("C")));
    assert_eq!(h.engine.snapshot().queue_list, ids(&["D"]));
    assert_eq!(h.player.current(), Some(id("C")));
    assert_eq!(h.player.next(), Some((id("D"), None)));
}

#[tokio::test]
async fn test_metadata_edit_refreshes_current_track() {
    let h = start(&["A", "B"]);
    h.play("A").await;

    h.store.insert_track(Track::new("A", "Renamed Song", "file:///music/A.flac"));
    h.library_event(LibraryEvent::TracksModified {
        track_ids: ids(&["A"]),
    })
    .await;

    let current = h.engine.snapshot().current_track.unwrap();
    assert_eq!(current.name, "Renamed Song");
    assert!(h.player.take_calls().is_empty());
}

// ===== Idle Engine =====

#[tokio::test]
async fn test_library_events_while_idle_are_noops() {
    let h = start(&["A", "B"]);
    let mut events = h.engine.events();

    for event in [
        LibraryEvent::TracksChanged {
            source: road_trip(),
        },
        LibraryEvent::TrackVanished { track_id: id("A") },
        LibraryEvent::TracksDeleted {
            track_ids: ids(&["A", "B"]),
        },
        LibraryEvent::TracksModified {
            track_ids: ids(&["A"]),
        },
        LibraryEvent::LibraryRescanned {
            track_ids: ids(&["A"]),
        },
        LibraryEvent::SourcesDeleted {
            sources: vec![road_trip()],
        },
    ] {
        h.library_event(event).await;
    }

    assert!(h.player.calls().is_empty());
    assert!(events.try_recv().is_err());
    assert_eq!(h.engine.snapshot().source, None);
}
