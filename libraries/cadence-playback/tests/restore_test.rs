//! Crash and restart recovery
//!
//! Each test runs one engine, stops it, and starts a fresh one against the
//! same storage to check what comes back.

use cadence_core::{KeyValueStore, PlaybackSource, RepeatMode, Track, TrackId, TrackRole};
use cadence_playback::memory::{MemoryKeyValueStore, MemoryTrackStore, PlayerCall, RecordingPlayer};
use cadence_playback::{EngineConfig, EngineDeps, FileKeyValueStore, PlaybackEngine};
use std::sync::Arc;
use std::time::Duration;

const STATE_KEY: &str = "cadence::playback-store";
const RECENT_KEY: &str = "cadence::recent-list-store";

// ===== Test Helpers =====

fn id(name: &str) -> TrackId {
    TrackId::new(name)
}

fn ids(names: &[&str]) -> Vec<TrackId> {
    names.iter().map(|name| id(name)).collect()
}

fn road_trip() -> PlaybackSource {
    PlaybackSource::playlist("road-trip")
}

fn library(names: &[&str]) -> Arc<MemoryTrackStore> {
    let store = Arc::new(MemoryTrackStore::new());
    store.insert_tracks(names.iter().map(|name| {
        Track::new(*name, format!("Track {}", name), format!("file:///music/{}.flac", name))
    }));
    store.set_source(road_trip(), ids(names));
    store
}

fn spawn(
    store: &Arc<MemoryTrackStore>,
    player: &Arc<RecordingPlayer>,
    kv: Arc<dyn KeyValueStore>,
    config: EngineConfig,
) -> PlaybackEngine {
    PlaybackEngine::spawn(
        EngineDeps {
            store: store.clone(),
            player: player.clone(),
            kv,
        },
        config,
    )
}

// ===== Round Trips =====

#[tokio::test]
async fn test_queue_and_position_survive_restart() {
    let store = library(&["A", "B", "C", "X"]);
    store.set_source(road_trip(), ids(&["A", "B", "C"]));
    let kv = Arc::new(MemoryKeyValueStore::new());

    let first = spawn(
        &store,
        &Arc::new(RecordingPlayer::new()),
        kv.clone(),
        EngineConfig::default(),
    );
    first
        .play_from(road_trip(), Some(id("B")))
        .await
        .unwrap();
    first.enqueue_next(ids(&["X"])).await.unwrap();
    first.set_repeat(RepeatMode::RepeatAll).await.unwrap();
    first.seek_to(42_000).await.unwrap();
    let before = first.queue_state().await.unwrap();
    first.shutdown().await.unwrap();

    // Fresh process: empty player
    let player = Arc::new(RecordingPlayer::new());
    let second = spawn(&store, &player, kv, EngineConfig::default());
    let after = second.queue_state().await.unwrap();

    assert_eq!(after, before);
    let snapshot = second.snapshot();
    assert_eq!(snapshot.current_track_id(), Some(&id("B")));
    assert_eq!(snapshot.repeat_mode, RepeatMode::RepeatAll);
    assert!(!snapshot.is_playing);
    assert_eq!(
        player.take_calls(),
        vec![
            PlayerCall::LoadCurrent(id("B"), TrackRole::Reload),
            PlayerCall::AppendNext(id("X"), Some(TrackRole::FromQueue)),
            PlayerCall::Seek(Duration::from_secs(42)),
        ]
    );
}

#[tokio::test]
async fn test_running_player_is_adopted_not_restarted() {
    let store = library(&["A", "B", "C"]);
    let kv = Arc::new(MemoryKeyValueStore::new());
    let player = Arc::new(RecordingPlayer::new());

    let first = spawn(&store, &player, kv.clone(), EngineConfig::default());
    first.play_from(road_trip(), None).await.unwrap();
    first.seek_to(5_000).await.unwrap();
    first.shutdown().await.unwrap();
    player.take_calls();

    // Player outlived the engine and is still loaded
    let second = spawn(&store, &player, kv, EngineConfig::default());
    second.queue_state().await.unwrap();

    assert_eq!(
        player.take_calls(),
        vec![PlayerCall::RemoveNext, PlayerCall::AppendNext(id("B"), None)]
    );
    assert_eq!(player.current(), Some(id("A")));
    assert_eq!(second.window().await.unwrap().next_track_id, Some(id("B")));
}

#[tokio::test]
async fn test_file_store_persists_across_engines() {
    let dir = tempfile::tempdir().unwrap();
    let store = library(&["A", "B", "C"]);

    let kv = Arc::new(FileKeyValueStore::open(dir.path()).await.unwrap());
    let first = spawn(
        &store,
        &Arc::new(RecordingPlayer::new()),
        kv,
        EngineConfig::default(),
    );
    first
        .play_from(road_trip(), Some(id("C")))
        .await
        .unwrap();
    first.toggle_shuffle().await.unwrap();
    first.shutdown().await.unwrap();

    let kv = Arc::new(FileKeyValueStore::open(dir.path()).await.unwrap());
    let second = spawn(
        &store,
        &Arc::new(RecordingPlayer::new()),
        kv,
        EngineConfig::default(),
    );
    let queue = second.queue_state().await.unwrap();

    assert_eq!(queue.source(), Some(&road_trip()));
    assert_eq!(queue.active_track_id(), Some(&id("C")));
    assert!(queue.is_shuffled());
    assert!(queue.is_consistent());
    assert_eq!(second.snapshot().recent_sources, vec![road_trip()]);
}

// ===== Damaged Or Stale State =====

#[tokio::test]
async fn test_track_deleted_while_stopped_resets_on_restore() {
    let store = library(&["A", "B", "C"]);
    let kv = Arc::new(MemoryKeyValueStore::new());

    let first = spawn(
        &store,
        &Arc::new(RecordingPlayer::new()),
        kv.clone(),
        EngineConfig::default(),
    );
    first
        .play_from(road_trip(), Some(id("B")))
        .await
        .unwrap();
    first.shutdown().await.unwrap();

    store.remove_track(&id("B"));
    let player = Arc::new(RecordingPlayer::new());
    let second = spawn(&store, &player, kv.clone(), EngineConfig::default());
    let queue = second.queue_state().await.unwrap();

    assert_eq!(queue.source(), None);
    assert_eq!(queue.active_track_id(), None);
    assert_eq!(player.take_calls(), vec![PlayerCall::Reset]);
    second.shutdown().await.unwrap();

    // The cleared state was persisted
    let third = spawn(&store, &player, kv, EngineConfig::default());
    assert_eq!(third.queue_state().await.unwrap().source(), None);
    assert!(player.take_calls().is_empty());
}

#[tokio::test]
async fn test_inconsistent_state_is_repaired() {
    let store = library(&["A", "B", "C"]);
    let kv = Arc::new(MemoryKeyValueStore::new());
    kv.insert_raw(
        STATE_KEY,
        br#"{
            "version": 1,
            "queue": {
                "source": {"kind": "playlist", "id": "road-trip"},
                "ordered_ids": ["A", "B", "C"],
                "shuffled_ids": ["A", "B"],
                "position": 7,
                "active_track_id": "B"
            },
            "resume_position_ms": 0
        }"#
        .to_vec(),
    );

    let player = Arc::new(RecordingPlayer::new());
    let engine = spawn(&store, &player, kv, EngineConfig::default());
    let queue = engine.queue_state().await.unwrap();

    assert!(queue.is_consistent());
    assert_eq!(queue.position(), Some(1));
    assert_eq!(queue.active_track_id(), Some(&id("B")));
    assert_eq!(player.current(), Some(id("B")));
    assert_eq!(player.next(), Some((id("C"), None)));
}

#[tokio::test]
async fn test_unreadable_state_starts_empty() {
    let store = library(&["A", "B"]);
    let kv = Arc::new(MemoryKeyValueStore::new());
    kv.insert_raw(STATE_KEY, b"{ definitely not json".to_vec());
    kv.insert_raw(RECENT_KEY, b"[[[".to_vec());

    let player = Arc::new(RecordingPlayer::new());
    let engine = spawn(&store, &player, kv, EngineConfig::default());

    assert_eq!(engine.queue_state().await.unwrap().source(), None);
    assert!(player.calls().is_empty());

    engine.play_from(road_trip(), None).await.unwrap();
    assert_eq!(player.current(), Some(id("A")));
}

// ===== Rehydration =====

#[tokio::test]
async fn test_commands_wait_for_rehydration() {
    let store = library(&["A", "B", "C"]);

    let seeded = Arc::new(MemoryKeyValueStore::new());
    let first = spawn(
        &store,
        &Arc::new(RecordingPlayer::new()),
        seeded.clone(),
        EngineConfig::default(),
    );
    first
        .play_from(road_trip(), Some(id("C")))
        .await
        .unwrap();
    first.shutdown().await.unwrap();

    let kv = Arc::new(MemoryKeyValueStore::hydrating());
    for key in [STATE_KEY, RECENT_KEY] {
        kv.insert_raw(key, seeded.raw(key).unwrap());
    }
    let player = Arc::new(RecordingPlayer::new());
    let engine = spawn(&store, &player, kv.clone(), EngineConfig::default());

    let early = tokio::time::timeout(Duration::from_millis(50), engine.queue_state()).await;
    assert!(early.is_err());
    assert!(player.calls().is_empty());

    kv.finish_hydration();
    let queue = engine.queue_state().await.unwrap();
    assert_eq!(queue.active_track_id(), Some(&id("C")));
    assert_eq!(player.current(), Some(id("C")));
}

#[tokio::test]
async fn test_recent_list_is_trimmed_to_configured_size() {
    let store = library(&["A"]);
    for n in 1..=3 {
        store.set_source(PlaybackSource::album(n.to_string()), ids(&["A"]));
    }
    let kv = Arc::new(MemoryKeyValueStore::new());

    let first = spawn(
        &store,
        &Arc::new(RecordingPlayer::new()),
        kv.clone(),
        EngineConfig::default(),
    );
    for n in 1..=3 {
        first
            .play_from(PlaybackSource::album(n.to_string()), None)
            .await
            .unwrap();
    }
    first.shutdown().await.unwrap();

    let config = EngineConfig {
        recent_list_size: 2,
        ..EngineConfig::default()
    };
    let second = spawn(&store, &Arc::new(RecordingPlayer::new()), kv, config);
    second.queue_state().await.unwrap();

    assert_eq!(
        second.snapshot().recent_sources,
        vec![PlaybackSource::album("3"), PlaybackSource::album("2")]
    );
}
