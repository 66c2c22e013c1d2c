//! Cadence Playback - Queue Synchronization Engine
//!
//! Keeps a logical play queue and a native player that only ever holds two
//! tracks (current + next) in agreement.
//!
//! This crate provides:
//! - Queue model (ordered/shuffled lists, jump queue, repeat modes)
//! - Native buffer synchronization (current + look-ahead slot)
//! - Library resynchronization (deletes, renames, reorders)
//! - Persistence and crash recovery through a key-value store
//! - A recent-sources list
//!
//! # Architecture
//!
//! ```text
//! PlaybackEngine (handle) ─▶ actor task
//!                              └─ PlaybackController
//!                                   ├─ PlaybackQueue        (pure model)
//!                                   ├─ BufferSynchronizer   (only writer to NativePlayer)
//!                                   ├─ PersistenceAdapter   (KeyValueStore)
//!                                   └─ RecentSources
//! ```
//!
//! Every input (user command, native event, library event) is serialized
//! through the actor, applied to the queue first, persisted, and then
//! mirrored into the player.
//!
//! # Example
//!
//! ```rust,no_run
//! use cadence_core::{PlaybackSource, Track, TrackId};
//! use cadence_playback::memory::{MemoryKeyValueStore, MemoryTrackStore, RecordingPlayer};
//! use cadence_playback::{EngineConfig, EngineDeps, PlaybackEngine};
//! use std::sync::Arc;
//!
//! # async fn demo() -> cadence_playback::Result<()> {
//! let store = Arc::new(MemoryTrackStore::new());
//! store.insert_track(Track::new("t1", "Intro", "file:///music/intro.flac"));
//! store.set_source(PlaybackSource::album("1"), vec![TrackId::new("t1")]);
//!
//! let engine = PlaybackEngine::spawn(
//!     EngineDeps {
//!         store,
//!         player: Arc::new(RecordingPlayer::new()),
//!         kv: Arc::new(MemoryKeyValueStore::new()),
//!     },
//!     EngineConfig::default(),
//! );
//!
//! engine.play_from(PlaybackSource::album("1"), None).await?;
//! assert!(engine.snapshot().is_playing);
//! engine.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod config;
mod controller;
mod engine;
mod error;
mod events;
mod file_store;
pub mod memory;
mod persistence;
mod queue;
mod recent;
mod resync;
mod shuffle;
mod snapshot;
mod synchronizer;

// Public exports
pub use config::EngineConfig;
pub use controller::{EngineDeps, PlaybackController};
pub use engine::PlaybackEngine;
pub use error::{PlaybackError, Result};
pub use events::{PlaybackEvent, ResetReason};
pub use file_store::FileKeyValueStore;
pub use persistence::{PersistenceAdapter, RestoredState};
pub use queue::{Advance, NextTrack, PlayFromOutcome, PlaybackQueue, Purge, ReplaceOptions};
pub use recent::RecentSources;
pub use shuffle::{is_permutation, shuffled, shuffled_with};
pub use snapshot::PlaybackSnapshot;
pub use synchronizer::{BufferSynchronizer, BufferWindow, Transition};
