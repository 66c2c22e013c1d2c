//! In-memory collaborators
//!
//! Library, player and key-value store implementations that keep everything
//! in process. Used by the test suites and by headless front ends.

use async_trait::async_trait;
use cadence_core::{
    CadenceError, KeyValueStore, MutationOutcome, NativeEvent, NativePlayer, PlaybackSource,
    Result, Track, TrackId, TrackRole, TrackStore,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::watch;

// ===== Track store =====

/// Serializable library contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

/// One source and its ordered tracks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    pub source: PlaybackSource,
    #[serde(default)]
    pub name: Option<String>,
    pub track_ids: Vec<TrackId>,
}

/// How [`MemoryTrackStore`] answers favorite writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FavoriteWrites {
    /// Apply immediately
    #[default]
    Immediate,
    /// Queue the write until [`MemoryTrackStore::flush_pending_favorites`]
    Deferred,
    /// Refuse every write
    Rejected,
}

#[derive(Debug, Default)]
struct Library {
    tracks: HashMap<TrackId, Track>,
    sources: HashMap<PlaybackSource, Vec<TrackId>>,
    names: HashMap<PlaybackSource, String>,
    favorite_writes: FavoriteWrites,
    pending_favorites: Vec<(TrackId, bool)>,
    unavailable: bool,
}

impl Library {
    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(CadenceError::storage("library unavailable"));
        }
        Ok(())
    }

    fn write_favorite(&mut self, id: &TrackId, favorite: bool) {
        let favorites = self.sources.entry(PlaybackSource::favorites()).or_default();
        favorites.retain(|existing| existing != id);
        if favorite {
            favorites.push(id.clone());
        }
    }
}

/// Track library held in memory
#[derive(Debug, Default)]
pub struct MemoryTrackStore {
    library: RwLock<Library>,
}

impl MemoryTrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot (e.g. a JSON library file)
    pub fn from_snapshot(snapshot: LibrarySnapshot) -> Self {
        let store = Self::new();
        store.insert_tracks(snapshot.tracks);
        for entry in snapshot.sources {
            if let Some(name) = entry.name {
                store.set_source_name(&entry.source, name);
            }
            store.set_source(entry.source, entry.track_ids);
        }
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, Library> {
        self.library.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Library> {
        self.library.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_track(&self, track: Track) {
        self.write().tracks.insert(track.id.clone(), track);
    }

    pub fn insert_tracks(&self, tracks: impl IntoIterator<Item = Track>) {
        let mut library = self.write();
        for track in tracks {
            library.tracks.insert(track.id.clone(), track);
        }
    }

    /// Set (or replace) the ordered track list of a source
    pub fn set_source(&self, source: PlaybackSource, ids: Vec<TrackId>) {
        self.write().sources.insert(source, ids);
    }

    pub fn remove_source(&self, source: &PlaybackSource) {
        let mut library = self.write();
        library.sources.remove(source);
        library.names.remove(source);
    }

    pub fn rename_source(&self, old: &PlaybackSource, new: PlaybackSource) {
        let mut library = self.write();
        if let Some(ids) = library.sources.remove(old) {
            library.sources.insert(new.clone(), ids);
        }
        if let Some(name) = library.names.remove(old) {
            library.names.insert(new, name);
        }
    }

    pub fn set_source_name(&self, source: &PlaybackSource, name: impl Into<String>) {
        self.write().names.insert(source.clone(), name.into());
    }

    /// Delete a track and drop it from every source
    pub fn remove_track(&self, id: &TrackId) {
        let mut library = self.write();
        library.tracks.remove(id);
        for ids in library.sources.values_mut() {
            ids.retain(|existing| existing != id);
        }
    }

    pub fn set_favorite_writes(&self, mode: FavoriteWrites) {
        self.write().favorite_writes = mode;
    }

    /// Apply deferred favorite writes; returns how many were applied
    pub fn flush_pending_favorites(&self) -> usize {
        let mut library = self.write();
        let pending = std::mem::take(&mut library.pending_favorites);
        for (id, favorite) in &pending {
            library.write_favorite(id, *favorite);
        }
        pending.len()
    }

    /// Make every read fail, as a lost database connection would
    pub fn set_unavailable(&self, unavailable: bool) {
        self.write().unavailable = unavailable;
    }
}

#[async_trait]
impl TrackStore for MemoryTrackStore {
    async fn track_ids_for_source(&self, source: &PlaybackSource) -> Result<Vec<TrackId>> {
        let library = self.read();
        library.check_available()?;
        Ok(library.sources.get(source).cloned().unwrap_or_default())
    }

    async fn track(&self, id: &TrackId) -> Result<Option<Track>> {
        let library = self.read();
        library.check_available()?;
        Ok(library.tracks.get(id).cloned())
    }

    async fn source_name(&self, source: &PlaybackSource) -> Result<String> {
        let library = self.read();
        library.check_available()?;
        Ok(library
            .names
            .get(source)
            .cloned()
            .unwrap_or_else(|| cadence_core::default_source_name(source)))
    }

    async fn is_favorite(&self, id: &TrackId) -> Result<bool> {
        let library = self.read();
        library.check_available()?;
        Ok(library
            .sources
            .get(&PlaybackSource::favorites())
            .is_some_and(|ids| ids.contains(id)))
    }

    async fn set_favorite(&self, id: &TrackId, favorite: bool) -> MutationOutcome {
        let mut library = self.write();
        if library.unavailable {
            return MutationOutcome::Failed("library unavailable".to_string());
        }
        match library.favorite_writes {
            FavoriteWrites::Immediate => {
                library.write_favorite(id, favorite);
                MutationOutcome::Applied
            }
            FavoriteWrites::Deferred => {
                library.pending_favorites.push((id.clone(), favorite));
                MutationOutcome::Pending
            }
            FavoriteWrites::Rejected => MutationOutcome::Failed("favorites are read-only".to_string()),
        }
    }
}

// ===== Native player =====

/// Native call as observed by [`RecordingPlayer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCall {
    LoadCurrent(TrackId, TrackRole),
    AppendNext(TrackId, Option<TrackRole>),
    RemoveNext,
    Play,
    Pause,
    Seek(Duration),
    Reset,
}

impl PlayerCall {
    /// Whether the call changes buffer contents
    pub fn is_buffer_mutation(&self) -> bool {
        matches!(
            self,
            Self::LoadCurrent(..) | Self::AppendNext(..) | Self::RemoveNext | Self::Reset
        )
    }
}

#[derive(Debug, Default)]
struct PlayerState {
    current: Option<(TrackId, TrackRole)>,
    next: Option<(TrackId, Option<TrackRole>)>,
    playing: bool,
    position: Duration,
    calls: Vec<PlayerCall>,
    failing: bool,
}

/// Two-slot player that records every call
///
/// Follows the native contract: `append_next` into an occupied slot is an
/// error, and `load_current` emits nothing. Tests drive transitions with
/// [`finish_current`](Self::finish_current).
#[derive(Debug, Default)]
pub struct RecordingPlayer {
    state: Mutex<PlayerState>,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.lock().calls.clone()
    }

    /// Drain the call log
    pub fn take_calls(&self) -> Vec<PlayerCall> {
        std::mem::take(&mut self.lock().calls)
    }

    /// Track in the current slot
    pub fn current(&self) -> Option<TrackId> {
        self.lock().current.as_ref().map(|(id, _)| id.clone())
    }

    /// Track and role in the next slot
    pub fn next(&self) -> Option<(TrackId, Option<TrackRole>)> {
        self.lock().next.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    /// Pretend playback has reached `position`
    pub fn set_position(&self, position: Duration) {
        self.lock().position = position;
    }

    /// Make every buffer mutation fail
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Current track ends; the player moves into the next slot
    ///
    /// Returns the event a real player would emit.
    pub fn finish_current(&self) -> NativeEvent {
        let mut state = self.lock();
        state.position = Duration::ZERO;
        match state.next.take() {
            Some((track_id, role)) => {
                state.current = Some((track_id.clone(), role.unwrap_or(TrackRole::Reload)));
                NativeEvent::ActiveTrackChanged { track_id, role }
            }
            None => {
                state.current = None;
                state.playing = false;
                NativeEvent::QueueEnded
            }
        }
    }

    fn record(&self, call: PlayerCall) -> Result<MutexGuard<'_, PlayerState>> {
        let mut state = self.lock();
        if state.failing && call.is_buffer_mutation() {
            return Err(CadenceError::player(format!("{:?} failed", call)));
        }
        state.calls.push(call);
        Ok(state)
    }
}

#[async_trait]
impl NativePlayer for RecordingPlayer {
    async fn load_current(&self, track: &Track, role: TrackRole) -> Result<()> {
        let mut state = self.record(PlayerCall::LoadCurrent(track.id.clone(), role))?;
        state.current = Some((track.id.clone(), role));
        state.position = Duration::ZERO;
        Ok(())
    }

    async fn append_next(&self, track: &Track, role: Option<TrackRole>) -> Result<()> {
        let mut state = self.record(PlayerCall::AppendNext(track.id.clone(), role))?;
        if state.next.is_some() {
            return Err(CadenceError::player("next slot already filled"));
        }
        state.next = Some((track.id.clone(), role));
        Ok(())
    }

    async fn remove_next(&self) -> Result<()> {
        let mut state = self.record(PlayerCall::RemoveNext)?;
        state.next = None;
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        let mut state = self.record(PlayerCall::Play)?;
        state.playing = state.current.is_some();
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record(PlayerCall::Pause)?.playing = false;
        Ok(())
    }

    async fn seek(&self, position: Duration) -> Result<()> {
        self.record(PlayerCall::Seek(position))?.position = position;
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.record(PlayerCall::Reset)?;
        state.current = None;
        state.next = None;
        state.playing = false;
        state.position = Duration::ZERO;
        Ok(())
    }

    async fn is_loaded(&self) -> Result<bool> {
        Ok(self.lock().current.is_some())
    }

    async fn active_track_id(&self) -> Result<Option<TrackId>> {
        Ok(self.current())
    }

    async fn position(&self) -> Result<Duration> {
        Ok(self.lock().position)
    }
}

// ===== Key-value store =====

/// Key-value store held in memory
///
/// Created hydrated by default; [`hydrating`](Self::hydrating) models a store
/// that becomes readable later.
#[derive(Debug)]
pub struct MemoryKeyValueStore {
    values: RwLock<HashMap<String, Vec<u8>>>,
    hydrated: watch::Sender<bool>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            hydrated: watch::Sender::new(true),
        }
    }

    /// Store whose `rehydrated()` blocks until [`finish_hydration`](Self::finish_hydration)
    pub fn hydrating() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            hydrated: watch::Sender::new(false),
        }
    }

    pub fn finish_hydration(&self) {
        self.hydrated.send_replace(true);
    }

    /// Raw stored bytes
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Seed a raw value
    pub fn insert_raw(&self, key: impl Into<String>, value: Vec<u8>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
    }
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.insert_raw(key, value);
        Ok(())
    }

    async fn rehydrated(&self) {
        let mut hydrated = self.hydrated.subscribe();
        // The sender lives as long as `self`, so this cannot fail while we wait
        let _ = hydrated.wait_for(|ready| *ready).await;
    }
}
