//! Recently played sources
//!
//! Most-recent-first list of distinct sources for a "recently played" shelf.
//! Replaying a source moves it to the front instead of duplicating it.

use cadence_core::PlaybackSource;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Bounded, de-duplicated list of played sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentSources {
    /// Most recent = front
    sources: VecDeque<PlaybackSource>,

    /// Maximum number of entries kept
    max_size: usize,
}

impl RecentSources {
    pub fn new(max_size: usize) -> Self {
        Self {
            sources: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Record a play of `source`
    ///
    /// Moves an existing entry to the front; drops the oldest when full.
    pub fn push(&mut self, source: PlaybackSource) {
        self.sources.retain(|existing| *existing != source);
        self.sources.push_front(source);
        self.sources.truncate(self.max_size);
    }

    /// Rewrite `old` as `new` in place
    ///
    /// If `new` is already listed, `old` is dropped instead so the list
    /// stays free of duplicates. Returns `true` if anything changed.
    pub fn replace(&mut self, old: &PlaybackSource, new: PlaybackSource) -> bool {
        let Some(index) = self.sources.iter().position(|source| source == old) else {
            return false;
        };

        if self.sources.contains(&new) {
            self.sources.remove(index);
        } else {
            self.sources[index] = new;
        }
        true
    }

    /// Remove every entry in `removed`; returns `true` if anything changed
    pub fn remove_all(&mut self, removed: &[PlaybackSource]) -> bool {
        let before = self.sources.len();
        self.sources.retain(|source| !removed.contains(source));
        before != self.sources.len()
    }

    pub fn contains(&self, source: &PlaybackSource) -> bool {
        self.sources.contains(source)
    }

    /// Entries, most recent first
    pub fn iter(&self) -> impl Iterator<Item = &PlaybackSource> {
        self.sources.iter()
    }

    pub fn to_vec(&self) -> Vec<PlaybackSource> {
        self.sources.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Set maximum size
    ///
    /// If new size is smaller than current, oldest entries are discarded
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.sources.truncate(max_size);
    }
}

impl Default for RecentSources {
    fn default() -> Self {
        Self::new(20)
    }
}
