//! Logical playback queue
//!
//! Owns what is playing, from where, in what order, and what the user asked to
//! hear next. Pure data plus transition functions; nothing here touches the
//! player or the library.
//!
//! ```text
//! source:    playlist:Road Trip
//! ordered:   [A, B, C, D, E]
//! shuffled:  [D, A, E, C, B]        (active list while shuffle is on)
//!                   ^ position
//! active:    X                      (from the jump queue: in_jump_queue = true)
//! jump queue [Y, Z]                 (always played before position + 1)
//! ```

use cadence_core::{sources_equal, PlaybackSource, RepeatMode, TrackId, TrackRole};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

use crate::shuffle;

/// Result of a `play_from_*` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayFromOutcome {
    /// Same source, same (or no) track: keep playing what is loaded
    Resumed,
    /// Same source, moved to another track in the active list
    Jumped,
    /// Same source but the track is not in the list; reload the source
    NotInList,
    /// New source loaded
    Loaded,
    /// New source has no tracks; nothing changed
    EmptySource,
}

/// Result of moving forward
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Popped the head of the jump queue
    FromQueue(TrackId),
    /// `RepeatOne`: same track again
    Repeated(TrackId),
    /// Moved to the next list position
    Moved(TrackId),
    /// Last position under `NoRepeat`; state unchanged
    EndOfQueue,
    /// Nothing to advance through
    Idle,
}

impl Advance {
    /// Track that is now active, if the queue moved
    pub fn track_id(&self) -> Option<&TrackId> {
        match self {
            Self::FromQueue(id) | Self::Repeated(id) | Self::Moved(id) => Some(id),
            Self::EndOfQueue | Self::Idle => None,
        }
    }
}

/// Look-ahead result: what a natural advance would play
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextTrack {
    pub track_id: TrackId,
    pub role: Option<TrackRole>,
}

/// Options for [`PlaybackQueue::replace_list`]
#[derive(Debug, Clone, Default)]
pub struct ReplaceOptions {
    /// Fall back to the track before `position` when the current one is gone
    pub context_aware: bool,
    /// Preferred anchor, searched first
    pub start_track_id: Option<TrackId>,
}

/// Result of [`PlaybackQueue::purge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purge {
    /// The active track is among the purged ids; the caller must reset
    ActiveRemoved,
    Changed,
    Unchanged,
}

/// Durable playback state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackQueue {
    /// Where the list came from; `None` if nothing has played
    source: Option<PlaybackSource>,

    /// Cached display name of `source`
    source_name: String,

    /// Canonical order of the source's tracks
    ordered_ids: Vec<TrackId>,

    /// Permutation of `ordered_ids`
    shuffled_ids: Vec<TrackId>,

    use_shuffled: bool,

    /// Index into the active list; `None` is unset
    position: Option<usize>,

    /// Track actually sounding
    active_track_id: Option<TrackId>,

    /// `active_track_id` came from the jump queue rather than `position`
    in_jump_queue: bool,

    /// "Play next" requests, serviced before `position + 1`
    jump_queue: VecDeque<TrackId>,

    repeat_mode: RepeatMode,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Accessors =====

    pub fn source(&self) -> Option<&PlaybackSource> {
        self.source.as_ref()
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn ordered_ids(&self) -> &[TrackId] {
        &self.ordered_ids
    }

    pub fn shuffled_ids(&self) -> &[TrackId] {
        &self.shuffled_ids
    }

    pub fn is_shuffled(&self) -> bool {
        self.use_shuffled
    }

    /// List `position` indexes into
    pub fn active_list(&self) -> &[TrackId] {
        if self.use_shuffled {
            &self.shuffled_ids
        } else {
            &self.ordered_ids
        }
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn active_track_id(&self) -> Option<&TrackId> {
        self.active_track_id.as_ref()
    }

    pub fn in_jump_queue(&self) -> bool {
        self.in_jump_queue
    }

    pub fn jump_queue(&self) -> &VecDeque<TrackId> {
        &self.jump_queue
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    /// Whether `source` is the list currently playing
    pub fn is_playing_from(&self, source: &PlaybackSource) -> bool {
        sources_equal(self.source.as_ref(), source)
    }

    /// Tag for the track in the current native slot
    pub fn current_role(&self) -> TrackRole {
        if self.in_jump_queue {
            TrackRole::FromQueue
        } else if self.repeat_mode == RepeatMode::RepeatOne {
            TrackRole::RepeatSelf
        } else {
            TrackRole::Reload
        }
    }

    fn index_in_active_list(&self, id: &TrackId) -> Option<usize> {
        self.active_list().iter().position(|candidate| candidate == id)
    }

    // ===== Source selection =====

    /// `play_from` when the requested source is already playing
    pub fn play_from_current_source(&mut self, track_id: Option<&TrackId>) -> PlayFromOutcome {
        let Some(track_id) = track_id else {
            return PlayFromOutcome::Resumed;
        };
        if self.active_track_id.as_ref() == Some(track_id) {
            return PlayFromOutcome::Resumed;
        }

        match self.index_in_active_list(track_id) {
            Some(index) => {
                self.position = Some(index);
                self.active_track_id = Some(track_id.clone());
                self.in_jump_queue = false;
                PlayFromOutcome::Jumped
            }
            None => PlayFromOutcome::NotInList,
        }
    }

    /// `play_from` with a freshly fetched list for a different source
    ///
    /// The start index is `track_id` if present in the list, else the
    /// previous active track if it survived, else 0.
    pub fn play_from_new_source(
        &mut self,
        source: PlaybackSource,
        ids: Vec<TrackId>,
        track_id: Option<&TrackId>,
    ) -> PlayFromOutcome {
        if ids.is_empty() {
            return PlayFromOutcome::EmptySource;
        }

        self.shuffled_ids = shuffle::shuffled(&ids);
        self.ordered_ids = ids;

        let start = [track_id, self.active_track_id.as_ref()]
            .into_iter()
            .flatten()
            .find_map(|id| self.index_in_active_list(id))
            .unwrap_or(0);

        self.active_track_id = Some(self.active_list()[start].clone());
        self.position = Some(start);
        self.in_jump_queue = false;
        self.source = Some(source);
        self.source_name.clear();
        PlayFromOutcome::Loaded
    }

    pub fn set_source_name(&mut self, name: impl Into<String>) {
        self.source_name = name.into();
    }

    /// Point at `new` if `old` is playing; track ids are untouched
    pub fn rename_source(&mut self, old: &PlaybackSource, new: PlaybackSource) -> bool {
        if !self.is_playing_from(old) {
            return false;
        }
        self.source = Some(new);
        true
    }

    // ===== Modes =====

    /// Flip shuffle, keeping `position` on the same underlying track
    ///
    /// Outside the jump queue the anchor is the active track. Inside it the
    /// anchor is the list track the queue interrupted, so returning from the
    /// queue continues after the same song in either order.
    pub fn toggle_shuffle(&mut self) {
        let anchor = if self.in_jump_queue {
            self.position
                .and_then(|p| self.active_list().get(p))
                .cloned()
        } else {
            self.active_track_id.clone()
        };

        self.use_shuffled = !self.use_shuffled;
        if self.use_shuffled {
            self.shuffled_ids = shuffle::shuffled(&self.ordered_ids);
        }

        if let Some(anchor) = anchor {
            let fallback = (!self.active_list().is_empty()).then_some(0);
            self.position = self.index_in_active_list(&anchor).or(fallback);
        }
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
    }

    /// `NoRepeat -> RepeatAll -> RepeatOne -> NoRepeat`
    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.repeat_mode = self.repeat_mode.cycled();
        self.repeat_mode
    }

    // ===== Navigation =====

    /// Natural progression after the current track ended
    ///
    /// Priority: jump queue, then `RepeatOne`, then the next list position.
    pub fn advance(&mut self) -> Advance {
        self.step_forward(false)
    }

    /// User-requested next: like [`advance`](Self::advance) but ignores `RepeatOne`
    pub fn skip_forward(&mut self) -> Advance {
        self.step_forward(true)
    }

    fn step_forward(&mut self, manual: bool) -> Advance {
        if let Some(next) = self.jump_queue.pop_front() {
            self.active_track_id = Some(next.clone());
            self.in_jump_queue = true;
            return Advance::FromQueue(next);
        }

        if !manual && self.repeat_mode == RepeatMode::RepeatOne {
            if let Some(active) = &self.active_track_id {
                return Advance::Repeated(active.clone());
            }
        }

        let len = self.active_list().len();
        let Some(position) = self.position.filter(|_| len > 0) else {
            return Advance::Idle;
        };
        if self.repeat_mode == RepeatMode::NoRepeat && position + 1 >= len {
            return Advance::EndOfQueue;
        }

        let next = (position + 1) % len;
        let id = self.active_list()[next].clone();
        self.position = Some(next);
        self.active_track_id = Some(id.clone());
        self.in_jump_queue = false;
        Advance::Moved(id)
    }

    /// What [`advance`](Self::advance) would select, without mutating
    ///
    /// At the end of the list under `NoRepeat` the head of the list is
    /// returned tagged `EndOfList`, so the native player holds the track the
    /// queue rewinds to.
    pub fn peek_next(&self) -> Option<NextTrack> {
        if let Some(head) = self.jump_queue.front() {
            return Some(NextTrack {
                track_id: head.clone(),
                role: Some(TrackRole::FromQueue),
            });
        }

        if self.repeat_mode == RepeatMode::RepeatOne {
            if let Some(active) = &self.active_track_id {
                return Some(NextTrack {
                    track_id: active.clone(),
                    role: Some(TrackRole::RepeatSelf),
                });
            }
        }

        let list = self.active_list();
        let position = self.position.filter(|p| *p < list.len())?;
        if self.repeat_mode == RepeatMode::NoRepeat && position + 1 >= list.len() {
            return Some(NextTrack {
                track_id: list[0].clone(),
                role: Some(TrackRole::EndOfList),
            });
        }

        Some(NextTrack {
            track_id: list[(position + 1) % list.len()].clone(),
            role: None,
        })
    }

    /// Previous track
    ///
    /// From the jump queue this returns to the interrupted list track;
    /// otherwise it wraps backward through the active list.
    pub fn retreat(&mut self) -> Option<TrackId> {
        let len = self.active_list().len();
        let position = self.position.filter(|p| *p < len)?;

        let target = if self.in_jump_queue {
            position
        } else if position == 0 {
            len - 1
        } else {
            position - 1
        };

        let id = self.active_list()[target].clone();
        self.position = Some(target);
        self.active_track_id = Some(id.clone());
        self.in_jump_queue = false;
        Some(id)
    }

    /// Back to the head of the active list (after end-of-queue)
    pub fn rewind(&mut self) -> Option<TrackId> {
        let id = self.active_list().first()?.clone();
        self.position = Some(0);
        self.active_track_id = Some(id.clone());
        self.in_jump_queue = false;
        Some(id)
    }

    // ===== Jump queue =====

    /// Append to the jump queue
    ///
    /// Returns `true` when the head changed, which changes the native next slot.
    pub fn enqueue_next(&mut self, ids: impl IntoIterator<Item = TrackId>) -> bool {
        let was_empty = self.jump_queue.is_empty();
        self.jump_queue.extend(ids);
        was_empty && !self.jump_queue.is_empty()
    }

    /// Remove one jump-queue entry; `Some(true)` when it was the head
    pub fn dequeue_at(&mut self, index: usize) -> Option<bool> {
        self.jump_queue.remove(index).map(|_| index == 0)
    }

    /// Remove every jump-queue entry in `ids`; `true` when the head changed
    pub fn dequeue_ids(&mut self, ids: &HashSet<TrackId>) -> bool {
        let head = self.jump_queue.front().cloned();
        self.jump_queue.retain(|id| !ids.contains(id));
        head.as_ref() != self.jump_queue.front()
    }

    // ===== Library changes =====

    /// Swap in a new track list for the same source
    ///
    /// The anchor is searched in order: `start_track_id`, the track at
    /// `position`, then (context-aware) the track before `position`. Without
    /// an anchor, `position` becomes 0 and the active track is treated as
    /// queued until it finishes.
    pub fn replace_list(&mut self, new_ordered_ids: Vec<TrackId>, opts: ReplaceOptions) {
        let old_list = self.active_list();
        let current = self.position.and_then(|p| old_list.get(p)).cloned();
        let before = if opts.context_aware {
            self.position
                .and_then(|p| p.checked_sub(1))
                .and_then(|p| old_list.get(p))
                .cloned()
        } else {
            None
        };

        self.shuffled_ids = shuffle::shuffled(&new_ordered_ids);
        self.ordered_ids = new_ordered_ids;

        let anchor = [opts.start_track_id, current, before]
            .into_iter()
            .flatten()
            .find_map(|id| self.index_in_active_list(&id));

        match anchor {
            Some(index) => {
                self.position = Some(index);
                self.in_jump_queue = self
                    .active_track_id
                    .as_ref()
                    .is_some_and(|active| *active != self.active_list()[index]);
            }
            None => {
                self.position = (!self.active_list().is_empty()).then_some(0);
                self.in_jump_queue = self.active_track_id.is_some();
            }
        }
    }

    /// Drop deleted tracks from both lists and the jump queue
    ///
    /// `position` moves to the nearest surviving track at or before it.
    pub fn purge(&mut self, ids: &HashSet<TrackId>) -> Purge {
        if self
            .active_track_id
            .as_ref()
            .is_some_and(|active| ids.contains(active))
        {
            return Purge::ActiveRemoved;
        }

        let old_list = self.active_list();
        let kept_through = self.position.filter(|p| *p < old_list.len()).map(|p| {
            old_list[..=p]
                .iter()
                .filter(|id| !ids.contains(*id))
                .count()
        });

        let sizes = (
            self.ordered_ids.len(),
            self.shuffled_ids.len(),
            self.jump_queue.len(),
        );
        self.ordered_ids.retain(|id| !ids.contains(id));
        self.shuffled_ids.retain(|id| !ids.contains(id));
        self.jump_queue.retain(|id| !ids.contains(id));
        if sizes
            == (
                self.ordered_ids.len(),
                self.shuffled_ids.len(),
                self.jump_queue.len(),
            )
        {
            return Purge::Unchanged;
        }

        let fallback = (!self.active_list().is_empty()).then_some(0);
        self.position = match kept_through {
            Some(kept) if kept > 0 => Some(kept - 1),
            Some(_) => fallback,
            None => self.position.and(fallback),
        };
        if self.active_list().is_empty() {
            self.in_jump_queue = self.active_track_id.is_some();
        }
        Purge::Changed
    }

    /// Clear everything except repeat and shuffle preferences
    pub fn reset(&mut self) {
        *self = Self {
            repeat_mode: self.repeat_mode,
            use_shuffled: self.use_shuffled,
            ..Self::default()
        };
    }

    /// Fix up state read from storage; returns `true` if anything changed
    pub fn repair(&mut self) -> bool {
        let mut changed = false;

        if !shuffle::is_permutation(&self.ordered_ids, &self.shuffled_ids) {
            self.shuffled_ids = shuffle::shuffled(&self.ordered_ids);
            changed = true;
        }

        let len = self.active_list().len();
        if let Some(position) = self.position {
            if position >= len {
                self.position = len.checked_sub(1);
                changed = true;
            }
        }

        if let (Some(active), Some(position), false) =
            (&self.active_track_id, self.position, self.in_jump_queue)
        {
            if self.active_list()[position] != *active {
                match self.index_in_active_list(active) {
                    Some(index) => self.position = Some(index),
                    None => self.in_jump_queue = true,
                }
                changed = true;
            }
        }

        changed
    }

    /// Upcoming tracks: the jump queue, then the rest of the active list
    ///
    /// Stops at the end of the list under `NoRepeat`, otherwise wraps once.
    pub fn upcoming(&self, limit: usize) -> Vec<TrackId> {
        let mut out: Vec<TrackId> = self.jump_queue.iter().take(limit).cloned().collect();

        let list = self.active_list();
        if let Some(position) = self.position.filter(|p| *p < list.len()) {
            let remaining = match self.repeat_mode {
                RepeatMode::NoRepeat => list.len() - position - 1,
                RepeatMode::RepeatAll | RepeatMode::RepeatOne => list.len() - 1,
            };
            out.extend(
                (1..=remaining)
                    .map(|offset| list[(position + offset) % list.len()].clone())
                    .take(limit.saturating_sub(out.len())),
            );
        }
        out
    }

    /// Whether the state satisfies the queue invariants
    ///
    /// - `position` is in range
    /// - outside the jump queue, the active track is the list track at `position`
    /// - with a non-empty list, the active track is in it or came from the jump queue
    /// - the shuffle variant is a permutation of the canonical order
    pub fn is_consistent(&self) -> bool {
        let list = self.active_list();

        let position_in_range = self.position.map_or(true, |p| p < list.len());
        let position_matches = self.in_jump_queue
            || match (self.position, &self.active_track_id) {
                (Some(p), Some(active)) => list.get(p) == Some(active),
                _ => true,
            };
        let membership = self.source.is_none()
            || list.is_empty()
            || self.in_jump_queue
            || self
                .active_track_id
                .as_ref()
                .is_some_and(|active| list.contains(active));

        position_in_range
            && position_matches
            && membership
            && shuffle::is_permutation(&self.ordered_ids, &self.shuffled_ids)
    }
}
