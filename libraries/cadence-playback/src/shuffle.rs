//! Shuffle for track-id lists
//!
//! Fisher-Yates via `SliceRandom`; the output is always a permutation of the input.

use cadence_core::TrackId;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use std::collections::HashMap;

/// Fresh random permutation of `ids`
pub fn shuffled(ids: &[TrackId]) -> Vec<TrackId> {
    shuffled_with(ids, &mut thread_rng())
}

/// Same as [`shuffled`] with a caller-provided RNG
pub fn shuffled_with<R: Rng + ?Sized>(ids: &[TrackId], rng: &mut R) -> Vec<TrackId> {
    let mut out = ids.to_vec();
    out.shuffle(rng);
    out
}

/// Whether `candidate` holds exactly the same ids as `reference`, duplicates included
pub fn is_permutation(reference: &[TrackId], candidate: &[TrackId]) -> bool {
    if reference.len() != candidate.len() {
        return false;
    }

    let mut counts: HashMap<&TrackId, isize> = HashMap::with_capacity(reference.len());
    for id in reference {
        *counts.entry(id).or_default() += 1;
    }
    for id in candidate {
        *counts.entry(id).or_default() -= 1;
    }
    counts.values().all(|count| *count == 0)
}
