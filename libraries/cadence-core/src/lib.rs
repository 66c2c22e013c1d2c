//! Cadence Core
//!
//! Shared vocabulary for the Cadence playback queue engine.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `TrackId`, `Track`, `PlaybackSource`, `RepeatMode`, `TrackRole`
//! - **Collaborator Traits**: `TrackStore`, `NativePlayer`, `KeyValueStore`
//! - **Events**: `NativeEvent` (from the audio engine) and `LibraryEvent` (from the library)
//! - **Error Handling**: Unified `CadenceError` and `Result` types
//!
//! Everything the engine talks to is reached through the traits here, so the
//! engine itself never depends on a database, a player backend or a UI.
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{PlaybackSource, SourceKind, TrackId};
//!
//! let favorites = PlaybackSource::favorites();
//! assert_eq!(favorites.kind, SourceKind::Playlist);
//!
//! // Sources compare structurally
//! assert_eq!(PlaybackSource::album("42"), PlaybackSource::new(SourceKind::Album, "42"));
//!
//! let id = TrackId::new("track-1");
//! assert_eq!(id.as_str(), "track-1");
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

pub use error::{CadenceError, Result};
pub use events::{LibraryEvent, NativeEvent, NativeState};
pub use traits::{KeyValueStore, NativePlayer, TrackStore};
pub use types::{
    default_source_name, sources_equal, MutationOutcome, PlaybackSource, RepeatMode, SourceKind,
    Track, TrackId, TrackRole, FAVORITES_PLAYLIST_ID,
};
