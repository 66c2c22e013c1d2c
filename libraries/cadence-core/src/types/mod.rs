mod ids;
mod playback;
mod source;
mod track;

pub use ids::TrackId;
pub use playback::{MutationOutcome, RepeatMode, TrackRole};
pub use source::{
    default_source_name, sources_equal, PlaybackSource, SourceKind, FAVORITES_PLAYLIST_ID,
};
pub use track::Track;
