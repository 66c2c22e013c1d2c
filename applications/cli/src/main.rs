/// Cadence CLI - drive the playback engine from the shell
///
/// Each invocation restores the persisted queue, applies one command against
/// a recording player, prints the resulting snapshot and persists again.
use anyhow::Context;
use cadence_core::{PlaybackSource, RepeatMode, SourceKind, TrackId};
use cadence_playback::memory::{LibrarySnapshot, MemoryTrackStore, RecordingPlayer};
use cadence_playback::{EngineConfig, EngineDeps, FileKeyValueStore, PlaybackEngine};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Cadence playback queue engine", long_about = None)]
struct Cli {
    /// JSON library file with tracks and sources
    #[arg(short, long, env = "CADENCE_LIBRARY")]
    library: PathBuf,

    /// Directory holding persisted playback state
    #[arg(short, long, env = "CADENCE_STATE_DIR", default_value = ".cadence")]
    state_dir: PathBuf,

    /// Engine configuration file (TOML)
    #[arg(short, long, env = "CADENCE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the restored state
    Status,
    /// Start a source, or resume when no source is given
    Play {
        /// Source as `kind:id`, e.g. `album:42` or `playlist:favorites`
        source: Option<String>,
        /// Track to start from
        #[arg(short, long)]
        track: Option<String>,
    },
    /// Pause playback
    Pause,
    /// Skip to the next track
    Next,
    /// Restart the track or go back one
    Prev,
    /// Seek within the current track
    Seek {
        /// Position in milliseconds
        #[arg(allow_hyphen_values = true)]
        position_ms: i64,
    },
    /// Toggle shuffle
    Shuffle,
    /// Set the repeat mode, or cycle it when no mode is given
    Repeat {
        /// off | all | one
        mode: Option<String>,
    },
    /// Play tracks right after the current one
    Enqueue {
        #[arg(required = true)]
        track_ids: Vec<String>,
    },
    /// Remove an entry from the jump queue
    Dequeue { index: usize },
    /// Toggle a track in favorites
    Favorite { track_id: String },
    /// Pretend the current track played to the end
    Finish,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence_playback=info,cadence=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = EngineConfig::load(cli.config.as_deref())?;
    let store = Arc::new(load_library(&cli.library).await?);
    let kv = Arc::new(
        FileKeyValueStore::open(&cli.state_dir)
            .await
            .with_context(|| format!("Failed to open state directory {:?}", cli.state_dir))?,
    );
    let player = Arc::new(RecordingPlayer::new());

    let engine = PlaybackEngine::spawn(
        EngineDeps {
            store,
            player: player.clone(),
            kv,
        },
        config,
    );
    let mut events = engine.events();

    // Wait for restore before counting native calls as ours
    engine.queue_state().await?;
    player.take_calls();

    run_command(&engine, &player, cli.command).await?;

    let snapshot = engine.snapshot();
    engine.shutdown().await?;

    loop {
        match events.try_recv() {
            Ok(event) => tracing::info!(?event, "Playback event"),
            Err(TryRecvError::Lagged(missed)) => {
                tracing::warn!("Missed {} playback events", missed)
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    for call in player.take_calls() {
        tracing::debug!(?call, "Native call");
    }

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn run_command(
    engine: &PlaybackEngine,
    player: &RecordingPlayer,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Status => {}
        Commands::Play {
            source: Some(source),
            track,
        } => {
            let source = parse_source(&source)?;
            engine.play_from(source, track.map(TrackId::new)).await?;
        }
        Commands::Play { source: None, .. } => engine.play().await?,
        Commands::Pause => engine.pause().await?,
        Commands::Next => engine.skip_next().await?,
        Commands::Prev => engine.skip_prev().await?,
        Commands::Seek { position_ms } => engine.seek_to(position_ms).await?,
        Commands::Shuffle => engine.toggle_shuffle().await?,
        Commands::Repeat { mode: None } => {
            let mode = engine.cycle_repeat().await?;
            tracing::info!("Repeat mode is now {}", mode);
        }
        Commands::Repeat { mode: Some(mode) } => {
            let mode = RepeatMode::from_str(&mode)
                .with_context(|| format!("Unknown repeat mode {:?}", mode))?;
            engine.set_repeat(mode).await?;
        }
        Commands::Enqueue { track_ids } => {
            engine
                .enqueue_next(track_ids.into_iter().map(TrackId::new).collect())
                .await?
        }
        Commands::Dequeue { index } => engine.dequeue_at(index).await?,
        Commands::Favorite { track_id } => {
            let outcome = engine.toggle_favorite(TrackId::new(track_id)).await?;
            tracing::info!(?outcome, "Favorite toggled");
        }
        Commands::Finish => {
            let event = player.finish_current();
            engine.native_event(event).await?;
        }
    }
    Ok(())
}

async fn load_library(path: &Path) -> anyhow::Result<MemoryTrackStore> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read library {:?}", path))?;
    let snapshot: LibrarySnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse library {:?}", path))?;

    tracing::info!(
        "Loaded {} tracks in {} sources",
        snapshot.tracks.len(),
        snapshot.sources.len()
    );
    Ok(MemoryTrackStore::from_snapshot(snapshot))
}

/// Parse `kind:id`, with `favorites` as a shorthand
fn parse_source(raw: &str) -> anyhow::Result<PlaybackSource> {
    if raw == "favorites" {
        return Ok(PlaybackSource::favorites());
    }

    let (kind, id) = raw
        .split_once(':')
        .with_context(|| format!("Expected kind:id, got {:?}", raw))?;
    let kind =
        SourceKind::from_str(kind).with_context(|| format!("Unknown source kind {:?}", kind))?;
    if id.is_empty() {
        anyhow::bail!("Source id must not be empty");
    }
    Ok(PlaybackSource::new(kind, id))
}
