//! Durable playback state
//!
//! The queue and the recent list are stored as JSON under two keys of a
//! [`KeyValueStore`]. The queue is wrapped in a versioned envelope together
//! with the last known position inside the active track.

use cadence_core::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::queue::PlaybackQueue;
use crate::recent::RecentSources;

/// Envelope version written by this build
const STATE_VERSION: u32 = 1;

#[derive(Serialize)]
struct PersistedRef<'a> {
    version: u32,
    queue: &'a PlaybackQueue,
    resume_position_ms: u64,
}

#[derive(Deserialize)]
struct Persisted {
    version: u32,
    queue: PlaybackQueue,
    #[serde(default)]
    resume_position_ms: u64,
}

/// Queue state read back at start-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredState {
    pub queue: PlaybackQueue,
    pub resume_position: Duration,
}

/// Reads and writes engine state through a key-value store
pub struct PersistenceAdapter {
    store: Arc<dyn KeyValueStore>,
    state_key: String,
    recent_key: String,
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            state_key: config.state_key.clone(),
            recent_key: config.recent_key.clone(),
        }
    }

    pub async fn save_queue(&self, queue: &PlaybackQueue, resume_position: Duration) -> Result<()> {
        let bytes = serde_json::to_vec(&PersistedRef {
            version: STATE_VERSION,
            queue,
            resume_position_ms: resume_position.as_millis() as u64,
        })?;
        self.store.set(&self.state_key, bytes).await?;
        Ok(())
    }

    /// Wait for rehydration, then read the queue
    ///
    /// Undecodable or future-versioned data is discarded: the engine starts
    /// empty rather than refusing to start.
    pub async fn load_queue(&self) -> Result<Option<RestoredState>> {
        self.store.rehydrated().await;

        let Some(bytes) = self.store.get(&self.state_key).await? else {
            debug!("No persisted queue under {}", self.state_key);
            return Ok(None);
        };

        let persisted: Persisted = match serde_json::from_slice(&bytes) {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!("Discarding unreadable queue state: {}", e);
                return Ok(None);
            }
        };

        if persisted.version > STATE_VERSION {
            warn!(
                "Discarding queue state version {} (newer than {})",
                persisted.version, STATE_VERSION
            );
            return Ok(None);
        }

        Ok(Some(RestoredState {
            queue: persisted.queue,
            resume_position: Duration::from_millis(persisted.resume_position_ms),
        }))
    }

    pub async fn save_recent(&self, recent: &RecentSources) -> Result<()> {
        let bytes = serde_json::to_vec(recent)?;
        self.store.set(&self.recent_key, bytes).await?;
        Ok(())
    }

    pub async fn load_recent(&self) -> Result<Option<RecentSources>> {
        self.store.rehydrated().await;

        let Some(bytes) = self.store.get(&self.recent_key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(recent) => Ok(Some(recent)),
            Err(e) => {
                warn!("Discarding unreadable recent list: {}", e);
                Ok(None)
            }
        }
    }
}
