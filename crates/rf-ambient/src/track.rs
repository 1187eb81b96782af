//! Track Catalog
//!
//! Tracks are immutable, loopable audio resources authored with the content.
//! The bus never decodes audio itself: it resolves a track name into a
//! [`Track`] record and hands that record to a voice.

use crate::{AmbientError, AmbientResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Audio track reference data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Track name (unique within its catalog)
    pub name: String,
    /// Audio file path (relative to project)
    #[serde(default)]
    pub path: String,
    /// Default volume (0.0 - 1.0)
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    /// Length in seconds (0 = unknown)
    #[serde(default)]
    pub length_seconds: f32,
}

fn default_volume() -> f32 {
    1.0
}

impl Track {
    /// Create a new track
    pub fn new(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            default_volume: 1.0,
            length_seconds: 0.0,
        }
    }

    /// Set default volume
    pub fn with_default_volume(mut self, volume: f32) -> Self {
        self.default_volume = volume.clamp(0.0, 1.0);
        self
    }

    /// Set track length. Non-finite lengths are treated as unknown (0).
    pub fn with_length(mut self, seconds: f32) -> Self {
        self.length_seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self
    }

    /// Length usable as a random start range
    #[inline]
    pub fn has_known_length(&self) -> bool {
        self.length_seconds.is_finite() && self.length_seconds > 0.0
    }
}

/// Resolves track names to playable audio data
pub trait TrackCatalog {
    /// Look up a track by name
    fn resolve(&self, name: &str) -> AmbientResult<Arc<Track>>;

    /// Check whether a track can be resolved
    fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }
}

/// In-memory track catalog
#[derive(Debug, Default)]
pub struct TrackLibrary {
    tracks: RwLock<HashMap<String, Arc<Track>>>,
}

impl TrackLibrary {
    pub fn new() -> Self {
        Self {
            tracks: RwLock::new(HashMap::new()),
        }
    }

    /// Register a track. Names must be unique.
    pub fn register(&self, track: Track) -> AmbientResult<()> {
        let mut tracks = self.tracks.write();
        if tracks.contains_key(&track.name) {
            return Err(AmbientError::DuplicateTrack(track.name));
        }
        tracks.insert(track.name.clone(), Arc::new(track));
        Ok(())
    }

    /// Remove a track
    pub fn unregister(&self, name: &str) -> Option<Arc<Track>> {
        self.tracks.write().remove(name)
    }

    /// List all track names
    pub fn track_names(&self) -> Vec<String> {
        self.tracks.read().keys().cloned().collect()
    }

    /// Number of registered tracks
    pub fn len(&self) -> usize {
        self.tracks.read().len()
    }

    /// Check if catalog is empty
    pub fn is_empty(&self) -> bool {
        self.tracks.read().is_empty()
    }
}

impl TrackCatalog for TrackLibrary {
    fn resolve(&self, name: &str) -> AmbientResult<Arc<Track>> {
        self.tracks
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AmbientError::TrackNotFound(name.to_string()))
    }

    fn contains(&self, name: &str) -> bool {
        self.tracks.read().contains_key(name)
    }
}
