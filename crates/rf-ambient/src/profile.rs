//! Profile System
//!
//! A profile is a named, reusable ambience recipe: an ordered list of layers,
//! each pointing at a track with its own volume, priority and playback
//! parameters. Profiles are authored once and shared by `Arc` between any
//! number of stack entries.
//!
//! Libraries of profiles (plus the tracks they reference) load from and save
//! to a versioned JSON document.

use crate::track::{Track, TrackCatalog, TrackLibrary};
use crate::{AmbientError, AmbientResult, MIN_PITCH};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Profile document format version
pub const LIBRARY_VERSION: &str = "1.0";

/// Pitch multiplier range, always normalized so `lo <= hi` and both are positive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "PitchRangeRepr", into = "PitchRangeRepr")]
pub struct PitchRange {
    lo: f32,
    hi: f32,
}

#[derive(Clone, Copy, Serialize, Deserialize)]
struct PitchRangeRepr {
    lo: f32,
    hi: f32,
}

impl From<PitchRangeRepr> for PitchRange {
    fn from(repr: PitchRangeRepr) -> Self {
        PitchRange::new(repr.lo, repr.hi)
    }
}

impl From<PitchRange> for PitchRangeRepr {
    fn from(range: PitchRange) -> Self {
        PitchRangeRepr {
            lo: range.lo,
            hi: range.hi,
        }
    }
}

impl Default for PitchRange {
    fn default() -> Self {
        Self { lo: 1.0, hi: 1.0 }
    }
}

impl PitchRange {
    /// Create a normalized range
    pub fn new(lo: f32, hi: f32) -> Self {
        let sanitize = |p: f32| if p.is_finite() { p.max(MIN_PITCH) } else { 1.0 };
        let (lo, hi) = (sanitize(lo), sanitize(hi));
        if lo <= hi {
            Self { lo, hi }
        } else {
            Self { lo: hi, hi: lo }
        }
    }

    /// Fixed pitch
    pub fn fixed(pitch: f32) -> Self {
        Self::new(pitch, pitch)
    }

    #[inline]
    pub fn lo(&self) -> f32 {
        self.lo
    }

    #[inline]
    pub fn hi(&self) -> f32 {
        self.hi
    }

    /// Whether the range has any spread
    #[inline]
    pub fn is_varied(&self) -> bool {
        self.hi - self.lo > f32::EPSILON
    }

    /// Map a unit random value (0.0-1.0) into the range
    #[inline]
    pub fn pick(&self, unit: f32) -> f32 {
        self.lo + unit.clamp(0.0, 1.0) * (self.hi - self.lo)
    }
}

/// One layer inside a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientLayer {
    /// Track name (None = unassigned, skipped at runtime)
    #[serde(default)]
    pub track: Option<String>,
    /// Layer volume (0.0 - 1.0)
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Layer priority (higher wins)
    #[serde(default)]
    pub priority: i32,
    /// Whether the layer loops (false = one-shot)
    #[serde(default = "default_true")]
    pub looping: bool,
    /// Start playback at a random offset
    #[serde(default)]
    pub random_start: bool,
    /// Pitch variance range
    #[serde(default)]
    pub pitch: PitchRange,
}

fn default_volume() -> f32 {
    1.0
}
fn default_true() -> bool {
    true
}

impl AmbientLayer {
    /// Create a looping layer on a track
    pub fn new(track: &str, volume: f32) -> Self {
        Self {
            track: Some(track.to_string()),
            volume: volume.clamp(0.0, 1.0),
            priority: 0,
            looping: true,
            random_start: false,
            pitch: PitchRange::default(),
        }
    }

    /// Create a layer with no track assigned
    pub fn unassigned(volume: f32) -> Self {
        Self {
            track: None,
            ..Self::new("", volume)
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn one_shot(mut self) -> Self {
        self.looping = false;
        self
    }

    pub fn with_random_start(mut self) -> Self {
        self.random_start = true;
        self
    }

    pub fn with_pitch(mut self, lo: f32, hi: f32) -> Self {
        self.pitch = PitchRange::new(lo, hi);
        self
    }

    /// Volume clamped to the valid range
    #[inline]
    pub fn effective_volume(&self) -> f32 {
        if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Named ambience recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientProfile {
    /// Profile name
    pub name: String,
    /// Ordered layers (empty = silence)
    #[serde(default)]
    pub layers: Vec<AmbientLayer>,
    /// Fade used when a call does not specify one (seconds)
    #[serde(default = "default_fade_seconds")]
    pub default_fade_seconds: f32,
}

fn default_fade_seconds() -> f32 {
    1.0
}

impl AmbientProfile {
    /// Create an empty profile
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            layers: Vec::new(),
            default_fade_seconds: 1.0,
        }
    }

    pub fn with_layer(mut self, layer: AmbientLayer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn with_fade(mut self, seconds: f32) -> Self {
        self.default_fade_seconds = seconds.max(0.0);
        self
    }

    /// Wrap in an `Arc` for sharing between stack entries
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Describe configuration defects against a catalog
    pub fn problems(&self, catalog: &dyn TrackCatalog) -> Vec<String> {
        let mut problems = Vec::new();

        if self.name.is_empty() {
            problems.push("Profile name cannot be empty".to_string());
        }
        if self.layers.is_empty() {
            problems.push(format!("Profile '{}' has no layers", self.name));
        }
        for (index, layer) in self.layers.iter().enumerate() {
            match layer.track.as_deref() {
                None | Some("") => problems.push(format!(
                    "Profile '{}' layer {} has no track",
                    self.name, index
                )),
                Some(track) if !catalog.contains(track) => problems.push(format!(
                    "Profile '{}' layer {} references unknown track '{}'",
                    self.name, index, track
                )),
                Some(_) => {}
            }
        }

        problems
    }
}

/// Serialized form of a profile library
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LibraryDocument {
    #[serde(default = "default_version")]
    version: String,
    #[serde(default = "default_format")]
    format: String,
    #[serde(default)]
    tracks: Vec<Track>,
    #[serde(default)]
    profiles: Vec<AmbientProfile>,
}

fn default_version() -> String {
    LIBRARY_VERSION.to_string()
}
fn default_format() -> String {
    "ambient_profiles".to_string()
}

/// Named profile collection
#[derive(Debug, Clone, Default)]
pub struct ProfileLibrary {
    profiles: HashMap<String, Arc<AmbientProfile>>,
    tracks: Vec<Track>,
}

impl ProfileLibrary {
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
            tracks: Vec::new(),
        }
    }

    /// Load a library from JSON
    pub fn from_json(json: &str) -> AmbientResult<Self> {
        let raw: serde_json::Value = serde_json::from_str(json)?;

        let version = raw["version"].as_str().unwrap_or(LIBRARY_VERSION);
        if version != LIBRARY_VERSION {
            return Err(AmbientError::ProfileError(format!(
                "Unknown profile library version: {}",
                version
            )));
        }

        let document: LibraryDocument = serde_json::from_value(raw)?;
        let mut library = Self::new();
        for profile in document.profiles {
            if library.profiles.contains_key(&profile.name) {
                return Err(AmbientError::ProfileError(format!(
                    "Duplicate profile name: {}",
                    profile.name
                )));
            }
            library.insert(profile);
        }
        library.tracks = document.tracks;

        Ok(library)
    }

    /// Save library to JSON
    pub fn to_json(&self) -> AmbientResult<String> {
        let mut profiles: Vec<AmbientProfile> =
            self.profiles.values().map(|p| (**p).clone()).collect();
        profiles.sort_by(|a, b| a.name.cmp(&b.name));

        let document = LibraryDocument {
            version: LIBRARY_VERSION.to_string(),
            format: default_format(),
            tracks: self.tracks.clone(),
            profiles,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Add or replace a profile, returning the shared handle
    pub fn insert(&mut self, profile: AmbientProfile) -> Arc<AmbientProfile> {
        let profile = Arc::new(profile);
        self.profiles.insert(profile.name.clone(), profile.clone());
        profile
    }

    /// Add a track to the manifest
    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Get a profile by name
    pub fn get(&self, name: &str) -> Option<Arc<AmbientProfile>> {
        self.profiles.get(name).cloned()
    }

    /// Remove a profile
    pub fn remove(&mut self, name: &str) -> Option<Arc<AmbientProfile>> {
        self.profiles.remove(name)
    }

    /// List all profile names
    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(|s| s.as_str())
    }

    /// Track manifest
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Register the manifest tracks into a catalog
    pub fn install_tracks(&self, catalog: &TrackLibrary) -> AmbientResult<()> {
        for track in &self.tracks {
            catalog.register(track.clone())?;
        }
        Ok(())
    }

    /// Validate every profile against a catalog
    pub fn validate(&self, catalog: &dyn TrackCatalog) -> Result<(), Vec<String>> {
        let mut errors: Vec<String> = self
            .profiles
            .values()
            .flat_map(|profile| profile.problems(catalog))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            errors.sort();
            Err(errors)
        }
    }

    /// Number of profiles
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Check if library is empty
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_range_normalized() {
        let range = PitchRange::new(1.2, 0.8);
        assert!((range.lo() - 0.8).abs() < 1e-6);
        assert!((range.hi() - 1.2).abs() < 1e-6);

        let range = PitchRange::new(-1.0, 0.0);
        assert!(range.lo() >= MIN_PITCH);
        assert!(range.hi() >= range.lo());

        assert!(!PitchRange::fixed(1.0).is_varied());
        assert!((PitchRange::new(0.5, 1.5).pick(0.5) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_layer_volume_clamped() {
        let layer = AmbientLayer::new("wind", 1.7);
        assert!((layer.effective_volume() - 1.0).abs() < 1e-6);

        let mut layer = AmbientLayer::new("wind", 0.5);
        layer.volume = f32::NAN;
        assert_eq!(layer.effective_volume(), 0.0);
    }

    #[test]
    fn test_library_from_json() {
        let json = r#"{
            "version": "1.0",
            "tracks": [
                { "name": "wind", "path": "amb/wind.ogg", "default_volume": 0.9 },
                { "name": "insects", "path": "amb/insects.ogg" }
            ],
            "profiles": [
                {
                    "name": "Forest",
                    "default_fade_seconds": 2.5,
                    "layers": [
                        { "track": "wind", "volume": 0.6 },
                        { "track": "insects", "volume": 0.3, "priority": 2,
                          "random_start": true, "pitch": { "lo": 1.1, "hi": 0.9 } }
                    ]
                }
            ]
        }"#;

        let library = ProfileLibrary::from_json(json).unwrap();
        let forest = library.get("Forest").unwrap();
        assert_eq!(forest.layers.len(), 2);
        assert!((forest.default_fade_seconds - 2.5).abs() < 1e-6);
        assert!(forest.layers[0].looping);
        assert_eq!(forest.layers[1].priority, 2);
        assert!((forest.layers[1].pitch.lo() - 0.9).abs() < 1e-6);

        let catalog = TrackLibrary::new();
        library.install_tracks(&catalog).unwrap();
        assert!(library.validate(&catalog).is_ok());

        let reloaded = ProfileLibrary::from_json(&library.to_json().unwrap()).unwrap();
        assert_eq!(reloaded.get("Forest").as_deref(), Some(&*forest));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let result = ProfileLibrary::from_json(r#"{ "version": "9.0", "profiles": [] }"#);
        assert!(matches!(result, Err(AmbientError::ProfileError(_))));
    }

    #[test]
    fn test_duplicate_profile_rejected() {
        let json = r#"{ "version": "1.0", "profiles": [ { "name": "A" }, { "name": "A" } ] }"#;
        assert!(ProfileLibrary::from_json(json).is_err());
    }

    #[test]
    fn test_validation_reports_defects() {
        let catalog = TrackLibrary::new();
        catalog.register(Track::new("wind", "wind.ogg")).unwrap();

        let mut library = ProfileLibrary::new();
        library.insert(
            AmbientProfile::new("Cave")
                .with_layer(AmbientLayer::new("wind", 0.5))
                .with_layer(AmbientLayer::new("drips", 0.5))
                .with_layer(AmbientLayer::unassigned(0.5)),
        );
        library.insert(AmbientProfile::new("Silence"));

        let errors = library.validate(&catalog).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("unknown track 'drips'")));
        assert!(errors.iter().any(|e| e.contains("has no track")));
        assert!(errors.iter().any(|e| e.contains("'Silence' has no layers")));
    }
}
