//! Desired State
//!
//! Folds every layer of every stack entry into one `track -> (volume,
//! priority)` map. Overlapping entries use union semantics: the maximum
//! volume and the maximum priority win, nothing is summed.

use crate::diagnostics::Diagnostic;
use crate::profile::PitchRange;
use crate::stack::StackEntry;
use crate::track::{Track, TrackCatalog};
use std::collections::HashMap;
use std::sync::Arc;

/// Playback parameters taken from the dominant layer of a track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerPlayback {
    pub looping: bool,
    pub random_start: bool,
    pub pitch: PitchRange,
}

/// Aggregated request for one track
#[derive(Debug, Clone)]
pub struct DesiredTrack {
    /// Resolved track
    pub track: Arc<Track>,
    /// Maximum layer volume across entries
    pub volume: f32,
    /// Maximum stack entry priority across entries
    pub priority: i32,
    /// Maximum layer priority across entries
    pub layer_priority: i32,
    /// Playback parameters of the highest-priority (then newest) contribution
    pub playback: LayerPlayback,
    dominant_priority: i32,
}

impl DesiredTrack {
    #[inline]
    pub fn name(&self) -> &str {
        &self.track.name
    }
}

/// Per-track desired state in first-seen order
#[derive(Debug, Clone, Default)]
pub struct DesiredState {
    tracks: Vec<DesiredTrack>,
    index: HashMap<String, usize>,
}

impl DesiredState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold stack entries into desired state. Invalid layers are reported and skipped.
    pub fn aggregate(
        entries: &[StackEntry],
        catalog: &dyn TrackCatalog,
        report: &mut dyn FnMut(Diagnostic),
    ) -> Self {
        let mut state = Self::new();

        for entry in entries {
            let profile = &entry.profile;

            for (layer_index, layer) in profile.layers.iter().enumerate() {
                let Some(track_name) = layer.track.as_deref().filter(|t| !t.is_empty()) else {
                    report(Diagnostic::MissingTrack {
                        profile: profile.name.clone(),
                        layer_index,
                    });
                    continue;
                };

                let playback = LayerPlayback {
                    looping: layer.looping,
                    random_start: layer.random_start,
                    pitch: layer.pitch,
                };
                let volume = layer.effective_volume();

                if let Some(&slot) = state.index.get(track_name) {
                    let desired = &mut state.tracks[slot];
                    desired.volume = desired.volume.max(volume);
                    desired.priority = desired.priority.max(entry.priority);
                    desired.layer_priority = desired.layer_priority.max(layer.priority);
                    if entry.priority >= desired.dominant_priority {
                        desired.dominant_priority = entry.priority;
                        desired.playback = playback;
                    }
                    continue;
                }

                let track = match catalog.resolve(track_name) {
                    Ok(track) => track,
                    Err(_) => {
                        report(Diagnostic::UnresolvedTrack {
                            profile: profile.name.clone(),
                            track: track_name.to_string(),
                        });
                        continue;
                    }
                };

                state.index.insert(track_name.to_string(), state.tracks.len());
                state.tracks.push(DesiredTrack {
                    track,
                    volume,
                    priority: entry.priority,
                    layer_priority: layer.priority,
                    playback,
                    dominant_priority: entry.priority,
                });
            }
        }

        state
    }

    /// Look up a track
    pub fn get(&self, track: &str) -> Option<&DesiredTrack> {
        self.index.get(track).map(|&slot| &self.tracks[slot])
    }

    /// Desired volume of a track
    pub fn volume(&self, track: &str) -> Option<f32> {
        self.get(track).map(|d| d.volume)
    }

    /// Tracks in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &DesiredTrack> {
        self.tracks.iter()
    }

    /// `(track, volume, priority)` triples sorted by track name
    pub fn summary(&self) -> Vec<(String, f32, i32)> {
        let mut summary: Vec<_> = self
            .tracks
            .iter()
            .map(|d| (d.track.name.clone(), d.volume, d.priority.max(d.layer_priority)))
            .collect();
        summary.sort_by(|a, b| a.0.cmp(&b.0));
        summary
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{AmbientLayer, AmbientProfile};
    use crate::stack::ProfileStack;
    use crate::track::TrackLibrary;

    fn catalog() -> TrackLibrary {
        let library = TrackLibrary::new();
        for name in ["wind", "insects", "rain"] {
            library
                .register(Track::new(name, &format!("{name}.ogg")))
                .unwrap();
        }
        library
    }

    fn aggregate(stack: &ProfileStack, catalog: &TrackLibrary) -> (DesiredState, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let state = DesiredState::aggregate(stack.entries(), catalog, &mut |d| diagnostics.push(d));
        (state, diagnostics)
    }

    #[test]
    fn test_union_takes_maximum() {
        let catalog = catalog();
        let mut stack = ProfileStack::new();
        stack.push(
            Some(AmbientProfile::new("Forest").with_layer(AmbientLayer::new("wind", 0.4)).shared()),
            1,
            1.0,
        );
        stack.push(
            Some(AmbientProfile::new("Storm").with_layer(AmbientLayer::new("wind", 0.7)).shared()),
            3,
            1.0,
        );

        let (state, diagnostics) = aggregate(&stack, &catalog);
        assert!(diagnostics.is_empty());
        assert_eq!(state.len(), 1);

        let wind = state.get("wind").unwrap();
        assert!((wind.volume - 0.7).abs() < 1e-6);
        assert_eq!(wind.priority, 3);
    }

    #[test]
    fn test_dominant_layer_playback() {
        let catalog = catalog();
        let mut stack = ProfileStack::new();
        stack.push(
            Some(
                AmbientProfile::new("High")
                    .with_layer(AmbientLayer::new("rain", 0.2).with_pitch(0.9, 1.1))
                    .shared(),
            ),
            5,
            1.0,
        );
        stack.push(
            Some(
                AmbientProfile::new("Low")
                    .with_layer(AmbientLayer::new("rain", 0.9).one_shot().with_priority(8))
                    .shared(),
            ),
            0,
            1.0,
        );

        let (state, _) = aggregate(&stack, &catalog);
        let rain = state.get("rain").unwrap();
        assert!((rain.volume - 0.9).abs() < 1e-6);
        assert_eq!(rain.priority, 5);
        assert_eq!(rain.layer_priority, 8);
        assert!(rain.playback.looping);
        assert!(rain.playback.pitch.is_varied());
    }

    #[test]
    fn test_invalid_layers_skipped_and_reported() {
        let catalog = catalog();
        let mut stack = ProfileStack::new();
        stack.push(
            Some(
                AmbientProfile::new("Broken")
                    .with_layer(AmbientLayer::unassigned(0.5))
                    .with_layer(AmbientLayer::new("ghost", 0.5))
                    .with_layer(AmbientLayer::new("insects", 0.5))
                    .shared(),
            ),
            0,
            1.0,
        );

        let (state, diagnostics) = aggregate(&stack, &catalog);
        assert_eq!(state.len(), 1);
        assert!(state.get("insects").is_some());
        assert_eq!(diagnostics.len(), 2);
        assert!(matches!(diagnostics[0], Diagnostic::MissingTrack { layer_index: 0, .. }));
        assert!(matches!(&diagnostics[1], Diagnostic::UnresolvedTrack { track, .. } if track == "ghost"));
    }

    #[test]
    fn test_first_seen_order() {
        let catalog = catalog();
        let mut stack = ProfileStack::new();
        stack.push(
            Some(
                AmbientProfile::new("A")
                    .with_layer(AmbientLayer::new("rain", 0.5))
                    .with_layer(AmbientLayer::new("wind", 0.5))
                    .shared(),
            ),
            0,
            1.0,
        );
        stack.push(
            Some(AmbientProfile::new("B").with_layer(AmbientLayer::new("insects", 0.5)).shared()),
            0,
            1.0,
        );

        let (state, _) = aggregate(&stack, &catalog);
        let names: Vec<_> = state.iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["rain", "wind", "insects"]);
    }
}
