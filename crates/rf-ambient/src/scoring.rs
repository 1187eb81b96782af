//! Candidate Scoring & Admission
//!
//! Ranks every candidate against the desired state and admits the top K:
//!
//! ```text
//! score = priority_weight   * max(stack_priority, candidate_priority)
//!       + volume_weight     * desired_volume
//!       + audibility_weight * 1 / (1 + distance_to_listener)
//! ```
//!
//! Candidates whose track is not desired score `-inf` and are never admitted.
//! The default weights make one priority step outweigh any volume difference,
//! and a 0.1 volume difference outweigh any audibility difference.

use crate::desired::DesiredState;
use crate::emitter::{EmitterId, EmitterRegistry, Position3D};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scoring policy weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight of the effective priority
    #[serde(default = "default_priority_weight")]
    pub priority: f32,
    /// Weight of the desired volume (0.0-1.0)
    #[serde(default = "default_volume_weight")]
    pub volume: f32,
    /// Weight of the audibility bonus (0.0-1.0)
    #[serde(default = "default_audibility_weight")]
    pub audibility: f32,
}

fn default_priority_weight() -> f32 {
    1000.0
}
fn default_volume_weight() -> f32 {
    10.0
}
fn default_audibility_weight() -> f32 {
    1.0
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            priority: 1000.0,
            volume: 10.0,
            audibility: 1.0,
        }
    }
}

/// Identifies what a voice is serving
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CandidateKey {
    /// Non-spatial layer, keyed by track name
    Layer(String),
    /// Registered emitter
    Emitter(EmitterId),
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateKey::Layer(track) => write!(f, "layer:{}", track),
            CandidateKey::Emitter(id) => write!(f, "emitter:{}", id),
        }
    }
}

/// Something that may receive a voice
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub key: CandidateKey,
    /// Track the candidate plays
    pub track: String,
    /// Candidate's own priority (layer or emitter)
    pub priority: i32,
    /// World position (emitters only)
    pub position: Option<Position3D>,
}

/// Candidate with its score and the volume it would play at
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub key: CandidateKey,
    pub track: String,
    pub score: f32,
    pub desired_volume: f32,
}

impl ScoredCandidate {
    /// Whether the candidate can be admitted at all
    #[inline]
    pub fn is_eligible(&self) -> bool {
        self.score != f32::NEG_INFINITY
    }
}

/// One candidate per desired track
pub fn layer_candidates(desired: &DesiredState) -> Vec<Candidate> {
    desired
        .iter()
        .map(|d| Candidate {
            key: CandidateKey::Layer(d.name().to_string()),
            track: d.name().to_string(),
            priority: d.layer_priority,
            position: None,
        })
        .collect()
}

/// One candidate per playable emitter, in registration order
pub fn emitter_candidates(emitters: &EmitterRegistry) -> Vec<Candidate> {
    emitters
        .iter()
        .filter_map(|(id, emitter)| {
            Some(Candidate {
                key: CandidateKey::Emitter(id),
                track: emitter.track_name()?.to_string(),
                priority: emitter.priority,
                position: Some(emitter.position),
            })
        })
        .collect()
}

/// Audibility bonus for a positioned candidate. Unmeasurable distances score 0.
#[inline]
pub fn audibility(position: Option<Position3D>, listener: Option<Position3D>) -> f32 {
    match (position, listener) {
        (Some(position), Some(listener)) => {
            let distance = position.distance_to(&listener);
            if distance.is_finite() {
                1.0 / (1.0 + distance)
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Score a single candidate
pub fn score(
    candidate: &Candidate,
    desired: &DesiredState,
    listener: Option<Position3D>,
    weights: &ScoringWeights,
) -> ScoredCandidate {
    let (score, desired_volume) = match desired.get(&candidate.track) {
        None => (f32::NEG_INFINITY, 0.0),
        Some(track) => {
            let priority = track.priority.max(candidate.priority) as f32;
            let score = weights.priority * priority
                + weights.volume * track.volume
                + weights.audibility * audibility(candidate.position, listener);
            // NaN would outrank every real score under total_cmp
            let score = if score.is_nan() { f32::NEG_INFINITY } else { score };
            (score, track.volume)
        }
    };

    ScoredCandidate {
        key: candidate.key.clone(),
        track: candidate.track.clone(),
        score,
        desired_volume,
    }
}

/// Score all candidates, highest first. Ties keep input order.
pub fn rank(
    candidates: &[Candidate],
    desired: &DesiredState,
    listener: Option<Position3D>,
    weights: &ScoringWeights,
) -> Vec<ScoredCandidate> {
    let mut ranked: Vec<ScoredCandidate> = candidates
        .iter()
        .map(|c| score(c, desired, listener, weights))
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

/// Admit the top `budget` eligible candidates from a ranked list.
///
/// With `single_winner_per_track`, a candidate whose track already has an
/// admitted winner is skipped even if it would fit the budget.
pub fn admit(
    ranked: &[ScoredCandidate],
    budget: usize,
    single_winner_per_track: bool,
) -> Vec<ScoredCandidate> {
    let mut admitted: Vec<ScoredCandidate> = Vec::with_capacity(budget);

    for candidate in ranked {
        if admitted.len() >= budget {
            break;
        }
        if !candidate.is_eligible() {
            // Ranked lists put every -inf candidate last
            break;
        }
        if single_winner_per_track && admitted.iter().any(|a| a.track == candidate.track) {
            continue;
        }
        admitted.push(candidate.clone());
    }

    admitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::Emitter;
    use crate::profile::{AmbientLayer, AmbientProfile};
    use crate::stack::ProfileStack;
    use crate::track::{Track, TrackCatalog, TrackLibrary};

    fn desired(layers: &[(&str, f32, i32)]) -> DesiredState {
        let catalog = TrackLibrary::new();
        let mut stack = ProfileStack::new();
        for (track, volume, priority) in layers {
            if !catalog.contains(track) {
                catalog.register(Track::new(track, "")).unwrap();
            }
            stack.push(
                Some(AmbientProfile::new(track).with_layer(AmbientLayer::new(track, *volume)).shared()),
                *priority,
                1.0,
            );
        }
        DesiredState::aggregate(stack.entries(), &catalog, &mut |_| {})
    }

    #[test]
    fn test_priority_dominates_volume() {
        let state = desired(&[("a", 1.0, 0), ("b", 0.3, 5)]);
        let ranked = rank(&layer_candidates(&state), &state, None, &ScoringWeights::default());

        assert_eq!(ranked[0].track, "b");
        let admitted = admit(&ranked, 1, false);
        assert_eq!(admitted.len(), 1);
        assert_eq!(admitted[0].key, CandidateKey::Layer("b".to_string()));
    }

    #[test]
    fn test_undesired_scores_negative_infinity() {
        let state = desired(&[("wind", 0.5, 0)]);
        let candidate = Candidate {
            key: CandidateKey::Layer("rain".to_string()),
            track: "rain".to_string(),
            priority: 100,
            position: None,
        };

        let scored = score(&candidate, &state, None, &ScoringWeights::default());
        assert_eq!(scored.score, f32::NEG_INFINITY);
        assert!(!scored.is_eligible());
        assert!(admit(&[scored], 4, false).is_empty());
    }

    #[test]
    fn test_ties_keep_input_order() {
        let state = desired(&[("a", 0.5, 1), ("b", 0.5, 1), ("c", 0.5, 1)]);
        let ranked = rank(&layer_candidates(&state), &state, None, &ScoringWeights::default());
        let order: Vec<_> = ranked.iter().map(|r| r.track.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_audibility_prefers_closer_emitter() {
        let state = desired(&[("river", 0.8, 0)]);
        let mut emitters = EmitterRegistry::new();
        let far = emitters.register(Emitter::new("river", Position3D::new(40.0, 0.0, 0.0)));
        let near = emitters.register(Emitter::new("river", Position3D::new(2.0, 0.0, 0.0)));

        let listener = Some(Position3D::origin());
        let ranked = rank(
            &emitter_candidates(&emitters),
            &state,
            listener,
            &ScoringWeights::default(),
        );
        assert_eq!(ranked[0].key, CandidateKey::Emitter(near));
        assert_eq!(ranked[1].key, CandidateKey::Emitter(far));
        assert!((audibility(Some(Position3D::new(3.0, 0.0, 0.0)), listener) - 0.25).abs() < 1e-6);
        assert_eq!(audibility(Some(Position3D::origin()), None), 0.0);
    }

    #[test]
    fn test_single_winner_per_track() {
        let state = desired(&[("river", 0.8, 0), ("birds", 0.2, 0)]);
        let mut emitters = EmitterRegistry::new();
        emitters.register(Emitter::new("river", Position3D::new(1.0, 0.0, 0.0)));
        emitters.register(Emitter::new("river", Position3D::new(5.0, 0.0, 0.0)));
        emitters.register(Emitter::new("birds", Position3D::new(9.0, 0.0, 0.0)));

        let ranked = rank(
            &emitter_candidates(&emitters),
            &state,
            Some(Position3D::origin()),
            &ScoringWeights::default(),
        );

        let shared = admit(&ranked, 2, false);
        assert!(shared.iter().all(|a| a.track == "river"));

        let exclusive = admit(&ranked, 2, true);
        let tracks: Vec<_> = exclusive.iter().map(|a| a.track.as_str()).collect();
        assert_eq!(tracks, vec!["river", "birds"]);
    }

    #[test]
    fn test_emitter_priority_raises_score() {
        let state = desired(&[("fire", 0.5, 0)]);
        let mut emitters = EmitterRegistry::new();
        let low = emitters.register(Emitter::new("fire", Position3D::origin()));
        let high = emitters.register(Emitter::new("fire", Position3D::new(30.0, 0.0, 0.0)).with_priority(2));

        let ranked = rank(
            &emitter_candidates(&emitters),
            &state,
            Some(Position3D::origin()),
            &ScoringWeights::default(),
        );
        assert_eq!(ranked[0].key, CandidateKey::Emitter(high));
        assert_eq!(ranked[1].key, CandidateKey::Emitter(low));
    }

    #[test]
    fn test_broken_emitter_position_never_outranks_priority() {
        let state = desired(&[("river", 0.8, 0)]);
        let mut emitters = EmitterRegistry::new();
        let valid = emitters.register(
            Emitter::new("river", Position3D::new(1.0, 0.0, 0.0)).with_priority(10),
        );
        let broken = emitters.register(Emitter::new("river", Position3D::new(f32::NAN, 0.0, 0.0)));

        let listener = Some(Position3D::origin());
        let ranked = rank(
            &emitter_candidates(&emitters),
            &state,
            listener,
            &ScoringWeights::default(),
        );
        assert_eq!(ranked[0].key, CandidateKey::Emitter(valid));
        assert!(ranked.iter().all(|r| !r.score.is_nan()));
        assert_eq!(audibility(Some(Position3D::new(f32::NAN, 0.0, 0.0)), listener), 0.0);
        assert_eq!(audibility(Some(Position3D::new(f32::INFINITY, 0.0, 0.0)), listener), 0.0);

        let admitted = admit(&ranked, 1, false);
        assert_eq!(admitted[0].key, CandidateKey::Emitter(valid));
        assert!(ranked.iter().any(|r| r.key == CandidateKey::Emitter(broken)));
    }

    #[test]
    fn test_nan_weights_are_not_eligible() {
        let state = desired(&[("wind", 0.5, 0)]);
        let weights = ScoringWeights {
            volume: f32::NAN,
            ..ScoringWeights::default()
        };
        let ranked = rank(&layer_candidates(&state), &state, None, &weights);
        assert_eq!(ranked[0].score, f32::NEG_INFINITY);
        assert!(admit(&ranked, 1, false).is_empty());
    }
}
