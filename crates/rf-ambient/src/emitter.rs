//! Emitters
//!
//! Positioned ambience candidates for 3D worlds. Each emitter is bound to one
//! track and competes for voices with a distance-weighted score. Emitters
//! register on activation and may disappear at any time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 3D position in world space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Origin position
    pub fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Distance to another point
    pub fn distance_to(&self, other: &Self) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Spatial playback parameters forwarded to the voice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialParams {
    /// Distance at which attenuation begins
    #[serde(default = "default_min_distance")]
    pub min_distance: f32,
    /// Distance beyond which the emitter is inaudible
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
    /// 0.0 = fully 2D, 1.0 = fully 3D
    #[serde(default = "default_spatial_blend")]
    pub spatial_blend: f32,
}

fn default_min_distance() -> f32 {
    1.0
}
fn default_max_distance() -> f32 {
    50.0
}
fn default_spatial_blend() -> f32 {
    1.0
}

impl Default for SpatialParams {
    fn default() -> Self {
        Self {
            min_distance: 1.0,
            max_distance: 50.0,
            spatial_blend: 1.0,
        }
    }
}

/// Emitter identifier (assigned at registration, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmitterId(pub(crate) u32);

impl EmitterId {
    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Positioned ambience source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emitter {
    /// Track name (required to be playable)
    #[serde(default)]
    pub track: Option<String>,
    /// World position
    #[serde(default)]
    pub position: Position3D,
    /// Emitter priority
    #[serde(default)]
    pub priority: i32,
    /// Spatial parameters
    #[serde(default)]
    pub spatial: SpatialParams,
}

impl Emitter {
    pub fn new(track: &str, position: Position3D) -> Self {
        Self {
            track: Some(track.to_string()),
            position,
            priority: 0,
            spatial: SpatialParams::default(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_spatial(mut self, spatial: SpatialParams) -> Self {
        self.spatial = spatial;
        self
    }

    /// Track name, if the emitter is playable
    pub fn track_name(&self) -> Option<&str> {
        self.track.as_deref().filter(|t| !t.is_empty())
    }
}

/// Registered emitters in registration order
#[derive(Debug, Clone, Default)]
pub struct EmitterRegistry {
    emitters: Vec<(EmitterId, Emitter)>,
    next_id: u32,
}

impl EmitterRegistry {
    pub fn new() -> Self {
        Self {
            emitters: Vec::new(),
            next_id: 1,
        }
    }

    /// Register an emitter
    pub fn register(&mut self, emitter: Emitter) -> EmitterId {
        let id = EmitterId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.emitters.push((id, emitter));
        id
    }

    /// Deregister an emitter
    pub fn unregister(&mut self, id: EmitterId) -> Option<Emitter> {
        let index = self.emitters.iter().position(|(e, _)| *e == id)?;
        Some(self.emitters.remove(index).1)
    }

    pub fn get(&self, id: EmitterId) -> Option<&Emitter> {
        self.emitters.iter().find(|(e, _)| *e == id).map(|(_, em)| em)
    }

    pub fn get_mut(&mut self, id: EmitterId) -> Option<&mut Emitter> {
        self.emitters
            .iter_mut()
            .find(|(e, _)| *e == id)
            .map(|(_, em)| em)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmitterId, &Emitter)> {
        self.emitters.iter().map(|(id, em)| (*id, em))
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }
}
