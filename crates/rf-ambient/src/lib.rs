//! # Ambient Bus
//!
//! Ambient-sound voice allocation and mixing for game worlds.
//!
//! ## Architecture
//!
//! - **Tracks**: Loopable audio resources resolved through a [`TrackCatalog`]
//! - **Profiles**: Named recipes of layers ("Forest" = wind + insects)
//! - **Stack**: Token-addressed bag of active profiles with caller priorities
//! - **Desired state**: Per-track `(volume, priority)` folded from the stack
//! - **Scoring**: Ranks layers or positioned emitters and admits the top K
//! - **Voices**: Fixed pool of playback channels, rebound only when silent
//! - **Fades**: Per-voice ramps stepped by `tick(dt)`
//!
//! ## Timeline
//!
//! The bus is stepped once per frame by the host clock. All mutating calls are
//! expected on that same timeline; they return immediately and their audible
//! effect unfolds over the following ticks.

pub mod bus;
pub mod config;
pub mod desired;
pub mod diagnostics;
pub mod emitter;
pub mod fade;
pub mod listener;
pub mod profile;
pub mod scoring;
pub mod stack;
pub mod track;
pub mod voice;

pub use bus::*;
pub use config::*;
pub use desired::*;
pub use diagnostics::*;
pub use emitter::*;
pub use fade::*;
pub use listener::*;
pub use profile::*;
pub use scoring::*;
pub use stack::*;
pub use track::*;
pub use voice::*;

use thiserror::Error;

/// Ambient bus error types
#[derive(Debug, Error)]
pub enum AmbientError {
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    #[error("Duplicate track name: {0}")]
    DuplicateTrack(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Profile error: {0}")]
    ProfileError(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type AmbientResult<T> = Result<T, AmbientError>;

/// Lowest pitch multiplier a layer may request
pub const MIN_PITCH: f32 = 0.01;

/// Upper bound on voices a single bus may own
pub const MAX_VOICES: usize = 64;

/// Default capacity of the diagnostics ring buffer
pub const DIAGNOSTICS_CAPACITY: usize = 64;
