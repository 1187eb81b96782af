//! Diagnostics Channel
//!
//! Configuration defects never interrupt the bus. They are logged and
//! published on a bounded lock-free queue that a host (editor, debug overlay)
//! can drain from any thread.

use crate::emitter::EmitterId;
use crate::stack::StackToken;
use rtrb::{Consumer, Producer, RingBuffer};
use std::fmt;

/// Non-fatal defect observed by the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Push/SetSingle called without a profile
    NullProfile,
    /// Profile has no layers (plays silence)
    EmptyProfile { profile: String },
    /// Layer has no track assigned
    MissingTrack { profile: String, layer_index: usize },
    /// Layer track cannot be resolved by the catalog
    UnresolvedTrack { profile: String, track: String },
    /// Pop called with a token the stack does not hold
    UnknownToken { token: StackToken },
    /// PopProfile called with a profile the stack does not hold
    UnknownProfile { profile: String },
    /// Emitter registered without a track
    EmitterWithoutTrack { emitter: EmitterId },
    /// Emitter track cannot be resolved by the catalog
    UnresolvedEmitterTrack { emitter: EmitterId, track: String },
    /// Emitter registered while the bus plays layers directly
    EmittersIgnored { emitter: EmitterId },
    /// Emitter operation on an unregistered id
    UnknownEmitter { emitter: EmitterId },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NullProfile => write!(f, "push without a profile ignored"),
            Diagnostic::EmptyProfile { profile } => {
                write!(f, "profile '{}' has no layers", profile)
            }
            Diagnostic::MissingTrack {
                profile,
                layer_index,
            } => write!(f, "profile '{}' layer {} has no track", profile, layer_index),
            Diagnostic::UnresolvedTrack { profile, track } => write!(
                f,
                "profile '{}' references unknown track '{}'",
                profile, track
            ),
            Diagnostic::UnknownToken { token } => write!(f, "pop of unknown token {}", token),
            Diagnostic::UnknownProfile { profile } => {
                write!(f, "pop of profile '{}' not on the stack", profile)
            }
            Diagnostic::EmitterWithoutTrack { emitter } => {
                write!(f, "emitter {} has no track", emitter)
            }
            Diagnostic::UnresolvedEmitterTrack { emitter, track } => {
                write!(f, "emitter {} references unknown track '{}'", emitter, track)
            }
            Diagnostic::EmittersIgnored { emitter } => write!(
                f,
                "emitter {} registered while spatial emitters are disabled",
                emitter
            ),
            Diagnostic::UnknownEmitter { emitter } => write!(f, "unknown emitter {}", emitter),
        }
    }
}

/// Logs diagnostics and publishes them to a ring buffer
pub struct DiagnosticSink {
    producer: Producer<Diagnostic>,
    consumer: Option<Consumer<Diagnostic>>,
    dropped: u64,
}

impl DiagnosticSink {
    pub fn new(capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity.max(1));
        Self {
            producer,
            consumer: Some(consumer),
            dropped: 0,
        }
    }

    /// Report a defect. Never blocks; a full queue drops the diagnostic.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        log::warn!("[AmbientBus] {}", diagnostic);
        if self.producer.push(diagnostic).is_err() {
            self.dropped += 1;
            log::debug!("[AmbientBus] Diagnostics queue full ({} dropped)", self.dropped);
        }
    }

    /// Hand out the consuming end (once)
    pub fn take_consumer(&mut self) -> Option<Consumer<Diagnostic>> {
        self.consumer.take()
    }

    /// Diagnostics lost to a full queue
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticSink")
            .field("pending", &self.producer.slots())
            .field("dropped", &self.dropped)
            .finish()
    }
}
