//! Listener position sources
//!
//! Only emitter audibility scoring reads the listener. A missing listener is
//! a transient absence: every emitter simply gets no audibility bonus.

use crate::emitter::Position3D;
use parking_lot::RwLock;
use std::sync::Arc;

/// Supplies the current listener position
pub trait ListenerProvider {
    fn listener_position(&self) -> Option<Position3D>;
}

/// No listener in the world
#[derive(Debug, Clone, Copy, Default)]
pub struct NoListener;

impl ListenerProvider for NoListener {
    fn listener_position(&self) -> Option<Position3D> {
        None
    }
}

/// Fixed listener position
impl ListenerProvider for Position3D {
    fn listener_position(&self) -> Option<Position3D> {
        Some(*self)
    }
}

/// Listener position written by the camera/controller, read by the bus
#[derive(Debug, Clone, Default)]
pub struct SharedListener {
    position: Arc<RwLock<Option<Position3D>>>,
}

impl SharedListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the listener (None = no listener)
    pub fn set(&self, position: Option<Position3D>) {
        *self.position.write() = position;
    }
}

impl ListenerProvider for SharedListener {
    fn listener_position(&self) -> Option<Position3D> {
        *self.position.read()
    }
}
