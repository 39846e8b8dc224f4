//! The two capabilities the core needs from geometry and rendering code.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Stable opaque reference to an object owned by the world layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(u64);

impl Handle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Nearest object hit by the forward probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub handle: Handle,
    pub distance: f32,
}

pub trait WorldQuery {
    /// Casts a ray of `max_distance` from the player's eye and returns the
    /// nearest object accepted by `filter`.
    fn pick_forward(&self, max_distance: f32, filter: &dyn Fn(Handle) -> bool) -> Option<PickHit>;

    /// Parent of `handle` in the world's own hierarchy.
    fn parent_of(&self, handle: Handle) -> Option<Handle>;
}

/// Visual focus feedback.
pub trait Highlighter: Send + Sync {
    fn add(&self, handle: Handle, color: Vec3);
    fn remove(&self, handle: Handle);
}

/// Highlighter for sessions without a renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHighlight;

impl Highlighter for NoHighlight {
    fn add(&self, _handle: Handle, _color: Vec3) {}
    fn remove(&self, _handle: Handle) {}
}
