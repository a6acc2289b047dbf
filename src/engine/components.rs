// ECS components and resources shared by the flythrough systems.

use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};

/// World-space pose of an entity. A flythrough writes only these two fields.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Camera forward (-Z) in world space.
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }
}

/// Milliseconds elapsed since the previous logic step.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct FrameDelta {
    pub ms: f32,
}

impl FrameDelta {
    pub fn from_secs(secs: f32) -> Self {
        Self { ms: secs * 1000.0 }
    }
}
