// Core ECS components for the engine
// Navigation runs on the XZ ground plane: a ground point (x, y) sits at
// world (x, 0, y).

use bevy_ecs::prelude::*;
use glam::{Vec2, Vec3};

use super::steering::Facing;

/// Position of an entity in 3D space
#[derive(Component, Debug, Clone, Copy)]
pub struct Transform {
    pub position: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position }
    }

    pub fn from_ground(point: Vec2) -> Self {
        Self::from_position(Vec3::new(point.x, 0.0, point.y))
    }

    /// Position projected onto the ground plane.
    pub fn ground(&self) -> Vec2 {
        Vec2::new(self.position.x, self.position.z)
    }
}

/// RGB color for rendering
#[derive(Component, Debug, Clone, Copy)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// Velocity of an entity in 3D space (units per second)
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Velocity {
    pub linear: Vec3,
}

impl Velocity {
    pub fn set_ground(&mut self, velocity: Vec2) {
        self.linear = Vec3::new(velocity.x, 0.0, velocity.y);
    }

    pub fn ground(&self) -> Vec2 {
        Vec2::new(self.linear.x, self.linear.z)
    }
}

/// Physics body. Removing it tears the entity out of the simulation;
/// systems that still hold the entity treat it as gone.
#[derive(Component, Debug, Clone, Copy)]
pub struct Body {
    /// Half the side of the body's square footprint, in world units.
    pub half_extent: f32,
}

/// Collision against static obstacles (wall tiles).
///
/// Switched off while the entity follows a path: the path already keeps it
/// on walkable tiles, and colliding would snag it on wall corners.
#[derive(Component, Debug, Clone, Copy)]
pub struct ObstacleCollider {
    pub active: bool,
}

impl Default for ObstacleCollider {
    fn default() -> Self {
        Self { active: true }
    }
}

/// Walk-cycle state. `facing` is kept after the cycle stops so the idle
/// pose still faces the last walking direction.
#[derive(Component, Debug, Clone, Copy)]
pub struct WalkAnimation {
    pub facing: Facing,
    pub playing: bool,
}

impl Default for WalkAnimation {
    fn default() -> Self {
        Self {
            facing: Facing::Down,
            playing: false,
        }
    }
}

impl WalkAnimation {
    pub fn play(&mut self, facing: Facing) {
        self.facing = facing;
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Name of the running walk cycle, if any.
    pub fn clip(&self) -> Option<&'static str> {
        self.playing.then(|| self.facing.animation())
    }
}

/// Marks the entity driven by mouse clicks and arrow keys.
#[derive(Component, Debug, Clone, Copy)]
pub struct Player;
