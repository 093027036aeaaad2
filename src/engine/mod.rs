// Engine module - reusable game engine components
// Navigation and steering are independent of rendering; the host wires them
// to the ECS world through systems.rs.

pub mod camera;
pub mod components;
pub mod debug_overlay;
pub mod input;
pub mod navigation;
pub mod steering;
pub mod systems;
pub mod tilemap;

// Re-export commonly used items
pub use components::*;
