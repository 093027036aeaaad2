// Top-down follow camera
//
// Camera model:
//   - Orthographic, looking straight down at the XZ ground plane
//   - Screen right is +X, screen down is +Z, so ground points (x, y) read
//     like screen coordinates
//   - Centred on a target point that tracks the player every frame
//   - Mouse wheel zooms in/out

use glam::{Mat4, Vec2, Vec3};
use super::input::InputState;

pub struct FollowCamera {
    /// Ground point at the centre of the screen.
    /// Private: always clamped to bounds in update(). Use target() to read.
    target: Vec2,

    /// Screen pixels per world unit.
    /// Private: always clamped to [min_zoom, max_zoom] in update(). Use zoom() to read.
    zoom: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,

    /// Zoom change (in pixels per unit) per scroll line
    pub zoom_speed: f32,

    /// Height of the eye above the ground; only has to clear everything drawn.
    pub height: f32,

    /// Map bounds: target is clamped to [bounds_min, bounds_max]
    pub bounds_min: Vec2,
    pub bounds_max: Vec2,
}

impl FollowCamera {
    pub fn new(bounds_max: Vec2) -> Self {
        Self {
            target: Vec2::ZERO,
            zoom: 1.0,
            min_zoom: 0.5,
            max_zoom: 3.0,
            zoom_speed: 0.1,
            height: 100.0,
            bounds_min: Vec2::ZERO,
            bounds_max,
        }
    }

    /// Follow `focus` and apply zoom input. Call once per frame before rendering.
    pub fn update(&mut self, input: &InputState, focus: Vec2) {
        self.zoom += input.scroll_delta * self.zoom_speed;
        self.zoom = self.zoom.clamp(self.min_zoom, self.max_zoom);
        self.target = focus.clamp(self.bounds_min, self.bounds_max);
    }

    /// View matrix: looks straight down at the target, -Z toward screen top.
    pub fn view_matrix(&self) -> Mat4 {
        let ground = Vec3::new(self.target.x, 0.0, self.target.y);
        Mat4::look_at_rh(ground + Vec3::Y * self.height, ground, Vec3::NEG_Z)
    }

    /// Orthographic projection covering the window at the current zoom.
    pub fn projection_matrix(&self, screen: Vec2) -> Mat4 {
        let half = screen * 0.5 / self.zoom;
        Mat4::orthographic_rh(-half.x, half.x, -half.y, half.y, 0.1, self.height * 2.0)
    }

    /// Combined view-projection matrix ready to upload to the GPU.
    pub fn view_projection(&self, screen: Vec2) -> Mat4 {
        self.projection_matrix(screen) * self.view_matrix()
    }

    /// Ground point under a cursor position (pixels from the window's top-left).
    pub fn screen_to_ground(&self, cursor: Vec2, screen: Vec2) -> Vec2 {
        self.target + (cursor - screen * 0.5) / self.zoom
    }

    /// Inverse of `screen_to_ground`.
    pub fn ground_to_screen(&self, point: Vec2, screen: Vec2) -> Vec2 {
        (point - self.target) * self.zoom + screen * 0.5
    }

    pub fn target(&self) -> Vec2 { self.target }
    pub fn zoom(&self) -> f32 { self.zoom }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_at(target: Vec2, zoom: f32) -> FollowCamera {
        let mut camera = FollowCamera::new(Vec2::splat(1000.0));
        camera.target = target;
        camera.zoom = zoom;
        camera
    }

    #[test]
    fn screen_centre_is_target() {
        let camera = camera_at(Vec2::new(300.0, 200.0), 2.0);
        let screen = Vec2::new(800.0, 600.0);
        assert_eq!(camera.screen_to_ground(screen * 0.5, screen), Vec2::new(300.0, 200.0));
        assert_eq!(camera.screen_to_ground(Vec2::new(800.0, 600.0), screen), Vec2::new(500.0, 350.0));
        let p = Vec2::new(123.0, 456.0);
        assert!((camera.ground_to_screen(camera.screen_to_ground(p, screen), screen) - p).length() < 1e-3);
    }

    #[test]
    fn projection_agrees_with_screen_mapping() {
        let camera = camera_at(Vec2::new(300.0, 200.0), 1.5);
        let screen = Vec2::new(800.0, 600.0);
        let point = Vec2::new(420.0, 150.0);

        let clip = camera.view_projection(screen) * Vec3::new(point.x, 0.0, point.y).extend(1.0);
        let ndc = clip.truncate() / clip.w;
        let pixel = Vec2::new((ndc.x + 1.0) * 0.5 * screen.x, (1.0 - ndc.y) * 0.5 * screen.y);

        assert!((pixel - camera.ground_to_screen(point, screen)).length() < 1e-2);
    }

    #[test]
    fn update_follows_and_clamps() {
        let mut camera = FollowCamera::new(Vec2::new(640.0, 480.0));
        let mut input = InputState::new();
        input.scroll_delta = 100.0;

        camera.update(&input, Vec2::new(-20.0, 300.0));

        assert_eq!(camera.target(), Vec2::new(0.0, 300.0));
        assert_eq!(camera.zoom(), camera.max_zoom);
    }
}
