// Click-to-move path following.
//
// The controller owns the waypoint queue for one agent. It asks a PathQuery
// for a route, then steers the agent one leg at a time, easing speed on the
// final leg so the physics body does not overshoot the goal and leave the
// walkable area.
//
// Everything the controller touches in the outside world goes through the
// PathQuery / SteeringAgent traits, so it runs the same against ECS
// components (see systems.rs) and against test stubs.

use std::collections::VecDeque;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, TAU};

use bevy_ecs::prelude::*;
use glam::Vec2;
use log::{debug, info};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default movement speed in world units per second.
pub const CRUISE_SPEED: f32 = 300.0;
/// A waypoint counts as reached once the agent is closer than this.
pub const ARRIVAL_RADIUS: f32 = 5.0;
/// Final-leg easing starts at this distance from the last waypoint.
pub const EASE_RADIUS: f32 = 50.0;
/// Speed at the outer edge of the easing radius.
pub const EASE_PEAK_SPEED: f32 = 400.0;
/// Speed right on top of the last waypoint.
pub const EASE_FLOOR_SPEED: f32 = 50.0;

// ============================================================================
// COLLABORATORS
// ============================================================================

/// Navigation service: answers route and membership queries on the walkable area.
pub trait PathQuery {
    /// Ordered waypoints from `start` to `end`, excluding `start` itself.
    /// `None` means no route exists.
    fn find_path(&self, start: Vec2, end: Vec2) -> Option<Vec<Vec2>>;

    fn is_point_in_mesh(&self, point: Vec2) -> bool;
}

/// The moving body a `PathFollower` drives.
pub trait SteeringAgent {
    /// False once the agent's physics body is gone. A follower may still get
    /// one more frame tick after teardown; it must then do nothing.
    fn is_alive(&self) -> bool;
    fn position(&self) -> Vec2;
    fn set_velocity(&mut self, velocity: Vec2);
    fn play_animation(&mut self, facing: Facing);
    fn stop_animation(&mut self);
    /// Toggles collision against static obstacles.
    fn set_collision_enabled(&mut self, enabled: bool);
}

// ============================================================================
// FACING
// ============================================================================

/// Coarse walking direction, used to pick a walk cycle.
///
/// Ground-plane `y` grows downward on screen, so `Down` faces the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facing {
    Right,
    Down,
    Left,
    Up,
}

impl Facing {
    /// Bucket a bearing (radians, `atan2(dy, dx)`) into one of four 90° arcs
    /// centred on the axes. Each arc is closed at its lower bound and open at
    /// its upper one, so every finite angle maps to exactly one facing.
    pub fn from_bearing(bearing: f32) -> Option<Facing> {
        if !bearing.is_finite() {
            return None;
        }
        let angle = bearing.rem_euclid(TAU);
        let arc = ((angle + FRAC_PI_4) / FRAC_PI_2).floor() as usize % 4;
        Some([Facing::Right, Facing::Down, Facing::Left, Facing::Up][arc])
    }

    /// Name of the walk cycle for this facing.
    pub fn animation(self) -> &'static str {
        match self {
            Facing::Left => "left-walk",
            Facing::Right => "right-walk",
            Facing::Down => "front-walk",
            Facing::Up => "back-walk",
        }
    }

    /// Unit vector on the ground plane.
    pub fn to_vec2(self) -> Vec2 {
        match self {
            Facing::Right => Vec2::X,
            Facing::Down => Vec2::Y,
            Facing::Left => Vec2::NEG_X,
            Facing::Up => Vec2::NEG_Y,
        }
    }
}

// ============================================================================
// CONFIG
// ============================================================================

/// Per-agent speed and arrival tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringConfig {
    pub cruise_speed: f32,
    pub arrival_radius: f32,
    pub ease_radius: f32,
    pub ease_peak_speed: f32,
    pub ease_floor_speed: f32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            cruise_speed: CRUISE_SPEED,
            arrival_radius: ARRIVAL_RADIUS,
            ease_radius: EASE_RADIUS,
            ease_peak_speed: EASE_PEAK_SPEED,
            ease_floor_speed: EASE_FLOOR_SPEED,
        }
    }
}

impl SteeringConfig {
    /// Speed for a leg `distance` units from its waypoint.
    ///
    /// Intermediate legs always cruise. On the final leg inside the easing
    /// radius, speed falls linearly from `ease_peak_speed` at the radius to
    /// `ease_floor_speed` on the waypoint.
    pub fn speed_for(&self, distance: f32, final_leg: bool) -> f32 {
        if final_leg && self.ease_radius > 0.0 && distance <= self.ease_radius {
            remap(
                distance,
                self.ease_radius,
                0.0,
                self.ease_peak_speed,
                self.ease_floor_speed,
            )
        } else {
            self.cruise_speed
        }
    }
}

/// Linearly map `value` from [from_start, from_end] onto [to_start, to_end].
fn remap(value: f32, from_start: f32, from_end: f32, to_start: f32, to_end: f32) -> f32 {
    (value - from_start) / (from_end - from_start) * (to_end - to_start) + to_start
}

// ============================================================================
// PATH FOLLOWER
// ============================================================================

/// Waypoint queue and steering state for one agent.
#[derive(Component, Debug, Clone, Default)]
pub struct PathFollower {
    /// Waypoints after `current_target`, front first.
    path: VecDeque<Vec2>,
    current_target: Option<Vec2>,
    /// Start point and waypoints of the last request, kept after arrival.
    /// Empty when the last request found no route.
    last_route: Vec<Vec2>,
    pub config: SteeringConfig,
}

impl PathFollower {
    pub fn new(config: SteeringConfig) -> Self {
        Self {
            path: VecDeque::new(),
            current_target: None,
            last_route: Vec::new(),
            config,
        }
    }

    pub fn current_target(&self) -> Option<Vec2> {
        self.current_target
    }

    /// Route returned by the last request, starting at the agent's position.
    pub fn last_route(&self) -> &[Vec2] {
        &self.last_route
    }

    /// Route the agent toward `target`, replacing any path in progress.
    ///
    /// Returns whether a route was found. While a route is being followed
    /// the agent is guided by the path alone, so obstacle collision is off;
    /// without a route it is switched back on. The agent is not moved.
    pub fn request_path<Q, A>(&mut self, query: &Q, agent: &mut A, target: Vec2) -> bool
    where
        Q: PathQuery + ?Sized,
        A: SteeringAgent + ?Sized,
    {
        let start = agent.position();
        let mut path: VecDeque<Vec2> = query.find_path(start, target).unwrap_or_default().into();

        match path.pop_front() {
            Some(first) => {
                info!(
                    "path {:?} -> {:?}: {} waypoint(s)",
                    start,
                    target,
                    path.len() + 1
                );
                self.last_route = [start, first].into_iter().chain(path.iter().copied()).collect();
                self.current_target = Some(first);
                self.path = path;
                agent.set_collision_enabled(false);
                true
            }
            None => {
                info!("no path {:?} -> {:?}", start, target);
                self.last_route.clear();
                self.clear(agent);
                false
            }
        }
    }

    /// Drop the active path and hand the agent back to free movement.
    pub fn cancel<A: SteeringAgent + ?Sized>(&mut self, agent: &mut A) {
        if self.current_target.is_some() {
            debug!("path cancelled with {} waypoint(s) left", self.path.len() + 1);
        }
        self.clear(agent);
    }

    fn clear<A: SteeringAgent + ?Sized>(&mut self, agent: &mut A) {
        self.current_target = None;
        self.path.clear();
        agent.set_collision_enabled(true);
    }

    /// Step the agent along its path. Call once per frame.
    ///
    /// Velocity is rebuilt from zero every call. At most one waypoint is
    /// consumed per call, so repeated calls with zero elapsed time advance
    /// through the queue one waypoint at a time.
    pub fn advance<A: SteeringAgent + ?Sized>(&mut self, agent: &mut A, elapsed_secs: f32) {
        if !agent.is_alive() {
            return;
        }

        agent.set_velocity(Vec2::ZERO);

        let Some(target) = self.current_target else {
            agent.stop_animation();
            return;
        };

        let position = agent.position();
        let mut distance = position.distance(target);

        if distance < self.config.arrival_radius {
            match self.path.pop_front() {
                Some(next) => {
                    debug!("reached {:?}, next {:?} ({} queued)", target, next, self.path.len());
                    self.current_target = Some(next);
                    distance = position.distance(next);
                }
                None => {
                    info!("arrived at {:?}", target);
                    self.current_target = None;
                    agent.set_collision_enabled(true);
                    agent.stop_animation();
                    return;
                }
            }
        }

        let speed = self.config.speed_for(distance, self.path.is_empty());

        if let Some(target) = self.current_target {
            steer(agent, target, speed, elapsed_secs);
        }
    }
}

// ============================================================================
// STEERING
// ============================================================================

/// Point the agent at `target` and set its velocity for this frame.
///
/// Never asks for more speed than it takes to land on `target` within
/// `elapsed_secs`. Plays the walk cycle for the bearing and returns the
/// facing it chose; `None` stops the animation.
pub fn steer<A: SteeringAgent + ?Sized>(
    agent: &mut A,
    target: Vec2,
    max_speed: f32,
    elapsed_secs: f32,
) -> Option<Facing> {
    let offset = target - agent.position();
    let distance = offset.length();
    let bearing = offset.y.atan2(offset.x);

    let reach_speed = if elapsed_secs > 0.0 {
        distance / elapsed_secs
    } else {
        f32::INFINITY
    };
    let magnitude = max_speed.min(reach_speed);

    let facing = Facing::from_bearing(bearing);
    match facing {
        Some(facing) => agent.play_animation(facing),
        None => agent.stop_animation(),
    }

    agent.set_velocity(Vec2::from_angle(bearing) * magnitude);
    facing
}
