// ECS systems for updating game state
// Systems operate on entities with specific component combinations

use bevy_ecs::prelude::*;
use bevy_ecs::world::Mut;
use glam::Vec2;

use super::components::*;
use super::navigation::NavigationGrid;
use super::steering::{Facing, PathFollower, PathQuery, SteeringAgent, SteeringConfig};

/// Half the side of the player's square footprint.
pub const PLAYER_HALF_EXTENT: f32 = 12.0;

/// Spawn the click-to-move player at `spawn`.
pub fn spawn_player(world: &mut World, spawn: Vec2) -> Entity {
    world
        .spawn((
            Player,
            Transform::from_ground(spawn),
            Velocity::default(),
            Body { half_extent: PLAYER_HALF_EXTENT },
            ObstacleCollider::default(),
            WalkAnimation::default(),
            PathFollower::new(SteeringConfig::default()),
            Color::rgb(0.95, 0.45, 0.55),
        ))
        .id()
}

// ============================================================================
// STEERING AGENT ADAPTER
// ============================================================================

/// One entity's components seen through the `SteeringAgent` capabilities.
struct EcsAgent<'w> {
    alive: bool,
    position: Vec2,
    velocity: Mut<'w, Velocity>,
    animation: Mut<'w, WalkAnimation>,
    collider: Mut<'w, ObstacleCollider>,
}

impl SteeringAgent for EcsAgent<'_> {
    fn is_alive(&self) -> bool {
        self.alive
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity.set_ground(velocity);
    }

    fn play_animation(&mut self, facing: Facing) {
        self.animation.play(facing);
    }

    fn stop_animation(&mut self) {
        self.animation.stop();
    }

    fn set_collision_enabled(&mut self, enabled: bool) {
        self.collider.active = enabled;
    }
}

type AgentQuery = (
    &'static mut PathFollower,
    &'static Transform,
    Has<Body>,
    &'static mut Velocity,
    &'static mut WalkAnimation,
    &'static mut ObstacleCollider,
);

// ============================================================================
// SYSTEMS
// ============================================================================

/// Advance every path follower by one frame.
pub fn follow_path_system(world: &mut World, delta_time: f32) {
    let mut query = world.query::<AgentQuery>();
    for (mut follower, transform, alive, velocity, animation, collider) in query.iter_mut(world) {
        let mut agent = EcsAgent {
            alive,
            position: transform.ground(),
            velocity,
            animation,
            collider,
        };
        follower.advance(&mut agent, delta_time);
    }
}

/// Route the player toward `target`. Returns whether a path was found,
/// or `None` when there is no player.
pub fn request_player_path<Q: PathQuery + ?Sized>(
    world: &mut World,
    navigation: &Q,
    target: Vec2,
) -> Option<bool> {
    let mut query = world.query_filtered::<AgentQuery, With<Player>>();
    let (mut follower, transform, alive, velocity, animation, collider) =
        query.get_single_mut(world).ok()?;
    let mut agent = EcsAgent {
        alive,
        position: transform.ground(),
        velocity,
        animation,
        collider,
    };
    Some(follower.request_path(navigation, &mut agent, target))
}

/// Arrow-key movement for the player. `direction` holds -1/0/1 per axis.
///
/// Any held key cancels the active path and moves at cruise speed with
/// obstacle collision on. Horizontal walk cycles win over vertical ones.
/// Returns false (and does nothing) when no key is held.
pub fn free_move_system(world: &mut World, direction: Vec2) -> bool {
    if direction == Vec2::ZERO {
        return false;
    }
    let facing = if direction.x < 0.0 {
        Facing::Left
    } else if direction.x > 0.0 {
        Facing::Right
    } else if direction.y < 0.0 {
        Facing::Up
    } else {
        Facing::Down
    };

    let mut query = world.query_filtered::<AgentQuery, With<Player>>();
    for (mut follower, transform, alive, velocity, animation, collider) in query.iter_mut(world) {
        let mut agent = EcsAgent {
            alive,
            position: transform.ground(),
            velocity,
            animation,
            collider,
        };
        if !agent.is_alive() {
            continue;
        }
        follower.cancel(&mut agent);
        agent.set_velocity(direction.normalize() * follower.config.cruise_speed);
        agent.play_animation(facing);
    }
    true
}

/// Update entity positions based on velocity
/// Runs every frame, applies velocity * delta_time to position.
///
/// Bodies with an active obstacle collider move one axis at a time and
/// stop on an axis that would push them further into wall tiles, so they
/// slide along walls instead of sticking to them.
pub fn movement_system(world: &mut World, grid: &NavigationGrid, delta_time: f32) {
    let mut query = world.query::<(
        &mut Transform,
        &Velocity,
        Option<&Body>,
        Option<&ObstacleCollider>,
    )>();
    for (mut transform, velocity, body, collider) in query.iter_mut(world) {
        let half_extent = match (body, collider) {
            (Some(body), Some(collider)) if collider.active => body.half_extent,
            _ => {
                transform.position += velocity.linear * delta_time;
                continue;
            }
        };

        let step = velocity.ground() * delta_time;
        let mut pos = transform.ground();
        for axis_step in [Vec2::new(step.x, 0.0), Vec2::new(0.0, step.y)] {
            if axis_step == Vec2::ZERO {
                continue;
            }
            let next = pos + axis_step;
            if blocked_corners(grid, next, half_extent) <= blocked_corners(grid, pos, half_extent) {
                pos = next;
            }
        }
        transform.position.x = pos.x;
        transform.position.z = pos.y;
    }
}

/// How many corners of a square footprint sit outside walkable tiles.
fn blocked_corners(grid: &NavigationGrid, center: Vec2, half_extent: f32) -> usize {
    [
        Vec2::new(-half_extent, -half_extent),
        Vec2::new(half_extent, -half_extent),
        Vec2::new(-half_extent, half_extent),
        Vec2::new(half_extent, half_extent),
    ]
    .into_iter()
    .filter(|&corner| !grid.is_point_walkable(center + corner))
    .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::steering::tests::StubQuery;
    use crate::engine::tilemap::TileMap;
    use glam::{UVec2, Vec3};

    const FRAME: f32 = 1.0 / 60.0;

    fn room() -> TileMap {
        TileMap::parse(
            &[
                "##########",
                "#S.......#",
                "#........#",
                "#...#....#",
                "#...#....#",
                "#........#",
                "##########",
            ],
            32.0,
        )
        .unwrap()
    }

    fn player(world: &mut World) -> Entity {
        world.query_filtered::<Entity, With<Player>>().single(world)
    }

    fn ground(world: &World, entity: Entity) -> Vec2 {
        world.get::<Transform>(entity).unwrap().ground()
    }

    #[test]
    fn movement_integrates_velocity() {
        let mut world = World::new();
        let grid = NavigationGrid::new_open(4, 4, 32.0);
        let entity = world
            .spawn((Transform::from_ground(Vec2::new(10.0, 10.0)), Velocity { linear: Vec3::new(60.0, 0.0, -30.0) }))
            .id();

        movement_system(&mut world, &grid, 0.5);

        assert_eq!(ground(&world, entity), Vec2::new(40.0, -5.0));
    }

    #[test]
    fn active_collider_stops_at_wall_and_slides() {
        let map = room();
        let mut world = World::new();
        let entity = spawn_player(&mut world, Vec2::new(96.0, 112.0));
        // Heading left and down into the left border wall (x < 32).
        world.get_mut::<Velocity>(entity).unwrap().set_ground(Vec2::new(-300.0, 60.0));

        for _ in 0..120 {
            movement_system(&mut world, &map.grid, FRAME);
        }

        let pos = ground(&world, entity);
        assert!(pos.x - PLAYER_HALF_EXTENT >= 32.0, "entered the wall: {pos:?}");
        assert!(pos.y > 112.0, "did not slide: {pos:?}");
    }

    #[test]
    fn inactive_collider_passes_through_walls() {
        let map = room();
        let mut world = World::new();
        let entity = spawn_player(&mut world, Vec2::new(96.0, 80.0));
        world.get_mut::<ObstacleCollider>(entity).unwrap().active = false;
        world.get_mut::<Velocity>(entity).unwrap().set_ground(Vec2::new(-300.0, 0.0));

        movement_system(&mut world, &map.grid, 0.25);

        assert_eq!(ground(&world, entity), Vec2::new(21.0, 80.0));
    }

    #[test]
    fn overlapping_body_can_back_out() {
        let map = room();
        let mut world = World::new();
        // Straddling the left border wall.
        let entity = spawn_player(&mut world, Vec2::new(36.0, 80.0));
        world.get_mut::<Velocity>(entity).unwrap().set_ground(Vec2::new(300.0, 0.0));

        movement_system(&mut world, &map.grid, FRAME);

        assert!(ground(&world, entity).distance(Vec2::new(41.0, 80.0)) < 1e-3);
    }

    #[test]
    fn click_route_walks_around_pillar_and_arrives() {
        let map = room();
        let mut world = World::new();
        spawn_player(&mut world, Vec2::new(112.0, 112.0));
        let entity = player(&mut world);
        let target = map.grid.cell_center(UVec2::new(6, 4));

        assert_eq!(request_player_path(&mut world, &map.grid, target), Some(true));
        assert!(!world.get::<ObstacleCollider>(entity).unwrap().active);

        let mut frames = 0;
        while world.get::<PathFollower>(entity).unwrap().current_target().is_some() {
            follow_path_system(&mut world, FRAME);
            movement_system(&mut world, &map.grid, FRAME);
            frames += 1;
            assert!(frames < 600);
        }

        assert!(ground(&world, entity).distance(target) < 5.0);
        assert!(world.get::<ObstacleCollider>(entity).unwrap().active);
        follow_path_system(&mut world, FRAME);
        assert_eq!(world.get::<WalkAnimation>(entity).unwrap().clip(), None);
        assert_eq!(world.get::<Velocity>(entity).unwrap().ground(), Vec2::ZERO);
    }

    #[test]
    fn unreachable_click_keeps_collision_on() {
        let map = room();
        let mut world = World::new();
        spawn_player(&mut world, map.spawn);
        let entity = player(&mut world);

        let found = request_player_path(&mut world, &map.grid, map.grid.cell_center(UVec2::new(4, 3)));

        assert_eq!(found, Some(false));
        assert!(world.get::<ObstacleCollider>(entity).unwrap().active);
        assert!(world.get::<PathFollower>(entity).unwrap().current_target().is_none());
    }

    #[test]
    fn request_without_player_is_none() {
        let mut world = World::new();
        let query = StubQuery::new(Some(vec![Vec2::ONE]));
        assert_eq!(request_player_path(&mut world, &query, Vec2::ONE), None);
        assert!(query.asked.borrow().is_empty());
    }

    #[test]
    fn follower_without_body_is_skipped() {
        let mut world = World::new();
        let entity = spawn_player(&mut world, Vec2::ZERO);
        let query = StubQuery::new(Some(vec![Vec2::new(100.0, 0.0)]));
        request_player_path(&mut world, &query, Vec2::new(100.0, 0.0));
        world.entity_mut(entity).remove::<Body>();
        world.get_mut::<Velocity>(entity).unwrap().set_ground(Vec2::new(1.0, 2.0));

        follow_path_system(&mut world, FRAME);

        assert_eq!(world.get::<Velocity>(entity).unwrap().ground(), Vec2::new(1.0, 2.0));
        assert!(world.get::<PathFollower>(entity).unwrap().current_target().is_some());
    }

    #[test]
    fn arrow_keys_cancel_path_and_walk() {
        let mut world = World::new();
        let entity = spawn_player(&mut world, Vec2::ZERO);
        let query = StubQuery::new(Some(vec![Vec2::new(100.0, 0.0)]));
        request_player_path(&mut world, &query, Vec2::new(100.0, 0.0));

        assert!(free_move_system(&mut world, Vec2::new(-1.0, 1.0)));

        assert!(world.get::<PathFollower>(entity).unwrap().current_target().is_none());
        assert!(world.get::<ObstacleCollider>(entity).unwrap().active);
        let velocity = world.get::<Velocity>(entity).unwrap().ground();
        assert!((velocity.length() - 300.0).abs() < 1e-3);
        assert!(velocity.x < 0.0 && velocity.y > 0.0);
        assert_eq!(world.get::<WalkAnimation>(entity).unwrap().clip(), Some("left-walk"));

        free_move_system(&mut world, Vec2::new(0.0, -1.0));
        assert_eq!(world.get::<WalkAnimation>(entity).unwrap().clip(), Some("back-walk"));
    }

    #[test]
    fn no_arrow_keys_is_a_no_op() {
        let mut world = World::new();
        let entity = spawn_player(&mut world, Vec2::ZERO);
        world.get_mut::<Velocity>(entity).unwrap().set_ground(Vec2::X);
        assert!(!free_move_system(&mut world, Vec2::ZERO));
        assert_eq!(world.get::<Velocity>(entity).unwrap().ground(), Vec2::X);
    }
}
