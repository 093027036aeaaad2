// Tile-based navigation service for click-to-move.
//
// Layer 1: NavigationGrid: static walkability per tile.
// Layer 2: FlowField: BFS integration field + gradient directions toward
//          one goal.
// Layer 3: find_path: walks the gradient from the start tile, then pulls
//          the corridor taut with line-of-sight checks so the follower gets
//          a handful of corner waypoints instead of one per tile.

use glam::{IVec2, UVec2, Vec2};
use std::collections::VecDeque;

use super::steering::PathQuery;

// ============================================================================
// CONSTANTS
// ============================================================================

/// World units per tile edge.
pub const TILE_SIZE: f32 = 32.0;
/// Boundary crossings closer than this (in segment parameter space) count
/// as passing through a cell corner.
const CORNER_EPSILON: f32 = 1e-6;

// ============================================================================
// NAVIGATION GRID
// ============================================================================

/// Static tile walkability.
///
/// Tile (cx, cy) covers [cx * cell_size, (cx + 1) * cell_size) on X and the
/// same on Y, with the origin in the top-left corner of the map.
#[derive(Debug, Clone)]
pub struct NavigationGrid {
    /// True if units can walk through this cell.
    pub walkable: Vec<bool>,
    pub width: u32,
    pub height: u32,
    pub cell_size: f32,
}

impl NavigationGrid {
    /// Fully open grid, all cells walkable.
    pub fn new_open(width: u32, height: u32, cell_size: f32) -> Self {
        Self {
            walkable: vec![true; (width * height) as usize],
            width,
            height,
            cell_size,
        }
    }

    /// Convert a ground-plane position to the grid cell that contains it.
    /// Returns `None` if the position is outside the grid.
    pub fn world_to_cell(&self, pos: Vec2) -> Option<UVec2> {
        let x = pos.x / self.cell_size;
        let y = pos.y / self.cell_size;
        if !(x >= 0.0 && y >= 0.0) {
            return None;
        }
        let cx = x as u32;
        let cy = y as u32;
        if cx >= self.width || cy >= self.height {
            return None;
        }
        Some(UVec2::new(cx, cy))
    }

    /// Like `world_to_cell` but clamps to grid bounds instead of returning None.
    pub fn world_to_cell_clamped(&self, pos: Vec2) -> UVec2 {
        let cx = (pos.x / self.cell_size).max(0.0) as u32;
        let cy = (pos.y / self.cell_size).max(0.0) as u32;
        UVec2::new(cx.min(self.width - 1), cy.min(self.height - 1))
    }

    /// Ground-plane centre of a grid cell.
    pub fn cell_center(&self, cell: UVec2) -> Vec2 {
        (cell.as_vec2() + Vec2::splat(0.5)) * self.cell_size
    }

    /// Size of the whole map in world units.
    pub fn world_size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32) * self.cell_size
    }

    #[inline]
    fn idx(&self, cell: UVec2) -> usize {
        (cell.y * self.width + cell.x) as usize
    }

    pub fn is_walkable(&self, cell: UVec2) -> bool {
        self.walkable[self.idx(cell)]
    }

    pub fn set_walkable(&mut self, cell: UVec2, walkable: bool) {
        let idx = self.idx(cell);
        self.walkable[idx] = walkable;
    }

    /// True if `pos` lies on the map inside a walkable cell.
    pub fn is_point_walkable(&self, pos: Vec2) -> bool {
        self.world_to_cell(pos)
            .is_some_and(|cell| self.is_walkable(cell))
    }

    /// True if the straight segment `from → to` stays on walkable cells.
    ///
    /// Walks every cell the segment touches. A segment passing exactly
    /// through a cell corner needs both cells beside the corner open.
    pub fn line_of_sight(&self, from: Vec2, to: Vec2) -> bool {
        let (Some(start), Some(end)) = (self.world_to_cell(from), self.world_to_cell(to)) else {
            return false;
        };
        if !self.is_walkable(start) {
            return false;
        }

        let open = |cell: IVec2| {
            cell.x >= 0
                && cell.y >= 0
                && cell.x < self.width as i32
                && cell.y < self.height as i32
                && self.is_walkable(cell.as_uvec2())
        };

        let delta = to - from;
        let step = IVec2::new(axis_step(delta.x), axis_step(delta.y));
        // Parametric distance (0..1 along the segment) to the next cell
        // boundary on each axis, and between successive boundaries.
        let boundary = |pos: f32, cell: u32, step: i32, delta: f32| match step {
            1 => ((cell + 1) as f32 * self.cell_size - pos) / delta,
            -1 => (cell as f32 * self.cell_size - pos) / delta,
            _ => f32::INFINITY,
        };
        let mut t_max = Vec2::new(
            boundary(from.x, start.x, step.x, delta.x),
            boundary(from.y, start.y, step.y, delta.y),
        );
        let t_delta = Vec2::new(
            if step.x != 0 { self.cell_size / delta.x.abs() } else { f32::INFINITY },
            if step.y != 0 { self.cell_size / delta.y.abs() } else { f32::INFINITY },
        );

        let mut cell = start.as_ivec2();
        let target = end.as_ivec2();
        for _ in 0..=self.width + self.height {
            if cell == target {
                return true;
            }
            if (t_max.x - t_max.y).abs() < CORNER_EPSILON {
                if !open(cell + IVec2::new(step.x, 0)) || !open(cell + IVec2::new(0, step.y)) {
                    return false;
                }
                cell += step;
                t_max += t_delta;
            } else if t_max.x < t_max.y {
                cell.x += step.x;
                t_max.x += t_delta.x;
            } else {
                cell.y += step.y;
                t_max.y += t_delta.y;
            }
            if !open(cell) {
                return false;
            }
        }
        false
    }

    /// Iterator over every cell with its walkability, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (UVec2, bool)> + '_ {
        self.walkable.iter().enumerate().map(|(i, &walkable)| {
            let i = i as u32;
            (UVec2::new(i % self.width, i / self.width), walkable)
        })
    }
}

// ============================================================================
// FLOW FIELD
// ============================================================================

/// Pre-computed per-cell movement directions toward a single goal.
pub struct FlowField {
    /// Normalized direction each cell should move in to reach the goal.
    /// Vec2::ZERO means "at goal" or "unreachable".
    pub directions: Vec<Vec2>,

    /// BFS distance to goal in grid steps. `u32::MAX` = unreachable.
    pub integration: Vec<u32>,

    pub width: u32,
    pub height: u32,
    pub goal_cell: UVec2,
}

impl FlowField {
    /// Sample the flow direction for a given grid cell.
    #[inline]
    pub fn sample_cell(&self, cell: UVec2) -> Vec2 {
        let idx = (cell.y * self.width + cell.x) as usize;
        self.directions.get(idx).copied().unwrap_or(Vec2::ZERO)
    }

    /// Step count from `cell` to the goal, `None` if unreachable.
    #[inline]
    pub fn cost(&self, cell: UVec2) -> Option<u32> {
        let idx = (cell.y * self.width + cell.x) as usize;
        self.integration
            .get(idx)
            .copied()
            .filter(|&cost| cost != u32::MAX)
    }

    /// Follow the gradient from `start` to the goal, returning every cell
    /// visited after `start` (the goal cell last). `None` if `start` cannot
    /// reach the goal.
    pub fn trace(&self, start: UVec2) -> Option<Vec<UVec2>> {
        self.cost(start)?;
        let mut cells = Vec::new();
        let mut cell = start;
        // Each step strictly lowers the cost, so the walk ends within
        // `cost(start)` steps; the bound only guards a malformed field.
        for _ in 0..self.width * self.height {
            if cell == self.goal_cell {
                return Some(cells);
            }
            let dir = self.sample_cell(cell);
            let step = IVec2::new(dir.x.round() as i32, dir.y.round() as i32);
            if step == IVec2::ZERO {
                return None;
            }
            cell = (cell.as_ivec2() + step).as_uvec2();
            cells.push(cell);
        }
        None
    }
}

// ============================================================================
// FLOWFIELD COMPUTATION
// ============================================================================

/// Compute a flowfield for the given goal position.
///
/// 1. BFS (4-connected) from goal outward, building an integration field.
/// 2. Gradient pass: for each cell, find the 8-connected neighbor with the
///    smallest integration value and point toward it. Diagonals are only
///    taken when both adjacent cardinals are walkable, so directions never
///    squeeze between two touching walls.
pub fn compute_flowfield(grid: &NavigationGrid, goal: Vec2) -> FlowField {
    let goal_cell = grid.world_to_cell_clamped(goal);
    let size = (grid.width * grid.height) as usize;
    let mut integration = vec![u32::MAX; size];
    let mut queue = VecDeque::new();

    let goal_idx = grid.idx(goal_cell);
    if grid.walkable[goal_idx] {
        integration[goal_idx] = 0;
        queue.push_back(goal_cell);
    }

    while let Some(pos) = queue.pop_front() {
        let pos_cost = integration[grid.idx(pos)];
        for nb in cardinal_neighbors(pos, grid.width, grid.height) {
            let ni = grid.idx(nb);
            if grid.walkable[ni] && integration[ni] == u32::MAX {
                integration[ni] = pos_cost + 1;
                queue.push_back(nb);
            }
        }
    }

    let mut directions = vec![Vec2::ZERO; size];
    for cy in 0..grid.height {
        for cx in 0..grid.width {
            let pos = UVec2::new(cx, cy);
            let idx = grid.idx(pos);
            let cost = integration[idx];
            if cost == u32::MAX || cost == 0 {
                continue;
            }

            let mut best_cost = cost;
            let mut best_dir = Vec2::ZERO;

            for nb in all_neighbors(pos, grid) {
                let nb_cost = integration[grid.idx(nb)];
                if nb_cost < best_cost {
                    best_cost = nb_cost;
                    best_dir = (nb.as_vec2() - pos.as_vec2()).normalize();
                }
            }

            directions[idx] = best_dir;
        }
    }

    FlowField {
        directions,
        integration,
        width: grid.width,
        height: grid.height,
        goal_cell,
    }
}

// ============================================================================
// PATH QUERY
// ============================================================================

impl NavigationGrid {
    /// Greedy string-pulling: from each anchor, jump to the furthest corridor
    /// point still in direct sight.
    fn smooth(&self, start: Vec2, corridor: &[Vec2]) -> Vec<Vec2> {
        let mut waypoints = Vec::new();
        let mut anchor = start;
        let mut i = 0;
        while i < corridor.len() {
            let mut furthest = i;
            for j in (i + 1..corridor.len()).rev() {
                if self.line_of_sight(anchor, corridor[j]) {
                    furthest = j;
                    break;
                }
            }
            anchor = corridor[furthest];
            waypoints.push(anchor);
            i = furthest + 1;
        }
        waypoints
    }
}

impl PathQuery for NavigationGrid {
    fn find_path(&self, start: Vec2, end: Vec2) -> Option<Vec<Vec2>> {
        let start_cell = self.world_to_cell(start).filter(|&c| self.is_walkable(c))?;
        let end_cell = self.world_to_cell(end).filter(|&c| self.is_walkable(c))?;

        if start_cell == end_cell || self.line_of_sight(start, end) {
            return Some(vec![end]);
        }

        let field = compute_flowfield(self, end);
        debug_assert_eq!(field.goal_cell, end_cell);
        let cells = field.trace(start_cell)?;

        let mut corridor: Vec<Vec2> = cells.iter().map(|&c| self.cell_center(c)).collect();
        if let Some(last) = corridor.last_mut() {
            *last = end;
        }
        Some(self.smooth(start, &corridor))
    }

    fn is_point_in_mesh(&self, point: Vec2) -> bool {
        self.is_point_walkable(point)
    }
}

#[inline]
fn axis_step(delta: f32) -> i32 {
    if delta > 0.0 {
        1
    } else if delta < 0.0 {
        -1
    } else {
        0
    }
}

// ============================================================================
// NEIGHBOR ITERATORS
// ============================================================================

/// The four cardinal grid neighbors of a cell, clamped to bounds.
fn cardinal_neighbors(pos: UVec2, w: u32, h: u32) -> impl Iterator<Item = UVec2> {
    let (x, y) = (pos.x as i32, pos.y as i32);
    let (wi, hi) = (w as i32, h as i32);
    [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
        .into_iter()
        .filter(move |&(nx, ny)| nx >= 0 && ny >= 0 && nx < wi && ny < hi)
        .map(|(nx, ny)| UVec2::new(nx as u32, ny as u32))
}

/// All eight neighbors in bounds. Diagonals need both adjacent cardinals walkable.
fn all_neighbors(pos: UVec2, grid: &NavigationGrid) -> impl Iterator<Item = UVec2> + '_ {
    let (x, y) = (pos.x as i32, pos.y as i32);
    let (wi, hi) = (grid.width as i32, grid.height as i32);
    let open = move |nx: i32, ny: i32| {
        nx >= 0 && ny >= 0 && nx < wi && ny < hi && grid.is_walkable(UVec2::new(nx as u32, ny as u32))
    };
    [
        (-1, -1), (0, -1), (1, -1),
        (-1,  0),          (1,  0),
        (-1,  1), (0,  1), (1,  1),
    ]
    .into_iter()
    .filter(move |&(dx, dy)| {
        let (nx, ny) = (x + dx, y + dy);
        if nx < 0 || ny < 0 || nx >= wi || ny >= hi {
            return false;
        }
        dx == 0 || dy == 0 || (open(x + dx, y) && open(x, y + dy))
    })
    .map(move |(dx, dy)| UVec2::new((x + dx) as u32, (y + dy) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 10x10 tiles of size 10 with a wall along x = 5 and a single gap at y = 8.
    fn walled_grid() -> NavigationGrid {
        let mut grid = NavigationGrid::new_open(10, 10, 10.0);
        for y in 0..10 {
            if y != 8 {
                grid.set_walkable(UVec2::new(5, y), false);
            }
        }
        grid
    }

    fn assert_walkable_route(grid: &NavigationGrid, start: Vec2, route: &[Vec2]) {
        let mut from = start;
        for &to in route {
            assert!(grid.line_of_sight(from, to), "leg {from:?} -> {to:?} crosses a wall");
            from = to;
        }
    }

    #[test]
    fn world_to_cell_bounds() {
        let grid = NavigationGrid::new_open(4, 3, 10.0);
        assert_eq!(grid.world_to_cell(Vec2::new(0.0, 0.0)), Some(UVec2::new(0, 0)));
        assert_eq!(grid.world_to_cell(Vec2::new(39.9, 29.9)), Some(UVec2::new(3, 2)));
        assert_eq!(grid.world_to_cell(Vec2::new(40.0, 5.0)), None);
        assert_eq!(grid.world_to_cell(Vec2::new(-0.1, 5.0)), None);
        assert_eq!(grid.world_to_cell(Vec2::new(f32::NAN, 5.0)), None);
        assert_eq!(grid.world_to_cell_clamped(Vec2::new(-50.0, 500.0)), UVec2::new(0, 2));
        assert_eq!(grid.cell_center(UVec2::new(1, 2)), Vec2::new(15.0, 25.0));
    }

    #[test]
    fn flowfield_costs_route_around_wall() {
        let grid = walled_grid();
        let field = compute_flowfield(&grid, grid.cell_center(UVec2::new(9, 0)));
        assert_eq!(field.cost(UVec2::new(9, 0)), Some(0));
        assert_eq!(field.cost(UVec2::new(5, 0)), None);
        // Down to the gap, across, back up, then east along the top row.
        assert_eq!(field.cost(UVec2::new(4, 0)), Some(8 + 2 + 8 + 3));
    }

    #[test]
    fn trace_reaches_goal_through_gap() {
        let grid = walled_grid();
        let field = compute_flowfield(&grid, grid.cell_center(UVec2::new(9, 0)));
        let cells = field.trace(UVec2::new(0, 0)).unwrap();
        assert_eq!(cells.last(), Some(&UVec2::new(9, 0)));
        assert!(cells.contains(&UVec2::new(5, 8)));
        assert!(cells.iter().all(|&c| grid.is_walkable(c)));
    }

    #[test]
    fn straight_path_in_open_grid_is_single_waypoint() {
        let grid = NavigationGrid::new_open(10, 10, 10.0);
        let end = Vec2::new(95.0, 42.0);
        assert_eq!(grid.find_path(Vec2::new(3.0, 3.0), end), Some(vec![end]));
    }

    #[test]
    fn path_around_wall_ends_at_click_and_stays_walkable() {
        let grid = walled_grid();
        let start = Vec2::new(15.0, 15.0);
        let end = Vec2::new(88.0, 12.0);
        let route = grid.find_path(start, end).unwrap();

        assert!(route.len() >= 2);
        assert_eq!(route.last(), Some(&end));
        assert_walkable_route(&grid, start, &route);
    }

    #[test]
    fn no_path_into_wall_or_sealed_room() {
        let mut grid = walled_grid();
        assert_eq!(grid.find_path(Vec2::new(15.0, 15.0), Vec2::new(55.0, 15.0)), None);
        assert_eq!(grid.find_path(Vec2::new(15.0, 15.0), Vec2::new(-5.0, 15.0)), None);

        grid.set_walkable(UVec2::new(5, 8), false);
        assert_eq!(grid.find_path(Vec2::new(15.0, 15.0), Vec2::new(88.0, 12.0)), None);
    }

    #[test]
    fn no_path_from_outside_the_map() {
        let grid = NavigationGrid::new_open(4, 4, 10.0);
        assert_eq!(grid.find_path(Vec2::new(-10.0, 5.0), Vec2::new(5.0, 5.0)), None);
    }

    #[test]
    fn diagonal_does_not_squeeze_between_touching_walls() {
        // . #
        // # .
        let mut grid = NavigationGrid::new_open(2, 2, 10.0);
        grid.set_walkable(UVec2::new(1, 0), false);
        grid.set_walkable(UVec2::new(0, 1), false);
        assert_eq!(grid.find_path(Vec2::new(5.0, 5.0), Vec2::new(15.0, 15.0)), None);
    }

    #[test]
    fn sight_blocked_by_wall_but_clear_in_open_row() {
        let grid = walled_grid();
        assert!(!grid.line_of_sight(Vec2::new(15.0, 15.0), Vec2::new(85.0, 15.0)));
        assert!(grid.line_of_sight(Vec2::new(5.0, 85.0), Vec2::new(95.0, 85.0)));
        assert!(grid.line_of_sight(Vec2::new(95.0, 85.0), Vec2::new(5.0, 85.0)));
        assert!(grid.line_of_sight(Vec2::new(33.0, 33.0), Vec2::new(33.0, 33.0)));
    }

    #[test]
    fn membership_follows_walkability() {
        let grid = walled_grid();
        assert!(grid.is_point_in_mesh(Vec2::new(15.0, 15.0)));
        assert!(!grid.is_point_in_mesh(Vec2::new(55.0, 15.0)));
        assert!(!grid.is_point_in_mesh(Vec2::new(500.0, 15.0)));
    }
}
