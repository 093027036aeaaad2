// ASCII tile layouts for the demo map.
//
// One character per tile, one string per row:
//   '.'  floor        '#'  wall (collides, not walkable)
//   'S'  floor with the player spawn point on it

use glam::{UVec2, Vec2};
use thiserror::Error;

use super::navigation::NavigationGrid;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("tile layout has no rows")]
    Empty,
    #[error("row {row} is {found} tiles wide, expected {expected}")]
    RaggedRow { row: usize, expected: usize, found: usize },
    #[error("unknown tile '{glyph}' at column {col}, row {row}")]
    UnknownTile { glyph: char, col: usize, row: usize },
    #[error("tile layout has no spawn point")]
    MissingSpawn,
    #[error("tile layout has more than one spawn point")]
    DuplicateSpawn,
}

/// A parsed tile layout: walkability plus the spawn point.
#[derive(Debug, Clone)]
pub struct TileMap {
    pub grid: NavigationGrid,
    /// Spawn tile centre on the ground plane.
    pub spawn: Vec2,
}

impl TileMap {
    pub fn parse(rows: &[&str], tile_size: f32) -> Result<Self, GridError> {
        let width = rows.first().ok_or(GridError::Empty)?.chars().count();
        if width == 0 {
            return Err(GridError::Empty);
        }

        let mut grid = NavigationGrid::new_open(width as u32, rows.len() as u32, tile_size);
        let mut spawn = None;

        for (row, line) in rows.iter().enumerate() {
            let found = line.chars().count();
            if found != width {
                return Err(GridError::RaggedRow { row, expected: width, found });
            }
            for (col, glyph) in line.chars().enumerate() {
                let cell = UVec2::new(col as u32, row as u32);
                match glyph {
                    '.' => {}
                    '#' => grid.set_walkable(cell, false),
                    'S' => {
                        if spawn.replace(cell).is_some() {
                            return Err(GridError::DuplicateSpawn);
                        }
                    }
                    _ => return Err(GridError::UnknownTile { glyph, col, row }),
                }
            }
        }

        let spawn = spawn.ok_or(GridError::MissingSpawn)?;
        Ok(Self {
            spawn: grid.cell_center(spawn),
            grid,
        })
    }
}

/// The town map walked around in the demo.
pub const TOWN: &[&str] = &[
    "########################################",
    "#......................#...............#",
    "#..####.....######.....#....######.....#",
    "#..#..#.....#....#.....#....#....#.....#",
    "#..#..#.....#....#..........#....#.....#",
    "#..##.#.....##.###.....#....###.##.....#",
    "#......................#...............#",
    "#......................#######.#########",
    "#####.######...........................#",
    "#...........#..........................#",
    "#...........#.......#######............#",
    "#....S......#.......#.....#.....####...#",
    "#...........#.......#.....#.....#..#...#",
    "#...........#.......###.###.....#..#...#",
    "#......................................#",
    "#######.##########..............######.#",
    "#................#..............#......#",
    "#................#......####....#......#",
    "#....######......#......#..#....#......#",
    "#....#....#.............#..#...........#",
    "#....#....#......#......####....#......#",
    "#....##.###......#..............#......#",
    "#................#..............########",
    "#................#.....................#",
    "########################################",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_walls_and_spawn() {
        let map = TileMap::parse(&["###", "#S.", "###"], 10.0).unwrap();
        assert_eq!(map.grid.width, 3);
        assert_eq!(map.grid.height, 3);
        assert_eq!(map.spawn, Vec2::new(15.0, 15.0));
        assert!(map.grid.is_walkable(UVec2::new(1, 1)));
        assert!(map.grid.is_walkable(UVec2::new(2, 1)));
        assert!(!map.grid.is_walkable(UVec2::new(0, 1)));
    }

    #[test]
    fn rejects_bad_layouts() {
        assert_eq!(TileMap::parse(&[], 1.0).unwrap_err(), GridError::Empty);
        assert_eq!(TileMap::parse(&[""], 1.0).unwrap_err(), GridError::Empty);
        assert_eq!(
            TileMap::parse(&["S..", ".."], 1.0).unwrap_err(),
            GridError::RaggedRow { row: 1, expected: 3, found: 2 }
        );
        assert_eq!(
            TileMap::parse(&["S.x"], 1.0).unwrap_err(),
            GridError::UnknownTile { glyph: 'x', col: 2, row: 0 }
        );
        assert_eq!(TileMap::parse(&["..."], 1.0).unwrap_err(), GridError::MissingSpawn);
        assert_eq!(TileMap::parse(&["S.S"], 1.0).unwrap_err(), GridError::DuplicateSpawn);
    }

    #[test]
    fn town_is_well_formed() {
        let map = TileMap::parse(TOWN, 32.0).unwrap();
        assert_eq!(map.grid.width, 40);
        assert_eq!(map.grid.height, 25);
        assert!(map.grid.is_point_walkable(map.spawn));
    }
}
