use std::f32::consts::{FRAC_PI_2, PI};

use glam::Vec2;

use crate::grid::{TileCoord, TileGrid};

/// One of the four placement orientations, as an index into the
/// 0°/90°/180°/270° angle table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Heading {
    #[default]
    North,
    East,
    South,
    West,
}

impl Heading {
    pub const ALL: [Heading; 4] = [Heading::North, Heading::East, Heading::South, Heading::West];

    pub fn index(self) -> usize {
        match self {
            Heading::North => 0,
            Heading::East => 1,
            Heading::South => 2,
            Heading::West => 3,
        }
    }

    /// Unit facing direction on the ground plane.
    pub fn dir(self) -> Vec2 {
        match self {
            Heading::North => Vec2::new(0.0, 1.0),
            Heading::East => Vec2::new(1.0, 0.0),
            Heading::South => Vec2::new(0.0, -1.0),
            Heading::West => Vec2::new(-1.0, 0.0),
        }
    }

    /// Integer tile-step offsets of the facing direction.
    pub fn offsets(self) -> (i32, i32) {
        match self {
            Heading::North => (0, 1),
            Heading::East => (1, 0),
            Heading::South => (0, -1),
            Heading::West => (-1, 0),
        }
    }

    pub fn yaw(self) -> f32 {
        match self {
            Heading::North => 0.0,
            Heading::East => FRAC_PI_2,
            Heading::South => PI,
            Heading::West => -FRAC_PI_2,
        }
    }

    pub fn opposite(self) -> Heading {
        match self {
            Heading::North => Heading::South,
            Heading::East => Heading::West,
            Heading::South => Heading::North,
            Heading::West => Heading::East,
        }
    }
}

/// Shape of a road tile, driving which sidewalk strips it contributes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RoadPiece {
    #[default]
    Straight,
    Corner,
    Crosswalk,
}

/// Per-tile road metadata: piece kind plus orientation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoadTile {
    pub piece: RoadPiece,
    pub heading: Heading,
}

/// Classify a road tile from its four axis-aligned neighbors. Pure function
/// of the grid snapshot: popcount and arrangement of road neighbors map to a
/// piece kind and the orientation the strip generator rotates it by.
///
/// An isolated road tile (zero road neighbors) degenerates to `Straight`.
pub fn classify(grid: &TileGrid, tile: TileCoord) -> RoadTile {
    let n = grid.is_road(tile.step(Heading::North));
    let e = grid.is_road(tile.step(Heading::East));
    let s = grid.is_road(tile.step(Heading::South));
    let w = grid.is_road(tile.step(Heading::West));

    let piece;
    let heading;
    match (n, e, s, w) {
        // Isolated tile, or a stub arm: a straight piece along the arm axis.
        (false, false, false, false) => {
            piece = RoadPiece::Straight;
            heading = Heading::North;
        }
        (true, false, false, false) | (false, false, true, false) | (true, false, true, false) => {
            piece = RoadPiece::Straight;
            heading = Heading::East;
        }
        (false, true, false, false) | (false, false, false, true) | (false, true, false, true) => {
            piece = RoadPiece::Straight;
            heading = Heading::North;
        }
        // Two perpendicular arms bend around a corner.
        (true, true, false, false) => {
            piece = RoadPiece::Corner;
            heading = Heading::North;
        }
        (false, true, true, false) => {
            piece = RoadPiece::Corner;
            heading = Heading::East;
        }
        (false, false, true, true) => {
            piece = RoadPiece::Corner;
            heading = Heading::South;
        }
        (true, false, false, true) => {
            piece = RoadPiece::Corner;
            heading = Heading::West;
        }
        // Three or four arms meet at a junction; a T is oriented away from
        // its missing arm.
        (true, true, false, true) => {
            piece = RoadPiece::Crosswalk;
            heading = Heading::North;
        }
        (true, true, true, false) => {
            piece = RoadPiece::Crosswalk;
            heading = Heading::East;
        }
        (false, true, true, true) => {
            piece = RoadPiece::Crosswalk;
            heading = Heading::South;
        }
        (true, false, true, true) => {
            piece = RoadPiece::Crosswalk;
            heading = Heading::West;
        }
        (true, true, true, true) => {
            piece = RoadPiece::Crosswalk;
            heading = Heading::North;
        }
    }

    RoadTile { piece, heading }
}

#[cfg(test)]
mod tests {
    use crate::grid::Occupant;

    use super::*;

    fn grid_with_roads(tiles: &[(i32, i32)]) -> TileGrid {
        let mut grid = TileGrid::new(6.0);
        for &(ix, iz) in tiles {
            grid.set(TileCoord::new(ix, iz), Occupant::Road(RoadTile::default()))
                .unwrap();
        }
        grid
    }

    #[test]
    fn test_isolated_tile_is_straight() {
        let grid = grid_with_roads(&[(0, 0)]);
        let road = classify(&grid, TileCoord::new(0, 0));
        assert_eq!(road.piece, RoadPiece::Straight);
    }

    #[test]
    fn test_straight_follows_arm_axis() {
        let grid = grid_with_roads(&[(0, 0), (1, 0), (2, 0)]);
        let road = classify(&grid, TileCoord::new(1, 0));
        assert_eq!(road.piece, RoadPiece::Straight);
        assert_eq!(road.heading, Heading::North);

        let grid = grid_with_roads(&[(0, 0), (0, 1), (0, 2)]);
        let road = classify(&grid, TileCoord::new(0, 1));
        assert_eq!(road.piece, RoadPiece::Straight);
        assert_eq!(road.heading, Heading::East);
    }

    #[test]
    fn test_single_arm_is_straight() {
        let grid = grid_with_roads(&[(0, 0), (1, 0)]);
        assert_eq!(
            classify(&grid, TileCoord::new(0, 0)).piece,
            RoadPiece::Straight
        );
    }

    #[test]
    fn test_perpendicular_arms_make_a_corner() {
        let grid = grid_with_roads(&[(0, 0), (1, 0), (0, 1)]);
        let road = classify(&grid, TileCoord::new(0, 0));
        assert_eq!(road.piece, RoadPiece::Corner);
        assert_eq!(road.heading, Heading::North);

        let grid = grid_with_roads(&[(0, 0), (-1, 0), (0, -1)]);
        let road = classify(&grid, TileCoord::new(0, 0));
        assert_eq!(road.piece, RoadPiece::Corner);
        assert_eq!(road.heading, Heading::South);
    }

    #[test]
    fn test_three_and_four_arms_are_crosswalks() {
        let grid = grid_with_roads(&[(0, 0), (1, 0), (-1, 0), (0, 1)]);
        assert_eq!(
            classify(&grid, TileCoord::new(0, 0)).piece,
            RoadPiece::Crosswalk
        );

        let grid = grid_with_roads(&[(0, 0), (1, 0), (-1, 0), (0, 1), (0, -1)]);
        assert_eq!(
            classify(&grid, TileCoord::new(0, 0)).piece,
            RoadPiece::Crosswalk
        );
    }

    #[test]
    fn test_classifier_is_pure() {
        let grid = grid_with_roads(&[(0, 0), (1, 0), (0, 1), (0, 2)]);
        let tile = TileCoord::new(0, 1);
        assert_eq!(classify(&grid, tile), classify(&grid, tile));
    }
}
