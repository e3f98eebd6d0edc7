use glam::Vec2;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::roads::{Heading, RoadTile};

/// Discrete grid cell identifier. Derived from a world position by flooring
/// `position / cell_size` per axis, which keeps placement, occupancy lookup
/// and agent boundary detection on the same key.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub ix: i32,
    pub iz: i32,
}

impl TileCoord {
    pub const fn new(ix: i32, iz: i32) -> Self {
        TileCoord { ix, iz }
    }

    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        TileCoord {
            ix: self.ix + dx,
            iz: self.iz + dz,
        }
    }

    /// Neighboring tile one step toward a cardinal orientation.
    pub fn step(self, heading: Heading) -> Self {
        let (dx, dz) = heading.offsets();
        self.offset(dx, dz)
    }
}

/// What a grid cell holds. Absence of an entry means the cell is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupant {
    Road(RoadTile),
    House { facing: Heading },
    Building { facing: Heading },
    Well,
    Turbine,
    Sawmill,
}

impl Occupant {
    pub fn is_road(&self) -> bool {
        matches!(self, Occupant::Road(_))
    }

    /// Houses and commercial buildings must sit next to a road.
    pub fn needs_adjacent_road(&self) -> bool {
        matches!(self, Occupant::House { .. } | Occupant::Building { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("tile {0:?} is already occupied")]
    Occupied(TileCoord),
    #[error("tile {0:?} has no adjacent road")]
    NoAdjacentRoad(TileCoord),
}

/// Tile occupancy registry. Single source of truth for what sits where;
/// the agent simulation only ever reads it.
#[derive(Debug, Clone)]
pub struct TileGrid {
    cell: f32,
    tiles: FxHashMap<TileCoord, Occupant>,
    house_count: usize,
}

impl TileGrid {
    pub fn new(cell_size: f32) -> Self {
        TileGrid {
            cell: cell_size,
            tiles: FxHashMap::default(),
            house_count: 0,
        }
    }

    /// World-space edge length of one cell.
    pub fn cell_size(&self) -> f32 {
        self.cell
    }

    /// Tile containing a world position.
    pub fn tile_at(&self, pos: Vec2) -> TileCoord {
        TileCoord {
            ix: (pos.x / self.cell).floor() as i32,
            iz: (pos.y / self.cell).floor() as i32,
        }
    }

    /// World-space center of a tile.
    pub fn center_of(&self, tile: TileCoord) -> Vec2 {
        Vec2::new(
            tile.ix as f32 * self.cell + self.cell * 0.5,
            tile.iz as f32 * self.cell + self.cell * 0.5,
        )
    }

    pub fn occupant_at(&self, tile: TileCoord) -> Option<&Occupant> {
        self.tiles.get(&tile)
    }

    /// Record an occupant. Never overwrites; the caller pre-checks or
    /// handles the `Occupied` failure.
    pub fn set(&mut self, tile: TileCoord, occupant: Occupant) -> Result<(), PlacementError> {
        if self.tiles.contains_key(&tile) {
            return Err(PlacementError::Occupied(tile));
        }
        if matches!(occupant, Occupant::House { .. }) {
            self.house_count += 1;
        }
        self.tiles.insert(tile, occupant);
        Ok(())
    }

    /// Remove and return whatever occupies a tile. No-op when empty.
    pub fn clear(&mut self, tile: TileCoord) -> Option<Occupant> {
        let removed = self.tiles.remove(&tile);
        if matches!(removed, Some(Occupant::House { .. })) {
            self.house_count -= 1;
        }
        removed
    }

    pub fn is_road(&self, tile: TileCoord) -> bool {
        matches!(self.tiles.get(&tile), Some(Occupant::Road(_)))
    }

    /// Whether any of the four axis-aligned neighbors is a road.
    pub fn has_adjacent_road(&self, tile: TileCoord) -> bool {
        Heading::ALL.iter().any(|h| self.is_road(tile.step(*h)))
    }

    pub fn has_houses(&self) -> bool {
        self.house_count > 0
    }

    pub fn tiles(&self) -> impl Iterator<Item = (TileCoord, &Occupant)> {
        self.tiles.iter().map(|(t, o)| (*t, o))
    }

    pub fn road_tiles(&self) -> impl Iterator<Item = (TileCoord, &RoadTile)> {
        self.tiles.iter().filter_map(|(t, o)| match o {
            Occupant::Road(road) => Some((*t, road)),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use glam::vec2;

    use crate::roads::{RoadPiece, RoadTile};

    use super::*;

    fn road() -> Occupant {
        Occupant::Road(RoadTile {
            piece: RoadPiece::Straight,
            heading: Heading::North,
        })
    }

    #[test]
    fn test_tile_at_floors_per_axis() {
        let grid = TileGrid::new(6.0);
        assert_eq!(grid.tile_at(vec2(0.0, 0.0)), TileCoord::new(0, 0));
        assert_eq!(grid.tile_at(vec2(5.9, 5.9)), TileCoord::new(0, 0));
        assert_eq!(grid.tile_at(vec2(6.0, 0.0)), TileCoord::new(1, 0));
        assert_eq!(grid.tile_at(vec2(-0.1, -6.0)), TileCoord::new(-1, -1));
    }

    #[test]
    fn test_tile_at_is_idempotent() {
        let grid = TileGrid::new(6.0);
        for pos in [vec2(2.5, 3.5), vec2(-7.25, 11.0), vec2(0.0, -0.001)] {
            let tile = grid.tile_at(pos);
            assert_eq!(grid.tile_at(pos), tile);
            // Positions within the same cell share the key.
            assert_eq!(grid.tile_at(pos + vec2(0.01, 0.01)), tile);
        }
    }

    #[test]
    fn test_center_round_trips() {
        let grid = TileGrid::new(6.0);
        for tile in [TileCoord::new(0, 0), TileCoord::new(3, -2), TileCoord::new(-5, 7)] {
            assert_eq!(grid.tile_at(grid.center_of(tile)), tile);
        }
    }

    #[test]
    fn test_set_never_overwrites() {
        let mut grid = TileGrid::new(6.0);
        let tile = TileCoord::new(1, 1);
        grid.set(tile, road()).unwrap();
        let err = grid.set(tile, Occupant::Well).unwrap_err();
        assert_eq!(err, PlacementError::Occupied(tile));
        assert_eq!(grid.occupant_at(tile), Some(&road()));
    }

    #[test]
    fn test_clear_is_noop_when_empty() {
        let mut grid = TileGrid::new(6.0);
        assert_eq!(grid.clear(TileCoord::new(4, 4)), None);
        grid.set(TileCoord::new(4, 4), Occupant::Sawmill).unwrap();
        assert_eq!(grid.clear(TileCoord::new(4, 4)), Some(Occupant::Sawmill));
        assert_eq!(grid.clear(TileCoord::new(4, 4)), None);
    }

    #[test]
    fn test_house_count_tracks_set_and_clear() {
        let mut grid = TileGrid::new(6.0);
        assert!(!grid.has_houses());
        grid.set(TileCoord::new(0, 0), Occupant::House { facing: Heading::East }).unwrap();
        assert!(grid.has_houses());
        grid.clear(TileCoord::new(0, 0));
        assert!(!grid.has_houses());
    }

    #[test]
    fn test_adjacency_probe() {
        let mut grid = TileGrid::new(6.0);
        grid.set(TileCoord::new(1, 0), road()).unwrap();
        assert!(grid.has_adjacent_road(TileCoord::new(0, 0)));
        assert!(grid.has_adjacent_road(TileCoord::new(2, 0)));
        assert!(!grid.has_adjacent_road(TileCoord::new(3, 0)));
        // Diagonal neighbors do not count.
        assert!(!grid.has_adjacent_road(TileCoord::new(0, 1)));
    }
}
