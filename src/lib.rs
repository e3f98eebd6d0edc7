pub mod diagnostic;
pub mod grid;
pub mod roads;
pub mod sidewalk;
pub mod util;
pub mod walkers;

use std::{fs, path::Path, time::Instant};

use anyhow::Context;
use glam::Vec2;
use log::info;
use serde::Deserialize;

use crate::diagnostic::{DiagnosticLog, StepMetrics};
pub use crate::grid::{Occupant, PlacementError, TileCoord, TileGrid};
pub use crate::roads::{classify, Heading, RoadPiece, RoadTile};
pub use crate::sidewalk::{SidewalkOptions, Sidewalks};
pub use crate::walkers::{Walker, WalkerModel, WalkerOptions, WalkerState};

/// Simulation tuning. Defaults reproduce the constants the behaviour was
/// tuned with; a TOML file can override any subset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatorOptions {
    /// World-space edge length of one grid cell.
    pub cell_size: f32,
    /// Seed for the simulation RNG.
    pub seed: u64,
    pub walkers: WalkerOptions,
    pub sidewalks: SidewalkOptions,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        SimulatorOptions {
            cell_size: 6.0,
            seed: 0,
            walkers: WalkerOptions::default(),
            sidewalks: SidewalkOptions::default(),
        }
    }
}

impl SimulatorOptions {
    /// Load tuning overrides from a TOML file; omitted keys keep defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading tuning file {}", path.as_ref().display()))?;
        Ok(toml::from_str(&text)?)
    }
}

/// Simulator instance: the owning context for the tile grid, the walkable
/// surface and the pedestrian population. The host render loop mutates the
/// grid through the placement calls between ticks and drives everything
/// else through [`Simulator::update`].
pub struct Simulator {
    pub options: SimulatorOptions,
    pub grid: TileGrid,
    pub sidewalks: Sidewalks,
    pub walkers: WalkerModel,
    pub diagnostic_log: DiagnosticLog,
    clock: f64,
}

impl Simulator {
    pub fn new(options: SimulatorOptions) -> Self {
        let grid = TileGrid::new(options.cell_size);
        let sidewalks = Sidewalks::new(options.sidewalks.clone());
        let walkers = WalkerModel::new(options.seed, &options.walkers);
        info!("simulator ready (cell size {})", options.cell_size);
        Simulator {
            options,
            grid,
            sidewalks,
            walkers,
            diagnostic_log: DiagnosticLog::default(),
            clock: 0.0,
        }
    }

    /// Elapsed simulation time. (seconds)
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Place any occupant. Houses and commercial buildings must touch a
    /// road; a road placement arms the debounced surface rebuild.
    pub fn place(&mut self, tile: TileCoord, occupant: Occupant) -> Result<(), PlacementError> {
        if self.grid.occupant_at(tile).is_some() {
            return Err(PlacementError::Occupied(tile));
        }
        if occupant.needs_adjacent_road() && !self.grid.has_adjacent_road(tile) {
            return Err(PlacementError::NoAdjacentRoad(tile));
        }
        let is_road = occupant.is_road();
        self.grid.set(tile, occupant)?;
        if is_road {
            self.sidewalks.mark_dirty(self.clock);
        }
        Ok(())
    }

    /// Place a road with an explicit, player-chosen piece and orientation.
    pub fn place_road(
        &mut self,
        tile: TileCoord,
        piece: RoadPiece,
        heading: Heading,
    ) -> Result<(), PlacementError> {
        self.place(tile, Occupant::Road(RoadTile { piece, heading }))
    }

    /// Place a road whose piece and orientation are derived from the
    /// neighborhood it lands in.
    pub fn place_road_auto(&mut self, tile: TileCoord) -> Result<(), PlacementError> {
        let shape = roads::classify(&self.grid, tile);
        self.place(tile, Occupant::Road(shape))
    }

    /// Remove and return whatever occupies a tile. Clearing a road arms the
    /// debounced surface rebuild.
    pub fn bulldoze(&mut self, tile: TileCoord) -> Option<Occupant> {
        let removed = self.grid.clear(tile);
        if matches!(removed, Some(Occupant::Road(_))) {
            self.sidewalks.mark_dirty(self.clock);
        }
        removed
    }

    /// Advance the simulation by an elapsed-time delta. A non-positive
    /// delta is a no-op.
    pub fn update(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let started = Instant::now();
        self.clock += dt as f64;
        self.sidewalks.poll(self.clock, &self.grid);
        self.walkers.update(dt, &self.grid, &self.options.walkers);
        self.diagnostic_log.push(StepMetrics {
            active_walker_count: self.walkers.len() as i32,
            time_step: started.elapsed().as_secs_f64(),
            surface_version: self.sidewalks.version(),
        });
    }

    /// Waypoints along the walkable surface between two world positions,
    /// or `None` when no connected surface covers both.
    pub fn find_path(&self, start: Vec2, end: Vec2) -> Option<Vec<Vec2>> {
        self.sidewalks.find_path(start, end)
    }

    /// Drop any armed surface rebuild. Call when disposing the simulation
    /// so nothing fires after teardown.
    pub fn teardown(&mut self) {
        self.sidewalks.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use glam::vec2;

    use super::*;

    #[test]
    fn test_zero_delta_is_noop() {
        let mut sim = Simulator::new(SimulatorOptions::default());
        sim.place_road(TileCoord::new(0, 0), RoadPiece::Straight, Heading::North)
            .unwrap();
        sim.update(0.0);
        sim.update(-1.0);
        assert_eq!(sim.clock(), 0.0);
        assert_eq!(sim.diagnostic_log.total_steps, 0);
        assert_eq!(sim.sidewalks.rebuild_count(), 0);
    }

    #[test]
    fn test_placement_rules() {
        let mut sim = Simulator::new(SimulatorOptions::default());
        let lot = TileCoord::new(0, 0);
        assert_eq!(
            sim.place(lot, Occupant::House { facing: Heading::East }),
            Err(PlacementError::NoAdjacentRoad(lot))
        );
        sim.place_road(TileCoord::new(1, 0), RoadPiece::Straight, Heading::North)
            .unwrap();
        sim.place(lot, Occupant::House { facing: Heading::East })
            .unwrap();
        assert_eq!(
            sim.place(lot, Occupant::Well),
            Err(PlacementError::Occupied(lot))
        );
        // Resource buildings do not need a road.
        sim.place(TileCoord::new(9, 9), Occupant::Turbine).unwrap();
    }

    #[test]
    fn test_rapid_placements_rebuild_once() {
        let mut sim = Simulator::new(SimulatorOptions::default());
        for i in 0..10 {
            sim.place_road(TileCoord::new(i, 0), RoadPiece::Straight, Heading::North)
                .unwrap();
        }
        for _ in 0..5 {
            sim.update(0.05);
        }
        assert_eq!(sim.sidewalks.rebuild_count(), 0);
        sim.update(0.05);
        assert_eq!(sim.sidewalks.rebuild_count(), 1);
        for _ in 0..20 {
            sim.update(0.05);
        }
        assert_eq!(sim.sidewalks.rebuild_count(), 1);
    }

    #[test]
    fn test_bulldoze_road_rearms_rebuild() {
        let mut sim = Simulator::new(SimulatorOptions::default());
        sim.place_road(TileCoord::new(0, 0), RoadPiece::Straight, Heading::North)
            .unwrap();
        for _ in 0..7 {
            sim.update(0.05);
        }
        assert_eq!(sim.sidewalks.rebuild_count(), 1);
        assert!(sim.sidewalks.surface().is_some());

        sim.bulldoze(TileCoord::new(0, 0));
        for _ in 0..7 {
            sim.update(0.05);
        }
        assert_eq!(sim.sidewalks.rebuild_count(), 2);
        assert!(sim.sidewalks.surface().is_none());
    }

    #[test]
    fn test_auto_road_derives_piece_from_neighbors() {
        let mut sim = Simulator::new(SimulatorOptions::default());
        sim.place_road_auto(TileCoord::new(0, 0)).unwrap();
        sim.place_road_auto(TileCoord::new(1, 0)).unwrap();
        match sim.grid.occupant_at(TileCoord::new(1, 0)) {
            Some(Occupant::Road(road)) => {
                assert_eq!(road.piece, RoadPiece::Straight);
                assert_eq!(road.heading, Heading::North);
            }
            other => panic!("expected a road, got {other:?}"),
        }
    }

    #[test]
    fn test_walker_reverses_at_end_of_road() {
        let mut sim = Simulator::new(SimulatorOptions::default());
        for i in 0..3 {
            sim.place_road(TileCoord::new(i, 0), RoadPiece::Straight, Heading::North)
                .unwrap();
        }
        sim.place(TileCoord::new(0, 1), Occupant::House { facing: Heading::South })
            .unwrap();

        let mut walker = Walker::default();
        let start_tile = TileCoord::new(1, 0);
        walker.reset(
            sim.grid.center_of(start_tile),
            vec2(1.0, 0.0),
            start_tile,
            1.0,
            1.0e6,
            0.0,
            1.8,
            0.2,
        );
        sim.walkers.walkers.push(walker);

        // Half a cell at unit speed reaches the next tile's decision point.
        sim.update(sim.options.cell_size * 0.5);

        let walker = &sim.walkers.walkers[0];
        assert_eq!(walker.tile, TileCoord::new(2, 0));
        assert!(matches!(walker.state, WalkerState::Turning { .. }));
    }

    #[test]
    fn test_find_path_without_surface() {
        let sim = Simulator::new(SimulatorOptions::default());
        assert_eq!(sim.find_path(vec2(0.0, 0.0), vec2(10.0, 10.0)), None);
    }

    #[test]
    fn test_teardown_cancels_pending_rebuild() {
        let mut sim = Simulator::new(SimulatorOptions::default());
        sim.place_road(TileCoord::new(0, 0), RoadPiece::Straight, Heading::North)
            .unwrap();
        sim.teardown();
        for _ in 0..20 {
            sim.update(0.05);
        }
        assert_eq!(sim.sidewalks.rebuild_count(), 0);
    }

    #[test]
    fn test_options_partial_toml_overrides() {
        let options: SimulatorOptions = toml::from_str(
            r#"
            cell_size = 4.0

            [walkers]
            max_walkers = 10

            [sidewalks]
            rebuild_delay = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(options.cell_size, 4.0);
        assert_eq!(options.walkers.max_walkers, 10);
        assert_eq!(options.sidewalks.rebuild_delay, 0.5);
        // Untouched keys keep the tuned defaults.
        assert_eq!(options.walkers.separation_radius, 0.6);
        assert_eq!(options.walkers.idle_probability, 0.05);
        assert_eq!(options.sidewalks.drive_ratio, 0.64);
        assert_eq!(options.seed, 0);
    }
}
