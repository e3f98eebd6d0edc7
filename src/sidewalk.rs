use std::{cmp::Reverse, collections::BinaryHeap};

use geo::{Contains, Intersects, Point, Rect};
use glam::Vec2;
use log::info;
use ordered_float::NotNan;
use serde::Deserialize;

use crate::{
    grid::TileGrid,
    roads::{Heading, RoadPiece, RoadTile},
};

/// Sidewalk geometry and rebuild tuning. Width ratios are relative to the
/// grid cell size and match the visual width of the road models.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SidewalkOptions {
    /// Driving surface share of the cell width.
    pub drive_ratio: f32,
    /// Sidewalk share of the cell width, per side.
    pub sidewalk_ratio: f32,
    /// Junction plaza edge length relative to the sidewalk width.
    pub plaza_scale: f32,
    /// Quiet window between a road mutation and the surface rebuild. (seconds)
    pub rebuild_delay: f64,
}

impl Default for SidewalkOptions {
    fn default() -> Self {
        SidewalkOptions {
            drive_ratio: 0.64,
            sidewalk_ratio: 0.12,
            plaza_scale: 1.4,
            rebuild_delay: 0.3,
        }
    }
}

/// Accumulates strip rectangles per road tile, then links and labels them.
struct SurfaceBuilder {
    half_cell: f32,
    half_walk: f32,
    /// Distance from the tile center to a strip centerline.
    offset: f32,
    plaza: f32,
    strips: Vec<Rect<f32>>,
}

impl SurfaceBuilder {
    fn new(cell: f32, options: &SidewalkOptions) -> Self {
        let walk = cell * options.sidewalk_ratio;
        SurfaceBuilder {
            half_cell: cell * 0.5,
            half_walk: walk * 0.5,
            offset: cell * options.drive_ratio * 0.5 + walk * 0.5,
            plaza: walk * options.plaza_scale,
            strips: Vec::new(),
        }
    }

    fn add_road(&mut self, center: Vec2, road: &RoadTile) {
        let along_x = matches!(road.heading, Heading::North | Heading::South);
        match road.piece {
            RoadPiece::Straight => self.strip_pair(center, along_x),
            RoadPiece::Corner => {
                self.strip_pair(center, true);
                self.strip_pair(center, false);
                // Small square so the two arms meet without a gap.
                self.square(center, self.half_walk * 2.0);
            }
            RoadPiece::Crosswalk => {
                self.strip_pair(center, true);
                self.strip_pair(center, false);
                // Central plaza connecting all four arms.
                self.square(center, self.plaza);
            }
        }
    }

    /// Two parallel full-length strips either side of the driving surface.
    fn strip_pair(&mut self, center: Vec2, along_x: bool) {
        for side in [-1.0, 1.0] {
            let rect = if along_x {
                let y = center.y + side * self.offset;
                Rect::new(
                    (center.x - self.half_cell, y - self.half_walk),
                    (center.x + self.half_cell, y + self.half_walk),
                )
            } else {
                let x = center.x + side * self.offset;
                Rect::new(
                    (x - self.half_walk, center.y - self.half_cell),
                    (x + self.half_walk, center.y + self.half_cell),
                )
            };
            self.strips.push(rect);
        }
    }

    fn square(&mut self, center: Vec2, size: f32) {
        let half = size * 0.5;
        self.strips.push(Rect::new(
            (center.x - half, center.y - half),
            (center.x + half, center.y + half),
        ));
    }

    fn build(self) -> Option<Surface> {
        let strips = self.strips;
        if strips.is_empty() {
            return None;
        }

        let mut adjacency = vec![Vec::new(); strips.len()];
        for i in 0..strips.len() {
            for j in i + 1..strips.len() {
                if strips[i].intersects(&strips[j]) {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }

        // Flood-fill connectivity groups; disconnected road islands must
        // stay distinct navigation groups.
        let mut group = vec![usize::MAX; strips.len()];
        let mut group_count = 0;
        for start in 0..strips.len() {
            if group[start] != usize::MAX {
                continue;
            }
            let mut stack = vec![start];
            group[start] = group_count;
            while let Some(i) = stack.pop() {
                for &j in &adjacency[i] {
                    if group[j] == usize::MAX {
                        group[j] = group_count;
                        stack.push(j);
                    }
                }
            }
            group_count += 1;
        }

        Some(Surface {
            strips,
            adjacency,
            group,
            group_count,
        })
    }
}

/// An immutable built walkable surface. Swapped in whole on rebuild so path
/// queries observe either the old or the new surface, never a partial one.
pub struct Surface {
    strips: Vec<Rect<f32>>,
    adjacency: Vec<Vec<usize>>,
    group: Vec<usize>,
    group_count: usize,
}

impl Surface {
    pub fn strips(&self) -> &[Rect<f32>] {
        &self.strips
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// Connectivity group containing a world position, if any strip does.
    pub fn group_at(&self, pos: Vec2) -> Option<usize> {
        self.strip_containing(pos).map(|i| self.group[i])
    }

    fn strip_containing(&self, pos: Vec2) -> Option<usize> {
        let point = Point::new(pos.x, pos.y);
        self.strips.iter().position(|r| r.contains(&point))
    }

    /// Ordered waypoints along the surface between two world positions, or
    /// `None` when either endpoint is off the surface or the endpoints lie
    /// in different connectivity groups.
    pub fn find_path(&self, start: Vec2, end: Vec2) -> Option<Vec<Vec2>> {
        let from = self.strip_containing(start)?;
        let to = self.strip_containing(end)?;
        if self.group[from] != self.group[to] {
            return None;
        }
        if from == to {
            return Some(vec![start, end]);
        }

        let float = |x: f32| Reverse(NotNan::new(x).unwrap());
        let mut dist = vec![f32::MAX; self.strips.len()];
        let mut prev = vec![usize::MAX; self.strips.len()];
        let mut queue = BinaryHeap::new();
        dist[from] = 0.0;
        queue.push((float(0.0), from));

        while let Some((d, i)) = queue.pop() {
            let d = d.0.into_inner();
            if d > dist[i] {
                continue;
            }
            if i == to {
                break;
            }
            for &j in &self.adjacency[i] {
                let next = d + self.centroid_distance(i, j);
                if next < dist[j] {
                    dist[j] = next;
                    prev[j] = i;
                    queue.push((float(next), j));
                }
            }
        }

        if prev[to] == usize::MAX {
            return None;
        }

        let mut chain = vec![to];
        while chain[chain.len() - 1] != from {
            chain.push(prev[chain[chain.len() - 1]]);
        }
        chain.reverse();

        let mut waypoints = Vec::with_capacity(chain.len() + 1);
        waypoints.push(start);
        for pair in chain.windows(2) {
            waypoints.push(self.crossing(pair[0], pair[1]));
        }
        waypoints.push(end);
        Some(waypoints)
    }

    fn centroid_distance(&self, a: usize, b: usize) -> f32 {
        let ca = self.strips[a].center();
        let cb = self.strips[b].center();
        Vec2::new(ca.x - cb.x, ca.y - cb.y).length()
    }

    /// Midpoint of the overlap region between two touching strips.
    fn crossing(&self, a: usize, b: usize) -> Vec2 {
        let (ra, rb) = (&self.strips[a], &self.strips[b]);
        let x0 = ra.min().x.max(rb.min().x);
        let x1 = ra.max().x.min(rb.max().x);
        let y0 = ra.min().y.max(rb.min().y);
        let y1 = ra.max().y.min(rb.max().y);
        Vec2::new((x0 + x1) * 0.5, (y0 + y1) * 0.5)
    }
}

/// Walkable surface owner: holds the current built surface and the debounced
/// rebuild deadline on the simulation clock.
pub struct Sidewalks {
    options: SidewalkOptions,
    surface: Option<Surface>,
    version: u64,
    rebuild_count: u64,
    pending: Option<f64>,
}

impl Sidewalks {
    pub fn new(options: SidewalkOptions) -> Self {
        Sidewalks {
            options,
            surface: None,
            version: 0,
            rebuild_count: 0,
            pending: None,
        }
    }

    /// Arm (or re-arm) the rebuild deadline. Bursts of mutations within the
    /// quiet window coalesce into a single rebuild.
    pub fn mark_dirty(&mut self, now: f64) {
        self.pending = Some(now + self.options.rebuild_delay);
    }

    /// Drop any armed rebuild. Call on teardown so no rebuild fires after
    /// the simulation is disposed.
    pub fn cancel_pending(&mut self) {
        self.pending = None;
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Fire the rebuild if the armed deadline has passed.
    pub fn poll(&mut self, now: f64, grid: &TileGrid) -> bool {
        match self.pending {
            Some(deadline) if now >= deadline => {
                self.pending = None;
                self.rebuild_now(grid);
                true
            }
            _ => false,
        }
    }

    pub fn rebuild_now(&mut self, grid: &TileGrid) {
        let mut builder = SurfaceBuilder::new(grid.cell_size(), &self.options);
        for (tile, road) in grid.road_tiles() {
            builder.add_road(grid.center_of(tile), road);
        }
        self.surface = builder.build();
        self.version += 1;
        self.rebuild_count += 1;
        match &self.surface {
            Some(surface) => info!(
                "rebuilt walkable surface v{}: {} strips, {} groups",
                self.version,
                surface.strips.len(),
                surface.group_count
            ),
            None => info!("cleared walkable surface v{}", self.version),
        }
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    pub fn find_path(&self, start: Vec2, end: Vec2) -> Option<Vec<Vec2>> {
        self.surface.as_ref()?.find_path(start, end)
    }

    pub fn group_at(&self, pos: Vec2) -> Option<usize> {
        self.surface.as_ref()?.group_at(pos)
    }
}
