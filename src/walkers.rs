use std::f32::consts::TAU;

use glam::Vec2;
use log::debug;
use serde::Deserialize;

use crate::{
    grid::{Occupant, TileCoord, TileGrid},
    roads::Heading,
    util,
};

/// Walker tuning. Defaults reproduce the constants the wandering behaviour
/// was tuned with; there is no ground truth beyond observed plausibility.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalkerOptions {
    /// Maximum concurrent walkers.
    pub max_walkers: usize,
    /// Delay before the first spawn attempt. (seconds)
    pub initial_spawn_delay: f64,
    /// Band between consecutive spawn attempts. (seconds)
    pub spawn_interval: [f32; 2],
    /// Share of spawns sourced from houses rather than commercial buildings.
    pub residential_bias: f32,
    /// Walking speed band. (units/second)
    pub speed: [f32; 2],
    /// Lifetime band. (seconds)
    pub lifetime: [f32; 2],
    /// Turn animation duration band. (seconds)
    pub turn_duration: [f32; 2],
    /// Speed multiplier while turning.
    pub turn_speed_factor: f32,
    /// Chance to pause when continuing straight through a tile boundary.
    pub idle_probability: f32,
    /// Pause duration band. (seconds)
    pub idle_duration: [f32; 2],
    /// Chance to take a navigable left branch at an intersection.
    pub branch_left_probability: f32,
    /// Chance to take a navigable right branch at an intersection.
    pub branch_right_probability: f32,
    /// Distance under which two walking agents push each other apart. (units)
    pub separation_radius: f32,
    /// Lateral sway frequency band. (radians/second)
    pub sway_frequency: [f32; 2],
    /// Lateral sway amplitude band. (units)
    pub sway_amplitude: [f32; 2],
    /// Sway amplitude multiplier while turning.
    pub turn_sway_factor: f32,
    /// Sway amplitude multiplier while idling.
    pub idle_sway_factor: f32,
    /// Slack short of the half-cell edge that triggers boundary handling. (units)
    pub edge_margin: f32,
    /// Pull-back from the road edge when placing a walker in front of its
    /// source building. (units)
    pub spawn_setback: f32,
}

impl Default for WalkerOptions {
    fn default() -> Self {
        WalkerOptions {
            max_walkers: 40,
            initial_spawn_delay: 3.0,
            spawn_interval: [1.2, 5.0],
            residential_bias: 0.6,
            speed: [0.6, 1.2],
            lifetime: [45.0, 100.0],
            turn_duration: [0.38, 0.56],
            turn_speed_factor: 0.6,
            idle_probability: 0.05,
            idle_duration: [1.0, 3.2],
            branch_left_probability: 0.15,
            branch_right_probability: 0.15,
            separation_radius: 0.6,
            sway_frequency: [1.5, 2.7],
            sway_amplitude: [0.18, 0.28],
            turn_sway_factor: 0.4,
            idle_sway_factor: 0.2,
            edge_margin: 0.05,
            spawn_setback: 0.9,
        }
    }
}

/// Axis a walker currently travels along. The other axis only ever carries
/// the cosmetic sway.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    #[default]
    Z,
}

impl Axis {
    pub fn of(dir: Vec2) -> Axis {
        if dir.x.abs() > dir.y.abs() {
            Axis::X
        } else {
            Axis::Z
        }
    }
}

/// Mutually exclusive locomotion states.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum WalkerState {
    #[default]
    Walking,
    Turning {
        elapsed: f32,
        duration: f32,
        yaw_from: f32,
        yaw_to: f32,
        queued_dir: Vec2,
    },
    Idling {
        elapsed: f32,
        duration: f32,
    },
}

/// A single pedestrian.
#[derive(Debug, Clone)]
pub struct Walker {
    pub pos: Vec2,
    /// Unit cardinal travel direction.
    pub dir: Vec2,
    /// Left-hand perpendicular of `dir`; sway is applied along it.
    pub perp: Vec2,
    /// Render-facing yaw, interpolated while turning.
    pub yaw: f32,
    pub speed: f32,
    pub base_speed: f32,
    /// Remaining lifetime. (seconds)
    pub life: f32,
    /// Road tile currently being traversed.
    pub tile: TileCoord,
    pub axis: Axis,
    pub sway_phase: f32,
    pub sway_frequency: f32,
    pub sway_amplitude: f32,
    pub state: WalkerState,
    prev_sway: f32,
}

impl Default for Walker {
    fn default() -> Self {
        let dir = Vec2::new(0.0, 1.0);
        Walker {
            pos: Vec2::ZERO,
            dir,
            perp: dir.perp(),
            yaw: 0.0,
            speed: 0.0,
            base_speed: 0.0,
            life: 0.0,
            tile: TileCoord::new(0, 0),
            axis: Axis::Z,
            sway_phase: 0.0,
            sway_frequency: 0.0,
            sway_amplitude: 0.0,
            state: WalkerState::Walking,
            prev_sway: 0.0,
        }
    }
}

impl Walker {
    /// Overwrite every field for a fresh life. Pooled reuse must not leak
    /// any state from the previous occupant.
    #[allow(clippy::too_many_arguments)]
    pub fn reset(
        &mut self,
        pos: Vec2,
        dir: Vec2,
        tile: TileCoord,
        speed: f32,
        life: f32,
        sway_phase: f32,
        sway_frequency: f32,
        sway_amplitude: f32,
    ) {
        *self = Walker {
            pos,
            dir,
            perp: dir.perp(),
            yaw: util::yaw_of(dir),
            speed,
            base_speed: speed,
            life,
            tile,
            axis: Axis::of(dir),
            sway_phase,
            sway_frequency,
            sway_amplitude,
            state: WalkerState::Walking,
            prev_sway: 0.0,
        };
    }
}

/// Owns the live walker population, the reuse pool, and the spawn clock.
pub struct WalkerModel {
    pub walkers: Vec<Walker>,
    pool: Vec<Walker>,
    rng: fastrand::Rng,
    time: f64,
    next_spawn: f64,
}

impl WalkerModel {
    pub fn new(seed: u64, options: &WalkerOptions) -> Self {
        WalkerModel {
            walkers: Vec::new(),
            pool: Vec::new(),
            rng: fastrand::Rng::with_seed(seed),
            time: 0.0,
            next_spawn: options.initial_spawn_delay,
        }
    }

    pub fn len(&self) -> usize {
        self.walkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walkers.is_empty()
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Advance the whole population by one tick. The grid is only ever read.
    pub fn update(&mut self, dt: f32, grid: &TileGrid, options: &WalkerOptions) {
        // A city with no residents empties its streets.
        if !grid.has_houses() && !self.walkers.is_empty() {
            self.retire_all();
            return;
        }
        self.time += dt as f64;

        let WalkerModel { walkers, rng, .. } = self;
        for walker in walkers.iter_mut() {
            advance_walker(walker, dt, grid, rng, options);
        }

        self.separate(options);

        // Retire expired walkers, iterating backward so in-place removal
        // stays stable.
        for i in (0..self.walkers.len()).rev() {
            self.walkers[i].life -= dt;
            if self.walkers[i].life <= 0.0 {
                let walker = self.walkers.swap_remove(i);
                debug!("walker retired at ({:.1},{:.1})", walker.pos.x, walker.pos.y);
                self.pool.push(walker);
            }
        }

        if self.time >= self.next_spawn {
            self.try_spawn(grid, options);
            self.next_spawn = self.time + util::sample(&mut self.rng, options.spawn_interval) as f64;
        }
    }

    fn retire_all(&mut self) {
        while let Some(walker) = self.walkers.pop() {
            self.pool.push(walker);
        }
    }

    /// Soft pairwise collision avoidance between walking agents. O(n²) per
    /// tick, bounded by the population cap.
    fn separate(&mut self, options: &WalkerOptions) {
        let radius = options.separation_radius;
        for i in 0..self.walkers.len() {
            for j in i + 1..self.walkers.len() {
                let (head, tail) = self.walkers.split_at_mut(j);
                let (a, b) = (&mut head[i], &mut tail[0]);
                if a.state != WalkerState::Walking || b.state != WalkerState::Walking {
                    continue;
                }
                let delta = a.pos - b.pos;
                let dist = delta.length();
                if dist >= radius {
                    continue;
                }
                let dir = if dist > 1e-6 { delta / dist } else { Vec2::X };
                let push = (radius - dist) * 0.5;
                a.pos += dir * push;
                b.pos -= dir * push;
            }
        }
    }

    /// Attempt one spawn. Finding no eligible source lot, or no road in
    /// front of it, is routine and silently skipped.
    fn try_spawn(&mut self, grid: &TileGrid, options: &WalkerOptions) {
        if self.walkers.len() >= options.max_walkers {
            return;
        }
        let residential = self.rng.f32() < options.residential_bias;
        let lots: Vec<(TileCoord, Heading)> = grid
            .tiles()
            .filter_map(|(tile, occupant)| match occupant {
                Occupant::House { facing } if residential => Some((tile, *facing)),
                Occupant::Building { facing } if !residential => Some((tile, *facing)),
                _ => None,
            })
            .collect();
        if lots.is_empty() {
            return;
        }
        let (lot, facing) = lots[self.rng.usize(..lots.len())];
        let Some(front) = front_road(grid, lot, facing) else {
            return;
        };

        let front_dir = front.dir();
        let side = if self.rng.bool() {
            front_dir.perp()
        } else {
            -front_dir.perp()
        };
        let setback = grid.cell_size() * 0.5 - options.spawn_setback;
        let pos = grid.center_of(lot) + front_dir * setback;

        let mut walker = self.pool.pop().unwrap_or_default();
        walker.reset(
            pos,
            side,
            lot.step(front),
            util::sample(&mut self.rng, options.speed),
            util::sample(&mut self.rng, options.lifetime),
            self.rng.f32() * TAU,
            util::sample(&mut self.rng, options.sway_frequency),
            util::sample(&mut self.rng, options.sway_amplitude),
        );
        debug!("walker spawned at ({:.1},{:.1})", pos.x, pos.y);
        self.walkers.push(walker);
    }
}

/// Road tile in front of a lot: the direction it faces if that is a road,
/// otherwise the first road among the four neighbors.
fn front_road(grid: &TileGrid, lot: TileCoord, facing: Heading) -> Option<Heading> {
    [facing, Heading::East, Heading::West, Heading::North, Heading::South]
        .into_iter()
        .find(|h| grid.is_road(lot.step(*h)))
}

fn advance_walker(
    walker: &mut Walker,
    dt: f32,
    grid: &TileGrid,
    rng: &mut fastrand::Rng,
    options: &WalkerOptions,
) {
    match walker.state {
        WalkerState::Turning {
            elapsed,
            duration,
            yaw_from,
            yaw_to,
            queued_dir,
        } => {
            let elapsed = elapsed + dt;
            let k = (elapsed / duration).min(1.0);
            walker.yaw = util::lerp_angle(yaw_from, yaw_to, k);
            if k >= 1.0 {
                walker.dir = queued_dir;
                walker.axis = Axis::of(queued_dir);
                walker.perp = queued_dir.perp();
                walker.speed = walker.base_speed;
                walker.state = WalkerState::Walking;
            } else {
                walker.state = WalkerState::Turning {
                    elapsed,
                    duration,
                    yaw_from,
                    yaw_to,
                    queued_dir,
                };
            }
        }
        WalkerState::Idling { elapsed, duration } => {
            let elapsed = elapsed + dt;
            if elapsed >= duration {
                walker.speed = walker.base_speed;
                walker.state = WalkerState::Walking;
            } else {
                walker.state = WalkerState::Idling { elapsed, duration };
            }
        }
        WalkerState::Walking => {}
    }

    // Strip the previous sway offset before advancing along the tile.
    if walker.prev_sway != 0.0 {
        walker.pos -= walker.perp * walker.prev_sway;
    }
    if walker.state == WalkerState::Walking {
        walker.pos += walker.dir * walker.speed * dt;
        cross_boundary(walker, grid, rng, options);
    }

    // The sway runs in every state, damped while the walker is not actually
    // walking so a stationary animation does not slide.
    let mut amp = walker.sway_amplitude;
    match walker.state {
        WalkerState::Turning { .. } => amp *= options.turn_sway_factor,
        WalkerState::Idling { .. } => amp *= options.idle_sway_factor,
        WalkerState::Walking => {}
    }
    walker.sway_phase += dt * walker.sway_frequency;
    let sway = walker.sway_phase.sin() * amp;
    walker.pos += walker.perp * sway;
    walker.prev_sway = sway;
}

/// Detect the walker passing the edge of its current tile and either enter
/// the next road tile or bounce off the end of the pavement.
fn cross_boundary(
    walker: &mut Walker,
    grid: &TileGrid,
    rng: &mut fastrand::Rng,
    options: &WalkerOptions,
) {
    let center = grid.center_of(walker.tile);
    let margin = grid.cell_size() * 0.5 - options.edge_margin;
    let progress = match walker.axis {
        Axis::X => walker.pos.x - center.x,
        Axis::Z => walker.pos.y - center.y,
    };
    if progress.abs() <= margin {
        return;
    }

    let step = if progress > 0.0 { 1 } else { -1 };
    let next = match walker.axis {
        Axis::X => walker.tile.offset(step, 0),
        Axis::Z => walker.tile.offset(0, step),
    };
    if grid.is_road(next) {
        walker.tile = next;
        decide_at_entry(walker, grid, rng, options);
    } else {
        // Walked off the road: clamp back onto the tile and turn around.
        begin_turn(walker, -walker.dir, rng, options);
        match walker.axis {
            Axis::X => walker.pos.x = center.x + progress.signum() * margin,
            Axis::Z => walker.pos.y = center.y + progress.signum() * margin,
        }
    }
}

/// Intersection decision, evaluated exactly once at tile entry: forward is
/// preferred, side branches roll small independent bands, a junction with no
/// straight-through picks uniformly, a dead end forces a reversal.
fn decide_at_entry(
    walker: &mut Walker,
    grid: &TileGrid,
    rng: &mut fastrand::Rng,
    options: &WalkerOptions,
) {
    let tile = walker.tile;
    let forward = walker.dir;
    let left = forward.perp();
    let right = -forward.perp();
    let navigable =
        |d: Vec2| grid.is_road(tile.offset(d.x.round() as i32, d.y.round() as i32));
    let can_forward = navigable(forward);
    let can_left = navigable(left);
    let can_right = navigable(right);

    match (can_forward, can_left, can_right) {
        (false, false, false) => begin_turn(walker, -forward, rng, options),
        (true, false, false) => maybe_idle(walker, rng, options),
        (false, true, false) => begin_turn(walker, left, rng, options),
        (false, false, true) => begin_turn(walker, right, rng, options),
        _ => {
            let mut chosen = forward;
            let roll = rng.f32();
            if can_left && roll < options.branch_left_probability {
                chosen = left;
            } else if can_right
                && roll >= options.branch_left_probability
                && roll < options.branch_left_probability + options.branch_right_probability
            {
                chosen = right;
            }
            if !can_forward {
                chosen = if can_left && can_right {
                    if rng.bool() {
                        left
                    } else {
                        right
                    }
                } else if can_left {
                    left
                } else {
                    right
                };
            }
            if chosen != forward {
                begin_turn(walker, chosen, rng, options);
            } else {
                maybe_idle(walker, rng, options);
            }
        }
    }
}

fn maybe_idle(walker: &mut Walker, rng: &mut fastrand::Rng, options: &WalkerOptions) {
    if rng.f32() < options.idle_probability {
        walker.state = WalkerState::Idling {
            elapsed: 0.0,
            duration: util::sample(rng, options.idle_duration),
        };
        walker.speed = 0.0;
    }
}

fn begin_turn(walker: &mut Walker, new_dir: Vec2, rng: &mut fastrand::Rng, options: &WalkerOptions) {
    walker.state = WalkerState::Turning {
        elapsed: 0.0,
        duration: util::sample(rng, options.turn_duration),
        yaw_from: walker.yaw,
        yaw_to: util::yaw_of(new_dir),
        queued_dir: new_dir,
    };
    walker.speed = walker.base_speed * options.turn_speed_factor;
}
