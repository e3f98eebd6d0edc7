use std::f32::consts::{PI, TAU};

use glam::Vec2;

/// Yaw angle for a planar facing direction. Zero faces +Z, positive turns
/// toward +X, matching the four placement orientations.
pub fn yaw_of(dir: Vec2) -> f32 {
    dir.x.atan2(dir.y)
}

/// Interpolate between two yaw angles along the shortest arc.
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    let mut delta = (to - from) % TAU;
    if delta > PI {
        delta -= TAU;
    } else if delta < -PI {
        delta += TAU;
    }
    from + delta * t
}

/// Sample a uniform value from an inclusive-exclusive band.
pub fn sample(rng: &mut fastrand::Rng, band: [f32; 2]) -> f32 {
    band[0] + rng.f32() * (band[1] - band[0])
}
