//! Planar distance and zone checks shared by combat and AI.
//!
//! Everything here ignores height: ranges and the safe zone are measured on
//! the x/z plane.

use crate::game::constants::world::{SAFE_ZONE_CENTER, SAFE_ZONE_RADIUS};
use crate::game::state::Position;
use crate::util::vec2::Vec2;

#[inline]
pub fn safe_zone_center() -> Vec2 {
    Vec2::new(SAFE_ZONE_CENTER.0, SAFE_ZONE_CENTER.1)
}

/// Straight-line 2D distance between two positions
#[inline]
pub fn planar_distance(a: &Position, b: &Position) -> f32 {
    a.planar().distance_to(b.planar())
}

/// Whether `b` is within `range` of `a` (inclusive)
#[inline]
pub fn within_range(a: &Position, b: &Position, range: f32) -> bool {
    a.planar().distance_sq_to(b.planar()) <= range * range
}

/// Inside the start-island safe zone (strictly within the radius)
#[inline]
pub fn in_safe_zone(pos: &Position) -> bool {
    pos.planar().distance_sq_to(safe_zone_center()) < SAFE_ZONE_RADIUS * SAFE_ZONE_RADIUS
}
