use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Vector on the horizontal (x, z) plane.
///
/// All gameplay distances (ranges, detection, safe zones) are measured on this
/// plane; height is carried separately on [`crate::game::state::Position`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub z: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, z: 0.0 };

    #[inline]
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    #[inline]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.z * self.z).sqrt()
    }

    #[inline]
    pub fn length_sq(&self) -> f32 {
        self.x * self.x + self.z * self.z
    }

    pub fn normalize(&self) -> Self {
        self.normalize_with_length().0
    }

    /// Returns normalized vector and original length
    pub fn normalize_with_length(&self) -> (Self, f32) {
        let len = self.length();
        if len > 0.0 {
            (
                Self {
                    x: self.x / len,
                    z: self.z / len,
                },
                len,
            )
        } else {
            (Self::ZERO, 0.0)
        }
    }

    #[inline]
    pub fn distance_to(&self, other: Vec2) -> f32 {
        (*self - other).length()
    }

    #[inline]
    pub fn distance_sq_to(&self, other: Vec2) -> f32 {
        (*self - other).length_sq()
    }

    /// Step from `self` toward `target` by at most `max_step` without overshooting.
    pub fn move_towards(&self, target: Vec2, max_step: f32) -> Self {
        let (dir, dist) = (target - *self).normalize_with_length();
        if dist <= max_step {
            target
        } else {
            *self + dir * max_step
        }
    }

    pub fn approx_eq(&self, other: Vec2, epsilon: f32) -> bool {
        (self.x - other.x).abs() < epsilon && (self.z - other.z).abs() < epsilon
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            z: self.z + rhs.z,
        }
    }
}

impl Sub for Vec2 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            z: self.z - rhs.z,
        }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self {
            x: self.x * rhs,
            z: self.z * rhs,
        }
    }
}
