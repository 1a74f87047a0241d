//! 3D Math Primitives
//!
//! Plain value types shared by the simulation and the wire protocol.
//! Their serde shape (`{x,y,z}` / `{x,y,z,w}`) is the shape clients see.

use std::fmt;
use std::ops::{Add, Mul, Sub};
use serde::{Serialize, Deserialize};

// =============================================================================
// VEC3
// =============================================================================

/// 3D vector with `f32` components.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component (up)
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared length (avoids sqrt).
    #[inline]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Euclidean length.
    #[inline]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            Self::ZERO
        } else {
            Self::new(self.x / len, self.y / len, self.z / len)
        }
    }

    /// True if every component is finite.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, scalar: f32) -> Self {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl fmt::Debug for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec3({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

// =============================================================================
// QUAT
// =============================================================================

/// Rotation quaternion in `(x, y, z, w)` order.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    /// X (i) component
    pub x: f32,
    /// Y (j) component
    pub y: f32,
    /// Z (k) component
    pub z: f32,
    /// Scalar component
    pub w: f32,
}

impl Quat {
    /// Identity rotation
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// Norms below this are treated as degenerate.
    pub const MIN_NORM: f32 = 1.0e-6;

    /// Create a new quaternion (not normalized).
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians about the +Y axis.
    pub fn from_yaw(angle: f32) -> Self {
        let half = angle / 2.0;
        Self::new(0.0, half.sin(), 0.0, half.cos())
    }

    /// Yaw rotation facing along the horizontal part of `direction`.
    ///
    /// Returns `None` when the direction has no horizontal component.
    pub fn facing(direction: Vec3) -> Option<Self> {
        if direction.x == 0.0 && direction.z == 0.0 {
            return None;
        }
        Some(Self::from_yaw(direction.x.atan2(direction.z)))
    }

    /// Quaternion norm.
    #[inline]
    pub fn norm(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// True if the quaternion can be normalized into a rotation.
    pub fn is_valid_rotation(self) -> bool {
        let finite = self.x.is_finite() && self.y.is_finite()
            && self.z.is_finite() && self.w.is_finite();
        finite && self.norm() > Self::MIN_NORM
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Debug for Quat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Quat({:.3}, {:.3}, {:.3}, {:.3})", self.x, self.y, self.z, self.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_ops() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(0.5, 0.5, 0.5);

        assert_eq!(a + b, Vec3::new(1.5, 2.5, 3.5));
        assert_eq!(a - b, Vec3::new(0.5, 1.5, 2.5));
        assert_eq!(b * 2.0, Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_distance() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance(b), 5.0);
    }

    #[test]
    fn test_normalize_zero() {
        assert_eq!(Vec3::ZERO.normalize(), Vec3::ZERO);

        let n = Vec3::new(0.0, 0.0, 2.0).normalize();
        assert_eq!(n, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_facing() {
        // Facing +Z is the identity yaw
        let q = Quat::facing(Vec3::new(0.0, 0.0, 1.0)).unwrap();
        assert!((q.w - 1.0).abs() < 1e-6);
        assert!(q.y.abs() < 1e-6);

        // Facing +X is a quarter turn about Y
        let q = Quat::facing(Vec3::new(1.0, 0.0, 0.0)).unwrap();
        let half = std::f32::consts::FRAC_PI_4;
        assert!((q.y - half.sin()).abs() < 1e-6);
        assert!((q.w - half.cos()).abs() < 1e-6);

        // Straight up has no yaw
        assert!(Quat::facing(Vec3::new(0.0, 1.0, 0.0)).is_none());
    }

    #[test]
    fn test_quat_validity() {
        assert!(Quat::IDENTITY.is_valid_rotation());
        assert!(!Quat::new(0.0, 0.0, 0.0, 0.0).is_valid_rotation());
        assert!(!Quat::new(f32::NAN, 0.0, 0.0, 1.0).is_valid_rotation());
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_string(&Quat::IDENTITY).unwrap();
        assert_eq!(json, r#"{"x":0.0,"y":0.0,"z":0.0,"w":1.0}"#);
    }
}
