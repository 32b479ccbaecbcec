use std::ops::Mul;

use glam::{DMat3, DQuat, DVec3};

/// Norm below which a quaternion is considered degenerate and cannot be normalized.
const MIN_QUATERNION_NORM: f64 = 1e-12;

/// Quaternions whose norm is within this distance of one are kept bit for bit.
const UNIT_NORM_TOLERANCE: f64 = 1e-12;

/// A 3D rotation stored as a unit quaternion.
///
/// Every constructor yields a unit quaternion, so the stored coefficients can be
/// written out without renormalizing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SO3 {
    q: DQuat,
}

impl SO3 {
    /// The identity rotation.
    pub const IDENTITY: Self = Self { q: DQuat::IDENTITY };

    /// Create a rotation from an arbitrary quaternion, normalizing it.
    ///
    /// Returns `None` when the quaternion is zero or contains non-finite values.
    pub fn from_quaternion(quat: &DQuat) -> Option<Self> {
        if !quat.is_finite() {
            return None;
        }
        let norm = quat.length();
        if norm < MIN_QUATERNION_NORM {
            return None;
        }
        if (norm - 1.0).abs() <= UNIT_NORM_TOLERANCE {
            return Some(Self { q: *quat });
        }
        Some(Self { q: *quat / norm })
    }

    /// The unit quaternion.
    pub fn quaternion(&self) -> DQuat {
        self.q
    }

    /// Create a rotation from quaternion coefficients in `[w, x, y, z]` order.
    pub fn from_wxyz(wxyz: [f64; 4]) -> Option<Self> {
        Self::from_quaternion(&DQuat::from_xyzw(wxyz[1], wxyz[2], wxyz[3], wxyz[0]))
    }

    /// The quaternion coefficients in `[w, x, y, z]` order.
    pub fn to_wxyz(&self) -> [f64; 4] {
        [self.q.w, self.q.x, self.q.y, self.q.z]
    }

    /// The rotation as a 3x3 matrix.
    pub fn to_matrix(&self) -> DMat3 {
        DMat3::from_quat(self.q)
    }

    /// The inverse rotation.
    pub fn inverse(&self) -> Self {
        Self {
            q: self.q.conjugate(),
        }
    }

    /// Lie algebra -> Lie group
    pub fn exp(v: DVec3) -> Self {
        let theta = v.length();
        let theta_half = theta / 2.0;

        let (w, b) = if theta > f64::EPSILON {
            (theta_half.cos(), theta_half.sin() / theta)
        } else {
            // first order expansion of sin(theta / 2) / theta
            (1.0, 0.5)
        };
        let xyz = b * v;

        Self {
            q: DQuat::from_xyzw(xyz.x, xyz.y, xyz.z, w).normalize(),
        }
    }

    /// Lie group -> Lie algebra
    pub fn log(&self) -> DVec3 {
        // q and -q are the same rotation; pick the hemisphere with w >= 0
        let q = if self.q.w < 0.0 { -self.q } else { self.q };
        let vec = DVec3::new(q.x, q.y, q.z);
        let sin_half = vec.length();

        if sin_half > f64::EPSILON {
            vec * (2.0 * sin_half.atan2(q.w) / sin_half)
        } else {
            vec * 2.0
        }
    }

    /// Rotate a point.
    pub fn transform(&self, point: DVec3) -> DVec3 {
        self.q * point
    }

    /// Spherical linear interpolation towards `other` along the shorter arc.
    ///
    /// `t` is clamped to `[0, 1]`; the endpoints are returned unchanged.
    pub fn slerp(&self, other: &Self, t: f64) -> Self {
        if t <= 0.0 {
            return *self;
        }
        if t >= 1.0 {
            return *other;
        }
        Self {
            q: self.q.slerp(other.q, t).normalize(),
        }
    }

    /// The angle in radians of the relative rotation between `self` and `other`.
    pub fn angle_to(&self, other: &Self) -> f64 {
        let dot = self.q.dot(other.q).abs().min(1.0);
        2.0 * dot.acos()
    }
}

impl Default for SO3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for SO3 {
    type Output = SO3;

    fn mul(self, rhs: Self) -> Self::Output {
        Self {
            q: (self.q * rhs.q).normalize(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity() {
        let s = SO3::IDENTITY;
        assert_eq!(s.to_wxyz(), [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(SO3::default(), s);
    }

    #[test]
    fn test_from_wxyz_normalizes() {
        let s = SO3::from_wxyz([2.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(s.to_wxyz(), [1.0, 0.0, 0.0, 0.0]);

        let s = SO3::from_wxyz([1.0, 1.0, 1.0, 1.0]).unwrap();
        assert_relative_eq!(s.q.length(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(s.q.w, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_from_wxyz_keeps_unit_bits() {
        let wxyz = [0.7071067811865476, 0.0, 0.7071067811865475, 0.0];
        let s = SO3::from_wxyz(wxyz).unwrap();
        assert_eq!(s.to_wxyz(), wxyz);
    }

    #[test]
    fn test_from_wxyz_degenerate() {
        assert!(SO3::from_wxyz([0.0, 0.0, 0.0, 0.0]).is_none());
        assert!(SO3::from_wxyz([f64::NAN, 0.0, 0.0, 1.0]).is_none());
    }

    #[test]
    fn test_exp_log() {
        let v = DVec3::new(0.1, -0.2, 0.3);
        let log = SO3::exp(v).log();
        assert_relative_eq!(log.x, v.x, epsilon = 1e-12);
        assert_relative_eq!(log.y, v.y, epsilon = 1e-12);
        assert_relative_eq!(log.z, v.z, epsilon = 1e-12);

        assert_eq!(SO3::exp(DVec3::ZERO).q, DQuat::IDENTITY);
    }

    #[test]
    fn test_log_double_cover() {
        let s = SO3::exp(DVec3::new(0.0, 0.0, 0.5));
        let flipped = SO3 { q: -s.q };
        let (a, b) = (s.log(), flipped.log());
        assert_relative_eq!(a.z, b.z, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse() {
        let s = SO3::exp(DVec3::new(0.5, -0.2, 0.1));
        let identity = s.to_matrix() * s.inverse().to_matrix();
        let max_diff = (identity - DMat3::IDENTITY)
            .to_cols_array()
            .iter()
            .map(|x| x.abs())
            .fold(0.0, f64::max);
        assert!(max_diff < 1e-12);
    }

    #[test]
    fn test_slerp_endpoints() {
        let a = SO3::exp(DVec3::new(0.0, 0.3, 0.0));
        let b = SO3::exp(DVec3::new(0.0, 0.0, 1.2));
        assert_eq!(a.slerp(&b, 0.0), a);
        assert_eq!(a.slerp(&b, 1.0), b);
    }

    #[test]
    fn test_slerp_midpoint() {
        let a = SO3::IDENTITY;
        let b = SO3::exp(DVec3::new(0.0, 0.0, 1.0));
        let mid = a.slerp(&b, 0.5);
        assert_relative_eq!(mid.log().z, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_slerp_shorter_arc() {
        let a = SO3::exp(DVec3::new(0.0, 0.0, 0.2));
        let b = SO3::exp(DVec3::new(0.0, 0.0, 0.6));
        // same rotation as b on the opposite hemisphere
        let b_neg = SO3 { q: -b.q };
        let mid = a.slerp(&b_neg, 0.5);
        assert_relative_eq!(mid.angle_to(&SO3::exp(DVec3::new(0.0, 0.0, 0.4))), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_mul() {
        let a = SO3::exp(DVec3::new(0.0, 0.0, 0.25));
        let b = SO3::exp(DVec3::new(0.0, 0.0, 0.5));
        assert_relative_eq!((a * b).log().z, 0.75, epsilon = 1e-12);
    }
}
