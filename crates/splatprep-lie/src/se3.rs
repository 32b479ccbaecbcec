use std::ops::Mul;

use glam::{DMat4, DVec3, DVec4};

use crate::so3::SO3;

/// A rigid body transformation `p' = R * p + t`.
///
/// The transform does not carry a frame convention by itself; callers name it
/// after the frames it maps between, e.g. `camera_from_world`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    /// The rotation part.
    pub rotation: SO3,
    /// The translation part.
    pub translation: DVec3,
}

impl SE3 {
    /// The identity transformation.
    pub const IDENTITY: Self = Self {
        rotation: SO3::IDENTITY,
        translation: DVec3::ZERO,
    };

    /// Create a transform from a rotation and a translation.
    pub fn new(rotation: SO3, translation: DVec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Create a pure translation.
    pub fn from_translation(translation: DVec3) -> Self {
        Self::new(SO3::IDENTITY, translation)
    }

    /// Create a transform from `[w, x, y, z]` quaternion coefficients and a translation.
    ///
    /// The quaternion is normalized; `None` is returned if it cannot be.
    pub fn from_wxyz_translation(wxyz: [f64; 4], translation: [f64; 3]) -> Option<Self> {
        let rotation = SO3::from_wxyz(wxyz)?;
        Some(Self::new(rotation, DVec3::from_array(translation)))
    }

    /// The rotation as `[w, x, y, z]` quaternion coefficients.
    pub fn to_wxyz(&self) -> [f64; 4] {
        self.rotation.to_wxyz()
    }

    /// The inverse transformation.
    pub fn inverse(&self) -> Self {
        let inv_rot = self.rotation.inverse();
        let inv_trans = -(inv_rot.transform(self.translation));
        Self::new(inv_rot, inv_trans)
    }

    /// Compose two transformations, applying `other` first.
    pub fn compose(&self, other: &SE3) -> Self {
        let rotation = self.rotation * other.rotation;
        let translation = self.translation + self.rotation.transform(other.translation);
        Self::new(rotation, translation)
    }

    /// Apply the transformation to a point.
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.rotation.transform(point) + self.translation
    }

    /// The transformation as a homogeneous 4x4 matrix.
    pub fn as_matrix(&self) -> DMat4 {
        let mut matrix = DMat4::from_mat3(self.rotation.to_matrix());
        matrix.w_axis = DVec4::new(
            self.translation.x,
            self.translation.y,
            self.translation.z,
            1.0,
        );
        matrix
    }

    /// Interpolate between two transforms.
    ///
    /// The rotation follows the shorter great-circle arc (SLERP) and the translation is
    /// linear: `t = (1 - alpha) * a.t + alpha * b.t`. At `alpha <= 0` and `alpha >= 1`
    /// the respective endpoint is returned unchanged.
    pub fn interpolate(a: &SE3, b: &SE3, alpha: f64) -> Self {
        if alpha <= 0.0 {
            return *a;
        }
        if alpha >= 1.0 {
            return *b;
        }
        Self::new(
            a.rotation.slerp(&b.rotation, alpha),
            (1.0 - alpha) * a.translation + alpha * b.translation,
        )
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for SE3 {
    type Output = SE3;

    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_point_eq(a: DVec3, b: DVec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-9);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-9);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-9);
    }

    #[test]
    fn test_identity() {
        let p = DVec3::new(1.0, 2.0, 3.0);
        assert_eq!(SE3::IDENTITY.transform_point(p), p);
        assert_eq!(SE3::default(), SE3::IDENTITY);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = SE3::new(SO3::exp(DVec3::new(0.3, -0.1, 0.7)), DVec3::new(1.0, -2.0, 0.5));
        let p = DVec3::new(-4.0, 0.25, 9.0);
        assert_point_eq(t.inverse().transform_point(t.transform_point(p)), p);
        assert_point_eq((t * t.inverse()).translation, DVec3::ZERO);
    }

    #[test]
    fn test_compose_order() {
        let rot = SE3::new(SO3::exp(DVec3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2)), DVec3::ZERO);
        let shift = SE3::from_translation(DVec3::new(1.0, 0.0, 0.0));
        // shift first, then rotate 90 degrees about z
        let p = rot.compose(&shift).transform_point(DVec3::ZERO);
        assert_point_eq(p, DVec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_as_matrix() {
        let t = SE3::new(SO3::exp(DVec3::new(0.1, 0.2, 0.3)), DVec3::new(4.0, 5.0, 6.0));
        let p = DVec3::new(1.0, -1.0, 2.0);
        let from_matrix = t.as_matrix().transform_point3(p);
        assert_point_eq(from_matrix, t.transform_point(p));
    }

    #[test]
    fn test_interpolate_endpoints() {
        let a = SE3::from_wxyz_translation([1.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0]).unwrap();
        let b = SE3::new(SO3::exp(DVec3::new(0.0, 1.0, 0.0)), DVec3::new(3.0, 2.0, 1.0));
        assert_eq!(SE3::interpolate(&a, &b, 0.0), a);
        assert_eq!(SE3::interpolate(&a, &b, 1.0), b);
    }

    #[test]
    fn test_interpolate_linear_midpoint() {
        let a = SE3::from_translation(DVec3::ZERO);
        let b = SE3::from_translation(DVec3::new(10.0, 0.0, 0.0));
        let mid = SE3::interpolate(&a, &b, 0.5);
        assert_point_eq(mid.translation, DVec3::new(5.0, 0.0, 0.0));
        assert_eq!(mid.rotation, SO3::IDENTITY);
    }

    #[test]
    fn test_from_wxyz_translation_rejects_zero_quaternion() {
        assert!(SE3::from_wxyz_translation([0.0; 4], [1.0, 2.0, 3.0]).is_none());
    }
}
