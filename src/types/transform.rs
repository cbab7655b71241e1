//! Affine transforms for link and instance placements.

use glam::{DAffine3, DVec3};
use serde::{Deserialize, Serialize};

/// A rigid or affine placement, stored as a column-major affine matrix.
///
/// Composition follows the host convention: `parent.multiply(&child)` yields a
/// transform that first applies `child`, then `parent`, so a point captured in
/// a nested scope is mapped with `T1 * T2 * ... * Tn * p`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "TransformData", into = "TransformData")]
pub struct Transform(DAffine3);

impl Transform {
    pub const IDENTITY: Self = Self(DAffine3::IDENTITY);

    pub fn from_affine(affine: DAffine3) -> Self {
        Self(affine)
    }

    pub fn from_translation(offset: [f64; 3]) -> Self {
        Self(DAffine3::from_translation(DVec3::from_array(offset)))
    }

    /// Rotation about the host's up axis (Z), in radians.
    pub fn from_rotation_z(angle: f64) -> Self {
        Self(DAffine3::from_rotation_z(angle))
    }

    /// Build from basis vectors and an origin, the way host placements are reported.
    pub fn from_basis(
        basis_x: [f64; 3],
        basis_y: [f64; 3],
        basis_z: [f64; 3],
        origin: [f64; 3],
    ) -> Self {
        Self(DAffine3::from_cols(
            DVec3::from_array(basis_x),
            DVec3::from_array(basis_y),
            DVec3::from_array(basis_z),
            DVec3::from_array(origin),
        ))
    }

    pub fn affine(&self) -> &DAffine3 {
        &self.0
    }

    /// Compose `self * local`: `local` is applied first.
    pub fn multiply(&self, local: &Transform) -> Transform {
        Self(self.0 * local.0)
    }

    /// Map a point from the local frame into this transform's parent frame.
    pub fn of_point(&self, point: [f64; 3]) -> [f64; 3] {
        self.0.transform_point3(DVec3::from_array(point)).to_array()
    }

    pub fn is_identity(&self) -> bool {
        self.0 == DAffine3::IDENTITY
    }

    pub fn abs_diff_eq(&self, other: &Transform, max_abs_diff: f64) -> bool {
        self.0.abs_diff_eq(other.0, max_abs_diff)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Serialized form of a [`Transform`]: three basis vectors and an origin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct TransformData {
    #[serde(default = "unit_x")]
    basis_x: [f64; 3],
    #[serde(default = "unit_y")]
    basis_y: [f64; 3],
    #[serde(default = "unit_z")]
    basis_z: [f64; 3],
    #[serde(default)]
    origin: [f64; 3],
}

fn unit_x() -> [f64; 3] {
    [1.0, 0.0, 0.0]
}

fn unit_y() -> [f64; 3] {
    [0.0, 1.0, 0.0]
}

fn unit_z() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

impl From<TransformData> for Transform {
    fn from(data: TransformData) -> Self {
        Transform::from_basis(data.basis_x, data.basis_y, data.basis_z, data.origin)
    }
}

impl From<Transform> for TransformData {
    fn from(transform: Transform) -> Self {
        let m = transform.0.matrix3;
        TransformData {
            basis_x: m.x_axis.to_array(),
            basis_y: m.y_axis.to_array(),
            basis_z: m.z_axis.to_array(),
            origin: transform.0.translation.to_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn assert_point_eq(a: [f64; 3], b: [f64; 3]) {
        for i in 0..3 {
            assert!((a[i] - b[i]).abs() < 1e-9, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_identity_maps_point_unchanged() {
        assert_point_eq(Transform::IDENTITY.of_point([1.0, 2.0, 3.0]), [1.0, 2.0, 3.0]);
        assert!(Transform::default().is_identity());
    }

    #[test]
    fn test_multiply_applies_local_first() {
        let rotate = Transform::from_rotation_z(FRAC_PI_2);
        let translate = Transform::from_translation([10.0, 0.0, 0.0]);

        // Translate, then rotate: (11, 0, 0) -> (0, 11, 0)
        let composed = rotate.multiply(&translate);
        assert_point_eq(composed.of_point([1.0, 0.0, 0.0]), [0.0, 11.0, 0.0]);

        // Rotate, then translate: (1, 0, 0) -> (0, 1, 0) -> (10, 1, 0)
        let composed = translate.multiply(&rotate);
        assert_point_eq(composed.of_point([1.0, 0.0, 0.0]), [10.0, 1.0, 0.0]);
    }

    #[test]
    fn test_three_level_composition_matches_matrix_product() {
        let t1 = Transform::from_translation([5.0, -2.0, 1.0]);
        let t2 = Transform::from_rotation_z(FRAC_PI_2);
        let t3 = Transform::from_basis(
            [2.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 3.0],
        );

        let composed = t1.multiply(&t2).multiply(&t3);
        let direct = glam::DMat4::from(*t1.affine())
            * glam::DMat4::from(*t2.affine())
            * glam::DMat4::from(*t3.affine());

        let p = [1.0, 2.0, 3.0];
        let expected = direct.transform_point3(DVec3::from_array(p)).to_array();
        assert_point_eq(composed.of_point(p), expected);
        // t3: (2, 2, 6); t2: (-2, 2, 6); t1: (3, 0, 7)
        assert_point_eq(composed.of_point(p), [3.0, 0.0, 7.0]);
    }

    #[test]
    fn test_transform_json_defaults_to_identity() {
        let t: Transform = serde_json::from_str("{}").unwrap();
        assert!(t.is_identity());

        let t: Transform = serde_json::from_str(r#"{"origin": [1.0, 2.0, 3.0]}"#).unwrap();
        assert_point_eq(t.of_point([0.0, 0.0, 0.0]), [1.0, 2.0, 3.0]);
    }
}
