use serde::{Deserialize, Serialize};

use crate::error::{ScaffoldError, ScaffoldResult};
use crate::field::{NodeParameters, ValueLabel};
use crate::geom::{Mat3, Point3, Tolerance, Transform, Vec3};

/// Rotation, scale and translation not yet baked into the nodal parameters.
/// The combined matrix is `T * R * S`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PendingTransform {
    /// Euler angles in degrees, applied as `Rz * Ry * Rx`.
    pub rotation: [f64; 3],
    pub scale: [f64; 3],
    pub translation: [f64; 3],
}

impl Default for PendingTransform {
    fn default() -> Self {
        Self {
            rotation: [0.0; 3],
            scale: [1.0; 3],
            translation: [0.0; 3],
        }
    }
}

impl PendingTransform {
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.matrix().is_identity(Tolerance::DEFAULT)
    }

    #[must_use]
    pub fn rotation_matrix(&self) -> Mat3 {
        Mat3::from_euler_degrees(self.rotation)
    }

    /// `R * S`, applied to derivatives.
    #[must_use]
    pub fn linear(&self) -> Mat3 {
        self.rotation_matrix().mul_mat(&Mat3::diagonal(self.scale))
    }

    #[must_use]
    pub fn matrix(&self) -> Transform {
        Transform::from_linear_translation(self.linear(), Vec3::from_array(self.translation))
    }

    /// Rotates by `degrees` about a world `axis`, after the current rotation.
    pub fn accumulate_rotation(&mut self, axis: [f64; 3], degrees: f64) -> ScaffoldResult<()> {
        let delta = Mat3::from_axis_angle(Vec3::from_array(axis), degrees.to_radians())
            .ok_or_else(|| ScaffoldError::invalid_parameter("rotation axis", "axis has zero length"))?;
        self.rotation = delta.mul_mat(&self.rotation_matrix()).to_euler_degrees();
        Ok(())
    }

    pub fn accumulate_scale(&mut self, scale: [f64; 3]) -> ScaffoldResult<()> {
        if scale.iter().any(|s| !s.is_finite() || Tolerance::ZERO_LENGTH.is_zero_length(s.abs())) {
            return Err(ScaffoldError::invalid_parameter(
                "scale",
                format!("{scale:?} would collapse the model"),
            ));
        }
        for (current, s) in self.scale.iter_mut().zip(scale) {
            *current *= s;
        }
        Ok(())
    }

    pub fn accumulate_translation(&mut self, offset: [f64; 3]) {
        for (current, d) in self.translation.iter_mut().zip(offset) {
            *current += d;
        }
    }

    /// Nodal parameters mapped through the transform: the value by the full
    /// affine map, derivatives by the linear part.
    #[must_use]
    pub fn apply(&self, parameters: &NodeParameters) -> NodeParameters {
        let matrix = self.matrix();
        parameters
            .iter()
            .map(|(label, values)| {
                let mapped = if *label == ValueLabel::Value {
                    matrix.apply_point(Point3::from_slice(values)).to_vec3()
                } else {
                    matrix.apply_vec(Vec3::from_slice(values))
                };
                (*label, mapped.to_components(values.len()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: &[f64], b: &[f64]) -> bool {
        Tolerance::LOOSE.approx_eq_slice(a, b)
    }

    #[test]
    fn value_and_derivatives_map_differently() {
        let mut transform = PendingTransform::default();
        assert!(transform.is_identity());
        transform.accumulate_scale([2.0, 1.0, 1.0]).unwrap();
        transform.accumulate_rotation([0.0, 0.0, 1.0], 90.0).unwrap();
        transform.accumulate_translation([1.0, 0.0, 0.0]);

        let mut parameters = NodeParameters::new();
        parameters.insert(ValueLabel::Value, vec![1.0, 0.0, 0.0]);
        parameters.insert(ValueLabel::D1, vec![1.0, 0.0, 0.0]);
        let mapped = transform.apply(&parameters);
        assert!(approx(&mapped[&ValueLabel::Value], &[1.0, 2.0, 0.0]));
        assert!(approx(&mapped[&ValueLabel::D1], &[0.0, 2.0, 0.0]));
    }

    #[test]
    fn rotations_compose() {
        let mut transform = PendingTransform::default();
        transform.accumulate_rotation([0.0, 0.0, 1.0], 30.0).unwrap();
        transform.accumulate_rotation([0.0, 0.0, 1.0], 15.0).unwrap();
        assert!(approx(&transform.rotation, &[45.0, 0.0, 0.0]));
        assert!(transform.accumulate_rotation([0.0; 3], 10.0).is_err());
        assert!(transform.accumulate_scale([1.0, 0.0, 1.0]).is_err());
    }
}
