use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Vec3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    /// Unit vector along the X axis.
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    /// Unit vector along the Y axis.
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    /// Unit vector along the Z axis.
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub const fn from_array(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Build from a component slice, padding missing components with zero.
    ///
    /// Field values carry 1 to 3 components; this is the bridge from
    /// nodal parameter vectors into vector math.
    #[must_use]
    pub fn from_slice(values: &[f64]) -> Self {
        let get = |i: usize| values.get(i).copied().unwrap_or(0.0);
        Self::new(get(0), get(1), get(2))
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Truncate to `components` entries (1..=3).
    #[must_use]
    pub fn to_components(self, components: usize) -> Vec<f64> {
        let mut out = self.to_array().to_vec();
        out.truncate(components.clamp(1, 3));
        out
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub const fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[must_use]
    pub const fn cross(self, rhs: Self) -> Self {
        Self {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len.is_finite() && len > 0.0 {
            Some(Self::new(self.x / len, self.y / len, self.z / len))
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(arr: [f64; 3]) -> Self {
        Self::from_array(arr)
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        v.to_array()
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Self::Output {
        Vec3::new(self * rhs.x, self * rhs.y, self * rhs.z)
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    fn div(self, rhs: f64) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Point3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn from_slice(values: &[f64]) -> Self {
        let v = Vec3::from_slice(values);
        Self::new(v.x, v.y, v.z)
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    #[must_use]
    pub const fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

impl Default for Point3 {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }
}

impl Add<Vec3> for Point3 {
    type Output = Self;
    fn add(self, rhs: Vec3) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point3 {
    type Output = Vec3;
    fn sub(self, rhs: Self) -> Self::Output {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mat3
// ─────────────────────────────────────────────────────────────────────────────

/// Row-major 3x3 matrix. Used for element Jacobians and the linear part of
/// affine transforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub m: [[f64; 3]; 3],
}

impl Mat3 {
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    #[must_use]
    pub const fn zeros() -> Self {
        Self { m: [[0.0; 3]; 3] }
    }

    /// Matrix whose columns are the given vectors.
    #[must_use]
    pub const fn from_columns(c0: Vec3, c1: Vec3, c2: Vec3) -> Self {
        Self {
            m: [[c0.x, c1.x, c2.x], [c0.y, c1.y, c2.y], [c0.z, c1.z, c2.z]],
        }
    }

    #[must_use]
    pub const fn column(&self, j: usize) -> Vec3 {
        Vec3::new(self.m[0][j], self.m[1][j], self.m[2][j])
    }

    #[must_use]
    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    #[must_use]
    pub fn transpose(&self) -> Self {
        let mut t = Self::zeros();
        for i in 0..3 {
            for j in 0..3 {
                t.m[i][j] = self.m[j][i];
            }
        }
        t
    }

    #[must_use]
    pub fn mul_mat(&self, rhs: &Self) -> Self {
        let mut out = Self::zeros();
        for i in 0..3 {
            for j in 0..3 {
                out.m[i][j] = (0..3).map(|k| self.m[i][k] * rhs.m[k][j]).sum();
            }
        }
        out
    }

    #[must_use]
    pub fn mul_vec(&self, v: Vec3) -> Vec3 {
        Vec3::new(
            self.m[0][0] * v.x + self.m[0][1] * v.y + self.m[0][2] * v.z,
            self.m[1][0] * v.x + self.m[1][1] * v.y + self.m[1][2] * v.z,
            self.m[2][0] * v.x + self.m[2][1] * v.y + self.m[2][2] * v.z,
        )
    }

    /// Inverse by adjugate; `None` when the determinant is below `eps`.
    #[must_use]
    pub fn inverse(&self, eps: f64) -> Option<Self> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() <= eps {
            return None;
        }
        let m = &self.m;
        let inv_det = 1.0 / det;
        let mut out = Self::zeros();
        out.m[0][0] = (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det;
        out.m[0][1] = (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det;
        out.m[0][2] = (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det;
        out.m[1][0] = (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det;
        out.m[1][1] = (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det;
        out.m[1][2] = (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det;
        out.m[2][0] = (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det;
        out.m[2][1] = (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det;
        out.m[2][2] = (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det;
        Some(out)
    }

    /// Rotation matrix for Euler angles in degrees, applied as `Rz(a) * Ry(b) * Rx(c)`.
    #[must_use]
    pub fn from_euler_degrees(euler: [f64; 3]) -> Self {
        let [a, b, c] = euler.map(f64::to_radians);
        let (sa, ca) = a.sin_cos();
        let (sb, cb) = b.sin_cos();
        let (sc, cc) = c.sin_cos();
        Self {
            m: [
                [ca * cb, ca * sb * sc - sa * cc, ca * sb * cc + sa * sc],
                [sa * cb, sa * sb * sc + ca * cc, sa * sb * cc - ca * sc],
                [-sb, cb * sc, cb * cc],
            ],
        }
    }

    /// Inverse of [`Mat3::from_euler_degrees`] for a pure rotation matrix.
    #[must_use]
    pub fn to_euler_degrees(&self) -> [f64; 3] {
        let m = &self.m;
        let sb = (-m[2][0]).clamp(-1.0, 1.0);
        let b = sb.asin();
        let (a, c) = if sb.abs() < 1.0 - 1e-12 {
            (m[1][0].atan2(m[0][0]), m[2][1].atan2(m[2][2]))
        } else {
            // gimbal lock: fold the roll into the azimuth
            ((-m[0][1]).atan2(m[1][1]), 0.0)
        };
        [a.to_degrees(), b.to_degrees(), c.to_degrees()]
    }

    /// Rotation by `angle` radians about `axis` (Rodrigues).
    #[must_use]
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Option<Self> {
        let axis = axis.normalized()?;
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;
        let (x, y, z) = (axis.x, axis.y, axis.z);
        Some(Self {
            m: [
                [t * x * x + c, t * x * y - s * z, t * x * z + s * y],
                [t * x * y + s * z, t * y * y + c, t * y * z - s * x],
                [t * x * z - s * y, t * y * z + s * x, t * z * z + c],
            ],
        })
    }

    #[must_use]
    pub const fn diagonal(d: [f64; 3]) -> Self {
        Self {
            m: [[d[0], 0.0, 0.0], [0.0, d[1], 0.0], [0.0, 0.0, d[2]]],
        }
    }
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::identity()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transform
// ─────────────────────────────────────────────────────────────────────────────

/// Affine transform stored as a homogeneous 4x4 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    m: [[f64; 4]; 4],
}

impl Transform {
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            m: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Affine transform with linear part `linear` followed by `translation`.
    #[must_use]
    pub fn from_linear_translation(linear: Mat3, translation: Vec3) -> Self {
        let l = &linear.m;
        Self {
            m: [
                [l[0][0], l[0][1], l[0][2], translation.x],
                [l[1][0], l[1][1], l[1][2], translation.y],
                [l[2][0], l[2][1], l[2][2], translation.z],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Upper-left 3x3 block.
    #[must_use]
    pub fn linear(self) -> Mat3 {
        let mut out = Mat3::zeros();
        for i in 0..3 {
            for j in 0..3 {
                out.m[i][j] = self.m[i][j];
            }
        }
        out
    }

    #[must_use]
    pub fn translation(self) -> Vec3 {
        Vec3::new(self.m[0][3], self.m[1][3], self.m[2][3])
    }

    #[must_use]
    pub fn is_identity(self, tol: Tolerance) -> bool {
        let id = Self::identity();
        (0..4).all(|i| (0..4).all(|j| tol.approx_eq_f64(self.m[i][j], id.m[i][j])))
    }

    #[must_use]
    pub fn apply_point(self, p: Point3) -> Point3 {
        let v = self.linear().mul_vec(p.to_vec3()) + self.translation();
        Point3::new(v.x, v.y, v.z)
    }

    #[must_use]
    pub fn apply_vec(self, v: Vec3) -> Vec3 {
        self.linear().mul_vec(v)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tolerance
// ─────────────────────────────────────────────────────────────────────────────

/// Tolerance configuration for numeric comparisons.
///
/// Use the named constants to avoid epsilon scatter:
/// - `Tolerance::DEFAULT` - local coordinate bounds and general comparisons (1e-9)
/// - `Tolerance::ZERO_LENGTH` - degenerate vectors and singular Jacobians (1e-12)
/// - `Tolerance::INVERSION` - coordinate-field inversion residual (1e-8)
/// - `Tolerance::LOOSE` - coarse geometric comparisons in tests and diagnostics (1e-6)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub eps: f64,
}

impl Tolerance {
    pub const DEFAULT: Self = Self { eps: 1e-9 };
    pub const ZERO_LENGTH: Self = Self { eps: 1e-12 };
    pub const INVERSION: Self = Self { eps: 1e-8 };
    pub const LOOSE: Self = Self { eps: 1e-6 };

    #[must_use]
    pub const fn new(eps: f64) -> Self {
        Self { eps }
    }

    #[must_use]
    pub fn approx_eq_f64(self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.eps
    }

    #[must_use]
    pub fn approx_eq_slice(self, a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.approx_eq_f64(*x, *y))
    }

    #[must_use]
    pub fn is_zero_length(self, len: f64) -> bool {
        len.abs() <= self.eps
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn mat_approx_eq(a: &Mat3, b: &Mat3) -> bool {
        (0..3).all(|i| (0..3).all(|j| (a.m[i][j] - b.m[i][j]).abs() < 1e-10))
    }

    #[test]
    fn test_vec3_operators() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(2.0 * a, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(-a, Vec3::new(-1.0, -2.0, -3.0));
    }

    #[test]
    fn test_vec3_from_short_slice_pads_with_zero() {
        assert_eq!(Vec3::from_slice(&[2.0]), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(Vec3::new(1.0, 2.0, 3.0).to_components(2), vec![1.0, 2.0]);
    }

    #[test]
    fn test_mat3_inverse_roundtrip() {
        let m = Mat3 {
            m: [[2.0, 1.0, 0.0], [0.0, 3.0, 1.0], [1.0, 0.0, 4.0]],
        };
        let inv = m.inverse(1e-15).unwrap();
        assert!(mat_approx_eq(&m.mul_mat(&inv), &Mat3::identity()));
    }

    #[test]
    fn test_mat3_singular_has_no_inverse() {
        let m = Mat3::from_columns(Vec3::X, Vec3::X, Vec3::Z);
        assert!(m.inverse(1e-12).is_none());
    }

    #[test]
    fn test_euler_roundtrip() {
        let euler = [30.0, -20.0, 45.0];
        let back = Mat3::from_euler_degrees(euler).to_euler_degrees();
        for (a, b) in euler.iter().zip(back) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn test_axis_angle_matches_euler_about_z() {
        let r = Mat3::from_axis_angle(Vec3::Z, 90f64.to_radians()).unwrap();
        assert!(mat_approx_eq(&r, &Mat3::from_euler_degrees([90.0, 0.0, 0.0])));
    }

    #[test]
    fn test_transform_applies_linear_then_translation() {
        let t = Transform::from_linear_translation(
            Mat3::diagonal([2.0, 2.0, 2.0]),
            Vec3::new(1.0, 0.0, 0.0),
        );
        assert_eq!(t.apply_point(Point3::new(1.0, 1.0, 1.0)), Point3::new(3.0, 2.0, 2.0));
        assert_eq!(t.apply_vec(Vec3::new(1.0, 1.0, 1.0)), Vec3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn test_tolerance_slices() {
        assert!(Tolerance::ZERO_LENGTH.eps < Tolerance::DEFAULT.eps);
        assert!(Tolerance::LOOSE.approx_eq_slice(&[1.0, 2.0], &[1.0, 2.0 + 1e-7]));
        assert!(!Tolerance::LOOSE.approx_eq_slice(&[1.0], &[1.0, 0.0]));
    }
}
