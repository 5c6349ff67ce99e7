//! Element shapes and their local topology.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geom::Tolerance;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Line,
    Square,
    Triangle,
    Cube,
    Wedge,
    Tetrahedron,
    /// Cube topology with coincident corner nodes.
    CollapsedCube,
}

impl Shape {
    #[must_use]
    pub const fn dimension(self) -> usize {
        match self {
            Self::Line => 1,
            Self::Square | Self::Triangle => 2,
            Self::Cube | Self::Wedge | Self::Tetrahedron | Self::CollapsedCube => 3,
        }
    }

    #[must_use]
    pub const fn corner_count(self) -> usize {
        match self {
            Self::Line => 2,
            Self::Triangle => 3,
            Self::Square | Self::Tetrahedron => 4,
            Self::Wedge => 6,
            Self::Cube | Self::CollapsedCube => 8,
        }
    }

    /// Line, square, cube and collapsed cube use a tensor-product corner layout.
    #[must_use]
    pub const fn is_tensor(self) -> bool {
        matches!(
            self,
            Self::Line | Self::Square | Self::Cube | Self::CollapsedCube
        )
    }

    /// Whether local axis `axis` belongs to a simplex (triangle or tetrahedron) part.
    #[must_use]
    pub const fn is_simplex_axis(self, axis: usize) -> bool {
        match self {
            Self::Triangle | Self::Tetrahedron => true,
            Self::Wedge => axis < 2,
            _ => false,
        }
    }

    /// Local coordinates of corner `index`.
    #[must_use]
    pub fn corner_xi(self, index: usize) -> [f64; 3] {
        let bit = |b: usize| if (index >> b) & 1 == 1 { 1.0 } else { 0.0 };
        match self {
            Self::Line => [bit(0), 0.0, 0.0],
            Self::Square => [bit(0), bit(1), 0.0],
            Self::Cube | Self::CollapsedCube => [bit(0), bit(1), bit(2)],
            Self::Triangle => SIMPLEX_CORNERS[index.min(2)],
            Self::Tetrahedron => SIMPLEX_CORNERS[index.min(3)],
            Self::Wedge => {
                let base = SIMPLEX_CORNERS[(index % 3).min(2)];
                [base[0], base[1], if index >= 3 { 1.0 } else { 0.0 }]
            }
        }
    }

    /// Whether `xi` lies within the element, allowing `tol` overshoot.
    #[must_use]
    pub fn contains(self, xi: &[f64], tol: Tolerance) -> bool {
        let dim = self.dimension();
        if xi.len() < dim || xi[..dim].iter().any(|v| !v.is_finite()) {
            return false;
        }
        let in_unit = |v: f64| v >= -tol.eps && v <= 1.0 + tol.eps;
        match self {
            Self::Triangle => in_unit(xi[0]) && in_unit(xi[1]) && xi[0] + xi[1] <= 1.0 + tol.eps,
            Self::Tetrahedron => {
                xi[..3].iter().all(|v| in_unit(*v)) && xi[0] + xi[1] + xi[2] <= 1.0 + tol.eps
            }
            Self::Wedge => {
                xi[..3].iter().all(|v| in_unit(*v)) && xi[0] + xi[1] <= 1.0 + tol.eps
            }
            _ => xi[..dim].iter().all(|v| in_unit(*v)),
        }
    }

    /// Nearest point of the element to `xi`, keeping `dimension()` entries.
    #[must_use]
    pub fn clamp(self, xi: &[f64]) -> Vec<f64> {
        let dim = self.dimension();
        let mut out: Vec<f64> = (0..dim)
            .map(|a| xi.get(a).copied().unwrap_or(0.0).clamp(0.0, 1.0))
            .collect();
        let simplex_axes = match self {
            Self::Triangle | Self::Wedge => 2,
            Self::Tetrahedron => 3,
            _ => 0,
        };
        if simplex_axes > 0 {
            let sum: f64 = out[..simplex_axes].iter().sum();
            if sum > 1.0 {
                for v in &mut out[..simplex_axes] {
                    *v /= sum;
                }
            }
        }
        out
    }

    /// Local corner pairs forming the element's edges.
    #[must_use]
    pub fn edges(self) -> &'static [[usize; 2]] {
        match self {
            Self::Line => &[[0, 1]],
            Self::Square => &[[0, 1], [2, 3], [0, 2], [1, 3]],
            Self::Triangle => &[[0, 1], [0, 2], [1, 2]],
            Self::Cube | Self::CollapsedCube => &CUBE_EDGES,
            Self::Tetrahedron => &[[0, 1], [0, 2], [0, 3], [1, 2], [1, 3], [2, 3]],
            Self::Wedge => &[
                [0, 1],
                [0, 2],
                [1, 2],
                [3, 4],
                [3, 5],
                [4, 5],
                [0, 3],
                [1, 4],
                [2, 5],
            ],
        }
    }

    /// Local corner lists of the element's faces; empty below three dimensions.
    #[must_use]
    pub fn faces(self) -> &'static [&'static [usize]] {
        match self {
            Self::Cube | Self::CollapsedCube => &CUBE_FACES,
            Self::Tetrahedron => &[&[0, 1, 2], &[0, 1, 3], &[0, 2, 3], &[1, 2, 3]],
            Self::Wedge => &[
                &[0, 1, 2],
                &[3, 4, 5],
                &[0, 1, 3, 4],
                &[0, 2, 3, 5],
                &[1, 2, 4, 5],
            ],
            _ => &[],
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Line => "line",
            Self::Square => "square",
            Self::Triangle => "triangle",
            Self::Cube => "cube",
            Self::Wedge => "wedge",
            Self::Tetrahedron => "tetrahedron",
            Self::CollapsedCube => "collapsed cube",
        };
        f.write_str(name)
    }
}

const SIMPLEX_CORNERS: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];

/// Edges grouped by axis: xi1 edges, then xi2, then xi3.
const CUBE_EDGES: [[usize; 2]; 12] = [
    [0, 1],
    [2, 3],
    [4, 5],
    [6, 7],
    [0, 2],
    [1, 3],
    [4, 6],
    [5, 7],
    [0, 4],
    [1, 5],
    [2, 6],
    [3, 7],
];

/// Faces ordered xi1=0, xi1=1, xi2=0, xi2=1, xi3=0, xi3=1.
const CUBE_FACES: [&[usize]; 6] = [
    &[0, 2, 4, 6],
    &[1, 3, 5, 7],
    &[0, 1, 4, 5],
    &[2, 3, 6, 7],
    &[0, 1, 2, 3],
    &[4, 5, 6, 7],
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_corners_are_lexicographic() {
        assert_eq!(Shape::Cube.corner_xi(0), [0.0, 0.0, 0.0]);
        assert_eq!(Shape::Cube.corner_xi(1), [1.0, 0.0, 0.0]);
        assert_eq!(Shape::Cube.corner_xi(6), [0.0, 1.0, 1.0]);
        assert_eq!(Shape::Square.corner_xi(3), [1.0, 1.0, 0.0]);
    }

    #[test]
    fn simplex_containment() {
        let tol = Tolerance::DEFAULT;
        assert!(Shape::Triangle.contains(&[0.5, 0.5], tol));
        assert!(!Shape::Triangle.contains(&[0.6, 0.5], tol));
        assert!(Shape::Wedge.contains(&[0.2, 0.2, 1.0], tol));
        assert!(!Shape::Cube.contains(&[0.5, 1.1, 0.5], tol));
        assert!(!Shape::Square.contains(&[0.5], tol));
    }

    #[test]
    fn clamp_projects_onto_simplex() {
        let xi = Shape::Triangle.clamp(&[1.0, 1.0]);
        assert!((xi[0] - 0.5).abs() < 1e-12);
        assert!((xi[1] - 0.5).abs() < 1e-12);
        assert_eq!(Shape::Line.clamp(&[-0.3, 4.0]), vec![0.0]);
    }

    #[test]
    fn every_cube_face_has_four_corners() {
        assert_eq!(Shape::Cube.faces().len(), 6);
        assert!(Shape::Cube.faces().iter().all(|f| f.len() == 4));
        assert_eq!(Shape::Cube.edges().len(), 12);
        assert!(Shape::Square.faces().is_empty());
    }
}
