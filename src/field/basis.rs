//! Element basis functions and interpolation.
//!
//! Tensor shapes (line, square, cube, collapsed cube) combine one 1-D basis
//! per local axis: linear Lagrange or cubic Hermite. Corners are numbered
//! lexicographically with xi1 varying fastest. A Hermite axis contributes a
//! derivative parameter per corner, so a corner of a basis with Hermite axes
//! `H` carries one parameter per subset of `H` (`VALUE`, `D1`, `D12`, ...).
//!
//! Triangles and tetrahedra use the linear simplex basis; wedges are the
//! linear triangle basis times linear xi3.

use serde::{Deserialize, Serialize};

use super::{Field, ValueLabel};
use crate::error::{ScaffoldError, ScaffoldResult};
use crate::geom::Tolerance;
use crate::mesh::{Element, Shape};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum BasisFunction {
    LinearLagrange,
    CubicHermite,
}

/// Basis assignment per local axis of an element.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ElementBasis {
    axes: Vec<BasisFunction>,
}

impl ElementBasis {
    #[must_use]
    pub const fn new(axes: Vec<BasisFunction>) -> Self {
        Self { axes }
    }

    #[must_use]
    pub fn uniform(shape: Shape, function: BasisFunction) -> Self {
        Self::new(vec![function; shape.dimension()])
    }

    #[must_use]
    pub fn linear(shape: Shape) -> Self {
        Self::uniform(shape, BasisFunction::LinearLagrange)
    }

    #[must_use]
    pub fn cubic_hermite(shape: Shape) -> Self {
        Self::uniform(shape, BasisFunction::CubicHermite)
    }

    #[must_use]
    pub fn axes(&self) -> &[BasisFunction] {
        &self.axes
    }

    /// Bit mask of the Hermite axes.
    #[must_use]
    pub fn hermite_mask(&self) -> usize {
        self.axes
            .iter()
            .enumerate()
            .filter(|(_, f)| **f == BasisFunction::CubicHermite)
            .fold(0, |mask, (axis, _)| mask | (1 << axis))
    }

    pub fn check_shape(&self, shape: Shape) -> ScaffoldResult<()> {
        if self.axes.len() != shape.dimension() {
            return Err(ScaffoldError::InvalidDomain(format!(
                "{shape} element needs {} basis axes, got {}",
                shape.dimension(),
                self.axes.len()
            )));
        }
        for function in &self.axes {
            if *function == BasisFunction::CubicHermite && !shape.is_tensor() {
                return Err(ScaffoldError::UnsupportedBasis {
                    shape,
                    basis: *function,
                });
            }
        }
        Ok(())
    }

    /// Labels every corner node must carry for this basis.
    #[must_use]
    pub fn required_labels(&self) -> Vec<ValueLabel> {
        let hermite = self.hermite_mask();
        (0..8)
            .filter(|s| s & !hermite == 0)
            .map(ValueLabel::from_axes)
            .collect()
    }
}

/// Interpolated value and, on request, derivatives with respect to each
/// local coordinate (`derivatives[axis][component]`).
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: Vec<f64>,
    pub derivatives: Option<Vec<Vec<f64>>>,
}

/// One weighted nodal parameter in an interpolation sum.
#[derive(Debug, Clone, Copy)]
struct Term {
    corner: usize,
    label: ValueLabel,
    weight: f64,
    grad: [f64; 3],
}

/// Evaluates `field` on `element` at local coordinate `xi` using `basis`.
pub fn evaluate(
    element: &Element,
    basis: &ElementBasis,
    field: &Field,
    xi: &[f64],
    with_derivatives: bool,
) -> ScaffoldResult<Evaluation> {
    let shape = element.shape;
    if !shape.contains(xi, Tolerance::DEFAULT) {
        return Err(ScaffoldError::ShapeMismatch {
            element: element.id,
            shape,
            xi: xi.to_vec(),
        });
    }
    basis.check_shape(shape)?;

    let dim = shape.dimension();
    let terms = if shape.is_tensor() {
        tensor_terms(basis, xi)
    } else {
        simplex_terms(shape, xi)
    };

    let components = field.components;
    let mut value = vec![0.0; components];
    let mut derivatives = vec![vec![0.0; components]; dim];
    for term in terms {
        let node = element.nodes[term.corner];
        let params = field
            .parameter(node, term.label)
            .ok_or_else(|| ScaffoldError::MissingParameter {
                field: field.name.clone(),
                node,
                label: term.label,
            })?;
        for (c, p) in params.iter().take(components).enumerate() {
            value[c] += term.weight * p;
            for (axis, row) in derivatives.iter_mut().enumerate() {
                row[c] += term.grad[axis] * p;
            }
        }
    }

    Ok(Evaluation {
        value,
        derivatives: with_derivatives.then_some(derivatives),
    })
}

/// 1-D basis functions on [0, 1], indexed `[node][kind]` where kind 0 multiplies
/// the nodal value and kind 1 the nodal derivative.
fn axis_functions(function: BasisFunction, x: f64) -> ([[f64; 2]; 2], [[f64; 2]; 2]) {
    match function {
        BasisFunction::LinearLagrange => ([[1.0 - x, 0.0], [x, 0.0]], [[-1.0, 0.0], [1.0, 0.0]]),
        BasisFunction::CubicHermite => {
            let x2 = x * x;
            let x3 = x2 * x;
            (
                [
                    [1.0 - 3.0 * x2 + 2.0 * x3, x - 2.0 * x2 + x3],
                    [3.0 * x2 - 2.0 * x3, x3 - x2],
                ],
                [
                    [-6.0 * x + 6.0 * x2, 1.0 - 4.0 * x + 3.0 * x2],
                    [6.0 * x - 6.0 * x2, 3.0 * x2 - 2.0 * x],
                ],
            )
        }
    }
}

fn tensor_terms(basis: &ElementBasis, xi: &[f64]) -> Vec<Term> {
    let dim = basis.axes.len();
    let hermite = basis.hermite_mask();
    let tables: Vec<_> = basis
        .axes
        .iter()
        .enumerate()
        .map(|(axis, f)| axis_functions(*f, xi[axis]))
        .collect();

    let mut terms = Vec::new();
    for corner in 0..(1usize << dim) {
        for subset in (0..(1usize << dim)).filter(|s| s & !hermite == 0) {
            let mut weight = 1.0;
            let mut grad = [1.0; 3];
            for (axis, (f, df)) in tables.iter().enumerate() {
                let node = (corner >> axis) & 1;
                let kind = (subset >> axis) & 1;
                weight *= f[node][kind];
                for (k, g) in grad.iter_mut().enumerate().take(dim) {
                    *g *= if k == axis { df[node][kind] } else { f[node][kind] };
                }
            }
            for g in grad.iter_mut().skip(dim) {
                *g = 0.0;
            }
            terms.push(Term {
                corner,
                label: ValueLabel::from_axes(subset),
                weight,
                grad,
            });
        }
    }
    terms
}

fn simplex_terms(shape: Shape, xi: &[f64]) -> Vec<Term> {
    let value_term = |corner: usize, weight: f64, grad: [f64; 3]| Term {
        corner,
        label: ValueLabel::Value,
        weight,
        grad,
    };
    match shape {
        Shape::Triangle => {
            let (x, y) = (xi[0], xi[1]);
            vec![
                value_term(0, 1.0 - x - y, [-1.0, -1.0, 0.0]),
                value_term(1, x, [1.0, 0.0, 0.0]),
                value_term(2, y, [0.0, 1.0, 0.0]),
            ]
        }
        Shape::Tetrahedron => {
            let (x, y, z) = (xi[0], xi[1], xi[2]);
            vec![
                value_term(0, 1.0 - x - y - z, [-1.0, -1.0, -1.0]),
                value_term(1, x, [1.0, 0.0, 0.0]),
                value_term(2, y, [0.0, 1.0, 0.0]),
                value_term(3, z, [0.0, 0.0, 1.0]),
            ]
        }
        Shape::Wedge => {
            let (x, y, z) = (xi[0], xi[1], xi[2]);
            let tri = [
                (1.0 - x - y, [-1.0, -1.0]),
                (x, [1.0, 0.0]),
                (y, [0.0, 1.0]),
            ];
            let mut terms = Vec::with_capacity(6);
            for (layer, (lz, dlz)) in [(1.0 - z, -1.0), (z, 1.0)].into_iter().enumerate() {
                for (i, (w, g)) in tri.iter().enumerate() {
                    terms.push(value_term(
                        layer * 3 + i,
                        w * lz,
                        [g[0] * lz, g[1] * lz, w * dlz],
                    ));
                }
            }
            terms
        }
        _ => Vec::new(),
    }
}
