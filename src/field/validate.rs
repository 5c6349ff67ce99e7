//! Registration-time checks for fields.
//!
//! Every element is evaluated at interior sample points, which catches
//! missing nodal parameters for any field. Coordinate fields additionally
//! need a non-singular Jacobian at every sample: the determinant when the
//! element dimension equals the component count, the Gram determinant
//! `sqrt(det(JᵀJ))` otherwise.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Field;
use crate::error::{ScaffoldError, ScaffoldResult};
use crate::geom::{Mat3, Tolerance, Vec3};
use crate::mesh::{Domain, Element, ElementId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Interior sample points per local axis.
    pub samples_per_axis: usize,
    /// Jacobian measures at or below this are degenerate.
    pub degeneracy_tolerance: f64,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            samples_per_axis: 3,
            degeneracy_tolerance: Tolerance::ZERO_LENGTH.eps,
        }
    }
}

/// Outcome of registering one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRegistrationReport {
    pub field: String,
    pub elements_checked: usize,
    pub samples_checked: usize,
    /// Smallest Jacobian measure seen; `None` for ordinary fields.
    pub min_measure: Option<f64>,
    /// 3-D elements with a negative Jacobian determinant.
    pub inverted_elements: Vec<ElementId>,
    pub warnings: Vec<String>,
}

impl FieldRegistrationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.inverted_elements.is_empty() && self.warnings.is_empty()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!(
            "{}: E:{} S:{}",
            self.field, self.elements_checked, self.samples_checked
        )];
        if let Some(min) = self.min_measure {
            parts.push(format!("minJ:{min:.3e}"));
        }
        if !self.inverted_elements.is_empty() {
            parts.push(format!("inverted:{}", self.inverted_elements.len()));
        }
        parts.join(" ")
    }
}

impl fmt::Display for FieldRegistrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Field `{}`:", self.field)?;
        writeln!(f, "  Elements checked: {}", self.elements_checked)?;
        writeln!(f, "  Samples checked: {}", self.samples_checked)?;
        if let Some(min) = self.min_measure {
            writeln!(f, "  Minimum Jacobian: {min:.6e}")?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }
        Ok(())
    }
}

struct ElementCheck {
    element: ElementId,
    samples: usize,
    min_measure: f64,
    inverted: bool,
}

pub(crate) fn validate_field(
    field: &Field,
    domain: &Domain,
    options: &ValidationOptions,
) -> ScaffoldResult<FieldRegistrationReport> {
    let elements: Vec<&Element> = domain.elements().collect();
    let checks = check_elements(field, &elements, options)?;

    let mut report = FieldRegistrationReport {
        field: field.name.clone(),
        elements_checked: checks.len(),
        ..FieldRegistrationReport::default()
    };
    if !field.role.is_coordinate() {
        report.samples_checked = checks.iter().map(|c| c.samples).sum();
        return Ok(report);
    }

    let degenerate: Vec<ElementId> = checks
        .iter()
        .filter(|c| !c.min_measure.is_finite() || c.min_measure.abs() <= options.degeneracy_tolerance)
        .map(|c| c.element)
        .collect();
    if !degenerate.is_empty() {
        return Err(ScaffoldError::DegenerateCoordinateField {
            field: field.name.clone(),
            elements: degenerate,
        });
    }

    report.samples_checked = checks.iter().map(|c| c.samples).sum();
    report.min_measure = checks
        .iter()
        .map(|c| c.min_measure)
        .min_by(f64::total_cmp);
    for c in checks.iter().filter(|c| c.inverted) {
        report.inverted_elements.push(c.element);
        report.add_warning(format!(
            "element {} of coordinate field `{}` is inverted",
            c.element, field.name
        ));
    }
    log::debug!("registered {}", report.summary());
    Ok(report)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        fn check_elements(
            field: &Field,
            elements: &[&Element],
            options: &ValidationOptions,
        ) -> ScaffoldResult<Vec<ElementCheck>> {
            use rayon::prelude::*;
            elements
                .par_iter()
                .map(|element| check_element(field, element, options))
                .collect()
        }
    } else {
        fn check_elements(
            field: &Field,
            elements: &[&Element],
            options: &ValidationOptions,
        ) -> ScaffoldResult<Vec<ElementCheck>> {
            elements
                .iter()
                .map(|element| check_element(field, element, options))
                .collect()
        }
    }
}

fn check_element(
    field: &Field,
    element: &Element,
    options: &ValidationOptions,
) -> ScaffoldResult<ElementCheck> {
    let basis = field.basis_for(element);
    let dim = element.dimension();
    let mut min_measure = f64::INFINITY;
    let mut min_signed = f64::INFINITY;
    let mut samples = 0;
    for xi in sample_points(element, options.samples_per_axis) {
        let eval = super::basis::evaluate(element, basis, field, &xi, true)?;
        samples += 1;
        if let Some(derivatives) = eval.derivatives {
            let measure = jacobian_measure(&derivatives, field.components);
            min_signed = min_signed.min(measure);
            min_measure = if measure.abs() < min_measure.abs() {
                measure
            } else {
                min_measure
            };
        }
    }
    Ok(ElementCheck {
        element: element.id,
        samples,
        min_measure,
        inverted: dim == 3 && field.components == 3 && min_signed < 0.0,
    })
}

/// Interior lattice points `(i + 0.5) / n` that lie inside the element.
fn sample_points(element: &Element, per_axis: usize) -> Vec<Vec<f64>> {
    let n = per_axis.max(1);
    let dim = element.dimension();
    let coords: Vec<f64> = (0..n).map(|i| (i as f64 + 0.5) / n as f64).collect();
    let mut points = vec![Vec::new()];
    for _ in 0..dim {
        points = points
            .into_iter()
            .flat_map(|p| {
                coords.iter().map(move |c| {
                    let mut q = p.clone();
                    q.push(*c);
                    q
                })
            })
            .collect();
    }
    points.retain(|xi| element.shape.contains(xi, Tolerance::ZERO_LENGTH));
    if points.is_empty() {
        // coarse lattices can miss a simplex interior entirely
        let centroid = 1.0 / (dim as f64 + 1.0);
        points.push(vec![centroid; dim]);
    }
    points
}

/// Signed determinant for square Jacobians, Gram measure otherwise.
/// `derivatives[axis]` is the column of partials along that local axis.
#[must_use]
pub fn jacobian_measure(derivatives: &[Vec<f64>], components: usize) -> f64 {
    let dim = derivatives.len();
    if dim == components {
        return match dim {
            1 => derivatives[0][0],
            2 => derivatives[0][0] * derivatives[1][1] - derivatives[0][1] * derivatives[1][0],
            _ => Mat3::from_columns(
                Vec3::from_slice(&derivatives[0]),
                Vec3::from_slice(&derivatives[1]),
                Vec3::from_slice(&derivatives[2]),
            )
            .determinant(),
        };
    }
    let columns: Vec<Vec3> = derivatives.iter().map(|d| Vec3::from_slice(d)).collect();
    match dim {
        1 => columns[0].length(),
        2 => columns[0].cross(columns[1]).length(),
        _ => {
            let mut gram = Mat3::zeros();
            for i in 0..3 {
                for j in 0..3 {
                    gram.m[i][j] = columns[i].dot(columns[j]);
                }
            }
            gram.determinant().max(0.0).sqrt()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ElementBasis, FieldRole, ValueLabel};
    use crate::mesh::{NodeId, Shape};

    fn unit_square(scale_y: f64) -> (Domain, Field) {
        let mut domain = Domain::new(2).unwrap();
        let mut field = Field::new("coordinates", FieldRole::Geometric, 2);
        for i in 0..4u32 {
            domain.add_node(NodeId(i + 1)).unwrap();
            let x = f64::from(i & 1);
            let y = f64::from((i >> 1) & 1) * scale_y;
            field.set_parameter(NodeId(i + 1), ValueLabel::Value, vec![x, y]).unwrap();
        }
        domain
            .add_element(
                ElementId(1),
                Shape::Square,
                (1..=4).map(NodeId).collect(),
                ElementBasis::linear(Shape::Square),
            )
            .unwrap();
        domain.define_faces();
        (domain, field)
    }

    #[test]
    fn valid_square_passes() {
        let (domain, field) = unit_square(2.0);
        let report = validate_field(&field, &domain, &ValidationOptions::default()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.samples_checked, 9);
        assert!((report.min_measure.unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn collapsed_square_is_degenerate() {
        let (domain, field) = unit_square(0.0);
        let err = validate_field(&field, &domain, &ValidationOptions::default()).unwrap_err();
        assert_eq!(
            err,
            ScaffoldError::DegenerateCoordinateField {
                field: "coordinates".into(),
                elements: vec![ElementId(1)],
            }
        );
    }

    #[test]
    fn ordinary_field_skips_jacobian_check() {
        let (domain, mut field) = unit_square(0.0);
        field.role = FieldRole::Ordinary;
        let report = validate_field(&field, &domain, &ValidationOptions::default()).unwrap();
        assert!(report.min_measure.is_none());
    }

    #[test]
    fn gram_measure_of_surface_in_3d() {
        let d = vec![vec![2.0, 0.0, 0.0], vec![0.0, 3.0, 0.0]];
        assert!((jacobian_measure(&d, 3) - 6.0).abs() < 1e-12);
        let line = vec![vec![3.0, 4.0, 0.0]];
        assert!((jacobian_measure(&line, 3) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn simplex_samples_stay_inside() {
        let element = Element {
            id: ElementId(1),
            shape: Shape::Tetrahedron,
            nodes: (1..=4).map(NodeId).collect(),
            basis: ElementBasis::linear(Shape::Tetrahedron),
        };
        let points = sample_points(&element, 3);
        assert!(!points.is_empty());
        assert!(points.iter().all(|p| p.iter().sum::<f64>() <= 1.0));
    }
}
