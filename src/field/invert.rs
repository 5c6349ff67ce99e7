//! Coordinate-field inversion: find the material point mapping to a target.
//!
//! Fields are not assumed globally monotonic, so several pre-images may
//! exist. The search is deterministic: every element is sampled on a
//! regular lattice, seeds are ordered by distance to the target (ties by
//! element id, then lattice order), and a damped Gauss-Newton iteration with
//! local coordinates clamped to the element runs from each seed in turn.

use serde::{Deserialize, Serialize};

use super::Field;
use crate::error::{ScaffoldError, ScaffoldResult};
use crate::geom::{Mat3, Tolerance, Vec3};
use crate::mesh::{Domain, Element, ElementId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InversionOptions {
    /// Residual distance accepted as a hit.
    pub tolerance: f64,
    /// Number of nearest seeds tried before giving up.
    pub max_seeds: usize,
    pub max_iterations: usize,
    /// Seed lattice points per local axis, corners included.
    pub lattice: usize,
}

impl Default for InversionOptions {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::INVERSION.eps,
            max_seeds: 8,
            max_iterations: 40,
            lattice: 3,
        }
    }
}

/// A material point addressed by element and local coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshLocation {
    pub element: ElementId,
    pub xi: Vec<f64>,
}

struct Seed<'a> {
    distance: f64,
    element: &'a Element,
    order: usize,
    xi: Vec<f64>,
}

struct Solution {
    element: ElementId,
    xi: Vec<f64>,
    residual: f64,
}

/// Location whose `field` value equals `target` within `options.tolerance`.
pub fn invert(
    field: &Field,
    domain: &Domain,
    target: &[f64],
    options: &InversionOptions,
) -> ScaffoldResult<MeshLocation> {
    let seeds = ordered_seeds(field, domain, target, options.lattice)?;
    for seed in seeds.iter().take(options.max_seeds.max(1)) {
        let solution = solve_from(field, seed, target, options)?;
        if solution.residual <= options.tolerance {
            log::debug!(
                "inverted `{}` at element {} (residual {:.2e})",
                field.name,
                solution.element,
                solution.residual
            );
            return Ok(MeshLocation {
                element: solution.element,
                xi: solution.xi,
            });
        }
    }
    Err(ScaffoldError::NotInDomain {
        field: field.name.clone(),
        target: target.to_vec(),
    })
}

/// Closest location to `target`, accepted even when the target is outside the image.
pub fn find_nearest(
    field: &Field,
    domain: &Domain,
    target: &[f64],
    options: &InversionOptions,
) -> ScaffoldResult<MeshLocation> {
    let seeds = ordered_seeds(field, domain, target, options.lattice)?;
    let mut best: Option<Solution> = None;
    for seed in seeds.iter().take(options.max_seeds.max(1)) {
        let solution = solve_from(field, seed, target, options)?;
        if best.as_ref().is_none_or(|b| solution.residual < b.residual) {
            best = Some(solution);
        }
    }
    best.map(|s| MeshLocation {
        element: s.element,
        xi: s.xi,
    })
    .ok_or_else(|| ScaffoldError::NotInDomain {
        field: field.name.clone(),
        target: target.to_vec(),
    })
}

fn ordered_seeds<'a>(
    field: &Field,
    domain: &'a Domain,
    target: &[f64],
    lattice: usize,
) -> ScaffoldResult<Vec<Seed<'a>>> {
    if target.len() != field.components {
        return Err(ScaffoldError::invalid_parameter(
            "target",
            format!(
                "field `{}` has {} components, target has {}",
                field.name,
                field.components,
                target.len()
            ),
        ));
    }
    let mut seeds = Vec::new();
    let mut undefined = 0usize;
    'elements: for element in domain.elements() {
        let basis = field.basis_for(element);
        let mut element_seeds = Vec::new();
        for (order, xi) in lattice_points(element, lattice).into_iter().enumerate() {
            let eval = match super::basis::evaluate(element, basis, field, &xi, false) {
                Ok(eval) => eval,
                Err(ScaffoldError::MissingParameter { .. }) => {
                    undefined += 1;
                    continue 'elements;
                }
                Err(err) => return Err(err),
            };
            element_seeds.push(Seed {
                distance: distance(&eval.value, target),
                element,
                order,
                xi,
            });
        }
        seeds.append(&mut element_seeds);
    }
    if undefined > 0 {
        log::debug!("`{}` is undefined on {undefined} elements; not searched", field.name);
    }
    seeds.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.element.id.cmp(&b.element.id))
            .then_with(|| a.order.cmp(&b.order))
    });
    Ok(seeds)
}

fn lattice_points(element: &Element, per_axis: usize) -> Vec<Vec<f64>> {
    let n = per_axis.max(2);
    let coords: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
    let mut points: Vec<Vec<f64>> = vec![Vec::new()];
    for _ in 0..element.dimension() {
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
    points.retain(|xi| element.shape.contains(xi, Tolerance::DEFAULT));
    points
}

fn solve_from(
    field: &Field,
    seed: &Seed<'_>,
    target: &[f64],
    options: &InversionOptions,
) -> ScaffoldResult<Solution> {
    let element = seed.element;
    let basis = field.basis_for(element);
    let dim = element.dimension();
    let mut xi = seed.xi.clone();
    let mut residual = seed.distance;

    for _ in 0..options.max_iterations {
        if residual <= options.tolerance {
            break;
        }
        let eval = super::basis::evaluate(element, basis, field, &xi, true)?;
        let r: Vec<f64> = eval.value.iter().zip(target).map(|(v, t)| v - t).collect();
        let Some(derivatives) = eval.derivatives else {
            break;
        };

        // normal equations (JᵀJ) δ = -Jᵀr, padded to 3x3
        let columns: Vec<Vec3> = derivatives.iter().map(|d| Vec3::from_slice(d)).collect();
        let rv = Vec3::from_slice(&r);
        let mut normal = Mat3::identity();
        let mut rhs = Vec3::ZERO;
        for i in 0..dim {
            for j in 0..dim {
                normal.m[i][j] = columns[i].dot(columns[j]);
            }
        }
        let g: Vec<f64> = columns.iter().map(|c| -c.dot(rv)).collect();
        rhs.x = g.first().copied().unwrap_or(0.0);
        rhs.y = g.get(1).copied().unwrap_or(0.0);
        rhs.z = g.get(2).copied().unwrap_or(0.0);
        let Some(inverse) = normal.inverse(Tolerance::ZERO_LENGTH.eps) else {
            break;
        };
        let delta = inverse.mul_vec(rhs).to_array();

        let mut step = 1.0;
        let mut improved = false;
        for _ in 0..12 {
            let trial: Vec<f64> = xi
                .iter()
                .zip(delta)
                .map(|(x, d)| x + step * d)
                .collect();
            let trial = element.shape.clamp(&trial);
            let value = super::basis::evaluate(element, basis, field, &trial, false)?.value;
            let trial_residual = distance(&value, target);
            if trial_residual < residual {
                xi = trial;
                residual = trial_residual;
                improved = true;
                break;
            }
            step *= 0.5;
        }
        if !improved {
            break;
        }
    }

    Ok(Solution {
        element: element.id,
        xi,
        residual,
    })
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ElementBasis, FieldRole, ValueLabel};
    use crate::mesh::{NodeId, Shape};

    /// Two bilinear squares side by side, the right one skewed.
    fn skewed_strip() -> (Domain, Field) {
        strip_without_values(&[])
    }

    fn strip_without_values(missing: &[u32]) -> (Domain, Field) {
        let mut domain = Domain::new(2).unwrap();
        let mut field = Field::new("coordinates", FieldRole::Geometric, 2);
        let coords = [
            [0.0, 0.0],
            [1.0, 0.0],
            [2.5, 0.2],
            [0.0, 1.0],
            [1.0, 1.0],
            [2.0, 1.4],
        ];
        for (i, c) in coords.iter().enumerate() {
            let id = NodeId(i as u32 + 1);
            domain.add_node(id).unwrap();
            if !missing.contains(&id.get()) {
                field.set_parameter(id, ValueLabel::Value, c.to_vec()).unwrap();
            }
        }
        for (e, nodes) in [[1, 2, 4, 5], [2, 3, 5, 6]].iter().enumerate() {
            domain
                .add_element(
                    ElementId(e as u32 + 1),
                    Shape::Square,
                    nodes.iter().map(|n| NodeId(*n)).collect(),
                    ElementBasis::linear(Shape::Square),
                )
                .unwrap();
        }
        domain.define_faces();
        (domain, field)
    }

    #[test]
    fn inverts_point_in_skewed_element() {
        let (domain, field) = skewed_strip();
        let xi = [0.3, 0.6];
        let target = field.evaluate(&domain, ElementId(2), &xi, false).unwrap().value;
        let location = invert(&field, &domain, &target, &InversionOptions::default()).unwrap();
        assert_eq!(location.element, ElementId(2));
        assert!((location.xi[0] - 0.3).abs() < 1e-6);
        assert!((location.xi[1] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn shared_edge_prefers_lower_element() {
        let (domain, field) = skewed_strip();
        let location = invert(&field, &domain, &[1.0, 0.5], &InversionOptions::default()).unwrap();
        assert_eq!(location.element, ElementId(1));
        assert!((location.xi[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn outside_target_is_not_in_domain() {
        let (domain, field) = skewed_strip();
        let err = invert(&field, &domain, &[5.0, 5.0], &InversionOptions::default()).unwrap_err();
        assert!(matches!(err, ScaffoldError::NotInDomain { .. }));

        let nearest = find_nearest(&field, &domain, &[-1.0, 0.5], &InversionOptions::default()).unwrap();
        assert_eq!(nearest.element, ElementId(1));
        assert!(nearest.xi[0].abs() < 1e-9);
        assert!((nearest.xi[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn elements_without_values_are_skipped() {
        let (domain, field) = strip_without_values(&[3, 6]);
        let options = InversionOptions::default();
        let location = invert(&field, &domain, &[0.25, 0.75], &options).unwrap();
        assert_eq!(location.element, ElementId(1));
        assert!((location.xi[0] - 0.25).abs() < 1e-6);

        let err = invert(&field, &domain, &[1.8, 0.6], &options).unwrap_err();
        assert!(matches!(err, ScaffoldError::NotInDomain { .. }));
        let nearest = find_nearest(&field, &domain, &[1.8, 0.6], &options).unwrap();
        assert_eq!(nearest.element, ElementId(1));
    }

    #[test]
    fn wrong_component_count_is_rejected() {
        let (domain, field) = skewed_strip();
        let err = invert(&field, &domain, &[0.5], &InversionOptions::default()).unwrap_err();
        assert!(matches!(err, ScaffoldError::InvalidParameter { .. }));
    }
}
