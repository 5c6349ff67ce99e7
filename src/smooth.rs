//! Derivative smoothing for Hermite coordinate fields.
//!
//! Each node's first derivative along a Hermite axis is rescaled to the
//! mean arc length of the element edges meeting it along that axis. The
//! harmonic mean suits meshes whose element sizes vary by more than about
//! 1.5:1. Results are returned as overlay edits; the field is not modified.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ScaffoldError, ScaffoldResult};
use crate::field::{BasisFunction, Field, ValueLabel, basis};
use crate::geom::{GaussLegendre, Tolerance, Vec3};
use crate::mesh::{Domain, Element, NodeId};
use crate::overlay::OverlayUpdate;

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum SmoothMode {
    #[default]
    Arithmetic,
    Harmonic,
}

impl SmoothMode {
    /// Mean of positive `values`; `None` when empty or, for the harmonic
    /// mean, when any value is not positive.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        match self {
            Self::Arithmetic => Some(values.iter().sum::<f64>() / n),
            Self::Harmonic => {
                if values.iter().any(|v| *v <= 0.0) {
                    return None;
                }
                Some(n / values.iter().map(|v| 1.0 / v).sum::<f64>())
            }
        }
    }
}

impl fmt::Display for SmoothMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Arithmetic => "Arithmetic",
            Self::Harmonic => "Harmonic",
        })
    }
}

impl FromStr for SmoothMode {
    type Err = ScaffoldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arithmetic" => Ok(Self::Arithmetic),
            "harmonic" => Ok(Self::Harmonic),
            _ => Err(ScaffoldError::invalid_parameter(
                "Scale factor mode",
                format!("`{s}` is neither Arithmetic nor Harmonic"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothOptions {
    pub mode: SmoothMode,
    /// Also replace derivative directions with the mean edge direction.
    pub adjust_directions: bool,
    pub iterations: usize,
}

impl Default for SmoothOptions {
    fn default() -> Self {
        Self {
            mode: SmoothMode::Arithmetic,
            adjust_directions: false,
            iterations: 1,
        }
    }
}

/// One element edge meeting a node along a Hermite axis.
struct EdgeSample {
    length: f64,
    /// Unit chord from the edge's xi=0 end to its xi=1 end.
    direction: Option<Vec3>,
}

/// Edges keyed by the far node, so an edge shared by several elements
/// counts once.
type EdgeMap = BTreeMap<(NodeId, ValueLabel), BTreeMap<NodeId, EdgeSample>>;

/// Smoothed first derivatives of `field` at `nodes` (every node when empty).
pub fn smooth_derivatives(
    domain: &Domain,
    field: &Field,
    nodes: &[NodeId],
    options: &SmoothOptions,
) -> ScaffoldResult<OverlayUpdate> {
    let targets: BTreeSet<NodeId> = if nodes.is_empty() {
        domain.nodes().collect()
    } else {
        nodes.iter().copied().collect()
    };
    if let Some(missing) = targets.iter().find(|n| !domain.contains_node(**n)) {
        return Err(ScaffoldError::UnknownNode(*missing));
    }

    let rule = GaussLegendre::line_5point();
    let mut working = field.clone();
    let mut results: BTreeMap<(NodeId, ValueLabel), Vec<f64>> = BTreeMap::new();
    for _ in 0..options.iterations.max(1) {
        let edges = collect_edges(domain, &working, &targets, &rule)?;
        for ((node, label), samples) in edges {
            let lengths: Vec<f64> = samples
                .values()
                .map(|s| s.length)
                .filter(|l| !Tolerance::ZERO_LENGTH.is_zero_length(*l))
                .collect();
            let Some(magnitude) = options.mode.mean(&lengths) else {
                continue;
            };
            let mean_chord = || {
                samples
                    .values()
                    .filter_map(|s| s.direction)
                    .fold(Vec3::ZERO, |acc, d| acc + d)
                    .normalized()
            };
            let direction = if options.adjust_directions {
                mean_chord()
            } else {
                working
                    .parameter(node, label)
                    .and_then(|d| Vec3::from_slice(d).normalized())
                    .or_else(mean_chord)
            };
            let Some(direction) = direction else {
                continue;
            };
            let value = (direction * magnitude).to_components(working.components);
            working.set_parameter(node, label, value.clone())?;
            results.insert((node, label), value);
        }
    }

    let mut update = OverlayUpdate::new();
    for ((node, label), value) in results {
        update.push(node, &field.name, label, value);
    }
    log::debug!(
        "smoothed {} derivatives of `{}` ({} mode)",
        update.len(),
        field.name,
        options.mode
    );
    Ok(update)
}

fn collect_edges(
    domain: &Domain,
    field: &Field,
    targets: &BTreeSet<NodeId>,
    rule: &GaussLegendre,
) -> ScaffoldResult<EdgeMap> {
    let mut edges = EdgeMap::new();
    for element in domain.elements().filter(|e| e.shape.is_tensor()) {
        let element_basis = field.basis_for(element);
        for (corner, node) in element.nodes.iter().enumerate() {
            if !targets.contains(node) {
                continue;
            }
            for (axis, function) in element_basis.axes().iter().enumerate() {
                if *function != BasisFunction::CubicHermite {
                    continue;
                }
                let Some(&other) = element.nodes.get(corner ^ (1 << axis)) else {
                    continue;
                };
                if other == *node {
                    continue;
                }
                let samples = edges
                    .entry((*node, ValueLabel::first_derivative(axis)))
                    .or_default();
                if !samples.contains_key(&other) {
                    samples.insert(other, edge_sample(element, field, corner, axis, rule)?);
                }
            }
        }
    }
    Ok(edges)
}

fn edge_sample(
    element: &Element,
    field: &Field,
    corner: usize,
    axis: usize,
    rule: &GaussLegendre,
) -> ScaffoldResult<EdgeSample> {
    let element_basis = field.basis_for(element);
    let fixed = element.shape.corner_xi(corner)[..element.dimension()].to_vec();
    let at = |t: f64| {
        let mut xi = fixed.clone();
        xi[axis] = t;
        xi
    };
    let length = rule.try_integrate(|t| {
        let eval = basis::evaluate(element, element_basis, field, &at(t), true)?;
        Ok::<f64, ScaffoldError>(
            eval.derivatives
                .as_ref()
                .and_then(|d| d.get(axis))
                .map_or(0.0, |d| d.iter().map(|v| v * v).sum::<f64>().sqrt()),
        )
    })?;
    let start = basis::evaluate(element, element_basis, field, &at(0.0), false)?.value;
    let end = basis::evaluate(element, element_basis, field, &at(1.0), false)?.value;
    let direction = (Vec3::from_slice(&end) - Vec3::from_slice(&start)).normalized();
    Ok(EdgeSample { length, direction })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ElementBasis, FieldRole};
    use crate::mesh::{ElementId, Shape};

    /// Hermite line through x = 0, 1, 3 with unit derivatives.
    fn uneven_line() -> (Domain, Field) {
        let mut domain = Domain::new(1).unwrap();
        let mut field = Field::new("coordinates", FieldRole::Geometric, 3);
        for (i, x) in [0.0, 1.0, 3.0].iter().enumerate() {
            let id = NodeId(i as u32 + 1);
            domain.add_node(id).unwrap();
            field.set_parameter(id, ValueLabel::Value, vec![*x, 0.0, 0.0]).unwrap();
            field.set_parameter(id, ValueLabel::D1, vec![1.0, 0.0, 0.0]).unwrap();
        }
        for e in 1..=2 {
            domain
                .add_element(
                    ElementId(e),
                    Shape::Line,
                    vec![NodeId(e), NodeId(e + 1)],
                    ElementBasis::cubic_hermite(Shape::Line),
                )
                .unwrap();
        }
        (domain, field)
    }

    fn d1(update: &OverlayUpdate, node: u32) -> f64 {
        update
            .edits
            .iter()
            .find(|e| e.node == NodeId(node) && e.label == ValueLabel::D1)
            .map(|e| e.value[0])
            .unwrap()
    }

    #[test]
    fn means_of_unequal_lengths() {
        assert!((SmoothMode::Harmonic.mean(&[1.0, 4.0]).unwrap() - 1.6).abs() < 1e-12);
        assert!((SmoothMode::Arithmetic.mean(&[1.0, 4.0]).unwrap() - 2.5).abs() < 1e-12);
        assert!(SmoothMode::Harmonic.mean(&[]).is_none());
        assert!(SmoothMode::Harmonic.mean(&[1.0, 0.0]).is_none());
    }

    #[test]
    fn harmonic_mean_at_shared_node() {
        let (domain, field) = uneven_line();
        let options = SmoothOptions {
            mode: SmoothMode::Harmonic,
            ..SmoothOptions::default()
        };
        let update = smooth_derivatives(&domain, &field, &[], &options).unwrap();
        assert_eq!(update.len(), 3);
        assert!((d1(&update, 2) - 4.0 / 3.0).abs() < 1e-9);
        assert!((d1(&update, 1) - 1.0).abs() < 1e-9);
        assert!((d1(&update, 3) - 2.0).abs() < 1e-9);
        assert!(update.edits.iter().all(|e| e.field == "coordinates"));
    }

    #[test]
    fn arithmetic_mean_on_selected_node() {
        let (domain, field) = uneven_line();
        let update =
            smooth_derivatives(&domain, &field, &[NodeId(2)], &SmoothOptions::default()).unwrap();
        assert_eq!(update.len(), 1);
        assert!((d1(&update, 2) - 1.5).abs() < 1e-9);
        assert!(smooth_derivatives(&domain, &field, &[NodeId(7)], &SmoothOptions::default()).is_err());
    }

    /// Hermite squares: 1 on [0,1]x[0,1], 2 on [1,3]x[0,1], 3 on [0,1]x[1,2].
    /// The edge from (1,1) to (0,1) is shared by squares 1 and 3.
    fn uneven_plate() -> (Domain, Field) {
        let mut domain = Domain::new(2).unwrap();
        let mut field = Field::new("coordinates", FieldRole::Geometric, 3);
        let points = [(0.0, 0.0), (1.0, 0.0), (3.0, 0.0), (0.0, 1.0), (1.0, 1.0), (3.0, 1.0), (0.0, 2.0), (1.0, 2.0)];
        for (i, (x, y)) in points.iter().enumerate() {
            let id = NodeId(i as u32 + 1);
            domain.add_node(id).unwrap();
            field.set_parameter(id, ValueLabel::Value, vec![*x, *y, 0.0]).unwrap();
            field.set_parameter(id, ValueLabel::D1, vec![1.0, 0.0, 0.0]).unwrap();
            field.set_parameter(id, ValueLabel::D2, vec![0.0, 1.0, 0.0]).unwrap();
            field.set_parameter(id, ValueLabel::D12, vec![0.0, 0.0, 0.0]).unwrap();
        }
        for (e, corners) in [(1, [1, 2, 4, 5]), (2, [2, 3, 5, 6]), (3, [4, 5, 7, 8])] {
            domain
                .add_element(
                    ElementId(e),
                    Shape::Square,
                    corners.into_iter().map(NodeId).collect(),
                    ElementBasis::cubic_hermite(Shape::Square),
                )
                .unwrap();
        }
        (domain, field)
    }

    #[test]
    fn shared_edges_count_once() {
        let (domain, field) = uneven_plate();
        let update =
            smooth_derivatives(&domain, &field, &[NodeId(5)], &SmoothOptions::default()).unwrap();
        assert!((d1(&update, 5) - 1.5).abs() < 1e-9);

        let harmonic = SmoothOptions {
            mode: SmoothMode::Harmonic,
            ..SmoothOptions::default()
        };
        let update = smooth_derivatives(&domain, &field, &[NodeId(5)], &harmonic).unwrap();
        assert!((d1(&update, 5) - 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn adjusted_directions_follow_edges() {
        let (domain, mut field) = uneven_line();
        field.set_parameter(NodeId(2), ValueLabel::D1, vec![0.0, 1.0, 0.0]).unwrap();
        let options = SmoothOptions {
            adjust_directions: true,
            ..SmoothOptions::default()
        };
        let update = smooth_derivatives(&domain, &field, &[NodeId(2)], &options).unwrap();
        let edit = &update.edits[0];
        assert!(edit.value[0] > 0.0);
        assert!(edit.value[1].abs() < 1e-12);
        assert_eq!("harmonic".parse::<SmoothMode>().unwrap(), SmoothMode::Harmonic);
        assert!("geometric".parse::<SmoothMode>().is_err());
    }
}
