//! Refinement of tensor-product elements into regular linear lattices.
//!
//! Each base `Line`, `Square` or `Cube` element becomes an `n1 x n2 x n3`
//! block of linear elements with consecutive ids. Lattice points on shared
//! base nodes, lines and faces are merged through canonical keys; when
//! neighbouring elements use different counts the shared points cannot
//! match and are reported as non-conformant duplicates. Only the primary
//! coordinate field is carried over, sampled at the lattice points.

mod lattice;
mod provenance;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

pub use provenance::{ElementBlock, ElementOrigin, EntityOrigin, NodeOrigin, Provenance};

use crate::annotation::{AnnotationGroup, AnnotationRegistry, Marker, Membership};
use crate::error::{ScaffoldError, ScaffoldResult};
use crate::field::{ElementBasis, Field, FieldStore, MeshLocation, ValueLabel};
use crate::mesh::{Domain, ElementId, NodeId, Shape};
use lattice::{LatticeKey, SharedEntity, classify, interior_points};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineOptions {
    /// Elements per local axis; axes beyond an element's dimension are ignored.
    pub counts: [usize; 3],
    pub per_element: BTreeMap<ElementId, [usize; 3]>,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            counts: [4, 4, 4],
            per_element: BTreeMap::new(),
        }
    }
}

impl RefineOptions {
    #[must_use]
    pub fn uniform(count: usize) -> Self {
        Self {
            counts: [count; 3],
            per_element: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn counts_for(&self, element: ElementId) -> [usize; 3] {
        self.per_element.get(&element).copied().unwrap_or(self.counts)
    }

    fn validate(&self) -> ScaffoldResult<()> {
        let all = std::iter::once(&self.counts).chain(self.per_element.values());
        for counts in all {
            if counts.contains(&0) {
                return Err(ScaffoldError::invalid_parameter(
                    "refine counts",
                    format!("{counts:?} must all be at least 1"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefinementReport {
    pub base_elements: usize,
    pub elements: usize,
    pub nodes: usize,
    /// Lattice points left unshared on base lines and faces refined with
    /// different counts from either side.
    pub duplicates: usize,
    pub nonconformant_entities: usize,
    pub warnings: Vec<String>,
}

impl RefinementReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.duplicates == 0 && self.warnings.is_empty()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "B:{} E:{} N:{}",
            self.base_elements, self.elements, self.nodes
        );
        if self.duplicates > 0 {
            summary.push_str(&format!(" dup:{}", self.duplicates));
        }
        summary
    }
}

impl fmt::Display for RefinementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Refinement:")?;
        writeln!(f, "  Base elements: {}", self.base_elements)?;
        writeln!(f, "  Refined elements: {}", self.elements)?;
        writeln!(f, "  Refined nodes: {}", self.nodes)?;
        if self.duplicates > 0 {
            writeln!(
                f,
                "  Non-conformant: {} nodes on {} entities",
                self.duplicates, self.nonconformant_entities
            )?;
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

/// Linear mesh produced by [`refine`].
#[derive(Debug, Clone)]
pub struct RefinedMesh {
    pub domain: Domain,
    /// The sampled primary coordinate field, under its original name.
    pub fields: FieldStore,
    pub provenance: Provenance,
    pub report: RefinementReport,
}

struct SampleJob {
    node: NodeId,
    element: ElementId,
    xi: Vec<f64>,
}

/// Refines every element of `domain`, sampling the primary coordinate field of `fields`.
pub fn refine(domain: &Domain, fields: &FieldStore, options: &RefineOptions) -> ScaffoldResult<RefinedMesh> {
    options.validate()?;
    if let Some(element) = domain
        .elements()
        .find(|e| !matches!(e.shape, Shape::Line | Shape::Square | Shape::Cube))
    {
        return Err(ScaffoldError::UnsupportedShape {
            element: element.id,
            shape: element.shape,
        });
    }
    let coordinates = fields.primary()?;

    let mut keys: HashMap<LatticeKey, NodeId> = HashMap::new();
    let mut signatures: BTreeMap<SharedEntity, BTreeSet<Vec<usize>>> = BTreeMap::new();
    let mut provenance = Provenance::default();
    let mut jobs: Vec<SampleJob> = Vec::new();
    let mut refined_elements: Vec<(ElementId, Shape, Vec<NodeId>)> = Vec::new();
    let mut next_node = 1_u32;
    let mut next_element = 1_u32;

    for element in domain.elements() {
        let dim = element.dimension();
        let counts = active_counts(options.counts_for(element.id), dim);
        let points = lattice_indices(&counts.map(|n| n + 1), dim);

        let mut local: Vec<NodeId> = Vec::with_capacity(points.len());
        for index in &points {
            let classified = classify(element, counts, *index);
            if let Some((entity, signature)) = classified.shared {
                signatures.entry(entity).or_default().insert(signature);
            }
            let base_node = match classified.key {
                LatticeKey::Node(node) => Some(node),
                _ => None,
            };
            let node = *keys.entry(classified.key).or_insert_with(|| {
                let id = NodeId(next_node);
                next_node += 1;
                let xi = unit_xi(index, &counts, dim);
                jobs.push(SampleJob {
                    node: id,
                    element: element.id,
                    xi: xi.clone(),
                });
                provenance.nodes.insert(
                    id,
                    NodeOrigin {
                        element: element.id,
                        xi,
                        base_node,
                    },
                );
                id
            });
            local.push(node);
        }

        let cells = lattice_indices(&counts, dim);
        provenance.blocks.insert(
            element.id,
            ElementBlock {
                first: ElementId(next_element),
                count: u32::try_from(cells.len()).unwrap_or(u32::MAX),
                counts,
            },
        );
        for cell in cells {
            let id = ElementId(next_element);
            next_element += 1;
            let nodes = corner_offsets(dim)
                .iter()
                .map(|offset| {
                    let index: [usize; 3] = std::array::from_fn(|a| cell[a] + offset[a]);
                    local[flat_index(&index, &counts, dim)]
                })
                .collect();
            provenance.elements.insert(
                id,
                ElementOrigin {
                    base: element.id,
                    cell,
                },
            );
            refined_elements.push((id, element.shape, nodes));
        }
    }

    let mut refined = Domain::new(domain.dimension())?;
    for id in provenance.nodes.keys() {
        refined.add_node(*id)?;
    }
    for (id, shape, nodes) in refined_elements {
        refined.add_element(id, shape, nodes, ElementBasis::linear(shape))?;
    }
    refined.define_faces();

    let mut field = Field::new(coordinates.name.clone(), coordinates.role, coordinates.components);
    for (node, value) in sample(coordinates, domain, &jobs)? {
        field.set_parameter(node, ValueLabel::Value, value)?;
    }
    let mut refined_fields = FieldStore::new();
    let name = field.name.clone();
    refined_fields.insert(field);
    refined_fields.set_primary(&name)?;

    locate_faces_and_lines(domain, &refined, &mut provenance);

    let mut report = RefinementReport {
        base_elements: domain.element_count(),
        elements: refined.element_count(),
        nodes: refined.node_count(),
        ..RefinementReport::default()
    };
    for signatures in signatures.values().filter(|s| s.len() > 1) {
        report.nonconformant_entities += 1;
        report.duplicates += signatures.iter().map(|s| interior_points(s)).sum::<usize>();
    }
    if report.duplicates > 0 {
        let warning = ScaffoldError::NonconformantRefinement {
            duplicates: report.duplicates,
            entities: report.nonconformant_entities,
        }
        .to_string();
        log::warn!("{warning}");
        report.add_warning(warning);
    }
    log::debug!("refined {}", report.summary());

    Ok(RefinedMesh {
        domain: refined,
        fields: refined_fields,
        provenance,
        report,
    })
}

/// Counts with the axes beyond `dim` collapsed to 1.
fn active_counts(counts: [usize; 3], dim: usize) -> [usize; 3] {
    std::array::from_fn(|a| if a < dim { counts[a] } else { 1 })
}

/// Every index below `bounds` on the first `dim` axes, first axis fastest.
fn lattice_indices(bounds: &[usize; 3], dim: usize) -> Vec<[usize; 3]> {
    let mut out = vec![[0; 3]];
    for axis in 0..dim {
        out = (0..bounds[axis])
            .flat_map(|i| {
                out.iter().map(move |prefix| {
                    let mut index = *prefix;
                    index[axis] = i;
                    index
                })
            })
            .collect();
    }
    out
}

fn flat_index(index: &[usize; 3], counts: &[usize; 3], dim: usize) -> usize {
    let mut flat = 0;
    let mut stride = 1;
    for axis in 0..dim {
        flat += index[axis] * stride;
        stride *= counts[axis] + 1;
    }
    flat
}

fn corner_offsets(dim: usize) -> Vec<[usize; 3]> {
    lattice_indices(&[2; 3], dim)
}

#[allow(clippy::cast_precision_loss)]
fn unit_xi(index: &[usize; 3], counts: &[usize; 3], dim: usize) -> Vec<f64> {
    (0..dim).map(|a| index[a] as f64 / counts[a] as f64).collect()
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        fn sample(field: &Field, domain: &Domain, jobs: &[SampleJob]) -> ScaffoldResult<Vec<(NodeId, Vec<f64>)>> {
            use rayon::prelude::*;
            jobs.par_iter()
                .map(|job| Ok((job.node, field.evaluate(domain, job.element, &job.xi, false)?.value)))
                .collect()
        }
    } else {
        fn sample(field: &Field, domain: &Domain, jobs: &[SampleJob]) -> ScaffoldResult<Vec<(NodeId, Vec<f64>)>> {
            jobs.iter()
                .map(|job| Ok((job.node, field.evaluate(domain, job.element, &job.xi, false)?.value)))
                .collect()
        }
    }
}

/// Lattice index of each corner of a refined element within its base element.
fn corner_lattice(origin: &ElementOrigin, dim: usize) -> Vec<[usize; 3]> {
    corner_offsets(dim)
        .iter()
        .map(|offset| std::array::from_fn(|a| origin.cell[a] + offset[a]))
        .collect()
}

fn locate_faces_and_lines(base: &Domain, refined: &Domain, provenance: &mut Provenance) {
    let mut faces = BTreeMap::new();
    for face in refined.faces() {
        let origin = entity_origin(base, refined, provenance, &face.nodes, face.elements.first().copied());
        faces.insert(face.id, origin);
    }
    let mut lines = BTreeMap::new();
    for line in refined.lines() {
        let origin = entity_origin(base, refined, provenance, &line.nodes, line.elements.first().copied());
        lines.insert(line.id, origin);
    }
    provenance.faces = faces;
    provenance.lines = lines;
}

/// Smallest base entity containing the refined entity with corner `nodes`.
fn entity_origin(
    base: &Domain,
    refined: &Domain,
    provenance: &Provenance,
    nodes: &[NodeId],
    user: Option<ElementId>,
) -> EntityOrigin {
    let Some((refined_element, origin)) = user.and_then(|id| {
        let element = refined.element(id).ok()?;
        Some((element, provenance.element_origin(id)?))
    }) else {
        return EntityOrigin::Element(ElementId(0));
    };
    let fallback = EntityOrigin::Element(origin.base);
    let Ok(base_element) = base.element(origin.base) else {
        return fallback;
    };
    let Some(block) = provenance.block(origin.base) else {
        return fallback;
    };
    let dim = base_element.dimension();
    let lattice = corner_lattice(origin, dim);
    let indices: Vec<[usize; 3]> = nodes
        .iter()
        .filter_map(|n| refined_element.nodes.iter().position(|m| m == n))
        .map(|corner| lattice[corner])
        .collect();

    // axes on which every corner sits on the same side of the base element
    let fixed: Vec<(usize, usize)> = (0..dim)
        .filter_map(|a| {
            if indices.iter().all(|i| i[a] == 0) {
                Some((a, 0))
            } else if indices.iter().all(|i| i[a] == block.counts[a]) {
                Some((a, 1))
            } else {
                None
            }
        })
        .collect();
    let corners: Vec<NodeId> = (0..base_element.shape.corner_count())
        .filter(|k| fixed.iter().all(|(a, side)| (k >> a) & 1 == *side))
        .map(|k| base_element.nodes[k])
        .collect();
    match (dim - fixed.len(), corners.as_slice()) {
        (1, [a, b]) if dim > 1 => base.line_with_nodes(*a, *b).map_or(fallback, EntityOrigin::Line),
        (2, _) if dim > 2 => base.face_with_nodes(&corners).map_or(fallback, EntityOrigin::Face),
        _ => fallback,
    }
}

impl RefinedMesh {
    /// Location in the refined mesh of a base-mesh location.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn refined_location(&self, location: &MeshLocation) -> Option<MeshLocation> {
        let block = self.provenance.block(location.element)?;
        let mut cell = [0_usize; 3];
        let mut xi = Vec::with_capacity(location.xi.len());
        for (a, x) in location.xi.iter().enumerate() {
            let n = block.counts[a] as f64;
            let c = ((x * n).floor().max(0.0) as usize).min(block.counts[a] - 1);
            cell[a] = c;
            xi.push((x * n - c as f64).clamp(0.0, 1.0));
        }
        let offset = cell
            .iter()
            .zip(block.counts)
            .rev()
            .fold(0, |acc, (c, n)| acc * n + c);
        let element = ElementId(block.first.get() + u32::try_from(offset).ok()?);
        Some(MeshLocation { element, xi })
    }

    /// User and built-in annotations of the base mesh mapped onto this mesh.
    /// Groups left without members are dropped.
    #[must_use]
    pub fn transfer_annotations(&self, annotations: &AnnotationRegistry) -> AnnotationRegistry {
        let mut groups = Vec::new();
        for group in annotations.groups() {
            let selection = self.map_selection(&group.members.selection());
            let Ok((dimension, members)) = selection.close(&self.domain) else {
                log::warn!("group `{}` has no refined members", group.name);
                continue;
            };
            groups.push(AnnotationGroup {
                dimension,
                members,
                ..group.clone()
            });
        }
        let markers: Vec<Marker> = annotations
            .markers()
            .filter_map(|marker| {
                Some(Marker {
                    location: self.refined_location(&marker.location)?,
                    ..marker.clone()
                })
            })
            .collect();
        let mut registry = AnnotationRegistry::from_parts(groups, markers);
        registry.renumber_markers(&self.domain);
        registry
    }

    fn map_selection(&self, selection: &Membership) -> Membership {
        let p = &self.provenance;
        Membership {
            elements: selection
                .elements
                .iter()
                .flat_map(|e| p.to_refined(*e))
                .collect(),
            faces: p
                .faces
                .iter()
                .filter(|(_, o)| matches!(o, EntityOrigin::Face(f) if selection.faces.contains(f)))
                .map(|(id, _)| *id)
                .collect(),
            lines: p
                .lines
                .iter()
                .filter(|(_, o)| matches!(o, EntityOrigin::Line(l) if selection.lines.contains(l)))
                .map(|(id, _)| *id)
                .collect(),
            nodes: p
                .nodes
                .iter()
                .filter(|(_, o)| o.base_node.is_some_and(|n| selection.nodes.contains(&n)))
                .map(|(id, _)| *id)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldRole;

    /// Two unit squares side by side with a linear geometric field.
    fn squares() -> (Domain, FieldStore) {
        let mut domain = Domain::new(2).unwrap();
        let mut coordinates = Field::new("coordinates", FieldRole::Geometric, 2);
        for (i, c) in [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [0.0, 1.0], [1.0, 1.0], [2.0, 1.0]]
            .iter()
            .enumerate()
        {
            let id = NodeId(i as u32 + 1);
            domain.add_node(id).unwrap();
            coordinates.set_parameter(id, ValueLabel::Value, c.to_vec()).unwrap();
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
        let mut fields = FieldStore::new();
        fields.insert(coordinates);
        (domain, fields)
    }

    #[test]
    fn matching_counts_share_nodes() {
        let (domain, fields) = squares();
        let refined = refine(&domain, &fields, &RefineOptions::uniform(2)).unwrap();
        assert_eq!(refined.domain.node_count(), 15);
        assert_eq!(refined.domain.element_count(), 8);
        assert_eq!(refined.report.duplicates, 0);
        assert!(refined.report.is_clean());
        assert_eq!(refined.provenance.to_refined(ElementId(2)).len(), 4);
        assert_eq!(refined.provenance.to_base(ElementId(5)), Some(ElementId(2)));
    }

    #[test]
    fn mismatched_counts_are_reported() {
        let (domain, fields) = squares();
        let mut options = RefineOptions::uniform(2);
        options.per_element.insert(ElementId(2), [3, 3, 3]);
        let refined = refine(&domain, &fields, &options).unwrap();
        assert_eq!(refined.domain.node_count(), 23);
        assert_eq!(refined.report.duplicates, 3);
        assert_eq!(refined.report.nonconformant_entities, 1);
        assert_eq!(refined.report.warnings.len(), 1);
    }

    #[test]
    fn samples_coordinates_at_lattice_points() {
        let (domain, fields) = squares();
        let refined = refine(&domain, &fields, &RefineOptions::uniform(2)).unwrap();
        let coordinates = refined.fields.primary().unwrap();
        for (node, origin) in &refined.provenance.nodes {
            let expected = fields
                .evaluate("coordinates", &domain, origin.element, &origin.xi, false)
                .unwrap()
                .value;
            assert_eq!(coordinates.parameter(*node, ValueLabel::Value), Some(expected.as_slice()));
        }
        let base_two = refined.provenance.node_for_base(NodeId(2)).unwrap();
        assert_eq!(coordinates.parameter(base_two, ValueLabel::Value), Some(&[1.0, 0.0][..]));
    }

    #[test]
    fn boundary_lines_trace_back_to_base_lines() {
        let (domain, fields) = squares();
        let refined = refine(&domain, &fields, &RefineOptions::uniform(2)).unwrap();
        let shared = domain.line_with_nodes(NodeId(2), NodeId(5)).unwrap();
        let on_shared = refined
            .domain
            .lines()
            .filter(|l| refined.provenance.line_origin(l.id) == Some(EntityOrigin::Line(shared)))
            .count();
        assert_eq!(on_shared, 2);
        let interior = refined
            .domain
            .lines()
            .filter(|l| matches!(refined.provenance.line_origin(l.id), Some(EntityOrigin::Element(_))))
            .count();
        assert_eq!(interior, 8);
    }

    #[test]
    fn locations_map_into_blocks() {
        let (domain, fields) = squares();
        let refined = refine(&domain, &fields, &RefineOptions::uniform(2)).unwrap();
        let location = refined
            .refined_location(&MeshLocation {
                element: ElementId(2),
                xi: vec![0.75, 0.25],
            })
            .unwrap();
        assert_eq!(location.element, ElementId(6));
        assert!((location.xi[0] - 0.5).abs() < 1e-12);
        assert!((location.xi[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn simplex_elements_are_rejected() {
        let mut domain = Domain::new(2).unwrap();
        for id in 1..=3 {
            domain.add_node(NodeId(id)).unwrap();
        }
        domain
            .add_element(
                ElementId(1),
                Shape::Triangle,
                vec![NodeId(1), NodeId(2), NodeId(3)],
                ElementBasis::linear(Shape::Triangle),
            )
            .unwrap();
        let err = refine(&domain, &FieldStore::new(), &RefineOptions::default()).unwrap_err();
        assert!(matches!(err, ScaffoldError::UnsupportedShape { .. }));
    }
}
