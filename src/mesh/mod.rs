//! Domain store: nodes, elements and the faces and lines derived from them.
//!
//! Entities live in identifier-keyed arenas; every relationship is an
//! identifier lookup. Faces and lines are derived by [`Domain::define_faces`]
//! once the elements are in place.

mod ids;
mod ranges;
mod shape;

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

pub use ids::{ElementId, FaceId, LineId, NodeId};
pub use ranges::{format_ranges, format_spans, merge_spans, parse_ranges};
pub use shape::Shape;

use crate::error::{ScaffoldError, ScaffoldResult};
use crate::field::ElementBasis;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub shape: Shape,
    /// Corner nodes in local order.
    pub nodes: Vec<NodeId>,
    pub basis: ElementBasis,
}

impl Element {
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.shape.dimension()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub id: FaceId,
    /// Distinct corner nodes in the local order of the first element using the face.
    pub nodes: Vec<NodeId>,
    pub lines: Vec<LineId>,
    pub elements: Vec<ElementId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub id: LineId,
    pub nodes: [NodeId; 2],
    pub elements: Vec<ElementId>,
}

/// Finite-element domain of one scaffold generation.
#[derive(Debug, Clone, Default)]
pub struct Domain {
    dimension: usize,
    nodes: BTreeSet<NodeId>,
    elements: BTreeMap<ElementId, Element>,
    faces: BTreeMap<FaceId, Face>,
    lines: BTreeMap<LineId, Line>,
    element_faces: BTreeMap<ElementId, Vec<FaceId>>,
    element_lines: BTreeMap<ElementId, Vec<LineId>>,
    face_index: HashMap<Vec<NodeId>, FaceId>,
    line_index: HashMap<(NodeId, NodeId), LineId>,
    node_high_water: u32,
    element_high_water: u32,
}

impl Domain {
    pub fn new(dimension: usize) -> ScaffoldResult<Self> {
        if !(1..=3).contains(&dimension) {
            return Err(ScaffoldError::InvalidDomain(format!(
                "dimension must be 1, 2 or 3, got {dimension}"
            )));
        }
        Ok(Self {
            dimension,
            ..Self::default()
        })
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn add_node(&mut self, id: NodeId) -> ScaffoldResult<()> {
        if id.get() == 0 {
            return Err(ScaffoldError::InvalidDomain("node identifiers start at 1".into()));
        }
        if !self.nodes.insert(id) {
            return Err(ScaffoldError::InvalidDomain(format!("duplicate node {id}")));
        }
        self.node_high_water = self.node_high_water.max(id.get());
        Ok(())
    }

    /// Adds an element. Derived faces and lines are cleared until the next
    /// [`Domain::define_faces`].
    pub fn add_element(
        &mut self,
        id: ElementId,
        shape: Shape,
        nodes: Vec<NodeId>,
        basis: ElementBasis,
    ) -> ScaffoldResult<()> {
        if id.get() == 0 {
            return Err(ScaffoldError::InvalidDomain("element identifiers start at 1".into()));
        }
        if self.elements.contains_key(&id) {
            return Err(ScaffoldError::InvalidDomain(format!("duplicate element {id}")));
        }
        if shape.dimension() != self.dimension {
            return Err(ScaffoldError::InvalidDomain(format!(
                "{shape} element {id} does not fit a {}-D domain",
                self.dimension
            )));
        }
        if nodes.len() != shape.corner_count() {
            return Err(ScaffoldError::InvalidDomain(format!(
                "{shape} element {id} needs {} nodes, got {}",
                shape.corner_count(),
                nodes.len()
            )));
        }
        if let Some(missing) = nodes.iter().find(|n| !self.nodes.contains(n)) {
            return Err(ScaffoldError::UnknownNode(*missing));
        }
        basis.check_shape(shape)?;

        self.clear_derived();
        self.element_high_water = self.element_high_water.max(id.get());
        self.elements.insert(
            id,
            Element {
                id,
                shape,
                nodes,
                basis,
            },
        );
        Ok(())
    }

    fn clear_derived(&mut self) {
        self.faces.clear();
        self.lines.clear();
        self.element_faces.clear();
        self.element_lines.clear();
        self.face_index.clear();
        self.line_index.clear();
    }

    /// Enumerates faces (3-D only) and lines (2-D and up) in element-id order,
    /// deduplicating by corner node set.
    pub fn define_faces(&mut self) {
        self.clear_derived();
        let mut next_face = 1;
        let mut next_line = 1;

        for element in self.elements.values() {
            let local_node = |i: usize| element.nodes[i];

            let mut element_lines = Vec::new();
            if self.dimension >= 2 {
                for [a, b] in element.shape.edges() {
                    let (na, nb) = (local_node(*a), local_node(*b));
                    if na == nb {
                        continue;
                    }
                    let key = line_key(na, nb);
                    let id = *self.line_index.entry(key).or_insert_with(|| {
                        let id = LineId(next_line);
                        next_line += 1;
                        self.lines.insert(
                            id,
                            Line {
                                id,
                                nodes: [na, nb],
                                elements: Vec::new(),
                            },
                        );
                        id
                    });
                    if let Some(line) = self.lines.get_mut(&id) {
                        push_unique(&mut line.elements, element.id);
                    }
                    push_unique(&mut element_lines, id);
                }
            }

            let mut element_faces = Vec::new();
            if self.dimension == 3 {
                for corners in element.shape.faces() {
                    let mut nodes: Vec<NodeId> = Vec::with_capacity(corners.len());
                    for c in *corners {
                        push_unique(&mut nodes, local_node(*c));
                    }
                    if nodes.len() < 3 {
                        continue;
                    }
                    let key = face_key(&nodes);
                    let face_lines: Vec<LineId> = element
                        .shape
                        .edges()
                        .iter()
                        .filter(|[a, b]| corners.contains(a) && corners.contains(b))
                        .filter_map(|[a, b]| {
                            self.line_index
                                .get(&line_key(local_node(*a), local_node(*b)))
                                .copied()
                        })
                        .collect();
                    let id = *self.face_index.entry(key).or_insert_with(|| {
                        let id = FaceId(next_face);
                        next_face += 1;
                        self.faces.insert(
                            id,
                            Face {
                                id,
                                nodes,
                                lines: face_lines,
                                elements: Vec::new(),
                            },
                        );
                        id
                    });
                    if let Some(face) = self.faces.get_mut(&id) {
                        push_unique(&mut face.elements, element.id);
                    }
                    push_unique(&mut element_faces, id);
                }
            }

            self.element_lines.insert(element.id, element_lines);
            self.element_faces.insert(element.id, element_faces);
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.elements.values()
    }

    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn element(&self, id: ElementId) -> ScaffoldResult<&Element> {
        self.elements
            .get(&id)
            .ok_or(ScaffoldError::UnknownElement(id))
    }

    #[must_use]
    pub fn contains_element(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn faces(&self) -> impl Iterator<Item = &Face> + '_ {
        self.faces.values()
    }

    #[must_use]
    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(&id)
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> + '_ {
        self.lines.values()
    }

    #[must_use]
    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(&id)
    }

    #[must_use]
    pub fn element_faces(&self, id: ElementId) -> &[FaceId] {
        self.element_faces.get(&id).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn element_lines(&self, id: ElementId) -> &[LineId] {
        self.element_lines.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Face whose distinct corner nodes are exactly `nodes`, in any order.
    #[must_use]
    pub fn face_with_nodes(&self, nodes: &[NodeId]) -> Option<FaceId> {
        self.face_index.get(&face_key(nodes)).copied()
    }

    #[must_use]
    pub fn line_with_nodes(&self, a: NodeId, b: NodeId) -> Option<LineId> {
        self.line_index.get(&line_key(a, b)).copied()
    }

    /// Elements using `node` as a corner, in id order.
    #[must_use]
    pub fn node_elements(&self, node: NodeId) -> Vec<ElementId> {
        self.elements
            .values()
            .filter(|e| e.nodes.contains(&node))
            .map(|e| e.id)
            .collect()
    }

    /// Highest node identifier ever used in this domain, including deleted ones.
    #[must_use]
    pub const fn node_high_water(&self) -> u32 {
        self.node_high_water
    }

    #[must_use]
    pub const fn element_high_water(&self) -> u32 {
        self.element_high_water
    }

    #[must_use]
    pub const fn next_node_id(&self) -> NodeId {
        NodeId(self.node_high_water + 1)
    }

    #[must_use]
    pub const fn next_element_id(&self) -> ElementId {
        ElementId(self.element_high_water + 1)
    }

    /// Hash of element ids, shapes and node lists.
    #[must_use]
    pub fn topology_fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.dimension.hash(&mut hasher);
        for element in self.elements.values() {
            element.id.hash(&mut hasher);
            element.shape.hash(&mut hasher);
            element.nodes.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Sub-domain of the elements accepted by `keep` plus the faces, lines and
    /// nodes they reference. Identifiers and high-water marks are preserved.
    #[must_use]
    pub fn filtered(&self, keep: impl Fn(&Element) -> bool) -> Self {
        let elements: BTreeMap<ElementId, Element> = self
            .elements
            .iter()
            .filter(|(_, e)| keep(e))
            .map(|(id, e)| (*id, e.clone()))
            .collect();

        let nodes: BTreeSet<NodeId> = elements
            .values()
            .flat_map(|e| e.nodes.iter().copied())
            .collect();

        let faces: BTreeMap<FaceId, Face> = self
            .faces
            .iter()
            .filter_map(|(id, face)| {
                let users: Vec<ElementId> = face
                    .elements
                    .iter()
                    .copied()
                    .filter(|e| elements.contains_key(e))
                    .collect();
                (!users.is_empty()).then(|| {
                    (
                        *id,
                        Face {
                            elements: users,
                            ..face.clone()
                        },
                    )
                })
            })
            .collect();

        let lines: BTreeMap<LineId, Line> = self
            .lines
            .iter()
            .filter_map(|(id, line)| {
                let users: Vec<ElementId> = line
                    .elements
                    .iter()
                    .copied()
                    .filter(|e| elements.contains_key(e))
                    .collect();
                (!users.is_empty()).then(|| {
                    (
                        *id,
                        Line {
                            elements: users,
                            ..line.clone()
                        },
                    )
                })
            })
            .collect();

        let mut domain = Self {
            dimension: self.dimension,
            element_faces: retain_keys(&self.element_faces, &elements),
            element_lines: retain_keys(&self.element_lines, &elements),
            nodes,
            elements,
            faces,
            lines,
            face_index: HashMap::new(),
            line_index: HashMap::new(),
            node_high_water: self.node_high_water,
            element_high_water: self.element_high_water,
        };
        domain.rebuild_indices();
        domain
    }

    /// Identifier-wise union of two domains cut from the same parent.
    pub fn union(&self, other: &Self) -> ScaffoldResult<Self> {
        if self.dimension != other.dimension {
            return Err(ScaffoldError::InvalidDomain(format!(
                "cannot merge a {}-D domain with a {}-D domain",
                self.dimension, other.dimension
            )));
        }
        let mut merged = self.clone();
        merged.nodes.extend(other.nodes.iter().copied());

        for (id, element) in &other.elements {
            match merged.elements.get(id) {
                Some(existing) if existing != element => {
                    return Err(ScaffoldError::InvalidDomain(format!(
                        "element {id} differs between merged domains"
                    )));
                }
                Some(_) => {}
                None => {
                    merged.elements.insert(*id, element.clone());
                }
            }
        }
        for (id, face) in &other.faces {
            let entry = merged.faces.entry(*id).or_insert_with(|| Face {
                elements: Vec::new(),
                ..face.clone()
            });
            if entry.nodes != face.nodes {
                return Err(ScaffoldError::InvalidDomain(format!(
                    "face {id} differs between merged domains"
                )));
            }
            for e in &face.elements {
                push_unique(&mut entry.elements, *e);
            }
            entry.elements.sort_unstable();
        }
        for (id, line) in &other.lines {
            let entry = merged.lines.entry(*id).or_insert_with(|| Line {
                elements: Vec::new(),
                ..line.clone()
            });
            if entry.nodes != line.nodes {
                return Err(ScaffoldError::InvalidDomain(format!(
                    "line {id} differs between merged domains"
                )));
            }
            for e in &line.elements {
                push_unique(&mut entry.elements, *e);
            }
            entry.elements.sort_unstable();
        }
        for (id, faces) in &other.element_faces {
            merged.element_faces.entry(*id).or_insert_with(|| faces.clone());
        }
        for (id, lines) in &other.element_lines {
            merged.element_lines.entry(*id).or_insert_with(|| lines.clone());
        }
        merged.node_high_water = self.node_high_water.max(other.node_high_water);
        merged.element_high_water = self.element_high_water.max(other.element_high_water);
        merged.rebuild_indices();
        Ok(merged)
    }

    fn rebuild_indices(&mut self) {
        self.face_index = self
            .faces
            .values()
            .map(|f| (face_key(&f.nodes), f.id))
            .collect();
        self.line_index = self
            .lines
            .values()
            .map(|l| (line_key(l.nodes[0], l.nodes[1]), l.id))
            .collect();
    }
}

fn line_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b { (a, b) } else { (b, a) }
}

fn face_key(nodes: &[NodeId]) -> Vec<NodeId> {
    let mut key = nodes.to_vec();
    key.sort_unstable();
    key.dedup();
    key
}

fn retain_keys<T: Clone>(
    map: &BTreeMap<ElementId, T>,
    kept: &BTreeMap<ElementId, Element>,
) -> BTreeMap<ElementId, T> {
    map.iter()
        .filter(|(id, _)| kept.contains_key(id))
        .map(|(id, v)| (*id, v.clone()))
        .collect()
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two cubes sharing the face x = 1.
    fn two_cubes() -> Domain {
        let mut domain = Domain::new(3).unwrap();
        for id in 1..=12 {
            domain.add_node(NodeId(id)).unwrap();
        }
        // node layout: i + 3*j + 6*k + 1 for i in 0..3, j in 0..2, k in 0..2
        let n = |i: u32, j: u32, k: u32| NodeId(i + 3 * j + 6 * k + 1);
        for e in 0..2 {
            let nodes = vec![
                n(e, 0, 0),
                n(e + 1, 0, 0),
                n(e, 1, 0),
                n(e + 1, 1, 0),
                n(e, 0, 1),
                n(e + 1, 0, 1),
                n(e, 1, 1),
                n(e + 1, 1, 1),
            ];
            domain
                .add_element(ElementId(e + 1), Shape::Cube, nodes, ElementBasis::linear(Shape::Cube))
                .unwrap();
        }
        domain.define_faces();
        domain
    }

    #[test]
    fn shared_faces_and_lines_are_deduplicated() {
        let domain = two_cubes();
        assert_eq!(domain.faces().count(), 11);
        assert_eq!(domain.lines().count(), 20);

        let shared = domain
            .face_with_nodes(&[NodeId(2), NodeId(5), NodeId(8), NodeId(11)])
            .unwrap();
        assert_eq!(
            domain.face(shared).unwrap().elements,
            vec![ElementId(1), ElementId(2)]
        );
        assert_eq!(domain.element_faces(ElementId(2)).len(), 6);
    }

    #[test]
    fn face_ids_follow_element_order() {
        let domain = two_cubes();
        let first: Vec<FaceId> = domain.element_faces(ElementId(1)).to_vec();
        assert_eq!(first, (1..=6).map(FaceId).collect::<Vec<_>>());
    }

    #[test]
    fn add_element_rejects_bad_input() {
        let mut domain = Domain::new(2).unwrap();
        domain.add_node(NodeId(1)).unwrap();
        let err = domain
            .add_element(
                ElementId(1),
                Shape::Cube,
                vec![NodeId(1); 8],
                ElementBasis::linear(Shape::Cube),
            )
            .unwrap_err();
        assert!(matches!(err, ScaffoldError::InvalidDomain(_)));

        let err = domain
            .add_element(
                ElementId(1),
                Shape::Square,
                vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)],
                ElementBasis::linear(Shape::Square),
            )
            .unwrap_err();
        assert_eq!(err, ScaffoldError::UnknownNode(NodeId(2)));
        assert!(Domain::new(4).is_err());
    }

    #[test]
    fn filtered_keeps_ids_and_high_water() {
        let domain = two_cubes();
        let kept = domain.filtered(|e| e.id == ElementId(2));
        assert_eq!(kept.element_count(), 1);
        assert_eq!(kept.node_count(), 8);
        assert_eq!(kept.faces().count(), 6);
        assert_eq!(kept.next_element_id(), ElementId(3));
        assert_eq!(kept.next_node_id(), NodeId(13));
        assert!(!kept.contains_node(NodeId(1)));
    }

    #[test]
    fn filtered_union_restores_original() {
        let domain = two_cubes();
        let a = domain.filtered(|e| e.id == ElementId(1));
        let b = domain.filtered(|e| e.id != ElementId(1));
        let merged = a.union(&b).unwrap();
        assert_eq!(merged.nodes().collect::<Vec<_>>(), domain.nodes().collect::<Vec<_>>());
        assert_eq!(merged.faces().cloned().collect::<Vec<_>>(), domain.faces().cloned().collect::<Vec<_>>());
        assert_eq!(merged.lines().cloned().collect::<Vec<_>>(), domain.lines().cloned().collect::<Vec<_>>());
        assert_eq!(merged.topology_fingerprint(), domain.topology_fingerprint());
    }

    #[test]
    fn fingerprint_tracks_connectivity() {
        let domain = two_cubes();
        let smaller = domain.filtered(|e| e.id == ElementId(1));
        assert_ne!(domain.topology_fingerprint(), smaller.topology_fingerprint());
        assert_eq!(domain.topology_fingerprint(), two_cubes().topology_fingerprint());
    }
}
