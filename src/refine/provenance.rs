use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mesh::{ElementId, FaceId, LineId, NodeId};

/// Base element and lattice cell a refined element came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementOrigin {
    pub base: ElementId,
    pub cell: [usize; 3],
}

/// Contiguous refined element ids of one base element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementBlock {
    pub first: ElementId,
    pub count: u32,
    /// Lattice counts per local axis, 1 beyond the element's dimension.
    pub counts: [usize; 3],
}

impl ElementBlock {
    pub fn ids(self) -> impl Iterator<Item = ElementId> {
        (self.first.get()..self.first.get() + self.count).map(ElementId)
    }
}

/// Where a refined node sits in the base mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOrigin {
    /// First base element the node was created in.
    pub element: ElementId,
    pub xi: Vec<f64>,
    /// The base node it coincides with, if any.
    pub base_node: Option<NodeId>,
}

/// Base entity containing a refined face or line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityOrigin {
    Element(ElementId),
    Face(FaceId),
    Line(LineId),
}

/// Mapping from every refined entity back to the base mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub(crate) elements: BTreeMap<ElementId, ElementOrigin>,
    pub(crate) blocks: BTreeMap<ElementId, ElementBlock>,
    pub(crate) nodes: BTreeMap<NodeId, NodeOrigin>,
    pub(crate) faces: BTreeMap<FaceId, EntityOrigin>,
    pub(crate) lines: BTreeMap<LineId, EntityOrigin>,
}

impl Provenance {
    #[must_use]
    pub fn element_origin(&self, refined: ElementId) -> Option<&ElementOrigin> {
        self.elements.get(&refined)
    }

    #[must_use]
    pub fn to_base(&self, refined: ElementId) -> Option<ElementId> {
        self.elements.get(&refined).map(|o| o.base)
    }

    #[must_use]
    pub fn block(&self, base: ElementId) -> Option<ElementBlock> {
        self.blocks.get(&base).copied()
    }

    /// Refined elements of `base`, in lattice order.
    #[must_use]
    pub fn to_refined(&self, base: ElementId) -> Vec<ElementId> {
        self.block(base).map(|b| b.ids().collect()).unwrap_or_default()
    }

    #[must_use]
    pub fn node_origin(&self, refined: NodeId) -> Option<&NodeOrigin> {
        self.nodes.get(&refined)
    }

    /// Refined node standing on `base`.
    #[must_use]
    pub fn node_for_base(&self, base: NodeId) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, o)| o.base_node == Some(base))
            .map(|(id, _)| *id)
    }

    #[must_use]
    pub fn face_origin(&self, refined: FaceId) -> Option<EntityOrigin> {
        self.faces.get(&refined).copied()
    }

    #[must_use]
    pub fn line_origin(&self, refined: LineId) -> Option<EntityOrigin> {
        self.lines.get(&refined).copied()
    }
}
