use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ScaffoldError, ScaffoldResult};
use crate::mesh::{Domain, ElementId, FaceId, LineId, NodeId};

/// Term id used for groups without an ontology term.
pub const NO_TERM: &str = "None";

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum GroupKind {
    /// Created by the generator; immutable.
    Builtin,
    UserDefined,
}

/// Domain objects by dimension. Used both for a raw selection and for a
/// group's closed membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Membership {
    pub elements: BTreeSet<ElementId>,
    pub faces: BTreeSet<FaceId>,
    pub lines: BTreeSet<LineId>,
    pub nodes: BTreeSet<NodeId>,
}

impl Membership {
    #[must_use]
    pub fn of_elements(ids: impl IntoIterator<Item = ElementId>) -> Self {
        Self {
            elements: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn of_faces(ids: impl IntoIterator<Item = FaceId>) -> Self {
        Self {
            faces: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn of_lines(ids: impl IntoIterator<Item = LineId>) -> Self {
        Self {
            lines: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn of_nodes(ids: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            nodes: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.faces.is_empty() && self.lines.is_empty() && self.nodes.is_empty()
    }

    /// Dimension of the highest selected objects in `domain`.
    #[must_use]
    pub fn highest_dimension(&self, domain: &Domain) -> Option<usize> {
        if !self.elements.is_empty() {
            Some(domain.dimension())
        } else if !self.faces.is_empty() {
            Some(2)
        } else if !self.lines.is_empty() {
            Some(1)
        } else if !self.nodes.is_empty() {
            Some(0)
        } else {
            None
        }
    }

    /// Keeps the highest-dimension objects of the selection and adds their
    /// faces, lines and nodes.
    pub fn close(&self, domain: &Domain) -> ScaffoldResult<(usize, Self)> {
        let dimension = self.highest_dimension(domain).ok_or_else(|| {
            ScaffoldError::invalid_parameter("selection", "nothing is selected")
        })?;
        let mut closed = Self::default();
        if dimension == domain.dimension() && !self.elements.is_empty() {
            for id in &self.elements {
                let element = domain.element(*id)?;
                closed.elements.insert(*id);
                closed.faces.extend(domain.element_faces(*id));
                closed.lines.extend(domain.element_lines(*id));
                closed.nodes.extend(&element.nodes);
            }
        } else if !self.faces.is_empty() {
            for id in &self.faces {
                let face = domain
                    .face(*id)
                    .ok_or_else(|| ScaffoldError::InvalidDomain(format!("unknown face {id}")))?;
                closed.faces.insert(*id);
                closed.lines.extend(&face.lines);
                closed.nodes.extend(&face.nodes);
            }
        } else if !self.lines.is_empty() {
            for id in &self.lines {
                let line = domain
                    .line(*id)
                    .ok_or_else(|| ScaffoldError::InvalidDomain(format!("unknown line {id}")))?;
                closed.lines.insert(*id);
                closed.nodes.extend(line.nodes);
            }
        } else {
            for id in &self.nodes {
                if !domain.contains_node(*id) {
                    return Err(ScaffoldError::UnknownNode(*id));
                }
                closed.nodes.insert(*id);
            }
        }
        Ok((dimension, closed))
    }

    /// The highest-dimension part only, as a selection.
    #[must_use]
    pub fn selection(&self) -> Self {
        if !self.elements.is_empty() {
            Self::of_elements(self.elements.iter().copied())
        } else if !self.faces.is_empty() {
            Self::of_faces(self.faces.iter().copied())
        } else if !self.lines.is_empty() {
            Self::of_lines(self.lines.iter().copied())
        } else {
            Self::of_nodes(self.nodes.iter().copied())
        }
    }

    /// Members that are present in `domain`.
    #[must_use]
    pub fn restricted_to(&self, domain: &Domain) -> Self {
        Self {
            elements: self
                .elements
                .iter()
                .copied()
                .filter(|id| domain.contains_element(*id))
                .collect(),
            faces: self
                .faces
                .iter()
                .copied()
                .filter(|id| domain.face(*id).is_some())
                .collect(),
            lines: self
                .lines
                .iter()
                .copied()
                .filter(|id| domain.line(*id).is_some())
                .collect(),
            nodes: self
                .nodes
                .iter()
                .copied()
                .filter(|id| domain.contains_node(*id))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationGroup {
    pub name: String,
    pub term: String,
    pub kind: GroupKind,
    pub dimension: usize,
    pub members: Membership,
}

impl AnnotationGroup {
    pub fn new(
        name: &str,
        kind: GroupKind,
        domain: &Domain,
        selection: &Membership,
    ) -> ScaffoldResult<Self> {
        let (dimension, members) = selection.close(domain)?;
        Ok(Self {
            name: name.to_owned(),
            term: NO_TERM.to_owned(),
            kind,
            dimension,
            members,
        })
    }

    /// Built-in group with an ontology term.
    pub fn builtin(
        name: &str,
        term: &str,
        domain: &Domain,
        selection: &Membership,
    ) -> ScaffoldResult<Self> {
        let mut group = Self::new(name, GroupKind::Builtin, domain, selection)?;
        group.term = term.to_owned();
        Ok(group)
    }

    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.kind == GroupKind::Builtin
    }

    /// Re-closes the surviving highest-dimension members against a
    /// regenerated domain. `None` when none of them exists any more.
    #[must_use]
    pub fn rebuilt_for(&self, domain: &Domain) -> Option<Self> {
        let surviving = self.members.selection().restricted_to(domain);
        if surviving.is_empty() {
            return None;
        }
        let (dimension, members) = surviving.close(domain).ok()?;
        (dimension == self.dimension).then(|| Self {
            members,
            ..self.clone()
        })
    }
}
