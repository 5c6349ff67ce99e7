use std::fmt;

use serde::{Deserialize, Serialize};

use crate::field::{FieldStore, NodeParameters};
use crate::mesh::{Domain, NodeId};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum DropReason {
    MissingNode,
    MissingField,
    /// The regenerated node lacks a label the override sets.
    LabelMismatch,
    ComponentMismatch,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingNode => "node no longer exists",
            Self::MissingField => "field no longer exists",
            Self::LabelMismatch => "value labels changed",
            Self::ComponentMismatch => "component count changed",
        };
        f.write_str(text)
    }
}

/// Overlay entry discarded after a regeneration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedOverlayEntry {
    pub field: String,
    pub node: NodeId,
    pub reason: DropReason,
}

impl fmt::Display for DroppedOverlayEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` node {}: {}", self.field, self.node, self.reason)
    }
}

/// Why an override of `node` in `field` no longer applies, if it doesn't.
pub(crate) fn entry_conflict(
    field: &str,
    node: NodeId,
    parameters: &NodeParameters,
    domain: &Domain,
    fields: &FieldStore,
) -> Option<DropReason> {
    if !domain.contains_node(node) {
        return Some(DropReason::MissingNode);
    }
    let Ok(base) = fields.get(field) else {
        return Some(DropReason::MissingField);
    };
    let Some(base_parameters) = base.node_parameters(node) else {
        return Some(DropReason::MissingNode);
    };
    if !parameters.keys().all(|label| base_parameters.contains_key(label)) {
        return Some(DropReason::LabelMismatch);
    }
    if parameters.values().any(|v| v.len() != base.components) {
        return Some(DropReason::ComponentMismatch);
    }
    None
}
