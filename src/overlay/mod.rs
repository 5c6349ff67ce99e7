//! Edit overlay: per-node parameter overrides and the pending transform,
//! layered over the generated fields and kept across regenerations while
//! they remain compatible.

mod compat;
mod transform;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use compat::{DropReason, DroppedOverlayEntry};
pub use transform::PendingTransform;

use crate::error::ScaffoldResult;
use crate::field::{FieldStore, NodeParameters, ValueLabel};
use crate::mesh::{Domain, NodeId};

/// Fields the pending transform is baked into.
pub const EDIT_FIELDS: [&str; 2] = ["coordinates", "inner coordinates"];

/// One overridden nodal parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEdit {
    pub node: NodeId,
    pub field: String,
    pub label: ValueLabel,
    pub value: Vec<f64>,
}

/// Edits produced by an interactive function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayUpdate {
    pub edits: Vec<NodeEdit>,
}

impl OverlayUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: NodeId, field: &str, label: ValueLabel, value: Vec<f64>) {
        self.edits.push(NodeEdit {
            node,
            field: field.to_owned(),
            label,
            value,
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditOverlay {
    entries: BTreeMap<String, BTreeMap<NodeId, NodeParameters>>,
    pub transform: PendingTransform,
    /// Topology the entries were recorded against.
    fingerprint: Option<u64>,
}

impl EditOverlay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an override; later writes to the same slot replace earlier ones.
    pub fn set(&mut self, node: NodeId, field: &str, label: ValueLabel, value: Vec<f64>) {
        self.entries
            .entry(field.to_owned())
            .or_default()
            .entry(node)
            .or_default()
            .insert(label, value);
    }

    pub fn apply_update(&mut self, update: &OverlayUpdate) {
        for edit in &update.edits {
            self.set(edit.node, &edit.field, edit.label, edit.value.clone());
        }
    }

    #[must_use]
    pub fn get(&self, field: &str, node: NodeId, label: ValueLabel) -> Option<&[f64]> {
        self.entries
            .get(field)?
            .get(&node)?
            .get(&label)
            .map(Vec::as_slice)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, NodeId, &NodeParameters)> + '_ {
        self.entries
            .iter()
            .flat_map(|(field, nodes)| nodes.iter().map(move |(node, p)| (field.as_str(), *node, p)))
    }

    /// Number of overridden (field, node) pairs.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    #[must_use]
    pub const fn fingerprint(&self) -> Option<u64> {
        self.fingerprint
    }

    pub fn set_fingerprint(&mut self, fingerprint: u64) {
        self.fingerprint = Some(fingerprint);
    }

    /// Drops every override; the pending transform is kept.
    pub fn clear_edits(&mut self) {
        self.entries.clear();
    }

    pub fn reset_transform(&mut self) {
        self.transform = PendingTransform::default();
    }

    /// Base fields with the overrides written over them.
    pub fn resolve(&self, base: &FieldStore) -> ScaffoldResult<FieldStore> {
        let mut fields = base.clone();
        for (name, nodes) in &self.entries {
            let Ok(field) = fields.get_mut(name) else {
                continue;
            };
            for (node, parameters) in nodes {
                for (label, value) in parameters {
                    field.set_parameter(*node, *label, value.clone())?;
                }
            }
        }
        Ok(fields)
    }

    /// `edited` with the pending transform applied to its primary coordinate field.
    pub fn transformed(&self, edited: &FieldStore) -> ScaffoldResult<FieldStore> {
        let mut fields = edited.clone();
        if self.transform.is_identity() {
            return Ok(fields);
        }
        let Some(primary) = edited.primary_name().map(str::to_owned) else {
            return Ok(fields);
        };
        let source = edited.get(&primary)?;
        let target = fields.get_mut(&primary)?;
        for (node, parameters) in source.nodes() {
            for (label, value) in self.transform.apply(parameters) {
                target.set_parameter(node, label, value)?;
            }
        }
        Ok(fields)
    }

    /// Bakes the pending transform into every node of the edit fields present
    /// in `base`, then resets it. Returns the number of nodes written.
    pub fn apply_transform(&mut self, base: &FieldStore) -> ScaffoldResult<usize> {
        if self.transform.is_identity() {
            return Ok(0);
        }
        let edited = self.resolve(base)?;
        let mut written = 0;
        for name in EDIT_FIELDS {
            let Ok(field) = edited.get(name) else {
                continue;
            };
            for (node, parameters) in field.nodes() {
                let mapped = self.transform.apply(parameters);
                self.entries
                    .entry(name.to_owned())
                    .or_default()
                    .insert(node, mapped);
                written += 1;
            }
        }
        log::debug!("baked pending transform into {written} nodes");
        self.reset_transform();
        Ok(written)
    }

    /// Drops entries that no longer fit a regenerated model. Nothing is
    /// checked when the topology fingerprint is unchanged.
    pub fn retain_compatible(&mut self, domain: &Domain, fields: &FieldStore) -> Vec<DroppedOverlayEntry> {
        let fingerprint = domain.topology_fingerprint();
        let mut dropped = Vec::new();
        if self.fingerprint != Some(fingerprint) {
            for (name, nodes) in &mut self.entries {
                nodes.retain(|node, parameters| {
                    match compat::entry_conflict(name, *node, parameters, domain, fields) {
                        Some(reason) => {
                            dropped.push(DroppedOverlayEntry {
                                field: name.clone(),
                                node: *node,
                                reason,
                            });
                            false
                        }
                        None => true,
                    }
                });
            }
            self.entries.retain(|_, nodes| !nodes.is_empty());
        }
        self.fingerprint = Some(fingerprint);
        for entry in &dropped {
            log::warn!("dropped overlay entry {entry}");
        }
        dropped
    }
}
