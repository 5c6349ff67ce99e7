//! Field store: named fields over a domain, defined by nodal parameters and
//! an element basis.

pub mod basis;
pub mod invert;
mod parameters;
pub mod validate;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use basis::{BasisFunction, ElementBasis, Evaluation};
pub use invert::{InversionOptions, MeshLocation};
pub use parameters::{NodeParameters, ValueLabel};
pub use validate::{FieldRegistrationReport, ValidationOptions};

use crate::error::{ScaffoldError, ScaffoldResult};
use crate::mesh::{Domain, Element, ElementId, NodeId};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum FieldRole {
    Ordinary,
    /// Coordinate field giving the scaffold geometry.
    Geometric,
    /// Coordinate field of the flattened scaffold.
    Flat,
    /// Idealised coordinate field used to embed locations independently of the mesh.
    Material,
}

impl FieldRole {
    #[must_use]
    pub const fn is_coordinate(self) -> bool {
        !matches!(self, Self::Ordinary)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub role: FieldRole,
    pub components: usize,
    nodes: BTreeMap<NodeId, NodeParameters>,
    /// Per-element basis overriding the element's own assignment.
    element_bases: BTreeMap<ElementId, ElementBasis>,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, role: FieldRole, components: usize) -> Self {
        Self {
            name: name.into(),
            role,
            components,
            nodes: BTreeMap::new(),
            element_bases: BTreeMap::new(),
        }
    }

    pub fn set_parameter(
        &mut self,
        node: NodeId,
        label: ValueLabel,
        values: Vec<f64>,
    ) -> ScaffoldResult<()> {
        if values.len() != self.components {
            return Err(ScaffoldError::invalid_parameter(
                format!("{}.{label}", self.name),
                format!(
                    "expected {} components at node {node}, got {}",
                    self.components,
                    values.len()
                ),
            ));
        }
        self.nodes.entry(node).or_default().insert(label, values);
        Ok(())
    }

    #[must_use]
    pub fn parameter(&self, node: NodeId, label: ValueLabel) -> Option<&[f64]> {
        self.nodes
            .get(&node)
            .and_then(|p| p.get(&label))
            .map(Vec::as_slice)
    }

    #[must_use]
    pub fn node_parameters(&self, node: NodeId) -> Option<&NodeParameters> {
        self.nodes.get(&node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeParameters)> + '_ {
        self.nodes.iter().map(|(id, p)| (*id, p))
    }

    #[must_use]
    pub fn has_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn retain_nodes(&mut self, keep: impl Fn(NodeId) -> bool) {
        self.nodes.retain(|id, _| keep(*id));
    }

    pub fn set_element_basis(&mut self, element: ElementId, basis: ElementBasis) {
        self.element_bases.insert(element, basis);
    }

    /// Basis used for `element`: the field override if any, else the element's own.
    #[must_use]
    pub fn basis_for<'a>(&'a self, element: &'a Element) -> &'a ElementBasis {
        self.element_bases.get(&element.id).unwrap_or(&element.basis)
    }

    pub fn evaluate(
        &self,
        domain: &Domain,
        element: ElementId,
        xi: &[f64],
        with_derivatives: bool,
    ) -> ScaffoldResult<Evaluation> {
        let element = domain.element(element)?;
        basis::evaluate(element, self.basis_for(element), self, xi, with_derivatives)
    }
}

/// Named fields of one domain, plus which coordinate field is primary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldStore {
    fields: BTreeMap<String, Field>,
    primary: Option<String>,
}

impl FieldStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `field` against `domain` and stores it. Coordinate fields
    /// must be locally non-degenerate; the first geometric field becomes primary.
    pub fn register(
        &mut self,
        field: Field,
        domain: &Domain,
        options: &ValidationOptions,
    ) -> ScaffoldResult<FieldRegistrationReport> {
        let report = validate::validate_field(&field, domain, options)?;
        for warning in &report.warnings {
            log::warn!("{warning}");
        }
        self.insert(field);
        Ok(report)
    }

    /// Stores `field` without validation, replacing any field of the same name.
    pub fn insert(&mut self, field: Field) -> Option<Field> {
        if self.primary.is_none() && field.role == FieldRole::Geometric {
            self.primary = Some(field.name.clone());
        }
        self.fields.insert(field.name.clone(), field)
    }

    pub fn get(&self, name: &str) -> ScaffoldResult<&Field> {
        self.fields
            .get(name)
            .ok_or_else(|| ScaffoldError::UnknownField(name.to_owned()))
    }

    pub fn get_mut(&mut self, name: &str) -> ScaffoldResult<&mut Field> {
        self.fields
            .get_mut(name)
            .ok_or_else(|| ScaffoldError::UnknownField(name.to_owned()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Field> + '_ {
        self.fields.values_mut()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.keys().map(String::as_str)
    }

    pub fn set_primary(&mut self, name: &str) -> ScaffoldResult<()> {
        let field = self.get(name)?;
        if !field.role.is_coordinate() {
            return Err(ScaffoldError::invalid_parameter(
                "model coordinates field",
                format!("`{name}` is not a coordinate field"),
            ));
        }
        self.primary = Some(name.to_owned());
        Ok(())
    }

    #[must_use]
    pub fn primary_name(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn primary(&self) -> ScaffoldResult<&Field> {
        let name = self
            .primary
            .as_deref()
            .ok_or_else(|| ScaffoldError::UnknownField("<primary coordinates>".into()))?;
        self.get(name)
    }

    pub fn evaluate(
        &self,
        name: &str,
        domain: &Domain,
        element: ElementId,
        xi: &[f64],
        with_derivatives: bool,
    ) -> ScaffoldResult<Evaluation> {
        self.get(name)?.evaluate(domain, element, xi, with_derivatives)
    }

    pub fn invert(
        &self,
        name: &str,
        domain: &Domain,
        target: &[f64],
        options: &InversionOptions,
    ) -> ScaffoldResult<MeshLocation> {
        invert::invert(self.get(name)?, domain, target, options)
    }

    pub fn find_nearest(
        &self,
        name: &str,
        domain: &Domain,
        target: &[f64],
        options: &InversionOptions,
    ) -> ScaffoldResult<MeshLocation> {
        invert::find_nearest(self.get(name)?, domain, target, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_parameter_checks_component_count() {
        let mut field = Field::new("coordinates", FieldRole::Geometric, 3);
        let err = field
            .set_parameter(NodeId(1), ValueLabel::Value, vec![0.0, 1.0])
            .unwrap_err();
        assert!(matches!(err, ScaffoldError::InvalidParameter { .. }));
        assert!(field.node_parameters(NodeId(1)).is_none());
    }

    #[test]
    fn first_geometric_field_becomes_primary() {
        let mut store = FieldStore::new();
        store.insert(Field::new("material", FieldRole::Material, 3));
        assert!(store.primary().is_err());
        store.insert(Field::new("coordinates", FieldRole::Geometric, 3));
        store.insert(Field::new("other", FieldRole::Geometric, 3));
        assert_eq!(store.primary_name(), Some("coordinates"));

        store.set_primary("material").unwrap();
        assert_eq!(store.primary().unwrap().name, "material");
        store.insert(Field::new("density", FieldRole::Ordinary, 1));
        assert!(store.set_primary("density").is_err());
    }
}
