use serde::{Deserialize, Serialize};

use super::group::{GroupKind, NO_TERM};
use crate::error::{ScaffoldError, ScaffoldResult};
use crate::field::{FieldStore, InversionOptions, MeshLocation};
use crate::geom::Tolerance;
use crate::mesh::{Domain, ElementId, NodeId};

/// Material coordinates a marker was placed at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialBinding {
    pub field: String,
    pub coordinates: Vec<f64>,
}

/// Where to put a new marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarkerLocationSpec {
    Element { element: ElementId, xi: Vec<f64> },
    /// Resolved by inverting the named material field.
    Material { field: String, coordinates: Vec<f64> },
}

/// A group holding one marker node at an embedded location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub name: String,
    pub term: String,
    pub kind: GroupKind,
    /// Marker node; never one of the domain's own nodes.
    pub node: NodeId,
    pub location: MeshLocation,
    pub material: Option<MaterialBinding>,
}

impl Marker {
    /// Built-in marker at an element location, using the next node id past `domain`.
    pub fn builtin(
        name: &str,
        term: &str,
        domain: &Domain,
        element: ElementId,
        xi: Vec<f64>,
    ) -> ScaffoldResult<Self> {
        let location = resolve_element(domain, element, xi)?;
        Ok(Self {
            name: name.to_owned(),
            term: term.to_owned(),
            kind: GroupKind::Builtin,
            node: domain.next_node_id(),
            location,
            material: None,
        })
    }

    pub(crate) fn user(
        name: &str,
        node: NodeId,
        spec: &MarkerLocationSpec,
        domain: &Domain,
        fields: &FieldStore,
        inversion: &InversionOptions,
    ) -> ScaffoldResult<Self> {
        let (location, material) = resolve_spec(spec, domain, fields, inversion)?;
        Ok(Self {
            name: name.to_owned(),
            term: NO_TERM.to_owned(),
            kind: GroupKind::UserDefined,
            node,
            location,
            material,
        })
    }

    /// The location spec to re-resolve this marker against a new model.
    #[must_use]
    pub fn spec(&self) -> MarkerLocationSpec {
        match &self.material {
            Some(binding) => MarkerLocationSpec::Material {
                field: binding.field.clone(),
                coordinates: binding.coordinates.clone(),
            },
            None => MarkerLocationSpec::Element {
                element: self.location.element,
                xi: self.location.xi.clone(),
            },
        }
    }

    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.kind == GroupKind::Builtin
    }
}

fn resolve_element(domain: &Domain, element: ElementId, xi: Vec<f64>) -> ScaffoldResult<MeshLocation> {
    let shape = domain.element(element)?.shape;
    if xi.len() != shape.dimension() || !shape.contains(&xi, Tolerance::DEFAULT) {
        return Err(ScaffoldError::ShapeMismatch { element, shape, xi });
    }
    Ok(MeshLocation { element, xi })
}

pub(crate) fn resolve_spec(
    spec: &MarkerLocationSpec,
    domain: &Domain,
    fields: &FieldStore,
    inversion: &InversionOptions,
) -> ScaffoldResult<(MeshLocation, Option<MaterialBinding>)> {
    match spec {
        MarkerLocationSpec::Element { element, xi } => {
            Ok((resolve_element(domain, *element, xi.clone())?, None))
        }
        MarkerLocationSpec::Material { field, coordinates } => {
            let location = fields.invert(field, domain, coordinates, inversion)?;
            Ok((
                location,
                Some(MaterialBinding {
                    field: field.clone(),
                    coordinates: coordinates.clone(),
                }),
            ))
        }
    }
}
