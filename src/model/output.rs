//! Output pipeline: overlay and transform baked in, then refinement, then
//! deletion, then annotation export.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ScaffoldModel;
use crate::annotation::{AnnotationRegistry, AnnotationRow, MarkerRow, Membership};
use crate::error::ScaffoldResult;
use crate::field::{FieldRole, FieldStore, NodeParameters};
use crate::mesh::{Domain, Element, FaceId, LineId, NodeId};
use crate::refine::{RefinementReport, refine};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputNode {
    pub id: NodeId,
    /// Parameters per field name.
    pub fields: BTreeMap<String, NodeParameters>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputField {
    pub name: String,
    pub role: FieldRole,
    pub components: usize,
    pub primary: bool,
}

/// A group restricted to the visible objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputGroup {
    pub name: String,
    pub term: String,
    pub dimension: usize,
    pub members: Membership,
}

/// Serialisable view of the visible model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputModel {
    pub scaffold_type: String,
    pub parameter_set: String,
    pub dimension: usize,
    pub nodes: Vec<OutputNode>,
    pub elements: Vec<Element>,
    pub faces: Vec<FaceId>,
    pub lines: Vec<LineId>,
    pub fields: Vec<OutputField>,
    pub groups: Vec<OutputGroup>,
    pub annotations: Vec<AnnotationRow>,
    pub markers: Vec<MarkerRow>,
    pub refinement: Option<RefinementReport>,
}

impl OutputModel {
    pub fn to_json(&self) -> ScaffoldResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl ScaffoldModel {
    /// Builds the output of the current snapshot.
    pub fn output(&self) -> ScaffoldResult<OutputModel> {
        let snapshot = self.snapshot();
        let (domain, fields, annotations, refinement) = match &self.refinement {
            Some(options) => {
                let refined = refine(&snapshot.domain, &snapshot.view_fields, options)?;
                let annotations = refined.transfer_annotations(&snapshot.annotations);
                (refined.domain, refined.fields, annotations, Some(refined.report))
            }
            None => (
                (*snapshot.domain).clone(),
                snapshot.view_fields.clone(),
                snapshot.annotations.clone(),
                None,
            ),
        };
        let visible = self.deletion.apply(&domain);
        log::debug!(
            "output: {} of {} elements visible",
            visible.element_count(),
            domain.element_count()
        );

        Ok(OutputModel {
            scaffold_type: snapshot.scaffold_type.clone(),
            parameter_set: self.parameters.active_name().to_owned(),
            dimension: visible.dimension(),
            nodes: output_nodes(&visible, &fields),
            elements: visible.elements().cloned().collect(),
            faces: visible.faces().map(|f| f.id).collect(),
            lines: visible.lines().map(|l| l.id).collect(),
            fields: fields
                .iter()
                .map(|f| OutputField {
                    name: f.name.clone(),
                    role: f.role,
                    components: f.components,
                    primary: fields.primary_name() == Some(f.name.as_str()),
                })
                .collect(),
            groups: visible_groups(&annotations, &visible),
            annotations: annotations.annotation_table(),
            markers: visible_markers(&annotations, &visible, &domain, &fields)?,
            refinement,
        })
    }
}

fn output_nodes(visible: &Domain, fields: &FieldStore) -> Vec<OutputNode> {
    visible
        .nodes()
        .map(|id| OutputNode {
            id,
            fields: fields
                .iter()
                .filter_map(|f| Some((f.name.clone(), f.node_parameters(id)?.clone())))
                .collect(),
        })
        .collect()
}

fn visible_groups(annotations: &AnnotationRegistry, visible: &Domain) -> Vec<OutputGroup> {
    annotations
        .groups()
        .map(|g| OutputGroup {
            name: g.name.clone(),
            term: g.term.clone(),
            dimension: g.dimension,
            members: g.members.restricted_to(visible),
        })
        .filter(|g| !g.members.is_empty())
        .collect()
}

/// Markers whose host element is still visible.
fn visible_markers(
    annotations: &AnnotationRegistry,
    visible: &Domain,
    domain: &Domain,
    fields: &FieldStore,
) -> ScaffoldResult<Vec<MarkerRow>> {
    let mut rows = annotations.marker_table(domain, fields)?;
    rows.retain(|row| {
        annotations
            .marker(&row.name)
            .is_some_and(|m| visible.contains_element(m.location.element))
    });
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GeneratorRegistry;
    use crate::mesh::ElementId;
    use crate::model::EngineOptions;
    use crate::refine::RefineOptions;

    #[test]
    fn deletion_hides_elements_and_marker() {
        let registry = GeneratorRegistry::with_reference_generators().unwrap();
        let mut model = ScaffoldModel::new(registry, "3D Box", EngineOptions::default()).unwrap();
        let full = model.output().unwrap();
        assert_eq!(full.elements.len(), 12);
        assert_eq!(full.markers.len(), 1);
        assert_eq!(full.markers[0].node, NodeId(37));

        model.delete_elements([ElementId(1)]);
        let output = model.output().unwrap();
        assert_eq!(output.elements.len(), 11);
        assert!(output.markers.is_empty());
        assert!(output.annotations.iter().any(|row| row.name == "origin"));
        let bottom = output.groups.iter().find(|g| g.name == "bottom").unwrap();
        assert_eq!(bottom.members.faces.len(), 5);
    }

    #[test]
    fn refined_output_is_linear() {
        let registry = GeneratorRegistry::with_reference_generators().unwrap();
        let mut model = ScaffoldModel::new(registry, "1D Line", EngineOptions::default()).unwrap();
        model.set_refinement(Some(RefineOptions::uniform(3)));
        let output = model.output().unwrap();
        assert_eq!(output.elements.len(), 12);
        assert_eq!(output.nodes.len(), 13);
        assert_eq!(output.fields.len(), 1);
        assert!(output.fields[0].primary);
        assert!(output.refinement.as_ref().unwrap().is_clean());
        let line = output.groups.iter().find(|g| g.name == "line").unwrap();
        assert_eq!(line.members.elements.len(), 12);
        let end = output.groups.iter().find(|g| g.name == "end").unwrap();
        assert_eq!(end.members.nodes.len(), 1);
        assert!(output.to_json().unwrap().contains("\"scaffold_type\": \"1D Line\""));
    }
}
