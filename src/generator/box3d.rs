//! `3D Box`: a nested `2D Plate` extruded through a thickness in z.
//!
//! Layer `k` of the box reuses the plate's node and element ids offset by
//! `k` times the plate's high-water marks, so box ids stay lexicographic
//! whenever the plate's are.

use super::{
    GeneratedScaffold, GenerationContext, InteractiveFunction, ScaffoldGenerator,
    smooth_derivatives_function,
};
use crate::annotation::{AnnotationGroup, Marker, Membership, NO_TERM};
use crate::error::{ScaffoldError, ScaffoldResult};
use crate::field::{ElementBasis, Field, FieldRole, FieldStore, ValueLabel};
use crate::mesh::{Domain, ElementId, FaceId, NodeId, Shape};
use crate::params::{DEFAULT_SET, ParameterSchema, ParameterSet, ParameterSpec, ScaffoldPackage};

use super::plate::PlateGenerator;

const PLATE: &str = "Plate";
const LAYERS: &str = "Elements count 3";
const THICKNESS: &str = "Thickness";

#[derive(Debug, Clone, Copy, Default)]
pub struct BoxGenerator;

impl BoxGenerator {
    fn plate_package(set_name: &str) -> ScaffoldResult<ScaffoldPackage> {
        let plate = PlateGenerator;
        Ok(ScaffoldPackage {
            scaffold_type: plate.scaffold_type().to_owned(),
            parameter_set_name: set_name.to_owned(),
            parameters: plate.parameter_set(set_name)?,
        })
    }
}

/// Node and element id offsets between consecutive layers.
#[derive(Debug, Clone, Copy)]
struct Layers {
    nodes: u32,
    elements: u32,
}

impl Layers {
    fn node(self, plate: NodeId, k: usize) -> NodeId {
        NodeId(plate.get() + self.nodes * layer(k))
    }

    fn element(self, plate: ElementId, k: usize) -> ElementId {
        ElementId(plate.get() + self.elements * layer(k))
    }
}

fn layer(k: usize) -> u32 {
    u32::try_from(k).unwrap_or(u32::MAX)
}

impl ScaffoldGenerator for BoxGenerator {
    fn scaffold_type(&self) -> &str {
        "3D Box"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            ParameterSpec::scaffold(PLATE, &["2D Plate"]),
            ParameterSpec::integer(LAYERS).min(1.0).max(100.0),
            ParameterSpec::real(THICKNESS).min(0.0),
        ])
    }

    fn parameter_set_names(&self) -> Vec<String> {
        vec![DEFAULT_SET.into(), "Human 1".into(), "Rat 1".into()]
    }

    fn parameter_set(&self, name: &str) -> ScaffoldResult<ParameterSet> {
        let (plate, layers, thickness) = match name {
            DEFAULT_SET => (DEFAULT_SET, 2_i64, 0.5),
            "Human 1" => ("Wide", 3, 0.8),
            "Rat 1" => (DEFAULT_SET, 1, 0.2),
            _ => return Err(ScaffoldError::UnknownParameterSet(name.to_owned())),
        };
        Ok(ParameterSet::new(name)
            .with(PLATE, Self::plate_package(plate)?)
            .with(LAYERS, layers)
            .with(THICKNESS, thickness))
    }

    #[allow(clippy::cast_precision_loss)]
    fn generate(
        &self,
        parameters: &ParameterSet,
        ctx: &mut GenerationContext<'_>,
    ) -> ScaffoldResult<GeneratedScaffold> {
        let plate = ctx.generate_nested(parameters.expect_scaffold(PLATE)?)?;
        let n3 = parameters.expect_count(LAYERS)?;
        let thickness = parameters.expect_real(THICKNESS)?;
        let base = &plate.domain;
        if base.dimension() != 2 {
            return Err(ScaffoldError::InvalidDomain(format!(
                "`{PLATE}` sub-scaffold is {}-D, expected 2-D",
                base.dimension()
            )));
        }
        let layers = Layers {
            nodes: base.node_high_water(),
            elements: base.element_high_water(),
        };

        let mut domain = Domain::new(3)?;
        for k in 0..=n3 {
            for p in base.nodes() {
                domain.add_node(layers.node(p, k))?;
            }
        }
        for k in 0..n3 {
            for element in base.elements() {
                ctx.checkpoint()?;
                let nodes = (k..=k + 1)
                    .flat_map(|level| element.nodes.iter().map(move |p| layers.node(*p, level)))
                    .collect();
                domain.add_element(
                    layers.element(element.id, k),
                    Shape::Cube,
                    nodes,
                    ElementBasis::cubic_hermite(Shape::Cube),
                )?;
            }
        }
        domain.define_faces();

        let plate_coordinates = plate.fields.get("coordinates")?;
        let plate_material = plate.fields.get("plate coordinates")?;
        let step = thickness / n3 as f64;
        let mut coordinates = Field::new("coordinates", FieldRole::Geometric, 3);
        let mut material = Field::new("box coordinates", FieldRole::Material, 3);
        for p in base.nodes() {
            let missing = |field: &Field, label| ScaffoldError::MissingParameter {
                field: field.name.clone(),
                node: p,
                label,
            };
            let value = plate_coordinates
                .parameter(p, ValueLabel::Value)
                .ok_or_else(|| missing(plate_coordinates, ValueLabel::Value))?;
            let uv = plate_material
                .parameter(p, ValueLabel::Value)
                .ok_or_else(|| missing(plate_material, ValueLabel::Value))?;
            for k in 0..=n3 {
                let node = layers.node(p, k);
                let z = step * k as f64;
                coordinates.set_parameter(node, ValueLabel::Value, vec![value[0], value[1], value[2] + z])?;
                for label in [ValueLabel::D1, ValueLabel::D2, ValueLabel::D12] {
                    let derivative = plate_coordinates
                        .parameter(p, label)
                        .ok_or_else(|| missing(plate_coordinates, label))?;
                    coordinates.set_parameter(node, label, derivative.to_vec())?;
                }
                coordinates.set_parameter(node, ValueLabel::D3, vec![0.0, 0.0, step])?;
                for label in [ValueLabel::D13, ValueLabel::D23, ValueLabel::D123] {
                    coordinates.set_parameter(node, label, vec![0.0; 3])?;
                }
                material.set_parameter(node, ValueLabel::Value, vec![uv[0], uv[1], k as f64 / n3 as f64])?;
            }
        }
        for element in domain.elements() {
            material.set_element_basis(element.id, ElementBasis::linear(element.shape));
        }

        let mut fields = FieldStore::new();
        ctx.register_field(&mut fields, coordinates, &domain)?;
        ctx.register_field(&mut fields, material, &domain)?;

        let builtin_groups = box_groups(&plate, &domain, layers, n3)?;
        let builtin_markers = vec![Marker::builtin(
            "origin",
            NO_TERM,
            &domain,
            ElementId(1),
            vec![0.0; 3],
        )?];
        log::debug!(
            "3D Box: {} elements over {} layers, thickness {thickness}",
            domain.element_count(),
            n3
        );

        Ok(GeneratedScaffold {
            domain,
            fields,
            builtin_groups,
            builtin_markers,
        })
    }

    fn interactive_functions(&self) -> Vec<InteractiveFunction> {
        vec![smooth_derivatives_function()]
    }
}

/// Side faces swept from the plate's edge groups, plus the bottom and top layers.
fn box_groups(
    plate: &GeneratedScaffold,
    domain: &Domain,
    layers: Layers,
    n3: usize,
) -> ScaffoldResult<Vec<AnnotationGroup>> {
    let all = Membership::of_elements(domain.elements().map(|e| e.id));
    let mut groups = vec![AnnotationGroup::builtin("box", NO_TERM, domain, &all)?];

    for (plate_name, box_name) in [("left", "left"), ("right", "right"), ("bottom", "front"), ("top", "back")] {
        let Some(edge) = plate.builtin_groups.iter().find(|g| g.name == plate_name) else {
            continue;
        };
        let faces: Vec<FaceId> = edge
            .members
            .lines
            .iter()
            .filter_map(|l| plate.domain.line(*l))
            .flat_map(|line| {
                (0..n3).filter_map(move |k| {
                    let [a, b] = line.nodes;
                    domain.face_with_nodes(&[
                        layers.node(a, k),
                        layers.node(b, k),
                        layers.node(a, k + 1),
                        layers.node(b, k + 1),
                    ])
                })
            })
            .collect();
        groups.push(AnnotationGroup::builtin(box_name, NO_TERM, domain, &Membership::of_faces(faces))?);
    }

    for (name, k) in [("bottom", 0), ("top", n3)] {
        let faces: Vec<FaceId> = plate
            .domain
            .elements()
            .filter_map(|e| {
                let nodes: Vec<NodeId> = e.nodes.iter().map(|p| layers.node(*p, k)).collect();
                domain.face_with_nodes(&nodes)
            })
            .collect();
        groups.push(AnnotationGroup::builtin(name, NO_TERM, domain, &Membership::of_faces(faces))?);
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ValidationOptions;
    use crate::generator::{CancelToken, GeneratorRegistry};

    #[test]
    fn default_box_extrudes_plate() {
        let registry = GeneratorRegistry::with_reference_generators().unwrap();
        let mut ctx = GenerationContext::new(&registry, CancelToken::new(), ValidationOptions::default());
        let set = BoxGenerator.parameter_set(DEFAULT_SET).unwrap();
        let generated = BoxGenerator.generate(&set, &mut ctx).unwrap();

        assert_eq!(generated.domain.element_count(), 12);
        assert_eq!(generated.domain.node_count(), 36);
        assert_eq!(generated.domain.node_high_water(), 36);

        let top = generated
            .fields
            .evaluate("coordinates", &generated.domain, ElementId(7), &[0.0, 0.0, 1.0], false)
            .unwrap();
        assert!((top.value[2] - 0.5).abs() < 1e-12);

        let names: Vec<&str> = generated.builtin_groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["box", "left", "right", "front", "back", "bottom", "top"]);
        let left = &generated.builtin_groups[1];
        assert_eq!(left.dimension, 2);
        assert_eq!(left.members.faces.len(), 4);
        let bottom = &generated.builtin_groups[5];
        assert_eq!(bottom.members.faces.len(), 6);

        let origin = &generated.builtin_markers[0];
        assert_eq!(origin.node, NodeId(37));
    }

    #[test]
    fn cancellation_stops_extrusion() {
        let registry = GeneratorRegistry::with_reference_generators().unwrap();
        let token = CancelToken::new();
        token.cancel();
        let mut ctx = GenerationContext::new(&registry, token, ValidationOptions::default());
        let set = BoxGenerator.parameter_set("Rat 1").unwrap();
        assert_eq!(BoxGenerator.generate(&set, &mut ctx).unwrap_err(), ScaffoldError::Cancelled);
    }
}
