//! `1D Line`: a straight cubic Hermite line along x.

use super::builder::TensorLattice;
use super::{
    GeneratedScaffold, GenerationContext, InteractiveFunction, ScaffoldGenerator,
    smooth_derivatives_function,
};
use crate::annotation::{AnnotationGroup, Membership, NO_TERM};
use crate::error::{ScaffoldError, ScaffoldResult};
use crate::field::{Field, FieldRole, FieldStore, ValueLabel};
use crate::params::{DEFAULT_SET, ParameterSchema, ParameterSet, ParameterSpec};

const ELEMENTS: &str = "Number of elements";
const LENGTH: &str = "Length";

#[derive(Debug, Clone, Copy, Default)]
pub struct LineGenerator;

impl ScaffoldGenerator for LineGenerator {
    fn scaffold_type(&self) -> &str {
        "1D Line"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            ParameterSpec::integer(ELEMENTS).min(1.0).max(1000.0),
            ParameterSpec::real(LENGTH).min(0.0),
        ])
    }

    fn parameter_set_names(&self) -> Vec<String> {
        vec![DEFAULT_SET.into(), "Short".into()]
    }

    fn parameter_set(&self, name: &str) -> ScaffoldResult<ParameterSet> {
        let (elements, length) = match name {
            DEFAULT_SET => (4_i64, 1.0),
            "Short" => (2, 0.5),
            _ => return Err(ScaffoldError::UnknownParameterSet(name.to_owned())),
        };
        Ok(ParameterSet::new(name)
            .with(ELEMENTS, elements)
            .with(LENGTH, length))
    }

    #[allow(clippy::cast_precision_loss)]
    fn generate(
        &self,
        parameters: &ParameterSet,
        ctx: &mut GenerationContext<'_>,
    ) -> ScaffoldResult<GeneratedScaffold> {
        let count = parameters.expect_count(ELEMENTS)?;
        let length = parameters.expect_real(LENGTH)?;
        let lattice = TensorLattice::new(&[count]);
        let domain = lattice.build_domain(ctx)?;

        let step = length / count as f64;
        let mut coordinates = Field::new("coordinates", FieldRole::Geometric, 3);
        for index in lattice.node_indices() {
            let node = lattice.node_id(&index);
            coordinates.set_parameter(node, ValueLabel::Value, vec![index[0] as f64 * step, 0.0, 0.0])?;
            coordinates.set_parameter(node, ValueLabel::D1, vec![step, 0.0, 0.0])?;
        }
        let mut material = Field::new("line coordinates", FieldRole::Material, 1);
        lattice.material_field(&mut material, &domain)?;

        let mut fields = FieldStore::new();
        ctx.register_field(&mut fields, coordinates, &domain)?;
        ctx.register_field(&mut fields, material, &domain)?;

        let all = Membership::of_elements(domain.elements().map(|e| e.id));
        let start = Membership::of_nodes([lattice.node_id(&[0])]);
        let end = Membership::of_nodes([lattice.node_id(&[count])]);
        let builtin_groups = vec![
            AnnotationGroup::builtin("line", NO_TERM, &domain, &all)?,
            AnnotationGroup::builtin("start", NO_TERM, &domain, &start)?,
            AnnotationGroup::builtin("end", NO_TERM, &domain, &end)?,
        ];
        log::debug!("1D Line: {count} elements, length {length}");

        Ok(GeneratedScaffold {
            domain,
            fields,
            builtin_groups,
            builtin_markers: Vec::new(),
        })
    }

    fn interactive_functions(&self) -> Vec<InteractiveFunction> {
        vec![smooth_derivatives_function()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ValidationOptions;
    use crate::generator::{CancelToken, GeneratorRegistry};
    use crate::mesh::ElementId;

    #[test]
    fn default_line_spans_length() {
        let registry = GeneratorRegistry::new();
        let mut ctx = GenerationContext::new(&registry, CancelToken::new(), ValidationOptions::default());
        let generator = LineGenerator;
        let set = generator.parameter_set(DEFAULT_SET).unwrap();
        let generated = generator.generate(&set, &mut ctx).unwrap();

        assert_eq!(generated.domain.element_count(), 4);
        assert_eq!(generated.domain.node_count(), 5);
        let end = generated
            .fields
            .evaluate("coordinates", &generated.domain, ElementId(4), &[1.0], false)
            .unwrap();
        assert!((end.value[0] - 1.0).abs() < 1e-12);
        let mid = generated
            .fields
            .evaluate("line coordinates", &generated.domain, ElementId(2), &[0.5], false)
            .unwrap();
        assert!((mid.value[0] - 0.375).abs() < 1e-12);
        assert_eq!(generated.builtin_groups.len(), 3);
        assert_eq!(ctx.steps(), 4);
    }

    #[test]
    fn unknown_set_is_rejected() {
        assert_eq!(
            LineGenerator.parameter_set("Long").unwrap_err(),
            ScaffoldError::UnknownParameterSet("Long".into())
        );
    }
}
