//! `2D Plate`: a bicubic Hermite sheet over a regular grid, optionally
//! bulged upward with a sine profile.

use std::f64::consts::PI;

use super::builder::TensorLattice;
use super::{
    GeneratedScaffold, GenerationContext, InteractiveFunction, ScaffoldGenerator,
    smooth_derivatives_function,
};
use crate::annotation::{AnnotationGroup, Membership, NO_TERM};
use crate::error::{ScaffoldError, ScaffoldResult};
use crate::field::{Field, FieldRole, FieldStore, ValueLabel};
use crate::mesh::{Domain, LineId};
use crate::params::{DEFAULT_SET, ParameterSchema, ParameterSet, ParameterSpec, ParameterValue};

pub(crate) const COUNT_1: &str = "Elements count 1";
pub(crate) const COUNT_2: &str = "Elements count 2";
const WIDTH: &str = "Width";
const LENGTH: &str = "Length";
const BULGE: &str = "Bulge";
const SQUARE: &str = "Square elements";

#[derive(Debug, Clone, Copy, Default)]
pub struct PlateGenerator;

impl ScaffoldGenerator for PlateGenerator {
    fn scaffold_type(&self) -> &str {
        "2D Plate"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            ParameterSpec::integer(COUNT_1).min(1.0).max(200.0),
            ParameterSpec::integer(COUNT_2).min(1.0).max(200.0),
            ParameterSpec::real(WIDTH).min(0.0),
            ParameterSpec::real(LENGTH).min(0.0),
            ParameterSpec::real(BULGE),
            ParameterSpec::boolean(SQUARE),
        ])
    }

    fn parameter_set_names(&self) -> Vec<String> {
        vec![DEFAULT_SET.into(), "Wide".into()]
    }

    fn parameter_set(&self, name: &str) -> ScaffoldResult<ParameterSet> {
        let (count_1, count_2, width, length, bulge) = match name {
            DEFAULT_SET => (3_i64, 2_i64, 1.5, 1.0, 0.1),
            "Wide" => (4, 2, 3.0, 1.0, 0.0),
            _ => return Err(ScaffoldError::UnknownParameterSet(name.to_owned())),
        };
        Ok(ParameterSet::new(name)
            .with(COUNT_1, count_1)
            .with(COUNT_2, count_2)
            .with(WIDTH, width)
            .with(LENGTH, length)
            .with(BULGE, bulge)
            .with(SQUARE, false))
    }

    /// Square elements force the second count to follow the first.
    fn check_parameters(&self, parameters: &mut ParameterSet) -> bool {
        let square = parameters.expect_boolean(SQUARE).unwrap_or(false);
        let count_1 = parameters.get(COUNT_1).and_then(ParameterValue::as_integer);
        let count_2 = parameters.get(COUNT_2).and_then(ParameterValue::as_integer);
        match (square, count_1, count_2) {
            (true, Some(c1), Some(c2)) if c1 != c2 => {
                parameters.set(COUNT_2, ParameterValue::Integer(c1));
                true
            }
            _ => false,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn generate(
        &self,
        parameters: &ParameterSet,
        ctx: &mut GenerationContext<'_>,
    ) -> ScaffoldResult<GeneratedScaffold> {
        let n1 = parameters.expect_count(COUNT_1)?;
        let n2 = if parameters.expect_boolean(SQUARE)? {
            n1
        } else {
            parameters.expect_count(COUNT_2)?
        };
        let width = parameters.expect_real(WIDTH)?;
        let length = parameters.expect_real(LENGTH)?;
        let bulge = parameters.expect_real(BULGE)?;

        let lattice = TensorLattice::new(&[n1, n2]);
        let domain = lattice.build_domain(ctx)?;
        let (f1, f2) = (n1 as f64, n2 as f64);

        let mut coordinates = Field::new("coordinates", FieldRole::Geometric, 3);
        let mut flat = Field::new("flat coordinates", FieldRole::Flat, 3);
        for index in lattice.node_indices() {
            let node = lattice.node_id(&index);
            let position = lattice.unit_position(&index);
            let (u, v) = (position[0], position[1]);
            let (su, cu) = (PI * u).sin_cos();
            let (sv, cv) = (PI * v).sin_cos();
            let (x, y) = (width * u, length * v);
            let (dx, dy) = (width / f1, length / f2);

            coordinates.set_parameter(node, ValueLabel::Value, vec![x, y, bulge * su * sv])?;
            coordinates.set_parameter(node, ValueLabel::D1, vec![dx, 0.0, bulge * PI / f1 * cu * sv])?;
            coordinates.set_parameter(node, ValueLabel::D2, vec![0.0, dy, bulge * PI / f2 * su * cv])?;
            coordinates.set_parameter(
                node,
                ValueLabel::D12,
                vec![0.0, 0.0, bulge * PI * PI / (f1 * f2) * cu * cv],
            )?;

            flat.set_parameter(node, ValueLabel::Value, vec![x, y, 0.0])?;
            flat.set_parameter(node, ValueLabel::D1, vec![dx, 0.0, 0.0])?;
            flat.set_parameter(node, ValueLabel::D2, vec![0.0, dy, 0.0])?;
            flat.set_parameter(node, ValueLabel::D12, vec![0.0; 3])?;
        }
        let mut material = Field::new("plate coordinates", FieldRole::Material, 2);
        lattice.material_field(&mut material, &domain)?;

        let mut fields = FieldStore::new();
        ctx.register_field(&mut fields, coordinates, &domain)?;
        ctx.register_field(&mut fields, flat, &domain)?;
        ctx.register_field(&mut fields, material, &domain)?;

        let edge = |axis: usize, at: usize| -> Membership {
            Membership::of_lines(boundary_lines(&lattice, &domain, [n1, n2], axis, at))
        };
        let all = Membership::of_elements(domain.elements().map(|e| e.id));
        let builtin_groups = vec![
            AnnotationGroup::builtin("plate", NO_TERM, &domain, &all)?,
            AnnotationGroup::builtin("left", NO_TERM, &domain, &edge(0, 0))?,
            AnnotationGroup::builtin("right", NO_TERM, &domain, &edge(0, n1))?,
            AnnotationGroup::builtin("bottom", NO_TERM, &domain, &edge(1, 0))?,
            AnnotationGroup::builtin("top", NO_TERM, &domain, &edge(1, n2))?,
        ];
        log::debug!("2D Plate: {n1}x{n2} elements, {width} x {length}, bulge {bulge}");

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

/// Lines of the grid boundary where node index `axis` equals `at`.
fn boundary_lines(
    lattice: &TensorLattice,
    domain: &Domain,
    counts: [usize; 2],
    axis: usize,
    at: usize,
) -> Vec<LineId> {
    let other = 1 - axis;
    (0..counts[other])
        .filter_map(|k| {
            let mut a = [0; 2];
            a[axis] = at;
            a[other] = k;
            let mut b = a;
            b[other] = k + 1;
            domain.line_with_nodes(lattice.node_id(&a), lattice.node_id(&b))
        })
        .collect()
}
