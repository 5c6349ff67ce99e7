use std::sync::Arc;

use scaffold_engine::field::ValueLabel;
use scaffold_engine::mesh::NodeId;
use scaffold_engine::overlay::DropReason;
use scaffold_engine::params::{ParameterSet, ParameterValue};
use scaffold_engine::{EngineOptions, GeneratorRegistry, ScaffoldError, ScaffoldModel};

fn model(scaffold_type: &str) -> ScaffoldModel {
    let registry = GeneratorRegistry::with_reference_generators().unwrap();
    ScaffoldModel::new(registry, scaffold_type, EngineOptions::default()).unwrap()
}

#[test]
fn custom_set_is_kept_while_visiting_named_sets() {
    let mut model = model("2D Plate");
    assert_eq!(model.snapshot().domain.element_count(), 6);

    model.edit_parameter("Width", ParameterValue::Real(2.0)).unwrap();
    assert_eq!(model.parameters().active_name(), "Custom");
    let custom = model.parameters().custom().unwrap().clone();
    assert_eq!(custom.base, "Default");
    assert_eq!(custom.diffs, vec![("Width".to_owned(), ParameterValue::Real(2.0))]);

    model.select_parameter_set("Wide").unwrap();
    assert_eq!(model.snapshot().domain.element_count(), 8);
    assert_eq!(model.parameters().custom(), Some(&custom));

    model.select_parameter_set("Custom").unwrap();
    let snapshot = model.snapshot();
    assert_eq!(snapshot.domain.element_count(), 6);
    assert_eq!(snapshot.parameters.get("Width"), Some(&ParameterValue::Real(2.0)));

    model
        .edit_parameter("Elements count 1", ParameterValue::Integer(5))
        .unwrap();
    let custom = model.parameters().custom().unwrap();
    assert_eq!(custom.base, "Default");
    assert_eq!(custom.diffs.len(), 2);
    assert_eq!(model.snapshot().domain.element_count(), 10);
}

#[test]
fn editing_from_a_named_set_rebases_custom() {
    let mut model = model("2D Plate");
    model.edit_parameter("Width", ParameterValue::Real(2.0)).unwrap();
    model.select_parameter_set("Wide").unwrap();
    model.edit_parameter("Bulge", ParameterValue::Real(0.2)).unwrap();

    let custom = model.parameters().custom().unwrap();
    assert_eq!(custom.base, "Wide");
    assert_eq!(custom.diffs, vec![("Bulge".to_owned(), ParameterValue::Real(0.2))]);
    assert_eq!(model.snapshot().domain.element_count(), 8);
}

#[test]
fn nested_set_selection_regenerates_parent() {
    let mut model = model("3D Box");
    assert_eq!(model.snapshot().domain.element_count(), 12);

    model.select_nested_set("Plate", "Wide").unwrap();
    assert_eq!(model.parameters().active_name(), "Custom");
    assert_eq!(model.snapshot().domain.element_count(), 16);

    model
        .edit_nested_parameter("Plate", "Elements count 2", ParameterValue::Integer(1))
        .unwrap();
    assert_eq!(model.snapshot().domain.element_count(), 8);
    assert!(model.last_report().steps > 0);
}

#[test]
fn invalid_values_leave_model_untouched() {
    let mut model = model("2D Plate");
    let before = model.snapshot();
    let err = model
        .edit_parameter("Widht", ParameterValue::Real(2.0))
        .unwrap_err();
    assert!(err.to_string().contains("Width"));
    assert!(model.edit_parameter("Width", ParameterValue::Real(-1.0)).is_err());
    assert!(model.select_parameter_set("Custom").is_err());
    assert!(Arc::ptr_eq(&before, &model.snapshot()));
    assert_eq!(model.parameters().active_name(), "Default");
}

#[test]
fn node_edits_on_removed_nodes_are_reported() {
    let mut model = model("1D Line");
    model
        .set_node_parameter(NodeId(5), "coordinates", ValueLabel::Value, vec![1.0, 0.2, 0.0])
        .unwrap();
    model
        .set_node_parameter(NodeId(2), "coordinates", ValueLabel::Value, vec![0.2, 0.1, 0.0])
        .unwrap();

    let report = model.select_parameter_set("Short").unwrap().clone();
    assert_eq!(report.dropped_overlay.len(), 1);
    assert_eq!(report.dropped_overlay[0].node, NodeId(5));
    assert_eq!(report.dropped_overlay[0].reason, DropReason::MissingNode);
    assert!(matches!(
        report.overlay_error(),
        Some(ScaffoldError::IncompatibleOverlay { .. })
    ));
    assert!(!report.is_clean());

    assert_eq!(model.overlay().entry_count(), 1);
    let primary = model.snapshot().fields.primary().unwrap().clone();
    assert_eq!(primary.parameter(NodeId(2), ValueLabel::Value), Some(&[0.2, 0.1, 0.0][..]));
}

#[test]
fn changing_scaffold_type_discards_node_edits() {
    let mut model = model("1D Line");
    model
        .set_node_parameter(NodeId(5), "coordinates", ValueLabel::Value, vec![1.0, 0.5, 0.0])
        .unwrap();
    model.translate([0.0, 0.0, 1.0]).unwrap();

    let report = model.set_scaffold_type("2D Plate").unwrap().clone();
    assert!(report.dropped_overlay.is_empty());
    assert!(model.overlay().is_empty());
    assert!(model.overlay().transform.is_identity());

    let fresh = {
        let registry = GeneratorRegistry::with_reference_generators().unwrap();
        ScaffoldModel::new(registry, "2D Plate", EngineOptions::default()).unwrap()
    };
    let node5 = |model: &ScaffoldModel| {
        model
            .snapshot()
            .view_fields
            .primary()
            .unwrap()
            .parameter(NodeId(5), ValueLabel::Value)
            .map(<[f64]>::to_vec)
    };
    assert_eq!(node5(&model), node5(&fresh));
}

#[test]
fn baked_transform_becomes_node_edits() {
    let mut model = model("1D Line");
    model.scale([2.0, 1.0, 1.0]).unwrap();
    model.translate([0.0, 1.0, 0.0]).unwrap();
    let view = model.snapshot().view_fields.primary().unwrap().clone();
    assert_eq!(view.parameter(NodeId(5), ValueLabel::Value), Some(&[2.0, 1.0, 0.0][..]));
    assert_eq!(view.parameter(NodeId(5), ValueLabel::D1), Some(&[0.5, 0.0, 0.0][..]));

    let written = model.apply_transform().unwrap();
    assert_eq!(written, 5);
    assert!(model.overlay().transform.is_identity());
    let snapshot = model.snapshot();
    let edited = snapshot.fields.primary().unwrap();
    assert_eq!(edited.parameter(NodeId(5), ValueLabel::Value), Some(&[2.0, 1.0, 0.0][..]));
    assert_eq!(
        snapshot.view_fields.primary().unwrap().parameter(NodeId(3), ValueLabel::Value),
        Some(&[1.0, 1.0, 0.0][..])
    );

    model.clear_overlay().unwrap();
    assert!(model.overlay().is_empty());
}

#[test]
fn harmonic_smoothing_of_uneven_line() {
    let mut model = model("1D Line");
    model
        .edit_parameter("Number of elements", ParameterValue::Integer(2))
        .unwrap();
    model.edit_parameter("Length", ParameterValue::Real(2.0)).unwrap();
    model
        .set_node_parameter(NodeId(3), "coordinates", ValueLabel::Value, vec![3.0, 0.0, 0.0])
        .unwrap();
    assert_eq!(model.interactive_functions().unwrap(), ["Smooth derivatives"]);

    let options = ParameterSet::new("options").with("Scale factor mode", "Harmonic");
    let edits = model
        .run_interactive("Smooth derivatives", &[NodeId(2)], &options)
        .unwrap();
    assert_eq!(edits, 1);

    let snapshot = model.snapshot();
    let d1 = snapshot
        .fields
        .primary()
        .unwrap()
        .parameter(NodeId(2), ValueLabel::D1)
        .unwrap()
        .to_vec();
    assert!((d1[0] - 4.0 / 3.0).abs() < 1e-9);
    assert!(d1[1].abs() < 1e-12 && d1[2].abs() < 1e-12);

    let bad = ParameterSet::new("options").with("Scale factor", "Harmonic");
    assert!(model.run_interactive("Smooth derivatives", &[], &bad).is_err());
    assert!(model.run_interactive("Flatten", &[], &ParameterSet::new("options")).is_err());
}

#[test]
fn snapshots_stay_valid_for_readers() {
    let mut model = model("1D Line");
    let reader = model.snapshot();
    model
        .edit_parameter("Number of elements", ParameterValue::Integer(8))
        .unwrap();

    let handle = std::thread::spawn(move || {
        reader
            .view_fields
            .evaluate("coordinates", &reader.domain, scaffold_engine::mesh::ElementId(4), &[1.0], false)
            .unwrap()
            .value
    });
    let value = handle.join().unwrap();
    assert!((value[0] - 1.0).abs() < 1e-12);
    assert_eq!(model.snapshot().domain.element_count(), 8);
}
