use std::collections::BTreeSet;

use scaffold_engine::annotation::{MarkerLocationSpec, Membership};
use scaffold_engine::delete::DeletionSet;
use scaffold_engine::mesh::{ElementId, NodeId};
use scaffold_engine::params::ParameterValue;
use scaffold_engine::{EngineOptions, GeneratorRegistry, ScaffoldError, ScaffoldModel};

fn model(scaffold_type: &str) -> ScaffoldModel {
    let registry = GeneratorRegistry::with_reference_generators().unwrap();
    ScaffoldModel::new(registry, scaffold_type, EngineOptions::default()).unwrap()
}

#[test]
fn builtin_annotations_cannot_be_changed() {
    let mut model = model("3D Box");
    let selection = Membership::of_elements([ElementId(1)]);
    for name in ["box", "bottom", "origin"] {
        assert_eq!(
            model.delete_group(name).unwrap_err(),
            ScaffoldError::ImmutableGroup(name.into())
        );
        assert_eq!(
            model.set_group_term(name, "T:1").unwrap_err(),
            ScaffoldError::ImmutableGroup(name.into())
        );
    }
    assert!(matches!(
        model.redefine_group("left", &selection),
        Err(ScaffoldError::ImmutableGroup(_))
    ));
    assert!(model.snapshot().annotations.group("left").is_some());
}

#[test]
fn user_group_lifecycle() {
    let mut model = model("2D Plate");
    let first = model
        .create_group(&Membership::of_elements([ElementId(1), ElementId(2)]))
        .unwrap();
    let second = model.create_group(&Membership::of_nodes([NodeId(1)])).unwrap();
    assert_eq!((first.as_str(), second.as_str()), ("group1", "group2"));

    let snapshot = model.snapshot();
    let group = snapshot.annotations.group("group1").unwrap();
    assert_eq!(group.dimension, 2);
    assert_eq!(group.members.nodes.len(), 6);
    assert_eq!(snapshot.annotations.group("group2").unwrap().dimension, 0);

    assert_eq!(
        model.rename_group("group2", "left").unwrap_err(),
        ScaffoldError::DuplicateGroupName("left".into())
    );
    model.rename_group("group2", "apex").unwrap();
    model.set_group_term("apex", "UBERON:0000001").unwrap();
    model
        .redefine_group("group1", &Membership::of_elements([ElementId(6)]))
        .unwrap();
    model.delete_group("apex").unwrap();
    assert!(matches!(
        model.set_group_term("apex", "x"),
        Err(ScaffoldError::UnknownGroup(_))
    ));

    let snapshot = model.snapshot();
    let group = snapshot.annotations.group("group1").unwrap();
    assert_eq!(group.members.elements, BTreeSet::from([ElementId(6)]));
    let csv = snapshot.annotations.write_annotation_csv();
    assert!(csv.starts_with("Term ID,Group name\n"));
    assert!(csv.contains("None,group1\n"));
    assert!(!csv.contains("apex"));
}

#[test]
fn user_groups_without_members_are_dropped_on_regeneration() {
    let mut model = model("2D Plate");
    model.create_group(&Membership::of_elements([ElementId(1)])).unwrap();
    model.create_group(&Membership::of_elements([ElementId(6)])).unwrap();
    model
        .create_group(&Membership::of_elements([ElementId(2), ElementId(6)]))
        .unwrap();

    model
        .edit_parameter("Elements count 1", ParameterValue::Integer(1))
        .unwrap();
    let report = model.last_report();
    assert_eq!(report.elements, 2);
    assert!(report.warnings.iter().any(|w| w.contains("group2")));

    let snapshot = model.snapshot();
    assert!(snapshot.annotations.group("group1").is_some());
    assert!(snapshot.annotations.group("group2").is_none());
    let shrunk = snapshot.annotations.group("group3").unwrap();
    assert_eq!(shrunk.members.elements, BTreeSet::from([ElementId(2)]));
}

#[test]
fn markers_get_nodes_past_the_domain() {
    let mut model = model("2D Plate");
    let element = MarkerLocationSpec::Element {
        element: ElementId(2),
        xi: vec![0.5, 0.5],
    };
    let first = model.create_marker(None, &element).unwrap();
    let material = MarkerLocationSpec::Material {
        field: "plate coordinates".into(),
        coordinates: vec![0.25, 0.75],
    };
    let second = model.create_marker(Some("tip"), &material).unwrap();
    assert_eq!(
        model.create_marker(Some("tip"), &element).unwrap_err(),
        ScaffoldError::DuplicateGroupName("tip".into())
    );

    let snapshot = model.snapshot();
    let a = snapshot.annotations.marker(&first).unwrap();
    let b = snapshot.annotations.marker(&second).unwrap();
    assert_eq!(a.node, NodeId(13));
    assert_eq!(b.node, NodeId(14));
    assert!(b.material.is_some());

    let output = model.output().unwrap();
    assert_eq!(output.markers.len(), 2);
    let centre = output.markers.iter().find(|m| m.name == first).unwrap();
    assert!((centre.coordinates[0] - 0.75).abs() < 1e-9);
    assert!((centre.coordinates[1] - 0.25).abs() < 1e-9);
}

#[test]
fn deleted_and_complement_outputs_cover_the_model() {
    let mut model = model("3D Box");
    let full = model.output().unwrap();

    model.set_deletion_ranges("1-3,8").unwrap();
    let kept = model.output().unwrap();
    let complement = model.deletion().complement(&model.snapshot().domain);
    assert_eq!(complement.ranges_text(), "4-7,9-12");

    model.set_deletion_ranges(&complement.ranges_text()).unwrap();
    let other = model.output().unwrap();

    let ids = |output: &scaffold_engine::OutputModel| -> BTreeSet<ElementId> {
        output.elements.iter().map(|e| e.id).collect()
    };
    let mut union = ids(&kept);
    union.extend(ids(&other));
    assert_eq!(union, ids(&full));
    assert!(ids(&kept).is_disjoint(&ids(&other)));

    let nodes = |output: &scaffold_engine::OutputModel| -> BTreeSet<NodeId> {
        output.nodes.iter().map(|n| n.id).collect()
    };
    let mut node_union = nodes(&kept);
    node_union.extend(nodes(&other));
    assert_eq!(node_union, nodes(&full));

    let faces: BTreeSet<_> = kept.faces.iter().chain(&other.faces).copied().collect();
    assert_eq!(faces, full.faces.iter().copied().collect::<BTreeSet<_>>());

    // Deleting element 1 hides the built-in marker it hosts.
    assert!(kept.markers.is_empty());
    assert_eq!(other.markers.len(), 1);
    assert_eq!(DeletionSet::from_ranges_text("1-3, 8").unwrap().len(), 4);
}
