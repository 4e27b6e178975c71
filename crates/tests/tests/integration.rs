//! End-to-end tests: registries, graph resolution, lazy evaluation,
//! invalidation and checkpoints working together.

use databox::{CheckpointError, DataBox, Error, OptionTable, Snapshot, Tag, TagDecl, TagId};
use databox_tests::{TestHarness, worldtube_external, worldtube_options, worldtube_registry};
use databox_worldtube::{element_tags, options, singleton_tags, tags};

// ============================================================================
// Lazy evaluation
// ============================================================================

#[test]
fn test_repeated_reads_evaluate_once() {
    let mut harness = TestHarness::new();
    harness.input("A");
    harness.sum("B", &["A"]);
    let c = harness.sum("C", &["B"]);

    let data_box = harness.build(&["C"], &[("A", 2.0)]).unwrap();
    assert!(harness.log().entries().is_empty(), "construction evaluates nothing");

    assert_eq!(*data_box.get(&c).unwrap(), 2.0);
    assert_eq!(*data_box.get(&c).unwrap(), 2.0);
    assert_eq!(harness.log().entries(), ["B", "C"]);
    assert_eq!(data_box.evaluations("C").unwrap(), 1);
}

#[test]
fn test_reading_a_dependency_leaves_dependents_dirty() {
    let mut harness = TestHarness::new();
    harness.input("A");
    let b = harness.sum("B", &["A"]);
    harness.sum("C", &["B"]);

    let data_box = harness.build(&["C"], &[("A", 1.0)]).unwrap();
    data_box.get(&b).unwrap();

    assert!(data_box.is_clean("B").unwrap());
    assert!(!data_box.is_clean("C").unwrap());
    assert_eq!(harness.log().entries(), ["B"]);
}

// ============================================================================
// Invalidation
// ============================================================================

#[test]
fn test_mutation_invalidates_exactly_the_dependents() {
    let mut harness = TestHarness::new();
    let x = harness.input("X");
    harness.input("Y");
    harness.sum("P", &["X"]);
    harness.sum("Q", &["Y"]);
    let r = harness.sum("R", &["P", "Q"]);

    let mut data_box = harness.build(&["R"], &[("X", 1.0), ("Y", 10.0)]).unwrap();
    assert_eq!(*data_box.get(&r).unwrap(), 11.0);
    harness.log().clear();

    data_box.mutate(&x, |x| *x = 5.0).unwrap();

    assert!(!data_box.is_clean("P").unwrap());
    assert!(!data_box.is_clean("R").unwrap());
    assert!(data_box.is_clean("Q").unwrap());

    assert_eq!(*data_box.get(&r).unwrap(), 15.0);
    assert_eq!(harness.log().entries(), ["P", "R"]);
}

#[test]
fn test_diamond_reads_are_consistent_after_mutation() {
    let mut harness = TestHarness::new();
    let a = harness.input("A");
    let b = harness.sum("B", &["A"]);
    let c = harness.sum("C", &["A"]);
    let d = harness.sum("D", &["B", "C"]);

    let mut data_box = harness.build(&["D"], &[("A", 1.0)]).unwrap();
    assert_eq!(*data_box.get(&d).unwrap(), 2.0);

    data_box.mutate(&a, |a| *a = 2.0).unwrap();
    harness.log().clear();

    assert_eq!(*data_box.get(&d).unwrap(), 4.0);
    assert_eq!(*data_box.get(&b).unwrap(), 2.0);
    assert_eq!(*data_box.get(&c).unwrap(), 2.0);
    for id in ["B", "C", "D"] {
        assert_eq!(harness.log().count(id), 1, "{id} evaluated once");
    }
}

#[test]
fn test_mutation_without_reads_does_not_evaluate() {
    let mut harness = TestHarness::new();
    let a = harness.input("A");
    harness.sum("B", &["A"]);

    let mut data_box = harness.build(&["B"], &[("A", 1.0)]).unwrap();
    for value in 0..5 {
        data_box.mutate(&a, |a| *a = f64::from(value)).unwrap();
    }
    assert!(harness.log().entries().is_empty());
}

// ============================================================================
// Graph errors
// ============================================================================

#[test]
fn test_two_tag_cycle_is_reported_with_path() {
    let mut harness = TestHarness::new();
    harness.sum("X", &["Y"]);
    harness.sum("Y", &["X"]);

    let err = harness.build(&["X"], &[]).unwrap_err();
    match &err {
        Error::CyclicDependency { cycle } => {
            assert_eq!(cycle.len(), 3);
            assert_eq!(cycle.first(), cycle.last());
            assert!(cycle.contains(&TagId::from("X")));
            assert!(cycle.contains(&TagId::from("Y")));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.to_string(), "cycle detected in tag graph: X -> Y -> X");
}

#[test]
fn test_missing_argument_is_unresolved() {
    let mut harness = TestHarness::new();
    harness.sum("B", &["Missing"]);

    let err = harness.build(&["B"], &[]).unwrap_err();
    assert!(matches!(
        err,
        Error::UnresolvedDependency { ref tag, ref dependency }
            if tag.as_str() == "B" && dependency.as_str() == "Missing"
    ));
}

// ============================================================================
// Base tags
// ============================================================================

fn base_harness() -> TestHarness {
    let mut harness = TestHarness::new();
    harness.input("Input");
    let constant = harness.logged("Constant", &[], |_| 1.0).default_for("Source");
    let doubled = harness
        .logged("Doubled", &["Input"], |values| 2.0 * values[0])
        .implements("Source");
    harness.declare(constant);
    harness.declare(doubled);
    harness.sum("Reader", &["Source"]);
    harness
}

#[test]
fn test_base_tag_uses_default_implementation() {
    let harness = base_harness();
    let data_box = harness.build(&["Reader"], &[]).unwrap();

    assert_eq!(
        data_box.graph().binding(&TagId::from("Source")),
        Some(&TagId::from("Constant"))
    );
    assert_eq!(*data_box.get(&Tag::<f64>::new("Reader")).unwrap(), 1.0);
    assert!(!data_box.contains(&TagId::from("Input")));
}

#[test]
fn test_named_implementation_replaces_default() {
    let harness = base_harness();
    let data_box = harness
        .build(&["Reader", "Doubled"], &[("Input", 4.0)])
        .unwrap();

    assert!(!data_box.contains(&TagId::from("Constant")));
    assert_eq!(*data_box.get(&Tag::<f64>::new("Reader")).unwrap(), 8.0);
    assert_eq!(*data_box.get(&Tag::<f64>::new("Source")).unwrap(), 8.0);
    assert_eq!(harness.log().count("Constant"), 0);
}

#[test]
fn test_two_named_implementations_are_ambiguous() {
    let mut harness = base_harness();
    let tripled = harness
        .logged("Tripled", &["Input"], |values| 3.0 * values[0])
        .implements("Source");
    harness.declare(tripled);

    let err = harness
        .build(&["Reader", "Doubled", "Tripled"], &[("Input", 1.0)])
        .unwrap_err();
    assert!(matches!(err, Error::AmbiguousBaseTag { ref base, .. } if base.as_str() == "Source"));
}

// ============================================================================
// Usage errors
// ============================================================================

#[test]
fn test_undeclared_argument_read_fails() {
    let mut harness = TestHarness::new();
    harness.input("A");
    harness.input("B");
    let sneaky: Tag<f64> = Tag::new("Sneaky");
    harness.declare(TagDecl::compute(
        &sneaky,
        vec![TagId::from("A")],
        |slot: &mut f64, args| {
            *slot = *args.get(&Tag::<f64>::new("B"))?;
            Ok(())
        },
    ));

    let data_box = harness
        .build(&["Sneaky", "B"], &[("A", 1.0), ("B", 2.0)])
        .unwrap();
    let err = data_box.get(&sneaky).unwrap_err();
    assert!(matches!(
        err,
        Error::UndeclaredArgument { ref tag, ref argument }
            if tag.as_str() == "Sneaky" && argument.as_str() == "B"
    ));
    assert!(!data_box.is_clean("Sneaky").unwrap());
}

#[test]
fn test_unsupplied_simple_tag_is_uninitialized() {
    let mut harness = TestHarness::new();
    let a = harness.input("A");
    let b = harness.sum("B", &["A"]);

    let mut data_box = harness.build(&["B"], &[]).unwrap();
    assert!(matches!(data_box.get(&a), Err(Error::UninitializedAccess(_))));
    assert!(matches!(data_box.get(&b), Err(Error::UninitializedAccess(_))));
    assert!(matches!(
        data_box.mutate(&a, |a| *a = 1.0),
        Err(Error::UninitializedAccess(_))
    ));
    assert!(harness.log().entries().is_empty());
}

#[test]
fn test_wrong_type_is_rejected() {
    let mut harness = TestHarness::new();
    harness.input("A");

    let data_box = harness.build(&["A"], &[("A", 1.0)]).unwrap();
    let err = data_box.get(&Tag::<i64>::new("A")).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { ref tag, .. } if tag.as_str() == "A"));
}

#[test]
fn test_tag_outside_the_box_is_unknown() {
    let mut harness = TestHarness::new();
    harness.input("A");
    let unused = harness.input("Unused");

    let data_box = harness.build(&["A"], &[("A", 1.0)]).unwrap();
    assert!(matches!(
        data_box.get(&unused),
        Err(Error::UnknownTag(ref id)) if id.as_str() == "Unused"
    ));
}

#[test]
fn test_failed_compute_stays_dirty_and_recovers() {
    let mut harness = TestHarness::new();
    let a = harness.input("A");
    let checked: Tag<f64> = Tag::new("Checked");
    harness.declare(TagDecl::compute(
        &checked,
        vec![TagId::from("A")],
        |slot: &mut f64, args| {
            let a = *args.get(&Tag::<f64>::new("A"))?;
            anyhow::ensure!(a >= 0.0, "negative input {a}");
            *slot = a.sqrt();
            Ok(())
        },
    ));

    let mut data_box = harness.build(&["Checked"], &[("A", -4.0)]).unwrap();
    let err = data_box.get(&checked).unwrap_err();
    assert!(matches!(err, Error::Compute { ref tag, .. } if tag.as_str() == "Checked"));
    assert!(err.to_string().contains("negative input"));
    assert!(!data_box.is_clean("Checked").unwrap());

    data_box.mutate(&a, |a| *a = 4.0).unwrap();
    assert_eq!(*data_box.get(&checked).unwrap(), 2.0);
}

// ============================================================================
// Worldtube scenario
// ============================================================================

#[test]
fn test_worldtube_acceleration_evaluates_orbit_once() {
    let registry = worldtube_registry();
    let roots: [TagId; 2] = [tags::geodesic_acceleration().into(), tags::charge().into()];
    let mut data_box =
        DataBox::construct(&registry, &roots, &worldtube_options(), worldtube_external(0.0))
            .unwrap();

    assert_eq!(*data_box.get(&tags::charge()).unwrap(), 0.5);
    assert!(!data_box.is_clean(&tags::particle_position_velocity()).unwrap());
    assert!(!data_box.is_clean(&tags::geodesic_acceleration()).unwrap());

    let acceleration = *data_box.get(&tags::geodesic_acceleration()).unwrap();
    assert!((acceleration[0] + 1.0 / 36.0).abs() < 1e-12);
    data_box.get(&tags::geodesic_acceleration()).unwrap();
    assert_eq!(
        data_box
            .evaluations(&tags::particle_position_velocity_compute())
            .unwrap(),
        1
    );
    assert_eq!(
        data_box.evaluations(&tags::geodesic_acceleration()).unwrap(),
        1
    );

    data_box.mutate(&tags::time(), |t| *t = 10.0).unwrap();
    assert!(!data_box.is_clean(&tags::particle_position_velocity()).unwrap());
    assert!(!data_box.is_clean(&tags::geodesic_acceleration()).unwrap());

    data_box.get(&tags::geodesic_acceleration()).unwrap();
    assert_eq!(
        data_box
            .evaluations(&tags::particle_position_velocity_compute())
            .unwrap(),
        2
    );
}

#[test]
fn test_worldtube_shaped_graph_evaluates_in_dependency_order() {
    let mut harness = TestHarness::new();
    let time = harness.input("Time");
    harness.input("ExcisionSphere");
    harness.sum("ParticlePositionVelocity", &["ExcisionSphere", "Time"]);
    let acceleration = harness.sum("GeodesicAcceleration", &["ParticlePositionVelocity"]);

    let mut data_box = harness
        .build(
            &["GeodesicAcceleration"],
            &[("Time", 0.0), ("ExcisionSphere", 6.0)],
        )
        .unwrap();

    data_box.get(&acceleration).unwrap();
    assert_eq!(
        harness.log().entries(),
        ["ParticlePositionVelocity", "GeodesicAcceleration"]
    );

    data_box.mutate(&time, |t| *t = 1.0).unwrap();
    data_box.get(&acceleration).unwrap();
    assert_eq!(
        harness.log().entries(),
        [
            "ParticlePositionVelocity",
            "GeodesicAcceleration",
            "ParticlePositionVelocity",
            "GeodesicAcceleration"
        ]
    );
}

#[test]
fn test_negative_mass_is_an_invalid_option() {
    let err = DataBox::construct(
        &worldtube_registry(),
        &singleton_tags(),
        &worldtube_options().with(options::MASS, -1.0),
        worldtube_external(0.0),
    )
    .unwrap_err();

    assert!(matches!(err, Error::InvalidOption { ref tag, .. } if tag.as_str() == "Mass"));
    assert!(err.to_string().contains(options::MASS));
}

#[test]
fn test_missing_option_is_an_invalid_option() {
    let table: OptionTable = worldtube_options()
        .iter()
        .filter(|(name, _)| *name != options::CHARGE)
        .map(|(name, value)| (name, value.clone()))
        .collect();

    let err = DataBox::construct(
        &worldtube_registry(),
        &element_tags(),
        &table,
        worldtube_external(0.0),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidOption { ref option, .. } if option == options::CHARGE));
}

#[test]
fn test_option_built_tag_cannot_be_supplied() {
    let err = DataBox::construct(
        &worldtube_registry(),
        &singleton_tags(),
        &worldtube_options(),
        worldtube_external(0.0).with(&tags::mass(), 1.0),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::ConflictingInitialization { ref tag } if tag.as_str() == "Mass"
    ));
}

// ============================================================================
// Checkpoints
// ============================================================================

fn singleton() -> DataBox {
    DataBox::construct(
        &worldtube_registry(),
        &singleton_tags(),
        &worldtube_options(),
        worldtube_external(0.0),
    )
    .unwrap()
}

#[test]
fn test_checkpoint_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checkpoints").join("singleton.bin");

    let mut original = singleton();
    original
        .mutate(&tags::evolved_position(), |x| *x = [0.0, 4.0, 0.0])
        .unwrap();
    original.mutate(&tags::time(), |t| *t = 2.5).unwrap();
    let expected = *original.get(&tags::geodesic_acceleration()).unwrap();

    original
        .snapshot()
        .unwrap()
        .write(&path, databox::DEFAULT_COMPRESSION_LEVEL)
        .unwrap();

    let mut restored = singleton();
    restored.get(&tags::geodesic_acceleration()).unwrap();
    restored.restore(&Snapshot::load(&path).unwrap()).unwrap();

    assert!(!restored.is_clean(&tags::geodesic_acceleration()).unwrap());
    assert_eq!(*restored.get(&tags::time()).unwrap(), 2.5);
    assert_eq!(
        *restored.get(&tags::evolved_position()).unwrap(),
        [0.0, 4.0, 0.0]
    );
    assert_eq!(*restored.get(&tags::geodesic_acceleration()).unwrap(), expected);
}

#[test]
fn test_checkpoint_rejects_other_layout() {
    let snapshot = singleton().snapshot().unwrap();
    let mut element = DataBox::construct(
        &worldtube_registry(),
        &element_tags(),
        &worldtube_options(),
        worldtube_external(0.0),
    )
    .unwrap();

    let err = element.restore(&snapshot).unwrap_err();
    assert!(matches!(err, CheckpointError::LayoutMismatch { .. }));
}

// ============================================================================
// Element boxes
// ============================================================================

#[test]
fn test_element_boxes_are_independent() {
    let registry = worldtube_registry();
    let graph = databox::resolve(&registry, &element_tags()).unwrap();
    let mut boxes: Vec<DataBox> = (0..3)
        .map(|_| DataBox::from_graph(graph.clone(), &worldtube_options(), worldtube_external(0.0)))
        .collect::<databox::Result<_>>()
        .unwrap();

    std::thread::scope(|scope| {
        for (i, data_box) in boxes.iter_mut().enumerate() {
            scope.spawn(move || {
                data_box
                    .mutate(&tags::time(), |t| *t = 50.0 * i as f64)
                    .unwrap();
                data_box.get(&tags::puncture_amplitude()).unwrap();
            });
        }
    });

    let radii: Vec<f64> = boxes
        .iter()
        .map(|b| *b.get(&tags::orbital_radius()).unwrap())
        .collect();
    assert_eq!(radii, [6.0, 6.0, 6.0]);

    let x: Vec<f64> = boxes
        .iter()
        .map(|b| b.get(&tags::particle_state()).unwrap()[0][0])
        .collect();
    assert_eq!(x[0], 6.0);
    assert_ne!(x[1], x[0]);
    assert_ne!(x[2], x[1]);
}
