//! Integration tests for schema lookups and plurality proofs.
//!
//! The schema mirrors an observatory data model:
//!
//! ```text
//! Survey <=(multiple)= OBSpec <- OB <- Exposure <- Run
//!                        ^
//!                        |
//! Fibre <- FibreTarget --+
//! ```

use hierarchy_schema::{
    parse, AccessStep, Direction, HierarchyType, Resolution, Schema, SchemaError,
};

fn observatory() -> Schema {
    Schema::builder()
        .hierarchy(HierarchyType::builder("Survey").idname("surveyname"))
        .hierarchy(
            HierarchyType::builder("OBSpec")
                .idname("obspecid")
                .factor("title")
                .multiple_parent("Survey"),
        )
        .hierarchy(
            HierarchyType::builder("OB")
                .idname("obid")
                .factor("obstartmjd")
                .parent("OBSpec"),
        )
        .hierarchy(
            HierarchyType::builder("Exposure")
                .idname("expid")
                .factors(["mjd", "exptime"])
                .parent("OB"),
        )
        .hierarchy(
            HierarchyType::builder("Run")
                .idname("runid")
                .factor("camera")
                .parent("Exposure"),
        )
        .hierarchy(
            HierarchyType::builder("Fibre")
                .idname("fibreid")
                .factors(["ra", "dec"]),
        )
        .hierarchy(
            HierarchyType::builder("FibreTarget")
                .idname("fibretargetid")
                .parent("Fibre")
                .parent("OBSpec"),
        )
        .build()
        .unwrap()
}

#[test]
fn test_every_declared_one_parent_is_singular_upwards() {
    let schema = observatory();
    for hierarchy in schema.hierarchies() {
        for relation in hierarchy.parents() {
            let proof = schema
                .node_implies_plurality_of(hierarchy.name(), &relation.hierarchy)
                .unwrap();
            let multiple = relation.multiplicity == hierarchy_schema::Multiplicity::Multiple;
            assert_eq!(proof.plural, multiple, "{} -> {}", hierarchy.name(), relation.hierarchy);
        }
    }
}

#[test]
fn test_every_child_hop_is_plural() {
    let schema = observatory();
    for hierarchy in schema.hierarchies() {
        for relation in hierarchy.parents() {
            let proof = schema
                .node_implies_plurality_of(&relation.hierarchy, hierarchy.name())
                .unwrap();
            assert!(proof.plural, "{} -> {}", relation.hierarchy, hierarchy.name());
            assert_eq!(proof.path.hops[0].direction, Direction::ToChild);
        }
    }
}

#[test]
fn test_run_reaches_obspec_singularly() {
    let schema = observatory();
    let proof = schema.node_implies_plurality_of("Run", "OBSpec").unwrap();
    assert!(!proof.plural);
    assert_eq!(proof.hop_count(), 3);
    assert_eq!(proof.target, "OBSpec");
}

#[test]
fn test_fibre_target_reaches_exposures_plurally() {
    let schema = observatory();
    let proof = schema
        .node_implies_plurality_of("FibreTarget", "Exposure")
        .unwrap();
    assert!(proof.plural);
    assert_eq!(proof.path.to_string(), "(FibreTarget)->(OBSpec)<=(OB)<=(Exposure)");
}

#[test]
fn test_resolution_of_every_access_name() {
    let schema = observatory();
    for hierarchy in schema.hierarchies() {
        assert!(matches!(
            schema.resolve(hierarchy.singular_name()),
            Resolution::SingularType(ref h) if h.name() == hierarchy.name()
        ));
        assert!(matches!(
            schema.resolve(hierarchy.plural_name()),
            Resolution::PluralType(ref h) if h.name() == hierarchy.name()
        ));
    }
    assert!(matches!(
        schema.resolve("cameras"),
        Resolution::PluralFactor { ref factor, .. } if factor == "camera"
    ));
}

#[test]
fn test_factor_owner_from_unrelated_type_is_still_unique() {
    let schema = observatory();
    let location = schema.hierarchy_of_factor("ras", Some("Run")).unwrap();
    assert_eq!(location.hierarchy, "Fibre");
    assert!(location.plural_requested);
}

#[test]
fn test_unknown_factor() {
    let schema = observatory();
    let err = schema.hierarchy_of_factor("camra", Some("Run")).unwrap_err();
    assert_eq!(err, SchemaError::UnknownFactor("camra".to_string()));
}

#[test]
fn test_parsed_path_names_all_resolve() {
    let schema = observatory();
    let path = parse("obspecs[[1, 2]].obs.exposures.runs['camera', 'runid']").unwrap();
    for step in &path.steps {
        match step {
            AccessStep::Attribute(name) => {
                assert_ne!(schema.resolve(name), Resolution::Unknown, "{}", name)
            }
            AccessStep::Columns(names) => {
                for name in names {
                    assert!(schema.is_singular_name(name), "{}", name);
                }
            }
            _ => {}
        }
    }
}
