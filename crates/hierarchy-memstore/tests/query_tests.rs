//! End-to-end tests: queries built with `hierarchy-query` and executed
//! against a [`MemoryStore`].
//!
//! ```text
//! Survey <=(multiple)= OBSpec <- OB <- Exposure <- Run
//!                        ^
//!                        |
//! Fibre <- FibreTarget --+
//! ```
//!
//! Data:
//!
//! ```text
//! survey main, aux
//! obspec 1 (main, aux)   obspec 2 (main)
//! ob 10 (spec 1, obstartmjd 58999.0)   ob 11 (spec 1)   ob 12 (spec 2)
//! exposure 100 (ob 10)   exposure 101 (ob 10)   exposure 102 (ob 11, no exptime)
//! run 1 (exp 100, red)   run 2 (exp 101, blue)   run 3 (exp 101, red)
//! fibre 7 (ra 1.0, dec 2.0)   fibretarget 70 (fibre 7, obspec 1)
//! ```

use std::sync::Arc;

use hierarchy_memstore::MemoryStore;
use hierarchy_query::{
    Accessed, ExecutionSubstrate, FactorOutput, FactorShape, Handler, HierarchyQuery,
    IdentifierPolicy, Output, QueryBuildError, QueryConfig, QueryExecutionError,
};
use hierarchy_schema::{HierarchyType, Identifier, Schema, Value};

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

fn load(store: &mut MemoryStore) {
    let main = store.insert_node("Survey", "main").unwrap();
    let aux = store.insert_node("Survey", "aux").unwrap();

    let spec1 = store.insert("OBSpec", 1, [("title", "deep")]).unwrap();
    let spec2 = store.insert("OBSpec", 2, [("title", "wide")]).unwrap();
    store.link(spec1, main).unwrap();
    store.link(spec1, aux).unwrap();
    store.link(spec2, main).unwrap();

    let ob10 = store.insert("OB", 10, [("obstartmjd", 58999.0)]).unwrap();
    let ob11 = store.insert_node("OB", 11).unwrap();
    let ob12 = store.insert_node("OB", 12).unwrap();
    store.link(ob10, spec1).unwrap();
    store.link(ob11, spec1).unwrap();
    store.link(ob12, spec2).unwrap();

    let e100 = store
        .insert("Exposure", 100, [("mjd", 59000.5), ("exptime", 900.0)])
        .unwrap();
    let e101 = store
        .insert("Exposure", 101, [("mjd", 59001.5), ("exptime", 600.0)])
        .unwrap();
    let e102 = store.insert("Exposure", 102, [("mjd", 59002.5)]).unwrap();
    store.link(e100, ob10).unwrap();
    store.link(e101, ob10).unwrap();
    store.link(e102, ob11).unwrap();

    for (runid, exposure, camera) in [(1, e100, "red"), (2, e101, "blue"), (3, e101, "red")] {
        let run = store.insert("Run", runid, [("camera", camera)]).unwrap();
        store.link(run, exposure).unwrap();
    }

    let fibre = store
        .insert("Fibre", 7, [("ra", 1.0), ("dec", 2.0)])
        .unwrap();
    let target = store.insert_node("FibreTarget", 70).unwrap();
    store.link(target, fibre).unwrap();
    store.link(target, spec1).unwrap();
}

fn setup_with(config: QueryConfig) -> (Arc<Handler>, MemoryStore) {
    let handler = Handler::with_config(observatory(), config);
    let mut store = MemoryStore::new(handler.schema().clone());
    load(&mut store);
    (handler, store)
}

fn setup() -> (Arc<Handler>, MemoryStore) {
    setup_with(QueryConfig::default())
}

fn run(handler: &Arc<Handler>, store: &MemoryStore, path: &str) -> Result<Output, QueryExecutionError> {
    handler.query(path).unwrap().execute(store)
}

fn ids(output: &Output) -> Vec<Identifier> {
    output.identifiers().into_iter().cloned().collect()
}

fn int_ids(ids: &[i64]) -> Vec<Identifier> {
    ids.iter().copied().map(Identifier::Int).collect()
}

fn column(output: &Output) -> Vec<Value> {
    match output.as_factor() {
        Some(FactorOutput::Column(values)) => values.clone(),
        other => panic!("expected a column, got {:?}", other),
    }
}

// ============================================================================
// Identified queries
// ============================================================================

#[test]
fn test_identified_keeps_order_and_duplicates_and_reports_missing() {
    let (handler, store) = setup();
    let err = run(&handler, &store, "runs[[1, 2, 2, 99]]").unwrap_err();
    match err {
        QueryExecutionError::MissingIdentifiers { missing, partial } => {
            assert_eq!(missing.get("runid"), Some(int_ids(&[99]).as_slice()));
            assert_eq!(ids(&partial), int_ids(&[1, 2, 2]));
        }
        other => panic!("expected missing identifiers, got {other}"),
    }
}

#[test]
fn test_identified_follows_caller_order() {
    let (handler, store) = setup();
    let output = run(&handler, &store, "runs[[3, 1]]").unwrap();
    assert_eq!(ids(&output), int_ids(&[3, 1]));
}

#[test]
fn test_identified_deduplicates_under_policy() {
    let config = QueryConfig::builder()
        .with_identifier_policy(IdentifierPolicy::Deduplicate)
        .build();
    let (handler, store) = setup_with(config);
    let output = run(&handler, &store, "runs[[2, 1, 2]]").unwrap();
    assert_eq!(ids(&output), int_ids(&[2, 1]));
}

#[test]
fn test_identified_factor_column_in_caller_order() {
    let (handler, store) = setup();
    let output = run(&handler, &store, "runs[[2, 1]].camera").unwrap();
    assert_eq!(column(&output), vec![Value::from("blue"), Value::from("red")]);
}

#[test]
fn test_missing_check_stays_on_identified_node() {
    let (handler, store) = setup();
    assert!(run(&handler, &store, "runs[[1, 99]]").is_err());

    let exposures = run(&handler, &store, "runs[[1, 99]].exposure").unwrap();
    assert_eq!(ids(&exposures), int_ids(&[100]));
}

#[test]
fn test_homogeneous_bare_identifier_is_rejected() {
    let (handler, _) = setup();
    assert!(matches!(
        handler.query("obs[10]"),
        Err(QueryBuildError::BareIdentifier { .. })
    ));
    assert!(handler.query("obs[[10]]").is_ok());
    assert!(matches!(
        handler.query("obs[[10]][[11]]"),
        Err(QueryBuildError::AlreadyIdentified { .. })
    ));
}

// ============================================================================
// Single queries
// ============================================================================

#[test]
fn test_single_reconstructs_instance() {
    let (handler, store) = setup();
    let output = run(&handler, &store, "run[1]").unwrap();
    let object = output.as_object().unwrap();
    assert_eq!(object.hierarchy, "Run");
    assert_eq!(object.identifier, Identifier::Int(1));
    assert_eq!(object.factor("camera"), Some(&Value::from("red")));
}

#[test]
fn test_single_not_found_names_filters() {
    let (handler, store) = setup();
    match run(&handler, &store, "run[99]").unwrap_err() {
        QueryExecutionError::NotFound {
            hierarchy,
            identifiers,
        } => {
            assert_eq!(hierarchy, "Run");
            assert_eq!(identifiers.get("runid"), Some(int_ids(&[99]).as_slice()));
        }
        other => panic!("expected not found, got {other}"),
    }
}

#[test]
fn test_not_found_after_singular_hop_names_every_filter() {
    let (handler, store) = setup();
    match run(&handler, &store, "run[99].exposure").unwrap_err() {
        QueryExecutionError::NotFound {
            hierarchy,
            identifiers,
        } => {
            assert_eq!(hierarchy, "Exposure");
            assert_eq!(identifiers.to_string(), "{runid: [99]}");
        }
        other => panic!("expected not found, got {other}"),
    }
}

#[test]
fn test_singular_hop_from_plural_stays_plural() {
    let (handler, store) = setup();
    let query = handler.query("exposures[[100, 102]].ob").unwrap();
    assert!(matches!(
        query.as_hierarchy(),
        Some(HierarchyQuery::Homogeneous(_))
    ));
    let output = query.execute(&store).unwrap();
    assert_eq!(ids(&output), int_ids(&[10, 11]));
}

#[test]
fn test_singular_hops_stay_single() {
    let (handler, store) = setup();
    let query = handler.query("run[1].ob").unwrap();
    assert!(matches!(
        query.as_hierarchy(),
        Some(HierarchyQuery::Single(_))
    ));
    let output = query.execute(&store).unwrap();
    assert_eq!(ids(&output), int_ids(&[10]));
}

#[test]
fn test_single_scalar_and_row() {
    let (handler, store) = setup();
    let output = run(&handler, &store, "run[1].obstartmjd").unwrap();
    assert_eq!(
        output.as_factor(),
        Some(&FactorOutput::Scalar(Value::Float(58999.0)))
    );

    let output = run(&handler, &store, "exposure[102]['mjd', 'exptime']").unwrap();
    match output.as_factor() {
        Some(FactorOutput::Row(row)) => {
            assert_eq!(row.get("mjd"), Some(&Value::Float(59002.5)));
            assert_eq!(row.get("exptime"), Some(&Value::Null));
        }
        other => panic!("expected a row, got {:?}", other),
    }
}

#[test]
fn test_factor_through_singular_hops() {
    let (handler, store) = setup();
    let output = run(&handler, &store, "fibretarget[70].ra").unwrap();
    assert_eq!(
        output.as_factor(),
        Some(&FactorOutput::Scalar(Value::Float(1.0)))
    );
}

#[test]
fn test_single_identifier_index_rejected() {
    let (handler, _) = setup();
    assert!(matches!(
        handler.query("run[1][2]"),
        Err(QueryBuildError::AlreadySingle { .. })
    ));
}

// ============================================================================
// Plurality
// ============================================================================

#[test]
fn test_singular_name_across_plural_hop_is_ambiguous() {
    let (handler, store) = setup();
    match handler.query("ob[10].exposure") {
        Err(QueryBuildError::Ambiguous {
            requested,
            plural,
            context,
        }) => {
            assert_eq!(requested, "exposure");
            assert_eq!(plural, "exposures");
            assert_eq!(context, "ob[10]");
        }
        other => panic!("expected ambiguity, got {:?}", other),
    }

    let output = run(&handler, &store, "ob[10].exposures").unwrap();
    assert_eq!(ids(&output), int_ids(&[100, 101]));
}

#[test]
fn test_multiple_parent_is_plural() {
    let (handler, store) = setup();
    assert!(matches!(
        handler.query("obspec[1].survey"),
        Err(QueryBuildError::Ambiguous { .. })
    ));
    let output = run(&handler, &store, "fibretarget[70].surveys").unwrap();
    assert_eq!(output.as_objects().map(|o| o.len()), Some(2));
}

#[test]
fn test_singular_factor_across_plural_hop_is_ambiguous() {
    let (handler, _) = setup();
    assert!(matches!(
        handler.query("ob[10].mjd"),
        Err(QueryBuildError::Ambiguous { plural, .. }) if plural == "mjds"
    ));
}

#[test]
fn test_plural_factor_of_single_is_column() {
    let (handler, store) = setup();
    let query = handler.query("ob[10].mjds").unwrap();
    assert_eq!(query.as_factor().map(|f| f.shape()), Some(FactorShape::Column));
    let output = query.execute(&store).unwrap();
    assert_eq!(column(&output), vec![Value::Float(59000.5), Value::Float(59001.5)]);

    let output = run(&handler, &store, "ob[12].mjds").unwrap();
    assert!(column(&output).is_empty());
}

#[test]
fn test_plural_factor_of_plural_keeps_one_row_per_instance() {
    let (handler, store) = setup();
    let output = run(&handler, &store, "obs.mjds").unwrap();
    assert_eq!(
        column(&output),
        vec![
            Value::from(vec![59000.5, 59001.5]),
            Value::from(vec![59002.5]),
            Value::List(Vec::new()),
        ]
    );
}

#[test]
fn test_table_of_plural_query() {
    let (handler, store) = setup();
    let output = run(&handler, &store, "ob[10].exposures['mjd', 'exptime']").unwrap();
    match output.as_factor() {
        Some(FactorOutput::Table(table)) => {
            assert_eq!(table.labels(), &["mjd".to_string(), "exptime".to_string()]);
            assert_eq!(table.len(), 2);
            assert_eq!(
                table.column("exptime"),
                Some(vec![&Value::Float(900.0), &Value::Float(600.0)])
            );
        }
        other => panic!("expected a table, got {:?}", other),
    }
}

#[test]
fn test_root_access_rules() {
    let (handler, store) = setup();
    let root = handler.begin_with_heterogeneous();

    assert!(matches!(root.get("run"), Err(QueryBuildError::Ambiguous { .. })));
    assert!(matches!(root.get("camera"), Err(QueryBuildError::Ambiguous { .. })));
    assert!(matches!(
        root.get("bogus"),
        Err(QueryBuildError::UnknownName { context, .. }) if context == "root"
    ));

    let cameras = root.get("cameras").unwrap();
    assert_eq!(cameras.access_path().to_string(), "runs.cameras");
    assert_eq!(
        column(&cameras.execute(&store).unwrap()),
        vec![Value::from("red"), Value::from("blue"), Value::from("red")]
    );
    assert!(matches!(
        root.execute(&store),
        Err(QueryExecutionError::NotExecutable)
    ));
}

#[test]
fn test_unknown_name_carries_context() {
    let (handler, _) = setup();
    assert!(matches!(
        handler.query("ob[10].bogus"),
        Err(QueryBuildError::UnknownName { context, .. }) if context == "ob[10]"
    ));
}

#[test]
fn test_unknown_name_on_every_kind() {
    let (handler, _) = setup();

    // Homogeneous
    assert!(matches!(
        handler.query("obs.bogus"),
        Err(QueryBuildError::UnknownName { name, context }) if name == "bogus" && context == "obs"
    ));
    // Identified
    assert!(matches!(
        handler.query("obs[[10]].bogus"),
        Err(QueryBuildError::UnknownName { context, .. }) if context == "obs[[10]]"
    ));
    // factor reads
    assert!(matches!(
        handler.query("obs['bogus']"),
        Err(QueryBuildError::UnknownName { context, .. }) if context == "obs"
    ));
    assert!(matches!(
        handler.query("ob[10]['obstartmjd', 'bogus']"),
        Err(QueryBuildError::UnknownName { name, .. }) if name == "bogus"
    ));
}

#[test]
fn test_factor_query_is_terminal() {
    let (handler, _) = setup();
    assert!(matches!(
        handler.query("ob[10].mjds.exposures"),
        Err(QueryBuildError::FactorNotTraversable { .. })
    ));
}

// ============================================================================
// Laziness and sharing
// ============================================================================

#[test]
fn test_parents_are_lazy_queries() {
    let (handler, store) = setup();
    let before = store.stats().statements_run;
    let output = run(&handler, &store, "run[2]").unwrap();
    assert_eq!(store.stats().statements_run, before + 1);

    let object = output.as_object().unwrap();
    let exposure = object.parent("exposure").unwrap();
    assert_eq!(exposure.access_path().to_string(), "run[2].exposure");
    assert_eq!(store.stats().statements_run, before + 1);

    let parent = exposure.execute(&store).unwrap();
    assert_eq!(ids(&parent), int_ids(&[101]));
    assert_eq!(store.stats().statements_run, before + 2);
}

#[test]
fn test_derivation_is_pure() {
    let (handler, _) = setup();
    let ob = handler.query("ob[10]").unwrap().into_hierarchy().unwrap();
    let before = ob.compile().unwrap();

    let first = ob.get("exposures").unwrap();
    let second = ob.get("exposures").unwrap();
    let _mjds = ob.get("mjds").unwrap();

    assert_eq!(first.compile().unwrap(), second.compile().unwrap());
    assert_eq!(first.access_path(), second.access_path());
    assert_eq!(ob.compile().unwrap(), before);
}

#[test]
fn test_siblings_execute_concurrently() {
    let (handler, store) = setup();
    let ob = handler.query("ob[10]").unwrap();
    let siblings: Vec<Accessed> = ["exposures", "mjds", "exptimes", "obspec"]
        .iter()
        .map(|name| ob.get(name).unwrap())
        .collect();

    let sequential: Vec<String> = siblings
        .iter()
        .map(|q| format!("{:?}", q.execute(&store).unwrap()))
        .collect();

    let substrate: &dyn ExecutionSubstrate = &store;
    let concurrent: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = siblings
            .iter()
            .map(|q| scope.spawn(move || format!("{:?}", q.execute(substrate).unwrap())))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(sequential, concurrent);
}

#[test]
fn test_explain_lists_hops() {
    let (handler, _) = setup();
    let plan = handler.query("ob[10].exposures.runs").unwrap().explain();
    assert_eq!(plan.steps.len(), 3);
    assert_eq!(plan.steps[0].expected_count, Some(1));
    assert!(plan.steps[2].plural);
    assert!(plan.to_string().contains("TRAVERSE"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_result_limit() {
    let config = QueryConfig::builder().with_max_results(2).build();
    let (handler, store) = setup_with(config);
    assert!(matches!(
        run(&handler, &store, "runs"),
        Err(QueryExecutionError::ResultTooLarge { count: 3, limit: 2 })
    ));
    assert!(run(&handler, &store, "runs[[1, 2]]").is_ok());
}
