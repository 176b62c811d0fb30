//! Orchestrator behavior end-to-end against the in-memory protocol:
//! counts, identifier generation, positional correctness, release-on-error,
//! cancellation.
//! Run with: cargo test --test loader_tests

mod common;

use common::{build_family_plans, Child, Parent};
use pgbulk::{
    BulkError, BulkLoader, CancellationToken, MemoryConnection, Value, WireType,
};
use uuid::Uuid;

#[tokio::test]
async fn three_parents_with_two_children_each_yield_nine_rows() {
    common::init_logging();

    let loader = BulkLoader::new();
    build_family_plans(loader.cache());

    let conn = MemoryConnection::new();
    let mut parents = vec![
        Parent::named("p1", vec![Child::valued("a"), Child::valued("b")]),
        Parent::named("p2", vec![Child::valued("c"), Child::valued("d")]),
        Parent::named("p3", vec![Child::valued("e"), Child::valued("f")]),
    ];

    let total = loader
        .bulk_insert(&conn, &mut parents, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(total, 9);
    assert_eq!(conn.row_count("Parents"), 3);
    assert_eq!(conn.row_count("Childs"), 6);

    for parent in &parents {
        assert!(!parent.id.is_nil());
        for child in &parent.children {
            assert_eq!(child.parent_id, parent.id);
            assert!(!child.id.is_nil());
        }
    }
}

#[tokio::test]
async fn generated_ids_replace_nil_and_preserve_supplied_values() {
    let loader = BulkLoader::new();
    build_family_plans(loader.cache());

    let supplied = Uuid::new_v4();
    let conn = MemoryConnection::new();
    let mut parents = vec![
        Parent::named("generated", vec![]),
        Parent {
            id: supplied,
            name: "supplied".into(),
            children: vec![],
        },
    ];

    loader
        .bulk_insert(&conn, &mut parents, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!parents[0].id.is_nil());
    assert_eq!(parents[1].id, supplied);

    // The serialized cells carry the same identifiers the entities now hold.
    let table = conn.table("Parents").unwrap();
    assert_eq!(table.rows[0][0], Value::Uuid(parents[0].id));
    assert_eq!(table.rows[1][0], Value::Uuid(supplied));
}

#[tokio::test]
async fn command_text_and_cell_positions_agree() {
    let loader = BulkLoader::new();
    build_family_plans(loader.cache());

    let conn = MemoryConnection::new();
    let mut parents = vec![Parent::named("positional", vec![Child::valued("x")])];

    loader
        .bulk_insert(&conn, &mut parents, &CancellationToken::new())
        .await
        .unwrap();

    let commands = conn.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(
        commands[0],
        r#"COPY "Parents"("id", "name") FROM STDIN BINARY;"#
    );
    assert_eq!(
        commands[1],
        r#"COPY "Childs"("id", "parent_id", "value") FROM STDIN BINARY;"#
    );

    let children = conn.table("Childs").unwrap();
    assert_eq!(children.columns, vec!["id", "parent_id", "value"]);
    assert_eq!(children.rows[0][1], Value::Uuid(parents[0].id));
    assert_eq!(children.rows[0][2], Value::Text("x".into()));
}

#[tokio::test]
async fn empty_sequence_still_runs_a_zero_row_load() {
    let loader = BulkLoader::new();
    build_family_plans(loader.cache());

    let conn = MemoryConnection::new();
    let mut parents: Vec<Parent> = Vec::new();

    let total = loader
        .bulk_insert(&conn, &mut parents, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(total, 0);
    assert_eq!(conn.commands().len(), 1);
    assert_eq!(conn.row_count("Parents"), 0);
    assert!(!conn.in_copy());
}

#[tokio::test]
async fn missing_plan_is_an_error_and_discovery_runs_first() {
    let loader = BulkLoader::new();
    // No configuration registered, no plan built.
    let conn = MemoryConnection::new();
    let mut parents = vec![Parent::named("p", vec![])];

    let err = loader
        .bulk_insert(&conn, &mut parents, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BulkError::MissingPlan("Parent")));
    // Discovery ran (and found nothing); the flag is set either way.
    assert!(loader.configurator().is_built());
}

#[tokio::test]
async fn cancellation_observed_before_rows_releases_the_writer() {
    let loader = BulkLoader::new();
    build_family_plans(loader.cache());

    let conn = MemoryConnection::new();
    let token = CancellationToken::new();
    token.cancel();

    let mut parents = vec![Parent::named("p", vec![])];
    let err = loader
        .bulk_insert(&conn, &mut parents, &token)
        .await
        .unwrap_err();

    assert!(matches!(err, BulkError::Cancelled));
    assert!(!conn.in_copy());
    assert_eq!(conn.row_count("Parents"), 0);

    // The connection is usable again after the release.
    let total = loader
        .bulk_insert(&conn, &mut parents, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn mid_load_write_failure_releases_the_writer_and_propagates() {
    let loader = BulkLoader::new();
    build_family_plans(loader.cache());

    let conn = MemoryConnection::new();
    conn.fail_after_cells(3);

    let mut parents = vec![
        Parent::named("p1", vec![]),
        Parent::named("p2", vec![]),
        Parent::named("p3", vec![]),
    ];

    let err = loader
        .bulk_insert(&conn, &mut parents, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BulkError::Protocol(_)));
    assert!(!conn.in_copy());
    // Nothing was finalized, so nothing committed.
    assert_eq!(conn.row_count("Parents"), 0);
}

#[tokio::test]
async fn explicit_wire_type_mismatch_surfaces_as_serialization_error() {
    use pgbulk::{Entity, EntityBuilder, FieldAccessor};

    struct Odd {
        label: String,
    }

    impl Entity for Odd {
        fn entity_name() -> &'static str {
            "Odd"
        }
        fn fields() -> Vec<FieldAccessor<Self>> {
            vec![FieldAccessor::new(
                "label",
                |o: &Odd| Value::from(o.label.as_str()),
                |o: &mut Odd, v| {
                    if let Value::Text(s) = v {
                        o.label = s;
                    }
                },
            )]
        }
    }

    let loader = BulkLoader::new();
    EntityBuilder::<Odd>::new()
        // Deliberately wrong: text values declared as uuid cells.
        .map_wire_type("label", WireType::Uuid)
        .build(loader.cache())
        .unwrap();

    let conn = MemoryConnection::new();
    let mut rows = vec![Odd {
        label: "not-a-uuid".into(),
    }];

    let err = loader
        .bulk_insert(&conn, &mut rows, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BulkError::Serialization(_)));
    assert!(!conn.in_copy());
}

#[tokio::test]
async fn concurrent_loads_on_independent_connections_succeed() {
    let loader = std::sync::Arc::new(BulkLoader::new());
    build_family_plans(loader.cache());

    let mut handles = Vec::new();
    for i in 0..4 {
        let loader = std::sync::Arc::clone(&loader);
        handles.push(tokio::spawn(async move {
            let conn = MemoryConnection::new();
            let mut parents = vec![Parent::named(&format!("p{}", i), vec![Child::valued("c")])];
            loader
                .bulk_insert(&conn, &mut parents, &CancellationToken::new())
                .await
                .unwrap()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 2);
    }
}
