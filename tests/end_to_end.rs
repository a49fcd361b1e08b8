//! End-to-end scenarios over a small, fixed dataset: three `Person` nodes
//! connected by `KNOWS` edges, plus a `Company` node Alice `WORKS_AT`.
//!
//! Each test drives the engine the way an embedding application would: build
//! an AST with [`QueryBuilder`], dispatch it through [`Engine::query`], and
//! check the returned rows.

use cyphercore::ast::{CompareOp, Direction};
use cyphercore::builder::QueryBuilder;
use cyphercore::value::Value;
use cyphercore::{Engine, EngineConfig, ReplyFormat};

/// Nodes: `(1:Person {name:'Alice',age:30})`, `(2:Person {name:'Bob',age:25})`,
/// `(3:Person {name:'Carol',age:40})`, `(4:Company {name:'Acme'})`.
/// Edges: `(1)-[:KNOWS]->(2)`, `(2)-[:KNOWS]->(3)`, `(1)-[:WORKS_AT]->(4)`.
fn seed(engine: &Engine, graph_name: &str) {
    engine.create_graph(graph_name);
    engine
        .mutate(graph_name, |g| {
            let alice = g.add_node(
                &["Person"],
                vec![("name", Value::string("Alice")), ("age", Value::Int(30))],
            );
            let bob = g.add_node(
                &["Person"],
                vec![("name", Value::string("Bob")), ("age", Value::Int(25))],
            );
            let carol = g.add_node(
                &["Person"],
                vec![("name", Value::string("Carol")), ("age", Value::Int(40))],
            );
            let acme = g.add_node(&["Company"], vec![("name", Value::string("Acme"))]);
            g.add_edge(alice, bob, "KNOWS", vec![])?;
            g.add_edge(bob, carol, "KNOWS", vec![])?;
            g.add_edge(alice, acme, "WORKS_AT", vec![])?;
            Ok(())
        })
        .unwrap();
}

fn str_col(rows: &[Vec<Value>], col: usize) -> Vec<Option<String>> {
    rows.iter()
        .map(|row| match &row[col] {
            Value::Str(s) => Some(s.to_string()),
            Value::Null => None,
            other => panic!("expected string or null, got {other:?}"),
        })
        .collect()
}

#[test]
fn all_node_scan_over_label_returns_every_node_ordered() {
    let engine = Engine::new(EngineConfig::single_threaded());
    seed(&engine, "g1");
    let ast = QueryBuilder::new()
        .r#match()
        .node("p", Some("Person"))
        .r#return_prop("p", "name", None)
        .order_by("p", Some("name"), false)
        .build();
    let reply = engine.query("g1", &ast, ReplyFormat::Verbose).unwrap();
    assert_eq!(
        str_col(&reply.rows, 0),
        vec![Some("Alice".into()), Some("Bob".into()), Some("Carol".into())]
    );
}

#[test]
fn single_hop_knows_traverse_returns_matching_pairs() {
    let engine = Engine::new(EngineConfig::single_threaded());
    seed(&engine, "g2");
    let ast = QueryBuilder::new()
        .r#match()
        .node("a", Some("Person"))
        .edge(Direction::Out, Some("KNOWS"))
        .node("b", Some("Person"))
        .r#return_prop("a", "name", None)
        .r#return_prop("b", "name", None)
        .order_by("a", Some("name"), false)
        .build();
    let reply = engine.query("g2", &ast, ReplyFormat::Verbose).unwrap();
    let pairs: Vec<(Option<String>, Option<String>)> =
        str_col(&reply.rows, 0).into_iter().zip(str_col(&reply.rows, 1)).collect();
    assert_eq!(
        pairs,
        vec![
            (Some("Alice".into()), Some("Bob".into())),
            (Some("Bob".into()), Some("Carol".into())),
        ]
    );
}

#[test]
fn variable_length_knows_traverse_includes_two_hop_pairs() {
    let engine = Engine::new(EngineConfig::single_threaded());
    seed(&engine, "g3");
    let ast = QueryBuilder::new()
        .r#match()
        .node("a", Some("Person"))
        .edge_var_len(Direction::Out, Some("KNOWS"), 1, Some(2))
        .node("b", Some("Person"))
        .r#return_prop("a", "name", None)
        .r#return_prop("b", "name", None)
        .build();
    let reply = engine.query("g3", &ast, ReplyFormat::Verbose).unwrap();
    let pairs: Vec<(Option<String>, Option<String>)> =
        str_col(&reply.rows, 0).into_iter().zip(str_col(&reply.rows, 1)).collect();
    for expected in [
        (Some("Alice".to_string()), Some("Bob".to_string())),
        (Some("Alice".to_string()), Some("Carol".to_string())),
        (Some("Bob".to_string()), Some("Carol".to_string())),
    ] {
        assert!(pairs.contains(&expected), "missing pair {expected:?} in {pairs:?}");
    }
}

#[test]
fn filter_on_age_returns_only_matching_people() {
    let engine = Engine::new(EngineConfig::single_threaded());
    seed(&engine, "g4");
    let ast = QueryBuilder::new()
        .r#match()
        .node("p", Some("Person"))
        .compare("p", "age", CompareOp::Gt, 28i64)
        .r#return_prop("p", "name", None)
        .order_by("p", Some("name"), false)
        .build();
    let reply = engine.query("g4", &ast, ReplyFormat::Verbose).unwrap();
    assert_eq!(str_col(&reply.rows, 0), vec![Some("Alice".into()), Some("Carol".into())]);
}

#[test]
fn indexed_age_filter_plan_has_no_separate_filter_operator() {
    let engine = Engine::new(EngineConfig::single_threaded());
    seed(&engine, "g5");
    engine
        .mutate("g5", |g| {
            g.create_index("Person", "age")?;
            Ok(())
        })
        .unwrap();
    let ast = QueryBuilder::new()
        .r#match()
        .node("p", Some("Person"))
        .compare("p", "age", CompareOp::Gt, 28i64)
        .r#return_prop("p", "name", None)
        .build();
    let explain = engine.explain("g5", &ast).unwrap();
    let rendered = explain.root.render();
    assert!(rendered.contains("IndexScan"), "expected IndexScan in plan: {rendered}");
    assert!(!rendered.contains("Filter"), "index plan should not need a Filter: {rendered}");
}

#[test]
fn inline_property_match_then_single_hop_follows_works_at() {
    let engine = Engine::new(EngineConfig::single_threaded());
    seed(&engine, "g6");
    let ast = QueryBuilder::new()
        .r#match()
        .node_with_props("p", Some("Person"), vec![("name", Value::string("Alice"))])
        .edge(Direction::Out, Some("WORKS_AT"))
        .node("c", None)
        .r#return_prop("c", "name", None)
        .build();
    let reply = engine.query("g6", &ast, ReplyFormat::Verbose).unwrap();
    assert_eq!(str_col(&reply.rows, 0), vec![Some("Acme".into())]);
}

#[test]
fn optional_match_fills_null_when_the_right_side_has_no_outgoing_knows() {
    let engine = Engine::new(EngineConfig::single_threaded());
    seed(&engine, "g7");
    let ast = QueryBuilder::new()
        .r#match()
        .node("a", Some("Person"))
        .optional_match()
        .node("a", None)
        .edge(Direction::Out, Some("KNOWS"))
        .node("b", None)
        .r#return_prop("a", "name", None)
        .r#return_prop("b", "name", Some("b_name"))
        .order_by("a", Some("name"), false)
        .build();
    let reply = engine.query("g7", &ast, ReplyFormat::Verbose).unwrap();
    let pairs: Vec<(Option<String>, Option<String>)> =
        str_col(&reply.rows, 0).into_iter().zip(str_col(&reply.rows, 1)).collect();
    assert_eq!(
        pairs,
        vec![
            (Some("Alice".into()), Some("Bob".into())),
            (Some("Bob".into()), Some("Carol".into())),
            (Some("Carol".into()), None),
        ]
    );
}

#[test]
fn all_node_scan_emits_exactly_one_record_per_node() {
    let engine = Engine::new(EngineConfig::single_threaded());
    seed(&engine, "g8");
    let ast = QueryBuilder::new()
        .r#match()
        .node("n", None)
        .r#return_var("n", None)
        .build();
    let reply = engine.query("g8", &ast, ReplyFormat::Verbose).unwrap();
    assert_eq!(reply.rows.len(), 4);
    let mut ids: Vec<i64> = reply
        .rows
        .iter()
        .map(|r| match &r[0] {
            Value::Node(id) => *id as i64,
            other => panic!("expected node, got {other:?}"),
        })
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 4, "every node id should be distinct");
}

#[test]
fn distinct_suppresses_duplicate_rows() {
    let engine = Engine::new(EngineConfig::single_threaded());
    seed(&engine, "g9");
    let ast = QueryBuilder::new()
        .r#match()
        .node("a", Some("Person"))
        .edge(Direction::Out, Some("KNOWS"))
        .node("b", Some("Person"))
        .r#return_prop("a", "name", None)
        .distinct()
        .build();
    let reply = engine.query("g9", &ast, ReplyFormat::Verbose).unwrap();
    let names = str_col(&reply.rows, 0);
    assert_eq!(names.len(), 2, "Alice and Bob each appear once despite two KNOWS edges overall");
}

#[test]
fn limit_and_skip_page_through_ordered_results() {
    let engine = Engine::new(EngineConfig::single_threaded());
    seed(&engine, "g10");
    let ast = QueryBuilder::new()
        .r#match()
        .node("p", Some("Person"))
        .r#return_prop("p", "name", None)
        .order_by("p", Some("name"), false)
        .skip(1)
        .limit(1)
        .build();
    let reply = engine.query("g10", &ast, ReplyFormat::Verbose).unwrap();
    assert_eq!(str_col(&reply.rows, 0), vec![Some("Bob".into())]);
}

#[test]
fn profile_records_one_row_per_matched_person() {
    let engine = Engine::new(EngineConfig::single_threaded());
    seed(&engine, "g11");
    let ast = QueryBuilder::new()
        .r#match()
        .node("p", Some("Person"))
        .r#return_prop("p", "name", None)
        .build();
    let report = engine.profile("g11", &ast).unwrap();
    assert_eq!(report.rows_produced, 3);
    assert!(report.tree.contains("NodeByLabelScan") || report.tree.contains("IndexScan"));
}

#[test]
fn disconnected_pattern_pairs_every_person_with_every_company() {
    let engine = Engine::new(EngineConfig::single_threaded());
    seed(&engine, "g13");
    let ast = QueryBuilder::new()
        .r#match()
        .node("p", Some("Person"))
        .r#match()
        .node("c", Some("Company"))
        .r#return_prop("p", "name", None)
        .r#return_prop("c", "name", None)
        .order_by("p", Some("name"), false)
        .build();
    let reply = engine.query("g13", &ast, ReplyFormat::Verbose).unwrap();
    let pairs: Vec<(Option<String>, Option<String>)> =
        str_col(&reply.rows, 0).into_iter().zip(str_col(&reply.rows, 1)).collect();
    assert_eq!(
        pairs,
        vec![
            (Some("Alice".into()), Some("Acme".into())),
            (Some("Bob".into()), Some("Acme".into())),
            (Some("Carol".into()), Some("Acme".into())),
        ]
    );
}

#[test]
fn snapshot_round_trip_preserves_query_results() {
    let engine = Engine::new(EngineConfig::single_threaded());
    seed(&engine, "g12");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("g12.json");
    engine.save_snapshot("g12", &path).unwrap();

    engine.delete_graph("g12").unwrap();
    engine.load_snapshot("g12", &path).unwrap();

    let ast = QueryBuilder::new()
        .r#match()
        .node("p", Some("Person"))
        .r#return_prop("p", "name", None)
        .order_by("p", Some("name"), false)
        .build();
    let reply = engine.query("g12", &ast, ReplyFormat::Verbose).unwrap();
    assert_eq!(
        str_col(&reply.rows, 0),
        vec![Some("Alice".into()), Some("Bob".into()), Some("Carol".into())]
    );
}
