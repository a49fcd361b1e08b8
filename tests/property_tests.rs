//! Property-based checks over randomly generated small graphs.

use proptest::prelude::*;

use cyphercore::ast::Direction;
use cyphercore::builder::QueryBuilder;
use cyphercore::value::Value;
use cyphercore::{Engine, EngineConfig, ReplyFormat};

fn name_of(v: &Value) -> String {
    match v {
        Value::Str(s) => s.to_string(),
        other => panic!("expected a string column, got {other:?}"),
    }
}

fn arb_person_graph() -> impl Strategy<Value = (Vec<i64>, Vec<(usize, usize)>)> {
    (1usize..=6).prop_flat_map(|n| {
        let ages = prop::collection::vec(0i64..100, n);
        let edges = prop::collection::vec((0..n, 0..n), 0..(n * 2));
        (ages, edges)
    })
}

proptest! {
    /// `MATCH (p:Person)-[:KNOWS]->(friend:Person)` and the equivalent
    /// `MATCH (p:Person) MATCH (p)-[:KNOWS]->(friend:Person)` (two required
    /// clauses sharing `p`, which the planner compiles to a ValueHashJoin)
    /// must agree on every returned pair, regardless of which plan shape
    /// produced them.
    #[test]
    fn value_hash_join_agrees_with_single_clause_traversal(
        (ages, edges) in arb_person_graph()
    ) {
        let engine = Engine::new(EngineConfig::single_threaded());
        engine.create_graph("g");
        engine
            .mutate("g", |graph| {
                let ids: Vec<_> = ages
                    .iter()
                    .enumerate()
                    .map(|(i, age)| {
                        graph.add_node(
                            &["Person"],
                            vec![("name", Value::string(format!("n{i}"))), ("age", Value::Int(*age))],
                        )
                    })
                    .collect();
                for (src, dst) in &edges {
                    graph.add_edge(ids[*src], ids[*dst], "KNOWS", vec![])?;
                }
                Ok(())
            })
            .unwrap();

        let single_clause = QueryBuilder::new()
            .r#match()
            .node("p", Some("Person"))
            .edge(Direction::Out, Some("KNOWS"))
            .node("friend", Some("Person"))
            .r#return_prop("p", "name", None)
            .r#return_prop("friend", "name", None)
            .build();

        let two_clause = QueryBuilder::new()
            .r#match()
            .node("p", Some("Person"))
            .r#match()
            .node("p", None)
            .edge(Direction::Out, Some("KNOWS"))
            .node("friend", Some("Person"))
            .r#return_prop("p", "name", None)
            .r#return_prop("friend", "name", None)
            .build();

        let explain = engine.explain("g", &two_clause).unwrap();
        prop_assert!(
            explain.root.render().contains("ValueHashJoin"),
            "expected the two-clause plan to use ValueHashJoin: {}",
            explain.root.render()
        );

        let mut expected: Vec<(String, String)> = engine
            .query("g", &single_clause, ReplyFormat::Verbose)
            .unwrap()
            .rows
            .iter()
            .map(|row| (name_of(&row[0]), name_of(&row[1])))
            .collect();
        let mut actual: Vec<(String, String)> = engine
            .query("g", &two_clause, ReplyFormat::Verbose)
            .unwrap()
            .rows
            .iter()
            .map(|row| (name_of(&row[0]), name_of(&row[1])))
            .collect();
        expected.sort();
        actual.sort();
        prop_assert_eq!(expected, actual);
    }
}
