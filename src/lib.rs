//! # cyphercore - an embeddable property-graph query engine
//!
//! `cyphercore` evaluates a Cypher-like pattern-matching query language over
//! an in-memory labeled property graph. Pattern traversals compile to
//! sparse-boolean-matrix expressions (adjacency matrices per relationship
//! type, diagonal matrices per label); a pull-based tree of operators
//! executes the resulting plan, with an optimizer that replaces
//! label-scan-plus-filter chains with secondary-index scans where possible.
//!
//! ## Quick start
//!
//! ```rust
//! use cyphercore::{Engine, EngineConfig, ReplyFormat};
//! use cyphercore::builder::QueryBuilder;
//! use cyphercore::value::Value;
//!
//! let engine = Engine::new(EngineConfig::single_threaded());
//! engine.create_graph("social");
//! engine
//!     .mutate("social", |graph| {
//!         graph.add_node(&["P"], vec![("name", Value::string("Alice"))]);
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let ast = QueryBuilder::new()
//!     .r#match()
//!     .node("p", Some("P"))
//!     .r#return_prop("p", "name", None)
//!     .build();
//! let result = engine.query("social", &ast, ReplyFormat::Verbose).unwrap();
//! assert_eq!(result.rows.len(), 1);
//! ```
//!
//! ## Architecture
//!
//! - **Query graph** ([`qgraph`]) and **algebraic expression tree**
//!   ([`algebra`]) compile a MATCH pattern into matrix operations over
//!   [`graph::Graph`]'s adjacency/label matrices ([`matrix`]).
//! - **Operators** ([`operator`]) pull [`record::Record`]s through a tree
//!   assembled by the **planner** ([`planner`]) and rewritten by the
//!   **optimizer** ([`optimizer`]).
//! - **[`engine`]** embeds the graph behind a reader/writer lock, dispatches
//!   `GRAPH.QUERY`/`GRAPH.EXPLAIN`/`GRAPH.DELETE`/`GRAPH.PROFILE`-equivalent
//!   commands, and formats replies.

pub mod algebra;
pub mod ast;
pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod expr;
pub mod graph;
pub mod index;
pub mod matrix;
pub mod model;
pub mod operator;
pub mod optimizer;
pub mod planner;
pub mod qgraph;
pub mod record;
pub mod value;

pub use crate::config::EngineConfig;
pub use crate::engine::{CommandReply, Engine, ReplyFormat};
pub use crate::error::{GraphError, Result};
pub use crate::graph::Graph;
pub use crate::planner::{PlanExplain, Planner, PlannerOutput};
pub use crate::value::Value;
