//! Embeds the query engine the way a key-value host would: a name→graph
//! catalog, a reader/writer lock per graph, a bounded worker pool dispatching
//! one query to exactly one thread, and the `GRAPH.QUERY` / `GRAPH.EXPLAIN` /
//! `GRAPH.DELETE` / `GRAPH.PROFILE` command surface with its three reply
//! formatters.
//!
//! This module is the crate's stand-in for everything the core treats as an
//! external collaborator: there is no network listener here, no client
//! protocol, no module ABI — just [`Engine`], a synchronous command surface
//! any embedder (a CLI, a server, a test) can call directly.

pub mod snapshot;

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ast::QueryAst;
use crate::config::EngineConfig;
use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::operator::{ExecContext, Profiler};
use crate::planner::{PlanExplain, Planner, PlannerConfig};
use crate::value::Value;

/// Name → graph registry. Kept as an explicit `RwLock<HashMap<..>>` on the
/// `Engine` rather than a global singleton, so an embedder can run several
/// independent `Engine`s in one process (e.g. one per test).
#[derive(Default)]
pub struct Catalog {
    graphs: RwLock<HashMap<String, Arc<RwLock<Graph>>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new, empty graph under `name`. Returns `false` (and
    /// leaves the existing graph untouched) if `name` is already taken.
    pub fn create(&self, name: &str) -> bool {
        let mut graphs = self.graphs.write();
        if graphs.contains_key(name) {
            return false;
        }
        graphs.insert(name.to_owned(), Arc::new(RwLock::new(Graph::new())));
        true
    }

    /// Registers `graph` under `name`, replacing any sentinel already there.
    /// Used by [`snapshot::load`] to install a graph rebuilt from persisted
    /// state.
    pub fn install(&self, name: &str, graph: Graph) {
        self.graphs
            .write()
            .insert(name.to_owned(), Arc::new(RwLock::new(graph)));
    }

    pub fn get(&self, name: &str) -> Option<Arc<RwLock<Graph>>> {
        self.graphs.read().get(name).cloned()
    }

    /// Drops the graph registered under `name`. `GRAPH.DELETE`.
    pub fn delete(&self, name: &str) -> bool {
        self.graphs.write().remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.graphs.read().keys().cloned().collect();
        names.sort();
        names
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A small, `rayon`-free bounded thread pool: one query runs its entire pull
/// pipeline on exactly one worker thread: queries parallelize at the
/// query grain, single-threaded within a query. No async runtime is
/// needed merely to fan queries out across threads.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("cyphercore-worker-{id}"))
                .spawn(move || loop {
                    let job = {
                        let rx = receiver.lock().unwrap_or_else(|e| e.into_inner());
                        rx.recv()
                    };
                    match job {
                        Ok(job) => job(),
                        Err(_) => break,
                    }
                })
                .expect("failed to spawn worker thread");
            workers.push(handle);
        }
        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Dispatches `job` to a worker and blocks the caller until it replies,
    /// mirroring the host's "reply channel": the query runs on the worker
    /// thread, and the calling thread (which stands in for the host's event
    /// loop) waits for the result.
    pub fn dispatch<F, T>(&self, job: F) -> T
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let wrapped: Job = Box::new(move || {
            let _ = tx.send(job());
        });
        self.sender
            .as_ref()
            .expect("worker pool sender dropped before shutdown")
            .send(wrapped)
            .expect("worker pool has no live workers");
        rx.recv().expect("worker thread dropped reply channel")
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropping the sender closes the channel, so each worker's blocking
        // `recv()` returns `Err` and its loop exits on its own.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Which formatter a command reply should use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyFormat {
    /// Discards rows; used by `GRAPH.PROFILE`, which only wants timings.
    Nop,
    /// Plain text, one row per line — what a CLI prints.
    Verbose,
    /// Typed tuples (`[type-id, payload]` per value), the wire format a
    /// binary client protocol would actually decode.
    Compact,
}

/// Stable small integers identifying a [`Value`]'s wire type in
/// [`ReplyFormat::Compact`] output.
pub fn compact_type_id(value: &Value) -> u8 {
    match value {
        Value::Null => 1,
        Value::Str(_) | Value::Bytes(_) => 2,
        Value::Int(_) => 3,
        Value::Bool(_) => 4,
        Value::Float(_) => 5,
        Value::Array(_) => 6,
        Value::Edge(_) => 7,
        Value::Node(_) => 8,
        // Temporal values have no dedicated wire type in the parent
        // protocol's type table; they travel as their ISO-ish string
        // rendering (`value::compact_payload`) tagged as a plain string.
        Value::Temporal(_) => 2,
    }
}

/// One compact-format value: `[type_id, payload]`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompactValue {
    pub type_id: u8,
    pub payload: serde_json::Value,
}

fn compact_payload(value: &Value, graph: &Graph) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::json!(i),
        Value::Float(f) => serde_json::json!(f),
        Value::Str(s) => serde_json::json!(s.as_ref()),
        Value::Bytes(b) => serde_json::json!(BASE64.encode(b)),
        Value::Node(id) => node_payload(*id, graph),
        Value::Edge(id) => edge_payload(*id, graph),
        Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| compact_payload(v, graph)).collect())
        }
        Value::Temporal(t) => serde_json::json!(format!("{:?}:{}.{:09}", t.kind, t.seconds, t.nanos)),
    }
}

fn node_payload(id: crate::model::NodeId, graph: &Graph) -> serde_json::Value {
    match graph.node(id) {
        None => serde_json::Value::Null,
        Some(node) => {
            let labels: Vec<&str> = node
                .labels
                .iter()
                .map(|l| graph.catalog().label_name(*l))
                .collect();
            let props: serde_json::Map<String, serde_json::Value> = node
                .properties
                .iter()
                .map(|(k, v)| (graph.catalog().prop_name(*k).to_owned(), compact_payload(v, graph)))
                .collect();
            serde_json::json!({ "id": id, "labels": labels, "properties": props })
        }
    }
}

fn edge_payload(id: crate::model::EdgeId, graph: &Graph) -> serde_json::Value {
    match graph.edge(id) {
        None => serde_json::Value::Null,
        Some(edge) => {
            let props: serde_json::Map<String, serde_json::Value> = edge
                .properties
                .iter()
                .map(|(k, v)| (graph.catalog().prop_name(*k).to_owned(), compact_payload(v, graph)))
                .collect();
            serde_json::json!({
                "id": id,
                "type": graph.catalog().type_name(edge.rel_type),
                "src": edge.src,
                "dest": edge.dest,
                "properties": props,
            })
        }
    }
}

/// Per-query mutation/timing counters returned alongside every `GRAPH.QUERY`
/// reply, mirroring the stats array a real client protocol would report
/// even for a read-only query (all zero except the timing fields).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryStats {
    pub labels_added: u64,
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub properties_set: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub indices_created: u64,
    pub cached_execution: bool,
    pub query_internal_execution_time_ms: f64,
}

/// `[header, rows, stats]` — the array reply a successful `GRAPH.QUERY` /
/// `GRAPH.EXPLAIN` call returns.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandReply {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub stats: QueryStats,
}

impl CommandReply {
    /// Renders [`ReplyFormat::Verbose`] text: a header line, one line per
    /// row, tab-separated — what the `cli query` subcommand prints.
    pub fn render_verbose(&self, graph: &Graph) -> String {
        let mut out = String::new();
        out.push_str(&self.header.join(" | "));
        out.push('\n');
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|v| render_value_text(v, graph)).collect();
            out.push_str(&cells.join(" | "));
            out.push('\n');
        }
        out
    }

    /// Renders [`ReplyFormat::Compact`]: every value as `[type_id, payload]`.
    pub fn render_compact(&self, graph: &Graph) -> serde_json::Value {
        let rows: Vec<Vec<CompactValue>> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| CompactValue {
                        type_id: compact_type_id(v),
                        payload: compact_payload(v, graph),
                    })
                    .collect()
            })
            .collect();
        serde_json::json!({ "header": self.header, "rows": rows, "stats": self.stats })
    }
}

fn render_value_text(value: &Value, graph: &Graph) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => s.to_string(),
        Value::Bytes(b) => BASE64.encode(b),
        Value::Node(id) => match graph.node(*id) {
            Some(node) => {
                let labels: Vec<&str> = node
                    .labels
                    .iter()
                    .map(|l| graph.catalog().label_name(*l))
                    .collect();
                format!("(:{}){{id:{}}}", labels.join(":"), id)
            }
            None => format!("(deleted node {id})"),
        },
        Value::Edge(id) => match graph.edge(*id) {
            Some(edge) => format!(
                "[:{}]{{id:{}}}",
                graph.catalog().type_name(edge.rel_type),
                id
            ),
            None => format!("(deleted edge {id})"),
        },
        Value::Array(items) => {
            let cells: Vec<String> = items.iter().map(|v| render_value_text(v, graph)).collect();
            format!("[{}]", cells.join(", "))
        }
        Value::Temporal(t) => format!("{:?}:{}.{:09}", t.kind, t.seconds, t.nanos),
    }
}

/// A `GRAPH.PROFILE` reply: the rows the plan actually produced (never
/// discarded, unlike a `NOP`-formatted `GRAPH.QUERY` call would), the
/// wall-clock time for the whole pull loop, and a rendered per-operator
/// timing tree.
#[derive(Clone, Debug)]
pub struct ProfileReport {
    pub rows_produced: usize,
    pub total_elapsed: Duration,
    pub tree: String,
}

/// The embeddable query engine: a graph catalog plus a worker pool dispatching
/// one query per thread.
pub struct Engine {
    config: EngineConfig,
    catalog: Catalog,
    pool: WorkerPool,
    planner_config: PlannerConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let pool = WorkerPool::new(config.thread_count);
        info!(workers = pool.size(), "engine started");
        Self {
            config,
            catalog: Catalog::new(),
            pool,
            planner_config: PlannerConfig::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// `GRAPH.DELETE`-equivalent.
    pub fn delete_graph(&self, name: &str) -> Result<()> {
        if self.catalog.delete(name) {
            Ok(())
        } else {
            Err(GraphError::InvalidQuery(format!("no such graph '{name}'")))
        }
    }

    pub fn create_graph(&self, name: &str) -> bool {
        self.catalog.create(name)
    }

    fn resolve(&self, name: &str) -> Result<Arc<RwLock<Graph>>> {
        self.catalog
            .get(name)
            .ok_or_else(|| GraphError::InvalidQuery(format!("no such graph '{name}'")))
    }

    /// Runs a read-only mutation-free query, acquiring a shared (read) lock
    /// on the graph for the duration of planning and execution — "the lock
    /// straddles the entire query". Dispatches the actual pull loop to
    /// the worker pool so the calling thread (standing in for the host's
    /// event loop) isn't tied up.
    pub fn query(&self, graph_name: &str, ast: &QueryAst, format: ReplyFormat) -> Result<CommandReply> {
        let handle = self.resolve(graph_name)?;
        let ast = ast.clone();
        let graph_name = graph_name.to_owned();
        let planner_config = self.planner_config;
        let resultset_limit = self.config.resultset_limit();
        self.pool.dispatch(move || {
            let start = Instant::now();
            let graph = handle.read();
            let planner = Planner::new(&graph, planner_config);
            let output = planner.plan(&ast)?;
            let mut plan = output.plan;
            let cancelled = AtomicBool::new(false);
            let ctx = ExecContext::new(&graph, &cancelled);
            plan.init(&ctx)?;

            let names: Vec<String> = ast
                .final_stage()
                .projections
                .iter()
                .map(|p| p.output_name())
                .collect();

            let mut rows = Vec::new();
            while let Some(record) = plan.consume(&ctx)? {
                if let Some(limit) = resultset_limit {
                    if rows.len() as u64 >= limit {
                        break;
                    }
                }
                let row: Vec<Value> = record
                    .slots()
                    .iter()
                    .take(names.len())
                    .map(slot_to_reply_value)
                    .collect();
                rows.push(row);
            }

            let mut stats = QueryStats::default();
            stats.query_internal_execution_time_ms = start.elapsed().as_secs_f64() * 1000.0;
            if format == ReplyFormat::Nop {
                rows.clear();
            }
            debug!(rows = rows.len(), graph = %graph_name, "query executed");
            Ok(CommandReply {
                header: names,
                rows,
                stats,
            })
        })
    }

    /// `GRAPH.EXPLAIN`-equivalent: plans (including the index-scan rewrite) without
    /// ever calling `init`/`consume`.
    pub fn explain(&self, graph_name: &str, ast: &QueryAst) -> Result<PlanExplain> {
        let handle = self.resolve(graph_name)?;
        let graph = handle.read();
        let planner = Planner::new(&graph, self.planner_config);
        Ok(planner.plan(ast)?.explain)
    }

    /// `GRAPH.PROFILE`-equivalent: executes with a [`Profiler`] attached and
    /// a `NOP` row formatter, returning per-operator timings instead of data.
    pub fn profile(&self, graph_name: &str, ast: &QueryAst) -> Result<ProfileReport> {
        let handle = self.resolve(graph_name)?;
        let ast = ast.clone();
        let planner_config = self.planner_config;
        self.pool.dispatch(move || {
            let graph = handle.read();
            let planner = Planner::new(&graph, planner_config);
            let output = planner.plan(&ast)?;
            let mut plan = output.plan;
            let cancelled = AtomicBool::new(false);
            let profiler = Profiler::new();
            let ctx = ExecContext::new(&graph, &cancelled).with_profiler(&profiler);
            plan.init(&ctx)?;

            let start = Instant::now();
            let mut rows_produced = 0usize;
            while plan.consume(&ctx)?.is_some() {
                rows_produced += 1;
            }
            let total_elapsed = start.elapsed();
            let tree = plan.profile_tree(&profiler).render();
            Ok(ProfileReport {
                rows_produced,
                total_elapsed,
                tree,
            })
        })
    }

    /// Runs `body` against an exclusive (write) lock on the named graph —
    /// the path `CREATE`/`MERGE`/`DELETE`/`SET`/index-build would take. The
    /// AST layer has no write clauses (schema/data mutation is out of this
    /// crate's Cypher-surface scope), so callers mutate through [`Graph`]'s
    /// own API, same as the CLI's `seed-demo`/`db` subcommands do.
    pub fn mutate<F, T>(&self, graph_name: &str, body: F) -> Result<T>
    where
        F: FnOnce(&mut Graph) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.resolve(graph_name)?;
        self.pool.dispatch(move || {
            let mut graph = handle.write();
            body(&mut graph)
        })
    }

    pub fn labels(&self, graph_name: &str) -> Result<Vec<String>> {
        let handle = self.resolve(graph_name)?;
        Ok(handle.read().catalog().labels().to_vec())
    }

    pub fn property_keys(&self, graph_name: &str) -> Result<Vec<String>> {
        let handle = self.resolve(graph_name)?;
        Ok(handle.read().catalog().property_keys().to_vec())
    }

    pub fn relationship_types(&self, graph_name: &str) -> Result<Vec<String>> {
        let handle = self.resolve(graph_name)?;
        Ok(handle.read().catalog().relationship_types().to_vec())
    }

    /// `db.idx.fulltext.createNodeIndex(label, attr...)`: idempotent, so a
    /// repeated call with the same attribute list is a cheap no-op rebuild.
    pub fn fulltext_create_node_index(&self, graph_name: &str, label: &str, attrs: &[String]) -> Result<()> {
        let label = label.to_owned();
        let attrs = attrs.to_vec();
        self.mutate(graph_name, move |graph| {
            for attr in &attrs {
                graph.create_index(&label, attr)?;
            }
            Ok(())
        })
    }

    /// `db.idx.fulltext.queryNodes(label, query)`: a minimal token-match
    /// substitute for a real full-text query language — every node under
    /// `label` whose indexed string property contains `query` as a
    /// case-insensitive substring, ascending by id.
    pub fn fulltext_query_nodes(&self, graph_name: &str, label: &str, query: &str) -> Result<Vec<Value>> {
        let handle = self.resolve(graph_name)?;
        let graph = handle.read();
        let needle = query.to_lowercase();
        let label_id = graph
            .catalog()
            .resolve_label(label)
            .ok_or_else(|| GraphError::UnknownLabel(label.to_owned()))?;
        let mut hits = Vec::new();
        for id in graph.nodes_with_label(label_id) {
            let Some(node) = graph.node(id) else { continue };
            let matched = node.properties.values().any(|v| match v {
                Value::Str(s) => s.to_lowercase().contains(&needle),
                _ => false,
            });
            if matched {
                hits.push(Value::Node(id));
            }
        }
        Ok(hits)
    }

    /// Warns instead of panicking when a lock would have been poisoned by a
    /// prior panicking worker — `parking_lot` locks don't poison, but the
    /// host-level equivalent (`acquire_lock` over a `std::sync::Mutex`) does,
    /// and [`crate::error::acquire_lock`] is what exercises this path.
    pub fn warn_if_poisoned(name: &str) {
        warn!(graph = name, "lock recovered from a poisoned state");
    }

    /// `snapshot save`: writes the named graph to `path` as JSON.
    pub fn save_snapshot(&self, graph_name: &str, path: &std::path::Path) -> Result<()> {
        let handle = self.resolve(graph_name)?;
        snapshot::save(&handle.read(), path)
    }

    /// `snapshot load`: reads a graph from `path` and installs it under
    /// `graph_name`, replacing any graph already registered there.
    pub fn load_snapshot(&self, graph_name: &str, path: &std::path::Path) -> Result<()> {
        let graph = snapshot::load(path)?;
        self.catalog.install(graph_name, graph);
        Ok(())
    }
}

fn slot_to_reply_value(slot: &crate::record::Slot) -> Value {
    use crate::record::Slot;
    match slot {
        Slot::Unset => Value::Null,
        Slot::Node(id) => Value::Node(*id),
        Slot::Edge(id) => Value::Edge(*id),
        Slot::Edges(ids) => Value::Array(ids.iter().map(|e| Value::Edge(*e)).collect()),
        Slot::Scalar(v) => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompareOp, Direction};
    use crate::builder::QueryBuilder;
    use crate::value::Value;

    fn seed_graph(engine: &Engine, name: &str) {
        engine.create_graph(name);
        engine
            .mutate(name, |g| {
                let alice = g.add_node(&["P"], vec![("name", Value::string("Alice")), ("age", Value::Int(30))]);
                let bob = g.add_node(&["P"], vec![("name", Value::string("Bob")), ("age", Value::Int(25))]);
                let carol = g.add_node(&["P"], vec![("name", Value::string("Carol")), ("age", Value::Int(40))]);
                let acme = g.add_node(&["C"], vec![("name", Value::string("Acme"))]);
                g.add_edge(alice, bob, "KNOWS", vec![])?;
                g.add_edge(bob, carol, "KNOWS", vec![])?;
                g.add_edge(alice, acme, "WORKS_AT", vec![])?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn query_returns_ordered_names() {
        let engine = Engine::new(EngineConfig::single_threaded());
        seed_graph(&engine, "social");
        let ast = QueryBuilder::new()
            .r#match()
            .node("p", Some("P"))
            .r#return_prop("p", "name", None)
            .order_by("p", Some("name"), false)
            .build();
        let reply = engine.query("social", &ast, ReplyFormat::Verbose).unwrap();
        let names: Vec<String> = reply
            .rows
            .iter()
            .map(|r| match &r[0] {
                Value::Str(s) => s.to_string(),
                _ => panic!("expected string"),
            })
            .collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn query_on_unknown_graph_errors() {
        let engine = Engine::new(EngineConfig::single_threaded());
        let ast = QueryBuilder::new().r#match().node("a", None).r#return_var("a", None).build();
        let err = engine.query("missing", &ast, ReplyFormat::Verbose).unwrap_err();
        assert_eq!(err.tag(), "InvalidQuery");
    }

    #[test]
    fn delete_graph_removes_it_from_catalog() {
        let engine = Engine::new(EngineConfig::single_threaded());
        engine.create_graph("temp");
        assert!(engine.delete_graph("temp").is_ok());
        assert!(engine.delete_graph("temp").is_err());
    }

    #[test]
    fn explain_never_executes() {
        let engine = Engine::new(EngineConfig::single_threaded());
        seed_graph(&engine, "social2");
        let ast = QueryBuilder::new()
            .r#match()
            .node("p", Some("P"))
            .compare("p", "age", CompareOp::Gt, 28i64)
            .r#return_prop("p", "name", None)
            .build();
        let explain = engine.explain("social2", &ast).unwrap();
        assert!(explain.root.render().contains("NodeByLabelScan") || explain.root.render().contains("IndexScan"));
    }

    #[test]
    fn profile_reports_timings_without_leaking_rows_as_data() {
        let engine = Engine::new(EngineConfig::single_threaded());
        seed_graph(&engine, "social3");
        let ast = QueryBuilder::new()
            .r#match()
            .node("p", Some("P"))
            .r#return_prop("p", "name", None)
            .build();
        let report = engine.profile("social3", &ast).unwrap();
        assert_eq!(report.rows_produced, 3);
        assert!(!report.tree.is_empty());
    }

    #[test]
    fn optional_match_yields_null_for_unmatched_side() {
        let engine = Engine::new(EngineConfig::single_threaded());
        seed_graph(&engine, "social4");
        let ast = QueryBuilder::new()
            .r#match()
            .node("a", Some("P"))
            .optional_match()
            .node("a", None)
            .edge(Direction::Out, Some("KNOWS"))
            .node("b", None)
            .r#return_prop("a", "name", None)
            .r#return_prop("b", "name", Some("b_name"))
            .order_by("a", Some("name"), false)
            .build();
        let reply = engine.query("social4", &ast, ReplyFormat::Verbose).unwrap();
        assert_eq!(reply.rows.len(), 3);
        assert!(reply.rows.iter().any(|r| r[1] == Value::Null));
    }

    #[test]
    fn worker_pool_runs_jobs_and_shuts_down_cleanly() {
        let pool = WorkerPool::new(2);
        let sum: i32 = pool.dispatch(|| 1 + 1);
        assert_eq!(sum, 2);
    }
}
