//! High-level query AST.
//!
//! The Cypher parser itself is out of scope for this crate (it is treated as
//! an external collaborator that hands over an AST plus an identifier
//! resolution table); [`crate::builder::QueryBuilder`] is the in-process
//! substitute for a textual parser front-end, used by the CLI and by tests to
//! construct a [`QueryAst`] without writing a grammar.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A variable bound by a MATCH clause (a node or edge alias).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Var(pub String);

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Var(name.into())
    }
}

/// Edge direction as written in the pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Out,
    In,
    Both,
}

/// One node slot in a MATCH path: `(var:Label {prop: value, ...})`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodePattern {
    pub var: Var,
    pub label: Option<String>,
    /// Inline equality properties, e.g. `{name: 'Alice'}`.
    pub inline_props: Vec<(String, Value)>,
}

impl NodePattern {
    pub fn new(var: Var) -> Self {
        Self {
            var,
            label: None,
            inline_props: Vec::new(),
        }
    }
}

/// One edge slot in a MATCH path: `-[var:TYPE*lo..hi]->`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgePattern {
    pub var: Option<Var>,
    pub rel_types: Vec<String>,
    pub direction: Direction,
    pub min_hops: u32,
    /// `None` means unbounded (`maxHops == infinity`).
    pub max_hops: Option<u32>,
}

impl EdgePattern {
    pub fn new(direction: Direction) -> Self {
        Self {
            var: None,
            rel_types: Vec::new(),
            direction,
            min_hops: 1,
            max_hops: Some(1),
        }
    }

    pub fn is_variable_length(&self) -> bool {
        self.max_hops != Some(self.min_hops)
    }
}

/// A single `(a)-[r]->(b)-[s]->(c)` path: `nodes.len() == edges.len() + 1`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PathPattern {
    pub nodes: Vec<NodePattern>,
    pub edges: Vec<EdgePattern>,
}

/// One MATCH or OPTIONAL MATCH clause; may contain several comma-separated,
/// possibly disconnected, path patterns.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MatchClause {
    pub paths: Vec<PathPattern>,
    pub optional: bool,
}

/// Comparison operator appearing at a filter-tree leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// `_reverseOp`: flips the operator when operands are swapped during
    /// normalization. `=`/`≠` are symmetric and unchanged.
    pub fn reversed(self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::Ne => CompareOp::Ne,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
        }
    }
}

/// Filter tree (`FT`): nested AND/OR/NOT over property comparisons.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Predicate {
    /// `FT_N_PRED`: `var.prop OP value`.
    Compare {
        var: Var,
        prop: String,
        op: CompareOp,
        value: Value,
    },
    /// `FT_N_COND(AND, ...)`.
    And(Vec<Predicate>),
    /// `FT_N_COND(OR, ...)`.
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

/// Aggregate function supported by the `Group` operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Collect,
}

/// One RETURN item.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ProjectionItem {
    Var {
        var: Var,
        alias: Option<String>,
    },
    Prop {
        var: Var,
        prop: String,
        alias: Option<String>,
    },
    Agg {
        func: AggregateFn,
        var: Var,
        prop: Option<String>,
        alias: String,
    },
}

impl ProjectionItem {
    pub fn output_name(&self) -> String {
        match self {
            ProjectionItem::Var { var, alias } => alias.clone().unwrap_or_else(|| var.0.clone()),
            ProjectionItem::Prop { var, prop, alias } => alias
                .clone()
                .unwrap_or_else(|| format!("{}.{}", var.0, prop)),
            ProjectionItem::Agg { alias, .. } => alias.clone(),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, ProjectionItem::Agg { .. })
    }
}

/// One `ORDER BY` key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderKey {
    pub var: Var,
    pub prop: Option<String>,
    pub descending: bool,
}

/// Top-level AST produced by [`crate::builder::QueryBuilder`].
///
/// Represents one WITH-delimited stage of a query: its own MATCH/OPTIONAL
/// MATCH clauses, WHERE, and projection list. A WITH clause is just a stage
/// whose `projections` feed the next stage instead of the final result —
/// `then` carries that continuation, recursively, one `QueryAst` per WITH
/// boundary.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryAst {
    pub matches: Vec<MatchClause>,
    pub where_predicate: Option<Predicate>,
    pub projections: Vec<ProjectionItem>,
    pub distinct: bool,
    pub order_by: Vec<OrderKey>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    /// The stage following a WITH clause, if any. `None` means `projections`
    /// is the query's final RETURN list.
    pub then: Option<Box<QueryAst>>,
}

impl QueryAst {
    pub fn has_aggregates(&self) -> bool {
        self.projections.iter().any(ProjectionItem::is_aggregate)
    }

    /// Walks the `then` chain to the last stage, whose `projections` are the
    /// query's actual RETURN list (every earlier stage's projections only
    /// feed the next WITH boundary).
    pub fn final_stage(&self) -> &QueryAst {
        let mut stage = self;
        while let Some(next) = &stage.then {
            stage = next;
        }
        stage
    }
}
