//! The physical execution plan: a tree of pull-based operators.
//!
//! Every operator honours the same contract — `init` (bottom-up, once,
//! before the first `consume`), `consume` (pulls and returns the next bound
//! record or `None` at end of stream), `reset` (rewinds for re-use without
//! re-initializing, e.g. inside [`join::Optional`]'s repeated inner drains),
//! `modifies` (which record slots this operator binds), and `describe` (a
//! one-line label for `EXPLAIN`/`PROFILE`).
//!
//! Operators are dispatched through [`Op`], a sum type over every concrete
//! operator struct, rather than a trait-object hierarchy: the operator set
//! is closed and known up front, so a `match` on a flat enum is simpler to
//! read and avoids a vtable indirection on every `consume` call.

pub mod join;
pub mod pipeline;
pub mod scan;
pub mod traverse;

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::graph::Graph;
use crate::record::Record;

pub use join::{Apply, CartesianProduct, Optional, ValueHashJoin};
pub use pipeline::{Carry, Distinct, Filter, Group, GroupItem, Limit, Projection, Seed, Skip, Sort};
pub use scan::{AllNodeScan, IndexScan, NodeByLabelScan};
pub use traverse::{ConditionalTraverse, ConditionalVarLenTraverse, Expand};

/// Everything an operator needs to pull records: the graph it reads from
/// and a cooperative cancellation flag checked at record-boundary
/// granularity, as [`crate::engine`]'s worker pool expects.
pub struct ExecContext<'a> {
    pub graph: &'a Graph,
    pub cancelled: &'a AtomicBool,
    profiler: Option<&'a Profiler>,
}

impl<'a> ExecContext<'a> {
    pub fn new(graph: &'a Graph, cancelled: &'a AtomicBool) -> Self {
        Self {
            graph,
            cancelled,
            profiler: None,
        }
    }

    /// Attaches a [`Profiler`] so every `consume` call along this context
    /// records its own wall-clock time and row count, for `PROFILE`.
    pub fn with_profiler(mut self, profiler: &'a Profiler) -> Self {
        self.profiler = Some(profiler);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::Relaxed)
    }
}

/// Per-operator timing/row accumulator, keyed by the operator's address —
/// stable for the lifetime of one plan, since the tree is never reshaped
/// after planning. `RefCell` because `consume` only takes `&ExecContext`,
/// not `&mut`.
#[derive(Default)]
pub struct Profiler {
    stats: RefCell<HashMap<usize, ProfileStat>>,
}

#[derive(Clone, Copy, Default)]
struct ProfileStat {
    calls: u64,
    rows: u64,
    elapsed: Duration,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, key: usize, elapsed: Duration, produced_row: bool) {
        let mut stats = self.stats.borrow_mut();
        let entry = stats.entry(key).or_default();
        entry.calls += 1;
        entry.elapsed += elapsed;
        if produced_row {
            entry.rows += 1;
        }
    }

    fn get(&self, key: usize) -> ProfileStat {
        self.stats.borrow().get(&key).copied().unwrap_or_default()
    }
}

/// One node of a rendered `PROFILE` report: an operator's own label plus
/// its accumulated call count, row count, and wall-clock time. Timings are
/// inclusive of every child, same as a flamegraph's stack frames.
pub struct ProfileNode {
    label: String,
    calls: u64,
    rows: u64,
    elapsed: Duration,
    children: Vec<ProfileNode>,
}

impl ProfileNode {
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_at(0, &mut out);
        out
    }

    fn render_at(&self, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!(
            "{}  [calls={}, rows={}, time={:.3}ms]\n",
            self.label,
            self.calls,
            self.rows,
            self.elapsed.as_secs_f64() * 1000.0
        ));
        for child in &self.children {
            child.render_at(depth + 1, out);
        }
    }
}

/// A physical operator. Each variant wraps one concrete operator struct from
/// [`scan`], [`traverse`], [`pipeline`], or [`join`].
pub enum Op {
    AllNodeScan(AllNodeScan),
    NodeByLabelScan(NodeByLabelScan),
    IndexScan(IndexScan),
    ConditionalTraverse(ConditionalTraverse),
    Expand(Expand),
    ConditionalVarLenTraverse(ConditionalVarLenTraverse),
    Filter(Box<Filter>),
    Projection(Box<Projection>),
    Group(Box<Group>),
    Sort(Box<Sort>),
    Skip(Box<Skip>),
    Limit(Box<Limit>),
    Distinct(Box<Distinct>),
    Seed(Seed),
    ValueHashJoin(Box<ValueHashJoin>),
    CartesianProduct(Box<CartesianProduct>),
    Optional(Box<Optional>),
    Apply(Box<Apply>),
    Carry(Box<Carry>),
}

impl Op {
    fn children(&self) -> &[Op] {
        match self {
            Op::AllNodeScan(_) | Op::NodeByLabelScan(_) | Op::IndexScan(_) | Op::Seed(_) => &[],
            Op::ConditionalTraverse(o) => &o.children,
            Op::Expand(o) => &o.children,
            Op::ConditionalVarLenTraverse(o) => &o.children,
            Op::Filter(o) => &o.children,
            Op::Projection(o) => &o.children,
            Op::Group(o) => &o.children,
            Op::Sort(o) => &o.children,
            Op::Skip(o) => &o.children,
            Op::Limit(o) => &o.children,
            Op::Distinct(o) => &o.children,
            Op::ValueHashJoin(o) => &o.children,
            Op::CartesianProduct(o) => &o.children,
            Op::Optional(o) => &o.children,
            Op::Apply(o) => &o.children,
            Op::Carry(o) => &o.children,
        }
    }

    fn children_mut(&mut self) -> &mut [Op] {
        match self {
            Op::AllNodeScan(_) | Op::NodeByLabelScan(_) | Op::IndexScan(_) | Op::Seed(_) => &mut [],
            Op::ConditionalTraverse(o) => &mut o.children,
            Op::Expand(o) => &mut o.children,
            Op::ConditionalVarLenTraverse(o) => &mut o.children,
            Op::Filter(o) => &mut o.children,
            Op::Projection(o) => &mut o.children,
            Op::Group(o) => &mut o.children,
            Op::Sort(o) => &mut o.children,
            Op::Skip(o) => &mut o.children,
            Op::Limit(o) => &mut o.children,
            Op::Distinct(o) => &mut o.children,
            Op::ValueHashJoin(o) => &mut o.children,
            Op::CartesianProduct(o) => &mut o.children,
            Op::Optional(o) => &mut o.children,
            Op::Apply(o) => &mut o.children,
            Op::Carry(o) => &mut o.children,
        }
    }

    /// Initializes this operator's own state after initializing every child,
    /// bottom-up. Only the scans and traverses have meaningful `init` work
    /// (materializing an id list or algebraic-expression matrix); the rest
    /// are no-ops, inheriting their child's initialization transitively.
    pub fn init(&mut self, ctx: &ExecContext) -> Result<()> {
        for child in self.children_mut() {
            child.init(ctx)?;
        }
        match self {
            Op::AllNodeScan(o) => o.init(ctx),
            Op::NodeByLabelScan(o) => o.init(ctx),
            Op::IndexScan(o) => o.init(ctx),
            Op::ConditionalTraverse(o) => o.init(ctx),
            Op::ConditionalVarLenTraverse(o) => o.init(ctx),
            _ => {}
        }
        Ok(())
    }

    /// Pulls the next record. When `ctx` carries a [`Profiler`], wraps
    /// [`Self::consume_inner`] with timing keyed on this node's address;
    /// otherwise the profiler check costs one branch and nothing else.
    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        match ctx.profiler {
            None => self.consume_inner(ctx),
            Some(profiler) => {
                let key = self as *const Op as usize;
                let start = Instant::now();
                let result = self.consume_inner(ctx);
                let elapsed = start.elapsed();
                let produced_row = matches!(&result, Ok(Some(_)));
                profiler.record(key, elapsed, produced_row);
                result
            }
        }
    }

    fn consume_inner(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        match self {
            Op::AllNodeScan(o) => o.consume(ctx),
            Op::NodeByLabelScan(o) => o.consume(ctx),
            Op::IndexScan(o) => o.consume(ctx),
            Op::ConditionalTraverse(o) => o.consume(ctx),
            Op::Expand(o) => o.consume(ctx),
            Op::ConditionalVarLenTraverse(o) => o.consume(ctx),
            Op::Filter(o) => o.consume(ctx),
            Op::Projection(o) => o.consume(ctx),
            Op::Group(o) => o.consume(ctx),
            Op::Sort(o) => o.consume(ctx),
            Op::Skip(o) => o.consume(ctx),
            Op::Limit(o) => o.consume(ctx),
            Op::Distinct(o) => o.consume(ctx),
            Op::Seed(o) => Ok(o.consume()),
            Op::ValueHashJoin(o) => o.consume(ctx),
            Op::CartesianProduct(o) => o.consume(ctx),
            Op::Optional(o) => o.consume(ctx),
            Op::Apply(o) => o.consume(ctx),
            Op::Carry(o) => o.consume(ctx),
        }
    }

    pub fn reset(&mut self) {
        for child in self.children_mut() {
            child.reset();
        }
        match self {
            Op::AllNodeScan(o) => o.reset(),
            Op::NodeByLabelScan(o) => o.reset(),
            Op::IndexScan(o) => o.reset(),
            Op::ConditionalTraverse(o) => o.reset(),
            Op::Expand(o) => o.reset(),
            Op::ConditionalVarLenTraverse(o) => o.reset(),
            Op::Filter(o) => o.reset(),
            Op::Projection(o) => o.reset(),
            Op::Group(o) => o.reset(),
            Op::Sort(o) => o.reset(),
            Op::Skip(o) => o.reset(),
            Op::Limit(o) => o.reset(),
            Op::Distinct(o) => o.reset(),
            Op::Seed(o) => o.reset(),
            Op::ValueHashJoin(o) => o.reset(),
            Op::CartesianProduct(o) => o.reset(),
            Op::Optional(o) => o.reset(),
            Op::Apply(o) => o.reset(),
            Op::Carry(o) => o.reset(),
        }
    }

    /// The record slots this operator itself binds (not counting whatever
    /// its children already bound). Used by `EXPLAIN`/`PROFILE` and by the
    /// planner's own bookkeeping; execution never calls this.
    pub fn modifies(&self) -> Vec<usize> {
        match self {
            Op::AllNodeScan(o) => vec![o.out_slot],
            Op::NodeByLabelScan(o) => vec![o.out_slot],
            Op::IndexScan(o) => vec![o.out_slot],
            Op::ConditionalTraverse(o) => {
                let mut v = vec![o.dst_slot];
                v.extend(o.edge_slot);
                v
            }
            Op::Expand(o) => {
                let mut v = vec![o.dst_slot];
                v.extend(o.edge_slot);
                v
            }
            Op::ConditionalVarLenTraverse(o) => vec![o.dst_slot],
            Op::Projection(o) => (0..o.exprs.len()).collect(),
            Op::Group(o) => (0..o.items.len()).collect(),
            Op::Carry(o) => o.mapping.iter().map(|(_, dst)| *dst).collect(),
            Op::Filter(_)
            | Op::Sort(_)
            | Op::Skip(_)
            | Op::Limit(_)
            | Op::Distinct(_)
            | Op::Seed(_)
            | Op::ValueHashJoin(_)
            | Op::CartesianProduct(_)
            | Op::Optional(_)
            | Op::Apply(_) => Vec::new(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Op::AllNodeScan(o) => o.describe(),
            Op::NodeByLabelScan(o) => o.describe(),
            Op::IndexScan(o) => o.describe(),
            Op::ConditionalTraverse(o) => o.describe(),
            Op::Expand(o) => o.describe(),
            Op::ConditionalVarLenTraverse(o) => o.describe(),
            Op::Filter(o) => o.describe(),
            Op::Projection(o) => o.describe(),
            Op::Group(o) => o.describe(),
            Op::Sort(o) => o.describe(),
            Op::Skip(o) => o.describe(),
            Op::Limit(o) => o.describe(),
            Op::Distinct(o) => o.describe(),
            Op::Seed(o) => o.describe(),
            Op::ValueHashJoin(o) => o.describe(),
            Op::CartesianProduct(o) => o.describe(),
            Op::Optional(o) => o.describe(),
            Op::Apply(o) => o.describe(),
            Op::Carry(o) => o.describe(),
        }
    }

    /// Walks the tree to find the (assumed unique) [`Seed`] leaf and sets
    /// it, for [`join::Optional`]'s inner-subtree re-anchoring. Panics if
    /// the subtree has no `Seed` leaf — a planner bug, since every
    /// `Optional` inner subtree is built with exactly one.
    pub fn seed(&mut self, rec: Record) {
        if let Op::Seed(o) = self {
            o.set(rec);
            return;
        }
        for child in self.children_mut() {
            child.seed(rec.clone());
        }
    }

    /// A short human-readable tree, indentation per depth, for `EXPLAIN`.
    pub fn explain(&self) -> String {
        self.explain_at(0)
    }

    /// Builds a [`ProfileNode`] tree from the timings a [`Profiler`]
    /// collected during execution. Must be called against the same `Op`
    /// tree that was executed with `profiler` attached; node identity is
    /// keyed by address, which is why this crate never reshapes a plan
    /// after `init`.
    pub fn profile_tree(&self, profiler: &Profiler) -> ProfileNode {
        let key = self as *const Op as usize;
        let stat = profiler.get(key);
        ProfileNode {
            label: self.describe(),
            calls: stat.calls,
            rows: stat.rows,
            elapsed: stat.elapsed,
            children: self.children().iter().map(|c| c.profile_tree(profiler)).collect(),
        }
    }

    fn explain_at(&self, depth: usize) -> String {
        let mut out = format!("{}{}\n", "  ".repeat(depth), self.describe());
        for child in self.children() {
            out.push_str(&child.explain_at(depth + 1));
        }
        out
    }
}
