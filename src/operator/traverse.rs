//! Traverse operators: drive an algebraic adjacency/diagonal expression (or,
//! for [`Expand`], a single adjacency matrix directly) to map a bound
//! source-node slot to a destination-node slot.
//!
//! Destination order within one source follows matrix-row order (ascending
//! id); there is no ordering guarantee across distinct sources.

use rustc_hash::FxHashSet;

use crate::algebra::build_edge_expression;
use crate::ast::Direction;
use crate::error::Result;
use crate::matrix::BoolMatrix;
use crate::model::{LabelId, NodeId, TypeId};
use crate::record::{Record, Slot};

use super::{ExecContext, Op};

/// Maps a bound source-node slot to every destination reachable by the
/// compiled algebraic expression (relationship-type union, transposed for
/// `Direction::In`, pre/post-multiplied by source/destination label
/// diagonals). The expression is evaluated once, on the first `consume`
/// after `init`/`reset`, and cached for the life of the query — a
/// simplification of per-source restricted evaluation: since the adjacency
/// operands never change mid-query, evaluating the
/// whole matrix once and reading rows out of it is equivalent to, and
/// cheaper than, re-restricting the expression for every source.
pub struct ConditionalTraverse {
    pub children: Vec<Op>,
    pub src_slot: usize,
    pub dst_slot: usize,
    pub edge_slot: Option<usize>,
    pub rel_types: Vec<TypeId>,
    pub direction: Direction,
    pub src_label: Option<LabelId>,
    pub dst_label: Option<LabelId>,
    pub width: usize,
    matrix: Option<BoolMatrix>,
    input: Option<Record>,
    dests: Vec<NodeId>,
    pos: usize,
}

impl ConditionalTraverse {
    pub fn new(
        src_slot: usize,
        dst_slot: usize,
        edge_slot: Option<usize>,
        rel_types: Vec<TypeId>,
        direction: Direction,
        src_label: Option<LabelId>,
        dst_label: Option<LabelId>,
        width: usize,
        child: Op,
    ) -> Self {
        Self {
            children: vec![child],
            src_slot,
            dst_slot,
            edge_slot,
            rel_types,
            direction,
            src_label,
            dst_label,
            width,
            matrix: None,
            input: None,
            dests: Vec::new(),
            pos: 0,
        }
    }

    pub fn init(&mut self, ctx: &ExecContext) {
        let expr = build_edge_expression(
            ctx.graph,
            &self.rel_types,
            self.direction,
            self.src_label,
            self.dst_label,
        );
        self.matrix = Some(expr.eval());
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        loop {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            if self.pos < self.dests.len() {
                let dest = self.dests[self.pos];
                self.pos += 1;
                let input = self.input.as_ref().expect("dests non-empty implies input set");
                let src = input
                    .get(self.src_slot)
                    .as_node()
                    .expect("source slot must already be bound by the time we traverse it");
                let mut rec = input.clone();
                rec.set(self.dst_slot, Slot::Node(dest));
                if let Some(edge_slot) = self.edge_slot {
                    if let Some(eid) = ctx.graph.find_edge(src, dest, &self.rel_types) {
                        rec.set(edge_slot, Slot::Edge(eid));
                    }
                }
                return Ok(Some(rec));
            }

            match self.children[0].consume(ctx)? {
                None => return Ok(None),
                Some(rec) => {
                    let Some(src) = rec.get(self.src_slot).as_node() else {
                        continue;
                    };
                    self.dests = self
                        .matrix
                        .as_ref()
                        .expect("init runs before consume")
                        .row(src)
                        .to_vec();
                    self.pos = 0;
                    self.input = Some(rec);
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.input = None;
        self.dests.clear();
        self.pos = 0;
    }

    pub fn describe(&self) -> String {
        format!(
            "ConditionalTraverse(src={}, dst={})",
            self.src_slot, self.dst_slot
        )
    }
}

/// The single-relationship-type, `Direction::Out`, no-label-diagonal fast
/// path: reads the relationship-type's adjacency matrix directly rather than
/// composing an algebraic expression, since there is nothing for the
/// expression tree to fuse when there's only one operand. The planner emits
/// this instead of [`ConditionalTraverse`] whenever a hop qualifies.
pub struct Expand {
    pub children: Vec<Op>,
    pub src_slot: usize,
    pub dst_slot: usize,
    pub edge_slot: Option<usize>,
    pub rel_type: TypeId,
    pub width: usize,
    input: Option<Record>,
    dests: Vec<NodeId>,
    pos: usize,
}

impl Expand {
    pub fn new(
        src_slot: usize,
        dst_slot: usize,
        edge_slot: Option<usize>,
        rel_type: TypeId,
        width: usize,
        child: Op,
    ) -> Self {
        Self {
            children: vec![child],
            src_slot,
            dst_slot,
            edge_slot,
            rel_type,
            width,
            input: None,
            dests: Vec::new(),
            pos: 0,
        }
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        loop {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            if self.pos < self.dests.len() {
                let dest = self.dests[self.pos];
                self.pos += 1;
                let input = self.input.as_ref().expect("dests non-empty implies input set");
                let src = input.get(self.src_slot).as_node().expect("source must be bound");
                let mut rec = input.clone();
                rec.set(self.dst_slot, Slot::Node(dest));
                if let Some(edge_slot) = self.edge_slot {
                    if let Some(eid) = ctx.graph.find_edge(src, dest, std::slice::from_ref(&self.rel_type)) {
                        rec.set(edge_slot, Slot::Edge(eid));
                    }
                }
                return Ok(Some(rec));
            }

            match self.children[0].consume(ctx)? {
                None => return Ok(None),
                Some(rec) => {
                    let Some(src) = rec.get(self.src_slot).as_node() else {
                        continue;
                    };
                    self.dests = match ctx.graph.type_matrix(self.rel_type) {
                        Some(m) => m.row(src).to_vec(),
                        None => Vec::new(),
                    };
                    self.pos = 0;
                    self.input = Some(rec);
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.input = None;
        self.dests.clear();
        self.pos = 0;
    }

    pub fn describe(&self) -> String {
        format!("Expand(src={}, dst={})", self.src_slot, self.dst_slot)
    }
}

/// `[r*lo..hi]`: repeatedly composes the single-hop adjacency matrix with
/// itself between `lo` and `hi` hops (or until the frontier stops growing,
/// for an unbounded upper bound), recording every node reached at an
/// in-range hop count. A node already seen at an earlier hop is not
/// re-added to the frontier — this bounds the walk on a cyclic graph at the
/// cost of not modelling multiple distinct-length paths to the same
/// destination, which plain reachability does not require.
pub struct ConditionalVarLenTraverse {
    pub children: Vec<Op>,
    pub src_slot: usize,
    pub dst_slot: usize,
    pub rel_types: Vec<TypeId>,
    pub direction: Direction,
    pub dst_label: Option<LabelId>,
    pub min_hops: u32,
    pub max_hops: Option<u32>,
    pub width: usize,
    hop_matrix: Option<BoolMatrix>,
    input: Option<Record>,
    dests: Vec<NodeId>,
    pos: usize,
}

impl ConditionalVarLenTraverse {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        src_slot: usize,
        dst_slot: usize,
        rel_types: Vec<TypeId>,
        direction: Direction,
        dst_label: Option<LabelId>,
        min_hops: u32,
        max_hops: Option<u32>,
        width: usize,
        child: Op,
    ) -> Self {
        Self {
            children: vec![child],
            src_slot,
            dst_slot,
            rel_types,
            direction,
            dst_label,
            min_hops,
            max_hops,
            width,
            hop_matrix: None,
            input: None,
            dests: Vec::new(),
            pos: 0,
        }
    }

    pub fn init(&mut self, ctx: &ExecContext) {
        let expr = build_edge_expression(ctx.graph, &self.rel_types, self.direction, None, self.dst_label);
        self.hop_matrix = Some(expr.eval());
    }

    fn reachable_from(&self, src: NodeId) -> Vec<NodeId> {
        let m = self.hop_matrix.as_ref().expect("init runs before consume");
        let hi = self.max_hops.unwrap_or(m.dim() as u32);
        let mut frontier = vec![src];
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        visited.insert(src);
        let mut reached: FxHashSet<NodeId> = FxHashSet::default();

        let mut hop = 1;
        while hop <= hi {
            let next: Vec<NodeId> = m
                .extract(&frontier)
                .into_iter()
                .filter(|n| visited.insert(*n))
                .collect();
            if hop >= self.min_hops {
                reached.extend(next.iter().copied());
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
            hop += 1;
        }

        let mut out: Vec<NodeId> = reached.into_iter().collect();
        out.sort_unstable();
        out
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        loop {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            if self.pos < self.dests.len() {
                let dest = self.dests[self.pos];
                self.pos += 1;
                let mut rec = self.input.as_ref().expect("dests non-empty implies input set").clone();
                rec.set(self.dst_slot, Slot::Node(dest));
                return Ok(Some(rec));
            }

            match self.children[0].consume(ctx)? {
                None => return Ok(None),
                Some(rec) => {
                    let Some(src) = rec.get(self.src_slot).as_node() else {
                        continue;
                    };
                    self.dests = self.reachable_from(src);
                    self.pos = 0;
                    self.input = Some(rec);
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.input = None;
        self.dests.clear();
        self.pos = 0;
    }

    pub fn describe(&self) -> String {
        format!(
            "ConditionalVarLenTraverse(src={}, dst={}, {}..{:?})",
            self.src_slot, self.dst_slot, self.min_hops, self.max_hops
        )
    }
}
