//! Scan operators: the leaves of the execution plan. Each pulls node
//! ids directly from the graph — a label diagonal, the dense node table, or
//! a secondary index — rather than from a child operator.

use crate::error::Result;
use crate::index::IndexQuery;
use crate::model::{LabelId, NodeId, PropId};
use crate::record::{Record, Slot};

use super::ExecContext;

/// Iterates every live node in the graph, ascending by id. Writes exactly
/// one slot, declared in `modifies`.
#[derive(Debug, Default)]
pub struct AllNodeScan {
    pub out_slot: usize,
    pub width: usize,
    ids: Vec<NodeId>,
    pos: usize,
}

impl AllNodeScan {
    pub fn new(out_slot: usize, width: usize) -> Self {
        Self {
            out_slot,
            width,
            ids: Vec::new(),
            pos: 0,
        }
    }

    pub fn init(&mut self, ctx: &ExecContext) {
        self.ids = ctx.graph.all_node_ids().collect();
        self.pos = 0;
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        if ctx.is_cancelled() {
            return Ok(None);
        }
        let Some(&id) = self.ids.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;
        let mut rec = Record::with_width(self.width);
        rec.set(self.out_slot, Slot::Node(id));
        Ok(Some(rec))
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }

    pub fn describe(&self) -> String {
        format!("AllNodeScan(slot={})", self.out_slot)
    }
}

/// Iterates the label diagonal's marked rows, ascending — exactly the set
/// `{i : L[i,i]=1}` per the label-scan-equals-diagonal invariant.
#[derive(Debug)]
pub struct NodeByLabelScan {
    pub label: LabelId,
    pub label_name: String,
    pub out_slot: usize,
    pub width: usize,
    ids: Vec<NodeId>,
    pos: usize,
}

impl NodeByLabelScan {
    pub fn new(label: LabelId, label_name: String, out_slot: usize, width: usize) -> Self {
        Self {
            label,
            label_name,
            out_slot,
            width,
            ids: Vec::new(),
            pos: 0,
        }
    }

    pub fn init(&mut self, ctx: &ExecContext) {
        self.ids = ctx.graph.nodes_with_label(self.label);
        self.pos = 0;
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        if ctx.is_cancelled() {
            return Ok(None);
        }
        let Some(&id) = self.ids.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;
        let mut rec = Record::with_width(self.width);
        rec.set(self.out_slot, Slot::Node(id));
        Ok(Some(rec))
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }

    pub fn describe(&self) -> String {
        format!("NodeByLabelScan(:{}, slot={})", self.label_name, self.out_slot)
    }
}

/// Wraps a [`crate::index::PropertyIndex`] lookup: the replacement
/// installs in place of a `NodeByLabelScan` + reducible `Filter` chain. Each
/// yielded node id is hydrated into a fresh record exactly as the other
/// scans do; `reset()` rewinds the cached id list rather than re-querying.
#[derive(Debug)]
pub struct IndexScan {
    pub label: LabelId,
    pub label_name: String,
    pub prop: PropId,
    pub prop_name: String,
    pub query: IndexQuery,
    pub out_slot: usize,
    pub width: usize,
    ids: Vec<NodeId>,
    pos: usize,
}

impl IndexScan {
    pub fn new(
        label: LabelId,
        label_name: String,
        prop: PropId,
        prop_name: String,
        query: IndexQuery,
        out_slot: usize,
        width: usize,
    ) -> Self {
        Self {
            label,
            label_name,
            prop,
            prop_name,
            query,
            out_slot,
            width,
            ids: Vec::new(),
            pos: 0,
        }
    }

    pub fn init(&mut self, ctx: &ExecContext) {
        self.ids = match ctx.graph.index_for(self.label, self.prop) {
            Some(index) => index.evaluate(&self.query),
            None => Vec::new(),
        };
        self.pos = 0;
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        if ctx.is_cancelled() {
            return Ok(None);
        }
        let Some(&id) = self.ids.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;
        let mut rec = Record::with_width(self.width);
        rec.set(self.out_slot, Slot::Node(id));
        Ok(Some(rec))
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }

    pub fn describe(&self) -> String {
        format!(
            "IndexScan(:{}.{}, slot={})",
            self.label_name, self.prop_name, self.out_slot
        )
    }
}
