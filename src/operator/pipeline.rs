//! Filter, projection, and aggregation, plus the `Sort`/`Skip`/`Limit`
//! row-shaping operators that sit above them, `Distinct`, and `Seed` — the
//! single-record leaf [`Optional`](super::join::Optional) injects its
//! current upstream row through.

use std::cmp::Ordering;

use rustc_hash::FxHashMap;

use crate::ast::AggregateFn;
use crate::error::Result;
use crate::expr::{Expr, FilterTree};
use crate::record::{Record, Slot};
use crate::value::{self, Value};

use super::{ExecContext, Op};

/// A total-order wrapper over [`Value`] so group keys and distinct rows can
/// live in a `BTreeMap`/`BTreeSet` despite `Value` containing `f64` (no
/// total `Ord`) — the same reason [`crate::index::PropertyIndex`] keeps
/// sorted buckets instead of a `BTreeMap` directly.
#[derive(Clone, Debug, PartialEq)]
struct OrdValue(Value);

impl Eq for OrdValue {}
impl PartialOrd for OrdValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrdValue {
    fn cmp(&self, other: &Self) -> Ordering {
        value::order(&self.0, &other.0)
    }
}

fn slot_value(slot: &Slot) -> Value {
    match slot {
        Slot::Unset => Value::Null,
        Slot::Node(id) => Value::Node(*id),
        Slot::Edge(id) => Value::Edge(*id),
        Slot::Edges(ids) => Value::Array(ids.iter().map(|e| Value::Edge(*e)).collect()),
        Slot::Scalar(v) => v.clone(),
    }
}

/// Evaluates a [`FilterTree`] against each record pulled from its child,
/// forwarding only those that pass.
pub struct Filter {
    pub children: Vec<Op>,
    pub predicate: FilterTree,
}

impl Filter {
    pub fn new(predicate: FilterTree, child: Op) -> Self {
        Self {
            children: vec![child],
            predicate,
        }
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        loop {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            match self.children[0].consume(ctx)? {
                None => return Ok(None),
                Some(rec) => {
                    if self.predicate.eval(&rec, ctx.graph)? {
                        return Ok(Some(rec));
                    }
                }
            }
        }
    }

    pub fn reset(&mut self) {}

    pub fn describe(&self) -> String {
        "Filter".to_string()
    }
}

/// Evaluates N expressions over the input record and emits a record of N
/// scalars — the RETURN clause's column list.
pub struct Projection {
    pub children: Vec<Op>,
    pub exprs: Vec<Expr>,
}

impl Projection {
    pub fn new(exprs: Vec<Expr>, child: Op) -> Self {
        Self {
            children: vec![child],
            exprs,
        }
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        match self.children[0].consume(ctx)? {
            None => Ok(None),
            Some(rec) => {
                let mut out = Record::with_width(self.exprs.len());
                for (i, expr) in self.exprs.iter().enumerate() {
                    // A bare `Expr::Variable` carries the slot through as-is
                    // (node/edge/edges identity preserved) rather than
                    // flattening it to a scalar, so a later property read on
                    // a WITH-projected node still resolves via `Slot::Node`.
                    let value = match expr {
                        Expr::Variable(slot) => rec.get(*slot).clone(),
                        _ => Slot::Scalar(expr.eval(&rec, ctx.graph)?),
                    };
                    out.set(i, value);
                }
                Ok(Some(out))
            }
        }
    }

    pub fn reset(&mut self) {}

    pub fn describe(&self) -> String {
        format!("Projection({} cols)", self.exprs.len())
    }
}

/// Bridges one WITH stage's compact projected output into the next stage's
/// global slot numbering: widens to `width` and writes each `(src, dst)`
/// pair from the child's record into the new record's `dst` slot. This is
/// how a carried variable keeps flowing after a WITH boundary without the
/// next stage's scan/traverse chain needing to know the previous stage's
/// column layout.
pub struct Carry {
    pub children: Vec<Op>,
    pub mapping: Vec<(usize, usize)>,
    pub width: usize,
}

impl Carry {
    pub fn new(mapping: Vec<(usize, usize)>, width: usize, child: Op) -> Self {
        Self {
            children: vec![child],
            mapping,
            width,
        }
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        match self.children[0].consume(ctx)? {
            None => Ok(None),
            Some(rec) => {
                let mut out = Record::with_width(self.width);
                for &(src, dst) in &self.mapping {
                    out.set(dst, rec.get(src).clone());
                }
                Ok(Some(out))
            }
        }
    }

    pub fn reset(&mut self) {}

    pub fn describe(&self) -> String {
        "Carry".to_string()
    }
}

/// One RETURN item as the `Group` operator sees it: either a grouping key
/// (re-evaluated per bucket, all rows in a bucket agree on its value by
/// construction) or an accumulator fed by an optional argument expression
/// (`None` means `count(*)`, which counts rows rather than a value).
pub enum GroupItem {
    Key(Expr),
    Agg(AggregateFn, Option<Expr>),
}

enum Accumulator {
    Count(i64),
    Sum { int: i64, float: f64, is_float: bool },
    Avg { sum: f64, n: i64 },
    Min(Option<Value>),
    Max(Option<Value>),
    Collect(Vec<Value>),
}

impl Accumulator {
    fn new(func: AggregateFn) -> Self {
        match func {
            AggregateFn::Count => Accumulator::Count(0),
            AggregateFn::Sum => Accumulator::Sum {
                int: 0,
                float: 0.0,
                is_float: false,
            },
            AggregateFn::Avg => Accumulator::Avg { sum: 0.0, n: 0 },
            AggregateFn::Min => Accumulator::Min(None),
            AggregateFn::Max => Accumulator::Max(None),
            AggregateFn::Collect => Accumulator::Collect(Vec::new()),
        }
    }

    fn accumulate(&mut self, arg: Option<Value>) {
        match self {
            Accumulator::Count(n) => {
                if arg.as_ref().map(|v| !v.is_null()).unwrap_or(true) {
                    *n += 1;
                }
            }
            Accumulator::Sum { int, float, is_float } => match arg {
                Some(Value::Int(i)) if !*is_float => *int += i,
                Some(Value::Int(i)) => *float += i as f64,
                Some(Value::Float(f)) => {
                    if !*is_float {
                        *float = *int as f64;
                        *is_float = true;
                    }
                    *float += f;
                }
                _ => {}
            },
            Accumulator::Avg { sum, n } => match arg {
                Some(Value::Int(i)) => {
                    *sum += i as f64;
                    *n += 1;
                }
                Some(Value::Float(f)) => {
                    *sum += f;
                    *n += 1;
                }
                _ => {}
            },
            Accumulator::Min(cur) => {
                if let Some(v) = arg {
                    if !v.is_null() {
                        let replace = match cur {
                            None => true,
                            Some(existing) => value::order(&v, existing) == Ordering::Less,
                        };
                        if replace {
                            *cur = Some(v);
                        }
                    }
                }
            }
            Accumulator::Max(cur) => {
                if let Some(v) = arg {
                    if !v.is_null() {
                        let replace = match cur {
                            None => true,
                            Some(existing) => value::order(&v, existing) == Ordering::Greater,
                        };
                        if replace {
                            *cur = Some(v);
                        }
                    }
                }
            }
            Accumulator::Collect(values) => {
                if let Some(v) = arg {
                    values.push(v);
                }
            }
        }
    }

    fn finish(self) -> Value {
        match self {
            Accumulator::Count(n) => Value::Int(n),
            Accumulator::Sum { int, float, is_float } => {
                if is_float {
                    Value::Float(float)
                } else {
                    Value::Int(int)
                }
            }
            Accumulator::Avg { sum, n } => {
                if n == 0 {
                    Value::Null
                } else {
                    Value::Float(sum / n as f64)
                }
            }
            Accumulator::Min(v) => v.unwrap_or(Value::Null),
            Accumulator::Max(v) => v.unwrap_or(Value::Null),
            Accumulator::Collect(values) => Value::Array(values),
        }
    }
}

/// Buckets every input record by the composite value of its `Key` items,
/// accumulates each bucket's `Agg` items, and emits one output record per
/// bucket (width = `items.len()`, columns in the caller's original RETURN
/// order). Eager: the full child is drained on the first `consume` call,
/// since an aggregate's final value cannot be known until every row feeding
/// its bucket has been seen.
pub struct Group {
    pub children: Vec<Op>,
    pub items: Vec<GroupItem>,
    output: Option<std::vec::IntoIter<Record>>,
}

impl Group {
    pub fn new(items: Vec<GroupItem>, child: Op) -> Self {
        Self {
            children: vec![child],
            items,
            output: None,
        }
    }

    fn run(&mut self, ctx: &ExecContext) -> Result<Vec<Record>> {
        let mut buckets: FxHashMap<Vec<OrdValue>, Vec<Accumulator>> = FxHashMap::default();
        let mut order: Vec<Vec<OrdValue>> = Vec::new();

        loop {
            if ctx.is_cancelled() {
                break;
            }
            let Some(rec) = self.children[0].consume(ctx)? else {
                break;
            };
            let mut key = Vec::new();
            for item in &self.items {
                if let GroupItem::Key(expr) = item {
                    key.push(OrdValue(expr.eval(&rec, ctx.graph)?));
                }
            }
            if !buckets.contains_key(&key) {
                order.push(key.clone());
                let accs = self
                    .items
                    .iter()
                    .filter_map(|item| match item {
                        GroupItem::Agg(func, _) => Some(Accumulator::new(*func)),
                        GroupItem::Key(_) => None,
                    })
                    .collect();
                buckets.insert(key.clone(), accs);
            }
            let accs = buckets.get_mut(&key).expect("just inserted");
            let mut acc_idx = 0;
            for item in &self.items {
                if let GroupItem::Agg(_, arg) = item {
                    let value = match arg {
                        Some(expr) => Some(expr.eval(&rec, ctx.graph)?),
                        None => None,
                    };
                    accs[acc_idx].accumulate(value);
                    acc_idx += 1;
                }
            }
        }

        let mut rows = Vec::with_capacity(order.len());
        for key in order {
            let mut accs = buckets.remove(&key).expect("key recorded in order");
            let mut rec = Record::with_width(self.items.len());
            let mut key_iter = key.into_iter();
            let mut acc_iter = accs.drain(..);
            for (i, item) in self.items.iter().enumerate() {
                let value = match item {
                    GroupItem::Key(_) => key_iter.next().expect("one key value per Key item").0,
                    GroupItem::Agg(..) => acc_iter.next().expect("one accumulator per Agg item").finish(),
                };
                rec.set(i, Slot::Scalar(value));
            }
            rows.push(rec);
        }
        Ok(rows)
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        if self.output.is_none() {
            let rows = self.run(ctx)?;
            self.output = Some(rows.into_iter());
        }
        Ok(self.output.as_mut().and_then(|it| it.next()))
    }

    pub fn reset(&mut self) {
        self.output = None;
    }

    pub fn describe(&self) -> String {
        format!("Group({} cols)", self.items.len())
    }
}

/// Eagerly materializes every input record, sorts by the given expressions
/// (ascending or descending per key, `SIValue_Order`), then streams them
/// out.
pub struct Sort {
    pub children: Vec<Op>,
    pub keys: Vec<(Expr, bool)>,
    rows: Option<std::vec::IntoIter<Record>>,
}

impl Sort {
    pub fn new(keys: Vec<(Expr, bool)>, child: Op) -> Self {
        Self {
            children: vec![child],
            keys,
            rows: None,
        }
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        if self.rows.is_none() {
            let mut rows = Vec::new();
            while let Some(rec) = self.children[0].consume(ctx)? {
                if ctx.is_cancelled() {
                    break;
                }
                rows.push(rec);
            }
            let mut keyed: Vec<(Vec<Value>, Record)> = Vec::with_capacity(rows.len());
            for rec in rows {
                let mut key = Vec::with_capacity(self.keys.len());
                for (expr, _) in &self.keys {
                    key.push(expr.eval(&rec, ctx.graph)?);
                }
                keyed.push((key, rec));
            }
            keyed.sort_by(|a, b| {
                for (i, (_, desc)) in self.keys.iter().enumerate() {
                    let ord = value::order(&a.0[i], &b.0[i]);
                    let ord = if *desc { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
            self.rows = Some(keyed.into_iter().map(|(_, rec)| rec).collect::<Vec<_>>().into_iter());
        }
        Ok(self.rows.as_mut().and_then(|it| it.next()))
    }

    pub fn reset(&mut self) {
        self.rows = None;
    }

    pub fn describe(&self) -> String {
        format!("Sort({} keys)", self.keys.len())
    }
}

pub struct Skip {
    pub children: Vec<Op>,
    pub n: u64,
    skipped: u64,
}

impl Skip {
    pub fn new(n: u64, child: Op) -> Self {
        Self {
            children: vec![child],
            n,
            skipped: 0,
        }
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        while self.skipped < self.n {
            match self.children[0].consume(ctx)? {
                None => return Ok(None),
                Some(_) => self.skipped += 1,
            }
        }
        self.children[0].consume(ctx)
    }

    pub fn reset(&mut self) {
        self.skipped = 0;
    }

    pub fn describe(&self) -> String {
        format!("Skip({})", self.n)
    }
}

pub struct Limit {
    pub children: Vec<Op>,
    pub n: u64,
    emitted: u64,
}

impl Limit {
    pub fn new(n: u64, child: Op) -> Self {
        Self {
            children: vec![child],
            n,
            emitted: 0,
        }
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        if self.emitted >= self.n {
            return Ok(None);
        }
        match self.children[0].consume(ctx)? {
            None => Ok(None),
            Some(rec) => {
                self.emitted += 1;
                Ok(Some(rec))
            }
        }
    }

    pub fn reset(&mut self) {
        self.emitted = 0;
    }

    pub fn describe(&self) -> String {
        format!("Limit({})", self.n)
    }
}

/// `RETURN DISTINCT`: suppresses rows whose full set of slot values has
/// already been emitted.
pub struct Distinct {
    pub children: Vec<Op>,
    seen: std::collections::BTreeSet<Vec<OrdValue>>,
}

impl Distinct {
    pub fn new(child: Op) -> Self {
        Self {
            children: vec![child],
            seen: std::collections::BTreeSet::new(),
        }
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        loop {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            match self.children[0].consume(ctx)? {
                None => return Ok(None),
                Some(rec) => {
                    let key: Vec<OrdValue> = rec.slots().iter().map(|s| OrdValue(slot_value(s))).collect();
                    if self.seen.insert(key) {
                        return Ok(Some(rec));
                    }
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }

    pub fn describe(&self) -> String {
        "Distinct".to_string()
    }
}

/// A one-shot leaf that hands back whatever record [`super::join::Optional`]
/// last seeded into it, then end-of-stream until seeded again. This is how
/// an `OPTIONAL MATCH`'s inner pattern — otherwise an ordinary scan-rooted
/// chain — gets re-anchored at the already-bound alias the outer pattern
/// supplies, instead of independently re-scanning the whole graph.
#[derive(Default)]
pub struct Seed {
    current: Option<Record>,
}

impl Seed {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn set(&mut self, rec: Record) {
        self.current = Some(rec);
    }

    pub fn consume(&mut self) -> Option<Record> {
        self.current.take()
    }

    pub fn reset(&mut self) {
        self.current = None;
    }

    pub fn describe(&self) -> String {
        "Seed".to_string()
    }
}
