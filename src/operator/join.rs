//! Joins: combining two independently-bound record streams.
//!
//! `ValueHashJoin` deliberately sorts and binary-searches instead of hashing:
//! [`Value`] has no cross-type hash that agrees with [`value::order`] (a
//! `Value::Int(1)` and a hypothetical equal-valued float would hash
//! differently under a derived `Hash`), but it does have a total order, so a
//! sorted probe side plus `partition_point` gives the same asymptotic join
//! cost without that problem.

use std::cmp::Ordering;

use crate::error::Result;
use crate::expr::Expr;
use crate::record::Record;
use crate::value::{self, Value};

use super::{ExecContext, Op};

/// Joins two bound streams on `left_key`/`right_key` equality (`value::order`
/// equality, i.e. same type and same value). The left child is drained and
/// sorted once, on the first `consume`; each right record then probes the
/// sorted cache via `partition_point` for its matching run, and is merged
/// onto a clone of the cached left record so the left side's join-key (and
/// any other bound) slots are never overwritten.
pub struct ValueHashJoin {
    pub children: Vec<Op>,
    pub left_key: Expr,
    pub right_key: Expr,
    cache: Option<Vec<(Value, Record)>>,
    current_right: Option<Record>,
    probe_pos: usize,
    probe_end: usize,
}

impl ValueHashJoin {
    pub fn new(left_key: Expr, right_key: Expr, left: Op, right: Op) -> Self {
        Self {
            children: vec![left, right],
            left_key,
            right_key,
            cache: None,
            current_right: None,
            probe_pos: 0,
            probe_end: 0,
        }
    }

    fn build(&mut self, ctx: &ExecContext) -> Result<()> {
        let mut rows = Vec::new();
        while let Some(rec) = self.children[0].consume(ctx)? {
            let key = self.left_key.eval(&rec, ctx.graph)?;
            rows.push((key, rec));
        }
        rows.sort_by(|a, b| value::order(&a.0, &b.0));
        self.cache = Some(rows);
        Ok(())
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        if self.cache.is_none() {
            self.build(ctx)?;
        }
        let cache = self.cache.as_ref().expect("built above");

        loop {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            if self.probe_pos < self.probe_end {
                let (_, left) = &cache[self.probe_pos];
                self.probe_pos += 1;
                let mut out = left.clone();
                out.merge(self.current_right.as_ref().expect("probe_end>0 implies right set"));
                return Ok(Some(out));
            }

            match self.children[1].consume(ctx)? {
                None => return Ok(None),
                Some(rec) => {
                    let key = self.right_key.eval(&rec, ctx.graph)?;
                    let start = cache.partition_point(|(k, _)| value::order(k, &key) == Ordering::Less);
                    let end = start
                        + cache[start..]
                            .iter()
                            .take_while(|(k, _)| value::order(k, &key) == Ordering::Equal)
                            .count();
                    self.current_right = Some(rec);
                    self.probe_pos = start;
                    self.probe_end = end;
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.cache = None;
        self.current_right = None;
        self.probe_pos = 0;
        self.probe_end = 0;
    }

    pub fn describe(&self) -> String {
        "ValueHashJoin".to_string()
    }
}

/// The unconditional join for disconnected query-graph components: every
/// left record paired with every right record. The right child is drained
/// and cached once; left records stream through it repeatedly.
pub struct CartesianProduct {
    pub children: Vec<Op>,
    cache: Option<Vec<Record>>,
    current_left: Option<Record>,
    pos: usize,
}

impl CartesianProduct {
    pub fn new(left: Op, right: Op) -> Self {
        Self {
            children: vec![left, right],
            cache: None,
            current_left: None,
            pos: 0,
        }
    }

    fn build(&mut self, ctx: &ExecContext) -> Result<()> {
        let mut rows = Vec::new();
        while let Some(rec) = self.children[1].consume(ctx)? {
            rows.push(rec);
        }
        self.cache = Some(rows);
        Ok(())
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        if self.cache.is_none() {
            self.build(ctx)?;
        }
        let cache = self.cache.as_ref().expect("built above");

        loop {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            if !cache.is_empty() && self.pos < cache.len() {
                let right = &cache[self.pos];
                self.pos += 1;
                let mut out = self.current_left.as_ref().expect("pos<len implies left set").clone();
                out.merge(right);
                return Ok(Some(out));
            }

            match self.children[0].consume(ctx)? {
                None => return Ok(None),
                Some(rec) => {
                    if cache.is_empty() {
                        continue;
                    }
                    self.current_left = Some(rec);
                    self.pos = 0;
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.cache = None;
        self.current_left = None;
        self.pos = 0;
    }

    pub fn describe(&self) -> String {
        "CartesianProduct".to_string()
    }
}

/// `OPTIONAL MATCH`: the "Apply" operator. For each record pulled from
/// `outer`, seeds `inner`'s leaf [`Seed`] with it and drains whatever
/// `inner` produces. If `inner` produced at least one row, those (already
/// merged with the outer record's bindings, since `inner`'s own scan/filter
/// chain starts from the seeded row) are forwarded as-is; if it produced
/// none, the outer record is forwarded once, unmodified — its optional
/// slots stay `Unset`, which downstream projection reads back as null. This
/// relies on the planner allocating every alias's slot (primary and
/// optional) up front, so the outer record is already the right width and
/// needs no resizing here.
pub struct Optional {
    pub children: Vec<Op>,
    exhausted_without_match: bool,
    outer_pending: Option<Record>,
}

impl Optional {
    pub fn new(outer: Op, inner: Op) -> Self {
        Self {
            children: vec![outer, inner],
            exhausted_without_match: true,
            outer_pending: None,
        }
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        loop {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            if self.outer_pending.is_some() {
                match self.children[1].consume(ctx)? {
                    Some(rec) => {
                        self.exhausted_without_match = false;
                        return Ok(Some(rec));
                    }
                    None => {
                        let fallback = self.outer_pending.take();
                        self.children[1].reset();
                        if self.exhausted_without_match {
                            return Ok(fallback);
                        }
                        continue;
                    }
                }
            }

            match self.children[0].consume(ctx)? {
                None => return Ok(None),
                Some(rec) => {
                    self.children[1].seed(rec.clone());
                    self.outer_pending = Some(rec);
                    self.exhausted_without_match = true;
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.exhausted_without_match = true;
        self.outer_pending = None;
    }

    pub fn describe(&self) -> String {
        "Optional".to_string()
    }
}

/// The lateral-join half of `Optional`'s pattern, used to re-plant a WITH
/// stage's new MATCH clause at each carried row instead of once for the
/// whole query: identical pull loop, minus the "emit the outer row unmatched
/// if inner produced nothing" fallback, since a WITH-chained MATCH that
/// fails to find anything for a given carried row drops that row, it
/// doesn't pass it through with unset slots.
pub struct Apply {
    pub children: Vec<Op>,
    outer_pending: bool,
}

impl Apply {
    pub fn new(outer: Op, inner: Op) -> Self {
        Self {
            children: vec![outer, inner],
            outer_pending: false,
        }
    }

    pub fn consume(&mut self, ctx: &ExecContext) -> Result<Option<Record>> {
        loop {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            if self.outer_pending {
                match self.children[1].consume(ctx)? {
                    Some(rec) => return Ok(Some(rec)),
                    None => {
                        self.outer_pending = false;
                        self.children[1].reset();
                        continue;
                    }
                }
            }

            match self.children[0].consume(ctx)? {
                None => return Ok(None),
                Some(rec) => {
                    self.children[1].seed(rec);
                    self.outer_pending = true;
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.outer_pending = false;
    }

    pub fn describe(&self) -> String {
        "Apply".to_string()
    }
}
