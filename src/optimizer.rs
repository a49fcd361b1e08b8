//! Index-utilization rewrite: replaces a `NodeByLabelScan` rooting a
//! component plus the single-alias `Filter` chain sitting directly above it
//! with an [`IndexScan`], when the graph carries an index the filters can
//! actually exploit.
//!
//! [`Op::children`](crate::operator::Op) is private to [`crate::operator`],
//! so this can't walk an already-built plan tree and splice a replacement
//! into it — the planner calls [`try_index_scan`] itself, at the moment it
//! is about to build a label scan, with the filter conjuncts it was going to
//! wrap that scan in. It runs inline during plan construction, just applied
//! during construction instead of as a separate tree pass.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::ast::CompareOp;
use crate::expr::{Expr, FilterTree};
use crate::graph::Graph;
use crate::index::IndexQuery;
use crate::model::{LabelId, PropId};
use crate::operator::{IndexScan, Op};
use crate::value::{self, Value};

/// Tries to reduce `filters` (the conjuncts pending against `slot`, the
/// alias a `NodeByLabelScan(label)` is about to bind) into a single
/// [`IndexScan`]. Returns the replacement operator and whatever filters
/// weren't folded in, if at least one filter reduced against an indexed
/// property; `None` if nothing did, in which case the planner falls back to
/// the ordinary scan-then-filter chain.
pub fn try_index_scan(
    graph: &Graph,
    label: LabelId,
    label_name: &str,
    slot: usize,
    width: usize,
    filters: &[FilterTree],
) -> Option<(Op, Vec<FilterTree>)> {
    let mut prop_order: Vec<PropId> = Vec::new();
    for f in filters {
        let prop = match f {
            FilterTree::Pred { lhs, rhs, .. } => property_of(lhs, slot).or_else(|| property_of(rhs, slot)),
            FilterTree::Or(children) => or_property(children, slot),
            _ => None,
        };
        if let Some(p) = prop {
            if !prop_order.contains(&p) {
                prop_order.push(p);
            }
        }
    }

    for prop in prop_order {
        if !graph.has_index(label, prop) {
            continue;
        }

        // An OR filter whose every disjunct is a leaf on `prop` reduces to a
        // single Union query; tried before the AND-conjunct path below since
        // an OR can't be folded into that path's one min/max range.
        if let Some((idx, union_query)) = filters.iter().enumerate().find_map(|(i, f)| match f {
            FilterTree::Or(children) => or_index_query(children, slot, prop).map(|q| (i, q)),
            _ => None,
        }) {
            return Some(build_scan_and_leftover(
                graph, label, label_name, prop, slot, width, union_query, filters, &[idx],
            ));
        }

        let leaves: Vec<(usize, CompareOp, Value)> = filters
            .iter()
            .enumerate()
            .filter_map(|(i, f)| match f {
                FilterTree::Pred { op, lhs, rhs } => {
                    normalize_leaf(*op, lhs, rhs, slot).and_then(|(p, op, v)| (p == prop).then_some((i, op, v)))
                }
                _ => None,
            })
            .collect();
        if leaves.is_empty() {
            continue;
        }

        // An equality leaf pins the value outright; any other leaves on the
        // same property are redundant (or contradictory, in which case the
        // leftover filter still rejects every row) and are left in place
        // rather than reasoned about further.
        if let Some(&(idx, _, ref v)) = leaves.iter().find(|(_, op, _)| *op == CompareOp::Eq) {
            let query = IndexQuery::Equals(v.clone());
            return Some(build_scan_and_leftover(
                graph, label, label_name, prop, slot, width, query, filters, &[idx],
            ));
        }

        let mut min: Option<(Value, bool)> = None;
        let mut max: Option<(Value, bool)> = None;
        let mut consumed: Vec<usize> = Vec::new();
        for (idx, op, v) in &leaves {
            match op {
                CompareOp::Gt => {
                    tighten_min(&mut min, v.clone(), false);
                    consumed.push(*idx);
                }
                CompareOp::Ge => {
                    tighten_min(&mut min, v.clone(), true);
                    consumed.push(*idx);
                }
                CompareOp::Lt => {
                    tighten_max(&mut max, v.clone(), false);
                    consumed.push(*idx);
                }
                CompareOp::Le => {
                    tighten_max(&mut max, v.clone(), true);
                    consumed.push(*idx);
                }
                CompareOp::Eq | CompareOp::Ne => {}
            }
        }
        if consumed.is_empty() {
            continue;
        }

        let query = IndexQuery::Range {
            min: min.as_ref().map(|(v, _)| v.clone()),
            min_inclusive: min.as_ref().map(|(_, i)| *i).unwrap_or(true),
            max: max.as_ref().map(|(v, _)| v.clone()),
            max_inclusive: max.as_ref().map(|(_, i)| *i).unwrap_or(true),
        };
        return Some(build_scan_and_leftover(
            graph, label, label_name, prop, slot, width, query, filters, &consumed,
        ));
    }

    None
}

#[allow(clippy::too_many_arguments)]
fn build_scan_and_leftover(
    graph: &Graph,
    label: LabelId,
    label_name: &str,
    prop: PropId,
    slot: usize,
    width: usize,
    query: IndexQuery,
    filters: &[FilterTree],
    consumed: &[usize],
) -> (Op, Vec<FilterTree>) {
    let consumed: HashSet<usize> = consumed.iter().copied().collect();
    let prop_name = graph.catalog().prop_name(prop).to_string();
    let op = Op::IndexScan(IndexScan::new(label, label_name.to_string(), prop, prop_name, query, slot, width));
    let leftover = filters
        .iter()
        .enumerate()
        .filter(|(i, _)| !consumed.contains(i))
        .map(|(_, f)| f.clone())
        .collect();
    (op, leftover)
}

/// `_reverseOp`: normalizes a leaf so the scanned alias's property always
/// ends up on the left. Both sides referencing a property (or a property on
/// a different alias than the one being scanned) isn't reducible.
fn normalize_leaf(op: CompareOp, lhs: &Expr, rhs: &Expr, slot: usize) -> Option<(PropId, CompareOp, Value)> {
    match (lhs, rhs) {
        (Expr::Property { slot: s, prop }, Expr::Const(v)) if *s == slot => Some((*prop, op, v.clone())),
        (Expr::Const(v), Expr::Property { slot: s, prop }) if *s == slot => Some((*prop, op.reversed(), v.clone())),
        _ => None,
    }
}

fn property_of(expr: &Expr, slot: usize) -> Option<PropId> {
    match expr {
        Expr::Property { slot: s, prop } if *s == slot => Some(*prop),
        _ => None,
    }
}

/// The single property every disjunct of an OR compares against `slot`, or
/// `None` if any disjunct isn't a leaf, compares a different alias, or the
/// disjuncts span more than one property (that OR isn't reducible to a Union
/// over one index).
fn or_property(children: &[FilterTree], slot: usize) -> Option<PropId> {
    let mut prop = None;
    for c in children {
        let FilterTree::Pred { lhs, rhs, .. } = c else { return None };
        let p = property_of(lhs, slot).or_else(|| property_of(rhs, slot))?;
        match prop {
            None => prop = Some(p),
            Some(existing) if existing == p => {}
            Some(_) => return None,
        }
    }
    prop
}

/// Builds the `IndexQuery::Union` an OR over `prop` reduces to, one branch
/// per disjunct; `None` if any disjunct doesn't normalize against `prop`
/// (including `!=`, which an index posting list can't answer directly).
fn or_index_query(children: &[FilterTree], slot: usize, prop: PropId) -> Option<IndexQuery> {
    let mut queries = Vec::with_capacity(children.len());
    for c in children {
        let FilterTree::Pred { op, lhs, rhs } = c else { return None };
        let (p, op, v) = normalize_leaf(*op, lhs, rhs, slot)?;
        if p != prop {
            return None;
        }
        let query = match op {
            CompareOp::Eq => IndexQuery::Equals(v),
            CompareOp::Gt => IndexQuery::Range { min: Some(v), min_inclusive: false, max: None, max_inclusive: true },
            CompareOp::Ge => IndexQuery::Range { min: Some(v), min_inclusive: true, max: None, max_inclusive: true },
            CompareOp::Lt => IndexQuery::Range { min: None, min_inclusive: true, max: Some(v), max_inclusive: false },
            CompareOp::Le => IndexQuery::Range { min: None, min_inclusive: true, max: Some(v), max_inclusive: true },
            CompareOp::Ne => return None,
        };
        queries.push(query);
    }
    Some(IndexQuery::Union(queries))
}

fn tighten_min(cur: &mut Option<(Value, bool)>, v: Value, inclusive: bool) {
    match cur {
        None => *cur = Some((v, inclusive)),
        Some((cv, ci)) => match value::order(&v, cv) {
            Ordering::Greater => *cur = Some((v, inclusive)),
            Ordering::Equal => {
                if !inclusive {
                    *ci = false;
                }
            }
            Ordering::Less => {}
        },
    }
}

fn tighten_max(cur: &mut Option<(Value, bool)>, v: Value, inclusive: bool) {
    match cur {
        None => *cur = Some((v, inclusive)),
        Some((cv, ci)) => match value::order(&v, cv) {
            Ordering::Less => *cur = Some((v, inclusive)),
            Ordering::Equal => {
                if !inclusive {
                    *ci = false;
                }
            }
            Ordering::Greater => {}
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CompareOp;
    use crate::graph::Graph;

    fn graph_with_index() -> (Graph, LabelId, PropId, usize) {
        let mut g = Graph::new();
        let label = g.ensure_label("Person");
        g.add_node(&["Person"], vec![("age", Value::Int(20))]);
        g.add_node(&["Person"], vec![("age", Value::Int(30))]);
        g.create_index("Person", "age").unwrap();
        let prop = g.catalog().resolve_prop("age").unwrap();
        (g, label, prop, 0)
    }

    #[test]
    fn equality_filter_reduces_to_equals_query() {
        let (g, label, prop, slot) = graph_with_index();
        let filters = vec![FilterTree::Pred {
            op: CompareOp::Eq,
            lhs: Expr::Property { slot, prop },
            rhs: Expr::Const(Value::Int(30)),
        }];
        let (op, leftover) = try_index_scan(&g, label, "Person", slot, 1, &filters).expect("reduces");
        assert!(leftover.is_empty());
        assert!(matches!(op, Op::IndexScan(_)));
    }

    #[test]
    fn range_filters_combine_into_one_range_query() {
        let (g, label, prop, slot) = graph_with_index();
        let filters = vec![
            FilterTree::Pred { op: CompareOp::Gt, lhs: Expr::Property { slot, prop }, rhs: Expr::Const(Value::Int(15)) },
            FilterTree::Pred { op: CompareOp::Lt, lhs: Expr::Property { slot, prop }, rhs: Expr::Const(Value::Int(35)) },
        ];
        let (op, leftover) = try_index_scan(&g, label, "Person", slot, 1, &filters).expect("reduces");
        assert!(leftover.is_empty());
        assert!(matches!(op, Op::IndexScan(_)));
    }

    #[test]
    fn unindexed_property_is_not_reduced() {
        let (g, label, _prop, slot) = graph_with_index();
        let name_prop = PropId(9999);
        let filters = vec![FilterTree::Pred {
            op: CompareOp::Eq,
            lhs: Expr::Property { slot, prop: name_prop },
            rhs: Expr::Const(Value::string("Alice")),
        }];
        assert!(try_index_scan(&g, label, "Person", slot, 1, &filters).is_none());
    }

    #[test]
    fn both_sides_variadic_is_not_reducible() {
        let (g, label, prop, slot) = graph_with_index();
        let filters = vec![FilterTree::Pred {
            op: CompareOp::Eq,
            lhs: Expr::Property { slot, prop },
            rhs: Expr::Property { slot: slot + 1, prop },
        }];
        assert!(try_index_scan(&g, label, "Person", slot, 1, &filters).is_none());
    }
}
