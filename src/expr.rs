//! `AR_ExpNode` — the small arithmetic/function expression AST that
//! [`crate::operator::pipeline::Projection`] and the filter tree evaluate,
//! plus the filter tree itself (`FT`).
//!
//! Three variants: a constant, a
//! variadic reference (a bound slot, or `alias.property`), and a function
//! call over evaluated sub-expressions.

use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::model::{PropId, TypeId};
use crate::record::{Record, Slot};
use crate::value::{self, Value};

/// One node of the projection/filter arithmetic AST.
#[derive(Clone, Debug)]
pub enum Expr {
    Const(Value),
    /// A whole bound slot (node, edge, or scalar) read back as-is.
    Variable(usize),
    /// `alias.prop`: read a property off the node/edge bound at `slot`.
    Property { slot: usize, prop: PropId },
    Func { func: Func, args: Vec<Expr> },
}

/// Built-in scalar functions available to a projection/filter expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Func {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lower,
    Upper,
    Abs,
    /// `id(node_or_edge)`.
    Id,
    /// First non-null argument, or null if all are.
    Coalesce,
}

fn numeric_binop(f: Func, a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => match f {
            Func::Add => Ok(Value::Int(x + y)),
            Func::Sub => Ok(Value::Int(x - y)),
            Func::Mul => Ok(Value::Int(x * y)),
            Func::Div => {
                if *y == 0 {
                    Err(GraphError::DivByZero)
                } else {
                    Ok(Value::Int(x / y))
                }
            }
            Func::Mod => {
                if *y == 0 {
                    Err(GraphError::DivByZero)
                } else {
                    Ok(Value::Int(x % y))
                }
            }
            _ => unreachable!("numeric_binop called with non-arithmetic func"),
        },
        (a, b) if matches!(a, Value::Int(_) | Value::Float(_)) && matches!(b, Value::Int(_) | Value::Float(_)) => {
            let x = as_f64(a)?;
            let y = as_f64(b)?;
            match f {
                Func::Add => Ok(Value::Float(x + y)),
                Func::Sub => Ok(Value::Float(x - y)),
                Func::Mul => Ok(Value::Float(x * y)),
                Func::Div => {
                    if y == 0.0 {
                        Err(GraphError::DivByZero)
                    } else {
                        Ok(Value::Float(x / y))
                    }
                }
                Func::Mod => {
                    if y == 0.0 {
                        Err(GraphError::DivByZero)
                    } else {
                        Ok(Value::Float(x % y))
                    }
                }
                _ => unreachable!("numeric_binop called with non-arithmetic func"),
            }
        }
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        _ => Err(GraphError::TypeMismatch(
            "arithmetic on a non-numeric value".into(),
        )),
    }
}

fn as_f64(v: &Value) -> Result<f64> {
    match v {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        _ => Err(GraphError::TypeMismatch(
            "arithmetic on a non-numeric value".into(),
        )),
    }
}

impl Expr {
    /// Evaluates this expression against a bound record.
    pub fn eval(&self, record: &Record, graph: &Graph) -> Result<Value> {
        match self {
            Expr::Const(v) => Ok(v.clone()),
            Expr::Variable(slot) => Ok(slot_to_value(record.get(*slot))),
            Expr::Property { slot, prop } => Ok(read_property(record.get(*slot), *prop, graph)),
            Expr::Func { func, args } => {
                let values: Vec<Value> = args
                    .iter()
                    .map(|a| a.eval(record, graph))
                    .collect::<Result<_>>()?;
                eval_func(*func, &values)
            }
        }
    }
}

fn slot_to_value(slot: &Slot) -> Value {
    match slot {
        Slot::Unset => Value::Null,
        Slot::Node(id) => Value::Node(*id),
        Slot::Edge(id) => Value::Edge(*id),
        Slot::Edges(ids) => Value::Array(ids.iter().map(|e| Value::Edge(*e)).collect()),
        Slot::Scalar(v) => v.clone(),
    }
}

fn read_property(slot: &Slot, prop: PropId, graph: &Graph) -> Value {
    match slot {
        Slot::Node(id) => graph
            .node(*id)
            .and_then(|n| n.properties.get(&prop))
            .cloned()
            .unwrap_or(Value::Null),
        Slot::Edge(id) => graph
            .edge(*id)
            .and_then(|e| e.properties.get(&prop))
            .cloned()
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn eval_func(func: Func, args: &[Value]) -> Result<Value> {
    match func {
        Func::Add | Func::Sub | Func::Mul | Func::Div | Func::Mod => {
            numeric_binop(func, &args[0], &args[1])
        }
        Func::Lower => match &args[0] {
            Value::Null => Ok(Value::Null),
            Value::Str(s) => Ok(Value::string(s.to_lowercase())),
            _ => Err(GraphError::TypeMismatch("lower() expects a string".into())),
        },
        Func::Upper => match &args[0] {
            Value::Null => Ok(Value::Null),
            Value::Str(s) => Ok(Value::string(s.to_uppercase())),
            _ => Err(GraphError::TypeMismatch("upper() expects a string".into())),
        },
        Func::Abs => match &args[0] {
            Value::Null => Ok(Value::Null),
            Value::Int(i) => Ok(Value::Int(i.abs())),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            _ => Err(GraphError::TypeMismatch("abs() expects a number".into())),
        },
        Func::Id => match &args[0] {
            Value::Node(id) => Ok(Value::Int(*id as i64)),
            Value::Edge(id) => Ok(Value::Int(*id as i64)),
            Value::Null => Ok(Value::Null),
            _ => Err(GraphError::TypeMismatch("id() expects a node or edge".into())),
        },
        Func::Coalesce => Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null)),
    }
}

/// The filter tree (`FT`): nested AND/OR/NOT over comparisons, plus the
/// cycle-closing membership check the query-graph builder introduces for a
/// back edge (see [`crate::qgraph::QueryGraph::spanning_tree`]) — a back edge
/// isn't a property comparison, so it gets its own leaf variant rather than
/// being forced through [`Expr`]'s arithmetic AST.
#[derive(Clone, Debug)]
pub enum FilterTree {
    Pred {
        op: crate::ast::CompareOp,
        lhs: Expr,
        rhs: Expr,
    },
    And(Vec<FilterTree>),
    Or(Vec<FilterTree>),
    Not(Box<FilterTree>),
    /// Verifies that an edge of one of `rel_types` (respecting `direction`)
    /// exists between the nodes bound at `src_slot` and `dest_slot` — how a
    /// query-graph cycle's back edge becomes a filter once both endpoints are
    /// already bound by the spanning-tree walk.
    EdgeCheck {
        src_slot: usize,
        dest_slot: usize,
        rel_types: Vec<TypeId>,
        direction: crate::ast::Direction,
    },
}

impl FilterTree {
    pub fn eval(&self, record: &Record, graph: &Graph) -> Result<bool> {
        match self {
            FilterTree::Pred { op, lhs, rhs } => {
                let l = lhs.eval(record, graph)?;
                let r = rhs.eval(record, graph)?;
                Ok(eval_compare(*op, &l, &r))
            }
            FilterTree::And(children) => {
                for c in children {
                    if !c.eval(record, graph)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            FilterTree::Or(children) => {
                for c in children {
                    if c.eval(record, graph)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            FilterTree::Not(inner) => Ok(!inner.eval(record, graph)?),
            FilterTree::EdgeCheck {
                src_slot,
                dest_slot,
                rel_types,
                direction,
            } => {
                let Some(src) = record.get(*src_slot).as_node() else {
                    return Ok(false);
                };
                let Some(dest) = record.get(*dest_slot).as_node() else {
                    return Ok(false);
                };
                for &ty in rel_types {
                    let Some(m) = graph.type_matrix(ty) else {
                        continue;
                    };
                    let hit = match direction {
                        crate::ast::Direction::Out => m.get(src, dest),
                        crate::ast::Direction::In => m.get(dest, src),
                        crate::ast::Direction::Both => m.get(src, dest) || m.get(dest, src),
                    };
                    if hit {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

/// `_reverseOp`-aware three-valued comparison: `=`/`!=` use [`value::compare`]
/// (strict, type-matched equality), the relational operators use
/// [`value::typed_order`] (unknown on type mismatch or null), and NULL always
/// coerces the whole predicate to false.
fn eval_compare(op: crate::ast::CompareOp, l: &Value, r: &Value) -> bool {
    use crate::ast::CompareOp::*;
    match op {
        Eq => value::compare(l, r),
        Ne => !l.is_null() && !r.is_null() && !value::compare(l, r),
        Lt => matches!(value::typed_order(l, r), Some(std::cmp::Ordering::Less)),
        Le => matches!(
            value::typed_order(l, r),
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
        ),
        Gt => matches!(value::typed_order(l, r), Some(std::cmp::Ordering::Greater)),
        Ge => matches!(
            value::typed_order(l, r),
            Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CompareOp;

    #[test]
    fn const_expr_evaluates_to_itself() {
        let g = Graph::new();
        let r = Record::with_width(0);
        assert_eq!(Expr::Const(Value::Int(7)).eval(&r, &g).unwrap(), Value::Int(7));
    }

    #[test]
    fn property_read_returns_null_for_missing_key() {
        let mut g = Graph::new();
        let a = g.add_node(&["P"], vec![]);
        let mut r = Record::with_width(1);
        r.set(0, Slot::Node(a));
        let missing = PropId(999);
        assert_eq!(
            Expr::Property { slot: 0, prop: missing }.eval(&r, &g).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn div_by_zero_errors() {
        let g = Graph::new();
        let r = Record::with_width(0);
        let e = Expr::Func {
            func: Func::Div,
            args: vec![Expr::Const(Value::Int(1)), Expr::Const(Value::Int(0))],
        };
        assert!(matches!(e.eval(&r, &g), Err(GraphError::DivByZero)));
    }

    #[test]
    fn filter_tree_null_coerces_false() {
        let g = Graph::new();
        let r = Record::with_width(0);
        let ft = FilterTree::Pred {
            op: CompareOp::Gt,
            lhs: Expr::Const(Value::Null),
            rhs: Expr::Const(Value::Int(1)),
        };
        assert!(!ft.eval(&r, &g).unwrap());
    }

    #[test]
    fn and_short_circuits_on_first_false() {
        let g = Graph::new();
        let r = Record::with_width(0);
        let ft = FilterTree::And(vec![
            FilterTree::Pred {
                op: CompareOp::Eq,
                lhs: Expr::Const(Value::Int(1)),
                rhs: Expr::Const(Value::Int(2)),
            },
            FilterTree::Pred {
                op: CompareOp::Eq,
                lhs: Expr::Const(Value::Int(1)),
                rhs: Expr::Const(Value::Int(1)),
            },
        ]);
        assert!(!ft.eval(&r, &g).unwrap());
    }
}
