//! Algebraic expression construction and evaluation: the matrix-algebra core
//! that compiles a traversal pattern into `mxm`/`add`/`transpose` operations
//! over [`BoolMatrix`] operands, and the rewriter that normalizes and
//! optimizes the resulting tree before evaluation.
//!
//! An [`AlgebraicExpression`] is either a leaf [`Operand`] (a relationship
//! adjacency matrix or a label diagonal, each carrying its own transpose
//! flag so a transpose never needs to materialize a new matrix) or an n-ary
//! `Add`/`Mul` node over child expressions, mirroring the way a traversal
//! pattern `(a:L)-[:T1]->(b)-[:T2]->(c:M)` compiles to
//! `L_L * A_T1 * A_T2 * L_M`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::ast::Direction;
use crate::graph::Graph;
use crate::matrix::BoolMatrix;
use crate::model::{LabelId, TypeId};

/// A leaf operand: either a relationship-type adjacency matrix or a label
/// diagonal, with its own transpose flag.
#[derive(Clone, Debug)]
pub enum Operand {
    Adjacency { matrix: Arc<BoolMatrix>, transpose: bool },
    Diagonal { matrix: Arc<BoolMatrix>, transpose: bool },
}

impl Operand {
    pub fn transposed(self) -> Operand {
        match self {
            Operand::Adjacency { matrix, transpose } => Operand::Adjacency {
                matrix,
                transpose: !transpose,
            },
            Operand::Diagonal { matrix, transpose } => Operand::Diagonal {
                matrix,
                transpose: !transpose,
            },
        }
    }

    fn eval(&self) -> BoolMatrix {
        match self {
            Operand::Adjacency { matrix, transpose } | Operand::Diagonal { matrix, transpose } => {
                if *transpose {
                    matrix.transposed()
                } else {
                    (**matrix).clone()
                }
            }
        }
    }

    fn fingerprint(&self, h: &mut impl Hasher) {
        match self {
            Operand::Adjacency { matrix, transpose } => {
                "adj".hash(h);
                (Arc::as_ptr(matrix) as usize).hash(h);
                transpose.hash(h);
            }
            Operand::Diagonal { matrix, transpose } => {
                "diag".hash(h);
                (Arc::as_ptr(matrix) as usize).hash(h);
                transpose.hash(h);
            }
        }
    }
}

/// The n-ary operator at an internal expression node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlExpOp {
    Add,
    Mul,
}

/// An algebraic expression tree over boolean matrices.
#[derive(Clone, Debug)]
pub enum AlgebraicExpression {
    Operand(Operand),
    Op {
        op: AlExpOp,
        /// Set by [`AlgebraicExpression::mark_reusable`] when the same
        /// subexpression recurs elsewhere in the compiled query, flagging it
        /// as a candidate for the execution-time materialized-result cache.
        reusable: bool,
        children: Vec<AlgebraicExpression>,
    },
}

impl AlgebraicExpression {
    pub fn operand(op: Operand) -> Self {
        AlgebraicExpression::Operand(op)
    }

    pub fn mul(children: Vec<AlgebraicExpression>) -> Self {
        AlgebraicExpression::Op {
            op: AlExpOp::Mul,
            reusable: false,
            children,
        }
    }

    pub fn add(children: Vec<AlgebraicExpression>) -> Self {
        AlgebraicExpression::Op {
            op: AlExpOp::Add,
            reusable: false,
            children,
        }
    }

    /// `_AppendTerm`: pushes `term` onto the end of a `Mul`/`Add` node's
    /// operand list in place. Panics on a bare `Operand` node, matching the
    /// header's contract that append/prepend only apply to op nodes.
    pub fn append_term(&mut self, term: AlgebraicExpression) {
        match self {
            AlgebraicExpression::Op { children, .. } => children.push(term),
            AlgebraicExpression::Operand(_) => panic!("append_term on a leaf operand"),
        }
    }

    /// `_PrependTerm`: same as [`Self::append_term`] but at the front.
    pub fn prepend_term(&mut self, term: AlgebraicExpression) {
        match self {
            AlgebraicExpression::Op { children, .. } => children.insert(0, term),
            AlgebraicExpression::Operand(_) => panic!("prepend_term on a leaf operand"),
        }
    }

    /// `_RemoveTerm`: removes and returns the child at `idx`.
    pub fn remove_term(&mut self, idx: usize) -> AlgebraicExpression {
        match self {
            AlgebraicExpression::Op { children, .. } => children.remove(idx),
            AlgebraicExpression::Operand(_) => panic!("remove_term on a leaf operand"),
        }
    }

    /// Lazily transposes the whole expression: `(A*B)^T = B^T*A^T`, `(A+B)^T
    /// = A^T+B^T`, and a leaf simply flips its transpose flag — no matrix is
    /// ever materialized by this call.
    pub fn transpose(self) -> AlgebraicExpression {
        match self {
            AlgebraicExpression::Operand(operand) => {
                AlgebraicExpression::Operand(operand.transposed())
            }
            AlgebraicExpression::Op {
                op: AlExpOp::Add,
                reusable,
                children,
            } => AlgebraicExpression::Op {
                op: AlExpOp::Add,
                reusable,
                children: children.into_iter().map(Self::transpose).collect(),
            },
            AlgebraicExpression::Op {
                op: AlExpOp::Mul,
                reusable,
                children,
            } => AlgebraicExpression::Op {
                op: AlExpOp::Mul,
                reusable,
                children: children.into_iter().rev().map(Self::transpose).collect(),
            },
        }
    }

    /// `_SumOfMul`: distributes `Mul` over `Add` so the tree normalizes to an
    /// `Add` of `Mul`-chains of plain operands (or a single `Mul`/`Operand`
    /// if there was no `Add` to begin with).
    pub fn sum_of_products(self) -> AlgebraicExpression {
        match self {
            AlgebraicExpression::Operand(_) => self,
            AlgebraicExpression::Op {
                op: AlExpOp::Add,
                reusable,
                children,
            } => AlgebraicExpression::Op {
                op: AlExpOp::Add,
                reusable,
                children: children.into_iter().map(Self::sum_of_products).collect(),
            },
            AlgebraicExpression::Op {
                op: AlExpOp::Mul,
                children,
                ..
            } => {
                let factors: Vec<Vec<AlgebraicExpression>> = children
                    .into_iter()
                    .map(Self::sum_of_products)
                    .map(|child| match child {
                        AlgebraicExpression::Op {
                            op: AlExpOp::Add,
                            children,
                            ..
                        } => children,
                        other => vec![other],
                    })
                    .collect();

                let mut products = vec![Vec::new()];
                for factor in factors {
                    let mut next = Vec::with_capacity(products.len() * factor.len());
                    for prefix in &products {
                        for term in &factor {
                            let mut combined = prefix.clone();
                            combined.push(term.clone());
                            next.push(combined);
                        }
                    }
                    products = next;
                }

                let mut terms: Vec<AlgebraicExpression> = products
                    .into_iter()
                    .map(|chain| {
                        if chain.len() == 1 {
                            chain.into_iter().next().unwrap()
                        } else {
                            AlgebraicExpression::mul(chain)
                        }
                    })
                    .collect();

                if terms.len() == 1 {
                    terms.pop().unwrap()
                } else {
                    AlgebraicExpression::add(terms)
                }
            }
        }
    }

    /// `_Eval`: folds the tree down to a single [`BoolMatrix`].
    pub fn eval(&self) -> BoolMatrix {
        match self {
            AlgebraicExpression::Operand(operand) => operand.eval(),
            AlgebraicExpression::Op { op, children, .. } => {
                let mut iter = children.iter().map(Self::eval);
                let first = iter
                    .next()
                    .expect("algebraic expression op node must have at least one child");
                iter.fold(first, |acc, next| match op {
                    AlExpOp::Mul => acc.mxm(&next),
                    AlExpOp::Add => acc.add(&next),
                })
            }
        }
    }

    fn fingerprint(&self) -> u64 {
        let mut h = DefaultHasher::new();
        self.fingerprint_into(&mut h);
        h.finish()
    }

    fn fingerprint_into(&self, h: &mut DefaultHasher) {
        match self {
            AlgebraicExpression::Operand(operand) => operand.fingerprint(h),
            AlgebraicExpression::Op { op, children, .. } => {
                (*op as u8).hash(h);
                for child in children {
                    child.fingerprint_into(h);
                }
            }
        }
    }

    /// Walks the tree marking every `Mul` subexpression that recurs
    /// elsewhere as `reusable`, so the executor can cache its materialized
    /// result instead of recomputing it (see the query-wide subtree cache in
    /// `engine`).
    pub fn mark_reusable(&mut self) {
        let mut seen = FxHashSet::default();
        self.mark_reusable_inner(&mut seen);
    }

    fn mark_reusable_inner(&mut self, seen: &mut FxHashSet<u64>) {
        if let AlgebraicExpression::Op {
            op: AlExpOp::Mul,
            reusable,
            children,
        } = self
        {
            let print = {
                let mut h = DefaultHasher::new();
                (*children).iter().for_each(|c| c.fingerprint_into(&mut h));
                h.finish()
            };
            if !seen.insert(print) {
                *reusable = true;
            }
        }
        if let AlgebraicExpression::Op { children, .. } = self {
            for child in children {
                child.mark_reusable_inner(seen);
            }
        }
    }

    pub fn is_reusable(&self) -> bool {
        matches!(self, AlgebraicExpression::Op { reusable: true, .. })
    }
}

/// Builds the algebraic expression for a single query-graph edge:
/// `rel_types` unioned (`Add`), optionally pre/post-multiplied by the source
/// and destination label diagonals, and transposed for `Direction::In`. An
/// empty `rel_types` list means "any relationship type" and multiplies in
/// every registered type matrix unioned together. `Direction::Both` adds the
/// transposed expression alongside the forward one, matching an undirected
/// pattern's "traverse either way" semantics.
pub fn build_edge_expression(
    graph: &Graph,
    rel_types: &[TypeId],
    direction: Direction,
    src_label: Option<LabelId>,
    dst_label: Option<LabelId>,
) -> AlgebraicExpression {
    let type_ids: Vec<TypeId> = if rel_types.is_empty() {
        (0..graph.catalog().relationship_types().len() as u32)
            .map(TypeId)
            .collect()
    } else {
        rel_types.to_vec()
    };

    let adjacency = {
        let operands: Vec<AlgebraicExpression> = type_ids
            .iter()
            .filter_map(|&ty| graph.type_matrix(ty))
            .map(|m| {
                AlgebraicExpression::operand(Operand::Adjacency {
                    matrix: std::sync::Arc::new(m.clone()),
                    transpose: false,
                })
            })
            .collect();
        match operands.len() {
            0 => AlgebraicExpression::operand(Operand::Adjacency {
                matrix: std::sync::Arc::new(BoolMatrix::zeros(graph.node_capacity())),
                transpose: false,
            }),
            1 => operands.into_iter().next().unwrap(),
            _ => AlgebraicExpression::add(operands),
        }
    };

    let forward = wrap_with_label_diagonals(graph, adjacency.clone(), src_label, dst_label);

    match direction {
        Direction::Out => forward,
        Direction::In => forward.transpose(),
        Direction::Both => {
            let backward =
                wrap_with_label_diagonals(graph, adjacency, src_label, dst_label).transpose();
            AlgebraicExpression::add(vec![forward, backward])
        }
    }
}

fn wrap_with_label_diagonals(
    graph: &Graph,
    adjacency: AlgebraicExpression,
    src_label: Option<LabelId>,
    dst_label: Option<LabelId>,
) -> AlgebraicExpression {
    let mut chain = Vec::with_capacity(3);
    if let Some(label) = src_label {
        if let Some(m) = graph.label_matrix(label) {
            chain.push(AlgebraicExpression::operand(Operand::Diagonal {
                matrix: std::sync::Arc::new(m.clone()),
                transpose: false,
            }));
        }
    }
    chain.push(adjacency);
    if let Some(label) = dst_label {
        if let Some(m) = graph.label_matrix(label) {
            chain.push(AlgebraicExpression::operand(Operand::Diagonal {
                matrix: std::sync::Arc::new(m.clone()),
                transpose: false,
            }));
        }
    }
    if chain.len() == 1 {
        chain.pop().unwrap()
    } else {
        AlgebraicExpression::mul(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adj(entries: &[(usize, usize)]) -> Operand {
        Operand::Adjacency {
            matrix: Arc::new(BoolMatrix::from_entries(4, entries.iter().copied())),
            transpose: false,
        }
    }

    #[test]
    fn eval_single_hop_matches_matrix() {
        let expr = AlgebraicExpression::operand(adj(&[(0, 1)]));
        let m = expr.eval();
        assert!(m.get(0, 1));
    }

    #[test]
    fn transpose_flips_leaf_flag_without_materializing() {
        let expr = AlgebraicExpression::operand(adj(&[(0, 1)])).transpose();
        let m = expr.eval();
        assert!(m.get(1, 0));
        assert!(!m.get(0, 1));
    }

    #[test]
    fn transpose_reverses_mul_chain_order() {
        let a = AlgebraicExpression::operand(adj(&[(0, 1)]));
        let b = AlgebraicExpression::operand(adj(&[(1, 2)]));
        let expr = AlgebraicExpression::mul(vec![a, b]).transpose();
        // (A*B)^T == B^T * A^T: 2 -> 1 -> 0 reachable
        let m = expr.eval();
        assert!(m.get(2, 0));
    }

    #[test]
    fn sum_of_products_distributes_mul_over_add() {
        let a = AlgebraicExpression::operand(adj(&[(0, 1)]));
        let b = AlgebraicExpression::operand(adj(&[(0, 2)]));
        let c = AlgebraicExpression::operand(adj(&[(1, 3)]));
        let expr = AlgebraicExpression::mul(vec![AlgebraicExpression::add(vec![a, b]), c]);
        let normalized = expr.sum_of_products();
        match normalized {
            AlgebraicExpression::Op {
                op: AlExpOp::Add,
                children,
                ..
            } => assert_eq!(children.len(), 2),
            other => panic!("expected Add of Mul-chains, got {other:?}"),
        }
    }

    #[test]
    fn build_edge_expression_matches_direct_traversal() {
        let mut g = Graph::new();
        let a = g.add_node(&["P"], vec![]);
        let b = g.add_node(&["P"], vec![]);
        g.add_edge(a, b, "KNOWS", vec![]).unwrap();
        let ty = g.catalog().resolve_type("KNOWS").unwrap();
        let label = g.catalog().resolve_label("P").unwrap();

        let expr = build_edge_expression(&g, &[ty], Direction::Out, Some(label), Some(label));
        assert!(expr.eval().get(a, b));

        let reversed = build_edge_expression(&g, &[ty], Direction::In, Some(label), Some(label));
        assert!(reversed.eval().get(b, a));
    }

    #[test]
    fn mark_reusable_flags_duplicate_subexpression() {
        let shared_matrix = Arc::new(BoolMatrix::from_entries(4, [(0, 1)]));
        let make_chain = || {
            AlgebraicExpression::mul(vec![AlgebraicExpression::operand(Operand::Adjacency {
                matrix: shared_matrix.clone(),
                transpose: false,
            })])
        };
        let mut expr = AlgebraicExpression::add(vec![make_chain(), make_chain()]);
        expr.mark_reusable();
        if let AlgebraicExpression::Op { children, .. } = &expr {
            assert!(children[1].is_reusable());
        }
    }
}
