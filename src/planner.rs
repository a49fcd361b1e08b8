//! Execution plan builder: turns a resolved [`QueryAst`] into an [`Op`]
//! tree, one left-deep spine per connected pattern component, joined by
//! [`CartesianProduct`] (disconnected components) or [`Optional`] (OPTIONAL
//! MATCH clauses).
//!
//! Record slots are allocated once, globally, in first-seen order across
//! every MATCH/OPTIONAL MATCH clause — a node or edge alias keeps the same
//! slot no matter which clause or component binds it, which is what lets
//! `OPTIONAL MATCH`'s [`Optional`] seed its inner subtree with the outer
//! record and have later stages read either side uniformly.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::ast::{
    AggregateFn, CompareOp, Direction, MatchClause, Predicate, ProjectionItem, QueryAst,
};
use crate::error::{GraphError, Result};
use crate::expr::{Expr, FilterTree};
use crate::graph::Graph;
use crate::model::{LabelId, PropId, TypeId};
use crate::operator::{
    AllNodeScan, Apply, CartesianProduct, Carry, ConditionalTraverse, ConditionalVarLenTraverse,
    Distinct, Expand, Filter, Group, GroupItem, NodeByLabelScan, Op, Optional, Projection, Seed,
    Skip, Sort, ValueHashJoin,
};
use crate::optimizer;
use crate::qgraph::{QgEdge, QgNode, QueryGraph};
use crate::record::Record;

/// Sentinel id substituted for a label/relationship-type name the catalog
/// doesn't recognize yet, so a scan or traverse degrades to "matches
/// nothing" instead of silently matching everything.
const UNRESOLVED: u32 = u32::MAX;

/// Tunables controlling plan shape; none of them change query semantics.
#[derive(Clone, Copy, Debug)]
pub struct PlannerConfig {
    /// Use the single-relationship-type `Expand` fast path instead of the
    /// general `ConditionalTraverse` whenever a hop qualifies.
    pub enable_expand_fast_path: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            enable_expand_fast_path: true,
        }
    }
}

/// One node of the human-readable plan tree returned by `GRAPH.EXPLAIN`.
/// Built alongside the `Op` tree during planning, since `Op`'s own child
/// list is private.
#[derive(Clone, Debug)]
pub struct ExplainNode {
    pub op: String,
    pub props: Vec<(String, String)>,
    pub inputs: Vec<ExplainNode>,
}

impl ExplainNode {
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            props: Vec::new(),
            inputs: Vec::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.push((key.into(), value.into()));
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<ExplainNode>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_at(0, &mut out);
        out
    }

    fn render_at(&self, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.op);
        if !self.props.is_empty() {
            out.push_str("  [");
            for (i, (k, v)) in self.props.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(k);
                out.push('=');
                out.push_str(v);
            }
            out.push(']');
        }
        out.push('\n');
        for child in &self.inputs {
            child.render_at(depth + 1, out);
        }
    }
}

/// The explain tree handed back alongside a plan, rooted at the final
/// (topmost) operator.
#[derive(Clone, Debug)]
pub struct PlanExplain {
    pub root: ExplainNode,
}

/// A built plan plus its explain tree.
pub struct PlannerOutput {
    pub plan: Op,
    pub explain: PlanExplain,
}

/// Compiles a [`QueryAst`] against one [`Graph`]'s current schema (label,
/// relationship-type and property ids are resolved once, at plan time, not
/// replanned per row).
pub struct Planner<'g> {
    graph: &'g Graph,
    config: PlannerConfig,
}

impl<'g> Planner<'g> {
    pub fn new(graph: &'g Graph, config: PlannerConfig) -> Self {
        Self { graph, config }
    }

    pub fn plan(&self, ast: &QueryAst) -> Result<PlannerOutput> {
        let (plan, explain) = self.plan_stage(ast, None)?;
        Ok(PlannerOutput {
            plan,
            explain: PlanExplain { root: explain },
        })
    }

    /// Plans one WITH-delimited stage of the query. `carry` is `Some((plan,
    /// explain, carried_names))` when this stage continues a previous WITH
    /// projection: `carried_names` are that projection's output aliases,
    /// already written into their slots (per [`Self::allocate_slots`]'s
    /// `carried` parameter) by the time `carry`'s plan yields a record.
    fn plan_stage(
        &self,
        ast: &QueryAst,
        carry: Option<(Op, ExplainNode, Vec<String>)>,
    ) -> Result<(Op, ExplainNode)> {
        let carried_names: Vec<String> = carry.as_ref().map(|(_, _, n)| n.clone()).unwrap_or_default();
        let (slot_of, width) = Self::allocate_slots(ast, &carried_names);

        let mut per_alias_filters: HashMap<String, Vec<FilterTree>> = HashMap::new();
        let mut global_filters: Vec<FilterTree> = Vec::new();

        if let Some(pred) = &ast.where_predicate {
            for conjunct in flatten_and(pred) {
                let mut vars = HashSet::new();
                collect_predicate_vars(conjunct, &mut vars);
                let ft = self.predicate_to_filter_tree(conjunct, &slot_of)?;
                if vars.len() == 1 {
                    let alias = vars.into_iter().next().unwrap();
                    per_alias_filters.entry(alias).or_default().push(ft);
                } else {
                    global_filters.push(ft);
                }
            }
        }

        for clause in &ast.matches {
            for path in &clause.paths {
                for node in &path.nodes {
                    for (prop, value) in &node.inline_props {
                        let prop_id = self.resolve_prop(prop);
                        let slot = *slot_of.get(&node.var.0).expect("pattern alias always allocated");
                        let ft = FilterTree::Pred {
                            op: CompareOp::Eq,
                            lhs: Expr::Property { slot, prop: prop_id },
                            rhs: Expr::Const(value.clone()),
                        };
                        per_alias_filters
                            .entry(node.var.0.clone())
                            .or_default()
                            .push(ft);
                    }
                }
            }
        }

        let mut bound_aliases: HashSet<String> = carried_names.iter().cloned().collect();
        let mut required_clauses = ast.matches.iter().filter(|m| !m.optional);
        let (mut plan, mut explain) = match required_clauses.next() {
            Some(clause) => {
                let (op, ex, used_seed) = self.plan_match_clause(
                    clause,
                    &slot_of,
                    width,
                    &bound_aliases,
                    &mut per_alias_filters,
                )?;
                mark_bound(clause, &mut bound_aliases);
                match carry {
                    Some((carry_plan, carry_explain, _)) if used_seed => {
                        let ex2 = ExplainNode::new("Apply").with_inputs(vec![carry_explain, ex]);
                        (Op::Apply(Box::new(Apply::new(carry_plan, op))), ex2)
                    }
                    Some((carry_plan, carry_explain, _)) => {
                        let ex2 = ExplainNode::new("CartesianProduct").with_inputs(vec![carry_explain, ex]);
                        (Op::CartesianProduct(Box::new(CartesianProduct::new(carry_plan, op))), ex2)
                    }
                    None => (op, ex),
                }
            }
            None => match carry {
                Some((carry_plan, carry_explain, _)) => (carry_plan, carry_explain),
                None => {
                    let mut seed = Seed::new();
                    seed.set(Record::with_width(width));
                    (Op::Seed(seed), ExplainNode::new("Seed"))
                }
            },
        };

        // A query can name more than one required MATCH clause
        // (`MATCH (a:Person) MATCH (c:Company) RETURN ...`); every clause
        // past the first combines with what's been planned so far. Sharing
        // no alias with what's bound is a CartesianProduct; sharing exactly
        // one is an equi-join on that alias's slot, planned as a
        // ValueHashJoin instead of re-threading the clause through a Seed;
        // sharing more than one falls back to the same Apply/CartesianProduct
        // combinator `plan_match_clause`'s own seeded components use, since a
        // single `Expr::Variable` key can't express a multi-column equality.
        for clause in required_clauses {
            let shared: Vec<String> =
                clause_aliases(clause).into_iter().filter(|a| bound_aliases.contains(a)).collect();

            match shared.as_slice() {
                [] => {
                    let (op, ex, _) =
                        self.plan_match_clause(clause, &slot_of, width, &HashSet::new(), &mut per_alias_filters)?;
                    explain = ExplainNode::new("CartesianProduct").with_inputs(vec![explain, ex]);
                    plan = Op::CartesianProduct(Box::new(CartesianProduct::new(plan, op)));
                }
                [shared_alias] => {
                    let (op, ex, _) =
                        self.plan_match_clause(clause, &slot_of, width, &HashSet::new(), &mut per_alias_filters)?;
                    let key_slot = *slot_of.get(shared_alias).expect("shared alias is allocated a slot");
                    explain = ExplainNode::new("ValueHashJoin").with_inputs(vec![explain, ex]);
                    plan = Op::ValueHashJoin(Box::new(ValueHashJoin::new(
                        Expr::Variable(key_slot),
                        Expr::Variable(key_slot),
                        plan,
                        op,
                    )));
                }
                _ => {
                    let (op, ex, used_seed) =
                        self.plan_match_clause(clause, &slot_of, width, &bound_aliases, &mut per_alias_filters)?;
                    if used_seed {
                        explain = ExplainNode::new("Apply").with_inputs(vec![explain, ex]);
                        plan = Op::Apply(Box::new(Apply::new(plan, op)));
                    } else {
                        explain = ExplainNode::new("CartesianProduct").with_inputs(vec![explain, ex]);
                        plan = Op::CartesianProduct(Box::new(CartesianProduct::new(plan, op)));
                    }
                }
            }
            mark_bound(clause, &mut bound_aliases);
        }

        for clause in ast.matches.iter().filter(|m| m.optional) {
            let (inner, inner_explain, _) =
                self.plan_match_clause(clause, &slot_of, width, &bound_aliases, &mut per_alias_filters)?;
            explain = ExplainNode::new("Optional").with_inputs(vec![explain, inner_explain]);
            plan = Op::Optional(Box::new(Optional::new(plan, inner)));
            mark_bound(clause, &mut bound_aliases);
        }

        // A carried alias not mentioned by this stage's own MATCH patterns
        // never gets a component to push its filter down to (its slot was
        // already written by the previous stage's Carry); apply it as a
        // cross-pattern filter instead of rejecting it as undeclared.
        for name in &carried_names {
            if let Some(filters) = per_alias_filters.remove(name) {
                global_filters.extend(filters);
            }
        }

        if let Some(alias) = per_alias_filters.keys().next() {
            return Err(GraphError::InvalidQuery(format!(
                "WHERE references undeclared alias '{alias}'"
            )));
        }

        if !global_filters.is_empty() {
            let ft = combine_and(global_filters);
            explain = ExplainNode::new("Filter")
                .with_prop("scope", "cross-pattern")
                .with_inputs(vec![explain]);
            plan = Op::Filter(Box::new(Filter::new(ft, plan)));
        }

        if ast.has_aggregates() {
            let items: Vec<GroupItem> = ast
                .projections
                .iter()
                .map(|p| self.projection_to_group_item(p, &slot_of))
                .collect::<Result<_>>()?;
            explain = ExplainNode::new("Group").with_inputs(vec![explain]);
            plan = Op::Group(Box::new(Group::new(items, plan)));

            if !ast.order_by.is_empty() {
                let mut keys = Vec::new();
                for ok in &ast.order_by {
                    if ok.prop.is_some() {
                        return Err(GraphError::InvalidQuery(
                            "ORDER BY cannot access a property after aggregation; order by the returned column instead".into(),
                        ));
                    }
                    let pos = ast
                        .projections
                        .iter()
                        .position(|p| p.output_name() == ok.var.0)
                        .ok_or_else(|| {
                            GraphError::InvalidQuery(format!(
                                "ORDER BY references unknown column '{}'",
                                ok.var.0
                            ))
                        })?;
                    keys.push((Expr::Variable(pos), ok.descending));
                }
                explain = ExplainNode::new("Sort").with_inputs(vec![explain]);
                plan = Op::Sort(Box::new(Sort::new(keys, plan)));
            }

            if ast.distinct {
                explain = ExplainNode::new("Distinct").with_inputs(vec![explain]);
                plan = Op::Distinct(Box::new(Distinct::new(plan)));
            }
        } else {
            if !ast.order_by.is_empty() {
                let mut keys = Vec::new();
                for ok in &ast.order_by {
                    let slot = *slot_of.get(&ok.var.0).ok_or_else(|| {
                        GraphError::InvalidQuery(format!(
                            "ORDER BY references undeclared alias '{}'",
                            ok.var.0
                        ))
                    })?;
                    let expr = match &ok.prop {
                        Some(p) => Expr::Property { slot, prop: self.resolve_prop(p) },
                        None => Expr::Variable(slot),
                    };
                    keys.push((expr, ok.descending));
                }
                explain = ExplainNode::new("Sort").with_inputs(vec![explain]);
                plan = Op::Sort(Box::new(Sort::new(keys, plan)));
            }

            let exprs: Vec<Expr> = ast
                .projections
                .iter()
                .map(|p| self.projection_to_expr(p, &slot_of))
                .collect::<Result<_>>()?;
            explain = ExplainNode::new("Projection").with_inputs(vec![explain]);
            plan = Op::Projection(Box::new(Projection::new(exprs, plan)));

            if ast.distinct {
                explain = ExplainNode::new("Distinct").with_inputs(vec![explain]);
                plan = Op::Distinct(Box::new(Distinct::new(plan)));
            }
        }

        if let Some(n) = ast.skip {
            explain = ExplainNode::new("Skip").with_prop("n", n.to_string()).with_inputs(vec![explain]);
            plan = Op::Skip(Box::new(Skip::new(n, plan)));
        }
        if let Some(n) = ast.limit {
            explain = ExplainNode::new("Limit").with_prop("n", n.to_string()).with_inputs(vec![explain]);
            plan = Op::Limit(Box::new(Limit::new(n, plan)));
        }

        match &ast.then {
            None => Ok((plan, explain)),
            Some(next_ast) => {
                let names: Vec<String> = ast.projections.iter().map(|p| p.output_name()).collect();
                let (next_slot_of, next_width) = Self::allocate_slots(next_ast, &names);
                let mapping: Vec<(usize, usize)> = names
                    .iter()
                    .enumerate()
                    .filter_map(|(i, n)| next_slot_of.get(n).map(|&s| (i, s)))
                    .collect();
                explain = ExplainNode::new("Carry").with_inputs(vec![explain]);
                plan = Op::Carry(Box::new(Carry::new(mapping, next_width, plan)));
                self.plan_stage(next_ast, Some((plan, explain, names)))
            }
        }
    }

    /// One slot per distinct node/edge alias, assigned in first-seen order
    /// across every clause of the query (required and optional alike), plus
    /// one slot per name in `carried` — a previous WITH stage's output
    /// aliases, seeded first so both stages agree on their slot numbers.
    fn allocate_slots(ast: &QueryAst, carried: &[String]) -> (HashMap<String, usize>, usize) {
        let mut slot_of = HashMap::new();
        let mut next = 0usize;
        for name in carried {
            slot_of.entry(name.clone()).or_insert_with(|| {
                let s = next;
                next += 1;
                s
            });
        }
        for clause in &ast.matches {
            for path in &clause.paths {
                for (i, node) in path.nodes.iter().enumerate() {
                    slot_of.entry(node.var.0.clone()).or_insert_with(|| {
                        let s = next;
                        next += 1;
                        s
                    });
                    if i < path.edges.len() {
                        if let Some(v) = &path.edges[i].var {
                            slot_of.entry(v.0.clone()).or_insert_with(|| {
                                let s = next;
                                next += 1;
                                s
                            });
                        }
                    }
                }
            }
        }
        (slot_of, next)
    }

    /// Builds one clause's plan: one left-deep spine per connected component
    /// of its query graph, combined with [`CartesianProduct`]. A component
    /// whose root alias is already bound by an earlier clause starts from a
    /// [`Seed`] leaf instead of a scan, so [`Optional`] can re-anchor it to
    /// the outer record.
    fn plan_match_clause(
        &self,
        clause: &MatchClause,
        slot_of: &HashMap<String, usize>,
        width: usize,
        bound_aliases: &HashSet<String>,
        per_alias_filters: &mut HashMap<String, Vec<FilterTree>>,
    ) -> Result<(Op, ExplainNode, bool)> {
        let qg = QueryGraph::from_match_clause(
            clause,
            |name| self.graph.catalog().resolve_label(name),
            |name| self.graph.catalog().resolve_type(name),
        );

        if qg.nodes.is_empty() {
            let mut seed = Seed::new();
            seed.set(Record::with_width(width));
            return Ok((Op::Seed(seed), ExplainNode::new("Seed"), false));
        }

        let mut visited: BTreeSet<usize> = BTreeSet::new();
        let mut components: Vec<(Op, ExplainNode)> = Vec::new();
        let mut any_seed_used = false;

        loop {
            let next_root = (0..qg.nodes.len())
                .filter(|i| !visited.contains(i))
                .find(|i| bound_aliases.contains(&qg.nodes[*i].alias))
                .or_else(|| (0..qg.nodes.len()).find(|i| !visited.contains(i)));
            let Some(root) = next_root else { break };

            let use_seed = bound_aliases.contains(&qg.nodes[root].alias);
            any_seed_used |= use_seed;
            let (op, explain, bound) =
                self.plan_component(&qg, root, use_seed, slot_of, width, per_alias_filters)?;
            visited.extend(bound);
            components.push((op, explain));
        }

        let mut iter = components.into_iter();
        let (mut plan, mut explain) = iter.next().expect("non-empty query graph has at least one component");
        for (op, ex) in iter {
            explain = ExplainNode::new("CartesianProduct").with_inputs(vec![explain, ex]);
            plan = Op::CartesianProduct(Box::new(CartesianProduct::new(plan, op)));
        }

        Ok((plan, explain, any_seed_used))
    }

    /// Builds one connected component: a leaf (scan or seed) followed by a
    /// traverse per spanning-tree edge, with single-alias filters applied
    /// immediately after that alias's slot is first bound, and back-edges
    /// from [`QueryGraph::spanning_tree`] applied as trailing `EdgeCheck`
    /// filters once every alias in the component is bound.
    fn plan_component(
        &self,
        qg: &QueryGraph,
        root: usize,
        use_seed: bool,
        slot_of: &HashMap<String, usize>,
        width: usize,
        per_alias_filters: &mut HashMap<String, Vec<FilterTree>>,
    ) -> Result<(Op, ExplainNode, Vec<usize>)> {
        let root_node = &qg.nodes[root];
        let root_slot = slot_of[&root_node.alias];

        let (mut plan, mut explain) = if use_seed {
            (Op::Seed(Seed::new()), ExplainNode::new("Seed").with_prop("alias", root_node.alias.clone()))
        } else {
            self.build_scan_or_index(root_node, root_slot, width, per_alias_filters)
        };
        (plan, explain) = self.apply_alias_filters(plan, explain, &root_node.alias, per_alias_filters);

        let (tree_edges, back_edges) = qg.spanning_tree(root);
        let mut bound: HashSet<usize> = HashSet::new();
        bound.insert(root);

        for &eid in &tree_edges {
            let edge = &qg.edges[eid];
            let (from, to) = if bound.contains(&edge.src) {
                (edge.src, edge.dest)
            } else {
                (edge.dest, edge.src)
            };
            let effective_direction = if matches!(edge.direction, Direction::Both) {
                Direction::Both
            } else if from == edge.src {
                Direction::Out
            } else {
                Direction::In
            };

            let src_slot = slot_of[&qg.nodes[from].alias];
            let dst_slot = slot_of[&qg.nodes[to].alias];
            let dst_node = &qg.nodes[to];
            let dst_label = self.resolved_label(dst_node);
            let edge_slot = edge.alias.as_ref().map(|a| slot_of[a]);
            let rel_types = self.resolved_rel_types(edge);

            if edge.is_variable_length() {
                let op = ConditionalVarLenTraverse::new(
                    src_slot,
                    dst_slot,
                    rel_types,
                    effective_direction,
                    dst_label,
                    edge.min_hops,
                    edge.max_hops,
                    width,
                    plan,
                );
                explain = ExplainNode::new("ConditionalVarLenTraverse")
                    .with_prop("hops", format!("{}..{}", edge.min_hops, edge.max_hops.map(|h| h.to_string()).unwrap_or_else(|| "inf".into())))
                    .with_inputs(vec![explain]);
                plan = Op::ConditionalVarLenTraverse(op);
            } else if self.config.enable_expand_fast_path
                && rel_types.len() == 1
                && matches!(effective_direction, Direction::Out)
                && dst_label.is_none()
            {
                let op = Expand::new(src_slot, dst_slot, edge_slot, rel_types[0], width, plan);
                explain = ExplainNode::new("Expand").with_inputs(vec![explain]);
                plan = Op::Expand(op);
            } else {
                let op = ConditionalTraverse::new(
                    src_slot,
                    dst_slot,
                    edge_slot,
                    rel_types,
                    effective_direction,
                    None,
                    dst_label,
                    width,
                    plan,
                );
                explain = ExplainNode::new("ConditionalTraverse").with_inputs(vec![explain]);
                plan = Op::ConditionalTraverse(op);
            }

            bound.insert(to);
            let dest_alias = qg.nodes[to].alias.clone();
            (plan, explain) = self.apply_alias_filters(plan, explain, &dest_alias, per_alias_filters);
            if let Some(alias) = &edge.alias {
                (plan, explain) = self.apply_alias_filters(plan, explain, alias, per_alias_filters);
            }
        }

        for &eid in &back_edges {
            let edge = &qg.edges[eid];
            let src_slot = slot_of[&qg.nodes[edge.src].alias];
            let dst_slot = slot_of[&qg.nodes[edge.dest].alias];
            let rel_types = self.resolved_rel_types(edge);
            let direction = if matches!(edge.direction, Direction::Both) {
                Direction::Both
            } else {
                Direction::Out
            };
            let ft = FilterTree::EdgeCheck {
                src_slot,
                dest_slot: dst_slot,
                rel_types,
                direction,
            };
            explain = ExplainNode::new("Filter")
                .with_prop("scope", "cycle-edge-check")
                .with_inputs(vec![explain]);
            plan = Op::Filter(Box::new(Filter::new(ft, plan)));
        }

        Ok((plan, explain, bound.into_iter().collect()))
    }

    fn apply_alias_filters(
        &self,
        mut plan: Op,
        mut explain: ExplainNode,
        alias: &str,
        per_alias_filters: &mut HashMap<String, Vec<FilterTree>>,
    ) -> (Op, ExplainNode) {
        if let Some(filters) = per_alias_filters.remove(alias) {
            let ft = combine_and(filters);
            explain = ExplainNode::new("Filter")
                .with_prop("alias", alias.to_string())
                .with_inputs(vec![explain]);
            plan = Op::Filter(Box::new(Filter::new(ft, plan)));
        }
        (plan, explain)
    }

    /// Builds the root scan for a component, first trying to reduce it plus
    /// its pending single-alias filters to an [`crate::operator::IndexScan`]
    /// via [`optimizer::try_index_scan`]; falls back to an ordinary
    /// label/all-node scan when there's no usable index or no label at all.
    fn build_scan_or_index(
        &self,
        node: &QgNode,
        slot: usize,
        width: usize,
        per_alias_filters: &mut HashMap<String, Vec<FilterTree>>,
    ) -> (Op, ExplainNode) {
        if let (Some(label), Some(name)) = (&node.label, &node.label_name) {
            if let Some(filters) = per_alias_filters.get(&node.alias) {
                if let Some((op, leftover)) =
                    optimizer::try_index_scan(self.graph, *label, name, slot, width, filters)
                {
                    if leftover.is_empty() {
                        per_alias_filters.remove(&node.alias);
                    } else {
                        per_alias_filters.insert(node.alias.clone(), leftover);
                    }
                    let ex = ExplainNode::new("IndexScan").with_prop("label", name.clone());
                    return (op, ex);
                }
            }
        }
        self.build_scan(node, slot, width)
    }

    fn build_scan(&self, node: &QgNode, slot: usize, width: usize) -> (Op, ExplainNode) {
        match (&node.label, &node.label_name) {
            (Some(label), Some(name)) => {
                let op = NodeByLabelScan::new(*label, name.clone(), slot, width);
                let ex = ExplainNode::new("NodeByLabelScan").with_prop("label", name.clone());
                (Op::NodeByLabelScan(op), ex)
            }
            (None, Some(name)) => {
                let op = NodeByLabelScan::new(LabelId(UNRESOLVED), name.clone(), slot, width);
                let ex = ExplainNode::new("NodeByLabelScan").with_prop("label", format!("{name} (unresolved)"));
                (Op::NodeByLabelScan(op), ex)
            }
            (_, None) => {
                let op = AllNodeScan::new(slot, width);
                (Op::AllNodeScan(op), ExplainNode::new("AllNodeScan"))
            }
        }
    }

    fn resolved_label(&self, node: &QgNode) -> Option<LabelId> {
        match (&node.label, &node.label_name) {
            (Some(l), _) => Some(*l),
            (None, Some(_)) => Some(LabelId(UNRESOLVED)),
            (None, None) => None,
        }
    }

    /// An empty `rel_type_names` means "any relationship type" (the
    /// [`crate::algebra::build_edge_expression`] convention); named types that
    /// all failed to resolve must NOT fall back to that same convention, so a
    /// single sentinel id is substituted, which resolves to an empty matrix.
    fn resolved_rel_types(&self, edge: &QgEdge) -> Vec<TypeId> {
        if edge.rel_type_names.is_empty() {
            Vec::new()
        } else if edge.rel_types.is_empty() {
            vec![TypeId(UNRESOLVED)]
        } else {
            edge.rel_types.clone()
        }
    }

    fn resolve_prop(&self, name: &str) -> PropId {
        self.graph
            .catalog()
            .resolve_prop(name)
            .unwrap_or(PropId(UNRESOLVED))
    }

    fn predicate_to_filter_tree(
        &self,
        pred: &Predicate,
        slot_of: &HashMap<String, usize>,
    ) -> Result<FilterTree> {
        match pred {
            Predicate::Compare { var, prop, op, value } => {
                let slot = *slot_of.get(&var.0).ok_or_else(|| {
                    GraphError::InvalidQuery(format!("WHERE references undeclared alias '{}'", var.0))
                })?;
                Ok(FilterTree::Pred {
                    op: *op,
                    lhs: Expr::Property { slot, prop: self.resolve_prop(prop) },
                    rhs: Expr::Const(value.clone()),
                })
            }
            Predicate::And(ps) => Ok(FilterTree::And(
                ps.iter()
                    .map(|p| self.predicate_to_filter_tree(p, slot_of))
                    .collect::<Result<_>>()?,
            )),
            Predicate::Or(ps) => Ok(FilterTree::Or(
                ps.iter()
                    .map(|p| self.predicate_to_filter_tree(p, slot_of))
                    .collect::<Result<_>>()?,
            )),
            Predicate::Not(p) => Ok(FilterTree::Not(Box::new(self.predicate_to_filter_tree(p, slot_of)?))),
        }
    }

    fn projection_to_expr(&self, item: &ProjectionItem, slot_of: &HashMap<String, usize>) -> Result<Expr> {
        match item {
            ProjectionItem::Var { var, .. } => {
                let slot = *slot_of.get(&var.0).ok_or_else(|| {
                    GraphError::InvalidQuery(format!("RETURN references undeclared alias '{}'", var.0))
                })?;
                Ok(Expr::Variable(slot))
            }
            ProjectionItem::Prop { var, prop, .. } => {
                let slot = *slot_of.get(&var.0).ok_or_else(|| {
                    GraphError::InvalidQuery(format!("RETURN references undeclared alias '{}'", var.0))
                })?;
                Ok(Expr::Property { slot, prop: self.resolve_prop(prop) })
            }
            ProjectionItem::Agg { .. } => Err(GraphError::Internal(
                "aggregate projection item reached the non-aggregate projection path".into(),
            )),
        }
    }

    fn projection_to_group_item(
        &self,
        item: &ProjectionItem,
        slot_of: &HashMap<String, usize>,
    ) -> Result<GroupItem> {
        match item {
            ProjectionItem::Agg { func, var, prop, .. } => {
                let arg = if *func == AggregateFn::Count && var.0 == "*" {
                    None
                } else {
                    let slot = *slot_of.get(&var.0).ok_or_else(|| {
                        GraphError::InvalidQuery(format!(
                            "aggregate references undeclared alias '{}'",
                            var.0
                        ))
                    })?;
                    Some(match prop {
                        Some(p) => Expr::Property { slot, prop: self.resolve_prop(p) },
                        None => Expr::Variable(slot),
                    })
                };
                Ok(GroupItem::Agg(*func, arg))
            }
            ProjectionItem::Var { var, .. } => {
                let slot = *slot_of.get(&var.0).ok_or_else(|| {
                    GraphError::InvalidQuery(format!("RETURN references undeclared alias '{}'", var.0))
                })?;
                Ok(GroupItem::Key(Expr::Variable(slot)))
            }
            ProjectionItem::Prop { var, prop, .. } => {
                let slot = *slot_of.get(&var.0).ok_or_else(|| {
                    GraphError::InvalidQuery(format!("RETURN references undeclared alias '{}'", var.0))
                })?;
                Ok(GroupItem::Key(Expr::Property { slot, prop: self.resolve_prop(prop) }))
            }
        }
    }
}

fn mark_bound(clause: &MatchClause, bound_aliases: &mut HashSet<String>) {
    for path in &clause.paths {
        for node in &path.nodes {
            bound_aliases.insert(node.var.0.clone());
        }
        for edge in &path.edges {
            if let Some(v) = &edge.var {
                bound_aliases.insert(v.0.clone());
            }
        }
    }
}

fn clause_aliases(clause: &MatchClause) -> HashSet<String> {
    let mut set = HashSet::new();
    mark_bound(clause, &mut set);
    set
}

fn flatten_and(pred: &Predicate) -> Vec<&Predicate> {
    match pred {
        Predicate::And(ps) => ps.iter().collect(),
        other => vec![other],
    }
}

fn collect_predicate_vars(pred: &Predicate, out: &mut HashSet<String>) {
    match pred {
        Predicate::Compare { var, .. } => {
            out.insert(var.0.clone());
        }
        Predicate::And(ps) | Predicate::Or(ps) => {
            for p in ps {
                collect_predicate_vars(p, out);
            }
        }
        Predicate::Not(p) => collect_predicate_vars(p, out),
    }
}

fn combine_and(mut filters: Vec<FilterTree>) -> FilterTree {
    if filters.len() == 1 {
        filters.pop().unwrap()
    } else {
        FilterTree::And(filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompareOp, Direction};
    use crate::builder::QueryBuilder;
    use crate::graph::Graph;

    fn sample_graph() -> Graph {
        let mut g = Graph::new();
        g.ensure_label("Person");
        g.ensure_type("KNOWS");

        let alice = g.add_node(&["Person"], vec![("name", "Alice".into())]);
        let bob = g.add_node(&["Person"], vec![("name", "Bob".into()), ("age", 30i64.into())]);
        g.add_edge(alice, bob, "KNOWS", vec![]).expect("endpoints exist");
        g
    }

    #[test]
    fn plans_single_hop_match_as_scan_then_traverse() {
        let graph = sample_graph();
        let ast = QueryBuilder::new()
            .r#match()
            .node("a", Some("Person"))
            .edge(Direction::Out, Some("KNOWS"))
            .node("b", Some("Person"))
            .r#return_prop("b", "name", None)
            .build();

        let planner = Planner::new(&graph, PlannerConfig::default());
        let out = planner.plan(&ast).expect("plans");
        let rendered = out.explain.root.render();
        assert!(rendered.contains("Projection"));
        assert!(rendered.contains("Expand") || rendered.contains("ConditionalTraverse"));
        assert!(rendered.contains("NodeByLabelScan"));
    }

    #[test]
    fn pushes_single_alias_predicate_down_to_its_scan() {
        let graph = sample_graph();
        let ast = QueryBuilder::new()
            .r#match()
            .node("p", Some("Person"))
            .compare("p", "age", CompareOp::Gt, 18i64)
            .r#return_var("p", None)
            .build();

        let planner = Planner::new(&graph, PlannerConfig::default());
        let out = planner.plan(&ast).expect("plans");
        let rendered = out.explain.root.render();
        // The Filter must sit directly above the scan, below the Projection.
        let filter_pos = rendered.find("Filter").expect("filter present");
        let scan_pos = rendered.find("NodeByLabelScan").expect("scan present");
        let proj_pos = rendered.find("Projection").expect("projection present");
        assert!(proj_pos < filter_pos && filter_pos < scan_pos);
    }

    #[test]
    fn aggregate_query_builds_group_without_separate_projection() {
        let graph = sample_graph();
        let ast = QueryBuilder::new()
            .r#match()
            .node("p", Some("Person"))
            .r#return_agg(AggregateFn::Count, "p", None, "c")
            .build();

        let planner = Planner::new(&graph, PlannerConfig::default());
        let out = planner.plan(&ast).expect("plans");
        let rendered = out.explain.root.render();
        assert!(rendered.contains("Group"));
        assert!(!rendered.contains("Projection"));
    }

    #[test]
    fn optional_match_wraps_with_optional_operator() {
        let graph = sample_graph();
        let ast = QueryBuilder::new()
            .r#match()
            .node("a", Some("Person"))
            .optional_match()
            .node("a", None)
            .edge(Direction::Out, Some("KNOWS"))
            .node("b", None)
            .r#return_var("a", None)
            .build();

        let planner = Planner::new(&graph, PlannerConfig::default());
        let out = planner.plan(&ast).expect("plans");
        let rendered = out.explain.root.render();
        assert!(rendered.contains("Optional"));
        assert!(rendered.contains("Seed"));
    }

    #[test]
    fn undeclared_where_alias_is_rejected() {
        let graph = sample_graph();
        let mut ast = QueryBuilder::new()
            .r#match()
            .node("p", Some("Person"))
            .r#return_var("p", None)
            .build();
        ast.where_predicate = Some(Predicate::Compare {
            var: crate::ast::Var::new("ghost"),
            prop: "age".into(),
            op: CompareOp::Gt,
            value: 1i64.into(),
        });

        let planner = Planner::new(&graph, PlannerConfig::default());
        assert!(planner.plan(&ast).is_err());
    }
}
