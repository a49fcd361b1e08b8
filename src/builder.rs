//! Fluent, programmatic query construction — the in-process substitute for a
//! textual Cypher parser front-end (see [`crate::ast`]).

use crate::ast::{
    AggregateFn, CompareOp, Direction, EdgePattern, MatchClause, NodePattern, OrderKey,
    PathPattern, Predicate, ProjectionItem, QueryAst, Var,
};
use crate::value::Value;

/// Builds a [`QueryAst`] one clause at a time.
#[derive(Default)]
pub struct QueryBuilder {
    ast: QueryAst,
    current_path: PathPattern,
    /// Whether the path currently being built belongs to an OPTIONAL MATCH,
    /// set by [`Self::r#match`]/[`Self::optional_match`] and read back by
    /// [`Self::flush_path`] when that path is closed off.
    current_optional: bool,
    /// Set by [`Self::r#match`]/[`Self::optional_match`]: the next path
    /// flushed always opens a fresh clause instead of folding into the last
    /// one, so two clauses of the same optionality (`MATCH (a) MATCH (b)`)
    /// stay distinct rather than being read back as one comma-separated
    /// pattern.
    pending_new_clause: bool,
    pending_direction: Direction,
    pending_rel_types: Vec<String>,
    pending_hops: (u32, Option<u32>),
    /// Stages closed off by [`Self::with_done`], oldest first; [`Self::build`]
    /// wires each onto the next via `QueryAst::then`.
    stage_stack: Vec<QueryAst>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self {
            pending_direction: Direction::Out,
            pending_hops: (1, Some(1)),
            ..Default::default()
        }
    }

    /// Starts a new MATCH clause. Call [`Self::path_done`] (implicitly done by
    /// `r#return`) to close the current path.
    pub fn r#match(mut self) -> Self {
        self.flush_path();
        self.current_optional = false;
        self.pending_new_clause = true;
        self
    }

    /// Starts a new OPTIONAL MATCH clause.
    pub fn optional_match(mut self) -> Self {
        self.flush_path();
        self.current_optional = true;
        self.pending_new_clause = true;
        self
    }

    /// Closes off the path accumulated since the last flush, if any, folding
    /// it into the current clause unless a `r#match`/`optional_match` call
    /// since the last flush means it must open a new one instead.
    fn flush_path(&mut self) {
        if self.current_path.nodes.is_empty() {
            return;
        }
        let path = std::mem::take(&mut self.current_path);
        if !self.pending_new_clause {
            if let Some(last) = self.ast.matches.last_mut() {
                last.paths.push(path);
                return;
            }
        }
        self.ast.matches.push(MatchClause {
            paths: vec![path],
            optional: self.current_optional,
        });
        self.pending_new_clause = false;
    }

    /// Adds a node to the current path: `(var:label)`.
    pub fn node(mut self, var: impl Into<String>, label: Option<&str>) -> Self {
        let var = Var(var.into());
        let mut pattern = NodePattern::new(var);
        pattern.label = label.map(|l| l.to_owned());
        self.current_path.nodes.push(pattern);
        self
    }

    /// Adds a node with inline property equality constraints.
    pub fn node_with_props(
        mut self,
        var: impl Into<String>,
        label: Option<&str>,
        props: Vec<(&str, Value)>,
    ) -> Self {
        let var = Var(var.into());
        let mut pattern = NodePattern::new(var);
        pattern.label = label.map(|l| l.to_owned());
        pattern.inline_props = props.into_iter().map(|(k, v)| (k.to_owned(), v)).collect();
        self.current_path.nodes.push(pattern);
        self
    }

    /// Sets the direction, relationship-type filter, and hop bounds of the
    /// next edge to be closed by the following `node(...)` call.
    pub fn edge(mut self, direction: Direction, rel_type: Option<&str>) -> Self {
        self.pending_direction = direction;
        self.pending_rel_types = rel_type.map(|t| vec![t.to_owned()]).unwrap_or_default();
        self.pending_hops = (1, Some(1));
        self.close_pending_edge();
        self
    }

    /// Variable-length edge: `[r*lo..hi]`; `hi = None` means unbounded.
    pub fn edge_var_len(
        mut self,
        direction: Direction,
        rel_type: Option<&str>,
        lo: u32,
        hi: Option<u32>,
    ) -> Self {
        self.pending_direction = direction;
        self.pending_rel_types = rel_type.map(|t| vec![t.to_owned()]).unwrap_or_default();
        self.pending_hops = (lo, hi);
        self.close_pending_edge();
        self
    }

    fn close_pending_edge(&mut self) {
        let mut edge = EdgePattern::new(self.pending_direction);
        edge.rel_types = std::mem::take(&mut self.pending_rel_types);
        edge.min_hops = self.pending_hops.0;
        edge.max_hops = self.pending_hops.1;
        self.current_path.edges.push(edge);
    }

    /// Adds a WHERE predicate, ANDed with any predicate already present.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.ast.where_predicate = Some(match self.ast.where_predicate.take() {
            None => predicate,
            Some(Predicate::And(mut existing)) => {
                existing.push(predicate);
                Predicate::And(existing)
            }
            Some(existing) => Predicate::And(vec![existing, predicate]),
        });
        self
    }

    /// Convenience: `var.prop OP literal`.
    pub fn compare(
        self,
        var: impl Into<String>,
        prop: impl Into<String>,
        op: CompareOp,
        value: impl Into<Value>,
    ) -> Self {
        self.filter(Predicate::Compare {
            var: Var(var.into()),
            prop: prop.into(),
            op,
            value: value.into(),
        })
    }

    pub fn distinct(mut self) -> Self {
        self.ast.distinct = true;
        self
    }

    pub fn order_by(mut self, var: impl Into<String>, prop: Option<&str>, descending: bool) -> Self {
        self.ast.order_by.push(OrderKey {
            var: Var(var.into()),
            prop: prop.map(|p| p.to_owned()),
            descending,
        });
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.ast.skip = Some(n);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.ast.limit = Some(n);
        self
    }

    /// Projects a bare variable: `RETURN a`.
    pub fn r#return_var(mut self, var: impl Into<String>, alias: Option<&str>) -> Self {
        self.flush_path();
        self.ast.projections.push(ProjectionItem::Var {
            var: Var(var.into()),
            alias: alias.map(|a| a.to_owned()),
        });
        self
    }

    /// Projects a property: `RETURN a.name`.
    pub fn r#return_prop(
        mut self,
        var: impl Into<String>,
        prop: impl Into<String>,
        alias: Option<&str>,
    ) -> Self {
        self.flush_path();
        self.ast.projections.push(ProjectionItem::Prop {
            var: Var(var.into()),
            prop: prop.into(),
            alias: alias.map(|a| a.to_owned()),
        });
        self
    }

    /// Projects an aggregate: `RETURN count(a)`.
    pub fn r#return_agg(
        mut self,
        func: AggregateFn,
        var: impl Into<String>,
        prop: Option<&str>,
        alias: impl Into<String>,
    ) -> Self {
        self.flush_path();
        self.ast.projections.push(ProjectionItem::Agg {
            func,
            var: Var(var.into()),
            prop: prop.map(|p| p.to_owned()),
            alias: alias.into(),
        });
        self
    }

    /// Projects a bare variable into a WITH clause: `WITH a`.
    pub fn with_var(mut self, var: impl Into<String>, alias: Option<&str>) -> Self {
        self.flush_path();
        self.ast.projections.push(ProjectionItem::Var {
            var: Var(var.into()),
            alias: alias.map(|a| a.to_owned()),
        });
        self
    }

    /// Projects a property into a WITH clause: `WITH a.name AS n`.
    pub fn with_prop(
        mut self,
        var: impl Into<String>,
        prop: impl Into<String>,
        alias: Option<&str>,
    ) -> Self {
        self.flush_path();
        self.ast.projections.push(ProjectionItem::Prop {
            var: Var(var.into()),
            prop: prop.into(),
            alias: alias.map(|a| a.to_owned()),
        });
        self
    }

    /// Projects an aggregate into a WITH clause: `WITH count(a) AS c`.
    pub fn with_agg(
        mut self,
        func: AggregateFn,
        var: impl Into<String>,
        prop: Option<&str>,
        alias: impl Into<String>,
    ) -> Self {
        self.flush_path();
        self.ast.projections.push(ProjectionItem::Agg {
            func,
            var: Var(var.into()),
            prop: prop.map(|p| p.to_owned()),
            alias: alias.into(),
        });
        self
    }

    /// Closes the WITH stage accumulated so far and starts a fresh one,
    /// which may open its own MATCH/OPTIONAL MATCH clauses and either end in
    /// RETURN or be closed by a further `with_done`.
    pub fn with_done(mut self) -> Self {
        self.flush_path();
        let finished = std::mem::take(&mut self.ast);
        self.stage_stack.push(finished);
        self
    }

    /// Finalizes the builder, flushing any in-progress path and wiring every
    /// WITH stage onto the next via `QueryAst::then`.
    pub fn build(mut self) -> QueryAst {
        self.flush_path();
        let mut ast = self.ast;
        while let Some(mut prev) = self.stage_stack.pop() {
            prev.then = Some(Box::new(ast));
            ast = prev;
        }
        ast
    }
}

/// Generates synthetic variable names (`a, b, ..., z, a1, b1, ...`) for
/// anonymous pattern slots introduced by the planner.
pub(crate) fn auto_var_name(idx: usize) -> String {
    const FIRST: u8 = b'a';
    let letter = (FIRST + (idx as u8 % 26)) as char;
    if idx < 26 {
        letter.to_string()
    } else {
        format!("{}{}", letter, idx / 26)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_constructs_single_hop_pattern() {
        let ast = QueryBuilder::new()
            .r#match()
            .node("a", Some("P"))
            .edge(Direction::Out, Some("KNOWS"))
            .node("b", Some("P"))
            .r#return_prop("a", "name", None)
            .build();

        assert_eq!(ast.matches.len(), 1);
        let path = &ast.matches[0].paths[0];
        assert_eq!(path.nodes.len(), 2);
        assert_eq!(path.edges.len(), 1);
        assert_eq!(ast.projections.len(), 1);
    }

    #[test]
    fn builder_collects_and_predicate() {
        let ast = QueryBuilder::new()
            .r#match()
            .node("p", Some("P"))
            .compare("p", "age", CompareOp::Gt, 28i64)
            .r#return_prop("p", "name", None)
            .build();
        assert!(matches!(
            ast.where_predicate,
            Some(Predicate::Compare { .. })
        ));
    }

    #[test]
    fn builder_marks_optional_match() {
        let ast = QueryBuilder::new()
            .r#match()
            .node("a", Some("P"))
            .optional_match()
            .node("a", None)
            .edge(Direction::Out, Some("KNOWS"))
            .node("b", None)
            .r#return_var("a", None)
            .build();
        assert_eq!(ast.matches.len(), 2);
        assert!(ast.matches[1].optional);
    }
}
