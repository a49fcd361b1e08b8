//! Query graph (`QG`): the alias-resolved, cycle-broken view of a MATCH
//! clause's path patterns that the algebraic-expression builder walks.
//!
//! A [`QueryAst`] path pattern is a textual sequence of node/edge slots; the
//! query graph turns that into a small typed graph of aliases with one
//! [`QgNode`] per distinct variable and one [`QgEdge`] per pattern edge, ready
//! for [`crate::algebra`] to turn into algebraic expressions. Patterns are
//! allowed to describe cycles (`(a)-->(b)-->(a)`); since algebraic expression
//! construction walks a spanning tree from a root, cycle edges are filtered
//! out of the spanning walk and re-attached as post-hoc filters instead.

use rustc_hash::FxHashMap;

use crate::ast::{Direction, MatchClause, PathPattern};
use crate::model::{LabelId, TypeId};

/// A resolved node slot: its alias index and optional label constraint.
#[derive(Clone, Debug)]
pub struct QgNode {
    pub alias: String,
    pub label: Option<LabelId>,
    pub label_name: Option<String>,
}

/// A resolved edge slot between two [`QgNode`] aliases.
#[derive(Clone, Debug)]
pub struct QgEdge {
    pub alias: Option<String>,
    pub src: usize,
    pub dest: usize,
    pub rel_types: Vec<TypeId>,
    pub rel_type_names: Vec<String>,
    pub direction: Direction,
    pub min_hops: u32,
    pub max_hops: Option<u32>,
}

impl QgEdge {
    pub fn is_variable_length(&self) -> bool {
        self.max_hops != Some(self.min_hops)
    }
}

/// A small directed multigraph over the aliases bound by one or more
/// (possibly disconnected) path patterns within a single MATCH clause.
#[derive(Clone, Debug, Default)]
pub struct QueryGraph {
    pub nodes: Vec<QgNode>,
    pub edges: Vec<QgEdge>,
    alias_index: FxHashMap<String, usize>,
}

impl QueryGraph {
    /// Builds a query graph from a MATCH clause's path patterns, given a
    /// catalog lookup for resolving label/relationship-type names to ids
    /// (unresolved names simply leave the id field `None`/empty, which the
    /// planner treats as "matches nothing yet materialized").
    pub fn from_match_clause(
        clause: &MatchClause,
        resolve_label: impl Fn(&str) -> Option<LabelId>,
        resolve_type: impl Fn(&str) -> Option<TypeId>,
    ) -> Self {
        let mut qg = QueryGraph::default();
        for path in &clause.paths {
            qg.absorb_path(path, &resolve_label, &resolve_type);
        }
        qg
    }

    fn node_index(&mut self, alias: &str) -> usize {
        if let Some(&idx) = self.alias_index.get(alias) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(QgNode {
            alias: alias.to_owned(),
            label: None,
            label_name: None,
        });
        self.alias_index.insert(alias.to_owned(), idx);
        idx
    }

    fn absorb_path(
        &mut self,
        path: &PathPattern,
        resolve_label: &impl Fn(&str) -> Option<LabelId>,
        resolve_type: &impl Fn(&str) -> Option<TypeId>,
    ) {
        for (i, node) in path.nodes.iter().enumerate() {
            let idx = self.node_index(&node.var.0);
            if let Some(label) = &node.label {
                self.nodes[idx].label_name = Some(label.clone());
                self.nodes[idx].label = resolve_label(label);
            }
            if i < path.edges.len() {
                let edge = &path.edges[i];
                let dest = self.node_index(&path.nodes[i + 1].var.0);
                let (src, dest) = match edge.direction {
                    Direction::In => (dest, idx),
                    _ => (idx, dest),
                };
                let rel_type_names = edge.rel_types.clone();
                let rel_types = rel_type_names
                    .iter()
                    .filter_map(|name| resolve_type(name))
                    .collect();
                self.edges.push(QgEdge {
                    alias: edge.var.as_ref().map(|v| v.0.clone()),
                    src,
                    dest,
                    rel_types,
                    rel_type_names,
                    direction: edge.direction,
                    min_hops: edge.min_hops,
                    max_hops: edge.max_hops,
                });
            }
        }
    }

    pub fn alias_of(&self, idx: usize) -> &str {
        &self.nodes[idx].alias
    }

    pub fn index_of(&self, alias: &str) -> Option<usize> {
        self.alias_index.get(alias).copied()
    }

    /// Picks a spanning tree rooted at `root` via DFS, returning the edges
    /// that participate in the tree (in visitation order) and the edges left
    /// over as cycle-closing back-edges. The algebraic-expression builder
    /// walks only the spanning edges; back-edges become post-join filters
    /// (`src-side id = dest-side id` equality checks).
    pub fn spanning_tree(&self, root: usize) -> (Vec<usize>, Vec<usize>) {
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (eid, edge) in self.edges.iter().enumerate() {
            adjacency[edge.src].push(eid);
            adjacency[edge.dest].push(eid);
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut tree_edges = Vec::new();
        let mut back_edges = Vec::new();
        let mut edge_used = vec![false; self.edges.len()];
        let mut stack = vec![root];
        visited[root] = true;

        while let Some(node) = stack.pop() {
            for &eid in &adjacency[node] {
                if edge_used[eid] {
                    continue;
                }
                let edge = &self.edges[eid];
                let other = if edge.src == node { edge.dest } else { edge.src };
                edge_used[eid] = true;
                if visited[other] {
                    back_edges.push(eid);
                } else {
                    visited[other] = true;
                    tree_edges.push(eid);
                    stack.push(other);
                }
            }
        }
        (tree_edges, back_edges)
    }

    /// Picks a default root: the first node with an edge, falling back to
    /// node 0 for a single isolated node.
    pub fn default_root(&self) -> usize {
        self.edges.first().map(|e| e.src).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{EdgePattern, NodePattern, Var};

    fn linear_path(vars: &[&str]) -> PathPattern {
        let mut path = PathPattern::default();
        for (i, v) in vars.iter().enumerate() {
            path.nodes.push(NodePattern::new(Var::new(*v)));
            if i + 1 < vars.len() {
                path.edges.push(EdgePattern::new(Direction::Out));
            }
        }
        path
    }

    #[test]
    fn absorbs_linear_path_into_nodes_and_edges() {
        let clause = MatchClause {
            paths: vec![linear_path(&["a", "b", "c"])],
            optional: false,
        };
        let qg = QueryGraph::from_match_clause(&clause, |_| None, |_| None);
        assert_eq!(qg.nodes.len(), 3);
        assert_eq!(qg.edges.len(), 2);
        assert_eq!(qg.edges[0].src, qg.index_of("a").unwrap());
        assert_eq!(qg.edges[0].dest, qg.index_of("b").unwrap());
    }

    #[test]
    fn spanning_tree_detects_cycle_back_edge() {
        // a -> b -> c -> a
        let mut path = linear_path(&["a", "b", "c"]);
        path.edges.push(EdgePattern::new(Direction::Out));
        path.nodes.push(NodePattern::new(Var::new("a")));
        let clause = MatchClause {
            paths: vec![path],
            optional: false,
        };
        let qg = QueryGraph::from_match_clause(&clause, |_| None, |_| None);
        assert_eq!(qg.nodes.len(), 3); // "a" reused, not duplicated

        let root = qg.default_root();
        let (tree, back) = qg.spanning_tree(root);
        assert_eq!(tree.len(), 2);
        assert_eq!(back.len(), 1);
    }

    #[test]
    fn reused_alias_shares_single_node_slot() {
        let clause = MatchClause {
            paths: vec![linear_path(&["a", "b"]), linear_path(&["b", "c"])],
            optional: false,
        };
        let qg = QueryGraph::from_match_clause(&clause, |_| None, |_| None);
        assert_eq!(qg.nodes.len(), 3);
        assert_eq!(qg.edges.len(), 2);
    }
}
