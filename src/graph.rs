//! The property graph: dense node storage, an edge table, the name catalog
//! that resolves labels/relationship-types/property-keys to the small
//! integer ids used as adjacency/diagonal matrix indices, and the adjacency
//! and label matrices themselves ([`crate::matrix`]).
//!
//! A [`Graph`] is the thing a query plan reads from. Mutation (`add_node`,
//! `add_edge`, property/index maintenance) lives here too, since the query
//! algebra's operands — `A_T` and `L_L` — must stay consistent with the
//! entity tables as the graph changes.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use crate::error::{GraphError, Result};
use crate::index::PropertyIndex;
use crate::matrix::BoolMatrix;
use crate::model::{Edge, EdgeId, LabelId, Node, NodeId, PropId, TypeId};
use crate::value::Value;

/// Resolves label/relationship-type/property-key names to dense ids and
/// back. Ids are assigned densely in registration order and never reused
/// (unlike node/edge ids, which the graph reuses after deletion) — so schema ids act as stable matrix indices for the lifetime of the graph.
#[derive(Debug, Default)]
pub struct Catalog {
    label_names: Vec<String>,
    label_ids: FxHashMap<String, LabelId>,
    type_names: Vec<String>,
    type_ids: FxHashMap<String, TypeId>,
    prop_names: Vec<String>,
    prop_ids: FxHashMap<String, PropId>,
}

impl Catalog {
    /// Rebuilds a catalog from its flattened name lists, in the same order
    /// they were originally assigned, so ids stay stable across a
    /// snapshot save/load round trip. Used by `engine::snapshot::load`.
    pub fn from_names(labels: Vec<String>, types: Vec<String>, props: Vec<String>) -> Self {
        let mut catalog = Catalog::default();
        for name in labels {
            let id = LabelId(catalog.label_names.len() as u32);
            catalog.label_ids.insert(name.clone(), id);
            catalog.label_names.push(name);
        }
        for name in types {
            let id = TypeId(catalog.type_names.len() as u32);
            catalog.type_ids.insert(name.clone(), id);
            catalog.type_names.push(name);
        }
        for name in props {
            let id = PropId(catalog.prop_names.len() as u32);
            catalog.prop_ids.insert(name.clone(), id);
            catalog.prop_names.push(name);
        }
        catalog
    }

    pub fn resolve_label(&self, name: &str) -> Option<LabelId> {
        self.label_ids.get(name).copied()
    }

    pub fn resolve_type(&self, name: &str) -> Option<TypeId> {
        self.type_ids.get(name).copied()
    }

    pub fn resolve_prop(&self, name: &str) -> Option<PropId> {
        self.prop_ids.get(name).copied()
    }

    pub fn label_name(&self, id: LabelId) -> &str {
        &self.label_names[id.0 as usize]
    }

    pub fn type_name(&self, id: TypeId) -> &str {
        &self.type_names[id.0 as usize]
    }

    pub fn prop_name(&self, id: PropId) -> &str {
        &self.prop_names[id.0 as usize]
    }

    pub fn labels(&self) -> &[String] {
        &self.label_names
    }

    pub fn relationship_types(&self) -> &[String] {
        &self.type_names
    }

    pub fn property_keys(&self) -> &[String] {
        &self.prop_names
    }

    fn label_or_create(&mut self, name: &str) -> LabelId {
        if let Some(&id) = self.label_ids.get(name) {
            return id;
        }
        let id = LabelId(self.label_names.len() as u32);
        self.label_names.push(name.to_owned());
        self.label_ids.insert(name.to_owned(), id);
        id
    }

    fn type_or_create(&mut self, name: &str) -> TypeId {
        if let Some(&id) = self.type_ids.get(name) {
            return id;
        }
        let id = TypeId(self.type_names.len() as u32);
        self.type_names.push(name.to_owned());
        self.type_ids.insert(name.to_owned(), id);
        id
    }

    fn prop_or_create(&mut self, name: &str) -> PropId {
        if let Some(&id) = self.prop_ids.get(name) {
            return id;
        }
        let id = PropId(self.prop_names.len() as u32);
        self.prop_names.push(name.to_owned());
        self.prop_ids.insert(name.to_owned(), id);
        id
    }
}

/// The in-memory property graph plus its adjacency/diagonal matrices and
/// secondary indices.
#[derive(Debug, Default)]
pub struct Graph {
    catalog: Catalog,
    nodes: Vec<Option<Node>>,
    free_node_ids: Vec<NodeId>,
    edges: FxHashMap<EdgeId, Edge>,
    next_edge_id: EdgeId,
    /// `label_matrices[label.0]` is `L_L`, sized to `nodes.len()`.
    label_matrices: Vec<BoolMatrix>,
    /// `type_matrices[type.0]` is `A_T`, sized to `nodes.len()`.
    type_matrices: Vec<BoolMatrix>,
    indices: FxHashMap<(LabelId, PropId), PropertyIndex>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Upper bound on node ids ever assigned; matrices are sized to this.
    pub fn node_capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id).and_then(|slot| slot.as_ref())
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Ensures a label exists in the catalog, growing its diagonal matrix to
    /// the current node capacity. Used both by `add_node` and by schema
    /// bootstrap (`db.idx.fulltext.createNodeIndex` on a label with no nodes
    /// yet).
    pub fn ensure_label(&mut self, name: &str) -> LabelId {
        let id = self.catalog.label_or_create(name);
        if self.label_matrices.len() <= id.0 as usize {
            self.label_matrices
                .resize_with(id.0 as usize + 1, || BoolMatrix::zeros(self.nodes.len()));
        }
        id
    }

    pub fn ensure_type(&mut self, name: &str) -> TypeId {
        let id = self.catalog.type_or_create(name);
        if self.type_matrices.len() <= id.0 as usize {
            self.type_matrices
                .resize_with(id.0 as usize + 1, || BoolMatrix::zeros(self.nodes.len()));
        }
        id
    }

    pub fn ensure_prop(&mut self, name: &str) -> PropId {
        self.catalog.prop_or_create(name)
    }

    pub fn label_matrix(&self, label: LabelId) -> Option<&BoolMatrix> {
        self.label_matrices.get(label.0 as usize)
    }

    pub fn type_matrix(&self, ty: TypeId) -> Option<&BoolMatrix> {
        self.type_matrices.get(ty.0 as usize)
    }

    fn grow_matrices_to(&mut self, dim: usize) {
        for m in &mut self.label_matrices {
            if m.dim() < dim {
                m.grow(dim);
            }
        }
        for m in &mut self.type_matrices {
            if m.dim() < dim {
                m.grow(dim);
            }
        }
    }

    /// Allocates a node id (reusing a freed one if available), registers its
    /// labels, and sets the corresponding label-diagonal bits.
    pub fn add_node(&mut self, labels: &[&str], properties: Vec<(&str, Value)>) -> NodeId {
        let id = match self.free_node_ids.pop() {
            Some(id) => id,
            None => {
                let id = self.nodes.len();
                self.nodes.push(None);
                self.grow_matrices_to(self.nodes.len());
                id
            }
        };

        let mut node = Node::new(id);
        for &label_name in labels {
            let label = self.ensure_label(label_name);
            self.grow_matrices_to(self.nodes.len());
            node.labels.push(label);
            self.label_matrices[label.0 as usize].set(id, id);
        }
        for (key, value) in properties {
            let prop = self.ensure_prop(key);
            for &label in &node.labels {
                if let Some(index) = self.indices.get_mut(&(label, prop)) {
                    index.insert(value.clone(), id);
                }
            }
            node.properties.insert(prop, value);
        }
        self.nodes[id] = Some(node);
        id
    }

    pub fn set_node_property(&mut self, id: NodeId, key: &str, value: Value) -> Result<()> {
        let prop = self.ensure_prop(key);
        let node = self
            .nodes
            .get_mut(id)
            .and_then(|s| s.as_mut())
            .ok_or_else(|| GraphError::InvalidQuery(format!("no such node {id}")))?;
        for &label in &node.labels {
            if let Some(index) = self.indices.get_mut(&(label, prop)) {
                if let Some(old) = node.properties.get(&prop) {
                    index.remove(old, id);
                }
                index.insert(value.clone(), id);
            }
        }
        node.properties.insert(prop, value);
        Ok(())
    }

    /// Adds a directed edge, setting the relevant adjacency bit.
    pub fn add_edge(
        &mut self,
        src: NodeId,
        dest: NodeId,
        rel_type: &str,
        properties: Vec<(&str, Value)>,
    ) -> Result<EdgeId> {
        if self.node(src).is_none() || self.node(dest).is_none() {
            return Err(GraphError::InvalidQuery(
                "edge endpoint does not exist".into(),
            ));
        }
        let ty = self.ensure_type(rel_type);
        self.grow_matrices_to(self.nodes.len());
        let id = self.next_edge_id;
        self.next_edge_id += 1;
        let mut edge = Edge::new(id, src, dest, ty);
        for (key, value) in properties {
            let prop = self.ensure_prop(key);
            edge.properties.insert(prop, value);
        }
        self.type_matrices[ty.0 as usize].set(src, dest);
        self.edges.insert(id, edge);
        Ok(id)
    }

    /// Deletes a node and every edge incident to it, clearing all matrix
    /// entries that referenced it and freeing the id for reuse — matrix
    /// invariants (`A_T[s,d]=1 <=> edge exists`) must hold immediately after.
    pub fn delete_node(&mut self, id: NodeId) -> Result<()> {
        let node = self
            .nodes
            .get(id)
            .and_then(|s| s.as_ref())
            .ok_or_else(|| GraphError::InvalidQuery(format!("no such node {id}")))?
            .clone();

        let incident: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|(_, e)| e.src == id || e.dest == id)
            .map(|(eid, _)| *eid)
            .collect();
        for eid in incident {
            self.delete_edge(eid)?;
        }
        for &label in &node.labels {
            self.label_matrices[label.0 as usize].unset(id, id);
            for (prop, value) in &node.properties {
                if let Some(index) = self.indices.get_mut(&(label, *prop)) {
                    index.remove(value, id);
                }
            }
        }
        self.nodes[id] = None;
        self.free_node_ids.push(id);
        Ok(())
    }

    pub fn delete_edge(&mut self, id: EdgeId) -> Result<()> {
        let edge = self
            .edges
            .remove(&id)
            .ok_or_else(|| GraphError::InvalidQuery(format!("no such edge {id}")))?;
        self.type_matrices[edge.rel_type.0 as usize].unset(edge.src, edge.dest);
        Ok(())
    }

    /// Builds (or rebuilds) a property index for `(label, prop)`, scanning
    /// every node currently carrying that label.
    pub fn create_index(&mut self, label_name: &str, prop_name: &str) -> Result<()> {
        let label = self.ensure_label(label_name);
        let prop = self.ensure_prop(prop_name);
        let mut index = PropertyIndex::default();
        if let Some(matrix) = self.label_matrices.get(label.0 as usize) {
            for id in 0..matrix.dim() {
                if matrix.get(id, id) {
                    if let Some(node) = self.node(id) {
                        if let Some(value) = node.properties.get(&prop) {
                            index.insert(value.clone(), id);
                        }
                    }
                }
            }
        }
        self.indices.insert((label, prop), index);
        Ok(())
    }

    pub fn index_for(&self, label: LabelId, prop: PropId) -> Option<&PropertyIndex> {
        self.indices.get(&(label, prop))
    }

    pub fn has_index(&self, label: LabelId, prop: PropId) -> bool {
        self.indices.contains_key(&(label, prop))
    }

    /// All node ids bearing `label`, ascending — the label diagonal's
    /// marked rows, exactly as `NodeByLabelScan` requires.
    pub fn nodes_with_label(&self, label: LabelId) -> Vec<NodeId> {
        match self.label_matrices.get(label.0 as usize) {
            Some(m) => (0..m.dim()).filter(|&i| m.get(i, i)).collect(),
            None => Vec::new(),
        }
    }

    /// Rebuilds every adjacency matrix from the edge table; used after a
    /// snapshot load, since adjacency matrices are never persisted directly
    /// (see `engine::snapshot`'s persisted state layout).
    pub fn rebuild_adjacency(&mut self) {
        let dim = self.nodes.len();
        for m in &mut self.type_matrices {
            *m = BoolMatrix::zeros(dim);
        }
        for edge in self.edges.values() {
            self.type_matrices[edge.rel_type.0 as usize].set(edge.src, edge.dest);
        }
        for m in &mut self.label_matrices {
            *m = BoolMatrix::zeros(dim);
        }
        for (id, node) in self.nodes.iter().enumerate() {
            if let Some(node) = node {
                for &label in &node.labels {
                    self.label_matrices[label.0 as usize].set(id, id);
                }
            }
        }
    }

    pub fn all_node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(id, n)| n.as_ref().map(|_| id))
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    /// Flat view used by `engine::snapshot` to (de)serialize the graph.
    pub fn nodes_raw(&self) -> &[Option<Node>] {
        &self.nodes
    }

    pub fn edges_raw(&self) -> &FxHashMap<EdgeId, Edge> {
        &self.edges
    }

    /// The next id `add_edge` will assign; persisted so a reload doesn't
    /// reuse an id whose edge was since deleted (edge ids are never reused,
    /// unlike node ids).
    pub fn next_edge_id(&self) -> EdgeId {
        self.next_edge_id
    }

    pub fn restore(
        catalog: Catalog,
        nodes: Vec<Option<Node>>,
        edges: FxHashMap<EdgeId, Edge>,
        next_edge_id: EdgeId,
    ) -> Self {
        let label_count = catalog.label_names.len();
        let type_count = catalog.type_names.len();
        let dim = nodes.len();
        let mut graph = Graph {
            catalog,
            nodes,
            free_node_ids: Vec::new(),
            edges,
            next_edge_id,
            label_matrices: (0..label_count).map(|_| BoolMatrix::zeros(dim)).collect(),
            type_matrices: (0..type_count).map(|_| BoolMatrix::zeros(dim)).collect(),
            indices: FxHashMap::default(),
        };
        graph.rebuild_adjacency();
        graph.free_node_ids = graph
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(id, n)| n.is_none().then_some(id))
            .collect();
        graph
    }

    /// Finds an edge of one of `rel_types` between `src` and `dest` (in that
    /// direction), used to bind an edge-pattern variable once
    /// `ConditionalTraverse` has already established both endpoints via the
    /// adjacency matrix. Linear in the destination's incident edges; there is
    /// no edge-lookup index since the matrices only track existence, not
    /// identity.
    pub fn find_edge(&self, src: NodeId, dest: NodeId, rel_types: &[TypeId]) -> Option<EdgeId> {
        self.edges
            .values()
            .find(|e| {
                e.src == src && e.dest == dest && (rel_types.is_empty() || rel_types.contains(&e.rel_type))
            })
            .map(|e| e.id)
    }

    /// All property values for `prop` across nodes bearing `label`, used by
    /// the full-text procedures (`db.idx.fulltext.*`) tokenizer.
    pub fn scan_label_property(&self, label: LabelId, prop: PropId) -> Vec<(NodeId, Value)> {
        self.nodes_with_label(label)
            .into_iter()
            .filter_map(|id| {
                self.node(id)
                    .and_then(|n| n.properties.get(&prop))
                    .map(|v| (id, v.clone()))
            })
            .collect()
    }
}

/// Per-node/edge property map, keyed by resolved id, in iteration order — a
/// convenience re-export so callers don't need a separate import for the
/// `BTreeMap` the data model already uses.
pub type PropertyMap = BTreeMap<PropId, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_node_sets_label_diagonal() {
        let mut g = Graph::new();
        let a = g.add_node(&["P"], vec![("name", Value::string("Alice"))]);
        let label = g.catalog().resolve_label("P").unwrap();
        assert!(g.label_matrix(label).unwrap().get(a, a));
    }

    #[test]
    fn add_edge_sets_adjacency_bit() {
        let mut g = Graph::new();
        let a = g.add_node(&["P"], vec![]);
        let b = g.add_node(&["P"], vec![]);
        g.add_edge(a, b, "KNOWS", vec![]).unwrap();
        let ty = g.catalog().resolve_type("KNOWS").unwrap();
        assert!(g.type_matrix(ty).unwrap().get(a, b));
    }

    #[test]
    fn delete_node_clears_incident_edges_and_label_bit() {
        let mut g = Graph::new();
        let a = g.add_node(&["P"], vec![]);
        let b = g.add_node(&["P"], vec![]);
        let e = g.add_edge(a, b, "KNOWS", vec![]).unwrap();
        g.delete_node(a).unwrap();
        assert!(g.node(a).is_none());
        assert!(g.edge(e).is_none());
        let ty = g.catalog().resolve_type("KNOWS").unwrap();
        assert!(!g.type_matrix(ty).unwrap().get(a, b));
    }

    #[test]
    fn deleted_node_id_is_reused() {
        let mut g = Graph::new();
        let a = g.add_node(&["P"], vec![]);
        g.delete_node(a).unwrap();
        let b = g.add_node(&["P"], vec![]);
        assert_eq!(a, b);
    }

    #[test]
    fn create_index_then_point_lookup() {
        let mut g = Graph::new();
        g.add_node(&["P"], vec![("age", Value::Int(30))]);
        g.add_node(&["P"], vec![("age", Value::Int(25))]);
        g.create_index("P", "age").unwrap();
        let label = g.catalog().resolve_label("P").unwrap();
        let prop = g.catalog().resolve_prop("age").unwrap();
        assert!(g.has_index(label, prop));
    }
}
