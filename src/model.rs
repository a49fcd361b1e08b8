//! Data model for graph entities: nodes, edges, and the small integer
//! identifier types that index schema tables and adjacency matrices.
//!
//! # Key types
//!
//! - [`Node`] / [`Edge`] — graph entities with labels/type and properties.
//! - [`LabelId`] / [`TypeId`] / [`PropId`] — dense identifiers resolved from
//!   names by the catalog; also the row/column indices of the adjacency and
//!   diagonal matrices in [`crate::matrix`].
//! - [`NodeId`] / [`EdgeId`] — stable 64-bit entity identifiers. `NodeId` also
//!   serves as the dense matrix index: the data model guarantees IDs are
//!   assigned densely and re-used after deletion, exactly as the adjacency
//!   matrices require.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Dense node identifier; doubles as an adjacency-matrix row/column index.
pub type NodeId = usize;

/// Stable edge identifier. Edges are not matrix-indexed themselves.
pub type EdgeId = u64;

/// Catalog identifier for a node label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LabelId(pub u32);

/// Catalog identifier for a relationship type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

/// Catalog identifier for a property key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropId(pub u32);

/// A node in the property graph: a set of labels plus an attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub labels: Vec<LabelId>,
    pub properties: BTreeMap<PropId, Value>,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            labels: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn has_label(&self, label: LabelId) -> bool {
        self.labels.contains(&label)
    }
}

/// A directed edge with exactly one relationship type and an attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub src: NodeId,
    pub dest: NodeId,
    pub rel_type: TypeId,
    pub properties: BTreeMap<PropId, Value>,
}

impl Edge {
    pub fn new(id: EdgeId, src: NodeId, dest: NodeId, rel_type: TypeId) -> Self {
        Self {
            id,
            src,
            dest,
            rel_type,
            properties: BTreeMap::new(),
        }
    }
}
