//! JSON-backed persistence for one named graph: a convenience for tests and
//! the CLI's `snapshot save`/`snapshot load` subcommands, not a durability
//! subsystem (no WAL, no fsync discipline, no incremental/diff format).
//!
//! Only the entity tables and the catalog are persisted — adjacency and
//! label matrices are rebuilt from the edge/node tables on load via
//! [`Graph::rebuild_adjacency`], since they are a derived cache, not the
//! source of truth.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::graph::{Catalog, Graph};
use crate::model::{Edge, EdgeId, Node};

/// The catalog's flattened (name-list) shape, mirroring [`Graph::catalog`]'s
/// private field layout closely enough to reconstruct it without exposing
/// its internals as a public type.
#[derive(Serialize, Deserialize)]
struct CatalogSnapshot {
    labels: Vec<String>,
    relationship_types: Vec<String>,
    property_keys: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct GraphSnapshot {
    /// Format version; bumped if the on-disk shape ever changes
    /// incompatibly.
    version: u32,
    catalog: CatalogSnapshot,
    nodes: Vec<Option<Node>>,
    edges: BTreeMap<EdgeId, Edge>,
    next_edge_id: EdgeId,
}

const FORMAT_VERSION: u32 = 1;

/// Serializes `graph` to pretty-printed JSON at `path`.
pub fn save(graph: &Graph, path: impl AsRef<Path>) -> Result<()> {
    let snapshot = GraphSnapshot {
        version: FORMAT_VERSION,
        catalog: CatalogSnapshot {
            labels: graph.catalog().labels().to_vec(),
            relationship_types: graph.catalog().relationship_types().to_vec(),
            property_keys: graph.catalog().property_keys().to_vec(),
        },
        nodes: graph.nodes_raw().to_vec(),
        edges: graph.edges_raw().iter().map(|(k, v)| (*k, v.clone())).collect(),
        next_edge_id: graph.next_edge_id(),
    };
    let text = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| GraphError::Internal(format!("snapshot serialize failed: {e}")))?;
    fs::write(path, text).map_err(|e| GraphError::Internal(format!("snapshot write failed: {e}")))
}

/// Deserializes a [`Graph`] from a snapshot written by [`save`], rebuilding
/// adjacency/label matrices from the restored entity tables.
pub fn load(path: impl AsRef<Path>) -> Result<Graph> {
    let text =
        fs::read_to_string(path).map_err(|e| GraphError::Internal(format!("snapshot read failed: {e}")))?;
    let snapshot: GraphSnapshot = serde_json::from_str(&text)
        .map_err(|e| GraphError::Internal(format!("snapshot parse failed: {e}")))?;
    if snapshot.version != FORMAT_VERSION {
        return Err(GraphError::Internal(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }

    let catalog = Catalog::from_names(
        snapshot.catalog.labels,
        snapshot.catalog.relationship_types,
        snapshot.catalog.property_keys,
    );

    let edges: FxHashMap<EdgeId, Edge> = snapshot.edges.into_iter().collect();
    Ok(Graph::restore(catalog, snapshot.nodes, edges, snapshot.next_edge_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn round_trips_nodes_edges_and_catalog() {
        let mut graph = Graph::new();
        let a = graph.add_node(&["P"], vec![("name", Value::string("Alice"))]);
        let b = graph.add_node(&["P"], vec![("name", Value::string("Bob"))]);
        graph.add_edge(a, b, "KNOWS", vec![]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        save(&graph, &path).unwrap();
        let restored = load(&path).unwrap();

        assert_eq!(restored.node_count(), graph.node_count());
        assert_eq!(restored.edge_count(), graph.edge_count());
        let label = restored.catalog().resolve_label("P").unwrap();
        assert!(restored.label_matrix(label).unwrap().get(a, a));
        let ty = restored.catalog().resolve_type("KNOWS").unwrap();
        assert!(restored.type_matrix(ty).unwrap().get(a, b));
    }
}
