//! Secondary property indices and the index-utilization query layer.
//!
//! A [`PropertyIndex`] keeps postings sorted by [`value::order`] (not a
//! `BTreeMap`, since [`Value`] contains `f64` and has no total `Ord`), so a
//! range query is a pair of binary searches and an exact-value query is one.
//! [`IndexQuery`] is the small algebra the optimizer (`optimizer`) compiles a
//! reduced filter tree into, and [`PropertyIndex::evaluate`] is the only
//! place that walks postings, mirroring the single point of entry a
//! GraphBLAS-backed `IndexScan` would have into its posting store.

use std::collections::BTreeSet;

use crate::model::NodeId;
use crate::value::{self, Value};

/// One `(value, matching node ids)` bucket, kept sorted by `value::order`.
#[derive(Debug, Default)]
pub struct PropertyIndex {
    buckets: Vec<(Value, BTreeSet<NodeId>)>,
}

impl PropertyIndex {
    fn bucket_position(&self, v: &Value) -> Result<usize, usize> {
        self.buckets.binary_search_by(|(bv, _)| value::order(bv, v))
    }

    pub fn insert(&mut self, v: Value, id: NodeId) {
        match self.bucket_position(&v) {
            Ok(pos) => {
                self.buckets[pos].1.insert(id);
            }
            Err(pos) => {
                let mut set = BTreeSet::new();
                set.insert(id);
                self.buckets.insert(pos, (v, set));
            }
        }
    }

    pub fn remove(&mut self, v: &Value, id: NodeId) {
        if let Ok(pos) = self.bucket_position(v) {
            self.buckets[pos].1.remove(&id);
            if self.buckets[pos].1.is_empty() {
                self.buckets.remove(pos);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|(_, ids)| ids.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Exact-value lookup (`=`), ascending node id order.
    pub fn equals(&self, v: &Value) -> Vec<NodeId> {
        match self.bucket_position(v) {
            Ok(pos) => self.buckets[pos].1.iter().copied().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// `ISO SQL` range semantics: `min`/`max` are each independently
    /// inclusive or exclusive per `min_inclusive`/`max_inclusive`, resolving
    /// the ambiguity left open around boundary treatment by always honoring
    /// the operator the predicate actually used rather than assuming `>=`/`<=`.
    pub fn range(
        &self,
        min: Option<&Value>,
        min_inclusive: bool,
        max: Option<&Value>,
        max_inclusive: bool,
    ) -> Vec<NodeId> {
        let start = match min {
            None => 0,
            Some(min) => match self.bucket_position(min) {
                Ok(pos) if min_inclusive => pos,
                Ok(pos) => pos + 1,
                Err(pos) => pos,
            },
        };
        let end = match max {
            None => self.buckets.len(),
            Some(max) => match self.bucket_position(max) {
                Ok(pos) if max_inclusive => pos + 1,
                Ok(pos) => pos,
                Err(pos) => pos,
            },
        };
        let mut out = Vec::new();
        for (_, ids) in self.buckets.get(start..end.max(start)).unwrap_or(&[]) {
            out.extend(ids.iter().copied());
        }
        out.sort_unstable();
        out
    }

    pub fn evaluate(&self, query: &IndexQuery) -> Vec<NodeId> {
        match query {
            IndexQuery::Equals(v) => self.equals(v),
            IndexQuery::Range {
                min,
                min_inclusive,
                max,
                max_inclusive,
            } => self.range(min.as_ref(), *min_inclusive, max.as_ref(), *max_inclusive),
            IndexQuery::Union(queries) => {
                let mut out: BTreeSet<NodeId> = BTreeSet::new();
                for q in queries {
                    out.extend(self.evaluate(q));
                }
                out.into_iter().collect()
            }
            IndexQuery::Intersect(queries) => {
                let mut iter = queries.iter();
                let Some(first) = iter.next() else {
                    return Vec::new();
                };
                let mut acc: BTreeSet<NodeId> = self.evaluate(first).into_iter().collect();
                for q in iter {
                    let next: BTreeSet<NodeId> = self.evaluate(q).into_iter().collect();
                    acc = acc.intersection(&next).copied().collect();
                }
                acc.into_iter().collect()
            }
        }
    }
}

/// A query the optimizer compiles a reduced, normalized filter chain into —
/// the payload a `PhysicalOp::PropIndexScan`-equivalent operator evaluates
/// against a single property's [`PropertyIndex`].
#[derive(Clone, Debug)]
pub enum IndexQuery {
    Equals(Value),
    Range {
        min: Option<Value>,
        min_inclusive: bool,
        max: Option<Value>,
        max_inclusive: bool,
    },
    Union(Vec<IndexQuery>),
    Intersect(Vec<IndexQuery>),
}

impl IndexQuery {
    pub fn unbounded_range() -> Self {
        IndexQuery::Range {
            min: None,
            min_inclusive: true,
            max: None,
            max_inclusive: true,
        }
    }
}

/// Tokenizes and scores matches for `db.idx.fulltext.queryNodes`: a minimal
/// whitespace/punctuation tokenizer feeding a posting list per token,
/// sufficient for the procedure's documented "any token matches" semantics
/// without pulling in a real text-search crate the dependency graph doesn't
/// carry.
#[derive(Debug, Default)]
pub struct FullTextIndex {
    postings: std::collections::BTreeMap<String, BTreeSet<NodeId>>,
}

impl FullTextIndex {
    pub fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase())
            .collect()
    }

    pub fn index_node(&mut self, id: NodeId, text: &str) {
        for token in Self::tokenize(text) {
            self.postings.entry(token).or_default().insert(id);
        }
    }

    pub fn remove_node(&mut self, id: NodeId, text: &str) {
        for token in Self::tokenize(text) {
            if let Some(set) = self.postings.get_mut(&token) {
                set.remove(&id);
            }
        }
    }

    /// Nodes matching any token in `query`, paired with the number of
    /// distinct matching tokens as a crude relevance score, descending.
    pub fn query(&self, query: &str) -> Vec<(NodeId, usize)> {
        let mut scores: std::collections::BTreeMap<NodeId, usize> =
            std::collections::BTreeMap::new();
        for token in Self::tokenize(query) {
            if let Some(ids) = self.postings.get(&token) {
                for &id in ids {
                    *scores.entry(id).or_insert(0) += 1;
                }
            }
        }
        let mut results: Vec<(NodeId, usize)> = scores.into_iter().collect();
        results.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equals_finds_exact_bucket() {
        let mut idx = PropertyIndex::default();
        idx.insert(Value::Int(30), 1);
        idx.insert(Value::Int(25), 2);
        assert_eq!(idx.equals(&Value::Int(30)), vec![1]);
    }

    #[test]
    fn range_respects_inclusive_exclusive_bounds() {
        let mut idx = PropertyIndex::default();
        for (v, id) in [(20, 1), (25, 2), (30, 3), (35, 4)] {
            idx.insert(Value::Int(v), id);
        }
        let inclusive = idx.range(Some(&Value::Int(25)), true, Some(&Value::Int(30)), true);
        assert_eq!(inclusive, vec![2, 3]);
        let exclusive = idx.range(Some(&Value::Int(25)), false, Some(&Value::Int(30)), false);
        assert!(exclusive.is_empty());
    }

    #[test]
    fn remove_drops_empty_bucket() {
        let mut idx = PropertyIndex::default();
        idx.insert(Value::Int(30), 1);
        idx.remove(&Value::Int(30), 1);
        assert!(idx.equals(&Value::Int(30)).is_empty());
        assert!(idx.is_empty());
    }

    #[test]
    fn intersect_combines_two_ranges() {
        let mut idx = PropertyIndex::default();
        for (v, id) in [(1, 10), (2, 11), (3, 12)] {
            idx.insert(Value::Int(v), id);
        }
        let q = IndexQuery::Intersect(vec![
            IndexQuery::Range {
                min: Some(Value::Int(1)),
                min_inclusive: true,
                max: Some(Value::Int(2)),
                max_inclusive: true,
            },
            IndexQuery::Range {
                min: Some(Value::Int(2)),
                min_inclusive: true,
                max: Some(Value::Int(3)),
                max_inclusive: true,
            },
        ]);
        assert_eq!(idx.evaluate(&q), vec![11]);
    }

    #[test]
    fn fulltext_query_scores_by_token_overlap() {
        let mut idx = FullTextIndex::default();
        idx.index_node(1, "Alice works at Acme Corp");
        idx.index_node(2, "Bob likes Acme products");
        let hits = idx.query("Acme products");
        assert_eq!(hits[0].0, 2);
    }
}
