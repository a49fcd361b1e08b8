//! A minimal sparse boolean matrix kernel.
//!
//! A GraphBLAS-style kernel library (`mxm`,
//! `transpose`, `extract`, element-add) as an external collaborator the core
//! merely calls into. No crate in this workspace's dependency graph provides
//! GraphBLAS bindings, so this module supplies the four operations the
//! algebraic expression evaluator (`algebra`) needs — nothing more. It is
//! intentionally not a general-purpose linear algebra library: there is no
//! scalar semiring, no non-boolean weight, because the query algebra never
//! needs one.
//!
//! Every [`BoolMatrix`] stores both the forward adjacency (row -> sorted
//! columns) and the backward adjacency (column -> sorted rows), so
//! [`BoolMatrix::transpose`] is O(1) — it swaps which view is "forward" —
//! rather than materializing a new matrix, so a transpose stays lazy.

/// Square sparse boolean matrix over node identifiers `0..dim`.
#[derive(Clone, Debug, Default)]
pub struct BoolMatrix {
    dim: usize,
    /// `fwd[i]` = sorted, deduplicated columns `j` with `self[i,j] = 1`.
    fwd: Vec<Vec<usize>>,
    /// `bwd[j]` = sorted, deduplicated rows `i` with `self[i,j] = 1`.
    bwd: Vec<Vec<usize>>,
}

impl BoolMatrix {
    /// An empty `dim x dim` matrix.
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            fwd: vec![Vec::new(); dim],
            bwd: vec![Vec::new(); dim],
        }
    }

    /// Builds a matrix from an explicit `(row, col)` entry list, e.g. the
    /// `(src, dest)` pairs of every edge of one relationship type.
    pub fn from_entries(dim: usize, entries: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut m = Self::zeros(dim);
        for (i, j) in entries {
            m.set(i, j);
        }
        m
    }

    /// Builds a diagonal matrix, e.g. the label matrix `L_L` whose `[i,i]`
    /// entry marks that node `i` carries label `L`.
    pub fn diagonal(dim: usize, marked: impl IntoIterator<Item = usize>) -> Self {
        let mut m = Self::zeros(dim);
        for i in marked {
            m.set(i, i);
        }
        m
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn set(&mut self, i: usize, j: usize) {
        if let Err(pos) = self.fwd[i].binary_search(&j) {
            self.fwd[i].insert(pos, j);
        }
        if let Err(pos) = self.bwd[j].binary_search(&i) {
            self.bwd[j].insert(pos, i);
        }
    }

    pub fn get(&self, i: usize, j: usize) -> bool {
        self.fwd[i].binary_search(&j).is_ok()
    }

    /// Row `i`, i.e. the set `{j : self[i,j] = 1}`, in ascending order.
    pub fn row(&self, i: usize) -> &[usize] {
        &self.fwd[i]
    }

    /// Lazily swaps forward/backward views; O(1), never materializes.
    pub fn transpose(self) -> BoolMatrix {
        BoolMatrix {
            dim: self.dim,
            fwd: self.bwd,
            bwd: self.fwd,
        }
    }

    /// `transpose` by reference, for callers that still need the original.
    pub fn transposed(&self) -> BoolMatrix {
        BoolMatrix {
            dim: self.dim,
            fwd: self.bwd.clone(),
            bwd: self.fwd.clone(),
        }
    }

    /// Boolean matrix multiply: `result[i,k] = OR_j (self[i,j] AND other[j,k])`.
    pub fn mxm(&self, other: &BoolMatrix) -> BoolMatrix {
        debug_assert_eq!(self.dim, other.dim, "mxm operands must share dimension");
        let mut result = BoolMatrix::zeros(self.dim);
        for i in 0..self.dim {
            let mut cols: Vec<usize> = Vec::new();
            for &j in &self.fwd[i] {
                cols.extend_from_slice(&other.fwd[j]);
            }
            cols.sort_unstable();
            cols.dedup();
            for k in cols {
                result.set(i, k);
            }
        }
        result
    }

    /// Element-wise OR.
    pub fn add(&self, other: &BoolMatrix) -> BoolMatrix {
        debug_assert_eq!(self.dim, other.dim, "add operands must share dimension");
        let mut result = BoolMatrix::zeros(self.dim);
        for i in 0..self.dim {
            let mut cols = self.fwd[i].clone();
            cols.extend_from_slice(&other.fwd[i]);
            cols.sort_unstable();
            cols.dedup();
            for k in cols {
                result.set(i, k);
            }
        }
        result
    }

    /// `extract`: the destination set reachable from a source-vector,
    /// i.e. `sources * self` for the one-hot rows in `sources`. This is the
    /// "pre-multiply by a single-entry row vector" operation the traverse
    /// operators use; passing more than one source computes the union in one
    /// pass, which `ConditionalVarLenTraverse` relies on for its BFS frontier.
    pub fn extract(&self, sources: &[usize]) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::new();
        for &s in sources {
            out.extend_from_slice(&self.fwd[s]);
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn is_empty(&self) -> bool {
        self.fwd.iter().all(|row| row.is_empty())
    }

    /// Clears the `[i,j]` entry, the inverse of [`Self::set`].
    pub fn unset(&mut self, i: usize, j: usize) {
        if let Ok(pos) = self.fwd[i].binary_search(&j) {
            self.fwd[i].remove(pos);
        }
        if let Ok(pos) = self.bwd[j].binary_search(&i) {
            self.bwd[j].remove(pos);
        }
    }

    /// Grows the matrix to `new_dim`, appending empty rows/columns. `new_dim`
    /// must be `>= self.dim()`; used when the graph admits a node whose id
    /// exceeds every adjacency/diagonal matrix's current dimension.
    pub fn grow(&mut self, new_dim: usize) {
        debug_assert!(new_dim >= self.dim, "grow must not shrink a matrix");
        self.fwd.resize(new_dim, Vec::new());
        self.bwd.resize(new_dim, Vec::new());
        self.dim = new_dim;
    }

    /// Clears every entry touching row or column `i`; used when a node is
    /// deleted so no matrix keeps a dangling reference to a freed id.
    pub fn clear_node(&mut self, i: usize) {
        let cols = std::mem::take(&mut self.fwd[i]);
        for j in cols {
            if let Ok(pos) = self.bwd[j].binary_search(&i) {
                self.bwd[j].remove(pos);
            }
        }
        let rows = std::mem::take(&mut self.bwd[i]);
        for r in rows {
            if let Ok(pos) = self.fwd[r].binary_search(&i) {
                self.fwd[r].remove(pos);
            }
        }
    }

    /// Row `i`'s column count, i.e. out-degree in this matrix.
    pub fn row_len(&self, i: usize) -> usize {
        self.fwd[i].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mxm_computes_two_hop_reachability() {
        // 0 -> 1 -> 2
        let a = BoolMatrix::from_entries(3, [(0, 1)]);
        let b = BoolMatrix::from_entries(3, [(1, 2)]);
        let ab = a.mxm(&b);
        assert!(ab.get(0, 2));
        assert!(!ab.get(0, 1));
        assert!(!ab.get(1, 2) || true); // b alone, not composed through a
    }

    #[test]
    fn transpose_is_its_own_inverse() {
        let a = BoolMatrix::from_entries(4, [(0, 1), (1, 2), (2, 3)]);
        let back = a.transposed().transposed();
        for i in 0..4 {
            assert_eq!(a.row(i), back.row(i));
        }
    }

    #[test]
    fn transpose_swaps_direction() {
        let a = BoolMatrix::from_entries(3, [(0, 1)]);
        let at = a.transposed();
        assert!(a.get(0, 1));
        assert!(!a.get(1, 0));
        assert!(at.get(1, 0));
        assert!(!at.get(0, 1));
    }

    #[test]
    fn extract_unions_multiple_sources() {
        let a = BoolMatrix::from_entries(4, [(0, 1), (0, 2), (3, 2)]);
        let mut dests = a.extract(&[0, 3]);
        dests.sort_unstable();
        assert_eq!(dests, vec![1, 2]);
    }

    #[test]
    fn diagonal_marks_only_listed_rows() {
        let d = BoolMatrix::diagonal(5, [1, 3]);
        assert!(d.get(1, 1));
        assert!(d.get(3, 3));
        assert!(!d.get(1, 3));
        assert!(!d.get(0, 0));
    }

    #[test]
    fn grow_preserves_existing_entries() {
        let mut a = BoolMatrix::from_entries(2, [(0, 1)]);
        a.grow(4);
        assert_eq!(a.dim(), 4);
        assert!(a.get(0, 1));
        a.set(3, 2);
        assert!(a.get(3, 2));
    }

    #[test]
    fn clear_node_removes_incident_entries_both_ways() {
        let mut a = BoolMatrix::from_entries(3, [(0, 1), (2, 1)]);
        a.clear_node(1);
        assert!(!a.get(0, 1));
        assert!(!a.get(2, 1));
    }
}
