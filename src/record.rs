//! `Record` — the fixed-width row of bound values that flows between
//! operators during pull-based execution.
//!
//! Each record slot holds one of a node, an edge, or a scalar [`Value`]. The
//! layout (slot count, and which alias occupies which slot) is fixed once the
//! execution plan is built, so a record is really a flat vector indexed by
//! plan-assigned slot number rather than a map keyed by name.

use std::sync::Arc;

use crate::model::{EdgeId, NodeId};
use crate::value::Value;

/// One record slot. `Unset` is the slot's initial state; operators populate
/// slots as a record flows upward through the operator tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Slot {
    Unset,
    Node(NodeId),
    Edge(EdgeId),
    /// A bound variable-length path: the sequence of edge ids traversed.
    Edges(Arc<Vec<EdgeId>>),
    Scalar(Value),
}

impl Slot {
    pub fn is_unset(&self) -> bool {
        matches!(self, Slot::Unset)
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Slot::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<EdgeId> {
        match self {
            Slot::Edge(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Slot::Scalar(v) => Some(v),
            _ => None,
        }
    }
}

/// A row of bound values, one slot per plan variable. Records are owned by
/// whichever operator `consume()` returns them to; a caller that wants to
/// retain a record beyond the next `consume()` call must `clone()` it.
#[derive(Clone, Debug, Default)]
pub struct Record {
    slots: Vec<Slot>,
}

impl Record {
    /// A record with `width` unset slots.
    pub fn with_width(width: usize) -> Self {
        Self {
            slots: vec![Slot::Unset; width],
        }
    }

    pub fn width(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, slot: usize) -> &Slot {
        &self.slots[slot]
    }

    pub fn set(&mut self, slot: usize, value: Slot) {
        self.slots[slot] = value;
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Appends `other`'s slots onto `self`, growing the width. Used when a
    /// join or cartesian product widens a record by concatenating a right
    /// child's bindings after the left child's.
    pub fn extend(&mut self, other: &Record) {
        self.slots.extend_from_slice(&other.slots);
    }

    /// Merges `other` into `self` slot-by-slot, a slot at a time, without
    /// ever overwriting a slot `self` already has bound — mirrors
    /// `Record_Merge`'s contract that the receiving record's existing
    /// bindings always win. Grows `self` if `other` is wider.
    pub fn merge(&mut self, other: &Record) {
        if other.slots.len() > self.slots.len() {
            self.slots.resize(other.slots.len(), Slot::Unset);
        }
        for (i, value) in other.slots.iter().enumerate() {
            if self.slots[i].is_unset() && !value.is_unset() {
                self.slots[i] = value.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_never_overwrites_existing_bindings() {
        let mut a = Record::with_width(2);
        a.set(0, Slot::Node(1));
        let mut b = Record::with_width(2);
        b.set(0, Slot::Node(99));
        b.set(1, Slot::Node(2));

        a.merge(&b);
        assert_eq!(a.get(0).as_node(), Some(1));
        assert_eq!(a.get(1).as_node(), Some(2));
    }

    #[test]
    fn merge_grows_narrower_record() {
        let mut a = Record::with_width(1);
        a.set(0, Slot::Node(1));
        let mut b = Record::with_width(3);
        b.set(2, Slot::Scalar(Value::Int(7)));

        a.merge(&b);
        assert_eq!(a.width(), 3);
        assert_eq!(a.get(2).as_scalar(), Some(&Value::Int(7)));
    }

    #[test]
    fn extend_concatenates_slots() {
        let mut a = Record::with_width(1);
        a.set(0, Slot::Node(1));
        let mut b = Record::with_width(1);
        b.set(0, Slot::Node(2));

        a.extend(&b);
        assert_eq!(a.width(), 2);
        assert_eq!(a.get(0).as_node(), Some(1));
        assert_eq!(a.get(1).as_node(), Some(2));
    }

    #[test]
    fn clone_is_independent_copy() {
        let mut a = Record::with_width(1);
        a.set(0, Slot::Scalar(Value::string("x")));
        let mut b = a.clone();
        b.set(0, Slot::Scalar(Value::string("y")));
        assert_eq!(a.get(0).as_scalar(), Some(&Value::string("x")));
    }

    fn arb_slot(max_id: u32) -> impl proptest::prelude::Strategy<Value = Slot> {
        use proptest::prelude::*;
        prop_oneof![
            Just(Slot::Unset),
            (0..max_id).prop_map(Slot::Node),
            (0..max_id).prop_map(Slot::Edge),
            (0..max_id as i64).prop_map(|i| Slot::Scalar(Value::Int(i))),
        ]
    }

    proptest::prelude::proptest! {
        /// `Record_Merge` never overwrites a slot `self` already has bound,
        /// and a slot unset on both sides before the merge stays unset after.
        #[test]
        fn merge_preserves_self_and_only_fills_unset_slots(
            a_slots in proptest::collection::vec(arb_slot(50), 1..8),
            b_slots in proptest::collection::vec(arb_slot(50), 1..8),
        ) {
            use proptest::prelude::*;

            let mut a = Record::with_width(a_slots.len());
            for (i, s) in a_slots.iter().enumerate() {
                a.set(i, s.clone());
            }
            let mut b = Record::with_width(b_slots.len());
            for (i, s) in b_slots.iter().enumerate() {
                b.set(i, s.clone());
            }
            let before = a.clone();

            a.merge(&b);

            prop_assert!(a.width() >= before.width());
            prop_assert!(a.width() >= b.width());
            for i in 0..before.width() {
                if !before.get(i).is_unset() {
                    prop_assert_eq!(a.get(i), before.get(i));
                }
            }
            for i in 0..b.width() {
                if before.get(i).is_unset() && !b.get(i).is_unset() {
                    prop_assert_eq!(a.get(i), b.get(i));
                }
            }
            for i in 0..a.width() {
                let before_unset = before.get(i).is_unset();
                let b_unset = i >= b.width() || b.get(i).is_unset();
                if before_unset && b_unset {
                    prop_assert!(a.get(i).is_unset());
                }
            }
        }
    }
}
