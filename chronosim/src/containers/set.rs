//! Observed, unordered set.

use indexmap::IndexSet;

use crate::address::Address;
use crate::capture::{CaptureMode, CaptureState};

/// An unordered set of `T`. Unlike [`Sequence`](super::sequence::Sequence)
/// and [`Mapping`](super::mapping::Mapping), a set has no per-member slot
/// address to notify at: membership is tracked only at the set's own
/// address, and members cannot be compound (an element's identity in a set
/// is its value, which rules out back-addressed element types).
#[derive(Clone, Debug)]
pub struct Set<T: Clone + Eq + std::hash::Hash> {
    addr: Address,
    items: IndexSet<T>,
}

impl<T: Clone + Eq + std::hash::Hash> Set<T> {
    #[must_use]
    pub fn new(addr: Address) -> Self {
        Self {
            addr,
            items: IndexSet::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn notify(&self, cap: &CaptureState, kind: CaptureMode) {
        cap.notify(kind, self.addr.clone());
    }

    /// Read op: `contains`.
    pub fn contains(&self, value: &T, cap: &CaptureState) -> bool {
        self.notify(cap, CaptureMode::Read);
        self.items.contains(value)
    }

    /// Read op: `length`/`iter`.
    pub fn length(&self, cap: &CaptureState) -> usize {
        self.notify(cap, CaptureMode::Read);
        self.items.len()
    }

    pub fn iter(&self, cap: &CaptureState) -> indexmap::set::Iter<'_, T> {
        self.notify(cap, CaptureMode::Read);
        self.items.iter()
    }

    /// Read op: `is_subset` — true if every member of `self` is also a
    /// member of `other`.
    pub fn is_subset(&self, other: &Self, cap: &CaptureState) -> bool {
        self.notify(cap, CaptureMode::Read);
        self.items.is_subset(&other.items)
    }

    /// Read op: `is_superset` — true if every member of `other` is also a
    /// member of `self`.
    pub fn is_superset(&self, other: &Self, cap: &CaptureState) -> bool {
        self.notify(cap, CaptureMode::Read);
        self.items.is_superset(&other.items)
    }

    /// Mutating op: `insert`. Returns `false` if `value` was already a
    /// member (no notification is emitted for a no-op insert, matching the
    /// "notifies only on an observable change" rule the other mutating
    /// set ops also follow).
    pub fn insert(&mut self, value: T, cap: &CaptureState) -> bool {
        let changed = self.items.insert(value);
        if changed {
            self.notify(cap, CaptureMode::Write);
        }
        changed
    }

    /// Mutating op: `remove`. Returns `false` if `value` was not a member.
    pub fn remove(&mut self, value: &T, cap: &CaptureState) -> bool {
        let changed = self.items.shift_remove(value);
        if changed {
            self.notify(cap, CaptureMode::Write);
        }
        changed
    }

    /// Mutating op: `pop`. Removes and returns the most-recently-inserted
    /// member, or `None` if the set is empty.
    pub fn pop(&mut self, cap: &CaptureState) -> Option<T> {
        let popped = self.items.pop();
        if popped.is_some() {
            self.notify(cap, CaptureMode::Write);
        }
        popped
    }

    /// Mutating op: `union` — adds every member of `other` not already
    /// present.
    pub fn union(&mut self, other: &Self, cap: &CaptureState) {
        let mut changed = false;
        for value in &other.items {
            if self.items.insert(value.clone()) {
                changed = true;
            }
        }
        if changed {
            self.notify(cap, CaptureMode::Write);
        }
    }

    /// Mutating op: `intersect` — retains only members also present in
    /// `other`.
    pub fn intersect(&mut self, other: &Self, cap: &CaptureState) {
        let before = self.items.len();
        self.items.retain(|value| other.items.contains(value));
        if self.items.len() != before {
            self.notify(cap, CaptureMode::Write);
        }
    }

    /// Mutating op: `diff` — removes every member also present in `other`.
    pub fn diff(&mut self, other: &Self, cap: &CaptureState) {
        let before = self.items.len();
        self.items.retain(|value| !other.items.contains(value));
        if self.items.len() != before {
            self.notify(cap, CaptureMode::Write);
        }
    }

    /// Mutating op: `symdiff` — members in exactly one of `self`/`other`
    /// survive: a member already in `self` is removed, one found only in
    /// `other` is added.
    pub fn symdiff(&mut self, other: &Self, cap: &CaptureState) {
        let mut changed = false;
        for value in &other.items {
            if self.items.shift_remove(value) {
                changed = true;
            } else {
                self.items.insert(value.clone());
                changed = true;
            }
        }
        if changed {
            self.notify(cap, CaptureMode::Write);
        }
    }
}
