//! Observed, integer-indexed ordered sequence.

use crate::address::Address;
use crate::capture::{CaptureMode, CaptureState};
use crate::element::Element;

/// An integer-indexed ordered sequence of `T`, notifying on every read and
/// write.
#[derive(Clone, Debug)]
pub struct Sequence<T: Element> {
    prefix: Address,
    items: Vec<T>,
}

impl<T: Element> Sequence<T> {
    /// `prefix` is this sequence's own address (e.g. `(agents,)`), fixed at
    /// construction — see the module docs on why containers mounted
    /// directly on the state root never need to be reseated themselves.
    #[must_use]
    pub fn new(prefix: Address) -> Self {
        Self {
            prefix,
            items: Vec::new(),
        }
    }

    fn slot_addr(&self, i: usize) -> Address {
        self.prefix.append(i)
    }

    fn notify_index(&self, cap: &CaptureState, kind: CaptureMode, i: usize) {
        if T::NOTIFIES_AT_INDEX {
            cap.notify(kind, self.slot_addr(i));
        }
    }

    /// Re-seats every element from `from` onward to its current index, so
    /// that after any sequence-shift every live element's back-address
    /// agrees with its new index; a no-op for primitives.
    fn reseat_from(&mut self, from: usize) {
        for i in from..self.items.len() {
            self.items[i].reseat(self.slot_addr(i));
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

    /// Read op: notifies at `(.., index)` for primitive elements; for
    /// compound elements the container itself stays silent.
    #[must_use]
    pub fn index(&self, i: usize, cap: &CaptureState) -> &T {
        self.notify_index(cap, CaptureMode::Read, i);
        &self.items[i]
    }

    /// Mutable access to the element at `i`, for compound elements whose
    /// own field setters notify independently; the container stays silent
    /// here the same way it does on [`Sequence::index`].
    #[must_use]
    pub fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.items[i]
    }

    /// Bulk read: notifies once at the container's own address for a
    /// primitive-valued container; compound iteration stays silent and
    /// relies on subsequent field access.
    pub fn length(&self, cap: &CaptureState) -> usize {
        if T::NOTIFIES_AT_INDEX {
            cap.notify(CaptureMode::Read, self.prefix.clone());
        }
        self.items.len()
    }

    pub fn iter(&self, cap: &CaptureState) -> std::slice::Iter<'_, T> {
        if T::NOTIFIES_AT_INDEX {
            cap.notify(CaptureMode::Read, self.prefix.clone());
        }
        self.items.iter()
    }

    /// Mutating op: `set`.
    ///
    /// # Panics
    /// Panics if `value` already carries an attached back-address pointing
    /// elsewhere; a value must be removed from its current slot before it
    /// can be inserted into another one.
    pub fn set(&mut self, i: usize, mut value: T, cap: &CaptureState) {
        assert!(
            !value.is_attached(),
            "set: value is already attached to a slot; remove it first"
        );
        value.reseat(self.slot_addr(i));
        self.notify_index(cap, CaptureMode::Write, i);
        self.items[i] = value;
    }

    /// Mutating op: `append`.
    ///
    /// # Panics
    /// Panics if `value` already carries an attached back-address pointing
    /// elsewhere.
    pub fn append(&mut self, mut value: T, cap: &CaptureState) {
        assert!(
            !value.is_attached(),
            "append: value is already attached to a slot; remove it first"
        );
        let i = self.items.len();
        value.reseat(self.slot_addr(i));
        self.notify_index(cap, CaptureMode::Write, i);
        self.items.push(value);
    }

    /// Mutating op: `insert-front`. Every existing element shifts right by
    /// one; all of them are reseated, and primitives notify at every
    /// shifted index plus the new slot.
    ///
    /// # Panics
    /// Panics if `value` already carries an attached back-address pointing
    /// elsewhere.
    pub fn insert_front(&mut self, mut value: T, cap: &CaptureState) {
        assert!(
            !value.is_attached(),
            "insert_front: value is already attached to a slot; remove it first"
        );
        value.reseat(self.slot_addr(0));
        self.items.insert(0, value);
        self.reseat_from(1);
        for i in 0..self.items.len() {
            self.notify_index(cap, CaptureMode::Write, i);
        }
    }

    /// Mutating op: `remove-back`. The removed element is detached (for
    /// compound elements: back-address cleared, `notify_all` emitted); no
    /// other element's index changes.
    pub fn remove_back(&mut self, cap: &CaptureState) -> Option<T> {
        let i = self.items.len().checked_sub(1)?;
        self.notify_index(cap, CaptureMode::Write, i);
        let mut removed = self.items.pop()?;
        removed.detach(cap);
        Some(removed)
    }

    /// Mutating op: `remove-front`. Every remaining element shifts left by
    /// one; they are reseated but, for compound elements, *not* notified —
    /// only the removed element gets `notify_all`, since a surviving
    /// element's own fields haven't changed even though its index has.
    pub fn remove_front(&mut self, cap: &CaptureState) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        if T::NOTIFIES_AT_INDEX {
            for i in 0..self.items.len() {
                cap.notify(CaptureMode::Write, self.slot_addr(i));
            }
        }
        let mut removed = self.items.remove(0);
        self.reseat_from(0);
        removed.detach(cap);
        Some(removed)
    }

    /// Mutating op: `extend`.
    pub fn extend(&mut self, values: impl IntoIterator<Item = T>, cap: &CaptureState) {
        for v in values {
            self.append(v, cap);
        }
    }

    /// Mutating op: `resize`. Growing appends `fill.clone()`; shrinking
    /// detaches every element past the new length.
    pub fn resize(&mut self, new_len: usize, fill: T, cap: &CaptureState) {
        let old_len = self.items.len();
        if new_len < old_len {
            if T::NOTIFIES_AT_INDEX {
                for i in new_len..old_len {
                    cap.notify(CaptureMode::Write, self.slot_addr(i));
                }
            }
            for item in &mut self.items[new_len..] {
                item.detach(cap);
            }
            self.items.truncate(new_len);
        } else if new_len > old_len {
            for i in old_len..new_len {
                let mut value = fill.clone();
                value.reseat(self.slot_addr(i));
                self.notify_index(cap, CaptureMode::Write, i);
                self.items.push(value);
            }
        }
    }
}
