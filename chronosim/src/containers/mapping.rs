//! Observed, key-indexed mapping.

use indexmap::IndexMap;

use crate::address::{Address, IndexValue};
use crate::capture::{CaptureMode, CaptureState};
use crate::element::Element;

/// A key-indexed mapping from `K` to `V`, notifying on every read and
/// write.
#[derive(Clone, Debug)]
pub struct Mapping<K: Clone + Eq + std::hash::Hash + Into<IndexValue>, V: Element> {
    prefix: Address,
    items: IndexMap<K, V>,
}

impl<K, V> Mapping<K, V>
where
    K: Clone + Eq + std::hash::Hash + Into<IndexValue>,
    V: Element,
{
    #[must_use]
    pub fn new(prefix: Address) -> Self {
        Self {
            prefix,
            items: IndexMap::new(),
        }
    }

    fn slot_addr(&self, key: &K) -> Address {
        self.prefix.append(key.clone().into())
    }

    fn notify_key(&self, cap: &CaptureState, kind: CaptureMode, key: &K) {
        if V::NOTIFIES_AT_INDEX {
            cap.notify(kind, self.slot_addr(key));
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

    /// Read op: `lookup`. For compound values the back-address is already
    /// current (maintained by `insert`/`update`); the container itself
    /// stays silent and field access on the returned reference notifies.
    pub fn lookup(&self, key: &K, cap: &CaptureState) -> Option<&V> {
        self.notify_key(cap, CaptureMode::Read, key);
        self.items.get(key)
    }

    /// Mutable access to the value at `key`, for compound values whose own
    /// field setters notify independently; the container stays silent here
    /// the same way it does on [`Mapping::lookup`].
    pub fn lookup_mut(&mut self, key: &K) -> Option<&mut V> {
        self.items.get_mut(key)
    }

    /// Read op: `contains`.
    pub fn contains(&self, key: &K, cap: &CaptureState) -> bool {
        self.notify_key(cap, CaptureMode::Read, key);
        self.items.contains_key(key)
    }

    /// Bulk read: `length`/`iter` over a primitive-valued mapping notify
    /// once at the empty-suffix container address; a compound-valued
    /// mapping stays silent on iteration, since each element's own field
    /// accesses notify instead.
    pub fn length(&self, cap: &CaptureState) -> usize {
        if V::NOTIFIES_AT_INDEX {
            cap.notify(CaptureMode::Read, self.prefix.clone());
        }
        self.items.len()
    }

    pub fn iter(&self, cap: &CaptureState) -> indexmap::map::Iter<'_, K, V> {
        if V::NOTIFIES_AT_INDEX {
            cap.notify(CaptureMode::Read, self.prefix.clone());
        }
        self.items.iter()
    }

    /// Mutating op: `insert`.
    ///
    /// # Panics
    /// Panics if `value` already carries an attached back-address pointing
    /// elsewhere; a value must be removed from its current slot before it
    /// can be inserted into another one.
    pub fn insert(&mut self, key: K, mut value: V, cap: &CaptureState) -> Option<V> {
        assert!(
            !value.is_attached(),
            "insert: value is already attached to a slot; remove it first"
        );
        value.reseat(self.slot_addr(&key));
        self.notify_key(cap, CaptureMode::Write, &key);
        self.items.insert(key, value)
    }

    /// Mutating op: `update` — like `insert`, but only valid for an
    /// already-present key; returns the previous value.
    ///
    /// # Panics
    /// Panics if `value` already carries an attached back-address pointing
    /// elsewhere.
    pub fn update(&mut self, key: &K, mut value: V, cap: &CaptureState) -> Option<V> {
        if !self.items.contains_key(key) {
            return None;
        }
        assert!(
            !value.is_attached(),
            "update: value is already attached to a slot; remove it first"
        );
        value.reseat(self.slot_addr(key));
        self.notify_key(cap, CaptureMode::Write, key);
        self.items.insert(key.clone(), value)
    }

    /// Mutating op: `remove`. The removed value is detached (compound
    /// values: back-address cleared, `notify_all` emitted).
    pub fn remove(&mut self, key: &K, cap: &CaptureState) -> Option<V> {
        self.notify_key(cap, CaptureMode::Write, key);
        let mut removed = self.items.shift_remove(key)?;
        removed.detach(cap);
        Some(removed)
    }
}
