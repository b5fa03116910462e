//! Dependency network: bidirectional index between enabled events and the
//! state addresses their behavior depends on.

use indexmap::{IndexMap, IndexSet};

use crate::address::Address;
use crate::event::ClockKey;

#[derive(Default)]
struct DepSets {
    enable: IndexSet<Address>,
    rate: IndexSet<Address>,
}

/// Maintains, per enabled event key, the ordered address sets its
/// precondition (`enable_deps`) and its rate (`rate_deps`) last touched,
/// plus the reverse indexes `addr -> {keys}` the driver needs to find
/// which events a given write might affect.
pub struct DepNet<K: ClockKey> {
    forward: IndexMap<K, DepSets>,
    reverse_enable: IndexMap<Address, IndexSet<K>>,
    reverse_rate: IndexMap<Address, IndexSet<K>>,
}

impl<K: ClockKey> Default for DepNet<K> {
    fn default() -> Self {
        Self {
            forward: IndexMap::new(),
            reverse_enable: IndexMap::new(),
            reverse_rate: IndexMap::new(),
        }
    }
}

impl<K: ClockKey> DepNet<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces both dependency sets for `k`, updating the reverse indexes
    /// transactionally (old entries removed before new ones are added).
    pub fn put(&mut self, k: K, enable_deps: IndexSet<Address>, rate_deps: IndexSet<Address>) {
        if let Some(old) = self.forward.get(&k) {
            for addr in &old.enable {
                Self::unindex(&mut self.reverse_enable, addr, &k);
            }
            for addr in &old.rate {
                Self::unindex(&mut self.reverse_rate, addr, &k);
            }
        }

        for addr in &enable_deps {
            self.reverse_enable
                .entry(addr.clone())
                .or_default()
                .insert(k.clone());
        }
        for addr in &rate_deps {
            self.reverse_rate
                .entry(addr.clone())
                .or_default()
                .insert(k.clone());
        }

        self.forward.insert(
            k,
            DepSets {
                enable: enable_deps,
                rate: rate_deps,
            },
        );
    }

    /// Removes both dependency sets for `k`, updating the reverse indexes.
    pub fn drop(&mut self, k: &K) {
        let Some(old) = self.forward.shift_remove(k) else {
            return;
        };
        for addr in &old.enable {
            Self::unindex(&mut self.reverse_enable, addr, k);
        }
        for addr in &old.rate {
            Self::unindex(&mut self.reverse_rate, addr, k);
        }
    }

    fn unindex(reverse: &mut IndexMap<Address, IndexSet<K>>, addr: &Address, k: &K) {
        if let Some(keys) = reverse.get_mut(addr) {
            keys.shift_remove(k);
            if keys.is_empty() {
                reverse.shift_remove(addr);
            }
        }
    }

    /// Union of reverse-enable-index lookups over `addresses`, in
    /// first-seen order.
    #[must_use]
    pub fn events_affecting_enable(&self, addresses: &IndexSet<Address>) -> IndexSet<K> {
        let mut out = IndexSet::new();
        for addr in addresses {
            if let Some(keys) = self.reverse_enable.get(addr) {
                out.extend(keys.iter().cloned());
            }
        }
        out
    }

    /// Union of reverse-rate-index lookups over `addresses`, in
    /// first-seen order.
    #[must_use]
    pub fn events_affecting_rate(&self, addresses: &IndexSet<Address>) -> IndexSet<K> {
        let mut out = IndexSet::new();
        for addr in addresses {
            if let Some(keys) = self.reverse_rate.get(addr) {
                out.extend(keys.iter().cloned());
            }
        }
        out
    }

    #[must_use]
    pub fn get_enable(&self, k: &K) -> Option<&IndexSet<Address>> {
        self.forward.get(k).map(|s| &s.enable)
    }

    #[must_use]
    pub fn get_rate(&self, k: &K) -> Option<&IndexSet<Address>> {
        self.forward.get(k).map(|s| &s.rate)
    }

    #[must_use]
    pub fn contains(&self, k: &K) -> bool {
        self.forward.contains_key(k)
    }

    /// The set of keys currently tracked, for the debug consistency check
    /// the driver runs after reconciliation.
    #[must_use]
    pub fn keys(&self) -> IndexSet<K> {
        self.forward.keys().cloned().collect()
    }
}
