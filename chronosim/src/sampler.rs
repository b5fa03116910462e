//! The sampler contract and a reference implementation. The sampler
//! itself is an external collaborator; this crate only specifies the
//! trait the driver drives, plus one concrete implementation so the
//! engine is usable out of the box.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::event::{ClockKey, Distribution};
use rand::rngs::StdRng;

/// Operations the driver performs against the next-firing-time structure.
pub trait Sampler<K: ClockKey> {
    /// Schedules (or re-schedules) `key` to fire at a time drawn from
    /// `distribution`, anchored at `enable_start_time`.
    fn enable(
        &mut self,
        key: K,
        distribution: Rc<dyn Distribution>,
        enable_start_time: f64,
        now: f64,
        rng: &mut StdRng,
    );

    /// Removes `key` from the live schedule, if present.
    fn disable(&mut self, key: &K, now: f64);

    /// Pops the earliest still-live `(time, key)`, or `None` if nothing is
    /// scheduled (quiescence).
    fn next(&mut self, now: f64, rng: &mut StdRng) -> Option<(f64, K)>;

    /// The set of keys presently live in the sampler, for the debug
    /// consistency check the driver runs after reconciliation.
    fn live_keys(&self) -> IndexSet<K>;
}

struct LiveEntry {
    fire_time: f64,
    generation: u64,
}

struct ScheduledEntry<K> {
    fire_time: f64,
    generation: u64,
    key: K,
}

impl<K> PartialEq for ScheduledEntry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.fire_time == other.fire_time && self.generation == other.generation
    }
}
impl<K> Eq for ScheduledEntry<K> {}

impl<K> PartialOrd for ScheduledEntry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordered by fire time ascending; `BinaryHeap` is a max-heap, so this
/// reverses the comparison to make the heap yield the earliest time first.
/// Ties break on generation (insertion order) to stay deterministic
/// without depending on the RNG for ordering.
impl<K> Ord for ScheduledEntry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .fire_time
            .total_cmp(&self.fire_time)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

/// Lazy-deletion binary-heap sampler: `disable`/re-`enable` bump a
/// per-key generation counter instead of touching the heap, and stale
/// entries are discarded when popped off the top in `next`.
pub struct BinaryHeapSampler<K: ClockKey> {
    heap: BinaryHeap<ScheduledEntry<K>>,
    live: IndexMap<K, LiveEntry>,
    next_generation: u64,
}

impl<K: ClockKey> Default for BinaryHeapSampler<K> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: IndexMap::new(),
            next_generation: 0,
        }
    }
}

impl<K: ClockKey> BinaryHeapSampler<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K: ClockKey> Sampler<K> for BinaryHeapSampler<K> {
    fn enable(
        &mut self,
        key: K,
        distribution: Rc<dyn Distribution>,
        enable_start_time: f64,
        _now: f64,
        rng: &mut StdRng,
    ) {
        let fire_time = enable_start_time + distribution.sample_delay(rng);
        let generation = self.next_generation;
        self.next_generation += 1;
        self.live.insert(key.clone(), LiveEntry { fire_time, generation });
        self.heap.push(ScheduledEntry {
            fire_time,
            generation,
            key,
        });
    }

    fn disable(&mut self, key: &K, _now: f64) {
        self.live.shift_remove(key);
    }

    fn next(&mut self, _now: f64, _rng: &mut StdRng) -> Option<(f64, K)> {
        while let Some(top) = self.heap.pop() {
            match self.live.get(&top.key) {
                Some(entry) if entry.generation == top.generation => {
                    self.live.shift_remove(&top.key);
                    return Some((top.fire_time, top.key));
                }
                _ => continue,
            }
        }
        None
    }

    fn live_keys(&self) -> IndexSet<K> {
        self.live.keys().cloned().collect()
    }
}
