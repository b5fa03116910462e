//! Event-generator index.

use std::any::TypeId;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::address::{Address, IndexValue};
use crate::event::{BoxedEvent, ClockKey, EventValue};

/// Identifies an event *type* (as opposed to [`ClockKey`], which identifies
/// one concrete instance). Used to key event-firing generators: "run this
/// closure whenever an event of type `T` fires".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EventTag(TypeId);

impl EventTag {
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self(TypeId::of::<T>())
    }
}

/// The `emit` callback a generator closure calls once per candidate event
/// it can produce.
pub type Emit<'e, S, K> = dyn FnMut(BoxedEvent<S, K>) + 'e;

type PatternClosure<S, K> = Rc<dyn Fn(&mut Emit<'_, S, K>, &S, &[IndexValue])>;
type EventFiringClosure<S, K> = Rc<dyn Fn(&mut Emit<'_, S, K>, &S, &dyn EventValue<S, K>)>;

/// One generator declaration: either matches a masked address pattern, or
/// fires whenever a specific event type fires.
pub enum Generator<S, K: ClockKey> {
    Pattern {
        /// A masked address: every index position replaced with
        /// [`IndexValue::Wildcard`] — every position is either a literal
        /// field tag or a wildcard.
        pattern: Address,
        closure: PatternClosure<S, K>,
    },
    EventFiring {
        event_tag: EventTag,
        closure: EventFiringClosure<S, K>,
    },
}

impl<S, K: ClockKey> Clone for Generator<S, K> {
    fn clone(&self) -> Self {
        match self {
            Self::Pattern { pattern, closure } => Self::Pattern {
                pattern: pattern.clone(),
                closure: Rc::clone(closure),
            },
            Self::EventFiring { event_tag, closure } => Self::EventFiring {
                event_tag: *event_tag,
                closure: Rc::clone(closure),
            },
        }
    }
}

impl<S, K: ClockKey> Generator<S, K> {
    /// Builds an address-pattern generator. `pattern` should already be
    /// masked (every index position is [`IndexValue::Wildcard`]); indices
    /// actually observed at match time are passed to `closure`.
    pub fn pattern(
        pattern: Address,
        closure: impl Fn(&mut Emit<'_, S, K>, &S, &[IndexValue]) + 'static,
    ) -> Self {
        Self::Pattern {
            pattern,
            closure: Rc::new(closure),
        }
    }

    /// Builds an event-firing generator keyed by the type tag of `T`.
    pub fn event_firing<T: 'static>(
        closure: impl Fn(&mut Emit<'_, S, K>, &S, &dyn EventValue<S, K>) + 'static,
    ) -> Self {
        Self::EventFiring {
            event_tag: EventTag::of::<T>(),
            closure: Rc::new(closure),
        }
    }
}

/// Stores generator declarations in two maps, `event_tag -> [closure]`
/// and `masked_pattern -> [closure]`, both keyed for exact lookup,
/// preserving registration order within each bucket.
pub struct GeneratorIndex<S, K: ClockKey> {
    by_event_tag: IndexMap<EventTag, Vec<EventFiringClosure<S, K>>>,
    by_pattern: IndexMap<Address, Vec<PatternClosure<S, K>>>,
}

impl<S, K: ClockKey> Default for GeneratorIndex<S, K> {
    fn default() -> Self {
        Self {
            by_event_tag: IndexMap::new(),
            by_pattern: IndexMap::new(),
        }
    }
}

impl<S, K: ClockKey> GeneratorIndex<S, K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, generator: Generator<S, K>) {
        match generator {
            Generator::Pattern { pattern, closure } => {
                self.by_pattern.entry(pattern).or_default().push(closure);
            }
            Generator::EventFiring { event_tag, closure } => {
                self.by_event_tag.entry(event_tag).or_default().push(closure);
            }
        }
    }

    /// Enumerates candidate events for a firing of `fired` (if any) whose
    /// writes were `writes`, in a deterministic order: event-driven
    /// generators first (registration order), then written addresses in
    /// accumulator order, generators within each bucket in registration
    /// order.
    pub fn candidates(
        &self,
        fired: Option<&dyn EventValue<S, K>>,
        writes: &IndexSet<Address>,
        state: &S,
    ) -> Vec<BoxedEvent<S, K>> {
        let mut out = Vec::new();
        let mut push = |ev: BoxedEvent<S, K>| out.push(ev);

        if let Some(fired) = fired {
            let tag = EventTag::of_value(fired);
            if let Some(closures) = self.by_event_tag.get(&tag) {
                for closure in closures {
                    closure(&mut push, state, fired);
                }
            }
        }

        for addr in writes {
            let masked = addr.masked();
            if let Some(closures) = self.by_pattern.get(&masked) {
                for closure in closures {
                    closure(&mut push, state, addr.index_values_owned().as_slice());
                }
            }
        }

        out
    }
}

impl EventTag {
    fn of_value<S, K: ClockKey>(ev: &dyn EventValue<S, K>) -> Self {
        Self(ev.event_type_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::FieldTag;
    use crate::event::Distribution;
    use rand::rngs::StdRng;

    #[derive(Clone, Debug)]
    struct Dummy;

    impl crate::event::EventType<(), DummyKey> for Dummy {
        fn precondition(&self, _state: &()) -> bool {
            true
        }
        fn enable(&self, _state: &(), _now: f64) -> (Rc<dyn Distribution>, f64) {
            unimplemented!("not exercised by this test")
        }
        fn reenable(&self, _state: &(), _first: f64, _now: f64) -> Option<(Rc<dyn Distribution>, f64)> {
            None
        }
        fn fire(&self, _state: &mut (), _now: f64, _rng: &mut StdRng) {}
        fn is_immediate() -> bool {
            true
        }
        fn clock_key(&self) -> DummyKey {
            DummyKey
        }
        fn generators() -> Vec<Generator<(), DummyKey>> {
            Vec::new()
        }
    }

    #[derive(Clone, PartialEq, Eq, std::hash::Hash, Debug)]
    struct DummyKey;

    #[test]
    fn pattern_lookup_matches_masked_address() {
        let mut index: GeneratorIndex<(), DummyKey> = GeneratorIndex::new();
        let pattern = Address::root()
            .prepend(IndexValue::Wildcard)
            .prepend(FieldTag::new("agents"));
        index.register(Generator::pattern(pattern, |emit, _state, idx| {
            assert_eq!(idx.len(), 1);
            emit(Box::new(Dummy));
        }));

        let mut writes = IndexSet::new();
        writes.insert(Address::root().prepend(3i64).prepend(FieldTag::new("agents")));
        let candidates = index.candidates(None, &writes, &());
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn event_firing_generator_runs_on_matching_tag() {
        let mut index: GeneratorIndex<(), DummyKey> = GeneratorIndex::new();
        index.register(Generator::event_firing::<Dummy>(|emit, _state, _fired| {
            emit(Box::new(Dummy));
        }));
        let fired = Dummy;
        let candidates = index.candidates(Some(&fired), &IndexSet::new(), &());
        assert_eq!(candidates.len(), 1);
    }
}
