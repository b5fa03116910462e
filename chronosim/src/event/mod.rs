//! Event types, event values, and the type-erased registration surface
//! user models plug into the driver through.

use std::rc::Rc;

use rand::rngs::StdRng;

use crate::generators::{Generator, GeneratorIndex};

/// An opaque time-to-fire distribution, consumed only by the sampler.
/// Out of scope per the core's purpose; this is the minimal contract that
/// lets the reference [`crate::sampler::BinaryHeapSampler`] draw a
/// concrete fire time from whatever distribution a model's `enable`
/// returns.
pub trait Distribution: std::fmt::Debug {
    /// Draws a non-negative delay (in simulation-time units) from this
    /// distribution, anchored at `enable_start_time`.
    fn sample_delay(&self, rng: &mut StdRng) -> f64;
}

/// Bound satisfied by every sampler clock key: user-chosen, and must be
/// hashable and totally comparable.
pub trait ClockKey: Clone + Eq + std::hash::Hash + std::fmt::Debug + 'static {}
impl<T: Clone + Eq + std::hash::Hash + std::fmt::Debug + 'static> ClockKey for T {}

/// The seven callbacks a model supplies for one event type.
///
/// Implemented once per concrete event type, which also serves as that
/// type's "event value" — an instance carries whatever parameters the
/// model needs (e.g. `Move { who: usize, dir: Direction }`).
pub trait EventType<S, K: ClockKey>: Clone + std::fmt::Debug + 'static {
    /// Invoked under read-capture; must be a pure function of `state`.
    fn precondition(&self, state: &S) -> bool;

    /// Invoked under read-capture; returns the distribution and the time
    /// the sampler should anchor it against.
    fn enable(&self, state: &S, now: f64) -> (Rc<dyn Distribution>, f64);

    /// Invoked under read-capture; `None` means "leave the sampler alone".
    fn reenable(
        &self,
        state: &S,
        first_enabled: f64,
        now: f64,
    ) -> Option<(Rc<dyn Distribution>, f64)>;

    /// Invoked under write-capture; mutates `state`.
    fn fire(&self, state: &mut S, now: f64, rng: &mut StdRng);

    /// `true` if this event type has zero delay and fires atomically
    /// within the same reconciliation step as its trigger.
    fn is_immediate() -> bool
    where
        Self: Sized;

    /// A total, injective projection to a hashable sampler key.
    fn clock_key(&self) -> K;

    /// The generators this event type registers; may be empty.
    /// Built fresh at registration time (driver construction), not cached,
    /// since a generator closure commonly captures `Rc` state and so is
    /// not `Send`/`Sync` and cannot live behind a plain `'static static`.
    fn generators() -> Vec<Generator<S, K>>
    where
        Self: Sized;
}

/// Type-erased handle to a live event instance, stored in the driver's
/// `enabled` table and passed to the observer. Auto-implemented for every
/// [`EventType`] so the driver never needs to know concrete event types at
/// the call site — only at registration time, through [`EventTypeList`].
pub trait EventValue<S, K: ClockKey>: dyn_clone::DynClone + std::fmt::Debug {
    fn precondition(&self, state: &S) -> bool;
    fn enable(&self, state: &S, now: f64) -> (Rc<dyn Distribution>, f64);
    fn reenable(&self, state: &S, first_enabled: f64, now: f64) -> Option<(Rc<dyn Distribution>, f64)>;
    fn fire(&self, state: &mut S, now: f64, rng: &mut StdRng);
    fn is_immediate(&self) -> bool;
    fn clock_key(&self) -> K;
    /// The concrete event type's [`std::any::TypeId`], used by the
    /// generator index to look up event-firing generators keyed on it.
    fn event_type_id(&self) -> std::any::TypeId;
}

dyn_clone::clone_trait_object!(<S, K: ClockKey> EventValue<S, K>);

impl<S, K, T> EventValue<S, K> for T
where
    K: ClockKey,
    T: EventType<S, K>,
{
    fn precondition(&self, state: &S) -> bool {
        EventType::precondition(self, state)
    }

    fn enable(&self, state: &S, now: f64) -> (Rc<dyn Distribution>, f64) {
        EventType::enable(self, state, now)
    }

    fn reenable(&self, state: &S, first_enabled: f64, now: f64) -> Option<(Rc<dyn Distribution>, f64)> {
        EventType::reenable(self, state, first_enabled, now)
    }

    fn fire(&self, state: &mut S, now: f64, rng: &mut StdRng) {
        EventType::fire(self, state, now, rng);
    }

    fn is_immediate(&self) -> bool {
        T::is_immediate()
    }

    fn clock_key(&self) -> K {
        EventType::clock_key(self)
    }

    fn event_type_id(&self) -> std::any::TypeId {
        std::any::TypeId::of::<T>()
    }
}

pub type BoxedEvent<S, K> = Box<dyn EventValue<S, K>>;

/// A heterogeneous list of concrete [`EventType`]s the driver is
/// constructed with. Implemented for tuples of arity 1 through 8 by
/// [`crate::event_types_list_impl`].
pub trait EventTypeList<S, K: ClockKey> {
    /// Feeds every member type's declared generators into the appropriate
    /// index: immediate event types go in `immediate`, the rest in `timed`.
    fn register_generators(immediate: &mut GeneratorIndex<S, K>, timed: &mut GeneratorIndex<S, K>);
}

/// Implements [`EventTypeList`] for a tuple of concrete event types,
/// routing each member's generators to the immediate or timed index
/// according to its own `is_immediate()`.
#[macro_export]
macro_rules! event_types_list_impl {
    ($($t:ident),+) => {
        paste::paste! {
            #[allow(non_snake_case)]
            impl<S, K, $($t),+> $crate::event::EventTypeList<S, K> for ($($t,)+)
            where
                K: $crate::event::ClockKey,
                $($t: $crate::event::EventType<S, K>),+
            {
                fn register_generators(
                    immediate: &mut $crate::generators::GeneratorIndex<S, K>,
                    timed: &mut $crate::generators::GeneratorIndex<S, K>,
                ) {
                    $(
                        let target: &mut $crate::generators::GeneratorIndex<S, K> =
                            if $t::is_immediate() { immediate } else { timed };
                        for g in $t::generators() {
                            target.register(g);
                        }
                    )+
                }
            }
        }
    };
}

event_types_list_impl!(A);
event_types_list_impl!(A, B);
event_types_list_impl!(A, B, C);
event_types_list_impl!(A, B, C, D);
event_types_list_impl!(A, B, C, D, E);
event_types_list_impl!(A, B, C, D, E, F);
event_types_list_impl!(A, B, C, D, E, F, G);
event_types_list_impl!(A, B, C, D, E, F, G, H);
