//! The simulation driver: the FSM that fires events and reconciles the
//! enabled set, dependency network, and sampler afterward.

use indexmap::{IndexMap, IndexSet};
use rand::rngs::StdRng;

use crate::address::Address;
use crate::capture::{with_read_capture, with_write_capture, Captured};
use crate::deps::DepNet;
use crate::event::{BoxedEvent, ClockKey, EventTypeList, EventValue};
use crate::generators::GeneratorIndex;
use crate::sampler::{BinaryHeapSampler, Sampler};

/// Called after every reconciliation pass with the state, the time it
/// happened at, the event that triggered it (`None` only for the
/// synthetic "initialize" pass), and the write-set it produced.
pub type Observer<S, K> =
    Box<dyn FnMut(&S, f64, Option<&dyn EventValue<S, K>>, &IndexSet<Address>)>;

/// How a driver run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The sampler had no next event to offer.
    Quiescent,
    /// The user-supplied stop-predicate returned `true`.
    StopConditionMet,
    /// `run_trace` consumed its entire input sequence.
    TraceExhausted,
}

/// The simulation driver. `S` is the user's physical state root (must
/// expose a [`crate::capture::CaptureState`] via [`Captured`]); `K` is the
/// sampler's clock-key type; `Sm` is the sampler implementation, defaulting
/// to the bundled [`BinaryHeapSampler`].
pub struct Driver<S: Captured, K: ClockKey, Sm: Sampler<K> = BinaryHeapSampler<K>> {
    physical: S,
    sampler: Sm,
    immediate_gen_index: GeneratorIndex<S, K>,
    timed_gen_index: GeneratorIndex<S, K>,
    enabled: IndexMap<K, BoxedEvent<S, K>>,
    enabling_times: IndexMap<K, f64>,
    deps: DepNet<K>,
    now: f64,
    rng: StdRng,
    observer: Option<Observer<S, K>>,
}

impl<S: Captured, K: ClockKey, Sm: Sampler<K>> Driver<S, K, Sm> {
    /// Constructs a driver over `physical`, registering every event type in
    /// `L` (a tuple of up to eight [`crate::event::EventType`]s, via
    /// [`crate::event_types_list_impl`]) into the immediate/timed generator
    /// indices according to each type's own `is_immediate()`.
    pub fn new<L: EventTypeList<S, K>>(
        physical: S,
        sampler: Sm,
        rng: StdRng,
        observer: Option<Observer<S, K>>,
    ) -> Self {
        let mut immediate_gen_index = GeneratorIndex::new();
        let mut timed_gen_index = GeneratorIndex::new();
        L::register_generators(&mut immediate_gen_index, &mut timed_gen_index);
        Self {
            physical,
            sampler,
            immediate_gen_index,
            timed_gen_index,
            enabled: IndexMap::new(),
            enabling_times: IndexMap::new(),
            deps: DepNet::new(),
            now: 0.0,
            rng,
            observer,
        }
    }

    #[must_use]
    pub fn now(&self) -> f64 {
        self.now
    }

    #[must_use]
    pub fn physical(&self) -> &S {
        &self.physical
    }

    #[must_use]
    pub fn enabled_keys(&self) -> IndexSet<K> {
        self.enabled.keys().cloned().collect()
    }

    /// Runs `init_callback` under write-capture with no prior event, then
    /// reconciles with `k* = None`, producing the initial enabled set and
    /// clocks. Calls the observer once with a synthetic "initialize" event,
    /// represented as `None` (there is no generic empty [`EventValue`] to
    /// manufacture one from).
    pub fn init(&mut self, init_callback: impl FnOnce(&mut S)) {
        let (_, w) = with_write_capture(&mut self.physical, init_callback);
        #[cfg(feature = "logging")]
        log::debug!("initialization wrote {} addresses", w.len());
        self.reconcile_from_invariant_walk(&w, None);
        self.notify_observer(None, &w);
        self.debug_consistency_check();
    }

    /// Runs the main sampling loop until the sampler is quiescent or
    /// `stop` returns `true`.
    pub fn run(
        &mut self,
        init_callback: impl FnOnce(&mut S),
        mut stop: impl FnMut(&S, usize, &dyn EventValue<S, K>, f64) -> bool,
    ) -> Outcome {
        self.init(init_callback);
        let mut step_idx = 0usize;
        loop {
            let Some((t, k)) = self.sampler.next(self.now, &mut self.rng) else {
                #[cfg(feature = "logging")]
                log::debug!("sampler quiescent after {step_idx} steps");
                return Outcome::Quiescent;
            };
            if !t.is_finite() {
                return Outcome::Quiescent;
            }
            let event = self
                .enabled
                .get(&k)
                .expect("sampler yielded a key not present in the enabled table (invariant breach)")
                .clone();
            if stop(&self.physical, step_idx, &*event, t) {
                return Outcome::StopConditionMet;
            }
            self.now = t;
            self.fire_and_reconcile(k, event);
            step_idx += 1;
        }
    }

    /// Replays a pre-recorded `(time, event)` sequence instead of sampling.
    /// Every replayed event must already be enabled at the moment it is
    /// applied.
    ///
    /// # Panics
    /// Panics if a replayed event's clock key is not in the enabled table —
    /// the same fatal invariant breach a live sampler yielding an unknown
    /// key would trigger.
    pub fn run_trace(
        &mut self,
        init_callback: impl FnOnce(&mut S),
        trace: impl IntoIterator<Item = (f64, BoxedEvent<S, K>)>,
    ) -> Outcome {
        self.init(init_callback);
        for (t, event) in trace {
            let k = event.clock_key();
            assert!(
                self.enabled.contains_key(&k),
                "replayed trace event {k:?} is not currently enabled (invariant breach)"
            );
            self.now = t;
            self.fire_and_reconcile(k, event);
        }
        Outcome::TraceExhausted
    }

    fn fire_and_reconcile(&mut self, k_star: K, event: BoxedEvent<S, K>) {
        #[cfg(feature = "logging")]
        log::trace!("firing {k_star:?} at t={}", self.now);

        let (_, mut w) = with_write_capture(&mut self.physical, |s| {
            event.fire(s, self.now, &mut self.rng);
        });

        self.fire_immediates(&mut w, Some(&*event));

        self.sampler.disable(&k_star, self.now);
        self.enabled.shift_remove(&k_star);
        self.enabling_times.shift_remove(&k_star);
        self.deps.drop(&k_star);

        self.reconcile_from_invariant_walk(&w, Some(&*event));
        self.notify_observer(Some(&*event), &w);
        self.debug_consistency_check();
    }

    /// Fires immediate events to a fixed point.
    fn fire_immediates(&mut self, w: &mut IndexSet<Address>, trigger: Option<&dyn EventValue<S, K>>) {
        let mut already_fired: IndexSet<K> = IndexSet::new();
        loop {
            let candidates = self.immediate_gen_index.candidates(trigger, w, &self.physical);
            let mut fired_this_pass = false;
            for candidate in candidates {
                let k = candidate.clock_key();
                if already_fired.contains(&k) {
                    continue;
                }
                let (ok, _) = with_read_capture(&mut self.physical, |s| candidate.precondition(s));
                if !ok {
                    continue;
                }
                let (_, writes) = with_write_capture(&mut self.physical, |s| {
                    candidate.fire(s, self.now, &mut self.rng);
                });
                w.extend(writes);
                already_fired.insert(k);
                fired_this_pass = true;
            }
            if !fired_this_pass {
                break;
            }
        }
    }

    /// The invariant walk, bulk removal, and the rate-only walk.
    fn reconcile_from_invariant_walk(
        &mut self,
        w: &IndexSet<Address>,
        trigger: Option<&dyn EventValue<S, K>>,
    ) {
        let mut to_remove: Vec<K> = Vec::new();
        let mut visited: IndexSet<K> = IndexSet::new();

        for (k, e) in self.invariant_walk_candidates(w, trigger) {
            visited.insert(k.clone());
            let (ok, cond_reads) = with_read_capture(&mut self.physical, |s| e.precondition(s));
            let was_enabled = self.enabled.contains_key(&k);

            match (was_enabled, ok) {
                (true, false) => to_remove.push(k),
                (false, true) => {
                    let (dist_t0, rate_reads) =
                        with_read_capture(&mut self.physical, |s| e.enable(s, self.now));
                    self.sampler
                        .enable(k.clone(), dist_t0.0, dist_t0.1, self.now, &mut self.rng);
                    self.enabled.insert(k.clone(), e.clone());
                    self.enabling_times.insert(k.clone(), self.now);
                    self.deps.put(k, cond_reads, rate_reads);
                }
                (true, true) => {
                    let enable_deps_changed = Some(&cond_reads) != self.deps.get_enable(&k);
                    if enable_deps_changed {
                        self.reanchor(&k, &e, cond_reads, true);
                    } else if self
                        .deps
                        .get_rate(&k)
                        .is_some_and(|rate| rate.intersection(w).next().is_some())
                    {
                        self.reanchor(&k, &e, cond_reads, false);
                    }
                }
                (false, false) => {}
            }
        }

        for k in to_remove {
            #[cfg(feature = "logging")]
            log::trace!("disabling {k:?}: precondition no longer holds");
            self.sampler.disable(&k, self.now);
            self.enabled.shift_remove(&k);
            self.enabling_times.shift_remove(&k);
            self.deps.drop(&k);
        }

        for k in self.deps.events_affecting_rate(w) {
            if visited.contains(&k) {
                continue;
            }
            let Some(e) = self.enabled.get(&k).cloned() else {
                continue;
            };
            let cond_reads = self.deps.get_enable(&k).cloned().unwrap_or_default();
            self.reanchor(&k, &e, cond_reads, false);
        }
    }

    /// Shared by the "stayed enabled" branch of the invariant walk and the
    /// rate-only walk. The sampler re-anchors whenever `reenable` returns
    /// `Some` — that's independent of whether the fresh rate-read set
    /// changed. `unconditional` governs only the dependency-network
    /// update: `true` when the enable-deps themselves changed (deps are
    /// always updated in that case), `false` when only a rate-dependency
    /// write triggered the re-anchor (deps update only if the fresh
    /// rate-read set actually differs — rate-dep equality is the binding
    /// signal, not the re-enable call itself).
    fn reanchor(&mut self, k: &K, e: &BoxedEvent<S, K>, cond_reads: IndexSet<Address>, unconditional: bool) {
        let first_enabled = self.enabling_times[k];
        let (reenabled, new_rate_reads) =
            with_read_capture(&mut self.physical, |s| e.reenable(s, first_enabled, self.now));

        if let Some((dist, t0)) = reenabled {
            #[cfg(feature = "logging")]
            log::trace!("re-anchoring {k:?} at t0={t0}");
            self.sampler.enable(k.clone(), dist, t0, self.now, &mut self.rng);
        }

        let old_rate = self.deps.get_rate(k).cloned().unwrap_or_default();
        let rate_changed = new_rate_reads != old_rate;
        if unconditional || rate_changed {
            self.deps.put(k.clone(), cond_reads, new_rate_reads);
        }
    }

    /// The invariant walk's candidate set: `deps.events_affecting_enable(W)`
    /// union every event the timed generator index yields for `(k*, W)`,
    /// deduped by clock key, in that order.
    fn invariant_walk_candidates(
        &self,
        w: &IndexSet<Address>,
        trigger: Option<&dyn EventValue<S, K>>,
    ) -> IndexMap<K, BoxedEvent<S, K>> {
        let mut visit: IndexMap<K, BoxedEvent<S, K>> = IndexMap::new();
        for k in self.deps.events_affecting_enable(w) {
            if let Some(e) = self.enabled.get(&k) {
                visit.insert(k, dyn_clone::clone_box(&**e));
            }
        }
        for candidate in self.timed_gen_index.candidates(trigger, w, &self.physical) {
            let k = candidate.clock_key();
            visit.entry(k).or_insert(candidate);
        }
        visit
    }

    fn notify_observer(&mut self, event: Option<&dyn EventValue<S, K>>, w: &IndexSet<Address>) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&self.physical, self.now, event, w);
        }
    }

    /// Asserts key-set equality across `enabled`, `deps`, and the live
    /// sampler clocks. Only runs in debug builds.
    fn debug_consistency_check(&self) {
        debug_assert_eq!(
            self.enabled.keys().cloned().collect::<IndexSet<K>>(),
            self.deps.keys(),
            "enabled-table keys diverged from dependency-network keys"
        );
        debug_assert_eq!(
            self.deps.keys(),
            self.sampler.live_keys(),
            "dependency-network keys diverged from live sampler clocks"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::FieldTag;
    use crate::capture::{CaptureMode, CaptureState};
    use crate::event::{Distribution, EventType};
    use crate::generators::Generator;
    use rand::SeedableRng;
    use std::rc::Rc;

    #[derive(Default)]
    struct State {
        cap: CaptureState,
        counter: i64,
    }
    impl Captured for State {
        fn capture_state(&self) -> &CaptureState {
            &self.cap
        }
    }

    fn counter_addr() -> Address {
        Address::root().prepend(FieldTag::new("counter"))
    }

    #[derive(Debug)]
    struct Constant(f64);
    impl Distribution for Constant {
        fn sample_delay(&self, _rng: &mut StdRng) -> f64 {
            self.0
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, std::hash::Hash)]
    struct Key(&'static str);

    #[derive(Clone, Debug)]
    struct Tick;
    impl EventType<State, Key> for Tick {
        fn precondition(&self, state: &State) -> bool {
            state.counter < 3
        }
        fn enable(&self, _state: &State, now: f64) -> (Rc<dyn Distribution>, f64) {
            (Rc::new(Constant(1.0)), now)
        }
        fn reenable(&self, _state: &State, _first: f64, _now: f64) -> Option<(Rc<dyn Distribution>, f64)> {
            None
        }
        fn fire(&self, state: &mut State, _now: f64, _rng: &mut StdRng) {
            state.counter += 1;
            state.capture_state().notify(CaptureMode::Write, counter_addr());
        }
        fn is_immediate() -> bool {
            false
        }
        fn clock_key(&self) -> Key {
            Key("tick")
        }
        fn generators() -> Vec<Generator<State, Key>> {
            vec![Generator::pattern(counter_addr(), |emit, _state, _idx| {
                emit(Box::new(Tick));
            })]
        }
    }

    #[test]
    fn init_enables_tick_and_run_advances_counter_until_precondition_fails() {
        let state = State::default();
        let sampler = BinaryHeapSampler::new();
        let rng = StdRng::seed_from_u64(7);
        let mut driver: Driver<State, Key, BinaryHeapSampler<Key>> =
            Driver::new::<(Tick,)>(state, sampler, rng, None);

        let outcome = driver.run(
            |s: &mut State| s.capture_state().notify(CaptureMode::Write, counter_addr()),
            |_, _, _, _| false,
        );
        assert_eq!(outcome, Outcome::Quiescent);
        assert_eq!(driver.physical().counter, 3);
        assert!(driver.enabled_keys().is_empty());
    }
}
