//! Integration tests exercising the public API end to end: a physical
//! state built from `#[derive(Observed)]` records and `chronosim`
//! containers, driven through `Driver`. Compound-element-move-preserves-
//! field-subscriptions behavior is exercised at the container level in
//! `chronosim::containers::sequence`'s own unit tests; reentrancy
//! rejection likewise lives in `chronosim::capture`'s tests.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use chronosim::{
    Address, BackAddress, BinaryHeapSampler, CaptureMode, CaptureState, Captured, Distribution,
    Driver, EventType, EventValue, FieldTag, Generator, IndexValue, Observed, Observer, Outcome,
    Sequence,
};

#[derive(Debug)]
struct Fixed(f64);
impl Distribution for Fixed {
    fn sample_delay(&self, _rng: &mut StdRng) -> f64 {
        self.0
    }
}

fn marker_addr() -> Address {
    Address::root().prepend(FieldTag::new("marker"))
}

// ---------------------------------------------------------------------
// Random walkers on a grid with conflict / knock-off.
// ---------------------------------------------------------------------

const OFF_BOARD: i64 = -1;

#[derive(Clone, Debug, Observed)]
struct Walker {
    #[chronosim(back_address)]
    back: BackAddress,
    position: i64,
}

struct GridWorld {
    cap: CaptureState,
    walkers: Sequence<Walker>,
}
impl Captured for GridWorld {
    fn capture_state(&self) -> &CaptureState {
        &self.cap
    }
}

fn walkers_addr() -> Address {
    Address::root().prepend(FieldTag::new("walkers"))
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum GridKey {
    MoveZeroIntoOne,
    WatchZero,
}

#[derive(Clone, Debug)]
struct MoveZeroIntoOne;
impl EventType<GridWorld, GridKey> for MoveZeroIntoOne {
    fn precondition(&self, state: &GridWorld) -> bool {
        *state.walkers.index(0, &state.cap).position(&state.cap) != OFF_BOARD
    }
    fn enable(&self, _state: &GridWorld, now: f64) -> (Rc<dyn Distribution>, f64) {
        (Rc::new(Fixed(1.0)), now)
    }
    fn reenable(&self, _state: &GridWorld, _first: f64, _now: f64) -> Option<(Rc<dyn Distribution>, f64)> {
        None
    }
    fn fire(&self, state: &mut GridWorld, _now: f64, _rng: &mut StdRng) {
        let dest_occupied = *state.walkers.index(1, &state.cap).position(&state.cap) == 1;
        if dest_occupied {
            // Knock-off branch: the destination is taken, so walker 0
            // leaves the board instead of moving onto walker 1.
            state.walkers.index_mut(0).set_position(OFF_BOARD, &state.cap);
        } else {
            state.walkers.index_mut(0).set_position(1, &state.cap);
        }
    }
    fn is_immediate() -> bool {
        false
    }
    fn clock_key(&self) -> GridKey {
        GridKey::MoveZeroIntoOne
    }
    fn generators() -> Vec<Generator<GridWorld, GridKey>> {
        vec![Generator::pattern(marker_addr(), |emit, _state, _idx| {
            emit(Box::new(MoveZeroIntoOne));
            emit(Box::new(WatchZero));
        })]
    }
}

#[derive(Clone, Debug)]
struct WatchZero;
impl EventType<GridWorld, GridKey> for WatchZero {
    fn precondition(&self, state: &GridWorld) -> bool {
        *state.walkers.index(0, &state.cap).position(&state.cap) != OFF_BOARD
    }
    fn enable(&self, _state: &GridWorld, now: f64) -> (Rc<dyn Distribution>, f64) {
        (Rc::new(Fixed(50.0)), now)
    }
    fn reenable(&self, _state: &GridWorld, _first: f64, _now: f64) -> Option<(Rc<dyn Distribution>, f64)> {
        None
    }
    fn fire(&self, _state: &mut GridWorld, _now: f64, _rng: &mut StdRng) {}
    fn is_immediate() -> bool {
        false
    }
    fn clock_key(&self) -> GridKey {
        GridKey::WatchZero
    }
    fn generators() -> Vec<Generator<GridWorld, GridKey>> {
        Vec::new()
    }
}

#[test]
fn knock_off_disables_every_event_keyed_by_the_knocked_off_walker() {
    let mut world = GridWorld {
        cap: CaptureState::new(),
        walkers: Sequence::new(walkers_addr()),
    };
    world.walkers.append(Walker { back: BackAddress::Detached, position: 0 }, &world.cap);
    world.walkers.append(Walker { back: BackAddress::Detached, position: 1 }, &world.cap);

    let sampler = BinaryHeapSampler::new();
    let rng = StdRng::seed_from_u64(11);
    let mut driver: Driver<GridWorld, GridKey, BinaryHeapSampler<GridKey>> =
        Driver::new::<(MoveZeroIntoOne, WatchZero)>(world, sampler, rng, None);

    let outcome = driver.run(
        |w: &mut GridWorld| w.capture_state().notify(CaptureMode::Write, marker_addr()),
        |_, _, _, _| false,
    );

    assert_eq!(outcome, Outcome::Quiescent);
    let cap = CaptureState::new();
    assert_eq!(*driver.physical().walkers.index(0, &cap).position(&cap), OFF_BOARD);
    assert!(driver.enabled_keys().is_empty());
}

// ---------------------------------------------------------------------
// Ghost cancellation: a waiter disables at the watcher's firing, not its
// own clock.
// ---------------------------------------------------------------------

#[derive(Clone, Debug, Observed)]
struct Gate {
    #[chronosim(back_address)]
    back: BackAddress,
    open: bool,
}

struct GhostWorld {
    cap: CaptureState,
    gate: Gate,
}
impl Captured for GhostWorld {
    fn capture_state(&self) -> &CaptureState {
        &self.cap
    }
}

fn gate_addr() -> Address {
    Address::root().prepend(FieldTag::new("gate"))
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum GhostKey {
    Close,
    Wait,
}

#[derive(Clone, Debug)]
struct CloseGate;
impl EventType<GhostWorld, GhostKey> for CloseGate {
    fn precondition(&self, _state: &GhostWorld) -> bool {
        true
    }
    fn enable(&self, _state: &GhostWorld, now: f64) -> (Rc<dyn Distribution>, f64) {
        (Rc::new(Fixed(0.5)), now)
    }
    fn reenable(&self, _state: &GhostWorld, _first: f64, _now: f64) -> Option<(Rc<dyn Distribution>, f64)> {
        None
    }
    fn fire(&self, state: &mut GhostWorld, _now: f64, _rng: &mut StdRng) {
        state.gate.set_open(false, &state.cap);
    }
    fn is_immediate() -> bool {
        false
    }
    fn clock_key(&self) -> GhostKey {
        GhostKey::Close
    }
    fn generators() -> Vec<Generator<GhostWorld, GhostKey>> {
        vec![Generator::pattern(marker_addr(), |emit, _state, _idx| {
            emit(Box::new(CloseGate));
            emit(Box::new(WaitForGate));
        })]
    }
}

#[derive(Clone, Debug)]
struct WaitForGate;
impl EventType<GhostWorld, GhostKey> for WaitForGate {
    fn precondition(&self, state: &GhostWorld) -> bool {
        *state.gate.open(&state.cap)
    }
    fn enable(&self, _state: &GhostWorld, now: f64) -> (Rc<dyn Distribution>, f64) {
        (Rc::new(Fixed(100.0)), now)
    }
    fn reenable(&self, _state: &GhostWorld, _first: f64, _now: f64) -> Option<(Rc<dyn Distribution>, f64)> {
        None
    }
    fn fire(&self, _state: &mut GhostWorld, _now: f64, _rng: &mut StdRng) {}
    fn is_immediate() -> bool {
        false
    }
    fn clock_key(&self) -> GhostKey {
        GhostKey::Wait
    }
    fn generators() -> Vec<Generator<GhostWorld, GhostKey>> {
        Vec::new()
    }
}

#[test]
fn ghost_cancellation_disables_waiter_at_the_watchers_firing_not_its_own_clock() {
    let world = GhostWorld {
        cap: CaptureState::new(),
        gate: Gate {
            back: BackAddress::Attached(gate_addr()),
            open: true,
        },
    };
    let sampler = BinaryHeapSampler::new();
    let rng = StdRng::seed_from_u64(1);
    let mut driver: Driver<GhostWorld, GhostKey, BinaryHeapSampler<GhostKey>> =
        Driver::new::<(CloseGate, WaitForGate)>(world, sampler, rng, None);

    // WaitForGate was scheduled for t=100.0; if it only got cancelled by
    // being fired and failing its own precondition, this run would never
    // reach quiescence within any bounded number of steps. Reaching
    // Quiescent at all demonstrates it was cancelled during CloseGate's
    // reconciliation at t=0.5 instead.
    let outcome = driver.run(
        |w: &mut GhostWorld| w.capture_state().notify(CaptureMode::Write, marker_addr()),
        |_, _, _, _| false,
    );

    assert_eq!(outcome, Outcome::Quiescent);
    assert_eq!(driver.now(), 0.5);
    let cap = CaptureState::new();
    assert!(!*driver.physical().gate.open(&cap));
    assert!(driver.enabled_keys().is_empty());
}

// ---------------------------------------------------------------------
// Rate re-anchor: bumping a rate-dependency re-anchors the clock without
// touching the precondition.
// ---------------------------------------------------------------------

struct RateWorld {
    cap: CaptureState,
    speed: f64,
}
impl Captured for RateWorld {
    fn capture_state(&self) -> &CaptureState {
        &self.cap
    }
}

fn speed_addr() -> Address {
    Address::root().prepend(FieldTag::new("speed"))
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum RateKey {
    Tick,
    Bump,
}

#[derive(Clone, Debug)]
struct RateTick;
impl EventType<RateWorld, RateKey> for RateTick {
    fn precondition(&self, _state: &RateWorld) -> bool {
        true
    }
    fn enable(&self, state: &RateWorld, now: f64) -> (Rc<dyn Distribution>, f64) {
        state.cap.notify(CaptureMode::Read, speed_addr());
        (Rc::new(Fixed(10.0 / state.speed)), now)
    }
    fn reenable(&self, state: &RateWorld, _first_enabled: f64, now: f64) -> Option<(Rc<dyn Distribution>, f64)> {
        state.cap.notify(CaptureMode::Read, speed_addr());
        Some((Rc::new(Fixed(10.0 / state.speed)), now))
    }
    fn fire(&self, _state: &mut RateWorld, _now: f64, _rng: &mut StdRng) {}
    fn is_immediate() -> bool {
        false
    }
    fn clock_key(&self) -> RateKey {
        RateKey::Tick
    }
    fn generators() -> Vec<Generator<RateWorld, RateKey>> {
        vec![Generator::pattern(marker_addr(), |emit, _state, _idx| {
            emit(Box::new(RateTick));
            emit(Box::new(BumpSpeed));
        })]
    }
}

#[derive(Clone, Debug)]
struct BumpSpeed;
impl EventType<RateWorld, RateKey> for BumpSpeed {
    fn precondition(&self, _state: &RateWorld) -> bool {
        true
    }
    fn enable(&self, _state: &RateWorld, now: f64) -> (Rc<dyn Distribution>, f64) {
        (Rc::new(Fixed(1.0)), now)
    }
    fn reenable(&self, _state: &RateWorld, _first: f64, _now: f64) -> Option<(Rc<dyn Distribution>, f64)> {
        None
    }
    fn fire(&self, state: &mut RateWorld, _now: f64, _rng: &mut StdRng) {
        state.speed = 2.0;
        state.cap.notify(CaptureMode::Write, speed_addr());
    }
    fn is_immediate() -> bool {
        false
    }
    fn clock_key(&self) -> RateKey {
        RateKey::Bump
    }
    fn generators() -> Vec<Generator<RateWorld, RateKey>> {
        Vec::new()
    }
}

#[test]
fn rate_re_anchor_reflects_the_new_rate_without_touching_the_precondition() {
    let world = RateWorld {
        cap: CaptureState::new(),
        speed: 1.0,
    };
    let sampler = BinaryHeapSampler::new();
    let rng = StdRng::seed_from_u64(3);

    let log: Rc<RefCell<Vec<(f64, &'static str)>>> = Rc::new(RefCell::new(Vec::new()));
    let log_in_observer = Rc::clone(&log);
    let observer: Observer<RateWorld, RateKey> = Box::new(move |_s, now, event, _w| {
        if let Some(ev) = event {
            let label = if ev.clock_key() == RateKey::Tick { "tick" } else { "bump" };
            log_in_observer.borrow_mut().push((now, label));
        }
    });

    let mut driver: Driver<RateWorld, RateKey, BinaryHeapSampler<RateKey>> =
        Driver::new::<(RateTick, BumpSpeed)>(world, sampler, rng, Some(observer));

    // Stop right after the second firing: BumpSpeed at t=1.0, then the
    // re-anchored RateTick. Without the re-anchor, RateTick would still be
    // scheduled for its originally-drawn t=10.0 and this wouldn't be it.
    driver.run(
        |w: &mut RateWorld| w.capture_state().notify(CaptureMode::Write, marker_addr()),
        |_, step_idx, _, _| step_idx >= 2,
    );

    let entries = log.borrow();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], (1.0, "bump"));
    assert_eq!(entries[1], (6.0, "tick"));
}

// ---------------------------------------------------------------------
// Initialization: compound elements appended during init produce their
// enabled events immediately.
// ---------------------------------------------------------------------

#[derive(Clone, Debug, Observed)]
struct Spawned {
    #[chronosim(back_address)]
    back: BackAddress,
    active: bool,
}

struct SpawnWorld {
    cap: CaptureState,
    agents: Sequence<Spawned>,
}
impl Captured for SpawnWorld {
    fn capture_state(&self) -> &CaptureState {
        &self.cap
    }
}

fn spawn_agents_addr() -> Address {
    Address::root().prepend(FieldTag::new("agents"))
}

fn active_pattern() -> Address {
    spawn_agents_addr().append(IndexValue::Wildcard).append(FieldTag::new("active"))
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct SpawnKey(i64);

#[derive(Clone, Debug)]
struct SpawnedMove(i64);
impl EventType<SpawnWorld, SpawnKey> for SpawnedMove {
    fn precondition(&self, _state: &SpawnWorld) -> bool {
        true
    }
    fn enable(&self, _state: &SpawnWorld, now: f64) -> (Rc<dyn Distribution>, f64) {
        (Rc::new(Fixed(5.0)), now)
    }
    fn reenable(&self, _state: &SpawnWorld, _first: f64, _now: f64) -> Option<(Rc<dyn Distribution>, f64)> {
        None
    }
    fn fire(&self, _state: &mut SpawnWorld, _now: f64, _rng: &mut StdRng) {}
    fn is_immediate() -> bool {
        false
    }
    fn clock_key(&self) -> SpawnKey {
        SpawnKey(self.0)
    }
    fn generators() -> Vec<Generator<SpawnWorld, SpawnKey>> {
        vec![Generator::pattern(active_pattern(), |emit, _state, idx| {
            if let Some(IndexValue::Int(i)) = idx.first() {
                emit(Box::new(SpawnedMove(*i)));
            }
        })]
    }
}

#[test]
fn initializing_three_compound_elements_enables_exactly_three_spawned_moves() {
    let mut world = SpawnWorld {
        cap: CaptureState::new(),
        agents: Sequence::new(spawn_agents_addr()),
    };
    for _ in 0..3 {
        world.agents.append(
            Spawned {
                back: BackAddress::Detached,
                active: false,
            },
            &world.cap,
        );
    }

    let sampler = BinaryHeapSampler::new();
    let rng = StdRng::seed_from_u64(5);
    let mut driver: Driver<SpawnWorld, SpawnKey, BinaryHeapSampler<SpawnKey>> =
        Driver::new::<(SpawnedMove,)>(world, sampler, rng, None);

    driver.init(|w: &mut SpawnWorld| {
        for i in 0..3 {
            w.agents.index_mut(i).set_active(true, &w.cap);
        }
    });

    let keys = driver.enabled_keys();
    assert_eq!(keys.len(), 3);
    assert!(keys.contains(&SpawnKey(0)));
    assert!(keys.contains(&SpawnKey(1)));
    assert!(keys.contains(&SpawnKey(2)));
}
