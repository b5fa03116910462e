//! chronosim is the coordination core of a stochastic, continuous-time,
//! discrete-event simulation engine: observed state containers, an
//! event-generator index, a bipartite dependency network, and the
//! simulation driver that keeps them all coherent after every firing.
//!
//! A model is a physical state type (built from [`containers`] and
//! `#[derive(Observed)]` records) plus a set of [`event::EventType`]
//! implementations. The [`driver::Driver`] samples a trajectory by
//! repeatedly asking an external [`sampler::Sampler`] for the next event,
//! firing it, and reconciling the enabled-event set, dependency network,
//! and sampler against whatever addresses the firing wrote.
//!
//! Probability distributions, the sampler's internal scheduling structure
//! (beyond the bundled reference [`sampler::BinaryHeapSampler`]), and
//! likelihood-of-trajectory computation are intentionally out of scope;
//! see the module docs for the contracts this crate expects from them.

pub mod address;
pub mod back_address;
pub mod capture;
pub mod containers;
pub mod deps;
pub mod driver;
pub mod element;
pub mod event;
pub mod generators;
pub mod record;
pub mod sampler;

pub use address::{Address, AddrElem, FieldTag, IndexValue};
pub use back_address::BackAddress;
pub use capture::{with_read_capture, with_write_capture, CaptureMode, CaptureState, Captured};
pub use containers::{Mapping, Sequence, Set};
pub use deps::DepNet;
pub use driver::{Driver, Observer, Outcome};
pub use element::Element;
pub use event::{BoxedEvent, ClockKey, Distribution, EventType, EventTypeList, EventValue};
pub use generators::{EventTag, Generator, GeneratorIndex};
pub use record::ObservedRecord;
pub use sampler::{BinaryHeapSampler, Sampler};

/// Derives [`record::ObservedRecord`] and [`element::Element`] for a
/// struct of named fields, each of which must itself implement
/// [`element::Element`] — a record type with its own owner back-address.
///
/// ```ignore
/// #[derive(Clone, Debug, chronosim::Observed)]
/// struct Agent {
///     #[chronosim(back_address)]
///     back: chronosim::BackAddress,
///     health: i64,
///     location: (i64, i64),
/// }
/// ```
pub use chronosim_macros::Observed;
