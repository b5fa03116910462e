//! Scoped read/write capture over a physical state.

use std::cell::RefCell;

use indexmap::IndexSet;

use crate::address::Address;

/// Which multiset a capture is currently recording into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureMode {
    Read,
    Write,
}

/// The single accumulator slot a [`Captured`] state exposes. Non-reentrant:
/// only one slot may be active at a time.
///
/// Wrapped in a [`RefCell`] so a notification can be recorded through a
/// shared `&self` — `precondition`/`enable`/`reenable` only ever see `&S`,
/// so every accessor that might run from one of those callbacks has to
/// notify without a `&mut` path back to this slot.
#[derive(Default, Clone)]
pub struct CaptureState {
    active: RefCell<Option<(CaptureMode, IndexSet<Address>)>>,
}

impl CaptureState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: RefCell::new(None),
        }
    }

    /// Appends `addr` to the active accumulator if one is recording in
    /// `kind`. A write performed while a read-capture is active (or vice
    /// versa) is silently dropped: only the access kind matching the open
    /// scope is ever meant to be observed by it.
    pub fn notify(&self, kind: CaptureMode, addr: Address) {
        if let Some((mode, log)) = self.active.borrow_mut().as_mut() {
            if *mode == kind {
                log.insert(addr);
            }
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.borrow().is_some()
    }
}

/// Anything that exposes a [`CaptureState`] so the free functions below can
/// scope a capture around a user callback. Implemented by the physical
/// state root (and transitively reachable by every observed container via
/// its back-address).
pub trait Captured {
    fn capture_state(&self) -> &CaptureState;
}

/// Runs `callback` inside a freshly-opened capture slot, guaranteeing the
/// slot is cleared again before returning — including when `callback`
/// panics (e.g. a rejected nested capture), via `catch_unwind` rather than
/// a raw-pointer drop guard (this crate forbids `unsafe_code` workspace-wide).
fn with_capture<S: Captured, R>(
    state: &mut S,
    mode: CaptureMode,
    callback: impl FnOnce(&mut S) -> R,
) -> (R, IndexSet<Address>) {
    {
        let cap = state.capture_state();
        assert!(
            !cap.is_active(),
            "nested {mode:?} capture attempted while a capture was already active; \
             captures are not reentrant"
        );
        *cap.active.borrow_mut() = Some((mode, IndexSet::new()));
    }

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(state)));

    // Take the log back out, then clear the slot regardless of outcome so a
    // panicking callback never leaves the next capture attempt thinking one
    // is still open.
    let log = state
        .capture_state()
        .active
        .borrow_mut()
        .take()
        .expect("capture slot was cleared during the callback, which should be impossible")
        .1;

    match outcome {
        Ok(result) => (result, log),
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

/// Runs `callback` with a fresh read-capture scope, returning its result
/// alongside the ordered set of addresses read.
///
/// # Panics
/// Panics if a capture is already active on `state` (nesting is
/// unsupported).
pub fn with_read_capture<S: Captured, R>(
    state: &mut S,
    callback: impl FnOnce(&mut S) -> R,
) -> (R, IndexSet<Address>) {
    with_capture(state, CaptureMode::Read, callback)
}

/// Runs `callback` with a fresh write-capture scope, returning its result
/// alongside the ordered set of addresses written.
///
/// # Panics
/// Panics if a capture is already active on `state`.
pub fn with_write_capture<S: Captured, R>(
    state: &mut S,
    callback: impl FnOnce(&mut S) -> R,
) -> (R, IndexSet<Address>) {
    with_capture(state, CaptureMode::Write, callback)
}

impl std::fmt::Debug for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureMode::Read => write!(f, "read"),
            CaptureMode::Write => write!(f, "write"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Root {
        cap: CaptureState,
    }
    impl Captured for Root {
        fn capture_state(&self) -> &CaptureState {
            &self.cap
        }
    }

    #[test]
    fn captures_are_order_preserving_and_deduped() {
        let mut root = Root {
            cap: CaptureState::new(),
        };
        let a = Address::root().prepend(1i64);
        let b = Address::root().prepend(2i64);
        let (_, reads) = with_read_capture(&mut root, |r| {
            r.capture_state().notify(CaptureMode::Read, a.clone());
            r.capture_state().notify(CaptureMode::Read, b.clone());
            r.capture_state().notify(CaptureMode::Read, a.clone());
        });
        assert_eq!(reads.into_iter().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    #[should_panic(expected = "nested")]
    fn nested_capture_is_fatal() {
        let mut root = Root {
            cap: CaptureState::new(),
        };
        with_read_capture(&mut root, |r| {
            with_read_capture(r, |_| {});
        });
    }

    #[test]
    fn rejected_nested_capture_leaves_outer_log_untouched() {
        let mut root = Root {
            cap: CaptureState::new(),
        };
        let a = Address::root().prepend(1i64);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            with_read_capture(&mut root, |r| {
                r.capture_state().notify(CaptureMode::Read, a.clone());
                let _ = with_read_capture(r, |_| {});
            })
        }));
        assert!(result.is_err());
        // The guard cleared the slot on unwind; the outer accumulator was
        // never corrupted by the rejected inner attempt because the inner
        // attempt panicked before installing anything.
        assert!(!root.capture_state().is_active());
    }

    #[test]
    fn scope_clears_on_exit() {
        let mut root = Root {
            cap: CaptureState::new(),
        };
        let _ = with_write_capture(&mut root, |_| {});
        assert!(!root.capture_state().is_active());
    }
}
