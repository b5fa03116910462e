//! The primitive/compound element split that every container variant
//! dispatches on.

use crate::address::Address;
use crate::capture::CaptureState;

/// A value storable in an observed [`crate::containers`] container.
///
/// Primitive elements (`impl_primitive_element!`) are inert: the
/// *container* notifies on their behalf, and `reseat`/`detach` are no-ops.
/// Compound elements (emitted by `#[derive(Observed)]`) carry their own
/// back-address and are reseated/detached by the container instead of
/// being notified about directly.
pub trait Element: Clone {
    /// `true` for primitive elements: the owning container emits a
    /// `(.., index)` notification itself on `getindex`/`setindex`.
    /// `false` for compound elements: the container only maintains the
    /// element's back-address, and subsequent field accesses notify.
    const NOTIFIES_AT_INDEX: bool;

    /// Called by the owning container whenever this element is (re)seated
    /// at `addr` — on insert, and on any shift that changes its index.
    fn reseat(&mut self, addr: Address);

    /// Called when the element leaves a live slot without being
    /// reinserted elsewhere. Compound elements must clear their
    /// back-address and emit a write notification for every one of their
    /// fields (`notify_all`); primitives do nothing.
    fn detach(&mut self, cap: &CaptureState);

    /// Whether this element already occupies a live slot elsewhere.
    /// Primitives carry no back-address and always report `false`;
    /// compound elements (via the derive macro) delegate to their own
    /// `ObservedRecord::back_address`. Containers use this to refuse an
    /// insert that would silently steal a value out from under its
    /// current owner.
    fn is_attached(&self) -> bool {
        false
    }
}

/// Implements the primitive [`Element`] behavior (no back-address, no
/// `notify_all`) for a concrete value type.
#[macro_export]
macro_rules! impl_primitive_element {
    ($($t:ty),+ $(,)?) => {
        $(
            impl $crate::element::Element for $t {
                const NOTIFIES_AT_INDEX: bool = true;

                fn reseat(&mut self, _addr: $crate::address::Address) {}

                fn detach(&mut self, _cap: &$crate::capture::CaptureState) {}
            }
        )+
    };
}

impl_primitive_element!(
    bool, char, String, f32, f64, i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, usize, isize
);

impl<T: Element> Element for Option<T> {
    const NOTIFIES_AT_INDEX: bool = T::NOTIFIES_AT_INDEX;

    fn reseat(&mut self, addr: Address) {
        if let Some(inner) = self.as_mut() {
            inner.reseat(addr);
        }
    }

    fn detach(&mut self, cap: &CaptureState) {
        if let Some(inner) = self.as_mut() {
            inner.detach(cap);
        }
    }

    fn is_attached(&self) -> bool {
        self.as_ref().is_some_and(Element::is_attached)
    }
}
