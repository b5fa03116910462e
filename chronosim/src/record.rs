//! Support trait targeted by `#[derive(Observed)]`.

use crate::address::FieldTag;
use crate::back_address::BackAddress;
use crate::capture::{CaptureMode, CaptureState};

/// Implemented by every `#[derive(Observed)]` record type. The derive
/// macro also emits a matching `impl Element for YourType`
/// ([`crate::element::Element`]) that wires `reseat`/`detach` through
/// [`ObservedRecord::back_address_mut`] and [`ObservedRecord::notify_all`].
pub trait ObservedRecord {
    fn back_address(&self) -> &BackAddress;
    fn back_address_mut(&mut self) -> &mut BackAddress;

    /// The field tags declared on this record, in declaration order.
    fn field_tags() -> &'static [FieldTag]
    where
        Self: Sized;

    /// Emits a write notification for every field of this record: used
    /// when the record leaves a live container slot, since its removal or
    /// reindexing invalidates any dependency that read one of its field
    /// addresses.
    fn notify_all(&self, cap: &CaptureState)
    where
        Self: Sized,
    {
        let Some(addr) = self.back_address().as_address() else {
            return;
        };
        for tag in Self::field_tags() {
            cap.notify(CaptureMode::Write, addr.append(tag.clone()));
        }
    }
}
