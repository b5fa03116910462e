//! Back-addresses: the mutable pointer every observed container (and every
//! compound element) carries toward its own current slot.

use crate::address::Address;

/// The address a container or compound element currently occupies, or
/// [`BackAddress::Detached`] if it has been removed from its container and
/// not reinserted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BackAddress {
    #[default]
    Detached,
    Attached(Address),
}

impl BackAddress {
    #[must_use]
    pub fn root() -> Self {
        Self::Attached(Address::root())
    }

    #[must_use]
    pub const fn is_attached(&self) -> bool {
        matches!(self, Self::Attached(_))
    }

    /// The address of a named field on the element currently seated at
    /// this back-address, or `None` if detached, in which case the
    /// mutation goes silently untracked.
    #[must_use]
    pub fn field(&self, tag: crate::address::FieldTag) -> Option<Address> {
        match self {
            Self::Detached => None,
            Self::Attached(addr) => Some(addr.append(tag)),
        }
    }

    #[must_use]
    pub fn as_address(&self) -> Option<&Address> {
        match self {
            Self::Detached => None,
            Self::Attached(addr) => Some(addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::FieldTag;

    #[test]
    fn detached_field_access_yields_none() {
        let back = BackAddress::Detached;
        assert_eq!(back.field(FieldTag::new("health")), None);
    }

    #[test]
    fn attached_field_prepends_relative_to_slot() {
        let back = BackAddress::Attached(Address::root().prepend(3i64).prepend(FieldTag::new("agents")));
        let f = back.field(FieldTag::new("health")).unwrap();
        assert_eq!(format!("{f}"), "(agents, 3, health)");
    }
}
