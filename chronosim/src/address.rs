//! Addresses: the immutable tuples that identify one slot of the physical
//! state.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// A field name wrapped so that it can never collide with an [`IndexValue`]
/// used as a container key, even when that key happens to be a string that
/// reads the same as a field name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldTag(pub &'static str);

impl FieldTag {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }
}

impl fmt::Display for FieldTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The index half of an address element: integers, integer tuples,
/// strings, symbols, or user keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IndexValue {
    Int(i64),
    IntPair(i64, i64),
    Str(Arc<str>),
    /// A position inside a masked generator pattern; never appears in a
    /// concrete address, only in a [`Pattern`](crate::generators::Pattern).
    Wildcard,
    /// Escape hatch for user-defined key types that are `Hash + Eq` but not
    /// one of the built-in shapes above.
    User(Arc<dyn UserKey>),
}

impl PartialEq<i64> for IndexValue {
    fn eq(&self, other: &i64) -> bool {
        matches!(self, IndexValue::Int(v) if v == other)
    }
}

impl From<i64> for IndexValue {
    fn from(v: i64) -> Self {
        IndexValue::Int(v)
    }
}

impl From<usize> for IndexValue {
    #[allow(clippy::cast_possible_wrap)]
    fn from(v: usize) -> Self {
        IndexValue::Int(v as i64)
    }
}

impl From<&str> for IndexValue {
    fn from(v: &str) -> Self {
        IndexValue::Str(Arc::from(v))
    }
}

impl From<String> for IndexValue {
    fn from(v: String) -> Self {
        IndexValue::Str(Arc::from(v.as_str()))
    }
}

/// A user-defined mapping key, type-erased so [`IndexValue::User`] can be
/// stored in a plain address tuple.
pub trait UserKey: fmt::Debug + Send + Sync + 'static {
    fn dyn_eq(&self, other: &dyn UserKey) -> bool;
    fn dyn_hash(&self, state: &mut dyn std::hash::Hasher);
}

impl<T> UserKey for T
where
    T: fmt::Debug + Eq + Hash + Send + Sync + 'static,
{
    fn dyn_eq(&self, other: &dyn UserKey) -> bool {
        (other as &dyn std::any::Any)
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn dyn_hash(&self, mut state: &mut dyn std::hash::Hasher) {
        Hash::hash(self, &mut state);
    }
}

impl PartialEq for dyn UserKey {
    fn eq(&self, other: &Self) -> bool {
        self.dyn_eq(other)
    }
}
impl Eq for dyn UserKey {}
impl Hash for dyn UserKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.dyn_hash(state);
    }
}

/// One element of an [`Address`]: either a field tag or an index value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AddrElem {
    Field(FieldTag),
    Index(IndexValue),
}

impl From<FieldTag> for AddrElem {
    fn from(tag: FieldTag) -> Self {
        AddrElem::Field(tag)
    }
}

impl<T: Into<IndexValue>> From<T> for AddrElem {
    fn from(v: T) -> Self {
        AddrElem::Index(v.into())
    }
}

/// An immutable ordered tuple identifying one slot of the state.
///
/// Cheaply cloneable: the element vector is shared via [`Arc`] since
/// addresses are copied into capture accumulators, generator masks, and
/// dependency-network keys far more often than they are built.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address(Arc<[AddrElem]>);

impl Address {
    #[must_use]
    pub fn root() -> Self {
        Self(Arc::from(Vec::new()))
    }

    #[must_use]
    pub fn from_elems(elems: Vec<AddrElem>) -> Self {
        Self(Arc::from(elems))
    }

    /// Returns a new address with `elem` appended to the front, i.e. the
    /// address as seen one level further up the container tree. Used to
    /// route a notification up toward the root.
    #[must_use]
    pub fn prepend(&self, elem: impl Into<AddrElem>) -> Self {
        let mut v = Vec::with_capacity(self.0.len() + 1);
        v.push(elem.into());
        v.extend(self.0.iter().cloned());
        Self(Arc::from(v))
    }

    /// Returns a new address with `elem` appended to the end, i.e. one
    /// level further *into* whatever slot `self` denotes (used to turn a
    /// container-slot address into a field address).
    #[must_use]
    pub fn append(&self, elem: impl Into<AddrElem>) -> Self {
        let mut v: Vec<AddrElem> = self.0.iter().cloned().collect();
        v.push(elem.into());
        Self(Arc::from(v))
    }

    #[must_use]
    pub fn elems(&self) -> &[AddrElem] {
        &self.0
    }

    /// Replaces every [`AddrElem::Index`] with [`IndexValue::Wildcard`],
    /// for generator pattern lookup.
    #[must_use]
    pub fn masked(&self) -> Self {
        let v = self
            .0
            .iter()
            .map(|e| match e {
                AddrElem::Field(tag) => AddrElem::Field(tag.clone()),
                AddrElem::Index(_) => AddrElem::Index(IndexValue::Wildcard),
            })
            .collect();
        Self(Arc::from(v as Vec<_>))
    }

    /// The index values in positional order, used to pass matched indices
    /// as positional arguments to a pattern generator closure.
    #[must_use]
    pub fn index_values(&self) -> Vec<&IndexValue> {
        self.0
            .iter()
            .filter_map(|e| match e {
                AddrElem::Index(v) => Some(v),
                AddrElem::Field(_) => None,
            })
            .collect()
    }

    /// Owned variant of [`Address::index_values`], for callers (like the
    /// generator index) that need a standalone slice to hand a closure.
    #[must_use]
    pub fn index_values_owned(&self) -> Vec<IndexValue> {
        self.index_values().into_iter().cloned().collect()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match e {
                AddrElem::Field(tag) => write!(f, "{tag}")?,
                AddrElem::Index(IndexValue::Int(v)) => write!(f, "{v}")?,
                AddrElem::Index(IndexValue::IntPair(a, b)) => write!(f, "({a},{b})")?,
                AddrElem::Index(IndexValue::Str(s)) => write!(f, "{s:?}")?,
                AddrElem::Index(IndexValue::Wildcard) => write!(f, "*")?,
                AddrElem::Index(IndexValue::User(u)) => write!(f, "{u:?}")?,
            }
        }
        write!(f, ")")
    }
}
