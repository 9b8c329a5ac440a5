//! Per-request scratch store.
//!
//! Handlers earlier in a chain pass data to later ones through [`Values`].
//! Entries are keyed by name or by type, and lookups say explicitly whether
//! the key was missing or held a value of another type.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Key of a [`Values`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// String key, e.g. `"user"`.
    Name(Cow<'static, str>),
    /// Type key, one slot per type.
    Type(TypeId),
}

impl Key {
    /// Creates a string key.
    pub fn name(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Name(name.into())
    }

    /// Creates the type key for `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self::Type(TypeId::of::<T>())
    }
}

impl From<&'static str> for Key {
    fn from(name: &'static str) -> Self {
        Self::Name(Cow::Borrowed(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Name(Cow::Owned(name))
    }
}

/// Result of a [`Values`] lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The key holds a value of the requested type.
    Found(T),
    /// Nothing is stored under the key.
    Missing,
    /// The key holds a value of another type.
    WrongType,
}

impl<T> Lookup<T> {
    /// Converts into an `Option`, discarding the failure reason.
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            Self::Missing | Self::WrongType => None,
        }
    }

    /// Returns true for [`Lookup::Found`].
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Returns true for [`Lookup::Missing`].
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Returns true for [`Lookup::WrongType`].
    pub const fn is_wrong_type(&self) -> bool {
        matches!(self, Self::WrongType)
    }
}

/// Typed key/value store scoped to one request.
///
/// ```
/// use gantry_core::{Lookup, Values};
///
/// let mut values = Values::new();
/// values.insert("mw", true);
///
/// assert_eq!(values.get::<bool>("mw"), Lookup::Found(&true));
/// assert!(values.get::<String>("mw").is_wrong_type());
/// assert!(values.get::<bool>("other").is_missing());
/// ```
#[derive(Default)]
pub struct Values {
    entries: HashMap<Key, Box<dyn Any + Send>>,
}

impl Values {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn insert<T: Any + Send>(&mut self, key: impl Into<Key>, value: T) {
        self.entries.insert(key.into(), Box::new(value));
    }

    /// Looks up the value under `key` as a `T`.
    pub fn get<T: Any>(&self, key: impl Into<Key>) -> Lookup<&T> {
        match self.entries.get(&key.into()) {
            None => Lookup::Missing,
            Some(v) => v.downcast_ref().map_or(Lookup::WrongType, Lookup::Found),
        }
    }

    /// Looks up the value under `key` as a mutable `T`.
    pub fn get_mut<T: Any>(&mut self, key: impl Into<Key>) -> Lookup<&mut T> {
        match self.entries.get_mut(&key.into()) {
            None => Lookup::Missing,
            Some(v) => v.downcast_mut().map_or(Lookup::WrongType, Lookup::Found),
        }
    }

    /// Removes the entry under `key`, returning whether one existed.
    pub fn remove(&mut self, key: impl Into<Key>) -> bool {
        self.entries.remove(&key.into()).is_some()
    }

    /// Returns true if anything is stored under `key`.
    pub fn contains(&self, key: impl Into<Key>) -> bool {
        self.entries.contains_key(&key.into())
    }

    /// Stores `value` in the slot for its type.
    pub fn insert_typed<T: Any + Send>(&mut self, value: T) {
        self.insert(Key::of::<T>(), value);
    }

    /// Returns the value in the slot for `T`.
    pub fn typed<T: Any>(&self) -> Option<&T> {
        self.get(Key::of::<T>()).found()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Debug for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
