//! Typed Scope Registry
//!
//! A [`Scope`] carries contextual values (theme, locale, form state, ...)
//! down a mounted tree without ambient globals. Entries are addressed by a
//! [`ScopeKey<V>`], whose value type is part of the key, so insertion and
//! lookup are checked by the compiler:
//!
//! ```rust
//! use lattice_store::reactive::{Scope, ScopeKey};
//!
//! const DEPTH: ScopeKey<usize> = ScopeKey::new("depth");
//!
//! let mut scope = Scope::new();
//! scope.set(&DEPTH, 2);
//! assert_eq!(scope.get(&DEPTH), Some(&2));
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexMap;

/// Key of a scope entry holding a `V`.
pub struct ScopeKey<V> {
    name: &'static str,
    _value: PhantomData<fn() -> V>,
}

impl<V> ScopeKey<V> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _value: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<V> Clone for ScopeKey<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for ScopeKey<V> {}

impl<V> fmt::Debug for ScopeKey<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeKey({})", self.name)
    }
}

/// Keys with the same name but different value types never collide.
type Slot = (&'static str, TypeId);

/// Immutable-by-default map of contextual values.
///
/// Cloning is cheap: values are shared. A child scope is made by cloning the
/// parent and setting additional entries.
#[derive(Clone, Default)]
pub struct Scope {
    entries: IndexMap<Slot, Arc<dyn Any + Send + Sync>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for `key`.
    pub fn set<V>(&mut self, key: &ScopeKey<V>, value: V)
    where
        V: Any + Send + Sync,
    {
        self.entries
            .insert((key.name, TypeId::of::<V>()), Arc::new(value));
    }

    /// Builder-style [`set`](Self::set).
    pub fn with<V>(mut self, key: &ScopeKey<V>, value: V) -> Self
    where
        V: Any + Send + Sync,
    {
        self.set(key, value);
        self
    }

    pub fn get<V>(&self, key: &ScopeKey<V>) -> Option<&V>
    where
        V: Any + Send + Sync,
    {
        self.entries
            .get(&(key.name, TypeId::of::<V>()))
            .and_then(|value| value.downcast_ref::<V>())
    }

    pub fn contains<V>(&self, key: &ScopeKey<V>) -> bool
    where
        V: Any + Send + Sync,
    {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.keys().map(|(name, _)| name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABEL: ScopeKey<String> = ScopeKey::new("label");
    const LABEL_LEN: ScopeKey<usize> = ScopeKey::new("label");

    #[test]
    fn typed_lookup() {
        let scope = Scope::new().with(&LABEL, "name".to_string());

        assert_eq!(scope.get(&LABEL).map(String::as_str), Some("name"));
        assert!(!scope.contains(&LABEL_LEN));
    }

    #[test]
    fn same_name_different_type_does_not_collide() {
        let mut scope = Scope::new();
        scope.set(&LABEL, "x".to_string());
        scope.set(&LABEL_LEN, 1);

        assert_eq!(scope.len(), 2);
        assert_eq!(scope.get(&LABEL_LEN), Some(&1));
    }

    #[test]
    fn child_scope_does_not_touch_parent() {
        let parent = Scope::new().with(&LABEL_LEN, 1);
        let child = parent.clone().with(&LABEL_LEN, 2);

        assert_eq!(parent.get(&LABEL_LEN), Some(&1));
        assert_eq!(child.get(&LABEL_LEN), Some(&2));
    }
}
