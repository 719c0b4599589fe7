//! Collection and Variant Lenses
//!
//! Ready-made lenses for the shapes application models are built from:
//!
//! - [`lens_of_element`]: the element of a list carrying a given id,
//! - [`lens_of_index`]: the element at a position,
//! - [`lens_of_key`]: the value stored under a map key,
//! - [`lens_of_variant`]: one variant of an enum,
//! - [`lens_with_default`]: an optional value read with a fallback.
//!
//! None of them insert on write: setting an absent index, key or id is a
//! [`LensError::NotFound`]. Two list elements sharing the requested id are
//! a [`LensError::Ambiguous`]; the lens never picks one of them.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::hash::{BuildHasher, Hash};

use indexmap::IndexMap;

use super::base::Lens;
use crate::error::LensError;

/// Position of the single element whose id equals `id`.
fn position_of<T, I, F>(lens: &str, items: &[T], id: &I, id_of: &F) -> Result<usize, LensError>
where
    I: PartialEq,
    F: Fn(&T) -> I,
{
    let mut matches = items
        .iter()
        .enumerate()
        .filter(|(_, item)| id_of(item) == *id)
        .map(|(index, _)| index);

    let first = matches
        .next()
        .ok_or_else(|| LensError::not_found(lens, "no element with this id"))?;
    let others = matches.count();
    if others > 0 {
        return Err(LensError::Ambiguous {
            lens: lens.to_string(),
            matches: others + 1,
        });
    }
    Ok(first)
}

/// Focus the element of a list whose extracted id equals `id`.
///
/// The lens id is `id` rendered with `Display`.
pub fn lens_of_element<T, I, F>(id: I, id_of: F) -> Lens<Vec<T>, T>
where
    T: Clone + 'static,
    I: PartialEq + Display + Send + Sync + 'static,
    F: Fn(&T) -> I + Send + Sync + Clone + 'static,
{
    let lens_id = id.to_string();
    let id = std::sync::Arc::new(id);
    let (get_id, get_lens, get_id_of) = (id.clone(), lens_id.clone(), id_of.clone());

    Lens::try_new(
        lens_id.clone(),
        move |items: &Vec<T>| {
            let index = position_of(&get_lens, items, &*get_id, &get_id_of)?;
            Ok(items[index].clone())
        },
        move |mut items: Vec<T>, value: T| {
            let index = position_of(&lens_id, &items, &*id, &id_of)?;
            items[index] = value;
            Ok(items)
        },
    )
}

/// Focus the element of a list at `index`.
pub fn lens_of_index<T>(index: usize) -> Lens<Vec<T>, T>
where
    T: Clone + 'static,
{
    fn out_of_range(index: usize, len: usize) -> LensError {
        LensError::not_found(&index.to_string(), format!("index {index} out of 0..{len}"))
    }

    Lens::try_new(
        index.to_string(),
        move |items: &Vec<T>| {
            items
                .get(index)
                .cloned()
                .ok_or_else(|| out_of_range(index, items.len()))
        },
        move |mut items: Vec<T>, value: T| match items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(items)
            }
            None => Err(out_of_range(index, items.len())),
        },
    )
}

/// Maps that can back a [`lens_of_key`].
pub trait KeyedCollection<K, V> {
    fn lookup(&self, key: &K) -> Option<&V>;

    fn lookup_mut(&mut self, key: &K) -> Option<&mut V>;
}

impl<K, V, S> KeyedCollection<K, V> for HashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn lookup(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn lookup_mut(&mut self, key: &K) -> Option<&mut V> {
        self.get_mut(key)
    }
}

impl<K, V> KeyedCollection<K, V> for BTreeMap<K, V>
where
    K: Ord,
{
    fn lookup(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn lookup_mut(&mut self, key: &K) -> Option<&mut V> {
        self.get_mut(key)
    }
}

impl<K, V, S> KeyedCollection<K, V> for IndexMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn lookup(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn lookup_mut(&mut self, key: &K) -> Option<&mut V> {
        self.get_mut(key)
    }
}

/// Focus the value stored under `key`. Writing never inserts.
pub fn lens_of_key<M, K, V>(key: K) -> Lens<M, V>
where
    M: KeyedCollection<K, V> + 'static,
    K: Display + Send + Sync + 'static,
    V: Clone + 'static,
{
    let lens_id = key.to_string();
    let key = std::sync::Arc::new(key);
    let (get_key, get_lens) = (key.clone(), lens_id.clone());

    Lens::try_new(
        lens_id.clone(),
        move |map: &M| {
            map.lookup(&get_key)
                .cloned()
                .ok_or_else(|| LensError::not_found(&get_lens, "key absent"))
        },
        move |mut map: M, value: V| {
            match map.lookup_mut(&key) {
                Some(slot) => *slot = value,
                None => return Err(LensError::not_found(&lens_id, "key absent")),
            }
            Ok(map)
        },
    )
}

/// Focus one variant of `P`.
///
/// `narrow` extracts the variant's payload and fails with `NotFound` when the
/// parent holds another variant. Writing always succeeds: the parent is
/// replaced by `widen(value)`.
pub fn lens_of_variant<P, T, N, W>(id: impl Into<String>, narrow: N, widen: W) -> Lens<P, T>
where
    P: 'static,
    T: 'static,
    N: Fn(&P) -> Option<T> + Send + Sync + 'static,
    W: Fn(T) -> P + Send + Sync + 'static,
{
    let id = id.into();
    let lens_id = id.clone();
    Lens::try_new(
        id,
        move |parent: &P| {
            narrow(parent)
                .ok_or_else(|| LensError::not_found(&lens_id, "parent holds another variant"))
        },
        move |_parent: P, value: T| Ok(widen(value)),
    )
}

/// Read an optional value, substituting `default` when it is absent.
///
/// Writing `default` back stores `None`.
pub fn lens_with_default<T>(id: impl Into<String>, default: T) -> Lens<Option<T>, T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let read_default = default.clone();
    Lens::new(
        id,
        move |parent: &Option<T>| parent.clone().unwrap_or_else(|| read_default.clone()),
        move |_parent: Option<T>, value: T| if value == default { None } else { Some(value) },
    )
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
