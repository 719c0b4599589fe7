//! Lens Implementation
//!
//! A [`Lens`] focuses a value of type `T` inside a parent of type `P`. It is
//! a pair of functions plus an id:
//!
//! - `get(&P) -> T` reads the focus,
//! - `set(P, T) -> P` returns a parent with the focus replaced.
//!
//! A well-behaved lens satisfies `get(set(p, v)) == v` and
//! `set(p, get(p)) == p`. Lenses compose with `+`: `Lens<P, T> + Lens<T, X>`
//! gives `Lens<P, X>`. Composition only captures the two halves; nothing is
//! evaluated until `get` or `set` is called.
//!
//! Lenses are immutable and cheap to clone, so one lens can back any number
//! of derived stores.

use std::fmt;
use std::future::Future;
use std::ops::Add;
use std::sync::Arc;

use crate::error::{LensError, TransitionError};

type Getter<P, T> = Arc<dyn Fn(&P) -> Result<T, LensError> + Send + Sync>;
type Setter<P, T> = Arc<dyn Fn(P, T) -> Result<P, LensError> + Send + Sync>;

/// Join two ids with a dot, dropping dangling separators.
pub(crate) fn join_ids(parent: &str, child: &str) -> String {
    format!("{parent}.{child}").trim_matches('.').to_string()
}

/// Bidirectional accessor focusing a `T` inside a `P`.
///
/// # Example
///
/// ```rust
/// use lattice_store::lens::Lens;
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Point { x: i32, y: i32 }
///
/// let x = Lens::new("x", |p: &Point| p.x, |p: Point, x| Point { x, ..p });
///
/// let p = Point { x: 1, y: 2 };
/// assert_eq!(x.get(&p).unwrap(), 1);
/// assert_eq!(x.set(p, 7).unwrap(), Point { x: 7, y: 2 });
/// ```
pub struct Lens<P, T> {
    id: String,
    get: Getter<P, T>,
    set: Setter<P, T>,
}

impl<P, T> Lens<P, T>
where
    P: 'static,
    T: 'static,
{
    /// Create a lens from a total getter and setter.
    pub fn new<G, S>(id: impl Into<String>, get: G, set: S) -> Self
    where
        G: Fn(&P) -> T + Send + Sync + 'static,
        S: Fn(P, T) -> P + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            get: Arc::new(move |p| Ok(get(p))),
            set: Arc::new(move |p, v| Ok(set(p, v))),
        }
    }

    /// Create a lens whose target may be absent.
    pub fn try_new<G, S>(id: impl Into<String>, get: G, set: S) -> Self
    where
        G: Fn(&P) -> Result<T, LensError> + Send + Sync + 'static,
        S: Fn(P, T) -> Result<P, LensError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read the focused value.
    pub fn get(&self, parent: &P) -> Result<T, LensError> {
        (self.get)(parent)
    }

    /// Return `parent` with the focused value replaced by `value`.
    pub fn set(&self, parent: P, value: T) -> Result<P, LensError> {
        (self.set)(parent, value)
    }

    /// Replace the focused value with `f` applied to it.
    pub fn update<F>(&self, parent: P, f: F) -> Result<P, LensError>
    where
        F: FnOnce(T) -> T,
    {
        let value = self.get(&parent)?;
        self.set(parent, f(value))
    }

    /// Asynchronous [`update`](Self::update): `set(parent, mapper(get(parent)).await)`.
    pub async fn apply<F, Fut>(&self, parent: P, mapper: F) -> Result<P, TransitionError>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = T>,
    {
        let value = self.get(&parent)?;
        let next = mapper(value).await;
        Ok(self.set(parent, next)?)
    }

    /// Focus further into the target of this lens.
    pub fn compose<X>(&self, other: &Lens<T, X>) -> Lens<P, X>
    where
        X: 'static,
    {
        let (outer_get, inner_get) = (Arc::clone(&self.get), Arc::clone(&other.get));
        let (outer_get_for_set, outer_set, inner_set) = (
            Arc::clone(&self.get),
            Arc::clone(&self.set),
            Arc::clone(&other.set),
        );

        Lens {
            id: join_ids(&self.id, &other.id),
            get: Arc::new(move |p| inner_get(&outer_get(p)?)),
            set: Arc::new(move |p, x| {
                let focus = outer_get_for_set(&p)?;
                let focus = inner_set(focus, x)?;
                outer_set(p, focus)
            }),
        }
    }
}

impl<P, T> Clone for Lens<P, T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<P, T> fmt::Debug for Lens<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lens").field("id", &self.id).finish()
    }
}

impl<P, T, X> Add<Lens<T, X>> for Lens<P, T>
where
    P: 'static,
    T: 'static,
    X: 'static,
{
    type Output = Lens<P, X>;

    fn add(self, rhs: Lens<T, X>) -> Self::Output {
        self.compose(&rhs)
    }
}

impl<'a, P, T, X> Add<&'a Lens<T, X>> for &'a Lens<P, T>
where
    P: 'static,
    T: 'static,
    X: 'static,
{
    type Output = Lens<P, X>;

    fn add(self, rhs: &'a Lens<T, X>) -> Self::Output {
        self.compose(rhs)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
