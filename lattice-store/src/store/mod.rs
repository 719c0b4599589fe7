//! Stores
//!
//! A store holds a value, publishes it on a [`Flow`] and accepts ordered
//! [`Transition`]s. There are four kinds:
//!
//! - [`RootStore`]: owns the authoritative value and the update queue.
//! - [`SubStore`]: a view through a [`Lens`]; reads and writes go through
//!   the parent.
//! - [`DetachedStore`]: reads through the parent but buffers writes in a
//!   local draft until it is explicitly synced.
//! - [`MapStore`]: like a sub store, but through a [`Mapper`] that need not
//!   satisfy the lens laws (formatting, parsing).
//!
//! Derived stores point to their parent; parents never know their children.
//! A derived store's id is its parent's id and its lens id joined by a dot.
//!
//! # Error containment
//!
//! A failing transition on a root store is rejected (or recovered by the
//! configured handler). A failing transition on a derived store is caught at
//! the derived store: its error handler turns the failure into a recovery
//! value, which is written back through the lens, so the parent's queue
//! keeps going. Lens errors are never recovered.

mod detached;
mod handler;
mod map;
mod root;
mod sub;
mod transition;

use std::future::Future;
use std::sync::Arc;

use crate::error::{BoxError, StoreError, TransitionError};
use crate::lens::Lens;
use crate::reactive::Flow;

pub use detached::DetachedStore;
pub use handler::{EmittingHandler, Handler, Outbox};
pub use map::{MapStore, Mapper};
pub use root::{RootStore, RootStoreBuilder, StoreConfig};
pub use sub::SubStore;
pub use transition::{keep_previous, Applied, ErrorHandler, Transition};

/// Values a store can hold.
pub trait Model: Clone + PartialEq + Send + Sync + 'static {}

impl<T> Model for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// Common contract of all stores.
pub trait Store<T: Model>: Send + Sync + 'static {
    /// Stable id for external correlation (element ids, logs).
    fn id(&self) -> &str;

    /// The value stream: current value first, then every change.
    fn data(&self) -> Flow<T>;

    /// The value as of the last applied transition.
    fn current(&self) -> Result<T, StoreError>;

    /// Schedule `transition`. Transitions on one root store are applied one
    /// at a time, in the order they were enqueued.
    fn enqueue(&self, transition: Transition<T>) -> Applied;
}

/// Handler factories and derivations available on every store.
pub trait StoreExt<T: Model>: Store<T> + Clone + Sized {
    /// Replace the value.
    fn update(&self, value: T) -> Applied {
        self.enqueue(Transition::replace(value))
    }

    /// Handler replacing the value with every action.
    fn updater(&self) -> Handler<T> {
        self.handle_with(|_, value| value)
    }

    /// Handler applying `f` whenever it is called.
    fn handle<F>(&self, f: F) -> Handler<()>
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.handle_with(move |value, ()| f(value))
    }

    /// Handler applying `f(value, action)`.
    fn handle_with<A, F>(&self, f: F) -> Handler<A>
    where
        A: Send + 'static,
        F: Fn(T, A) -> T + Send + Sync + 'static,
    {
        let store = self.clone();
        let f = Arc::new(f);
        Handler::new(self.id(), move |action: A| {
            let f = Arc::clone(&f);
            store.enqueue(Transition::new(move |value| f(value, action)))
        })
    }

    /// Handler whose transition may fail.
    fn try_handle<A, E, F>(&self, f: F) -> Handler<A>
    where
        A: Send + 'static,
        E: Into<BoxError>,
        F: Fn(T, A) -> Result<T, E> + Send + Sync + 'static,
    {
        let store = self.clone();
        let f = Arc::new(f);
        Handler::new(self.id(), move |action: A| {
            let f = Arc::clone(&f);
            store.enqueue(Transition::try_new(move |value| {
                f(value, action).map_err(TransitionError::failed)
            }))
        })
    }

    /// Handler whose transition awaits before producing the next value.
    /// The store applies nothing else in the meantime.
    fn handle_async<A, F, Fut>(&self, f: F) -> Handler<A>
    where
        A: Send + 'static,
        F: Fn(T, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let store = self.clone();
        let f = Arc::new(f);
        Handler::new(self.id(), move |action: A| {
            let f = Arc::clone(&f);
            store.enqueue(Transition::future(move |value| f(value, action)))
        })
    }

    /// Handler whose transition may offer values on a secondary flow.
    fn handle_and_offer<A, X, F>(&self, f: F) -> EmittingHandler<A, X>
    where
        A: Send + 'static,
        X: Clone + Send + Sync + 'static,
        F: Fn(T, A, &Outbox<X>) -> T + Send + Sync + 'static,
    {
        let offered = Flow::events();
        let outbox = Outbox::new(offered.clone());
        let handler = self.handle_with(move |value, action| f(value, action, &outbox));
        EmittingHandler::new(handler, offered)
    }

    /// Derive a store focused through `lens`.
    fn sub<U: Model>(&self, lens: Lens<T, U>) -> SubStore<T, U> {
        SubStore::new(Arc::new(self.clone()), lens, keep_previous())
    }

    /// [`sub`](Self::sub) with a custom recovery for failed transitions.
    fn sub_with<U, F>(&self, lens: Lens<T, U>, on_error: F) -> SubStore<T, U>
    where
        U: Model,
        F: Fn(&TransitionError, U) -> U + Send + Sync + 'static,
    {
        SubStore::new(Arc::new(self.clone()), lens, Arc::new(on_error))
    }

    /// Derive a store whose writes stay local until synced.
    ///
    /// Fails when the lens cannot focus the current value.
    fn detach<U: Model>(&self, lens: Lens<T, U>) -> Result<DetachedStore<T, U>, StoreError> {
        DetachedStore::new(Arc::new(self.clone()), lens, keep_previous())
    }

    /// Derive a store through a mapper that need not satisfy the lens laws.
    fn map_with<U: Model>(&self, mapper: Mapper<T, U>) -> MapStore<T, U> {
        MapStore::new(Arc::new(self.clone()), mapper, keep_previous())
    }
}

impl<T, S> StoreExt<T> for S
where
    T: Model,
    S: Store<T> + Clone,
{
}
