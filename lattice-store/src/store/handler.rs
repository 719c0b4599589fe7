//! Handlers
//!
//! A [`Handler<A>`] turns values of type `A` (clicks, key presses, messages
//! from another store) into transitions on one store. Handlers are created
//! by the `handle*` methods of [`StoreExt`](super::StoreExt) and can either
//! be called directly or connected to a [`Flow`] of events.
//!
//! An [`EmittingHandler`] additionally exposes a secondary flow its
//! transition may offer values to. Wiring that flow into another store's
//! handler lets one store drive another while each keeps its own update
//! order.

use std::fmt;
use std::sync::Arc;

use crate::reactive::{Flow, Subscription};

use super::transition::Applied;

type Dispatch<A> = Arc<dyn Fn(A) -> Applied + Send + Sync>;

/// Binds values of type `A` to transitions on a store.
pub struct Handler<A> {
    store: String,
    dispatch: Dispatch<A>,
}

impl<A> Handler<A>
where
    A: Send + 'static,
{
    /// Create a handler for the store `store` from a dispatch function.
    pub fn new<F>(store: impl Into<String>, dispatch: F) -> Self
    where
        F: Fn(A) -> Applied + Send + Sync + 'static,
    {
        Self {
            store: store.into(),
            dispatch: Arc::new(dispatch),
        }
    }

    /// Id of the store this handler writes to.
    pub fn store_id(&self) -> &str {
        &self.store
    }

    /// Enqueue the transition for `action`.
    pub fn call(&self, action: A) -> Applied {
        (self.dispatch)(action)
    }

    /// Enqueue a transition for every value of `events`.
    ///
    /// The connection lasts as long as the returned subscription.
    pub fn connect(&self, events: &Flow<A>) -> Subscription
    where
        A: Clone + Sync,
    {
        let dispatch = Arc::clone(&self.dispatch);
        events.subscribe(move |action: &A| {
            // Fire and forget: ordering is guaranteed by the store's queue.
            drop(dispatch(action.clone()));
        })
    }
}

impl<A> Clone for Handler<A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            dispatch: Arc::clone(&self.dispatch),
        }
    }
}

impl<A> fmt::Debug for Handler<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("store", &self.store).finish()
    }
}

/// Secondary output a transition can push values onto.
pub struct Outbox<X> {
    flow: Flow<X>,
}

impl<X> Outbox<X>
where
    X: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(flow: Flow<X>) -> Self {
        Self { flow }
    }

    /// Deliver `value` to everything wired to the offering handler.
    pub fn offer(&self, value: X) {
        self.flow.emit(value);
    }
}

/// A handler whose transitions may offer values of type `X`.
pub struct EmittingHandler<A, X> {
    handler: Handler<A>,
    offered: Flow<X>,
}

impl<A, X> EmittingHandler<A, X>
where
    A: Send + 'static,
    X: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(handler: Handler<A>, offered: Flow<X>) -> Self {
        Self { handler, offered }
    }

    pub fn call(&self, action: A) -> Applied {
        self.handler.call(action)
    }

    pub fn connect(&self, events: &Flow<A>) -> Subscription
    where
        A: Clone + Sync,
    {
        self.handler.connect(events)
    }

    /// The handler without its secondary output.
    pub fn handler(&self) -> &Handler<A> {
        &self.handler
    }

    /// Values offered by transitions of this handler. Not replayed.
    pub fn offered(&self) -> Flow<X> {
        self.offered.clone()
    }

    /// Feed every offered value into `target`.
    pub fn wire(&self, target: &Handler<X>) -> Subscription {
        target.connect(&self.offered)
    }
}

impl<A, X> Clone for EmittingHandler<A, X> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            offered: self.offered.clone(),
        }
    }
}

impl<A, X> fmt::Debug for EmittingHandler<A, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmittingHandler")
            .field("store", &self.handler.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording_handler() -> (Arc<Mutex<Vec<i32>>>, Handler<i32>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let handler = Handler::new("test", move |v| {
            seen_clone.lock().push(v);
            Applied::ready(Ok(()))
        });
        (seen, handler)
    }

    #[tokio::test]
    async fn call_dispatches() {
        let (seen, handler) = recording_handler();
        handler.call(1).await.unwrap();
        handler.call(2).await.unwrap();
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(handler.store_id(), "test");
    }

    #[test]
    fn connect_follows_events_until_dropped() {
        let (seen, handler) = recording_handler();
        let events = Flow::events();

        let connection = handler.connect(&events);
        events.emit(1);
        events.emit(2);
        drop(connection);
        events.emit(3);

        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn offered_values_reach_wired_handler() {
        let (seen, target) = recording_handler();
        let offered = Flow::events();
        let outbox = Outbox::new(offered.clone());
        let source = Handler::new("source", |_: ()| Applied::ready(Ok(())));
        let emitting = EmittingHandler::new(source, offered);

        let _wire = emitting.wire(&target);
        outbox.offer(5);
        outbox.offer(6);

        assert_eq!(*seen.lock(), vec![5, 6]);
    }
}
