//! Flow Implementation
//!
//! A Flow is a push-based stream of values. It is the primitive every store
//! publishes its state through and every mount point consumes.
//!
//! # How Flows Work
//!
//! 1. A producer calls [`Flow::emit`]. All registered callbacks run
//!    synchronously, in registration order, on the emitting thread.
//!
//! 2. A replaying flow remembers its latest value and hands it to every new
//!    subscriber immediately, so "the current value" is always observable.
//!    An event flow ([`Flow::events`]) only delivers values emitted after
//!    subscription.
//!
//! 3. Operators (`map`, `filter_map`, `distinct_until_changed`, `scan`)
//!    return a new flow that owns its source and a subscription to it. The
//!    source only keeps a weak reference back, so dropping the derived flow
//!    unsubscribes it, while intermediate operators in a chain stay alive.
//!
//! # Thread Safety
//!
//! Emissions on one flow are serialized by a reentrant dispatch lock: a
//! callback may emit into, or subscribe to, the flow that is calling it,
//! but two threads never interleave deliveries on the same flow. Values are
//! cloned out of the locks before any callback runs.

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use super::subscriber::{SubscriberId, Subscription};

/// Counter for generating unique flow IDs.
static FLOW_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_flow_id() -> u64 {
    FLOW_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: SubscriberId,
    live: Arc<AtomicBool>,
    callback: Callback<T>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            live: Arc::clone(&self.live),
            callback: Arc::clone(&self.callback),
        }
    }
}

/// Link from a derived flow to the flow feeding it.
///
/// Field order matters: the subscription is dropped before the source.
struct Upstream {
    _subscription: Subscription,
    _source: Box<dyn Any + Send + Sync>,
}

struct FlowInner<T> {
    id: u64,

    /// Whether new subscribers receive the latest value.
    replay: bool,

    /// Latest emitted value (replaying flows only).
    current: RwLock<Option<T>>,

    subscribers: RwLock<Vec<Entry<T>>>,

    /// Serializes deliveries on this flow.
    dispatch: ReentrantMutex<()>,

    /// Source of a derived flow.
    upstream: Mutex<Option<Upstream>>,
}

/// A push-based stream of values of type `T`.
///
/// Cloning a flow yields another handle to the same stream.
///
/// # Example
///
/// ```rust
/// use lattice_store::reactive::Flow;
///
/// let count = Flow::with_value(1);
/// let doubled = count.map(|v| v * 2);
///
/// count.emit(5);
/// assert_eq!(doubled.current(), Some(10));
/// ```
pub struct Flow<T> {
    inner: Arc<FlowInner<T>>,
}

impl<T> Flow<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn build(replay: bool, value: Option<T>) -> Self {
        Self {
            inner: Arc::new(FlowInner {
                id: next_flow_id(),
                replay,
                current: RwLock::new(value),
                subscribers: RwLock::new(Vec::new()),
                dispatch: ReentrantMutex::new(()),
                upstream: Mutex::new(None),
            }),
        }
    }

    /// Create an empty replaying flow.
    pub fn new() -> Self {
        Self::build(true, None)
    }

    /// Create a replaying flow whose current value is `value`.
    pub fn with_value(value: T) -> Self {
        Self::build(true, Some(value))
    }

    /// Create a flow that never replays to late subscribers.
    pub fn events() -> Self {
        Self::build(false, None)
    }

    /// Get the flow's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The latest value, if this is a replaying flow that has one.
    pub fn current(&self) -> Option<T> {
        self.inner.current.read().clone()
    }

    /// Push a value to all subscribers.
    pub fn emit(&self, value: T) {
        let _dispatch = self.inner.dispatch.lock();
        if self.inner.replay {
            *self.inner.current.write() = Some(value.clone());
        }

        let entries = self.inner.subscribers.read().clone();
        for entry in entries {
            if entry.live.load(Ordering::Acquire) {
                (entry.callback)(&value);
            }
        }
    }

    /// Register a callback for every value of this flow.
    ///
    /// A replaying flow delivers its current value before returning.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let _dispatch = self.inner.dispatch.lock();

        let id = SubscriberId::new();
        let live = Arc::new(AtomicBool::new(true));
        let callback: Callback<T> = Arc::new(callback);
        self.inner.subscribers.write().push(Entry {
            id,
            live: Arc::clone(&live),
            callback: Arc::clone(&callback),
        });

        if self.inner.replay {
            let current = self.inner.current.read().clone();
            if let Some(value) = current {
                callback(&value);
            }
        }

        let weak: Weak<FlowInner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(id, move || {
            live.store(false, Ordering::Release);
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.write().retain(|entry| entry.id != id);
            }
        })
    }

    /// Get the number of registered callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Build a flow fed by this one through `step`.
    fn derive<U, F>(&self, step: F) -> Flow<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T, &Flow<U>) + Send + Sync + 'static,
    {
        let derived = Flow::<U>::build(self.inner.replay, None);
        let weak = Arc::downgrade(&derived.inner);
        let subscription = self.subscribe(move |value| {
            if let Some(inner) = weak.upgrade() {
                step(value, &Flow { inner });
            }
        });
        *derived.inner.upstream.lock() = Some(Upstream {
            _subscription: subscription,
            _source: Box::new(self.clone()),
        });
        derived
    }

    /// Transform every value.
    pub fn map<U, F>(&self, f: F) -> Flow<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.derive(move |value, out| out.emit(f(value)))
    }

    /// Transform every value, dropping the ones mapped to `None`.
    pub fn filter_map<U, F>(&self, f: F) -> Flow<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> Option<U> + Send + Sync + 'static,
    {
        self.derive(move |value, out| {
            if let Some(mapped) = f(value) {
                out.emit(mapped);
            }
        })
    }

    /// Suppress values equal to the one delivered just before.
    pub fn distinct_until_changed(&self) -> Flow<T>
    where
        T: PartialEq,
    {
        let last: Mutex<Option<T>> = Mutex::new(None);
        self.derive(move |value: &T, out| {
            {
                let mut last = last.lock();
                if last.as_ref() == Some(value) {
                    return;
                }
                *last = Some(value.clone());
            }
            out.emit(value.clone());
        })
    }

    /// Fold every value into an accumulator and emit each intermediate result.
    pub fn scan<R, F>(&self, initial: R, f: F) -> Flow<R>
    where
        R: Clone + Send + Sync + 'static,
        F: Fn(&R, &T) -> R + Send + Sync + 'static,
    {
        let acc = Mutex::new(initial);
        self.derive(move |value, out| {
            let next = {
                let mut acc = acc.lock();
                let next = f(&acc, value);
                *acc = next.clone();
                next
            };
            out.emit(next);
        })
    }
}

impl<T> Default for Flow<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Flow<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Flow<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("id", &self.inner.id)
            .field("replay", &self.inner.replay)
            .field("current", &self.current())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
