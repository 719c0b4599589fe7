//! Root Store
//!
//! The [`RootStore`] owns the authoritative value. Every derived store
//! eventually routes its writes here.
//!
//! # How It Works
//!
//! 1. Creating a root store spawns one update task on the tokio runtime and
//!    hands it the receiving half of an unbounded channel.
//!
//! 2. `enqueue` sends an [`Envelope`] (transition + acknowledgment) into the
//!    channel. The channel is the ordering point: envelopes are received in
//!    the order they were sent, whichever task sent them.
//!
//! 3. The update task folds the transitions over the current value one at a
//!    time, awaiting asynchronous transitions before receiving the next.
//!
//! 4. A result equal to the current value is not published. Anything else
//!    is stored and emitted on `data` before the envelope is acknowledged.
//!
//! The task ends when every handle to the store has been dropped.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace, warn};

use crate::error::{StoreError, TransitionError};
use crate::reactive::Flow;

use super::transition::{Applied, ErrorHandler, Transition};
use super::{Model, Store};

/// Counter for generating store ids.
static STORE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_store_id() -> String {
    format!("store-{}", STORE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Settings of a root store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Id used for logs and as the prefix of derived ids.
    /// Generated when absent.
    pub id: Option<String>,

    /// Publish the initial value immediately. When false, `data` stays empty
    /// until the first transition has been applied.
    pub emit_initial: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            id: None,
            emit_initial: true,
        }
    }
}

/// A transition waiting in the update queue.
struct Envelope<T> {
    transition: Transition<T>,
    ack: oneshot::Sender<Result<(), StoreError>>,
}

struct RootInner<T> {
    id: String,
    state: Arc<RwLock<T>>,
    data: Flow<T>,
    sender: mpsc::UnboundedSender<Envelope<T>>,
}

/// Store owning its value.
///
/// Cloning yields another handle to the same store.
///
/// # Example
///
/// ```rust
/// use lattice_store::store::{RootStore, Store, StoreExt};
///
/// # #[tokio::main] async fn main() {
/// let count = RootStore::new(0);
/// let increment = count.handle(|n| n + 1);
///
/// increment.call(()).await.unwrap();
/// assert_eq!(count.current().unwrap(), 1);
/// # }
/// ```
pub struct RootStore<T> {
    inner: Arc<RootInner<T>>,
}

impl<T: Model> RootStore<T> {
    /// Create a store with default settings.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn new(initial: T) -> Self {
        Self::builder(initial).build()
    }

    pub fn builder(initial: T) -> RootStoreBuilder<T> {
        RootStoreBuilder {
            initial,
            config: StoreConfig::default(),
            on_error: None,
            runtime: None,
        }
    }
}

impl<T: Model> Store<T> for RootStore<T> {
    fn id(&self) -> &str {
        &self.inner.id
    }

    fn data(&self) -> Flow<T> {
        self.inner.data.clone()
    }

    fn current(&self) -> Result<T, StoreError> {
        Ok(self.inner.state.read().clone())
    }

    fn enqueue(&self, transition: Transition<T>) -> Applied {
        let (ack, applied) = oneshot::channel();
        match self.inner.sender.send(Envelope { transition, ack }) {
            Ok(()) => Applied::pending(&self.inner.id, applied),
            Err(_) => Applied::closed(&self.inner.id),
        }
    }
}

impl<T> Clone for RootStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for RootStore<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootStore")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.state.read())
            .finish()
    }
}

/// Builder for a [`RootStore`].
pub struct RootStoreBuilder<T> {
    initial: T,
    config: StoreConfig,
    on_error: Option<ErrorHandler<T>>,
    runtime: Option<Handle>,
}

impl<T: Model> RootStoreBuilder<T> {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = Some(id.into());
        self
    }

    pub fn emit_initial(mut self, emit_initial: bool) -> Self {
        self.config.emit_initial = emit_initial;
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Recover from failed transitions instead of rejecting them.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&TransitionError, T) -> T + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Spawn the update task on `runtime` instead of the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// # Panics
    ///
    /// Panics when no runtime was given and none is current.
    pub fn build(self) -> RootStore<T> {
        let id = self.config.id.unwrap_or_else(next_store_id);
        let emit_initial = self.config.emit_initial;
        let data = if emit_initial {
            Flow::with_value(self.initial.clone())
        } else {
            Flow::new()
        };
        let state = Arc::new(RwLock::new(self.initial));
        let (sender, receiver) = mpsc::unbounded_channel();

        let task = UpdateTask {
            id: id.clone(),
            state: Arc::clone(&state),
            data: data.clone(),
            on_error: self.on_error,
            published: emit_initial,
            receiver,
        };
        let runtime = self.runtime.unwrap_or_else(Handle::current);
        runtime.spawn(task.run());
        debug!(store = %id, emit_initial, "root store created");

        RootStore {
            inner: Arc::new(RootInner {
                id,
                state,
                data,
                sender,
            }),
        }
    }
}

/// The fold over a root store's transitions.
struct UpdateTask<T> {
    id: String,
    state: Arc<RwLock<T>>,
    data: Flow<T>,
    on_error: Option<ErrorHandler<T>>,
    published: bool,
    receiver: mpsc::UnboundedReceiver<Envelope<T>>,
}

impl<T: Model> UpdateTask<T> {
    async fn run(mut self) {
        while let Some(Envelope { transition, ack }) = self.receiver.recv().await {
            let outcome = self.apply(transition).await;
            // The caller may have stopped waiting.
            let _ = ack.send(outcome);
        }
        debug!(store = %self.id, "update queue closed");
    }

    async fn apply(&mut self, transition: Transition<T>) -> Result<(), StoreError> {
        let previous = self.state.read().clone();
        let next = match transition.run(previous.clone()).await {
            Ok(next) => next,
            Err(error) => self.recover(error, &previous)?,
        };
        self.publish(previous, next)
    }

    fn recover(&self, error: TransitionError, previous: &T) -> Result<T, StoreError> {
        let Some(handler) = &self.on_error else {
            error!(store = %self.id, %error, "transition failed");
            return Err(error.into());
        };
        warn!(store = %self.id, %error, "transition failed, applying recovery value");
        let recovered = panic::catch_unwind(AssertUnwindSafe(|| handler(&error, previous.clone())));
        recovered.map_err(|payload| {
            let panicked = TransitionError::from_panic(payload);
            error!(store = %self.id, error = %panicked, "error handler panicked");
            panicked.into()
        })
    }

    /// A subscriber that panics does not undo the write: the value stays
    /// stored and the panic is reported to the caller.
    fn publish(&mut self, previous: T, next: T) -> Result<(), StoreError> {
        if next == previous && self.published {
            trace!(store = %self.id, "transition produced an equal value");
            return Ok(());
        }
        *self.state.write() = next.clone();
        self.published = true;
        trace!(store = %self.id, "publishing new value");

        let data = &self.data;
        panic::catch_unwind(AssertUnwindSafe(|| data.emit(next))).map_err(|payload| {
            let panicked = TransitionError::from_panic(payload);
            error!(store = %self.id, error = %panicked, "subscriber panicked");
            panicked.into()
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreExt;
    use parking_lot::Mutex;

    fn record<T: Model>(flow: &Flow<T>) -> (Arc<Mutex<Vec<T>>>, crate::reactive::Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let sub = flow.subscribe(move |v: &T| seen_clone.lock().push(v.clone()));
        (seen, sub)
    }

    #[tokio::test]
    async fn initial_value_is_published() {
        let store = RootStore::new(7);
        assert_eq!(store.data().current(), Some(7));
        assert_eq!(store.current().unwrap(), 7);
        assert!(store.id().starts_with("store-"));
    }

    #[tokio::test]
    async fn lazy_store_publishes_after_first_transition() {
        let store = RootStore::builder(1).id("lazy").emit_initial(false).build();
        assert_eq!(store.data().current(), None);

        store.update(1).await.unwrap();
        assert_eq!(store.data().current(), Some(1));
        assert_eq!(store.id(), "lazy");
    }

    #[tokio::test]
    async fn equal_updates_emit_once() {
        let store = RootStore::new(0);
        let (seen, _sub) = record(&store.data());

        store.update(5).await.unwrap();
        store.update(5).await.unwrap();

        assert_eq!(*seen.lock(), vec![0, 5]);
    }

    #[tokio::test]
    async fn transitions_apply_in_submission_order() {
        let store = RootStore::new(Vec::<u32>::new());
        let (seen, _sub) = record(&store.data());

        let slow = store.enqueue(Transition::future(|mut v: Vec<u32>| async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            v.push(1);
            v
        }));
        let fast = store.enqueue(Transition::new(|mut v: Vec<u32>| {
            v.push(2);
            v
        }));
        fast.await.unwrap();
        slow.await.unwrap();

        assert_eq!(store.current().unwrap(), vec![1, 2]);
        assert_eq!(*seen.lock(), vec![vec![], vec![1], vec![1, 2]]);
    }

    #[tokio::test]
    async fn failures_keep_previous_value_and_propagate() {
        let store = RootStore::new(3);
        let (seen, _sub) = record(&store.data());

        let result = store
            .enqueue(Transition::try_new(|_| Err(TransitionError::failed("broken"))))
            .await;
        assert!(matches!(result, Err(StoreError::Transition(TransitionError::Failed(_)))));

        let panicked = store.enqueue(Transition::new(|v: i32| {
            if v == 3 {
                panic!("bad state")
            }
            v
        }));
        assert!(matches!(
            panicked.await,
            Err(StoreError::Transition(TransitionError::Panicked(_)))
        ));

        store.update(4).await.unwrap();
        assert_eq!(*seen.lock(), vec![3, 4]);
    }

    #[tokio::test]
    async fn error_handler_recovers() {
        let store = RootStore::builder(3).on_error(|_, previous| previous * -1).build();

        store
            .enqueue(Transition::try_new(|_| Err(TransitionError::failed("broken"))))
            .await
            .unwrap();

        assert_eq!(store.current().unwrap(), -3);
    }

    #[tokio::test]
    async fn store_on_explicit_runtime() {
        let store = RootStore::builder("a".to_string())
            .runtime(Handle::current())
            .build();
        store.update("b".to_string()).await.unwrap();
        assert_eq!(store.current().unwrap(), "b");
    }

    #[tokio::test]
    async fn panicking_error_handler_keeps_store_alive() {
        let store = RootStore::builder(1)
            .on_error(|_, _| panic!("no recovery"))
            .build();

        let failed = store
            .enqueue(Transition::try_new(|_| Err(TransitionError::failed("broken"))))
            .await;
        assert!(matches!(
            failed,
            Err(StoreError::Transition(TransitionError::Panicked(ref m))) if m == "no recovery"
        ));
        assert_eq!(store.current().unwrap(), 1);

        store.update(5).await.unwrap();
        assert_eq!(store.current().unwrap(), 5);
    }

    #[tokio::test]
    async fn panicking_subscriber_keeps_store_alive() {
        let store = RootStore::new(1);
        let (seen, _seen_sub) = record(&store.data());
        let _bad = store.data().subscribe(|v: &i32| {
            if *v == 2 {
                panic!("cannot show 2");
            }
        });

        let result = store.update(2).await;
        assert!(matches!(result, Err(StoreError::Transition(TransitionError::Panicked(_)))));
        assert_eq!(store.current().unwrap(), 2);

        store.update(3).await.unwrap();
        assert_eq!(store.current().unwrap(), 3);
        assert_eq!(seen.lock().last(), Some(&3));
    }
}
