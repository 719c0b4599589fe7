//! Transitions
//!
//! A [`Transition`] computes the next value of a store from its current one.
//! It may be synchronous or asynchronous and may fail; either way it is run
//! by the store's update task, one at a time, in submission order.
//!
//! Enqueueing a transition returns an [`Applied`] future that resolves once
//! the transition has been applied and the resulting value published.
//! Awaiting it is optional.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::oneshot;
use tracing::warn;

use crate::error::{StoreError, TransitionError};

type Run<T> = Box<dyn FnOnce(T) -> BoxFuture<'static, Result<T, TransitionError>> + Send>;

/// Produces a recovery value from a failed transition and the value it was
/// applied to.
pub type ErrorHandler<T> = Arc<dyn Fn(&TransitionError, T) -> T + Send + Sync>;

/// The default recovery for derived stores: keep the previous value.
pub fn keep_previous<T: 'static>() -> ErrorHandler<T> {
    Arc::new(|_: &TransitionError, previous: T| previous)
}

/// One pending state change.
pub struct Transition<T> {
    run: Run<T>,
}

impl<T> Transition<T>
where
    T: Send + 'static,
{
    /// A synchronous transition.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(T) -> T + Send + 'static,
    {
        Self {
            run: Box::new(move |value| async move { Ok::<_, TransitionError>(f(value)) }.boxed()),
        }
    }

    /// Replace the value wholesale.
    pub fn replace(value: T) -> Self {
        Self::new(move |_| value)
    }

    /// A synchronous transition that may fail.
    pub fn try_new<F>(f: F) -> Self
    where
        F: FnOnce(T) -> Result<T, TransitionError> + Send + 'static,
    {
        Self {
            run: Box::new(move |value| async move { f(value) }.boxed()),
        }
    }

    /// An asynchronous transition. The store applies nothing else until the
    /// returned future completes.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self {
            run: Box::new(move |value| {
                async move { Ok::<_, TransitionError>(f(value).await) }.boxed()
            }),
        }
    }

    /// An asynchronous transition that may fail.
    pub fn try_future<F, Fut>(f: F) -> Self
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TransitionError>> + Send + 'static,
    {
        Self {
            run: Box::new(move |value| f(value).boxed()),
        }
    }

    /// Compute the next value. Panics are caught and reported as
    /// [`TransitionError::Panicked`].
    pub async fn run(self, value: T) -> Result<T, TransitionError> {
        let run = self.run;
        let future = match panic::catch_unwind(AssertUnwindSafe(move || run(value))) {
            Ok(future) => future,
            Err(payload) => return Err(TransitionError::from_panic(payload)),
        };

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(TransitionError::from_panic(payload)),
        }
    }

    /// Contain failures of this transition: instead of failing, it yields
    /// `on_error(error, previous)`.
    ///
    /// Lens errors are contract violations and are passed through unchanged.
    pub fn recover_with(self, store: impl Into<String>, on_error: ErrorHandler<T>) -> Self
    where
        T: Clone,
    {
        let store = store.into();
        Transition::try_future(move |previous: T| async move {
            match self.run(previous.clone()).await {
                Ok(next) => Ok(next),
                Err(error @ TransitionError::Lens(_)) => Err(error),
                Err(error) => {
                    warn!(store = %store, %error, "transition failed, applying recovery value");
                    Ok(on_error(&error, previous))
                }
            }
        })
    }
}

impl<T> fmt::Debug for Transition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition").finish_non_exhaustive()
    }
}

enum AppliedState {
    Pending {
        store: String,
        ack: oneshot::Receiver<Result<(), StoreError>>,
    },
    Ready(Option<Result<(), StoreError>>),
}

/// Resolves once an enqueued transition has been applied.
///
/// Dropping it does not cancel the transition.
pub struct Applied {
    state: AppliedState,
}

impl Applied {
    pub(crate) fn pending(store: &str, ack: oneshot::Receiver<Result<(), StoreError>>) -> Self {
        Self {
            state: AppliedState::Pending {
                store: store.to_string(),
                ack,
            },
        }
    }

    pub(crate) fn ready(result: Result<(), StoreError>) -> Self {
        Self {
            state: AppliedState::Ready(Some(result)),
        }
    }

    pub(crate) fn closed(store: &str) -> Self {
        Self::ready(Err(StoreError::Closed {
            store: store.to_string(),
        }))
    }
}

impl Future for Applied {
    type Output = Result<(), StoreError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            AppliedState::Pending { store, ack } => Pin::new(ack).poll(cx).map(|received| {
                received.unwrap_or_else(|_| {
                    Err(StoreError::Closed {
                        store: store.clone(),
                    })
                })
            }),
            AppliedState::Ready(result) => Poll::Ready(result.take().unwrap_or(Ok(()))),
        }
    }
}

impl fmt::Debug for Applied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            AppliedState::Pending { .. } => "pending",
            AppliedState::Ready(_) => "ready",
        };
        f.debug_struct("Applied").field("state", &state).finish()
    }
}

impl StoreError {
    /// Re-raise a failure observed by an awaiting transition.
    pub(crate) fn into_transition_error(self) -> TransitionError {
        match self {
            StoreError::Transition(error) => error,
            closed @ StoreError::Closed { .. } => TransitionError::failed(closed),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
