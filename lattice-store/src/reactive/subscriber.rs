//! Subscriber types for the reactive system.
//!
//! Every callback registered on a [`Flow`](super::Flow) gets a unique
//! [`SubscriberId`] and is handed back a [`Subscription`]. Dropping (or
//! cancelling) the subscription unregisters the callback; no further
//! invocations happen afterwards.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancelable handle to a registered callback.
///
/// The callback stays registered for as long as this value lives.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriberId,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new<F>(id: SubscriberId, cancel: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription that is not attached to anything.
    pub fn empty() -> Self {
        Self {
            id: SubscriberId::new(),
            cancel: None,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Unregister the callback now.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    /// Keep the callback registered for the lifetime of its source.
    pub fn forget(mut self) {
        self.cancel = None;
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;
    use std::sync::Arc;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn drop_runs_cancel_once() {
        let cancelled = Arc::new(AtomicI32::new(0));
        let cancelled_clone = cancelled.clone();

        let subscription = Subscription::new(SubscriberId::new(), move || {
            cancelled_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(cancelled.load(Ordering::SeqCst), 0);

        subscription.cancel();
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn forget_skips_cancel() {
        let cancelled = Arc::new(AtomicI32::new(0));
        let cancelled_clone = cancelled.clone();

        let subscription = Subscription::new(SubscriberId::new(), move || {
            cancelled_clone.fetch_add(1, Ordering::SeqCst);
        });
        subscription.forget();
        assert_eq!(cancelled.load(Ordering::SeqCst), 0);
    }
}
