//! Patch Flows
//!
//! [`Flow::patches_by`] and [`Flow::patches`] turn a flow of list snapshots
//! into a [`PatchFlow`]. A patch flow is cold: every subscriber keeps its own
//! copy of the last snapshot it was sent, and its first batch is the diff
//! from the empty list to the snapshot current at subscription time. So any
//! subscriber applying its batches in order to an empty list holds the
//! latest snapshot.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::reactive::{Flow, Subscription};

use super::diff::{diff_by, diff_tail};
use super::Patch;

type Differ<T> = Arc<dyn Fn(&[T], &[T]) -> Vec<Patch<T>> + Send + Sync>;

/// Stream of patch scripts derived from a flow of lists.
pub struct PatchFlow<T> {
    source: Flow<Vec<T>>,
    differ: Differ<T>,
}

impl<T> PatchFlow<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn new(source: Flow<Vec<T>>, differ: Differ<T>) -> Self {
        Self { source, differ }
    }

    /// Receive every patch, in order.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Patch<T>) + Send + Sync + 'static,
    {
        self.subscribe_batches(move |batch: &[Patch<T>]| {
            for patch in batch {
                callback(patch);
            }
        })
    }

    /// Receive the script of every snapshot change as one batch.
    /// Snapshots that produce no patch are skipped.
    pub fn subscribe_batches<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[Patch<T>]) + Send + Sync + 'static,
    {
        let differ = Arc::clone(&self.differ);
        let last: Mutex<Vec<T>> = Mutex::new(Vec::new());
        let flow = self.source.id();

        self.source.subscribe(move |next: &Vec<T>| {
            let batch = {
                let mut last = last.lock();
                let batch = differ(&last, next);
                *last = next.clone();
                batch
            };
            if batch.is_empty() {
                return;
            }
            trace!(flow, patches = batch.len(), "emitting patch batch");
            callback(&batch);
        })
    }

    /// The snapshot flow this was derived from.
    pub fn source(&self) -> &Flow<Vec<T>> {
        &self.source
    }
}

impl<T> Clone for PatchFlow<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            differ: Arc::clone(&self.differ),
        }
    }
}

impl<T> fmt::Debug for PatchFlow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchFlow").finish_non_exhaustive()
    }
}

impl<T> Flow<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    /// Diff successive snapshots by the id `id_of` extracts, detecting
    /// inserts, deletes and moves anywhere in the list.
    pub fn patches_by<I, F>(&self, id_of: F) -> PatchFlow<T>
    where
        I: Eq + Hash + 'static,
        F: Fn(&T) -> I + Send + Sync + 'static,
    {
        let differ: Differ<T> = Arc::new(move |old: &[T], new: &[T]| diff_by(old, new, &id_of));
        PatchFlow::new(self.clone(), differ)
    }

    /// Diff successive snapshots without identity: only growth and
    /// truncation at the end of the list are reported.
    pub fn patches(&self) -> PatchFlow<T> {
        PatchFlow::new(self.clone(), Arc::new(|old: &[T], new: &[T]| diff_tail(old, new)))
    }
}
