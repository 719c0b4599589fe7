//! Mount Points
//!
//! A mount point is where a reactive value ends up in an external structure
//! (a DOM tree, a terminal buffer, a plain `Vec` in tests). There are two
//! kinds:
//!
//! - [`SingleMountPoint`] owns one slot. Every new value replaces what is in
//!   the slot; the previous value is passed along so implementations can
//!   reuse or compare.
//! - [`MultiMountPoint`] owns an ordered container and is driven by patches,
//!   so unaffected elements are never rebuilt.
//!
//! [`mount_single`] and [`mount_multi`] connect a mount point to its source
//! under a child of the given [`Job`] and hand that job to the target. The
//! mount stays connected until the job (or one of its ancestors) is
//! cancelled, and everything the target rendered goes with it.
//!
//! [`ListMount`] and [`SlotMount`] are the reconcilers a rendering layer
//! builds on: they materialize values through a render function and give
//! every materialized node its own job, cancelled before the node is removed.

mod list;
mod slot;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::PatchError;
use crate::patch::{Patch, PatchFlow};
use crate::reactive::{Flow, Job, Scope};

pub use list::{Container, ListMount};
pub use slot::{Slot, SlotMount};

/// Target replacing exactly one slot per value.
pub trait SingleMountPoint<T>: Send + 'static {
    /// Called once by [`mount_single`] before the first value. Anything the
    /// target creates from then on should live under `job`.
    fn attach(&mut self, _job: &Job) {}

    /// Show `value`. `last` is the value shown before, `None` on first call.
    fn set(&mut self, value: &T, last: Option<&T>);
}

/// Target mutated incrementally by patches.
pub trait MultiMountPoint<T>: Send + 'static {
    /// Called once by [`mount_multi`] before the first patch. Anything the
    /// target creates from then on should live under `job`.
    fn attach(&mut self, _job: &Job) {}

    fn patch(&mut self, patch: Patch<T>) -> Result<(), PatchError>;
}

/// What a render function gets besides the value.
pub struct RenderContext<'a> {
    /// Lifecycle of the node being rendered. Subscriptions made while
    /// rendering should be owned by it.
    pub job: &'a Job,
    pub scope: &'a Scope,
}

/// A connected mount point.
pub struct Mount<M> {
    job: Job,
    target: Arc<Mutex<M>>,
}

impl<M> Mount<M> {
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Run `f` on the mounted target.
    pub fn with<R>(&self, f: impl FnOnce(&mut M) -> R) -> R {
        let mut target = self.target.lock();
        f(&mut *target)
    }

    /// Disconnect. The target keeps its current content.
    pub fn unmount(&self) {
        self.job.cancel();
    }

    pub fn is_mounted(&self) -> bool {
        !self.job.is_cancelled()
    }
}

impl<M> fmt::Debug for Mount<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mount").field("job", &self.job).finish()
    }
}

/// Drive `target` with every value of `source`.
pub fn mount_single<T, M>(parent: &Job, source: &Flow<T>, mut target: M) -> Mount<M>
where
    T: Clone + Send + Sync + 'static,
    M: SingleMountPoint<T>,
{
    let job = parent.child();
    target.attach(&job);
    let target = Arc::new(Mutex::new(target));
    let last: Mutex<Option<T>> = Mutex::new(None);

    let sink = Arc::clone(&target);
    let subscription = source.subscribe(move |value: &T| {
        let mut last = last.lock();
        let previous = last.take();
        sink.lock().set(value, previous.as_ref());
        *last = Some(value.clone());
    });
    job.own(subscription);
    debug!(job = job.id(), flow = source.id(), "single mount point connected");

    Mount { job, target }
}

/// Drive `target` with every patch of `source`.
///
/// A patch the target rejects is logged and skipped.
pub fn mount_multi<T, M>(parent: &Job, source: &PatchFlow<T>, mut target: M) -> Mount<M>
where
    T: Clone + Send + Sync + 'static,
    M: MultiMountPoint<T>,
{
    let job = parent.child();
    target.attach(&job);
    let target = Arc::new(Mutex::new(target));

    let sink = Arc::clone(&target);
    let job_id = job.id();
    let subscription = source.subscribe_batches(move |batch: &[Patch<T>]| {
        let mut sink = sink.lock();
        for patch in batch {
            if let Err(err) = sink.patch(patch.clone()) {
                error!(job = job_id, %err, "mount point rejected patch");
            }
        }
    });
    job.own(subscription);
    debug!(job = job_id, flow = source.source().id(), "multi mount point connected");

    Mount { job, target }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(i32, Option<i32>)>,
    }

    impl SingleMountPoint<i32> for Recorder {
        fn set(&mut self, value: &i32, last: Option<&i32>) {
            self.calls.push((*value, last.copied()));
        }
    }

    #[test]
    fn single_mount_sees_previous_value() {
        let root = Job::new();
        let source = Flow::with_value(1);
        let mount = mount_single(&root, &source, Recorder::default());

        source.emit(2);
        source.emit(3);

        mount.with(|r| assert_eq!(r.calls, vec![(1, None), (2, Some(1)), (3, Some(2))]));
    }

    #[test]
    fn cancelled_parent_disconnects() {
        let root = Job::new();
        let source = Flow::with_value(1);
        let mount = mount_single(&root, &source, Recorder::default());

        root.cancel();
        source.emit(2);

        assert!(!mount.is_mounted());
        assert_eq!(source.subscriber_count(), 0);
        mount.with(|r| assert_eq!(r.calls.len(), 1));
    }

    #[derive(Default)]
    struct Strict {
        items: Vec<char>,
    }

    impl MultiMountPoint<char> for Strict {
        fn patch(&mut self, patch: Patch<char>) -> Result<(), PatchError> {
            patch.apply_to(&mut self.items)
        }
    }

    #[test]
    fn multi_mount_tracks_list() {
        let root = Job::new();
        let list = Flow::with_value(vec!['a', 'b']);
        let mount = mount_multi(&root, &list.patches_by(|c: &char| *c), Strict::default());

        list.emit(vec!['b', 'c', 'a']);
        mount.with(|s| assert_eq!(s.items, vec!['b', 'c', 'a']));

        mount.unmount();
        list.emit(vec![]);
        mount.with(|s| assert_eq!(s.items, vec!['b', 'c', 'a']));
    }
}
