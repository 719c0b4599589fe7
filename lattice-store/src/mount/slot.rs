//! Slot Reconciler
//!
//! [`SlotMount`] renders every value into a single [`Slot`], replacing the
//! node that was there. The replaced node's job is cancelled first.

use std::fmt;

use tracing::trace;

use crate::reactive::{Job, Scope};

use super::{RenderContext, SingleMountPoint};

/// One replaceable position in an external structure.
pub trait Slot: Send + 'static {
    type Node;

    /// Put `node` in the slot and return what was there.
    fn replace(&mut self, node: Self::Node) -> Option<Self::Node>;
}

impl<N: Send + 'static> Slot for Option<N> {
    type Node = N;

    fn replace(&mut self, node: N) -> Option<N> {
        Option::replace(self, node)
    }
}

type Render<T, N> = Box<dyn Fn(&T, Option<&T>, &RenderContext<'_>) -> N + Send>;

/// Value-driven reconciler over a [`Slot`].
pub struct SlotMount<T, S: Slot> {
    slot: S,
    current: Option<Job>,
    parent: Job,
    scope: Scope,
    render: Render<T, S::Node>,
}

impl<T, S> SlotMount<T, S>
where
    T: 'static,
    S: Slot,
{
    /// `render` receives the new value and the one it replaces.
    pub fn new<F>(parent: &Job, slot: S, render: F) -> Self
    where
        F: Fn(&T, Option<&T>, &RenderContext<'_>) -> S::Node + Send + 'static,
    {
        Self {
            slot,
            current: None,
            parent: parent.clone(),
            scope: Scope::new(),
            render: Box::new(render),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    /// Job of the node currently in the slot.
    pub fn job(&self) -> Option<&Job> {
        self.current.as_ref()
    }
}

impl<T, S> SingleMountPoint<T> for SlotMount<T, S>
where
    T: Send + 'static,
    S: Slot,
{
    fn attach(&mut self, job: &Job) {
        if let Some(current) = self.current.clone() {
            job.on_cancel(move || current.cancel());
        }
        self.parent = job.clone();
    }

    fn set(&mut self, value: &T, last: Option<&T>) {
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }
        let job = self.parent.child();
        let node = (self.render)(
            value,
            last,
            &RenderContext {
                job: &job,
                scope: &self.scope,
            },
        );
        let replaced = self.slot.replace(node);
        trace!(job = job.id(), replaced = replaced.is_some(), "slot reconciled");
        self.current = Some(job);
    }
}

impl<T, S> fmt::Debug for SlotMount<T, S>
where
    S: Slot + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotMount")
            .field("slot", &self.slot)
            .field("job", &self.current)
            .finish_non_exhaustive()
    }
}
