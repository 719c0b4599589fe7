//! List Reconciler
//!
//! [`ListMount`] keeps an ordered [`Container`] of materialized nodes in step
//! with a patch stream. Each node is rendered under its own child job; the
//! jobs live in a vector parallel to the container so a move relocates node
//! and job together, and a delete cancels the job before the node leaves
//! the container.

use std::fmt;

use tracing::trace;

use crate::error::PatchError;
use crate::patch::Patch;
use crate::reactive::{Job, Scope};

use super::{MultiMountPoint, RenderContext};

/// Ordered external structure holding materialized nodes.
pub trait Container: Send + 'static {
    type Node;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `node` before position `index` (`index == len` appends).
    fn insert(&mut self, index: usize, node: Self::Node);

    fn remove(&mut self, index: usize) -> Self::Node;
}

impl<N: Send + 'static> Container for Vec<N> {
    type Node = N;

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn insert(&mut self, index: usize, node: N) {
        Vec::insert(self, index, node);
    }

    fn remove(&mut self, index: usize) -> N {
        Vec::remove(self, index)
    }
}

type Render<T, N> = Box<dyn Fn(T, &RenderContext<'_>) -> N + Send>;

/// Patch-driven reconciler over a [`Container`].
pub struct ListMount<T, C: Container> {
    container: C,
    jobs: Vec<Job>,
    parent: Job,
    scope: Scope,
    render: Render<T, C::Node>,
}

impl<T, C> ListMount<T, C>
where
    T: 'static,
    C: Container,
{
    /// `container` must be empty. Node jobs are children of `parent`, or of
    /// the mount's job once this is mounted with
    /// [`mount_multi`](super::mount_multi).
    pub fn new<F>(parent: &Job, container: C, render: F) -> Self
    where
        F: Fn(T, &RenderContext<'_>) -> C::Node + Send + 'static,
    {
        debug_assert!(container.is_empty(), "list mount needs an empty container");
        Self {
            container,
            jobs: Vec::new(),
            parent: parent.clone(),
            scope: Scope::new(),
            render: Box::new(render),
        }
    }

    /// Scope handed to every render call.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    /// Job of the node at `index`.
    pub fn job(&self, index: usize) -> Option<&Job> {
        self.jobs.get(index)
    }

    fn materialize(&mut self, element: T, index: usize) {
        let job = self.parent.child();
        let node = (self.render)(
            element,
            &RenderContext {
                job: &job,
                scope: &self.scope,
            },
        );
        self.container.insert(index, node);
        self.jobs.insert(index, job);
    }

    fn bounds(&self, patch: &'static str, index: usize, fits: bool) -> Result<(), PatchError> {
        if fits {
            Ok(())
        } else {
            Err(PatchError {
                patch,
                index,
                len: self.jobs.len(),
            })
        }
    }
}

impl<T, C> MultiMountPoint<T> for ListMount<T, C>
where
    T: Send + 'static,
    C: Container,
{
    fn attach(&mut self, job: &Job) {
        for node in &self.jobs {
            let node = node.clone();
            job.on_cancel(move || node.cancel());
        }
        self.parent = job.clone();
    }

    fn patch(&mut self, patch: Patch<T>) -> Result<(), PatchError> {
        let len = self.jobs.len();
        match patch {
            Patch::Insert { element, index } => {
                self.bounds("insert", index, index <= len)?;
                self.materialize(element, index);
            }
            Patch::InsertMany { elements, index } => {
                self.bounds("insert_many", index, index <= len)?;
                for (offset, element) in elements.into_iter().enumerate() {
                    self.materialize(element, index + offset);
                }
            }
            Patch::Delete { start, count } => {
                self.bounds(
                    "delete",
                    start,
                    start.checked_add(count).is_some_and(|end| end <= len),
                )?;
                for _ in 0..count {
                    self.jobs.remove(start).cancel();
                    drop(self.container.remove(start));
                }
            }
            Patch::Move { from, to } => {
                self.bounds("move", from, from < len)?;
                self.bounds("move", to, to < len)?;
                let node = self.container.remove(from);
                self.container.insert(to, node);
                let job = self.jobs.remove(from);
                self.jobs.insert(to, job);
            }
        }
        trace!(nodes = self.jobs.len(), "list reconciled");
        Ok(())
    }
}

impl<T, C> fmt::Debug for ListMount<T, C>
where
    C: Container + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListMount")
            .field("container", &self.container)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
