//! Lifecycle Tokens
//!
//! A [`Job`] bounds the lifetime of everything that was started on behalf of
//! one consumer: flow subscriptions, nested mount points, cleanup callbacks.
//! Cancelling a job runs its cleanup and cancels all of its children, so a
//! whole materialized subtree can be shut down by cancelling its root.
//!
//! Cancellation is idempotent and happens at most once. Anything attached to
//! an already cancelled job is cleaned up immediately.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::subscriber::Subscription;

/// Counter for generating unique job IDs.
static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_job_id() -> u64 {
    JOB_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type Cleanup = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Resources {
    children: Vec<Job>,
    subscriptions: Vec<Subscription>,
    cleanups: Vec<Cleanup>,
}

struct JobInner {
    id: u64,
    cancelled: AtomicBool,
    resources: Mutex<Resources>,
}

/// Cancelable lifecycle token.
///
/// Cloning a job yields another handle to the same token.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    /// Create a new root job.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(JobInner {
                id: next_job_id(),
                cancelled: AtomicBool::new(false),
                resources: Mutex::new(Resources::default()),
            }),
        }
    }

    /// Get the job's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Create a job that is cancelled together with this one.
    pub fn child(&self) -> Job {
        let child = Job::new();
        if self.is_cancelled() {
            child.cancel();
            return child;
        }
        let mut resources = self.inner.resources.lock();
        // Re-check under the lock; `cancel` drains resources while holding it.
        if self.is_cancelled() {
            drop(resources);
            child.cancel();
        } else {
            resources.children.retain(|c| !c.is_cancelled());
            resources.children.push(child.clone());
        }
        child
    }

    /// Keep `subscription` registered until this job is cancelled.
    pub fn own(&self, subscription: Subscription) {
        let mut resources = self.inner.resources.lock();
        if self.is_cancelled() {
            drop(resources);
            drop(subscription);
        } else {
            resources.subscriptions.push(subscription);
        }
    }

    /// Run `cleanup` when this job is cancelled.
    pub fn on_cancel<F>(&self, cleanup: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut resources = self.inner.resources.lock();
        if self.is_cancelled() {
            drop(resources);
            cleanup();
        } else {
            resources.cleanups.push(Box::new(cleanup));
        }
    }

    /// Cancel this job and, transitively, all of its children.
    pub fn cancel(&self) {
        let resources = {
            let mut resources = self.inner.resources.lock();
            if self.inner.cancelled.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *resources)
        };

        for child in &resources.children {
            child.cancel();
        }
        drop(resources.subscriptions);
        for cleanup in resources.cleanups {
            cleanup();
        }
    }

    /// Check if the job has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.inner.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Flow;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn cancel_runs_cleanup_once() {
        let job = Job::new();
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        job.on_cancel(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        job.cancel();
        job.cancel();

        assert!(job.is_cancelled());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_is_transitive() {
        let root = Job::new();
        let child = root.child();
        let grandchild = child.child();

        root.cancel();

        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn cancelling_child_leaves_parent_running() {
        let root = Job::new();
        let child = root.child();

        child.cancel();

        assert!(!root.is_cancelled());
    }

    #[test]
    fn owned_subscriptions_end_with_job() {
        let flow = Flow::new();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let job = Job::new();
        job.own(flow.subscribe(move |_: &i32| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        flow.emit(1);
        job.cancel();
        flow.emit(2);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flow.subscriber_count(), 0);
    }

    #[test]
    fn attaching_to_cancelled_job_cleans_up_immediately() {
        let job = Job::new();
        job.cancel();

        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        job.on_cancel(move || ran_clone.store(true, Ordering::SeqCst));

        assert!(ran.load(Ordering::SeqCst));
        assert!(job.child().is_cancelled());
    }
}
