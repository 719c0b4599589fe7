//! Detached Store
//!
//! A [`DetachedStore`] reads through its parent like a [`SubStore`], but its
//! writes land in a local draft. Nothing reaches the parent until the draft
//! is synced, either through the lens ([`DetachedStore::sync_by`]) or through
//! an arbitrary handler ([`DetachedStore::sync_with`]).
//!
//! The draft is seeded from the parent when the store is created and again on
//! [`DetachedStore::reset`]. Later parent changes do not touch it.
//!
//! [`SubStore`]: super::SubStore

use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{StoreError, TransitionError};
use crate::lens::{join_ids, Lens};
use crate::reactive::Flow;

use super::handler::Handler;
use super::root::RootStore;
use super::sub::focused;
use super::transition::{Applied, ErrorHandler, Transition};
use super::{Model, Store};

struct DetachedInner<P, T> {
    id: String,
    parent: Arc<dyn Store<P>>,
    lens: Lens<P, T>,
    data: Flow<T>,
    draft: RootStore<T>,
    on_error: ErrorHandler<T>,
}

/// Store buffering writes until they are explicitly synced.
pub struct DetachedStore<P, T> {
    inner: Arc<DetachedInner<P, T>>,
}

impl<P: Model, T: Model> DetachedStore<P, T> {
    pub(crate) fn new(
        parent: Arc<dyn Store<P>>,
        lens: Lens<P, T>,
        on_error: ErrorHandler<T>,
    ) -> Result<Self, StoreError> {
        let id = join_ids(parent.id(), lens.id());
        let seed = lens.get(&parent.current()?)?;
        let data = focused(&id, &parent.data(), &lens);
        let draft = RootStore::builder(seed).id(format!("{id}#draft")).build();
        debug!(store = %id, "detached store derived");

        Ok(Self {
            inner: Arc::new(DetachedInner {
                id,
                parent,
                lens,
                data,
                draft,
                on_error,
            }),
        })
    }

    /// The local draft as a flow.
    pub fn detached(&self) -> Flow<T> {
        self.inner.draft.data()
    }

    /// The local draft's value.
    pub fn draft(&self) -> Result<T, StoreError> {
        self.inner.draft.current()
    }

    /// Write the draft to the parent through the lens.
    ///
    /// Resolves once the parent has applied the write.
    pub fn sync_by(&self) -> Applied {
        let parent = Arc::clone(&self.inner.parent);
        let lens = self.inner.lens.clone();
        let id = self.inner.id.clone();

        self.inner.draft.enqueue(Transition::try_future(move |draft: T| async move {
            debug!(store = %id, "syncing draft through lens");
            let value = draft.clone();
            parent
                .enqueue(Transition::try_new(move |p| Ok(lens.set(p, value)?)))
                .await
                .map_err(StoreError::into_transition_error)?;
            Ok::<_, TransitionError>(draft)
        }))
    }

    /// Hand the draft to `sink` instead of writing it through the lens.
    ///
    /// The draft is captured in order with earlier writes, but `sink` is
    /// awaited outside the draft's queue, so it may target this store.
    pub fn sync_with(&self, sink: &Handler<T>) -> Applied {
        let sink = sink.clone();
        let id = self.inner.id.clone();
        let (ack, applied) = oneshot::channel();

        let captured = self.inner.draft.enqueue(Transition::new(move |draft: T| {
            debug!(store = %id, target = %sink.store_id(), "syncing draft through handler");
            let delivered = sink.call(draft.clone());
            tokio::spawn(async move {
                // The caller may have stopped waiting.
                let _ = ack.send(delivered.await);
            });
            draft
        }));
        // Only the sink's outcome is reported; capturing cannot fail.
        drop(captured);
        Applied::pending(&self.inner.id, applied)
    }

    /// A handler syncing the draft through the lens on every call.
    pub fn sync_handler(&self) -> Handler<()> {
        let store = self.clone();
        Handler::new(self.inner.id.clone(), move |()| store.sync_by())
    }

    /// Discard the draft and reload it from the parent.
    pub fn reset(&self) -> Applied {
        let fresh = match self.current() {
            Ok(value) => value,
            Err(error) => return Applied::ready(Err(error)),
        };
        debug!(store = %self.inner.id, "draft reset from parent");
        self.inner.draft.enqueue(Transition::replace(fresh))
    }

    pub fn lens(&self) -> &Lens<P, T> {
        &self.inner.lens
    }
}

impl<P: Model, T: Model> Store<T> for DetachedStore<P, T> {
    fn id(&self) -> &str {
        &self.inner.id
    }

    /// The parent's value seen through the lens, not the draft.
    fn data(&self) -> Flow<T> {
        self.inner.data.clone()
    }

    fn current(&self) -> Result<T, StoreError> {
        Ok(self.inner.lens.get(&self.inner.parent.current()?)?)
    }

    /// Transitions modify the draft only.
    fn enqueue(&self, transition: Transition<T>) -> Applied {
        let transition =
            transition.recover_with(self.inner.id.clone(), Arc::clone(&self.inner.on_error));
        self.inner.draft.enqueue(transition)
    }
}

impl<P, T> Clone for DetachedStore<P, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, T> fmt::Debug for DetachedStore<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetachedStore")
            .field("id", &self.inner.id)
            .field("lens", &self.inner.lens)
            .finish()
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

    #[derive(Debug, Clone, PartialEq)]
    struct Form {
        name: String,
        saved: u32,
    }

    fn name() -> Lens<Form, String> {
        Lens::new("name", |f: &Form| f.name.clone(), |f: Form, name| Form { name, ..f })
    }

    fn form() -> RootStore<Form> {
        RootStore::builder(Form {
            name: "ada".into(),
            saved: 0,
        })
        .id("form")
        .build()
    }

    #[tokio::test]
    async fn writes_stay_local_until_synced() {
        let root = form();
        let detached = root.detach(name()).unwrap();
        assert_eq!(detached.id(), "form.name");

        detached.update("grace".into()).await.unwrap();
        assert_eq!(detached.draft().unwrap(), "grace");
        assert_eq!(detached.detached().current(), Some("grace".to_string()));
        assert_eq!(root.current().unwrap().name, "ada");
        assert_eq!(detached.current().unwrap(), "ada");

        detached.sync_by().await.unwrap();
        assert_eq!(root.current().unwrap().name, "grace");
        assert_eq!(detached.data().current(), Some("grace".to_string()));
    }

    #[tokio::test]
    async fn parent_changes_do_not_overwrite_draft() {
        let root = form();
        let detached = root.detach(name()).unwrap();
        detached.update("draft".into()).await.unwrap();

        root.sub(name()).update("external".into()).await.unwrap();
        assert_eq!(detached.draft().unwrap(), "draft");

        detached.reset().await.unwrap();
        assert_eq!(detached.draft().unwrap(), "external");
    }

    #[tokio::test]
    async fn sync_with_routes_through_handler() {
        let root = form();
        let detached = root.detach(name()).unwrap();
        let saves = Arc::new(Mutex::new(Vec::new()));

        let saves_clone = saves.clone();
        let save = root.handle_with(move |form: Form, name: String| {
            saves_clone.lock().push(name.clone());
            Form {
                name,
                saved: form.saved + 1,
            }
        });

        detached.update("lin".into()).await.unwrap();
        detached.sync_with(&save).await.unwrap();

        assert_eq!(*saves.lock(), vec!["lin".to_string()]);
        assert_eq!(
            root.current().unwrap(),
            Form {
                name: "lin".into(),
                saved: 1
            }
        );
    }

    #[tokio::test]
    async fn sync_with_may_target_the_draft_itself() {
        let root = form();
        let detached = root.detach(name()).unwrap();
        let shout = detached.handle_with(|_, name: String| name.to_uppercase());

        tokio::time::timeout(std::time::Duration::from_secs(1), detached.sync_with(&shout))
            .await
            .expect("sync finished")
            .unwrap();

        assert_eq!(detached.draft().unwrap(), "ADA");
        assert_eq!(root.current().unwrap().name, "ada");
    }

    #[tokio::test]
    async fn sync_handler_syncs_on_call() {
        let root = form();
        let detached = root.detach(name()).unwrap();
        let submit = detached.sync_handler();

        detached.update("kay".into()).await.unwrap();
        submit.call(()).await.unwrap();

        assert_eq!(root.current().unwrap().name, "kay");
    }

    #[tokio::test]
    async fn failed_draft_transitions_keep_the_draft() {
        let root = form();
        let detached = root.detach(name()).unwrap();

        detached
            .try_handle(|_, ()| Err::<String, _>("invalid name"))
            .call(())
            .await
            .unwrap();

        assert_eq!(detached.draft().unwrap(), "ada");
    }

    #[tokio::test]
    async fn detach_fails_on_unfocusable_parent() {
        let root = RootStore::new(Vec::<Form>::new());
        let result = root.detach(crate::lens::lens_of_index(0));
        assert!(matches!(result, Err(StoreError::Transition(TransitionError::Lens(_)))));
    }
}
