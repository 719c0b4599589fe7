//! Sub Store
//!
//! A [`SubStore`] is a read-through, write-through view of its parent:
//!
//! - `data` is the parent's data mapped through the lens, with consecutive
//!   duplicates removed. Parent values the lens cannot focus (a list element
//!   that was removed, another enum variant) are skipped.
//! - `enqueue(t)` enqueues on the parent a transition that reads the focus,
//!   runs `t` on it with failures contained, and writes the result back
//!   through the lens.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{StoreError, TransitionError};
use crate::lens::{join_ids, Lens};
use crate::reactive::Flow;

use super::transition::{Applied, ErrorHandler, Transition};
use super::{Model, Store};

struct SubInner<P, T> {
    id: String,
    parent: Arc<dyn Store<P>>,
    lens: Lens<P, T>,
    data: Flow<T>,
    on_error: ErrorHandler<T>,
}

/// Store focused on part of its parent's value.
pub struct SubStore<P, T> {
    inner: Arc<SubInner<P, T>>,
}

impl<P: Model, T: Model> SubStore<P, T> {
    pub(crate) fn new(
        parent: Arc<dyn Store<P>>,
        lens: Lens<P, T>,
        on_error: ErrorHandler<T>,
    ) -> Self {
        let id = join_ids(parent.id(), lens.id());
        let data = focused(&id, &parent.data(), &lens);
        debug!(store = %id, "sub store derived");

        Self {
            inner: Arc::new(SubInner {
                id,
                parent,
                lens,
                data,
                on_error,
            }),
        }
    }

    pub fn lens(&self) -> &Lens<P, T> {
        &self.inner.lens
    }

    pub fn parent(&self) -> &Arc<dyn Store<P>> {
        &self.inner.parent
    }
}

/// The parent's data seen through `lens`.
pub(crate) fn focused<P: Model, T: Model>(
    id: &str,
    parent: &Flow<P>,
    lens: &Lens<P, T>,
) -> Flow<T> {
    let lens = lens.clone();
    let id = id.to_string();
    parent
        .filter_map(move |value| match lens.get(value) {
            Ok(focus) => Some(focus),
            Err(error) => {
                trace!(store = %id, %error, "parent value not focusable");
                None
            }
        })
        .distinct_until_changed()
}

impl<P: Model, T: Model> Store<T> for SubStore<P, T> {
    fn id(&self) -> &str {
        &self.inner.id
    }

    fn data(&self) -> Flow<T> {
        self.inner.data.clone()
    }

    fn current(&self) -> Result<T, StoreError> {
        Ok(self.inner.lens.get(&self.inner.parent.current()?)?)
    }

    fn enqueue(&self, transition: Transition<T>) -> Applied {
        let lens = self.inner.lens.clone();
        let transition =
            transition.recover_with(self.inner.id.clone(), Arc::clone(&self.inner.on_error));

        self.inner.parent.enqueue(Transition::try_future(move |parent: P| async move {
            let focus = lens.get(&parent)?;
            let next = transition.run(focus).await?;
            Ok::<_, TransitionError>(lens.set(parent, next)?)
        }))
    }
}

impl<P, T> Clone for SubStore<P, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, T> fmt::Debug for SubStore<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubStore")
            .field("id", &self.inner.id)
            .field("lens", &self.inner.lens)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
