//! Map Store
//!
//! A [`MapStore`] is a derived store through a [`Mapper`]: a getter and a
//! setter that may fail and need not satisfy the lens laws. The typical use
//! is presenting a number as text and parsing edits back.
//!
//! Reads follow the parent like a sub store. A failed write is contained the
//! same way: the error handler's recovery value is written back instead.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::{BoxError, StoreError, TransitionError};
use crate::lens::join_ids;
use crate::reactive::Flow;

use super::transition::{Applied, ErrorHandler, Transition};
use super::{Model, Store};

type MapGet<P, T> = Arc<dyn Fn(&P) -> Result<T, TransitionError> + Send + Sync>;
type MapSet<P, T> = Arc<dyn Fn(&P, T) -> Result<P, TransitionError> + Send + Sync>;

/// Two-way conversion between a parent value and a derived value.
pub struct Mapper<P, T> {
    id: String,
    get: MapGet<P, T>,
    set: MapSet<P, T>,
}

impl<P: 'static, T: 'static> Mapper<P, T> {
    /// A mapper whose conversions cannot fail.
    pub fn new<G, S>(id: impl Into<String>, get: G, set: S) -> Self
    where
        G: Fn(&P) -> T + Send + Sync + 'static,
        S: Fn(&P, T) -> P + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            get: Arc::new(move |p: &P| Ok::<_, TransitionError>(get(p))),
            set: Arc::new(move |p: &P, value: T| Ok::<_, TransitionError>(set(p, value))),
        }
    }

    /// A mapper whose conversions may fail, e.g. parsing.
    pub fn try_new<G, S, E1, E2>(id: impl Into<String>, get: G, set: S) -> Self
    where
        G: Fn(&P) -> Result<T, E1> + Send + Sync + 'static,
        S: Fn(&P, T) -> Result<P, E2> + Send + Sync + 'static,
        E1: Into<BoxError>,
        E2: Into<BoxError>,
    {
        Self {
            id: id.into(),
            get: Arc::new(move |p: &P| get(p).map_err(TransitionError::failed)),
            set: Arc::new(move |p: &P, value: T| set(p, value).map_err(TransitionError::failed)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, parent: &P) -> Result<T, TransitionError> {
        (self.get)(parent)
    }

    pub fn set(&self, parent: &P, value: T) -> Result<P, TransitionError> {
        (self.set)(parent, value)
    }
}

impl<P, T> Clone for Mapper<P, T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<P, T> fmt::Debug for Mapper<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper").field("id", &self.id).finish_non_exhaustive()
    }
}

struct MapInner<P, T> {
    id: String,
    parent: Arc<dyn Store<P>>,
    mapper: Mapper<P, T>,
    data: Flow<T>,
    on_error: ErrorHandler<T>,
}

/// Store derived through a [`Mapper`].
pub struct MapStore<P, T> {
    inner: Arc<MapInner<P, T>>,
}

impl<P: Model, T: Model> MapStore<P, T> {
    pub(crate) fn new(
        parent: Arc<dyn Store<P>>,
        mapper: Mapper<P, T>,
        on_error: ErrorHandler<T>,
    ) -> Self {
        let id = join_ids(parent.id(), mapper.id());

        let get = mapper.clone();
        let log_id = id.clone();
        let data = parent
            .data()
            .filter_map(move |value| match get.get(value) {
                Ok(mapped) => Some(mapped),
                Err(error) => {
                    trace!(store = %log_id, %error, "parent value not mappable");
                    None
                }
            })
            .distinct_until_changed();
        debug!(store = %id, "map store derived");

        Self {
            inner: Arc::new(MapInner {
                id,
                parent,
                mapper,
                data,
                on_error,
            }),
        }
    }

    pub fn mapper(&self) -> &Mapper<P, T> {
        &self.inner.mapper
    }
}

impl<P: Model, T: Model> Store<T> for MapStore<P, T> {
    fn id(&self) -> &str {
        &self.inner.id
    }

    fn data(&self) -> Flow<T> {
        self.inner.data.clone()
    }

    fn current(&self) -> Result<T, StoreError> {
        Ok(self.inner.mapper.get(&self.inner.parent.current()?)?)
    }

    fn enqueue(&self, transition: Transition<T>) -> Applied {
        let mapper = self.inner.mapper.clone();
        let on_error = Arc::clone(&self.inner.on_error);
        let id = self.inner.id.clone();

        self.inner.parent.enqueue(Transition::try_future(move |parent: P| async move {
            let old = mapper.get(&parent)?;
            let attempt = match transition.run(old.clone()).await {
                Ok(next) => mapper.set(&parent, next),
                Err(error) => Err(error),
            };
            match attempt {
                Ok(next) => Ok(next),
                Err(error @ TransitionError::Lens(_)) => Err(error),
                Err(error) => {
                    warn!(store = %id, %error, "transition failed, applying recovery value");
                    mapper.set(&parent, on_error(&error, old))
                }
            }
        }))
    }
}

impl<P, T> Clone for MapStore<P, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, T> fmt::Debug for MapStore<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapStore")
            .field("id", &self.inner.id)
            .field("mapper", &self.inner.mapper)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
