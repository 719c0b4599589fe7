//! Error Types
//!
//! Three kinds of failure can occur in the store pipeline:
//!
//! - [`LensError`]: a lens could not focus its target. `NotFound` covers a
//!   missing index, key or id and a failed variant cast; `Ambiguous` covers
//!   an id that matched more than one element. Both are contract violations
//!   on the caller's side and are reported, never silently skipped.
//!
//! - [`TransitionError`]: computing the next state failed. The transition
//!   returned an error, panicked, or a lens on the write path failed.
//!
//! - [`StoreError`]: what an awaited [`Applied`](crate::store::Applied)
//!   resolves to when the enqueued transition did not take effect.
//!
//! [`PatchError`] is separate: it reports a patch that does not fit the
//! sequence it is applied to.

use std::error::Error as StdError;

/// Boxed error produced by a user supplied transition.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A lens failed to focus on its target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LensError {
    /// The focused element, index, key or variant is absent.
    #[error("lens `{lens}`: target not found ({detail})")]
    NotFound { lens: String, detail: String },

    /// An identity lens matched more than one element.
    #[error("lens `{lens}`: {matches} elements share the requested id")]
    Ambiguous { lens: String, matches: usize },
}

impl LensError {
    pub(crate) fn not_found(lens: &str, detail: impl Into<String>) -> Self {
        Self::NotFound {
            lens: lens.to_string(),
            detail: detail.into(),
        }
    }

    /// The id of the lens that failed.
    pub fn lens(&self) -> &str {
        match self {
            Self::NotFound { lens, .. } | Self::Ambiguous { lens, .. } => lens,
        }
    }
}

/// Computing the next state of a store failed.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error(transparent)]
    Lens(#[from] LensError),

    #[error("transition failed: {0}")]
    Failed(#[source] BoxError),

    #[error("transition panicked: {0}")]
    Panicked(String),
}

impl TransitionError {
    /// Wrap an arbitrary error raised inside a transition.
    pub fn failed<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Failed(error.into())
    }

    /// Convert a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked(message)
    }
}

/// An enqueued transition did not take effect.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The store's update task is gone, so the transition was never applied.
    #[error("store `{store}` is closed")]
    Closed { store: String },
}

impl From<LensError> for StoreError {
    fn from(error: LensError) -> Self {
        Self::Transition(TransitionError::Lens(error))
    }
}

/// A patch addressed a position outside the target sequence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{patch} at {index} out of bounds for length {len}")]
pub struct PatchError {
    pub patch: &'static str,
    pub index: usize,
    pub len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lens_error_reports_lens_id() {
        let err = LensError::not_found("person.name", "index 4 out of 0..2");
        assert_eq!(err.lens(), "person.name");
        assert_eq!(
            err.to_string(),
            "lens `person.name`: target not found (index 4 out of 0..2)"
        );
    }

    #[test]
    fn panic_payloads_become_messages() {
        let err = TransitionError::from_panic(Box::new("boom"));
        assert!(matches!(err, TransitionError::Panicked(ref m) if m == "boom"));

        let err = TransitionError::from_panic(Box::new(String::from("bang")));
        assert!(matches!(err, TransitionError::Panicked(ref m) if m == "bang"));

        let err = TransitionError::from_panic(Box::new(42_u8));
        assert!(matches!(err, TransitionError::Panicked(_)));
    }

    #[test]
    fn lens_errors_lift_into_store_errors() {
        let err: StoreError = LensError::Ambiguous {
            lens: "items".into(),
            matches: 2,
        }
        .into();
        assert!(matches!(
            err,
            StoreError::Transition(TransitionError::Lens(LensError::Ambiguous { matches: 2, .. }))
        ));
    }
}
