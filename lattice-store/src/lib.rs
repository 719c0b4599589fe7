//! Lattice Store
//!
//! This crate provides the state layer of the Lattice reactive UI framework.
//! It implements:
//!
//! - Composable lenses focusing parts of immutable values
//! - Stores: an ordered update queue per root, plus derived views
//! - Identity-aware list diffing producing structural patches
//! - Mount points applying values and patches to an external structure
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Flows, subscriptions, lifecycle jobs and typed scopes
//! - `lens`: The `Lens` type and its collection constructors
//! - `store`: Root, sub, detached and mapped stores and their handlers
//! - `patch`: The patch model and the diff engine
//! - `mount`: Single and multi mount points and the list/slot reconcilers
//!
//! Data flows in one direction: an event reaches a [`Handler`], which
//! enqueues a transition on a store. The root store applies transitions one
//! at a time and publishes each new value on its [`Flow`]. Derived stores
//! see that value through their lens; list values are diffed into
//! [`Patch`]es that a mount point applies to the live structure.
//!
//! # Example
//!
//! ```rust
//! use lattice_store::prelude::*;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Todo { id: u32, done: bool }
//!
//! # #[tokio::main] async fn main() {
//! let todos = RootStore::new(vec![Todo { id: 1, done: false }]);
//!
//! // A store focused on the todo with id 1, and on its `done` flag.
//! let done = Lens::new("done", |t: &Todo| t.done, |t: Todo, done| Todo { done, ..t });
//! let first = todos.sub(lens_of_element(1, |t: &Todo| t.id) + done);
//!
//! first.handle(|done| !done).call(()).await.unwrap();
//! assert!(todos.current().unwrap()[0].done);
//! # }
//! ```

pub mod error;
pub mod lens;
pub mod mount;
pub mod patch;
pub mod reactive;
pub mod store;

pub use error::{LensError, PatchError, StoreError, TransitionError};
pub use lens::Lens;
pub use patch::Patch;
pub use reactive::{Flow, Job, Subscription};
pub use store::{Handler, RootStore, Store, StoreExt};

/// Everything needed to define and wire stores.
pub mod prelude {
    pub use crate::lens::{
        lens_of_element, lens_of_index, lens_of_key, lens_of_variant, lens_with_default, Lens,
    };
    pub use crate::mount::{mount_multi, mount_single, ListMount, SlotMount};
    pub use crate::patch::Patch;
    pub use crate::reactive::{Flow, Job, Scope, ScopeKey};
    pub use crate::store::{Handler, RootStore, Store, StoreExt, Transition};
}
