//! Reactive Primitives
//!
//! This module implements the stream and lifecycle primitives the store
//! pipeline is built on.
//!
//! # Concepts
//!
//! ## Flows
//!
//! A [`Flow`] is a push-based stream of values. Producers emit, subscribers
//! are callbacks invoked synchronously in emission order. Stores publish
//! their state on a replaying flow, so a new subscriber sees the current
//! value first. Flows compose through `map`, `filter_map`,
//! `distinct_until_changed` and `scan`.
//!
//! ## Subscriptions and Jobs
//!
//! Subscribing returns a [`Subscription`]; dropping it detaches the
//! callback. A [`Job`] groups subscriptions and cleanup callbacks into one
//! lifecycle and can be nested, so cancelling a parent job shuts down every
//! consumer that was started under it.
//!
//! ## Scopes
//!
//! A [`Scope`] is a typed registry of contextual values passed explicitly to
//! render functions instead of living in global state.

mod flow;
mod job;
mod scope;
mod subscriber;

pub use flow::Flow;
pub use job::Job;
pub use scope::{Scope, ScopeKey};
pub use subscriber::{SubscriberId, Subscription};
