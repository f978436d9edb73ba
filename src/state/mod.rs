//! Reducer-driven state containers.
//!
//! Each container is a pure `reduce(&State, Action) -> State` function plus
//! a store that owns the current state, applies actions one at a time, and
//! publishes every new snapshot on a [`tokio::sync::watch`] channel. Views
//! subscribe to the channel and call the store's imperative methods; they
//! never mutate state directly.
//!
//! The transition tables live in the `reduce` functions and are the
//! authoritative description of each container's behaviour.

pub mod job;
pub mod upload;

pub use job::{JobAction, JobState, JobStore};
pub use upload::{UploadAction, UploadState, UploadStore};
