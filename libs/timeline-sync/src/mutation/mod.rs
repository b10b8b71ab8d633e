//! Optimistic mutations
//!
//! A [`MutationIntent`] is applied to every cached copy of its target before
//! the server is asked. Failure restores each touched entry from a snapshot;
//! either way the originating feed is invalidated afterwards.

mod coordinator;
mod intent;
mod state;

pub use coordinator::{MutationCoordinator, MutationOutcome};
pub use intent::{
    AccountProperty, DeleteSource, MutationIntent, PollAction, StatusProperty, StatusTarget,
};
pub use state::{MutationState, MutationTrace};
