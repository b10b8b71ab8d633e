//! Mutation lifecycle state machine

use crate::error::{TimelineError, TimelineResult};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationState {
    Idle,
    /// Optimistic transform committed, transport call pending
    Applying,
    Settled,
    RolledBack,
    Reconciling,
}

impl MutationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationState::Idle => "idle",
            MutationState::Applying => "applying",
            MutationState::Settled => "settled",
            MutationState::RolledBack => "rolled_back",
            MutationState::Reconciling => "reconciling",
        }
    }

    pub fn can_transition_to(&self, next: MutationState) -> bool {
        use MutationState::*;
        matches!(
            (self, next),
            (Idle, Applying)
                | (Applying, Settled)
                | (Applying, RolledBack)
                | (Settled, Reconciling)
                | (RolledBack, Reconciling)
                | (Reconciling, Idle)
        )
    }
}

impl fmt::Display for MutationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus every state visited so far
#[derive(Debug, Clone)]
pub struct MutationTrace {
    history: Vec<MutationState>,
}

impl Default for MutationTrace {
    fn default() -> Self {
        Self {
            history: vec![MutationState::Idle],
        }
    }
}

impl MutationTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutationState {
        self.history
            .last()
            .copied()
            .unwrap_or(MutationState::Idle)
    }

    pub fn advance(&mut self, next: MutationState) -> TimelineResult<()> {
        let current = self.state();
        if !current.can_transition_to(next) {
            return Err(TimelineError::Consistency(format!(
                "invalid mutation transition {} -> {}",
                current, next
            )));
        }
        self.history.push(next);
        Ok(())
    }

    pub fn history(&self) -> &[MutationState] {
        &self.history
    }

    pub fn into_history(self) -> Vec<MutationState> {
        self.history
    }
}
