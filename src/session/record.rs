//! The per-conversation session record

use crate::state_machine::{FlowState, Pending};
use std::collections::VecDeque;
use std::time::Instant;

/// Maximum outbound message references kept per conversation
pub const HISTORY_LIMIT: usize = 100;

/// Opaque reference to a message the bot sent
pub type MessageRef = i32;

/// Ephemeral context for one conversation. All facets live and die together.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub state: FlowState,
    pub pending: Option<Pending>,
    pub last_message: Option<MessageRef>,
    pub history: VecDeque<MessageRef>,
    pub last_access: Instant,
}

impl Session {
    pub fn new(now: Instant) -> Self {
        Self {
            state: FlowState::Idle,
            pending: None,
            last_message: None,
            history: VecDeque::new(),
            last_access: now,
        }
    }

    /// Append to the history, dropping the oldest entries past the limit
    pub fn push_history(&mut self, message: MessageRef) {
        self.history.push_back(message);
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    /// A flow was in progress when this session was last written
    pub fn mid_flow(&self) -> bool {
        !self.state.is_idle() || self.pending.is_some()
    }
}
