//! Conversation state and iteration budget for one agent run

use sandpit_provider::Turn;

/// Append-only log of turns sent to the model every round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Start a conversation from the user's prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::User(prompt.into())],
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }
}

/// Rounds left before the loop gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationBudget {
    limit: u32,
    used: u32,
}

impl IterationBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    /// Record one completed round. Saturates at the limit.
    pub fn consume(&mut self) {
        if self.used < self.limit {
            self.used += 1;
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}
