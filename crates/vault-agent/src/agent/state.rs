//! Conversation state for one agent loop invocation
//!
//! Owned exclusively by the loop that created it and discarded at loop
//! exit; nothing here survives a run.

use agent_core::Message;

#[derive(Debug, Default)]
pub struct AgentState {
    /// Ordered conversation turns.
    pub messages: Vec<Message>,
    /// Completed model round trips.
    pub iteration: usize,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn increment_iteration(&mut self) {
        self.iteration += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_tracks_iterations() {
        let mut state = AgentState::new();
        assert_eq!(state.iteration, 0);
        state.increment_iteration();
        state.increment_iteration();
        assert_eq!(state.iteration, 2);
    }

    #[test]
    fn test_state_accumulates_messages() {
        let mut state = AgentState::new();
        state.add_message(Message::user_text("hello"));
        state.add_message(Message::assistant(vec![]));
        assert_eq!(state.messages.len(), 2);
    }
}
