//! Barge-in arbitration: the assistant never talks over the user.

use crate::config::BargeInConfig;

use super::state::ConversationState;

/// Decides whether a partial recognition result interrupts speech output.
///
/// The decision is made synchronously on event delivery; there is no debounce.
#[derive(Debug, Clone, Copy)]
pub struct BargeInArbiter {
    enabled: bool,
}

impl BargeInArbiter {
    pub fn new(config: &BargeInConfig) -> Self {
        Self {
            enabled: config.enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `true` when `partial` arrived while speaking and carries speech.
    pub fn should_interrupt(&self, state: ConversationState, partial: &str) -> bool {
        self.enabled && state == ConversationState::Speaking && !partial.trim().is_empty()
    }
}
