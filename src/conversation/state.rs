//! Conversation state and the voice session it belongs to.

use std::fmt;

use uuid::Uuid;

use crate::navigation::RouteId;

/// Canonical conversation state. Exactly one value at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    Listening,
    Speaking,
    /// Waiting on the response generator.
    Thinking,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Speaking => "speaking",
            Self::Thinking => "thinking",
        })
    }
}

/// One logical voice-mode activation.
///
/// Owned by the controller; only [`transition`](Self::transition) changes the
/// state.
#[derive(Debug, Clone, Default)]
pub struct VoiceSession {
    id: Option<Uuid>,
    active: bool,
    state: ConversationState,
    last_recognized_text: Option<String>,
}

impl VoiceSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier of the current (or most recent) activation.
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn last_recognized_text(&self) -> Option<&str> {
        self.last_recognized_text.as_deref()
    }

    /// Begin a fresh activation. The state itself is left to the caller.
    pub(crate) fn activate(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.id = Some(id);
        self.active = true;
        self.last_recognized_text = None;
        id
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
        self.last_recognized_text = None;
    }

    pub(crate) fn record(&mut self, text: String) {
        self.last_recognized_text = Some(text);
    }

    /// Move to `to`, returning the previous state if it changed.
    pub(crate) fn transition(&mut self, to: ConversationState) -> Option<ConversationState> {
        if self.state == to {
            return None;
        }
        let from = self.state;
        self.state = to;
        Some(from)
    }
}

/// Settled view of the controller, as returned by
/// [`ControllerHandle::snapshot`](super::ControllerHandle::snapshot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: Option<Uuid>,
    pub active: bool,
    pub state: ConversationState,
    pub last_recognized_text: Option<String>,
    pub recognizing: bool,
    /// Whether speech resources are currently held.
    pub resources_held: bool,
    pub route: RouteId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_idle_and_inactive() {
        let session = VoiceSession::new();
        assert_eq!(session.state(), ConversationState::Idle);
        assert!(!session.is_active());
        assert!(session.id().is_none());
        assert!(session.last_recognized_text().is_none());
    }

    #[test]
    fn transition_reports_previous_state_once() {
        let mut session = VoiceSession::new();
        assert_eq!(
            session.transition(ConversationState::Listening),
            Some(ConversationState::Idle)
        );
        assert_eq!(session.transition(ConversationState::Listening), None);
        assert_eq!(session.state(), ConversationState::Listening);
    }

    #[test]
    fn each_activation_gets_new_id_and_clears_text() {
        let mut session = VoiceSession::new();
        let first = session.activate();
        session.record("scene".into());
        session.deactivate();
        assert!(session.last_recognized_text().is_none());
        assert!(!session.is_active());

        let second = session.activate();
        assert_ne!(first, second);
        assert!(session.is_active());
    }
}
