//! Runtime events emitted by the voice controller for UI and observability.
//!
//! Events are broadcast; a slow or absent subscriber never blocks the controller.

use crate::conversation::ConversationState;
use crate::navigation::RouteId;
use crate::speech::UtteranceId;
use crate::voice_command::Command;

/// Events that describe what the controller is doing "right now".
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    /// The conversation state changed.
    StateChanged {
        from: ConversationState,
        to: ConversationState,
    },
    /// Voice mode became active.
    SessionStarted,
    /// Voice mode was stopped.
    SessionStopped,
    /// A final utterance was recognized (normalized text).
    Recognized { text: String },
    /// The router classified the last utterance.
    Routed { command: Command },
    /// Speech output started.
    Speaking { utterance: UtteranceId, text: String },
    /// User speech interrupted an utterance.
    BargeIn { utterance: UtteranceId },
    /// A navigation request was sent to the host.
    NavigationRequested { route: RouteId },
}
