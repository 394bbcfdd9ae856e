//! Messages processed by the controller actor.

use tokio::sync::oneshot;

use super::state::SessionSnapshot;
use crate::navigation::RouteId;
use crate::voice_command::Command;

/// External request from a [`ControllerHandle`](super::ControllerHandle).
///
/// The reply is sent once the request has been fully applied.
#[derive(Debug)]
pub(crate) enum ControllerRequest {
    Start {
        reply: oneshot::Sender<()>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Speak {
        text: String,
        interrupt: bool,
        reply: oneshot::Sender<()>,
    },
    CancelSpeech {
        reply: oneshot::Sender<()>,
    },
    Dispatch {
        command: Command,
        reply: oneshot::Sender<()>,
    },
    PageChanged {
        route: RouteId,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Work the controller scheduled for itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FollowUp {
    /// A generator reply; only the newest ticket is spoken.
    Reply { ticket: u64, text: String },
    /// A page-change announcement whose settle delay elapsed.
    Announce { route: RouteId },
}
