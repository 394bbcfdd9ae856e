//! Voice conversation controller: state machine, barge-in and focus handling.

pub mod barge_in;
pub mod controller;
pub mod focus;
pub(crate) mod messages;
pub mod state;

pub use barge_in::BargeInArbiter;
pub use controller::{ControllerHandle, VoiceController};
pub use focus::FocusedConversation;
pub use state::{ConversationState, SessionSnapshot, VoiceSession};
