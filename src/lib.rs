//! SenseGuide: voice conversation controller for a voice-first assistant.
//!
//! The controller drives a continuous listen → recognize → act → speak loop:
//! Speech provider → State machine (barge-in) → Command router → Speak
//!
//! # Architecture
//!
//! A single actor owns every state transition; collaborators sit behind traits:
//! - **Speech provider**: streaming recognition plus interruptible synthesis
//! - **Response generator**: short replies for open-ended questions
//! - **Navigator**: the host view that voice commands switch between
//! - **Priority lock**: lets a focused Q&A mode claim all recognized speech
//! - **Announcer**: speaks a short line when the host changes view

pub mod announcer;
pub mod config;
pub mod conversation;
pub mod error;
pub mod navigation;
pub mod priority;
pub mod responder;
pub mod runtime;
pub mod speech;
pub mod voice_command;

pub use config::VoiceConfig;
pub use conversation::{
    ControllerHandle, ConversationState, FocusedConversation, SessionSnapshot, VoiceController,
};
pub use error::{Result, VoiceError};
pub use navigation::{Navigator, RouteId};
pub use priority::PriorityLock;
pub use runtime::RuntimeEvent;
pub use voice_command::{Command, CommandRouter};
