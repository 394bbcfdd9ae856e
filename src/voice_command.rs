//! Voice command routing.
//!
//! Recognized speech is noisy and conversational ("go to scene please"), so
//! classification is substring based over a normalized form of the utterance.
//! Rules are checked in a fixed order and the first match wins.
//!
//! | Phrase contains | Command |
//! |-----------------|---------|
//! | "benefit" / "how can you help me" (home view only) | `Inform` home summary |
//! | "home" | `Navigate(Home)` |
//! | "scene" | `Navigate(Scene)` |
//! | "object" | `Navigate(Object)` |
//! | "text" / "read" | `Navigate(Text)` |
//! | "benefits" | `Inform` capability tour |
//! | "audio" / "ask" / "assistant" | `Navigate(Audio)` |

use crate::navigation::RouteId;
use crate::priority::PriorityLock;

/// Capability summary spoken when asked on the home view.
pub const HOME_SUMMARY: &str = "I can help you understand your surroundings using your camera \
and voice. I can describe scenes, identify objects, read printed text, and answer questions \
hands-free. SenseGuide is designed to support people with low vision with simple, voice-first \
assistance.";

/// Longer capability tour, available from any view.
pub const CAPABILITY_TOUR: &str = "Here's how I can help you. I can describe your surroundings \
so you know what's in front of you. I can identify objects like bottles, phones, doors, or \
everyday items. I can read printed text such as books, notes, labels, or screens. I can act as \
a voice companion to answer questions and guide you calmly. You can use me at home, outside, \
or anywhere you need assistance. Just speak naturally, and I'll guide you step by step.";

/// Classification outcome for a recognized utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ask the host to show another view.
    Navigate(RouteId),
    /// Speak a fixed informational message.
    Inform(String),
    /// Hand the utterance to the response generator.
    Forward(String),
    /// Nothing to do.
    Ignored,
}

/// Lower-case, strip punctuation and collapse whitespace.
///
/// `"Scene, please!!"` becomes `"scene please"`.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maps normalized utterances to commands, honoring the priority lock.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    lock: PriorityLock,
}

impl CommandRouter {
    pub fn new(lock: PriorityLock) -> Self {
        Self { lock }
    }

    /// Classify `text` given the view the user is currently on.
    ///
    /// `text` is normalized again here so callers may pass raw transcripts.
    /// The lock is read on every call.
    pub fn route(&self, text: &str, current: RouteId) -> Command {
        if self.lock.is_raised() {
            return Command::Ignored;
        }

        let text = normalize(text);
        if text.is_empty() {
            return Command::Ignored;
        }

        if current == RouteId::Home
            && (text.contains("benefit") || text.contains("how can you help me"))
        {
            return Command::Inform(HOME_SUMMARY.to_owned());
        }

        if text.contains("home") {
            Command::Navigate(RouteId::Home)
        } else if text.contains("scene") {
            Command::Navigate(RouteId::Scene)
        } else if text.contains("object") {
            Command::Navigate(RouteId::Object)
        } else if text.contains("text") || text.contains("read") {
            Command::Navigate(RouteId::Text)
        } else if text.contains("benefits") {
            Command::Inform(CAPABILITY_TOUR.to_owned())
        } else if text.contains("audio") || text.contains("ask") || text.contains("assistant") {
            Command::Navigate(RouteId::Audio)
        } else {
            Command::Ignored
        }
    }
}
