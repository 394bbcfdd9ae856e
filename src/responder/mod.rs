//! Response generation for open-ended questions.
//!
//! A [`ResponseGenerator`] turns a user utterance plus a [`TopicHint`] into a
//! short spoken reply. Failures never reach the conversation state machine:
//! [`reply_or_apologize`] substitutes a fixed apology.

pub mod api;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::navigation::RouteId;

pub use api::ApiResponseGenerator;

/// What the user is most likely asking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TopicHint {
    #[default]
    General,
    Scene,
    Object,
    Text,
}

impl TopicHint {
    /// Topic implied by the view the user is on.
    pub fn for_route(route: RouteId) -> Self {
        match route {
            RouteId::Scene => Self::Scene,
            RouteId::Object => Self::Object,
            RouteId::Text => Self::Text,
            _ => Self::General,
        }
    }
}

/// Text in, short natural-language text out.
#[async_trait]
pub trait ResponseGenerator: Send + Sync + 'static {
    /// Generate a reply.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::ResponseGenerator`](crate::error::VoiceError::ResponseGenerator)
    /// when no reply could be produced.
    async fn generate(&self, user_text: &str, topic: TopicHint) -> Result<String>;
}

/// Generate a reply, degrading to `apology` on any failure.
pub async fn reply_or_apologize(
    generator: &dyn ResponseGenerator,
    user_text: &str,
    topic: TopicHint,
    apology: &str,
) -> String {
    match generator.generate(user_text, topic).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("response generation failed, apologizing: {e}");
            apology.to_owned()
        }
    }
}

/// Generator that answers every question with the same text.
#[derive(Debug, Clone)]
pub struct CannedResponder {
    reply: String,
}

impl CannedResponder {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl ResponseGenerator for CannedResponder {
    async fn generate(&self, _user_text: &str, _topic: TopicHint) -> Result<String> {
        Ok(self.reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoiceError;

    struct Broken;

    #[async_trait]
    impl ResponseGenerator for Broken {
        async fn generate(&self, _user_text: &str, _topic: TopicHint) -> Result<String> {
            Err(VoiceError::ResponseGenerator("offline".into()))
        }
    }

    #[test]
    fn topic_follows_route() {
        assert_eq!(TopicHint::for_route(RouteId::Scene), TopicHint::Scene);
        assert_eq!(TopicHint::for_route(RouteId::Object), TopicHint::Object);
        assert_eq!(TopicHint::for_route(RouteId::Text), TopicHint::Text);
        assert_eq!(TopicHint::for_route(RouteId::Audio), TopicHint::General);
        assert_eq!(TopicHint::for_route(RouteId::Home), TopicHint::General);
    }

    #[tokio::test]
    async fn failure_degrades_to_apology() {
        let reply = reply_or_apologize(&Broken, "hi", TopicHint::General, "sorry").await;
        assert_eq!(reply, "sorry");
    }

    #[tokio::test]
    async fn success_passes_through() {
        let canned = CannedResponder::new("It is sunny.");
        let reply = reply_or_apologize(&canned, "weather?", TopicHint::Scene, "sorry").await;
        assert_eq!(reply, "It is sunny.");
    }
}
