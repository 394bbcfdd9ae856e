//! OpenAI-compatible chat completions backend.
//!
//! Works with any server implementing `POST /v1/chat/completions`; the default
//! configuration targets Groq.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use super::{ResponseGenerator, TopicHint};
use crate::config::ResponderConfig;
use crate::error::{Result, VoiceError};

const SYSTEM_PROMPT: &str = "You are SenseGuide, a calm and clear voice assistant for people \
with low vision. Speak slowly, clearly, and give helpful real-world guidance. Keep responses \
short (under 2 sentences) and safe.";

/// Spoken when the API answers with an empty message.
pub const EMPTY_REPLY: &str = "I'm not sure what to say.";

fn topic_suffix(topic: TopicHint) -> &'static str {
    match topic {
        TopicHint::General => "",
        TopicHint::Scene => " The user has just asked to describe a scene.",
        TopicHint::Object => " The user asks what object is in front of them.",
        TopicHint::Text => " The user wants you to read text.",
    }
}

/// [`ResponseGenerator`] over an OpenAI-compatible HTTP API.
pub struct ApiResponseGenerator {
    config: ResponderConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for ApiResponseGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiResponseGenerator")
            .field("api_url", &self.config.api_url)
            .field("model", &self.config.model)
            .finish()
    }
}

impl ApiResponseGenerator {
    pub fn new(config: ResponderConfig) -> Self {
        info!(
            "response generator configured: {} model={}",
            config.api_url, config.model
        );
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_request(&self, user_text: &str, topic: TopicHint) -> (String, serde_json::Value) {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.api_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": format!("{SYSTEM_PROMPT}{}", topic_suffix(topic))},
                {"role": "user", "content": user_text},
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });
        (url, body)
    }

    fn map_http_error(status: reqwest::StatusCode, body: &str) -> VoiceError {
        let message = extract_error_message(body);
        match status.as_u16() {
            401 => VoiceError::ResponseGenerator(format!("authentication failed: {message}")),
            429 => VoiceError::ResponseGenerator(format!("rate limited: {message}")),
            code => VoiceError::ResponseGenerator(format!("HTTP {code}: {message}")),
        }
    }
}

/// Extract an error message from an OpenAI-style error body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl ResponseGenerator for ApiResponseGenerator {
    async fn generate(&self, user_text: &str, topic: TopicHint) -> Result<String> {
        let (url, body) = self.build_request(user_text, topic);

        let mut request = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VoiceError::ResponseGenerator(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Self::map_http_error(status, &body_text));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VoiceError::ResponseGenerator(format!("malformed response: {e}")))?;

        let reply = value
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(EMPTY_REPLY)
            .to_owned();
        debug!(?topic, "generated reply: {reply}");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_error_message_prefers_json() {
        let body = r#"{"error": {"message": "Invalid API key"}}"#;
        assert_eq!(extract_error_message(body), "Invalid API key");
        assert_eq!(extract_error_message("plain"), "plain");
    }

    #[test]
    fn request_carries_prompt_suffix_and_limits() {
        let generator = ApiResponseGenerator::new(ResponderConfig {
            api_url: "http://localhost:9999/".to_owned(),
            ..ResponderConfig::default()
        });
        let (url, body) = generator.build_request("what is this", TopicHint::Object);
        assert_eq!(url, "http://localhost:9999/v1/chat/completions");
        assert_eq!(body["max_tokens"], 150);
        let system = body["messages"][0]["content"].as_str().unwrap_or_default();
        assert!(system.starts_with("You are SenseGuide"));
        assert!(system.ends_with("what object is in front of them."));
        assert_eq!(body["messages"][1]["content"], "what is this");
    }

    #[test]
    fn general_topic_has_no_suffix() {
        assert!(topic_suffix(TopicHint::General).is_empty());
    }
}
