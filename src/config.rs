//! Configuration types for the voice conversation controller.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Greeting spoken after voice mode starts successfully.
pub const DEFAULT_GREETING: &str = "Hello, I'm SenseGuide. I'm here to help you. \
You can say Scene, Object, Text, or Audio. I'm currently running in MVP mode. \
To know my use case say benefit.";

/// Top-level configuration for the voice controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Start/stop utterances.
    pub conversation: ConversationConfig,
    /// Barge-in (interrupt) behavior while the assistant is speaking.
    pub barge_in: BargeInConfig,
    /// Page-change announcements.
    pub announcer: AnnouncerConfig,
    /// Response generator connection settings.
    pub responder: ResponderConfig,
    /// Speech provider bootstrap settings.
    pub speech: SpeechConfig,
}

/// Voice session utterances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Spoken once recognition has started. `None` or an empty string starts silently.
    pub greeting: Option<String>,
    /// Spoken best-effort when voice mode stops.
    pub farewell: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            greeting: Some(DEFAULT_GREETING.to_owned()),
            farewell: "Voice mode stopped.".to_owned(),
        }
    }
}

/// Barge-in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BargeInConfig {
    /// Cancel speech output when a partial recognition result arrives.
    pub enabled: bool,
}

impl Default for BargeInConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Page-change announcer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncerConfig {
    /// Whether navigation changes are announced at all.
    pub enabled: bool,
    /// Settle delay between the navigation change and the announcement.
    pub delay_ms: u64,
}

impl Default for AnnouncerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 500,
        }
    }
}

/// Response generator (OpenAI-compatible chat completions) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Base URL of the API, without the `/v1/chat/completions` suffix.
    pub api_url: String,
    /// Model identifier.
    pub model: String,
    /// Bearer token. Falls back to `GROQ_API_KEY` when unset.
    pub api_key: Option<String>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens per reply; replies are meant to be short.
    pub max_tokens: u32,
    /// Upper bound on a single generation request.
    pub timeout_secs: u64,
    /// Spoken in place of a reply when generation fails.
    pub apology: String,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.groq.com/openai".to_owned(),
            model: "llama-3.3-70b-versatile".to_owned(),
            api_key: None,
            temperature: 0.5,
            max_tokens: 150,
            timeout_secs: 20,
            apology: "I am having trouble connecting to the assistant.".to_owned(),
        }
    }
}

/// Speech provider bootstrap settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Backend base URL serving `GET /speech/token`.
    ///
    /// When `None`, providers that need a token fail to initialize.
    pub token_url: Option<String>,
}

impl VoiceConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::VoiceError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::VoiceError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Fill secrets that are absent from the file from the environment.
    pub fn apply_env(&mut self) {
        if self.responder.api_key.is_none() {
            self.responder.api_key = std::env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty());
        }
    }

    /// Returns the default config file path: `~/.config/senseguide/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("senseguide").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("senseguide")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/senseguide-config/config.toml")
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = VoiceConfig::default();
        assert!(config.conversation.greeting.is_some());
        assert_eq!(config.conversation.farewell, "Voice mode stopped.");
        assert!(config.barge_in.enabled);
        assert!(config.announcer.enabled);
        assert_eq!(config.announcer.delay_ms, 500);
        assert!(config.responder.max_tokens > 0);
        assert!(config.responder.timeout_secs > 0);
        assert!(!config.responder.apology.is_empty());
        assert!(config.speech.token_url.is_none());
    }

    #[test]
    fn default_greeting_lists_modes_and_release_stage() {
        let greeting = VoiceConfig::default().conversation.greeting.unwrap();
        assert!(greeting.contains("Scene, Object, Text, or Audio"));
        assert!(greeting.contains("running in MVP mode"));
        assert!(greeting.ends_with("say benefit."));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = VoiceConfig::default();
        config.announcer.delay_ms = 250;
        config.conversation.greeting = Some(String::new());
        config.speech.token_url = Some("http://localhost:5000".to_owned());

        config.save_to_file(&path).unwrap();
        assert!(path.exists());

        let loaded = VoiceConfig::from_file(&path).unwrap();
        assert_eq!(loaded.announcer.delay_ms, 250);
        assert_eq!(loaded.conversation.greeting.as_deref(), Some(""));
        assert_eq!(
            loaded.speech.token_url.as_deref(),
            Some("http://localhost:5000")
        );
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = VoiceConfig::from_file(std::path::Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();

        let result = VoiceConfig::from_file(&path);
        assert!(matches!(result, Err(crate::error::VoiceError::Config(_))));
    }

    #[test]
    fn partial_section_uses_defaults() {
        let toml_str = r#"
[responder]
model = "llama-3.1-8b-instant"
"#;
        let config: VoiceConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.responder.model, "llama-3.1-8b-instant");
        assert_eq!(config.responder.max_tokens, 150);
        assert!(config.barge_in.enabled);
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = VoiceConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("senseguide"));
    }
}
