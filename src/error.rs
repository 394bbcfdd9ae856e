//! Error types for the voice conversation controller.
//!
//! Every variant here is recovered locally by the controller; none of them
//! terminate the process. The worst observable outcome is silence.

/// Top-level error type for the voice controller and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// Token, auth or network failure while acquiring speech resources.
    #[error("speech provider init error: {0}")]
    ProviderInit(String),

    /// The recognizer reported a cancellation.
    #[error("recognition canceled: {0}")]
    RecognitionCanceled(String),

    /// Text-to-speech failed mid-utterance.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// The response generator could not produce a reply.
    #[error("response generator error: {0}")]
    ResponseGenerator(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Controller inbox closed or a reply was dropped.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, VoiceError>;
