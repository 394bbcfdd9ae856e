//! Speech I/O provider boundary.
//!
//! A [`SpeechProvider`] turns a [`SpeechToken`] into live [`SpeechResources`]
//! (recognizer, synthesizer and output sink). The controller only ever holds the
//! resources behind the capability trait; the raw handles stay inside the
//! provider adapter.
//!
//! Recognition results and synthesis completions are delivered asynchronously
//! as [`SpeechEvent`]s on the channel handed to [`SpeechProvider::connect`].

pub mod loopback;
pub mod token;

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

pub use token::{HttpTokenSource, SpeechToken, StaticToken, TokenSource};

/// Identity of one `speak` request.
///
/// Completion and failure events carry the id of the utterance they belong to
/// so that events from a cancelled utterance can be told apart from the
/// current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(pub u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utt-{}", self.0)
    }
}

/// Events emitted by a connected provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Provisional, in-progress transcript.
    Partial(String),
    /// Confirmed, complete utterance.
    Final(String),
    /// Continuous recognition ended.
    RecognitionEnded,
    /// The recognizer cancelled the session (auth expiry, network loss).
    RecognitionCanceled(String),
    /// An utterance finished playing.
    SynthesisCompleted(UtteranceId),
    /// An utterance failed mid-synthesis.
    SynthesisFailed { utterance: UtteranceId, reason: String },
}

/// Sender half handed to providers for event delivery.
pub type SpeechEventSender = mpsc::UnboundedSender<SpeechEvent>;

/// Factory for live speech resources.
#[async_trait]
pub trait SpeechProvider: Send + Sync + 'static {
    /// Create recognizer, synthesizer and output sink.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::ProviderInit`](crate::error::VoiceError::ProviderInit)
    /// if the provider rejects the token or cannot reach its service.
    async fn connect(
        &self,
        token: SpeechToken,
        events: SpeechEventSender,
    ) -> Result<Box<dyn SpeechResources>>;
}

/// Capability handle over live speech resources.
///
/// Output control methods are synchronous so that a cancel is applied before
/// the controller issues the next `speak_text`.
#[async_trait]
pub trait SpeechResources: Send {
    /// Begin continuous recognition. Returns once the engine acknowledged.
    async fn start_recognition(&mut self) -> Result<()>;

    /// Stop continuous recognition. Returns once the engine acknowledged.
    async fn stop_recognition(&mut self) -> Result<()>;

    /// Start synthesizing `text`. Completion is reported as a [`SpeechEvent`].
    fn speak_text(&mut self, utterance: UtteranceId, text: &str) -> Result<()>;

    /// Pause the output sink.
    fn pause_output(&mut self);

    /// Resume the output sink.
    fn resume_output(&mut self);

    /// Drop any in-flight synthesis.
    fn cancel_output(&mut self);

    /// Tear down recognizer, synthesizer and sink.
    async fn release(&mut self);
}
