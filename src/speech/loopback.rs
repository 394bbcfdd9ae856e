//! In-process speech provider driven programmatically.
//!
//! Recognition results are injected through a [`LoopbackDriver`]; synthesis
//! "plays" by recording the call and completing according to a
//! [`SynthesisMode`]. Every capability call is recorded so callers can inspect
//! exactly what the controller asked the provider to do.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{
    SpeechEvent, SpeechEventSender, SpeechProvider, SpeechResources, SpeechToken, UtteranceId,
};
use crate::error::{Result, VoiceError};

/// A capability call made against the loopback resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Connect { region: String },
    StartRecognition,
    StopRecognition,
    Speak { utterance: UtteranceId, text: String },
    PauseOutput,
    ResumeOutput,
    CancelOutput,
    Release,
}

/// How synthesized utterances finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SynthesisMode {
    /// Completion is reported as soon as `speak_text` returns.
    #[default]
    Immediate,
    /// Completion is reported after a fixed playback time.
    After(Duration),
    /// Completion only happens through [`LoopbackDriver::complete_speech`].
    Manual,
}

#[derive(Debug, Default)]
struct Shared {
    events: Option<SpeechEventSender>,
    recognizing: bool,
    playing: Option<UtteranceId>,
    paused: bool,
    overlapping_starts: usize,
    calls: Vec<ProviderCall>,
    fail_connect: Option<String>,
    fail_next_speak: Option<String>,
    reject_next_speak: Option<String>,
}

impl Shared {
    fn emit(&self, event: SpeechEvent) -> bool {
        match &self.events {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// Loopback [`SpeechProvider`].
#[derive(Debug, Clone, Default)]
pub struct LoopbackProvider {
    shared: Arc<Mutex<Shared>>,
    mode: SynthesisMode,
}

impl LoopbackProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how synthesized utterances complete.
    pub fn with_synthesis(mut self, mode: SynthesisMode) -> Self {
        self.mode = mode;
        self
    }

    /// Make every `connect` fail with `reason`.
    pub fn failing(self, reason: impl Into<String>) -> Self {
        lock(&self.shared).fail_connect = Some(reason.into());
        self
    }

    /// Handle for injecting recognition events and inspecting calls.
    pub fn driver(&self) -> LoopbackDriver {
        LoopbackDriver {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[async_trait]
impl SpeechProvider for LoopbackProvider {
    async fn connect(
        &self,
        token: SpeechToken,
        events: SpeechEventSender,
    ) -> Result<Box<dyn SpeechResources>> {
        let mut shared = lock(&self.shared);
        if let Some(reason) = &shared.fail_connect {
            return Err(VoiceError::ProviderInit(reason.clone()));
        }
        shared.calls.push(ProviderCall::Connect {
            region: token.region,
        });
        shared.events = Some(events);
        shared.recognizing = false;
        shared.playing = None;
        shared.paused = false;
        Ok(Box::new(LoopbackResources {
            shared: Arc::clone(&self.shared),
            mode: self.mode,
        }))
    }
}

struct LoopbackResources {
    shared: Arc<Mutex<Shared>>,
    mode: SynthesisMode,
}

#[async_trait]
impl SpeechResources for LoopbackResources {
    async fn start_recognition(&mut self) -> Result<()> {
        let mut shared = lock(&self.shared);
        shared.calls.push(ProviderCall::StartRecognition);
        shared.recognizing = true;
        Ok(())
    }

    async fn stop_recognition(&mut self) -> Result<()> {
        let mut shared = lock(&self.shared);
        shared.calls.push(ProviderCall::StopRecognition);
        shared.recognizing = false;
        Ok(())
    }

    fn speak_text(&mut self, utterance: UtteranceId, text: &str) -> Result<()> {
        let mut shared = lock(&self.shared);
        shared.calls.push(ProviderCall::Speak {
            utterance,
            text: text.to_owned(),
        });
        if shared.playing.is_some() {
            shared.overlapping_starts += 1;
        }

        if let Some(reason) = shared.reject_next_speak.take() {
            return Err(VoiceError::Synthesis(reason));
        }

        if let Some(reason) = shared.fail_next_speak.take() {
            shared.playing = None;
            shared.emit(SpeechEvent::SynthesisFailed { utterance, reason });
            return Ok(());
        }

        match self.mode {
            SynthesisMode::Immediate => {
                shared.playing = None;
                shared.emit(SpeechEvent::SynthesisCompleted(utterance));
            }
            SynthesisMode::After(duration) => {
                shared.playing = Some(utterance);
                let handle = Arc::clone(&self.shared);
                tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    let mut shared = lock(&handle);
                    if shared.playing == Some(utterance) {
                        shared.playing = None;
                        shared.emit(SpeechEvent::SynthesisCompleted(utterance));
                    }
                });
            }
            SynthesisMode::Manual => {
                shared.playing = Some(utterance);
            }
        }
        Ok(())
    }

    fn pause_output(&mut self) {
        let mut shared = lock(&self.shared);
        shared.calls.push(ProviderCall::PauseOutput);
        shared.paused = true;
    }

    fn resume_output(&mut self) {
        let mut shared = lock(&self.shared);
        shared.calls.push(ProviderCall::ResumeOutput);
        shared.paused = false;
    }

    fn cancel_output(&mut self) {
        let mut shared = lock(&self.shared);
        shared.calls.push(ProviderCall::CancelOutput);
        if let Some(utterance) = shared.playing.take() {
            debug!(%utterance, "loopback output cancelled");
        }
    }

    async fn release(&mut self) {
        let mut shared = lock(&self.shared);
        shared.calls.push(ProviderCall::Release);
        shared.events = None;
        shared.recognizing = false;
        shared.playing = None;
    }
}

/// Test and demo handle for a [`LoopbackProvider`].
#[derive(Debug, Clone)]
pub struct LoopbackDriver {
    shared: Arc<Mutex<Shared>>,
}

impl LoopbackDriver {
    /// Inject a partial result. Returns `false` when recognition is not running.
    pub fn partial(&self, text: impl Into<String>) -> bool {
        self.recognized(SpeechEvent::Partial(text.into()))
    }

    /// Inject a final result. Returns `false` when recognition is not running.
    pub fn final_result(&self, text: impl Into<String>) -> bool {
        self.recognized(SpeechEvent::Final(text.into()))
    }

    fn recognized(&self, event: SpeechEvent) -> bool {
        let shared = lock(&self.shared);
        shared.recognizing && shared.emit(event)
    }

    /// Report that continuous recognition ended on its own.
    pub fn recognition_ended(&self) -> bool {
        let mut shared = lock(&self.shared);
        shared.recognizing = false;
        shared.emit(SpeechEvent::RecognitionEnded)
    }

    /// Report a provider-side recognition cancellation.
    pub fn recognition_canceled(&self, reason: impl Into<String>) -> bool {
        let mut shared = lock(&self.shared);
        shared.recognizing = false;
        shared.emit(SpeechEvent::RecognitionCanceled(reason.into()))
    }

    /// Finish the utterance that is currently playing, if any.
    pub fn complete_speech(&self) -> Option<UtteranceId> {
        let mut shared = lock(&self.shared);
        let utterance = shared.playing.take()?;
        shared.emit(SpeechEvent::SynthesisCompleted(utterance));
        Some(utterance)
    }

    /// Fail the utterance that is currently playing, if any.
    pub fn fail_speech(&self, reason: impl Into<String>) -> Option<UtteranceId> {
        let mut shared = lock(&self.shared);
        let utterance = shared.playing.take()?;
        shared.emit(SpeechEvent::SynthesisFailed {
            utterance,
            reason: reason.into(),
        });
        Some(utterance)
    }

    /// Deliver a completion event for an arbitrary utterance id.
    pub fn complete_utterance(&self, utterance: UtteranceId) -> bool {
        lock(&self.shared).emit(SpeechEvent::SynthesisCompleted(utterance))
    }

    /// Make the next `speak_text` report a synthesis failure.
    pub fn fail_next_speak(&self, reason: impl Into<String>) {
        lock(&self.shared).fail_next_speak = Some(reason.into());
    }

    /// Make the next `speak_text` call itself return an error.
    pub fn reject_next_speak(&self, reason: impl Into<String>) {
        lock(&self.shared).reject_next_speak = Some(reason.into());
    }

    /// Every capability call so far, in order.
    pub fn calls(&self) -> Vec<ProviderCall> {
        lock(&self.shared).calls.clone()
    }

    /// Texts passed to `speak_text`, in order.
    pub fn spoken(&self) -> Vec<String> {
        lock(&self.shared)
            .calls
            .iter()
            .filter_map(|c| match c {
                ProviderCall::Speak { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Utterance currently producing audio.
    pub fn playing(&self) -> Option<UtteranceId> {
        lock(&self.shared).playing
    }

    /// Number of `speak_text` calls made while another utterance was still playing.
    pub fn overlapping_starts(&self) -> usize {
        lock(&self.shared).overlapping_starts
    }

    pub fn is_recognizing(&self) -> bool {
        lock(&self.shared).recognizing
    }

    /// Whether resources are currently connected.
    pub fn is_connected(&self) -> bool {
        lock(&self.shared).events.is_some()
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.shared).paused
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use tokio::sync::mpsc;

    async fn connected(mode: SynthesisMode) -> (
        Box<dyn SpeechResources>,
        LoopbackDriver,
        mpsc::UnboundedReceiver<SpeechEvent>,
    ) {
        let provider = LoopbackProvider::new().with_synthesis(mode);
        let driver = provider.driver();
        let (tx, rx) = mpsc::unbounded_channel();
        let resources = provider
            .connect(SpeechToken::new("t", "local"), tx)
            .await
            .unwrap();
        (resources, driver, rx)
    }

    #[tokio::test]
    async fn failing_provider_rejects_connect() {
        let provider = LoopbackProvider::new().failing("no credentials");
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = provider.connect(SpeechToken::new("t", "r"), tx).await;
        assert!(matches!(result, Err(VoiceError::ProviderInit(_))));
        assert!(!provider.driver().is_connected());
    }

    #[tokio::test]
    async fn recognition_events_only_flow_while_recognizing() {
        let (mut resources, driver, mut rx) = connected(SynthesisMode::Manual).await;
        assert!(!driver.partial("hel"));

        resources.start_recognition().await.unwrap();
        assert!(driver.partial("hel"));
        assert!(driver.final_result("hello"));
        assert_eq!(rx.recv().await, Some(SpeechEvent::Partial("hel".into())));
        assert_eq!(rx.recv().await, Some(SpeechEvent::Final("hello".into())));

        resources.stop_recognition().await.unwrap();
        assert!(!driver.final_result("ignored"));
    }

    #[tokio::test]
    async fn immediate_mode_completes_synchronously() {
        let (mut resources, driver, mut rx) = connected(SynthesisMode::Immediate).await;
        resources.speak_text(UtteranceId(1), "hi").unwrap();
        assert_eq!(driver.playing(), None);
        assert_eq!(
            rx.try_recv().unwrap(),
            SpeechEvent::SynthesisCompleted(UtteranceId(1))
        );
    }

    #[tokio::test]
    async fn cancel_stops_manual_playback_and_counts_overlap() {
        let (mut resources, driver, _rx) = connected(SynthesisMode::Manual).await;
        resources.speak_text(UtteranceId(1), "one").unwrap();
        resources.speak_text(UtteranceId(2), "two").unwrap();
        assert_eq!(driver.overlapping_starts(), 1);

        resources.cancel_output();
        assert_eq!(driver.playing(), None);
        assert_eq!(driver.complete_speech(), None);
    }

    #[tokio::test]
    async fn rejected_speak_returns_error_without_event() {
        let (mut resources, driver, mut rx) = connected(SynthesisMode::Manual).await;
        driver.reject_next_speak("voice not found");
        let result = resources.speak_text(UtteranceId(1), "one");
        assert!(matches!(result, Err(VoiceError::Synthesis(_))));
        assert_eq!(driver.playing(), None);
        assert!(rx.try_recv().is_err());

        resources.speak_text(UtteranceId(2), "two").unwrap();
        assert_eq!(driver.playing(), Some(UtteranceId(2)));
    }

    #[tokio::test]
    async fn timed_mode_skips_cancelled_utterance() {
        let (mut resources, _driver, mut rx) =
            connected(SynthesisMode::After(Duration::from_millis(20))).await;
        resources.speak_text(UtteranceId(1), "one").unwrap();
        resources.cancel_output();
        resources.speak_text(UtteranceId(2), "two").unwrap();

        assert_eq!(
            rx.recv().await,
            Some(SpeechEvent::SynthesisCompleted(UtteranceId(2)))
        );
    }

    #[tokio::test]
    async fn release_disconnects() {
        let (mut resources, driver, _rx) = connected(SynthesisMode::Manual).await;
        resources.release().await;
        assert!(!driver.is_connected());
        assert_eq!(driver.calls().last(), Some(&ProviderCall::Release));
    }
}
