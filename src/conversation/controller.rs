//! The voice controller actor.
//!
//! A single tokio task owns the session, the speech resources and every state
//! transition. Inputs are drained in priority order: shutdown, provider
//! events, self-scheduled follow-ups, then external requests. Each external
//! request is answered only after it has been fully applied, so a caller that
//! awaits a [`ControllerHandle`] method observes a settled controller.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::barge_in::BargeInArbiter;
use super::messages::{ControllerRequest, FollowUp};
use super::state::{ConversationState, SessionSnapshot, VoiceSession};
use crate::announcer::{PageChangeAnnouncer, announcement};
use crate::config::VoiceConfig;
use crate::error::{Result, VoiceError};
use crate::navigation::{Navigator, NoopNavigator, RouteId};
use crate::priority::PriorityLock;
use crate::responder::{CannedResponder, ResponseGenerator, TopicHint, reply_or_apologize};
use crate::runtime::RuntimeEvent;
use crate::speech::{
    SpeechEvent, SpeechEventSender, SpeechProvider, SpeechResources, TokenSource, UtteranceId,
};
use crate::voice_command::{Command, CommandRouter, normalize};

const REQUEST_CHANNEL_SIZE: usize = 32;
const EVENT_CHANNEL_SIZE: usize = 128;

/// Cloneable front door to a running [`VoiceController`].
#[derive(Clone)]
pub struct ControllerHandle {
    request_tx: mpsc::Sender<ControllerRequest>,
    event_tx: broadcast::Sender<RuntimeEvent>,
    lock: PriorityLock,
}

impl std::fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerHandle")
            .field("closed", &self.request_tx.is_closed())
            .finish()
    }
}

impl ControllerHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ControllerRequest,
    ) -> Result<T> {
        let (reply, response_rx) = oneshot::channel();
        self.request_tx
            .send(build(reply))
            .await
            .map_err(|e| VoiceError::Channel(format!("failed to send controller request: {e}")))?;
        response_rx
            .await
            .map_err(|e| VoiceError::Channel(format!("controller reply dropped: {e}")))
    }

    /// Enter voice mode.
    ///
    /// Provider initialization failures are absorbed: the call still succeeds
    /// and the session stays inactive and silent. Only a stopped controller
    /// yields an error.
    pub async fn start(&self) -> Result<()> {
        self.request(|reply| ControllerRequest::Start { reply }).await
    }

    /// Leave voice mode. Calling it while inactive is a no-op.
    ///
    /// Returns with the controller `Idle`; the farewell keeps playing on
    /// detached resources that are released when it ends.
    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| ControllerRequest::Stop { reply }).await
    }

    /// Speak `text`. With `interrupt`, any current utterance is cancelled
    /// first; without it, the text is dropped while something is playing.
    pub async fn speak(&self, text: impl Into<String>, interrupt: bool) -> Result<()> {
        let text = text.into();
        self.request(|reply| ControllerRequest::Speak {
            text,
            interrupt,
            reply,
        })
        .await
    }

    /// Cancel the current utterance, if any.
    pub async fn cancel_speech(&self) -> Result<()> {
        self.request(|reply| ControllerRequest::CancelSpeech { reply })
            .await
    }

    /// Execute an already-classified command.
    pub async fn dispatch(&self, command: Command) -> Result<()> {
        self.request(|reply| ControllerRequest::Dispatch { command, reply })
            .await
    }

    /// Report that the host switched to `route`.
    pub async fn page_changed(&self, route: RouteId) -> Result<()> {
        self.request(|reply| ControllerRequest::PageChanged { route, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(|reply| ControllerRequest::Snapshot { reply })
            .await
    }

    pub async fn state(&self) -> Result<ConversationState> {
        Ok(self.snapshot().await?.state)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.event_tx.subscribe()
    }

    /// The lock consulted by this controller's command router.
    pub fn priority_lock(&self) -> &PriorityLock {
        &self.lock
    }
}

/// Resources handed off by `stop()` while the farewell plays out.
struct Farewell {
    utterance: UtteranceId,
    resources: Box<dyn SpeechResources>,
}

/// Serialized owner of the voice session.
pub struct VoiceController {
    config: VoiceConfig,
    provider: Arc<dyn SpeechProvider>,
    tokens: Arc<dyn TokenSource>,
    generator: Arc<dyn ResponseGenerator>,
    navigator: Arc<dyn Navigator>,
    lock: PriorityLock,
    router: CommandRouter,
    barge_in: BargeInArbiter,
    announcer: PageChangeAnnouncer,

    session: VoiceSession,
    resources: Option<Box<dyn SpeechResources>>,
    recognizing: bool,
    current_utterance: Option<UtteranceId>,
    next_utterance: u64,
    reply_ticket: u64,
    pending_reply: Option<u64>,
    reply_task: Option<JoinHandle<()>>,
    farewell: Option<Farewell>,
    route: RouteId,

    event_tx: broadcast::Sender<RuntimeEvent>,
    speech_tx: SpeechEventSender,
    speech_rx: mpsc::UnboundedReceiver<SpeechEvent>,
    follow_tx: mpsc::UnboundedSender<FollowUp>,
    follow_rx: mpsc::UnboundedReceiver<FollowUp>,
    request_tx: mpsc::Sender<ControllerRequest>,
    request_rx: mpsc::Receiver<ControllerRequest>,
}

impl VoiceController {
    pub fn new(
        config: VoiceConfig,
        provider: Arc<dyn SpeechProvider>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        let lock = PriorityLock::new();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (speech_tx, speech_rx) = mpsc::unbounded_channel();
        let (follow_tx, follow_rx) = mpsc::unbounded_channel();
        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);

        Self {
            generator: Arc::new(CannedResponder::new(config.responder.apology.clone())),
            navigator: Arc::new(NoopNavigator),
            router: CommandRouter::new(lock.clone()),
            barge_in: BargeInArbiter::new(&config.barge_in),
            announcer: PageChangeAnnouncer::new(&config.announcer),
            lock,
            config,
            provider,
            tokens,
            session: VoiceSession::new(),
            resources: None,
            recognizing: false,
            current_utterance: None,
            next_utterance: 0,
            reply_ticket: 0,
            pending_reply: None,
            reply_task: None,
            farewell: None,
            route: RouteId::Home,
            event_tx,
            speech_tx,
            speech_rx,
            follow_tx,
            follow_rx,
            request_tx,
            request_rx,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn ResponseGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    /// Share an existing priority lock with the command router.
    pub fn with_priority_lock(mut self, lock: PriorityLock) -> Self {
        self.router = CommandRouter::new(lock.clone());
        self.lock = lock;
        self
    }

    /// View the host shows before the first page-change report.
    pub fn with_initial_route(mut self, route: RouteId) -> Self {
        self.route = route;
        self
    }

    #[must_use]
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            request_tx: self.request_tx.clone(),
            event_tx: self.event_tx.clone(),
            lock: self.lock.clone(),
        }
    }

    /// Spawn the actor on the current runtime.
    pub fn spawn(self, cancel: CancellationToken) -> (ControllerHandle, tokio::task::JoinHandle<()>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run(cancel));
        (handle, task)
    }

    /// Process inputs until `cancel` fires or every handle is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        // Drop our own sender so the inbox closes once every handle is gone.
        let (closed_tx, _) = mpsc::channel(1);
        self.request_tx = closed_tx;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(event) = self.speech_rx.recv() => self.on_speech_event(event).await,
                Some(follow_up) = self.follow_rx.recv() => self.on_follow_up(follow_up),
                request = self.request_rx.recv() => match request {
                    Some(request) => self.on_request(request).await,
                    None => break,
                },
            }
        }

        self.shutdown().await;
    }

    async fn on_request(&mut self, request: ControllerRequest) {
        match request {
            ControllerRequest::Start { reply } => {
                self.start().await;
                let _ = reply.send(());
            }
            ControllerRequest::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(());
            }
            ControllerRequest::Speak {
                text,
                interrupt,
                reply,
            } => {
                self.speak(&text, interrupt);
                let _ = reply.send(());
            }
            ControllerRequest::CancelSpeech { reply } => {
                if self.interrupt_output() {
                    self.settle_after_speech();
                }
                let _ = reply.send(());
            }
            ControllerRequest::Dispatch { command, reply } => {
                self.execute(command);
                let _ = reply.send(());
            }
            ControllerRequest::PageChanged { route, reply } => {
                self.page_changed(route);
                let _ = reply.send(());
            }
            ControllerRequest::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    async fn on_speech_event(&mut self, event: SpeechEvent) {
        match event {
            SpeechEvent::Partial(text) => self.on_partial(&text),
            SpeechEvent::Final(text) => self.on_final(&text),
            SpeechEvent::RecognitionEnded => {
                debug!("recognition ended");
                self.on_recognition_lost();
            }
            SpeechEvent::RecognitionCanceled(reason) => {
                let err = VoiceError::RecognitionCanceled(reason);
                warn!("{err}");
                self.on_recognition_lost();
            }
            SpeechEvent::SynthesisCompleted(utterance) => {
                if self.farewell_finished(utterance).await {
                    debug!(%utterance, "farewell completed");
                } else if self.current_utterance == Some(utterance) {
                    debug!(%utterance, "utterance completed");
                    self.current_utterance = None;
                    self.settle_after_speech();
                } else {
                    debug!(%utterance, "ignoring completion of superseded utterance");
                }
            }
            SpeechEvent::SynthesisFailed { utterance, reason } => {
                if self.farewell_finished(utterance).await {
                    debug!(%utterance, "farewell failed: {reason}");
                } else if self.current_utterance == Some(utterance) {
                    let err = VoiceError::Synthesis(reason);
                    warn!(%utterance, "{err}");
                    self.current_utterance = None;
                    self.settle_after_speech();
                } else {
                    debug!(%utterance, "ignoring failure of superseded utterance");
                }
            }
        }
    }

    fn on_follow_up(&mut self, follow_up: FollowUp) {
        match follow_up {
            FollowUp::Reply { ticket, text } => {
                if self.pending_reply != Some(ticket) {
                    debug!(ticket, "dropping superseded reply");
                    return;
                }
                self.pending_reply = None;
                self.reply_task = None;
                if !self.session.is_active() {
                    debug!(ticket, "dropping reply for inactive session");
                    return;
                }
                if !self.speak(&text, true) {
                    self.settle_after_speech();
                }
            }
            FollowUp::Announce { route } => {
                if !self.session.is_active() {
                    debug!(%route, "voice mode inactive, skipping announcement");
                    return;
                }
                if route != self.route {
                    debug!(%route, current = %self.route, "page changed again, skipping announcement");
                    return;
                }
                if let Some(text) = announcement(route) {
                    self.speak(text, true);
                }
            }
        }
    }

    async fn start(&mut self) {
        let interrupted = self.interrupt_output();

        if self.session.is_active() && self.recognizing {
            debug!("voice mode already active");
            if interrupted {
                self.settle_after_speech();
            }
            return;
        }

        if self.resources.is_none()
            && let Some(mut farewell) = self.farewell.take()
        {
            debug!(utterance = %farewell.utterance, "reclaiming resources from farewell");
            farewell.resources.pause_output();
            farewell.resources.cancel_output();
            self.resources = Some(farewell.resources);
        }

        if self.resources.is_none() {
            let acquired = acquire_resources(
                self.tokens.as_ref(),
                self.provider.as_ref(),
                self.speech_tx.clone(),
            )
            .await;
            match acquired {
                Ok(resources) => self.resources = Some(resources),
                Err(e) => {
                    warn!("voice mode unavailable: {e}");
                    self.abandon_start();
                    return;
                }
            }
        }

        let Some(resources) = self.resources.as_mut() else {
            return;
        };
        if let Err(e) = resources.start_recognition().await {
            warn!("failed to start recognition: {e}");
            self.release_resources().await;
            self.abandon_start();
            return;
        }
        self.recognizing = true;

        if !self.session.is_active() {
            let id = self.session.activate();
            info!(session = %id, "voice mode started");
            self.emit(RuntimeEvent::SessionStarted);
        }
        self.set_state(ConversationState::Listening);

        if let Some(greeting) = self.config.conversation.greeting.clone() {
            self.speak(&greeting, true);
        }
    }

    /// Leave the session inactive and silent after a failed start.
    fn abandon_start(&mut self) {
        if self.session.is_active() {
            self.session.deactivate();
            self.emit(RuntimeEvent::SessionStopped);
        }
        self.set_state(ConversationState::Idle);
    }

    async fn stop(&mut self) {
        if !self.session.is_active() {
            debug!("voice mode already stopped");
            return;
        }

        self.session.deactivate();
        self.cancel_pending_reply();
        self.interrupt_output();
        if self.recognizing {
            self.recognizing = false;
            if let Some(resources) = self.resources.as_mut()
                && let Err(e) = resources.stop_recognition().await
            {
                warn!("failed to stop recognition: {e}");
            }
        }
        info!("voice mode stopped");
        self.emit(RuntimeEvent::SessionStopped);
        self.set_state(ConversationState::Idle);

        let Some(resources) = self.resources.take() else {
            return;
        };
        let farewell = self.config.conversation.farewell.clone();
        self.play_farewell(resources, farewell.trim()).await;
    }

    /// Hand the released session's resources to a best-effort farewell.
    ///
    /// The farewell never enters `Speaking`; the resources are released once
    /// it completes or fails, or reclaimed by the next `start()`.
    async fn play_farewell(&mut self, mut resources: Box<dyn SpeechResources>, text: &str) {
        self.recognizing = false;
        if text.is_empty() {
            resources.release().await;
            debug!("speech resources released");
            return;
        }

        self.next_utterance += 1;
        let utterance = UtteranceId(self.next_utterance);
        resources.resume_output();
        if let Err(e) = resources.speak_text(utterance, text) {
            warn!(%utterance, "farewell not spoken: {e}");
            resources.release().await;
            debug!("speech resources released");
            return;
        }
        self.emit(RuntimeEvent::Speaking {
            utterance,
            text: text.to_owned(),
        });
        self.farewell = Some(Farewell {
            utterance,
            resources,
        });
    }

    /// Release the farewell's resources if `utterance` was the farewell.
    async fn farewell_finished(&mut self, utterance: UtteranceId) -> bool {
        let Some(farewell) = self.farewell.take_if(|f| f.utterance == utterance) else {
            return false;
        };
        let mut resources = farewell.resources;
        resources.release().await;
        debug!("speech resources released after farewell");
        true
    }

    /// Start an utterance. Returns `true` if audio output started.
    ///
    /// A synthesizer that rejects the text leaves the controller settled, never
    /// in `Speaking`.
    fn speak(&mut self, text: &str, interrupt: bool) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        if self.resources.is_none() {
            debug!("no speech resources, dropping utterance: {text}");
            return false;
        }
        if self.current_utterance.is_some() {
            if !interrupt {
                debug!("already speaking, dropping utterance: {text}");
                return false;
            }
            self.interrupt_output();
        }

        self.next_utterance += 1;
        let utterance = UtteranceId(self.next_utterance);
        let Some(resources) = self.resources.as_mut() else {
            return false;
        };
        resources.resume_output();
        if let Err(e) = resources.speak_text(utterance, text) {
            warn!(%utterance, "synthesizer rejected utterance: {e}");
            self.current_utterance = None;
            self.settle_after_speech();
            return false;
        }

        self.current_utterance = Some(utterance);
        self.set_state(ConversationState::Speaking);
        self.emit(RuntimeEvent::Speaking {
            utterance,
            text: text.to_owned(),
        });
        true
    }

    /// Stop the current utterance. Returns `true` if one was playing.
    fn interrupt_output(&mut self) -> bool {
        let Some(utterance) = self.current_utterance.take() else {
            return false;
        };
        if let Some(resources) = self.resources.as_mut() {
            resources.pause_output();
            resources.cancel_output();
        }
        debug!(%utterance, "speech output cancelled");
        true
    }

    /// Pick the resting state once nothing is playing.
    fn settle_after_speech(&mut self) {
        let next = if !self.session.is_active() {
            ConversationState::Idle
        } else if self.pending_reply.is_some() {
            ConversationState::Thinking
        } else if self.recognizing {
            ConversationState::Listening
        } else {
            ConversationState::Idle
        };
        self.set_state(next);
    }

    async fn release_resources(&mut self) {
        self.recognizing = false;
        if let Some(mut resources) = self.resources.take() {
            resources.release().await;
            debug!("speech resources released");
        }
        if let Some(mut farewell) = self.farewell.take() {
            farewell.resources.cancel_output();
            farewell.resources.release().await;
            debug!("farewell resources released");
        }
    }

    /// Abort the in-flight generator request, if any.
    fn cancel_pending_reply(&mut self) {
        self.pending_reply = None;
        if let Some(task) = self.reply_task.take() {
            task.abort();
            debug!("pending reply aborted");
        }
    }

    fn on_partial(&mut self, text: &str) {
        if !self.barge_in.should_interrupt(self.session.state(), text) {
            return;
        }
        if let Some(utterance) = self.current_utterance {
            self.interrupt_output();
            info!(%utterance, "barge-in: user started speaking");
            self.emit(RuntimeEvent::BargeIn { utterance });
            self.settle_after_speech();
        }
    }

    fn on_final(&mut self, text: &str) {
        if self.session.state() == ConversationState::Speaking
            && let Some(utterance) = self.current_utterance
        {
            self.interrupt_output();
            info!(%utterance, "final result while speaking, output cancelled");
            self.emit(RuntimeEvent::BargeIn { utterance });
            self.settle_after_speech();
        }

        if !self.session.is_active() {
            debug!("ignoring recognition while voice mode is inactive");
            return;
        }

        let normalized = normalize(text);
        if normalized.is_empty() {
            return;
        }
        debug!("recognized: {normalized}");
        self.session.record(normalized.clone());
        self.emit(RuntimeEvent::Recognized {
            text: normalized.clone(),
        });

        let command = self.router.route(&normalized, self.route);
        self.emit(RuntimeEvent::Routed {
            command: command.clone(),
        });
        self.execute(command);
    }

    fn on_recognition_lost(&mut self) {
        self.recognizing = false;
        if self.session.state() == ConversationState::Listening {
            self.set_state(ConversationState::Idle);
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Navigate(route) => {
                info!(%route, "voice navigation");
                self.navigator.navigate_to(route);
                self.emit(RuntimeEvent::NavigationRequested { route });
            }
            Command::Inform(message) => {
                self.speak(&message, true);
            }
            Command::Forward(text) => self.forward(text),
            Command::Ignored => debug!("no command matched"),
        }
    }

    fn forward(&mut self, text: String) {
        if !self.session.is_active() {
            debug!("voice mode inactive, not forwarding");
            return;
        }
        if self.interrupt_output() {
            debug!("new question supersedes current utterance");
        }
        self.cancel_pending_reply();

        self.reply_ticket += 1;
        let ticket = self.reply_ticket;
        self.pending_reply = Some(ticket);
        self.set_state(ConversationState::Thinking);

        let generator = Arc::clone(&self.generator);
        let topic = TopicHint::for_route(self.route);
        let apology = self.config.responder.apology.clone();
        let tx = self.follow_tx.clone();
        self.reply_task = Some(tokio::spawn(async move {
            let text = reply_or_apologize(generator.as_ref(), &text, topic, &apology).await;
            let _ = tx.send(FollowUp::Reply { ticket, text });
        }));
    }

    fn page_changed(&mut self, route: RouteId) {
        if self.route == route {
            return;
        }
        debug!(from = %self.route, to = %route, "page changed");
        self.route = route;
        self.announcer.schedule(route, &self.follow_tx);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session.id(),
            active: self.session.is_active(),
            state: self.session.state(),
            last_recognized_text: self.session.last_recognized_text().map(str::to_owned),
            recognizing: self.recognizing,
            resources_held: self.resources.is_some(),
            route: self.route,
        }
    }

    fn set_state(&mut self, to: ConversationState) {
        if let Some(from) = self.session.transition(to) {
            debug!(%from, %to, "conversation state");
            self.emit(RuntimeEvent::StateChanged { from, to });
        }
    }

    fn emit(&self, event: RuntimeEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    async fn shutdown(&mut self) {
        self.interrupt_output();
        self.cancel_pending_reply();
        if self.recognizing
            && let Some(resources) = self.resources.as_mut()
            && let Err(e) = resources.stop_recognition().await
        {
            warn!("failed to stop recognition on shutdown: {e}");
        }
        if self.session.is_active() {
            self.session.deactivate();
            self.emit(RuntimeEvent::SessionStopped);
        }
        self.set_state(ConversationState::Idle);
        self.release_resources().await;
        debug!("voice controller shut down");
    }
}

async fn acquire_resources(
    tokens: &dyn TokenSource,
    provider: &dyn SpeechProvider,
    events: SpeechEventSender,
) -> Result<Box<dyn SpeechResources>> {
    let token = tokens.acquire().await?;
    debug!(region = %token.region, "speech token acquired");
    provider.connect(token, events).await
}
