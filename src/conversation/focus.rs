//! Focused Q&A conversation layered on the shared recognizer.
//!
//! While focused, the priority lock is raised so global navigation commands
//! are suppressed, and every recognized utterance is forwarded to the response
//! generator instead. Leaving focus lowers the lock without stopping
//! recognition.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ControllerHandle;
use crate::error::Result;
use crate::runtime::RuntimeEvent;
use crate::voice_command::Command;

/// Open-ended voice Q&A mode.
#[derive(Debug)]
pub struct FocusedConversation {
    handle: ControllerHandle,
    listener: Option<(CancellationToken, JoinHandle<()>)>,
}

impl FocusedConversation {
    pub fn new(handle: ControllerHandle) -> Self {
        Self {
            handle,
            listener: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.listener.is_some()
    }

    /// Claim exclusive command handling, starting voice mode if needed.
    pub async fn activate(&mut self) -> Result<()> {
        if self.listener.is_some() {
            return Ok(());
        }

        let mut events = self.handle.subscribe();
        let cancel = CancellationToken::new();
        let handle = self.handle.clone();
        let stop = cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    () = stop.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Ok(RuntimeEvent::Recognized { text }) => {
                        if !handle.priority_lock().is_raised() {
                            continue;
                        }
                        if let Err(e) = handle.dispatch(Command::Forward(text)).await {
                            warn!("focused conversation lost the controller: {e}");
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "focused conversation lagged behind runtime events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("focused conversation listener exited");
        });
        self.listener = Some((cancel, task));

        self.handle.priority_lock().raise();
        info!("focused conversation active");

        if !self.handle.snapshot().await?.active {
            self.handle.start().await?;
        }
        Ok(())
    }

    /// Release command handling back to the global router.
    pub fn deactivate(&mut self) {
        self.handle.priority_lock().lower();
        if let Some((cancel, _task)) = self.listener.take() {
            cancel.cancel();
            info!("focused conversation ended");
        }
    }
}

impl Drop for FocusedConversation {
    fn drop(&mut self) {
        if self.listener.is_some() {
            self.deactivate();
        }
    }
}
