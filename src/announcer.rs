//! Spoken announcements on navigation changes.
//!
//! Announcements are scheduled unconditionally; whether the session is active
//! is checked by the controller when the delay elapses.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::config::AnnouncerConfig;
use crate::conversation::messages::FollowUp;
use crate::navigation::RouteId;

/// Fixed announcement for a destination, if it has one.
pub fn announcement(route: RouteId) -> Option<&'static str> {
    match route {
        RouteId::Home => Some("Home page opened"),
        RouteId::Scene => Some("Scene understanding mode"),
        RouteId::Object => Some("Object identification mode"),
        RouteId::Text => Some("Text reading mode"),
        RouteId::Audio => Some(
            "Audio mode opened. Tap the microphone button to start talking with your voice companion.",
        ),
        RouteId::Settings | RouteId::History => None,
    }
}

/// Schedules page-change announcements after a settle delay.
#[derive(Debug, Clone)]
pub struct PageChangeAnnouncer {
    enabled: bool,
    delay: Duration,
}

impl PageChangeAnnouncer {
    pub fn new(config: &AnnouncerConfig) -> Self {
        Self {
            enabled: config.enabled,
            delay: Duration::from_millis(config.delay_ms),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Queue an announcement for `route`. Returns `false` when nothing was scheduled.
    pub(crate) fn schedule(&self, route: RouteId, tx: &mpsc::UnboundedSender<FollowUp>) -> bool {
        if !self.enabled || announcement(route).is_none() {
            return false;
        }
        let tx = tx.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(FollowUp::Announce { route }).is_err() {
                debug!(%route, "controller gone before announcement");
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn only_main_views_are_announced() {
        assert_eq!(announcement(RouteId::Home), Some("Home page opened"));
        assert_eq!(announcement(RouteId::Text), Some("Text reading mode"));
        assert!(announcement(RouteId::Audio).is_some());
        assert_eq!(announcement(RouteId::Settings), None);
        assert_eq!(announcement(RouteId::History), None);
    }

    #[tokio::test]
    async fn schedule_delivers_after_delay() {
        let announcer = PageChangeAnnouncer::new(&AnnouncerConfig {
            enabled: true,
            delay_ms: 10,
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(announcer.schedule(RouteId::Scene, &tx));
        assert!(rx.try_recv().is_err());
        assert_eq!(
            rx.recv().await.unwrap(),
            FollowUp::Announce {
                route: RouteId::Scene
            }
        );
    }

    #[tokio::test]
    async fn disabled_or_unmapped_schedules_nothing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let disabled = PageChangeAnnouncer::new(&AnnouncerConfig {
            enabled: false,
            delay_ms: 0,
        });
        assert!(!disabled.schedule(RouteId::Home, &tx));

        let enabled = PageChangeAnnouncer::new(&AnnouncerConfig::default());
        assert!(!enabled.schedule(RouteId::Settings, &tx));
    }
}
