//! Navigation targets and the navigation collaborator.

use std::fmt;

/// A navigable view of the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteId {
    Home,
    Scene,
    Object,
    /// Printed-text reading.
    Text,
    /// Open-ended voice Q&A.
    Audio,
    Settings,
    History,
}

impl RouteId {
    /// Render the route as a path.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Scene => "/scene",
            Self::Object => "/object",
            Self::Text => "/text",
            Self::Audio => "/audio",
            Self::Settings => "/settings",
            Self::History => "/history",
        }
    }

    /// Parse a path; both `/` and `/home` are the home view.
    pub fn from_path(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let path = match trimmed.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        match path.to_ascii_lowercase().as_str() {
            "/" | "/home" => Some(Self::Home),
            "/scene" => Some(Self::Scene),
            "/object" => Some(Self::Object),
            "/text" => Some(Self::Text),
            "/audio" => Some(Self::Audio),
            "/settings" => Some(Self::Settings),
            "/history" => Some(Self::History),
            _ => None,
        }
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Receives navigation requests produced by voice commands.
///
/// Fire-and-forget: the controller does not wait for the view to change.
/// Hosts report the resulting change back through
/// [`ControllerHandle::page_changed`](crate::conversation::ControllerHandle::page_changed).
pub trait Navigator: Send + Sync + 'static {
    fn navigate_to(&self, route: RouteId);
}

/// Navigator that drops every request.
#[derive(Debug, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate_to(&self, _route: RouteId) {}
}
