//! Priority lock shared between the global command router and focused features.
//!
//! A focused sub-conversation (the open Q&A screen) raises the lock to claim
//! every recognized utterance for itself; while raised, global navigation
//! commands are suppressed. The flag lives behind an `Arc<AtomicBool>` so that
//! every check reads the current value, no matter when the reader was created.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared "a focused feature owns command interpretation" flag.
///
/// Cloning yields another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct PriorityLock {
    raised: Arc<AtomicBool>,
}

impl PriorityLock {
    /// Create a lowered lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim exclusive command handling.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Release exclusive command handling.
    pub fn lower(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }

    /// Whether a focused feature currently owns command interpretation.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_lowered() {
        assert!(!PriorityLock::new().is_raised());
    }

    #[test]
    fn clones_observe_latest_write() {
        let lock = PriorityLock::new();
        let reader = lock.clone();

        lock.raise();
        assert!(reader.is_raised());

        reader.lower();
        assert!(!lock.is_raised());
    }

    #[test]
    fn reader_moved_into_closure_before_raise_sees_raise() {
        let lock = PriorityLock::new();
        let captured = lock.clone();
        let check = move || captured.is_raised();

        assert!(!check());
        lock.raise();
        assert!(check());
    }
}
