//! State shared by every announcer backend.
//!
//! Backends embed an [`AnnouncerCore`] and expose it through
//! [`Announcer::core`](super::Announcer::core); the trait's default methods
//! read readiness and completion from it.

use tokio::sync::broadcast;

use crate::utterance::Utterance;

// ---------------------------------------------------------------------------
// AnnouncementComplete
// ---------------------------------------------------------------------------

/// Completion event emitted once per announced (or skipped) utterance.
#[derive(Debug, Clone)]
pub struct AnnouncementComplete {
    /// The utterance the event belongs to.
    pub utterance: Utterance,
    /// The text that was announced, or `None` when nothing was output.
    pub text: Option<String>,
    /// `true` when the announcement was stopped before it finished.
    pub interrupted: bool,
}

// ---------------------------------------------------------------------------
// AnnouncerCore
// ---------------------------------------------------------------------------

/// Readiness flags plus the completion event channel.
pub struct AnnouncerCore {
    ready_to_announce: bool,
    has_spoken: bool,
    complete_tx: broadcast::Sender<AnnouncementComplete>,
}

impl AnnouncerCore {
    /// Completion events buffered per subscriber.
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a core whose completion channel buffers `capacity` events per
    /// subscriber (clamped to at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let (complete_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            ready_to_announce: true,
            has_spoken: false,
            complete_tx,
        }
    }

    pub fn ready_to_announce(&self) -> bool {
        self.ready_to_announce
    }

    pub fn set_ready_to_announce(&mut self, ready: bool) {
        self.ready_to_announce = ready;
    }

    pub fn has_spoken(&self) -> bool {
        self.has_spoken
    }

    /// Record that the backend has produced output at least once.
    pub fn mark_spoken(&mut self) {
        self.has_spoken = true;
    }

    /// Receive every completion event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AnnouncementComplete> {
        self.complete_tx.subscribe()
    }

    /// Emit the completion event for `utterance`.
    pub fn emit_complete(&self, utterance: Utterance, text: Option<String>, interrupted: bool) {
        let id = utterance.id();
        let event = AnnouncementComplete {
            utterance,
            text,
            interrupted,
        };
        // Only fails when nobody is subscribed.
        if self.complete_tx.send(event).is_err() {
            log::trace!("announcer: completion for {id} had no subscribers");
        }
    }
}

impl Default for AnnouncerCore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_ready_and_silent() {
        let core = AnnouncerCore::new();
        assert!(core.ready_to_announce());
        assert!(!core.has_spoken());
    }

    #[test]
    fn subscribers_receive_completion() {
        let core = AnnouncerCore::new();
        let mut rx = core.subscribe();
        let u = Utterance::new("done");

        core.emit_complete(u.clone(), Some("done".into()), false);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.utterance, u);
        assert_eq!(event.text.as_deref(), Some("done"));
        assert!(!event.interrupted);
    }

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let core = AnnouncerCore::new();
        core.emit_complete(Utterance::new("nobody listening"), None, false);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let core = AnnouncerCore::with_capacity(0);
        let mut rx = core.subscribe();
        core.emit_complete(Utterance::new("x"), None, false);
        assert!(rx.try_recv().is_ok());
    }
}
