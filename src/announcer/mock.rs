//! Recording announcer used by unit tests.

use crate::announcer::{Announcer, AnnouncerCore};
use crate::utterance::{AnnouncerOptions, Utterance};

/// Records every call and completes only when told to.
///
/// By default a cancelled announcement completes synchronously inside the
/// cancel call; [`MockAnnouncer::deferred_cancel`] holds the completion back
/// until [`MockAnnouncer::flush_cancelled`].
pub struct MockAnnouncer {
    core: AnnouncerCore,
    pub announced: Vec<(Utterance, String)>,
    pub cancelled: Vec<Utterance>,
    pub cancel_all_calls: usize,
    pub priority_changes: Vec<Utterance>,
    current: Option<(Utterance, String)>,
    pending_cancel: Option<(Utterance, String)>,
    defer_cancel: bool,
}

impl MockAnnouncer {
    pub fn new() -> Self {
        Self {
            core: AnnouncerCore::new(),
            announced: Vec::new(),
            cancelled: Vec::new(),
            cancel_all_calls: 0,
            priority_changes: Vec::new(),
            current: None,
            pending_cancel: None,
            defer_cancel: false,
        }
    }

    /// A mock whose completion channel buffers only `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            core: AnnouncerCore::with_capacity(capacity),
            ..Self::new()
        }
    }

    pub fn deferred_cancel() -> Self {
        Self {
            defer_cancel: true,
            ..Self::new()
        }
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.core.set_ready_to_announce(ready);
    }

    /// The utterance the mock is "speaking".
    pub fn current(&self) -> Option<&Utterance> {
        self.current.as_ref().map(|(u, _)| u)
    }

    pub fn announced_texts(&self) -> Vec<String> {
        self.announced.iter().map(|(_, text)| text.clone()).collect()
    }

    /// Complete the current announcement normally.
    pub fn finish(&mut self) -> bool {
        match self.current.take() {
            Some((utterance, text)) => {
                self.core.emit_complete(utterance, Some(text), false);
                true
            }
            None => false,
        }
    }

    /// Emit the completion held back by a deferred cancel.
    pub fn flush_cancelled(&mut self) {
        if let Some((utterance, text)) = self.pending_cancel.take() {
            self.core.emit_complete(utterance, Some(text), true);
        }
    }

    fn stop_current(&mut self) {
        if let Some((utterance, text)) = self.current.take() {
            self.cancelled.push(utterance.clone());
            if self.defer_cancel {
                self.pending_cancel = Some((utterance, text));
            } else {
                self.core.emit_complete(utterance, Some(text), true);
            }
        }
    }
}

impl Announcer for MockAnnouncer {
    fn core(&self) -> &AnnouncerCore {
        &self.core
    }

    fn announce(&mut self, text: String, utterance: &Utterance, _options: &AnnouncerOptions) {
        assert!(
            self.current.is_none(),
            "announce called while another utterance is in flight"
        );
        self.core.mark_spoken();
        self.announced.push((utterance.clone(), text.clone()));
        self.current = Some((utterance.clone(), text));
    }

    fn cancel_utterance(&mut self, utterance: &Utterance) {
        if self.current() == Some(utterance) {
            self.stop_current();
        }
    }

    fn cancel(&mut self) {
        self.cancel_all_calls += 1;
        self.stop_current();
    }

    fn on_utterance_priority_change(&mut self, utterance: &Utterance) {
        self.priority_changes.push(utterance.clone());
    }
}
