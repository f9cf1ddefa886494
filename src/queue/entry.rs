//! Queue entries and the stability gate.
//!
//! A [`QueueEntry`] wraps an [`Utterance`] with the bookkeeping the queue
//! needs while it waits: how long it has been queued, how long its content
//! has been unchanged, and the generation counters last observed on the
//! utterance.
//!
//! An entry is *stable* (eligible for dispatch) once its content has stopped
//! changing for `stable_delay`, or once it has waited `maximum_delay` in
//! total, whichever comes first.  Entries placed by `announce_immediately`
//! skip the gate; a later re-submission of the same utterance does not
//! inherit that.

use std::time::Duration;

use crate::utterance::Utterance;

// ---------------------------------------------------------------------------
// QueueEntry
// ---------------------------------------------------------------------------

/// An utterance waiting in the queue.
#[derive(Debug)]
pub struct QueueEntry {
    utterance: Utterance,
    time_in_queue: Duration,
    stable_time: Duration,
    priority_generation: u64,
    content_generation: u64,
    immediate: bool,
}

impl QueueEntry {
    pub fn new(utterance: Utterance) -> Self {
        Self {
            priority_generation: utterance.priority_generation(),
            content_generation: utterance.content_generation(),
            utterance,
            time_in_queue: Duration::ZERO,
            stable_time: Duration::ZERO,
            immediate: false,
        }
    }

    pub fn utterance(&self) -> &Utterance {
        &self.utterance
    }

    pub fn into_utterance(self) -> Utterance {
        self.utterance
    }

    pub fn time_in_queue(&self) -> Duration {
        self.time_in_queue
    }

    pub fn stable_time(&self) -> Duration {
        self.stable_time
    }

    /// Keep the waiting time of an entry this one replaces, so re-submitting
    /// an utterance cannot postpone it past its `maximum_delay`.
    pub fn carry_time_in_queue(&mut self, previous: &QueueEntry) {
        self.time_in_queue = previous.time_in_queue;
    }

    /// Make the entry eligible right away, regardless of delays.
    pub fn make_immediate(&mut self) {
        self.immediate = true;
    }

    pub fn is_immediate(&self) -> bool {
        self.immediate
    }

    /// Advance both timers by `dt`.
    ///
    /// If the content changed since the last step, the stability timer
    /// restarts from zero instead.
    pub fn step(&mut self, dt: Duration) {
        self.time_in_queue = self.time_in_queue.saturating_add(dt);

        let generation = self.utterance.content_generation();
        if generation != self.content_generation {
            self.content_generation = generation;
            self.stable_time = Duration::ZERO;
        } else {
            self.stable_time = self.stable_time.saturating_add(dt);
        }
    }

    /// Whether the entry may be handed to the announcer.
    pub fn is_stable(&self) -> bool {
        self.immediate
            || self.stable_time >= self.utterance.stable_delay()
            || self.time_in_queue >= self.utterance.maximum_delay()
    }

    /// Returns `true` once per priority write made since the last call.
    pub(crate) fn take_priority_change(&mut self) -> bool {
        let generation = self.utterance.priority_generation();
        let changed = generation != self.priority_generation;
        self.priority_generation = generation;
        changed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
