//! The announcement queue: ordering, prioritization and dispatch.
//!
//! [`AnnouncementQueue`] owns an ordered buffer of [`QueueEntry`]s and one
//! [`Announcer`].  Order is insertion order; priority never reorders the
//! buffer, it only removes entries.
//!
//! # Utterance lifecycle
//!
//! ```text
//! add_to_back ──▶ Queued ──(stable_delay not met)──▶ Stabilizing
//!                   │                                   │
//!                   └──────── step(): front stable ◀────┘
//!                                   │
//!                                   ▼
//!                              Announcing ──completion──▶ Done
//!
//! evicted by prioritization / cancel_utterance / cancel ──▶ Cancelled
//! ```
//!
//! # Prioritization
//!
//! Whenever an utterance `U` is added or its priority changes:
//!
//! 1. every entry queued *before* `U`, and the in-flight utterance, is
//!    evicted when `announcer.should_utterance_cancel_other(U, entry)`;
//!    evicting the in-flight utterance asks the announcer to stop it;
//! 2. if any entry queued *after* `U` satisfies
//!    `should_utterance_cancel_other(later, U)`, `U` itself is evicted.
//!
//! Priority writes made directly on utterances are picked up together by
//! [`reprioritize`](AnnouncementQueue::reprioritize), which every mutation
//! and every `step` runs first, so several writes made back-to-back are
//! reconciled against their final values before anything is dispatched.
//!
//! # Dispatch
//!
//! [`step`](AnnouncementQueue::step) hands the first stable entry to the
//! announcer when it is ready and nothing is in flight.  The in-flight slot
//! is cleared only by the announcer's completion event.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::announcer::{AnnouncementComplete, Announcer};
use crate::config::QueueConfig;
use crate::utterance::Utterance;

use super::entry::QueueEntry;

// ---------------------------------------------------------------------------
// InFlight
// ---------------------------------------------------------------------------

/// The utterance currently handed to the announcer.
#[derive(Debug)]
struct InFlight {
    utterance: Utterance,
    priority_generation: u64,
    cancel_requested: bool,
}

impl InFlight {
    fn new(utterance: Utterance) -> Self {
        Self {
            priority_generation: utterance.priority_generation(),
            utterance,
            cancel_requested: false,
        }
    }

    fn take_priority_change(&mut self) -> bool {
        let generation = self.utterance.priority_generation();
        let changed = generation != self.priority_generation;
        self.priority_generation = generation;
        changed
    }
}

// ---------------------------------------------------------------------------
// AnnouncementQueue
// ---------------------------------------------------------------------------

/// Orders utterances and dispatches them one at a time to an [`Announcer`].
///
/// ```rust
/// use std::time::Duration;
/// use utterance_queue::announcer::LiveRegionAnnouncer;
/// use utterance_queue::queue::AnnouncementQueue;
/// use utterance_queue::utterance::{Politeness, Utterance};
///
/// let mut queue = AnnouncementQueue::new(LiveRegionAnnouncer::new(4, Duration::ZERO));
/// queue.add_to_back(Utterance::new("Balloon picks up charges"));
/// assert_eq!(queue.len(), 1);
///
/// queue.step(Duration::from_millis(16));
/// assert!(queue.is_empty());
/// assert_eq!(
///     queue.announcer().regions(Politeness::Polite)[0],
///     "Balloon picks up charges"
/// );
/// ```
pub struct AnnouncementQueue<A: Announcer> {
    announcer: A,
    entries: Vec<QueueEntry>,
    announcing: Option<InFlight>,
    completions: broadcast::Receiver<AnnouncementComplete>,
    enabled: bool,
    muted: bool,
    immediate_until_spoken: bool,
}

impl<A: Announcer> AnnouncementQueue<A> {
    /// Create an enabled, unmuted queue driving `announcer`.
    pub fn new(announcer: A) -> Self {
        let completions = announcer.subscribe();
        Self {
            announcer,
            entries: Vec::new(),
            announcing: None,
            completions,
            enabled: true,
            muted: false,
            immediate_until_spoken: false,
        }
    }

    /// Create a queue with the switches from the queue section of the config.
    pub fn from_config(announcer: A, config: &QueueConfig) -> Self {
        let mut queue = Self::new(announcer);
        queue.enabled = config.enabled;
        queue.muted = config.muted;
        queue.immediate_until_spoken = config.immediate_until_spoken;
        queue
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn announcer(&self) -> &A {
        &self.announcer
    }

    /// Mutable access to the announcer, e.g. for backend settings.
    ///
    /// Calling `announce`/`cancel` through this handle bypasses the queue's
    /// bookkeeping.
    pub fn announcer_mut(&mut self) -> &mut A {
        &mut self.announcer
    }

    /// Number of queued (not in-flight) utterances.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queued utterances, front first.
    pub fn queued(&self) -> impl Iterator<Item = &Utterance> {
        self.entries.iter().map(QueueEntry::utterance)
    }

    /// The utterance currently handed to the announcer.
    pub fn announcing(&self) -> Option<&Utterance> {
        self.announcing.as_ref().map(|slot| &slot.utterance)
    }

    /// Whether `utterance` is currently queued.
    ///
    /// An in-flight utterance is not "in the queue"; see
    /// [`is_announcing`](Self::is_announcing).
    pub fn has_utterance(&self, utterance: &Utterance) -> bool {
        self.position(utterance).is_some()
    }

    pub fn is_announcing(&self, utterance: &Utterance) -> bool {
        self.announcing() == Some(utterance)
    }

    /// Nothing queued and nothing in flight.
    pub fn is_idle(&self) -> bool {
        self.entries.is_empty() && self.announcing.is_none()
    }

    /// Receive the announcer's completion events.
    pub fn subscribe(&self) -> broadcast::Receiver<AnnouncementComplete> {
        self.announcer.subscribe()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// A disabled queue ignores new utterances and dispatches nothing.
    /// Already-queued entries are kept.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    /// A muted queue keeps ordering utterances but drops them at dispatch
    /// instead of announcing them.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Announce every new utterance immediately until the announcer reports
    /// that it has spoken once.
    pub fn set_immediate_until_spoken(&mut self, immediate: bool) {
        self.immediate_until_spoken = immediate;
    }

    // -----------------------------------------------------------------------
    // Producer operations
    // -----------------------------------------------------------------------

    /// Queue `utterance` behind everything already queued, then prioritize.
    ///
    /// An earlier entry for the same utterance is replaced; the new entry
    /// restarts its stability timer.
    pub fn add_to_back(&mut self, utterance: Utterance) {
        self.drain_completions();
        if !self.enabled {
            log::debug!("queue: disabled, ignoring {}", utterance.id());
            return;
        }
        if self.immediate_until_spoken && !self.announcer.has_spoken() {
            self.announce_immediately(utterance);
            return;
        }

        self.reprioritize();
        let entry = self.prepare(&utterance);
        log::debug!(
            "queue: add {} (priority {}) at position {}",
            utterance.id(),
            utterance.priority(),
            self.entries.len()
        );
        self.entries.push(entry);
        self.prioritize(&utterance);
        self.debug_check_invariants();
    }

    /// Put `utterance` at the front and dispatch it now if possible.
    ///
    /// Queued entries the utterance is entitled to cancel are removed first.
    /// If the in-flight utterance outranks it, the utterance is dropped and
    /// never queued.  If it survives but the announcer is not ready (or the
    /// in-flight announcement has not finished stopping), it waits at the
    /// front of the queue.
    pub fn announce_immediately(&mut self, utterance: Utterance) {
        self.drain_completions();
        if !self.enabled {
            log::debug!("queue: disabled, ignoring {}", utterance.id());
            return;
        }
        self.reprioritize();

        if let Some(slot) = &self.announcing {
            if !self
                .announcer
                .should_utterance_cancel_other(&utterance, &slot.utterance)
            {
                log::debug!(
                    "queue: {} outranked by in-flight {}, dropped",
                    utterance.id(),
                    slot.utterance.id()
                );
                return;
            }
        }

        let mut entry = self.prepare(&utterance);
        entry.make_immediate();

        let announcer = &self.announcer;
        self.entries.retain(|queued| {
            let evict = announcer.should_utterance_cancel_other(&utterance, queued.utterance());
            if evict {
                log::debug!(
                    "queue: {} evicted by immediate {}",
                    queued.utterance().id(),
                    utterance.id()
                );
            }
            !evict
        });

        self.entries.insert(0, entry);
        self.prioritize(&utterance);

        if self.position(&utterance) == Some(0) {
            // A synchronous cancel of the in-flight utterance has already
            // completed; pick that up so the slot is free.
            self.drain_completions();
            self.dispatch();
        }
        self.debug_check_invariants();
    }

    /// Stop `utterance` if it is in flight and remove it from the queue.
    ///
    /// A no-op for an utterance that is neither queued nor in flight.
    pub fn cancel_utterance(&mut self, utterance: &Utterance) {
        self.drain_completions();
        if self.is_announcing(utterance) {
            self.cancel_in_flight();
        }
        if self.has_utterance(utterance) {
            log::debug!("queue: cancel {}", utterance.id());
            self.remove_utterance(utterance);
        }
        self.drain_completions();
    }

    /// Empty the queue and stop the in-flight announcement.
    pub fn cancel(&mut self) {
        self.drain_completions();
        self.clear();
        if let Some(slot) = self.announcing.as_mut() {
            if !slot.cancel_requested {
                slot.cancel_requested = true;
                log::debug!("queue: cancel all, stopping {}", slot.utterance.id());
                self.announcer.cancel();
            }
        }
        self.drain_completions();
    }

    /// Drop every queued entry without touching the in-flight announcement.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            log::debug!("queue: clearing {} entries", self.entries.len());
        }
        self.entries.clear();
    }

    /// Change the priority of `utterance` and reconcile the queue right away.
    pub fn set_priority(&mut self, utterance: &Utterance, priority: f64) {
        self.drain_completions();
        utterance.set_priority(priority);
        self.reprioritize();
    }

    /// Reconcile every priority write made since the last reconciliation.
    ///
    /// All writes are already visible on the utterances, so each pass below
    /// compares final values; the order of the passes does not matter.
    pub fn reprioritize(&mut self) {
        let mut changed: Vec<Utterance> = self
            .entries
            .iter_mut()
            .filter_map(|entry| {
                entry
                    .take_priority_change()
                    .then(|| entry.utterance().clone())
            })
            .collect();
        if let Some(slot) = self.announcing.as_mut() {
            if slot.take_priority_change() {
                changed.push(slot.utterance.clone());
            }
        }

        for utterance in &changed {
            log::debug!(
                "queue: priority of {} is now {}",
                utterance.id(),
                utterance.priority()
            );
            self.prioritize(utterance);
        }
        self.debug_check_invariants();
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance time by `dt` and dispatch the next stable utterance if the
    /// announcer is ready and idle.
    pub fn step(&mut self, dt: Duration) {
        self.drain_completions();

        if self.enabled {
            self.reprioritize();
            for entry in &mut self.entries {
                entry.step(dt);
            }
        }

        self.announcer.step(dt);
        self.drain_completions();

        if self.enabled {
            self.dispatch();
        }
    }

    // -----------------------------------------------------------------------
    // Prioritization
    // -----------------------------------------------------------------------

    /// Evict what `utterance` outranks ahead of it, then evict `utterance`
    /// if anything behind it outranks it.
    fn prioritize(&mut self, utterance: &Utterance) {
        let in_flight = self.is_announcing(utterance);
        let Some(index) = self.position(utterance) else {
            if in_flight {
                self.prioritize_in_flight();
            }
            return;
        };

        // 1. Earlier entries.
        let announcer = &self.announcer;
        let mut i = 0;
        self.entries.retain(|entry| {
            let earlier = i < index;
            i += 1;
            let evict = earlier && announcer.should_utterance_cancel_other(utterance, entry.utterance());
            if evict {
                log::debug!(
                    "queue: {} evicted by {}",
                    entry.utterance().id(),
                    utterance.id()
                );
            }
            !evict
        });

        // The in-flight slot sits ahead of every queued entry.
        let outranks_in_flight = self.announcing.as_ref().is_some_and(|slot| {
            self.announcer
                .should_utterance_cancel_other(utterance, &slot.utterance)
        });
        if outranks_in_flight {
            log::debug!("queue: {} interrupts the in-flight announcement", utterance.id());
            self.cancel_in_flight();
        }

        // 2. Later entries.
        if let Some(index) = self.position(utterance) {
            let outranked = self.entries[index + 1..].iter().any(|later| {
                self.announcer
                    .should_utterance_cancel_other(later.utterance(), utterance)
            });
            if outranked {
                log::debug!("queue: {} outranked by a later entry, evicted", utterance.id());
                self.entries.remove(index);
            }
        }

        self.announcer.on_utterance_priority_change(utterance);
    }

    /// The in-flight utterance's priority changed: stop it if anything
    /// queued now outranks it.
    fn prioritize_in_flight(&mut self) {
        let Some(slot) = self.announcing.as_ref() else {
            return;
        };
        let utterance = slot.utterance.clone();
        let outranked = self.entries.iter().any(|queued| {
            self.announcer
                .should_utterance_cancel_other(queued.utterance(), &utterance)
        });
        if outranked {
            log::debug!("queue: in-flight {} outranked by a queued entry", utterance.id());
            self.cancel_in_flight();
        }
        self.announcer.on_utterance_priority_change(&utterance);
    }

    // -----------------------------------------------------------------------
    // Dispatch and completion
    // -----------------------------------------------------------------------

    fn dispatch(&mut self) {
        if self.announcing.is_some() || !self.announcer.ready_to_announce() {
            return;
        }
        let Some(index) = self.entries.iter().position(QueueEntry::is_stable) else {
            return;
        };
        let utterance = self.entries.remove(index).into_utterance();

        if self.muted || !utterance.can_announce() {
            log::debug!("queue: skipping {} (muted or predicate false)", utterance.id());
            self.announcer.core().emit_complete(utterance, None, false);
            return;
        }
        let text = utterance.resolve_text();
        if text.is_empty() {
            log::debug!("queue: skipping {} (empty text)", utterance.id());
            self.announcer.core().emit_complete(utterance, None, false);
            return;
        }

        log::debug!("queue: dispatching {}", utterance.id());
        self.announcing = Some(InFlight::new(utterance.clone()));
        self.announcer
            .announce(text, &utterance, utterance.announcer_options());
    }

    fn drain_completions(&mut self) {
        loop {
            match self.completions.try_recv() {
                Ok(event) => self.handle_completion(event),
                Err(TryRecvError::Lagged(missed)) => self.recover_from_lag(missed),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    /// Completion events were dropped by the broadcast channel.
    ///
    /// A cancelled in-flight utterance has been told to stop, so its
    /// completion may be among the lost events; free the slot rather than
    /// wait forever.  An uncancelled one may still be speaking and keeps
    /// the slot.
    fn recover_from_lag(&mut self, missed: u64) {
        log::warn!("queue: missed {missed} completion events");
        if let Some(slot) = &self.announcing {
            if slot.cancel_requested {
                log::warn!(
                    "queue: releasing cancelled {} after lost completions",
                    slot.utterance.id()
                );
                self.announcing = None;
            }
        }
    }

    fn handle_completion(&mut self, event: AnnouncementComplete) {
        if self.is_announcing(&event.utterance) {
            log::debug!(
                "queue: {} complete{}",
                event.utterance.id(),
                if event.interrupted { " (interrupted)" } else { "" }
            );
            self.announcing = None;
        } else {
            log::trace!("queue: ignoring completion for {}", event.utterance.id());
        }
    }

    /// Ask the announcer to stop the in-flight utterance, once.
    fn cancel_in_flight(&mut self) {
        if let Some(slot) = self.announcing.as_mut() {
            if !slot.cancel_requested {
                slot.cancel_requested = true;
                let utterance = slot.utterance.clone();
                self.announcer.cancel_utterance(&utterance);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn position(&self, utterance: &Utterance) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.utterance() == utterance)
    }

    fn remove_utterance(&mut self, utterance: &Utterance) {
        self.entries.retain(|entry| entry.utterance() != utterance);
    }

    /// Take `utterance` out of the queue and wrap it in a fresh entry that
    /// keeps the old entry's waiting time.
    fn prepare(&mut self, utterance: &Utterance) -> QueueEntry {
        let mut entry = QueueEntry::new(utterance.clone());
        if let Some(index) = self.position(utterance) {
            let previous = self.entries.remove(index);
            entry.carry_time_in_queue(&previous);
        }
        entry
    }

    fn debug_check_invariants(&self) {
        if cfg!(debug_assertions) {
            for (i, entry) in self.entries.iter().enumerate() {
                debug_assert!(
                    !self.entries[i + 1..]
                        .iter()
                        .any(|other| other.utterance() == entry.utterance()),
                    "{} is queued twice",
                    entry.utterance().id()
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
