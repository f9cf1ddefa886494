//! Announcer backends and the contract the queue drives them through.
//!
//! # Contract
//!
//! ```text
//! AnnouncementQueue ──announce(text, utterance, options)──▶ Announcer
//!                   ──cancel_utterance(u) / cancel()──────▶
//!                   ◀─────────── AnnouncementComplete ───── (broadcast)
//! ```
//!
//! * Only the queue calls `announce`, `cancel_utterance` and `cancel`.
//! * Every `announce` must eventually be followed by exactly one
//!   [`AnnouncementComplete`] for the same utterance, including when the
//!   announcement is cancelled.  An announcer that never completes stalls the
//!   queue; the queue does not time out.
//! * `ready_to_announce` / `has_spoken` are owned by the backend and only
//!   read by the queue.
//!
//! This module provides:
//! * [`Announcer`] — the backend trait.
//! * [`AnnouncerCore`] — readiness flags and the completion channel backends
//!   embed.
//! * [`LogAnnouncer`] — simulated speech written to the log.
//! * [`LiveRegionAnnouncer`] — rotating in-memory live regions.

pub mod base;
pub mod live_region;
pub mod log_announcer;
#[cfg(test)]
pub mod mock;

use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::{AnnouncerBackend, AnnouncerConfig};
use crate::utterance::{AnnouncerOptions, Utterance};

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use base::{AnnouncementComplete, AnnouncerCore};
pub use live_region::LiveRegionAnnouncer;
pub use log_announcer::LogAnnouncer;

#[cfg(test)]
pub use mock::MockAnnouncer;

// ---------------------------------------------------------------------------
// Announcer trait
// ---------------------------------------------------------------------------

/// A backend that performs announcements one at a time.
pub trait Announcer: Send {
    /// Shared readiness and completion state.
    fn core(&self) -> &AnnouncerCore;

    /// May the queue dispatch now?
    fn ready_to_announce(&self) -> bool {
        self.core().ready_to_announce()
    }

    /// Has this backend ever produced output?
    fn has_spoken(&self) -> bool {
        self.core().has_spoken()
    }

    /// Subscribe to completion events.
    fn subscribe(&self) -> broadcast::Receiver<AnnouncementComplete> {
        self.core().subscribe()
    }

    /// Begin announcing `text` for `utterance`.
    fn announce(&mut self, text: String, utterance: &Utterance, options: &AnnouncerOptions);

    /// Stop `utterance` if it is the one currently being announced.
    fn cancel_utterance(&mut self, utterance: &Utterance);

    /// Stop whatever is currently being announced.
    fn cancel(&mut self);

    /// Should `utterance` evict `other`, which is queued ahead of it or in
    /// flight?
    fn should_utterance_cancel_other(&self, utterance: &Utterance, other: &Utterance) -> bool {
        should_cancel_by_priority(utterance, other)
    }

    /// Called after the queue reconciles a new or re-prioritized utterance.
    fn on_utterance_priority_change(&mut self, _utterance: &Utterance) {}

    /// Advance backend-internal timers.
    fn step(&mut self, _dt: Duration) {}
}

impl<A: Announcer + ?Sized> Announcer for Box<A> {
    fn core(&self) -> &AnnouncerCore {
        (**self).core()
    }

    fn ready_to_announce(&self) -> bool {
        (**self).ready_to_announce()
    }

    fn has_spoken(&self) -> bool {
        (**self).has_spoken()
    }

    fn subscribe(&self) -> broadcast::Receiver<AnnouncementComplete> {
        (**self).subscribe()
    }

    fn announce(&mut self, text: String, utterance: &Utterance, options: &AnnouncerOptions) {
        (**self).announce(text, utterance, options);
    }

    fn cancel_utterance(&mut self, utterance: &Utterance) {
        (**self).cancel_utterance(utterance);
    }

    fn cancel(&mut self) {
        (**self).cancel();
    }

    fn should_utterance_cancel_other(&self, utterance: &Utterance, other: &Utterance) -> bool {
        (**self).should_utterance_cancel_other(utterance, other)
    }

    fn on_utterance_priority_change(&mut self, utterance: &Utterance) {
        (**self).on_utterance_priority_change(utterance);
    }

    fn step(&mut self, dt: Duration) {
        (**self).step(dt);
    }
}

/// Build the backend selected in `config`.
pub fn from_config(config: &AnnouncerConfig) -> Box<dyn Announcer> {
    match config.backend {
        AnnouncerBackend::Log => Box::new(LogAnnouncer::from_config(config)),
        AnnouncerBackend::LiveRegion => Box::new(LiveRegionAnnouncer::from_config(config)),
    }
}

/// Default eviction policy.
///
/// Different priorities: the higher one wins, whatever the flags say.
/// Equal priorities: the newcomer's `cancel_other` decides, or its
/// `cancel_self` when both are the same utterance.  Incomparable priorities
/// (NaN) never evict.
///
/// ```
/// use utterance_queue::announcer::should_cancel_by_priority;
/// use utterance_queue::utterance::Utterance;
///
/// let low = Utterance::builder("low").priority(1.0).build();
/// let high = Utterance::builder("high").priority(2.0).cancel_other(false).build();
///
/// assert!(should_cancel_by_priority(&high, &low));
/// assert!(!should_cancel_by_priority(&low, &high));
/// ```
pub fn should_cancel_by_priority(utterance: &Utterance, other: &Utterance) -> bool {
    let (mine, theirs) = (utterance.priority(), other.priority());
    if mine != theirs {
        return theirs < mine;
    }
    let options = utterance.announcer_options();
    if utterance == other {
        options.cancel_self
    } else {
        options.cancel_other
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn with(priority: f64, cancel_other: bool) -> Utterance {
        Utterance::builder("x")
            .priority(priority)
            .cancel_other(cancel_other)
            .build()
    }

    #[test]
    fn higher_priority_wins_regardless_of_flags() {
        assert!(should_cancel_by_priority(&with(2.0, false), &with(1.0, true)));
        assert!(!should_cancel_by_priority(&with(1.0, true), &with(2.0, true)));
    }

    #[test]
    fn equal_priority_defers_to_cancel_other() {
        assert!(should_cancel_by_priority(&with(1.0, true), &with(1.0, false)));
        assert!(!should_cancel_by_priority(&with(1.0, false), &with(1.0, true)));
    }

    #[test]
    fn same_utterance_defers_to_cancel_self() {
        let keeps = Utterance::builder("x").cancel_self(false).build();
        let replaces = Utterance::builder("x").cancel_self(true).build();
        assert!(!should_cancel_by_priority(&keeps, &keeps));
        assert!(should_cancel_by_priority(&replaces, &replaces));
    }

    #[test]
    fn boxed_announcer_forwards_to_inner() {
        let mut config = AnnouncerConfig::default();
        config.backend = AnnouncerBackend::LiveRegion;
        config.live_region.ready_delay_ms = 0;
        let mut announcer = from_config(&config);
        let mut rx = announcer.subscribe();
        let u = Utterance::new("boxed");

        assert!(announcer.ready_to_announce());
        announcer.announce(u.resolve_text(), &u, u.announcer_options());
        assert!(announcer.has_spoken());
        assert_eq!(rx.try_recv().unwrap().utterance, u);
    }

    #[test]
    fn nan_never_evicts() {
        let nan = with(f64::NAN, true);
        let one = with(1.0, true);
        assert!(!should_cancel_by_priority(&nan, &one));
        assert!(!should_cancel_by_priority(&one, &nan));
        assert!(!should_cancel_by_priority(&nan, &with(f64::NAN, true)));
    }
}
