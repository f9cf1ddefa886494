//! Live-region backend.
//!
//! Screen readers read a live region when its text changes, but writing the
//! same text into the same region twice is not reliably noticed.  This
//! backend therefore rotates through a small pool of regions per politeness
//! level and, after each write, stays not-ready for a short delay so
//! consecutive announcements are not collapsed.
//!
//! Announcements complete as soon as the text is written; there is nothing
//! in flight to cancel afterwards.

use std::time::Duration;

use crate::announcer::{Announcer, AnnouncerCore};
use crate::config::AnnouncerConfig;
use crate::utterance::{AnnouncerOptions, BackendOptions, Politeness, Utterance};

// ---------------------------------------------------------------------------
// Regions
// ---------------------------------------------------------------------------

struct Regions {
    contents: Vec<String>,
    next: usize,
}

impl Regions {
    fn new(count: usize) -> Self {
        Self {
            contents: vec![String::new(); count.max(1)],
            next: 0,
        }
    }

    fn write(&mut self, text: String) -> usize {
        let index = self.next;
        self.contents[index] = text;
        self.next = (self.next + 1) % self.contents.len();
        index
    }
}

// ---------------------------------------------------------------------------
// LiveRegionAnnouncer
// ---------------------------------------------------------------------------

/// Writes announcements into rotating in-memory live regions.
pub struct LiveRegionAnnouncer {
    core: AnnouncerCore,
    polite: Regions,
    assertive: Regions,
    default_politeness: Politeness,
    ready_delay: Duration,
    cooldown: Duration,
}

impl LiveRegionAnnouncer {
    /// Create an announcer with `region_count` regions per politeness level
    /// that waits `ready_delay` after each write before accepting the next.
    pub fn new(region_count: usize, ready_delay: Duration) -> Self {
        Self::with_core(AnnouncerCore::new(), region_count, ready_delay)
    }

    pub fn with_core(core: AnnouncerCore, region_count: usize, ready_delay: Duration) -> Self {
        Self {
            core,
            polite: Regions::new(region_count),
            assertive: Regions::new(region_count),
            default_politeness: Politeness::Polite,
            ready_delay,
            cooldown: Duration::ZERO,
        }
    }

    /// Build from the announcer section of the app config.
    pub fn from_config(config: &AnnouncerConfig) -> Self {
        let live = &config.live_region;
        let mut announcer = Self::with_core(
            AnnouncerCore::with_capacity(config.completion_capacity),
            live.region_count,
            Duration::from_millis(live.ready_delay_ms),
        );
        announcer.set_default_politeness(live.politeness);
        announcer
    }

    /// Politeness used when an utterance carries no live-region options.
    pub fn set_default_politeness(&mut self, politeness: Politeness) {
        self.default_politeness = politeness;
    }

    /// Current contents of the regions for `politeness`.
    pub fn regions(&self, politeness: Politeness) -> &[String] {
        match politeness {
            Politeness::Polite => &self.polite.contents,
            Politeness::Assertive => &self.assertive.contents,
        }
    }
}

impl Announcer for LiveRegionAnnouncer {
    fn core(&self) -> &AnnouncerCore {
        &self.core
    }

    fn announce(&mut self, text: String, utterance: &Utterance, options: &AnnouncerOptions) {
        let politeness = match options.backend {
            BackendOptions::LiveRegion { politeness } => politeness,
            _ => self.default_politeness,
        };
        let index = match politeness {
            Politeness::Polite => self.polite.write(text.clone()),
            Politeness::Assertive => self.assertive.write(text.clone()),
        };
        log::info!(
            "announcer: [{}] {politeness:?} region {index} = {text:?}",
            utterance.id()
        );

        self.core.mark_spoken();
        if !self.ready_delay.is_zero() {
            self.cooldown = self.ready_delay;
            self.core.set_ready_to_announce(false);
        }
        self.core.emit_complete(utterance.clone(), Some(text), false);
    }

    fn cancel_utterance(&mut self, _utterance: &Utterance) {}

    fn cancel(&mut self) {}

    fn step(&mut self, dt: Duration) {
        if self.core.ready_to_announce() {
            return;
        }
        self.cooldown = self.cooldown.saturating_sub(dt);
        if self.cooldown.is_zero() {
            self.core.set_ready_to_announce(true);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
