//! Simulated speech backend that writes announcements to the log.
//!
//! [`LogAnnouncer`] behaves like a speech synthesizer from the queue's point
//! of view: an announcement takes time proportional to its word count, and
//! it can be interrupted part-way.  Time only advances through
//! [`Announcer::step`], so tests drive it deterministically.

use std::time::Duration;

use crate::announcer::{Announcer, AnnouncerCore};
use crate::config::AnnouncerConfig;
use crate::utterance::{AnnouncerOptions, BackendOptions, Utterance};

struct Speaking {
    utterance: Utterance,
    text: String,
    remaining: Duration,
}

// ---------------------------------------------------------------------------
// LogAnnouncer
// ---------------------------------------------------------------------------

/// Logs each announcement and "speaks" it for a simulated duration.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use utterance_queue::announcer::{Announcer, LogAnnouncer};
/// use utterance_queue::utterance::Utterance;
///
/// let mut announcer = LogAnnouncer::new(150);
/// let mut done = announcer.subscribe();
/// let u = Utterance::new("three short words");
///
/// announcer.announce(u.resolve_text(), &u, u.announcer_options());
/// assert!(announcer.is_speaking());
///
/// announcer.step(Duration::from_secs(2));
/// assert_eq!(done.try_recv().unwrap().utterance, u);
/// ```
pub struct LogAnnouncer {
    core: AnnouncerCore,
    words_per_minute: u32,
    current: Option<Speaking>,
    transcript: Vec<String>,
}

impl LogAnnouncer {
    const MIN_RATE: f64 = 0.1;
    const MAX_RATE: f64 = 10.0;

    /// Create an announcer that speaks at `words_per_minute` (minimum 1).
    pub fn new(words_per_minute: u32) -> Self {
        Self::with_core(AnnouncerCore::new(), words_per_minute)
    }

    /// Create an announcer around a pre-configured core.
    pub fn with_core(core: AnnouncerCore, words_per_minute: u32) -> Self {
        Self {
            core,
            words_per_minute: words_per_minute.max(1),
            current: None,
            transcript: Vec::new(),
        }
    }

    /// Build from the announcer section of the app config.
    pub fn from_config(config: &AnnouncerConfig) -> Self {
        Self::with_core(
            AnnouncerCore::with_capacity(config.completion_capacity),
            config.words_per_minute,
        )
    }

    /// Every text this announcer has started speaking, oldest first.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    pub fn is_speaking(&self) -> bool {
        self.current.is_some()
    }

    /// The utterance currently being spoken.
    pub fn speaking(&self) -> Option<&Utterance> {
        self.current.as_ref().map(|s| &s.utterance)
    }

    /// How long `text` takes to speak at this announcer's rate.
    ///
    /// `rate` is clamped to `MIN_RATE..=MAX_RATE`; non-finite or
    /// non-positive rates mean normal speed.
    pub fn speaking_time(&self, text: &str, rate: f32) -> Duration {
        let words = text.split_whitespace().count() as f64;
        let rate = if rate.is_finite() && rate > 0.0 {
            f64::from(rate).clamp(Self::MIN_RATE, Self::MAX_RATE)
        } else {
            1.0
        };
        let secs = words * 60.0 / f64::from(self.words_per_minute) / rate;
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    fn interrupt_current(&mut self) {
        if let Some(speaking) = self.current.take() {
            log::info!("announcer: interrupted {}", speaking.utterance.id());
            self.core
                .emit_complete(speaking.utterance, Some(speaking.text), true);
        }
    }
}

impl Announcer for LogAnnouncer {
    fn core(&self) -> &AnnouncerCore {
        &self.core
    }

    fn announce(&mut self, text: String, utterance: &Utterance, options: &AnnouncerOptions) {
        // A backend only ever speaks one thing.
        self.interrupt_current();

        let (voice, rate) = match &options.backend {
            BackendOptions::Speech { voice, rate } => (voice.as_deref(), *rate),
            _ => (None, 1.0),
        };
        let remaining = self.speaking_time(&text, rate);

        log::info!(
            "announcer: [{}] {} says {:?}",
            utterance.id(),
            voice.unwrap_or("default voice"),
            text
        );
        self.core.mark_spoken();
        self.transcript.push(text.clone());

        if remaining.is_zero() {
            self.core.emit_complete(utterance.clone(), Some(text), false);
        } else {
            self.current = Some(Speaking {
                utterance: utterance.clone(),
                text,
                remaining,
            });
        }
    }

    fn cancel_utterance(&mut self, utterance: &Utterance) {
        if self.speaking() == Some(utterance) {
            self.interrupt_current();
        }
    }

    fn cancel(&mut self) {
        self.interrupt_current();
    }

    fn step(&mut self, dt: Duration) {
        let finished = match self.current.as_mut() {
            Some(speaking) => {
                speaking.remaining = speaking.remaining.saturating_sub(dt);
                speaking.remaining.is_zero()
            }
            None => false,
        };
        if finished {
            if let Some(speaking) = self.current.take() {
                log::debug!("announcer: finished {}", speaking.utterance.id());
                self.core
                    .emit_complete(speaking.utterance, Some(speaking.text), false);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
