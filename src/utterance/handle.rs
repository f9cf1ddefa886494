//! The [`Utterance`] handle.
//!
//! An `Utterance` is a cheap-to-clone shared handle: every clone refers to the
//! same underlying instance, and equality is identity.  Producers keep a clone
//! so they can re-submit it or change its priority while the queue (or the
//! announcer) holds another clone.
//!
//! Priority and content writes only record the new value and bump a
//! generation counter.  The utterance never calls into a scheduler; the queue
//! notices the generation change the next time it reconciles.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::content::AlertableContent;
use super::options::{AnnouncerOptions, BackendOptions};
use super::DEFAULT_PRIORITY;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// UtteranceId
// ---------------------------------------------------------------------------

/// Process-unique identifier, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utterance#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Utterance
// ---------------------------------------------------------------------------

type Predicate = Arc<dyn Fn() -> bool + Send + Sync>;

struct Inner {
    id: UtteranceId,
    content: Mutex<AlertableContent>,
    content_generation: AtomicU64,
    /// `f64` bit pattern.
    priority: AtomicU64,
    priority_generation: AtomicU64,
    announcer_options: AnnouncerOptions,
    stable_delay: Duration,
    maximum_delay: Duration,
    predicate: Option<Predicate>,
}

/// A schedulable unit of announceable content with a mutable priority.
///
/// ```
/// use utterance_queue::utterance::{Utterance, HIGH_PRIORITY};
///
/// let alert = Utterance::builder("Balloon sticks to sweater")
///     .priority(HIGH_PRIORITY)
///     .cancel_other(false)
///     .build();
///
/// let same = alert.clone();
/// assert_eq!(alert, same);
/// assert_eq!(alert.priority(), HIGH_PRIORITY);
/// ```
#[derive(Clone)]
pub struct Utterance {
    inner: Arc<Inner>,
}

impl Utterance {
    /// Create an utterance with default priority and options.
    pub fn new(content: impl Into<AlertableContent>) -> Self {
        Self::builder(content).build()
    }

    /// Start building an utterance with non-default settings.
    pub fn builder(content: impl Into<AlertableContent>) -> UtteranceBuilder {
        UtteranceBuilder::new(content.into())
    }

    pub fn id(&self) -> UtteranceId {
        self.inner.id
    }

    /// Current priority.  Higher values are more important.
    pub fn priority(&self) -> f64 {
        f64::from_bits(self.inner.priority.load(Ordering::Acquire))
    }

    /// Change the priority.
    ///
    /// Takes effect on queue order the next time the queue reconciles (its
    /// next `step`, enqueue, or an explicit `reprioritize`).  Use
    /// `AnnouncementQueue::set_priority` to write and reconcile in one call.
    pub fn set_priority(&self, priority: f64) {
        self.inner
            .priority
            .store(priority.to_bits(), Ordering::Release);
        self.inner.priority_generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Counter bumped on every [`set_priority`](Self::set_priority).
    pub fn priority_generation(&self) -> u64 {
        self.inner.priority_generation.load(Ordering::Acquire)
    }

    /// Replace the content, marking it as changed for the stability gate.
    pub fn set_content(&self, content: impl Into<AlertableContent>) {
        let mut guard = self
            .inner
            .content
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = content.into();
        self.inner.content_generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Counter bumped on every [`set_content`](Self::set_content).
    pub fn content_generation(&self) -> u64 {
        self.inner.content_generation.load(Ordering::Acquire)
    }

    /// Snapshot of the current content.
    pub fn content(&self) -> AlertableContent {
        self.inner
            .content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolve the content to the text that should be announced.
    pub fn resolve_text(&self) -> String {
        // Clone first so a dynamic closure never runs under the lock.
        self.content().resolve()
    }

    pub fn announcer_options(&self) -> &AnnouncerOptions {
        &self.inner.announcer_options
    }

    /// Minimum quiet time before the utterance may be dispatched.
    pub fn stable_delay(&self) -> Duration {
        self.inner.stable_delay
    }

    /// Longest time the utterance waits for stability before it is
    /// dispatched anyway.
    pub fn maximum_delay(&self) -> Duration {
        self.inner.maximum_delay
    }

    /// Whether the utterance should still be announced right now.
    ///
    /// `true` when no predicate was supplied.
    pub fn can_announce(&self) -> bool {
        self.inner.predicate.as_ref().map_or(true, |p| p())
    }

    /// `true` when both handles refer to the same utterance.
    pub fn ptr_eq(&self, other: &Utterance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Utterance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Utterance {}

impl fmt::Debug for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Utterance")
            .field("id", &self.inner.id)
            .field("priority", &self.priority())
            .field("content", &self.content())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// UtteranceBuilder
// ---------------------------------------------------------------------------

/// Builder returned by [`Utterance::builder`].
#[must_use]
pub struct UtteranceBuilder {
    content: AlertableContent,
    priority: f64,
    options: AnnouncerOptions,
    stable_delay: Duration,
    maximum_delay: Duration,
    predicate: Option<Predicate>,
}

impl UtteranceBuilder {
    fn new(content: AlertableContent) -> Self {
        Self {
            content,
            priority: DEFAULT_PRIORITY,
            options: AnnouncerOptions::default(),
            stable_delay: Duration::ZERO,
            maximum_delay: Duration::MAX,
            predicate: None,
        }
    }

    pub fn priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn cancel_self(mut self, cancel_self: bool) -> Self {
        self.options.cancel_self = cancel_self;
        self
    }

    pub fn cancel_other(mut self, cancel_other: bool) -> Self {
        self.options.cancel_other = cancel_other;
        self
    }

    pub fn backend(mut self, backend: BackendOptions) -> Self {
        self.options.backend = backend;
        self
    }

    /// Replace all announcer options at once.
    pub fn announcer_options(mut self, options: AnnouncerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn stable_delay(mut self, delay: Duration) -> Self {
        self.stable_delay = delay;
        self
    }

    pub fn maximum_delay(mut self, delay: Duration) -> Self {
        self.maximum_delay = delay;
        self
    }

    /// Gate announcement on a condition checked at dispatch time.
    pub fn predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn build(self) -> Utterance {
        let id = UtteranceId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        Utterance {
            inner: Arc::new(Inner {
                id,
                content: Mutex::new(self.content),
                content_generation: AtomicU64::new(0),
                priority: AtomicU64::new(self.priority.to_bits()),
                priority_generation: AtomicU64::new(0),
                announcer_options: self.options,
                stable_delay: self.stable_delay,
                maximum_delay: self.maximum_delay,
                predicate: self.predicate,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
