//! Per-utterance announcer options.
//!
//! [`AnnouncerOptions`] holds the two scheduler-level flags that govern
//! eviction plus a closed, backend-tagged sub-field for settings that only a
//! particular announcer understands (a requested voice, live-region
//! politeness).  Backends ignore variants that are not theirs.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Politeness
// ---------------------------------------------------------------------------

/// How urgently a live region should interrupt the screen reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Politeness {
    /// Read after the screen reader finishes its current output.
    Polite,
    /// Read as soon as possible, interrupting current output.
    Assertive,
}

impl Default for Politeness {
    fn default() -> Self {
        Self::Polite
    }
}

// ---------------------------------------------------------------------------
// BackendOptions
// ---------------------------------------------------------------------------

/// Backend-specific settings, tagged by the announcer they apply to.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOptions {
    /// No backend-specific settings.
    None,
    /// Settings for speech-style announcers.
    Speech {
        /// Requested voice name; `None` uses the backend default.
        voice: Option<String>,
        /// Speaking-rate multiplier (1.0 = normal).
        rate: f32,
    },
    /// Settings for live-region announcers.
    LiveRegion {
        /// Politeness of the region the text is written into.
        politeness: Politeness,
    },
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self::None
    }
}

// ---------------------------------------------------------------------------
// AnnouncerOptions
// ---------------------------------------------------------------------------

/// Scheduling flags and backend settings for one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnouncerOptions {
    /// May a re-submission of this same utterance interrupt an in-flight
    /// announcement of itself (when priorities are equal)?
    pub cancel_self: bool,
    /// May this utterance evict another equal-priority utterance that is
    /// queued or in flight?
    pub cancel_other: bool,
    /// Settings only a particular backend reads.
    pub backend: BackendOptions,
}

impl Default for AnnouncerOptions {
    fn default() -> Self {
        Self {
            cancel_self: true,
            cancel_other: true,
            backend: BackendOptions::default(),
        }
    }
}
