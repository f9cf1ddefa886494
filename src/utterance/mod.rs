//! Utterances — the units of "things to say" handed to the queue.
//!
//! # Quick start
//!
//! ```rust
//! use std::time::Duration;
//! use utterance_queue::utterance::{AlertableContent, Utterance, MEDIUM_PRIORITY};
//!
//! // A value that updates every frame: only announce once it settles.
//! let charge = Utterance::builder(AlertableContent::dynamic(|| "charge: -3".into()))
//!     .priority(MEDIUM_PRIORITY)
//!     .stable_delay(Duration::from_millis(500))
//!     .build();
//!
//! assert_eq!(charge.resolve_text(), "charge: -3");
//! ```

pub mod content;
pub mod handle;
pub mod options;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use content::AlertableContent;
pub use handle::{Utterance, UtteranceBuilder, UtteranceId};
pub use options::{AnnouncerOptions, BackendOptions, Politeness};

// ---------------------------------------------------------------------------
// Priority levels
// ---------------------------------------------------------------------------

pub const TOP_PRIORITY: f64 = 10.0;
pub const HIGH_PRIORITY: f64 = 5.0;
pub const MEDIUM_PRIORITY: f64 = 2.0;
pub const DEFAULT_PRIORITY: f64 = 1.0;
pub const LOW_PRIORITY: f64 = 0.0;
