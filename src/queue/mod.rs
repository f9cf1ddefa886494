//! Announcement queue module.
//!
//! # Architecture
//!
//! ```text
//! producers ──add_to_back / announce_immediately / set_priority──┐
//!                                                                ▼
//!                      AnnouncementQueue  [ e0, e1, e2, … ]  (QueueEntry)
//!                            │  step(dt): reprioritize, stability gate
//!                            ▼
//!                      Announcer::announce ──▶ AnnouncementComplete
//!                            ▲                        │ (broadcast)
//!                            └──── in-flight slot ◀───┘
//! ```
//!
//! * [`QueueEntry`] — per-utterance timers and the stability gate.
//! * [`AnnouncementQueue`] — ordering, eviction and dispatch; synchronous,
//!   driven by an external clock through `step`.
//! * [`QueueService`] / [`QueueHandle`] — runs the queue on one tokio task
//!   and ticks it on an interval.

pub mod entry;
pub mod scheduler;
pub mod service;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use entry::QueueEntry;
pub use scheduler::AnnouncementQueue;
pub use service::{QueueCommand, QueueError, QueueHandle, QueueService};
