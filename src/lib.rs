//! Announcement scheduling for accessible descriptions.
//!
//! Producers hand [`Utterance`](utterance::Utterance)s to an
//! [`AnnouncementQueue`](queue::AnnouncementQueue); the queue orders them,
//! lets higher-priority utterances displace or interrupt lower ones, holds
//! back content that is still changing, and feeds an
//! [`Announcer`](announcer::Announcer) backend one utterance at a time.

pub mod announcer;
pub mod config;
pub mod queue;
pub mod script;
pub mod utterance;
