//! Announceable content carried by an [`Utterance`](super::Utterance).
//!
//! The scheduler never inspects content; it only asks for the resolved text
//! at the moment an utterance is handed to the announcer.  Content can be a
//! plain string or a closure that produces the text lazily, so a producer can
//! queue "the current value" and have it read at dispatch time.

use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// AlertableContent
// ---------------------------------------------------------------------------

/// Text to announce, either resolved up front or produced on demand.
#[derive(Clone)]
pub enum AlertableContent {
    /// Fixed text.
    Text(String),
    /// Text produced when the utterance is dispatched.
    Dynamic(Arc<dyn Fn() -> String + Send + Sync>),
}

impl AlertableContent {
    /// Wrap a closure as lazily-resolved content.
    ///
    /// ```
    /// use utterance_queue::utterance::AlertableContent;
    ///
    /// let content = AlertableContent::dynamic(|| format!("{} balloons", 2));
    /// assert_eq!(content.resolve(), "2 balloons");
    /// ```
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(f))
    }

    /// Produce the text for this content.
    pub fn resolve(&self) -> String {
        match self {
            AlertableContent::Text(text) => text.clone(),
            AlertableContent::Dynamic(f) => f(),
        }
    }
}

impl fmt::Debug for AlertableContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertableContent::Text(text) => f.debug_tuple("Text").field(text).finish(),
            AlertableContent::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl Default for AlertableContent {
    fn default() -> Self {
        AlertableContent::Text(String::new())
    }
}

impl From<&str> for AlertableContent {
    fn from(text: &str) -> Self {
        AlertableContent::Text(text.to_owned())
    }
}

impl From<String> for AlertableContent {
    fn from(text: String) -> Self {
        AlertableContent::Text(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
