//! Announcement scripts — timed lists of queue operations stored as JSON.
//!
//! The demo binary replays a script against a running [`QueueService`] so
//! the scheduler's behaviour (eviction, stability, interruption) can be
//! watched in the log.
//!
//! ```json
//! [
//!   { "at_ms": 0,   "key": "charge", "text": "Balloon has a few charges.", "stable_delay_ms": 300 },
//!   { "at_ms": 100, "key": "charge", "text": "Balloon has many charges." },
//!   { "at_ms": 900, "action": "immediate", "text": "Balloon sticks to the wall!", "priority": 5 },
//!   { "at_ms": 950, "action": "priority", "key": "charge", "priority": 0 }
//! ]
//! ```
//!
//! Entries sharing a `key` refer to the same [`Utterance`]: the first one
//! creates it, later ones re-submit it (optionally with new text), change
//! its priority or cancel it.  Settings such as `stable_delay_ms` only apply
//! where the utterance is created.
//!
//! [`QueueService`]: crate::queue::QueueService

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::config::UtteranceDefaults;
use crate::queue::{QueueError, QueueHandle};
use crate::utterance::{BackendOptions, Politeness, Utterance};

const DEMO_SCRIPT: &str = r#"[
  { "at_ms": 0, "key": "intro",
    "text": "Balloons and static electricity. Rub the balloon on the sweater." },
  { "at_ms": 400, "key": "charge", "stable_delay_ms": 600, "maximum_delay_ms": 3000,
    "text": "Balloon has a few negative charges." },
  { "at_ms": 700, "key": "charge", "text": "Balloon has several negative charges." },
  { "at_ms": 1000, "key": "charge", "text": "Balloon has many negative charges." },
  { "at_ms": 2600, "key": "hint", "priority": 0, "cancel_other": false,
    "text": "Try moving the balloon toward the wall." },
  { "at_ms": 2700, "key": "alert", "action": "immediate", "priority": 5,
    "politeness": "Assertive", "text": "Balloon sticks to the wall!" },
  { "at_ms": 3200, "key": "tip", "priority": 0, "cancel_other": false,
    "text": "Press reset to start over." },
  { "at_ms": 3300, "key": "tip", "action": "priority", "priority": 2 },
  { "at_ms": 5000, "key": "reset", "text": "Simulation reset." },
  { "at_ms": 5050, "action": "cancel_all" },
  { "at_ms": 5200, "key": "done", "text": "Demo finished." }
]"#;

// ---------------------------------------------------------------------------
// ScriptError
// ---------------------------------------------------------------------------

/// Errors raised while loading or planning a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse script: {0}")]
    Parse(#[from] serde_json::Error),

    /// An entry refers to a key no earlier entry created.
    #[error("entry {index}: unknown utterance key {key:?}")]
    UnknownKey { index: usize, key: String },

    #[error("entry {index}: {action:?} needs a key")]
    MissingKey { index: usize, action: ScriptAction },

    #[error("entry {index}: creating an utterance needs text")]
    MissingText { index: usize },

    #[error("entry {index}: priority action needs a priority")]
    MissingPriority { index: usize },
}

// ---------------------------------------------------------------------------
// ScriptEntry
// ---------------------------------------------------------------------------

/// What an entry does to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptAction {
    #[default]
    Add,
    Immediate,
    Priority,
    Cancel,
    CancelAll,
}

/// One line of a script file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptEntry {
    /// Offset from the start of playback.
    #[serde(default)]
    pub at_ms: u64,
    #[serde(default)]
    pub action: ScriptAction,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub priority: Option<f64>,
    #[serde(default = "default_true")]
    pub cancel_self: bool,
    #[serde(default = "default_true")]
    pub cancel_other: bool,
    #[serde(default)]
    pub stable_delay_ms: Option<u64>,
    #[serde(default)]
    pub maximum_delay_ms: Option<u64>,
    #[serde(default)]
    pub politeness: Option<Politeness>,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// ScriptStep
// ---------------------------------------------------------------------------

/// A resolved queue operation, ready to replay.
#[derive(Debug, Clone)]
pub enum StepAction {
    /// Queue the utterance, replacing its text first when `content` is set.
    AddToBack {
        utterance: Utterance,
        content: Option<String>,
    },
    AnnounceImmediately {
        utterance: Utterance,
        content: Option<String>,
    },
    SetPriority(Utterance, f64),
    Cancel(Utterance),
    CancelAll,
}

#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub at: Duration,
    pub action: StepAction,
}

// ---------------------------------------------------------------------------
// AnnouncementScript
// ---------------------------------------------------------------------------

/// A parsed script.
#[derive(Debug, Clone)]
pub struct AnnouncementScript {
    entries: Vec<ScriptEntry>,
}

impl AnnouncementScript {
    /// Load a script from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self, ScriptError> {
        let data = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&data)
    }

    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let entries: Vec<ScriptEntry> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }

    /// The built-in script used when no file is given.
    pub fn demo() -> Result<Self, ScriptError> {
        Self::from_json(DEMO_SCRIPT)
    }

    pub fn entries(&self) -> &[ScriptEntry] {
        &self.entries
    }

    /// Total playback time.
    pub fn duration(&self) -> Duration {
        let last = self.entries.iter().map(|e| e.at_ms).max().unwrap_or(0);
        Duration::from_millis(last)
    }

    /// Resolve keys into shared utterances and order the steps by time.
    ///
    /// `defaults` fill in priority and delays an entry leaves out.
    pub fn plan(&self, defaults: &UtteranceDefaults) -> Result<Vec<ScriptStep>, ScriptError> {
        let mut keyed: HashMap<String, Utterance> = HashMap::new();
        let mut steps = Vec::with_capacity(self.entries.len());

        for (index, entry) in self.entries.iter().enumerate() {
            let action = match entry.action {
                ScriptAction::Add | ScriptAction::Immediate => {
                    let existing = entry.key.as_ref().and_then(|k| keyed.get(k)).cloned();
                    let (utterance, content) = match existing {
                        Some(utterance) => (utterance, entry.text.clone()),
                        None => {
                            let utterance = build_utterance(index, entry, defaults)?;
                            if let Some(key) = &entry.key {
                                keyed.insert(key.clone(), utterance.clone());
                            }
                            (utterance, None)
                        }
                    };
                    if entry.action == ScriptAction::Add {
                        StepAction::AddToBack { utterance, content }
                    } else {
                        StepAction::AnnounceImmediately { utterance, content }
                    }
                }
                ScriptAction::Priority => {
                    let utterance = lookup(&keyed, index, entry)?;
                    let priority = entry
                        .priority
                        .ok_or(ScriptError::MissingPriority { index })?;
                    StepAction::SetPriority(utterance, priority)
                }
                ScriptAction::Cancel => StepAction::Cancel(lookup(&keyed, index, entry)?),
                ScriptAction::CancelAll => StepAction::CancelAll,
            };
            steps.push(ScriptStep {
                at: Duration::from_millis(entry.at_ms),
                action,
            });
        }

        // Stable, so entries sharing a timestamp keep file order.
        steps.sort_by_key(|step| step.at);
        Ok(steps)
    }
}

fn build_utterance(
    index: usize,
    entry: &ScriptEntry,
    defaults: &UtteranceDefaults,
) -> Result<Utterance, ScriptError> {
    let text = entry
        .text
        .clone()
        .ok_or(ScriptError::MissingText { index })?;

    let mut builder = Utterance::builder(text)
        .priority(entry.priority.unwrap_or(defaults.priority))
        .cancel_self(entry.cancel_self)
        .cancel_other(entry.cancel_other)
        .stable_delay(
            entry
                .stable_delay_ms
                .map_or(defaults.stable_delay(), Duration::from_millis),
        )
        .maximum_delay(
            entry
                .maximum_delay_ms
                .map_or(defaults.maximum_delay(), Duration::from_millis),
        );
    if let Some(politeness) = entry.politeness {
        builder = builder.backend(BackendOptions::LiveRegion { politeness });
    }
    Ok(builder.build())
}

fn lookup(
    keyed: &HashMap<String, Utterance>,
    index: usize,
    entry: &ScriptEntry,
) -> Result<Utterance, ScriptError> {
    let key = entry.key.as_ref().ok_or(ScriptError::MissingKey {
        index,
        action: entry.action,
    })?;
    keyed
        .get(key)
        .cloned()
        .ok_or_else(|| ScriptError::UnknownKey {
            index,
            key: key.clone(),
        })
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

/// Send each step to the queue service at its scheduled offset.
pub async fn play(steps: &[ScriptStep], handle: &QueueHandle) -> Result<(), QueueError> {
    let start = Instant::now();

    for step in steps {
        tokio::time::sleep_until(start + step.at).await;
        log::debug!("script: t={}ms {:?}", step.at.as_millis(), step.action);

        match &step.action {
            StepAction::AddToBack { utterance, content } => {
                if let Some(text) = content {
                    utterance.set_content(text.as_str());
                }
                handle.add_to_back(utterance.clone()).await?;
            }
            StepAction::AnnounceImmediately { utterance, content } => {
                if let Some(text) = content {
                    utterance.set_content(text.as_str());
                }
                handle.announce_immediately(utterance.clone()).await?;
            }
            StepAction::SetPriority(utterance, priority) => {
                handle.set_priority(utterance.clone(), *priority).await?;
            }
            StepAction::Cancel(utterance) => {
                handle.cancel_utterance(utterance.clone()).await?;
            }
            StepAction::CancelAll => handle.cancel().await?,
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announcer::LiveRegionAnnouncer;
    use crate::queue::{AnnouncementQueue, QueueService};
    use std::io::Write;

    fn plan(json: &str) -> Result<Vec<ScriptStep>, ScriptError> {
        AnnouncementScript::from_json(json)?.plan(&UtteranceDefaults::default())
    }

    #[test]
    fn entry_defaults() {
        let script = AnnouncementScript::from_json(r#"[{ "text": "hi" }]"#).unwrap();
        let entry = &script.entries()[0];
        assert_eq!(entry.at_ms, 0);
        assert_eq!(entry.action, ScriptAction::Add);
        assert!(entry.cancel_self);
        assert!(entry.cancel_other);
        assert!(entry.priority.is_none());
    }

    #[test]
    fn demo_script_plans() {
        let script = AnnouncementScript::demo().unwrap();
        let steps = script.plan(&UtteranceDefaults::default()).unwrap();
        assert_eq!(steps.len(), script.entries().len());
        assert_eq!(script.duration(), Duration::from_millis(5200));
    }

    #[test]
    fn shared_key_reuses_utterance() {
        let steps = plan(
            r#"[
                { "key": "v", "text": "one", "stable_delay_ms": 250 },
                { "key": "v", "text": "two", "at_ms": 10 }
            ]"#,
        )
        .unwrap();

        let (first, second) = match (&steps[0].action, &steps[1].action) {
            (
                StepAction::AddToBack { utterance: a, content: None },
                StepAction::AddToBack { utterance: b, content: Some(text) },
            ) => {
                assert_eq!(text, "two");
                (a.clone(), b.clone())
            }
            other => panic!("unexpected steps: {other:?}"),
        };
        assert_eq!(first, second);
        assert_eq!(first.stable_delay(), Duration::from_millis(250));
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let defaults = UtteranceDefaults {
            priority: 3.0,
            stable_delay_ms: 40,
            maximum_delay_ms: Some(400),
        };
        let steps = AnnouncementScript::from_json(r#"[{ "text": "x" }]"#)
            .unwrap()
            .plan(&defaults)
            .unwrap();
        let StepAction::AddToBack { utterance, .. } = &steps[0].action else {
            panic!("expected add");
        };
        assert_eq!(utterance.priority(), 3.0);
        assert_eq!(utterance.stable_delay(), Duration::from_millis(40));
        assert_eq!(utterance.maximum_delay(), Duration::from_millis(400));
    }

    #[test]
    fn steps_are_sorted_by_time() {
        let steps = plan(r#"[{ "text": "late", "at_ms": 50 }, { "text": "early" }]"#).unwrap();
        assert_eq!(steps[0].at, Duration::ZERO);
        assert_eq!(steps[1].at, Duration::from_millis(50));
    }

    #[test]
    fn politeness_selects_live_region_backend() {
        let steps = plan(r#"[{ "text": "!", "politeness": "Assertive" }]"#).unwrap();
        let StepAction::AddToBack { utterance, .. } = &steps[0].action else {
            panic!("expected add");
        };
        assert_eq!(
            utterance.announcer_options().backend,
            BackendOptions::LiveRegion {
                politeness: Politeness::Assertive
            }
        );
    }

    #[test]
    fn unknown_key_is_an_error() {
        let err = plan(r#"[{ "action": "cancel", "key": "ghost" }]"#).unwrap_err();
        assert!(matches!(err, ScriptError::UnknownKey { index: 0, ref key } if key == "ghost"));
    }

    #[test]
    fn missing_fields_are_errors() {
        assert!(matches!(
            plan(r#"[{ "key": "a" }]"#).unwrap_err(),
            ScriptError::MissingText { index: 0 }
        ));
        assert!(matches!(
            plan(r#"[{ "key": "a", "text": "a" }, { "action": "priority", "key": "a" }]"#)
                .unwrap_err(),
            ScriptError::MissingPriority { index: 1 }
        ));
        assert!(matches!(
            plan(r#"[{ "action": "cancel" }]"#).unwrap_err(),
            ScriptError::MissingKey { index: 0, .. }
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = AnnouncementScript::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ScriptError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{ "text": "from disk" }}]"#).unwrap();

        let script = AnnouncementScript::load_from(file.path()).unwrap();
        assert_eq!(script.entries()[0].text.as_deref(), Some("from disk"));
    }

    #[test]
    fn load_from_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AnnouncementScript::load_from(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ScriptError::Io { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn play_drives_the_queue_service() {
        let queue = AnnouncementQueue::new(LiveRegionAnnouncer::new(3, Duration::ZERO));
        let (handle, task) = QueueService::spawn(queue, Duration::from_millis(10), 16);

        let steps = plan(
            r#"[
                { "key": "a", "text": "first" },
                { "key": "b", "text": "second", "at_ms": 50 },
                { "key": "b", "text": "second again", "at_ms": 100 }
            ]"#,
        )
        .unwrap();
        play(&steps, &handle).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown().await.unwrap();

        let queue = task.await.unwrap();
        assert_eq!(
            queue.announcer().regions(Politeness::Polite),
            &["first", "second", "second again"]
        );
    }
}
