//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::utterance::{Politeness, DEFAULT_PRIORITY};

// ---------------------------------------------------------------------------
// QueueConfig
// ---------------------------------------------------------------------------

/// Settings for the announcement queue and the task that drives it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// When `false`, enqueues are ignored and nothing is dispatched.
    pub enabled: bool,
    /// When `true`, dispatched utterances are dropped instead of announced.
    pub muted: bool,
    /// Interval between queue steps, in milliseconds.
    pub tick_interval_ms: u64,
    /// Bound of the command channel feeding the queue task.
    pub command_capacity: usize,
    /// Announce each new utterance immediately until the announcer has
    /// produced output once (backends that need a first synchronous request).
    pub immediate_until_spoken: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            muted: false,
            tick_interval_ms: 16,
            command_capacity: 64,
            immediate_until_spoken: false,
        }
    }
}

impl QueueConfig {
    /// Tick interval as a `Duration` (never zero).
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

// ---------------------------------------------------------------------------
// UtteranceDefaults
// ---------------------------------------------------------------------------

/// Defaults applied to utterances built from scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UtteranceDefaults {
    pub priority: f64,
    /// Quiet time before a changing utterance may be announced.
    pub stable_delay_ms: u64,
    /// Longest wait for stability; `None` waits indefinitely.
    pub maximum_delay_ms: Option<u64>,
}

impl Default for UtteranceDefaults {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            stable_delay_ms: 0,
            maximum_delay_ms: None,
        }
    }
}

impl UtteranceDefaults {
    pub fn stable_delay(&self) -> Duration {
        Duration::from_millis(self.stable_delay_ms)
    }

    pub fn maximum_delay(&self) -> Duration {
        self.maximum_delay_ms
            .map_or(Duration::MAX, Duration::from_millis)
    }
}

// ---------------------------------------------------------------------------
// AnnouncerConfig
// ---------------------------------------------------------------------------

/// Selects which announcer backend the binary drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnouncerBackend {
    /// Simulated speech written to the log.
    Log,
    /// Rotating in-memory live regions.
    LiveRegion,
}

impl Default for AnnouncerBackend {
    fn default() -> Self {
        Self::Log
    }
}

/// Live-region backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveRegionConfig {
    /// Regions per politeness level.
    pub region_count: usize,
    /// Pause after each write before the next announcement, in milliseconds.
    pub ready_delay_ms: u64,
    /// Politeness used when an utterance does not ask for one.
    pub politeness: Politeness,
}

impl Default for LiveRegionConfig {
    fn default() -> Self {
        Self {
            region_count: 4,
            ready_delay_ms: 200,
            politeness: Politeness::Polite,
        }
    }
}

/// Announcer backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncerConfig {
    pub backend: AnnouncerBackend,
    /// Speaking rate of the simulated speech backend.
    pub words_per_minute: u32,
    /// Completion events buffered per subscriber.
    ///
    /// Keep this above the number of completions a single queue operation
    /// can emit; on overflow the queue only recovers a cancelled in-flight
    /// announcement.
    pub completion_capacity: usize,
    pub live_region: LiveRegionConfig,
}

impl Default for AnnouncerConfig {
    fn default() -> Self {
        Self {
            backend: AnnouncerBackend::default(),
            words_per_minute: 180,
            completion_capacity: 64,
            live_region: LiveRegionConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingConfig
// ---------------------------------------------------------------------------

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `env_logger` filter; `RUST_LOG` still takes precedence.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use utterance_queue::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Queue behaviour.
    pub queue: QueueConfig,
    /// Defaults for script-built utterances.
    pub utterance: UtteranceDefaults,
    /// Announcer backend settings.
    pub announcer: AnnouncerConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// A default `AppConfig` survives a TOML round trip.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.queue.enabled, loaded.queue.enabled);
        assert_eq!(original.queue.tick_interval_ms, loaded.queue.tick_interval_ms);
        assert_eq!(original.utterance.priority, loaded.utterance.priority);
        assert_eq!(original.utterance.maximum_delay_ms, loaded.utterance.maximum_delay_ms);
        assert_eq!(original.announcer.backend, loaded.announcer.backend);
        assert_eq!(
            original.announcer.live_region.politeness,
            loaded.announcer.live_region.politeness
        );
        assert_eq!(original.logging.filter, loaded.logging.filter);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert!(config.queue.enabled);
        assert_eq!(config.announcer.backend, AnnouncerBackend::Log);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert!(cfg.queue.enabled);
        assert!(!cfg.queue.muted);
        assert!(!cfg.queue.immediate_until_spoken);
        assert_eq!(cfg.queue.tick_interval(), Duration::from_millis(16));
        assert_eq!(cfg.utterance.priority, DEFAULT_PRIORITY);
        assert_eq!(cfg.utterance.stable_delay(), Duration::ZERO);
        assert_eq!(cfg.utterance.maximum_delay(), Duration::MAX);
        assert_eq!(cfg.announcer.words_per_minute, 180);
        assert_eq!(cfg.announcer.live_region.region_count, 4);
        assert_eq!(cfg.logging.filter, "info");
    }

    /// Modified values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.queue.muted = true;
        cfg.queue.tick_interval_ms = 50;
        cfg.utterance.stable_delay_ms = 400;
        cfg.utterance.maximum_delay_ms = Some(2_000);
        cfg.announcer.backend = AnnouncerBackend::LiveRegion;
        cfg.announcer.live_region.politeness = Politeness::Assertive;
        cfg.logging.filter = "utterance_queue=debug".into();

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert!(loaded.queue.muted);
        assert_eq!(loaded.queue.tick_interval_ms, 50);
        assert_eq!(loaded.utterance.stable_delay(), Duration::from_millis(400));
        assert_eq!(loaded.utterance.maximum_delay(), Duration::from_secs(2));
        assert_eq!(loaded.announcer.backend, AnnouncerBackend::LiveRegion);
        assert_eq!(loaded.announcer.live_region.politeness, Politeness::Assertive);
        assert_eq!(loaded.logging.filter, "utterance_queue=debug");
    }

    /// Sections missing from the file fall back to their defaults.
    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[queue]\nmuted = true\n\n[logging]\nfilter = \"warn\"\n")
            .expect("write");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded.logging.filter, "warn");
        assert!(loaded.queue.muted);
        assert!(loaded.queue.enabled);
        assert_eq!(loaded.queue.tick_interval_ms, 16);
        assert_eq!(loaded.announcer.words_per_minute, 180);
    }

    #[test]
    fn zero_tick_interval_is_clamped() {
        let cfg = QueueConfig {
            tick_interval_ms: 0,
            ..QueueConfig::default()
        };
        assert_eq!(cfg.tick_interval(), Duration::from_millis(1));
    }
}
