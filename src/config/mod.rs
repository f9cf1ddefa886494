//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the queue,
//! utterance defaults, announcer backends and logging, `AppPaths` for
//! cross-platform directories, and TOML persistence via `AppConfig::load` /
//! `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AnnouncerBackend, AnnouncerConfig, AppConfig, LiveRegionConfig, LoggingConfig, QueueConfig,
    UtteranceDefaults,
};
