//! Application entry point — announcement queue demo.
//!
//! # Startup sequence
//!
//! 1. Load [`AppConfig`] from disk (returns default on first run).
//! 2. Initialise logging with the configured filter (`RUST_LOG` overrides).
//! 3. Load the script named on the command line, or the built-in demo.
//! 4. Build the announcer backend and the queue from config.
//! 5. Create the tokio runtime and spawn the [`QueueService`].
//! 6. Log every completion, replay the script, wait for the queue to drain,
//!    then shut the service down.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::broadcast::{self, error::RecvError};

use utterance_queue::{
    announcer::{self, AnnouncementComplete},
    config::{AppConfig, AppPaths},
    queue::{AnnouncementQueue, QueueError, QueueHandle, QueueService},
    script::{self, AnnouncementScript},
};

/// How long to wait for the last announcements after the script ends.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

fn main() -> anyhow::Result<()> {
    // 1. Configuration
    let (config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // 2. Logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.filter.as_str()),
    )
    .init();
    log::info!("utterance-queue starting up");
    if let Some(e) = config_error {
        log::warn!("Failed to load config, using defaults: {e:#}");
    }

    // 3. Script
    let script = match std::env::args().nth(1) {
        Some(arg) => {
            let path = resolve_script(&arg);
            log::info!("Loading script {}", path.display());
            AnnouncementScript::load_from(&path)?
        }
        None => {
            log::info!("No script given, playing the built-in demo");
            AnnouncementScript::demo()?
        }
    };
    let steps = script.plan(&config.utterance)?;

    // 4. Announcer + queue
    let announcer = announcer::from_config(&config.announcer);
    let queue = AnnouncementQueue::from_config(announcer, &config.queue);
    log::info!(
        "Backend {:?}, tick {:?}, {} script steps over {:?}",
        config.announcer.backend,
        config.queue.tick_interval(),
        steps.len(),
        script.duration()
    );

    // 5. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 6. Replay
    rt.block_on(async {
        let tick = config.queue.tick_interval();
        let (handle, task) = QueueService::spawn(queue, tick, config.queue.command_capacity);

        let completions = handle.subscribe().await?;
        let logger = tokio::spawn(log_completions(completions));

        script::play(&steps, &handle).await?;
        match tokio::time::timeout(DRAIN_TIMEOUT, wait_until_idle(&handle, tick)).await {
            Ok(result) => result?,
            Err(_) => log::warn!("Queue still busy after {DRAIN_TIMEOUT:?}, stopping anyway"),
        }

        handle.shutdown().await?;
        let queue = task.await.context("queue service task failed")?;
        // Dropping the queue drops the announcer and closes the completion channel.
        drop(queue);
        logger.await.context("completion logger task failed")?;

        anyhow::Ok(())
    })?;

    log::info!("utterance-queue finished");
    Ok(())
}

/// A path as given, or a script in the config `scripts/` directory.
fn resolve_script(arg: &str) -> PathBuf {
    let direct = PathBuf::from(arg);
    if direct.exists() {
        return direct;
    }
    let scripts_dir = AppPaths::new().scripts_dir;
    let named = scripts_dir.join(arg);
    if named.exists() {
        named
    } else {
        scripts_dir.join(format!("{arg}.json"))
    }
}

async fn log_completions(mut rx: broadcast::Receiver<AnnouncementComplete>) {
    loop {
        match rx.recv().await {
            Ok(event) => match (&event.text, event.interrupted) {
                (Some(text), false) => log::info!("done: {} {text:?}", event.utterance.id()),
                (Some(text), true) => log::info!("interrupted: {} {text:?}", event.utterance.id()),
                (None, _) => log::info!("skipped: {}", event.utterance.id()),
            },
            Err(RecvError::Lagged(n)) => log::warn!("completion log missed {n} events"),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn wait_until_idle(handle: &QueueHandle, tick: Duration) -> Result<(), QueueError> {
    while !handle.is_idle().await? {
        tokio::time::sleep(tick).await;
    }
    Ok(())
}
