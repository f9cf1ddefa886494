//! Async front-end for [`AnnouncementQueue`].
//!
//! [`QueueService`] owns the queue inside a single tokio task.  Producers
//! talk to it through a cloneable [`QueueHandle`]; every mutation and every
//! tick runs on that one task, so the queue itself needs no locking.
//!
//! ```text
//! QueueHandle ──QueueCommand (mpsc)──▶ QueueService::run()
//!                                        ├─ command      → queue operation
//!                                        ├─ interval tick → queue.step(dt)
//!                                        └─ Shutdown / all handles dropped
//!                                              → returns the queue
//! ```

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::announcer::{AnnouncementComplete, Announcer};
use crate::utterance::Utterance;

use super::scheduler::AnnouncementQueue;

// ---------------------------------------------------------------------------
// QueueError
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The service task has stopped; the command was not delivered.
    #[error("announcement queue service is not running")]
    Closed,
}

// ---------------------------------------------------------------------------
// QueueCommand
// ---------------------------------------------------------------------------

/// Messages accepted by [`QueueService::run`].
pub enum QueueCommand {
    AddToBack(Utterance),
    AnnounceImmediately(Utterance),
    CancelUtterance(Utterance),
    Cancel,
    SetPriority(Utterance, f64),
    SetEnabled(bool),
    SetMuted(bool),
    HasUtterance(Utterance, oneshot::Sender<bool>),
    Len(oneshot::Sender<usize>),
    IsIdle(oneshot::Sender<bool>),
    Subscribe(oneshot::Sender<broadcast::Receiver<AnnouncementComplete>>),
    /// Stop the service after the commands already received.
    Shutdown,
}

// ---------------------------------------------------------------------------
// QueueHandle
// ---------------------------------------------------------------------------

/// Cloneable sender side of a running [`QueueService`].
#[derive(Debug, Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<QueueCommand>,
}

impl QueueHandle {
    pub fn new(tx: mpsc::Sender<QueueCommand>) -> Self {
        Self { tx }
    }

    pub async fn add_to_back(&self, utterance: Utterance) -> Result<(), QueueError> {
        self.send(QueueCommand::AddToBack(utterance)).await
    }

    pub async fn announce_immediately(&self, utterance: Utterance) -> Result<(), QueueError> {
        self.send(QueueCommand::AnnounceImmediately(utterance)).await
    }

    pub async fn cancel_utterance(&self, utterance: Utterance) -> Result<(), QueueError> {
        self.send(QueueCommand::CancelUtterance(utterance)).await
    }

    pub async fn cancel(&self) -> Result<(), QueueError> {
        self.send(QueueCommand::Cancel).await
    }

    /// Change a priority and have the service reconcile it immediately.
    pub async fn set_priority(&self, utterance: Utterance, priority: f64) -> Result<(), QueueError> {
        self.send(QueueCommand::SetPriority(utterance, priority)).await
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<(), QueueError> {
        self.send(QueueCommand::SetEnabled(enabled)).await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<(), QueueError> {
        self.send(QueueCommand::SetMuted(muted)).await
    }

    pub async fn has_utterance(&self, utterance: Utterance) -> Result<bool, QueueError> {
        self.request(|reply| QueueCommand::HasUtterance(utterance, reply))
            .await
    }

    pub async fn len(&self) -> Result<usize, QueueError> {
        self.request(QueueCommand::Len).await
    }

    /// Nothing queued and nothing being announced.
    pub async fn is_idle(&self) -> Result<bool, QueueError> {
        self.request(QueueCommand::IsIdle).await
    }

    pub async fn subscribe(
        &self,
    ) -> Result<broadcast::Receiver<AnnouncementComplete>, QueueError> {
        self.request(QueueCommand::Subscribe).await
    }

    pub async fn shutdown(&self) -> Result<(), QueueError> {
        self.send(QueueCommand::Shutdown).await
    }

    async fn send(&self, command: QueueCommand) -> Result<(), QueueError> {
        self.tx.send(command).await.map_err(|_| QueueError::Closed)
    }

    async fn request<T, F>(&self, make: F) -> Result<T, QueueError>
    where
        F: FnOnce(oneshot::Sender<T>) -> QueueCommand,
    {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await.map_err(|_| QueueError::Closed)
    }
}

// ---------------------------------------------------------------------------
// QueueService
// ---------------------------------------------------------------------------

/// Runs an [`AnnouncementQueue`] on a tokio task, stepping it every `tick`.
pub struct QueueService<A: Announcer> {
    queue: AnnouncementQueue<A>,
    tick: Duration,
}

impl<A: Announcer + 'static> QueueService<A> {
    pub fn new(queue: AnnouncementQueue<A>, tick: Duration) -> Self {
        Self {
            queue,
            tick: tick.max(Duration::from_millis(1)),
        }
    }

    /// Spawn the service and return a handle to it plus the task, which
    /// yields the queue back once the service stops.
    pub fn spawn(
        queue: AnnouncementQueue<A>,
        tick: Duration,
        capacity: usize,
    ) -> (QueueHandle, JoinHandle<AnnouncementQueue<A>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let service = Self::new(queue, tick);
        let task = tokio::spawn(service.run(rx));
        (QueueHandle::new(tx), task)
    }

    /// Process commands and ticks until `Shutdown` arrives or every
    /// [`QueueHandle`] is dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<QueueCommand>) -> AnnouncementQueue<A> {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();

        log::debug!("queue service: started, tick = {:?}", self.tick);

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(QueueCommand::Shutdown) => {
                        log::debug!("queue service: shutdown requested");
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => {
                        log::debug!("queue service: all handles dropped");
                        break;
                    }
                },
                _ = interval.tick() => {
                    let now = Instant::now();
                    self.queue.step(now - last_tick);
                    last_tick = now;
                }
            }
        }

        log::info!("queue service: stopped with {} queued", self.queue.len());
        self.queue
    }

    fn handle(&mut self, command: QueueCommand) {
        match command {
            QueueCommand::AddToBack(u) => self.queue.add_to_back(u),
            QueueCommand::AnnounceImmediately(u) => self.queue.announce_immediately(u),
            QueueCommand::CancelUtterance(u) => self.queue.cancel_utterance(&u),
            QueueCommand::Cancel => self.queue.cancel(),
            QueueCommand::SetPriority(u, priority) => self.queue.set_priority(&u, priority),
            QueueCommand::SetEnabled(enabled) => self.queue.set_enabled(enabled),
            QueueCommand::SetMuted(muted) => self.queue.set_muted(muted),
            // A dropped reply receiver only means the caller stopped waiting.
            QueueCommand::HasUtterance(u, reply) => {
                let _ = reply.send(self.queue.has_utterance(&u));
            }
            QueueCommand::Len(reply) => {
                let _ = reply.send(self.queue.len());
            }
            QueueCommand::IsIdle(reply) => {
                let _ = reply.send(self.queue.is_idle());
            }
            QueueCommand::Subscribe(reply) => {
                let _ = reply.send(self.queue.subscribe());
            }
            QueueCommand::Shutdown => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
