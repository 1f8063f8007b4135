//! Per-job progress channels and the event type they carry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of each per-job channel. A subscriber that lags past this many
/// undelivered events skips ahead to the oldest retained one.
const CHANNEL_CAPACITY: usize = 64;

/// Stage of a conversion job.
///
/// `queued -> uploading -> converting -> (preparing) -> done`, with `failed`
/// reachable from any non-terminal stage. `done` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    Uploading,
    Converting,
    Preparing,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Queued => write!(f, "queued"),
            Stage::Uploading => write!(f, "uploading"),
            Stage::Converting => write!(f, "converting"),
            Stage::Preparing => write!(f, "preparing"),
            Stage::Done => write!(f, "done"),
            Stage::Failed => write!(f, "failed"),
        }
    }
}

/// A single progress update. Immutable once published; this is also the JSON
/// wire format pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub stage: Stage,
    /// Completion percentage, 0-100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    /// Identifier of the stored output blob (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_id: Option<String>,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    pub fn stage(stage: Stage, progress: u8) -> Self {
        Self {
            stage,
            progress: Some(progress),
            download_id: None,
            error: None,
        }
    }

    pub fn done(download_id: &str) -> Self {
        Self {
            stage: Stage::Done,
            progress: Some(100),
            download_id: Some(download_id.to_string()),
            error: None,
        }
    }

    pub fn failed(error: &str) -> Self {
        Self {
            stage: Stage::Failed,
            progress: None,
            download_id: None,
            error: Some(error.to_string()),
        }
    }
}

/// Registry of per-job broadcast channels.
///
/// Channels are created on first access and disposed automatically a grace
/// period after a terminal event, so sustained load cannot grow the registry
/// without bound. `close` remains available for eager cleanup.
#[derive(Clone)]
pub struct ProgressBus {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<ProgressEvent>>>>,
    grace: Duration,
}

impl ProgressBus {
    pub fn new(grace: Duration) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            grace,
        }
    }

    fn read_channels(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, broadcast::Sender<ProgressEvent>>> {
        match self.channels.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Progress bus lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_channels(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, broadcast::Sender<ProgressEvent>>> {
        match self.channels.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Progress bus lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Get-or-create the channel for a job. At most one live channel exists
    /// per job id at any time.
    pub fn channel(&self, job_id: &str) -> broadcast::Sender<ProgressEvent> {
        if let Some(sender) = self.read_channels().get(job_id) {
            return sender.clone();
        }
        let mut channels = self.write_channels();
        channels
            .entry(job_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Delivers the event to every currently attached subscriber. With no
    /// subscribers attached the event is dropped; it is never queued for
    /// future subscribers.
    pub fn publish(&self, job_id: &str, event: ProgressEvent) {
        let sender = self.channel(job_id);
        let terminal = event.stage.is_terminal();
        let _ = sender.send(event);

        if terminal {
            let channels = Arc::clone(&self.channels);
            let job_id = job_id.to_string();
            let grace = self.grace;
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                if let Ok(mut guard) = channels.write() {
                    guard.remove(&job_id);
                }
            });
        }
    }

    /// Attaches a new subscriber. Events published from this moment on are
    /// delivered in publish order; earlier events are not replayed.
    pub fn subscribe(&self, job_id: &str) -> ProgressSubscription {
        ProgressSubscription {
            rx: self.channel(job_id).subscribe(),
            finished: false,
        }
    }

    /// Removes the channel from the registry. Idempotent.
    pub fn close(&self, job_id: &str) {
        self.write_channels().remove(job_id);
    }

    /// Number of live channels, for introspection and tests.
    pub fn len(&self) -> usize {
        self.read_channels().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A subscriber's end of a job channel. Yields events in publish order and
/// ends after a terminal event or once the channel is closed.
pub struct ProgressSubscription {
    rx: broadcast::Receiver<ProgressEvent>,
    finished: bool,
}

impl ProgressSubscription {
    /// Next event, or `None` once the job reached a terminal stage or the
    /// channel went away. A lagged subscriber resumes with the oldest event
    /// still retained rather than erroring out.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        if self.finished {
            return None;
        }
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if event.stage.is_terminal() {
                        self.finished = true;
                    }
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Progress subscriber lagged, skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }

    /// Adapts the subscription into a `Stream` of events.
    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> {
        stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|event| (event, sub))
        })
    }
}
