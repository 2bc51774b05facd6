//! Background scheduler for the download queue.
//!
//! Picks the stalest entry across all kinds, runs the downloader for it,
//! and records the attempt. At most one download runs at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::downloader::{Downloader, InvocationOutcome};
use super::retry_policy::{RetryDecision, RetryPolicy};
use crate::download_queue::{DownloadQueueStore, EntityKind, QueueEntry};
use crate::notifications::{notify_in_background, Notification, NotificationSink, Severity};
use crate::server::metrics;

/// Characters of downloader output attached to a failure notification.
const OUTPUT_TAIL_CHARS: usize = 900;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Dispatching,
    Retrying,
    Cooldown,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveEntry {
    pub kind: EntityKind,
    pub id: String,
    pub label: String,
}

impl From<&QueueEntry> for ActiveEntry {
    fn from(entry: &QueueEntry) -> Self {
        Self {
            kind: entry.kind,
            id: entry.id.clone(),
            label: entry.label(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchResult {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastDispatch {
    pub entry: ActiveEntry,
    pub result: DispatchResult,
    pub finished_at: i64,
}

/// Snapshot of what the scheduler is doing, published for the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub current: Option<ActiveEntry>,
    /// Captcha retries spent on the current entry.
    pub challenge_retries: u32,
    pub challenge_url: Option<String>,
    pub last_dispatch: Option<LastDispatch>,
    /// Start of the current idle streak.
    pub idle_since: Option<i64>,
    pub completed_dispatches: u64,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            state: SchedulerState::Idle,
            current: None,
            challenge_retries: 0,
            challenge_url: None,
            last_dispatch: None,
            idle_since: None,
            completed_dispatches: 0,
        }
    }
}

pub type SharedSchedulerStatus = Arc<RwLock<SchedulerStatus>>;

/// Result of one scheduler cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing schedulable in the queue.
    Idle,
    Succeeded(QueueEntry),
    Failed(QueueEntry),
    /// The entry was deleted while waiting for a captcha retry.
    Removed(QueueEntry),
    Cancelled,
}

/// The queue scheduler state machine.
///
/// Runs in a loop:
/// 1. Ask the store for the stalest ready entry
/// 2. Empty queue: sleep the idle interval
/// 3. Otherwise invoke the downloader, retrying in place on captcha challenges
/// 4. Mark the entry checked and sleep the inter-entry interval
pub struct QueueScheduler {
    store: Arc<dyn DownloadQueueStore>,
    downloader: Arc<dyn Downloader>,
    notifier: Arc<dyn NotificationSink>,
    retry_policy: RetryPolicy,
    /// Sleep when the queue is empty.
    idle_interval: Duration,
    /// Sleep after each completed entry.
    entry_interval: Duration,
    status: SharedSchedulerStatus,
    /// Set once the current idle streak has been announced.
    idle_announced: AtomicBool,
}

impl QueueScheduler {
    pub fn new(
        store: Arc<dyn DownloadQueueStore>,
        downloader: Arc<dyn Downloader>,
        notifier: Arc<dyn NotificationSink>,
        retry_policy: RetryPolicy,
        idle_interval: Duration,
        entry_interval: Duration,
    ) -> Self {
        Self {
            store,
            downloader,
            notifier,
            retry_policy,
            idle_interval,
            entry_interval,
            status: Arc::new(RwLock::new(SchedulerStatus::default())),
            idle_announced: AtomicBool::new(false),
        }
    }

    /// Handle for reading the scheduler status from elsewhere.
    pub fn status(&self) -> SharedSchedulerStatus {
        self.status.clone()
    }

    /// Main processing loop - call from a spawned task.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            "Queue scheduler starting (idle_interval={}s, entry_interval={}s, retry_delay={}s)",
            self.idle_interval.as_secs(),
            self.entry_interval.as_secs(),
            self.retry_policy.retry_delay.as_secs()
        );
        notify_in_background(
            &self.notifier,
            Notification::new(
                Severity::Debug,
                "scheduler_started",
                "Download scheduler started.",
            ),
        );

        loop {
            let pause = match self.run_cycle(&shutdown).await {
                Ok(CycleOutcome::Idle) => self.idle_interval,
                Ok(CycleOutcome::Cancelled) => break,
                Ok(_) => {
                    self.set_state(SchedulerState::Cooldown).await;
                    self.entry_interval
                }
                Err(e) => {
                    error!("Scheduler cycle failed: {:#}", e);
                    self.idle_interval
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        {
            let mut status = self.status.write().await;
            status.state = SchedulerState::Stopped;
            status.current = None;
        }
        info!("Queue scheduler stopped");
        // Awaited so the event is delivered before the runtime winds down.
        self.notifier
            .notify(Notification::new(
                Severity::Debug,
                "scheduler_stopped",
                "Download scheduler stopped.",
            ))
            .await;
    }

    /// Runs one full cycle: select, dispatch (with in-place captcha
    /// retries) and record. Does not perform the trailing pause.
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> Result<CycleOutcome> {
        let Some(entry) = self.store.next_ready()? else {
            self.enter_idle().await;
            return Ok(CycleOutcome::Idle);
        };
        self.idle_announced.store(false, Ordering::SeqCst);

        {
            let mut status = self.status.write().await;
            status.state = SchedulerState::Dispatching;
            status.current = Some(ActiveEntry::from(&entry));
            status.challenge_retries = 0;
            status.challenge_url = None;
            status.idle_since = None;
        }

        info!("Dispatching {} {} ({})", entry.kind, entry.id, entry.label());
        notify_in_background(
            &self.notifier,
            Notification::new(
                Severity::Info,
                "download_started",
                format!("Starting download of {} '{}'.", entry.kind, entry.label()),
            )
            .with_detail("kind", entry.kind.as_str())
            .with_detail("id", entry.id.as_str()),
        );

        let mut challenge_retries: u32 = 0;
        loop {
            let invocation = tokio::select! {
                result = self.downloader.download(entry.kind, &entry.id) => result,
                _ = shutdown.cancelled() => {
                    info!("Shutdown during download of {} {}, attempt abandoned", entry.kind, entry.id);
                    return Ok(CycleOutcome::Cancelled);
                }
            };
            let outcome = invocation.unwrap_or_else(|e| {
                error!("{}", e);
                InvocationOutcome {
                    success: false,
                    exit_code: None,
                    output: e.to_string(),
                }
            });

            match self.retry_policy.classify(&outcome, challenge_retries) {
                RetryDecision::Success => {
                    self.finish(&entry, DispatchResult::Succeeded, &outcome).await?;
                    return Ok(CycleOutcome::Succeeded(entry));
                }
                RetryDecision::TerminalFailure => {
                    self.finish(&entry, DispatchResult::Failed, &outcome).await?;
                    return Ok(CycleOutcome::Failed(entry));
                }
                RetryDecision::RetryAfter {
                    delay,
                    challenge_url,
                } => {
                    challenge_retries += 1;
                    metrics::record_captcha_retry();
                    {
                        let mut status = self.status.write().await;
                        status.state = SchedulerState::Retrying;
                        status.challenge_retries = challenge_retries;
                        status.challenge_url = Some(challenge_url.to_string());
                    }
                    warn!(
                        "Captcha required for {} {}, solve it at {} (retry {} in {}s)",
                        entry.kind,
                        entry.id,
                        challenge_url,
                        challenge_retries,
                        delay.as_secs()
                    );
                    if challenge_retries == 1 {
                        notify_in_background(
                            &self.notifier,
                            Notification::new(
                                Severity::Warning,
                                "captcha_required",
                                format!(
                                    "Captcha required while downloading {} '{}'. Solve it and the download is retried automatically.",
                                    entry.kind,
                                    entry.label()
                                ),
                            )
                            .with_title("Captcha required")
                            .with_detail("kind", entry.kind.as_str())
                            .with_detail("id", entry.id.as_str())
                            .with_detail("url", challenge_url)
                            .with_detail("retry_in", format!("{}s", delay.as_secs())),
                        );
                    }

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.cancelled() => return Ok(CycleOutcome::Cancelled),
                    }

                    if self.store.get_entry(entry.kind, &entry.id)?.is_none() {
                        info!(
                            "{} {} was removed while waiting for captcha retry",
                            entry.kind, entry.id
                        );
                        self.status.write().await.current = None;
                        return Ok(CycleOutcome::Removed(entry));
                    }
                    self.set_state(SchedulerState::Dispatching).await;
                }
            }
        }
    }

    async fn enter_idle(&self) {
        {
            let mut status = self.status.write().await;
            status.state = SchedulerState::Idle;
            status.current = None;
            if status.idle_since.is_none() {
                status.idle_since = Some(chrono::Utc::now().timestamp());
            }
        }

        if !self.idle_announced.swap(true, Ordering::SeqCst) {
            info!(
                "Queue is empty, polling every {}s",
                self.idle_interval.as_secs()
            );
            notify_in_background(
                &self.notifier,
                Notification::new(
                    Severity::Info,
                    "queue_idle",
                    "All queues are empty. Waiting for new entries.",
                ),
            );
        } else {
            debug!("Queue still empty");
        }
    }

    /// Records a completed attempt: timestamp, metrics, status and notification.
    async fn finish(
        &self,
        entry: &QueueEntry,
        result: DispatchResult,
        outcome: &InvocationOutcome,
    ) -> Result<()> {
        if !self.store.mark_checked(entry.kind, &entry.id)? {
            debug!(
                "{} {} disappeared before it could be marked checked",
                entry.kind, entry.id
            );
        }

        {
            let mut status = self.status.write().await;
            status.current = None;
            status.challenge_url = None;
            status.completed_dispatches += 1;
            status.last_dispatch = Some(LastDispatch {
                entry: ActiveEntry::from(entry),
                result,
                finished_at: chrono::Utc::now().timestamp(),
            });
        }

        let notification = match result {
            DispatchResult::Succeeded => {
                info!("Finished {} {}", entry.kind, entry.id);
                metrics::record_dispatch(entry.kind, "success");
                Notification::new(
                    Severity::Success,
                    "download_succeeded",
                    format!("Finished {} '{}'.", entry.kind, entry.label()),
                )
            }
            DispatchResult::Failed => {
                error!(
                    "Download of {} {} failed (exit code {:?})",
                    entry.kind, entry.id, outcome.exit_code
                );
                metrics::record_dispatch(entry.kind, "failure");
                Notification::new(
                    Severity::Error,
                    "download_failed",
                    format!("Download of {} '{}' failed.", entry.kind, entry.label()),
                )
                .with_title("Download failed")
                .with_detail(
                    "exit_code",
                    outcome
                        .exit_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "none".to_string()),
                )
                .with_detail("output", output_tail(&outcome.output))
            }
        };

        notify_in_background(
            &self.notifier,
            notification
                .with_detail("kind", entry.kind.as_str())
                .with_detail("id", entry.id.as_str()),
        );

        if let Ok(counts) = self.store.counts() {
            metrics::set_queue_counts(&counts);
        }
        Ok(())
    }

    async fn set_state(&self, state: SchedulerState) {
        self.status.write().await.state = state;
    }
}

/// Last `OUTPUT_TAIL_CHARS` characters of the downloader output.
fn output_tail(output: &str) -> String {
    let trimmed = output.trim();
    let count = trimmed.chars().count();
    if count <= OUTPUT_TAIL_CHARS {
        return trimmed.to_string();
    }
    let tail: String = trimmed.chars().skip(count - OUTPUT_TAIL_CHARS).collect();
    format!("…{}", tail)
}
