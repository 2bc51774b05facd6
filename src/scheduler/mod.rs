//! Download scheduler module
//!
//! Drives the external downloader over the queue, one entry at a time,
//! stalest first.

mod downloader;
mod processor;
mod retry_policy;

#[cfg(feature = "mock")]
pub use downloader::MockDownloader;
pub use downloader::{CommandDownloader, Downloader, DownloaderError, InvocationOutcome};
pub use processor::{
    ActiveEntry, CycleOutcome, DispatchResult, LastDispatch, QueueScheduler, SchedulerState,
    SchedulerStatus, SharedSchedulerStatus,
};
pub use retry_policy::{
    is_captcha_challenge, RetryDecision, RetryPolicy, CAPTCHA_CHALLENGE_URL, CAPTCHA_MARKER,
    DEFAULT_RETRY_DELAY_SECS,
};
