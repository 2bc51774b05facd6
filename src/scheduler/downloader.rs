//! External downloader invocation.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::download_queue::EntityKind;

/// Exit status and captured output of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    pub success: bool,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// stdout followed by stderr.
    pub output: String,
}

#[derive(Debug, Error)]
pub enum DownloaderError {
    #[error("Failed to launch downloader '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs `download <provider> <kind> <id>` for one queue entry.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<InvocationOutcome, DownloaderError>;
}

/// Launches the downloader as a child process.
///
/// The child is killed if the returned future is dropped, which is what
/// happens when the scheduler is cancelled mid-download.
#[derive(Debug, Clone)]
pub struct CommandDownloader {
    pub program: String,
    /// Arguments placed before `download <provider> <kind> <id>`.
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub provider: String,
}

impl CommandDownloader {
    fn command(&self, kind: EntityKind, id: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("download")
            .arg(&self.provider)
            .arg(kind.as_str())
            .arg(id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

#[async_trait]
impl Downloader for CommandDownloader {
    async fn download(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<InvocationOutcome, DownloaderError> {
        debug!(
            "Running {} {:?} download {} {} {}",
            self.program, self.args, self.provider, kind, id
        );
        let output = self
            .command(kind, id)
            .output()
            .await
            .map_err(|source| DownloaderError::Launch {
                program: self.program.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(InvocationOutcome {
            success: output.status.success(),
            exit_code: output.status.code(),
            output: combined,
        })
    }
}
