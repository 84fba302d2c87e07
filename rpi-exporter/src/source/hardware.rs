//! Hardware status source backed by a local diagnostic command.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::trace;

use crate::config::HardwareConfig;
use crate::error::FetchError;

/// Runs an external command and returns its standard output.
///
/// Injected into [`HardwareSource`] so tests can substitute scripted output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, waiting at most `timeout` for it to exit.
    ///
    /// A non-zero exit is reported as [`FetchError::ExitStatus`], which keeps
    /// whatever was read from stdout.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<Vec<u8>, FetchError>;
}

/// [`CommandRunner`] that spawns real processes with tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<Vec<u8>, FetchError> {
        let command = display_command(program, args);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FetchError::Spawn {
                command: command.clone(),
                source,
            })?;

        let mut stdout = child.stdout.take().ok_or_else(|| FetchError::Read {
            command: command.clone(),
            source: std::io::Error::other("stdout was not captured"),
        })?;

        let collect = async {
            let mut data = Vec::new();
            stdout
                .read_to_end(&mut data)
                .await
                .map_err(|source| FetchError::Read {
                    command: command.clone(),
                    source,
                })?;

            let status = child.wait().await.map_err(|source| FetchError::Read {
                command: command.clone(),
                source,
            })?;

            if !status.success() {
                return Err(FetchError::ExitStatus {
                    command: command.clone(),
                    status: status.to_string(),
                    stdout: data,
                });
            }

            Ok(data)
        };

        // The child is killed on drop if the timeout fires first.
        match tokio::time::timeout(timeout, collect).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                target: format!("`{}`", command),
                timeout,
            }),
        }
    }
}

fn display_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Fetches the raw throttled status from the diagnostic tool.
#[derive(Clone)]
pub struct HardwareSource {
    runner: Arc<dyn CommandRunner>,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl HardwareSource {
    /// Create a source that runs `program args...` through `runner`.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Create a source from configuration.
    pub fn from_config(runner: Arc<dyn CommandRunner>, config: &HardwareConfig) -> Self {
        Self::new(
            runner,
            config.command.clone(),
            config.args.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    /// Run the tool once. No retry.
    pub async fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        trace!(program = %self.program, args = ?self.args, "Running hardware status command");
        self.runner.run(&self.program, &self.args, self.timeout).await
    }
}

impl std::fmt::Debug for HardwareSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareSource")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("timeout", &self.timeout)
            .finish()
    }
}
