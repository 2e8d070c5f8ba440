//! Builder for `git` invocations with consistent timeouts, logging and error mapping.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::{GIT_CLONE_TIMEOUT, GIT_COMMAND_TIMEOUT};
use crate::core::IdxvizError;

/// Name of the git executable for this platform.
#[must_use]
pub fn git_program() -> &'static str {
    if cfg!(windows) { "git.exe" } else { "git" }
}

/// Fluent builder for one `git` process.
///
/// ```rust,ignore
/// use idxviz_cli::git::command_builder::GitCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let url = GitCommand::remote_url()
///     .current_dir("/path/to/repo")
///     .execute_stdout()
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// Commands run with `-C <dir>` rather than changing the process directory, capture
/// output, and time out after [`GIT_COMMAND_TIMEOUT`] unless told otherwise.
#[derive(Debug)]
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            // Never block on a credential prompt
            env_vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            timeout_duration: Some(GIT_COMMAND_TIMEOUT),
            context: None,
        }
    }
}

impl GitCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the command against the repository at `dir`.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// `None` disables the timeout.
    pub fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Label used in log lines for this command.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn operation(&self) -> String {
        self.args.first().cloned().unwrap_or_else(|| "unknown".to_string())
    }

    /// Execute the command and return its captured output.
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = Instant::now();
        let program = git_program();
        let operation = self.operation();
        let context = self.context.as_deref().unwrap_or("git");

        let mut full_args = Vec::new();
        if let Some(dir) = &self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());

        let mut cmd = Command::new(program);
        cmd.args(&full_args).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        tracing::debug!(target: "git", "({}) Executing command: {} {}", context, program, full_args.join(" "));

        let output_future = cmd.output();
        let output = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        target: "git",
                        "Command timed out after {} seconds: git {}",
                        duration.as_secs(),
                        full_args.join(" ")
                    );
                    return Err(IdxvizError::GitCommandError {
                        operation,
                        stderr: format!(
                            "Git command timed out after {} seconds. Check network connectivity \
                             and credentials, then retry: git {}",
                            duration.as_secs(),
                            full_args.join(" ")
                        ),
                    }
                    .into());
                }
            },
            None => output_future.await,
        };

        let output = match output {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(IdxvizError::GitNotFound.into()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to execute git {}", full_args.join(" ")));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(target: "git", "({}) Command failed with exit code: {:?}", context, output.status.code());
            if !stderr.is_empty() {
                tracing::debug!(target: "git", "({}) Error: {}", context, stderr.trim());
            }
            return Err(IdxvizError::GitCommandError {
                operation,
                stderr: if stderr.trim().is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr.trim().to_string()
                },
            }
            .into());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "git::perf", "({}) Git {} took {:.2}s", context, operation, elapsed.as_secs_f64());
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(target: "git::perf", "({}) Git {} took {}ms", context, operation, elapsed.as_millis());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Execute and return stdout, trimmed.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

/// Output from a git command
#[derive(Debug)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl GitCommand {
    /// Full clone of `url` into `target`, which must not exist yet.
    pub fn clone(url: &str, target: impl AsRef<Path>) -> Self {
        Self::new()
            .args(["clone", "--quiet"])
            .arg(url)
            .arg(target.as_ref().display().to_string())
            .with_timeout(Some(GIT_CLONE_TIMEOUT))
    }

    /// Print the configured `origin` URL.
    pub fn remote_url() -> Self {
        Self::new().args(["config", "--get", "remote.origin.url"])
    }

    /// List tracked paths, NUL separated.
    pub fn ls_files() -> Self {
        Self::new().args(["ls-files", "-z"])
    }

    pub fn version() -> Self {
        Self::new().arg("--version").with_timeout(Some(Duration::from_secs(10)))
    }
}
