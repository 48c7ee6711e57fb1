//! Command execution inside running containers.
//!
//! Captures stdout, stderr and the exit code of a one-shot command. Used for
//! post-start provisioning and in-container copies.

use crate::container::{ContainerError, Result};
use bollard::Docker;
use bollard::exec::{CreateExecOptions, StartExecResults};
use futures::stream::StreamExt;
use tracing::debug;

/// Execution configuration builder.
pub struct ExecConfigBuilder {
    cmd: Vec<String>,
    working_dir: Option<String>,
    user: Option<String>,
}

impl ExecConfigBuilder {
    /// Create a new execution configuration builder.
    pub fn new() -> Self {
        Self {
            cmd: Vec::new(),
            working_dir: None,
            user: None,
        }
    }

    /// Set the command to execute.
    pub fn cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = cmd.into_iter().map(|s| s.into()).collect();
        self
    }

    /// Set the working directory.
    pub fn working_dir<S: Into<String>>(mut self, dir: S) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the user to execute as.
    pub fn user<S: Into<String>>(mut self, user: S) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Build the execution configuration.
    pub fn build(self) -> ExecConfig {
        ExecConfig {
            cmd: self.cmd,
            working_dir: self.working_dir,
            user: self.user,
        }
    }
}

impl Default for ExecConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Container execution configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecConfig {
    cmd: Vec<String>,
    working_dir: Option<String>,
    user: Option<String>,
}

impl ExecConfig {
    /// Create a new execution configuration builder.
    pub fn builder() -> ExecConfigBuilder {
        ExecConfigBuilder::new()
    }

    /// Run `script` through `bash -c`.
    pub fn shell<S: Into<String>>(script: S) -> Self {
        Self::builder().cmd(["bash".to_string(), "-c".to_string(), script.into()]).build()
    }

    /// `mkdir -p <path>`.
    pub fn make_dir(path: &str) -> Self {
        Self::builder().cmd(["mkdir", "-p", path]).build()
    }

    /// Get the command.
    pub fn cmd(&self) -> &[String] {
        &self.cmd
    }
}

/// Output from command execution.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code (None if not available)
    pub exit_code: Option<i64>,
}

impl ExecOutput {
    /// Check if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Get combined output (stdout + stderr).
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Execute a command in a running container.
///
/// # Errors
///
/// Returns error if execution fails or container not found.
pub async fn execute(
    docker: &Docker,
    container_id: &str,
    config: &ExecConfig,
) -> Result<ExecOutput> {
    debug!(
        "Executing command in container {}: {:?}",
        container_id, config.cmd
    );

    let exec_options = CreateExecOptions {
        cmd: Some(config.cmd.clone()),
        working_dir: config.working_dir.clone(),
        user: config.user.clone(),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        ..Default::default()
    };

    let exec = docker
        .create_exec(container_id, exec_options)
        .await
        .map_err(|e| ContainerError::from_api(container_id, e))?;

    let start_results = docker.start_exec(&exec.id, None).await?;

    let mut stdout = String::new();
    let mut stderr = String::new();

    match start_results {
        StartExecResults::Attached { mut output, .. } => {
            while let Some(result) = output.next().await {
                match result {
                    Ok(log) => {
                        let text = log.to_string();
                        match log {
                            bollard::container::LogOutput::StdErr { .. } => {
                                stderr.push_str(&text);
                            }
                            _ => {
                                stdout.push_str(&text);
                            }
                        }
                    }
                    Err(e) => {
                        return Err(ContainerError::Execution(format!(
                            "Failed to read output: {}",
                            e
                        )));
                    }
                }
            }
        }
        StartExecResults::Detached => {
            return Err(ContainerError::Execution(
                "Unexpected detached execution".to_string(),
            ));
        }
    }

    let inspect = docker.inspect_exec(&exec.id).await?;
    let exit_code = inspect.exit_code;

    debug!("Command executed with exit code: {:?}", exit_code);

    Ok(ExecOutput {
        stdout,
        stderr,
        exit_code,
    })
}
