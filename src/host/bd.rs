use crate::errors::{AppError, AppResult};
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

const BD_TIMEOUT: Duration = Duration::from_secs(60);

/// Spawns the tracker CLI inside a project directory.
#[derive(Debug, Clone)]
pub struct BdRunner {
    binary: String,
    verbose: bool,
}

impl BdRunner {
    pub fn new(binary: impl Into<String>, verbose: bool) -> Self {
        Self {
            binary: binary.into(),
            verbose,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub async fn run(&self, cwd: &Path, args: &[String]) -> AppResult<String> {
        if !cwd.is_dir() {
            return Err(AppError::NotFound(format!(
                "Project directory not found: {}",
                cwd.display()
            )));
        }

        let subcommand = args.first().map(String::as_str).unwrap_or_default();
        if self.verbose {
            tracing::info!(binary = %self.binary, args = ?args, cwd = %cwd.display(), "running bd");
        } else {
            tracing::debug!(binary = %self.binary, subcommand, cwd = %cwd.display(), "running bd");
        }

        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(BD_TIMEOUT, command.output())
            .await
            .map_err(|_| AppError::Cli(format!("bd {} timed out after {}s", subcommand, BD_TIMEOUT.as_secs())))?
            .map_err(|error| {
                if error.kind() == std::io::ErrorKind::NotFound {
                    AppError::backend(format!("bd CLI not found at '{}': {}", self.binary, error))
                } else {
                    AppError::Io(format!("failed to spawn bd: {}", error))
                }
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if !stderr.is_empty() {
            stderr
        } else if !stdout.is_empty() {
            stdout
        } else {
            format!("bd {} exited with status {:?}", subcommand, output.status.code())
        };
        tracing::warn!(subcommand, error = %message, "bd command failed");
        Err(AppError::backend(message))
    }

    pub async fn run_json(&self, cwd: &Path, args: &[String]) -> AppResult<Value> {
        let stdout = self.run(cwd, args).await?;
        if stdout.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&stdout).map_err(|error| {
            AppError::Internal(format!(
                "bd {} returned invalid JSON: {}",
                args.first().map(String::as_str).unwrap_or_default(),
                error
            ))
        })
    }
}

/// Argument vector builder for `bd` invocations.
#[derive(Debug, Default, Clone)]
pub struct BdArgs(Vec<String>);

impl BdArgs {
    pub fn new(parts: &[&str]) -> Self {
        Self(parts.iter().map(|part| (*part).to_string()).collect())
    }

    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.0.push(value.into());
        self
    }

    pub fn flag(mut self, name: &str, value: Option<impl ToString>) -> Self {
        if let Some(value) = value {
            self.0.push(name.to_string());
            self.0.push(value.to_string());
        }
        self
    }

    pub fn switch(mut self, name: &str, enabled: bool) -> Self {
        if enabled {
            self.0.push(name.to_string());
        }
        self
    }

    pub fn json(self) -> Self {
        self.arg("--json")
    }

    pub fn build(self) -> Vec<String> {
        self.0
    }
}
