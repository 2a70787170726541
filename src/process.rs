//! External tool invocation
//!
//! Builders, deployers and git checkouts all shell out. `ToolCommand`
//! captures the invocation so errors can name the exact command line.

use crate::error::{SkiffError, SkiffResult};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Max number of output lines to include in error messages.
const ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of tool output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `ERROR_TAIL_LINES`
/// lines.
pub fn output_tail(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// A single external command
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
    stdin: Option<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
            stdin: None,
        }
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

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Feed `input` to the command's stdin
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Command line for logs and error messages
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion and capture output, whatever the exit status
    pub async fn output(&self) -> SkiffResult<Output> {
        let cmdline = self.display();
        debug!("Executing: {}", cmdline);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);
        if let Some(ref cwd) = self.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }

        let mut child = command
            .spawn()
            .map_err(|e| SkiffError::command_failed(cmdline.clone(), e))?;

        let writer = match (child.stdin.take(), self.stdin.clone()) {
            (Some(mut pipe), Some(input)) => Some(tokio::spawn(async move {
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    warn!("Failed writing to child stdin: {}", e);
                }
            })),
            _ => None,
        };

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SkiffError::command_failed(cmdline, e))?;

        if let Some(writer) = writer {
            let _ = writer.await;
        }
        Ok(output)
    }

    /// Run and return stdout; a non-zero exit becomes `CommandExecution`
    /// carrying the output tail
    pub async fn run(&self) -> SkiffResult<String> {
        let output = self.output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        if output.status.success() {
            Ok(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(SkiffError::command_exec(
                self.display(),
                output_tail(&stdout, &stderr),
            ))
        }
    }
}

/// Failure text of a tool error, without the command prefix
pub fn failure_reason(err: &SkiffError) -> String {
    match err {
        SkiffError::CommandExecution { stderr, .. } => stderr.clone(),
        other => other.to_string(),
    }
}
