//! Subprocess execution on the host.

use crate::outcome::Outcome;
use crate::printer;
use crate::runner::{CommandRunner, StepOutput};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use testbed_core::{Error, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Runs commands as child processes. Stdout is echoed line by line as it
/// arrives and captured; stderr goes straight to our own stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &[String], cwd: &Path) -> Result<StepOutput> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::Config("empty command".to_string()))?;

        printer::command(command);

        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| Error::Spawn {
                command: command.join(" "),
                source,
            })?;

        let mut lines = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            // tool output is not guaranteed to be valid UTF-8
            while reader.read_until(b'\n', &mut buf).await? > 0 {
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                println!("{line}");
                lines.push(line);
                buf.clear();
            }
        }

        let status = child.wait().await?;
        debug!(command = %command.join(" "), code = ?status.code(), "Command completed");

        Ok(StepOutput {
            outcome: Outcome::from_exit(status.success()),
            lines,
        })
    }
}
