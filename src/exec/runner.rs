//! Process runner
//!
//! Every external tool (`mysql`, `mysqlbinlog`, `mysqldump`, hook scripts)
//! runs through [`CommandRunner`]. The process implementation applies one
//! timeout to the whole invocation and kills the children when it expires.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::command::{CommandOutput, CommandSpec};
use super::errors::{ExecError, ExecResult};

/// Runs external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `cmd` to completion. A non-zero exit is an error.
    async fn run(&self, cmd: &CommandSpec) -> ExecResult<CommandOutput>;

    /// Run `cmd` with `input` written to its stdin.
    async fn run_with_input(&self, cmd: &CommandSpec, input: &str) -> ExecResult<CommandOutput>;

    /// Stream the stdout of `producer` into the stdin of `consumer`, with no
    /// intermediate file. Both must exit successfully.
    async fn pipe(
        &self,
        producer: &CommandSpec,
        consumer: &CommandSpec,
    ) -> ExecResult<CommandOutput>;
}

/// [`CommandRunner`] backed by OS processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args).kill_on_drop(true);
        command
    }

    fn spawn_error(spec: &CommandSpec, e: std::io::Error) -> ExecError {
        ExecError::Spawn {
            program: spec.program.clone(),
            reason: e.to_string(),
        }
    }

    fn timeout_error(&self, spec: &CommandSpec) -> ExecError {
        ExecError::Timeout {
            program: spec.program.clone(),
            timeout_ms: self.timeout.as_millis(),
        }
    }

    fn check(spec: &CommandSpec, output: std::process::Output) -> ExecResult<CommandOutput> {
        let captured = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if output.status.success() {
            Ok(captured)
        } else {
            Err(ExecError::Failed {
                program: spec.program.clone(),
                code: output.status.code(),
                output: captured.combined(),
            })
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, cmd: &CommandSpec) -> ExecResult<CommandOutput> {
        let child = Self::command(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(cmd, e))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| self.timeout_error(cmd))?
            .map_err(|e| Self::spawn_error(cmd, e))?;

        Self::check(cmd, output)
    }

    async fn run_with_input(&self, cmd: &CommandSpec, input: &str) -> ExecResult<CommandOutput> {
        let mut child = Self::command(cmd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(cmd, e))?;

        let mut stdin = child.stdin.take().ok_or_else(|| ExecError::Spawn {
            program: cmd.program.clone(),
            reason: "stdin not captured".to_string(),
        })?;
        let data = input.as_bytes().to_vec();

        let work = async move {
            let write = async move {
                let result = stdin.write_all(&data).await;
                drop(stdin);
                result
            };
            let (written, output) = tokio::join!(write, child.wait_with_output());
            (written, output)
        };

        let (written, output) = tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| self.timeout_error(cmd))?;
        let output = output.map_err(|e| Self::spawn_error(cmd, e))?;
        let checked = Self::check(cmd, output)?;
        written.map_err(|e| ExecError::Failed {
            program: cmd.program.clone(),
            code: None,
            output: format!("writing stdin: {}", e),
        })?;
        Ok(checked)
    }

    async fn pipe(
        &self,
        producer: &CommandSpec,
        consumer: &CommandSpec,
    ) -> ExecResult<CommandOutput> {
        let mut upstream = Self::command(producer)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(producer, e))?;

        let mut downstream = Self::command(consumer)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(consumer, e))?;

        let pipe_error = |reason: String| ExecError::Pipe {
            producer: producer.program.clone(),
            consumer: consumer.program.clone(),
            reason,
        };

        let mut from = upstream
            .stdout
            .take()
            .ok_or_else(|| pipe_error("producer stdout not captured".to_string()))?;
        let mut to = downstream
            .stdin
            .take()
            .ok_or_else(|| pipe_error("consumer stdin not captured".to_string()))?;

        let work = async move {
            let copy = async move {
                let copied = tokio::io::copy(&mut from, &mut to).await;
                drop(to);
                copied
            };
            tokio::join!(
                copy,
                upstream.wait_with_output(),
                downstream.wait_with_output()
            )
        };

        let (copied, produced, consumed) = tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| self.timeout_error(producer))?;

        let consumed = consumed.map_err(|e| Self::spawn_error(consumer, e))?;
        let consumer_output = Self::check(consumer, consumed)?;

        let produced = produced.map_err(|e| Self::spawn_error(producer, e))?;
        let producer_output = Self::check(producer, produced)?;

        copied.map_err(|e| pipe_error(e.to_string()))?;

        Ok(CommandOutput {
            stdout: consumer_output.stdout,
            stderr: format!("{}{}", producer_output.stderr, consumer_output.stderr),
        })
    }
}
