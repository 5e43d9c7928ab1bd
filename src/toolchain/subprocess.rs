//! Subprocess runner - spawns external tools and streams their output into the log

use crate::toolchain::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Lines of stderr kept in a failure message
const STDERR_TAIL_LINES: usize = 20;

/// Runs commands as child processes of the pipeline
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner {
    /// Per-command timeout in seconds (None = wait indefinitely)
    timeout_secs: Option<u64>,
}

impl SubprocessRunner {
    pub fn new(timeout_secs: Option<u64>) -> Self {
        Self { timeout_secs }
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.timeout_secs
    }

    async fn spawn_and_wait(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let command = spec.display();

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| CommandError::Spawn {
            command: command.clone(),
            source,
        })?;

        let (stdout, stderr) = tokio::join!(
            collect_lines(child.stdout.take(), "stdout", spec, !spec.is_quiet()),
            collect_lines(child.stderr.take(), "stderr", spec, true),
        );

        let status = child.wait().await.map_err(|source| CommandError::Spawn {
            command: command.clone(),
            source,
        })?;

        let stdout = stdout.map_err(|e| CommandError::Decode {
            command: command.clone(),
            reason: e.to_string(),
        })?;
        let stderr = stderr.map_err(|e| CommandError::Decode {
            command: command.clone(),
            reason: e.to_string(),
        })?;

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            warn!("`{}` exited with code {}", command, code);
            return Err(CommandError::Failed {
                command,
                code,
                stderr: spec.redact(&tail(&stderr, STDERR_TAIL_LINES)),
            });
        }

        debug!("`{}` returned {} bytes of output", command, stdout.len());
        Ok(CommandOutput { stdout, stderr })
    }
}

#[async_trait]
impl CommandRunner for SubprocessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        info!("$ {}", spec);
        if let Some(dir) = &spec.cwd {
            debug!("  in {}", dir.display());
        }

        match self.timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), self.spawn_and_wait(spec))
                .await
                .map_err(|_| CommandError::Timeout {
                    command: spec.display(),
                    secs,
                })?,
            None => self.spawn_and_wait(spec).await,
        }
    }
}

/// Read a child stream line by line, echoing each redacted line to the log
async fn collect_lines<R>(
    reader: Option<R>,
    stream: &'static str,
    spec: &CommandSpec,
    echo: bool,
) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut collected = String::new();
    let Some(reader) = reader else {
        return Ok(collected);
    };

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if echo {
            info!(target: "release_pipeline::tool", stream, "{}", spec.redact(&line));
        }
        collected.push_str(&line);
        collected.push('\n');
    }
    if !echo {
        debug!("Captured {} bytes of {} without echoing", collected.len(), stream);
    }
    Ok(collected)
}

fn tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n").trim().to_string()
}
