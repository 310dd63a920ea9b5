//! Process execution engine.
//!
//! Runs one analyzer invocation as an isolated child process with a hard
//! wall-clock limit. Stdout and stderr are captured independently and in
//! full. On timeout the whole process group is killed (analyzers like to
//! spawn solvers and compilers of their own) and whatever partial output was
//! already captured goes into the record; a timeout is data, not a crash.

use std::process::Stdio;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::adapters::Invocation;
use crate::model::ExecutionRecord;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The tool binary is missing or not executable. Fatal for this single
    /// record, never for the batch.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// Output capture failed after a successful launch.
    #[error("failed to capture tool output: {0}")]
    Io(#[from] std::io::Error),
}

/// Stateless runner for analyzer invocations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionEngine;

impl ExecutionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run `invocation` to completion or until `timeout` expires.
    ///
    /// A non-zero exit code is not an error here; whether it means a
    /// tool-internal failure is the adapter's call. The returned record is
    /// created exactly once and never mutated afterwards.
    pub async fn run(
        &self,
        invocation: &Invocation,
        tool_id: &str,
        target_id: &str,
        timeout: Duration,
    ) -> Result<ExecutionRecord, EngineError> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &invocation.cwd {
            cmd.current_dir(cwd);
        }
        // Own process group, so a timeout kill reaches every descendant.
        #[cfg(unix)]
        cmd.process_group(0);

        debug!(tool = tool_id, target = target_id, program = %invocation.program.display(), "spawning analyzer");

        let mut child = cmd.spawn().map_err(|source| EngineError::Launch {
            program: invocation.program.display().to_string(),
            source,
        })?;
        let pid = child.id();

        // Drain both pipes concurrently; after a kill the pipes close and
        // these tasks finish with whatever partial output was produced.
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stdout_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let (exit_code, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => (status?.code(), false),
            Err(_) => {
                warn!(
                    tool = tool_id,
                    target = target_id,
                    timeout_secs = timeout.as_secs(),
                    "analyzer exceeded timeout, killing process group"
                );
                kill_process_tree(pid, &mut child).await;
                let _ = child.wait().await;
                (None, true)
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        let finished_at = Utc::now();

        Ok(ExecutionRecord {
            tool_id: tool_id.to_string(),
            target_id: target_id.to_string(),
            started_at,
            finished_at,
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            timed_out,
            duration_ms: clock.elapsed().as_millis() as u64,
        })
    }
}

/// Kill the child's whole process group; falls back to killing just the
/// direct child where process groups are unavailable.
async fn kill_process_tree(pid: Option<u32>, child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        // The child was spawned as its own group leader, so the group id is
        // the child's pid.
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
    let _ = child.start_kill();
}
