//! Process Executor (C4): runs a validated, already-tokenized pipeline as
//! one or more child processes with a shared deadline, an output-size cap,
//! and auth-error detection.
//!
//! Grounded on `codex_core::exec::{spawn_child_async, consume_truncated_output,
//! read_capped}`: never invokes a shell, spawns direct children with
//! explicit argv, drains stdout/stderr on dedicated tasks so a full pipe
//! buffer cannot deadlock the child, and races a `tokio::time::timeout`
//! against `child.wait()`. Generalized here to wire N children together
//! with OS pipes instead of running exactly one.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::process::Command;

use crate::error::ExecError;
use crate::pipeline::PipelineStage;
use crate::types::ErrorKind;
use crate::types::ExecutionResult;
use crate::types::ExecutionStatus;

/// Grace period between a graceful terminate and a forcible kill once the
/// wall-clock deadline fires.
const KILL_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ExecContext {
    pub cwd: PathBuf,
    /// Environment overlay applied to stage 0 only (provider credentials:
    /// `AWS_PROFILE`, `AZURE_SUBSCRIPTION_ID`, `GOOGLE_CLOUD_PROJECT`, ...).
    pub env: HashMap<String, String>,
    pub max_wall_clock: Duration,
    pub max_output_bytes: usize,
    /// Substrings that, if found in the provider stage's stderr, indicate a
    /// missing/invalid credential rather than a generic execution failure.
    pub auth_error_patterns: Vec<&'static str>,
}

/// Runs `stages` to completion (or until the deadline fires) and returns a
/// fully structured [`ExecutionResult`]. Never panics or propagates a
/// `Result` to the caller: every expected failure (spawn error, non-zero
/// exit, timeout, auth error) is encoded in the returned value, per the
/// "the API never raises for expected failures" contract.
pub async fn execute(stages: &[PipelineStage], ctx: &ExecContext) -> ExecutionResult {
    let start = Instant::now();

    match run_pipeline(stages, ctx).await {
        Ok(raw) => finish(raw, start.elapsed(), ctx),
        Err(ExecError::Timeout { elapsed_ms }) => ExecutionResult {
            status: ExecutionStatus::Error,
            output: format!("command timed out after {elapsed_ms}ms"),
            structured: None,
            exit_code: None,
            error_kind: ErrorKind::Timeout,
            truncated: false,
            elapsed: start.elapsed(),
            warnings: Vec::new(),
        },
        Err(err) => ExecutionResult {
            status: ExecutionStatus::Error,
            output: err.to_string(),
            structured: None,
            exit_code: None,
            error_kind: ErrorKind::ExecutionError,
            truncated: false,
            elapsed: start.elapsed(),
            warnings: Vec::new(),
        },
    }
}

struct RawPipelineOutput {
    final_stdout: Vec<u8>,
    final_stdout_truncated: bool,
    provider_stderr: Vec<u8>,
    exit_code: Option<i32>,
    exit_success: bool,
}

async fn run_pipeline(
    stages: &[PipelineStage],
    ctx: &ExecContext,
) -> Result<RawPipelineOutput, ExecError> {
    if stages.is_empty() {
        return Err(ExecError::Spawn);
    }

    let mut children: Vec<Child> = Vec::with_capacity(stages.len());
    let mut prev_stdout: Option<tokio::process::ChildStdout> = None;

    for (idx, stage) in stages.iter().enumerate() {
        let mut cmd = Command::new(&stage.tokens[0]);
        cmd.args(&stage.tokens[1..]);
        cmd.current_dir(&ctx.cwd);
        cmd.kill_on_drop(true);

        if idx == 0 {
            for (key, value) in &ctx.env {
                cmd.env(key, value);
            }
        }

        match prev_stdout.take() {
            Some(stdout) => {
                let stdio = Stdio::try_from(stdout).map_err(ExecError::Io)?;
                cmd.stdin(stdio);
            }
            None => {
                cmd.stdin(Stdio::null());
            }
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(ExecError::Io)?;
        prev_stdout = child.stdout.take();
        children.push(child);
    }

    let stage_count = children.len();
    let mut stderr_handles = Vec::with_capacity(stage_count);
    for child in &mut children {
        let stderr = child.stderr.take().ok_or(ExecError::Spawn)?;
        stderr_handles.push(tokio::spawn(read_capped(stderr, ctx.max_output_bytes)));
    }

    // The last stage's stdout was left in `prev_stdout` since nothing
    // consumed it as another stage's stdin.
    let final_stdout_reader = prev_stdout.ok_or(ExecError::Spawn)?;
    let stdout_handle = tokio::spawn(read_capped(final_stdout_reader, ctx.max_output_bytes));

    let wait_all = async {
        let mut statuses = Vec::with_capacity(children.len());
        for child in &mut children {
            statuses.push(child.wait().await);
        }
        statuses
    };

    let statuses = match tokio::time::timeout(ctx.max_wall_clock, wait_all).await {
        Ok(statuses) => statuses,
        Err(_) => {
            for child in &mut children {
                let _ = terminate_then_kill(child).await;
            }
            return Err(ExecError::Timeout {
                elapsed_ms: ctx.max_wall_clock.as_millis() as u64,
            });
        }
    };

    let (final_stdout, final_stdout_truncated) = stdout_handle.await.map_err(ExecError::Join)?;
    let mut stderr_outputs = Vec::with_capacity(stderr_handles.len());
    for handle in stderr_handles {
        stderr_outputs.push(handle.await.map_err(ExecError::Join)?);
    }

    let last_status = statuses
        .last()
        .ok_or(ExecError::Spawn)?
        .as_ref()
        .map_err(|e| ExecError::Io(io::Error::other(e.to_string())))?;

    let exit_success = statuses.iter().all(|s| s.as_ref().is_ok_and(|s| s.success()));

    Ok(RawPipelineOutput {
        final_stdout,
        final_stdout_truncated,
        provider_stderr: stderr_outputs
            .into_iter()
            .next()
            .map(|(bytes, _)| bytes)
            .unwrap_or_default(),
        exit_code: last_status.code(),
        exit_success,
    })
}

/// On a missed deadline, attempt a graceful `SIGTERM`, wait `KILL_GRACE`,
/// then force `SIGKILL`. Non-unix platforms have no graceful terminate
/// signal, so this degrades to an immediate kill.
async fn terminate_then_kill(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: `pid` is a live child of this process obtained from
            // `Child::id`; sending SIGTERM to it is always sound.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
            tokio::select! {
                _ = child.wait() => return Ok(()),
                _ = tokio::time::sleep(KILL_GRACE) => {}
            }
        }
    }
    child.start_kill()
}

async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, max_bytes: usize) -> (Vec<u8>, bool) {
    let mut buf = Vec::with_capacity(max_bytes.min(8 * 1024));
    let mut tmp = [0u8; 8192];
    let mut truncated = false;

    loop {
        let n = match reader.read(&mut tmp).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };

        let remaining = max_bytes.saturating_sub(buf.len());
        if remaining == 0 {
            truncated = true;
            continue; // keep draining to avoid back-pressure deadlocks
        }
        let take = remaining.min(n);
        buf.extend_from_slice(&tmp[..take]);
        if take < n {
            truncated = true;
        }
    }

    (buf, truncated)
}

fn finish(raw: RawPipelineOutput, elapsed: Duration, ctx: &ExecContext) -> ExecutionResult {
    let stderr_text = String::from_utf8_lossy(&raw.provider_stderr);

    if let Some(pattern) = ctx
        .auth_error_patterns
        .iter()
        .find(|p| stderr_text.contains(**p))
    {
        return ExecutionResult {
            status: ExecutionStatus::Error,
            output: format!("authentication error: matched pattern {pattern:?} in stderr"),
            structured: None,
            exit_code: raw.exit_code,
            error_kind: ErrorKind::AuthError,
            truncated: false,
            elapsed,
            warnings: Vec::new(),
        };
    }

    let stdout_text = String::from_utf8_lossy(&raw.final_stdout).to_string();

    if !raw.exit_success {
        return ExecutionResult {
            status: ExecutionStatus::Error,
            output: if stderr_text.trim().is_empty() {
                stdout_text
            } else {
                stderr_text.to_string()
            },
            structured: None,
            exit_code: raw.exit_code,
            error_kind: ErrorKind::ExecutionError,
            truncated: raw.final_stdout_truncated,
            elapsed,
            warnings: Vec::new(),
        };
    }

    let structured = serde_json::from_str(stdout_text.trim()).ok();

    ExecutionResult {
        status: ExecutionStatus::Success,
        output: stdout_text,
        structured,
        exit_code: raw.exit_code,
        error_kind: ErrorKind::None,
        truncated: raw.final_stdout_truncated,
        elapsed,
        warnings: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::pipeline::PipelineStage;

    fn stage(args: &[&str]) -> PipelineStage {
        PipelineStage {
            tokens: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn ctx() -> ExecContext {
        ExecContext {
            cwd: std::env::temp_dir(),
            env: HashMap::new(),
            max_wall_clock: Duration::from_secs(5),
            max_output_bytes: 1024,
            auth_error_patterns: vec!["please run `az login`", "Unable to locate credentials"],
        }
    }

    #[tokio::test]
    async fn single_stage_success_parses_json_stdout() {
        let stages = vec![stage(&["echo", "-n", r#"[{"name":"x"}]"#])];
        let result = execute(&stages, &ctx()).await;
        assert_eq!(result.status, ExecutionStatus::Success);
        assert!(result.structured.is_some());
        assert_eq!(result.error_kind, ErrorKind::None);
    }

    #[tokio::test]
    async fn pipeline_wires_stdout_to_stdin() {
        let stages = vec![
            stage(&["printf", "a\nb\nc\n"]),
            stage(&["grep", "b"]),
            stage(&["wc", "-l"]),
        ];
        let result = execute(&stages, &ctx()).await;
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.output.trim(), "1");
    }

    #[tokio::test]
    async fn non_zero_exit_is_execution_error() {
        let stages = vec![stage(&["false"])];
        let result = execute(&stages, &ctx()).await;
        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(result.error_kind, ErrorKind::ExecutionError);
    }

    #[tokio::test]
    async fn timeout_is_reported_and_child_is_reaped() {
        let mut c = ctx();
        c.max_wall_clock = Duration::from_millis(200);
        let stages = vec![stage(&["sleep", "5"])];
        let result = execute(&stages, &c).await;
        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(result.error_kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn output_beyond_cap_is_truncated() {
        let mut c = ctx();
        c.max_output_bytes = 8;
        let stages = vec![stage(&["printf", "0123456789abcdef"])];
        let result = execute(&stages, &c).await;
        assert!(result.truncated);
        assert_eq!(result.output.len(), 8);
    }

    #[tokio::test]
    async fn auth_error_pattern_in_stderr_is_detected() {
        let stages = vec![stage(&[
            "sh",
            "-c",
            "echo 'Unable to locate credentials' 1>&2; exit 1",
        ])];
        let result = execute(&stages, &ctx()).await;
        assert_eq!(result.error_kind, ErrorKind::AuthError);
    }
}
