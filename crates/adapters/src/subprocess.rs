// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers: timeouts, cancellation, line streaming.

use pal_core::CancelToken;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};

/// How often a streaming run re-checks its cancellation token.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Cap on captured stderr, so a chatty tool cannot balloon task records.
pub const STDERR_CAP_BYTES: usize = 4096;

/// Execution context handed to every tool invocation.
#[derive(Clone)]
pub struct RunContext {
    pub cancel: CancelToken,
    pub timeout: Duration,
    /// Grace between terminate and kill.
    pub grace: Duration,
}

impl RunContext {
    pub fn new(cancel: CancelToken, timeout: Duration) -> Self {
        Self {
            cancel,
            timeout,
            grace: Duration::from_secs(5),
        }
    }
}

/// How a streamed subprocess run ended.
#[derive(Debug)]
pub enum StreamOutcome {
    /// Process exited on its own.
    Exited {
        code: Option<i32>,
        /// Captured stderr, truncated to [`STDERR_CAP_BYTES`].
        stderr: String,
    },
    /// Per-stage deadline elapsed; the process was terminated.
    TimedOut,
    /// The cancellation token flipped; the process was terminated.
    Cancelled,
}

/// Run `cmd`, feeding each stdout line to `on_line`, honouring the
/// context's timeout and cancellation token.
///
/// On timeout or cancellation the child first receives a terminate signal,
/// then a kill once the grace period elapses.
pub async fn stream_lines<F>(
    mut cmd: Command,
    ctx: &RunContext,
    description: &str,
    mut on_line: F,
) -> Result<StreamOutcome, std::io::Error>
where
    F: FnMut(&str),
{
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Drain stderr concurrently so the child never blocks on a full pipe.
    let stderr_task = tokio::spawn(async move {
        let mut captured = Vec::new();
        if let Some(mut stderr) = stderr {
            let mut buf = [0u8; 1024];
            loop {
                match stderr.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if captured.len() < STDERR_CAP_BYTES {
                            let take = n.min(STDERR_CAP_BYTES - captured.len());
                            captured.extend_from_slice(&buf[..take]);
                        }
                    }
                }
            }
        }
        String::from_utf8_lossy(&captured).into_owned()
    });

    let deadline = tokio::time::Instant::now() + ctx.timeout;
    let mut lines = stdout.map(|out| BufReader::new(out).lines());
    let mut stdout_done = lines.is_none();

    let ended = loop {
        if ctx.cancel.is_cancelled() {
            terminate(&mut child, ctx.grace, description).await;
            break StreamEnd::Cancelled;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!(
                tool = description,
                timeout_s = ctx.timeout.as_secs(),
                "stage timed out"
            );
            terminate(&mut child, ctx.grace, description).await;
            break StreamEnd::TimedOut;
        }

        if stdout_done {
            // Output is drained; wait for exit, still polling for cancel.
            match tokio::time::timeout(CANCEL_POLL_INTERVAL, child.wait()).await {
                Ok(status) => break StreamEnd::Exited(status?.code()),
                Err(_) => continue,
            }
        }

        // Lines is always Some here, guarded by stdout_done.
        let next = async {
            match &mut lines {
                Some(lines) => lines.next_line().await,
                None => Ok(None),
            }
        };
        match tokio::time::timeout(CANCEL_POLL_INTERVAL, next).await {
            Ok(Ok(Some(line))) => on_line(&line),
            Ok(Ok(None)) => stdout_done = true,
            Ok(Err(e)) => {
                tracing::warn!(tool = description, error = %e, "stdout read failed");
                stdout_done = true;
            }
            Err(_) => {} // poll tick; loop re-checks cancel/deadline
        }
    };

    let stderr = stderr_task.await.unwrap_or_default();
    Ok(match ended {
        StreamEnd::Exited(code) => StreamOutcome::Exited { code, stderr },
        StreamEnd::TimedOut => StreamOutcome::TimedOut,
        StreamEnd::Cancelled => StreamOutcome::Cancelled,
    })
}

enum StreamEnd {
    Exited(Option<i32>),
    TimedOut,
    Cancelled,
}

/// Terminate-then-kill: politely signal first, kill when the grace period
/// elapses without an exit.
async fn terminate(child: &mut Child, grace: Duration, description: &str) {
    if let Some(pid) = child.id() {
        // Shell out for SIGTERM, same as the rest of the process plumbing.
        let _ = Command::new("kill")
            .arg("-s")
            .arg("TERM")
            .arg(pid.to_string())
            .output()
            .await;
    }
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(_) => {}
        Err(_) => {
            tracing::warn!(tool = description, "grace elapsed, killing");
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
