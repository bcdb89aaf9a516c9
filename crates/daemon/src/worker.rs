//! Process supervisor for external transcoder workers
//!
//! Owns exactly one external worker process per spawn and translates its
//! OS-level signals (stderr output, exit status) into typed events. Stderr is
//! fully drained before the exit event is reported, so trailing diagnostic
//! lines are never lost to a racing exit notification.

use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Error type for worker spawn operations
#[derive(Debug, Error)]
pub enum WorkerError {
    /// No program was given
    #[error("Worker program must not be empty")]
    EmptyProgram,

    /// No arguments were given
    #[error("Worker argument list must not be empty")]
    EmptyArgs,

    /// The OS failed to start the process (missing executable, permissions)
    #[error("Failed to spawn worker process: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Event emitted by a supervised worker process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// One line of the worker's diagnostic output stream, in arrival order
    Stderr(String),
    /// Worker exited; `None` means terminated by a signal.
    /// Sent exactly once, after all stderr output has been delivered.
    Exited(Option<i32>),
}

/// Handle for requesting termination of a supervised worker
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    stop_tx: mpsc::Sender<()>,
}

impl WorkerHandle {
    /// Request termination of the underlying process.
    ///
    /// Idempotent: a full or closed channel means a stop is already pending
    /// or the process has exited, and the request is silently dropped.
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }
}

/// Spawn an external worker process and supervise it.
///
/// Returns a stop handle and the event stream for the process. Spawn failures
/// surface immediately as an error, never as a deferred failed status.
///
/// The monitor task owns the child: it forwards stderr lines as
/// [`WorkerEvent::Stderr`], kills the process when a stop is requested, and
/// reports [`WorkerEvent::Exited`] only after the output stream reaches EOF.
pub fn spawn_worker(
    program: &str,
    args: &[String],
) -> Result<(WorkerHandle, mpsc::Receiver<WorkerEvent>), WorkerError> {
    if program.is_empty() {
        return Err(WorkerError::EmptyProgram);
    }
    if args.is_empty() {
        return Err(WorkerError::EmptyArgs);
    }

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(WorkerError::Spawn)?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| WorkerError::Spawn(std::io::Error::other("stderr pipe unavailable")))?;

    let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
    let (event_tx, event_rx) = mpsc::channel::<WorkerEvent>(64);

    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut stop_requested = false;

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(text)) => {
                        if event_tx.send(WorkerEvent::Stderr(text)).await.is_err() {
                            // Nobody is listening; terminate the worker.
                            let _ = child.start_kill();
                            break;
                        }
                    }
                    // EOF or read error: output is fully drained.
                    _ => break,
                },
                _ = stop_rx.recv(), if !stop_requested => {
                    stop_requested = true;
                    let _ = child.start_kill();
                }
            }
        }

        let code = match child.wait().await {
            Ok(status) => status.code(),
            Err(_) => None,
        };
        let _ = event_tx.send(WorkerEvent::Exited(code)).await;
    });

    Ok((WorkerHandle { stop_tx }, event_rx))
}
