//! Bounded retry for file operations that can race with other processes.

use std::io;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use chasm_repo::{ChasmError, ChasmResult};

/// Retry policy for contended file access.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(25),
        }
    }
}

/// Errors worth retrying: another process may hold the file briefly.
fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::PermissionDenied
    )
}

/// Run `op` until it succeeds, the error is not transient, or the attempts
/// are exhausted. The cancellation token is observed between attempts.
///
/// Runs on a blocking thread; the inter-attempt delay is a thread sleep.
pub(crate) fn run_with_retry<T>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: impl FnMut() -> io::Result<T>,
) -> ChasmResult<T> {
    let mut attempt = 1;
    loop {
        if cancel.is_cancelled() {
            return Err(ChasmError::Cancelled);
        }
        match op() {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.attempts && is_transient(&error) => {
                warn!(attempt, error = %error, "transient I/O error, retrying");
                attempt += 1;
                std::thread::sleep(policy.delay);
            }
            Err(error) => return Err(error.into()),
        }
    }
}
