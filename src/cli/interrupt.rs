//! Ctrl-C handling: the first press cancels cooperatively, the second aborts

use std::future::Future;
use std::io;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Exit code after a forced abort (128 + SIGINT)
pub const ABORT_EXIT_CODE: i32 = 130;

/// Wait for interrupts from `signal`.
///
/// The first one cancels `cancel` so no new build or deploy starts. Returns
/// `true` once a second one arrives, `false` if the signal source fails.
pub async fn watch<F, Fut>(mut signal: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if signal().await.is_err() {
        return false;
    }
    warn!("Interrupted, finishing the current step (Ctrl-C again to abort)");
    cancel.cancel();

    signal().await.is_ok()
}
