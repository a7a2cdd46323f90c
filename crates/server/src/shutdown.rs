//! Bounded graceful shutdown.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// How the server future ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// Every in-flight request finished.
    Completed,
    /// Requests were still running `timeout` after shutdown began.
    TimedOut,
}

/// Drive `server` to completion, giving up `timeout` after `shutdown` is
/// cancelled. The timeout does not start before cancellation.
pub async fn drain<F, E>(
    server: F,
    shutdown: &CancellationToken,
    timeout: Duration,
) -> Result<Drain, E>
where
    F: Future<Output = Result<(), E>>,
{
    tokio::select! {
        result = server => result.map(|()| Drain::Completed),
        () = async {
            shutdown.cancelled().await;
            tokio::time::sleep(timeout).await;
        } => Ok(Drain::TimedOut),
    }
}
