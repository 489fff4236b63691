use std::time::Duration;
use tokio::sync::watch;

/// Waits until `rx` has seen no new value for `quiet`.
///
/// Returns `false` if the sender went away first. Every value seen while
/// waiting is marked as seen; the settled one is read with `borrow`.
pub async fn settle<T>(rx: &mut watch::Receiver<T>, quiet: Duration) -> bool {
    loop {
        match tokio::time::timeout(quiet, rx.changed()).await {
            Err(_) => return true,
            Ok(Ok(())) => continue,
            Ok(Err(_)) => return false,
        }
    }
}
