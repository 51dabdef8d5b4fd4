//! Background sweep of expired sessions

use super::store::SessionStore;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default interval between sweeps (30 minutes)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Periodically removes sessions idle past the store's TTL.
///
/// Holds only a weak reference, so dropping the store ends the task.
pub struct Reaper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Reaper {
    pub fn spawn<S>(store: &Arc<S>, interval: Duration) -> Self
    where
        S: SessionStore + 'static,
    {
        let interval = if interval.is_zero() {
            tracing::warn!("Zero sweep interval, using the default");
            DEFAULT_SWEEP_INTERVAL
        } else {
            interval
        };
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(Arc::downgrade(store), interval, cancel.clone()));
        Self { cancel, handle }
    }

    /// Stop sweeping and wait for the task to finish
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Session reaper task failed");
        }
    }
}

async fn run<S: SessionStore>(store: Weak<S>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("Session reaper cancelled");
                break;
            }
            _ = ticker.tick() => {}
        }

        let Some(store) = store.upgrade() else {
            tracing::debug!("Session store dropped, reaper exiting");
            break;
        };
        let removed = store.sweep_expired();
        let stats = store.stats();
        tracing::info!(
            removed,
            sessions = stats.sessions,
            capacity = stats.capacity,
            active_flows = stats.active_flows,
            evicted = stats.evicted,
            expired = stats.expired,
            "Swept expired sessions"
        );
    }
}
