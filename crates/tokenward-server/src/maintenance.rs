//! Background upkeep of the revocation denylist.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokenward_auth::{AuthResult, Clock, RevokedTokenStorage};

/// Deletes denylist entries whose tokens would be rejected as expired anyway.
pub async fn purge_once(blacklist: &dyn RevokedTokenStorage, clock: &dyn Clock) -> AuthResult<u64> {
    let purged = blacklist.purge_expired(clock.now()).await?;
    if purged > 0 {
        tracing::info!(purged, "purged expired blacklist entries");
    } else {
        tracing::debug!("no expired blacklist entries");
    }
    Ok(purged)
}

/// Runs [`purge_once`] every `every`, starting one period after spawn.
///
/// Failures are logged and the loop keeps going.
pub fn spawn_blacklist_purge(
    blacklist: Arc<dyn RevokedTokenStorage>,
    clock: Arc<dyn Clock>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            if let Err(e) = purge_once(blacklist.as_ref(), clock.as_ref()).await {
                tracing::error!(error = %e, category = %e.category(), "blacklist purge failed");
            }
        }
    })
}
