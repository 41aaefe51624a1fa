//! periodic expired-lease cleanup (§4.10)

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{lease_manager::LeaseManager, metrics, store::Store};

/// runs [`LeaseManager::expire`] on a fixed cadence until cancelled
///
/// grounded on the teacher's `spawn_lease_gc_task` shape (`tokio::time::interval`
/// raced against a `CancellationToken` in a `tokio::select!` loop). Failure is
/// logged and the sweeper continues on schedule (§4.10); it is not required to
/// be co-scheduled with the dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct ExpirySweeper;

impl ExpirySweeper {
    /// run the sweep loop, ticking every `interval`, until `token` is cancelled
    pub async fn run(store: Arc<dyn Store>, interval: Duration, token: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("expiry sweeper stopping");
                    return;
                }
                _ = ticker.tick() => {
                    Self::tick(store.as_ref()).await;
                }
            }
        }
    }

    async fn tick(store: &dyn Store) {
        match LeaseManager::expire(store, SystemTime::now()).await {
            Ok(removed) => {
                if removed > 0 {
                    debug!(removed, "expiry sweep removed leases");
                }
                metrics::LEASES_EXPIRED.inc_by(removed);
                if let Ok(live) = store.lease_list().await {
                    metrics::LIVE_LEASES.set(live.len() as i64);
                }
            }
            Err(err) => {
                metrics::SWEEP_ERRORS.inc();
                warn!(%err, "expiry sweep failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Lease;
    use crate::store::sqlite::SqliteStore;
    use mac_address::MacAddress;
    use sqlx::SqlitePool;
    use std::time::Duration as StdDuration;

    async fn test_store() -> Arc<SqliteStore> {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        Arc::new(SqliteStore::from_pool(pool).await.unwrap())
    }

    #[tokio::test]
    async fn tick_removes_expired_leases_only() {
        let store = test_store().await;
        store
            .lease_create(&Lease {
                client_hw_addr: MacAddress::new([0, 0, 0, 0, 0, 1]),
                assigned_addr: "10.1.1.10".parse().unwrap(),
                expires: 1,
            })
            .await
            .unwrap();
        store
            .lease_create(&Lease {
                client_hw_addr: MacAddress::new([0, 0, 0, 0, 0, 2]),
                assigned_addr: "10.1.1.11".parse().unwrap(),
                expires: 9_999_999_999,
            })
            .await
            .unwrap();

        ExpirySweeper::tick(store.as_ref()).await;
        assert_eq!(store.lease_list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let store = test_store().await;
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(ExpirySweeper::run(
            store as Arc<dyn Store>,
            StdDuration::from_millis(10),
            child,
        ));
        tokio::time::sleep(StdDuration::from_millis(30)).await;
        token.cancel();
        tokio::time::timeout(StdDuration::from_secs(1), handle)
            .await
            .expect("sweeper task should exit promptly after cancellation")
            .unwrap();
    }
}
