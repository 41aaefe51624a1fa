//! process-wide memoized [`Options`] snapshot (§4.9)

use tokio::sync::RwLock;
use tracing::warn;

use crate::{error::Error, metrics, model::Options, store::Store};

/// guarded holder for the last-known-good [`Options`] row
///
/// readers never see a torn snapshot: the inner `RwLock` is replaced whole on
/// a successful read, never mutated field-by-field. A store error falls back
/// to the cached snapshot if one exists; a cold cache with no prior snapshot
/// is fatal (§4.9, §7 `Error::Fatal`) since nothing else can answer a packet.
///
/// mutation through the admin surface does not proactively invalidate this
/// cache; the next successful [`OptionsCache::query`] call refreshes it.
#[derive(Debug)]
pub struct OptionsCache {
    snapshot: RwLock<Option<Options>>,
}

impl Default for OptionsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionsCache {
    /// an empty cache with no prior snapshot
    pub fn new() -> Self {
        OptionsCache {
            snapshot: RwLock::new(None),
        }
    }

    /// read the singleton Options row, refreshing the cache on success
    ///
    /// on a store error, returns the cached snapshot if populated; otherwise
    /// returns [`Error::Fatal`] — the caller should terminate the process.
    pub async fn query(&self, store: &dyn Store) -> Result<Options, Error> {
        match store.options_get().await {
            Ok(Some(opts)) => {
                *self.snapshot.write().await = Some(opts.clone());
                Ok(opts)
            }
            Ok(None) => Err(Error::Fatal(
                "no Options row exists; bootstrap defaults were not applied".into(),
            )),
            Err(err) => {
                if let Some(cached) = self.snapshot.read().await.clone() {
                    metrics::OPTIONS_CACHE_FALLBACKS.inc();
                    warn!(%err, "options store unavailable, serving cached snapshot");
                    Ok(cached)
                } else {
                    Err(Error::Fatal(format!(
                        "options store unavailable and no cached snapshot: {err}"
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sqlite::SqliteStore;
    use sqlx::SqlitePool;

    async fn test_store() -> SqliteStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteStore::from_pool(pool).await.unwrap()
    }

    #[tokio::test]
    async fn populates_from_store_on_success() {
        let store = test_store().await;
        let opts = Options::bootstrap_default();
        store.options_create(&opts).await.unwrap();

        let cache = OptionsCache::new();
        let read = cache.query(&store).await.unwrap();
        assert_eq!(read, opts);
    }

    #[tokio::test]
    async fn cold_cache_with_no_row_is_fatal() {
        let store = test_store().await;
        let cache = OptionsCache::new();
        match cache.query(&store).await {
            Err(Error::Fatal(_)) => {}
            other => panic!("expected Fatal, got {other:?}"),
        }
    }
}
