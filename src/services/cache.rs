use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::{CatalogReader, StoreError};
use crate::models::Offer;

/// Read-through cache in front of the published catalog
///
/// Every matching run reads the whole catalog, so a short TTL absorbs bursts
/// of requests without serving stale data for long. Concurrent misses are
/// coalesced into a single backend load.
pub struct CachedCatalog {
    inner: Arc<dyn CatalogReader>,
    cache: Cache<(), Arc<Vec<Offer>>>,
    loads: AtomicU64,
}

impl CachedCatalog {
    pub fn new(inner: Arc<dyn CatalogReader>, ttl: Duration) -> Self {
        let cache = moka::future::CacheBuilder::new(1).time_to_live(ttl).build();

        Self {
            inner,
            cache,
            loads: AtomicU64::new(0),
        }
    }

    /// Drop the cached catalog so the next read hits the backend
    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.cache.entry_count(),
            backend_loads: self.loads.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub backend_loads: u64,
}

#[async_trait]
impl CatalogReader for CachedCatalog {
    async fn get_published_offers(&self) -> Result<Vec<Offer>, StoreError> {
        let offers = self
            .cache
            .try_get_with((), async {
                self.loads.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Catalog cache miss");
                self.inner.get_published_offers().await.map(Arc::new)
            })
            .await
            .map_err(|e| match e.as_ref() {
                StoreError::NotFound(what) => StoreError::NotFound(what.clone()),
                StoreError::InvalidData(msg) => StoreError::InvalidData(msg.clone()),
                StoreError::Backend(msg) => StoreError::Backend(msg.clone()),
            })?;

        Ok(offers.as_ref().clone())
    }
}
