use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::info;

use crate::db;
use crate::models::{EnforcementRecord, ShortageRecord};

/// Immutable snapshot of both fact tables. Aggregations read from this and
/// never touch the pool directly.
#[derive(Debug)]
pub struct Snapshot {
    pub shortages: Vec<ShortageRecord>,
    pub enforcements: Vec<EnforcementRecord>,
    pub loaded_at: Instant,
}

/// Explicit TTL cache around the fact snapshot. Owned by the server state and
/// passed into handlers; expiry is the only invalidation mechanism.
pub struct SnapshotCache {
    ttl: Duration,
    inner: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> SnapshotCache {
        SnapshotCache {
            ttl,
            inner: RwLock::new(None),
        }
    }

    /// Returns the cached snapshot if still fresh, otherwise reloads both
    /// fact tables. Concurrent callers that race past the read lock are
    /// serialized by the write lock and re-check freshness before reloading.
    pub async fn get_or_refresh(&self, pool: &PgPool) -> anyhow::Result<Arc<Snapshot>> {
        {
            let guard = self.inner.read().await;
            if let Some(snapshot) = guard.as_ref() {
                if snapshot.loaded_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(snapshot));
                }
            }
        }

        let mut guard = self.inner.write().await;
        if let Some(snapshot) = guard.as_ref() {
            if snapshot.loaded_at.elapsed() < self.ttl {
                return Ok(Arc::clone(snapshot));
            }
        }

        let shortages = db::fetch_shortages(pool).await?;
        let enforcements = db::fetch_enforcements(pool).await?;
        info!(
            shortages = shortages.len(),
            enforcements = enforcements.len(),
            "refreshed fact snapshot"
        );
        let snapshot = Arc::new(Snapshot {
            shortages,
            enforcements,
            loaded_at: Instant::now(),
        });
        *guard = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}
