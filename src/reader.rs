use std::sync::Arc;

use sqlx::PgPool;
use telemetry_core::{Reading, SourceId, Window};
use tokio::sync::RwLock;

use crate::db;
use crate::error::ApiError;

/// Telemetry Reader. Backed by Postgres when a pool is configured, otherwise
/// by the in-memory store the mock generator seeds. Readings come back
/// ascending by sample time; an empty window is an empty vec, not an error.
#[derive(Clone)]
pub struct TelemetryStore {
    db: Option<PgPool>,
    mem: Arc<RwLock<Vec<Reading>>>,
}

impl TelemetryStore {
    pub fn new(db: Option<PgPool>) -> Self {
        Self {
            db,
            mem: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn fetch(&self, source: SourceId, window: Window) -> Result<Vec<Reading>, ApiError> {
        if let Some(db) = self.db.as_ref() {
            return Ok(db::fetch_readings(db, source, window).await?);
        }
        let mem = self.mem.read().await;
        let mut rows: Vec<Reading> = mem
            .iter()
            .filter(|r| r.source == source && window.contains(r.ts))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.ts);
        Ok(rows)
    }

    pub async fn fetch_all(&self, window: Window) -> Result<Vec<Reading>, ApiError> {
        if let Some(db) = self.db.as_ref() {
            return Ok(db::fetch_readings_all(db, window).await?);
        }
        let mem = self.mem.read().await;
        let mut rows: Vec<Reading> = mem
            .iter()
            .filter(|r| window.contains(r.ts))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.ts);
        Ok(rows)
    }

    pub async fn latest(&self, source: SourceId) -> Result<Option<Reading>, ApiError> {
        if let Some(db) = self.db.as_ref() {
            return Ok(db::fetch_latest(db, source).await?);
        }
        let mem = self.mem.read().await;
        Ok(mem
            .iter()
            .filter(|r| r.source == source)
            .max_by_key(|r| r.ts)
            .cloned())
    }

    /// Load generated readings. Used once at startup in mock-data mode.
    pub async fn seed(&self, readings: Vec<Reading>) -> Result<(), ApiError> {
        if let Some(db) = self.db.as_ref() {
            db::insert_readings(db, &readings)
                .await
                .map_err(ApiError::Internal)?;
            return Ok(());
        }
        let mut mem = self.mem.write().await;
        mem.extend(readings);
        mem.sort_by_key(|r| r.ts);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use telemetry_core::TimeRange;

    use super::*;
    use crate::mock;

    #[tokio::test]
    async fn in_memory_fetch_filters_and_orders() {
        let store = TelemetryStore::new(None);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        store
            .seed(mock::generate_history(now, Duration::days(2)))
            .await
            .unwrap();

        let window = TimeRange::Last24h.resolve(now);
        let rows = store.fetch(SourceId::Inv1, window).await.unwrap();
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|r| r.source == SourceId::Inv1));
        assert!(rows.iter().all(|r| window.contains(r.ts)));
        for pair in rows.windows(2) {
            assert!(pair[0].ts <= pair[1].ts);
        }
    }

    #[tokio::test]
    async fn empty_window_yields_empty_sequence() {
        let store = TelemetryStore::new(None);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        store
            .seed(mock::generate_history(now, Duration::days(1)))
            .await
            .unwrap();

        // A window entirely before the seeded data.
        let window = TimeRange::Last24h.resolve(now - Duration::days(30));
        let rows = store.fetch(SourceId::Grid1, window).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn latest_returns_the_newest_sample() {
        let store = TelemetryStore::new(None);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        store
            .seed(mock::generate_history(now, Duration::days(1)))
            .await
            .unwrap();

        let latest = store.latest(SourceId::Grid1).await.unwrap().unwrap();
        let all = store
            .fetch(SourceId::Grid1, TimeRange::Last7d.resolve(now))
            .await
            .unwrap();
        assert_eq!(latest.ts, all.last().unwrap().ts);
    }
}
