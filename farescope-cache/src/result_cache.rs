use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use farescope_core::{FlightOffer, SortKey, SortOrder};

/// Cache key of a derived view. Raw views are keyed by search id alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DerivedKey {
    /// Canonical hash of the filter parameters
    Filter(String),
    Sort(SortKey, SortOrder),
}

struct CacheEntry {
    raw: Vec<FlightOffer>,
    derived: HashMap<DerivedKey, Vec<FlightOffer>>,
    /// Most recent filter view; sorting operates on this when present.
    /// Sort views never become the working set themselves.
    latest_filter: Option<DerivedKey>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Derived views share the raw view's lifetime; once the raw view
    /// expires, everything under this entry is stale.
    fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// In-memory store of aggregated search results plus their filtered/sorted
/// views, bounded by TTL and a size cap.
pub struct ResultCache {
    entries: RwLock<HashMap<Uuid, CacheEntry>>,
    max_entries: usize,
}

impl ResultCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    /// Store the aggregated raw view. Written exactly once per completed
    /// search; a second write for the same id is rejected.
    pub async fn insert_raw(
        &self,
        search_id: Uuid,
        results: Vec<FlightOffer>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;

        if let Some(existing) = entries.get(&search_id) {
            if !existing.is_expired() {
                return Err(CacheError::AlreadyCached(search_id));
            }
            entries.remove(&search_id);
        }

        // Size cap guards against unbounded growth from abandoned searches
        while entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    entries.remove(&id);
                    debug!("Evicted cached search {} (capacity {})", id, self.max_entries);
                }
                None => break,
            }
        }

        let now = Utc::now();
        entries.insert(
            search_id,
            CacheEntry {
                raw: results,
                derived: HashMap::new(),
                latest_filter: None,
                created_at: now,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    /// Raw view for a search, or None when absent or TTL-expired
    pub async fn raw_view(&self, search_id: Uuid) -> Option<Vec<FlightOffer>> {
        let entries = self.entries.read().await;
        entries
            .get(&search_id)
            .filter(|e| !e.is_expired())
            .map(|e| e.raw.clone())
    }

    /// Working set for sort operations: the latest filter view when one
    /// exists, otherwise the raw view
    pub async fn latest_view(&self, search_id: Uuid) -> Option<Vec<FlightOffer>> {
        let entries = self.entries.read().await;
        let entry = entries.get(&search_id).filter(|e| !e.is_expired())?;
        match &entry.latest_filter {
            Some(key) => entry.derived.get(key).cloned(),
            None => Some(entry.raw.clone()),
        }
    }

    /// Store a derived view under the raw entry. Overwriting an existing
    /// derived view is expected; they are recomputed on every call.
    pub async fn insert_derived(
        &self,
        search_id: Uuid,
        key: DerivedKey,
        results: Vec<FlightOffer>,
    ) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&search_id)
            .filter(|e| !e.is_expired())
            .ok_or(CacheError::Missing(search_id))?;

        if matches!(key, DerivedKey::Filter(_)) {
            entry.latest_filter = Some(key.clone());
        }
        entry.derived.insert(key, results);
        Ok(())
    }

    /// Remove expired raw entries, and with them their derived views
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;
        let initial = entries.len();
        entries.retain(|_, e| !e.is_expired());
        initial - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn health(&self) -> CacheHealth {
        let entries = self.entries.read().await.len();
        let status = if entries >= self.max_entries {
            CacheStatus::Degraded
        } else {
            CacheStatus::Healthy
        };
        CacheHealth {
            entries,
            capacity: self.max_entries,
            status,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheHealth {
    pub entries: usize,
    pub capacity: usize,
    pub status: CacheStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Results already cached for search {0}")]
    AlreadyCached(Uuid),

    #[error("No cached results for search {0}")]
    Missing(Uuid),
}

/// Periodic time-based sweep of expired entries
pub fn spawn_sweeper(cache: Arc<ResultCache>, every: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = cache.sweep().await;
            if removed > 0 {
                debug!("Cache sweep removed {} expired entries", removed);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn offer(source: &str, price: i32) -> FlightOffer {
        let departure = Utc.with_ymd_and_hms(2026, 12, 25, 9, 0, 0).unwrap();
        FlightOffer {
            id: Uuid::new_v4(),
            source: source.to_string(),
            airline: "BA".to_string(),
            flight_number: "BA100".to_string(),
            origin: "JFK".to_string(),
            destination: "LHR".to_string(),
            departure_time: departure,
            arrival_time: departure + Duration::minutes(420),
            stops: 0,
            duration_minutes: 420,
            price_amount: price,
            price_currency: "USD".to_string(),
            score: price as f64,
        }
    }

    #[tokio::test]
    async fn test_raw_view_lifecycle() {
        let cache = ResultCache::new(10);
        let id = Uuid::new_v4();

        cache
            .insert_raw(id, vec![offer("amadeus", 100)], Duration::seconds(300))
            .await
            .unwrap();
        assert_eq!(cache.raw_view(id).await.unwrap().len(), 1);

        // Raw view is written exactly once
        let again = cache
            .insert_raw(id, vec![offer("amadeus", 200)], Duration::seconds(300))
            .await;
        assert!(matches!(again, Err(CacheError::AlreadyCached(_))));
    }

    #[tokio::test]
    async fn test_expired_entry_is_invisible_and_swept() {
        let cache = ResultCache::new(10);
        let id = Uuid::new_v4();

        // Negative TTL backdates the expiry
        cache
            .insert_raw(id, vec![offer("amadeus", 100)], Duration::seconds(-1))
            .await
            .unwrap();

        assert!(cache.raw_view(id).await.is_none());
        assert!(cache.latest_view(id).await.is_none());
        assert!(matches!(
            cache
                .insert_derived(id, DerivedKey::Filter("f".into()), vec![])
                .await,
            Err(CacheError::Missing(_))
        ));

        let removed = cache.sweep().await;
        assert_eq!(removed, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_sort_operates_on_latest_filter_view() {
        let cache = ResultCache::new(10);
        let id = Uuid::new_v4();

        cache
            .insert_raw(
                id,
                vec![offer("amadeus", 100), offer("sabre", 200)],
                Duration::seconds(300),
            )
            .await
            .unwrap();

        // No filter yet: working set is the raw view
        assert_eq!(cache.latest_view(id).await.unwrap().len(), 2);

        cache
            .insert_derived(
                id,
                DerivedKey::Filter("price<=150".into()),
                vec![offer("amadeus", 100)],
            )
            .await
            .unwrap();
        assert_eq!(cache.latest_view(id).await.unwrap().len(), 1);

        // A sort view does not replace the filter as the working set
        cache
            .insert_derived(
                id,
                DerivedKey::Sort(SortKey::Price, SortOrder::Descending),
                vec![offer("amadeus", 100)],
            )
            .await
            .unwrap();
        assert_eq!(cache.latest_view(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_size_cap_evicts_oldest() {
        let cache = ResultCache::new(2);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();

        cache
            .insert_raw(first, vec![offer("amadeus", 1)], Duration::seconds(300))
            .await
            .unwrap();
        tokio::time::sleep(StdDuration::from_millis(5)).await;
        cache
            .insert_raw(second, vec![offer("sabre", 2)], Duration::seconds(300))
            .await
            .unwrap();
        tokio::time::sleep(StdDuration::from_millis(5)).await;
        cache
            .insert_raw(third, vec![offer("kiwi", 3)], Duration::seconds(300))
            .await
            .unwrap();

        assert_eq!(cache.len().await, 2);
        assert!(cache.raw_view(first).await.is_none());
        assert!(cache.raw_view(third).await.is_some());
    }

    #[tokio::test]
    async fn test_health_degrades_at_capacity() {
        let cache = ResultCache::new(1);
        assert_eq!(cache.health().await.status, CacheStatus::Healthy);

        cache
            .insert_raw(Uuid::new_v4(), vec![], Duration::seconds(300))
            .await
            .unwrap();
        let health = cache.health().await;
        assert_eq!(health.status, CacheStatus::Degraded);
        assert_eq!(health.entries, 1);
    }
}
