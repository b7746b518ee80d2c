use std::collections::HashMap;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use farescope_core::{
    FlightOffer, ProgressError, SearchProgress, SearchStatus, SourceError,
};

/// How one source's task settled
#[derive(Debug)]
pub enum SettlementOutcome {
    Offers(Vec<FlightOffer>),
    Failed(SourceError),
}

/// Result of applying a settlement to a search record
#[derive(Debug)]
pub enum Applied {
    Updated(SearchProgress),
    /// The search was already terminal or the source already settled; the
    /// record was left untouched
    Discarded,
}

/// Shared per-search state store. Every mutation for a given search id runs
/// inside a single write guard, so concurrent settlement callbacks are
/// serialized and cannot interleave. Reads return snapshot clones.
pub struct ProgressTracker {
    searches: RwLock<HashMap<Uuid, SearchProgress>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            searches: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, progress: SearchProgress) {
        self.searches
            .write()
            .await
            .insert(progress.search_id, progress);
    }

    /// Advance a search's status, enforcing the forward-only state machine
    pub async fn transition(
        &self,
        search_id: Uuid,
        to: SearchStatus,
    ) -> Result<SearchProgress, ProgressError> {
        let mut searches = self.searches.write().await;
        let progress = searches
            .get_mut(&search_id)
            .ok_or(ProgressError::NotFound(search_id))?;
        progress.transition(to)?;
        Ok(progress.clone())
    }

    /// Apply one source settlement. Late settlements (the search turned
    /// terminal first) and duplicate settlements are discarded without
    /// mutating the record.
    pub async fn apply_settlement(
        &self,
        search_id: Uuid,
        source: &str,
        outcome: SettlementOutcome,
    ) -> Result<Applied, ProgressError> {
        let mut searches = self.searches.write().await;
        let progress = searches
            .get_mut(&search_id)
            .ok_or(ProgressError::NotFound(search_id))?;

        if progress.is_terminal() {
            debug!(
                "Discarding late settlement from {} for terminal search {}",
                source, search_id
            );
            return Ok(Applied::Discarded);
        }
        if progress.completed_sources.contains(source) {
            debug!(
                "Discarding duplicate settlement from {} for search {}",
                source, search_id
            );
            return Ok(Applied::Discarded);
        }

        match outcome {
            SettlementOutcome::Offers(mut offers) => progress.results.append(&mut offers),
            SettlementOutcome::Failed(error) => progress.errors.push(error),
        }
        progress.completed_sources.insert(source.to_string());
        Ok(Applied::Updated(progress.clone()))
    }

    /// Idempotent cancellation: true only on the non-terminal -> cancelled
    /// edge; terminal or unknown searches return false
    pub async fn cancel(&self, search_id: Uuid) -> bool {
        let mut searches = self.searches.write().await;
        match searches.get_mut(&search_id) {
            Some(progress) if !progress.is_terminal() => {
                // Every non-terminal state may transition to Cancelled
                progress
                    .transition(SearchStatus::Cancelled)
                    .is_ok()
            }
            _ => false,
        }
    }

    pub async fn snapshot(&self, search_id: Uuid) -> Option<SearchProgress> {
        self.searches.read().await.get(&search_id).cloned()
    }

    /// All non-terminal searches, oldest first
    pub async fn active(&self) -> Vec<SearchProgress> {
        let mut active: Vec<SearchProgress> = self
            .searches
            .read()
            .await
            .values()
            .filter(|p| !p.is_terminal())
            .cloned()
            .collect();
        active.sort_by_key(|p| p.started_at);
        active
    }

    pub async fn active_count(&self) -> usize {
        self.searches
            .read()
            .await
            .values()
            .filter(|p| !p.is_terminal())
            .count()
    }

    pub async fn remove(&self, search_id: Uuid) -> bool {
        self.searches.write().await.remove(&search_id).is_some()
    }

    /// Evict terminal searches past the retention window; returns the ids so
    /// callers can release dependent resources (publisher rooms)
    pub async fn evict_terminal(&self, retention: Duration) -> Vec<Uuid> {
        let now = Utc::now();
        let mut searches = self.searches.write().await;
        let expired: Vec<Uuid> = searches
            .values()
            .filter(|p| {
                p.is_terminal()
                    && p.finished_at
                        .map(|finished| finished + retention < now)
                        .unwrap_or(false)
            })
            .map(|p| p.search_id)
            .collect();
        for id in &expired {
            searches.remove(id);
        }
        expired
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
