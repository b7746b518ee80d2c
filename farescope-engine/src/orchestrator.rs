use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use farescope_cache::{CacheStatus, DerivedKey, ResultCache};
use farescope_core::{
    default_sort, sort_offers, AdapterHealth, FlightFilters, FlightOffer, SearchCriteria,
    SearchEvent, SearchProgress, SearchStatus, SortKey, SortOrder, SourceError, SystemNotice,
};

use crate::publisher::ProgressPublisher;
use crate::registry::AdapterRegistry;
use crate::tracker::{Applied, ProgressTracker, SettlementOutcome};
use crate::{EngineError, EngineResult};

/// Engine-wide defaults; individual searches may override the per-call knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Admission ceiling on simultaneously non-terminal searches
    pub max_concurrent_searches: usize,
    /// Per-source deadline; the whole search finishes at latest one timeout
    /// after dispatch since fan-out is parallel
    pub search_timeout: StdDuration,
    pub cache_ttl: Duration,
    /// How long terminal progress records stay readable before eviction
    pub terminal_retention: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: 10,
            search_timeout: StdDuration::from_secs(10),
            cache_ttl: Duration::seconds(300),
            terminal_retention: Duration::seconds(600),
        }
    }
}

/// Caller-supplied per-search overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    pub search_timeout_ms: Option<u64>,
    pub cache_ttl_seconds: Option<i64>,
    pub max_concurrent_searches: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub search_id: Uuid,
    pub results: Vec<FlightOffer>,
    pub total_results: usize,
    pub search_time_ms: u64,
    pub sources: Vec<String>,
    /// False when sources were queried, true for pure cache transforms
    pub cached: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub active_searches: usize,
    pub adapters: Vec<AdapterHealth>,
    pub cache: farescope_cache::CacheHealth,
}

struct Settlement {
    source: String,
    outcome: SettlementOutcome,
}

/// Top-level driver: fans a search out across the registry, serializes
/// settlements into the tracker, emits publisher events, and aggregates into
/// the cache. Filter and sort are pure transforms over the cached views.
///
/// All collaborators are injected handles, so isolated orchestrator
/// instances can coexist (one per test, for example) without shared state.
pub struct SearchOrchestrator {
    registry: Arc<AdapterRegistry>,
    tracker: Arc<ProgressTracker>,
    publisher: Arc<ProgressPublisher>,
    cache: Arc<ResultCache>,
    config: EngineConfig,
}

impl SearchOrchestrator {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        tracker: Arc<ProgressTracker>,
        publisher: Arc<ProgressPublisher>,
        cache: Arc<ResultCache>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            tracker,
            publisher,
            cache,
            config,
        }
    }

    pub fn publisher(&self) -> &Arc<ProgressPublisher> {
        &self.publisher
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    /// Dispatch one logical search across the requested sources and wait for
    /// every source to settle (succeed, error, or time out). Per-source
    /// failures are aggregated as data; only validation, admission, and
    /// total dispatch failure reject the call.
    pub async fn search_flights(
        &self,
        criteria: SearchCriteria,
        sources: Option<&[String]>,
        options: SearchOptions,
    ) -> EngineResult<SearchResult> {
        let started = Instant::now();
        criteria.validate()?;
        let (timeout, ttl, ceiling) = self.resolve_options(&options)?;

        let source_ids = self
            .registry
            .resolve(sources)
            .await
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        // Admission control: reject before any record exists
        let active = self.tracker.active_count().await;
        if active >= ceiling {
            return Err(EngineError::ServiceUnavailable {
                active,
                limit: ceiling,
            });
        }

        let search_id = Uuid::new_v4();
        let estimated = Utc::now() + Duration::milliseconds(timeout.as_millis() as i64);
        self.tracker
            .create(SearchProgress::new(search_id, source_ids.len(), estimated))
            .await;

        let snapshot = match self
            .tracker
            .transition(search_id, SearchStatus::Searching)
            .await
        {
            Ok(snapshot) => snapshot,
            // Cancelled between creation and dispatch
            Err(_) => {
                let snapshot = self
                    .tracker
                    .snapshot(search_id)
                    .await
                    .ok_or_else(|| EngineError::NotFound(search_id))?;
                return Ok(self.result_from(&snapshot, source_ids, started, false));
            }
        };
        self.publisher
            .publish(search_id, SearchEvent::progress(&snapshot))
            .await;
        info!(
            "Search {} dispatched to {} sources ({} -> {})",
            search_id,
            source_ids.len(),
            criteria.origin,
            criteria.destination
        );

        // Fan out: one task per source, each racing its adapter call against
        // the per-source timer. Settlements funnel through a channel into
        // the single writer below.
        let (tx, mut rx) = mpsc::channel::<Settlement>(source_ids.len().max(1));
        let mut missing: Vec<String> = Vec::new();
        let mut dispatched = 0usize;

        for source in &source_ids {
            let Some(adapter) = self.registry.get(source).await else {
                missing.push(source.clone());
                continue;
            };
            dispatched += 1;
            let tx = tx.clone();
            let criteria = criteria.clone();
            let source = source.clone();
            tokio::spawn(async move {
                let outcome =
                    match tokio::time::timeout(timeout, adapter.search(&criteria)).await {
                        Ok(Ok(offers)) => SettlementOutcome::Offers(offers),
                        Ok(Err(err)) => {
                            SettlementOutcome::Failed(SourceError::adapter(&source, err.to_string()))
                        }
                        Err(_) => SettlementOutcome::Failed(SourceError::timeout(
                            &source,
                            timeout.as_millis(),
                        )),
                    };
                let _ = tx.send(Settlement { source, outcome }).await;
            });
        }
        drop(tx);

        if dispatched == 0 {
            // Total dispatch failure before any source attempt
            let _ = self.tracker.transition(search_id, SearchStatus::Failed).await;
            self.publisher
                .publish(
                    search_id,
                    SearchEvent::Failed {
                        search_id,
                        error: "no resolved source could be dispatched".to_string(),
                    },
                )
                .await;
            return Err(EngineError::Registry(
                "all resolved sources were deregistered before dispatch".to_string(),
            ));
        }

        // Sources that vanished between resolution and dispatch settle as
        // per-source errors through the same writer path
        for source in missing {
            let outcome = SettlementOutcome::Failed(SourceError::adapter(
                &source,
                "source deregistered before dispatch",
            ));
            if let Ok(Applied::Updated(snapshot)) = self
                .tracker
                .apply_settlement(search_id, &source, outcome)
                .await
            {
                self.publisher
                    .publish(search_id, SearchEvent::progress(&snapshot))
                    .await;
            }
        }

        // Single-writer drain: every settlement mutates the record under the
        // tracker's write guard and emits a progress event
        while let Some(settlement) = rx.recv().await {
            match self
                .tracker
                .apply_settlement(search_id, &settlement.source, settlement.outcome)
                .await
            {
                Ok(Applied::Updated(snapshot)) => {
                    self.publisher
                        .publish(search_id, SearchEvent::progress(&snapshot))
                        .await;
                    if snapshot.all_settled() {
                        break;
                    }
                }
                Ok(Applied::Discarded) => {
                    // The search turned terminal underneath us (cancelled);
                    // stop driving, leave in-flight tasks to drain into the
                    // tracker's late-settlement guard
                    debug!("Search {} terminal during drain, stopping", search_id);
                    break;
                }
                Err(e) => {
                    self.publisher
                        .publish(
                            search_id,
                            SearchEvent::Error {
                                search_id,
                                error: e.to_string(),
                            },
                        )
                        .await;
                    return Err(EngineError::System(e.to_string()));
                }
            }
        }

        let snapshot = self
            .tracker
            .snapshot(search_id)
            .await
            .ok_or_else(|| EngineError::System(format!("search {} record lost", search_id)))?;
        if snapshot.is_terminal() {
            return Ok(self.result_from(&snapshot, source_ids, started, false));
        }

        // A source task that died without settling (panicked adapter) still
        // counts against totality
        if !snapshot.all_settled() {
            let unsettled: Vec<String> = source_ids
                .iter()
                .filter(|s| !snapshot.completed_sources.contains(*s))
                .cloned()
                .collect();
            for source in unsettled {
                let outcome = SettlementOutcome::Failed(SourceError::adapter(
                    &source,
                    "source task aborted before settling",
                ));
                let _ = self
                    .tracker
                    .apply_settlement(search_id, &source, outcome)
                    .await;
            }
        }

        self.aggregate(search_id, source_ids, ttl, started).await
    }

    /// Merge, default-sort, cache, and complete a fully settled search
    async fn aggregate(
        &self,
        search_id: Uuid,
        source_ids: Vec<String>,
        ttl: Duration,
        started: Instant,
    ) -> EngineResult<SearchResult> {
        let snapshot = match self
            .tracker
            .transition(search_id, SearchStatus::Aggregating)
            .await
        {
            Ok(snapshot) => snapshot,
            // Cancellation won the race; report what was captured
            Err(_) => {
                let snapshot = self
                    .tracker
                    .snapshot(search_id)
                    .await
                    .ok_or_else(|| EngineError::NotFound(search_id))?;
                return Ok(self.result_from(&snapshot, source_ids, started, false));
            }
        };

        let mut merged = snapshot.results.clone();
        default_sort(&mut merged);

        if let Err(e) = self.cache.insert_raw(search_id, merged.clone(), ttl).await {
            self.publisher
                .publish(
                    search_id,
                    SearchEvent::Error {
                        search_id,
                        error: e.to_string(),
                    },
                )
                .await;
            return Err(EngineError::System(e.to_string()));
        }

        let snapshot = match self
            .tracker
            .transition(search_id, SearchStatus::Completed)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(_) => {
                let snapshot = self
                    .tracker
                    .snapshot(search_id)
                    .await
                    .ok_or_else(|| EngineError::NotFound(search_id))?;
                return Ok(self.result_from(&snapshot, source_ids, started, false));
            }
        };

        if merged.is_empty() {
            // Every source failed or returned nothing; still a completed
            // search with the failures listed as data
            warn!(
                "Search {} completed with no offers ({} source errors)",
                search_id,
                snapshot.errors.len()
            );
        } else {
            info!(
                "Search {} completed: {} offers from {} sources",
                search_id,
                merged.len(),
                snapshot.completed_sources.len()
            );
        }

        self.publisher
            .publish(
                search_id,
                SearchEvent::Completed {
                    search_id,
                    results: merged.clone(),
                    total_results: merged.len(),
                },
            )
            .await;

        Ok(SearchResult {
            search_id,
            total_results: merged.len(),
            results: merged,
            search_time_ms: started.elapsed().as_millis() as u64,
            sources: source_ids,
            cached: false,
        })
    }

    /// Pure transform over the cached raw view; no source is ever contacted
    pub async fn filter_search_results(
        &self,
        search_id: Uuid,
        filters: FlightFilters,
    ) -> EngineResult<SearchResult> {
        let started = Instant::now();
        let Some(raw) = self.cache.raw_view(search_id).await else {
            self.publisher
                .publish(search_id, SearchEvent::NotFound { search_id })
                .await;
            return Err(EngineError::NotFound(search_id));
        };

        let filtered = filters.apply(&raw);
        self.cache
            .insert_derived(
                search_id,
                DerivedKey::Filter(filters.cache_key()),
                filtered.clone(),
            )
            .await
            .map_err(|_| EngineError::NotFound(search_id))?;

        debug!(
            "Search {} filtered: {} of {} offers match",
            search_id,
            filtered.len(),
            raw.len()
        );
        self.publisher
            .publish(
                search_id,
                SearchEvent::Filtered {
                    search_id,
                    filters,
                    original_count: raw.len(),
                    filtered_count: filtered.len(),
                    results: filtered.clone(),
                },
            )
            .await;

        Ok(self.cached_result(search_id, filtered, started))
    }

    /// Stable sort over the latest derived view (filtered when present,
    /// otherwise raw); no source is ever contacted
    pub async fn sort_search_results(
        &self,
        search_id: Uuid,
        sort_by: Option<SortKey>,
        sort_order: Option<SortOrder>,
    ) -> EngineResult<SearchResult> {
        let started = Instant::now();
        let key = sort_by.unwrap_or_default();
        let order = sort_order.unwrap_or_default();

        let Some(mut view) = self.cache.latest_view(search_id).await else {
            self.publisher
                .publish(search_id, SearchEvent::NotFound { search_id })
                .await;
            return Err(EngineError::NotFound(search_id));
        };

        sort_offers(&mut view, key, order);
        self.cache
            .insert_derived(search_id, DerivedKey::Sort(key, order), view.clone())
            .await
            .map_err(|_| EngineError::NotFound(search_id))?;

        self.publisher
            .publish(
                search_id,
                SearchEvent::Sorted {
                    search_id,
                    sort_by: key,
                    sort_order: order,
                    results: view.clone(),
                },
            )
            .await;

        Ok(self.cached_result(search_id, view, started))
    }

    /// Idempotent cooperative cancellation. In-flight source calls are
    /// abandoned, not aborted; their settlements are discarded by the
    /// tracker's terminal guard.
    pub async fn cancel_search(&self, search_id: Uuid) -> bool {
        if self.tracker.cancel(search_id).await {
            info!("Search {} cancelled", search_id);
            self.publisher
                .publish(search_id, SearchEvent::Cancelled { search_id })
                .await;
            true
        } else {
            false
        }
    }

    pub async fn get_search_progress(&self, search_id: Uuid) -> Option<SearchProgress> {
        self.tracker.snapshot(search_id).await
    }

    pub async fn get_active_searches(&self) -> Vec<SearchProgress> {
        self.tracker.active().await
    }

    pub async fn health_check(&self) -> HealthReport {
        let adapters = self.registry.refresh_health().await;
        let cache = self.cache.health().await;
        let reachable = adapters.iter().filter(|a| a.reachable).count();

        let status = if adapters.is_empty() || reachable * 2 < adapters.len() {
            HealthStatus::Unhealthy
        } else if reachable < adapters.len() || cache.status == CacheStatus::Degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthReport {
            status,
            active_searches: self.tracker.active_count().await,
            adapters,
            cache,
        }
    }

    /// Sweep expired cache entries and evict terminal searches past the
    /// retention window, releasing their publisher rooms
    pub async fn run_maintenance(&self) {
        let swept = self.cache.sweep().await;
        let evicted = self.tracker.evict_terminal(self.config.terminal_retention).await;
        for search_id in &evicted {
            self.publisher.close(*search_id).await;
        }
        if swept > 0 || !evicted.is_empty() {
            debug!(
                "Maintenance: swept {} cache entries, evicted {} searches",
                swept,
                evicted.len()
            );
        }

        if self.cache.health().await.status == CacheStatus::Degraded {
            self.publisher
                .broadcast(SystemNotice::warning("result cache at capacity"));
        }
    }

    fn resolve_options(
        &self,
        options: &SearchOptions,
    ) -> EngineResult<(StdDuration, Duration, usize)> {
        if options.search_timeout_ms == Some(0) {
            return Err(EngineError::Validation(
                "search_timeout_ms must be positive".to_string(),
            ));
        }
        if matches!(options.cache_ttl_seconds, Some(ttl) if ttl <= 0) {
            return Err(EngineError::Validation(
                "cache_ttl_seconds must be positive".to_string(),
            ));
        }
        if options.max_concurrent_searches == Some(0) {
            return Err(EngineError::Validation(
                "max_concurrent_searches must be positive".to_string(),
            ));
        }

        let timeout = options
            .search_timeout_ms
            .map(StdDuration::from_millis)
            .unwrap_or(self.config.search_timeout);
        let ttl = options
            .cache_ttl_seconds
            .map(Duration::seconds)
            .unwrap_or(self.config.cache_ttl);
        let ceiling = options
            .max_concurrent_searches
            .unwrap_or(self.config.max_concurrent_searches);
        Ok((timeout, ttl, ceiling))
    }

    fn result_from(
        &self,
        snapshot: &SearchProgress,
        sources: Vec<String>,
        started: Instant,
        cached: bool,
    ) -> SearchResult {
        SearchResult {
            search_id: snapshot.search_id,
            results: snapshot.results.clone(),
            total_results: snapshot.results.len(),
            search_time_ms: started.elapsed().as_millis() as u64,
            sources,
            cached,
        }
    }

    fn cached_result(
        &self,
        search_id: Uuid,
        results: Vec<FlightOffer>,
        started: Instant,
    ) -> SearchResult {
        let mut sources: Vec<String> = results.iter().map(|o| o.source.clone()).collect();
        sources.sort();
        sources.dedup();
        SearchResult {
            search_id,
            total_results: results.len(),
            results,
            search_time_ms: started.elapsed().as_millis() as u64,
            sources,
            cached: true,
        }
    }
}

/// Periodic maintenance loop for a long-running orchestrator
pub fn spawn_maintenance(
    orchestrator: Arc<SearchOrchestrator>,
    every: StdDuration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            orchestrator.run_maintenance().await;
        }
    })
}
