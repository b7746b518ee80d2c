use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filters::{FlightFilters, SortKey, SortOrder};
use crate::offer::FlightOffer;
use crate::progress::{SearchProgress, SearchStatus, SourceError};

/// Push event delivered to per-search subscribers.
///
/// Delivery is at-most-once and best-effort; missed events are reconciled by
/// reading the search progress snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchEvent {
    Progress {
        search_id: Uuid,
        status: SearchStatus,
        progress: f64,
        completed_sources: BTreeSet<String>,
        total_sources: usize,
        results_count: usize,
        errors: Vec<SourceError>,
        estimated_completion: Option<DateTime<Utc>>,
    },
    Completed {
        search_id: Uuid,
        results: Vec<FlightOffer>,
        total_results: usize,
    },
    Failed {
        search_id: Uuid,
        error: String,
    },
    Filtered {
        search_id: Uuid,
        filters: FlightFilters,
        original_count: usize,
        filtered_count: usize,
        results: Vec<FlightOffer>,
    },
    Sorted {
        search_id: Uuid,
        sort_by: SortKey,
        sort_order: SortOrder,
        results: Vec<FlightOffer>,
    },
    Cancelled {
        search_id: Uuid,
    },
    NotFound {
        search_id: Uuid,
    },
    Error {
        search_id: Uuid,
        error: String,
    },
}

impl SearchEvent {
    /// Snapshot of a progress record as a push event
    pub fn progress(p: &SearchProgress) -> Self {
        SearchEvent::Progress {
            search_id: p.search_id,
            status: p.status,
            progress: p.progress(),
            completed_sources: p.completed_sources.clone(),
            total_sources: p.total_sources,
            results_count: p.results.len(),
            errors: p.errors.clone(),
            estimated_completion: p.estimated_completion,
        }
    }

    /// Wire name, used as the SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            SearchEvent::Progress { .. } => "progress",
            SearchEvent::Completed { .. } => "completed",
            SearchEvent::Failed { .. } => "failed",
            SearchEvent::Filtered { .. } => "filtered",
            SearchEvent::Sorted { .. } => "sorted",
            SearchEvent::Cancelled { .. } => "cancelled",
            SearchEvent::NotFound { .. } => "not_found",
            SearchEvent::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Critical,
}

/// System-wide notice, broadcast to all connected clients independently of
/// per-search subscriptions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemNotice {
    pub level: NoticeLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl SystemNotice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = SearchEvent::Cancelled {
            search_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "cancelled");
        assert_eq!(
            json["search_id"],
            "00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(event.name(), "cancelled");
    }

    #[test]
    fn test_progress_event_derives_fraction() {
        let mut p = SearchProgress::new(Uuid::new_v4(), 2, Utc::now());
        p.completed_sources.insert("amadeus".to_string());

        match SearchEvent::progress(&p) {
            SearchEvent::Progress {
                progress,
                total_sources,
                ..
            } => {
                assert_eq!(progress, 0.5);
                assert_eq!(total_sources, 2);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
