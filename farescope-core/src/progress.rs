use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::offer::FlightOffer;

/// Search lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStatus {
    Initializing,
    Searching,
    Aggregating,
    Completed,
    Failed,
    Cancelled,
}

impl SearchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchStatus::Completed | SearchStatus::Failed | SearchStatus::Cancelled
        )
    }

    /// Forward-only state machine. `Failed` is reserved for total dispatch
    /// failure before any source settles; `Cancelled` is reachable from every
    /// non-terminal state.
    pub fn can_transition(self, to: SearchStatus) -> bool {
        matches!(
            (self, to),
            (SearchStatus::Initializing, SearchStatus::Searching)
                | (SearchStatus::Initializing, SearchStatus::Failed)
                | (SearchStatus::Initializing, SearchStatus::Cancelled)
                | (SearchStatus::Searching, SearchStatus::Aggregating)
                | (SearchStatus::Searching, SearchStatus::Failed)
                | (SearchStatus::Searching, SearchStatus::Cancelled)
                | (SearchStatus::Aggregating, SearchStatus::Completed)
                | (SearchStatus::Aggregating, SearchStatus::Cancelled)
        )
    }
}

/// Why a single source failed to contribute results
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceErrorKind {
    Timeout,
    Adapter,
}

/// Per-source failure descriptor, captured as data rather than thrown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceError {
    pub source: String,
    pub kind: SourceErrorKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl SourceError {
    pub fn timeout(source: &str, limit_ms: u128) -> Self {
        Self {
            source: source.to_string(),
            kind: SourceErrorKind::Timeout,
            message: format!("No answer within {}ms", limit_ms),
            occurred_at: Utc::now(),
        }
    }

    pub fn adapter(source: &str, message: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            kind: SourceErrorKind::Adapter,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Live state of one logical search across all requested sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProgress {
    pub search_id: Uuid,
    pub status: SearchStatus,
    pub completed_sources: BTreeSet<String>,
    pub total_sources: usize,
    pub results: Vec<FlightOffer>,
    pub errors: Vec<SourceError>,
    pub started_at: DateTime<Utc>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SearchProgress {
    pub fn new(search_id: Uuid, total_sources: usize, estimated_completion: DateTime<Utc>) -> Self {
        Self {
            search_id,
            status: SearchStatus::Initializing,
            completed_sources: BTreeSet::new(),
            total_sources,
            results: Vec::new(),
            errors: Vec::new(),
            started_at: Utc::now(),
            estimated_completion: Some(estimated_completion),
            finished_at: None,
        }
    }

    /// Completion fraction, always derived from the authoritative counts
    pub fn progress(&self) -> f64 {
        if self.total_sources == 0 {
            0.0
        } else {
            self.completed_sources.len() as f64 / self.total_sources as f64
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn all_settled(&self) -> bool {
        self.completed_sources.len() == self.total_sources
    }

    /// Advance the status, enforcing the forward-only state machine
    pub fn transition(&mut self, to: SearchStatus) -> Result<(), ProgressError> {
        if !self.status.can_transition(to) {
            return Err(ProgressError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        if to.is_terminal() {
            self.estimated_completion = None;
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("Search not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: SearchStatus, to: SearchStatus },
}
