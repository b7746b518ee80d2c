use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::criteria::SearchCriteria;
use crate::offer::FlightOffer;

/// Uniform search capability every external data source exposes.
///
/// Adapters encapsulate their own retry/backoff; this layer never retries.
#[async_trait]
pub trait SearchAdapter: Send + Sync {
    /// Stable source identifier, unique within a registry
    fn id(&self) -> &str;

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<FlightOffer>, AdapterError>;

    async fn health_check(&self) -> AdapterHealth;
}

/// Typed failure from a single adapter call
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Source unreachable: {0}")]
    Unreachable(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Malformed upstream response: {0}")]
    Decode(String),
}

/// Read-only health snapshot for one source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterHealth {
    pub source: String,
    pub reachable: bool,
    pub last_latency_ms: Option<u64>,
}
