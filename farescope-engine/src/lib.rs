pub mod orchestrator;
pub mod publisher;
pub mod registry;
pub mod stub;
pub mod tracker;

pub use orchestrator::{
    spawn_maintenance, EngineConfig, HealthReport, HealthStatus, SearchOptions, SearchOrchestrator,
    SearchResult,
};
pub use publisher::ProgressPublisher;
pub use registry::{AdapterRegistry, RegistryError};
pub use stub::StubFlightAdapter;
pub use tracker::{Applied, ProgressTracker, SettlementOutcome};

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Search {0} not found or expired")]
    NotFound(Uuid),

    #[error("Too many concurrent searches: {active} active, limit {limit}")]
    ServiceUnavailable { active: usize, limit: usize },

    #[error("Adapter registry error: {0}")]
    Registry(String),

    #[error("Internal engine error: {0}")]
    System(String),
}

impl From<farescope_core::CriteriaError> for EngineError {
    fn from(err: farescope_core::CriteriaError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
