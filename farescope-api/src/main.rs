use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use farescope_api::{app, state::AppState};
use farescope_cache::{spawn_sweeper, ResultCache};
use farescope_engine::{
    spawn_maintenance, AdapterRegistry, ProgressPublisher, ProgressTracker, SearchOrchestrator,
    StubFlightAdapter,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "farescope_api=debug,farescope_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = farescope_api::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Farescope API on port {}", config.server.port);

    // Supplier adapters
    let registry = Arc::new(AdapterRegistry::new());
    for adapter in &config.adapters {
        let stub = if adapter.failing {
            StubFlightAdapter::failing(&adapter.id, &adapter.airline, "configured to fail")
        } else {
            StubFlightAdapter::generating(
                &adapter.id,
                &adapter.airline,
                adapter.offers,
                adapter.base_price,
            )
        }
        .with_latency(Duration::from_millis(adapter.latency_ms))
        .with_jitter(Duration::from_millis(adapter.jitter_ms));
        registry.register(Arc::new(stub)).await;
    }
    registry.refresh_health().await;

    let cache = Arc::new(ResultCache::new(config.search.cache_max_entries));
    let orchestrator = Arc::new(SearchOrchestrator::new(
        registry,
        Arc::new(ProgressTracker::new()),
        Arc::new(ProgressPublisher::new()),
        cache.clone(),
        config.search.engine_config(),
    ));

    // Background sweeps: expired cache entries and terminal search records
    let sweep_interval = Duration::from_secs(config.search.sweep_interval_seconds);
    spawn_sweeper(cache, sweep_interval);
    spawn_maintenance(orchestrator.clone(), sweep_interval);

    let app_state = AppState { orchestrator };
    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
