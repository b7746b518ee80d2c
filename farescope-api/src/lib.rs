use axum::{
    http::Method,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod app_config;
pub mod error;
pub mod search;
pub mod state;
pub mod stream;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .route("/v1/search", post(search::search_flights))
        .route("/v1/search/active", get(search::active_searches))
        .route("/v1/search/{id}", delete(search::cancel_search))
        .route("/v1/search/{id}/filter", post(search::filter_results))
        .route("/v1/search/{id}/sort", post(search::sort_results))
        .route("/v1/search/{id}/progress", get(search::search_progress))
        .route("/v1/search/{id}/stream", get(stream::search_stream))
        .route("/v1/stream", get(stream::system_stream))
        .route("/v1/health", get(search::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
