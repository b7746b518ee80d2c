use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use farescope_api::{app, AppState};
use farescope_cache::ResultCache;
use farescope_engine::{
    AdapterRegistry, EngineConfig, ProgressPublisher, ProgressTracker, SearchOrchestrator,
    StubFlightAdapter,
};

async fn test_app() -> axum::Router {
    let registry = Arc::new(AdapterRegistry::new());
    registry
        .register(Arc::new(StubFlightAdapter::generating("amadeus", "BA", 4, 21000)))
        .await;
    registry
        .register(Arc::new(StubFlightAdapter::generating("sabre", "AA", 3, 19500)))
        .await;

    let orchestrator = Arc::new(SearchOrchestrator::new(
        registry,
        Arc::new(ProgressTracker::new()),
        Arc::new(ProgressPublisher::new()),
        Arc::new(ResultCache::new(100)),
        EngineConfig::default(),
    ));
    app(AppState { orchestrator })
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["adapters"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_search_filter_round_trip() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/search",
            serde_json::json!({
                "origin": "JFK",
                "destination": "LHR",
                "departure_date": "2026-12-25",
                "passengers": 2
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["cached"], false);
    assert_eq!(body["total_results"], 7);
    let search_id = body["search_id"].as_str().unwrap().to_string();

    // Filter the cached set without touching the sources again
    let response = app
        .oneshot(post_json(
            &format!("/v1/search/{}/filter", search_id),
            serde_json::json!({ "price_max": 21000 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["cached"], true);
    assert!(body["total_results"].as_u64().unwrap() <= 7);
}

#[tokio::test]
async fn test_validation_and_missing_search_mapping() {
    let app = test_app().await;

    // Zero passengers fails structural validation
    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/search",
            serde_json::json!({
                "origin": "JFK",
                "destination": "LHR",
                "departure_date": "2026-12-25",
                "passengers": 0
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown search id maps to 404
    let response = app
        .oneshot(post_json(
            &format!("/v1/search/{}/sort", uuid::Uuid::new_v4()),
            serde_json::json!({ "sort_by": "price" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_is_idempotent_over_http() {
    let app = test_app().await;

    let unknown = uuid::Uuid::new_v4();
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/v1/search/{}", unknown))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["cancelled"], false);
}
