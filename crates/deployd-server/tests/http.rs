use std::sync::Arc;

use dashmap::DashMap;
use http_body_util::BodyExt;
use tower::ServiceExt;

use deployd_collections::{CollectionService, HookSources};
use deployd_pipeline::Pipeline;
use deployd_plugin::PluginManager;
use deployd_schema::{CollectionConfig, Property, PropertyType};
use deployd_script::ScriptCache;
use deployd_security::{AuthAdjudicator, TokenSigner};
use deployd_server::{build_router, AppState};
use deployd_storage::backends::SqliteStore;

async fn test_state() -> Arc<AppState> {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    let store = SqliteStore::new(pool, "todos");
    store.ensure_table().await.unwrap();

    let config = CollectionConfig::new("todos")
        .add_property(Property::new("title", PropertyType::String).required());
    let tmp = std::env::temp_dir().join("deployd-server-http-test");
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(ScriptCache::new()),
        Arc::new(PluginManager::new(tmp.join("plugins"), tmp.join("deployd-plugin"))),
    ));
    let service = Arc::new(CollectionService::new(
        config,
        Arc::new(store),
        pipeline,
        HookSources::new(),
    ));

    let collections = DashMap::new();
    collections.insert("todos".to_string(), service);

    let adjudicator = Arc::new(AuthAdjudicator::new(
        TokenSigner::new(TokenSigner::generate_secret(), "deployd", chrono::Duration::minutes(5)),
        "top-secret".to_string(),
    ));

    Arc::new(AppState {
        collections,
        adjudicator,
        dev_mode: true,
    })
}

#[tokio::test]
async fn post_then_list_round_trips_over_http() {
    let router = build_router(test_state().await);

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/todos")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(r#"{"title":"buy milk"}"#))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/todos")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_required_field_is_a_400() {
    let router = build_router(test_state().await);
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/todos")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{}"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_collection_is_a_404() {
    let router = build_router(test_state().await);
    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/ghosts")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn count_is_forbidden_without_root() {
    let router = build_router(test_state().await);
    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/todos/count")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn nested_suffix_segments_route_to_the_collection_by_id() {
    let router = build_router(test_state().await);

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/todos")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(r#"{"title":"buy milk"}"#))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let created: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let id = created["id"].as_str().unwrap();

    let request = axum::http::Request::builder()
        .method("GET")
        .uri(format!("/todos/{id}/nested/seg"))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}
