//! HTTP-level tests against the full router, exercising the dispatcher's
//! status-code priority rules on top of the engine tests' coverage of
//! cache coherence.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use travel_graph_store::engine::Engine;
use travel_graph_store::handlers::dispatch;
use travel_graph_store::heartbeat::QueryCounter;
use travel_graph_store::state::AppState;
use travel_graph_store::time_util::AgeCutoffTable;

fn build_app() -> Router {
    let engine = Arc::new(Engine::with_dense_capacities(64, 64, 64));
    let ages = Arc::new(AgeCutoffTable::new(chrono::Utc::now()));
    let queries = QueryCounter::new();
    let state = AppState::new(engine, ages, queries);
    Router::new().fallback(dispatch).with_state(state)
}

async fn send(app: &Router, method: &str, path: &str, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn create_then_get_round_trips() {
    let app = build_app();
    let (status, _) = send(
        &app,
        "POST",
        "/users/new",
        r#"{"id":1,"email":"a@b.c","first_name":"A","last_name":"B","gender":"m","birth_date":0}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/users/1", "").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"email\":\"a@b.c\""));
}

#[tokio::test]
async fn duplicate_id_on_create_is_bad_request() {
    let app = build_app();
    let payload = r#"{"id":1,"email":"a@b.c","first_name":"A","last_name":"B","gender":"m","birth_date":0}"#;
    let (first, _) = send(&app, "POST", "/users/new", payload).await;
    assert_eq!(first, StatusCode::OK);
    let (second, _) = send(&app, "POST", "/users/new", payload).await;
    assert_eq!(second, StatusCode::BAD_REQUEST);
}

/// S6 — update with id field is rejected, and existing user is untouched.
#[tokio::test]
async fn update_with_id_field_is_rejected() {
    let app = build_app();
    send(
        &app,
        "POST",
        "/users/new",
        r#"{"id":1,"email":"a@b.c","first_name":"A","last_name":"B","gender":"m","birth_date":0}"#,
    )
    .await;

    let (status, _) = send(&app, "POST", "/users/1", r#"{"id":2,"email":"x@y.z"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", "/users/1", "").await;
    assert!(body.contains("\"email\":\"a@b.c\""));
}

#[tokio::test]
async fn update_on_missing_id_is_not_found_even_with_id_field() {
    let app = build_app();
    let (status, _) = send(&app, "POST", "/users/999", r#"{"id":2,"email":"x@y.z"}"#).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_on_unknown_id_is_not_found() {
    let app = build_app();
    let (status, _) = send(&app, "GET", "/users/42", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_entity_is_bad_request() {
    let app = build_app();
    let (status, _) = send(&app, "GET", "/widgets/1", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_action_is_bad_request() {
    let app = build_app();
    send(
        &app,
        "POST",
        "/users/new",
        r#"{"id":1,"email":"a@b.c","first_name":"A","last_name":"B","gender":"m","birth_date":0}"#,
    )
    .await;
    let (status, _) = send(&app, "GET", "/users/1/unknown-action", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn user_visits_timeline_endpoint() {
    let app = build_app();
    send(
        &app,
        "POST",
        "/users/new",
        r#"{"id":1,"email":"a@b.c","first_name":"A","last_name":"B","gender":"m","birth_date":0}"#,
    )
    .await;
    send(
        &app,
        "POST",
        "/locations/new",
        r#"{"id":10,"place":"A","country":"C1","city":"City","distance":5}"#,
    )
    .await;
    send(&app, "POST", "/visits/new", r#"{"id":100,"location":10,"user":1,"visited_at":200,"mark":0}"#).await;
    send(&app, "POST", "/visits/new", r#"{"id":101,"location":10,"user":1,"visited_at":100,"mark":0}"#).await;

    let (status, body) = send(&app, "GET", "/users/1/visits", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        r#"{"visits":[{"mark":0,"visited_at":100,"place":"A"},{"mark":0,"visited_at":200,"place":"A"}]}"#
    );
}

#[tokio::test]
async fn location_avg_endpoint_defaults_to_zero_when_empty() {
    let app = build_app();
    send(
        &app,
        "POST",
        "/locations/new",
        r#"{"id":10,"place":"A","country":"C1","city":"City","distance":5}"#,
    )
    .await;
    let (status, body) = send(&app, "GET", "/locations/10/avg", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"avg":0.00000}"#);
}

#[tokio::test]
async fn malformed_query_parameter_is_bad_request() {
    let app = build_app();
    send(
        &app,
        "POST",
        "/users/new",
        r#"{"id":1,"email":"a@b.c","first_name":"A","last_name":"B","gender":"m","birth_date":0}"#,
    )
    .await;
    let (status, _) = send(&app, "GET", "/users/1/visits?fromDate", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
