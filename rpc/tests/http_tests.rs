//! Handler tests driven through the router with tower's oneshot.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use ballot_coordinator::{Coordinator, CoordinatorConfig, EventFeed, Roster};
use ballot_replication::spawn_replica_set;
use ballot_rpc::{router, AppState};
use ballot_types::Timestamp;
use serde_json::{json, Value};
use tower::util::ServiceExt;

fn app() -> Router {
    let config = CoordinatorConfig {
        replica_call_timeout_ms: 500,
        ..Default::default()
    };
    let manager = spawn_replica_set(
        config.replica_count,
        config.replica_call_timeout(),
        config.quorum_policy(),
    );
    let feed = Arc::new(EventFeed::new(config.event_feed_capacity));
    let coordinator = Coordinator::new(
        &config,
        Roster::demo(),
        manager,
        vec![Box::new(Arc::clone(&feed))],
    )
    .expect("demo roster is valid");
    router(AppState {
        coordinator: Arc::new(coordinator),
        feed,
    })
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

fn far_deadline_ms() -> u64 {
    Timestamp::now().offset_by(60_000).as_millis()
}

#[tokio::test]
async fn status_starts_pending() {
    let app = app();
    let (status, body) = send(&app, get("/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["results_published"], false);
}

#[tokio::test]
async fn full_voting_flow_over_http() {
    let app = app();
    let deadline = far_deadline_ms();

    let (status, body) =
        send(&app, post("/admin/session/start", json!({ "deadline_ms": deadline }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");

    let click = Timestamp::now().as_millis();
    let (status, body) = send(
        &app,
        post(
            "/vote",
            json!({ "voter_id": 1, "candidate": "Candidate A", "click_time_ms": click }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "accepted");
    assert_eq!(body["accepted"], true);

    // The tally is unavailable until results are published.
    let (status, _) = send(&app, get("/tally")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, post_empty("/admin/session/stop")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, post_empty("/admin/session/publish")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counts"]["Candidate A"], 1);
    assert_eq!(body["outcome"], json!({ "winner": "Candidate A" }));

    let (status, body) = send(&app, get("/tally")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counts"]["Candidate A"], 1);
}

#[tokio::test]
async fn rejected_votes_report_their_outcome() {
    let app = app();
    send(
        &app,
        post("/admin/session/start", json!({ "deadline_ms": far_deadline_ms() })),
    )
    .await;

    let click = Timestamp::now().as_millis();
    let (status, body) = send(
        &app,
        post(
            "/vote",
            json!({ "voter_id": 1, "candidate": "Candidate Z", "click_time_ms": click }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "unknown_candidate");
    assert_eq!(body["accepted"], false);
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn malformed_vote_body_is_rejected() {
    let app = app();
    let (status, _) = send(&app, post("/vote", json!({ "voter_id": 1 }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn admin_transitions_out_of_order_conflict() {
    let app = app();
    let (status, body) = send(&app, post_empty("/admin/session/stop")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap_or_default().contains("invalid session transition"));
}

#[tokio::test]
async fn replicas_and_events_are_exposed() {
    let app = app();
    send(
        &app,
        post("/admin/session/start", json!({ "deadline_ms": far_deadline_ms() })),
    )
    .await;
    let click = Timestamp::now().as_millis();
    send(
        &app,
        post(
            "/vote",
            json!({ "voter_id": 2, "candidate": "Candidate B", "click_time_ms": click }),
        ),
    )
    .await;

    let (status, body) = send(&app, get("/replicas")).await;
    assert_eq!(status, StatusCode::OK);
    let replicas = body["replicas"].as_array().expect("array");
    assert_eq!(replicas.len(), 2);
    assert!(replicas.iter().all(|r| r["healthy"] == true));

    let (status, body) = send(&app, get("/events")).await;
    assert_eq!(status, StatusCode::OK);
    let events = body["events"].as_array().expect("array");
    assert!(events.iter().any(|e| e["kind"] == "vote_accepted"));
}

#[tokio::test]
async fn rollover_reports_the_new_session_id() {
    let app = app();
    let (status, body) = send(&app, post_empty("/admin/session/new")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], 2);

    let (_, body) = send(&app, get("/history")).await;
    assert_eq!(body["sessions"].as_array().expect("array").len(), 1);
}
