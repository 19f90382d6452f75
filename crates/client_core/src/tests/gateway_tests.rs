use super::*;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode as AxumStatus,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use shared::{
    domain::Tone,
    error::{ApiError, ErrorCode},
    metrics::measure,
};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct StubState {
    entries: Arc<Mutex<Vec<HistoryEntry>>>,
}

async fn handle_rephrase(
    Json(req): Json<RephraseRequest>,
) -> Result<Json<RephraseResult>, (AxumStatus, Json<ApiError>)> {
    if req.text == "explode" {
        return Err((
            AxumStatus::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(
                ErrorCode::Internal,
                "Failed to rephrase text: engine offline",
            )),
        ));
    }
    let rephrased_text = format!("{} (rephrased)", req.text);
    let stats = measure(&rephrased_text);
    Ok(Json(RephraseResult {
        rephrased_text,
        original_text: req.text,
        tone: req.tone,
        word_count: stats.words,
        char_count: stats.chars,
    }))
}

async fn handle_list(State(state): State<StubState>) -> Json<Vec<HistoryEntry>> {
    let mut entries = state.entries.lock().await.clone();
    entries.reverse();
    Json(entries)
}

async fn handle_create(
    State(state): State<StubState>,
    Json(req): Json<NewHistoryEntry>,
) -> Json<HistoryEntry> {
    let entry = HistoryEntry {
        id: HistoryId::new_v4(),
        original_text: req.original_text,
        rephrased_text: req.rephrased_text,
        tone: req.tone,
        timestamp: Utc::now(),
    };
    state.entries.lock().await.push(entry.clone());
    Json(entry)
}

async fn handle_delete(
    State(state): State<StubState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, (AxumStatus, Json<serde_json::Value>)> {
    let mut entries = state.entries.lock().await;
    let before = entries.len();
    entries.retain(|entry| entry.id.to_string() != id);
    if entries.len() == before {
        return Err((
            AxumStatus::NOT_FOUND,
            Json(serde_json::json!({ "detail": "History item not found" })),
        ));
    }
    Ok(Json(serde_json::json!({ "message": "History item deleted" })))
}

async fn handle_broken_list() -> (AxumStatus, Json<serde_json::Value>) {
    (
        AxumStatus::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "detail": "Failed to fetch history" })),
    )
}

async fn spawn_stub_server(router: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}/")
}

async fn spawn_history_server() -> String {
    let app = Router::new()
        .route("/api/rephrase", post(handle_rephrase))
        .route("/api/history", get(handle_list).post(handle_create))
        .route("/api/history/:id", delete(handle_delete))
        .with_state(StubState::default());
    spawn_stub_server(app).await
}

fn gateway(server_url: &str) -> HttpGateway {
    HttpGateway::new(server_url, Duration::from_secs(5)).expect("gateway")
}

#[tokio::test]
async fn submit_rephrase_returns_service_result() {
    let server_url = spawn_history_server().await;
    let gateway = gateway(&server_url);
    let request = RephraseRequest::new("The cat sat.", Tone::Formal).expect("request");

    let result = gateway.submit_rephrase(&request).await.expect("rephrase");
    assert_eq!(result.rephrased_text, "The cat sat. (rephrased)");
    assert_eq!(result.tone, Tone::Formal);
    assert_eq!(result.word_count, 4);
}

#[tokio::test]
async fn non_success_status_maps_to_service_error_with_message() {
    let server_url = spawn_history_server().await;
    let gateway = gateway(&server_url);
    let request = RephraseRequest::new("explode", Tone::Creative).expect("request");

    let err = gateway
        .submit_rephrase(&request)
        .await
        .expect_err("must fail");
    assert_eq!(
        err,
        GatewayError::Service {
            status: 500,
            message: "Failed to rephrase text: engine offline".into(),
        }
    );
}

#[tokio::test]
async fn fastapi_style_detail_bodies_are_understood() {
    let app = Router::new().route("/api/history", get(handle_broken_list));
    let server_url = spawn_stub_server(app).await;

    let err = gateway(&server_url)
        .list_history()
        .await
        .expect_err("must fail");
    assert_eq!(
        err,
        GatewayError::Service {
            status: 500,
            message: "Failed to fetch history".into(),
        }
    );
}

#[tokio::test]
async fn create_list_and_delete_history_round_trip() {
    let server_url = spawn_history_server().await;
    let gateway = gateway(&server_url);

    let first = gateway
        .create_history_entry(&NewHistoryEntry {
            original_text: "one".into(),
            rephrased_text: "uno".into(),
            tone: Tone::Academic,
        })
        .await
        .expect("create");
    let second = gateway
        .create_history_entry(&NewHistoryEntry {
            original_text: "two".into(),
            rephrased_text: "dos".into(),
            tone: Tone::Conversational,
        })
        .await
        .expect("create");

    let listed = gateway.list_history().await.expect("list");
    let ids: Vec<_> = listed.iter().map(|entry| entry.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    gateway.delete_history_entry(first.id).await.expect("delete");
    let listed = gateway.list_history().await.expect("list");
    assert_eq!(listed, vec![second]);
}

#[tokio::test]
async fn deleting_unknown_id_is_not_found() {
    let server_url = spawn_history_server().await;
    let id = HistoryId::new_v4();
    let err = gateway(&server_url)
        .delete_history_entry(id)
        .await
        .expect_err("must fail");
    assert_eq!(err, GatewayError::NotFound(id));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = gateway(&format!("http://{addr}"))
        .list_history()
        .await
        .expect_err("must fail");
    assert!(matches!(err, GatewayError::Transport(_)), "unexpected: {err:?}");
}

#[test]
fn rejects_malformed_server_url() {
    let err = HttpGateway::new("not a url", Duration::from_secs(1))
        .err()
        .expect("must fail");
    assert!(matches!(err, GatewayError::Transport(_)));
}

#[test]
fn endpoint_joins_without_double_slash() {
    let gateway = gateway("http://127.0.0.1:8001/");
    assert_eq!(gateway.server_url(), "http://127.0.0.1:8001");
    assert_eq!(
        gateway.endpoint(rephrase_route()),
        "http://127.0.0.1:8001/api/rephrase"
    );
}
