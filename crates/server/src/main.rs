use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use shared::{
    domain::HistoryId,
    error::{ApiError, ErrorCode},
    protocol::{
        history_route, rephrase_route, HistoryEntry, MessageResponse, NewHistoryEntry,
        RephraseRequest, RephraseResult,
    },
};
use storage::Storage;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;
mod rephraser;

use api::ApiContext;
use app_state::AppState;
use config::{load_settings, prepare_database_url, Settings};
use rephraser::{ChatCompletionRephraser, Rephraser, UnconfiguredRephraser};

const MAX_REQUEST_BYTES: usize = 256 * 1024;
const BANNER: &str = "TextHumanizer API";

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        rephraser: build_rephraser(&settings)?,
        history_limit: settings.history_limit,
    };

    let app = build_router(Arc::new(AppState { api }), &settings.cors_origins);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, model = %settings.llm_model, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_rephraser(settings: &Settings) -> anyhow::Result<Arc<dyn Rephraser>> {
    match &settings.llm_api_key {
        Some(api_key) => Ok(Arc::new(ChatCompletionRephraser::new(
            &settings.llm_api_base,
            api_key,
            &settings.llm_model,
        )?)),
        None => {
            warn!("no LLM API key configured; rephrase requests will fail");
            Ok(Arc::new(UnconfiguredRephraser))
        }
    }
}

fn build_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api", get(banner))
        .route("/api/", get(banner))
        .route(rephrase_route(), post(http_rephrase))
        .route(
            history_route(),
            get(http_list_history).post(http_create_history),
        )
        .route("/api/history/:history_id", delete(http_delete_history))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(%origin, %error, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(parsed)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn into_response_error(err: ApiError) -> (StatusCode, Json<ApiError>) {
    (status_for(err.code), Json(err))
}

async fn healthz(
    State(state): State<Arc<AppState>>,
) -> Result<&'static str, (StatusCode, Json<ApiError>)> {
    state.api.storage.health_check().await.map_err(|e| {
        into_response_error(ApiError::new(ErrorCode::Unavailable, e.to_string()))
    })?;
    Ok("ok")
}

async fn banner() -> Json<MessageResponse> {
    Json(MessageResponse::new(BANNER))
}

async fn http_rephrase(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RephraseRequest>,
) -> ApiResult<RephraseResult> {
    api::rephrase(&state.api, req)
        .await
        .map(Json)
        .map_err(into_response_error)
}

async fn http_list_history(State(state): State<Arc<AppState>>) -> ApiResult<Vec<HistoryEntry>> {
    api::list_history(&state.api)
        .await
        .map(Json)
        .map_err(into_response_error)
}

async fn http_create_history(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewHistoryEntry>,
) -> ApiResult<HistoryEntry> {
    api::create_history(&state.api, req)
        .await
        .map(Json)
        .map_err(into_response_error)
}

async fn http_delete_history(
    State(state): State<Arc<AppState>>,
    Path(history_id): Path<String>,
) -> ApiResult<MessageResponse> {
    // Ids that are not UUIDs can never match a stored entry.
    let history_id: HistoryId = history_id
        .parse()
        .map_err(|_| into_response_error(api::not_found()))?;
    api::delete_history(&state.api, history_id)
        .await
        .map(Json)
        .map_err(into_response_error)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
