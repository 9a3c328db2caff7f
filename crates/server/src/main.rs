use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use server_api::{list_stored, random_card, store_card, ApiContext};
use shared::{
    domain::Card,
    error::{ApiError, ErrorCode},
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod catalog;
mod config;

use catalog::build_card_source;
use config::load_settings;

/// A card body is three short strings.
const MAX_BODY_BYTES: usize = 16 * 1024;

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let database_url = settings.database_url.clone();
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let cards = build_card_source(settings.catalog_choice()?)?;

    let state = AppState {
        api: ApiContext { storage, cards },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/random-card", get(http_random_card))
        .route("/store", post(http_store_card))
        .route("/stored", get(http_list_stored))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    state.api.storage.health_check().await.map_err(|error| {
        warn!(%error, "health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok("ok")
}

async fn http_random_card(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Card>, (StatusCode, String)> {
    let card = random_card(&state.api).await.map_err(plain_error)?;
    Ok(Json(card))
}

async fn http_store_card(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Card>, JsonRejection>,
) -> Result<(StatusCode, String), (StatusCode, String)> {
    let Json(card) = payload.map_err(|rejection| {
        warn!(%rejection, "store: unreadable card body");
        plain_error(ApiError::validation())
    })?;
    let message = store_card(&state.api, card).await.map_err(plain_error)?;
    Ok((StatusCode::OK, message.to_string()))
}

async fn http_list_stored(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Card>>, (StatusCode, String)> {
    let cards = list_stored(&state.api).await.map_err(plain_error)?;
    Ok(Json(cards))
}

/// Rejections travel as plain text; clients match on the body.
fn plain_error(err: ApiError) -> (StatusCode, String) {
    let status = match err.code {
        ErrorCode::Duplicate => StatusCode::CONFLICT,
        ErrorCode::CapacityExceeded | ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Upstream => StatusCode::BAD_GATEWAY,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(code = ?err.code, message = %err.message, "request failed");
    }
    (status, err.message)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
