//! The thin admin HTTP surface: `GetHealth`, transaction lookup, a manual advance trigger for
//! operators, and the Prometheus `/metrics` scrape endpoint. Unversioned and intentionally
//! minimal — a deployable coordinator needs *some* way to be observed and nudged, not a
//! stable wire contract.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tcc_base::{CoreMetrics, TxStore};
use tcc_core::CoordinatorError;

use crate::tx_manager::TxManager;

struct AppState<S: TxStore> {
    tx_manager: Arc<TxManager<S>>,
    metrics: Arc<CoreMetrics>,
}

/// Build the admin router over a running [`TxManager`].
pub fn routes<S: TxStore + 'static>(
    tx_manager: Arc<TxManager<S>>,
    metrics: Arc<CoreMetrics>,
) -> Router {
    let state = Arc::new(AppState { tx_manager, metrics });
    Router::new()
        .route("/health", get(health::<S>))
        .route("/tx/:id", get(get_tx::<S>))
        .route("/tx/:id/advance", post(advance::<S>))
        .route("/metrics", get(metrics_handler::<S>))
        .with_state(state)
}

async fn health<S: TxStore + 'static>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse {
    Json(state.tx_manager.health())
}

async fn get_tx<S: TxStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<u64>,
) -> Response {
    match state.tx_manager.get_tx(id).await {
        Ok(tx) => Json(tx).into_response(),
        Err(CoordinatorError::TransactionNotFound { .. }) => StatusCode::NOT_FOUND.into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn advance<S: TxStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<u64>,
) -> StatusCode {
    let tx_manager = state.tx_manager.clone();
    tokio::spawn(async move {
        if let Err(err) = tx_manager.advance_transaction_progress(id).await {
            tracing::warn!(tx_id = id, %err, "manual advance request failed");
        }
    });
    StatusCode::ACCEPTED
}

async fn metrics_handler<S: TxStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Response {
    match state.metrics.gather() {
        Ok(body) => ([("content-type", "text/plain; charset=utf-8")], body).into_response(),
        Err(err) => {
            tracing::error!(%err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
