//! HTTP surface: the operator merge endpoint plus read-only views of the
//! history and the derived frequencies.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::{Router, extract::State};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::reconcile::Reconciler;
use crate::types::DrawFragment;

#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<Reconciler>,
}

#[derive(Deserialize)]
pub struct MergeRequest {
    #[serde(rename = "fragmentData")]
    fragment_data: Vec<DrawFragment>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/merge-lotto", post(merge_lotto))
        .route("/api/history", get(history))
        .route("/api/frequency", get(frequency))
        .with_state(state)
}

async fn merge_lotto(
    State(state): State<AppState>,
    Json(body): Json<MergeRequest>,
) -> impl IntoResponse {
    // Validation failures are client errors and must happen before any
    // store mutation; merge() re-checks, but by then we already answered.
    for fragment in &body.fragment_data {
        if let Err(e) = fragment.validate() {
            warn!("merge rejected: {e}");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            );
        }
    }

    match state.reconciler.merge(body.fragment_data).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "inserted": summary.inserted,
                "updated": summary.updated,
            })),
        ),
        Err(e) => {
            warn!("merge failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

async fn history(State(state): State<AppState>) -> impl IntoResponse {
    match state.reconciler.history().await {
        Ok(records) => (StatusCode::OK, Json(json!({ "draws": records }))),
        Err(e) => {
            warn!("history read failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

async fn frequency(State(state): State<AppState>) -> impl IntoResponse {
    match state.reconciler.frequencies().await {
        Ok(counts) => {
            // counts[0] belongs to ball 1
            let frequencies: Vec<_> = counts
                .iter()
                .enumerate()
                .map(|(i, &count)| json!({ "number": i + 1, "count": count }))
                .collect();
            (StatusCode::OK, Json(json!({ "frequencies": frequencies })))
        }
        Err(e) => {
            warn!("frequency read failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}
