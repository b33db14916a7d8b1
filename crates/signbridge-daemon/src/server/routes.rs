//! HTTP routes for the webhook gateway.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use signbridge_core::Config;

use crate::overrides::{ActiveView, OverrideRegistry, OverrideReport, OverrideRequest};

use super::dispatch::Dispatcher;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<OverrideRegistry>,
}

/// Build the gateway router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/override", post(override_hook))
        .route("/status", get(status))
        .route("/healthz", get(healthz))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// `POST /override` — accept an alert and hand it to its sign's worker.
///
/// The response only reflects request-shape validity; it is sent as soon
/// as the payload validates, long before the override itself finishes.
/// Outcomes are reported on `/status` and in the logs.
async fn override_hook(
    State(state): State<AppState>,
    payload: Result<Json<OverrideRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Invalid override request: {rejection}"),
            )
                .into_response();
        }
    };

    if request.sign_id.is_empty() || request.message_type.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "sign and type must be non-empty",
        )
            .into_response();
    }
    if request.duration_secs == 0 {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "duration must be a positive number of seconds",
        )
            .into_response();
    }
    if state.config.sign(&request.sign_id).is_none() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("unknown sign {:?}", request.sign_id),
        )
            .into_response();
    }

    info!(
        sign_id = %request.sign_id,
        message_type = %request.message_type,
        duration_secs = request.duration_secs,
        "Override request accepted"
    );
    match state.dispatcher.dispatch(request).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

#[derive(Serialize)]
struct StatusResponse {
    active: Vec<ActiveView>,
    recent: Vec<OverrideReport>,
}

/// `GET /status` — active overrides and most recent outcomes, per sign.
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        active: state.registry.active_snapshot().await,
        recent: state.registry.report_snapshot().await,
    })
}

/// `GET /healthz`
async fn healthz() -> &'static str {
    "ok"
}
