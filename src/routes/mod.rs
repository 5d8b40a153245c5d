mod mastery;
mod selection;
mod sessions;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::response::{success, AppError};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/session-archive/:sessionId", get(archived_session))
        .nest("/api/mastery", mastery::router())
        .nest("/api/sessions", sessions::router())
        .nest("/api/selection", selection::router())
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    success(HealthResponse {
        status: "ok",
        uptime_seconds: state.uptime_seconds(),
    })
}

async fn archived_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions().archived_session(&session_id).await?;
    let Some(session) = session else {
        return Err(AppError::not_found(format!(
            "no archived session: {session_id}"
        )));
    };
    Ok(success(session))
}
