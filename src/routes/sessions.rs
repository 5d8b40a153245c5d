use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};

use crate::response::{success, AppError};
use crate::services::sessions::{AnswerInput, QuestionDraft, SessionConfig, TestSession};
use crate::services::summary::TestSessionSummary;
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/:userId/start", post(start_session))
        .route("/:userId/active", get(active_session))
        .route("/:userId/questions", post(add_question))
        .route("/:userId/questions/current", get(current_question))
        .route("/:userId/answers", post(record_answer))
        .route("/:userId/pause", post(pause_session))
        .route("/:userId/resume", post(resume_session))
        .route("/:userId/complete", post(complete_session))
        .route("/:userId/abandon", post(abandon_session))
        .route("/:userId/history", get(session_history))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionProgress {
    is_complete: bool,
    #[serde(flatten)]
    session: TestSession,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletedSession {
    session: TestSession,
    summary: TestSessionSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AbandonedResponse {
    abandoned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn start_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    axum::Json(config): axum::Json<SessionConfig>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions().start_session(&user_id, config).await?;
    Ok((StatusCode::CREATED, success(session)))
}

async fn active_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions().active_session(&user_id).await?;
    let progress = session.map(|session| SessionProgress {
        is_complete: session.is_complete(),
        session,
    });
    Ok(success(progress))
}

async fn add_question(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    axum::Json(draft): axum::Json<QuestionDraft>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions().add_question(&user_id, draft).await?;
    Ok(success(session))
}

async fn current_question(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let question = state.sessions().current_question(&user_id).await?;
    Ok(success(question))
}

async fn record_answer(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    axum::Json(input): axum::Json<AnswerInput>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions().record_answer(&user_id, input).await?;
    Ok(success(SessionProgress {
        is_complete: session.is_complete(),
        session,
    }))
}

async fn pause_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions().pause_session(&user_id).await?;
    Ok(success(session))
}

async fn resume_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions().resume_session(&user_id).await?;
    Ok(success(session))
}

async fn complete_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (session, summary) = state.sessions().complete_session(&user_id).await?;
    Ok(success(CompletedSession { session, summary }))
}

async fn abandon_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let abandoned = state.sessions().abandon_session(&user_id).await?;
    Ok(success(AbandonedResponse {
        abandoned: abandoned.is_some(),
        session_id: abandoned.map(|session| session.session_id),
    }))
}

async fn session_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let ids = state
        .sessions()
        .session_history(&user_id, query.limit.unwrap_or(20))
        .await?;
    Ok(success(ids))
}
