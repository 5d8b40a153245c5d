use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde::Deserialize;

use crate::response::{success, AppError};
use crate::services::mastery::LearningSignal;
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/:userId/summary", get(mastery_summary))
        .route("/:userId/weakest", get(weakest_concepts))
        .route("/:userId/strongest", get(strongest_concepts))
        .route("/:userId/due", get(due_concepts))
        .route("/:userId/signals", post(record_signal))
        .route(
            "/:userId/concepts/:conceptId",
            get(effective_mastery).delete(remove_concept),
        )
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

impl LimitQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(10).clamp(1, 50)
    }
}

async fn mastery_summary(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let summary = state.mastery().mastery_summary(&user_id).await?;
    Ok(success(summary))
}

async fn weakest_concepts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, AppError> {
    let concepts = state
        .mastery()
        .weakest_concepts(&user_id, query.limit())
        .await?;
    Ok(success(concepts))
}

async fn strongest_concepts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, AppError> {
    let concepts = state
        .mastery()
        .strongest_concepts(&user_id, query.limit())
        .await?;
    Ok(success(concepts))
}

async fn due_concepts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, AppError> {
    let concepts = state
        .mastery()
        .concepts_due_for_review(&user_id, query.limit())
        .await?;
    Ok(success(concepts))
}

async fn record_signal(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    axum::Json(signal): axum::Json<LearningSignal>,
) -> Result<impl IntoResponse, AppError> {
    if !signal.mastery_delta.is_finite() {
        return Err(AppError::bad_request("masteryDelta must be a finite number"));
    }
    let change = state.mastery().update_from_signal(&user_id, &signal).await?;
    Ok(success(change))
}

async fn effective_mastery(
    State(state): State<AppState>,
    Path((user_id, concept_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let effective = state.mastery().effective_mastery(&user_id, &concept_id).await?;
    let Some(effective) = effective else {
        return Err(AppError::not_found(format!(
            "no mastery record for concept: {concept_id}"
        )));
    };
    Ok(success(effective))
}

async fn remove_concept(
    State(state): State<AppState>,
    Path((user_id, concept_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    state.mastery().remove_mastery(&user_id, &concept_id).await?;
    Ok(success(serde_json::json!({ "removed": concept_id })))
}
