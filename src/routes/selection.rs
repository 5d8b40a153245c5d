use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;

use crate::response::{success, AppError};
use crate::services::selector::SelectionRequest;
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/:userId/next", post(select_next))
}

async fn select_next(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    axum::Json(request): axum::Json<SelectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.selector().select_next(&user_id, &request).await?;
    Ok(success(outcome))
}
