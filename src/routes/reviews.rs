use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::reviews::{self, NewDirectReview, ReviewPatch};
use crate::error::Result;
use crate::routes::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignBody {
    pub submission_id: String,
    pub reviewer_id: String,
}

pub async fn assign(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AssignBody>,
) -> Result<impl IntoResponse> {
    let review =
        reviews::assign(state.pool.as_ref(), &body.submission_id, &body.reviewer_id).await?;

    tracing::info!(
        "assigned reviewer {} to submission {}",
        body.reviewer_id,
        body.submission_id
    );
    Ok(ApiResponse::ok(review))
}

pub async fn submit_review(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewDirectReview>,
) -> Result<impl IntoResponse> {
    let review = reviews::submit_review(state.pool.as_ref(), input).await?;
    Ok(ApiResponse::ok(review))
}

pub async fn complete_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<ReviewPatch>,
) -> Result<impl IntoResponse> {
    let review = reviews::complete_review(state.pool.as_ref(), &id, patch).await?;
    Ok(ApiResponse::ok(review))
}

pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    reviews::delete_review(state.pool.as_ref(), &id).await?;
    Ok(ApiResponse::ok(serde_json::json!({ "id": id })))
}

pub async fn suggestions(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<String>,
) -> Result<impl IntoResponse> {
    let suggestions = reviews::suggest_reviewers(state.pool.as_ref(), &submission_id).await?;
    Ok(ApiResponse::ok(suggestions))
}

pub async fn submission_reviews(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<String>,
) -> Result<impl IntoResponse> {
    let reviews = reviews::list_for_submission(state.pool.as_ref(), &submission_id).await?;
    Ok(ApiResponse::ok(reviews))
}

pub async fn submission_stats(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<String>,
) -> Result<impl IntoResponse> {
    let stats = reviews::submission_stats(state.pool.as_ref(), &submission_id).await?;
    Ok(ApiResponse::ok(stats))
}

pub async fn progress_overview(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let progress = reviews::global_progress(state.pool.as_ref()).await?;
    Ok(ApiResponse::ok(progress))
}
