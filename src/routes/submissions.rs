use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::submissions::{NewSubmission, SubmissionPatch};
use crate::db::{submissions, SubmissionStatus};
use crate::error::{Error, Result};
use crate::routes::ApiResponse;
use crate::state::AppState;

pub async fn create_submission(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewSubmission>,
) -> Result<impl IntoResponse> {
    let submission = submissions::create_submission(state.pool.as_ref(), input).await?;
    tracing::info!("created submission {} ({})", submission.id, submission.title);
    Ok(ApiResponse::ok(submission))
}

pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let submission = submissions::get_submission_with_authors(state.pool.as_ref(), &id)
        .await?
        .ok_or_else(|| Error::not_found("submission", &id))?;
    Ok(ApiResponse::ok(submission))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<SubmissionStatus>,
}

pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let submissions = submissions::list_submissions(state.pool.as_ref(), query.status).await?;
    Ok(ApiResponse::ok(submissions))
}

pub async fn update_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<SubmissionPatch>,
) -> Result<impl IntoResponse> {
    let submission = submissions::update_submission(state.pool.as_ref(), &id, patch).await?;
    Ok(ApiResponse::ok(submission))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: SubmissionStatus,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<impl IntoResponse> {
    submissions::update_status(state.pool.as_ref(), &id, body.status).await?;
    let submission = submissions::get_submission(state.pool.as_ref(), &id)
        .await?
        .ok_or_else(|| Error::not_found("submission", &id))?;
    Ok(ApiResponse::ok(submission))
}
