use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

use crate::db::users::{NewUser, UserPatch};
use crate::db::{self, conferences, users};
use crate::error::{Error, Result};
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Register a user. The registration fee is fixed here, from the active
/// conference's fee schedule, and is not re-derived later.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(mut input): Json<NewUser>,
) -> Result<impl IntoResponse> {
    if users::get_user_by_email(state.pool.as_ref(), &input.email)
        .await?
        .is_some()
    {
        return Err(Error::Conflict(format!(
            "a user with email {} already exists",
            input.email
        )));
    }

    if let Some(conference) = conferences::active_conference(state.pool.as_ref()).await? {
        if let Some(fee) =
            conferences::fee_for(state.pool.as_ref(), &conference.id, input.participant_type)
                .await?
        {
            input.registration_fee = fee.amount;
        }
    }

    let user = users::create_user(state.pool.as_ref(), input).await?;
    tracing::info!("registered user {} ({})", user.id, user.email);
    Ok(ApiResponse::ok(user))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let user = users::get_user(state.pool.as_ref(), &id)
        .await?
        .ok_or_else(|| Error::not_found("user", &id))?;
    Ok(ApiResponse::ok(user))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<UserPatch>,
) -> Result<impl IntoResponse> {
    let user = users::update_user(state.pool.as_ref(), &id, patch).await?;
    Ok(ApiResponse::ok(user))
}

pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    users::deactivate_user(state.pool.as_ref(), &id).await?;
    tracing::info!("deactivated user {}", id);
    Ok(ApiResponse::ok(serde_json::json!({ "id": id })))
}

pub async fn list_reviewers(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let reviewers: Vec<db::User> = users::list_reviewers(state.pool.as_ref()).await?;
    Ok(ApiResponse::ok(reviewers))
}
