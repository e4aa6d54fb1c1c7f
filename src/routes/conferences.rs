use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::conferences::{
    ConferencePatch, NewConference, NewScheduleEntry, NewSession, PaymentInstructionsInput,
};
use crate::db::{conferences, ParticipantType};
use crate::error::{Error, Result};
use crate::routes::ApiResponse;
use crate::state::AppState;

pub async fn create_conference(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewConference>,
) -> Result<impl IntoResponse> {
    let conference = conferences::create_conference(state.pool.as_ref(), input).await?;
    tracing::info!("created conference {} ({})", conference.id, conference.name);
    Ok(ApiResponse::ok(conference))
}

pub async fn active_conference(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let conference = conferences::active_conference(state.pool.as_ref())
        .await?
        .ok_or_else(|| Error::not_found("conference", "active"))?;
    Ok(ApiResponse::ok(conference))
}

pub async fn update_conference(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<ConferencePatch>,
) -> Result<impl IntoResponse> {
    let conference = conferences::update_conference(state.pool.as_ref(), &id, patch).await?;
    Ok(ApiResponse::ok(conference))
}

pub async fn add_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<NewSession>,
) -> Result<impl IntoResponse> {
    let session = conferences::add_session(state.pool.as_ref(), &id, input).await?;
    Ok(ApiResponse::ok(session))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let sessions = conferences::list_sessions(state.pool.as_ref(), &id).await?;
    Ok(ApiResponse::ok(sessions))
}

pub async fn add_schedule_entry(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(input): Json<NewScheduleEntry>,
) -> Result<impl IntoResponse> {
    let entry = conferences::add_schedule_entry(state.pool.as_ref(), &session_id, input).await?;
    Ok(ApiResponse::ok(entry))
}

pub async fn list_schedule(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse> {
    let entries = conferences::list_schedule(state.pool.as_ref(), &session_id).await?;
    Ok(ApiResponse::ok(entries))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeInput {
    pub participant_type: ParticipantType,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

pub async fn set_fee(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<FeeInput>,
) -> Result<impl IntoResponse> {
    let fee = conferences::set_registration_fee(
        state.pool.as_ref(),
        &id,
        input.participant_type,
        input.amount,
        &input.currency,
    )
    .await?;
    Ok(ApiResponse::ok(fee))
}

pub async fn list_fees(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let fees = conferences::list_fees(state.pool.as_ref(), &id).await?;
    Ok(ApiResponse::ok(fees))
}

pub async fn upsert_payment_instructions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<PaymentInstructionsInput>,
) -> Result<impl IntoResponse> {
    let instructions =
        conferences::upsert_payment_instructions(state.pool.as_ref(), &id, input).await?;
    Ok(ApiResponse::ok(instructions))
}

pub async fn get_payment_instructions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let instructions = conferences::get_payment_instructions(state.pool.as_ref(), &id)
        .await?
        .ok_or_else(|| Error::not_found("payment instructions", &id))?;
    Ok(ApiResponse::ok(instructions))
}

pub async fn delete_payment_instructions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    conferences::delete_payment_instructions(state.pool.as_ref(), &id).await?;
    Ok(ApiResponse::ok(serde_json::json!({ "conferenceId": id })))
}
