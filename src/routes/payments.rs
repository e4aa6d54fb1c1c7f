use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::payments::NewPaymentProof;
use crate::db::{conferences, payments, users, PaymentStatus};
use crate::error::{Error, Result};
use crate::routes::ApiResponse;
use crate::state::AppState;
use crate::storage::generate_proof_filename;

/// Multipart proof-of-payment upload: text fields plus the proof file.
pub async fn submit_proof(
    State(state): State<Arc<AppState>>,
    mut multipart: axum::extract::Multipart,
) -> Result<impl IntoResponse> {
    let mut user_id = String::new();
    let mut amount: Option<f64> = None;
    let mut currency = "USD".to_string();
    let mut method = String::new();
    let mut reference: Option<String> = None;
    let mut proof_data: Option<Vec<u8>> = None;
    let mut proof_name = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("invalid multipart payload: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "userId" => {
                if let Ok(text) = field.text().await {
                    user_id = text;
                }
            }
            "amount" => {
                if let Ok(text) = field.text().await {
                    amount = text.trim().parse().ok();
                }
            }
            "currency" => {
                if let Ok(text) = field.text().await {
                    currency = text;
                }
            }
            "method" => {
                if let Ok(text) = field.text().await {
                    method = text;
                }
            }
            "reference" => {
                if let Ok(text) = field.text().await {
                    if !text.trim().is_empty() {
                        reference = Some(text);
                    }
                }
            }
            "proof" => {
                proof_name = field.file_name().unwrap_or("proof.pdf").to_string();
                if let Ok(data) = field.bytes().await {
                    proof_data = Some(data.to_vec());
                }
            }
            _ => {}
        }
    }

    if user_id.is_empty() {
        return Err(Error::Validation("userId field is required".to_string()));
    }
    let amount =
        amount.ok_or_else(|| Error::Validation("amount field is required".to_string()))?;
    if method.trim().is_empty() {
        return Err(Error::Validation("method field is required".to_string()));
    }
    let proof_data = match proof_data {
        Some(d) if !d.is_empty() => d,
        _ => {
            return Err(Error::Validation(
                "a proof-of-payment file is required".to_string(),
            ))
        }
    };

    let filename = generate_proof_filename(&proof_name);
    let proof_path = state.config.upload_folder.join(&filename);
    std::fs::write(&proof_path, &proof_data)
        .map_err(|e| Error::Validation(format!("failed to store proof file: {}", e)))?;

    let record = match payments::submit_proof(
        state.pool.as_ref(),
        &user_id,
        NewPaymentProof {
            amount,
            currency,
            method,
            reference,
            proof_file: filename,
        },
    )
    .await
    {
        Ok(record) => record,
        Err(e) => {
            // A rejected submission must not leave its file behind.
            let _ = std::fs::remove_file(&proof_path);
            return Err(e);
        }
    };

    // Record accepted: flag the user as awaiting verification.
    users::set_payment_status(state.pool.as_ref(), &user_id, PaymentStatus::PaymentSubmitted)
        .await?;

    tracing::info!("payment proof {} submitted by user {}", record.id, user_id);
    Ok(ApiResponse::ok(record))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyBody {
    pub admin_id: String,
    pub notes: Option<String>,
}

pub async fn verify(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<VerifyBody>,
) -> Result<impl IntoResponse> {
    let record = payments::verify(state.pool.as_ref(), &id, &body.admin_id, body.notes).await?;

    // The user's own payment status is a route-layer concern.
    users::set_payment_status(
        state.pool.as_ref(),
        &record.user_id,
        PaymentStatus::PaymentVerified,
    )
    .await?;

    tracing::info!("payment record {} verified by {}", id, body.admin_id);
    Ok(ApiResponse::ok(record))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectBody {
    pub admin_id: String,
    pub notes: String,
}

pub async fn reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RejectBody>,
) -> Result<impl IntoResponse> {
    let record = payments::reject(state.pool.as_ref(), &id, &body.admin_id, &body.notes).await?;

    users::set_payment_status(
        state.pool.as_ref(),
        &record.user_id,
        PaymentStatus::PaymentRejected,
    )
    .await?;

    tracing::info!("payment record {} rejected by {}", id, body.admin_id);
    Ok(ApiResponse::ok(record))
}

pub async fn user_payments(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse> {
    let records = payments::list_for_user(state.pool.as_ref(), &user_id).await?;
    Ok(ApiResponse::ok(records))
}

pub async fn pending_payments(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let records = payments::list_pending(state.pool.as_ref()).await?;
    Ok(ApiResponse::ok(records))
}

/// Banking details of the active conference.
pub async fn instructions(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let conference = conferences::active_conference(state.pool.as_ref())
        .await?
        .ok_or_else(|| Error::not_found("conference", "active"))?;
    let instructions = conferences::get_payment_instructions(state.pool.as_ref(), &conference.id)
        .await?
        .ok_or_else(|| Error::not_found("payment instructions", &conference.id))?;
    Ok(ApiResponse::ok(instructions))
}

/// Serve a stored proof-of-payment file for admin inspection.
pub async fn download_proof(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse> {
    // Stored names come from generate_proof_filename, which never emits
    // separators; anything with one is a traversal attempt.
    if filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(Error::Validation("invalid proof filename".to_string()));
    }

    let proof_path = state.config.upload_folder.join(&filename);
    let content = std::fs::read(&proof_path)
        .map_err(|_| Error::not_found("proof file", &filename))?;

    let mime = mime_guess::from_path(&filename)
        .first_raw()
        .unwrap_or("application/octet-stream");

    let response = axum::response::Response::builder()
        .header("Content-Type", mime)
        .header(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(axum::body::Body::from(content))
        .map_err(|e| Error::Validation(format!("failed to build response: {}", e)))?;

    Ok(response)
}
