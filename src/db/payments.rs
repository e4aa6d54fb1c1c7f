//! Payment proof submission and admin verification workflow.
//!
//! A payment record only ever moves `pending -> verified` or
//! `pending -> rejected`; both end states are terminal. Several pending
//! records may coexist for one user.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{PaymentRecord, PaymentRecordStatus};
use crate::db::users;
use crate::error::{Error, Result};

// Registration fees are stored as REAL; amounts closer than this are equal.
const AMOUNT_TOLERANCE: f64 = 0.005;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPaymentProof {
    pub amount: f64,
    pub currency: String,
    pub method: String,
    pub reference: Option<String>,
    pub proof_file: String,
}

pub async fn submit_proof(
    pool: &SqlitePool,
    user_id: &str,
    input: NewPaymentProof,
) -> Result<PaymentRecord> {
    let user = users::get_user(pool, user_id)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    if (input.amount - user.registration_fee).abs() > AMOUNT_TOLERANCE {
        return Err(Error::Validation(format!(
            "payment amount {:.2} does not match the registration fee {:.2}",
            input.amount, user.registration_fee
        )));
    }

    let now = Utc::now();
    let record = PaymentRecord {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        amount: input.amount,
        currency: input.currency,
        method: input.method,
        reference: input.reference,
        proof_file: input.proof_file,
        status: PaymentRecordStatus::Pending,
        admin_notes: None,
        verified_by: None,
        verification_date: None,
        payment_date: now,
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO payment_records (id, user_id, amount, currency, method, reference,
                                     proof_file, status, admin_notes, verified_by,
                                     verification_date, payment_date, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(&record.user_id)
    .bind(record.amount)
    .bind(&record.currency)
    .bind(&record.method)
    .bind(&record.reference)
    .bind(&record.proof_file)
    .bind(record.status)
    .bind(&record.admin_notes)
    .bind(&record.verified_by)
    .bind(record.verification_date)
    .bind(record.payment_date)
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(record)
}

pub async fn get_record(pool: &SqlitePool, id: &str) -> Result<Option<PaymentRecord>> {
    let record = sqlx::query_as::<_, PaymentRecord>("SELECT * FROM payment_records WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(record)
}

pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<PaymentRecord>> {
    let records = sqlx::query_as::<_, PaymentRecord>(
        "SELECT * FROM payment_records WHERE user_id = ? ORDER BY payment_date DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(records)
}

/// The record with the most recent payment date, pending or not.
pub async fn latest_for_user(pool: &SqlitePool, user_id: &str) -> Result<Option<PaymentRecord>> {
    let record = sqlx::query_as::<_, PaymentRecord>(
        "SELECT * FROM payment_records WHERE user_id = ?
         ORDER BY payment_date DESC, rowid DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(record)
}

pub async fn list_pending(pool: &SqlitePool) -> Result<Vec<PaymentRecord>> {
    let records = sqlx::query_as::<_, PaymentRecord>(
        "SELECT * FROM payment_records WHERE status = 'pending' ORDER BY payment_date",
    )
    .fetch_all(pool)
    .await?;
    Ok(records)
}

async fn transition(
    pool: &SqlitePool,
    id: &str,
    admin_id: &str,
    notes: Option<String>,
    to: PaymentRecordStatus,
) -> Result<PaymentRecord> {
    let record = get_record(pool, id)
        .await?
        .ok_or_else(|| Error::not_found("payment record", id))?;

    users::get_user(pool, admin_id)
        .await?
        .ok_or_else(|| Error::not_found("user", admin_id))?;

    // The status guard lives in the UPDATE itself, so a concurrent admin
    // processing the same record loses here instead of silently winning.
    let verification_date = Utc::now();
    let result = sqlx::query(
        r#"
        UPDATE payment_records
        SET status = ?, admin_notes = ?, verified_by = ?, verification_date = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(to)
    .bind(&notes)
    .bind(admin_id)
    .bind(verification_date)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::Conflict(format!(
            "payment record {} has already been processed",
            id
        )));
    }

    Ok(PaymentRecord {
        status: to,
        admin_notes: notes,
        verified_by: Some(admin_id.to_string()),
        verification_date: Some(verification_date),
        ..record
    })
}

/// Admin accepts the proof. Notes are optional.
pub async fn verify(
    pool: &SqlitePool,
    id: &str,
    admin_id: &str,
    notes: Option<String>,
) -> Result<PaymentRecord> {
    transition(pool, id, admin_id, notes, PaymentRecordStatus::Verified).await
}

/// Admin rejects the proof. Notes are mandatory so the user learns why.
pub async fn reject(
    pool: &SqlitePool,
    id: &str,
    admin_id: &str,
    notes: &str,
) -> Result<PaymentRecord> {
    if notes.trim().is_empty() {
        return Err(Error::Validation(
            "rejection notes must not be empty".to_string(),
        ));
    }
    transition(
        pool,
        id,
        admin_id,
        Some(notes.to_string()),
        PaymentRecordStatus::Rejected,
    )
    .await
}
