use chrono::Utc;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{ParticipantType, PaymentStatus, User, UserRole};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub affiliation: String,
    #[serde(default)]
    pub country: String,
    pub participant_type: ParticipantType,
    pub role: UserRole,
    #[serde(default)]
    pub registration_fee: f64,
    #[serde(default)]
    pub expertise: Vec<String>,
    /// Session ids the user registers for; written atomically with the user row.
    #[serde(default)]
    pub selected_sessions: Vec<String>,
}

/// Explicit patch shape for partial user updates. A `None` field is never
/// written; an all-`None` patch takes the fetch-and-return path with no write.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub affiliation: Option<String>,
    pub country: Option<String>,
    pub participant_type: Option<ParticipantType>,
    pub role: Option<UserRole>,
    pub expertise: Option<Vec<String>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.affiliation.is_none()
            && self.country.is_none()
            && self.participant_type.is_none()
            && self.role.is_none()
            && self.expertise.is_none()
    }
}

pub async fn create_user(pool: &SqlitePool, input: NewUser) -> Result<User> {
    if !input.email.contains('@') {
        return Err(Error::Validation(format!(
            "invalid email address: {}",
            input.email
        )));
    }
    if input.registration_fee < 0.0 {
        return Err(Error::Validation(
            "registration fee must not be negative".to_string(),
        ));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: input.email,
        first_name: input.first_name,
        last_name: input.last_name,
        affiliation: input.affiliation,
        country: input.country,
        participant_type: input.participant_type,
        role: input.role,
        payment_status: PaymentStatus::NotPaid,
        registration_fee: input.registration_fee,
        expertise: Json(input.expertise),
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO users (id, email, first_name, last_name, affiliation, country,
                           participant_type, role, payment_status, registration_fee,
                           expertise, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.affiliation)
    .bind(&user.country)
    .bind(user.participant_type)
    .bind(user.role)
    .bind(user.payment_status)
    .bind(user.registration_fee)
    .bind(&user.expertise)
    .bind(user.is_active)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&mut *tx)
    .await?;

    for session_id in &input.selected_sessions {
        sqlx::query("INSERT INTO user_sessions (user_id, session_id) VALUES (?, ?)")
            .bind(&user.id)
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(user)
}

pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Active users holding the reviewer role, ordered by name.
pub async fn list_reviewers(pool: &SqlitePool) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE role = 'reviewer' AND is_active = 1
         ORDER BY first_name, last_name",
    )
    .fetch_all(pool)
    .await?;
    Ok(users)
}

pub async fn selected_sessions(pool: &SqlitePool, user_id: &str) -> Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT session_id FROM user_sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn update_user(pool: &SqlitePool, id: &str, patch: UserPatch) -> Result<User> {
    let current = get_user(pool, id)
        .await?
        .ok_or_else(|| Error::not_found("user", id))?;

    if patch.is_empty() {
        return Ok(current);
    }

    let first_name = patch.first_name.unwrap_or(current.first_name);
    let last_name = patch.last_name.unwrap_or(current.last_name);
    let affiliation = patch.affiliation.unwrap_or(current.affiliation);
    let country = patch.country.unwrap_or(current.country);
    let participant_type = patch.participant_type.unwrap_or(current.participant_type);
    let role = patch.role.unwrap_or(current.role);
    let expertise = patch.expertise.map(Json).unwrap_or(current.expertise);
    let updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE users
        SET first_name = ?, last_name = ?, affiliation = ?, country = ?,
            participant_type = ?, role = ?, expertise = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&first_name)
    .bind(&last_name)
    .bind(&affiliation)
    .bind(&country)
    .bind(participant_type)
    .bind(role)
    .bind(&expertise)
    .bind(updated_at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(User {
        first_name,
        last_name,
        affiliation,
        country,
        participant_type,
        role,
        expertise,
        updated_at,
        ..current
    })
}

/// Soft delete: the row stays, `is_active` drops to false.
pub async fn deactivate_user(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("UPDATE users SET is_active = 0, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found("user", id));
    }
    Ok(())
}

pub async fn set_payment_status(
    pool: &SqlitePool,
    id: &str,
    status: PaymentStatus,
) -> Result<()> {
    let result = sqlx::query("UPDATE users SET payment_status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found("user", id));
    }
    Ok(())
}
