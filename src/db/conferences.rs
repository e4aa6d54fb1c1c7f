use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{
    Conference, ParticipantType, PaymentInstructions, RegistrationFee, Session, SessionSchedule,
};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConference {
    pub name: String,
    pub venue: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub abstract_deadline: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferencePatch {
    pub name: Option<String>,
    pub venue: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub abstract_deadline: Option<DateTime<Utc>>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl ConferencePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.venue.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.abstract_deadline.is_none()
            && self.registration_deadline.is_none()
            && self.is_active.is_none()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewScheduleEntry {
    pub title: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub position: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInstructionsInput {
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    pub swift_code: Option<String>,
    #[serde(default)]
    pub accepted_methods: Vec<String>,
    pub notes: Option<String>,
}

pub async fn create_conference(pool: &SqlitePool, input: NewConference) -> Result<Conference> {
    if input.end_date < input.start_date {
        return Err(Error::Validation(
            "conference end date precedes start date".to_string(),
        ));
    }

    let now = Utc::now();
    let conference = Conference {
        id: Uuid::new_v4().to_string(),
        name: input.name,
        venue: input.venue,
        start_date: input.start_date,
        end_date: input.end_date,
        abstract_deadline: input.abstract_deadline,
        registration_deadline: input.registration_deadline,
        is_active: input.is_active,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO conferences (id, name, venue, start_date, end_date,
                                 abstract_deadline, registration_deadline,
                                 is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&conference.id)
    .bind(&conference.name)
    .bind(&conference.venue)
    .bind(conference.start_date)
    .bind(conference.end_date)
    .bind(conference.abstract_deadline)
    .bind(conference.registration_deadline)
    .bind(conference.is_active)
    .bind(conference.created_at)
    .bind(conference.updated_at)
    .execute(pool)
    .await?;

    Ok(conference)
}

pub async fn get_conference(pool: &SqlitePool, id: &str) -> Result<Option<Conference>> {
    let conference = sqlx::query_as::<_, Conference>("SELECT * FROM conferences WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(conference)
}

/// The schema does not force a single active conference; when several rows are
/// active the most recently created one wins.
pub async fn active_conference(pool: &SqlitePool) -> Result<Option<Conference>> {
    let conference = sqlx::query_as::<_, Conference>(
        "SELECT * FROM conferences WHERE is_active = 1
         ORDER BY created_at DESC, rowid DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(conference)
}

pub async fn update_conference(
    pool: &SqlitePool,
    id: &str,
    patch: ConferencePatch,
) -> Result<Conference> {
    let current = get_conference(pool, id)
        .await?
        .ok_or_else(|| Error::not_found("conference", id))?;

    if patch.is_empty() {
        return Ok(current);
    }

    let name = patch.name.unwrap_or(current.name);
    let venue = patch.venue.unwrap_or(current.venue);
    let start_date = patch.start_date.unwrap_or(current.start_date);
    let end_date = patch.end_date.unwrap_or(current.end_date);
    let abstract_deadline = patch.abstract_deadline.unwrap_or(current.abstract_deadline);
    let registration_deadline = patch
        .registration_deadline
        .unwrap_or(current.registration_deadline);
    let is_active = patch.is_active.unwrap_or(current.is_active);
    let updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE conferences
        SET name = ?, venue = ?, start_date = ?, end_date = ?,
            abstract_deadline = ?, registration_deadline = ?,
            is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&name)
    .bind(&venue)
    .bind(start_date)
    .bind(end_date)
    .bind(abstract_deadline)
    .bind(registration_deadline)
    .bind(is_active)
    .bind(updated_at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(Conference {
        name,
        venue,
        start_date,
        end_date,
        abstract_deadline,
        registration_deadline,
        is_active,
        updated_at,
        ..current
    })
}

pub async fn add_session(
    pool: &SqlitePool,
    conference_id: &str,
    input: NewSession,
) -> Result<Session> {
    get_conference(pool, conference_id)
        .await?
        .ok_or_else(|| Error::not_found("conference", conference_id))?;

    let session = Session {
        id: Uuid::new_v4().to_string(),
        conference_id: conference_id.to_string(),
        code: input.code,
        name: input.name,
        description: input.description,
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO sessions (id, conference_id, code, name, description, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&session.id)
    .bind(&session.conference_id)
    .bind(&session.code)
    .bind(&session.name)
    .bind(&session.description)
    .bind(session.created_at)
    .execute(pool)
    .await?;

    Ok(session)
}

pub async fn list_sessions(pool: &SqlitePool, conference_id: &str) -> Result<Vec<Session>> {
    let sessions = sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE conference_id = ? ORDER BY code",
    )
    .bind(conference_id)
    .fetch_all(pool)
    .await?;
    Ok(sessions)
}

pub async fn add_schedule_entry(
    pool: &SqlitePool,
    session_id: &str,
    input: NewScheduleEntry,
) -> Result<SessionSchedule> {
    let session_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?)")
        .bind(session_id)
        .fetch_one(pool)
        .await?;
    if !session_exists {
        return Err(Error::not_found("session", session_id));
    }
    if input.ends_at < input.starts_at {
        return Err(Error::Validation(
            "schedule entry ends before it starts".to_string(),
        ));
    }

    let entry = SessionSchedule {
        id: Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        title: input.title,
        location: input.location,
        starts_at: input.starts_at,
        ends_at: input.ends_at,
        position: input.position,
    };

    sqlx::query(
        "INSERT INTO session_schedules (id, session_id, title, location, starts_at, ends_at, position)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.id)
    .bind(&entry.session_id)
    .bind(&entry.title)
    .bind(&entry.location)
    .bind(entry.starts_at)
    .bind(entry.ends_at)
    .bind(entry.position)
    .execute(pool)
    .await?;

    Ok(entry)
}

pub async fn list_schedule(pool: &SqlitePool, session_id: &str) -> Result<Vec<SessionSchedule>> {
    let entries = sqlx::query_as::<_, SessionSchedule>(
        "SELECT * FROM session_schedules WHERE session_id = ? ORDER BY position, starts_at",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

/// Insert or overwrite the fee for one participant type.
pub async fn set_registration_fee(
    pool: &SqlitePool,
    conference_id: &str,
    participant_type: ParticipantType,
    amount: f64,
    currency: &str,
) -> Result<RegistrationFee> {
    if amount < 0.0 {
        return Err(Error::Validation(
            "registration fee must not be negative".to_string(),
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO registration_fees (id, conference_id, participant_type, amount, currency)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (conference_id, participant_type)
        DO UPDATE SET amount = excluded.amount, currency = excluded.currency
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(conference_id)
    .bind(participant_type)
    .bind(amount)
    .bind(currency)
    .execute(pool)
    .await?;

    let fee = sqlx::query_as::<_, RegistrationFee>(
        "SELECT * FROM registration_fees WHERE conference_id = ? AND participant_type = ?",
    )
    .bind(conference_id)
    .bind(participant_type)
    .fetch_one(pool)
    .await?;

    Ok(fee)
}

pub async fn list_fees(pool: &SqlitePool, conference_id: &str) -> Result<Vec<RegistrationFee>> {
    let fees = sqlx::query_as::<_, RegistrationFee>(
        "SELECT * FROM registration_fees WHERE conference_id = ? ORDER BY participant_type",
    )
    .bind(conference_id)
    .fetch_all(pool)
    .await?;
    Ok(fees)
}

pub async fn fee_for(
    pool: &SqlitePool,
    conference_id: &str,
    participant_type: ParticipantType,
) -> Result<Option<RegistrationFee>> {
    let fee = sqlx::query_as::<_, RegistrationFee>(
        "SELECT * FROM registration_fees WHERE conference_id = ? AND participant_type = ?",
    )
    .bind(conference_id)
    .bind(participant_type)
    .fetch_optional(pool)
    .await?;
    Ok(fee)
}

/// At most one instructions record per conference; repeated calls overwrite it.
pub async fn upsert_payment_instructions(
    pool: &SqlitePool,
    conference_id: &str,
    input: PaymentInstructionsInput,
) -> Result<PaymentInstructions> {
    get_conference(pool, conference_id)
        .await?
        .ok_or_else(|| Error::not_found("conference", conference_id))?;

    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO payment_instructions (id, conference_id, bank_name, account_name,
                                          account_number, swift_code, accepted_methods,
                                          notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (conference_id)
        DO UPDATE SET bank_name = excluded.bank_name,
                      account_name = excluded.account_name,
                      account_number = excluded.account_number,
                      swift_code = excluded.swift_code,
                      accepted_methods = excluded.accepted_methods,
                      notes = excluded.notes,
                      updated_at = excluded.updated_at
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(conference_id)
    .bind(&input.bank_name)
    .bind(&input.account_name)
    .bind(&input.account_number)
    .bind(&input.swift_code)
    .bind(Json(&input.accepted_methods))
    .bind(&input.notes)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let instructions = sqlx::query_as::<_, PaymentInstructions>(
        "SELECT * FROM payment_instructions WHERE conference_id = ?",
    )
    .bind(conference_id)
    .fetch_one(pool)
    .await?;

    Ok(instructions)
}

pub async fn get_payment_instructions(
    pool: &SqlitePool,
    conference_id: &str,
) -> Result<Option<PaymentInstructions>> {
    let instructions = sqlx::query_as::<_, PaymentInstructions>(
        "SELECT * FROM payment_instructions WHERE conference_id = ?",
    )
    .bind(conference_id)
    .fetch_optional(pool)
    .await?;
    Ok(instructions)
}

pub async fn delete_payment_instructions(pool: &SqlitePool, conference_id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM payment_instructions WHERE conference_id = ?")
        .bind(conference_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found("payment instructions", conference_id));
    }
    Ok(())
}
