use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// Access-control role, distinct from `ParticipantType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum UserRole {
    Participant,
    Presenter,
    Organizer,
    Reviewer,
    Admin,
}

impl UserRole {
    pub fn can_review(self) -> bool {
        matches!(self, UserRole::Reviewer | UserRole::Admin)
    }
}

/// How the user takes part in the conference; drives the registration fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ParticipantType {
    KeynoteSpeaker,
    InvitedSpeaker,
    AcademicPresenterOral,
    AcademicPresenterPoster,
    StudentPresenterOral,
    StudentPresenterPoster,
    IndustryPresenter,
    InternationalPresenter,
    AcademicParticipant,
    StudentParticipant,
    IndustryParticipant,
    InternationalParticipant,
    OrganizingCommittee,
    ScientificCommittee,
    Reviewer,
    Sponsor,
    AccompanyingPerson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentStatus {
    NotPaid,
    PaymentSubmitted,
    PaymentVerified,
    PaymentRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    UnderReview,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PresentationType {
    Oral,
    Poster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Recommendation {
    Accept,
    MinorRevision,
    MajorRevision,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    Pending,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub affiliation: String,
    pub country: String,
    pub participant_type: ParticipantType,
    pub role: UserRole,
    pub payment_status: PaymentStatus,
    pub registration_fee: f64,
    pub expertise: Json<Vec<String>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conference {
    pub id: String,
    pub name: String,
    pub venue: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub abstract_deadline: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub conference_id: String,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSchedule {
    pub id: String,
    pub session_id: String,
    pub title: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub position: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationFee {
    pub id: String,
    pub conference_id: String,
    pub participant_type: ParticipantType,
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInstructions {
    pub id: String,
    pub conference_id: String,
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    pub swift_code: Option<String>,
    pub accepted_methods: Json<Vec<String>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub abstract_md: String,
    pub abstract_html: String,
    pub keywords: Json<Vec<String>>,
    pub session_type: String,
    pub presentation_type: PresentationType,
    pub status: SubmissionStatus,
    pub manuscript_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: String,
    pub submission_id: String,
    pub name: String,
    pub affiliation: String,
    pub email: String,
    pub is_corresponding: bool,
    pub position: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub submission_id: String,
    pub reviewer_id: String,
    pub score: Option<i64>,
    pub comments: Option<String>,
    pub recommendation: Option<Recommendation>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    pub method: String,
    pub reference: Option<String>,
    pub proof_file: String,
    pub status: PaymentRecordStatus,
    pub admin_notes: Option<String>,
    pub verified_by: Option<String>,
    pub verification_date: Option<DateTime<Utc>>,
    pub payment_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
