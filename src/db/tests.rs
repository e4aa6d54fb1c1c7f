//! Repository tests against an in-memory database.

use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::db::conferences::{self, NewConference, NewSession, PaymentInstructionsInput};
use crate::db::payments::{self, NewPaymentProof};
use crate::db::reviews::{self, NewDirectReview, ReviewPatch};
use crate::db::submissions::{self, NewAuthor, NewSubmission};
use crate::db::users::{self, NewUser, UserPatch};
use crate::db::{
    ParticipantType, PaymentRecordStatus, PaymentStatus, PresentationType, Recommendation,
    SubmissionStatus, User, UserRole,
};
use crate::error::Error;

async fn pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

fn new_user(email: &str, first_name: &str, role: UserRole, expertise: &[&str]) -> NewUser {
    NewUser {
        email: email.to_string(),
        first_name: first_name.to_string(),
        last_name: "Doe".to_string(),
        affiliation: "Example University".to_string(),
        country: "Utopia".to_string(),
        participant_type: ParticipantType::AcademicPresenterOral,
        role,
        registration_fee: 150.0,
        expertise: expertise.iter().map(|s| s.to_string()).collect(),
        selected_sessions: vec![],
    }
}

async fn seed_user(pool: &SqlitePool, email: &str, role: UserRole) -> User {
    users::create_user(pool, new_user(email, "Alex", role, &[]))
        .await
        .unwrap()
}

async fn seed_reviewer(
    pool: &SqlitePool,
    email: &str,
    first_name: &str,
    expertise: &[&str],
) -> User {
    users::create_user(pool, new_user(email, first_name, UserRole::Reviewer, expertise))
        .await
        .unwrap()
}

async fn seed_submission(
    pool: &SqlitePool,
    owner_id: &str,
    keywords: &[&str],
    session_type: &str,
) -> crate::db::Submission {
    submissions::create_submission(
        pool,
        NewSubmission {
            user_id: owner_id.to_string(),
            title: "On Things".to_string(),
            abstract_md: "We study things.\n\nThings are **important**.".to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            session_type: session_type.to_string(),
            presentation_type: PresentationType::Oral,
            authors: vec![NewAuthor {
                name: "Alex Doe".to_string(),
                affiliation: "Example University".to_string(),
                email: "alex@example.com".to_string(),
                is_corresponding: true,
            }],
        },
    )
    .await
    .unwrap()
}

fn conference_input(name: &str) -> NewConference {
    let start = Utc::now() + Duration::days(90);
    NewConference {
        name: name.to_string(),
        venue: "Grand Hall".to_string(),
        start_date: start,
        end_date: start + Duration::days(3),
        abstract_deadline: start - Duration::days(60),
        registration_deadline: start - Duration::days(30),
        is_active: true,
    }
}

// ── Users ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_user_writes_selected_sessions_atomically() {
    let pool = pool().await;
    let conference = conferences::create_conference(&pool, conference_input("TestConf"))
        .await
        .unwrap();
    let che = conferences::add_session(
        &pool,
        &conference.id,
        NewSession {
            code: "CHE".to_string(),
            name: "Chemical Engineering".to_string(),
            description: None,
        },
    )
    .await
    .unwrap();
    let cse = conferences::add_session(
        &pool,
        &conference.id,
        NewSession {
            code: "CSE".to_string(),
            name: "Computer Science & Engineering".to_string(),
            description: None,
        },
    )
    .await
    .unwrap();

    let mut input = new_user("alex@example.com", "Alex", UserRole::Participant, &[]);
    input.selected_sessions = vec![che.id.clone(), cse.id.clone()];
    let user = users::create_user(&pool, input).await.unwrap();

    let mut selected = users::selected_sessions(&pool, &user.id).await.unwrap();
    selected.sort();
    let mut expected = vec![che.id, cse.id];
    expected.sort();
    assert_eq!(selected, expected);
}

#[tokio::test]
async fn create_user_rejects_bad_email() {
    let pool = pool().await;
    let err = users::create_user(&pool, new_user("not-an-email", "Alex", UserRole::Participant, &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn update_user_writes_only_present_fields() {
    let pool = pool().await;
    let user = seed_user(&pool, "alex@example.com", UserRole::Participant).await;

    let updated = users::update_user(
        &pool,
        &user.id,
        UserPatch {
            affiliation: Some("Other Institute".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.affiliation, "Other Institute");
    assert_eq!(updated.first_name, user.first_name);
    assert_eq!(updated.country, user.country);
    assert!(updated.updated_at > user.updated_at);

    let reloaded = users::get_user(&pool, &user.id).await.unwrap().unwrap();
    assert_eq!(reloaded.affiliation, "Other Institute");
}

#[tokio::test]
async fn update_user_empty_patch_is_noop() {
    let pool = pool().await;
    let user = seed_user(&pool, "alex@example.com", UserRole::Participant).await;

    let result = users::update_user(&pool, &user.id, UserPatch::default())
        .await
        .unwrap();

    assert_eq!(result.updated_at, user.updated_at);
    assert_eq!(result.affiliation, user.affiliation);
}

#[tokio::test]
async fn update_missing_user_is_not_found() {
    let pool = pool().await;
    let err = users::update_user(&pool, "no-such-id", UserPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn deactivate_user_is_soft() {
    let pool = pool().await;
    let user = seed_user(&pool, "alex@example.com", UserRole::Participant).await;

    users::deactivate_user(&pool, &user.id).await.unwrap();

    let reloaded = users::get_user(&pool, &user.id).await.unwrap().unwrap();
    assert!(!reloaded.is_active);
}

// ── Conferences ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn active_conference_takes_most_recent() {
    let pool = pool().await;
    conferences::create_conference(&pool, conference_input("Older"))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let newer = conferences::create_conference(&pool, conference_input("Newer"))
        .await
        .unwrap();

    let active = conferences::active_conference(&pool).await.unwrap().unwrap();
    assert_eq!(active.id, newer.id);
}

#[tokio::test]
async fn set_registration_fee_overwrites_existing() {
    let pool = pool().await;
    let conference = conferences::create_conference(&pool, conference_input("TestConf"))
        .await
        .unwrap();

    conferences::set_registration_fee(
        &pool,
        &conference.id,
        ParticipantType::StudentParticipant,
        100.0,
        "USD",
    )
    .await
    .unwrap();
    let fee = conferences::set_registration_fee(
        &pool,
        &conference.id,
        ParticipantType::StudentParticipant,
        120.0,
        "EUR",
    )
    .await
    .unwrap();

    assert_eq!(fee.amount, 120.0);
    assert_eq!(fee.currency, "EUR");
    let fees = conferences::list_fees(&pool, &conference.id).await.unwrap();
    assert_eq!(fees.len(), 1);
}

#[tokio::test]
async fn payment_instructions_upsert_and_delete() {
    let pool = pool().await;
    let conference = conferences::create_conference(&pool, conference_input("TestConf"))
        .await
        .unwrap();

    let input = PaymentInstructionsInput {
        bank_name: "First Bank".to_string(),
        account_name: "TestConf Org".to_string(),
        account_number: "123456".to_string(),
        swift_code: Some("FIRSTXX".to_string()),
        accepted_methods: vec!["bank_transfer".to_string()],
        notes: None,
    };
    conferences::upsert_payment_instructions(&pool, &conference.id, input)
        .await
        .unwrap();

    let replaced = conferences::upsert_payment_instructions(
        &pool,
        &conference.id,
        PaymentInstructionsInput {
            bank_name: "Second Bank".to_string(),
            account_name: "TestConf Org".to_string(),
            account_number: "654321".to_string(),
            swift_code: None,
            accepted_methods: vec!["bank_transfer".to_string(), "cash".to_string()],
            notes: Some("Include your user id".to_string()),
        },
    )
    .await
    .unwrap();
    assert_eq!(replaced.bank_name, "Second Bank");

    conferences::delete_payment_instructions(&pool, &conference.id)
        .await
        .unwrap();
    let gone = conferences::get_payment_instructions(&pool, &conference.id)
        .await
        .unwrap();
    assert!(gone.is_none());
}

// ── Submissions ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn submission_requires_exactly_one_corresponding_author() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;

    let mut input = NewSubmission {
        user_id: owner.id.clone(),
        title: "On Things".to_string(),
        abstract_md: "Body".to_string(),
        keywords: vec![],
        session_type: "CSE".to_string(),
        presentation_type: PresentationType::Poster,
        authors: vec![NewAuthor {
            name: "A".to_string(),
            affiliation: String::new(),
            email: String::new(),
            is_corresponding: false,
        }],
    };
    let err = submissions::create_submission(&pool, input).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    input = NewSubmission {
        user_id: owner.id.clone(),
        title: "On Things".to_string(),
        abstract_md: "Body".to_string(),
        keywords: vec![],
        session_type: "CSE".to_string(),
        presentation_type: PresentationType::Poster,
        authors: vec![
            NewAuthor {
                name: "A".to_string(),
                affiliation: String::new(),
                email: String::new(),
                is_corresponding: true,
            },
            NewAuthor {
                name: "B".to_string(),
                affiliation: String::new(),
                email: String::new(),
                is_corresponding: true,
            },
        ],
    };
    let err = submissions::create_submission(&pool, input).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn submission_caches_rendered_abstract() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let submission = seed_submission(&pool, &owner.id, &["quantum"], "CSE").await;

    assert!(submission.abstract_html.contains("<p>We study things.</p>"));
    assert!(submission
        .abstract_html
        .contains("<strong>important</strong>"));

    let authors = submissions::list_authors(&pool, &submission.id).await.unwrap();
    assert_eq!(authors.len(), 1);
    assert!(authors[0].is_corresponding);
}

#[test]
fn render_abstract_html_escapes_markup() {
    let html = submissions::render_abstract_html("a < b & *c*");
    assert_eq!(html, "<p>a &lt; b &amp; <em>c</em></p>");
}

// ── Review assignment ────────────────────────────────────────────────────────

#[tokio::test]
async fn assign_creates_pending_review() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let reviewer = seed_reviewer(&pool, "rev@example.com", "Riley", &[]).await;
    let submission = seed_submission(&pool, &owner.id, &[], "CSE").await;

    assert!(!reviews::is_reviewer_assigned(&pool, &submission.id, &reviewer.id)
        .await
        .unwrap());

    let review = reviews::assign(&pool, &submission.id, &reviewer.id).await.unwrap();
    assert!(!review.is_completed);
    assert!(review.score.is_none());
    assert!(review.comments.is_none());

    assert!(reviews::is_reviewer_assigned(&pool, &submission.id, &reviewer.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn assign_twice_is_duplicate_and_single_row() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let reviewer = seed_reviewer(&pool, "rev@example.com", "Riley", &[]).await;
    let submission = seed_submission(&pool, &owner.id, &[], "CSE").await;

    reviews::assign(&pool, &submission.id, &reviewer.id).await.unwrap();
    let err = reviews::assign(&pool, &submission.id, &reviewer.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateAssignment { .. }));

    let rows = reviews::list_for_submission(&pool, &submission.id).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn assign_rejects_missing_submission_and_bad_roles() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let reviewer = seed_reviewer(&pool, "rev@example.com", "Riley", &[]).await;
    let submission = seed_submission(&pool, &owner.id, &[], "CSE").await;

    let err = reviews::assign(&pool, "no-such-submission", &reviewer.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    let err = reviews::assign(&pool, &submission.id, &owner.id).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    users::deactivate_user(&pool, &reviewer.id).await.unwrap();
    let err = reviews::assign(&pool, &submission.id, &reviewer.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn submit_review_creates_completed_row() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let reviewer = seed_reviewer(&pool, "rev@example.com", "Riley", &[]).await;
    let submission = seed_submission(&pool, &owner.id, &[], "CSE").await;

    let review = reviews::submit_review(
        &pool,
        NewDirectReview {
            submission_id: submission.id.clone(),
            reviewer_id: reviewer.id.clone(),
            score: 7,
            comments: Some("Solid work".to_string()),
            recommendation: Some(Recommendation::MinorRevision),
        },
    )
    .await
    .unwrap();

    assert!(review.is_completed);
    assert_eq!(review.score, Some(7));

    // Direct submission also occupies the (submission, reviewer) slot.
    let err = reviews::assign(&pool, &submission.id, &reviewer.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateAssignment { .. }));
}

#[tokio::test]
async fn complete_review_forces_flag_and_timestamps() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let reviewer = seed_reviewer(&pool, "rev@example.com", "Riley", &[]).await;
    let submission = seed_submission(&pool, &owner.id, &[], "CSE").await;
    let review = reviews::assign(&pool, &submission.id, &reviewer.id).await.unwrap();

    let completed = reviews::complete_review(
        &pool,
        &review.id,
        ReviewPatch {
            score: Some(8),
            comments: None,
            recommendation: Some(Recommendation::Accept),
        },
    )
    .await
    .unwrap();

    assert!(completed.is_completed);
    assert_eq!(completed.score, Some(8));
    assert_eq!(completed.recommendation, Some(Recommendation::Accept));
    assert!(completed.comments.is_none());
    assert!(completed.updated_at > review.updated_at);

    // Completion is terminal; a later partial update keeps the flag.
    let again = reviews::complete_review(
        &pool,
        &review.id,
        ReviewPatch {
            comments: Some("Adding comments later".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(again.is_completed);
    assert_eq!(again.score, Some(8));
    assert_eq!(again.comments.as_deref(), Some("Adding comments later"));
}

#[tokio::test]
async fn complete_review_empty_patch_is_noop() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let reviewer = seed_reviewer(&pool, "rev@example.com", "Riley", &[]).await;
    let submission = seed_submission(&pool, &owner.id, &[], "CSE").await;
    let review = reviews::assign(&pool, &submission.id, &reviewer.id).await.unwrap();

    let unchanged = reviews::complete_review(&pool, &review.id, ReviewPatch::default())
        .await
        .unwrap();

    assert!(!unchanged.is_completed);
    assert_eq!(unchanged.updated_at, review.updated_at);
}

#[tokio::test]
async fn complete_review_rejects_out_of_range_score() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let reviewer = seed_reviewer(&pool, "rev@example.com", "Riley", &[]).await;
    let submission = seed_submission(&pool, &owner.id, &[], "CSE").await;
    let review = reviews::assign(&pool, &submission.id, &reviewer.id).await.unwrap();

    let err = reviews::complete_review(
        &pool,
        &review.id,
        ReviewPatch {
            score: Some(11),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

// ── Aggregation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn submission_stats_average_covers_completed_only() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let r1 = seed_reviewer(&pool, "r1@example.com", "Riley", &[]).await;
    let r2 = seed_reviewer(&pool, "r2@example.com", "Sasha", &[]).await;
    let submission = seed_submission(&pool, &owner.id, &[], "CSE").await;

    let first = reviews::assign(&pool, &submission.id, &r1.id).await.unwrap();
    reviews::assign(&pool, &submission.id, &r2.id).await.unwrap();
    reviews::complete_review(
        &pool,
        &first.id,
        ReviewPatch {
            score: Some(8),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let stats = reviews::submission_stats(&pool, &submission.id).await.unwrap();
    assert_eq!(stats.total_reviews, 2);
    assert_eq!(stats.completed_reviews, 1);
    assert_eq!(stats.average_score, Some(8.0));
}

#[tokio::test]
async fn submission_stats_without_completed_reviews_has_no_average() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let reviewer = seed_reviewer(&pool, "rev@example.com", "Riley", &[]).await;
    let submission = seed_submission(&pool, &owner.id, &[], "CSE").await;
    reviews::assign(&pool, &submission.id, &reviewer.id).await.unwrap();

    let stats = reviews::submission_stats(&pool, &submission.id).await.unwrap();
    assert_eq!(stats.total_reviews, 1);
    assert_eq!(stats.completed_reviews, 0);
    assert_eq!(stats.average_score, None);
}

#[tokio::test]
async fn global_progress_on_empty_database_is_zero() {
    let pool = pool().await;
    let progress = reviews::global_progress(&pool).await.unwrap();

    assert_eq!(progress.total_assignments, 0);
    assert_eq!(progress.completion_percentage, 0.0);
    assert!(progress.reviewer_workloads.is_empty());
}

#[tokio::test]
async fn global_progress_counts_and_rates() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let r1 = seed_reviewer(&pool, "r1@example.com", "Riley", &[]).await;
    let r2 = seed_reviewer(&pool, "r2@example.com", "Sasha", &[]).await;
    let s1 = seed_submission(&pool, &owner.id, &[], "CSE").await;
    let s2 = seed_submission(&pool, &owner.id, &[], "CHE").await;

    // r1: two assignments, one completed. r2: one assignment, completed.
    let a = reviews::assign(&pool, &s1.id, &r1.id).await.unwrap();
    reviews::assign(&pool, &s2.id, &r1.id).await.unwrap();
    let b = reviews::assign(&pool, &s2.id, &r2.id).await.unwrap();
    reviews::complete_review(
        &pool,
        &a.id,
        ReviewPatch {
            score: Some(6),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    reviews::complete_review(
        &pool,
        &b.id,
        ReviewPatch {
            score: Some(9),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let progress = reviews::global_progress(&pool).await.unwrap();
    assert_eq!(progress.total_assignments, 3);
    assert_eq!(progress.completed_reviews, 2);
    assert_eq!(progress.pending_reviews, 1);
    assert_eq!(progress.completion_percentage, 66.67);
    assert_eq!(progress.submissions_by_status.submitted, 2);

    let riley = progress
        .reviewer_workloads
        .iter()
        .find(|w| w.reviewer_id == r1.id)
        .unwrap();
    assert_eq!(riley.assigned, 2);
    assert_eq!(riley.completed, 1);
    assert_eq!(riley.pending, 1);
    assert_eq!(riley.completion_rate, 50);

    let sasha = progress
        .reviewer_workloads
        .iter()
        .find(|w| w.reviewer_id == r2.id)
        .unwrap();
    assert_eq!(sasha.completion_rate, 100);
}

// ── Reviewer suggestions ─────────────────────────────────────────────────────

#[tokio::test]
async fn suggestions_rank_keyword_match_highest() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let submission = seed_submission(&pool, &owner.id, &["quantum", "computing"], "CSE").await;

    let keyword_match = seed_reviewer(&pool, "kw@example.com", "Kim", &["quantum"]).await;
    let session_match = seed_reviewer(&pool, "se@example.com", "Lee", &["cse"]).await;
    let generalist = seed_reviewer(&pool, "ge@example.com", "Max", &["biology"]).await;

    let suggestions = reviews::suggest_reviewers(&pool, &submission.id).await.unwrap();
    assert_eq!(suggestions.len(), 3);

    assert_eq!(suggestions[0].reviewer_id, keyword_match.id);
    assert_eq!(suggestions[0].match_score, 3);
    assert_eq!(suggestions[0].reason, "Expertise matches submission keywords");

    assert_eq!(suggestions[1].reviewer_id, session_match.id);
    assert_eq!(suggestions[1].match_score, 2);

    assert_eq!(suggestions[2].reviewer_id, generalist.id);
    assert_eq!(suggestions[2].match_score, 1);
}

#[tokio::test]
async fn suggestions_exclude_assigned_and_cap_at_ten() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let submission = seed_submission(&pool, &owner.id, &[], "CSE").await;

    let mut reviewer_ids = Vec::new();
    for i in 0..12 {
        let reviewer = seed_reviewer(
            &pool,
            &format!("r{}@example.com", i),
            &format!("Rev{:02}", i),
            &[],
        )
        .await;
        reviewer_ids.push(reviewer.id);
    }

    reviews::assign(&pool, &submission.id, &reviewer_ids[0]).await.unwrap();

    let suggestions = reviews::suggest_reviewers(&pool, &submission.id).await.unwrap();
    assert_eq!(suggestions.len(), 10);
    assert!(suggestions.iter().all(|s| s.reviewer_id != reviewer_ids[0]));
}

#[tokio::test]
async fn suggestions_break_ties_on_open_assignments() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let target = seed_submission(&pool, &owner.id, &[], "CSE").await;
    let other = seed_submission(&pool, &owner.id, &[], "CHE").await;

    let busy = seed_reviewer(&pool, "busy@example.com", "Avery", &[]).await;
    let idle = seed_reviewer(&pool, "idle@example.com", "Blake", &[]).await;
    reviews::assign(&pool, &other.id, &busy.id).await.unwrap();

    let suggestions = reviews::suggest_reviewers(&pool, &target.id).await.unwrap();
    assert_eq!(suggestions[0].reviewer_id, idle.id);
    assert_eq!(suggestions[0].open_assignments, 0);
    assert_eq!(suggestions[1].reviewer_id, busy.id);
    assert_eq!(suggestions[1].open_assignments, 1);
}

#[tokio::test]
async fn suggestions_ignore_inactive_and_non_reviewers() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let submission = seed_submission(&pool, &owner.id, &[], "CSE").await;

    let inactive = seed_reviewer(&pool, "gone@example.com", "Gone", &[]).await;
    users::deactivate_user(&pool, &inactive.id).await.unwrap();
    seed_user(&pool, "plain@example.com", UserRole::Participant).await;
    let active = seed_reviewer(&pool, "here@example.com", "Here", &[]).await;

    let suggestions = reviews::suggest_reviewers(&pool, &submission.id).await.unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].reviewer_id, active.id);
}

// ── Payments ─────────────────────────────────────────────────────────────────

fn proof(amount: f64) -> NewPaymentProof {
    NewPaymentProof {
        amount,
        currency: "USD".to_string(),
        method: "bank_transfer".to_string(),
        reference: None,
        proof_file: "proof.pdf".to_string(),
    }
}

#[tokio::test]
async fn submit_proof_checks_registration_fee() {
    let pool = pool().await;
    let user = seed_user(&pool, "payer@example.com", UserRole::Participant).await;

    let err = payments::submit_proof(&pool, &user.id, proof(99.0)).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let record = payments::submit_proof(&pool, &user.id, proof(150.0)).await.unwrap();
    assert_eq!(record.status, PaymentRecordStatus::Pending);
    assert!(record.verified_by.is_none());
}

#[tokio::test]
async fn repeated_proofs_coexist_and_latest_wins() {
    let pool = pool().await;
    let user = seed_user(&pool, "payer@example.com", UserRole::Participant).await;

    let first = payments::submit_proof(&pool, &user.id, proof(150.0)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = payments::submit_proof(&pool, &user.id, proof(150.0)).await.unwrap();

    let all = payments::list_for_user(&pool, &user.id).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|r| r.status == PaymentRecordStatus::Pending));

    let latest = payments::latest_for_user(&pool, &user.id).await.unwrap().unwrap();
    assert_eq!(latest.id, second.id);
    assert_ne!(latest.id, first.id);
}

#[tokio::test]
async fn verify_stamps_admin_and_date() {
    let pool = pool().await;
    let user = seed_user(&pool, "payer@example.com", UserRole::Participant).await;
    let admin = seed_user(&pool, "admin@example.com", UserRole::Admin).await;
    let record = payments::submit_proof(&pool, &user.id, proof(150.0)).await.unwrap();

    let verified = payments::verify(&pool, &record.id, &admin.id, Some("ok".to_string()))
        .await
        .unwrap();

    assert_eq!(verified.status, PaymentRecordStatus::Verified);
    assert_eq!(verified.verified_by.as_deref(), Some(admin.id.as_str()));
    assert!(verified.verification_date.is_some());
    assert_eq!(verified.admin_notes.as_deref(), Some("ok"));
}

#[tokio::test]
async fn reject_requires_notes_and_keeps_pending() {
    let pool = pool().await;
    let user = seed_user(&pool, "payer@example.com", UserRole::Participant).await;
    let admin = seed_user(&pool, "admin@example.com", UserRole::Admin).await;
    let record = payments::submit_proof(&pool, &user.id, proof(150.0)).await.unwrap();

    let err = payments::reject(&pool, &record.id, &admin.id, "").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let reloaded = payments::get_record(&pool, &record.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, PaymentRecordStatus::Pending);

    let rejected = payments::reject(&pool, &record.id, &admin.id, "amount unreadable")
        .await
        .unwrap();
    assert_eq!(rejected.status, PaymentRecordStatus::Rejected);
    assert_eq!(rejected.admin_notes.as_deref(), Some("amount unreadable"));
}

#[tokio::test]
async fn processed_records_are_terminal() {
    let pool = pool().await;
    let user = seed_user(&pool, "payer@example.com", UserRole::Participant).await;
    let admin = seed_user(&pool, "admin@example.com", UserRole::Admin).await;
    let record = payments::submit_proof(&pool, &user.id, proof(150.0)).await.unwrap();

    payments::verify(&pool, &record.id, &admin.id, None).await.unwrap();

    let err = payments::verify(&pool, &record.id, &admin.id, None).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    let err = payments::reject(&pool, &record.id, &admin.id, "late").await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn transition_loses_to_a_faster_admin() {
    let pool = pool().await;
    let user = seed_user(&pool, "payer@example.com", UserRole::Participant).await;
    let admin = seed_user(&pool, "admin@example.com", UserRole::Admin).await;
    let record = payments::submit_proof(&pool, &user.id, proof(150.0)).await.unwrap();

    // Another admin got there first; the guarded UPDATE must match no row.
    sqlx::query("UPDATE payment_records SET status = 'verified' WHERE id = ?")
        .bind(&record.id)
        .execute(&pool)
        .await
        .unwrap();

    let err = payments::verify(&pool, &record.id, &admin.id, None).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn list_pending_skips_processed_records() {
    let pool = pool().await;
    let user = seed_user(&pool, "payer@example.com", UserRole::Participant).await;
    let admin = seed_user(&pool, "admin@example.com", UserRole::Admin).await;

    let first = payments::submit_proof(&pool, &user.id, proof(150.0)).await.unwrap();
    let second = payments::submit_proof(&pool, &user.id, proof(150.0)).await.unwrap();
    payments::verify(&pool, &first.id, &admin.id, None).await.unwrap();

    let pending = payments::list_pending(&pool).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second.id);
}

#[tokio::test]
async fn user_payment_status_transitions() {
    let pool = pool().await;
    let user = seed_user(&pool, "payer@example.com", UserRole::Participant).await;
    assert_eq!(user.payment_status, PaymentStatus::NotPaid);

    users::set_payment_status(&pool, &user.id, PaymentStatus::PaymentSubmitted)
        .await
        .unwrap();
    let reloaded = users::get_user(&pool, &user.id).await.unwrap().unwrap();
    assert_eq!(reloaded.payment_status, PaymentStatus::PaymentSubmitted);
}

// ── Review deletion ──────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_review_frees_the_slot() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let reviewer = seed_reviewer(&pool, "rev@example.com", "Riley", &[]).await;
    let submission = seed_submission(&pool, &owner.id, &[], "CSE").await;

    let review = reviews::assign(&pool, &submission.id, &reviewer.id).await.unwrap();
    reviews::delete_review(&pool, &review.id).await.unwrap();

    assert!(reviews::get_review(&pool, &review.id).await.unwrap().is_none());
    reviews::assign(&pool, &submission.id, &reviewer.id).await.unwrap();
}

#[tokio::test]
async fn delete_missing_review_is_not_found() {
    let pool = pool().await;
    let err = reviews::delete_review(&pool, "no-such-review").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn submission_status_counts_feed_progress() {
    let pool = pool().await;
    let owner = seed_user(&pool, "owner@example.com", UserRole::Presenter).await;
    let s1 = seed_submission(&pool, &owner.id, &[], "CSE").await;
    let s2 = seed_submission(&pool, &owner.id, &[], "CHE").await;
    seed_submission(&pool, &owner.id, &[], "BIO").await;

    submissions::update_status(&pool, &s1.id, SubmissionStatus::Accepted)
        .await
        .unwrap();
    submissions::update_status(&pool, &s2.id, SubmissionStatus::UnderReview)
        .await
        .unwrap();

    let progress = reviews::global_progress(&pool).await.unwrap();
    assert_eq!(progress.submissions_by_status.accepted, 1);
    assert_eq!(progress.submissions_by_status.under_review, 1);
    assert_eq!(progress.submissions_by_status.submitted, 1);
    assert_eq!(progress.submissions_by_status.rejected, 0);
}
