//! Review assignment, completion and progress reporting.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{Recommendation, Review, SubmissionStatus, User};
use crate::db::{submissions, users};
use crate::error::{Error, Result};

const MAX_SUGGESTIONS: usize = 10;
const MIN_SCORE: i64 = 1;
const MAX_SCORE: i64 = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPatch {
    pub score: Option<i64>,
    pub comments: Option<String>,
    pub recommendation: Option<Recommendation>,
}

impl ReviewPatch {
    pub fn is_empty(&self) -> bool {
        self.score.is_none() && self.comments.is_none() && self.recommendation.is_none()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDirectReview {
    pub submission_id: String,
    pub reviewer_id: String,
    pub score: i64,
    pub comments: Option<String>,
    pub recommendation: Option<Recommendation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReviewStats {
    pub total_reviews: i64,
    pub completed_reviews: i64,
    pub average_score: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionStatusCounts {
    pub submitted: i64,
    pub under_review: i64,
    pub accepted: i64,
    pub rejected: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerWorkload {
    pub reviewer_id: String,
    pub name: String,
    pub assigned: i64,
    pub completed: i64,
    pub pending: i64,
    /// Percentage, rounded to the nearest integer.
    pub completion_rate: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewProgress {
    pub total_assignments: i64,
    pub completed_reviews: i64,
    pub pending_reviews: i64,
    /// Percentage, rounded to two decimals; 0 when nothing is assigned.
    pub completion_percentage: f64,
    pub submissions_by_status: SubmissionStatusCounts,
    pub reviewer_workloads: Vec<ReviewerWorkload>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerSuggestion {
    pub reviewer_id: String,
    pub first_name: String,
    pub last_name: String,
    pub affiliation: String,
    pub match_score: i64,
    pub reason: String,
    pub open_assignments: i64,
}

fn validate_score(score: i64) -> Result<()> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(Error::Validation(format!(
            "score must be between {} and {}, got {}",
            MIN_SCORE, MAX_SCORE, score
        )));
    }
    Ok(())
}

async fn reviewer_for_assignment(pool: &SqlitePool, reviewer_id: &str) -> Result<User> {
    let reviewer = users::get_user(pool, reviewer_id)
        .await?
        .ok_or_else(|| Error::not_found("user", reviewer_id))?;

    if !reviewer.is_active {
        return Err(Error::Validation(format!(
            "user {} is deactivated and cannot review",
            reviewer_id
        )));
    }
    if !reviewer.role.can_review() {
        return Err(Error::Validation(format!(
            "user {} does not hold a reviewer-capable role",
            reviewer_id
        )));
    }
    Ok(reviewer)
}

async fn insert_review(pool: &SqlitePool, review: &Review) -> Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO reviews (id, submission_id, reviewer_id, score, comments,
                             recommendation, is_completed, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&review.id)
    .bind(&review.submission_id)
    .bind(&review.reviewer_id)
    .bind(review.score)
    .bind(&review.comments)
    .bind(review.recommendation)
    .bind(review.is_completed)
    .bind(review.created_at)
    .bind(review.updated_at)
    .execute(pool)
    .await;

    // The unique index on (submission_id, reviewer_id) is the duplicate guard;
    // a violation means this pair already has a review row.
    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            Err(Error::DuplicateAssignment {
                submission_id: review.submission_id.clone(),
                reviewer_id: review.reviewer_id.clone(),
            })
        }
        Err(e) => Err(Error::Database(e)),
    }
}

/// Assign a reviewer: creates an empty, incomplete review row.
pub async fn assign(pool: &SqlitePool, submission_id: &str, reviewer_id: &str) -> Result<Review> {
    submissions::get_submission(pool, submission_id)
        .await?
        .ok_or_else(|| Error::not_found("submission", submission_id))?;
    reviewer_for_assignment(pool, reviewer_id).await?;

    let now = Utc::now();
    let review = Review {
        id: Uuid::new_v4().to_string(),
        submission_id: submission_id.to_string(),
        reviewer_id: reviewer_id.to_string(),
        score: None,
        comments: None,
        recommendation: None,
        is_completed: false,
        created_at: now,
        updated_at: now,
    };

    insert_review(pool, &review).await?;
    Ok(review)
}

/// Direct submission path: a reviewer files a completed review without a
/// prior assignment row.
pub async fn submit_review(pool: &SqlitePool, input: NewDirectReview) -> Result<Review> {
    validate_score(input.score)?;
    submissions::get_submission(pool, &input.submission_id)
        .await?
        .ok_or_else(|| Error::not_found("submission", &input.submission_id))?;
    reviewer_for_assignment(pool, &input.reviewer_id).await?;

    let now = Utc::now();
    let review = Review {
        id: Uuid::new_v4().to_string(),
        submission_id: input.submission_id,
        reviewer_id: input.reviewer_id,
        score: Some(input.score),
        comments: input.comments,
        recommendation: input.recommendation,
        is_completed: true,
        created_at: now,
        updated_at: now,
    };

    insert_review(pool, &review).await?;
    Ok(review)
}

pub async fn is_reviewer_assigned(
    pool: &SqlitePool,
    submission_id: &str,
    reviewer_id: &str,
) -> Result<bool> {
    let assigned: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM reviews WHERE submission_id = ? AND reviewer_id = ?)",
    )
    .bind(submission_id)
    .bind(reviewer_id)
    .fetch_one(pool)
    .await?;
    Ok(assigned)
}

pub async fn get_review(pool: &SqlitePool, id: &str) -> Result<Option<Review>> {
    let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(review)
}

pub async fn list_for_submission(pool: &SqlitePool, submission_id: &str) -> Result<Vec<Review>> {
    let reviews = sqlx::query_as::<_, Review>(
        "SELECT * FROM reviews WHERE submission_id = ? ORDER BY created_at",
    )
    .bind(submission_id)
    .fetch_all(pool)
    .await?;
    Ok(reviews)
}

/// Fill in score/comments/recommendation and mark the review completed.
///
/// Only fields present in the patch are written; `is_completed` and
/// `updated_at` are always forced. An empty patch writes nothing and returns
/// the current row, completed or not.
pub async fn complete_review(pool: &SqlitePool, id: &str, patch: ReviewPatch) -> Result<Review> {
    let current = get_review(pool, id)
        .await?
        .ok_or_else(|| Error::not_found("review", id))?;

    if patch.is_empty() {
        return Ok(current);
    }

    if let Some(score) = patch.score {
        validate_score(score)?;
    }

    let score = patch.score.or(current.score);
    let comments = patch.comments.or(current.comments);
    let recommendation = patch.recommendation.or(current.recommendation);
    let updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE reviews
        SET score = ?, comments = ?, recommendation = ?, is_completed = 1, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(score)
    .bind(&comments)
    .bind(recommendation)
    .bind(updated_at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(Review {
        score,
        comments,
        recommendation,
        is_completed: true,
        updated_at,
        ..current
    })
}

pub async fn delete_review(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM reviews WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found("review", id));
    }
    Ok(())
}

/// Per-submission review counts; the average covers completed reviews only.
pub async fn submission_stats(
    pool: &SqlitePool,
    submission_id: &str,
) -> Result<SubmissionReviewStats> {
    let (total_reviews, completed_reviews, average_score): (i64, i64, Option<f64>) =
        sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(is_completed), 0),
                   AVG(CASE WHEN is_completed = 1 THEN score END)
            FROM reviews
            WHERE submission_id = ?
            "#,
        )
        .bind(submission_id)
        .fetch_one(pool)
        .await?;

    Ok(SubmissionReviewStats {
        total_reviews,
        completed_reviews,
        average_score,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Dashboard aggregate: totals, completion percentage, submission status
/// breakdown and per-reviewer workload.
pub async fn global_progress(pool: &SqlitePool) -> Result<ReviewProgress> {
    let (total_assignments, completed_reviews): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(is_completed), 0) FROM reviews",
    )
    .fetch_one(pool)
    .await?;

    let pending_reviews = total_assignments - completed_reviews;
    let completion_percentage = if total_assignments == 0 {
        0.0
    } else {
        round2(completed_reviews as f64 / total_assignments as f64 * 100.0)
    };

    let status_rows: Vec<(SubmissionStatus, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM submissions GROUP BY status")
            .fetch_all(pool)
            .await?;

    let mut submissions_by_status = SubmissionStatusCounts {
        submitted: 0,
        under_review: 0,
        accepted: 0,
        rejected: 0,
    };
    for (status, count) in status_rows {
        match status {
            SubmissionStatus::Submitted => submissions_by_status.submitted = count,
            SubmissionStatus::UnderReview => submissions_by_status.under_review = count,
            SubmissionStatus::Accepted => submissions_by_status.accepted = count,
            SubmissionStatus::Rejected => submissions_by_status.rejected = count,
        }
    }

    let workload_rows: Vec<(String, String, String, i64, i64)> = sqlx::query_as(
        r#"
        SELECT u.id, u.first_name, u.last_name,
               COUNT(r.id),
               COALESCE(SUM(r.is_completed), 0)
        FROM users u
        JOIN reviews r ON r.reviewer_id = u.id
        GROUP BY u.id, u.first_name, u.last_name
        ORDER BY u.first_name, u.last_name
        "#,
    )
    .fetch_all(pool)
    .await?;

    let reviewer_workloads = workload_rows
        .into_iter()
        .map(|(reviewer_id, first_name, last_name, assigned, completed)| {
            let completion_rate = if assigned == 0 {
                0
            } else {
                (completed as f64 / assigned as f64 * 100.0).round() as i64
            };
            ReviewerWorkload {
                reviewer_id,
                name: format!("{} {}", first_name, last_name),
                assigned,
                completed,
                pending: assigned - completed,
                completion_rate,
            }
        })
        .collect();

    Ok(ReviewProgress {
        total_assignments,
        completed_reviews,
        pending_reviews,
        completion_percentage,
        submissions_by_status,
        reviewer_workloads,
    })
}

/// Heuristic expertise-match ranking; no global balancing across submissions.
///
/// Score 3: expertise intersects the submission keywords. Score 2: expertise
/// covers the session track. Score 1: everyone else. Ties break on fewer open
/// assignments, then first name.
pub async fn suggest_reviewers(
    pool: &SqlitePool,
    submission_id: &str,
) -> Result<Vec<ReviewerSuggestion>> {
    let submission = submissions::get_submission(pool, submission_id)
        .await?
        .ok_or_else(|| Error::not_found("submission", submission_id))?;

    let keywords: HashSet<String> = submission
        .keywords
        .0
        .iter()
        .map(|k| k.trim().to_lowercase())
        .collect();
    let session_type = submission.session_type.trim().to_lowercase();

    let candidates = sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users
        WHERE role = 'reviewer' AND is_active = 1
          AND id NOT IN (SELECT reviewer_id FROM reviews WHERE submission_id = ?)
        "#,
    )
    .bind(submission_id)
    .fetch_all(pool)
    .await?;

    let open_rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT reviewer_id, COUNT(*) FROM reviews WHERE is_completed = 0 GROUP BY reviewer_id",
    )
    .fetch_all(pool)
    .await?;
    let open_counts: HashMap<String, i64> = open_rows.into_iter().collect();

    let mut suggestions: Vec<ReviewerSuggestion> = candidates
        .into_iter()
        .map(|user| {
            let expertise: HashSet<String> = user
                .expertise
                .0
                .iter()
                .map(|e| e.trim().to_lowercase())
                .collect();

            let (match_score, reason) = if !expertise.is_disjoint(&keywords) {
                (3, "Expertise matches submission keywords".to_string())
            } else if !session_type.is_empty() && expertise.contains(&session_type) {
                (2, "Expertise matches session track".to_string())
            } else {
                (1, "General reviewer".to_string())
            };

            let open_assignments = open_counts.get(&user.id).copied().unwrap_or(0);

            ReviewerSuggestion {
                reviewer_id: user.id,
                first_name: user.first_name,
                last_name: user.last_name,
                affiliation: user.affiliation,
                match_score,
                reason,
                open_assignments,
            }
        })
        .collect();

    suggestions.sort_by(|a, b| {
        b.match_score
            .cmp(&a.match_score)
            .then(a.open_assignments.cmp(&b.open_assignments))
            .then_with(|| a.first_name.cmp(&b.first_name))
    });
    suggestions.truncate(MAX_SUGGESTIONS);

    Ok(suggestions)
}
