use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{Author, PresentationType, Submission, SubmissionStatus};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAuthor {
    pub name: String,
    #[serde(default)]
    pub affiliation: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_corresponding: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubmission {
    pub user_id: String,
    pub title: String,
    pub abstract_md: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub session_type: String,
    pub presentation_type: PresentationType,
    pub authors: Vec<NewAuthor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPatch {
    pub title: Option<String>,
    pub abstract_md: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub session_type: Option<String>,
    pub presentation_type: Option<PresentationType>,
    pub manuscript_file: Option<String>,
}

impl SubmissionPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.abstract_md.is_none()
            && self.keywords.is_none()
            && self.session_type.is_none()
            && self.presentation_type.is_none()
            && self.manuscript_file.is_none()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionWithAuthors {
    #[serde(flatten)]
    pub submission: Submission,
    pub authors: Vec<Author>,
}

/// Minimal markdown rendering for the cached abstract HTML: escaping,
/// bold/italic spans and paragraph breaks. Full document rendering is the
/// abstract-book pipeline's job, not this service's.
pub fn render_abstract_html(markdown: &str) -> String {
    let escaped = markdown
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");

    let bold = Regex::new(r"\*\*([^*]+)\*\*").unwrap();
    let italic = Regex::new(r"\*([^*]+)\*").unwrap();

    escaped
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let p = bold.replace_all(p, "<strong>$1</strong>");
            let p = italic.replace_all(&p, "<em>$1</em>");
            format!("<p>{}</p>", p)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn create_submission(pool: &SqlitePool, input: NewSubmission) -> Result<Submission> {
    let corresponding = input.authors.iter().filter(|a| a.is_corresponding).count();
    if corresponding != 1 {
        return Err(Error::Validation(format!(
            "a submission needs exactly one corresponding author, got {}",
            corresponding
        )));
    }

    let owner_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
        .bind(&input.user_id)
        .fetch_one(pool)
        .await?;
    if !owner_exists {
        return Err(Error::not_found("user", &input.user_id));
    }

    let now = Utc::now();
    let submission = Submission {
        id: Uuid::new_v4().to_string(),
        user_id: input.user_id,
        title: input.title,
        abstract_html: render_abstract_html(&input.abstract_md),
        abstract_md: input.abstract_md,
        keywords: Json(input.keywords),
        session_type: input.session_type,
        presentation_type: input.presentation_type,
        status: SubmissionStatus::Submitted,
        manuscript_file: None,
        created_at: now,
        updated_at: now,
    };

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO submissions (id, user_id, title, abstract_md, abstract_html,
                                 keywords, session_type, presentation_type,
                                 status, manuscript_file, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&submission.id)
    .bind(&submission.user_id)
    .bind(&submission.title)
    .bind(&submission.abstract_md)
    .bind(&submission.abstract_html)
    .bind(&submission.keywords)
    .bind(&submission.session_type)
    .bind(submission.presentation_type)
    .bind(submission.status)
    .bind(&submission.manuscript_file)
    .bind(submission.created_at)
    .bind(submission.updated_at)
    .execute(&mut *tx)
    .await?;

    for (position, author) in input.authors.iter().enumerate() {
        sqlx::query(
            "INSERT INTO authors (id, submission_id, name, affiliation, email, is_corresponding, position)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&submission.id)
        .bind(&author.name)
        .bind(&author.affiliation)
        .bind(&author.email)
        .bind(author.is_corresponding)
        .bind(position as i64)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(submission)
}

pub async fn get_submission(pool: &SqlitePool, id: &str) -> Result<Option<Submission>> {
    let submission = sqlx::query_as::<_, Submission>("SELECT * FROM submissions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(submission)
}

pub async fn list_authors(pool: &SqlitePool, submission_id: &str) -> Result<Vec<Author>> {
    let authors = sqlx::query_as::<_, Author>(
        "SELECT * FROM authors WHERE submission_id = ? ORDER BY position",
    )
    .bind(submission_id)
    .fetch_all(pool)
    .await?;
    Ok(authors)
}

pub async fn get_submission_with_authors(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<SubmissionWithAuthors>> {
    let submission = match get_submission(pool, id).await? {
        Some(s) => s,
        None => return Ok(None),
    };
    let authors = list_authors(pool, id).await?;
    Ok(Some(SubmissionWithAuthors {
        submission,
        authors,
    }))
}

pub async fn list_submissions(
    pool: &SqlitePool,
    status: Option<SubmissionStatus>,
) -> Result<Vec<Submission>> {
    let submissions = match status {
        Some(status) => {
            sqlx::query_as::<_, Submission>(
                "SELECT * FROM submissions WHERE status = ? ORDER BY created_at DESC",
            )
            .bind(status)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Submission>("SELECT * FROM submissions ORDER BY created_at DESC")
                .fetch_all(pool)
                .await?
        }
    };
    Ok(submissions)
}

pub async fn update_status(
    pool: &SqlitePool,
    id: &str,
    status: SubmissionStatus,
) -> Result<()> {
    let result = sqlx::query("UPDATE submissions SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found("submission", id));
    }
    Ok(())
}

pub async fn update_submission(
    pool: &SqlitePool,
    id: &str,
    patch: SubmissionPatch,
) -> Result<Submission> {
    let current = get_submission(pool, id)
        .await?
        .ok_or_else(|| Error::not_found("submission", id))?;

    if patch.is_empty() {
        return Ok(current);
    }

    let title = patch.title.unwrap_or(current.title);
    // Re-render the HTML cache whenever the markdown source changes.
    let (abstract_md, abstract_html) = match patch.abstract_md {
        Some(md) => {
            let html = render_abstract_html(&md);
            (md, html)
        }
        None => (current.abstract_md, current.abstract_html),
    };
    let keywords = patch.keywords.map(Json).unwrap_or(current.keywords);
    let session_type = patch.session_type.unwrap_or(current.session_type);
    let presentation_type = patch
        .presentation_type
        .unwrap_or(current.presentation_type);
    let manuscript_file = match patch.manuscript_file {
        Some(f) => Some(f),
        None => current.manuscript_file,
    };
    let updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE submissions
        SET title = ?, abstract_md = ?, abstract_html = ?, keywords = ?,
            session_type = ?, presentation_type = ?, manuscript_file = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&title)
    .bind(&abstract_md)
    .bind(&abstract_html)
    .bind(&keywords)
    .bind(&session_type)
    .bind(presentation_type)
    .bind(&manuscript_file)
    .bind(updated_at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(Submission {
        title,
        abstract_md,
        abstract_html,
        keywords,
        session_type,
        presentation_type,
        manuscript_file,
        updated_at,
        ..current
    })
}
