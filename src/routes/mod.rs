pub mod conferences;
pub mod payments;
pub mod reviews;
pub mod submissions;
pub mod users;


use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::Error;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Users
        .route("/api/users", post(users::register))
        .route("/api/users/reviewers", get(users::list_reviewers))
        .route("/api/users/:id", get(users::get_user))
        .route("/api/users/:id", put(users::update_user))
        .route("/api/users/:id", delete(users::deactivate_user))
        // Conferences
        .route("/api/conferences", post(conferences::create_conference))
        .route("/api/conferences/active", get(conferences::active_conference))
        .route("/api/conferences/:id", put(conferences::update_conference))
        .route("/api/conferences/:id/sessions", post(conferences::add_session))
        .route("/api/conferences/:id/sessions", get(conferences::list_sessions))
        .route("/api/sessions/:id/schedule", post(conferences::add_schedule_entry))
        .route("/api/sessions/:id/schedule", get(conferences::list_schedule))
        .route("/api/conferences/:id/fees", put(conferences::set_fee))
        .route("/api/conferences/:id/fees", get(conferences::list_fees))
        .route(
            "/api/conferences/:id/payment-instructions",
            put(conferences::upsert_payment_instructions),
        )
        .route(
            "/api/conferences/:id/payment-instructions",
            get(conferences::get_payment_instructions),
        )
        .route(
            "/api/conferences/:id/payment-instructions",
            delete(conferences::delete_payment_instructions),
        )
        // Submissions
        .route("/api/submissions", post(submissions::create_submission))
        .route("/api/submissions", get(submissions::list_submissions))
        .route("/api/submissions/:id", get(submissions::get_submission))
        .route("/api/submissions/:id", put(submissions::update_submission))
        .route("/api/submissions/:id/status", put(submissions::update_status))
        // Reviews
        .route("/api/reviews/assign", post(reviews::assign))
        .route("/api/reviews", post(reviews::submit_review))
        .route("/api/reviews/suggestions/:submission_id", get(reviews::suggestions))
        .route("/api/reviews/progress/overview", get(reviews::progress_overview))
        .route(
            "/api/reviews/submission/:submission_id",
            get(reviews::submission_reviews),
        )
        .route(
            "/api/reviews/submission/:submission_id/stats",
            get(reviews::submission_stats),
        )
        .route("/api/reviews/:id", put(reviews::complete_review))
        .route("/api/reviews/:id", delete(reviews::delete_review))
        // Payments
        .route("/api/payments/submit-proof", post(payments::submit_proof))
        .route("/api/payments/instructions", get(payments::instructions))
        .route("/api/payments/user/:user_id", get(payments::user_payments))
        .route("/api/payments/admin/pending", get(payments::pending_payments))
        .route("/api/payments/admin/:id/verify", put(payments::verify))
        .route("/api/payments/admin/:id/reject", put(payments::reject))
        .route(
            "/api/payments/admin/proof/:filename",
            get(payments::download_proof),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Standard response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            timestamp: Utc::now(),
        })
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::DuplicateAssignment { .. } | Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let Error::Database(e) = &self {
            tracing::error!("database error: {}", e);
        }

        let body = json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            },
            "timestamp": Utc::now(),
        });

        (status, Json(body)).into_response()
    }
}
