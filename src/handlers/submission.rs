// src/handlers/submission.rs

use std::sync::Arc;

use axum::{Json, extract::State, extract::rejection::JsonRejection};

use crate::{
    error::AppError,
    models::submission::{SubmitRequest, SubmitResponse},
    services::{
        scorer::{score_submission, validate_submission},
        store::SubmissionStore,
    },
};

/// Scores a learner's answers for a test and records the result.
///
/// * Rejects malformed or incomplete bodies with 400 before touching storage.
/// * Grades each question by exact set equality against its correct answers.
/// * Stores one statistic and one answer record per question in a single transaction.
pub async fn submit(
    State(store): State<Arc<dyn SubmissionStore>>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, AppError> {
    let Json(req) = payload?;
    let submission = validate_submission(req)?;

    let report = score_submission(store.as_ref(), &submission)
        .await
        .map_err(|e| {
            tracing::error!(
                user_id = submission.user_id,
                test_id = submission.test_id,
                "Failed to score submission: {}",
                e
            );
            AppError::from(e)
        })?;

    Ok(Json(SubmitResponse {
        message: "Test submitted successfully".to_string(),
        score: report.score,
        total: report.total,
        correct: report.correct,
        statistic_id: report.statistic_id,
    }))
}
