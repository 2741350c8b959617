// src/models/submission.rs

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Raw body of `POST /api/submit`.
///
/// Every field is optional at the serde level so that missing values surface
/// as validation errors with a readable message instead of a framework rejection.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SubmitRequest {
    pub user_id: Option<i64>,
    pub test_id: Option<i64>,

    /// Seconds the learner spent on the test.
    #[validate(range(min = 0, message = "time_spent must not be negative"))]
    pub time_spent: Option<i32>,

    pub answers: Option<Vec<SubmittedAnswer>>,
}

/// One question's selection, as sent by the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: Option<i64>,
    pub answer_ids: Option<Vec<i64>>,
}

/// A submission that passed validation. Ids are typed and selections are sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub user_id: i64,
    pub test_id: i64,
    pub time_spent: i32,
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub question_id: i64,
    pub answer_ids: BTreeSet<i64>,
}

impl Submission {
    pub fn question_ids(&self) -> Vec<i64> {
        self.selections.iter().map(|s| s.question_id).collect()
    }
}

/// Successful response of `POST /api/submit`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitResponse {
    pub message: String,
    pub score: i32,
    pub total: i32,
    pub correct: i32,
    pub statistic_id: i64,
}
