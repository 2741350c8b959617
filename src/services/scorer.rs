// src/services/scorer.rs

//! Grading and persistence of test submissions.
//!
//! A submission goes through three sequential stages: the answer key is
//! fetched for the submitted questions, every question is graded against it,
//! and the statistic plus one answer record per question are written in a
//! single transaction.

use std::collections::BTreeSet;
use std::fmt;

use validator::Validate;

use crate::{
    models::{
        statistic::{NewAnswerRecord, NewStatistic},
        submission::{Selection, SubmitRequest, Submission},
    },
    services::store::{AnswerKey, SubmissionStore},
};

#[derive(Debug)]
pub enum ScoreError {
    /// The submission is malformed; nothing was written.
    Validation(String),
    /// A storage operation failed; the transaction was rolled back.
    Persistence(sqlx::Error),
}

impl fmt::Display for ScoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreError::Validation(msg) => write!(f, "invalid submission: {}", msg),
            ScoreError::Persistence(err) => write!(f, "failed to persist submission: {}", err),
        }
    }
}

impl std::error::Error for ScoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScoreError::Validation(_) => None,
            ScoreError::Persistence(err) => Some(err),
        }
    }
}

impl From<sqlx::Error> for ScoreError {
    fn from(err: sqlx::Error) -> Self {
        ScoreError::Persistence(err)
    }
}

/// Outcome of a scored and stored submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreReport {
    pub statistic_id: i64,
    pub score: i32,
    pub correct: i32,
    pub total: i32,
}

/// Statistic and answer records computed for a submission, not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graded {
    pub statistic: NewStatistic,
    pub records: Vec<NewAnswerRecord>,
}

/// Checks the raw request and turns it into a typed [`Submission`].
///
/// The whole submission is rejected if any element is incomplete.
pub fn validate_submission(req: SubmitRequest) -> Result<Submission, ScoreError> {
    req.validate()
        .map_err(|e| ScoreError::Validation(e.to_string()))?;

    let user_id = req
        .user_id
        .ok_or_else(|| ScoreError::Validation("user_id is required".to_string()))?;
    let test_id = req
        .test_id
        .ok_or_else(|| ScoreError::Validation("test_id is required".to_string()))?;
    let answers = req
        .answers
        .ok_or_else(|| ScoreError::Validation("answers is required".to_string()))?;

    if answers.is_empty() {
        return Err(ScoreError::Validation(
            "answers must contain at least one question".to_string(),
        ));
    }

    let mut selections = Vec::with_capacity(answers.len());
    for (index, answer) in answers.into_iter().enumerate() {
        let question_id = answer.question_id.ok_or_else(|| {
            ScoreError::Validation(format!("answers[{}].question_id is required", index))
        })?;
        let answer_ids: BTreeSet<i64> = answer
            .answer_ids
            .unwrap_or_default()
            .into_iter()
            .collect();
        if answer_ids.is_empty() {
            return Err(ScoreError::Validation(format!(
                "answers[{}].answer_ids must not be empty",
                index
            )));
        }
        selections.push(Selection {
            question_id,
            answer_ids,
        });
    }

    Ok(Submission {
        user_id,
        test_id,
        time_spent: req.time_spent.unwrap_or(0),
        selections,
    })
}

/// A selection is correct only when it matches the correct set exactly.
/// A question with no known correct answers can never be answered correctly.
pub fn is_correct(selected: &BTreeSet<i64>, correct: Option<&BTreeSet<i64>>) -> bool {
    match correct {
        Some(correct) => !correct.is_empty() && selected == correct,
        None => false,
    }
}

/// `round(100 * correct / total)`, rounding half away from zero.
pub fn percentage(correct: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    (100.0 * correct as f64 / total as f64).round() as i32
}

/// Grades every selection of `submission` against `key`.
pub fn grade(submission: &Submission, key: &AnswerKey) -> Result<Graded, serde_json::Error> {
    let mut records = Vec::with_capacity(submission.selections.len());
    let mut correct_count = 0usize;

    for selection in &submission.selections {
        let is_correct = is_correct(&selection.answer_ids, key.get(&selection.question_id));
        if is_correct {
            correct_count += 1;
        }
        records.push(NewAnswerRecord {
            question_id: selection.question_id,
            answer_ids: serde_json::to_string(&selection.answer_ids)?,
            is_correct,
        });
    }

    let total = submission.selections.len();
    Ok(Graded {
        statistic: NewStatistic {
            user_id: submission.user_id,
            test_id: submission.test_id,
            score: percentage(correct_count, total),
            time_spent: submission.time_spent,
            correct_count: correct_count as i32,
            total_count: total as i32,
        },
        records,
    })
}

/// Scores `submission` and stores the result atomically.
pub async fn score_submission(
    store: &dyn SubmissionStore,
    submission: &Submission,
) -> Result<ScoreReport, ScoreError> {
    let key = store
        .correct_answers(submission.test_id, &submission.question_ids())
        .await?;

    let graded = grade(submission, &key)
        .map_err(|e| ScoreError::Persistence(sqlx::Error::Encode(Box::new(e))))?;

    let mut writer = store.begin().await?;
    let statistic_id = writer.insert_statistic(&graded.statistic).await?;
    writer
        .insert_answer_records(statistic_id, &graded.records)
        .await?;
    writer.commit().await?;

    tracing::info!(
        statistic_id,
        user_id = submission.user_id,
        test_id = submission.test_id,
        score = graded.statistic.score,
        "Submission scored"
    );

    Ok(ScoreReport {
        statistic_id,
        score: graded.statistic.score,
        correct: graded.statistic.correct_count,
        total: graded.statistic.total_count,
    })
}
