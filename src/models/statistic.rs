// src/models/statistic.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'statistics' table: the outcome of one submission.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Statistic {
    pub id: i64,
    pub user_id: i64,
    pub test_id: i64,
    /// Percentage in 0..=100, derived from `correct_count / total_count`.
    pub score: i32,
    pub time_spent: i32,
    pub correct_count: i32,
    pub total_count: i32,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'statistic_answers' table: one graded question of a submission.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: i64,
    pub statistic_id: i64,
    pub question_id: i64,
    /// The learner's selection as a JSON array of ascending answer ids.
    pub answer_ids: String,
    pub is_correct: bool,
}

/// Statistic row about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStatistic {
    pub user_id: i64,
    pub test_id: i64,
    pub score: i32,
    pub time_spent: i32,
    pub correct_count: i32,
    pub total_count: i32,
}

/// Answer record about to be inserted; the owning statistic id is supplied at write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnswerRecord {
    pub question_id: i64,
    pub answer_ids: String,
    pub is_correct: bool,
}

/// A statistic row joined with the test title, for "my results" listings.
#[derive(Debug, Serialize, FromRow)]
pub struct StatisticSummary {
    pub id: i64,
    pub test_id: i64,
    pub test_title: String,
    pub score: i32,
    pub time_spent: i32,
    pub correct_count: i32,
    pub total_count: i32,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct StatisticDetail {
    #[serde(flatten)]
    pub statistic: Statistic,
    pub answers: Vec<AnswerRecord>,
}

/// Aggregated struct for displaying a test's leaderboard.
#[derive(Debug, Serialize, FromRow)]
pub struct LeaderboardEntry {
    pub username: String,
    pub score: i32,
    pub time_spent: i32,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}
