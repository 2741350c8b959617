// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::{Validate, ValidationError};

/// Represents the 'tests' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Test {
    pub id: i64,
    pub title: String,
    pub subject: String,
    /// User who authored the test.
    pub creator_id: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Row of the 'questions' table.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub test_id: i64,
    pub content: String,
    pub position: i32,
}

/// Row of the 'answers' table.
#[derive(Debug, Clone, FromRow)]
pub struct AnswerRow {
    pub id: i64,
    pub question_id: i64,
    pub content: String,
    pub is_correct: bool,
}

/// Answer as shown to a learner. The correctness flag never leaves the server.
#[derive(Debug, Serialize)]
pub struct PublicAnswer {
    pub id: i64,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub content: String,
    pub answers: Vec<PublicAnswer>,
}

/// A test with its questions, ready to be taken.
#[derive(Debug, Serialize)]
pub struct TestDetail {
    #[serde(flatten)]
    pub test: Test,
    pub questions: Vec<PublicQuestion>,
}

/// Query parameters for listing tests.
#[derive(Debug, Deserialize)]
pub struct TestListParams {
    pub subject: Option<String>,
}

/// DTO for authoring a test together with all its questions.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTestRequest {
    #[validate(length(min = 1, max = 200, message = "Title length must be between 1 and 200 chars"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "Subject length must be between 1 and 100 chars"))]
    pub subject: String,
    #[validate(custom(function = validate_questions))]
    pub questions: Vec<CreateQuestionRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateQuestionRequest {
    pub content: String,
    pub answers: Vec<CreateAnswerRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAnswerRequest {
    pub content: String,
    #[serde(default)]
    pub is_correct: bool,
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

/// Every question needs text, at least one answer and at least one correct answer.
fn validate_questions(questions: &[CreateQuestionRequest]) -> Result<(), ValidationError> {
    if questions.is_empty() {
        return Err(invalid("questions_empty", "A test needs at least one question"));
    }
    for question in questions {
        if question.content.is_empty() || question.content.len() > 1000 {
            return Err(invalid(
                "question_length",
                "Question text must be between 1 and 1000 chars",
            ));
        }
        if question.answers.is_empty() {
            return Err(invalid("answers_empty", "Every question needs at least one answer"));
        }
        if !question.answers.iter().any(|a| a.is_correct) {
            return Err(invalid(
                "no_correct_answer",
                "Every question needs at least one correct answer",
            ));
        }
        if question
            .answers
            .iter()
            .any(|a| a.content.is_empty() || a.content.len() > 500)
        {
            return Err(invalid(
                "answer_length",
                "Answer text must be between 1 and 500 chars",
            ));
        }
    }
    Ok(())
}
