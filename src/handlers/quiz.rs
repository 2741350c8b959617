// src/handlers/quiz.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        quiz::{
            AnswerRow, CreateTestRequest, PublicAnswer, PublicQuestion, QuestionRow, Test,
            TestDetail, TestListParams,
        },
        statistic::LeaderboardEntry,
    },
    utils::jwt::Claims,
};

const LEADERBOARD_SIZE: i64 = 10;

/// Creates a test with all of its questions and answers.
///
/// Everything is inserted in one transaction; question order follows the request.
pub async fn create_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateTestRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;

    let mut tx = pool.begin().await?;

    let test_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO tests (title, subject, creator_id)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(&payload.title)
    .bind(&payload.subject)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create test: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    for (position, question) in payload.questions.iter().enumerate() {
        let question_id: i64 = sqlx::query_scalar(
            "INSERT INTO questions (test_id, content, position) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(test_id)
        .bind(&question.content)
        .bind(position as i32)
        .fetch_one(&mut *tx)
        .await?;

        let mut query_builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(
            "INSERT INTO answers (question_id, content, is_correct) ",
        );
        query_builder.push_values(&question.answers, |mut row, answer| {
            row.push_bind(question_id)
                .push_bind(answer.content.clone())
                .push_bind(answer.is_correct);
        });
        query_builder.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;

    tracing::info!(test_id, creator_id = user_id, "Test created");

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": test_id }))))
}

/// Lists tests, newest first, optionally filtered by subject.
pub async fn list_tests(
    State(pool): State<PgPool>,
    Query(params): Query<TestListParams>,
) -> Result<impl IntoResponse, AppError> {
    let tests = sqlx::query_as::<_, Test>(
        r#"
        SELECT id, title, subject, creator_id, created_at
        FROM tests
        WHERE ($1::TEXT IS NULL OR subject = $1)
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(params.subject)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list tests: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(tests))
}

/// Returns a test with its questions and candidate answers.
/// Correctness flags are not exposed.
pub async fn get_test(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let test = sqlx::query_as::<_, Test>(
        "SELECT id, title, subject, creator_id, created_at FROM tests WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Test not found".to_string()))?;

    let questions = sqlx::query_as::<_, QuestionRow>(
        "SELECT id, test_id, content, position FROM questions WHERE test_id = $1 ORDER BY position",
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    let answers = sqlx::query_as::<_, AnswerRow>(
        r#"
        SELECT a.id, a.question_id, a.content, a.is_correct
        FROM answers a
        JOIN questions q ON q.id = a.question_id
        WHERE q.test_id = $1
        ORDER BY a.id
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(assemble_detail(test, questions, answers)))
}

/// Groups answers under their questions, dropping the correctness flag.
fn assemble_detail(test: Test, questions: Vec<QuestionRow>, answers: Vec<AnswerRow>) -> TestDetail {
    let mut by_question: HashMap<i64, Vec<PublicAnswer>> = HashMap::new();
    for answer in answers {
        by_question
            .entry(answer.question_id)
            .or_default()
            .push(PublicAnswer {
                id: answer.id,
                content: answer.content,
            });
    }

    let questions = questions
        .into_iter()
        .map(|q| PublicQuestion {
            answers: by_question.remove(&q.id).unwrap_or_default(),
            id: q.id,
            content: q.content,
        })
        .collect();

    TestDetail { test, questions }
}

/// Best results for a test: highest score first, faster attempts break ties.
pub async fn get_leaderboard(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let leaderboard = sqlx::query_as::<_, LeaderboardEntry>(
        r#"
        SELECT u.username, s.score, s.time_spent, s.created_at
        FROM statistics s
        JOIN users u ON s.user_id = u.id
        WHERE s.test_id = $1
        ORDER BY s.score DESC, s.time_spent ASC, s.created_at ASC
        LIMIT $2
        "#,
    )
    .bind(id)
    .bind(LEADERBOARD_SIZE)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch leaderboard: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(leaderboard))
}
