use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::statistic::{AnswerRecord, Statistic, StatisticDetail, StatisticSummary},
    utils::jwt::Claims,
};

/// Lists the current user's results, newest first.
pub async fn list_my_statistics(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let list = sqlx::query_as::<_, StatisticSummary>(
        r#"
        SELECT
            s.id, s.test_id, t.title as test_title, s.score, s.time_spent,
            s.correct_count, s.total_count, s.created_at
        FROM statistics s
        JOIN tests t ON t.id = s.test_id
        WHERE s.user_id = $1
        ORDER BY s.created_at DESC, s.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(list))
}

/// One result with the per-question answer records. Only the owner may read it.
pub async fn get_statistic(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let statistic = sqlx::query_as::<_, Statistic>(
        r#"
        SELECT id, user_id, test_id, score, time_spent, correct_count, total_count, created_at
        FROM statistics
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Statistic not found".to_string()))?;

    if statistic.user_id != user_id {
        return Err(AppError::Forbidden(
            "You are not allowed to view this result".to_string(),
        ));
    }

    let answers = sqlx::query_as::<_, AnswerRecord>(
        r#"
        SELECT id, statistic_id, question_id, answer_ids, is_correct
        FROM statistic_answers
        WHERE statistic_id = $1
        ORDER BY id
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(StatisticDetail { statistic, answers }))
}
