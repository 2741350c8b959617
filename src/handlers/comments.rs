use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::comment::{CommentResponse, CreateCommentRequest},
    utils::{html::clean_comment, jwt::Claims},
};

/// Create a new comment on a test.
pub async fn create_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;

    let content = clean_comment(&payload.content);
    if content.is_empty() {
        return Err(AppError::BadRequest(
            "Comment is empty after sanitization".to_string(),
        ));
    }

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM tests WHERE id = $1")
        .bind(test_id)
        .fetch_optional(&pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    let new_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO comments (test_id, user_id, content)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(test_id)
    .bind(user_id)
    .bind(&content)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create comment: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": new_id })),
    ))
}

/// List all comments for a test, oldest first.
pub async fn list_comments(
    State(pool): State<PgPool>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let comments = sqlx::query_as::<_, CommentResponse>(
        r#"
        SELECT c.id, c.test_id, c.user_id, u.username, c.content, c.created_at
        FROM comments c
        JOIN users u ON c.user_id = u.id
        WHERE c.test_id = $1
        ORDER BY c.created_at ASC, c.id ASC
        "#,
    )
    .bind(test_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(comments))
}
