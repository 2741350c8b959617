// src/handlers/profile.rs

use std::path::{Path, PathBuf};

use axum::{
    Extension, Json,
    extract::{Multipart, State, rejection::JsonRejection},
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{MeResponse, UpdateProfileRequest, User},
    utils::{hash::hash_password, jwt::Claims},
};

/// Largest accepted avatar image.
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

/// Get current user's profile and statistics.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let me = sqlx::query_as::<_, MeResponse>(
        r#"
        SELECT
            u.id, u.username, u.display_name, u.avatar, u.created_at,
            (SELECT COUNT(*) FROM tests WHERE creator_id = u.id) as tests_created,
            (SELECT COUNT(*) FROM statistics WHERE user_id = u.id) as tests_taken
        FROM users u
        WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(me))
}

/// Edit display name and/or password of the current user.
pub async fn update_profile(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;

    let hashed_password = payload
        .password
        .as_deref()
        .map(hash_password)
        .transpose()?;

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET display_name = COALESCE($2, display_name),
            password = COALESCE($3, password)
        WHERE id = $1
        RETURNING id, username, password, display_name, avatar, created_at
        "#,
    )
    .bind(user_id)
    .bind(payload.display_name)
    .bind(hashed_password)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update profile: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Maps an accepted image content type to the file extension it is stored with.
pub fn avatar_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Maps a stored `/uploads/<name>` avatar back to its file in `dir`.
/// Anything that is not a plain file name under `/uploads/` is ignored.
fn uploaded_file_path(dir: &Path, avatar: &str) -> Option<PathBuf> {
    let name = avatar.strip_prefix("/uploads/")?;
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return None;
    }
    Some(dir.join(name))
}

/// Upload a new avatar (multipart field `avatar`).
///
/// The file is written to the upload directory under a generated name and its
/// public path is stored on the user.
pub async fn upload_avatar(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let mut upload: Option<(&'static str, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("avatar") {
            continue;
        }

        let extension = field
            .content_type()
            .and_then(avatar_extension)
            .ok_or_else(|| {
                AppError::BadRequest("Avatar must be a PNG, JPEG, GIF or WebP image".to_string())
            })?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Avatar file is empty".to_string()));
        }
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(AppError::BadRequest("Avatar must be at most 2 MiB".to_string()));
        }

        upload = Some((extension, bytes.to_vec()));
        break;
    }

    let (extension, bytes) =
        upload.ok_or_else(|| AppError::BadRequest("Missing 'avatar' field".to_string()))?;

    let file_name = format!("{}-{}.{}", user_id, uuid::Uuid::new_v4(), extension);
    let dir = PathBuf::from(&config.upload_dir);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    tokio::fs::write(dir.join(&file_name), &bytes)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let previous = sqlx::query_scalar::<_, Option<String>>("SELECT avatar FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?
        .flatten();

    let avatar = format!("/uploads/{}", file_name);
    sqlx::query("UPDATE users SET avatar = $1 WHERE id = $2")
        .bind(&avatar)
        .bind(user_id)
        .execute(&pool)
        .await?;

    tracing::info!(user_id, avatar = %avatar, "Avatar updated");

    if let Some(old_path) = previous
        .as_deref()
        .and_then(|old| uploaded_file_path(&dir, old))
    {
        // A failed removal only leaves a stale file behind.
        if let Err(e) = tokio::fs::remove_file(&old_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    user_id,
                    path = %old_path.display(),
                    "Failed to remove old avatar: {}",
                    e
                );
            }
        }
    }

    Ok(Json(serde_json::json!({ "avatar": avatar })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_extension_accepts_images_only() {
        assert_eq!(avatar_extension("image/png"), Some("png"));
        assert_eq!(avatar_extension("image/jpeg"), Some("jpg"));
        assert_eq!(avatar_extension("image/webp"), Some("webp"));
        assert_eq!(avatar_extension("text/html"), None);
        assert_eq!(avatar_extension("image/svg+xml"), None);
    }

    #[test]
    fn test_uploaded_file_path_stays_in_upload_dir() {
        let dir = Path::new("/srv/uploads");
        assert_eq!(
            uploaded_file_path(dir, "/uploads/7-abc.png"),
            Some(dir.join("7-abc.png"))
        );
        assert_eq!(uploaded_file_path(dir, "/uploads/../secret"), None);
        assert_eq!(uploaded_file_path(dir, "/uploads/..\\secret"), None);
        assert_eq!(uploaded_file_path(dir, "/uploads/"), None);
        assert_eq!(uploaded_file_path(dir, "https://cdn.example.com/a.png"), None);
    }
}
