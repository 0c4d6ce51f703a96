use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, patch},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{dto::UserResponse, repo::User, services::CurrentUser},
    error::ApiError,
    gravatar,
    state::AppState,
    tasks,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me/", get(read_users_me))
        .route("/users/avatar", patch(update_avatar))
        .layer(DefaultBodyLimit::max(5 * 1024 * 1024)) // 5MB
}

/// Deterministic object key for a user's avatar: re-uploads land on the
/// same key, so the stored URL stays valid.
pub(crate) fn avatar_key(email: &str, username: &str) -> String {
    let slug: String = username
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    let digest = gravatar::email_hash(email);
    format!("avatars/{}-{}", slug, &digest[..12])
}

#[instrument(skip(user))]
pub async fn read_users_me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

#[instrument(skip(state, user, multipart))]
pub async fn update_avatar(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UserResponse>, ApiError> {
    let mut upload = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("avatar") {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            upload = Some((data, content_type));
            break;
        }
    }
    let (data, content_type) =
        upload.ok_or_else(|| ApiError::BadRequest("avatar file is required".into()))?;

    let key = avatar_key(&user.email, &user.username);
    let url = state.storage.public_url(&key);

    // The key is deterministic, so the URL can be stored right away while
    // the push itself runs detached.
    let storage = state.storage.clone();
    let task_key = key.clone();
    tasks::spawn_logged("avatar-upload", async move {
        storage.put_object(&task_key, data, &content_type).await
    });

    let updated = User::update_avatar(&state.db, &user.email, &url)
        .await
        .map_err(ApiError::Internal)?;

    info!(user_id = %updated.id, %key, "avatar updated");
    Ok(Json(updated.into()))
}
