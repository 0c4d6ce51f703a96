use axum::{
    extract::{FromRef, Host, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{JwtKeys, LoginForm, MessageResponse, SignupRequest, TokenResponse, UserResponse},
        repo::User,
        services::{hash_password, is_valid_email, verify_password},
    },
    error::ApiError,
    gravatar,
    mailer::confirmation_email,
    state::AppState,
    tasks,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh_token", get(refresh_token))
        .route("/auth/confirmed_email/:token", get(confirmed_email))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Host(host): Host,
    Json(mut payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }

    if User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(ApiError::Internal)?
        .is_some()
    {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::conflict("Account already exists"));
    }

    let password_hash = hash_password(&payload.password).map_err(ApiError::Internal)?;

    // Best effort only: a missing or unreachable Gravatar never blocks signup.
    let avatar = match gravatar::lookup(&state.http, &payload.email).await {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(email = %payload.email, error = %e, "gravatar lookup failed, continuing without avatar");
            None
        }
    };

    let user = User::create(
        &state.db,
        &payload.username,
        &payload.email,
        &password_hash,
        avatar.as_deref(),
    )
    .await
    .map_err(ApiError::Internal)?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.create_email_token(&user.email).map_err(ApiError::Internal)?;
    let base_url = format!("http://{}/", host);
    let mailer = state.mailer.clone();
    let (to, username) = (user.email.clone(), user.username.clone());
    tasks::spawn_logged("confirmation-email", async move {
        mailer
            .send(
                &to,
                "Confirm your email",
                confirmation_email(&base_url, &username, &token),
            )
            .await
    });

    info!(user_id = %user.id, email = %user.email, "user signed up");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Form(mut payload): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.username = payload.username.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &payload.username)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| {
            warn!(email = %payload.username, "login unknown email");
            ApiError::unauthorized("Invalid email")
        })?;

    // Unconfirmed accounts are rejected before the password is even checked.
    if !user.confirmed {
        warn!(email = %user.email, "login before email confirmation");
        return Err(ApiError::unauthorized("Email not confirmed"));
    }

    if !verify_password(&payload.password, &user.password_hash).map_err(ApiError::Internal)? {
        warn!(email = %user.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthorized("Invalid password"));
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.create_access_token(&user.email).map_err(ApiError::Internal)?;
    let refresh_token = keys.create_refresh_token(&user.email).map_err(ApiError::Internal)?;

    User::update_refresh_token(&state.db, user.id, Some(&refresh_token))
        .await
        .map_err(ApiError::Internal)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(TokenResponse {
        access_token,
        refresh_token,
        token_type: "bearer",
    }))
}

#[instrument(skip(state, headers))]
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    let keys = JwtKeys::from_ref(&state);
    let email = keys.decode_refresh_token(token)?;

    let user = User::find_by_email(&state.db, &email)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::unauthorized("Could not validate credentials"))?;

    // A refresh token that is not the stored one kills the session: the
    // stored value is cleared and the caller must log in again.
    if user.refresh_token.as_deref() != Some(token) {
        warn!(user_id = %user.id, "refresh token mismatch, clearing stored token");
        User::update_refresh_token(&state.db, user.id, None)
            .await
            .map_err(ApiError::Internal)?;
        return Err(ApiError::unauthorized("Invalid refresh token"));
    }

    let access_token = keys.create_access_token(&email).map_err(ApiError::Internal)?;
    let refresh_token = keys.create_refresh_token(&email).map_err(ApiError::Internal)?;
    User::update_refresh_token(&state.db, user.id, Some(&refresh_token))
        .await
        .map_err(ApiError::Internal)?;

    info!(user_id = %user.id, "token pair refreshed");
    Ok(Json(TokenResponse {
        access_token,
        refresh_token,
        token_type: "bearer",
    }))
}

#[instrument(skip(state))]
pub async fn confirmed_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let email = keys.get_email_from_token(&token)?;

    let user = User::find_by_email(&state.db, &email)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::BadRequest("Verification error".into()))?;

    if user.confirmed {
        return Ok(Json(MessageResponse {
            message: "Your email is already confirmed",
        }));
    }

    User::confirm_email(&state.db, &email)
        .await
        .map_err(ApiError::Internal)?;

    info!(user_id = %user.id, email = %email, "email confirmed");
    Ok(Json(MessageResponse {
        message: "Email confirmed",
    }))
}
