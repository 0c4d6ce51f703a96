use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::services::CurrentUser,
    contacts::{
        dto::{check_name_bounds, ContactPayload, ContactResponse},
        repo::Contact,
    },
    error::ApiError,
    ratelimit::Throttle,
    state::AppState,
};

pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/api/contacts", get(get_contacts).post(create_contact))
        .route(
            "/api/contacts/:contact_id",
            get(get_contact_by_id)
                .patch(update_contact)
                .delete(delete_contact),
        )
        .route("/api/contacts/name/:name", get(get_contact_by_name))
        .route("/api/contacts/sur_name/:sur_name", get(get_contact_by_sur_name))
        .route("/api/contacts/email/:email", get(get_contact_by_email))
}

pub fn birthday_routes() -> Router<AppState> {
    Router::new().route("/api/week_birthday/", get(get_week_birthdays))
}

#[instrument(skip(state, user))]
pub async fn get_contacts(
    _throttle: Throttle,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let contacts = Contact::list_by_user(&state.db, user.id)
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(contacts.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state, user))]
pub async fn get_contact_by_id(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = Contact::find_by_id(&state.db, user.id, contact_id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(contact.into()))
}

#[instrument(skip(state, user))]
pub async fn get_contact_by_name(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ContactResponse>, ApiError> {
    check_name_bounds(&name, "name")?;
    let contact = Contact::find_by_name(&state.db, user.id, &name)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(contact.into()))
}

#[instrument(skip(state, user))]
pub async fn get_contact_by_sur_name(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(sur_name): Path<String>,
) -> Result<Json<ContactResponse>, ApiError> {
    check_name_bounds(&sur_name, "sur_name")?;
    let contact = Contact::find_by_sur_name(&state.db, user.id, &sur_name)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(contact.into()))
}

#[instrument(skip(state, user))]
pub async fn get_contact_by_email(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<ContactResponse>, ApiError> {
    if !crate::auth::services::is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }
    let contact = Contact::find_by_email(&state.db, user.id, &email)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(contact.into()))
}

#[instrument(skip(state, user, payload))]
pub async fn create_contact(
    _throttle: Throttle,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ContactPayload>,
) -> Result<(StatusCode, Json<ContactResponse>), ApiError> {
    payload.validate()?;

    if Contact::find_by_phone(&state.db, user.id, &payload.phone)
        .await
        .map_err(ApiError::Internal)?
        .is_some()
    {
        return Err(ApiError::conflict(format!(
            "Phone {} already exist!",
            payload.phone
        )));
    }

    let contact = Contact::create(&state.db, user.id, &payload)
        .await
        .map_err(ApiError::Internal)?;

    info!(user_id = %user.id, contact_id = %contact.id, "contact created");
    Ok((StatusCode::CREATED, Json(contact.into())))
}

#[instrument(skip(state, user, payload))]
pub async fn update_contact(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
    Json(payload): Json<ContactPayload>,
) -> Result<Json<ContactResponse>, ApiError> {
    payload.validate()?;

    let existing = Contact::find_by_id(&state.db, user.id, contact_id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::NotFound)?;

    if let Some(other) = Contact::find_by_phone(&state.db, user.id, &payload.phone)
        .await
        .map_err(ApiError::Internal)?
    {
        if other.id != existing.id {
            return Err(ApiError::conflict(format!(
                "Another contact id={} already had phone {}!",
                other.id, payload.phone
            )));
        }
    }

    let contact = Contact::update(&state.db, user.id, existing.id, &payload)
        .await
        .map_err(ApiError::Internal)?;

    info!(user_id = %user.id, contact_id = %contact.id, "contact updated");
    Ok(Json(contact.into()))
}

#[instrument(skip(state, user))]
pub async fn delete_contact(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = Contact::delete(&state.db, user.id, contact_id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::NotFound)?;

    info!(user_id = %user.id, contact_id = %deleted.id, "contact deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user))]
pub async fn get_week_birthdays(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let today = OffsetDateTime::now_utc().date();
    let contacts = Contact::upcoming_birthdays(&state.db, user.id, today)
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(contacts.into_iter().map(Into::into).collect()))
}
