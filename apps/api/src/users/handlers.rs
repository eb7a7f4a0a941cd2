use axum::{
    extract::{Query, State},
    Json,
};
use tracing::info;

use crate::errors::AppError;
use crate::models::user::{UpsertUser, User};
use crate::routes::UserIdQuery;
use crate::state::AppState;

/// Trims the identity-provider fields, dropping blanks.
fn normalize(mut input: UpsertUser) -> Result<UpsertUser, AppError> {
    input.external_id = input.external_id.trim().to_string();
    if input.external_id.is_empty() {
        return Err(AppError::Validation("external_id is required".to_string()));
    }
    let clean = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    input.email = clean(input.email);
    input.first_name = clean(input.first_name);
    input.last_name = clean(input.last_name);
    input.profile_image_url = clean(input.profile_image_url);
    Ok(input)
}

/// POST /api/users
pub async fn handle_upsert_user(
    State(state): State<AppState>,
    Json(req): Json<UpsertUser>,
) -> Result<Json<User>, AppError> {
    let user = state.store.upsert_user(normalize(req)?).await?;
    info!("Signed in user {} ({})", user.id, user.external_id);
    Ok(Json(user))
}

/// GET /api/auth/user
pub async fn handle_get_user(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<User>, AppError> {
    let user = state
        .store
        .get_user(params.user_id)
        .await?
        .ok_or(AppError::UserNotFound(params.user_id))?;
    Ok(Json(user))
}
