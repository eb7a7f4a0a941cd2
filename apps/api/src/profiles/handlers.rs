use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::business_profile::BusinessProfile;
use crate::profiles::queries::{get_profile, link_instagram, upsert_profile, ProfileFields};
use crate::routes::UserIdQuery;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SaveProfileRequest {
    pub user_id: Uuid,
    pub business_name: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub target_audience: Option<String>,
}

impl SaveProfileRequest {
    fn into_fields(self) -> ProfileFields {
        let clean = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        ProfileFields {
            business_name: clean(self.business_name),
            industry: clean(self.industry),
            description: clean(self.description),
            target_audience: clean(self.target_audience),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub user_id: Uuid,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct AuthUrlResponse {
    pub auth_url: String,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub success: bool,
    pub username: Option<String>,
}

/// GET /api/business-profile
/// Responds with `null` when no profile exists yet.
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Option<BusinessProfile>>, AppError> {
    Ok(Json(get_profile(&state.db, params.user_id).await?))
}

/// POST /api/business-profile
pub async fn handle_save_profile(
    State(state): State<AppState>,
    Json(req): Json<SaveProfileRequest>,
) -> Result<Json<BusinessProfile>, AppError> {
    let user_id = req.user_id;
    state
        .store
        .get_user(user_id)
        .await?
        .ok_or(AppError::UserNotFound(user_id))?;

    let profile = upsert_profile(&state.db, user_id, &req.into_fields()).await?;
    Ok(Json(profile))
}

/// GET /api/instagram/auth-url
pub async fn handle_instagram_auth_url(
    State(state): State<AppState>,
) -> Result<Json<AuthUrlResponse>, AppError> {
    let redirect_uri = format!(
        "{}/api/instagram/callback",
        state.config.public_base_url.trim_end_matches('/')
    );
    Ok(Json(AuthUrlResponse {
        auth_url: state.publisher.authorize_url(&redirect_uri)?,
    }))
}

/// POST /api/instagram/connect
pub async fn handle_instagram_connect(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>, AppError> {
    if req.code.trim().is_empty() {
        return Err(AppError::Validation("Authorization code is required".to_string()));
    }

    let account = state.publisher.connect(req.user_id, &req.code).await?;
    let profile = link_instagram(&state.db, req.user_id, &account)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Create a business profile before connecting Instagram".to_string())
        })?;

    info!(
        "Connected Instagram account {} for user {}",
        account.username, req.user_id
    );
    Ok(Json(ConnectResponse {
        success: true,
        username: profile.instagram_username,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_fields_drop_blanks() {
        let fields = SaveProfileRequest {
            user_id: Uuid::new_v4(),
            business_name: Some(" Corner Bakery ".to_string()),
            industry: Some("   ".to_string()),
            description: None,
            target_audience: Some("Locals".to_string()),
        }
        .into_fields();

        assert_eq!(fields.business_name.as_deref(), Some("Corner Bakery"));
        assert_eq!(fields.industry, None);
        assert_eq!(fields.target_audience.as_deref(), Some("Locals"));
    }
}
