use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entitlements::guard::summarize;
use crate::entitlements::EntitlementSummary;
use crate::errors::AppError;
use crate::state::AppState;
use crate::subscriptions::PlanSelection;

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub user_id: Uuid,
    pub tier: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionUserRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
    pub subscription: EntitlementSummary,
}

/// POST /api/create-subscription
pub async fn handle_create_subscription(
    State(state): State<AppState>,
    Json(req): Json<CreateSubscriptionRequest>,
) -> Result<Json<PlanSelection>, AppError> {
    let selection = state.lifecycle.select_plan(req.user_id, &req.tier).await?;
    Ok(Json(selection))
}

/// POST /api/cancel-subscription
pub async fn handle_cancel_subscription(
    State(state): State<AppState>,
    Json(req): Json<SubscriptionUserRequest>,
) -> Result<Json<CancelResponse>, AppError> {
    let user = state.lifecycle.cancel_plan(req.user_id).await?;
    Ok(Json(CancelResponse {
        success: true,
        subscription: summarize(&user)?,
    }))
}

/// POST /api/subscription/refresh
/// Called by the client after payment confirmation to pull the provider's verdict.
pub async fn handle_refresh_subscription(
    State(state): State<AppState>,
    Json(req): Json<SubscriptionUserRequest>,
) -> Result<Json<EntitlementSummary>, AppError> {
    let user = state.lifecycle.refresh_subscription(req.user_id).await?;
    Ok(Json(summarize(&user)?))
}
