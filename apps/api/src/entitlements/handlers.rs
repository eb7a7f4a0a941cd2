use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::entitlements::table::{plan_catalog, PlanView};
use crate::entitlements::EntitlementSummary;
use crate::errors::AppError;
use crate::routes::UserIdQuery;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResetUsageRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub user_id: Uuid,
    pub monthly_posts_used: i32,
}

/// GET /api/subscription
pub async fn handle_get_subscription(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<EntitlementSummary>, AppError> {
    Ok(Json(state.guard.entitlement_summary(params.user_id).await?))
}

/// GET /api/subscription/plans
pub async fn handle_list_plans() -> Json<Vec<PlanView>> {
    Json(plan_catalog())
}

/// GET /api/usage
pub async fn handle_get_usage(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<UsageResponse>, AppError> {
    let used = state.usage.current_usage(params.user_id).await?;
    Ok(Json(UsageResponse {
        user_id: params.user_id,
        monthly_posts_used: used,
    }))
}

/// POST /api/usage/reset
/// Billing-cycle rollover, invoked by an external scheduler.
pub async fn handle_reset_usage(
    State(state): State<AppState>,
    Json(req): Json<ResetUsageRequest>,
) -> Result<Json<UsageResponse>, AppError> {
    let used = state.usage.reset(req.user_id).await?;
    info!("Monthly usage reset requested for user {}", req.user_id);
    Ok(Json(UsageResponse {
        user_id: req.user_id,
        monthly_posts_used: used,
    }))
}
