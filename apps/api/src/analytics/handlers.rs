use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::analytics::queries::{
    latest_analytics, posts_created_since, scheduled_count, start_of_month,
};
use crate::entitlements::EntitlementSummary;
use crate::errors::AppError;
use crate::models::analytics::AnalyticsRow;
use crate::routes::UserIdQuery;
use crate::state::AppState;

const DEFAULT_ENGAGEMENT_RATE: &str = "0%";

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub posts_this_month: i64,
    pub scheduled_posts: i64,
    pub engagement_rate: String,
    pub followers_growth: i32,
    pub subscription: EntitlementSummary,
}

/// Engagement fields from the latest analytics row, with zero defaults.
fn engagement(latest: Option<AnalyticsRow>) -> (String, i32) {
    match latest {
        Some(row) => (
            row.engagement_rate
                .unwrap_or_else(|| DEFAULT_ENGAGEMENT_RATE.to_string()),
            row.followers_growth.unwrap_or(0),
        ),
        None => (DEFAULT_ENGAGEMENT_RATE.to_string(), 0),
    }
}

/// GET /api/analytics/stats
pub async fn handle_stats(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<DashboardStats>, AppError> {
    let subscription = state.guard.entitlement_summary(params.user_id).await?;

    let since = start_of_month(Utc::now())?;
    let posts_this_month = posts_created_since(&state.db, params.user_id, since).await?;
    let scheduled_posts = scheduled_count(&state.db, params.user_id).await?;
    let (engagement_rate, followers_growth) =
        engagement(latest_analytics(&state.db, params.user_id).await?);

    Ok(Json(DashboardStats {
        posts_this_month,
        scheduled_posts,
        engagement_rate,
        followers_growth,
        subscription,
    }))
}
