use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalyticsRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Option<Uuid>,
    pub engagement_rate: Option<String>,
    pub reach: Option<i32>,
    pub impressions: Option<i32>,
    pub followers_growth: Option<i32>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
