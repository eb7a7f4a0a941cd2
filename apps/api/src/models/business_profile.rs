use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BusinessProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_name: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub target_audience: Option<String>,
    pub instagram_username: Option<String>,
    pub instagram_connected: bool,
    #[serde(skip_serializing)]
    pub instagram_access_token: Option<String>,
    pub instagram_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
