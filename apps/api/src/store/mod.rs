//! Account store: persistence seam for the user record's billing, tier and usage fields.
//!
//! Every mutation is a single atomic statement against one user row; the
//! entitlement guard and the subscription lifecycle never read-modify-write
//! these fields in application code.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::{SubscriptionStatus, Tier, UpsertUser, User};

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[cfg(test)]
pub use memory::InMemoryAccountStore;
pub use postgres::PgAccountStore;

/// Result of the conditional "increment if below limit" update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Usage was incremented; carries the new count.
    Recorded(i32),
    /// Usage is already at (or above) the limit; carries the current count.
    LimitReached(i32),
    /// The user's tier no longer matches the tier the limit was computed for.
    TierChanged,
    UserMissing,
}

/// The full set of subscription fields written by one lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub billing_customer_id: Option<String>,
    pub billing_subscription_id: Option<String>,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    /// Inserts on first sign-in, otherwise merges the profile fields.
    async fn upsert_user(&self, user: UpsertUser) -> Result<User, AppError>;

    /// Unconditional `+1`. `None` if the user does not exist.
    async fn increment_usage(&self, user_id: Uuid) -> Result<Option<i32>, AppError>;

    async fn reset_usage(&self, user_id: Uuid) -> Result<Option<i32>, AppError>;

    /// Saturating `-1`, used to give back a slot whose post was never stored.
    async fn release_usage(&self, user_id: Uuid) -> Result<(), AppError>;

    /// Increments usage only if the user is still on `expected_tier` and below `limit`.
    /// A `None` limit skips the comparison entirely.
    async fn record_post_if_below(
        &self,
        user_id: Uuid,
        expected_tier: Tier,
        limit: Option<i32>,
    ) -> Result<RecordOutcome, AppError>;

    /// Writes all subscription fields at once if `subscription_version` still equals
    /// `expected_version`, bumping the version. `None` on a version mismatch or missing user.
    async fn apply_subscription(
        &self,
        user_id: Uuid,
        expected_version: i32,
        update: &SubscriptionUpdate,
    ) -> Result<Option<User>, AppError>;
}
