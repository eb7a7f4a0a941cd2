use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AccountStore, RecordOutcome, SubscriptionUpdate};
use crate::errors::AppError;
use crate::models::user::{SubscriptionStatus, Tier, UpsertUser, User};

/// Account store held in process memory for unit tests. A single mutex makes every
/// operation atomic, matching the row-level guarantees of the PostgreSQL store.
#[derive(Default)]
pub struct InMemoryAccountStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces (or inserts) a user record verbatim.
    pub async fn put(&self, user: User) {
        self.users.lock().await.insert(user.id, user);
    }

    /// Creates a signed-in user already on `tier` with `used` posts this cycle.
    pub async fn seed(&self, tier: Tier, status: SubscriptionStatus, used: i32) -> User {
        let id = Uuid::new_v4();
        let mut user = self
            .upsert_user(UpsertUser {
                external_id: format!("auth|{id}"),
                email: Some(format!("{id}@example.com")),
                first_name: Some("Test".to_string()),
                last_name: Some("Owner".to_string()),
                profile_image_url: None,
            })
            .await
            .unwrap();
        user.tier = tier.as_str().to_string();
        user.subscription_status = status.as_str().to_string();
        user.monthly_posts_used = used;
        if tier != Tier::Free && status == SubscriptionStatus::Active {
            user.billing_customer_id = Some(format!("cus_seed_{id}"));
            user.billing_subscription_id = Some(format!("sub_seed_{id}"));
        }
        self.put(user.clone()).await;
        user
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().await.get(&user_id).cloned())
    }

    async fn upsert_user(&self, input: UpsertUser) -> Result<User, AppError> {
        let mut users = self.users.lock().await;
        let now = Utc::now();

        if let Some(existing) = users
            .values_mut()
            .find(|u| u.external_id == input.external_id)
        {
            existing.email = input.email;
            existing.first_name = input.first_name;
            existing.last_name = input.last_name;
            existing.profile_image_url = input.profile_image_url;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            external_id: input.external_id,
            email: input.email,
            first_name: input.first_name,
            last_name: input.last_name,
            profile_image_url: input.profile_image_url,
            billing_customer_id: None,
            billing_subscription_id: None,
            tier: Tier::Free.as_str().to_string(),
            subscription_status: SubscriptionStatus::Inactive.as_str().to_string(),
            monthly_posts_used: 0,
            subscription_version: 0,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn increment_usage(&self, user_id: Uuid) -> Result<Option<i32>, AppError> {
        let mut users = self.users.lock().await;
        Ok(users.get_mut(&user_id).map(|user| {
            user.monthly_posts_used += 1;
            user.updated_at = Utc::now();
            user.monthly_posts_used
        }))
    }

    async fn reset_usage(&self, user_id: Uuid) -> Result<Option<i32>, AppError> {
        let mut users = self.users.lock().await;
        Ok(users.get_mut(&user_id).map(|user| {
            user.monthly_posts_used = 0;
            user.updated_at = Utc::now();
            user.monthly_posts_used
        }))
    }

    async fn release_usage(&self, user_id: Uuid) -> Result<(), AppError> {
        if let Some(user) = self.users.lock().await.get_mut(&user_id) {
            user.monthly_posts_used = (user.monthly_posts_used - 1).max(0);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_post_if_below(
        &self,
        user_id: Uuid,
        expected_tier: Tier,
        limit: Option<i32>,
    ) -> Result<RecordOutcome, AppError> {
        let mut users = self.users.lock().await;
        let Some(user) = users.get_mut(&user_id) else {
            return Ok(RecordOutcome::UserMissing);
        };

        if user.tier != expected_tier.as_str() {
            return Ok(RecordOutcome::TierChanged);
        }
        if let Some(limit) = limit {
            if user.monthly_posts_used >= limit {
                return Ok(RecordOutcome::LimitReached(user.monthly_posts_used));
            }
        }

        user.monthly_posts_used += 1;
        user.updated_at = Utc::now();
        Ok(RecordOutcome::Recorded(user.monthly_posts_used))
    }

    async fn apply_subscription(
        &self,
        user_id: Uuid,
        expected_version: i32,
        update: &SubscriptionUpdate,
    ) -> Result<Option<User>, AppError> {
        let mut users = self.users.lock().await;
        let Some(user) = users.get_mut(&user_id) else {
            return Ok(None);
        };
        if user.subscription_version != expected_version {
            return Ok(None);
        }

        user.tier = update.tier.as_str().to_string();
        user.subscription_status = update.status.as_str().to_string();
        user.billing_customer_id = update.billing_customer_id.clone();
        user.billing_subscription_id = update.billing_subscription_id.clone();
        user.subscription_version += 1;
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_in(external_id: &str) -> UpsertUser {
        UpsertUser {
            external_id: external_id.to_string(),
            email: Some(format!("{external_id}@example.com")),
            first_name: Some("Ada".to_string()),
            last_name: None,
            profile_image_url: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_merges_profile_fields() {
        let store = InMemoryAccountStore::new();
        let first = store.upsert_user(sign_in("auth|1")).await.unwrap();
        assert_eq!(first.tier, "free");
        assert_eq!(first.subscription_status, "inactive");

        store.increment_usage(first.id).await.unwrap();

        let mut again = sign_in("auth|1");
        again.first_name = Some("Grace".to_string());
        let merged = store.upsert_user(again).await.unwrap();

        assert_eq!(merged.id, first.id);
        assert_eq!(merged.first_name.as_deref(), Some("Grace"));
        assert_eq!(merged.monthly_posts_used, 1, "usage survives a profile merge");
    }

    #[tokio::test]
    async fn test_release_never_goes_negative() {
        let store = InMemoryAccountStore::new();
        let user = store.upsert_user(sign_in("auth|2")).await.unwrap();
        store.release_usage(user.id).await.unwrap();
        let user = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(user.monthly_posts_used, 0);
    }

    #[tokio::test]
    async fn test_apply_subscription_rejects_stale_version() {
        let store = InMemoryAccountStore::new();
        let user = store.upsert_user(sign_in("auth|3")).await.unwrap();
        let update = SubscriptionUpdate {
            tier: Tier::Free,
            status: SubscriptionStatus::Active,
            billing_customer_id: Some("cus_1".to_string()),
            billing_subscription_id: None,
        };

        let applied = store.apply_subscription(user.id, 0, &update).await.unwrap();
        assert_eq!(applied.unwrap().subscription_version, 1);

        let stale = store.apply_subscription(user.id, 0, &update).await.unwrap();
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn test_record_detects_tier_change() {
        let store = InMemoryAccountStore::new();
        let user = store.upsert_user(sign_in("auth|4")).await.unwrap();
        let outcome = store
            .record_post_if_below(user.id, Tier::Pro, Some(50))
            .await
            .unwrap();
        assert_eq!(outcome, RecordOutcome::TierChanged);
    }
}
