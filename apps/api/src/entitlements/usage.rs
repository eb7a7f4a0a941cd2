use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::store::AccountStore;

/// Per-user monthly post counter. All writes are single atomic store updates.
#[derive(Clone)]
pub struct UsageCounter {
    store: Arc<dyn AccountStore>,
}

impl UsageCounter {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Adds one post to the user's monthly usage and returns the new count.
    /// Unconditional; post creation goes through `EntitlementGuard::check_and_record_post`.
    #[allow(dead_code)]
    pub async fn increment(&self, user_id: Uuid) -> Result<i32, AppError> {
        self.store
            .increment_usage(user_id)
            .await?
            .ok_or(AppError::UserNotFound(user_id))
    }

    /// Zeroes the counter. Invoked once per billing cycle by an external trigger.
    pub async fn reset(&self, user_id: Uuid) -> Result<i32, AppError> {
        let used = self
            .store
            .reset_usage(user_id)
            .await?
            .ok_or(AppError::UserNotFound(user_id))?;
        info!("Reset monthly post usage for user {user_id}");
        Ok(used)
    }

    pub async fn current_usage(&self, user_id: Uuid) -> Result<i32, AppError> {
        self.store
            .get_user(user_id)
            .await?
            .map(|user| user.monthly_posts_used)
            .ok_or(AppError::UserNotFound(user_id))
    }

    /// Gives back one slot after a recorded post failed to persist.
    pub async fn release(&self, user_id: Uuid) -> Result<(), AppError> {
        self.store.release_usage(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{SubscriptionStatus, Tier};
    use crate::store::InMemoryAccountStore;

    #[tokio::test]
    async fn test_reset_returns_zero_regardless_of_prior_usage() {
        let store = Arc::new(InMemoryAccountStore::new());
        let user = store.seed(Tier::Pro, SubscriptionStatus::Active, 42).await;
        let counter = UsageCounter::new(store);

        assert_eq!(counter.current_usage(user.id).await.unwrap(), 42);
        counter.reset(user.id).await.unwrap();
        assert_eq!(counter.current_usage(user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_is_an_error_not_zero() {
        let counter = UsageCounter::new(Arc::new(InMemoryAccountStore::new()));
        let missing = Uuid::new_v4();

        assert!(matches!(
            counter.current_usage(missing).await,
            Err(AppError::UserNotFound(id)) if id == missing
        ));
        assert!(matches!(
            counter.increment(missing).await,
            Err(AppError::UserNotFound(_))
        ));
        assert!(matches!(counter.reset(missing).await, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(InMemoryAccountStore::new());
        let user_id = store.seed(Tier::Free, SubscriptionStatus::Active, 0).await.id;
        let counter = UsageCounter::new(store);

        let tasks: Vec<_> = (0..100)
            .map(|_| {
                let counter = counter.clone();
                tokio::spawn(async move { counter.increment(user_id).await.unwrap() })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(counter.current_usage(user_id).await.unwrap(), 100);
    }
}
