use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::{SubscriptionStatus, Tier, User};
use crate::store::{AccountStore, RecordOutcome};

use super::table::entitlement_for;

pub const MONTHLY_LIMIT_REACHED: &str = "monthly limit reached";

/// Attempts to re-resolve the allowance when the tier changes mid-check.
const MAX_TIER_RACE_RETRIES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PostDecision {
    Allowed { used: i32 },
    Denied { reason: String },
}

impl PostDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PostDecision::Allowed { .. })
    }

    fn limit_reached() -> Self {
        PostDecision::Denied {
            reason: MONTHLY_LIMIT_REACHED.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitlementSummary {
    pub tier: Tier,
    pub status: SubscriptionStatus,
    /// `None` (JSON `null`) when the tier is unlimited.
    pub allowance: Option<i32>,
    pub used: i32,
    pub remaining: Option<i32>,
    pub price_cents: i64,
}

/// Gate in front of post creation.
#[derive(Clone)]
pub struct EntitlementGuard {
    store: Arc<dyn AccountStore>,
}

impl EntitlementGuard {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    async fn load_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(AppError::UserNotFound(user_id))
    }

    /// Read-only check; does not consume a slot.
    pub async fn can_create_post(&self, user_id: Uuid) -> Result<PostDecision, AppError> {
        let user = self.load_user(user_id).await?;
        let allowance = entitlement_for(user.tier()?).monthly_allowance;

        Ok(if allowance.permits(user.monthly_posts_used) {
            PostDecision::Allowed {
                used: user.monthly_posts_used,
            }
        } else {
            PostDecision::limit_reached()
        })
    }

    /// Checks the allowance and consumes one slot in a single conditional update,
    /// so parallel requests can never exceed the tier's allowance.
    pub async fn check_and_record_post(&self, user_id: Uuid) -> Result<PostDecision, AppError> {
        for _ in 0..MAX_TIER_RACE_RETRIES {
            let user = self.load_user(user_id).await?;
            let tier = user.tier()?;
            let limit = entitlement_for(tier).monthly_allowance.limit();

            match self
                .store
                .record_post_if_below(user_id, tier, limit)
                .await?
            {
                RecordOutcome::Recorded(used) => return Ok(PostDecision::Allowed { used }),
                RecordOutcome::LimitReached(used) => {
                    info!("User {user_id} denied post on tier {tier}: {used} posts used");
                    return Ok(PostDecision::limit_reached());
                }
                RecordOutcome::UserMissing => return Err(AppError::UserNotFound(user_id)),
                RecordOutcome::TierChanged => {
                    warn!("Tier changed for user {user_id} during post check; retrying");
                }
            }
        }

        Err(AppError::Conflict(
            "Subscription changed while recording the post; please retry".to_string(),
        ))
    }

    pub async fn entitlement_summary(&self, user_id: Uuid) -> Result<EntitlementSummary, AppError> {
        let user = self.load_user(user_id).await?;
        summarize(&user)
    }
}

pub fn summarize(user: &User) -> Result<EntitlementSummary, AppError> {
    let tier = user.tier()?;
    let entitlement = entitlement_for(tier);
    let allowance = entitlement.monthly_allowance.limit();

    Ok(EntitlementSummary {
        tier,
        status: user.status()?,
        allowance,
        used: user.monthly_posts_used,
        remaining: allowance.map(|limit| (limit - user.monthly_posts_used).max(0)),
        price_cents: entitlement.price_cents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlements::table::Allowance;
    use crate::store::InMemoryAccountStore;

    async fn guard_with(tier: Tier, used: i32) -> (EntitlementGuard, Arc<InMemoryAccountStore>, Uuid) {
        let store = Arc::new(InMemoryAccountStore::new());
        let user = store.seed(tier, SubscriptionStatus::Active, used).await;
        (EntitlementGuard::new(store.clone()), store, user.id)
    }

    #[tokio::test]
    async fn test_nth_plus_one_post_is_denied_for_every_finite_tier() {
        for tier in Tier::ALL {
            let Allowance::Limited(n) = entitlement_for(tier).monthly_allowance else {
                continue;
            };
            let (guard, _, user_id) = guard_with(tier, 0).await;

            for i in 1..=n {
                let decision = guard.check_and_record_post(user_id).await.unwrap();
                assert_eq!(decision, PostDecision::Allowed { used: i }, "{tier} post {i}");
            }
            let decision = guard.check_and_record_post(user_id).await.unwrap();
            assert_eq!(
                decision,
                PostDecision::Denied {
                    reason: "monthly limit reached".to_string()
                },
                "{tier} post {}",
                n + 1
            );
        }
    }

    #[tokio::test]
    async fn test_enterprise_is_never_denied() {
        let (guard, _, user_id) = guard_with(Tier::Enterprise, 0).await;
        for _ in 0..10_000 {
            assert!(guard.check_and_record_post(user_id).await.unwrap().is_allowed());
        }
        let summary = guard.entitlement_summary(user_id).await.unwrap();
        assert_eq!(summary.used, 10_000);
        assert_eq!(summary.allowance, None);
        assert_eq!(summary.remaining, None);
    }

    #[tokio::test]
    async fn test_starter_at_fourteen_allows_one_more() {
        let (guard, store, user_id) = guard_with(Tier::Starter, 14).await;

        assert_eq!(
            guard.check_and_record_post(user_id).await.unwrap(),
            PostDecision::Allowed { used: 15 }
        );
        assert!(!guard.check_and_record_post(user_id).await.unwrap().is_allowed());

        let user = store.get_user(user_id).await.unwrap().unwrap();
        assert_eq!(user.monthly_posts_used, 15, "denied call must not consume a slot");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_parallel_posts_never_exceed_allowance() {
        let (guard, _, user_id) = guard_with(Tier::Starter, 0).await;

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let guard = guard.clone();
                tokio::spawn(async move { guard.check_and_record_post(user_id).await.unwrap() })
            })
            .collect();

        let mut allowed = 0;
        for task in tasks {
            if task.await.unwrap().is_allowed() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 15);
    }

    #[tokio::test]
    async fn test_can_create_post_does_not_consume() {
        let (guard, store, user_id) = guard_with(Tier::Free, 4).await;
        assert!(guard.can_create_post(user_id).await.unwrap().is_allowed());
        assert!(guard.can_create_post(user_id).await.unwrap().is_allowed());
        assert_eq!(
            store.get_user(user_id).await.unwrap().unwrap().monthly_posts_used,
            4
        );
    }

    #[tokio::test]
    async fn test_unrecognized_stored_tier_fails_loudly() {
        let (guard, store, user_id) = guard_with(Tier::Free, 0).await;
        let mut user = store.get_user(user_id).await.unwrap().unwrap();
        user.tier = "gold".to_string();
        store.put(user).await;

        assert!(matches!(
            guard.check_and_record_post(user_id).await,
            Err(AppError::InvalidTier(_))
        ));
        assert!(matches!(
            guard.can_create_post(user_id).await,
            Err(AppError::InvalidTier(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (guard, _, _) = guard_with(Tier::Free, 0).await;
        assert!(matches!(
            guard.check_and_record_post(Uuid::new_v4()).await,
            Err(AppError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_summary_reports_remaining() {
        let (guard, _, user_id) = guard_with(Tier::Pro, 12).await;
        let summary = guard.entitlement_summary(user_id).await.unwrap();
        assert_eq!(summary.tier, Tier::Pro);
        assert_eq!(summary.allowance, Some(50));
        assert_eq!(summary.remaining, Some(38));
        assert_eq!(summary.price_cents, 2900);
    }
}
