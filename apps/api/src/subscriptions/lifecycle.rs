use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::billing::{BillingError, BillingInterval, BillingProvider};
use crate::entitlements::table::entitlement_for_name;
use crate::errors::AppError;
use crate::models::user::{SubscriptionStatus, Tier, User};
use crate::store::{AccountStore, SubscriptionUpdate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlanSelection {
    /// A paid subscription exists at the provider but awaits client-side payment confirmation.
    PendingPayment {
        tier: Tier,
        subscription_id: String,
        client_secret: Option<String>,
    },
    /// The plan is active now. For the free tier a payment-method setup token is returned;
    /// capturing the card is verification only.
    ImmediatelyActive {
        tier: Tier,
        setup_client_secret: Option<String>,
    },
    /// Enterprise is sold manually; nothing was created at the provider.
    RequiresManualSales,
}

/// Drives a user's tier/status transitions against the billing collaborator.
///
/// Operations for one user run one at a time (per-user async mutex); operations for
/// different users never contend. Local state is written once, after every provider call
/// has succeeded, and only if the record's `subscription_version` is unchanged.
#[derive(Clone)]
pub struct SubscriptionLifecycle {
    store: Arc<dyn AccountStore>,
    billing: Arc<dyn BillingProvider>,
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
    timeout: Duration,
}

/// Exclusive turn for one user. The lock entry is dropped from the map once nobody
/// else holds or waits on it.
struct UserTurn {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
    user_id: Uuid,
}

impl Drop for UserTurn {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl SubscriptionLifecycle {
    pub fn new(
        store: Arc<dyn AccountStore>,
        billing: Arc<dyn BillingProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            billing,
            locks: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Waits for the user's previous lifecycle operation to finish.
    async fn acquire(&self, user_id: Uuid) -> UserTurn {
        let lock = self.locks.entry(user_id).or_default().clone();
        UserTurn {
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
            user_id,
        }
    }

    async fn load_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(AppError::UserNotFound(user_id))
    }

    /// Runs one provider call under the configured timeout. Elapsed counts as transient.
    async fn call<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, BillingError>>,
    ) -> Result<T, AppError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => {
                info!("Billing {operation} succeeded");
                Ok(value)
            }
            Ok(Err(err)) => {
                warn!("Billing {operation} failed: {err}");
                Err(err.into())
            }
            Err(_) => {
                warn!("Billing {operation} timed out after {:?}", self.timeout);
                Err(AppError::BillingTransient(format!(
                    "{operation} did not complete within {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }

    async fn commit(&self, user: &User, update: &SubscriptionUpdate) -> Result<User, AppError> {
        self.store
            .apply_subscription(user.id, user.subscription_version, update)
            .await?
            .ok_or_else(|| {
                AppError::Conflict("Subscription was modified concurrently; please retry".into())
            })
    }

    /// Cancels the subscription a plan change replaces. Runs before the local write so a
    /// failure leaves the user on the old, still-referenced subscription. A subscription
    /// created for the new plan is then abandoned at the provider.
    async fn cancel_replaced(
        &self,
        user_id: Uuid,
        replaced: Option<&str>,
        created: Option<&str>,
    ) -> Result<(), AppError> {
        let Some(replaced) = replaced else {
            return Ok(());
        };
        let Err(err) = self
            .call("cancel_subscription", self.billing.cancel_subscription(replaced))
            .await
        else {
            return Ok(());
        };

        warn!("Plan change for user {user_id} aborted: {replaced} could not be canceled");
        if let Some(created) = created {
            if let Err(abandon_err) = self
                .call("cancel_subscription", self.billing.cancel_subscription(created))
                .await
            {
                warn!("Unused subscription {created} left to expire: {abandon_err}");
            }
        }
        Err(err)
    }

    pub async fn select_plan(&self, user_id: Uuid, tier_name: &str) -> Result<PlanSelection, AppError> {
        let entitlement = entitlement_for_name(tier_name)?;
        let tier = entitlement.tier;

        if tier == Tier::Enterprise {
            self.load_user(user_id).await?;
            info!("User {user_id} requested enterprise; routing to sales");
            return Ok(PlanSelection::RequiresManualSales);
        }

        let _turn = self.acquire(user_id).await;

        let user = self.load_user(user_id).await?;
        let email = user
            .email
            .clone()
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| AppError::Validation("User email required".to_string()))?;

        let customer_id = match user.billing_customer_id.clone() {
            Some(id) => id,
            None => {
                self.call(
                    "create_customer",
                    self.billing.create_customer(&email, &user.full_name()),
                )
                .await?
            }
        };
        let superseded = user.billing_subscription_id.clone();

        let (update, selection) = match tier {
            Tier::Free => {
                let client_secret = self
                    .call(
                        "create_setup_intent",
                        self.billing.create_setup_intent(&customer_id),
                    )
                    .await?;
                (
                    SubscriptionUpdate {
                        tier,
                        status: SubscriptionStatus::Active,
                        billing_customer_id: Some(customer_id),
                        billing_subscription_id: None,
                    },
                    PlanSelection::ImmediatelyActive {
                        tier,
                        setup_client_secret: Some(client_secret),
                    },
                )
            }
            _ => {
                let product_name = format!("SocialBoost {} Plan", tier.display_name());
                let price_id = self
                    .call(
                        "create_recurring_price",
                        self.billing.create_recurring_price(
                            &product_name,
                            entitlement.price_cents,
                            BillingInterval::Month,
                        ),
                    )
                    .await?;
                let created = self
                    .call(
                        "create_subscription",
                        self.billing.create_subscription(&customer_id, &price_id),
                    )
                    .await?;

                let status = SubscriptionStatus::from_provider(&created.status);
                let selection = if status == SubscriptionStatus::Active {
                    PlanSelection::ImmediatelyActive {
                        tier,
                        setup_client_secret: None,
                    }
                } else {
                    PlanSelection::PendingPayment {
                        tier,
                        subscription_id: created.subscription_id.clone(),
                        client_secret: created.client_secret,
                    }
                };
                (
                    SubscriptionUpdate {
                        tier,
                        status,
                        billing_customer_id: Some(customer_id),
                        billing_subscription_id: Some(created.subscription_id),
                    },
                    selection,
                )
            }
        };

        self.cancel_replaced(
            user_id,
            superseded.as_deref(),
            update.billing_subscription_id.as_deref(),
        )
        .await?;

        self.commit(&user, &update).await?;
        info!(
            "User {user_id} moved to {} ({})",
            update.tier, update.status
        );
        Ok(selection)
    }

    pub async fn cancel_plan(&self, user_id: Uuid) -> Result<User, AppError> {
        let _turn = self.acquire(user_id).await;

        let user = self.load_user(user_id).await?;
        let subscription_id = user
            .billing_subscription_id
            .clone()
            .ok_or(AppError::NoActiveSubscription)?;

        self.call(
            "cancel_subscription",
            self.billing.cancel_subscription(&subscription_id),
        )
        .await?;

        let updated = self
            .commit(
                &user,
                &SubscriptionUpdate {
                    tier: Tier::Free,
                    status: SubscriptionStatus::Canceled,
                    billing_customer_id: user.billing_customer_id.clone(),
                    billing_subscription_id: None,
                },
            )
            .await?;
        info!("User {user_id} canceled subscription {subscription_id}");
        Ok(updated)
    }

    /// Re-reads the provider's view of the user's subscription, e.g. after the client
    /// confirmed a payment, and stores the resulting status.
    pub async fn refresh_subscription(&self, user_id: Uuid) -> Result<User, AppError> {
        let _turn = self.acquire(user_id).await;

        let user = self.load_user(user_id).await?;
        let subscription_id = user
            .billing_subscription_id
            .clone()
            .ok_or(AppError::NoActiveSubscription)?;

        let provider_status = self
            .call(
                "subscription_status",
                self.billing.subscription_status(&subscription_id),
            )
            .await?;
        let status = SubscriptionStatus::from_provider(&provider_status);

        let update = if status == SubscriptionStatus::Canceled {
            SubscriptionUpdate {
                tier: Tier::Free,
                status,
                billing_customer_id: user.billing_customer_id.clone(),
                billing_subscription_id: None,
            }
        } else {
            SubscriptionUpdate {
                tier: user.tier()?,
                status,
                billing_customer_id: user.billing_customer_id.clone(),
                billing_subscription_id: Some(subscription_id),
            }
        };

        if update.tier == user.tier()? && user.status()? == status {
            return Ok(user);
        }
        self.commit(&user, &update).await
    }
}
