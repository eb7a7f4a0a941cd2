use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{BillingError, BillingInterval, BillingProvider, CreatedSubscription};

/// Beyond this many tracked subscriptions, canceled ones are forgotten.
const MAX_TRACKED_SUBSCRIPTIONS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BillingOperation {
    CreateCustomer,
    CreateRecurringPrice,
    CreateSubscription,
    CreateSetupIntent,
    SubscriptionStatus,
    CancelSubscription,
}

/// One recorded call against the in-memory provider.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingCall {
    pub operation: BillingOperation,
    /// The primary argument: email, product name, customer id or subscription id.
    pub subject: String,
}

#[derive(Default)]
struct BillingState {
    next_id: u64,
    #[cfg(test)]
    calls: Vec<BillingCall>,
    failures: HashMap<BillingOperation, BillingError>,
    subscriptions: HashMap<String, String>,
    initial_status: Option<String>,
    latency: Option<Duration>,
}

/// In-process billing collaborator: deterministic ids, a call log, scripted failures.
///
/// Used by the test suite and as the provider when no Stripe key is configured.
#[derive(Default)]
pub struct InMemoryBilling {
    state: Mutex<BillingState>,
}

impl InMemoryBilling {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the call, applies latency and any scripted failure, and returns a fresh id suffix.
    async fn begin(&self, operation: BillingOperation, subject: &str) -> Result<u64, BillingError> {
        debug!("In-memory billing {operation:?} for {subject}");
        let latency = {
            let mut state = self.state.lock().await;
            #[cfg(test)]
            state.calls.push(BillingCall {
                operation,
                subject: subject.to_string(),
            });
            state.latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().await;
        if let Some(err) = state.failures.remove(&operation) {
            return Err(err);
        }
        state.next_id += 1;
        Ok(state.next_id)
    }
}

#[cfg(test)]
impl InMemoryBilling {
    /// Makes the next call to `operation` fail with `error`.
    pub async fn fail_next(&self, operation: BillingOperation, error: BillingError) {
        self.state.lock().await.failures.insert(operation, error);
    }

    /// Status reported for newly created subscriptions (default `incomplete`).
    pub async fn set_initial_status(&self, status: &str) {
        self.state.lock().await.initial_status = Some(status.to_string());
    }

    /// Simulates the provider-side outcome of client-side payment confirmation.
    pub async fn set_subscription_status(&self, subscription_id: &str, status: &str) {
        self.state
            .lock()
            .await
            .subscriptions
            .insert(subscription_id.to_string(), status.to_string());
    }

    /// Delay applied to every call, for exercising caller timeouts.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = Some(latency);
    }

    pub async fn calls(&self) -> Vec<BillingCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn count(&self, operation: BillingOperation) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }
}

#[async_trait]
impl BillingProvider for InMemoryBilling {
    async fn create_customer(&self, email: &str, _name: &str) -> Result<String, BillingError> {
        let n = self.begin(BillingOperation::CreateCustomer, email).await?;
        Ok(format!("cus_mock_{n}"))
    }

    async fn create_recurring_price(
        &self,
        product_name: &str,
        amount_cents: i64,
        interval: BillingInterval,
    ) -> Result<String, BillingError> {
        let n = self
            .begin(BillingOperation::CreateRecurringPrice, product_name)
            .await?;
        Ok(format!("price_mock_{n}_{amount_cents}_{}", interval.as_str()))
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        _price_id: &str,
    ) -> Result<CreatedSubscription, BillingError> {
        let n = self
            .begin(BillingOperation::CreateSubscription, customer_id)
            .await?;
        let subscription_id = format!("sub_mock_{n}");

        let mut state = self.state.lock().await;
        let status = state
            .initial_status
            .clone()
            .unwrap_or_else(|| "incomplete".to_string());
        if state.subscriptions.len() >= MAX_TRACKED_SUBSCRIPTIONS {
            state.subscriptions.retain(|_, status| status != "canceled");
        }
        state
            .subscriptions
            .insert(subscription_id.clone(), status.clone());

        Ok(CreatedSubscription {
            client_secret: Some(format!("pi_mock_{n}_secret")),
            subscription_id,
            status,
        })
    }

    async fn create_setup_intent(&self, customer_id: &str) -> Result<String, BillingError> {
        let n = self
            .begin(BillingOperation::CreateSetupIntent, customer_id)
            .await?;
        Ok(format!("seti_mock_{n}_secret"))
    }

    async fn subscription_status(&self, subscription_id: &str) -> Result<String, BillingError> {
        self.begin(BillingOperation::SubscriptionStatus, subscription_id)
            .await?;
        self.state
            .lock()
            .await
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| BillingError::Rejected(format!("No such subscription: '{subscription_id}'")))
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), BillingError> {
        self.begin(BillingOperation::CancelSubscription, subscription_id)
            .await?;
        let mut state = self.state.lock().await;
        match state.subscriptions.get_mut(subscription_id) {
            Some(status) => {
                *status = "canceled".to_string();
                Ok(())
            }
            None => Err(BillingError::Rejected(format!(
                "No such subscription: '{subscription_id}'"
            ))),
        }
    }
}
