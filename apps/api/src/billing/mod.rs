//! Billing collaborator: the boundary to the external payment/subscription provider.
//!
//! Nothing outside this module talks to the provider directly; the subscription
//! lifecycle holds an `Arc<dyn BillingProvider>` and never retries on its own.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub mod memory;
pub mod stripe;

pub use memory::InMemoryBilling;
pub use stripe::StripeBillingClient;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BillingError {
    /// Network failure, timeout, rate limit or provider 5xx. Safe to retry.
    #[error("transient billing failure: {0}")]
    Transient(String),

    /// Terminal: a declined card (carrying the provider's message), or an accepted call
    /// whose response could not be read.
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Month,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Month => "month",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSubscription {
    pub subscription_id: String,
    /// Raw provider status, e.g. `incomplete` until the first payment is confirmed.
    pub status: String,
    /// Token for the provider's client-side payment confirmation.
    pub client_secret: Option<String>,
}

#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn create_customer(&self, email: &str, name: &str) -> Result<String, BillingError>;

    /// Creates a product and a recurring price for it, returning the price id.
    async fn create_recurring_price(
        &self,
        product_name: &str,
        amount_cents: i64,
        interval: BillingInterval,
    ) -> Result<String, BillingError>;

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> Result<CreatedSubscription, BillingError>;

    /// Creates a payment-method setup object and returns its client secret.
    async fn create_setup_intent(&self, customer_id: &str) -> Result<String, BillingError>;

    async fn subscription_status(&self, subscription_id: &str) -> Result<String, BillingError>;

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), BillingError>;
}
