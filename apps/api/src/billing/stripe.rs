use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{BillingError, BillingInterval, BillingProvider, CreatedSubscription};

const STRIPE_VERSION: &str = "2025-05-28.basil";
const CURRENCY: &str = "usd";

#[derive(Debug, Deserialize)]
struct StripeObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
    status: String,
    #[serde(default)]
    latest_invoice: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StripeSetupIntent {
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: Option<String>,
}

/// Billing collaborator backed by the Stripe REST API (form-encoded requests, bearer auth).
/// Calls are never retried here; transient failures surface to the caller as-is.
#[derive(Clone)]
pub struct StripeBillingClient {
    client: Client,
    api_base: String,
    secret_key: String,
}

impl StripeBillingClient {
    pub fn new(api_base: &str, secret_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .context("failed to build Stripe HTTP client")?,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T, BillingError> {
        self.send(self.client.post(self.url(path)).form(form)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BillingError> {
        let response = request
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_VERSION)
            .send()
            .await
            .map_err(|e| BillingError::Transient(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 429 || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!("Stripe returned {}: {}", status, body);
            return Err(BillingError::Transient(format!(
                "payment provider returned {status}"
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeError>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or(body);
            return Err(BillingError::Rejected(message));
        }

        debug!("Stripe call succeeded with {}", status);

        // Past this point the provider has applied the request.
        response.json::<T>().await.map_err(|e| {
            warn!("Stripe returned {} with an unreadable body: {}", status, e);
            BillingError::Rejected(format!("unreadable provider response: {e}"))
        })
    }
}

#[async_trait]
impl BillingProvider for StripeBillingClient {
    async fn create_customer(&self, email: &str, name: &str) -> Result<String, BillingError> {
        let customer: StripeObject = self
            .post_form("/v1/customers", &[("email", email), ("name", name)])
            .await?;
        Ok(customer.id)
    }

    async fn create_recurring_price(
        &self,
        product_name: &str,
        amount_cents: i64,
        interval: BillingInterval,
    ) -> Result<String, BillingError> {
        let product: StripeObject = self
            .post_form("/v1/products", &[("name", product_name)])
            .await?;

        let amount = amount_cents.to_string();
        let price: StripeObject = self
            .post_form(
                "/v1/prices",
                &[
                    ("currency", CURRENCY),
                    ("product", product.id.as_str()),
                    ("unit_amount", amount.as_str()),
                    ("recurring[interval]", interval.as_str()),
                ],
            )
            .await?;
        Ok(price.id)
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> Result<CreatedSubscription, BillingError> {
        let subscription: StripeSubscription = self
            .post_form(
                "/v1/subscriptions",
                &[
                    ("customer", customer_id),
                    ("items[0][price]", price_id),
                    ("payment_behavior", "default_incomplete"),
                    ("expand[]", "latest_invoice.payment_intent"),
                ],
            )
            .await?;

        let client_secret = subscription
            .latest_invoice
            .as_ref()
            .and_then(|invoice| invoice.pointer("/payment_intent/client_secret"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(CreatedSubscription {
            subscription_id: subscription.id,
            status: subscription.status,
            client_secret,
        })
    }

    async fn create_setup_intent(&self, customer_id: &str) -> Result<String, BillingError> {
        let intent: StripeSetupIntent = self
            .post_form(
                "/v1/setup_intents",
                &[("customer", customer_id), ("usage", "off_session")],
            )
            .await?;
        intent
            .client_secret
            .ok_or_else(|| BillingError::Transient("setup intent has no client secret".into()))
    }

    async fn subscription_status(&self, subscription_id: &str) -> Result<String, BillingError> {
        let path = format!("/v1/subscriptions/{subscription_id}");
        let subscription: StripeSubscription = self.send(self.client.get(self.url(&path))).await?;
        Ok(subscription.status)
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), BillingError> {
        let path = format!("/v1/subscriptions/{subscription_id}");
        let _: StripeSubscription = self.send(self.client.delete(self.url(&path))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> StripeBillingClient {
        StripeBillingClient::new(
            &server.base_url(),
            "sk_test_123".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_customer_sends_form_and_bearer_auth() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/customers")
                .header("authorization", "Bearer sk_test_123")
                .body_contains("email=owner%40example.com");
            then.status(200).json_body(json!({ "id": "cus_123" }));
        });

        let id = client_for(&server)
            .create_customer("owner@example.com", "Jane Owner")
            .await
            .unwrap();

        assert_eq!(id, "cus_123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_card_error_is_rejected_with_provider_message() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/v1/subscriptions");
            then.status(402).json_body(json!({
                "error": { "type": "card_error", "message": "Your card was declined." }
            }));
        });

        let err = client_for(&server)
            .create_subscription("cus_123", "price_123")
            .await
            .unwrap_err();

        assert_eq!(err, BillingError::Rejected("Your card was declined.".to_string()));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/v1/setup_intents");
            then.status(503);
        });

        let err = client_for(&server)
            .create_setup_intent("cus_123")
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::Transient(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/v1/customers");
            then.status(429).body("slow down");
        });

        let err = client_for(&server)
            .create_customer("owner@example.com", "")
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::Transient(_)));
    }

    #[tokio::test]
    async fn test_create_subscription_extracts_payment_client_secret() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/subscriptions")
                .body_contains("payment_behavior=default_incomplete");
            then.status(200).json_body(json!({
                "id": "sub_123",
                "status": "incomplete",
                "latest_invoice": {
                    "id": "in_123",
                    "payment_intent": { "id": "pi_123", "client_secret": "pi_123_secret" }
                }
            }));
        });

        let created = client_for(&server)
            .create_subscription("cus_123", "price_123")
            .await
            .unwrap();

        assert_eq!(created.subscription_id, "sub_123");
        assert_eq!(created.status, "incomplete");
        assert_eq!(created.client_secret.as_deref(), Some("pi_123_secret"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_recurring_price_creates_product_then_price() {
        let server = MockServer::start_async().await;
        let product = server.mock(|when, then| {
            when.method(POST).path("/v1/products");
            then.status(200).json_body(json!({ "id": "prod_1" }));
        });
        let price = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/prices")
                .body_contains("product=prod_1")
                .body_contains("unit_amount=2900");
            then.status(200).json_body(json!({ "id": "price_1" }));
        });

        let id = client_for(&server)
            .create_recurring_price("SocialBoost Pro Plan", 2900, BillingInterval::Month)
            .await
            .unwrap();

        assert_eq!(id, "price_1");
        product.assert_async().await;
        price.assert_async().await;
    }

    #[tokio::test]
    async fn test_cancel_subscription_uses_delete() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/v1/subscriptions/sub_123");
            then.status(200)
                .json_body(json!({ "id": "sub_123", "status": "canceled" }));
        });

        client_for(&server)
            .cancel_subscription("sub_123")
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreadable_success_body_is_not_retryable() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/v1/subscriptions");
            then.status(200).body("<html>gateway</html>");
        });

        let err = client_for(&server)
            .create_subscription("cus_123", "price_123")
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::Rejected(_)));
    }
}
