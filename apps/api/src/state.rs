use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::entitlements::{EntitlementGuard, UsageCounter};
use crate::social::SocialPublisher;
use crate::store::AccountStore;
use crate::subscriptions::SubscriptionLifecycle;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Posts, profiles and analytics are queried directly; account fields go through `store`.
    pub db: PgPool,
    pub config: Config,
    pub store: Arc<dyn AccountStore>,
    pub guard: EntitlementGuard,
    pub usage: UsageCounter,
    pub lifecycle: SubscriptionLifecycle,
    pub publisher: Arc<dyn SocialPublisher>,
}
