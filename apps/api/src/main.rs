mod analytics;
mod billing;
mod config;
mod db;
mod entitlements;
mod errors;
mod models;
mod posts;
mod profiles;
mod routes;
mod social;
mod state;
mod store;
mod subscriptions;
mod users;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::billing::{BillingProvider, InMemoryBilling, StripeBillingClient};
use crate::config::Config;
use crate::db::create_pool;
use crate::entitlements::{EntitlementGuard, UsageCounter};
use crate::routes::build_router;
use crate::social::MockInstagramPublisher;
use crate::state::AppState;
use crate::store::{AccountStore, PgAccountStore};
use crate::subscriptions::SubscriptionLifecycle;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting SocialBoost API v{}", env!("CARGO_PKG_VERSION"));

    let db = create_pool(&config.database_url, config.database_max_connections).await?;
    let store: Arc<dyn AccountStore> = Arc::new(PgAccountStore::new(db.clone()));

    let billing: Arc<dyn BillingProvider> = match &config.stripe_secret_key {
        Some(key) => {
            info!("Billing via Stripe at {}", config.stripe_api_base);
            Arc::new(StripeBillingClient::new(
                &config.stripe_api_base,
                key.clone(),
                config.billing_timeout,
            )?)
        }
        None => {
            warn!("STRIPE_SECRET_KEY not set; using in-memory billing (no real charges)");
            Arc::new(InMemoryBilling::new())
        }
    };

    let state = AppState {
        db,
        config: config.clone(),
        guard: EntitlementGuard::new(store.clone()),
        usage: UsageCounter::new(store.clone()),
        lifecycle: SubscriptionLifecycle::new(store.clone(), billing, config.billing_timeout),
        store,
        publisher: Arc::new(MockInstagramPublisher),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to PUBLIC_BASE_URL once the dashboard is deployed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
