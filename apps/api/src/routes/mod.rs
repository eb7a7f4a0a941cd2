pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;
use crate::{analytics, entitlements, posts, profiles, subscriptions, users};

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Accounts
        .route("/api/users", post(users::handlers::handle_upsert_user))
        .route("/api/auth/user", get(users::handlers::handle_get_user))
        .route(
            "/api/business-profile",
            get(profiles::handlers::handle_get_profile).post(profiles::handlers::handle_save_profile),
        )
        // Instagram
        .route(
            "/api/instagram/auth-url",
            get(profiles::handlers::handle_instagram_auth_url),
        )
        .route(
            "/api/instagram/connect",
            post(profiles::handlers::handle_instagram_connect),
        )
        .route("/api/instagram/publish", post(posts::handlers::handle_publish))
        // Posts
        .route(
            "/api/posts",
            get(posts::handlers::handle_list_posts).post(posts::handlers::handle_create_post),
        )
        .route("/api/posts/recent", get(posts::handlers::handle_recent_posts))
        .route(
            "/api/posts/scheduled",
            get(posts::handlers::handle_scheduled_posts),
        )
        .route(
            "/api/posts/eligibility",
            get(posts::handlers::handle_post_eligibility),
        )
        .route(
            "/api/posts/:id",
            put(posts::handlers::handle_update_post).delete(posts::handlers::handle_delete_post),
        )
        .route("/api/analytics/stats", get(analytics::handlers::handle_stats))
        // Subscriptions and entitlements
        .route(
            "/api/subscription",
            get(entitlements::handlers::handle_get_subscription),
        )
        .route(
            "/api/subscription/plans",
            get(entitlements::handlers::handle_list_plans),
        )
        .route(
            "/api/subscription/refresh",
            post(subscriptions::handlers::handle_refresh_subscription),
        )
        .route(
            "/api/create-subscription",
            post(subscriptions::handlers::handle_create_subscription),
        )
        .route(
            "/api/cancel-subscription",
            post(subscriptions::handlers::handle_cancel_subscription),
        )
        .route("/api/usage", get(entitlements::handlers::handle_get_usage))
        .route(
            "/api/usage/reset",
            post(entitlements::handlers::handle_reset_usage),
        )
        .with_state(state)
}
