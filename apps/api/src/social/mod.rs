//! Social platform collaborator: accepts a post and returns the platform's reference.
//!
//! Only a mocked Instagram implementation exists: it fabricates a post id and seeds
//! engagement counters so the dashboard has something to show.

use async_trait::async_trait;
use chrono::Utc;
use rand_core::{OsRng, RngCore};
use url::Url;
use uuid::Uuid;

use crate::models::post::Post;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub platform_post_id: String,
    pub likes: i32,
    pub comments: i32,
}

/// Result of the mocked OAuth code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedAccount {
    pub username: String,
    pub access_token: String,
    pub platform_user_id: String,
}

#[async_trait]
pub trait SocialPublisher: Send + Sync {
    fn authorize_url(&self, redirect_uri: &str) -> anyhow::Result<String>;

    async fn connect(&self, user_id: Uuid, code: &str) -> anyhow::Result<ConnectedAccount>;

    async fn publish(&self, post: &Post) -> anyhow::Result<PublishReceipt>;
}

const INSTAGRAM_AUTHORIZE_URL: &str = "https://api.instagram.com/oauth/authorize";

pub struct MockInstagramPublisher;

/// Uniform integer in `low..low + span`.
fn seeded(low: i32, span: u32) -> i32 {
    low + (OsRng.next_u32() % span) as i32
}

#[async_trait]
impl SocialPublisher for MockInstagramPublisher {
    fn authorize_url(&self, redirect_uri: &str) -> anyhow::Result<String> {
        let url = Url::parse_with_params(
            INSTAGRAM_AUTHORIZE_URL,
            &[
                ("client_id", "mock"),
                ("redirect_uri", redirect_uri),
                ("scope", "user_profile,user_media"),
                ("response_type", "code"),
            ],
        )?;
        Ok(url.into())
    }

    async fn connect(&self, user_id: Uuid, _code: &str) -> anyhow::Result<ConnectedAccount> {
        let simple = user_id.simple().to_string();
        let suffix = &simple[simple.len() - 4..];
        Ok(ConnectedAccount {
            username: format!("businessaccount{suffix}"),
            access_token: format!("mock_access_token_{}", Utc::now().timestamp_millis()),
            platform_user_id: format!("mock_ig_user_{user_id}"),
        })
    }

    async fn publish(&self, _post: &Post) -> anyhow::Result<PublishReceipt> {
        Ok(PublishReceipt {
            platform_post_id: format!("ig_post_{}", Utc::now().timestamp_millis()),
            likes: seeded(10, 100),
            comments: seeded(1, 20),
        })
    }
}
