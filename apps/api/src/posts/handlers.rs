use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entitlements::PostDecision;
use crate::errors::AppError;
use crate::models::post::{Post, PostStatus};
use crate::posts::queries::{
    delete_post, get_post, insert_post, list_posts, mark_failed, mark_published,
    recent_published, scheduled_posts, update_post, NewPost, PostChanges,
};
use crate::routes::UserIdQuery;
use crate::state::AppState;

const POST_LIST_LIMIT: i64 = 50;
const RECENT_POST_LIMIT: i64 = 6;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub user_id: Uuid,
    pub caption: String,
    pub image_url: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub status: Option<PostStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub user_id: Uuid,
    pub caption: Option<String>,
    pub image_url: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub status: Option<PostStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub user_id: Uuid,
    pub post_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub success: bool,
    pub instagram_post_id: String,
    pub post: Post,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

fn non_empty_caption(caption: &str) -> Result<String, AppError> {
    let caption = caption.trim();
    if caption.is_empty() {
        return Err(AppError::Validation("Caption is required".to_string()));
    }
    Ok(caption.to_string())
}

/// Validates a create request and derives the initial status:
/// `scheduled` when a time is given, `draft` otherwise.
pub fn resolve_new_post(req: &CreatePostRequest) -> Result<NewPost, AppError> {
    let caption = non_empty_caption(&req.caption)?;
    let status = match (req.status, req.scheduled_for) {
        (Some(PostStatus::Published) | Some(PostStatus::Failed), _) => {
            return Err(AppError::Validation(
                "New posts must be drafts or scheduled; publish them separately".to_string(),
            ))
        }
        (Some(PostStatus::Scheduled), None) => {
            return Err(AppError::Validation(
                "Scheduled posts need a scheduled_for time".to_string(),
            ))
        }
        (Some(status), _) => status,
        (None, Some(_)) => PostStatus::Scheduled,
        (None, None) => PostStatus::Draft,
    };

    Ok(NewPost {
        caption,
        image_url: req.image_url.clone().filter(|url| !url.trim().is_empty()),
        scheduled_for: req.scheduled_for,
        status,
    })
}

/// GET /api/posts
pub async fn handle_list_posts(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<Post>>, AppError> {
    Ok(Json(list_posts(&state.db, params.user_id, POST_LIST_LIMIT).await?))
}

/// GET /api/posts/recent
pub async fn handle_recent_posts(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<Post>>, AppError> {
    Ok(Json(
        recent_published(&state.db, params.user_id, RECENT_POST_LIMIT).await?,
    ))
}

/// GET /api/posts/scheduled
pub async fn handle_scheduled_posts(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<Post>>, AppError> {
    Ok(Json(scheduled_posts(&state.db, params.user_id).await?))
}

/// GET /api/posts/eligibility
pub async fn handle_post_eligibility(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<PostDecision>, AppError> {
    let decision = state.guard.can_create_post(params.user_id).await?;
    debug!(
        "Eligibility for user {}: allowed={}",
        params.user_id,
        decision.is_allowed()
    );
    Ok(Json(decision))
}

/// POST /api/posts
pub async fn handle_create_post(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let new_post = resolve_new_post(&req)?;

    // The quota slot is taken immediately before the insert, with no other I/O in between.
    match state.guard.check_and_record_post(req.user_id).await? {
        PostDecision::Denied { reason } => return Err(AppError::QuotaExceeded(reason)),
        PostDecision::Allowed { used } => {
            debug!("User {} recorded post {used} this cycle", req.user_id)
        }
    }

    match insert_post(&state.db, req.user_id, &new_post).await {
        Ok(post) => {
            info!("Created {} post {} for user {}", post.status, post.id, req.user_id);
            Ok(Json(post))
        }
        Err(err) => {
            if let Err(release_err) = state.usage.release(req.user_id).await {
                warn!("Could not release usage for user {}: {release_err}", req.user_id);
            }
            Err(err.into())
        }
    }
}

/// PUT /api/posts/:id
pub async fn handle_update_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let changes = PostChanges {
        caption: req.caption.as_deref().map(non_empty_caption).transpose()?,
        image_url: req.image_url,
        scheduled_for: req.scheduled_for,
        status: req.status,
    };

    let post = update_post(&state.db, id, req.user_id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {id} not found")))?;
    Ok(Json(post))
}

/// DELETE /api/posts/:id
pub async fn handle_delete_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<DeleteResponse>, AppError> {
    if !delete_post(&state.db, id, params.user_id).await? {
        return Err(AppError::NotFound(format!("Post {id} not found")));
    }
    Ok(Json(DeleteResponse { success: true }))
}

/// POST /api/instagram/publish
pub async fn handle_publish(
    State(state): State<AppState>,
    Json(req): Json<PublishRequest>,
) -> Result<Json<PublishResponse>, AppError> {
    let post = get_post(&state.db, req.post_id, req.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", req.post_id)))?;

    let receipt = match state.publisher.publish(&post).await {
        Ok(receipt) => receipt,
        Err(err) => {
            warn!("Publishing post {} failed: {err}", post.id);
            mark_failed(&state.db, post.id).await?;
            return Err(err.into());
        }
    };

    let post = mark_published(&state.db, post.id, &receipt).await?;
    info!("Published post {} as {}", post.id, receipt.platform_post_id);

    Ok(Json(PublishResponse {
        success: true,
        instagram_post_id: receipt.platform_post_id,
        post,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(caption: &str) -> CreatePostRequest {
        CreatePostRequest {
            user_id: Uuid::new_v4(),
            caption: caption.to_string(),
            image_url: None,
            scheduled_for: None,
            status: None,
        }
    }

    #[test]
    fn test_post_without_time_is_draft() {
        let post = resolve_new_post(&request("  Grand opening!  ")).unwrap();
        assert_eq!(post.status, PostStatus::Draft);
        assert_eq!(post.caption, "Grand opening!");
    }

    #[test]
    fn test_post_with_time_is_scheduled() {
        let mut req = request("Weekend sale");
        req.scheduled_for = Some(Utc::now() + chrono::Duration::days(2));
        assert_eq!(resolve_new_post(&req).unwrap().status, PostStatus::Scheduled);
    }

    #[test]
    fn test_explicit_draft_keeps_time() {
        let mut req = request("Later");
        req.status = Some(PostStatus::Draft);
        req.scheduled_for = Some(Utc::now());
        let post = resolve_new_post(&req).unwrap();
        assert_eq!(post.status, PostStatus::Draft);
        assert!(post.scheduled_for.is_some());
    }

    #[test]
    fn test_empty_caption_rejected() {
        assert!(matches!(
            resolve_new_post(&request("   ")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_scheduled_without_time_rejected() {
        let mut req = request("Soon");
        req.status = Some(PostStatus::Scheduled);
        assert!(matches!(resolve_new_post(&req), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_cannot_create_already_published() {
        let mut req = request("Done");
        req.status = Some(PostStatus::Published);
        assert!(resolve_new_post(&req).is_err());
    }

    #[test]
    fn test_blank_image_url_dropped() {
        let mut req = request("Photo");
        req.image_url = Some("  ".to_string());
        assert_eq!(resolve_new_post(&req).unwrap().image_url, None);
    }
}
