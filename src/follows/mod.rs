use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

pub mod handler;

/// Database model for a follow relationship
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Follow {
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Query parameters for paginated follow lists
#[derive(Debug, Deserialize)]
pub struct FollowListFilter {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for a user in followers/following lists
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct FollowUserResponse {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
    pub is_private: bool,
    pub followed_at: chrono::DateTime<chrono::Utc>,
}

/// Response for paginated followers/following lists
#[derive(Debug, Serialize)]
pub struct FollowListResponse {
    pub users: Vec<FollowUserResponse>,
    pub total: i64,
    pub has_more: bool,
}

pub async fn is_following(
    pool: &PgPool,
    follower_id: Uuid,
    following_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2")
        .bind(follower_id)
        .bind(following_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Private-account visibility rule: a private profile and its posts are
/// visible only to the owner and to users who follow the account. Anonymous
/// viewers get 401, authenticated non-followers 403.
pub async fn ensure_profile_visible(
    pool: &PgPool,
    viewer: Option<Uuid>,
    owner_id: Uuid,
    is_private: bool,
) -> Result<(), AppError> {
    if !is_private {
        return Ok(());
    }

    let viewer_id = viewer.ok_or(AppError::Unauthorized)?;
    if viewer_id == owner_id {
        return Ok(());
    }

    if is_following(pool, viewer_id, owner_id).await? {
        return Ok(());
    }

    Err(AppError::Forbidden("Это приватный аккаунт".to_string()))
}
