use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{auth::AuthorSummary, comments::CommentResponse};

pub mod handler;

/// Database model for a post
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub image: String,
    pub caption: String,
    pub location: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePost {
    #[validate(length(min = 1, message = "Изображение обязательно"))]
    pub image: String,
    #[validate(length(max = 2200, message = "Описание не длиннее 2200 символов"))]
    #[serde(default)]
    pub caption: String,
    #[validate(length(max = 100, message = "Местоположение не длиннее 100 символов"))]
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePost {
    #[validate(length(min = 1, message = "Изображение обязательно"))]
    pub image: Option<String>,
    #[validate(length(max = 2200, message = "Описание не длиннее 2200 символов"))]
    pub caption: Option<String>,
    #[validate(length(max = 100, message = "Местоположение не длиннее 100 символов"))]
    pub location: Option<String>,
}

/// Query parameters for the post list endpoint
#[derive(Debug, Deserialize)]
pub struct PostFilter {
    /// `feed=true` restricts the list to authors the viewer follows
    pub feed: Option<bool>,
    /// Filter by author username
    pub author: Option<String>,
    /// Matches caption, location or author username
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Post with author summary and engagement annotations
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub author: AuthorSummary,
    pub image: String,
    pub caption: String,
    pub location: String,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Single-post view with a preview of the newest top-level comments
#[derive(Debug, Serialize)]
pub struct PostDetailResponse {
    #[serde(flatten)]
    pub post: PostResponse,
    pub recent_comments: Vec<CommentResponse>,
}

/// A user who liked a post
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LikeResponse {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
    pub is_private: bool,
    pub liked_at: chrono::DateTime<chrono::Utc>,
}
