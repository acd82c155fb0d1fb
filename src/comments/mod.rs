use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub mod handler;

/// Database model for a comment
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub text: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Request payload for creating a comment
#[derive(Debug, Deserialize, Validate)]
pub struct CreateComment {
    #[validate(length(
        min = 1,
        max = 500,
        message = "Комментарий должен быть от 1 до 500 символов"
    ))]
    pub text: String,
    pub parent_id: Option<Uuid>, // Optional: for nested replies
}

/// Request payload for updating a comment
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateComment {
    #[validate(length(
        min = 1,
        max = 500,
        message = "Комментарий должен быть от 1 до 500 символов"
    ))]
    pub text: String,
}

/// Author info embedded in comment response
#[derive(Debug, Serialize)]
pub struct CommentAuthor {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
}

/// Comment with author info; top-level comments carry up to two earliest
/// replies as a preview, replies themselves carry none.
#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author: CommentAuthor,
    pub parent_id: Option<Uuid>,
    pub text: String,
    pub replies_count: i64,
    pub replies: Vec<CommentResponse>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Query parameters for fetching comments
#[derive(Debug, Deserialize)]
pub struct CommentFilter {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for paginated comments list
#[derive(Debug, Serialize)]
pub struct CommentsListResponse {
    pub comments: Vec<CommentResponse>,
    pub total: i64,
    pub has_more: bool,
}
