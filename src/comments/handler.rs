use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::jwt,
    comments::{
        Comment, CommentAuthor, CommentFilter, CommentResponse, CommentsListResponse,
        CreateComment, UpdateComment,
    },
    error::AppError,
    response::ApiResponse,
};

/// How many replies are embedded under each top-level comment.
const REPLY_PREVIEW_LIMIT: i64 = 2;

/// Helper struct for fetching comments with author info from database
#[derive(FromRow)]
struct CommentFromDb {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    parent_id: Option<Uuid>,
    text: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    // Author fields
    username: String,
    avatar: Option<String>,
    // Replies count
    replies_count: i64,
}

impl CommentFromDb {
    fn into_response(self, replies: Vec<CommentResponse>) -> CommentResponse {
        CommentResponse {
            id: self.id,
            post_id: self.post_id,
            author: CommentAuthor {
                id: self.author_id,
                username: self.username,
                avatar: self.avatar,
            },
            parent_id: self.parent_id,
            text: self.text,
            replies_count: self.replies_count,
            replies,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const COMMENT_SELECT: &str = r#"
    SELECT
        c.id, c.post_id, c.author_id, c.parent_id, c.text,
        c.created_at, c.updated_at,
        u.username, u.avatar,
        (SELECT COUNT(*) FROM comments WHERE parent_id = c.id) AS replies_count
    FROM comments c
    JOIN users u ON c.author_id = u.id
"#;

async fn fetch_replies(
    pool: &PgPool,
    parent_id: Uuid,
) -> Result<Vec<CommentResponse>, AppError> {
    let rows = sqlx::query_as::<_, CommentFromDb>(&format!(
        "{} WHERE c.parent_id = $1 ORDER BY c.created_at ASC LIMIT $2",
        COMMENT_SELECT
    ))
    .bind(parent_id)
    .bind(REPLY_PREVIEW_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into_response(vec![])).collect())
}

/// Fetches top-level comments for a post, oldest first, each with its reply
/// preview. Also used by the post detail endpoint for `recent_comments`.
pub async fn fetch_top_level_comments(
    pool: &PgPool,
    post_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<CommentResponse>, AppError> {
    let rows = sqlx::query_as::<_, CommentFromDb>(&format!(
        "{} WHERE c.post_id = $1 AND c.parent_id IS NULL ORDER BY c.created_at ASC LIMIT $2 OFFSET $3",
        COMMENT_SELECT
    ))
    .bind(post_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let mut comments = Vec::with_capacity(rows.len());
    for row in rows {
        let replies = if row.replies_count > 0 {
            fetch_replies(pool, row.id).await?
        } else {
            vec![]
        };
        comments.push(row.into_response(replies));
    }

    Ok(comments)
}

async fn get_comment_response(
    pool: &PgPool,
    comment_id: Uuid,
) -> Result<ApiResponse<CommentResponse>, AppError> {
    let comment = sqlx::query_as::<_, CommentFromDb>(&format!(
        "{} WHERE c.id = $1",
        COMMENT_SELECT
    ))
    .bind(comment_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Комментарий не найден".to_string()))?;

    let replies = if comment.parent_id.is_none() && comment.replies_count > 0 {
        fetch_replies(pool, comment.id).await?
    } else {
        vec![]
    };

    Ok(ApiResponse::success(comment.into_response(replies)))
}

/// Create a comment on a post; an optional parent must be a comment on the
/// same post.
/// POST /api/posts/:post_id/comments
pub async fn create_comment(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<CreateComment>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    sqlx::query("SELECT id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Пост не найден".to_string()))?;

    if let Some(parent_id) = payload.parent_id {
        let parent = sqlx::query("SELECT post_id FROM comments WHERE id = $1")
            .bind(parent_id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound(
                "Родительский комментарий не найден".to_string(),
            ))?;

        let parent_post_id: Uuid = parent.get("post_id");
        if parent_post_id != post_id {
            return Err(AppError::BadRequest(
                "Родительский комментарий должен принадлежать тому же посту".to_string(),
            ));
        }
    }

    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (id, post_id, author_id, parent_id, text)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(post_id)
    .bind(claims.sub)
    .bind(payload.parent_id)
    .bind(&payload.text)
    .fetch_one(&pool)
    .await?;

    Ok(get_comment_response(&pool, comment.id).await?.created())
}

/// List top-level comments for a post, oldest first, with reply previews
/// GET /api/posts/:post_id/comments
pub async fn list_comments(
    State(pool): State<PgPool>,
    _claims: jwt::Claims,
    Path(post_id): Path<Uuid>,
    Query(filter): Query<CommentFilter>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Пост не найден".to_string()))?;

    let limit = filter.limit.unwrap_or(20).min(100);
    let offset = filter.offset.unwrap_or(0);

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND parent_id IS NULL",
    )
    .bind(post_id)
    .fetch_one(&pool)
    .await?;

    let comments = fetch_top_level_comments(&pool, post_id, limit, offset).await?;
    let has_more = (offset + limit) < total;

    Ok(ApiResponse::success(CommentsListResponse {
        comments,
        total,
        has_more,
    }))
}

/// Update a comment (author only)
/// PUT /api/posts/:post_id/comments/:id
pub async fn update_comment(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateComment>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let comment = find_comment(&pool, post_id, comment_id).await?;

    if comment.author_id != claims.sub {
        return Err(AppError::Forbidden(
            "Только автор может изменить комментарий".to_string(),
        ));
    }

    sqlx::query("UPDATE comments SET text = $1, updated_at = NOW() WHERE id = $2")
        .bind(&payload.text)
        .bind(comment_id)
        .execute(&pool)
        .await?;

    get_comment_response(&pool, comment_id).await
}

/// Delete a comment (author only); replies cascade via FK
/// DELETE /api/posts/:post_id/comments/:id
pub async fn delete_comment(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let comment = find_comment(&pool, post_id, comment_id).await?;

    if comment.author_id != claims.sub {
        return Err(AppError::Forbidden(
            "Только автор может удалить комментарий".to_string(),
        ));
    }

    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(comment_id)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::ok("Комментарий удален".to_string()))
}

async fn find_comment(
    pool: &PgPool,
    post_id: Uuid,
    comment_id: Uuid,
) -> Result<Comment, AppError> {
    sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1 AND post_id = $2")
        .bind(comment_id)
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Комментарий не найден".to_string()))
}
