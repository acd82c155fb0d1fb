use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{jwt, AuthorSummary},
    comments,
    error::AppError,
    follows,
    posts::{
        CreatePost, LikeResponse, Post, PostDetailResponse, PostFilter, PostResponse, UpdatePost,
    },
    response::ApiResponse,
};

/// How many top-level comments the post detail endpoint previews.
const RECENT_COMMENTS_LIMIT: i64 = 3;

/// Helper struct for fetching posts with author info and engagement counts
#[derive(FromRow)]
struct PostFromDb {
    id: Uuid,
    author_id: Uuid,
    image: String,
    caption: String,
    location: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    // author fields
    username: String,
    avatar: Option<String>,
    is_private: bool,
    // engagement
    likes_count: i64,
    comments_count: i64,
    is_liked: bool,
}

impl From<PostFromDb> for PostResponse {
    fn from(p: PostFromDb) -> Self {
        PostResponse {
            id: p.id,
            author: AuthorSummary {
                id: p.author_id,
                username: p.username,
                avatar: p.avatar,
                is_private: p.is_private,
            },
            image: p.image,
            caption: p.caption,
            location: p.location,
            likes_count: p.likes_count,
            comments_count: p.comments_count,
            is_liked: p.is_liked,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// `$1` is always the viewer id, which drives the `is_liked` annotation.
const POST_SELECT: &str = r#"
    SELECT
        p.id, p.author_id, p.image, p.caption, p.location, p.created_at, p.updated_at,
        u.username, u.avatar, u.is_private,
        (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count,
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count,
        EXISTS (SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = $1) AS is_liked
    FROM posts p
    JOIN users u ON p.author_id = u.id
"#;

pub async fn create_post(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Json(payload): Json<CreatePost>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (id, author_id, image, caption, location)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(claims.sub)
    .bind(&payload.image)
    .bind(&payload.caption)
    .bind(&payload.location)
    .fetch_one(&pool)
    .await?;

    let response = fetch_post(&pool, post.id, Some(claims.sub)).await?;

    Ok(ApiResponse::success(response).created())
}

/// List posts, newest first. `feed=true` restricts to followed authors;
/// private authors' posts are visible only to themselves and their followers.
/// GET /api/posts?feed=&author=&search=&limit=&offset=
pub async fn list_posts(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Query(filter): Query<PostFilter>,
) -> Result<impl IntoResponse, AppError> {
    let limit = filter.limit.unwrap_or(20).min(100);
    let offset = filter.offset.unwrap_or(0);

    let query_str = format!(
        r#"
        {}
        WHERE ($2::text IS NULL OR u.username = $2)
          AND ($3::text IS NULL
               OR p.caption ILIKE '%' || $3 || '%'
               OR p.location ILIKE '%' || $3 || '%'
               OR u.username ILIKE '%' || $3 || '%')
          AND (NOT $4::bool OR p.author_id IN (
               SELECT following_id FROM follows WHERE follower_id = $1))
          AND (NOT u.is_private OR p.author_id = $1 OR p.author_id IN (
               SELECT following_id FROM follows WHERE follower_id = $1))
        ORDER BY p.created_at DESC
        LIMIT $5 OFFSET $6
        "#,
        POST_SELECT
    );

    let posts = sqlx::query_as::<_, PostFromDb>(&query_str)
        .bind(claims.sub)
        .bind(&filter.author)
        .bind(&filter.search)
        .bind(filter.feed.unwrap_or(false))
        .bind(limit)
        .bind(offset)
        .fetch_all(&pool)
        .await?;

    let response: Vec<PostResponse> = posts.into_iter().map(PostResponse::from).collect();

    Ok(ApiResponse::success(response))
}

/// Feed: posts authored by users the viewer follows
/// GET /api/posts/feed
pub async fn get_feed(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Query(filter): Query<PostFilter>,
) -> Result<impl IntoResponse, AppError> {
    let limit = filter.limit.unwrap_or(20).min(100);
    let offset = filter.offset.unwrap_or(0);

    let query_str = format!(
        r#"
        {}
        WHERE p.author_id IN (SELECT following_id FROM follows WHERE follower_id = $1)
        ORDER BY p.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        POST_SELECT
    );

    let posts = sqlx::query_as::<_, PostFromDb>(&query_str)
        .bind(claims.sub)
        .bind(limit)
        .bind(offset)
        .fetch_all(&pool)
        .await?;

    let response: Vec<PostResponse> = posts.into_iter().map(PostResponse::from).collect();

    Ok(ApiResponse::success(response))
}

/// Explore: posts excluding followed authors and the viewer's own,
/// restricted to public authors
/// GET /api/posts/explore
pub async fn get_explore(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Query(filter): Query<PostFilter>,
) -> Result<impl IntoResponse, AppError> {
    let limit = filter.limit.unwrap_or(20).min(100);
    let offset = filter.offset.unwrap_or(0);

    let query_str = format!(
        r#"
        {}
        WHERE p.author_id <> $1
          AND u.is_private = FALSE
          AND p.author_id NOT IN (SELECT following_id FROM follows WHERE follower_id = $1)
        ORDER BY p.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        POST_SELECT
    );

    let posts = sqlx::query_as::<_, PostFromDb>(&query_str)
        .bind(claims.sub)
        .bind(limit)
        .bind(offset)
        .fetch_all(&pool)
        .await?;

    let response: Vec<PostResponse> = posts.into_iter().map(PostResponse::from).collect();

    Ok(ApiResponse::success(response))
}

/// Single post with a preview of its earliest top-level comments
/// GET /api/posts/:id
pub async fn get_post(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let post = fetch_post(&pool, id, Some(claims.sub)).await?;

    follows::ensure_profile_visible(
        &pool,
        Some(claims.sub),
        post.author.id,
        post.author.is_private,
    )
    .await?;

    let recent_comments =
        comments::handler::fetch_top_level_comments(&pool, id, RECENT_COMMENTS_LIMIT, 0).await?;

    Ok(ApiResponse::success(PostDetailResponse {
        post,
        recent_comments,
    }))
}

/// Update a post (owner only)
/// PUT /api/posts/:id
pub async fn update_post(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePost>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    ensure_post_owner(&pool, id, claims.sub).await?;

    let mut tx = pool.begin().await?;

    if let Some(image) = &payload.image {
        sqlx::query("UPDATE posts SET image = $1 WHERE id = $2")
            .bind(image)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(caption) = &payload.caption {
        sqlx::query("UPDATE posts SET caption = $1 WHERE id = $2")
            .bind(caption)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(location) = &payload.location {
        sqlx::query("UPDATE posts SET location = $1 WHERE id = $2")
            .bind(location)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("UPDATE posts SET updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let response = fetch_post(&pool, id, Some(claims.sub)).await?;

    Ok(ApiResponse::success(response))
}

/// Delete a post (owner only)
/// DELETE /api/posts/:id
pub async fn delete_post(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    ensure_post_owner(&pool, id, claims.sub).await?;

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::ok("Пост удален".to_string()))
}

/// Like a post. Idempotent: a repeat like succeeds without a second row.
/// POST /api/posts/:id/like
pub async fn like_post(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Пост не найден".to_string()))?;

    let result = sqlx::query(
        r#"
        INSERT INTO likes (user_id, post_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, post_id) DO NOTHING
        "#,
    )
    .bind(claims.sub)
    .bind(id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 1 {
        Ok(ApiResponse::ok("Пост лайкнут".to_string()).created())
    } else {
        Ok(ApiResponse::ok("Вы уже лайкнули этот пост".to_string())
            .with_status(axum::http::StatusCode::OK))
    }
}

/// Remove a like. Unliking a post that was never liked is a client error.
/// DELETE /api/posts/:id/unlike
pub async fn unlike_post(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Пост не найден".to_string()))?;

    let result = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
        .bind(claims.sub)
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::BadRequest(
            "Вы не лайкали этот пост".to_string(),
        ));
    }

    Ok(ApiResponse::ok("Лайк убран".to_string()))
}

/// List users who liked a post
/// GET /api/posts/:id/likes
pub async fn get_post_likes(
    State(pool): State<PgPool>,
    _claims: jwt::Claims,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Пост не найден".to_string()))?;

    let likes = sqlx::query_as::<_, LikeResponse>(
        r#"
        SELECT u.id, u.username, u.avatar, u.is_private, l.created_at AS liked_at
        FROM likes l
        JOIN users u ON l.user_id = u.id
        WHERE l.post_id = $1
        ORDER BY l.created_at DESC
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::success(likes))
}

/// Posts of a specific user; the private-account rule gates the whole list
/// GET /api/users/:username/posts
pub async fn get_user_posts(
    State(pool): State<PgPool>,
    claims: Option<jwt::Claims>,
    Path(username): Path<String>,
    Query(filter): Query<PostFilter>,
) -> Result<impl IntoResponse, AppError> {
    let author = sqlx::query("SELECT id, is_private FROM users WHERE username = $1")
        .bind(&username)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Пользователь не найден".to_string()))?;

    let author_id: Uuid = author.get("id");
    let is_private: bool = author.get("is_private");

    let viewer = claims.map(|c| c.sub);
    follows::ensure_profile_visible(&pool, viewer, author_id, is_private).await?;

    let limit = filter.limit.unwrap_or(20).min(100);
    let offset = filter.offset.unwrap_or(0);

    let query_str = format!(
        r#"
        {}
        WHERE p.author_id = $2
        ORDER BY p.created_at DESC
        LIMIT $3 OFFSET $4
        "#,
        POST_SELECT
    );

    let posts = sqlx::query_as::<_, PostFromDb>(&query_str)
        .bind(viewer)
        .bind(author_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&pool)
        .await?;

    let response: Vec<PostResponse> = posts.into_iter().map(PostResponse::from).collect();

    Ok(ApiResponse::success(response))
}

async fn fetch_post(
    pool: &PgPool,
    post_id: Uuid,
    viewer: Option<Uuid>,
) -> Result<PostResponse, AppError> {
    let post = sqlx::query_as::<_, PostFromDb>(&format!("{} WHERE p.id = $2", POST_SELECT))
        .bind(viewer)
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Пост не найден".to_string()))?;

    Ok(PostResponse::from(post))
}

async fn ensure_post_owner(pool: &PgPool, post_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let row = sqlx::query("SELECT author_id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Пост не найден".to_string()))?;

    let author_id: Uuid = row.get("author_id");
    if author_id != user_id {
        return Err(AppError::Forbidden(
            "Только автор может изменить пост".to_string(),
        ));
    }

    Ok(())
}
