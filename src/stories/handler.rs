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
    error::AppError,
    response::ApiResponse,
    stories::{self, CreateStory, Story, StoryFilter, StoryResponse, UpdateStory},
};

/// Helper struct for fetching stories with author info
#[derive(FromRow)]
struct StoryFromDb {
    id: Uuid,
    author_id: Uuid,
    image: String,
    text: String,
    created_at: chrono::DateTime<chrono::Utc>,
    expires_at: chrono::DateTime<chrono::Utc>,
    // author fields
    username: String,
    avatar: Option<String>,
    is_private: bool,
}

impl From<StoryFromDb> for StoryResponse {
    fn from(s: StoryFromDb) -> Self {
        StoryResponse {
            id: s.id,
            author: AuthorSummary {
                id: s.author_id,
                username: s.username,
                avatar: s.avatar,
                is_private: s.is_private,
            },
            image: s.image,
            text: s.text,
            is_expired: stories::is_expired_at(s.expires_at, chrono::Utc::now()),
            created_at: s.created_at,
            expires_at: s.expires_at,
        }
    }
}

const STORY_SELECT: &str = r#"
    SELECT
        s.id, s.author_id, s.image, s.text, s.created_at, s.expires_at,
        u.username, u.avatar, u.is_private
    FROM stories s
    JOIN users u ON s.author_id = u.id
"#;

/// Create a story; expiry is fixed server-side at 24 hours after creation
/// POST /api/stories
pub async fn create_story(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Json(payload): Json<CreateStory>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let now = chrono::Utc::now();

    let story = sqlx::query_as::<_, Story>(
        r#"
        INSERT INTO stories (id, author_id, image, text, created_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(claims.sub)
    .bind(&payload.image)
    .bind(&payload.text)
    .bind(now)
    .bind(stories::expiry_from(now))
    .fetch_one(&pool)
    .await?;

    let response = fetch_story(&pool, story.id).await?;

    Ok(ApiResponse::success(response).created())
}

/// List active stories (expires_at in the future), newest first
/// GET /api/stories
pub async fn get_stories(
    State(pool): State<PgPool>,
    _claims: jwt::Claims,
    Query(filter): Query<StoryFilter>,
) -> Result<impl IntoResponse, AppError> {
    let limit = filter.limit.unwrap_or(20).min(100);
    let offset = filter.offset.unwrap_or(0);

    let rows = sqlx::query_as::<_, StoryFromDb>(&format!(
        "{} WHERE s.expires_at > NOW() ORDER BY s.created_at DESC LIMIT $1 OFFSET $2",
        STORY_SELECT
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await?;

    let response: Vec<StoryResponse> = rows.into_iter().map(StoryResponse::from).collect();

    Ok(ApiResponse::success(response))
}

/// Active stories from authors the viewer follows
/// GET /api/stories/following
pub async fn get_following_stories(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Query(filter): Query<StoryFilter>,
) -> Result<impl IntoResponse, AppError> {
    let limit = filter.limit.unwrap_or(20).min(100);
    let offset = filter.offset.unwrap_or(0);

    let rows = sqlx::query_as::<_, StoryFromDb>(&format!(
        r#"
        {}
        WHERE s.expires_at > NOW()
          AND s.author_id IN (SELECT following_id FROM follows WHERE follower_id = $1)
        ORDER BY s.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        STORY_SELECT
    ))
    .bind(claims.sub)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await?;

    let response: Vec<StoryResponse> = rows.into_iter().map(StoryResponse::from).collect();

    Ok(ApiResponse::success(response))
}

/// Single active story; an expired story is treated as missing
/// GET /api/stories/:id
pub async fn get_story(
    State(pool): State<PgPool>,
    _claims: jwt::Claims,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let story = sqlx::query_as::<_, StoryFromDb>(&format!(
        "{} WHERE s.id = $1 AND s.expires_at > NOW()",
        STORY_SELECT
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("История не найдена".to_string()))?;

    Ok(ApiResponse::success(StoryResponse::from(story)))
}

/// Update a story (owner only)
/// PUT /api/stories/:id
pub async fn update_story(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStory>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    ensure_story_owner(&pool, id, claims.sub).await?;

    let mut tx = pool.begin().await?;

    if let Some(image) = &payload.image {
        sqlx::query("UPDATE stories SET image = $1 WHERE id = $2")
            .bind(image)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(text) = &payload.text {
        sqlx::query("UPDATE stories SET text = $1 WHERE id = $2")
            .bind(text)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let response = fetch_story(&pool, id).await?;

    Ok(ApiResponse::success(response))
}

/// Delete a story (owner only)
/// DELETE /api/stories/:id
pub async fn delete_story(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    ensure_story_owner(&pool, id, claims.sub).await?;

    sqlx::query("DELETE FROM stories WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::ok("История удалена".to_string()))
}

async fn fetch_story(pool: &PgPool, story_id: Uuid) -> Result<StoryResponse, AppError> {
    let story = sqlx::query_as::<_, StoryFromDb>(&format!("{} WHERE s.id = $1", STORY_SELECT))
        .bind(story_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("История не найдена".to_string()))?;

    Ok(StoryResponse::from(story))
}

async fn ensure_story_owner(pool: &PgPool, story_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let row = sqlx::query("SELECT author_id FROM stories WHERE id = $1")
        .bind(story_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("История не найдена".to_string()))?;

    let author_id: Uuid = row.get("author_id");
    if author_id != user_id {
        return Err(AppError::Forbidden(
            "Только автор может изменить историю".to_string(),
        ));
    }

    Ok(())
}
