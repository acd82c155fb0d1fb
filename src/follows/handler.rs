use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    auth::jwt,
    error::AppError,
    follows::{FollowListFilter, FollowListResponse, FollowUserResponse},
    response::{ApiResponse, EmptyData},
};

async fn find_user_by_username(pool: &PgPool, username: &str) -> Result<Uuid, AppError> {
    let row = sqlx::query("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Пользователь не найден".to_string()))?;
    Ok(row.get("id"))
}

/// Follow a user. Idempotent: a repeat follow succeeds without creating a
/// second edge, distinguished only by status code and message.
/// POST /api/users/:username/follow
pub async fn follow_user(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let target_id = find_user_by_username(&pool, &username).await?;

    if claims.sub == target_id {
        return Err(AppError::BadRequest(
            "Нельзя подписаться на самого себя".to_string(),
        ));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO follows (follower_id, following_id)
        VALUES ($1, $2)
        ON CONFLICT (follower_id, following_id) DO NOTHING
        "#,
    )
    .bind(claims.sub)
    .bind(target_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 1 {
        Ok(ApiResponse::ok(format!("Вы подписались на {}", username)).created())
    } else {
        Ok(
            ApiResponse::ok("Вы уже подписаны на этого пользователя".to_string())
                .with_status(axum::http::StatusCode::OK),
        )
    }
}

/// Unfollow a user. Removing a nonexistent edge is a client error.
/// DELETE /api/users/:username/unfollow
pub async fn unfollow_user(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(username): Path<String>,
) -> Result<ApiResponse<EmptyData>, AppError> {
    let target_id = find_user_by_username(&pool, &username).await?;

    let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
        .bind(claims.sub)
        .bind(target_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::BadRequest(
            "Вы не подписаны на этого пользователя".to_string(),
        ));
    }

    Ok(ApiResponse::ok(format!("Вы отписались от {}", username)))
}

/// Get a user's followers
/// GET /api/users/:username/followers
pub async fn get_followers(
    State(pool): State<PgPool>,
    Path(username): Path<String>,
    Query(filter): Query<FollowListFilter>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = find_user_by_username(&pool, &username).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE following_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await?;

    let limit = filter.limit.unwrap_or(20).min(100);
    let offset = filter.offset.unwrap_or(0);

    let users = sqlx::query_as::<_, FollowUserResponse>(
        r#"
        SELECT u.id, u.username, u.avatar, u.is_private, f.created_at AS followed_at
        FROM follows f
        JOIN users u ON f.follower_id = u.id
        WHERE f.following_id = $1
        ORDER BY f.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await?;

    let has_more = (offset + limit) < total;

    Ok(ApiResponse::success(FollowListResponse {
        users,
        total,
        has_more,
    }))
}

/// Get users that a user is following
/// GET /api/users/:username/following
pub async fn get_following(
    State(pool): State<PgPool>,
    Path(username): Path<String>,
    Query(filter): Query<FollowListFilter>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = find_user_by_username(&pool, &username).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await?;

    let limit = filter.limit.unwrap_or(20).min(100);
    let offset = filter.offset.unwrap_or(0);

    let users = sqlx::query_as::<_, FollowUserResponse>(
        r#"
        SELECT u.id, u.username, u.avatar, u.is_private, f.created_at AS followed_at
        FROM follows f
        JOIN users u ON f.following_id = u.id
        WHERE f.follower_id = $1
        ORDER BY f.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await?;

    let has_more = (offset + limit) < total;

    Ok(ApiResponse::success(FollowListResponse {
        users,
        total,
        has_more,
    }))
}
