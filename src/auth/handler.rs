use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{
        jwt, utils, AuthResponse, ChangePassword, LoginUser, RefreshTokenRequest, RegisterUser,
        UpdateProfile, User, UserListFilter, UserListItem, UserProfileResponse,
    },
    config::settings::Settings,
    error::AppError,
    follows,
    response::ApiResponse,
};

/// Builds the full profile payload with follower/following/post counts and
/// the "does the viewer follow this user" annotation.
pub async fn build_profile(
    pool: &PgPool,
    user: &User,
    viewer: Option<Uuid>,
) -> Result<UserProfileResponse, AppError> {
    let (followers_count, following_count, posts_count) = sqlx::query_as::<_, (i64, i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM follows WHERE following_id = $1),
            (SELECT COUNT(*) FROM follows WHERE follower_id = $1),
            (SELECT COUNT(*) FROM posts WHERE author_id = $1)
        "#,
    )
    .bind(user.id)
    .fetch_one(pool)
    .await?;

    let is_following = match viewer {
        Some(viewer_id) if viewer_id != user.id => {
            follows::is_following(pool, viewer_id, user.id).await?
        }
        _ => false,
    };

    Ok(UserProfileResponse {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        bio: user.bio.clone(),
        avatar: user.avatar.clone(),
        website: user.website.clone(),
        is_private: user.is_private,
        followers_count,
        following_count,
        posts_count,
        is_following,
        created_at: user.created_at,
    })
}

pub async fn register(
    State(pool): State<PgPool>,
    State(settings): State<Settings>,
    Json(payload): Json<RegisterUser>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    if payload.password != payload.password_confirm {
        return Err(AppError::BadRequest("Пароли не совпадают.".to_string()));
    }

    utils::check_password_strength(&payload.password).map_err(AppError::BadRequest)?;

    let password_hash =
        utils::hash_password(&payload.password).map_err(|_| AppError::InternalServerError)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&password_hash)
    .fetch_one(&pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
            "Пользователь с таким email или именем уже существует".to_string(),
        ),
        _ => AppError::from(e),
    })?;

    let tokens = jwt::create_token_pair(user.id, &settings.jwt_secret)
        .map_err(|_| AppError::InternalServerError)?;

    let profile = build_profile(&pool, &user, None).await?;

    Ok(ApiResponse::success(AuthResponse {
        user: profile,
        access: tokens.access,
        refresh: tokens.refresh,
    })
    .created())
}

pub async fn login(
    State(pool): State<PgPool>,
    State(settings): State<Settings>,
    Json(payload): Json<LoginUser>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&payload.email)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::Unauthorized)?;

    utils::verify_password(&user.password_hash, &payload.password)
        .map_err(|_| AppError::Unauthorized)?;

    let tokens = jwt::create_token_pair(user.id, &settings.jwt_secret)
        .map_err(|_| AppError::InternalServerError)?;

    let profile = build_profile(&pool, &user, None).await?;

    Ok(ApiResponse::success(AuthResponse {
        user: profile,
        access: tokens.access,
        refresh: tokens.refresh,
    }))
}

/// Exchanges a valid refresh token for a fresh access token.
pub async fn refresh_token(
    State(settings): State<Settings>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let claims = jwt::decode_refresh_token(&payload.refresh, &settings.jwt_secret)
        .map_err(|_| AppError::BadRequest("Недействительный refresh token".to_string()))?;

    let access = jwt::create_token(claims.sub, &settings.jwt_secret, jwt::TokenType::Access)
        .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::success(serde_json::json!({ "access": access })))
}

pub async fn get_profile(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Пользователь не найден".to_string()))?;

    let profile = build_profile(&pool, &user, Some(claims.sub)).await?;

    Ok(ApiResponse::success(profile))
}

pub async fn update_profile(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Json(payload): Json<UpdateProfile>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let mut tx = pool.begin().await?;

    if let Some(username) = &payload.username {
        sqlx::query("UPDATE users SET username = $1 WHERE id = $2")
            .bind(username)
            .bind(claims.sub)
            .execute(&mut *tx)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
                    "Пользователь с таким именем уже существует".to_string(),
                ),
                _ => AppError::from(e),
            })?;
    }

    if let Some(bio) = &payload.bio {
        sqlx::query("UPDATE users SET bio = $1 WHERE id = $2")
            .bind(bio)
            .bind(claims.sub)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(avatar) = &payload.avatar {
        sqlx::query("UPDATE users SET avatar = $1 WHERE id = $2")
            .bind(avatar)
            .bind(claims.sub)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(website) = &payload.website {
        sqlx::query("UPDATE users SET website = $1 WHERE id = $2")
            .bind(website)
            .bind(claims.sub)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(is_private) = payload.is_private {
        sqlx::query("UPDATE users SET is_private = $1 WHERE id = $2")
            .bind(is_private)
            .bind(claims.sub)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("UPDATE users SET updated_at = NOW() WHERE id = $1")
        .bind(claims.sub)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Пользователь не найден".to_string()))?;

    let profile = build_profile(&pool, &user, Some(claims.sub)).await?;

    Ok(ApiResponse::success(profile))
}

pub async fn change_password(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Json(payload): Json<ChangePassword>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    if payload.new_password != payload.new_password_confirm {
        return Err(AppError::BadRequest(
            "Новые пароли не совпадают.".to_string(),
        ));
    }

    utils::check_password_strength(&payload.new_password).map_err(AppError::BadRequest)?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Пользователь не найден".to_string()))?;

    utils::verify_password(&user.password_hash, &payload.old_password)
        .map_err(|_| AppError::BadRequest("Неверный текущий пароль.".to_string()))?;

    let password_hash = utils::hash_password(&payload.new_password)
        .map_err(|_| AppError::InternalServerError)?;

    sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(&password_hash)
        .bind(claims.sub)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::ok("Пароль успешно изменен".to_string()))
}

/// List/search users
/// GET /api/users?search=&ordering=&limit=&offset=
pub async fn list_users(
    State(pool): State<PgPool>,
    claims: Option<jwt::Claims>,
    Query(filter): Query<UserListFilter>,
) -> Result<impl IntoResponse, AppError> {
    let limit = filter.limit.unwrap_or(20).min(100);
    let offset = filter.offset.unwrap_or(0);

    let order_clause = match filter.ordering.as_deref() {
        Some("username") => "u.username ASC",
        Some("created_at") => "u.created_at ASC",
        _ => "u.created_at DESC", // Default: newest first
    };

    let query_str = format!(
        r#"
        SELECT
            u.id, u.username, u.avatar, u.is_private,
            (SELECT COUNT(*) FROM follows WHERE following_id = u.id) AS followers_count,
            EXISTS (
                SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = u.id
            ) AS is_following
        FROM users u
        WHERE ($2::text IS NULL OR u.username ILIKE '%' || $2 || '%')
        ORDER BY {}
        LIMIT $3 OFFSET $4
        "#,
        order_clause
    );

    let users = sqlx::query_as::<_, UserListItem>(&query_str)
        .bind(claims.map(|c| c.sub))
        .bind(&filter.search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&pool)
        .await?;

    Ok(ApiResponse::success(users))
}

/// View another user's profile
/// GET /api/users/:username
pub async fn get_user_detail(
    State(pool): State<PgPool>,
    claims: Option<jwt::Claims>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(&username)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Пользователь не найден".to_string()))?;

    let viewer = claims.map(|c| c.sub);
    follows::ensure_profile_visible(&pool, viewer, user.id, user.is_private).await?;

    let profile = build_profile(&pool, &user, viewer).await?;

    Ok(ApiResponse::success(profile))
}
