use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub mod handler;
pub mod jwt;
pub mod utils;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub avatar: Option<String>,
    pub website: String,
    pub is_private: bool,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterUser {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Имя пользователя должно быть от 3 до 50 символов"
    ))]
    pub username: String,
    #[validate(email(message = "Некорректный email"))]
    pub email: String,
    #[validate(length(min = 8, message = "Пароль должен быть не короче 8 символов"))]
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginUser {
    #[validate(email(message = "Некорректный email"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Имя пользователя должно быть от 3 до 50 символов"
    ))]
    pub username: Option<String>,
    #[validate(length(max = 500, message = "Биография не длиннее 500 символов"))]
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub website: Option<String>,
    pub is_private: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePassword {
    pub old_password: String,
    #[validate(length(min = 8, message = "Пароль должен быть не короче 8 символов"))]
    pub new_password: String,
    pub new_password_confirm: String,
}

/// Query parameters for the user list endpoint
#[derive(Debug, Deserialize)]
pub struct UserListFilter {
    pub search: Option<String>,
    pub ordering: Option<String>, // "username" or "created_at"
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Registration and login payload: profile plus token pair
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserProfileResponse,
    pub access: String,
    pub refresh: String,
}

/// Compact user representation embedded in posts, comments and stories
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
    pub is_private: bool,
}

/// User list item with follow annotations for the viewer
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserListItem {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
    pub is_private: bool,
    pub followers_count: i64,
    pub is_following: bool,
}

/// Full profile with counts, returned from profile and user-detail endpoints
#[derive(Debug, Serialize)]
pub struct UserProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub avatar: Option<String>,
    pub website: String,
    pub is_private: bool,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
    pub is_following: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_payload(password: &str) -> RegisterUser {
        RegisterUser {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: password.to_string(),
            password_confirm: password.to_string(),
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(register_payload("longenough").validate().is_ok());
    }

    #[test]
    fn short_password_rejected() {
        assert!(register_payload("short").validate().is_err());
    }

    #[test]
    fn bad_email_rejected() {
        let mut payload = register_payload("longenough");
        payload.email = "not-an-email".to_string();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn short_username_rejected() {
        let mut payload = register_payload("longenough");
        payload.username = "ab".to_string();
        assert!(payload.validate().is_err());
    }
}
