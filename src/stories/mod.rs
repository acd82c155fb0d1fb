use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthorSummary;

pub mod handler;

/// Stories live for 24 hours from creation.
pub const STORY_TTL_HOURS: i64 = 24;

/// Database model for a story. Expiry is never stored as a state transition;
/// it is derived by comparing the current time to `expires_at`.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Story {
    pub id: Uuid,
    pub author_id: Uuid,
    pub image: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub fn expiry_from(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::hours(STORY_TTL_HOURS)
}

pub fn is_expired_at(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= expires_at
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStory {
    #[validate(length(min = 1, message = "Изображение обязательно"))]
    pub image: String,
    #[validate(length(max = 200, message = "Текст не длиннее 200 символов"))]
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStory {
    #[validate(length(min = 1, message = "Изображение обязательно"))]
    pub image: Option<String>,
    #[validate(length(max = 200, message = "Текст не длиннее 200 символов"))]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StoryResponse {
    pub id: Uuid,
    pub author: AuthorSummary,
    pub image: String,
    pub text: String,
    pub is_expired: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Query parameters for story lists
#[derive(Debug, Deserialize)]
pub struct StoryFilter {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_24_hours_after_creation() {
        let created = Utc::now();
        let expires = expiry_from(created);
        assert_eq!(expires - created, Duration::hours(24));
    }

    #[test]
    fn active_before_expiry() {
        let created = Utc::now();
        let expires = expiry_from(created);

        assert!(!is_expired_at(expires, created));
        assert!(!is_expired_at(expires, created + Duration::hours(23)));
        assert!(!is_expired_at(
            expires,
            expires - Duration::milliseconds(1)
        ));
    }

    #[test]
    fn expired_at_and_after_expiry() {
        let created = Utc::now();
        let expires = expiry_from(created);

        assert!(is_expired_at(expires, expires));
        assert!(is_expired_at(expires, expires + Duration::hours(1)));
    }
}
