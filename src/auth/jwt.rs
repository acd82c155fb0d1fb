use anyhow::Result;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::settings::Settings, error::AppError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    pub iat: i64,
    pub token_type: TokenType,
}

/// Both halves of the pair are HS256 JWTs signed with the same secret; the
/// `token_type` claim keeps them from being used interchangeably.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

const ACCESS_TTL_HOURS: i64 = 1;
const REFRESH_TTL_DAYS: i64 = 7;

pub fn create_token(user_id: Uuid, secret: &str, token_type: TokenType) -> Result<String> {
    let now = Utc::now();
    let ttl = match token_type {
        TokenType::Access => Duration::hours(ACCESS_TTL_HOURS),
        TokenType::Refresh => Duration::days(REFRESH_TTL_DAYS),
    };
    let claims = Claims {
        sub: user_id,
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
        token_type,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

pub fn create_token_pair(user_id: Uuid, secret: &str) -> Result<TokenPair> {
    Ok(TokenPair {
        access: create_token(user_id, secret, TokenType::Access)?,
        refresh: create_token(user_id, secret, TokenType::Refresh)?,
    })
}

fn decode_token(token: &str, secret: &str) -> Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Validates a refresh token presented at the refresh endpoint. An access
/// token is rejected here even if it is otherwise valid.
pub fn decode_refresh_token(token: &str, secret: &str) -> Result<Claims> {
    let claims = decode_token(token, secret)?;
    if claims.token_type != TokenType::Refresh {
        anyhow::bail!("not a refresh token");
    }
    Ok(claims)
}

/// Bearer-token extractor for handlers. Only access tokens authenticate
/// requests; refresh tokens are accepted solely by the refresh endpoint.
#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
    Settings: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Unauthorized)?;

        let settings = Settings::from_ref(state);

        let claims =
            decode_token(bearer.token(), &settings.jwt_secret).map_err(|_| AppError::Unauthorized)?;

        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn access_token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = create_token(user_id, SECRET, TokenType::Access).unwrap();
        let claims = decode_token(&token, SECRET).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.token_type, TokenType::Access);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn refresh_endpoint_rejects_access_token() {
        let user_id = Uuid::new_v4();
        let access = create_token(user_id, SECRET, TokenType::Access).unwrap();
        assert!(decode_refresh_token(&access, SECRET).is_err());

        let refresh = create_token(user_id, SECRET, TokenType::Refresh).unwrap();
        let claims = decode_refresh_token(&refresh, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = create_token(Uuid::new_v4(), SECRET, TokenType::Access).unwrap();
        assert!(decode_token(&token, "other-secret").is_err());
    }

    #[test]
    fn pair_carries_distinct_types() {
        let pair = create_token_pair(Uuid::new_v4(), SECRET).unwrap();
        assert_eq!(
            decode_token(&pair.access, SECRET).unwrap().token_type,
            TokenType::Access
        );
        assert_eq!(
            decode_token(&pair.refresh, SECRET).unwrap().token_type,
            TokenType::Refresh
        );
    }
}
