use chrono::Duration;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::config::AuthConfig;
use crate::error::{ApiError, Error};
use crate::schema::{Id, User, UserRole};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    /// `users.token_version` at issue time; a later logout bumps the column.
    pub token_version: i32,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(
        id: Id,
        username: String,
        role: UserRole,
        token_version: i32,
        lifetime: Duration,
    ) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: id,
            username,
            role,
            token_version,
            iat,
            exp,
        }
    }
}

/// The acting user of a request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn is_owner(&self, owner_id: Id) -> bool {
        self.user_id == owner_id
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            username: value.username,
            user_id: value.user_id,
            is_admin: value.role == UserRole::Admin,
            role: value.role,
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, Error> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(|e| {
        log::error!("Invalid signing key: {e}");
        ApiError::Internal.default()
    })
}

pub fn generate_jwt_session(user: &User, config: &AuthConfig) -> Result<String, Error> {
    let key = signing_key(&config.secret)?;
    let claims = JwtSessionData::new(
        user.id,
        user.username.to_owned(),
        user.role,
        user.token_version,
        Duration::hours(config.token_lifetime_hours),
    );

    claims.sign_with_key(&key).map_err(|e| {
        log::error!("Failed to sign session token: {e}");
        ApiError::Internal.default()
    })
}

pub fn verify_jwt_session(token: &str, config: &AuthConfig) -> Result<JwtSessionData, Error> {
    let key = signing_key(&config.secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| ApiError::InvalidSession.default())?;

    if session.exp < Utc::now().timestamp() {
        return Err(ApiError::InvalidSession.new("Token expired."));
    }

    Ok(session)
}
