use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::{AttendanceError, Result};
use crate::store::Role;

/// Claims carried by every access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Issue an HS256 token for the user, valid for `token_ttl_secs`.
pub fn issue_token(user_id: &str, role: Role, config: &AuthConfig) -> Result<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        user_id: user_id.to_string(),
        role,
        iat: now,
        exp: now + config.token_ttl_secs as i64,
    };

    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)?)
}

/// Verify signature and expiry and return the claims.
pub fn decode_token(token: &str, config: &AuthConfig) -> Result<Claims> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let data = jsonwebtoken::decode::<Claims>(token, &key, &validation)?;
    Ok(data.claims)
}

/// Extract the raw token from an `Authorization` header value.
///
/// Clients send the token as-is; a `Bearer ` prefix is tolerated.
pub fn token_from_header(value: Option<&str>) -> Result<&str> {
    let value = value.map(str::trim).filter(|v| !v.is_empty());
    match value {
        Some(v) => Ok(v.strip_prefix("Bearer ").unwrap_or(v).trim()),
        None => Err(AttendanceError::MissingToken),
    }
}
