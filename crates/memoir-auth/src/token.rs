use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sessions live for 7 days; expiry is the only revocation mechanism.
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

/// Mint a signed session token for `user_id`, expiring in
/// [`SESSION_TTL_DAYS`] days.
pub fn issue(secret: &str, user_id: Uuid) -> anyhow::Result<String> {
    issue_expiring_at(secret, user_id, Utc::now() + Duration::days(SESSION_TTL_DAYS))
}

fn issue_expiring_at(secret: &str, user_id: Uuid, expires_at: DateTime<Utc>) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify signature and expiry, returning the embedded user id.
/// `None` for expired, tampered, or malformed tokens.
pub fn validate(secret: &str, token: &str) -> Option<Uuid> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims.sub)
}
