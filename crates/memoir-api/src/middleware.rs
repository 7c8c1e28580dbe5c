use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use memoir_auth::token;
use memoir_db::models::UserRow;
use memoir_types::api::ProfileResponse;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::view;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "jwt";

/// Identity resolved by the session guard and attached to the request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
}

impl CurrentUser {
    pub(crate) fn from_row(row: &UserRow) -> Self {
        Self {
            id: view::parse_id(&row.id, "user id"),
            username: row.username.clone(),
            email: row.email.clone(),
            avatar_url: row.avatar_url.clone(),
            created_at: view::parse_timestamp(&row.created_at, "user created_at"),
        }
    }

    pub(crate) fn profile(&self) -> ProfileResponse {
        ProfileResponse {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            profile_pic: self.avatar_url.clone(),
            created_at: self.created_at,
        }
    }
}

/// Extract the session cookie, validate it, resolve the account, and attach
/// the identity for downstream handlers. Every rejection is the same 401:
/// a missing cookie, a bad token, and a vanished account must not be
/// distinguishable from outside.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::Unauthenticated)?;

    let user_id = token::validate(&state.jwt_secret, &token).ok_or(ApiError::Unauthenticated)?;

    let db = state.clone();
    let uid = user_id.to_string();
    let row = blocking(move || db.db.get_user_by_id(&uid))
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    req.extensions_mut().insert(CurrentUser::from_row(&row));
    Ok(next.run(req).await)
}

/// Session cookie matching the issued token's lifetime. HTTP-only, secure,
/// and cross-site so the browser client on another origin can send it.
pub(crate) fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .path("/")
        .max_age(time::Duration::days(token::SESSION_TTL_DAYS))
        .build()
}

pub(crate) fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build())
}
