use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use memoir_auth::{password, token};
use memoir_db::{Database, is_unique_violation};
use memoir_imagestore::{AVATAR_CONSTRAINTS, ImageStore};
use memoir_types::api::{
    CheckAuthResponse, LoginRequest, ProfileResponse, SignupRequest, UpdateProfileRequest,
};

use crate::blocking;
use crate::error::ApiError;
use crate::middleware::{CurrentUser, clear_session_cookie, session_cookie};
use crate::view;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub images: Arc<dyn ImageStore>,
    pub jwt_secret: String,
}

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_signup(&req)?;

    // The email conflict gets a pre-check with its own message; a username
    // conflict is only caught by the UNIQUE constraint below.
    let db = state.clone();
    let email = req.email.clone();
    if blocking(move || db.db.get_user_by_email(&email)).await?.is_some() {
        return Err(ApiError::Duplicate(
            "User with this email already exists".into(),
        ));
    }

    let password_hash = password::hash(req.password.trim())?;
    let user_id = Uuid::new_v4();

    let db = state.clone();
    let uid = user_id.to_string();
    let username = req.username.clone();
    let email = req.email.clone();
    if let Err(err) =
        blocking(move || db.db.create_user(&uid, &username, &email, &password_hash)).await
    {
        if is_unique_violation(&err, "users.username") {
            return Err(ApiError::Duplicate(
                "Username is already taken. Try a different one.".into(),
            ));
        }
        if is_unique_violation(&err, "users.email") {
            // Lost a race against a concurrent signup with the same email.
            return Err(ApiError::Duplicate(
                "User with this email already exists".into(),
            ));
        }
        return Err(err.into());
    }

    let db = state.clone();
    let uid = user_id.to_string();
    let row = blocking(move || db.db.get_user_by_id(&uid))
        .await?
        .ok_or_else(|| anyhow::anyhow!("user row missing right after signup"))?;

    let session = token::issue(&state.jwt_secret, user_id)?;
    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(session)),
        Json(view::profile(&row)),
    ))
}

fn validate_signup(req: &SignupRequest) -> Result<(), ApiError> {
    if req.username.trim().is_empty()
        || req.email.trim().is_empty()
        || req.password.trim().is_empty()
    {
        return Err(ApiError::Validation("All fields are required".into()));
    }
    if req.username.contains(char::is_whitespace) {
        return Err(ApiError::Validation("Username cannot contain spaces".into()));
    }
    if req.password.contains(char::is_whitespace) {
        return Err(ApiError::Validation("Password cannot contain spaces".into()));
    }
    if req.password.trim().chars().count() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }
    Ok(())
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let email = req.email.clone();
    let row = blocking(move || db.db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !password::verify(&req.password, &row.password)? {
        return Err(ApiError::InvalidCredentials);
    }

    let user_id: Uuid = row
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", row.id, e))?;

    let session = token::issue(&state.jwt_secret, user_id)?;
    Ok((jar.add(session_cookie(session)), Json(view::profile(&row))))
}

/// Clears the client-held cookie; there is no server-side session to
/// revoke. Safe to call with or without an active session.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        clear_session_cookie(jar),
        Json(json!({ "message": "Logged out successfully" })),
    )
}

pub async fn get_profile(Extension(user): Extension<CurrentUser>) -> Json<ProfileResponse> {
    Json(user.profile())
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let uid = user.id.to_string();
    let row = blocking(move || db.db.get_user_by_id(&uid))
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let payload = req.profile_pic.unwrap_or_default();

    let new_avatar = if payload.is_empty() {
        // Removal: release the stored reference before clearing it.
        if !row.avatar_url.is_empty() {
            state.images.delete(&row.avatar_url).await?;
        }
        String::new()
    } else {
        let uploaded = state.images.upload(&payload, AVATAR_CONSTRAINTS).await?;
        // Replacement releases the old image too, best-effort: the new
        // reference is already stored upstream, so the update proceeds.
        if !row.avatar_url.is_empty() {
            if let Err(e) = state.images.delete(&row.avatar_url).await {
                warn!("Failed to delete replaced avatar {}: {}", row.avatar_url, e);
            }
        }
        uploaded
    };

    let db = state.clone();
    let uid = user.id.to_string();
    let avatar = new_avatar.clone();
    blocking(move || db.db.set_avatar_url(&uid, &avatar)).await?;

    let mut updated = view::profile(&row);
    updated.profile_pic = new_avatar;
    Ok(Json(updated))
}

pub async fn check_auth(Extension(user): Extension<CurrentUser>) -> Json<CheckAuthResponse> {
    Json(CheckAuthResponse {
        valid: true,
        user: user.profile(),
    })
}
