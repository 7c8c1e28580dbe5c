pub mod auth;
pub mod entries;
pub mod error;
pub mod middleware;
mod view;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::auth::AppState;

/// Assemble the full API surface. Session-guarded routes sit behind
/// [`middleware::require_auth`]; everything else is public.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/api/auth/profile", get(auth::get_profile))
        .route("/api/auth/update-profile", put(auth::update_profile))
        .route("/api/auth/check-auth", get(auth::check_auth))
        .route("/api/entry/create", post(entries::create_entry))
        .route("/api/entry/all", get(entries::get_entries))
        .route("/api/entry/edit/{id}", put(entries::edit_entry))
        .route(
            "/api/entry/{id}",
            get(entries::get_entry_by_id).delete(entries::delete_entry),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    Router::new().merge(public).merge(protected)
}

/// Run blocking rusqlite work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => Err(anyhow::anyhow!("blocking task join error: {}", e)),
    }
}
