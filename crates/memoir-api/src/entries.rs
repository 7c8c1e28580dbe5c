use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::future::{join_all, try_join_all};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use memoir_db::Database;
use memoir_db::models::EntryRow;
use memoir_imagestore::ENTRY_CONSTRAINTS;
use memoir_types::api::{CreateEntryRequest, EntryResponse, UpdateEntryRequest};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::view;

pub async fn create_entry(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateEntryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() || req.content.trim().is_empty() {
        return Err(ApiError::Validation("Fill title and content".into()));
    }

    // All payloads upload concurrently; the first failure aborts the whole
    // request before anything touches the database. Reference order follows
    // payload order, not completion order.
    let references = try_join_all(
        req.images
            .iter()
            .map(|payload| state.images.upload(payload, ENTRY_CONSTRAINTS)),
    )
    .await?;

    let entry_id = Uuid::new_v4();

    let db = state.clone();
    let eid = entry_id.to_string();
    let owner = user.id.to_string();
    let (row, images) = blocking(move || {
        db.db
            .insert_entry(&eid, &owner, &req.title, &req.content, &references)?;
        fetch_entry(&db.db, &eid)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(view::entry(row, images))))
}

pub async fn get_entries(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let owner = user.id.to_string();
    let (rows, image_rows) = blocking(move || {
        let rows = db.db.entries_for_owner(&owner)?;
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let image_rows = db.db.images_for_entries(&ids)?;
        Ok((rows, image_rows))
    })
    .await?;

    // Group references by entry; rows arrive ordered by position.
    let mut images_by_entry: HashMap<String, Vec<String>> = HashMap::new();
    for img in image_rows {
        images_by_entry.entry(img.entry_id).or_default().push(img.url);
    }

    let entries: Vec<EntryResponse> = rows
        .into_iter()
        .map(|row| {
            let images = images_by_entry.remove(&row.id).unwrap_or_default();
            view::entry(row, images)
        })
        .collect();

    Ok(Json(entries))
}

pub async fn get_entry_by_id(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (row, images) = owned_entry(&state, &user, id).await?;
    Ok(Json(view::entry(row, images)))
}

pub async fn edit_entry(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEntryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (row, current_images) = owned_entry(&state, &user, id).await?;

    // A non-empty replacement list swaps the external images wholesale:
    // release every stored reference, then upload the new payloads. An
    // empty or absent list leaves the stored images alone.
    let new_images = match req.images.as_deref() {
        Some(payloads) if !payloads.is_empty() => {
            try_join_all(current_images.iter().map(|r| state.images.delete(r))).await?;

            let uploaded = try_join_all(
                payloads
                    .iter()
                    .map(|payload| state.images.upload(payload, ENTRY_CONSTRAINTS)),
            )
            .await?;
            Some(uploaded)
        }
        _ => None,
    };

    let title = pick(req.title, row.title);
    let content = pick(req.content, row.content);

    let db = state.clone();
    let eid = row.id;
    let (updated, images) = blocking(move || {
        db.db
            .update_entry(&eid, &title, &content, new_images.as_deref())?;
        fetch_entry(&db.db, &eid)
    })
    .await?;

    Ok(Json(view::entry(updated, images)))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (row, images) = owned_entry(&state, &user, id).await?;

    // Best-effort cleanup: a failing image delete must never keep the
    // entry itself alive.
    let outcomes = join_all(images.iter().map(|r| state.images.delete(r))).await;
    for (reference, outcome) in images.iter().zip(outcomes) {
        if let Err(e) = outcome {
            warn!("Failed to delete image {}: {}", reference, e);
        }
    }

    let db = state.clone();
    let eid = row.id;
    blocking(move || db.db.delete_entry(&eid)).await?;

    Ok(Json(json!({ "message": "Memory deleted successfully!" })))
}

/// Fetch an entry with its images and enforce that `user` owns it.
/// Absent entries are 404; foreign entries are 403.
async fn owned_entry(
    state: &AppState,
    user: &CurrentUser,
    entry_id: Uuid,
) -> Result<(EntryRow, Vec<String>), ApiError> {
    let db = state.clone();
    let eid = entry_id.to_string();
    let found = blocking(move || {
        let row = db.db.get_entry(&eid)?;
        let images = match &row {
            Some(r) => db.db.images_for_entry(&r.id)?,
            None => vec![],
        };
        Ok(row.map(|r| (r, images)))
    })
    .await?;

    let (row, images) = found.ok_or(ApiError::NotFound("Entry"))?;
    if row.owner_id != user.id.to_string() {
        return Err(ApiError::Forbidden);
    }
    Ok((row, images))
}

fn fetch_entry(db: &Database, id: &str) -> anyhow::Result<(EntryRow, Vec<String>)> {
    let row = db
        .get_entry(id)?
        .ok_or_else(|| anyhow::anyhow!("entry row missing right after write: {}", id))?;
    let images = db.images_for_entry(id)?;
    Ok((row, images))
}

/// Empty or absent means "keep the existing value".
fn pick(new: Option<String>, existing: String) -> String {
    match new {
        Some(v) if !v.trim().is_empty() => v,
        _ => existing,
    }
}
