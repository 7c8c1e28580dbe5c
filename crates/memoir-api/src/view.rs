use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use memoir_db::models::{EntryRow, UserRow};
use memoir_types::api::{EntryResponse, ProfileResponse};

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC and convert.
pub(crate) fn parse_timestamp(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt {} '{}': {}", context, raw, e);
            DateTime::default()
        })
}

pub(crate) fn parse_id(raw: &str, context: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", context, raw, e);
        Uuid::default()
    })
}

pub(crate) fn profile(row: &UserRow) -> ProfileResponse {
    ProfileResponse {
        id: parse_id(&row.id, "user id"),
        username: row.username.clone(),
        email: row.email.clone(),
        profile_pic: row.avatar_url.clone(),
        created_at: parse_timestamp(&row.created_at, "user created_at"),
    }
}

pub(crate) fn entry(row: EntryRow, images: Vec<String>) -> EntryResponse {
    EntryResponse {
        id: parse_id(&row.id, "entry id"),
        owner_id: parse_id(&row.owner_id, "entry owner_id"),
        title: row.title,
        content: row.content,
        images,
        created_at: parse_timestamp(&row.created_at, "entry created_at"),
        updated_at: parse_timestamp(&row.updated_at, "entry updated_at"),
    }
}
