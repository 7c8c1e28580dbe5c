/// Database row types — these map directly to SQLite rows.
/// Distinct from memoir-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar_url: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct EntryRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct EntryImageRow {
    pub entry_id: String,
    pub position: i64,
    pub url: String,
}
