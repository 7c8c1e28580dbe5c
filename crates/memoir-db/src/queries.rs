use crate::Database;
use crate::models::{EntryImageRow, EntryRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password) VALUES (?1, ?2, ?3, ?4)",
                (id, username, email, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn set_avatar_url(&self, user_id: &str, url: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET avatar_url = ?2 WHERE id = ?1",
                (user_id, url),
            )?;
            Ok(())
        })
    }

    // -- Entries --

    /// Insert an entry together with its ordered image references.
    /// Runs in a transaction so a failed image insert leaves no entry behind.
    pub fn insert_entry(
        &self,
        id: &str,
        owner_id: &str,
        title: &str,
        content: &str,
        images: &[String],
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO entries (id, owner_id, title, content) VALUES (?1, ?2, ?3, ?4)",
                (id, owner_id, title, content),
            )?;
            insert_images(&tx, id, images)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_entry(&self, id: &str) -> Result<Option<EntryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, title, content, created_at, updated_at
                 FROM entries WHERE id = ?1",
            )?;

            let row = stmt.query_row([id], map_entry_row).optional()?;
            Ok(row)
        })
    }

    /// All entries for an owner, newest first. SQLite timestamps are
    /// second-granular, so rowid breaks ties between same-second inserts.
    pub fn entries_for_owner(&self, owner_id: &str) -> Result<Vec<EntryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, title, content, created_at, updated_at
                 FROM entries WHERE owner_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;

            let rows = stmt
                .query_map([owner_id], map_entry_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Image references for a single entry, in upload order.
    pub fn images_for_entry(&self, entry_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT url FROM entry_images WHERE entry_id = ?1 ORDER BY position",
            )?;

            let urls = stmt
                .query_map([entry_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;

            Ok(urls)
        })
    }

    /// Batch-fetch image references for a set of entry IDs.
    pub fn images_for_entries(&self, entry_ids: &[String]) -> Result<Vec<EntryImageRow>> {
        if entry_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=entry_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT entry_id, position, url FROM entry_images WHERE entry_id IN ({}) ORDER BY entry_id, position",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = entry_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(EntryImageRow {
                        entry_id: row.get(0)?,
                        position: row.get(1)?,
                        url: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Update title/content, refresh `updated_at`, and (when `images` is
    /// given) replace the stored image list wholesale. `owner_id` is never
    /// touched.
    pub fn update_entry(
        &self,
        id: &str,
        title: &str,
        content: &str,
        images: Option<&[String]>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE entries SET title = ?2, content = ?3, updated_at = datetime('now')
                 WHERE id = ?1",
                (id, title, content),
            )?;

            if let Some(images) = images {
                tx.execute("DELETE FROM entry_images WHERE entry_id = ?1", [id])?;
                insert_images(&tx, id, images)?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Delete an entry; its image rows go with it via ON DELETE CASCADE.
    pub fn delete_entry(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM entries WHERE id = ?1", [id])?;
            Ok(())
        })
    }
}

fn insert_images(conn: &Connection, entry_id: &str, images: &[String]) -> Result<()> {
    let mut stmt =
        conn.prepare("INSERT INTO entry_images (entry_id, position, url) VALUES (?1, ?2, ?3)")?;
    for (position, url) in images.iter().enumerate() {
        stmt.execute((entry_id, position as i64, url))?;
    }
    Ok(())
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is a compile-time constant here, never user input.
    let sql = format!(
        "SELECT id, username, email, password, avatar_url, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                avatar_url: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn map_entry_row(row: &rusqlite::Row<'_>) -> std::result::Result<EntryRow, rusqlite::Error> {
    Ok(EntryRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, is_unique_violation};

    fn db_with_user(id: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(id, &format!("user-{}", id), &format!("{}@example.com", id), "hash")
            .unwrap();
        db
    }

    #[test]
    fn create_and_fetch_user() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "ada", "ada@example.com", "hash").unwrap();

        let by_email = db.get_user_by_email("ada@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, "u1");
        assert_eq!(by_email.username, "ada");
        assert_eq!(by_email.avatar_url, "");

        let by_id = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(by_id.email, "ada@example.com");

        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_and_email_are_distinguishable() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "ada", "ada@example.com", "hash").unwrap();

        let err = db.create_user("u2", "ada", "other@example.com", "hash").unwrap_err();
        assert!(is_unique_violation(&err, "users.username"));
        assert!(!is_unique_violation(&err, "users.email"));

        let err = db.create_user("u3", "grace", "ada@example.com", "hash").unwrap_err();
        assert!(is_unique_violation(&err, "users.email"));
    }

    #[test]
    fn set_avatar_url_roundtrip() {
        let db = db_with_user("u1");
        db.set_avatar_url("u1", "https://img.example/a.png").unwrap();
        let user = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(user.avatar_url, "https://img.example/a.png");

        db.set_avatar_url("u1", "").unwrap();
        assert_eq!(db.get_user_by_id("u1").unwrap().unwrap().avatar_url, "");
    }

    #[test]
    fn insert_entry_preserves_image_order() {
        let db = db_with_user("u1");
        let images = vec![
            "https://img.example/1.png".to_string(),
            "https://img.example/2.png".to_string(),
            "https://img.example/3.png".to_string(),
        ];
        db.insert_entry("e1", "u1", "Title", "Content", &images).unwrap();

        assert_eq!(db.images_for_entry("e1").unwrap(), images);

        let entry = db.get_entry("e1").unwrap().unwrap();
        assert_eq!(entry.owner_id, "u1");
        assert_eq!(entry.title, "Title");
    }

    #[test]
    fn entries_for_owner_newest_first() {
        let db = db_with_user("u1");
        db.insert_entry("e1", "u1", "first", "c", &[]).unwrap();
        db.insert_entry("e2", "u1", "second", "c", &[]).unwrap();
        db.insert_entry("e3", "u1", "third", "c", &[]).unwrap();

        let ids: Vec<String> = db
            .entries_for_owner("u1")
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["e3", "e2", "e1"]);
    }

    #[test]
    fn entries_for_owner_excludes_other_owners() {
        let db = db_with_user("u1");
        db.create_user("u2", "grace", "grace@example.com", "hash").unwrap();
        db.insert_entry("e1", "u1", "mine", "c", &[]).unwrap();
        db.insert_entry("e2", "u2", "theirs", "c", &[]).unwrap();

        let mine = db.entries_for_owner("u1").unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, "e1");
    }

    #[test]
    fn update_entry_replaces_images_and_keeps_owner() {
        let db = db_with_user("u1");
        let old = vec!["https://img.example/old.png".to_string()];
        db.insert_entry("e1", "u1", "t", "c", &old).unwrap();

        let new = vec![
            "https://img.example/new1.png".to_string(),
            "https://img.example/new2.png".to_string(),
        ];
        db.update_entry("e1", "t2", "c2", Some(&new)).unwrap();

        let entry = db.get_entry("e1").unwrap().unwrap();
        assert_eq!(entry.owner_id, "u1");
        assert_eq!(entry.title, "t2");
        assert_eq!(entry.content, "c2");
        assert_eq!(db.images_for_entry("e1").unwrap(), new);
    }

    #[test]
    fn update_entry_without_images_leaves_them_untouched() {
        let db = db_with_user("u1");
        let images = vec!["https://img.example/keep.png".to_string()];
        db.insert_entry("e1", "u1", "t", "c", &images).unwrap();

        db.update_entry("e1", "t2", "c", None).unwrap();
        assert_eq!(db.images_for_entry("e1").unwrap(), images);
    }

    #[test]
    fn delete_entry_cascades_to_images() {
        let db = db_with_user("u1");
        let images = vec!["https://img.example/1.png".to_string()];
        db.insert_entry("e1", "u1", "t", "c", &images).unwrap();

        db.delete_entry("e1").unwrap();
        assert!(db.get_entry("e1").unwrap().is_none());
        assert!(db.images_for_entry("e1").unwrap().is_empty());
    }

    #[test]
    fn images_for_entries_batches_across_entries() {
        let db = db_with_user("u1");
        db.insert_entry("e1", "u1", "t", "c", &["a".to_string(), "b".to_string()]).unwrap();
        db.insert_entry("e2", "u1", "t", "c", &["c".to_string()]).unwrap();

        let rows = db
            .images_for_entries(&["e1".to_string(), "e2".to_string()])
            .unwrap();
        assert_eq!(rows.len(), 3);

        let e1: Vec<&str> = rows
            .iter()
            .filter(|r| r.entry_id == "e1")
            .map(|r| r.url.as_str())
            .collect();
        assert_eq!(e1, vec!["a", "b"]);

        assert!(db.images_for_entries(&[]).unwrap().is_empty());
    }
}
