use crate::Database;
use crate::models::{ChannelRow, MessageRow, UserRow};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

const MESSAGE_SELECT: &str = "
    SELECT m.id, m.channel_id, m.user_id, m.message, m.inserted_at,
           u.username, u.email, u.avatar_url, u.app_role
    FROM messages m
    LEFT JOIN users u ON m.user_id = u.id";

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, email: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email) VALUES (?1, ?2)",
                (id, email),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    /// Apply a profile update and return the fresh row. NULL inputs clear
    /// the column, matching explicit-null-to-clear semantics.
    pub fn update_user(
        &self,
        id: &str,
        username: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<UserRow> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET username = ?2, avatar_url = ?3 WHERE id = ?1",
                rusqlite::params![id, username, avatar_url],
            )?;
            if changed == 0 {
                return Err(anyhow!("user not found: {}", id));
            }
            query_user(conn, "id", id)?.ok_or_else(|| anyhow!("user not found: {}", id))
        })
    }

    pub fn set_app_role(&self, id: &str, role: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE users SET app_role = ?2 WHERE id = ?1", (id, role))?;
            Ok(())
        })
    }

    // -- Channels --

    pub fn list_channels(&self) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, slug, created_by, inserted_at FROM channels ORDER BY id",
            )?;
            let rows = stmt
                .query_map([], channel_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_channel(&self, id: i64) -> Result<Option<ChannelRow>> {
        self.with_conn(|conn| {
            conn.prepare("SELECT id, slug, created_by, inserted_at FROM channels WHERE id = ?1")?
                .query_row([id], channel_from_row)
                .optional()
        })
    }

    /// Insert a channel and return the stored row with its assigned id and
    /// timestamp.
    pub fn insert_channel(&self, slug: &str, created_by: &str) -> Result<ChannelRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channels (slug, created_by) VALUES (?1, ?2)",
                (slug, created_by),
            )?;
            let id = conn.last_insert_rowid();
            conn.prepare("SELECT id, slug, created_by, inserted_at FROM channels WHERE id = ?1")?
                .query_row([id], channel_from_row)
                .map_err(Into::into)
        })
    }

    /// Delete a channel; messages cascade via the foreign key. Returns true
    /// if a row was removed.
    pub fn delete_channel(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM channels WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Messages --

    /// Fetch a channel's messages oldest-first, each row joined with the
    /// author's profile in a single query (eliminates N+1).
    pub fn list_messages(&self, channel_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("{MESSAGE_SELECT} WHERE m.channel_id = ?1 ORDER BY m.inserted_at, m.id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([channel_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
            conn.prepare(&sql)?.query_row([id], message_from_row).optional()
        })
    }

    pub fn insert_message(&self, channel_id: i64, user_id: &str, body: &str) -> Result<MessageRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (channel_id, user_id, message) VALUES (?1, ?2, ?3)",
                rusqlite::params![channel_id, user_id, body],
            )?;
            let id = conn.last_insert_rowid();
            let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
            conn.prepare(&sql)?.query_row([id], message_from_row).map_err(Into::into)
        })
    }

    /// Returns true if a row was removed.
    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

fn channel_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: row.get(0)?,
        slug: row.get(1)?,
        created_by: row.get(2)?,
        inserted_at: row.get(3)?,
    })
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        user_id: row.get(2)?,
        message: row.get(3)?,
        inserted_at: row.get(4)?,
        author_username: row.get(5)?,
        author_email: row.get(6)?,
        author_avatar_url: row.get(7)?,
        author_app_role: row.get(8)?,
    })
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // column is a compile-time constant at every call site
    let sql = format!("SELECT id, username, email, avatar_url, app_role FROM users WHERE {column} = ?1");
    conn.prepare(&sql)?
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                avatar_url: row.get(3)?,
                app_role: row.get(4)?,
            })
        })
        .optional()
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
    use super::*;
    use crate::migrations::SYSTEM_USER_ID;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn seeds_default_channel() {
        let db = test_db();
        let channels = db.list_channels().unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].id, 1);
        assert_eq!(channels[0].slug, "general");
    }

    #[test]
    fn channel_ids_are_monotonic() {
        let db = test_db();
        let a = db.insert_channel("alpha", SYSTEM_USER_ID).unwrap();
        let b = db.insert_channel("beta", SYSTEM_USER_ID).unwrap();
        assert!(b.id > a.id);
        assert!(a.id > 1);
    }

    #[test]
    fn delete_channel_cascades_messages() {
        let db = test_db();
        db.create_user("u-1", "a@example.com").unwrap();
        let chan = db.insert_channel("doomed", "u-1").unwrap();
        let msg = db.insert_message(chan.id, "u-1", "hello").unwrap();

        assert!(db.delete_channel(chan.id).unwrap());
        assert!(db.get_message(msg.id).unwrap().is_none());
        assert_eq!(db.list_messages(chan.id).unwrap().len(), 0);
    }

    #[test]
    fn message_rows_carry_author_snapshot() {
        let db = test_db();
        db.create_user("u-1", "a@example.com").unwrap();
        db.update_user("u-1", Some("alice"), None).unwrap();

        let row = db.insert_message(1, "u-1", "hi").unwrap();
        assert_eq!(row.author_username.as_deref(), Some("alice"));
        assert_eq!(row.author_email.as_deref(), Some("a@example.com"));
        assert_eq!(row.author_app_role.as_deref(), Some("user"));
    }

    #[test]
    fn update_user_clears_with_null() {
        let db = test_db();
        db.create_user("u-1", "a@example.com").unwrap();
        db.update_user("u-1", Some("alice"), Some("http://x/a.png")).unwrap();

        let row = db.update_user("u-1", None, None).unwrap();
        assert!(row.username.is_none());
        assert!(row.avatar_url.is_none());
    }

    #[test]
    fn delete_message_reports_missing_rows() {
        let db = test_db();
        assert!(!db.delete_message(999).unwrap());
    }
}
