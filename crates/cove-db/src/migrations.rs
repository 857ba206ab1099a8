use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Nil-UUID system user owning the seeded default channel.
pub const SYSTEM_USER_ID: &str = "00000000-0000-0000-0000-000000000000";

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT,
            email       TEXT NOT NULL UNIQUE,
            avatar_url  TEXT,
            app_role    TEXT NOT NULL DEFAULT 'user'
                        CHECK (app_role IN ('user', 'moderator', 'admin')),
            inserted_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS channels (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            slug        TEXT NOT NULL UNIQUE,
            created_by  TEXT NOT NULL REFERENCES users(id),
            inserted_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            channel_id  INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id),
            message     TEXT NOT NULL,
            inserted_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON messages(channel_id, inserted_at);

        -- Seed the system user and the protected default channel (id 1)
        INSERT OR IGNORE INTO users (id, username, email, app_role)
            VALUES ('00000000-0000-0000-0000-000000000000', 'system', 'system@localhost', 'admin');
        INSERT OR IGNORE INTO channels (id, slug, created_by)
            VALUES (1, 'general', '00000000-0000-0000-0000-000000000000');
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
