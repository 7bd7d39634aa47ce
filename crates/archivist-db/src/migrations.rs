use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Archive DB: running migration v1 (initial schema)");
        // Timestamps are epoch milliseconds so the retention filter is an
        // exact integer comparison.
        conn.execute_batch(
            "
            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id      INTEGER NOT NULL,
                date            INTEGER NOT NULL,
                text            TEXT,
                sender_id       INTEGER,
                sender_username TEXT,
                chat_id         INTEGER,
                chat_name       TEXT,
                media_path      TEXT,
                kind            TEXT NOT NULL CHECK (kind IN ('text', 'media')),
                saved_at        INTEGER NOT NULL
            );

            CREATE INDEX idx_messages_saved_at ON messages(saved_at);
            CREATE INDEX idx_messages_chat ON messages(chat_id, message_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
