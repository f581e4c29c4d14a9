use sqlx::SqlitePool;
use tracing::info;

/// Initialize the database schema. Safe to run on every start.
pub async fn create_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            username      TEXT    NOT NULL UNIQUE,
            password_hash TEXT    NOT NULL,
            full_name     TEXT    NOT NULL,
            email         TEXT    NOT NULL UNIQUE,
            role          TEXT    NOT NULL DEFAULT 'viewer'
                                  CHECK (role IN ('viewer', 'staff', 'admin')),
            status        TEXT    NOT NULL DEFAULT 'active'
                                  CHECK (status IN ('active', 'inactive')),
            created_at    INTEGER NOT NULL,
            updated_at    INTEGER NOT NULL,
            last_login    INTEGER
        )",
    )
    .execute(pool)
    .await?;

    // --- Indexes --------------------------------------------------------
    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_users_role       ON users(role)",
        "CREATE INDEX IF NOT EXISTS idx_users_status     ON users(status)",
        "CREATE INDEX IF NOT EXISTS idx_users_created_at ON users(created_at)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Database schema ready");
    Ok(())
}
