//! Database initialization
//!
//! Creates the database on first run, applies connection pragmas, creates
//! every table idempotently and fills in default runtime settings.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when the table layout changes
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Built-in defaults for the `settings` table
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("search_debounce_ms", "500"),
    ("search_result_limit", "50"),
    ("seed_max_songs_per_set", "15"),
    ("http_max_body_size_bytes", "1048576"),
];

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas go through the connect options so every pooled connection gets
    // them, not just the first one
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create every table (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_bands_table(pool).await?;
    create_songs_table(pool).await?;
    create_events_table(pool).await?;
    create_setlists_table(pool).await?;
    create_sets_table(pool).await?;
    create_set_songs_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(CURRENT_SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_bands_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bands (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_songs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            guid TEXT PRIMARY KEY,
            band_id TEXT NOT NULL REFERENCES bands(guid) ON DELETE CASCADE,
            title TEXT NOT NULL,
            artist TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_songs_band ON songs(band_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            guid TEXT PRIMARY KEY,
            band_id TEXT NOT NULL REFERENCES bands(guid) ON DELETE CASCADE,
            name TEXT NOT NULL,
            starts_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_setlists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS setlists (
            guid TEXT PRIMARY KEY,
            band_id TEXT NOT NULL REFERENCES bands(guid) ON DELETE CASCADE,
            name TEXT NOT NULL,
            event_id TEXT REFERENCES events(guid) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_setlists_band ON setlists(band_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_sets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sets (
            guid TEXT PRIMARY KEY,
            setlist_id TEXT NOT NULL REFERENCES setlists(guid) ON DELETE CASCADE,
            name TEXT NOT NULL,
            set_order INTEGER NOT NULL CHECK (set_order >= 1),
            UNIQUE (setlist_id, set_order)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_set_songs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS set_songs (
            guid TEXT PRIMARY KEY,
            set_id TEXT NOT NULL REFERENCES sets(guid) ON DELETE CASCADE,
            song_id TEXT NOT NULL REFERENCES songs(guid) ON DELETE CASCADE,
            song_order INTEGER NOT NULL CHECK (song_order >= 1),
            UNIQUE (set_id, song_order)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_set_songs_set ON set_songs(set_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Initialize or repair default settings
///
/// Missing keys are created; NULL values are reset to the built-in default.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    for (key, value) in DEFAULT_SETTINGS {
        ensure_setting(pool, key, value).await?;
    }
    Ok(())
}

/// Ensure a setting exists with the specified default value
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let existing: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match existing {
        None => {
            // INSERT OR IGNORE: two services may initialize the same file
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;
            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some(None) => {
            sqlx::query("UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ?")
                .bind(default_value)
                .bind(key)
                .execute(pool)
                .await?;
            warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
        }
        Some(Some(_)) => {}
    }

    Ok(())
}

/// Read a raw setting value
pub async fn read_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value.flatten())
}

/// Write a setting value (insert or replace)
pub async fn write_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}
