//! Bands and the events their setlists may point at

use bandbook_common::db::{Band, Event};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};

pub async fn insert_band(pool: &SqlitePool, name: &str) -> Result<Band> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("name", "band name is required"));
    }

    let band = Band {
        id: Uuid::new_v4(),
        name: name.to_string(),
    };
    sqlx::query("INSERT INTO bands (guid, name) VALUES (?, ?)")
        .bind(band.id.to_string())
        .bind(&band.name)
        .execute(pool)
        .await?;

    info!("Created band '{}' ({})", band.name, band.id);
    Ok(band)
}

pub async fn band_exists(conn: &mut SqliteConnection, band_id: Uuid) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bands WHERE guid = ?")
        .bind(band_id.to_string())
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

/// Fail with `NotFound` unless the band exists
pub async fn require_band(conn: &mut SqliteConnection, band_id: Uuid) -> Result<()> {
    if band_exists(conn, band_id).await? {
        Ok(())
    } else {
        Err(Error::NotFound(format!("band {}", band_id)))
    }
}

pub async fn insert_event(
    pool: &SqlitePool,
    band_id: Uuid,
    name: &str,
    starts_at: Option<DateTime<Utc>>,
) -> Result<Event> {
    let mut conn = pool.acquire().await?;
    require_band(&mut *conn, band_id).await?;

    let event = Event {
        id: Uuid::new_v4(),
        band_id,
        name: name.trim().to_string(),
        starts_at,
    };
    sqlx::query("INSERT INTO events (guid, band_id, name, starts_at) VALUES (?, ?, ?, ?)")
        .bind(event.id.to_string())
        .bind(band_id.to_string())
        .bind(&event.name)
        .bind(event.starts_at)
        .execute(&mut *conn)
        .await?;

    Ok(event)
}

/// True if `event_id` is an event of `band_id`
pub async fn event_belongs_to_band(
    conn: &mut SqliteConnection,
    event_id: Uuid,
    band_id: Uuid,
) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE guid = ? AND band_id = ?")
            .bind(event_id.to_string())
            .bind(band_id.to_string())
            .fetch_one(conn)
            .await?;
    Ok(count > 0)
}
