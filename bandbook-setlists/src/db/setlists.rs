//! Setlist storage
//!
//! Create and replace each run in a single transaction. Replace deletes the
//! old `set_songs` and `sets` rows, checks the draft against the band's
//! events and catalog, inserts the new rows and updates the setlist row;
//! any failure rolls the whole thing back, so readers only ever see the old
//! or the new setlist.

use std::collections::HashMap;

use async_trait::async_trait;
use bandbook_common::db::{Set, SetSong, Setlist, SetlistSummary};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::bands::{event_belongs_to_band, require_band};
use super::parse_guid;
use super::songs::{song_from_row, song_in_band};
use crate::builder::{SetlistDraft, SetlistStore};
use crate::error::{Error, Result};

pub async fn create_setlist(pool: &SqlitePool, band_id: Uuid, draft: &SetlistDraft) -> Result<Uuid> {
    draft.validate()?;

    let mut tx = pool.begin().await?;
    require_band(&mut *tx, band_id).await?;
    check_references(&mut *tx, band_id, draft).await?;

    let setlist_id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO setlists (guid, band_id, name, event_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(setlist_id.to_string())
    .bind(band_id.to_string())
    .bind(&draft.name)
    .bind(draft.event_id.map(|id| id.to_string()))
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    insert_sets(&mut *tx, setlist_id, draft).await?;
    tx.commit().await?;

    info!(
        setlist_id = %setlist_id,
        sets = draft.sets.len(),
        songs = draft.song_count(),
        "Created setlist '{}'",
        draft.name
    );
    Ok(setlist_id)
}

pub async fn replace_setlist(pool: &SqlitePool, setlist_id: Uuid, draft: &SetlistDraft) -> Result<Uuid> {
    draft.validate()?;

    let mut tx = pool.begin().await?;

    let band_id: Option<String> = sqlx::query_scalar("SELECT band_id FROM setlists WHERE guid = ?")
        .bind(setlist_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
    let band_id = match band_id {
        Some(raw) => parse_guid("setlists.band_id", &raw)?,
        None => return Err(Error::NotFound(format!("setlist {}", setlist_id))),
    };

    let removed_songs = sqlx::query(
        "DELETE FROM set_songs WHERE set_id IN (SELECT guid FROM sets WHERE setlist_id = ?)",
    )
    .bind(setlist_id.to_string())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let removed_sets = sqlx::query("DELETE FROM sets WHERE setlist_id = ?")
        .bind(setlist_id.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();

    debug!(
        setlist_id = %setlist_id,
        removed_sets,
        removed_songs,
        "Cleared previous sets"
    );

    // Returning early drops `tx`, which rolls back the deletes above
    check_references(&mut *tx, band_id, draft).await?;
    insert_sets(&mut *tx, setlist_id, draft).await?;

    sqlx::query("UPDATE setlists SET name = ?, event_id = ?, updated_at = ? WHERE guid = ?")
        .bind(&draft.name)
        .bind(draft.event_id.map(|id| id.to_string()))
        .bind(Utc::now())
        .bind(setlist_id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        setlist_id = %setlist_id,
        sets = draft.sets.len(),
        songs = draft.song_count(),
        "Replaced setlist '{}'",
        draft.name
    );
    Ok(setlist_id)
}

/// Event and songs must belong to the setlist's band
async fn check_references(conn: &mut SqliteConnection, band_id: Uuid, draft: &SetlistDraft) -> Result<()> {
    if let Some(event_id) = draft.event_id {
        if !event_belongs_to_band(&mut *conn, event_id, band_id).await? {
            return Err(Error::validation(
                "eventId",
                format!("event {} does not exist for this band", event_id),
            ));
        }
    }

    for set in &draft.sets {
        for entry in &set.songs {
            if !song_in_band(&mut *conn, entry.song.id, band_id).await? {
                return Err(Error::validation(
                    "sets",
                    format!(
                        "{}: song '{}' is not in the band's catalog",
                        set.name, entry.song.title
                    ),
                ));
            }
        }
    }

    Ok(())
}

async fn insert_sets(conn: &mut SqliteConnection, setlist_id: Uuid, draft: &SetlistDraft) -> Result<()> {
    for set in &draft.sets {
        let set_id = Uuid::new_v4();
        sqlx::query("INSERT INTO sets (guid, setlist_id, name, set_order) VALUES (?, ?, ?, ?)")
            .bind(set_id.to_string())
            .bind(setlist_id.to_string())
            .bind(&set.name)
            .bind(set.order)
            .execute(&mut *conn)
            .await?;

        for entry in &set.songs {
            sqlx::query(
                "INSERT INTO set_songs (guid, set_id, song_id, song_order) VALUES (?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(set_id.to_string())
            .bind(entry.song.id.to_string())
            .bind(entry.position)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

/// Load a setlist with its sets and songs in order
pub async fn fetch_setlist(pool: &SqlitePool, setlist_id: Uuid) -> Result<Setlist> {
    // One read transaction so all three queries see the same snapshot
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        "SELECT guid, band_id, name, event_id, created_at, updated_at FROM setlists WHERE guid = ?",
    )
    .bind(setlist_id.to_string())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| Error::NotFound(format!("setlist {}", setlist_id)))?;

    let band_id: String = row.try_get("band_id")?;
    let event_id: Option<String> = row.try_get("event_id")?;

    let set_rows = sqlx::query(
        "SELECT guid, name, set_order FROM sets WHERE setlist_id = ? ORDER BY set_order",
    )
    .bind(setlist_id.to_string())
    .fetch_all(&mut *tx)
    .await?;

    let mut sets = Vec::with_capacity(set_rows.len());
    let mut index_by_guid = HashMap::new();
    for set_row in &set_rows {
        let guid: String = set_row.try_get("guid")?;
        index_by_guid.insert(guid.clone(), sets.len());
        sets.push(Set {
            id: parse_guid("sets.guid", &guid)?,
            name: set_row.try_get("name")?,
            order: set_row.try_get("set_order")?,
            songs: Vec::new(),
        });
    }

    let song_rows = sqlx::query(
        r#"
        SELECT ss.set_id, ss.song_order, s.guid, s.title, s.artist
        FROM set_songs ss
        JOIN sets st ON st.guid = ss.set_id
        JOIN songs s ON s.guid = ss.song_id
        WHERE st.setlist_id = ?
        ORDER BY st.set_order, ss.song_order
        "#,
    )
    .bind(setlist_id.to_string())
    .fetch_all(&mut *tx)
    .await?;

    for song_row in &song_rows {
        let set_guid: String = song_row.try_get("set_id")?;
        let index = *index_by_guid.get(&set_guid).ok_or_else(|| {
            Error::ConsistencyViolation(format!("set_songs row points at unknown set {}", set_guid))
        })?;
        sets[index].songs.push(SetSong {
            song: song_from_row(song_row)?,
            position: song_row.try_get("song_order")?,
        });
    }
    tx.commit().await?;

    Ok(Setlist {
        id: setlist_id,
        band_id: parse_guid("setlists.band_id", &band_id)?,
        name: row.try_get("name")?,
        event_id: event_id
            .as_deref()
            .map(|raw| parse_guid("setlists.event_id", raw))
            .transpose()?,
        sets,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// Setlists of a band, most recently updated first
pub async fn list_setlists(pool: &SqlitePool, band_id: Uuid) -> Result<Vec<SetlistSummary>> {
    let mut conn = pool.acquire().await?;
    require_band(&mut *conn, band_id).await?;

    let rows = sqlx::query(
        r#"
        SELECT sl.guid, sl.name, sl.event_id, sl.updated_at,
               (SELECT COUNT(*) FROM sets st WHERE st.setlist_id = sl.guid) AS set_count,
               (SELECT COUNT(*) FROM set_songs ss
                  JOIN sets st ON st.guid = ss.set_id
                 WHERE st.setlist_id = sl.guid) AS song_count
        FROM setlists sl
        WHERE sl.band_id = ?
        ORDER BY sl.updated_at DESC, sl.name
        "#,
    )
    .bind(band_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            let guid: String = row.try_get("guid")?;
            let event_id: Option<String> = row.try_get("event_id")?;
            Ok(SetlistSummary {
                id: parse_guid("setlists.guid", &guid)?,
                name: row.try_get("name")?,
                event_id: event_id
                    .as_deref()
                    .map(|raw| parse_guid("setlists.event_id", raw))
                    .transpose()?,
                set_count: row.try_get("set_count")?,
                song_count: row.try_get("song_count")?,
                updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
            })
        })
        .collect()
}

/// Delete a setlist; sets and set songs go with it
pub async fn delete_setlist(pool: &SqlitePool, setlist_id: Uuid) -> Result<()> {
    let deleted = sqlx::query("DELETE FROM setlists WHERE guid = ?")
        .bind(setlist_id.to_string())
        .execute(pool)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(Error::NotFound(format!("setlist {}", setlist_id)));
    }
    info!("Deleted setlist {}", setlist_id);
    Ok(())
}

/// [`SetlistStore`] over the local database
#[derive(Clone)]
pub struct SqliteSetlistStore {
    pool: SqlitePool,
}

impl SqliteSetlistStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SetlistStore for SqliteSetlistStore {
    async fn create_setlist(&self, band_id: Uuid, draft: &SetlistDraft) -> Result<Uuid> {
        create_setlist(&self.pool, band_id, draft).await
    }

    async fn replace_setlist(&self, setlist_id: Uuid, draft: &SetlistDraft) -> Result<Uuid> {
        replace_setlist(&self.pool, setlist_id, draft).await
    }
}
