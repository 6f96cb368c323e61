//! Band song catalog queries

use bandbook_common::db::Song;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::bands::require_band;
use super::parse_guid;
use crate::error::{Error, Result};

pub(crate) fn song_from_row(row: &SqliteRow) -> Result<Song> {
    let guid: String = row.try_get("guid")?;
    Ok(Song {
        id: parse_guid("songs.guid", &guid)?,
        title: row.try_get("title")?,
        artist: row.try_get("artist")?,
    })
}

/// All songs of a band, sorted by title
pub async fn list_songs(pool: &SqlitePool, band_id: Uuid) -> Result<Vec<Song>> {
    let rows = sqlx::query(
        "SELECT guid, title, artist FROM songs WHERE band_id = ? ORDER BY title COLLATE NOCASE, guid",
    )
    .bind(band_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(song_from_row).collect()
}

/// Case-insensitive substring match on title, at most `limit` rows
pub async fn search_songs(
    pool: &SqlitePool,
    band_id: Uuid,
    query: &str,
    limit: i64,
) -> Result<Vec<Song>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let pattern = format!("%{}%", escape_like(query));
    let rows = sqlx::query(
        r#"
        SELECT guid, title, artist FROM songs
        WHERE band_id = ? AND title LIKE ? ESCAPE '\'
        ORDER BY title COLLATE NOCASE, guid
        LIMIT ?
        "#,
    )
    .bind(band_id.to_string())
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(song_from_row).collect()
}

pub async fn insert_song(pool: &SqlitePool, band_id: Uuid, title: &str, artist: &str) -> Result<Song> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::validation("title", "song title is required"));
    }

    let mut conn = pool.acquire().await?;
    require_band(&mut *conn, band_id).await?;

    let song = Song::new(title, artist.trim());
    sqlx::query("INSERT INTO songs (guid, band_id, title, artist) VALUES (?, ?, ?, ?)")
        .bind(song.id.to_string())
        .bind(band_id.to_string())
        .bind(&song.title)
        .bind(&song.artist)
        .execute(&mut *conn)
        .await?;

    Ok(song)
}

/// True if the song is in the band's catalog
pub async fn song_in_band(conn: &mut SqliteConnection, song_id: Uuid, band_id: Uuid) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs WHERE guid = ? AND band_id = ?")
        .bind(song_id.to_string())
        .bind(band_id.to_string())
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::bands::insert_band;
    use bandbook_common::db::init_database;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, SqlitePool, Uuid) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("bandbook.db")).await.unwrap();
        let band = insert_band(&pool, "The Testers").await.unwrap();
        (dir, pool, band.id)
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_band_scoped() {
        let (_dir, pool, band_id) = setup().await;
        let other = insert_band(&pool, "Other").await.unwrap();
        insert_song(&pool, band_id, "Apple Pie", "").await.unwrap();
        insert_song(&pool, band_id, "Crab Apple", "").await.unwrap();
        insert_song(&pool, band_id, "Banana", "").await.unwrap();
        insert_song(&pool, other.id, "Apples", "").await.unwrap();

        let found = search_songs(&pool, band_id, "APPLE", 50).await.unwrap();

        let titles: Vec<_> = found.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Apple Pie", "Crab Apple"]);
    }

    #[tokio::test]
    async fn test_search_limit_and_wildcards() {
        let (_dir, pool, band_id) = setup().await;
        insert_song(&pool, band_id, "100% Pure", "").await.unwrap();
        insert_song(&pool, band_id, "1000 Miles", "").await.unwrap();

        let literal = search_songs(&pool, band_id, "0%", 50).await.unwrap();
        assert_eq!(literal.len(), 1);

        let limited = search_songs(&pool, band_id, "0", 1).await.unwrap();
        assert_eq!(limited.len(), 1);

        assert!(search_songs(&pool, band_id, "  ", 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_song_validation() {
        let (_dir, pool, band_id) = setup().await;

        assert!(matches!(
            insert_song(&pool, band_id, " ", "x").await,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            insert_song(&pool, Uuid::new_v4(), "Song", "x").await,
            Err(Error::NotFound(_))
        ));

        let listed = list_songs(&pool, band_id).await.unwrap();
        assert!(listed.is_empty());
    }
}
