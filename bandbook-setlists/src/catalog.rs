//! Song catalog provider
//!
//! The builder reads songs through [`SongCatalog`]; [`SqliteCatalog`] serves
//! them from the local database and [`crate::client::BandbookClient`] from a
//! remote service.

use async_trait::async_trait;
use bandbook_common::db::Song;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::error::Result;

/// Read access to a band's songs
#[async_trait]
pub trait SongCatalog: Send + Sync {
    /// Every song of the band, sorted by title
    async fn list_songs(&self, band_id: Uuid) -> Result<Vec<Song>>;

    /// Case-insensitive title substring search
    async fn search_songs(&self, band_id: Uuid, query: &str) -> Result<Vec<Song>>;
}

/// Catalog backed by the `songs` table
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
    result_limit: i64,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool, result_limit: i64) -> Self {
        Self { pool, result_limit }
    }
}

#[async_trait]
impl SongCatalog for SqliteCatalog {
    async fn list_songs(&self, band_id: Uuid) -> Result<Vec<Song>> {
        db::songs::list_songs(&self.pool, band_id).await
    }

    async fn search_songs(&self, band_id: Uuid, query: &str) -> Result<Vec<Song>> {
        db::songs::search_songs(&self.pool, band_id, query, self.result_limit).await
    }
}
