//! Runtime settings read from the `settings` table
//!
//! Defaults are written by `bandbook_common::db::init_database`; values are
//! clamped to sane ranges when loaded.

use std::str::FromStr;
use std::time::Duration;

use bandbook_common::db::read_setting;
use sqlx::SqlitePool;

use crate::builder::{MAX_SONGS_PER_SET, SEARCH_DEBOUNCE};
use crate::error::{Error, Result};

/// Tunables for builder sessions and the HTTP service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderSettings {
    pub search_debounce: Duration,
    pub search_result_limit: i64,
    pub max_songs_per_set: usize,
    pub max_body_size_bytes: usize,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        Self {
            search_debounce: SEARCH_DEBOUNCE,
            search_result_limit: 50,
            max_songs_per_set: MAX_SONGS_PER_SET,
            max_body_size_bytes: 1024 * 1024,
        }
    }
}

impl BuilderSettings {
    /// Load from the database, falling back to defaults for missing keys
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();

        let debounce_ms = get_setting::<u64>(pool, "search_debounce_ms")
            .await?
            .map(|ms| ms.clamp(50, 5000))
            .map(Duration::from_millis)
            .unwrap_or(defaults.search_debounce);

        let search_result_limit = get_setting::<i64>(pool, "search_result_limit")
            .await?
            .map(|limit| limit.clamp(1, 500))
            .unwrap_or(defaults.search_result_limit);

        let max_songs_per_set = get_setting::<usize>(pool, "seed_max_songs_per_set")
            .await?
            .map(|cap| cap.clamp(1, 200))
            .unwrap_or(defaults.max_songs_per_set);

        let max_body_size_bytes = get_setting::<usize>(pool, "http_max_body_size_bytes")
            .await?
            .map(|bytes| bytes.clamp(4096, 64 * 1024 * 1024))
            .unwrap_or(defaults.max_body_size_bytes);

        Ok(Self {
            search_debounce: debounce_ms,
            search_result_limit,
            max_songs_per_set,
            max_body_size_bytes,
        })
    }
}

/// Parse a setting value; unparseable values are a configuration error
async fn get_setting<T: FromStr>(pool: &SqlitePool, key: &str) -> Result<Option<T>> {
    match read_setting(pool, key).await? {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            Error::Common(bandbook_common::Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, raw
            )))
        }),
        None => Ok(None),
    }
}
