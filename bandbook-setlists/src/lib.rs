//! bandbook-setlists library
//!
//! Setlist builder (column model, reordering, search-assisted picking,
//! transactional persistence) and the HTTP service that backs it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

pub mod api;
pub mod builder;
pub mod catalog;
pub mod client;
pub mod db;
pub mod error;
pub mod settings;

pub use error::{Error, Result};
pub use settings::BuilderSettings;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub settings: BuilderSettings,
    /// Setlists with a replace currently running
    replacing: Arc<Mutex<HashSet<Uuid>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, settings: BuilderSettings) -> Self {
        Self {
            db,
            settings,
            replacing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Mark a replace of `setlist_id` as in flight until the guard drops
    pub fn begin_replace(&self, setlist_id: Uuid) -> Result<ReplaceGuard> {
        let mut replacing = self
            .replacing
            .lock()
            .map_err(|_| Error::ConsistencyViolation("replace registry poisoned".to_string()))?;

        if !replacing.insert(setlist_id) {
            warn!("Replace of setlist {} already in flight", setlist_id);
            return Err(Error::InvalidOperation(format!(
                "setlist {} is already being saved",
                setlist_id
            )));
        }

        Ok(ReplaceGuard {
            replacing: Arc::clone(&self.replacing),
            setlist_id,
        })
    }

    /// `NotFound` unless the band exists
    pub async fn require_band(&self, band_id: Uuid) -> Result<()> {
        let mut conn = self.db.acquire().await?;
        db::bands::require_band(&mut *conn, band_id).await
    }
}

/// Releases a setlist from the in-flight set on drop
pub struct ReplaceGuard {
    replacing: Arc<Mutex<HashSet<Uuid>>>,
    setlist_id: Uuid,
}

impl Drop for ReplaceGuard {
    fn drop(&mut self) {
        if let Ok(mut replacing) = self.replacing.lock() {
            replacing.remove(&self.setlist_id);
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let body_limit = state.settings.max_body_size_bytes;

    let api = Router::new()
        .route("/api/bands", post(api::create_band))
        .route(
            "/api/bands/:band_id/songs",
            get(api::list_songs).post(api::create_song),
        )
        .route("/api/bands/:band_id/songs/search", get(api::search_songs))
        .route(
            "/api/bands/:band_id/setlists",
            get(api::list_setlists).post(api::create_setlist),
        )
        .route(
            "/api/setlists/:id",
            get(api::get_setlist)
                .put(api::replace_setlist)
                .delete(api::delete_setlist),
        );

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandbook_common::db::init_database;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_replace_guard_blocks_until_dropped() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("bandbook.db")).await.unwrap();
        let state = AppState::new(pool, BuilderSettings::default());
        let id = Uuid::new_v4();

        let guard = state.begin_replace(id).unwrap();
        assert!(matches!(
            state.begin_replace(id),
            Err(Error::InvalidOperation(_))
        ));
        assert!(state.begin_replace(Uuid::new_v4()).is_ok());

        drop(guard);
        assert!(state.begin_replace(id).is_ok());
    }
}
