//! Band and song catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bandbook_common::db::{Band, Song};
use serde::Deserialize;
use uuid::Uuid;

use crate::db;
use crate::error::Result;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct NewBand {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct NewSong {
    pub title: String,
    #[serde(default)]
    pub artist: String,
}

/// Query parameters for song search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// POST /api/bands
pub async fn create_band(
    State(state): State<AppState>,
    Json(body): Json<NewBand>,
) -> Result<(StatusCode, Json<Band>)> {
    let band = db::bands::insert_band(&state.db, &body.name).await?;
    Ok((StatusCode::CREATED, Json(band)))
}

/// GET /api/bands/:band_id/songs
pub async fn list_songs(
    State(state): State<AppState>,
    Path(band_id): Path<Uuid>,
) -> Result<Json<Vec<Song>>> {
    state.require_band(band_id).await?;
    Ok(Json(db::songs::list_songs(&state.db, band_id).await?))
}

/// GET /api/bands/:band_id/songs/search?q=
///
/// An empty query returns an empty list.
pub async fn search_songs(
    State(state): State<AppState>,
    Path(band_id): Path<Uuid>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Song>>> {
    state.require_band(band_id).await?;
    let songs = db::songs::search_songs(
        &state.db,
        band_id,
        &query.q,
        state.settings.search_result_limit,
    )
    .await?;
    Ok(Json(songs))
}

/// POST /api/bands/:band_id/songs
pub async fn create_song(
    State(state): State<AppState>,
    Path(band_id): Path<Uuid>,
    Json(body): Json<NewSong>,
) -> Result<(StatusCode, Json<Song>)> {
    let song = db::songs::insert_song(&state.db, band_id, &body.title, &body.artist).await?;
    Ok((StatusCode::CREATED, Json(song)))
}
