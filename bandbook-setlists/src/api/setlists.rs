//! Setlist endpoints
//!
//! Create and replace take a [`SubmitPayload`]. A replace holds the setlist
//! id in the in-flight set for its duration; a second replace of the same
//! setlist meanwhile gets 409.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use bandbook_common::db::{Setlist, SetlistSummary};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::builder::SubmitPayload;
use crate::db;
use crate::error::Result;
use crate::AppState;

/// Body returned by create and replace
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedSetlist {
    pub id: Uuid,
}

/// GET /api/bands/:band_id/setlists
pub async fn list_setlists(
    State(state): State<AppState>,
    Path(band_id): Path<Uuid>,
) -> Result<Json<Vec<SetlistSummary>>> {
    Ok(Json(db::setlists::list_setlists(&state.db, band_id).await?))
}

/// POST /api/bands/:band_id/setlists
pub async fn create_setlist(
    State(state): State<AppState>,
    Path(band_id): Path<Uuid>,
    Json(payload): Json<SubmitPayload>,
) -> Result<(StatusCode, Json<SavedSetlist>)> {
    let draft = payload.into_draft()?;
    let id = db::setlists::create_setlist(&state.db, band_id, &draft).await?;
    Ok((StatusCode::CREATED, Json(SavedSetlist { id })))
}

/// GET /api/setlists/:id
pub async fn get_setlist(
    State(state): State<AppState>,
    Path(setlist_id): Path<Uuid>,
) -> Result<Json<Setlist>> {
    Ok(Json(db::setlists::fetch_setlist(&state.db, setlist_id).await?))
}

/// PUT /api/setlists/:id
pub async fn replace_setlist(
    State(state): State<AppState>,
    Path(setlist_id): Path<Uuid>,
    Json(payload): Json<SubmitPayload>,
) -> Result<Json<SavedSetlist>> {
    let draft = payload.into_draft()?;
    let _guard = state.begin_replace(setlist_id)?;
    let id = db::setlists::replace_setlist(&state.db, setlist_id, &draft).await?;
    Ok(Json(SavedSetlist { id }))
}

/// DELETE /api/setlists/:id
pub async fn delete_setlist(
    State(state): State<AppState>,
    Path(setlist_id): Path<Uuid>,
) -> Result<StatusCode> {
    db::setlists::delete_setlist(&state.db, setlist_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
