//! Turning a column model into stored sets
//!
//! Non-overflow buckets become [`SetDraft`]s (`order = bucket.order + 1`,
//! named `Set {order}`, songs at 1-based positions). The draft crosses the
//! wire as a [`SubmitPayload`] and is written by a [`SetlistStore`]: create
//! inserts everything in one transaction, replace deletes the old sets and
//! songs and inserts the new ones in one transaction.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use bandbook_common::db::Song;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::columns::ColumnModel;
use crate::error::{Error, Result};

/// Name given to the set stored at `order` (1-based)
pub fn set_name(order: i64) -> String {
    format!("Set {}", order)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetSongDraft {
    pub song: Song,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDraft {
    pub name: String,
    pub order: i64,
    pub songs: Vec<SetSongDraft>,
}

/// Everything a store needs to write one setlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetlistDraft {
    pub name: String,
    pub event_id: Option<Uuid>,
    pub sets: Vec<SetDraft>,
}

impl SetlistDraft {
    /// Serialize the set buckets of `model`; overflow is left out
    pub fn from_model(name: impl Into<String>, event_id: Option<Uuid>, model: &ColumnModel) -> Self {
        let sets = model
            .set_buckets()
            .iter()
            .map(|bucket| {
                let order = bucket.order as i64 + 1;
                SetDraft {
                    name: set_name(order),
                    order,
                    songs: bucket
                        .songs
                        .iter()
                        .enumerate()
                        .map(|(index, song)| SetSongDraft {
                            song: song.clone(),
                            position: index as i64 + 1,
                        })
                        .collect(),
                }
            })
            .collect();

        Self {
            name: name.into(),
            event_id,
            sets,
        }
    }

    /// Checks that need no storage: name present, orders 1..=n, no song twice
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name", "setlist name is required"));
        }

        let mut seen = HashSet::new();
        for (index, set) in self.sets.iter().enumerate() {
            if set.order != index as i64 + 1 {
                return Err(Error::validation(
                    "sets",
                    format!("set at position {} has order {}", index + 1, set.order),
                ));
            }
            for entry in &set.songs {
                if !seen.insert(entry.song.id) {
                    return Err(Error::validation(
                        "sets",
                        format!("song '{}' appears more than once", entry.song.title),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Total number of songs across all sets
    pub fn song_count(&self) -> usize {
        self.sets.iter().map(|set| set.songs.len()).sum()
    }
}

/// Submit body for create and replace
///
/// `sets` maps bucket order (as a string) to a JSON-encoded song array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default)]
    pub sets: BTreeMap<String, String>,
}

impl SubmitPayload {
    pub fn from_draft(draft: &SetlistDraft) -> Result<Self> {
        let mut sets = BTreeMap::new();
        for set in &draft.sets {
            let songs: Vec<&Song> = set.songs.iter().map(|entry| &entry.song).collect();
            let encoded = serde_json::to_string(&songs).map_err(|e| {
                Error::ConsistencyViolation(format!("failed to encode {}: {}", set.name, e))
            })?;
            sets.insert((set.order - 1).to_string(), encoded);
        }

        Ok(Self {
            name: draft.name.clone(),
            event_id: draft.event_id.map(|id| id.to_string()),
            sets,
        })
    }

    pub fn from_model(name: &str, event_id: Option<Uuid>, model: &ColumnModel) -> Result<Self> {
        Self::from_draft(&SetlistDraft::from_model(name, event_id, model))
    }

    /// Decode into a draft; set keys are sorted numerically
    pub fn into_draft(self) -> Result<SetlistDraft> {
        let event_id = match self.event_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| {
                Error::validation("eventId", format!("'{}' is not a valid event id", raw))
            })?),
        };

        let mut keyed = Vec::with_capacity(self.sets.len());
        for (key, encoded) in self.sets {
            let order: u32 = key.trim().parse().map_err(|_| {
                Error::validation("sets", format!("'{}' is not a set order", key))
            })?;
            let songs: Vec<Song> = serde_json::from_str(&encoded).map_err(|e| {
                Error::validation("sets", format!("songs for set {} are malformed: {}", key, e))
            })?;
            keyed.push((order, songs));
        }
        keyed.sort_by_key(|(order, _)| *order);

        let sets = keyed
            .into_iter()
            .enumerate()
            .map(|(index, (_, songs))| {
                let order = index as i64 + 1;
                SetDraft {
                    name: set_name(order),
                    order,
                    songs: songs
                        .into_iter()
                        .enumerate()
                        .map(|(position, song)| SetSongDraft {
                            song,
                            position: position as i64 + 1,
                        })
                        .collect(),
                }
            })
            .collect();

        Ok(SetlistDraft {
            name: self.name.trim().to_string(),
            event_id,
            sets,
        })
    }
}

/// Durable setlist writes
#[async_trait]
pub trait SetlistStore: Send + Sync {
    /// Create a setlist with its sets; returns the new id
    async fn create_setlist(&self, band_id: Uuid, draft: &SetlistDraft) -> Result<Uuid>;

    /// Atomically replace name, event and every set of an existing setlist
    async fn replace_setlist(&self, setlist_id: Uuid, draft: &SetlistDraft) -> Result<Uuid>;
}

/// Persist the set buckets of `model`
///
/// With `setlist_id` the stored setlist is replaced, otherwise a new one is
/// created under `band_id`. Returns the durable setlist id.
pub async fn save(
    store: &dyn SetlistStore,
    band_id: Uuid,
    setlist_id: Option<Uuid>,
    name: &str,
    event_id: Option<Uuid>,
    model: &ColumnModel,
) -> Result<Uuid> {
    let draft = SetlistDraft::from_model(name.trim(), event_id, model);
    draft.validate()?;

    let id = match setlist_id {
        Some(id) => store.replace_setlist(id, &draft).await?,
        None => store.create_setlist(band_id, &draft).await?,
    };

    info!(
        "Saved setlist '{}' ({}): {} sets, {} songs",
        draft.name,
        id,
        draft.sets.len(),
        draft.song_count()
    );
    Ok(id)
}
