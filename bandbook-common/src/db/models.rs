//! Database models
//!
//! Rows are keyed by TEXT UUIDs (`guid` columns); these structs carry them as
//! [`Uuid`] and serialize with camelCase field names for the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A band owning a song catalog, events and setlists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub id: Uuid,
    pub name: String,
}

/// Catalog song
///
/// Reference data: the setlist builder moves songs between buckets but never
/// edits them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Song {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub artist: String,
}

impl Song {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            artist: artist.into(),
        }
    }

    /// `Title - Artist`, omitting the hyphen when the artist is blank
    pub fn display_title(&self) -> String {
        if self.artist.trim().is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.artist)
        }
    }
}

/// A gig a setlist may be associated with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub band_id: Uuid,
    pub name: String,
    pub starts_at: Option<DateTime<Utc>>,
}

/// A song at a 1-based position inside a persisted set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSong {
    pub song: Song,
    pub position: i64,
}

/// Persisted set (1-based `order` within its setlist)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Set {
    pub id: Uuid,
    pub name: String,
    pub order: i64,
    pub songs: Vec<SetSong>,
}

/// Persisted setlist aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setlist {
    pub id: Uuid,
    pub band_id: Uuid,
    pub name: String,
    pub event_id: Option<Uuid>,
    pub sets: Vec<Set>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of a setlist listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetlistSummary {
    pub id: Uuid,
    pub name: String,
    pub event_id: Option<Uuid>,
    pub set_count: i64,
    pub song_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_title_omits_blank_artist() {
        let mut song = Song::new("Fire", "  ");
        assert_eq!(song.display_title(), "Fire");
        song.artist = "Hendrix".to_string();
        assert_eq!(song.display_title(), "Fire - Hendrix");
    }

    #[test]
    fn test_setlist_serializes_camel_case() {
        let setlist = Setlist {
            id: Uuid::nil(),
            band_id: Uuid::nil(),
            name: "Night One".to_string(),
            event_id: None,
            sets: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&setlist).unwrap();
        assert!(json.get("bandId").is_some());
        assert!(json.get("eventId").is_some());
        assert!(json.get("band_id").is_none());
    }
}
