//! Database access for bands, songs and setlists
//!
//! All ids are stored as TEXT UUIDs in `guid` columns.

pub mod bands;
pub mod setlists;
pub mod songs;

pub use setlists::SqliteSetlistStore;

use uuid::Uuid;

use crate::error::{Error, Result};

/// Parse a stored guid; a malformed value means the file was edited by hand
pub(crate) fn parse_guid(column: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| {
        Error::ConsistencyViolation(format!("invalid UUID '{}' in {}: {}", raw, column, e))
    })
}
