//! HTTP API handlers for bandbook-setlists

pub mod error;
pub mod health;
pub mod setlists;
pub mod songs;

pub use health::health_routes;
pub use setlists::{create_setlist, delete_setlist, get_setlist, list_setlists, replace_setlist};
pub use songs::{create_band, create_song, list_songs, search_songs};
