//! Setlist builder
//!
//! In-memory editor for the sets of one setlist. A [`ColumnModel`] holds the
//! buckets (sets plus the trailing overflow bucket); [`BuilderSession`] wraps
//! it with the picker and the submit state machine.

pub mod columns;
pub mod lifecycle;
pub mod persistence;
pub mod picker;
pub mod reorder;
pub mod session;

pub use columns::{Bucket, ColumnModel};
pub use lifecycle::MAX_SONGS_PER_SET;
pub use persistence::{
    save, set_name, SetDraft, SetSongDraft, SetlistDraft, SetlistStore, SubmitPayload,
};
pub use picker::{SearchDebouncer, SearchResponse, SongPicker, SEARCH_DEBOUNCE};
pub use reorder::{DropLocation, ReorderSink};
pub use session::{BuilderSession, SessionState, SubmitTicket};
