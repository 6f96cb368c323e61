//! Search-assisted song picker
//!
//! Two channels feed the picker:
//! - the query channel: keystrokes go through [`SearchDebouncer`], which
//!   issues one sequence-numbered lookup per quiet period and hands back
//!   [`SearchResponse`]s in whatever order they finish;
//! - the selection channel: [`ColumnModel::add_song_to_column`] and
//!   [`ColumnModel::remove_song_from_column`].
//!
//! [`SongPicker::apply`] keeps the newest issued result: a response older
//! than one already applied is dropped.

use std::sync::Arc;
use std::time::Duration;

use bandbook_common::db::Song;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::columns::ColumnModel;
use crate::catalog::SongCatalog;
use crate::error::{Error, Result};

/// Quiet period before a keystroke turns into a lookup
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Result of one issued lookup
#[derive(Debug)]
pub struct SearchResponse {
    pub seq: u64,
    pub query: String,
    pub result: Result<Vec<Song>>,
}

/// Candidate list for the search box
#[derive(Debug, Default)]
pub struct SongPicker {
    last_applied: u64,
    query: String,
    candidates: Vec<Song>,
}

impl SongPicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a lookup result; returns `false` if it was superseded
    ///
    /// Failed lookups clear the candidate list.
    pub fn apply(&mut self, response: SearchResponse) -> bool {
        if response.seq <= self.last_applied {
            debug!(
                seq = response.seq,
                last_applied = self.last_applied,
                "Dropping stale search response for '{}'",
                response.query
            );
            return false;
        }

        self.last_applied = response.seq;
        self.query = response.query;
        self.candidates = match response.result {
            Ok(songs) => songs,
            Err(e) => {
                warn!("Song search for '{}' failed: {}", self.query, e);
                Vec::new()
            }
        };
        true
    }

    /// Query the current candidates belong to
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Candidates not already placed in a set
    pub fn candidates<'a>(&'a self, model: &ColumnModel) -> Vec<&'a Song> {
        let used = model.used_song_ids();
        self.candidates
            .iter()
            .filter(|song| !used.contains(&song.id))
            .collect()
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.candidates.clear();
    }
}

impl ColumnModel {
    /// Append `song` to a bucket, taking it out of overflow if it is there
    ///
    /// A song already placed in another set is left where it is (returns
    /// `false`); songs never seen before (e.g. added to the catalog after the
    /// builder opened) simply join the target bucket.
    pub fn add_song_to_column(&mut self, song: Song, target: usize) -> Result<bool> {
        if target >= self.len() {
            return Err(Error::validation(
                "bucket",
                format!("bucket {} does not exist", target),
            ));
        }

        if let Some((bucket, _)) = self.locate(song.id) {
            if !self.is_overflow(bucket) {
                warn!(
                    "Song '{}' is already in set bucket {}, not adding it again",
                    song.display_title(),
                    bucket
                );
                return Ok(false);
            }
        }

        self.overflow_mut().songs.retain(|s| s.id != song.id);
        self.buckets_mut()[target].songs.push(song);
        self.settle();
        Ok(true)
    }

    /// Remove a song from a bucket
    ///
    /// Songs removed from a set go back to the overflow bucket, using the
    /// catalog copy of the song. Removing from overflow drops the song from
    /// the model.
    pub fn remove_song_from_column(&mut self, song_id: Uuid, bucket: usize) -> Result<bool> {
        let Some(index) = self
            .bucket(bucket)
            .ok_or_else(|| {
                Error::validation("bucket", format!("bucket {} does not exist", bucket))
            })?
            .position_of(song_id)
        else {
            warn!("Song {} is not in bucket {}, nothing to remove", song_id, bucket);
            return Ok(false);
        };

        let removed = self.buckets_mut()[bucket].songs.remove(index);
        if !self.is_overflow(bucket) {
            let song = self.catalog_song(song_id).cloned().unwrap_or(removed);
            self.overflow_mut().songs.push(song);
        }
        self.settle();
        Ok(true)
    }
}

/// Debounces keystrokes into sequence-numbered catalog lookups
///
/// Lookups run as separate tasks, so responses can arrive out of order;
/// pair this with [`SongPicker::apply`].
pub struct SearchDebouncer {
    keystrokes: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl SearchDebouncer {
    /// Start the debounce loop for one band
    pub fn spawn(
        catalog: Arc<dyn SongCatalog>,
        band_id: Uuid,
        delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SearchResponse>) {
        let (keystroke_tx, keystroke_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(debounce_loop(
            keystroke_rx,
            response_tx,
            catalog,
            band_id,
            delay,
        ));

        (
            Self {
                keystrokes: keystroke_tx,
                task,
            },
            response_rx,
        )
    }

    /// Forward the raw text of the search box
    pub fn keystroke(&self, text: impl Into<String>) {
        // Send only fails once the loop has stopped, when nobody is listening
        let _ = self.keystrokes.send(text.into());
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn debounce_loop(
    mut keystrokes: mpsc::UnboundedReceiver<String>,
    responses: mpsc::UnboundedSender<SearchResponse>,
    catalog: Arc<dyn SongCatalog>,
    band_id: Uuid,
    delay: Duration,
) {
    let mut seq: u64 = 0;

    while let Some(mut query) = keystrokes.recv().await {
        // Restart the quiet period on every keystroke
        loop {
            tokio::select! {
                next = keystrokes.recv() => match next {
                    Some(text) => query = text,
                    None => return,
                },
                _ = tokio::time::sleep(delay) => break,
            }
        }

        seq += 1;
        debug!(seq, "Issuing song search for '{}'", query);

        let catalog = Arc::clone(&catalog);
        let responses = responses.clone();
        tokio::spawn(async move {
            let result = if query.trim().is_empty() {
                Ok(Vec::new())
            } else {
                catalog.search_songs(band_id, query.trim()).await
            };
            let _ = responses.send(SearchResponse { seq, query, result });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::test_support::{catalog, model_with, titles};

    fn response(seq: u64, query: &str, songs: &[Song]) -> SearchResponse {
        SearchResponse {
            seq,
            query: query.to_string(),
            result: Ok(songs.to_vec()),
        }
    }

    #[test]
    fn test_later_query_wins_over_late_stale_response() {
        let songs = catalog(&["Apple", "Abba", "Banana"]);
        let model = ColumnModel::new_setlist(songs.clone());
        let mut picker = SongPicker::new();

        // "a" issued as 1, "ab" as 2; "ab" answers first
        assert!(picker.apply(response(2, "ab", &songs[1..2])));
        assert!(!picker.apply(response(1, "a", &songs[..2])));

        assert_eq!(picker.query(), "ab");
        let shown: Vec<_> = picker.candidates(&model).iter().map(|s| s.title.clone()).collect();
        assert_eq!(shown, vec!["Abba"]);
    }

    #[test]
    fn test_in_order_responses_overwrite() {
        let songs = catalog(&["Apple", "Abba"]);
        let mut picker = SongPicker::new();

        assert!(picker.apply(response(1, "a", &songs)));
        assert!(picker.apply(response(2, "ab", &songs[1..])));

        assert_eq!(picker.query(), "ab");
    }

    #[test]
    fn test_failed_search_empties_candidates() {
        let songs = catalog(&["Apple"]);
        let model = ColumnModel::new_setlist(songs.clone());
        let mut picker = SongPicker::new();
        picker.apply(response(1, "a", &songs));

        let applied = picker.apply(SearchResponse {
            seq: 2,
            query: "ap".to_string(),
            result: Err(Error::Transport("connection reset".to_string())),
        });

        assert!(applied);
        assert!(picker.candidates(&model).is_empty());
    }

    #[test]
    fn test_candidates_exclude_songs_placed_in_sets() {
        let mut model = model_with(&[&["S1"], &["S2"]], &["S3"]);
        let all: Vec<Song> = model
            .snapshot()
            .iter()
            .flat_map(|bucket| bucket.songs.clone())
            .collect();
        let mut picker = SongPicker::new();
        picker.apply(response(1, "s", &all));

        let shown: Vec<_> = picker.candidates(&model).iter().map(|s| s.title.clone()).collect();
        assert_eq!(shown, vec!["S3"]);

        let s3 = model.overflow().songs[0].clone();
        model.add_song_to_column(s3, 0).unwrap();
        assert!(picker.candidates(&model).is_empty());
    }

    #[test]
    fn test_add_song_moves_it_out_of_overflow() {
        let mut model = model_with(&[&["S1"]], &["S2", "S3"]);
        let s3 = model.overflow().songs[1].clone();

        assert!(model.add_song_to_column(s3, 0).unwrap());

        assert_eq!(titles(&model.snapshot()[0]), vec!["S1", "S3"]);
        assert_eq!(titles(model.overflow()), vec!["S2"]);
    }

    #[test]
    fn test_add_song_already_in_a_set_is_noop() {
        let mut model = model_with(&[&["S1"], &[]], &[]);
        let s1 = model.snapshot()[0].songs[0].clone();
        let before = model.clone();

        assert!(!model.add_song_to_column(s1, 1).unwrap());
        assert_eq!(model, before);
    }

    #[test]
    fn test_add_unknown_song_joins_target() {
        let mut model = model_with(&[&[]], &["S1"]);
        let fresh = Song::new("Brand New", "Band");

        model.add_song_to_column(fresh, 0).unwrap();

        assert_eq!(titles(&model.snapshot()[0]), vec!["Brand New"]);
        assert!(model.check_invariants().is_ok());
    }

    #[test]
    fn test_remove_song_from_set_returns_catalog_copy_to_overflow() {
        let mut model = model_with(&[&["S1", "S2"]], &["S3"]);
        let s1 = model.snapshot()[0].songs[0].clone();
        let stale = Song {
            title: "S1 (renamed in search)".to_string(),
            ..s1.clone()
        };
        model.remove_song_from_column(s1.id, 0).unwrap();
        model.add_song_to_column(stale, 0).unwrap();

        model.remove_song_from_column(s1.id, 0).unwrap();

        assert_eq!(titles(&model.snapshot()[0]), vec!["S2"]);
        assert_eq!(titles(model.overflow()), vec!["S3", "S1"]);
    }

    #[test]
    fn test_remove_song_from_overflow_drops_it() {
        let mut model = model_with(&[&["S1"]], &["S2"]);
        let s2 = model.overflow().songs[0].id;

        assert!(model.remove_song_from_column(s2, 1).unwrap());

        assert!(model.overflow().songs.is_empty());
        assert!(model.locate(s2).is_none());
    }

    struct RecordingCatalog {
        songs: Vec<Song>,
        queries: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl SongCatalog for RecordingCatalog {
        async fn list_songs(&self, _band_id: Uuid) -> Result<Vec<Song>> {
            Ok(self.songs.clone())
        }

        async fn search_songs(&self, _band_id: Uuid, query: &str) -> Result<Vec<Song>> {
            self.queries.lock().unwrap().push(query.to_string());
            let needle = query.to_lowercase();
            Ok(self
                .songs
                .iter()
                .filter(|song| song.title.to_lowercase().contains(&needle))
                .cloned()
                .collect())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_issues_only_last_query_of_a_burst() {
        let source = Arc::new(RecordingCatalog {
            songs: catalog(&["Apple", "Abba", "Banana"]),
            queries: std::sync::Mutex::new(Vec::new()),
        });
        let (debouncer, mut responses) =
            SearchDebouncer::spawn(source.clone(), Uuid::new_v4(), SEARCH_DEBOUNCE);

        debouncer.keystroke("a");
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.keystroke("ab");
        tokio::time::sleep(Duration::from_millis(400)).await;
        debouncer.keystroke("abb");

        let first = responses.recv().await.unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(first.query, "abb");
        assert_eq!(first.result.unwrap().len(), 1);
        assert_eq!(*source.queries.lock().unwrap(), vec!["abb".to_string()]);

        // A new burst after the quiet window gets the next sequence number
        debouncer.keystroke("");
        let second = responses.recv().await.unwrap();
        assert_eq!(second.seq, 2);
        assert!(second.result.unwrap().is_empty());
        assert_eq!(source.queries.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_missing_song_is_noop() {
        let mut model = model_with(&[&["S1"]], &["S2"]);
        let before = model.clone();

        assert!(!model.remove_song_from_column(Uuid::new_v4(), 0).unwrap());
        assert_eq!(model, before);
    }
}
