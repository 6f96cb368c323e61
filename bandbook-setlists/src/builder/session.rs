//! Builder session state machine
//!
//! `Uninitialized → Populated → Editing → Submitting → Committed`, with a
//! failed submit going back to `Editing` and keeping the model.

use std::sync::Arc;

use bandbook_common::db::{Setlist, Song};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};
use uuid::Uuid;

use super::columns::ColumnModel;
use super::persistence::{SetlistDraft, SetlistStore};
use super::picker::{SearchDebouncer, SearchResponse, SongPicker};
use super::reorder::DropLocation;
use crate::catalog::SongCatalog;
use crate::error::{Error, Result};
use crate::settings::BuilderSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Populated,
    Editing,
    Submitting,
    Committed(Uuid),
}

/// A submission taken out of the session while it is `Submitting`
#[derive(Debug, Clone)]
pub struct SubmitTicket {
    pub band_id: Uuid,
    pub setlist_id: Option<Uuid>,
    pub draft: SetlistDraft,
}

impl SubmitTicket {
    pub async fn execute(&self, store: &dyn SetlistStore) -> Result<Uuid> {
        match self.setlist_id {
            Some(id) => store.replace_setlist(id, &self.draft).await,
            None => store.create_setlist(self.band_id, &self.draft).await,
        }
    }
}

/// One user's editing session for one setlist
pub struct BuilderSession {
    band_id: Uuid,
    settings: BuilderSettings,
    state: SessionState,
    model: Option<ColumnModel>,
    picker: SongPicker,
    setlist_id: Option<Uuid>,
    name: String,
    event_id: Option<Uuid>,
    last_error: Option<String>,
}

impl BuilderSession {
    pub fn new(band_id: Uuid) -> Self {
        Self::with_settings(band_id, BuilderSettings::default())
    }

    pub fn with_settings(band_id: Uuid, settings: BuilderSettings) -> Self {
        Self {
            band_id,
            settings,
            state: SessionState::Uninitialized,
            model: None,
            picker: SongPicker::new(),
            setlist_id: None,
            name: String::new(),
            event_id: None,
            last_error: None,
        }
    }

    /// Load the catalog and build the model, for a new or an existing setlist
    pub async fn open(&mut self, catalog: &dyn SongCatalog, existing: Option<Setlist>) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(self.refuse("open"));
        }

        let songs = catalog.list_songs(self.band_id).await?;

        let model = match &existing {
            Some(setlist) => {
                if setlist.band_id != self.band_id {
                    return Err(Error::validation(
                        "bandId",
                        format!("setlist {} belongs to another band", setlist.id),
                    ));
                }
                ColumnModel::initialize(Some(&setlist.sets), songs)?
            }
            None => ColumnModel::initialize(None, songs)?,
        };

        if let Some(setlist) = existing {
            info!(
                "Opened setlist '{}' ({}) with {} sets",
                setlist.name,
                setlist.id,
                setlist.sets.len()
            );
            self.setlist_id = Some(setlist.id);
            self.name = setlist.name;
            self.event_id = setlist.event_id;
        } else {
            info!("Started new setlist for band {}", self.band_id);
        }

        self.model = Some(model);
        self.state = SessionState::Populated;
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn band_id(&self) -> Uuid {
        self.band_id
    }

    pub fn setlist_id(&self) -> Option<Uuid> {
        self.setlist_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn event_id(&self) -> Option<Uuid> {
        self.event_id
    }

    pub fn settings(&self) -> &BuilderSettings {
        &self.settings
    }

    /// Message of the last failed submit, cleared on the next success
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn model(&self) -> Option<&ColumnModel> {
        self.model.as_ref()
    }

    /// Search candidates minus songs already placed in a set
    pub fn candidates(&self) -> Vec<&Song> {
        match &self.model {
            Some(model) => self.picker.candidates(model),
            None => Vec::new(),
        }
    }

    /// Feed a finished lookup to the picker
    pub fn apply_search(&mut self, response: SearchResponse) -> bool {
        self.picker.apply(response)
    }

    /// Start a debouncer for this band using the configured quiet window
    ///
    /// Responses from the receiver go to [`Self::apply_search`].
    pub fn start_search(
        &self,
        catalog: Arc<dyn SongCatalog>,
    ) -> (SearchDebouncer, UnboundedReceiver<SearchResponse>) {
        SearchDebouncer::spawn(catalog, self.band_id, self.settings.search_debounce)
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.edit(|session| {
            session.name = name;
            Ok(())
        })
    }

    pub fn set_event(&mut self, event_id: Option<Uuid>) -> Result<()> {
        self.edit(|session| {
            session.event_id = event_id;
            Ok(())
        })
    }

    pub fn move_song(&mut self, source: DropLocation, destination: Option<DropLocation>) -> Result<bool> {
        self.edit_model(|model| model.move_song(source, destination))
    }

    pub fn add_bucket(&mut self) -> Result<usize> {
        self.edit_model(|model| Ok(model.add_bucket()))
    }

    pub fn remove_bucket(&mut self, order: usize) -> Result<bool> {
        self.edit_model(|model| model.remove_bucket(order))
    }

    /// Reseed every set from the full catalog
    pub fn seed_buckets(&mut self, set_count: usize) -> Result<()> {
        let cap = self.settings.max_songs_per_set;
        self.edit_model(|model| {
            let songs = model.catalog().to_vec();
            model.seed_buckets_with_cap(set_count, &songs, cap)
        })
    }

    pub fn add_song(&mut self, song: Song, target: usize) -> Result<bool> {
        self.edit_model(|model| model.add_song_to_column(song, target))
    }

    pub fn remove_song(&mut self, song_id: Uuid, bucket: usize) -> Result<bool> {
        self.edit_model(|model| model.remove_song_from_column(song_id, bucket))
    }

    /// Freeze the current model into a submission
    ///
    /// Only one submission may be in flight; a second call while
    /// `Submitting` is refused.
    pub fn begin_submit(&mut self) -> Result<SubmitTicket> {
        if !self.is_editable() {
            return Err(self.refuse("submit"));
        }
        let Some(model) = &self.model else {
            return Err(self.refuse("submit"));
        };

        let draft = SetlistDraft::from_model(self.name.trim(), self.event_id, model);
        if let Err(e) = draft.validate() {
            self.last_error = Some(e.to_string());
            return Err(e);
        }

        self.state = SessionState::Submitting;
        Ok(SubmitTicket {
            band_id: self.band_id,
            setlist_id: self.setlist_id,
            draft,
        })
    }

    /// Record the outcome of a submission started with [`Self::begin_submit`]
    pub fn finish_submit(&mut self, outcome: Result<Uuid>) -> Result<Uuid> {
        if self.state != SessionState::Submitting {
            return Err(self.refuse("finish a submit"));
        }

        match outcome {
            Ok(id) => {
                self.state = SessionState::Committed(id);
                self.setlist_id = Some(id);
                self.last_error = None;
                Ok(id)
            }
            Err(e) => {
                if e.is_transport() {
                    warn!("Setlist store unreachable, back to editing: {}", e);
                } else {
                    warn!("Setlist submit failed, back to editing: {}", e);
                }
                self.state = SessionState::Editing;
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Submit and wait for the store
    pub async fn submit(&mut self, store: &dyn SetlistStore) -> Result<Uuid> {
        let ticket = self.begin_submit()?;
        let outcome = ticket.execute(store).await;
        self.finish_submit(outcome)
    }

    fn is_editable(&self) -> bool {
        matches!(self.state, SessionState::Populated | SessionState::Editing)
    }

    fn refuse(&self, action: &str) -> Error {
        warn!("Cannot {} while session is {:?}", action, self.state);
        Error::InvalidOperation(format!("cannot {} while {:?}", action, self.state))
    }

    fn edit<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if !self.is_editable() {
            return Err(self.refuse("edit"));
        }
        let value = f(self)?;
        self.state = SessionState::Editing;
        Ok(value)
    }

    fn edit_model<T>(&mut self, f: impl FnOnce(&mut ColumnModel) -> Result<T>) -> Result<T> {
        self.edit(|session| match session.model.as_mut() {
            Some(model) => f(model),
            None => Err(Error::InvalidOperation("no model loaded".to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use std::time::Duration;

    use super::*;
    use crate::builder::test_support::{catalog, titles};
    use crate::builder::SEARCH_DEBOUNCE;

    struct FixedCatalog(Vec<Song>);

    #[async_trait]
    impl SongCatalog for FixedCatalog {
        async fn list_songs(&self, _band_id: Uuid) -> Result<Vec<Song>> {
            Ok(self.0.clone())
        }

        async fn search_songs(&self, _band_id: Uuid, query: &str) -> Result<Vec<Song>> {
            Ok(self
                .0
                .iter()
                .filter(|song| song.title.contains(query))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        fail: bool,
        calls: AtomicUsize,
        last: Mutex<Option<SetlistDraft>>,
    }

    #[async_trait]
    impl SetlistStore for RecordingStore {
        async fn create_setlist(&self, _band_id: Uuid, draft: &SetlistDraft) -> Result<Uuid> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Transport("store offline".to_string()));
            }
            *self.last.lock().unwrap() = Some(draft.clone());
            Ok(Uuid::new_v4())
        }

        async fn replace_setlist(&self, setlist_id: Uuid, draft: &SetlistDraft) -> Result<Uuid> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(draft.clone());
            Ok(setlist_id)
        }
    }

    async fn open_session(song_titles: &[&str]) -> BuilderSession {
        let mut session = BuilderSession::new(Uuid::new_v4());
        session
            .open(&FixedCatalog(catalog(song_titles)), None)
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_mutations_require_open_session() {
        let mut session = BuilderSession::new(Uuid::new_v4());

        assert!(matches!(session.add_bucket(), Err(Error::InvalidOperation(_))));
        assert!(matches!(session.begin_submit(), Err(Error::InvalidOperation(_))));
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_open_then_edit_transitions() {
        let mut session = open_session(&["S1", "S2"]).await;
        assert_eq!(session.state(), SessionState::Populated);

        session
            .move_song(DropLocation::new(1, 0), Some(DropLocation::new(0, 0)))
            .unwrap();

        assert_eq!(session.state(), SessionState::Editing);
        assert_eq!(titles(&session.model().unwrap().snapshot()[0]), vec!["S1"]);
    }

    #[tokio::test]
    async fn test_second_submit_while_in_flight_is_rejected() {
        let mut session = open_session(&["S1"]).await;
        session.set_name("Night One").unwrap();

        let ticket = session.begin_submit().unwrap();
        assert_eq!(session.state(), SessionState::Submitting);
        assert!(matches!(session.begin_submit(), Err(Error::InvalidOperation(_))));
        assert!(matches!(session.add_bucket(), Err(Error::InvalidOperation(_))));

        let store = RecordingStore::default();
        let outcome = ticket.execute(&store).await;
        let id = session.finish_submit(outcome).unwrap();

        assert_eq!(session.state(), SessionState::Committed(id));
        assert_eq!(session.setlist_id(), Some(id));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_model_and_returns_to_editing() {
        let mut session = open_session(&["S1", "S2"]).await;
        session.set_name("Night One").unwrap();
        session
            .move_song(DropLocation::new(1, 1), Some(DropLocation::new(0, 0)))
            .unwrap();
        let before = session.model().unwrap().clone();

        let store = RecordingStore {
            fail: true,
            ..Default::default()
        };
        let result = session.submit(&store).await;

        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(session.state(), SessionState::Editing);
        assert_eq!(session.model().unwrap(), &before);
        assert!(session.last_error().unwrap().contains("store offline"));

        // Retry goes through once the store recovers
        let id = session.submit(&RecordingStore::default()).await.unwrap();
        assert_eq!(session.state(), SessionState::Committed(id));
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_blank_name_blocks_submit_without_state_change() {
        let mut session = open_session(&["S1"]).await;
        let store = RecordingStore::default();

        let result = session.submit(&store).await;

        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "name"));
        assert_eq!(session.state(), SessionState::Populated);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_existing_setlist_submits_as_replace() {
        let band_id = Uuid::new_v4();
        let songs = catalog(&["S1", "S2"]);
        let existing = Setlist {
            id: Uuid::new_v4(),
            band_id,
            name: "Friday".to_string(),
            event_id: None,
            sets: vec![crate::builder::test_support::persisted_set(1, &[&songs[1]])],
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let setlist_id = existing.id;

        let mut session = BuilderSession::new(band_id);
        session
            .open(&FixedCatalog(songs), Some(existing))
            .await
            .unwrap();
        assert_eq!(session.name(), "Friday");

        let store = RecordingStore::default();
        let id = session.submit(&store).await.unwrap();

        assert_eq!(id, setlist_id);
        let draft = store.last.lock().unwrap().clone().unwrap();
        assert_eq!(draft.sets[0].songs[0].song.title, "S2");
    }

    #[tokio::test]
    async fn test_seed_uses_configured_cap() {
        let mut session = BuilderSession::with_settings(
            Uuid::new_v4(),
            BuilderSettings {
                max_songs_per_set: 1,
                ..Default::default()
            },
        );
        session
            .open(&FixedCatalog(catalog(&["S1", "S2", "S3"])), None)
            .await
            .unwrap();

        session.seed_buckets(2).unwrap();

        let model = session.model().unwrap();
        assert_eq!(titles(&model.snapshot()[0]), vec!["S1"]);
        assert_eq!(titles(&model.snapshot()[1]), vec!["S2"]);
        assert_eq!(titles(model.overflow()), vec!["S3"]);
    }

    #[tokio::test]
    async fn test_candidates_follow_picker_and_model() {
        let mut session = open_session(&["Apple", "Abba"]).await;
        let abba = session.model().unwrap().overflow().songs[1].clone();
        let everything = session.model().unwrap().catalog().to_vec();

        session.apply_search(SearchResponse {
            seq: 1,
            query: "A".to_string(),
            result: Ok(everything),
        });
        assert_eq!(session.candidates().len(), 2);

        session.add_song(abba, 0).unwrap();
        let shown: Vec<_> = session.candidates().iter().map(|s| s.title.clone()).collect();
        assert_eq!(shown, vec!["Apple"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_waits_for_configured_debounce() {
        let delay = Duration::from_millis(100);
        let mut session = BuilderSession::with_settings(
            Uuid::new_v4(),
            BuilderSettings {
                search_debounce: delay,
                ..Default::default()
            },
        );
        session
            .open(&FixedCatalog(catalog(&["Apple", "Abba"])), None)
            .await
            .unwrap();
        let songs = session.model().unwrap().catalog().to_vec();

        let (debouncer, mut responses) = session.start_search(Arc::new(FixedCatalog(songs)));
        let started = tokio::time::Instant::now();
        debouncer.keystroke("App");
        let response = responses.recv().await.unwrap();
        let waited = started.elapsed();

        assert!(waited >= delay);
        assert!(waited < SEARCH_DEBOUNCE);
        assert!(session.apply_search(response));
        let shown: Vec<_> = session.candidates().iter().map(|s| s.title.clone()).collect();
        assert_eq!(shown, vec!["Apple"]);
    }
}
