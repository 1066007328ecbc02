use time::OffsetDateTime;

use super::events::Effect;
use super::state::{AppState, PageCursor};
use crate::backend::{BackendError, Credentials, NoteBackend, NoteFilter};
use crate::session::SessionStore;
use crate::store::Note;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub applied: usize,
    pub failed: usize,
    pub signed_out: bool,
}

/// Pushes local changes to the backend. Writes are fire-and-forget: a failure
/// is logged and reported, the local change stays.
pub struct ActionDispatcher<'a> {
    backend: &'a mut dyn NoteBackend,
    session: &'a SessionStore,
    page_size: u32,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(backend: &'a mut dyn NoteBackend, session: &'a SessionStore, page_size: u32) -> Self {
        Self {
            backend,
            session,
            page_size,
        }
    }

    pub fn apply(&mut self, effects: Vec<Effect>) -> SyncReport {
        let mut report = SyncReport::default();
        for effect in effects {
            let label = effect.label();
            let result = match &effect {
                Effect::Create(note) => self.backend.create_note(note),
                Effect::Update(note) => self.backend.update_note(note),
                Effect::Delete(id) => self.backend.delete_note(id),
            };
            match result {
                Ok(()) => {
                    tracing::debug!(action = label, "backend write applied");
                    report.applied += 1;
                }
                Err(err) => {
                    report.failed += 1;
                    if self.handle_failure(&err, label) {
                        report.signed_out = true;
                        break;
                    }
                }
            }
        }
        report
    }

    /// Applies effects and folds the outcome into the board: status line,
    /// optional reload, login view on an expired session.
    pub fn sync(&mut self, state: &mut AppState, effects: Vec<Effect>, refresh_after_write: bool) {
        if effects.is_empty() {
            return;
        }
        let report = self.apply(effects);
        if report.signed_out {
            state.show_login(Some("Session expired, please sign in again".to_string()));
            return;
        }
        if report.failed > 0 {
            state.set_status_message(Some(format!(
                "{} change(s) could not be saved to the backend",
                report.failed
            )));
            return;
        }
        if refresh_after_write {
            if let Err(err) = self.refresh(state) {
                self.report_load_error(state, &err, "refresh after write");
            }
        }
    }

    pub fn load_first_page(&mut self, state: &mut AppState) -> Result<(), BackendError> {
        let filter = NoteFilter::first_page(self.page_size, state.now());
        let notes = self.get(&filter)?;
        let exhausted = (notes.len() as u32) < self.page_size;
        state.replace_notes(board_order(notes));
        state.paging = PageCursor {
            cursor: filter.last_note_created_at,
            pages_loaded: 1,
            exhausted,
        };
        Ok(())
    }

    /// Fetches the next (older) page under the original cursor. Returns how
    /// many new notes were added above the loaded ones.
    pub fn load_more(&mut self, state: &mut AppState) -> Result<usize, BackendError> {
        if state.paging.exhausted {
            return Ok(0);
        }
        let filter = NoteFilter {
            last_note_created_at: state.paging.cursor,
            page: state.paging.pages_loaded + 1,
            page_size: self.page_size,
        };
        let notes = self.get(&filter)?;
        state.paging.exhausted = (notes.len() as u32) < self.page_size;
        state.paging.pages_loaded += 1;
        Ok(state.prepend_notes(board_order(notes)))
    }

    /// Reloads the newest `pages_loaded` pages under a fresh cursor, so notes
    /// posted since the last load are part of the window.
    pub fn refresh(&mut self, state: &mut AppState) -> Result<(), BackendError> {
        let pages = state.paging.pages_loaded.max(1);
        let now: OffsetDateTime = state.now();
        let filter = NoteFilter {
            last_note_created_at: Some(now),
            page: 1,
            page_size: self.page_size.saturating_mul(pages),
        };
        let notes = self.get(&filter)?;
        state.paging.exhausted = (notes.len() as u32) < filter.page_size;
        state.paging.cursor = Some(now);
        state.paging.pages_loaded = pages;
        state.replace_notes(board_order(notes));
        Ok(())
    }

    pub fn login(&mut self, credentials: &Credentials) -> Result<(), BackendError> {
        let token = self.backend.login(credentials)?;
        if let Err(err) = self.session.save(&token) {
            tracing::error!(?err, "failed to persist session token");
        }
        Ok(())
    }

    pub fn sign_out(&mut self) {
        self.backend.set_token(None);
        if let Err(err) = self.session.clear() {
            tracing::error!(?err, "failed to clear session token");
        }
    }

    pub fn report_load_error(&mut self, state: &mut AppState, err: &BackendError, what: &str) {
        if self.handle_failure(err, what) {
            state.show_login(Some("Session expired, please sign in again".to_string()));
        } else {
            state.set_status_message(Some(format!("Could not load notes: {err}")));
        }
    }

    fn get(&mut self, filter: &NoteFilter) -> Result<Vec<Note>, BackendError> {
        self.backend.get_notes(filter)
    }

    /// Logs a backend failure; returns true when the session was dropped.
    fn handle_failure(&mut self, err: &BackendError, what: &str) -> bool {
        if err.is_unauthorized() {
            tracing::warn!(action = what, "backend rejected session, signing out");
            self.sign_out();
            return true;
        }
        tracing::error!(?err, action = what, "backend request failed");
        false
    }
}

/// Pages arrive newest first; the board lists oldest first so that new posts
/// land at the bottom.
fn board_order(mut notes: Vec<Note>) -> Vec<Note> {
    notes.reverse();
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::events::UiEvent;
    use crate::app::state::View;
    use crate::interaction::SelectionSettings;
    use crate::store::NoteId;
    use std::cell::RefCell;
    use std::time::Instant;
    use tempfile::TempDir;
    use time::macros::datetime;

    #[derive(Default)]
    struct FakeBackend {
        notes: RefCell<Vec<Note>>,
        token: Option<String>,
        reject_writes: Option<fn() -> BackendError>,
    }

    impl NoteBackend for FakeBackend {
        fn requires_auth(&self) -> bool {
            true
        }

        fn set_token(&mut self, token: Option<String>) {
            self.token = token;
        }

        fn login(&mut self, credentials: &Credentials) -> Result<String, BackendError> {
            let token = format!("token-for-{}", credentials.username);
            self.token = Some(token.clone());
            Ok(token)
        }

        fn get_notes(&self, filter: &NoteFilter) -> Result<Vec<Note>, BackendError> {
            let mut newest_first: Vec<Note> = self
                .notes
                .borrow()
                .iter()
                .rev()
                .filter(|note| {
                    filter
                        .last_note_created_at
                        .map_or(true, |cursor| note.created_at <= cursor)
                })
                .cloned()
                .collect();
            newest_first.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(newest_first
                .into_iter()
                .skip(filter.offset() as usize)
                .take(filter.page_size as usize)
                .collect())
        }

        fn create_note(&self, note: &Note) -> Result<(), BackendError> {
            if let Some(reject) = self.reject_writes {
                return Err(reject());
            }
            self.notes.borrow_mut().push(note.clone());
            Ok(())
        }

        fn update_note(&self, note: &Note) -> Result<(), BackendError> {
            if let Some(reject) = self.reject_writes {
                return Err(reject());
            }
            let mut notes = self.notes.borrow_mut();
            let slot = notes
                .iter_mut()
                .find(|existing| existing.id == note.id)
                .ok_or_else(|| BackendError::NotFound(note.id.clone()))?;
            *slot = note.clone();
            Ok(())
        }

        fn delete_note(&self, id: &NoteId) -> Result<(), BackendError> {
            if let Some(reject) = self.reject_writes {
                return Err(reject());
            }
            self.notes.borrow_mut().retain(|note| &note.id != id);
            Ok(())
        }
    }

    fn clock() -> OffsetDateTime {
        datetime!(2024-05-01 12:00:00 UTC)
    }

    fn seeded(count: usize) -> FakeBackend {
        let notes = (0..count)
            .map(|idx| Note {
                id: NoteId::new(format!("note-{idx}")),
                text: format!("note {idx}"),
                tags: Vec::new(),
                reply: None,
                created_at: clock(),
                updated_at: clock(),
            })
            .collect();
        FakeBackend {
            notes: RefCell::new(notes),
            ..FakeBackend::default()
        }
    }

    fn state() -> AppState {
        AppState::new(SelectionSettings::default()).with_clock(clock)
    }

    fn post(state: &mut AppState, text: &str) -> Vec<Effect> {
        state.dispatch(UiEvent::OpenCreate, Instant::now());
        for ch in text.chars() {
            state.dispatch(
                UiEvent::Draft(crate::app::events::DraftInput::Char(ch)),
                Instant::now(),
            );
        }
        state.dispatch(UiEvent::Submit, Instant::now())
    }

    #[test]
    fn pages_load_until_exhausted() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let session = SessionStore::new(dir.path().join("session.token"));
        let mut backend = seeded(5);
        let mut state = state();
        let mut dispatcher = ActionDispatcher::new(&mut backend, &session, 2);

        dispatcher.load_first_page(&mut state)?;
        assert_eq!(state.store().len(), 2);
        assert_eq!(state.store().notes()[1].id.as_str(), "note-4");
        assert_eq!(dispatcher.load_more(&mut state)?, 2);
        assert_eq!(dispatcher.load_more(&mut state)?, 1);
        assert!(state.paging.exhausted);
        assert_eq!(dispatcher.load_more(&mut state)?, 0);

        let ids: Vec<&str> = state.store().iter().map(|note| note.id.as_str()).collect();
        assert_eq!(ids, ["note-0", "note-1", "note-2", "note-3", "note-4"]);
        Ok(())
    }

    #[test]
    fn successful_write_refreshes_from_backend() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let session = SessionStore::new(dir.path().join("session.token"));
        let mut backend = seeded(1);
        let mut state = state();
        {
            let mut dispatcher = ActionDispatcher::new(&mut backend, &session, 10);
            dispatcher.load_first_page(&mut state)?;
            let effects = post(&mut state, "fresh");
            dispatcher.sync(&mut state, effects, true);
        }
        assert_eq!(backend.notes.borrow().len(), 2);
        assert_eq!(state.store().len(), 2);
        assert_eq!(state.store().notes()[1].text, "fresh");
        Ok(())
    }

    #[test]
    fn posts_past_a_full_page_stay_on_the_board() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let session = SessionStore::new(dir.path().join("session.token"));
        let mut backend = seeded(3);
        let mut state = state();
        let mut dispatcher = ActionDispatcher::new(&mut backend, &session, 10);
        dispatcher.load_first_page(&mut state)?;

        for idx in 0..12 {
            let effects = post(&mut state, &format!("post {idx}"));
            let posted = match effects.first() {
                Some(Effect::Create(note)) => note.id.clone(),
                other => panic!("expected a create, got {other:?}"),
            };
            dispatcher.sync(&mut state, effects, true);
            assert!(state.store().contains(&posted), "post {idx} vanished");
            assert_eq!(state.focused_id(), Some(posted));
            assert!(state.store().len() <= 10);
        }
        assert_eq!(state.store().notes()[9].text, "post 11");
        Ok(())
    }

    #[test]
    fn load_more_keeps_focus_on_the_same_note() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let session = SessionStore::new(dir.path().join("session.token"));
        let mut backend = seeded(4);
        let mut state = state();
        let mut dispatcher = ActionDispatcher::new(&mut backend, &session, 2);
        dispatcher.load_first_page(&mut state)?;
        state.focus_on(&NoteId::new("note-3"));

        assert_eq!(dispatcher.load_more(&mut state)?, 2);
        assert_eq!(state.focused_id(), Some(NoteId::new("note-3")));
        assert_eq!(state.store().notes()[0].id.as_str(), "note-0");
        Ok(())
    }

    #[test]
    fn failed_write_keeps_local_change() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let session = SessionStore::new(dir.path().join("session.token"));
        let mut backend = FakeBackend {
            reject_writes: Some(|| BackendError::Status {
                status: 500,
                message: "boom".into(),
            }),
            ..seeded(0)
        };
        let mut state = state();
        let mut dispatcher = ActionDispatcher::new(&mut backend, &session, 10);
        let effects = post(&mut state, "offline");
        dispatcher.sync(&mut state, effects, true);

        assert_eq!(state.store().len(), 1);
        assert!(state.status_message().unwrap().contains("could not be saved"));
        Ok(())
    }

    #[test]
    fn unauthorized_write_clears_session_and_shows_login() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let session = SessionStore::new(dir.path().join("session.token"));
        session.save("stale")?;
        let mut backend = FakeBackend {
            token: Some("stale".into()),
            reject_writes: Some(|| BackendError::Unauthorized),
            ..seeded(0)
        };
        let mut state = state();
        {
            let mut dispatcher = ActionDispatcher::new(&mut backend, &session, 10);
            let effects = post(&mut state, "denied");
            dispatcher.sync(&mut state, effects, true);
        }
        assert_eq!(session.load()?, None);
        assert_eq!(backend.token, None);
        assert!(matches!(state.view(), View::Login(form) if form.error.is_some()));
        Ok(())
    }

    #[test]
    fn login_persists_token() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let session = SessionStore::new(dir.path().join("session.token"));
        let mut backend = seeded(0);
        let mut dispatcher = ActionDispatcher::new(&mut backend, &session, 10);
        dispatcher.login(&Credentials {
            username: "ada".into(),
            password: "pw".into(),
        })?;
        assert_eq!(session.load()?.as_deref(), Some("token-for-ada"));
        Ok(())
    }
}
