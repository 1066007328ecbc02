use std::time::Instant;

use time::OffsetDateTime;

use super::events::{DraftInput, Effect, PointerTarget, UiEvent};
use crate::backend::Credentials;
use crate::compose::{CloseOutcome, Commit, ComposeField, Composer, ModalPrompt, TagCommit};
use crate::interaction::{
    ContextMenu, MenuAction, MenuClick, Point, PointerOutcome, SelectionController,
    SelectionSettings,
};
use crate::store::{Note, NoteId, NoteStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    Username,
    Password,
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub field: LoginField,
    pub error: Option<String>,
}

impl LoginForm {
    pub fn push_char(&mut self, ch: char) {
        match self.field {
            LoginField::Username => self.username.push(ch),
            LoginField::Password => self.password.push(ch),
        }
    }

    pub fn pop_char(&mut self) {
        match self.field {
            LoginField::Username => self.username.pop(),
            LoginField::Password => self.password.pop(),
        };
    }

    pub fn switch_field(&mut self) {
        self.field = match self.field {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }

    pub fn credentials(&self) -> Option<Credentials> {
        let username = self.username.trim();
        if username.is_empty() || self.password.is_empty() {
            return None;
        }
        Some(Credentials {
            username: username.to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub enum View {
    Notes,
    Login(LoginForm),
}

/// How far into the backend's note list the board has loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub cursor: Option<OffsetDateTime>,
    pub pages_loaded: u32,
    pub exhausted: bool,
}

pub struct AppState {
    store: NoteStore,
    composer: Composer,
    selection: SelectionController,
    menu: ContextMenu,
    focus: usize,
    status_message: Option<String>,
    view: View,
    pub paging: PageCursor,
    clock: fn() -> OffsetDateTime,
}

impl AppState {
    pub fn new(settings: SelectionSettings) -> Self {
        Self {
            store: NoteStore::new(),
            composer: Composer::default(),
            selection: SelectionController::new(settings),
            menu: ContextMenu::default(),
            focus: 0,
            status_message: None,
            view: View::Notes,
            paging: PageCursor::default(),
            clock: OffsetDateTime::now_utc,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> OffsetDateTime {
        (self.clock)()
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn menu(&self) -> &ContextMenu {
        &self.menu
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn login_form_mut(&mut self) -> Option<&mut LoginForm> {
        match &mut self.view {
            View::Login(form) => Some(form),
            View::Notes => None,
        }
    }

    pub fn show_login(&mut self, reason: Option<String>) {
        self.composer.reset();
        self.menu.hide();
        self.selection.cancel();
        self.view = View::Login(LoginForm {
            error: reason,
            ..LoginForm::default()
        });
    }

    pub fn show_notes(&mut self) {
        self.view = View::Notes;
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn clear_status_message(&mut self) {
        self.status_message = None;
    }

    pub fn focus_index(&self) -> Option<usize> {
        (!self.store.is_empty()).then_some(self.focus)
    }

    pub fn focused(&self) -> Option<&Note> {
        self.store.notes().get(self.focus)
    }

    pub fn focused_id(&self) -> Option<NoteId> {
        self.focused().map(|note| note.id.clone())
    }

    pub fn focus_on(&mut self, id: &NoteId) {
        if let Some(idx) = self.store.position(id) {
            self.focus = idx;
        }
    }

    fn move_focus(&mut self, delta: isize) {
        if self.store.is_empty() {
            self.focus = 0;
            return;
        }
        let last = self.store.len() as isize - 1;
        self.focus = (self.focus as isize + delta).clamp(0, last) as usize;
    }

    fn clamp_focus(&mut self) {
        self.focus = self.focus.min(self.store.len().saturating_sub(1));
    }

    /// Swaps in a fresh listing from the backend, keeping focus on the same
    /// note when it is still present.
    pub fn replace_notes(&mut self, notes: Vec<Note>) {
        let focused = self.focused_id();
        self.store.replace_all(notes);
        let gone: Vec<NoteId> = self
            .selection
            .selected()
            .filter(|id| !self.store.contains(id))
            .cloned()
            .collect();
        for id in &gone {
            self.selection.forget(id);
        }
        match focused {
            Some(id) if self.store.contains(&id) => self.focus_on(&id),
            _ => self.clamp_focus(),
        }
    }

    /// Adds an older page above the loaded notes. Focus stays on the same note.
    pub fn prepend_notes(&mut self, notes: Vec<Note>) -> usize {
        let had_notes = !self.store.is_empty();
        let added = self.store.prepend_page(notes);
        if had_notes {
            self.focus += added;
        }
        added
    }

    /// Routes one UI event through the guards and returns the persistence
    /// work it produced.
    pub fn dispatch(&mut self, event: UiEvent, now: Instant) -> Vec<Effect> {
        if !matches!(event, UiEvent::Tick | UiEvent::PointerMove { .. }) {
            tracing::trace!(?event, "dispatch");
        }
        if !matches!(self.view, View::Notes) {
            return Vec::new();
        }
        if self.composer.is_open() {
            return self.dispatch_modal(event);
        }
        match event {
            UiEvent::PointerDown { target, at } => self.pointer_down(target, at, now),
            UiEvent::PointerMove { target, at } => {
                self.pointer_move(target, at, now);
                Vec::new()
            }
            UiEvent::PointerUp { .. } => {
                self.pointer_up(now);
                Vec::new()
            }
            UiEvent::PointerLost => {
                self.selection.pointer_lost();
                Vec::new()
            }
            UiEvent::ContextMenuRequested { note, at, viewport } => {
                if self.menu.open(note.clone(), at, viewport, self.selection.is_active()) {
                    self.focus_on(&note);
                } else {
                    tracing::debug!(%note, "context menu suppressed during selection");
                }
                Vec::new()
            }
            UiEvent::MenuChoose(action) => match self.menu.choose(action) {
                Some((action, note)) => self.run_menu_action(action, note),
                None => Vec::new(),
            },
            UiEvent::MenuChooseHighlighted => match self.menu.choose_highlighted() {
                Some((action, note)) => self.run_menu_action(action, note),
                None => Vec::new(),
            },
            UiEvent::MenuMove(delta) => {
                self.menu.move_highlight(delta);
                Vec::new()
            }
            UiEvent::MenuDismiss => {
                self.menu.hide();
                Vec::new()
            }
            UiEvent::OpenCreate => {
                if self.modal_allowed() {
                    self.composer.open_create();
                }
                Vec::new()
            }
            UiEvent::OpenEdit(id) => {
                self.open_with(&id, MenuAction::Edit);
                Vec::new()
            }
            UiEvent::OpenReply(id) => {
                self.open_with(&id, MenuAction::Reply);
                Vec::new()
            }
            UiEvent::EnterSelection(id) => {
                self.menu.hide();
                self.selection.enter_with(id);
                Vec::new()
            }
            UiEvent::ToggleSelected(id) => {
                self.selection.toggle(&id);
                Vec::new()
            }
            UiEvent::CancelSelection => {
                self.selection.cancel();
                Vec::new()
            }
            UiEvent::DeleteSelected => {
                if !self.selection.is_active() {
                    return Vec::new();
                }
                let ids = self.selection.take_for_delete();
                let effects: Vec<Effect> =
                    ids.into_iter().flat_map(|id| self.delete_note(id)).collect();
                self.set_status_message(Some(format!("Deleted {} note(s)", effects.len())));
                effects
            }
            UiEvent::DeleteNote(id) => {
                if self.selection.is_active() {
                    return Vec::new();
                }
                self.delete_note(id)
            }
            UiEvent::FollowReply(id) => {
                self.follow_reply(&id);
                Vec::new()
            }
            UiEvent::Focus(delta) => {
                self.move_focus(delta);
                Vec::new()
            }
            UiEvent::Tick => {
                if let Some(note) = self.selection.tick(now) {
                    self.on_selection_entered(&note);
                }
                Vec::new()
            }
            UiEvent::Draft(_)
            | UiEvent::Submit
            | UiEvent::RequestClose
            | UiEvent::ConfirmDiscard
            | UiEvent::CancelDiscard
            | UiEvent::RequestRemoveReply
            | UiEvent::ConfirmRemoveReply
            | UiEvent::CancelRemoveReply => Vec::new(),
        }
    }

    fn dispatch_modal(&mut self, event: UiEvent) -> Vec<Effect> {
        let prompt = self.composer.prompt();
        match event {
            UiEvent::PointerDown {
                target: PointerTarget::Backdrop,
                ..
            } if prompt.is_none() => {
                self.request_close();
            }
            UiEvent::Draft(input) if prompt.is_none() => self.apply_draft_input(input),
            UiEvent::Submit if prompt.is_none() => return self.submit(),
            UiEvent::RequestClose if prompt.is_none() => self.request_close(),
            UiEvent::ConfirmDiscard => self.composer.confirm_discard(),
            UiEvent::CancelDiscard => self.composer.cancel_discard(),
            UiEvent::RequestRemoveReply => {
                self.composer.request_remove_reply();
            }
            UiEvent::ConfirmRemoveReply => self.composer.confirm_remove_reply(),
            UiEvent::CancelRemoveReply => self.composer.cancel_remove_reply(),
            _ => {}
        }
        Vec::new()
    }

    fn pointer_down(&mut self, target: PointerTarget, at: Point, now: Instant) -> Vec<Effect> {
        if self.menu.is_visible() {
            return match self.menu.click(at) {
                MenuClick::Chose(action, note) => self.run_menu_action(action, note),
                MenuClick::Inside | MenuClick::Dismissed | MenuClick::Inactive => Vec::new(),
            };
        }
        if let PointerTarget::Note(id) = &target {
            self.focus_on(id);
        }
        self.selection.pointer_down(target.note(), at, now);
        Vec::new()
    }

    fn pointer_move(&mut self, target: PointerTarget, at: Point, now: Instant) {
        let was_active = self.selection.is_active();
        self.selection.pointer_move(target.note(), at, now);
        self.note_selection_entry(was_active);
    }

    fn pointer_up(&mut self, now: Instant) {
        let was_active = self.selection.is_active();
        let outcome = self.selection.pointer_up(now);
        self.note_selection_entry(was_active);
        if let PointerOutcome::Toggled { note, selected } = outcome {
            tracing::trace!(%note, selected, "selection toggled");
        }
    }

    fn note_selection_entry(&mut self, was_active: bool) {
        if was_active || !self.selection.is_active() {
            return;
        }
        let first = self.selection.selected().next().cloned();
        if let Some(note) = first {
            self.on_selection_entered(&note);
        }
    }

    fn on_selection_entered(&mut self, note: &NoteId) {
        self.menu.hide();
        self.focus_on(note);
        self.set_status_message(Some("Selection mode: click or drag to select, D deletes"));
    }

    fn modal_allowed(&self) -> bool {
        if self.selection.is_active() {
            tracing::debug!("compose dialog blocked while selecting");
            return false;
        }
        !self.composer.is_open()
    }

    fn open_with(&mut self, id: &NoteId, action: MenuAction) {
        if !self.modal_allowed() {
            return;
        }
        let Some(note) = self.store.get(id) else {
            self.set_status_message(Some(format!("Note {id} no longer exists")));
            return;
        };
        match action {
            MenuAction::Edit => self.composer.open_edit(note),
            MenuAction::Reply => self.composer.open_reply(note),
            MenuAction::Delete => {}
        }
        self.menu.hide();
        self.selection.pointer_lost();
    }

    fn run_menu_action(&mut self, action: MenuAction, note: NoteId) -> Vec<Effect> {
        match action {
            MenuAction::Edit | MenuAction::Reply => {
                self.open_with(&note, action);
                Vec::new()
            }
            MenuAction::Delete => self.delete_note(note),
        }
    }

    fn delete_note(&mut self, id: NoteId) -> Vec<Effect> {
        if self.store.remove(&id).is_none() {
            self.set_status_message(Some(format!("Note {id} was already removed")));
            return Vec::new();
        }
        self.selection.forget(&id);
        self.composer.forget_reply_target(&id);
        self.clamp_focus();
        vec![Effect::Delete(id)]
    }

    fn follow_reply(&mut self, id: &NoteId) {
        let outcome = self
            .store
            .follow_reply(id)
            .map(|target| target.map(|note| note.id.clone()));
        match outcome {
            Ok(Some(target)) => self.focus_on(&target),
            Ok(None) => self.set_status_message(Some("This note is not a reply")),
            Err(StoreError::DanglingReply { .. }) => {
                self.set_status_message(Some("The note this replied to has been deleted"))
            }
            Err(err) => self.set_status_message(Some(err.to_string())),
        }
    }

    fn request_close(&mut self) {
        if self.composer.request_close() == CloseOutcome::ConfirmingDiscard {
            tracing::debug!("unsaved draft, asking before discard");
        }
    }

    fn submit(&mut self) -> Vec<Effect> {
        let now = self.now();
        match self.composer.commit(&mut self.store, now) {
            Ok(Some(Commit::Created(note))) => {
                self.focus_on(&note.id);
                self.set_status_message(Some("Posted"));
                vec![Effect::Create(note)]
            }
            Ok(Some(Commit::Updated(note))) => {
                self.set_status_message(Some("Saved"));
                vec![Effect::Update(note)]
            }
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!(?err, "compose commit failed");
                self.set_status_message(Some(err.to_string()));
                Vec::new()
            }
        }
    }

    fn apply_draft_input(&mut self, input: DraftInput) {
        let Some(draft) = self.composer.draft_mut() else {
            return;
        };
        let mut message = None;
        match (draft.field, input) {
            (_, DraftInput::SwitchField) => {
                draft.field = match draft.field {
                    ComposeField::Text => ComposeField::Tags,
                    ComposeField::Tags => ComposeField::Text,
                };
            }
            (ComposeField::Text, DraftInput::Char(ch)) => draft.text.insert_char(ch),
            (ComposeField::Text, DraftInput::Newline) => draft.text.insert_newline(),
            (ComposeField::Text, DraftInput::Backspace) => {
                draft.text.backspace();
            }
            (ComposeField::Text, DraftInput::Delete) => {
                draft.text.delete();
            }
            (ComposeField::Text, DraftInput::Left) => {
                draft.text.move_left();
            }
            (ComposeField::Text, DraftInput::Right) => {
                draft.text.move_right();
            }
            (ComposeField::Text, DraftInput::Home) => {
                draft.text.move_home();
            }
            (ComposeField::Text, DraftInput::End) => {
                draft.text.move_end();
            }
            (ComposeField::Tags, DraftInput::Char(ch)) => {
                if let Err(err) = draft.tags.push_char(ch) {
                    message = Some(err.to_string());
                }
            }
            (ComposeField::Tags, DraftInput::Newline | DraftInput::ConfirmTag) => {
                match draft.tags.commit_input() {
                    Ok(TagCommit::Duplicate) => tracing::trace!("duplicate tag ignored"),
                    Ok(_) => {}
                    Err(err) => message = Some(err.to_string()),
                }
            }
            (ComposeField::Tags, DraftInput::Backspace) => draft.tags.pop_char(),
            (ComposeField::Tags, DraftInput::ChipLeft | DraftInput::Left) => {
                draft.tags.move_highlight(-1)
            }
            (ComposeField::Tags, DraftInput::ChipRight | DraftInput::Right) => {
                draft.tags.move_highlight(1)
            }
            (ComposeField::Tags, DraftInput::EditChip) => {
                if let Some(tag) = draft.tags.highlighted_tag().map(str::to_string) {
                    draft.tags.select_tag_for_edit(&tag);
                }
            }
            (ComposeField::Tags, DraftInput::RemoveChip | DraftInput::Delete) => {
                if let Some(tag) = draft.tags.highlighted_tag().map(str::to_string) {
                    draft.tags.remove_tag(&tag);
                }
            }
            _ => {}
        }
        if message.is_some() {
            self.set_status_message(message);
        }
    }

    /// The prompt currently layered over the compose dialog, if any.
    pub fn modal_prompt(&self) -> Option<ModalPrompt> {
        self.composer.prompt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::ModalState;
    use crate::interaction::Area;
    use crate::store::ReplyLink;
    use std::time::Duration;
    use time::macros::datetime;

    fn fixed_clock() -> OffsetDateTime {
        datetime!(2024-05-01 12:00:00 UTC)
    }

    fn note(id: &str, text: &str) -> Note {
        Note {
            id: NoteId::new(id),
            text: text.to_string(),
            tags: Vec::new(),
            reply: None,
            created_at: fixed_clock(),
            updated_at: fixed_clock(),
        }
    }

    fn state_with(notes: Vec<Note>) -> AppState {
        let mut state = AppState::new(SelectionSettings::default()).with_clock(fixed_clock);
        state.replace_notes(notes);
        state
    }

    fn viewport() -> Area {
        Area::new(0, 0, 80, 24)
    }

    fn right_click(state: &mut AppState, id: &str) {
        state.dispatch(
            UiEvent::ContextMenuRequested {
                note: NoteId::new(id),
                at: Point::new(10, 5),
                viewport: viewport(),
            },
            Instant::now(),
        );
    }

    fn type_text(state: &mut AppState, text: &str) {
        for ch in text.chars() {
            state.dispatch(UiEvent::Draft(DraftInput::Char(ch)), Instant::now());
        }
    }

    #[test]
    fn context_menu_is_ignored_while_selecting() {
        let mut state = state_with(vec![note("a", "one")]);
        state.dispatch(UiEvent::EnterSelection(NoteId::new("a")), Instant::now());
        right_click(&mut state, "a");
        assert!(!state.menu().is_visible());
    }

    #[test]
    fn entering_selection_by_hold_hides_the_menu() {
        let mut state = state_with(vec![note("a", "one"), note("b", "two")]);
        right_click(&mut state, "a");
        assert!(state.menu().is_visible());
        state.dispatch(UiEvent::MenuDismiss, Instant::now());

        let start = Instant::now();
        state.dispatch(
            UiEvent::PointerDown {
                target: PointerTarget::Note(NoteId::new("b")),
                at: Point::new(2, 12),
            },
            start,
        );
        right_click(&mut state, "a");
        state.dispatch(UiEvent::Tick, start + Duration::from_millis(250));
        assert!(state.selection().is_active());
        assert!(state.selection().is_selected(&NoteId::new("b")));
        assert!(!state.menu().is_visible());
    }

    #[test]
    fn release_after_hold_enters_selection_without_tick() {
        let mut state = state_with(vec![note("a", "one"), note("b", "two")]);
        let start = Instant::now();
        state.dispatch(
            UiEvent::PointerDown {
                target: PointerTarget::Note(NoteId::new("b")),
                at: Point::new(2, 12),
            },
            start,
        );
        state.dispatch(
            UiEvent::PointerUp { at: Point::new(2, 12) },
            start + Duration::from_millis(230),
        );
        assert!(state.selection().is_active());
        assert_eq!(state.focused_id(), Some(NoteId::new("b")));
        assert!(state.status_message().is_some());
    }

    #[test]
    fn drag_after_matured_hold_enters_selection() {
        let mut state = state_with(vec![note("a", "one"), note("b", "two")]);
        let start = Instant::now();
        state.dispatch(
            UiEvent::PointerDown {
                target: PointerTarget::Note(NoteId::new("a")),
                at: Point::new(2, 2),
            },
            start,
        );
        state.dispatch(
            UiEvent::PointerMove {
                target: PointerTarget::Note(NoteId::new("b")),
                at: Point::new(2, 12),
            },
            start + Duration::from_millis(250),
        );
        assert!(state.selection().is_active());
        assert!(state.selection().is_selected(&NoteId::new("a")));
        assert!(state.selection().is_selected(&NoteId::new("b")));
        assert!(state.status_message().is_some());
    }

    #[test]
    fn pointer_down_outside_open_menu_is_swallowed() {
        let mut state = state_with(vec![note("a", "one")]);
        right_click(&mut state, "a");
        state.dispatch(
            UiEvent::PointerDown {
                target: PointerTarget::Note(NoteId::new("a")),
                at: Point::new(70, 20),
            },
            Instant::now(),
        );
        assert!(!state.menu().is_visible());
        assert!(!state.selection().hold_pending());
    }

    #[test]
    fn menu_delete_removes_immediately_and_leaves_reply_dangling() {
        let mut reply = note("b", "answer");
        reply.reply = Some(ReplyLink::new(NoteId::new("a"), "one"));
        let mut state = state_with(vec![note("a", "one"), reply]);

        right_click(&mut state, "a");
        let effects = state.dispatch(UiEvent::MenuChoose(MenuAction::Delete), Instant::now());
        assert_eq!(effects, vec![Effect::Delete(NoteId::new("a"))]);
        assert_eq!(state.store().len(), 1);

        state.dispatch(UiEvent::FollowReply(NoteId::new("b")), Instant::now());
        assert_eq!(
            state.status_message(),
            Some("The note this replied to has been deleted")
        );
    }

    #[test]
    fn compose_is_blocked_during_selection_and_while_open() {
        let mut state = state_with(vec![note("a", "one")]);
        state.dispatch(UiEvent::EnterSelection(NoteId::new("a")), Instant::now());
        state.dispatch(UiEvent::OpenCreate, Instant::now());
        assert!(!state.composer().is_open());

        state.dispatch(UiEvent::CancelSelection, Instant::now());
        state.dispatch(UiEvent::OpenCreate, Instant::now());
        state.dispatch(UiEvent::OpenEdit(NoteId::new("a")), Instant::now());
        assert_eq!(state.composer().state(), ModalState::OpenCreate);
    }

    #[test]
    fn backdrop_click_routes_to_close_request() {
        let mut state = state_with(Vec::new());
        state.dispatch(UiEvent::OpenCreate, Instant::now());
        type_text(&mut state, "draft");
        state.dispatch(
            UiEvent::PointerDown {
                target: PointerTarget::Backdrop,
                at: Point::new(0, 0),
            },
            Instant::now(),
        );
        assert_eq!(state.modal_prompt(), Some(ModalPrompt::ConfirmDiscard));

        state.dispatch(UiEvent::ConfirmDiscard, Instant::now());
        assert!(!state.composer().is_open());
    }

    #[test]
    fn note_pointer_events_are_ignored_while_modal_open() {
        let mut state = state_with(vec![note("a", "one")]);
        state.dispatch(UiEvent::OpenCreate, Instant::now());
        let start = Instant::now();
        state.dispatch(
            UiEvent::PointerDown {
                target: PointerTarget::Modal,
                at: Point::new(30, 10),
            },
            start,
        );
        state.dispatch(UiEvent::Tick, start + Duration::from_secs(1));
        assert!(!state.selection().is_active());
        assert!(state.composer().is_open());
    }

    #[test]
    fn submit_emits_create_with_tags() {
        let mut state = state_with(Vec::new());
        state.dispatch(UiEvent::OpenCreate, Instant::now());
        type_text(&mut state, "hello");
        state.dispatch(UiEvent::Draft(DraftInput::SwitchField), Instant::now());
        type_text(&mut state, "a b ");

        let effects = state.dispatch(UiEvent::Submit, Instant::now());
        let [Effect::Create(created)] = effects.as_slice() else {
            panic!("expected a single create, got {effects:?}");
        };
        assert_eq!(created.text, "hello");
        assert_eq!(created.tags, ["a", "b"]);
        assert_eq!(state.focused_id(), Some(created.id.clone()));
        assert!(!state.composer().is_open());
    }

    #[test]
    fn invalid_tag_reports_status_and_keeps_input() {
        let mut state = state_with(Vec::new());
        state.dispatch(UiEvent::OpenCreate, Instant::now());
        state.dispatch(UiEvent::Draft(DraftInput::SwitchField), Instant::now());
        type_text(&mut state, "no-dash ");
        assert!(state.status_message().unwrap().contains("not a valid tag"));
        let draft = state.composer().draft().unwrap();
        assert!(draft.tags.is_empty());
        assert_eq!(draft.tags.input(), "no-dash");
    }

    #[test]
    fn delete_selected_emits_one_effect_per_note() {
        let mut state = state_with(vec![note("a", "1"), note("b", "2"), note("c", "3")]);
        state.dispatch(UiEvent::EnterSelection(NoteId::new("a")), Instant::now());
        state.dispatch(UiEvent::ToggleSelected(NoteId::new("c")), Instant::now());

        let effects = state.dispatch(UiEvent::DeleteSelected, Instant::now());
        assert_eq!(
            effects,
            vec![
                Effect::Delete(NoteId::new("a")),
                Effect::Delete(NoteId::new("c"))
            ]
        );
        assert!(!state.selection().is_active());
        assert_eq!(state.store().len(), 1);
        assert_eq!(state.focused_id(), Some(NoteId::new("b")));
    }

    #[test]
    fn refresh_drops_vanished_notes_from_selection() {
        let mut state = state_with(vec![note("a", "1"), note("b", "2")]);
        state.dispatch(UiEvent::EnterSelection(NoteId::new("a")), Instant::now());
        state.dispatch(UiEvent::ToggleSelected(NoteId::new("b")), Instant::now());
        state.replace_notes(vec![note("b", "2")]);
        assert_eq!(state.selection().len(), 1);
        assert!(state.selection().is_selected(&NoteId::new("b")));
    }

    #[test]
    fn login_view_swallows_board_events() {
        let mut state = state_with(vec![note("a", "1")]);
        state.show_login(Some("expired".into()));
        state.dispatch(UiEvent::OpenCreate, Instant::now());
        assert!(!state.composer().is_open());
        let form = state.login_form_mut().unwrap();
        assert_eq!(form.error.as_deref(), Some("expired"));
        for ch in "me".chars() {
            form.push_char(ch);
        }
        assert!(form.credentials().is_none());
        form.switch_field();
        form.push_char('x');
        assert_eq!(form.credentials().unwrap().username, "me");
    }
}
