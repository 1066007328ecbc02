use thiserror::Error;
use time::OffsetDateTime;

use super::input::TextInput;
use super::reply::ReplyTracker;
use super::tags::TagEditor;
use crate::store::{Note, NoteId, NoteStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeMode {
    Create,
    Edit(NoteId),
    Reply(NoteId),
}

impl ComposeMode {
    pub fn title(&self) -> &'static str {
        match self {
            ComposeMode::Create => "Create Note",
            ComposeMode::Edit(_) => "Edit Note",
            ComposeMode::Reply(_) => "Reply",
        }
    }

    pub fn submit_label(&self) -> &'static str {
        match self {
            ComposeMode::Edit(_) => "Save",
            _ => "Post",
        }
    }
}

/// Confirmation layered over an open dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalPrompt {
    ConfirmDiscard,
    ConfirmRemoveReply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComposeField {
    #[default]
    Text,
    Tags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalState {
    Closed,
    OpenCreate,
    OpenEdit,
    OpenReply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    ConfirmingDiscard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commit {
    Created(Note),
    Updated(Note),
}

impl Commit {
    pub fn note(&self) -> &Note {
        match self {
            Commit::Created(note) | Commit::Updated(note) => note,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("note {0} was removed while it was being edited")]
    EditTargetMissing(NoteId),
}

#[derive(Debug, Clone)]
pub struct Draft {
    mode: ComposeMode,
    pub text: TextInput,
    pub tags: TagEditor,
    pub reply: ReplyTracker,
    pub field: ComposeField,
    original_text: String,
    original_tags: Vec<String>,
    prompt: Option<ModalPrompt>,
}

impl Draft {
    fn new(mode: ComposeMode) -> Self {
        Self {
            mode,
            text: TextInput::default(),
            tags: TagEditor::default(),
            reply: ReplyTracker::default(),
            field: ComposeField::Text,
            original_text: String::new(),
            original_tags: Vec::new(),
            prompt: None,
        }
    }

    pub fn mode(&self) -> &ComposeMode {
        &self.mode
    }

    pub fn prompt(&self) -> Option<ModalPrompt> {
        self.prompt
    }

    /// Edit drafts compare against the snapshot taken on open, other drafts
    /// against emptiness. Tag comparison is order-sensitive.
    pub fn has_unsaved_changes(&self) -> bool {
        let text = self.text.trimmed();
        match self.mode {
            ComposeMode::Edit(_) => {
                text != self.original_text || self.tags.tags() != self.original_tags.as_slice()
            }
            ComposeMode::Create | ComposeMode::Reply(_) => {
                !text.is_empty() || !self.tags.is_empty()
            }
        }
    }
}

/// The compose dialog. Holds at most one draft; `None` means the dialog is
/// closed.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    draft: Option<Draft>,
}

impl Composer {
    pub fn is_open(&self) -> bool {
        self.draft.is_some()
    }

    pub fn state(&self) -> ModalState {
        match self.draft.as_ref().map(Draft::mode) {
            None => ModalState::Closed,
            Some(ComposeMode::Create) => ModalState::OpenCreate,
            Some(ComposeMode::Edit(_)) => ModalState::OpenEdit,
            Some(ComposeMode::Reply(_)) => ModalState::OpenReply,
        }
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Option<&mut Draft> {
        self.draft.as_mut()
    }

    pub fn prompt(&self) -> Option<ModalPrompt> {
        self.draft.as_ref().and_then(Draft::prompt)
    }

    pub fn open_create(&mut self) {
        self.draft = Some(Draft::new(ComposeMode::Create));
    }

    pub fn open_edit(&mut self, note: &Note) {
        let mut draft = Draft::new(ComposeMode::Edit(note.id.clone()));
        draft.original_text = note.text.clone();
        draft.original_tags = note.tags.clone();
        draft.text.set(&note.text);
        draft.tags.populate(&note.tags);
        if let Some(link) = &note.reply {
            if draft.reply.rehydrate(link) && draft.reply.tracks(&note.id) {
                tracing::warn!(note = %note.id, "ignoring self-referencing reply link");
                draft.reply.clear();
            }
        }
        self.draft = Some(draft);
    }

    pub fn open_reply(&mut self, note: &Note) {
        let mut draft = Draft::new(ComposeMode::Reply(note.id.clone()));
        draft.reply.capture(note);
        self.draft = Some(draft);
    }

    pub fn reset(&mut self) {
        self.draft = None;
    }

    pub fn request_close(&mut self) -> CloseOutcome {
        let Some(draft) = self.draft.as_mut() else {
            return CloseOutcome::Closed;
        };
        if draft.has_unsaved_changes() {
            draft.prompt = Some(ModalPrompt::ConfirmDiscard);
            CloseOutcome::ConfirmingDiscard
        } else {
            self.reset();
            CloseOutcome::Closed
        }
    }

    pub fn cancel_discard(&mut self) {
        self.dismiss_prompt(ModalPrompt::ConfirmDiscard);
    }

    pub fn confirm_discard(&mut self) {
        if self.prompt() == Some(ModalPrompt::ConfirmDiscard) {
            self.reset();
        }
    }

    /// Asks before dropping the reply link. Only meaningful when the draft
    /// carries one.
    pub fn request_remove_reply(&mut self) -> bool {
        match self.draft.as_mut() {
            Some(draft) if draft.reply.is_active() && draft.prompt.is_none() => {
                draft.prompt = Some(ModalPrompt::ConfirmRemoveReply);
                true
            }
            _ => false,
        }
    }

    pub fn confirm_remove_reply(&mut self) {
        if let Some(draft) = self.draft.as_mut() {
            if draft.prompt == Some(ModalPrompt::ConfirmRemoveReply) {
                draft.reply.clear();
                draft.prompt = None;
            }
        }
    }

    pub fn cancel_remove_reply(&mut self) {
        self.dismiss_prompt(ModalPrompt::ConfirmRemoveReply);
    }

    /// Drops the reply target if it points at a note that was just deleted.
    pub fn forget_reply_target(&mut self, deleted: &NoteId) {
        if let Some(draft) = self.draft.as_mut() {
            if draft.reply.tracks(deleted) {
                draft.reply.clear();
                if draft.prompt == Some(ModalPrompt::ConfirmRemoveReply) {
                    draft.prompt = None;
                }
            }
        }
    }

    /// Writes the draft into the store and closes the dialog. Empty text
    /// leaves everything untouched.
    pub fn commit(
        &mut self,
        store: &mut NoteStore,
        now: OffsetDateTime,
    ) -> Result<Option<Commit>, ComposeError> {
        let Some(draft) = self.draft.as_ref() else {
            return Ok(None);
        };
        let text = draft.text.trimmed().to_string();
        if text.is_empty() {
            return Ok(None);
        }
        let tags = draft.tags.tags().to_vec();
        let reply = draft.reply.link();
        let mode = draft.mode.clone();
        self.reset();

        let committed = match mode {
            ComposeMode::Create => Commit::Created(store.create(&text, tags, None, now).clone()),
            ComposeMode::Reply(_) => Commit::Created(store.create(&text, tags, reply, now).clone()),
            ComposeMode::Edit(id) => {
                let note = store
                    .update(&id, &text, tags, reply, now)
                    .map_err(|_| ComposeError::EditTargetMissing(id.clone()))?;
                Commit::Updated(note.clone())
            }
        };
        Ok(Some(committed))
    }

    fn dismiss_prompt(&mut self, prompt: ModalPrompt) {
        if let Some(draft) = self.draft.as_mut() {
            if draft.prompt == Some(prompt) {
                draft.prompt = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ReplyLink;
    use assert_matches::assert_matches;
    use time::macros::datetime;
    use time::Duration;

    fn at() -> OffsetDateTime {
        datetime!(2024-05-01 12:00:00 UTC)
    }

    fn type_text(composer: &mut Composer, text: &str) {
        let draft = composer.draft_mut().expect("draft open");
        for ch in text.chars() {
            draft.text.insert_char(ch);
        }
    }

    #[test]
    fn editing_without_changes_closes_immediately() {
        let mut store = NoteStore::new();
        let target = store.create("earlier", Vec::new(), None, at()).clone();
        let link = ReplyLink::new(target.id.clone(), "earlier");
        let note = store
            .create("hello", vec!["a".into(), "b".into()], Some(link), at())
            .clone();
        let mut composer = Composer::default();
        composer.open_edit(&note);
        assert_eq!(composer.state(), ModalState::OpenEdit);
        assert_eq!(composer.request_close(), CloseOutcome::Closed);
        assert_eq!(composer.state(), ModalState::Closed);

        let stored = store.get(&note.id).expect("note kept");
        assert_eq!(stored, &note);
        assert_eq!(stored.text, "hello");
        assert_eq!(stored.tags, ["a", "b"]);
        assert_eq!(stored.updated_at, at());
        assert_eq!(stored.reply_to_id(), Some(&target.id));
    }

    #[test]
    fn reordering_tags_counts_as_a_change() {
        let mut store = NoteStore::new();
        let note = store
            .create("hello", vec!["a".into(), "b".into()], None, at())
            .clone();
        let mut composer = Composer::default();
        composer.open_edit(&note);
        let draft = composer.draft_mut().unwrap();
        draft.tags.populate(&["b".into(), "a".into()]);
        assert_eq!(composer.request_close(), CloseOutcome::ConfirmingDiscard);
    }

    #[test]
    fn dirty_create_asks_then_discards() {
        let mut composer = Composer::default();
        composer.open_create();
        type_text(&mut composer, "draft");

        assert_eq!(composer.request_close(), CloseOutcome::ConfirmingDiscard);
        assert_eq!(composer.prompt(), Some(ModalPrompt::ConfirmDiscard));

        composer.cancel_discard();
        assert_eq!(composer.prompt(), None);
        assert_eq!(composer.draft().unwrap().text.as_str(), "draft");

        composer.request_close();
        composer.confirm_discard();
        assert!(!composer.is_open());
    }

    #[test]
    fn whitespace_only_create_is_clean() {
        let mut composer = Composer::default();
        composer.open_create();
        type_text(&mut composer, "   ");
        assert_eq!(composer.request_close(), CloseOutcome::Closed);
    }

    #[test]
    fn tags_alone_make_a_create_dirty() {
        let mut composer = Composer::default();
        composer.open_create();
        composer.draft_mut().unwrap().tags.add_tag("idea").unwrap();
        assert_eq!(composer.request_close(), CloseOutcome::ConfirmingDiscard);
    }

    #[test]
    fn empty_commit_leaves_store_and_dialog_untouched() {
        let mut store = NoteStore::new();
        let mut composer = Composer::default();
        composer.open_create();
        type_text(&mut composer, "  \n ");
        assert_eq!(composer.commit(&mut store, at()), Ok(None));
        assert!(store.is_empty());
        assert!(composer.is_open());
    }

    #[test]
    fn create_then_edit_updates_text_tags_and_timestamp() {
        let mut store = NoteStore::new();
        let mut composer = Composer::default();

        composer.open_create();
        type_text(&mut composer, "hello");
        {
            let draft = composer.draft_mut().unwrap();
            draft.tags.add_tag("a").unwrap();
            draft.tags.add_tag("b").unwrap();
        }
        let created = composer.commit(&mut store, at()).unwrap().unwrap();
        assert_matches!(&created, Commit::Created(note) if note.tags == ["a", "b"]);
        assert!(!composer.is_open());

        let later = at() + Duration::minutes(5);
        composer.open_edit(created.note());
        type_text(&mut composer, " world");
        composer.draft_mut().unwrap().tags.remove_tag("a");
        let updated = composer.commit(&mut store, later).unwrap().unwrap();

        assert_matches!(updated, Commit::Updated(_));
        let stored = store.get(&created.note().id).unwrap();
        assert_eq!(stored.text, "hello world");
        assert_eq!(stored.tags, ["b"]);
        assert_eq!(stored.created_at, at());
        assert_eq!(stored.updated_at, later);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn reply_commit_attaches_captured_link() {
        let mut store = NoteStore::new();
        let target = store.create("original", Vec::new(), None, at()).clone();
        let mut composer = Composer::default();
        composer.open_reply(&target);
        assert_eq!(composer.state(), ModalState::OpenReply);
        type_text(&mut composer, "answer");

        let reply = composer.commit(&mut store, at()).unwrap().unwrap();
        let link = reply.note().reply.clone().expect("reply link");
        assert_eq!(link.target(), &target.id);
        assert_eq!(link.preview(), "original");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn confirming_remove_reply_drops_the_link_on_save() {
        let mut store = NoteStore::new();
        let target = store.create("original", Vec::new(), None, at()).clone();
        let reply = store
            .create(
                "answer",
                Vec::new(),
                Some(ReplyLink::new(target.id.clone(), "original")),
                at(),
            )
            .clone();

        let mut composer = Composer::default();
        composer.open_edit(&reply);
        assert!(composer.draft().unwrap().reply.tracks(&target.id));

        assert!(composer.request_remove_reply());
        composer.cancel_remove_reply();
        assert!(composer.draft().unwrap().reply.is_active());

        composer.request_remove_reply();
        composer.confirm_remove_reply();
        assert!(!composer.draft().unwrap().reply.is_active());
        assert!(!composer.request_remove_reply());

        composer.commit(&mut store, at()).unwrap();
        assert_eq!(store.get(&reply.id).unwrap().reply, None);
    }

    #[test]
    fn edit_keeps_reply_link_when_untouched() {
        let mut store = NoteStore::new();
        let link = ReplyLink::new(NoteId::new("note-gone"), "deleted target");
        let reply = store.create("answer", Vec::new(), Some(link.clone()), at()).clone();

        let mut composer = Composer::default();
        composer.open_edit(&reply);
        type_text(&mut composer, "!");
        composer.commit(&mut store, at()).unwrap();
        assert_eq!(store.get(&reply.id).unwrap().reply, Some(link));
    }

    #[test]
    fn self_referencing_link_is_ignored_on_open() {
        let mut store = NoteStore::new();
        let mut note = store.create("loop", Vec::new(), None, at()).clone();
        note.reply = Some(ReplyLink::new(note.id.clone(), "loop"));
        let mut composer = Composer::default();
        composer.open_edit(&note);
        assert!(!composer.draft().unwrap().reply.is_active());
    }

    #[test]
    fn commit_against_deleted_edit_target_fails_and_resets() {
        let mut store = NoteStore::new();
        let note = store.create("doomed", Vec::new(), None, at()).clone();
        let mut composer = Composer::default();
        composer.open_edit(&note);
        store.remove(&note.id);
        type_text(&mut composer, "?");
        assert_eq!(
            composer.commit(&mut store, at()),
            Err(ComposeError::EditTargetMissing(note.id.clone()))
        );
        assert!(!composer.is_open());
    }

    #[test]
    fn deleting_tracked_target_clears_reply_tracker() {
        let mut store = NoteStore::new();
        let target = store.create("target", Vec::new(), None, at()).clone();
        let mut composer = Composer::default();
        composer.open_reply(&target);
        composer.forget_reply_target(&target.id);
        assert!(!composer.draft().unwrap().reply.is_active());
    }
}
