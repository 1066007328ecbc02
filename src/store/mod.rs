use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

const ID_PREFIX: &str = "note-";
const REPLY_HREF_PREFIX: &str = "note?id=";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_millis(millis: i64) -> Self {
        Self(format!("{ID_PREFIX}{millis}"))
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Non-owning back reference from a reply to the note it answers.
///
/// The preview is captured when the reply is composed and is never refreshed,
/// so a link keeps rendering after its target has been deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLink {
    target: NoteId,
    preview: String,
}

impl ReplyLink {
    pub fn new(target: NoteId, preview: impl Into<String>) -> Self {
        Self {
            target,
            preview: preview.into(),
        }
    }

    pub fn target(&self) -> &NoteId {
        &self.target
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }

    pub fn href(&self) -> String {
        format!("{REPLY_HREF_PREFIX}{}", self.target)
    }

    /// Extracts the target id from an href such as `note?id=note-17`.
    pub fn parse(href: &str) -> Option<NoteId> {
        let (_, query) = href.split_once('?')?;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("id="))
            .filter(|id| !id.is_empty())
            .map(NoteId::new)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: NoteId,
    pub text: String,
    pub tags: Vec<String>,
    pub reply: Option<ReplyLink>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Note {
    pub fn reply_to_id(&self) -> Option<&NoteId> {
        self.reply.as_ref().map(ReplyLink::target)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("note {0} not found")]
    NotFound(NoteId),
    #[error("note {note} replies to {target}, which no longer exists")]
    DanglingReply { note: NoteId, target: NoteId },
}

/// Ordered, in-memory collection of notes. Everything the board renders comes
/// from here.
#[derive(Debug, Clone, Default)]
pub struct NoteStore {
    notes: Vec<Note>,
    last_issued_ms: i64,
}

impl NoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_notes(notes: Vec<Note>) -> Self {
        let mut store = Self::new();
        store.replace_all(notes);
        store
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter()
    }

    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| &note.id == id)
    }

    pub fn get_mut(&mut self, id: &NoteId) -> Option<&mut Note> {
        self.notes.iter_mut().find(|note| &note.id == id)
    }

    pub fn position(&self, id: &NoteId) -> Option<usize> {
        self.notes.iter().position(|note| &note.id == id)
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.position(id).is_some()
    }

    /// Issues a creation-time id, strictly increasing across calls and never
    /// colliding with a note already in the store.
    pub fn next_id(&mut self, now: OffsetDateTime) -> NoteId {
        let now_ms = (now.unix_timestamp_nanos() / 1_000_000) as i64;
        let mut candidate = now_ms.max(self.last_issued_ms + 1);
        while self.contains(&NoteId::from_millis(candidate)) {
            candidate += 1;
        }
        self.last_issued_ms = candidate;
        NoteId::from_millis(candidate)
    }

    pub fn create(
        &mut self,
        text: &str,
        tags: Vec<String>,
        reply: Option<ReplyLink>,
        now: OffsetDateTime,
    ) -> &Note {
        let id = self.next_id(now);
        self.notes.push(Note {
            id,
            text: text.to_string(),
            tags,
            reply,
            created_at: now,
            updated_at: now,
        });
        let last = self.notes.len() - 1;
        &self.notes[last]
    }

    pub fn update(
        &mut self,
        id: &NoteId,
        text: &str,
        tags: Vec<String>,
        reply: Option<ReplyLink>,
        now: OffsetDateTime,
    ) -> Result<&Note, StoreError> {
        let note = self
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        note.text = text.to_string();
        note.tags = tags;
        note.reply = reply;
        note.updated_at = now;
        Ok(&*note)
    }

    /// Removes a note. Replies pointing at it keep their link.
    pub fn remove(&mut self, id: &NoteId) -> Option<Note> {
        let idx = self.position(id)?;
        Some(self.notes.remove(idx))
    }

    pub fn replace_all(&mut self, notes: Vec<Note>) {
        self.notes = notes;
        self.bump_issued_floor();
    }

    /// Puts an older page in front of the loaded notes, skipping ids already
    /// present. `notes` are in board order, oldest first.
    pub fn prepend_page(&mut self, notes: Vec<Note>) -> usize {
        let mut older: Vec<Note> = notes
            .into_iter()
            .filter(|note| !self.contains(&note.id))
            .collect();
        let added = older.len();
        older.append(&mut self.notes);
        self.notes = older;
        self.bump_issued_floor();
        added
    }

    pub fn follow_reply(&self, id: &NoteId) -> Result<Option<&Note>, StoreError> {
        let note = self.get(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let Some(target) = note.reply_to_id() else {
            return Ok(None);
        };
        self.get(target)
            .map(Some)
            .ok_or_else(|| StoreError::DanglingReply {
                note: id.clone(),
                target: target.clone(),
            })
    }

    pub fn reply_count(&self, id: &NoteId) -> usize {
        self.notes
            .iter()
            .filter(|note| note.reply_to_id() == Some(id))
            .count()
    }

    fn bump_issued_floor(&mut self) {
        let highest = self
            .notes
            .iter()
            .filter_map(|note| note.id.as_str().strip_prefix(ID_PREFIX))
            .filter_map(|millis| millis.parse::<i64>().ok())
            .max()
            .unwrap_or(0);
        self.last_issued_ms = self.last_issued_ms.max(highest);
    }
}
