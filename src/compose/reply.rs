use crate::store::{Note, NoteId, ReplyLink};

/// Character budget for reply previews, both when captured and when rendered.
pub const PREVIEW_BUDGET: usize = 100;
const ELLIPSIS: &str = "...";

/// Keeps the first [`PREVIEW_BUDGET`] characters, appending `...` when text was cut.
pub fn truncate_preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_BUDGET).collect();
    if chars.next().is_some() {
        format!("{head}{ELLIPSIS}")
    } else {
        head
    }
}

/// Reply target of the draft being composed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyTracker {
    current: Option<ReplyLink>,
}

impl ReplyTracker {
    pub fn capture(&mut self, note: &Note) {
        self.current = Some(ReplyLink::new(note.id.clone(), truncate_preview(&note.text)));
    }

    /// Restores the tracker from a stored link. Returns false when the href
    /// does not carry a usable id.
    pub fn rehydrate(&mut self, link: &ReplyLink) -> bool {
        match ReplyLink::parse(&link.href()) {
            Some(target) => {
                self.current = Some(ReplyLink::new(target, link.preview()));
                true
            }
            None => {
                self.current = None;
                false
            }
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn target(&self) -> Option<&NoteId> {
        self.current.as_ref().map(ReplyLink::target)
    }

    pub fn preview(&self) -> Option<&str> {
        self.current.as_ref().map(ReplyLink::preview)
    }

    pub fn link(&self) -> Option<ReplyLink> {
        self.current.clone()
    }

    pub fn tracks(&self, id: &NoteId) -> bool {
        self.target() == Some(id)
    }
}
