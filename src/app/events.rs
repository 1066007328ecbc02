use crate::interaction::{Area, MenuAction, Point};
use crate::store::{Note, NoteId};

/// What sits under the pointer, as resolved by the front end's hit test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerTarget {
    Note(NoteId),
    /// Inside the compose dialog.
    Modal,
    /// Outside the compose dialog while it is open.
    Backdrop,
    Empty,
}

impl PointerTarget {
    pub fn note(&self) -> Option<NoteId> {
        match self {
            PointerTarget::Note(id) => Some(id.clone()),
            _ => None,
        }
    }
}

/// Keystroke-level edits routed into the open draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftInput {
    Char(char),
    Newline,
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    SwitchField,
    ConfirmTag,
    ChipLeft,
    ChipRight,
    EditChip,
    RemoveChip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    PointerDown { target: PointerTarget, at: Point },
    PointerMove { target: PointerTarget, at: Point },
    PointerUp { at: Point },
    PointerLost,
    ContextMenuRequested { note: NoteId, at: Point, viewport: Area },
    MenuChoose(MenuAction),
    MenuChooseHighlighted,
    MenuMove(isize),
    MenuDismiss,
    OpenCreate,
    OpenEdit(NoteId),
    OpenReply(NoteId),
    Draft(DraftInput),
    Submit,
    RequestClose,
    ConfirmDiscard,
    CancelDiscard,
    RequestRemoveReply,
    ConfirmRemoveReply,
    CancelRemoveReply,
    EnterSelection(NoteId),
    ToggleSelected(NoteId),
    CancelSelection,
    DeleteSelected,
    DeleteNote(NoteId),
    FollowReply(NoteId),
    Focus(isize),
    Tick,
}

/// Persistence command produced by a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Create(Note),
    Update(Note),
    Delete(NoteId),
}

impl Effect {
    pub fn label(&self) -> &'static str {
        match self {
            Effect::Create(_) => "create",
            Effect::Update(_) => "update",
            Effect::Delete(_) => "delete",
        }
    }
}
