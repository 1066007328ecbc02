//! Compose dialog: the modal state machine and the editors it drives.

mod input;
mod modal;
mod reply;
mod tags;

pub use input::TextInput;
pub use modal::{
    CloseOutcome, Commit, ComposeError, ComposeField, ComposeMode, Composer, Draft, ModalPrompt,
    ModalState,
};
pub use reply::{truncate_preview, ReplyTracker, PREVIEW_BUDGET};
pub use tags::{is_valid_tag, TagCommit, TagEditor, TagError};
