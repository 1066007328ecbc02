//! Persistence collaborators. The board talks to either a local SQLite file or
//! the notes REST service through the same [`NoteBackend`] trait.

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::{AppConfig, BackendKind};
use crate::store::{Note, NoteId};

pub mod http;
pub mod sqlite;

pub use http::HttpBackend;
pub use sqlite::SqliteBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("not signed in or session expired")]
    Unauthorized,
    #[error("note {0} not found on backend")]
    NotFound(NoteId),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl BackendError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BackendError::Unauthorized)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Page request. Notes come back newest first; the cursor pins the snapshot so
/// notes created after the first page do not shift later pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFilter {
    pub last_note_created_at: Option<OffsetDateTime>,
    pub page: u32,
    pub page_size: u32,
}

impl NoteFilter {
    pub fn first_page(page_size: u32, now: OffsetDateTime) -> Self {
        Self {
            last_note_created_at: Some(now),
            page: 1,
            page_size,
        }
    }

    pub fn next_page(&self) -> Self {
        Self {
            page: self.page + 1,
            ..self.clone()
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

pub trait NoteBackend {
    /// Whether requests need a bearer token from [`NoteBackend::login`].
    fn requires_auth(&self) -> bool;
    fn set_token(&mut self, token: Option<String>);
    fn login(&mut self, credentials: &Credentials) -> Result<String, BackendError>;
    fn get_notes(&self, filter: &NoteFilter) -> Result<Vec<Note>, BackendError>;
    fn create_note(&self, note: &Note) -> Result<(), BackendError>;
    fn update_note(&self, note: &Note) -> Result<(), BackendError>;
    fn delete_note(&self, id: &NoteId) -> Result<(), BackendError>;
}

/// Builds the backend named in the config.
pub fn connect(config: &AppConfig) -> anyhow::Result<Box<dyn NoteBackend>> {
    match config.backend.kind {
        BackendKind::Local => {
            let backend = sqlite::init(&config.storage)?;
            Ok(Box::new(backend))
        }
        BackendKind::Http => {
            let backend = HttpBackend::new(&config.backend.base_url)?;
            Ok(Box::new(backend))
        }
    }
}
