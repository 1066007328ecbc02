use anyhow::Context;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::{BackendError, Credentials, NoteBackend, NoteFilter};
use crate::store::{Note, NoteId, ReplyLink};

/// Client for the notes REST service.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteDto {
    id: String,
    text: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reply_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reply_preview: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl From<&Note> for NoteDto {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id.to_string(),
            text: note.text.clone(),
            tags: note.tags.clone(),
            reply_to_id: note.reply.as_ref().map(|link| link.target().to_string()),
            reply_preview: note.reply.as_ref().map(|link| link.preview().to_string()),
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

impl From<NoteDto> for Note {
    fn from(dto: NoteDto) -> Self {
        Note {
            id: NoteId::new(dto.id),
            text: dto.text,
            tags: dto.tags,
            reply: dto
                .reply_to_id
                .map(|target| ReplyLink::new(NoteId::new(target), dto.reply_preview.unwrap_or_default())),
            created_at: dto.created_at,
            updated_at: dto.updated_at,
        }
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(alias = "title", alias = "message")]
    error: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("notewall/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = self.authorized(request).send()?;
        check_status(response)
    }
}

fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(BackendError::Unauthorized);
    }
    let body = response
        .text()
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(BackendError::Status {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|parsed| parsed.error)
        .unwrap_or_else(|_| body.trim().to_string())
}

fn filter_query(filter: &NoteFilter) -> Result<Vec<(&'static str, String)>, BackendError> {
    let cursor = filter
        .last_note_created_at
        .unwrap_or_else(OffsetDateTime::now_utc)
        .format(&Rfc3339)
        .context("formatting page cursor")?;
    Ok(vec![
        ("lastNoteCreatedAt", cursor),
        ("page", filter.page.to_string()),
        ("pageSize", filter.page_size.to_string()),
    ])
}

impl NoteBackend for HttpBackend {
    fn requires_auth(&self) -> bool {
        true
    }

    fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn login(&mut self, credentials: &Credentials) -> Result<String, BackendError> {
        let response = self.send(self.client.post(self.url("Users/login")).json(credentials))?;
        let body: LoginResponse = response.json()?;
        self.token = Some(body.token.clone());
        tracing::info!(user = %credentials.username, "signed in");
        Ok(body.token)
    }

    fn get_notes(&self, filter: &NoteFilter) -> Result<Vec<Note>, BackendError> {
        let query = filter_query(filter)?;
        let response = self.send(self.client.get(self.url("Notes/filter")).query(&query))?;
        let notes: Vec<NoteDto> = response.json()?;
        tracing::debug!(page = filter.page, count = notes.len(), "fetched notes page");
        Ok(notes.into_iter().map(Note::from).collect())
    }

    fn create_note(&self, note: &Note) -> Result<(), BackendError> {
        self.send(self.client.post(self.url("Notes")).json(&NoteDto::from(note)))?;
        Ok(())
    }

    fn update_note(&self, note: &Note) -> Result<(), BackendError> {
        let url = self.url(&format!("Notes/{}", note.id));
        match self.send(self.client.put(url).json(&NoteDto::from(note))) {
            Err(BackendError::Status { status: 404, .. }) => Err(BackendError::NotFound(note.id.clone())),
            other => other.map(|_| ()),
        }
    }

    fn delete_note(&self, id: &NoteId) -> Result<(), BackendError> {
        let url = self.url(&format!("Notes/{id}"));
        match self.send(self.client.delete(url)) {
            Err(BackendError::Status { status: 404, .. }) => Err(BackendError::NotFound(id.clone())),
            other => other.map(|_| ()),
        }
    }
}
