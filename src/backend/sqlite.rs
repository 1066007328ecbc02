use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::config::DbConfig;
use rusqlite::{params, Connection, OptionalExtension};
use time::OffsetDateTime;

use super::{BackendError, Credentials, NoteBackend, NoteFilter};
use crate::compose::truncate_preview;
use crate::config::StorageOptions;
use crate::store::{Note, NoteId, ReplyLink};

mod schema;

/// Local single-user store. No login; every request is allowed.
#[derive(Clone)]
pub struct SqliteBackend {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl SqliteBackend {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    fn fetch_page(&self, filter: &NoteFilter) -> Result<Vec<Note>> {
        self.with_connection(|conn| {
            let cursor = filter.last_note_created_at.map(to_millis);
            let mut stmt = conn.prepare(
                "SELECT id, body, reply_to, reply_preview, created_at, updated_at
                 FROM notes
                 WHERE ?1 IS NULL OR created_at <= ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(
                    params![cursor, i64::from(filter.page_size), filter.offset() as i64],
                    |row| {
                        let reply_to: Option<String> = row.get(2)?;
                        let reply_preview: Option<String> = row.get(3)?;
                        Ok(NoteRow {
                            id: row.get(0)?,
                            body: row.get(1)?,
                            reply: reply_to.map(|target| {
                                ReplyLink::new(
                                    NoteId::new(target),
                                    reply_preview.unwrap_or_default(),
                                )
                            }),
                            created_at: row.get(4)?,
                            updated_at: row.get(5)?,
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut tag_stmt = conn.prepare(
                "SELECT t.name
                 FROM note_tags nt
                 JOIN tags t ON t.id = nt.tag_id
                 WHERE nt.note_id = ?1
                 ORDER BY nt.position ASC",
            )?;
            rows.into_iter()
                .map(|row| {
                    let tags = tag_stmt
                        .query_map([&row.id], |tag| tag.get::<_, String>(0))?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    row.into_note(tags)
                })
                .collect()
        })
    }

    fn insert(&self, note: &Note) -> Result<()> {
        self.with_connection(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO notes (id, body, reply_to, reply_preview, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    note.id.as_str(),
                    note.text,
                    note.reply.as_ref().map(|link| link.target().as_str()),
                    note.reply.as_ref().map(|link| link.preview()),
                    to_millis(note.created_at),
                    to_millis(note.updated_at),
                ],
            )
            .with_context(|| format!("inserting note {}", note.id))?;
            replace_tags(&tx, &note.id, &note.tags)?;
            tx.commit().context("committing note insert")?;
            Ok(())
        })
    }

    fn update(&self, note: &Note) -> Result<usize> {
        self.with_connection(|conn| {
            let tx = conn.unchecked_transaction()?;
            let affected = tx
                .execute(
                    "UPDATE notes
                     SET body = ?2, reply_to = ?3, reply_preview = ?4, updated_at = ?5
                     WHERE id = ?1",
                    params![
                        note.id.as_str(),
                        note.text,
                        note.reply.as_ref().map(|link| link.target().as_str()),
                        note.reply.as_ref().map(|link| link.preview()),
                        to_millis(note.updated_at),
                    ],
                )
                .with_context(|| format!("updating note {}", note.id))?;
            if affected > 0 {
                replace_tags(&tx, &note.id, &note.tags)?;
            }
            tx.commit().context("committing note update")?;
            Ok(affected)
        })
    }

    fn remove(&self, id: &NoteId) -> Result<usize> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM notes WHERE id = ?1", params![id.as_str()])
                .with_context(|| format!("deleting note {id}"))
        })
    }
}

impl NoteBackend for SqliteBackend {
    fn requires_auth(&self) -> bool {
        false
    }

    fn set_token(&mut self, _token: Option<String>) {}

    fn login(&mut self, _credentials: &Credentials) -> Result<String, BackendError> {
        Ok(String::new())
    }

    fn get_notes(&self, filter: &NoteFilter) -> Result<Vec<Note>, BackendError> {
        Ok(self.fetch_page(filter)?)
    }

    fn create_note(&self, note: &Note) -> Result<(), BackendError> {
        Ok(self.insert(note)?)
    }

    fn update_note(&self, note: &Note) -> Result<(), BackendError> {
        match self.update(note)? {
            0 => Err(BackendError::NotFound(note.id.clone())),
            _ => Ok(()),
        }
    }

    fn delete_note(&self, id: &NoteId) -> Result<(), BackendError> {
        match self.remove(id)? {
            0 => Err(BackendError::NotFound(id.clone())),
            _ => Ok(()),
        }
    }
}

struct NoteRow {
    id: String,
    body: String,
    reply: Option<ReplyLink>,
    created_at: i64,
    updated_at: i64,
}

impl NoteRow {
    fn into_note(self, tags: Vec<String>) -> Result<Note> {
        Ok(Note {
            id: NoteId::new(self.id),
            text: self.body,
            tags,
            reply: self.reply,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
        })
    }
}

fn replace_tags(conn: &Connection, note_id: &NoteId, tags: &[String]) -> Result<()> {
    conn.execute(
        "DELETE FROM note_tags WHERE note_id = ?1",
        params![note_id.as_str()],
    )
    .context("clearing note tags")?;
    for (position, tag) in tags.iter().enumerate() {
        let tag_id = match conn
            .query_row("SELECT id FROM tags WHERE name = ?1", params![tag], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?
        {
            Some(id) => id,
            None => {
                conn.execute("INSERT INTO tags (name) VALUES (?1)", params![tag])
                    .context("inserting tag")?;
                conn.last_insert_rowid()
            }
        };
        conn.execute(
            "INSERT OR IGNORE INTO note_tags (note_id, tag_id, position) VALUES (?1, ?2, ?3)",
            params![note_id.as_str(), tag_id, position as i64],
        )
        .context("linking tag to note")?;
    }
    Ok(())
}

fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_millis(millis: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .with_context(|| format!("timestamp {millis} out of range"))
}

pub fn init(storage: &StorageOptions) -> Result<SqliteBackend> {
    let db_path = &storage.database_path;
    let existed = db_path.exists();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    if !existed {
        seed_initial_notes(&conn)?;
    }
    Ok(SqliteBackend {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)
        .context("enabling foreign keys")?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}

fn seed_initial_notes(conn: &Connection) -> Result<()> {
    let existing: Option<String> = conn
        .query_row("SELECT id FROM notes LIMIT 1", [], |row| row.get(0))
        .optional()
        .context("checking for existing notes")?;
    if existing.is_some() {
        return Ok(());
    }

    tracing::info!("seeding first-run notes");
    let now = to_millis(OffsetDateTime::now_utc());
    let welcome = "Welcome to notewall. Press `a` to post a note, right click a note for Edit / Reply / Delete.";
    let hold = "Hold the mouse on a note to start selecting; drag to extend, `D` deletes the selection.";
    let welcome_id = format!("note-{now}");
    let reply_id = format!("note-{}", now + 1);

    conn.execute(
        "INSERT INTO notes (id, body, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![welcome_id, welcome, now],
    )
    .context("inserting seed note")?;
    conn.execute(
        "INSERT INTO notes (id, body, reply_to, reply_preview, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![reply_id, hold, welcome_id, truncate_preview(welcome), now + 1],
    )
    .context("inserting seed reply")?;
    replace_tags(conn, &NoteId::new(welcome_id), &["welcome".to_string()])?;

    Ok(())
}
