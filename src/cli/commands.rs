use std::fmt::Write as _;
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Args;
use time::format_description::well_known::Rfc3339;

use crate::app::{ActionDispatcher, App, AppState, DraftInput, UiEvent};
use crate::backend::{self, BackendError, Credentials, NoteBackend};
use crate::compose::{is_valid_tag, TagError};
use crate::config::AppConfig;
use crate::session::SessionStore;
use crate::store::{Note, NoteId, NoteStore};

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Note text. If omitted, reads from stdin or prompts.
    #[arg()]
    pub text: Option<String>,
    /// Tag to attach (repeatable; letters and digits only)
    #[arg(long = "tag", short = 't')]
    pub tags: Vec<String>,
    /// Post as a reply to this note id
    #[arg(long)]
    pub reply_to: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Number of pages to fetch
    #[arg(long, default_value_t = 1)]
    pub pages: u32,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Id of the note to delete
    #[arg()]
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Account name (prompted if omitted)
    #[arg(long)]
    pub username: Option<String>,
}

pub fn run_tui(config: Arc<AppConfig>, session: SessionStore) -> Result<()> {
    let backend = backend::connect(&config)?;
    let mut app = App::new(config, backend, session)?;
    app.run()
}

pub fn new_note(config: &AppConfig, session: &SessionStore, args: NewArgs) -> Result<()> {
    let text = match args.text {
        Some(text) => text,
        None => match read_stdin()? {
            Some(text) => text,
            None => prompt("Text")?,
        },
    };
    if let Some(bad) = args.tags.iter().find(|tag| !is_valid_tag(tag.trim())) {
        return Err(TagError::Invalid(bad.clone()).into());
    }

    let mut backend = open_backend(config, session)?;
    let mut dispatcher =
        ActionDispatcher::new(backend.as_mut(), session, config.backend.page_size);
    let mut state = AppState::new(config.interaction.selection_settings());
    dispatcher
        .load_first_page(&mut state)
        .context("loading notes")?;

    let now = Instant::now();
    match &args.reply_to {
        Some(raw) => {
            let target = NoteId::from(raw.as_str());
            while !state.store().contains(&target) && !state.paging.exhausted {
                dispatcher.load_more(&mut state).context("searching for reply target")?;
            }
            if !state.store().contains(&target) {
                bail!("note {target} not found");
            }
            state.dispatch(UiEvent::OpenReply(target), now);
        }
        None => {
            state.dispatch(UiEvent::OpenCreate, now);
        }
    }

    for ch in text.trim_end_matches('\n').chars() {
        let input = match ch {
            '\n' => DraftInput::Newline,
            ch => DraftInput::Char(ch),
        };
        state.dispatch(UiEvent::Draft(input), now);
    }
    state.dispatch(UiEvent::Draft(DraftInput::SwitchField), now);
    for tag in &args.tags {
        for ch in tag.trim().chars() {
            state.dispatch(UiEvent::Draft(DraftInput::Char(ch)), now);
        }
        state.dispatch(UiEvent::Draft(DraftInput::ConfirmTag), now);
    }

    let effects = state.dispatch(UiEvent::Submit, now);
    if state.composer().is_open() {
        bail!("note text cannot be empty");
    }
    let report = dispatcher.apply(effects);
    if report.signed_out {
        bail!("session expired; run `notewall login` again");
    }
    if report.failed > 0 {
        bail!("the backend rejected the new note");
    }

    if let Some(note) = state.focused() {
        println!("Posted {}", note.id);
    }
    Ok(())
}

pub fn list_notes(config: &AppConfig, session: &SessionStore, args: ListArgs) -> Result<()> {
    let mut backend = open_backend(config, session)?;
    let mut dispatcher =
        ActionDispatcher::new(backend.as_mut(), session, config.backend.page_size);
    let mut state = AppState::new(config.interaction.selection_settings());
    dispatcher
        .load_first_page(&mut state)
        .context("loading notes")?;
    for _ in 1..args.pages.max(1) {
        if dispatcher.load_more(&mut state).context("loading more notes")? == 0 {
            break;
        }
    }
    print!("{}", format_notes(state.store()));
    if !state.paging.exhausted {
        println!("(more notes available: pass --pages {})", args.pages.max(1) + 1);
    }
    Ok(())
}

pub fn delete_note(config: &AppConfig, session: &SessionStore, args: DeleteArgs) -> Result<()> {
    let backend = open_backend(config, session)?;
    let id = NoteId::from(args.id.trim());
    match backend.delete_note(&id) {
        Ok(()) => {
            println!("Deleted {id}");
            Ok(())
        }
        Err(BackendError::NotFound(id)) => bail!("note {id} not found"),
        Err(err) => Err(err).context("deleting note"),
    }
}

pub fn login(config: &AppConfig, session: &SessionStore, args: LoginArgs) -> Result<()> {
    let mut backend = backend::connect(config)?;
    if !backend.requires_auth() {
        println!("The local board needs no sign in.");
        return Ok(());
    }
    let username = match args.username {
        Some(name) => name,
        None => prompt("Username")?,
    };
    let password = prompt("Password")?;
    let credentials = Credentials {
        username: username.trim().to_string(),
        password,
    };
    if credentials.username.is_empty() || credentials.password.is_empty() {
        bail!("username and password are required");
    }
    ActionDispatcher::new(backend.as_mut(), session, config.backend.page_size)
        .login(&credentials)
        .context("signing in")?;
    println!("Signed in as {}", credentials.username);
    Ok(())
}

pub fn logout(session: &SessionStore) -> Result<()> {
    session.clear()?;
    println!("Signed out");
    Ok(())
}

fn open_backend(config: &AppConfig, session: &SessionStore) -> Result<Box<dyn NoteBackend>> {
    let mut backend = backend::connect(config)?;
    if backend.requires_auth() {
        let Some(token) = session.load()? else {
            bail!("not signed in; run `notewall login` first");
        };
        backend.set_token(Some(token));
    }
    Ok(backend)
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

fn format_notes(store: &NoteStore) -> String {
    if store.is_empty() {
        return "No notes yet.\n".to_string();
    }
    let mut out = String::new();
    for note in store.iter() {
        let _ = writeln!(&mut out, "{}", headline(store, note));
        for line in note.text.lines() {
            let _ = writeln!(&mut out, "    {line}");
        }
        if !note.tags.is_empty() {
            let _ = writeln!(&mut out, "    tags    {}", format_tags(&note.tags));
        }
        out.push('\n');
    }
    out
}

fn headline(store: &NoteStore, note: &Note) -> String {
    let created = note
        .created_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| note.created_at.unix_timestamp().to_string());
    let mut line = format!("{}  {created}", note.id);
    if let Some(link) = &note.reply {
        let _ = write!(&mut line, "  re {}", link.target());
        if !store.contains(link.target()) {
            line.push_str(" (deleted)");
        }
    }
    let replies = store.reply_count(&note.id);
    if replies > 0 {
        let _ = write!(&mut line, "  [{replies} repl{}]", if replies == 1 { "y" } else { "ies" });
    }
    line
}

fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("#{}", tag))
        .collect::<Vec<_>>()
        .join(" ")
}
