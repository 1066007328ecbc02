use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use strum::IntoEnumIterator;

use crate::backend::NoteBackend;
use crate::compose::{ComposeField, ModalPrompt};
use crate::config::AppConfig;
use crate::interaction::{MenuAction, Point};
use crate::session::SessionStore;
use crate::ui::{self, ScreenLayout};

mod actions;
pub mod events;
pub mod state;

pub use actions::{ActionDispatcher, SyncReport};
pub use events::{DraftInput, Effect, PointerTarget, UiEvent};
pub use state::{AppState, LoginField, LoginForm, PageCursor, View};

enum Command {
    Quit,
    Dispatch(UiEvent),
    LoadMore,
    Refresh,
    SignOut,
}

pub struct App {
    pub config: Arc<AppConfig>,
    backend: Box<dyn NoteBackend>,
    session: SessionStore,
    state: AppState,
    layout: ScreenLayout,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(
        config: Arc<AppConfig>,
        mut backend: Box<dyn NoteBackend>,
        session: SessionStore,
    ) -> Result<Self> {
        let state = AppState::new(config.interaction.selection_settings());
        let signed_in = if backend.requires_auth() {
            let token = session.load().context("loading saved session")?;
            let present = token.is_some();
            backend.set_token(token);
            present
        } else {
            true
        };

        let tick_rate = config.interaction.tick_rate();
        let mut app = Self {
            config,
            backend,
            session,
            state,
            layout: ScreenLayout::default(),
            should_quit: false,
            tick_rate,
        };
        if signed_in {
            app.load_first_page();
        } else {
            app.state.show_login(None);
        }
        Ok(app)
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn dispatcher(&mut self) -> ActionDispatcher<'_> {
        let page_size = self.config.backend.page_size;
        ActionDispatcher::new(self.backend.as_mut(), &self.session, page_size)
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            let state = &self.state;
            let mut layout = ScreenLayout::default();
            terminal
                .draw(|frame| layout = ui::draw_app(frame, state))
                .context("rendering frame")?;
            self.layout = layout;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    Event::FocusLost => self.dispatch(UiEvent::PointerLost),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.dispatch(UiEvent::Tick);
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, event: UiEvent) {
        let effects = self.state.dispatch(event, Instant::now());
        if effects.is_empty() {
            return;
        }
        let refresh = self.config.sync.refresh_after_write;
        let page_size = self.config.backend.page_size;
        ActionDispatcher::new(self.backend.as_mut(), &self.session, page_size).sync(
            &mut self.state,
            effects,
            refresh,
        );
    }

    fn run_command(&mut self, command: Command) {
        match command {
            Command::Quit => self.should_quit = true,
            Command::Dispatch(event) => self.dispatch(event),
            Command::LoadMore => self.load_more(),
            Command::Refresh => {
                let page_size = self.config.backend.page_size;
                let mut dispatcher =
                    ActionDispatcher::new(self.backend.as_mut(), &self.session, page_size);
                match dispatcher.refresh(&mut self.state) {
                    Ok(()) => self.state.set_status_message(Some("Refreshed")),
                    Err(err) => dispatcher.report_load_error(&mut self.state, &err, "refresh"),
                }
            }
            Command::SignOut => {
                if !self.backend.requires_auth() {
                    self.state
                        .set_status_message(Some("The local board has no account to sign out of"));
                    return;
                }
                self.dispatcher().sign_out();
                self.state.show_login(None);
            }
        }
    }

    fn load_first_page(&mut self) {
        let page_size = self.config.backend.page_size;
        let mut dispatcher = ActionDispatcher::new(self.backend.as_mut(), &self.session, page_size);
        if let Err(err) = dispatcher.load_first_page(&mut self.state) {
            dispatcher.report_load_error(&mut self.state, &err, "initial load");
        }
    }

    fn load_more(&mut self) {
        if self.state.paging.exhausted {
            self.state.set_status_message(Some("No older notes to load"));
            return;
        }
        let page_size = self.config.backend.page_size;
        let mut dispatcher = ActionDispatcher::new(self.backend.as_mut(), &self.session, page_size);
        match dispatcher.load_more(&mut self.state) {
            Ok(0) => self.state.set_status_message(Some("No older notes to load")),
            Ok(count) => self
                .state
                .set_status_message(Some(format!("Loaded {count} more note(s)"))),
            Err(err) => dispatcher.report_load_error(&mut self.state, &err, "load more"),
        }
    }

    fn hit_test(&self, at: Point) -> PointerTarget {
        if self.state.composer().is_open() {
            return if self.layout.in_modal(at) {
                PointerTarget::Modal
            } else {
                PointerTarget::Backdrop
            };
        }
        match self.layout.note_at(at) {
            Some(id) => PointerTarget::Note(id.clone()),
            None => PointerTarget::Empty,
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let at = Point::new(mouse.column, mouse.row);
        let event = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => UiEvent::PointerDown {
                target: self.hit_test(at),
                at,
            },
            MouseEventKind::Drag(MouseButton::Left) => UiEvent::PointerMove {
                target: self.hit_test(at),
                at,
            },
            MouseEventKind::Up(MouseButton::Left) => UiEvent::PointerUp { at },
            MouseEventKind::Down(MouseButton::Right) => match self.hit_test(at) {
                PointerTarget::Note(note) => UiEvent::ContextMenuRequested {
                    note,
                    at,
                    viewport: self.layout.viewport,
                },
                _ => return,
            },
            MouseEventKind::ScrollDown => UiEvent::Focus(1),
            MouseEventKind::ScrollUp => UiEvent::Focus(-1),
            _ => return,
        };
        self.dispatch(event);
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        let command = if matches!(self.state.view(), View::Login(_)) {
            self.handle_login_key(key);
            None
        } else if let Some(prompt) = self.state.modal_prompt() {
            prompt_key(prompt, key).map(Command::Dispatch)
        } else if let Some(draft) = self.state.composer().draft() {
            compose_key(draft.field, draft.tags.input().is_empty(), key).map(Command::Dispatch)
        } else if self.state.menu().is_visible() {
            menu_key(key).map(Command::Dispatch)
        } else {
            self.board_key(key)
        };

        if let Some(command) = command {
            self.run_command(command);
        }
    }

    fn board_key(&self, key: KeyEvent) -> Option<Command> {
        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let focused = self.state.focused_id();
        let selecting = self.state.selection().is_active();
        let on_focused = |make: fn(crate::store::NoteId) -> UiEvent| {
            focused.clone().map(|id| Command::Dispatch(make(id)))
        };

        match key.code {
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Command::Refresh)
            }
            KeyCode::Char('o') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Command::SignOut)
            }
            _ if !plain => None,
            KeyCode::Char('q') => Some(Command::Quit),
            KeyCode::Char('j') | KeyCode::Down => Some(Command::Dispatch(UiEvent::Focus(1))),
            KeyCode::Char('k') | KeyCode::Up => Some(Command::Dispatch(UiEvent::Focus(-1))),
            KeyCode::Char('a') => Some(Command::Dispatch(UiEvent::OpenCreate)),
            KeyCode::Char('e') => on_focused(UiEvent::OpenEdit),
            KeyCode::Char('r') => on_focused(UiEvent::OpenReply),
            KeyCode::Char('d') => on_focused(UiEvent::DeleteNote),
            KeyCode::Char('g') => on_focused(UiEvent::FollowReply),
            KeyCode::Char('v') if !selecting => on_focused(UiEvent::EnterSelection),
            KeyCode::Char(' ') if selecting => on_focused(UiEvent::ToggleSelected),
            KeyCode::Char('D') => Some(Command::Dispatch(UiEvent::DeleteSelected)),
            KeyCode::Esc if selecting => Some(Command::Dispatch(UiEvent::CancelSelection)),
            KeyCode::Char('L') => Some(Command::LoadMore),
            KeyCode::Char('m') => {
                let id = focused.clone()?;
                let at = self
                    .layout
                    .notes
                    .iter()
                    .find(|(note, _)| *note == id)
                    .map(|(_, area)| Point::new(area.x + 2, area.y + 1))
                    .unwrap_or_default();
                Some(Command::Dispatch(UiEvent::ContextMenuRequested {
                    note: id,
                    at,
                    viewport: self.layout.viewport,
                }))
            }
            _ => None,
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent) {
        let Some(form) = self.state.login_form_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::BackTab => form.switch_field(),
            KeyCode::Backspace => form.pop_char(),
            KeyCode::Enter => self.submit_login(),
            KeyCode::Char(ch)
                if !key.modifiers.intersects(
                    KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
                ) =>
            {
                form.push_char(ch)
            }
            _ => {}
        }
    }

    fn submit_login(&mut self) {
        let Some(credentials) = self.state.login_form_mut().and_then(|form| form.credentials())
        else {
            if let Some(form) = self.state.login_form_mut() {
                form.error = Some("Enter a username and password".to_string());
            }
            return;
        };
        let result = self.dispatcher().login(&credentials);
        match result {
            Ok(()) => {
                self.state.show_notes();
                self.state
                    .set_status_message(Some(format!("Signed in as {}", credentials.username)));
                self.load_first_page();
            }
            Err(err) => {
                tracing::warn!(?err, user = %credentials.username, "sign in failed");
                let message = if err.is_unauthorized() {
                    "Wrong username or password".to_string()
                } else {
                    format!("Sign in failed: {err}")
                };
                if let Some(form) = self.state.login_form_mut() {
                    form.password.clear();
                    form.error = Some(message);
                }
            }
        }
    }
}

fn prompt_key(prompt: ModalPrompt, key: KeyEvent) -> Option<UiEvent> {
    match (prompt, key.code) {
        (ModalPrompt::ConfirmDiscard, KeyCode::Char('d') | KeyCode::Enter) => {
            Some(UiEvent::ConfirmDiscard)
        }
        (ModalPrompt::ConfirmDiscard, KeyCode::Char('c') | KeyCode::Esc) => {
            Some(UiEvent::CancelDiscard)
        }
        (ModalPrompt::ConfirmRemoveReply, KeyCode::Char('y') | KeyCode::Enter) => {
            Some(UiEvent::ConfirmRemoveReply)
        }
        (ModalPrompt::ConfirmRemoveReply, KeyCode::Char('n') | KeyCode::Esc) => {
            Some(UiEvent::CancelRemoveReply)
        }
        _ => None,
    }
}

fn compose_key(field: ComposeField, tag_input_empty: bool, key: KeyEvent) -> Option<UiEvent> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let input = match (field, key.code) {
        (_, KeyCode::Esc) => return Some(UiEvent::RequestClose),
        (_, KeyCode::Char('s')) if ctrl => return Some(UiEvent::Submit),
        (_, KeyCode::Char('r')) if ctrl => return Some(UiEvent::RequestRemoveReply),
        (_, KeyCode::Tab | KeyCode::BackTab) => DraftInput::SwitchField,
        (_, KeyCode::Char(_))
            if key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER) =>
        {
            return None
        }
        (_, KeyCode::Char(ch)) => DraftInput::Char(ch),
        (ComposeField::Text, KeyCode::Enter) => DraftInput::Newline,
        (ComposeField::Text, KeyCode::Backspace) => DraftInput::Backspace,
        (ComposeField::Text, KeyCode::Delete) => DraftInput::Delete,
        (ComposeField::Text, KeyCode::Left) => DraftInput::Left,
        (ComposeField::Text, KeyCode::Right) => DraftInput::Right,
        (ComposeField::Text, KeyCode::Home) => DraftInput::Home,
        (ComposeField::Text, KeyCode::End) => DraftInput::End,
        (ComposeField::Tags, KeyCode::Enter) if tag_input_empty => DraftInput::EditChip,
        (ComposeField::Tags, KeyCode::Enter) => DraftInput::ConfirmTag,
        (ComposeField::Tags, KeyCode::Backspace) => DraftInput::Backspace,
        (ComposeField::Tags, KeyCode::Delete) => DraftInput::RemoveChip,
        (ComposeField::Tags, KeyCode::Left) => DraftInput::ChipLeft,
        (ComposeField::Tags, KeyCode::Right) => DraftInput::ChipRight,
        _ => return None,
    };
    Some(UiEvent::Draft(input))
}

fn menu_key(key: KeyEvent) -> Option<UiEvent> {
    match key.code {
        KeyCode::Esc => Some(UiEvent::MenuDismiss),
        KeyCode::Enter => Some(UiEvent::MenuChooseHighlighted),
        KeyCode::Char('j') | KeyCode::Down => Some(UiEvent::MenuMove(1)),
        KeyCode::Char('k') | KeyCode::Up => Some(UiEvent::MenuMove(-1)),
        KeyCode::Char(ch) => MenuAction::iter()
            .find(|action| action.hotkey() == ch)
            .map(UiEvent::MenuChoose),
        _ => None,
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableFocusChange
    )
    .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableFocusChange
    )
    .context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    #[test]
    fn compose_keys_depend_on_active_field() {
        assert_eq!(
            compose_key(ComposeField::Text, true, press(KeyCode::Enter)),
            Some(UiEvent::Draft(DraftInput::Newline))
        );
        assert_eq!(
            compose_key(ComposeField::Tags, false, press(KeyCode::Enter)),
            Some(UiEvent::Draft(DraftInput::ConfirmTag))
        );
        assert_eq!(
            compose_key(ComposeField::Tags, true, press(KeyCode::Enter)),
            Some(UiEvent::Draft(DraftInput::EditChip))
        );
        assert_eq!(
            compose_key(ComposeField::Tags, true, press(KeyCode::Left)),
            Some(UiEvent::Draft(DraftInput::ChipLeft))
        );
        assert_eq!(compose_key(ComposeField::Text, true, ctrl('s')), Some(UiEvent::Submit));
        assert_eq!(compose_key(ComposeField::Text, true, ctrl('x')), None);
    }

    #[test]
    fn prompt_keys_only_answer_their_prompt() {
        assert_eq!(
            prompt_key(ModalPrompt::ConfirmDiscard, press(KeyCode::Char('d'))),
            Some(UiEvent::ConfirmDiscard)
        );
        assert_eq!(prompt_key(ModalPrompt::ConfirmRemoveReply, press(KeyCode::Char('d'))), None);
        assert_eq!(
            prompt_key(ModalPrompt::ConfirmRemoveReply, press(KeyCode::Esc)),
            Some(UiEvent::CancelRemoveReply)
        );
    }

    #[test]
    fn menu_hotkeys_choose_actions() {
        assert_eq!(
            menu_key(press(KeyCode::Char('r'))),
            Some(UiEvent::MenuChoose(MenuAction::Reply))
        );
        assert_eq!(menu_key(press(KeyCode::Char('z'))), None);
        assert_eq!(menu_key(press(KeyCode::Down)), Some(UiEvent::MenuMove(1)));
    }
}
