use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;
use strum::IntoEnumIterator;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::state::{AppState, LoginField, LoginForm, View};
use crate::compose::{ComposeField, ComposeMode, Draft, ModalPrompt, TextInput};
use crate::interaction::{Area, MenuAction, Point};
use crate::store::NoteId;

mod note_view;

pub use note_view::{card_height, layout_cards, CardState};

/// Where things landed on the last frame, for mapping mouse events back onto
/// notes and the compose dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenLayout {
    pub notes: Vec<(NoteId, Area)>,
    pub modal: Option<Area>,
    pub viewport: Area,
}

impl ScreenLayout {
    pub fn note_at(&self, at: Point) -> Option<&NoteId> {
        self.notes
            .iter()
            .find(|(_, area)| area.contains(at))
            .map(|(id, _)| id)
    }

    pub fn in_modal(&self, at: Point) -> bool {
        self.modal.is_some_and(|area| area.contains(at))
    }
}

pub fn draw_app(frame: &mut Frame, state: &AppState) -> ScreenLayout {
    let size = frame.size();
    let mut layout = ScreenLayout {
        viewport: size.into(),
        ..ScreenLayout::default()
    };

    if let View::Login(form) = state.view() {
        draw_login(frame, form);
        return layout;
    }

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(size);

    frame.render_widget(Paragraph::new(build_header(state)), vertical[0]);

    let board = vertical[1];
    if state.store().is_empty() {
        let empty = Paragraph::new(Line::from(Span::styled(
            "No notes yet. Press 'a' to post one.",
            Style::default().fg(Color::DarkGray),
        )));
        frame.render_widget(empty, board);
    }
    for (id, area) in layout_cards(state.store().notes(), state.focus_index(), board) {
        if let Some(note) = state.store().get(&id) {
            let card = CardState {
                focused: state.focused().is_some_and(|focused| focused.id == id),
                selected: state.selection().is_selected(&id),
            };
            note_view::render_card(frame, state.store(), note, area, card);
        }
        layout.notes.push((id, area.into()));
    }

    frame.render_widget(Paragraph::new(build_status_line(state)), vertical[2]);

    if let Some(bounds) = state.menu().bounds() {
        draw_context_menu(frame, bounds.into(), state.menu().highlighted());
    }

    if let Some(draft) = state.composer().draft() {
        let area = centered_rect(70, 60, size);
        draw_compose(frame, draft, area);
        layout.modal = Some(area.into());
        match draft.prompt() {
            Some(ModalPrompt::ConfirmDiscard) => draw_prompt(
                frame,
                "Discard changes?",
                "Your draft has unsaved changes.",
                "d / Enter discard • c / Esc keep editing",
                Color::Red,
            ),
            Some(ModalPrompt::ConfirmRemoveReply) => draw_prompt(
                frame,
                "Remove reply link?",
                "The note will no longer point at the one it answers.",
                "y / Enter remove • n / Esc keep",
                Color::Yellow,
            ),
            None => {}
        }
    }

    layout
}

fn build_header(state: &AppState) -> Line<'static> {
    let selection = state.selection();
    if selection.is_active() {
        return Line::from(vec![
            Span::styled(
                format!(" Selecting: {} selected ", selection.len()),
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                " D delete • Esc cancel",
                Style::default().fg(Color::Yellow),
            ),
        ]);
    }
    let mut spans = vec![Span::styled(
        " Notewall ",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    spans.push(Span::raw(format!("{} note(s)", state.store().len())));
    if state.paging.exhausted {
        spans.push(Span::styled(" | all loaded", Style::default().fg(Color::DarkGray)));
    }
    Line::from(spans)
}

fn build_status_line(state: &AppState) -> Text<'static> {
    let mut spans = Vec::new();
    match state.focus_index() {
        Some(idx) => spans.push(Span::raw(format!("{}/{}", idx + 1, state.store().len()))),
        None => spans.push(Span::raw("0/0")),
    }
    if let Some(message) = state.status_message() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(message.to_string(), Style::default().fg(Color::Cyan)));
    }

    let hints = if state.selection().is_active() {
        "click/drag toggle • space toggle • D delete • Esc cancel"
    } else {
        "j/k move • a add • e edit • r reply • d delete • m menu • v select • g go to parent • L more • q quit"
    };
    Text::from(vec![
        Line::from(spans),
        Line::from(vec![
            Span::styled(
                "Keys: ",
                Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
            ),
            Span::styled(hints, Style::default().fg(Color::DarkGray)),
        ]),
    ])
}

fn draw_context_menu(frame: &mut Frame, area: Rect, highlighted: MenuAction) {
    let area = area.intersection(frame.size());
    frame.render_widget(Clear, area);
    let lines: Vec<Line> = MenuAction::iter()
        .map(|action| {
            let style = if action == highlighted {
                Style::default().add_modifier(Modifier::REVERSED)
            } else if action == MenuAction::Delete {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            Line::from(Span::styled(
                format!("{} {}", action.hotkey(), action.label()),
                style,
            ))
        })
        .collect();
    let menu = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(menu, area);
}

fn draw_compose(frame: &mut Frame, draft: &Draft, area: Rect) {
    frame.render_widget(Clear, area);
    let mode = draft.mode();
    let title = match mode {
        ComposeMode::Edit(_) if draft.has_unsaved_changes() => format!("{} *", mode.title()),
        _ => mode.title().to_string(),
    };
    let outer = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = outer.inner(area);
    frame.render_widget(outer, area);

    let reply_rows = if draft.reply.is_active() { 1 } else { 0 };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(reply_rows),
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(inner);

    if let Some(preview) = draft.reply.preview() {
        let banner = Paragraph::new(Line::from(vec![
            Span::styled("Replying to: ", Style::default().fg(Color::Magenta)),
            Span::styled(
                preview.to_string(),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            ),
        ]));
        frame.render_widget(banner, rows[0]);
    }

    let text_active = draft.field == ComposeField::Text;
    let text_box = Paragraph::new(draft.text.as_str().to_string())
        .block(field_block("Text", text_active))
        .wrap(Wrap { trim: false });
    frame.render_widget(text_box, rows[1]);

    let tags_active = draft.field == ComposeField::Tags;
    frame.render_widget(
        Paragraph::new(tag_editor_line(draft, tags_active)).block(field_block("Tags", tags_active)),
        rows[2],
    );

    let mut footer = format!("Ctrl-s {} • Tab switch field • Esc close", mode.submit_label());
    if draft.reply.is_active() {
        footer.push_str(" • Ctrl-r unlink reply");
    }
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(footer, Style::default().fg(Color::Gray)))),
        rows[3],
    );

    if text_active && draft.prompt().is_none() {
        if let Some((x, y)) = text_cursor_screen_position(&draft.text, rows[1]) {
            frame.set_cursor(x, y);
        }
    }
}

fn field_block(title: &'static str, active: bool) -> Block<'static> {
    let style = if active {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(style)
}

fn tag_editor_line(draft: &Draft, active: bool) -> Line<'static> {
    let chip = Style::default().fg(Color::Green);
    let mut spans = Vec::new();
    for (idx, tag) in draft.tags.tags().iter().enumerate() {
        let style = if active && draft.tags.highlighted() == Some(idx) {
            chip.add_modifier(Modifier::REVERSED)
        } else {
            chip
        };
        spans.push(Span::styled(format!("#{tag}"), style));
        spans.push(Span::raw(" "));
    }
    let mut input = draft.tags.input().to_string();
    if active {
        input.push('▌');
    }
    spans.push(Span::raw(input));
    Line::from(spans)
}

/// Screen position of the text cursor inside a bordered, wrapping box.
fn text_cursor_screen_position(input: &TextInput, area: Rect) -> Option<(u16, u16)> {
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    if inner_width == 0 || inner_height == 0 {
        return None;
    }

    let width_limit = inner_width as usize;
    let buffer = input.as_str();
    let mut row = 0u16;
    let mut col = 0usize;
    for grapheme in buffer[..input.cursor()].graphemes(true) {
        if grapheme == "\n" {
            row += 1;
            col = 0;
            continue;
        }
        let glyph_width = UnicodeWidthStr::width(grapheme);
        if glyph_width > 0 && col + glyph_width > width_limit {
            row += 1;
            col = 0;
        }
        col += glyph_width;
    }

    let row = row.min(inner_height - 1);
    let col = col.min(width_limit - 1) as u16;
    Some((area.x + 1 + col, area.y + 1 + row))
}

fn draw_prompt(frame: &mut Frame, title: &str, body: &str, keys: &str, accent: Color) {
    let area = centered_rect(50, 25, frame.size());
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(vec![
        Line::from(Span::styled(
            title.to_string(),
            Style::default().fg(accent).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(body.to_string()),
        Line::from(""),
        Line::from(Span::styled(keys.to_string(), Style::default().fg(Color::Gray))),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(accent)),
    )
    .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn draw_login(frame: &mut Frame, form: &LoginForm) {
    let area = centered_rect(50, 40, frame.size());
    frame.render_widget(Clear, area);

    let field = |label: &str, value: String, active: bool| {
        let mut value = value;
        if active {
            value.push('▌');
        }
        let label_style = if active {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        Line::from(vec![Span::styled(format!("{label:>9}: "), label_style), Span::raw(value)])
    };

    let mut lines = vec![
        Line::from(Span::styled(
            "Sign in to the notes service",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        field("Username", form.username.clone(), form.field == LoginField::Username),
        field(
            "Password",
            "*".repeat(form.password.chars().count()),
            form.field == LoginField::Password,
        ),
        Line::from(""),
    ];
    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
        "Enter sign in • Tab switch field • Esc quit",
        Style::default().fg(Color::Gray),
    )));

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Login")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_follows_newlines_and_wrapping() {
        let area = Rect::new(10, 5, 7, 6);
        let mut input = TextInput::with_text("ab\ncd");
        assert_eq!(text_cursor_screen_position(&input, area), Some((13, 7)));

        input.set("abcdefg");
        // five columns inside the border, so the sixth glyph wraps
        assert_eq!(text_cursor_screen_position(&input, area), Some((13, 7)));
    }

    #[test]
    fn layout_hit_tests_notes_and_modal() {
        let layout = ScreenLayout {
            notes: vec![
                (NoteId::new("a"), Area::new(0, 1, 20, 3)),
                (NoteId::new("b"), Area::new(0, 4, 20, 3)),
            ],
            modal: Some(Area::new(5, 2, 10, 4)),
            viewport: Area::new(0, 0, 20, 10),
        };
        assert_eq!(layout.note_at(Point::new(3, 5)), Some(&NoteId::new("b")));
        assert_eq!(layout.note_at(Point::new(3, 9)), None);
        assert!(layout.in_modal(Point::new(6, 3)));
        assert!(!layout.in_modal(Point::new(0, 0)));
    }
}
