use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;
use time::{macros::format_description, OffsetDateTime};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::store::{Note, NoteId, NoteStore};

/// How a card should be highlighted on the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardState {
    pub focused: bool,
    pub selected: bool,
}

/// Rows a card occupies at the given outer width, borders included.
pub fn card_height(note: &Note, width: u16) -> u16 {
    let inner = width.saturating_sub(2).max(1) as usize;
    let mut rows = wrapped_rows(&note.text, inner);
    if note.reply.is_some() {
        rows += 1;
    }
    if !note.tags.is_empty() {
        rows += 1;
    }
    (rows as u16).saturating_add(2)
}

/// Places cards top to bottom, scrolled so the focused note is visible.
/// The last card is clipped when it only partly fits.
pub fn layout_cards(notes: &[Note], focus: Option<usize>, area: Rect) -> Vec<(NoteId, Rect)> {
    if notes.is_empty() || area.height == 0 {
        return Vec::new();
    }
    let heights: Vec<u16> = notes.iter().map(|note| card_height(note, area.width)).collect();
    let first = first_visible(&heights, focus.unwrap_or(0).min(notes.len() - 1), area.height);

    let mut placed = Vec::new();
    let mut y = area.y;
    let bottom = area.y.saturating_add(area.height);
    for (note, height) in notes.iter().zip(&heights).skip(first) {
        if y >= bottom {
            break;
        }
        let visible = (*height).min(bottom - y);
        placed.push((note.id.clone(), Rect::new(area.x, y, area.width, visible)));
        y = y.saturating_add(visible);
    }
    placed
}

fn first_visible(heights: &[u16], focus: usize, available: u16) -> usize {
    let mut used = 0u16;
    let mut first = focus;
    for idx in (0..=focus).rev() {
        used = used.saturating_add(heights[idx]);
        if used > available {
            break;
        }
        first = idx;
    }
    first
}

fn wrapped_rows(text: &str, width: usize) -> usize {
    text.split('\n')
        .map(|line| {
            let mut rows = 1;
            let mut col = 0;
            for grapheme in line.graphemes(true) {
                let glyph = UnicodeWidthStr::width(grapheme);
                if glyph > 0 && col + glyph > width {
                    rows += 1;
                    col = 0;
                }
                col += glyph;
            }
            rows
        })
        .sum()
}

pub fn render_card(frame: &mut Frame, store: &NoteStore, note: &Note, area: Rect, card: CardState) {
    let border_style = if card.selected {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else if card.focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let mut title = vec![Span::styled(
        format_time_short(note.created_at),
        Style::default().fg(Color::Gray),
    )];
    if card.selected {
        title.insert(0, Span::styled("✔ ", border_style));
    }
    if note.updated_at != note.created_at {
        title.push(Span::styled(" (edited)", Style::default().fg(Color::DarkGray)));
    }
    let replies = store.reply_count(&note.id);
    if replies > 0 {
        title.push(Span::styled(
            format!(" · {replies} repl{}", if replies == 1 { "y" } else { "ies" }),
            Style::default().fg(Color::Magenta),
        ));
    }

    let mut lines = Vec::new();
    if let Some(link) = &note.reply {
        let mut spans = vec![Span::styled(
            format!("↪ {}", link.preview()),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )];
        if !store.contains(link.target()) {
            spans.push(Span::styled(" (deleted)", Style::default().fg(Color::Red)));
        }
        lines.push(Line::from(spans));
    }
    lines.extend(note.text.split('\n').map(|line| Line::from(line.to_string())));
    if let Some(tags) = tag_line(&note.tags) {
        lines.push(tags);
    }

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(Line::from(title)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

pub fn tag_line(tags: &[String]) -> Option<Line<'static>> {
    if tags.is_empty() {
        return None;
    }
    let style = Style::default().fg(Color::Green);
    let mut spans = Vec::with_capacity(tags.len() * 2);
    for (idx, tag) in tags.iter().enumerate() {
        if idx > 0 {
            spans.push(Span::raw(" "));
        }
        spans.push(Span::styled(format!("#{tag}"), style));
    }
    Some(Line::from(spans))
}

fn format_time_short(dt: OffsetDateTime) -> String {
    dt.format(&format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}
