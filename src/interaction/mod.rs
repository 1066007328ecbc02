//! Pointer-driven interaction: multi-select and the per-note context menu.

mod context_menu;
mod selection;

pub use context_menu::{ContextMenu, MenuAction, MenuClick, MENU_HEIGHT, MENU_WIDTH};
pub use selection::{Polarity, PointerOutcome, SelectionController, SelectionSettings};

/// Terminal cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: u16,
    pub y: u16,
}

impl Point {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// True when the pointer moved at least `threshold` cells on either axis.
    pub fn moved_at_least(self, other: Point, threshold: u16) -> bool {
        self.x.abs_diff(other.x) >= threshold || self.y.abs_diff(other.y) >= threshold
    }

    pub fn moved_beyond(self, other: Point, threshold: u16) -> bool {
        self.x.abs_diff(other.x) > threshold || self.y.abs_diff(other.y) > threshold
    }
}

/// Rectangle of terminal cells, half-open on the right and bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Area {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Area {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(self) -> u16 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(self) -> u16 {
        self.y.saturating_add(self.height)
    }

    pub fn contains(self, at: Point) -> bool {
        at.x >= self.x && at.x < self.right() && at.y >= self.y && at.y < self.bottom()
    }
}

impl From<ratatui::layout::Rect> for Area {
    fn from(rect: ratatui::layout::Rect) -> Self {
        Self::new(rect.x, rect.y, rect.width, rect.height)
    }
}

impl From<Area> for ratatui::layout::Rect {
    fn from(area: Area) -> Self {
        ratatui::layout::Rect::new(area.x, area.y, area.width, area.height)
    }
}
