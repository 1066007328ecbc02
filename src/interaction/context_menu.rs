use strum::{AsRefStr, EnumCount, EnumIter, IntoEnumIterator};

use super::{Area, Point};
use crate::store::NoteId;

pub const MENU_WIDTH: u16 = 12;
pub const MENU_HEIGHT: u16 = MenuAction::COUNT as u16 + 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumCount, EnumIter)]
pub enum MenuAction {
    Edit,
    Reply,
    Delete,
}

impl MenuAction {
    pub fn label(self) -> &'static str {
        match self {
            MenuAction::Edit => "Edit",
            MenuAction::Reply => "Reply",
            MenuAction::Delete => "Delete",
        }
    }

    pub fn hotkey(self) -> char {
        match self {
            MenuAction::Edit => 'e',
            MenuAction::Reply => 'r',
            MenuAction::Delete => 'd',
        }
    }

    fn from_row(row: usize) -> Option<Self> {
        MenuAction::iter().nth(row)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuClick {
    /// The menu was not showing.
    Inactive,
    Chose(MenuAction, NoteId),
    /// Click landed on the frame rather than an item.
    Inside,
    Dismissed,
}

/// Per-note popup with Edit / Reply / Delete. Shown on right click, never
/// while selection mode is active.
#[derive(Debug, Clone, Default)]
pub struct ContextMenu {
    target: Option<NoteId>,
    bounds: Area,
    visible: bool,
    highlighted: usize,
}

impl ContextMenu {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn target(&self) -> Option<&NoteId> {
        self.target.as_ref()
    }

    pub fn bounds(&self) -> Option<Area> {
        self.visible.then_some(self.bounds)
    }

    pub fn highlighted(&self) -> MenuAction {
        MenuAction::from_row(self.highlighted).unwrap_or(MenuAction::Edit)
    }

    /// Anchors the menu at the pointer, shifted so it stays inside the
    /// viewport. Returns false when suppressed by selection mode.
    pub fn open(&mut self, note: NoteId, at: Point, viewport: Area, selection_active: bool) -> bool {
        if selection_active {
            return false;
        }
        let x = at
            .x
            .min(viewport.right().saturating_sub(MENU_WIDTH))
            .max(viewport.x);
        let y = at
            .y
            .min(viewport.bottom().saturating_sub(MENU_HEIGHT))
            .max(viewport.y);
        self.bounds = Area::new(x, y, MENU_WIDTH, MENU_HEIGHT);
        self.target = Some(note);
        self.visible = true;
        self.highlighted = 0;
        true
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.target = None;
    }

    pub fn click(&mut self, at: Point) -> MenuClick {
        if !self.visible {
            return MenuClick::Inactive;
        }
        if !self.bounds.contains(at) {
            self.hide();
            return MenuClick::Dismissed;
        }
        let row = at.y - self.bounds.y;
        let inner_col = at.x > self.bounds.x && at.x + 1 < self.bounds.right();
        let action = (row >= 1 && inner_col)
            .then(|| MenuAction::from_row(usize::from(row - 1)))
            .flatten();
        match action.and_then(|action| self.choose(action)) {
            Some((action, target)) => MenuClick::Chose(action, target),
            None => MenuClick::Inside,
        }
    }

    /// Hides the menu and hands back the chosen action with its target.
    pub fn choose(&mut self, action: MenuAction) -> Option<(MenuAction, NoteId)> {
        if !self.visible {
            return None;
        }
        let target = self.target.take()?;
        self.visible = false;
        Some((action, target))
    }

    pub fn move_highlight(&mut self, delta: isize) {
        let last = MenuAction::COUNT as isize - 1;
        self.highlighted = (self.highlighted as isize + delta).clamp(0, last) as usize;
    }

    pub fn choose_highlighted(&mut self) -> Option<(MenuAction, NoteId)> {
        self.choose(self.highlighted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Area {
        Area::new(0, 0, 80, 24)
    }

    #[test]
    fn open_is_suppressed_during_selection() {
        let mut menu = ContextMenu::default();
        assert!(!menu.open(NoteId::new("a"), Point::new(3, 3), viewport(), true));
        assert!(!menu.is_visible());
        assert_eq!(menu.target(), None);
    }

    #[test]
    fn menu_is_clamped_inside_viewport() {
        let mut menu = ContextMenu::default();
        menu.open(NoteId::new("a"), Point::new(79, 23), viewport(), false);
        let bounds = menu.bounds().unwrap();
        assert_eq!(bounds.right(), 80);
        assert_eq!(bounds.bottom(), 24);

        menu.open(NoteId::new("a"), Point::new(4, 2), viewport(), false);
        assert_eq!(menu.bounds().unwrap(), Area::new(4, 2, MENU_WIDTH, MENU_HEIGHT));
    }

    #[test]
    fn clicking_an_item_chooses_and_hides() {
        let mut menu = ContextMenu::default();
        menu.open(NoteId::new("a"), Point::new(10, 5), viewport(), false);
        // rows: border at 5, Edit 6, Reply 7, Delete 8
        assert_eq!(
            menu.click(Point::new(12, 7)),
            MenuClick::Chose(MenuAction::Reply, NoteId::new("a"))
        );
        assert!(!menu.is_visible());
        assert_eq!(menu.click(Point::new(12, 7)), MenuClick::Inactive);
    }

    #[test]
    fn clicking_the_frame_keeps_menu_open() {
        let mut menu = ContextMenu::default();
        menu.open(NoteId::new("a"), Point::new(10, 5), viewport(), false);
        assert_eq!(menu.click(Point::new(12, 5)), MenuClick::Inside);
        assert!(menu.is_visible());
    }

    #[test]
    fn clicking_outside_dismisses() {
        let mut menu = ContextMenu::default();
        menu.open(NoteId::new("a"), Point::new(10, 5), viewport(), false);
        assert_eq!(menu.click(Point::new(0, 0)), MenuClick::Dismissed);
        assert!(!menu.is_visible());
        assert_eq!(menu.target(), None);
    }

    #[test]
    fn keyboard_highlight_picks_delete() {
        let mut menu = ContextMenu::default();
        menu.open(NoteId::new("n"), Point::new(1, 1), viewport(), false);
        menu.move_highlight(5);
        assert_eq!(menu.highlighted(), MenuAction::Delete);
        assert_eq!(
            menu.choose_highlighted(),
            Some((MenuAction::Delete, NoteId::new("n")))
        );
        assert_eq!(menu.choose(MenuAction::Edit), None);
    }

    #[test]
    fn action_names_match_labels() {
        for action in MenuAction::iter() {
            assert_eq!(action.as_ref(), action.label());
        }
    }
}
