use std::time::{Duration, Instant};

use indexmap::IndexSet;

use super::Point;
use crate::store::NoteId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionSettings {
    pub hold: Duration,
    pub drag_threshold: u16,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            hold: Duration::from_millis(200),
            drag_threshold: 5,
        }
    }
}

/// What a drag does to every note it passes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Select,
    Deselect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerOutcome {
    Ignored,
    HoldArmed,
    HoldCancelled,
    GestureStarted,
    DragStarted,
    Applied(NoteId),
    Toggled { note: NoteId, selected: bool },
    GestureEnded,
}

#[derive(Debug, Clone)]
struct HoldTimer {
    note: NoteId,
    origin: Point,
    started: Instant,
}

#[derive(Debug, Clone)]
struct Gesture {
    first: NoteId,
    origin: Point,
    polarity: Polarity,
    dragging: bool,
    entered_by_hold: bool,
}

/// Multi-select mode. Entered by press-and-hold on a note, extended by
/// dragging, left through `cancel` or `take_for_delete`.
///
/// The selected set is only ever non-empty while the mode is active.
#[derive(Debug, Clone)]
pub struct SelectionController {
    settings: SelectionSettings,
    active: bool,
    selected: IndexSet<NoteId>,
    hold: Option<HoldTimer>,
    gesture: Option<Gesture>,
    text_selection: bool,
}

impl Default for SelectionController {
    fn default() -> Self {
        Self::new(SelectionSettings::default())
    }
}

impl SelectionController {
    pub fn new(settings: SelectionSettings) -> Self {
        Self {
            settings,
            active: false,
            selected: IndexSet::new(),
            hold: None,
            gesture: None,
            text_selection: true,
        }
    }

    pub fn settings(&self) -> SelectionSettings {
        self.settings
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_dragging(&self) -> bool {
        self.gesture.as_ref().is_some_and(|gesture| gesture.dragging)
    }

    pub fn text_selection_enabled(&self) -> bool {
        self.text_selection
    }

    pub fn is_selected(&self, id: &NoteId) -> bool {
        self.selected.contains(id)
    }

    pub fn selected(&self) -> impl Iterator<Item = &NoteId> {
        self.selected.iter()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn hold_pending(&self) -> bool {
        self.hold.is_some()
    }

    pub fn pointer_down(&mut self, note: Option<NoteId>, at: Point, now: Instant) -> PointerOutcome {
        let Some(note) = note else {
            self.hold = None;
            return PointerOutcome::Ignored;
        };
        if !self.active {
            self.hold = Some(HoldTimer {
                note,
                origin: at,
                started: now,
            });
            return PointerOutcome::HoldArmed;
        }
        let polarity = if self.selected.contains(&note) {
            Polarity::Deselect
        } else {
            Polarity::Select
        };
        self.gesture = Some(Gesture {
            first: note,
            origin: at,
            polarity,
            dragging: false,
            entered_by_hold: false,
        });
        PointerOutcome::GestureStarted
    }

    /// Tracks a drag. A hold that has already run its full duration enters
    /// selection mode before the movement is considered.
    pub fn pointer_move(
        &mut self,
        note: Option<NoteId>,
        at: Point,
        now: Instant,
    ) -> PointerOutcome {
        let threshold = self.settings.drag_threshold;
        if self.hold.is_some() {
            self.tick(now);
        }
        if let Some(hold) = &self.hold {
            if at.moved_at_least(hold.origin, threshold) {
                tracing::trace!(note = %hold.note, "hold cancelled by movement");
                self.hold = None;
                return PointerOutcome::HoldCancelled;
            }
            return PointerOutcome::Ignored;
        }
        let Some(gesture) = self.gesture.as_mut() else {
            return PointerOutcome::Ignored;
        };
        if !gesture.dragging {
            if !at.moved_beyond(gesture.origin, threshold) {
                return PointerOutcome::Ignored;
            }
            gesture.dragging = true;
            let (first, polarity) = (gesture.first.clone(), gesture.polarity);
            self.text_selection = false;
            self.apply(&first, polarity);
            if let Some(entered) = note.filter(|entered| entered != &first) {
                self.apply(&entered, polarity);
            }
            return PointerOutcome::DragStarted;
        }
        let polarity = gesture.polarity;
        match note {
            Some(entered) => {
                self.apply(&entered, polarity);
                PointerOutcome::Applied(entered)
            }
            None => PointerOutcome::Ignored,
        }
    }

    /// Ends the current press. A release that completes a hold enters
    /// selection mode rather than toggling.
    pub fn pointer_up(&mut self, now: Instant) -> PointerOutcome {
        if self.hold.is_some() && self.tick(now).is_none() {
            self.hold = None;
            return PointerOutcome::HoldCancelled;
        }
        let Some(gesture) = self.gesture.take() else {
            return PointerOutcome::Ignored;
        };
        self.text_selection = true;
        if gesture.dragging || gesture.entered_by_hold {
            return PointerOutcome::GestureEnded;
        }
        let selected = self.toggle(&gesture.first);
        PointerOutcome::Toggled {
            note: gesture.first,
            selected,
        }
    }

    /// Pointer left the window or capture was lost mid-gesture.
    pub fn pointer_lost(&mut self) {
        self.hold = None;
        if self.gesture.take().is_some() {
            self.text_selection = true;
        }
    }

    /// Fires the hold timer once it has run for the configured duration.
    /// Returns the note that opened selection mode.
    pub fn tick(&mut self, now: Instant) -> Option<NoteId> {
        let hold = self.hold.as_ref()?;
        if now.saturating_duration_since(hold.started) < self.settings.hold {
            return None;
        }
        let hold = self.hold.take()?;
        self.enter_with(hold.note.clone());
        self.gesture = Some(Gesture {
            first: hold.note.clone(),
            origin: hold.origin,
            polarity: Polarity::Select,
            dragging: false,
            entered_by_hold: true,
        });
        tracing::debug!(note = %hold.note, "selection mode entered by hold");
        Some(hold.note)
    }

    pub fn enter_with(&mut self, note: NoteId) {
        self.active = true;
        self.selected.insert(note);
    }

    /// Flips one note's membership. Returns whether it is now selected.
    pub fn toggle(&mut self, note: &NoteId) -> bool {
        if !self.active {
            return false;
        }
        if self.selected.shift_remove(note) {
            false
        } else {
            self.selected.insert(note.clone());
            true
        }
    }

    pub fn forget(&mut self, note: &NoteId) {
        self.selected.shift_remove(note);
    }

    pub fn cancel(&mut self) {
        self.active = false;
        self.selected.clear();
        self.hold = None;
        self.gesture = None;
        self.text_selection = true;
    }

    /// Leaves selection mode and hands back the ids to delete, in selection
    /// order.
    pub fn take_for_delete(&mut self) -> Vec<NoteId> {
        let ids = std::mem::take(&mut self.selected).into_iter().collect();
        self.cancel();
        ids
    }

    fn apply(&mut self, note: &NoteId, polarity: Polarity) {
        match polarity {
            Polarity::Select => {
                self.selected.insert(note.clone());
            }
            Polarity::Deselect => {
                self.selected.shift_remove(note);
            }
        }
    }
}
