//! Pointer gesture state machine: click vs. drag-and-drop.
//!
//! A press over an item arms the gesture. Moving the pointer at least the
//! configured threshold away from the press origin turns it into a drag;
//! releasing before that is a click. Native (HTML5-style) drag starts skip
//! the armed state.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use cumulus_core::FileEntry;

use crate::selection::SelectionController;

/// Pointer position in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Keyboard modifiers held during a press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    /// Shift: extend from the anchor.
    pub shift: bool,
    /// Ctrl or Cmd: toggle membership.
    pub toggle: bool,
}

impl Modifiers {
    /// No modifier held.
    pub const NONE: Self = Self {
        shift: false,
        toggle: false,
    };
}

/// Directory row currently highlighted as the drop destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTarget {
    pub name: CompactString,
    pub path: String,
}

impl DropTarget {
    /// Drop target for a directory entry. Files are never drop targets.
    pub fn from_entry(entry: &FileEntry) -> Option<Self> {
        entry.is_dir().then(|| Self {
            name: entry.name.clone(),
            path: entry.path.clone(),
        })
    }
}

/// A drop waiting for user confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMoveConfirmation {
    /// Names of the dragged entries, relative to the directory they live in.
    pub source_names: Vec<CompactString>,
    /// Name of the destination directory.
    pub target_directory_name: CompactString,
    /// Full path of the destination directory.
    pub target_path: String,
}

/// Gesture state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    /// Pointer is down over an item but has not travelled far enough.
    Armed {
        origin: Point,
        name: CompactString,
        index: usize,
        modifiers: Modifiers,
    },
    /// A drag is in progress.
    Dragging {
        payload: Vec<CompactString>,
        drop_target: Option<DropTarget>,
    },
}

/// What a gesture event resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    /// Nothing for the caller to do.
    None,
    /// Press and release without enough travel.
    Click {
        name: CompactString,
        index: usize,
        modifiers: Modifiers,
    },
    /// The gesture became a drag carrying these names.
    DragStarted { payload: Vec<CompactString> },
    /// Dropped onto a directory; the move waits for confirmation.
    Drop(PendingMoveConfirmation),
}

/// Drives [`GestureState`] from pointer events.
#[derive(Debug, Clone)]
pub struct DragGestureController {
    threshold: f64,
    state: GestureState,
}

impl DragGestureController {
    /// Create a controller with the given drag threshold in pixels.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            state: GestureState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> &GestureState {
        &self.state
    }

    /// Check if a drag is in progress.
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, GestureState::Dragging { .. })
    }

    /// Current drop target, if dragging over a directory.
    pub fn drop_target(&self) -> Option<&DropTarget> {
        match &self.state {
            GestureState::Dragging { drop_target, .. } => drop_target.as_ref(),
            _ => None,
        }
    }

    /// Pointer pressed over an item.
    pub fn press(&mut self, name: &str, index: usize, origin: Point, modifiers: Modifiers) {
        if matches!(self.state, GestureState::Idle) {
            self.state = GestureState::Armed {
                origin,
                name: CompactString::from(name),
                index,
                modifiers,
            };
        }
    }

    /// Pointer moved. Starts a drag once the threshold is reached.
    pub fn pointer_move(&mut self, to: Point, selection: &SelectionController) -> GestureOutcome {
        let GestureState::Armed { origin, name, .. } = &self.state else {
            return GestureOutcome::None;
        };
        if origin.distance_to(to) < self.threshold {
            return GestureOutcome::None;
        }
        let payload = drag_payload(name, selection);
        self.begin_drag(payload)
    }

    /// Native drag started on an item, bypassing the armed state.
    pub fn native_drag_start(&mut self, name: &str, selection: &SelectionController) -> GestureOutcome {
        let payload = drag_payload(name, selection);
        self.begin_drag(payload)
    }

    /// Pointer is over `entry` (or over no row at all) while dragging.
    pub fn drag_over(&mut self, entry: Option<&FileEntry>) {
        if let GestureState::Dragging { drop_target, .. } = &mut self.state {
            *drop_target = entry.and_then(DropTarget::from_entry);
        }
    }

    /// Pointer released. `current_dir` is the directory the payload lives in.
    pub fn release(&mut self, current_dir: &str) -> GestureOutcome {
        match std::mem::take(&mut self.state) {
            GestureState::Idle => GestureOutcome::None,
            GestureState::Armed {
                name,
                index,
                modifiers,
                ..
            } => GestureOutcome::Click {
                name,
                index,
                modifiers,
            },
            GestureState::Dragging {
                payload,
                drop_target: Some(target),
            } => match pending_move(payload, target, current_dir) {
                Some(pending) => GestureOutcome::Drop(pending),
                None => GestureOutcome::None,
            },
            GestureState::Dragging { .. } => GestureOutcome::None,
        }
    }

    /// Escape or pointer cancel.
    pub fn cancel(&mut self) {
        self.state = GestureState::Idle;
    }

    fn begin_drag(&mut self, payload: Vec<CompactString>) -> GestureOutcome {
        debug!(count = payload.len(), "Drag started");
        self.state = GestureState::Dragging {
            payload: payload.clone(),
            drop_target: None,
        };
        GestureOutcome::DragStarted { payload }
    }
}

/// The whole selection if the pressed item is part of it, else just the item.
fn drag_payload(name: &str, selection: &SelectionController) -> Vec<CompactString> {
    if selection.contains(name) {
        selection.names().map(CompactString::from).collect()
    } else {
        vec![CompactString::from(name)]
    }
}

/// Build the confirmation for a drop, or `None` when the drop is a no-op.
fn pending_move(
    payload: Vec<CompactString>,
    target: DropTarget,
    current_dir: &str,
) -> Option<PendingMoveConfirmation> {
    if target.path == current_dir {
        return None;
    }
    let mut source_names: Vec<CompactString> = Vec::with_capacity(payload.len());
    for name in payload {
        if !source_names.contains(&name) {
            source_names.push(name);
        }
    }
    if source_names.iter().all(|n| *n == target.name) {
        return None;
    }
    Some(PendingMoveConfirmation {
        source_names,
        target_directory_name: target.name,
        target_path: target.path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn dir(path: &str) -> FileEntry {
        FileEntry::directory(path, Utc::now())
    }

    #[test]
    fn test_seven_pixels_is_still_a_click() {
        let selection = SelectionController::new();
        let mut gesture = DragGestureController::new(8.0);
        gesture.press("a.txt", 0, Point::new(10.0, 10.0), Modifiers::NONE);

        let outcome = gesture.pointer_move(Point::new(17.0, 10.0), &selection);
        assert_eq!(outcome, GestureOutcome::None);
        assert!(!gesture.is_dragging());

        let outcome = gesture.release("/");
        assert!(matches!(outcome, GestureOutcome::Click { index: 0, .. }));
        assert_eq!(gesture.state(), &GestureState::Idle);
    }

    #[test]
    fn test_eight_pixels_starts_drag() {
        let selection = SelectionController::new();
        let mut gesture = DragGestureController::new(8.0);
        gesture.press("a.txt", 0, Point::new(10.0, 10.0), Modifiers::NONE);

        let outcome = gesture.pointer_move(Point::new(18.0, 10.0), &selection);
        assert_eq!(
            outcome,
            GestureOutcome::DragStarted {
                payload: vec![CompactString::from("a.txt")]
            }
        );
        assert!(gesture.is_dragging());
    }

    #[test]
    fn test_payload_is_selection_when_pressed_item_selected() {
        let mut selection = SelectionController::new();
        selection.select_only("a", 0);
        selection.toggle("b", 1);

        let mut gesture = DragGestureController::new(8.0);
        let outcome = gesture.native_drag_start("b", &selection);
        let GestureOutcome::DragStarted { payload } = outcome else {
            panic!("expected drag start");
        };
        assert_eq!(payload, vec!["a", "b"]);

        gesture.cancel();
        let outcome = gesture.native_drag_start("c", &selection);
        assert_eq!(
            outcome,
            GestureOutcome::DragStarted {
                payload: vec![CompactString::from("c")]
            }
        );
    }

    #[test]
    fn test_drop_target_tracks_directory_rows() {
        let selection = SelectionController::new();
        let mut gesture = DragGestureController::new(8.0);
        gesture.native_drag_start("a.txt", &selection);

        gesture.drag_over(Some(&dir("/photos")));
        assert_eq!(gesture.drop_target().map(|t| t.path.as_str()), Some("/photos"));

        gesture.drag_over(Some(&dir("/music")));
        assert_eq!(gesture.drop_target().map(|t| t.path.as_str()), Some("/music"));

        let file = FileEntry::file("/notes.txt", 1, Utc::now());
        gesture.drag_over(Some(&file));
        assert!(gesture.drop_target().is_none());

        gesture.drag_over(Some(&dir("/music")));
        gesture.drag_over(None);
        assert!(gesture.drop_target().is_none());
    }

    #[test]
    fn test_drop_yields_pending_confirmation() {
        let selection = SelectionController::new();
        let mut gesture = DragGestureController::new(8.0);
        gesture.native_drag_start("a.txt", &selection);
        gesture.drag_over(Some(&dir("/photos")));

        let outcome = gesture.release("/");
        let GestureOutcome::Drop(pending) = outcome else {
            panic!("expected drop");
        };
        assert_eq!(pending.source_names, vec!["a.txt"]);
        assert_eq!(pending.target_directory_name, "photos");
        assert_eq!(pending.target_path, "/photos");
        assert_eq!(gesture.state(), &GestureState::Idle);
    }

    #[test]
    fn test_drop_onto_itself_is_noop() {
        let mut selection = SelectionController::new();
        selection.select_only("photos", 0);
        let mut gesture = DragGestureController::new(8.0);
        gesture.native_drag_start("photos", &selection);
        gesture.drag_over(Some(&dir("/photos")));
        assert_eq!(gesture.release("/"), GestureOutcome::None);
    }

    #[test]
    fn test_release_without_target_is_noop() {
        let selection = SelectionController::new();
        let mut gesture = DragGestureController::new(8.0);
        gesture.native_drag_start("a.txt", &selection);
        assert_eq!(gesture.release("/"), GestureOutcome::None);
    }

    #[test]
    fn test_cancel_returns_to_idle() {
        let mut gesture = DragGestureController::new(8.0);
        gesture.press("a", 0, Point::default(), Modifiers::NONE);
        gesture.cancel();
        assert_eq!(gesture.state(), &GestureState::Idle);
        assert_eq!(gesture.release("/"), GestureOutcome::None);
    }
}
