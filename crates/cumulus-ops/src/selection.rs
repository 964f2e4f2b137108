//! Multi-select over the visible listing.

use compact_str::CompactString;
use indexmap::IndexSet;

use cumulus_core::FileEntry;

/// Selection state: an insertion-ordered set of entry names plus the anchor
/// index used for shift-click ranges.
///
/// Indices always refer to the *visible* (filtered and sorted) sequence the
/// caller passes in, never to the raw listing.
#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    selected: IndexSet<CompactString>,
    anchor: Option<usize>,
    /// Last name toggled off and where it sat, so toggling it back on
    /// restores the previous order.
    untoggled: Option<(CompactString, usize)>,
}

impl SelectionController {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection with a single entry and anchor on it.
    pub fn select_only(&mut self, name: &str, index: usize) {
        self.selected.clear();
        self.selected.insert(CompactString::from(name));
        self.anchor = Some(index);
        self.untoggled = None;
    }

    /// Add or remove one entry, leaving the rest untouched.
    pub fn toggle(&mut self, name: &str, index: usize) {
        if let Some(position) = self.selected.get_index_of(name) {
            self.selected.shift_remove_index(position);
            self.untoggled = Some((CompactString::from(name), position));
        } else {
            let position = match self.untoggled.take() {
                Some((last, position)) if last == name => position.min(self.selected.len()),
                _ => self.selected.len(),
            };
            self.selected.shift_insert(position, CompactString::from(name));
        }
        self.anchor = Some(index);
        self.reset_anchor_if_empty();
    }

    /// Union the inclusive range between two visible indices into the
    /// selection. Order of the indices does not matter and the anchor is
    /// left where it is.
    pub fn range_select(&mut self, anchor_index: usize, target_index: usize, visible: &[FileEntry]) {
        let Some(last) = visible.len().checked_sub(1) else {
            return;
        };
        let start = anchor_index.min(target_index).min(last);
        let end = anchor_index.max(target_index).min(last);
        for entry in &visible[start..=end] {
            self.selected.insert(entry.name.clone());
        }
    }

    /// Shift-click: extend from the stored anchor to `target_index`.
    ///
    /// Without an anchor this behaves like [`select_only`](Self::select_only).
    pub fn extend_to(&mut self, target_index: usize, visible: &[FileEntry]) {
        match self.anchor {
            Some(anchor) => self.range_select(anchor, target_index, visible),
            None => {
                if let Some(entry) = visible.get(target_index) {
                    self.select_only(&entry.name, target_index);
                }
            }
        }
    }

    /// Add an entry if it is not selected yet (context-menu intent).
    pub fn ensure_selected(&mut self, name: &str, index: usize) {
        if self.selected.insert(CompactString::from(name)) && self.anchor.is_none() {
            self.anchor = Some(index);
        }
    }

    /// Select every visible entry.
    pub fn select_all(&mut self, visible: &[FileEntry]) {
        self.selected = visible.iter().map(|e| e.name.clone()).collect();
        self.untoggled = None;
        self.reset_anchor_if_empty();
    }

    /// Clear the selection and the anchor.
    pub fn clear(&mut self) {
        self.selected.clear();
        self.anchor = None;
        self.untoggled = None;
    }

    /// Drop every selected name that is no longer visible.
    pub fn retain_visible(&mut self, visible: &[FileEntry]) {
        self.selected
            .retain(|name| visible.iter().any(|e| e.name == *name));
        if self.anchor.is_some_and(|anchor| anchor >= visible.len()) {
            self.anchor = None;
        }
        self.reset_anchor_if_empty();
    }

    /// Check if an entry is selected.
    pub fn contains(&self, name: &str) -> bool {
        self.selected.contains(name)
    }

    /// Selected names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(|n| n.as_str())
    }

    /// Selected names as owned strings.
    pub fn to_vec(&self) -> Vec<String> {
        self.names().map(str::to_string).collect()
    }

    /// Current anchor index.
    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    /// Number of selected entries.
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Check if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    fn reset_anchor_if_empty(&mut self) {
        if self.selected.is_empty() {
            self.anchor = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn visible(names: &[&str]) -> Vec<FileEntry> {
        names
            .iter()
            .map(|n| FileEntry::file(format!("/{n}"), 1, Utc::now()))
            .collect()
    }

    fn sorted(selection: &SelectionController) -> Vec<String> {
        let mut names = selection.to_vec();
        names.sort();
        names
    }

    #[test]
    fn test_select_only_replaces() {
        let mut sel = SelectionController::new();
        sel.select_only("a", 0);
        sel.select_only("b", 1);
        assert_eq!(sel.to_vec(), vec!["b"]);
        assert_eq!(sel.anchor(), Some(1));
    }

    #[test]
    fn test_toggle_twice_restores_selection() {
        let mut sel = SelectionController::new();
        sel.select_only("a", 0);
        sel.toggle("b", 1);
        let before = sorted(&sel);

        sel.toggle("c", 2);
        sel.toggle("c", 2);
        assert_eq!(sorted(&sel), before);
    }

    #[test]
    fn test_toggle_twice_keeps_order() {
        let list = visible(&["a", "b", "c"]);
        let mut sel = SelectionController::new();
        sel.select_all(&list);

        sel.toggle("b", 1);
        assert_eq!(sel.to_vec(), vec!["a", "c"]);
        sel.toggle("b", 1);
        assert_eq!(sel.to_vec(), vec!["a", "b", "c"]);

        sel.toggle("d", 3);
        assert_eq!(sel.to_vec(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_toggle_last_entry_resets_anchor() {
        let mut sel = SelectionController::new();
        sel.toggle("a", 3);
        assert_eq!(sel.anchor(), Some(3));
        sel.toggle("a", 3);
        assert!(sel.is_empty());
        assert_eq!(sel.anchor(), None);
    }

    #[test]
    fn test_range_select_is_symmetric() {
        let list = visible(&["a", "b", "c", "d", "e"]);

        let mut forward = SelectionController::new();
        forward.range_select(1, 3, &list);
        let mut backward = SelectionController::new();
        backward.range_select(3, 1, &list);

        assert_eq!(sorted(&forward), vec!["b", "c", "d"]);
        assert_eq!(sorted(&forward), sorted(&backward));
    }

    #[test]
    fn test_range_select_unions_and_keeps_anchor() {
        let list = visible(&["a", "b", "c", "d", "e"]);
        let mut sel = SelectionController::new();
        sel.select_only("e", 4);
        sel.range_select(0, 1, &list);
        assert_eq!(sorted(&sel), vec!["a", "b", "e"]);
        assert_eq!(sel.anchor(), Some(4));
    }

    #[test]
    fn test_range_select_clamps_and_ignores_empty() {
        let list = visible(&["a", "b"]);
        let mut sel = SelectionController::new();
        sel.range_select(0, 99, &list);
        assert_eq!(sorted(&sel), vec!["a", "b"]);

        let mut sel = SelectionController::new();
        sel.range_select(0, 5, &[]);
        assert!(sel.is_empty());
    }

    #[test]
    fn test_extend_without_anchor_selects_only() {
        let list = visible(&["a", "b", "c"]);
        let mut sel = SelectionController::new();
        sel.extend_to(2, &list);
        assert_eq!(sel.to_vec(), vec!["c"]);
        assert_eq!(sel.anchor(), Some(2));

        sel.extend_to(0, &list);
        assert_eq!(sorted(&sel), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_retain_visible_prunes() {
        let mut sel = SelectionController::new();
        sel.select_only("a", 0);
        sel.toggle("gone", 5);
        sel.retain_visible(&visible(&["a", "b"]));
        assert_eq!(sel.to_vec(), vec!["a"]);
        assert_eq!(sel.anchor(), None);
    }

    #[test]
    fn test_ensure_selected_keeps_existing() {
        let mut sel = SelectionController::new();
        sel.select_only("a", 0);
        sel.ensure_selected("b", 1);
        sel.ensure_selected("a", 0);
        assert_eq!(sel.to_vec(), vec!["a", "b"]);
        assert_eq!(sel.anchor(), Some(0));
    }
}
