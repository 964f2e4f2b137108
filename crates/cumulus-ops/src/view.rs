//! Filtering and sorting of a listing into the visible sequence.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, FromRepr, IntoEnumIterator};

use cumulus_core::FileEntry;

const LARGE_FILE_BYTES: u64 = 100 * 1024 * 1024;
const RECENT_DAYS: i64 = 7;
const SYSTEM_FILES: [&str; 2] = ["Thumbs.db", ".DS_Store"];
const MEDIA_EXTENSIONS: [&str; 10] = [
    "jpg", "jpeg", "png", "gif", "webp", "mp4", "mov", "mkv", "mp3", "wav",
];
const DOCUMENT_EXTENSIONS: [&str; 9] = [
    "pdf", "doc", "docx", "txt", "md", "xls", "xlsx", "ppt", "pptx",
];

/// Sort order for the visible listing. Directories always come first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter, FromRepr, Serialize, Deserialize,
)]
pub enum SortMode {
    /// Name ascending (A-Z).
    #[default]
    #[strum(to_string = "Name ↓")]
    NameAsc,
    /// Name descending (Z-A).
    #[strum(to_string = "Name ↑")]
    NameDesc,
    /// Modified date descending (newest first).
    #[strum(to_string = "Date ↓")]
    DateDesc,
    /// Modified date ascending (oldest first).
    #[strum(to_string = "Date ↑")]
    DateAsc,
}

impl SortMode {
    /// Cycle to the next sort mode.
    pub fn next(self) -> Self {
        let current = self as usize;
        let next = (current + 1) % Self::iter().count();
        Self::from_repr(next).unwrap_or_default()
    }

    fn compare(self, a: &FileEntry, b: &FileEntry) -> Ordering {
        match self {
            Self::NameAsc => compare_names(a, b),
            Self::NameDesc => compare_names(b, a),
            Self::DateDesc => b.modified_at.cmp(&a.modified_at),
            Self::DateAsc => a.modified_at.cmp(&b.modified_at),
        }
    }
}

/// Quick filters.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter, FromRepr, Serialize, Deserialize,
)]
pub enum FilterPreset {
    #[default]
    All,
    /// Modified within the last seven days.
    Recent,
    /// Files of at least 100 MiB.
    Large,
    /// Images, video and audio.
    Media,
    /// Office documents and text.
    Documents,
}

impl FilterPreset {
    /// Check whether an entry passes this filter.
    pub fn matches(self, entry: &FileEntry, now: DateTime<Utc>) -> bool {
        match self {
            Self::All => true,
            Self::Recent => now - entry.modified_at <= Duration::days(RECENT_DAYS),
            Self::Large => !entry.is_dir() && entry.size >= LARGE_FILE_BYTES,
            Self::Media => has_extension(&entry.name, &MEDIA_EXTENSIONS),
            Self::Documents => has_extension(&entry.name, &DOCUMENT_EXTENSIONS),
        }
    }
}

/// User-controlled view settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewOptions {
    /// Case-insensitive substring filter on names.
    pub search: String,
    /// Show dotfiles and OS metadata files.
    pub show_hidden: bool,
    pub preset: FilterPreset,
    pub sort: SortMode,
}

impl ViewOptions {
    fn accepts(&self, entry: &FileEntry, query: &str, now: DateTime<Utc>) -> bool {
        if !query.is_empty() && !entry.name.to_lowercase().contains(query) {
            return false;
        }
        if !self.show_hidden && is_hidden(entry) {
            return false;
        }
        self.preset.matches(entry, now)
    }
}

/// Apply view options to a listing, producing the visible sequence that
/// selection indices refer to.
pub fn visible_entries(entries: &[FileEntry], options: &ViewOptions, now: DateTime<Utc>) -> Vec<FileEntry> {
    let query = options.search.trim().to_lowercase();
    let mut visible: Vec<FileEntry> = entries
        .iter()
        .filter(|e| options.accepts(e, &query, now))
        .cloned()
        .collect();
    visible.sort_by(|a, b| {
        b.is_dir()
            .cmp(&a.is_dir())
            .then_with(|| options.sort.compare(a, b))
    });
    visible
}

fn is_hidden(entry: &FileEntry) -> bool {
    entry.is_hidden() || SYSTEM_FILES.contains(&entry.name.as_str())
}

fn has_extension(name: &str, extensions: &[&str]) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

fn compare_names(a: &FileEntry, b: &FileEntry) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    fn file(name: &str, size: u64, days_old: i64) -> FileEntry {
        FileEntry::file(format!("/{name}"), size, now() - Duration::days(days_old))
    }

    fn dir(name: &str) -> FileEntry {
        FileEntry::directory(format!("/{name}"), now())
    }

    fn names(entries: &[FileEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_directories_first_then_name() {
        let entries = vec![file("b.txt", 1, 0), dir("zeta"), file("A.txt", 1, 0), dir("alpha")];
        let visible = visible_entries(&entries, &ViewOptions::default(), now());
        assert_eq!(names(&visible), vec!["alpha", "zeta", "A.txt", "b.txt"]);

        let options = ViewOptions {
            sort: SortMode::NameDesc,
            ..ViewOptions::default()
        };
        let visible = visible_entries(&entries, &options, now());
        assert_eq!(names(&visible), vec!["zeta", "alpha", "b.txt", "A.txt"]);
    }

    #[test]
    fn test_date_sort() {
        let entries = vec![file("old", 1, 30), file("new", 1, 1), file("mid", 1, 10)];
        let options = ViewOptions {
            sort: SortMode::DateDesc,
            ..ViewOptions::default()
        };
        assert_eq!(names(&visible_entries(&entries, &options, now())), vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_hidden_files() {
        let entries = vec![file(".env", 1, 0), file("Thumbs.db", 1, 0), file("a.txt", 1, 0)];
        let visible = visible_entries(&entries, &ViewOptions::default(), now());
        assert_eq!(names(&visible), vec!["a.txt"]);

        let options = ViewOptions {
            show_hidden: true,
            ..ViewOptions::default()
        };
        assert_eq!(visible_entries(&entries, &options, now()).len(), 3);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let entries = vec![file("Report.PDF", 1, 0), file("notes.txt", 1, 0)];
        let options = ViewOptions {
            search: "  report ".into(),
            ..ViewOptions::default()
        };
        assert_eq!(names(&visible_entries(&entries, &options, now())), vec!["Report.PDF"]);
    }

    #[test]
    fn test_presets() {
        let big = file("movie.mkv", LARGE_FILE_BYTES, 20);
        let doc = file("plan.docx", 10, 2);
        let t = now();

        assert!(FilterPreset::Large.matches(&big, t));
        assert!(!FilterPreset::Large.matches(&doc, t));
        assert!(FilterPreset::Recent.matches(&doc, t));
        assert!(!FilterPreset::Recent.matches(&big, t));
        assert!(FilterPreset::Media.matches(&big, t));
        assert!(FilterPreset::Documents.matches(&doc, t));
        assert!(!FilterPreset::Documents.matches(&dir("docx"), t));
    }

    #[test]
    fn test_sort_mode_cycles() {
        assert_eq!(SortMode::NameAsc.next(), SortMode::NameDesc);
        assert_eq!(SortMode::DateAsc.next(), SortMode::NameAsc);
    }
}
