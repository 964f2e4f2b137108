//! In-memory file store implementing [`FileDataPort`].
//!
//! Used by the CLI sandbox and by tests. Besides the store semantics it
//! records every call and can inject failures or hold calls until resumed.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use tokio::sync::watch;

use cumulus_core::{
    path, DeleteFailure, DeleteReport, DirectoryListing, FileDataPort, FileEntry, LocalBoxFuture,
    PortError, PortErrorKind, PortResult, UploadFile,
};

/// Port operation kinds, for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum PortOp {
    List,
    Delete,
    Move,
    CreateDirectory,
    Upload,
}

/// A recorded port call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortCall {
    List { path: String },
    Delete { paths: Vec<String> },
    Move { source: String, destination: String },
    CreateDirectory { parent: String, name: String },
    Upload { name: String, directory: String },
}

impl PortCall {
    /// The kind of operation this call was.
    pub fn op(&self) -> PortOp {
        match self {
            Self::List { .. } => PortOp::List,
            Self::Delete { .. } => PortOp::Delete,
            Self::Move { .. } => PortOp::Move,
            Self::CreateDirectory { .. } => PortOp::CreateDirectory,
            Self::Upload { .. } => PortOp::Upload,
        }
    }
}

/// Errors loading or saving a fixture.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid fixture: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Fixture {
    entries: Vec<FileEntry>,
}

#[derive(Debug, Clone)]
struct Fault {
    op: PortOp,
    path: Option<String>,
    error: PortError,
    once: bool,
}

impl Fault {
    fn matches(&self, op: PortOp, path: Option<&str>) -> bool {
        self.op == op && self.path.as_deref().is_none_or(|p| Some(p) == path)
    }
}

/// Which calls are held back until [`MemoryStore::resume`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Gate {
    #[default]
    Open,
    All,
    Ops(Vec<PortOp>),
}

impl Gate {
    fn holds(&self, op: PortOp) -> bool {
        match self {
            Self::Open => false,
            Self::All => true,
            Self::Ops(ops) => ops.contains(&op),
        }
    }
}

/// In-memory remote store. The root `/` always exists.
#[derive(Debug)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, FileEntry>>,
    calls: RefCell<Vec<PortCall>>,
    faults: RefCell<Vec<Fault>>,
    gate: watch::Sender<Gate>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (gate, _rx) = watch::channel(Gate::Open);
        Self {
            entries: RefCell::new(BTreeMap::new()),
            calls: RefCell::new(Vec::new()),
            faults: RefCell::new(Vec::new()),
            gate,
        }
    }

    /// Create a store holding `entries`.
    pub fn with_entries(entries: impl IntoIterator<Item = FileEntry>) -> Self {
        let store = Self::new();
        for entry in entries {
            store.insert(entry);
        }
        store
    }

    /// Parse a JSON fixture.
    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        let fixture: Fixture = serde_json::from_str(json)?;
        Ok(Self::with_entries(fixture.entries))
    }

    /// Serialize the store as a JSON fixture.
    pub fn to_json(&self) -> Result<String, FixtureError> {
        let fixture = Fixture {
            entries: self.entries.borrow().values().cloned().collect(),
        };
        Ok(serde_json::to_string_pretty(&fixture)?)
    }

    /// Load a JSON fixture file.
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write the store to a JSON fixture file.
    pub fn save(&self, path: &Path) -> Result<(), FixtureError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Insert or replace an entry.
    pub fn insert(&self, entry: FileEntry) {
        self.entries.borrow_mut().insert(entry.path.clone(), entry);
    }

    /// Add a file, returning the store for chaining.
    pub fn with_file(self, path: &str, size: u64) -> Self {
        self.insert(FileEntry::file(path, size, Utc::now()));
        self
    }

    /// Add a directory, returning the store for chaining.
    pub fn with_dir(self, path: &str) -> Self {
        self.insert(FileEntry::directory(path, Utc::now()));
        self
    }

    /// Look up an entry.
    pub fn entry(&self, path: &str) -> Option<FileEntry> {
        self.entries.borrow().get(path).cloned()
    }

    /// Check whether a path exists. The root always exists.
    pub fn exists(&self, path: &str) -> bool {
        path == path::ROOT || self.entries.borrow().contains_key(path)
    }

    /// Every stored path, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    /// Recorded calls, oldest first.
    pub fn calls(&self) -> Vec<PortCall> {
        self.calls.borrow().clone()
    }

    /// Recorded calls of one kind.
    pub fn calls_of(&self, op: PortOp) -> Vec<PortCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.op() == op)
            .cloned()
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Fail the next call of `op` with `error`.
    pub fn fail_next(&self, op: PortOp, error: PortError) {
        self.faults.borrow_mut().push(Fault {
            op,
            path: None,
            error,
            once: true,
        });
    }

    /// Fail every `op` call on `path` until [`clear_faults`](Self::clear_faults).
    ///
    /// For deletes the failure is reported per path.
    pub fn fail_path(&self, op: PortOp, path: &str, error: PortError) {
        self.faults.borrow_mut().push(Fault {
            op,
            path: Some(path.to_string()),
            error,
            once: false,
        });
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        self.faults.borrow_mut().clear();
    }

    /// Hold every subsequent call until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.gate.send_replace(Gate::All);
    }

    /// Hold calls of one kind until [`resume`](Self::resume).
    pub fn pause_op(&self, op: PortOp) {
        self.gate.send_modify(|gate| match gate {
            Gate::All => {}
            Gate::Ops(ops) if ops.contains(&op) => {}
            Gate::Ops(ops) => ops.push(op),
            Gate::Open => *gate = Gate::Ops(vec![op]),
        });
    }

    /// Release held calls.
    pub fn resume(&self) {
        self.gate.send_replace(Gate::Open);
    }

    fn record(&self, call: PortCall) {
        self.calls.borrow_mut().push(call);
    }

    async fn wait_if_paused(&self, op: PortOp) {
        let mut rx = self.gate.subscribe();
        let _ = rx.wait_for(|gate| !gate.holds(op)).await;
    }

    fn take_fault(&self, op: PortOp, path: Option<&str>) -> Option<PortError> {
        let mut faults = self.faults.borrow_mut();
        let pos = faults.iter().position(|f| f.matches(op, path))?;
        if faults[pos].once {
            Some(faults.remove(pos).error)
        } else {
            Some(faults[pos].error.clone())
        }
    }

    fn require_dir(&self, path: &str) -> PortResult<()> {
        if path == path::ROOT {
            return Ok(());
        }
        match self.entries.borrow().get(path) {
            Some(entry) if entry.is_dir() => Ok(()),
            Some(_) => Err(PortError::new(
                PortErrorKind::Server,
                format!("Not a directory: {path}"),
            )),
            None => Err(PortError::not_found(path)),
        }
    }

    fn list_now(&self, dir: &str) -> PortResult<DirectoryListing> {
        if let Some(e) = self.take_fault(PortOp::List, Some(dir)) {
            return Err(e);
        }
        self.require_dir(dir)?;
        let entries = self
            .entries
            .borrow()
            .values()
            .filter(|e| path::parent(&e.path) == dir && e.path != dir)
            .cloned()
            .collect();
        Ok(DirectoryListing::new(dir, entries))
    }

    fn delete_now(&self, paths: &[String]) -> PortResult<DeleteReport> {
        if let Some(e) = self.take_fault(PortOp::Delete, None) {
            return Err(e);
        }
        let mut report = DeleteReport::default();
        for target in paths {
            if let Some(e) = self.take_fault(PortOp::Delete, Some(target)) {
                report.failed.push(DeleteFailure {
                    path: target.clone(),
                    reason: e.reason,
                });
                continue;
            }
            if !self.entries.borrow().contains_key(target) {
                report.failed.push(DeleteFailure {
                    path: target.clone(),
                    reason: PortError::not_found(target).reason,
                });
                continue;
            }
            self.entries
                .borrow_mut()
                .retain(|key, _| !path::is_within(key, target));
            report.deleted.push(target.clone());
        }
        Ok(report)
    }

    fn move_now(&self, source: &str, destination: &str) -> PortResult<()> {
        if let Some(e) = self.take_fault(PortOp::Move, Some(source)) {
            return Err(e);
        }
        if !self.entries.borrow().contains_key(source) {
            return Err(PortError::not_found(source));
        }
        if self.exists(destination) {
            return Err(PortError::already_exists(destination));
        }
        if path::is_within(destination, source) {
            return Err(PortError::new(
                PortErrorKind::Server,
                "Cannot move a directory into itself",
            ));
        }
        self.require_dir(path::parent(destination))?;

        let mut entries = self.entries.borrow_mut();
        let moved: Vec<String> = entries
            .keys()
            .filter(|key| path::is_within(key, source))
            .cloned()
            .collect();
        for old in moved {
            let (Some(entry), Some(new_path)) =
                (entries.remove(&old), path::rebase(&old, source, destination))
            else {
                continue;
            };
            entries.insert(new_path.clone(), entry.relocated(&new_path));
        }
        Ok(())
    }

    fn create_dir_now(&self, parent: &str, name: &str) -> PortResult<()> {
        let target = path::join(parent, name);
        if let Some(e) = self.take_fault(PortOp::CreateDirectory, Some(&target)) {
            return Err(e);
        }
        self.require_dir(parent)?;
        if self.exists(&target) {
            return Err(PortError::already_exists(&target));
        }
        self.insert(FileEntry::directory(target, Utc::now()));
        Ok(())
    }

    fn upload_now(&self, file: &UploadFile, directory: &str) -> PortResult<()> {
        let target = path::join(directory, &file.name);
        if let Some(e) = self.take_fault(PortOp::Upload, Some(&target)) {
            return Err(e);
        }
        self.require_dir(directory)?;
        if self.entries.borrow().get(&target).is_some_and(FileEntry::is_dir) {
            return Err(PortError::already_exists(&target));
        }
        self.insert(FileEntry::file(target, file.data.len() as u64, Utc::now()));
        Ok(())
    }
}

impl FileDataPort for MemoryStore {
    fn list_directory<'a>(&'a self, path: &'a str) -> LocalBoxFuture<'a, PortResult<DirectoryListing>> {
        self.record(PortCall::List {
            path: path.to_string(),
        });
        Box::pin(async move {
            self.wait_if_paused(PortOp::List).await;
            self.list_now(path)
        })
    }

    fn delete_entries<'a>(&'a self, paths: &'a [String]) -> LocalBoxFuture<'a, PortResult<DeleteReport>> {
        self.record(PortCall::Delete {
            paths: paths.to_vec(),
        });
        Box::pin(async move {
            self.wait_if_paused(PortOp::Delete).await;
            self.delete_now(paths)
        })
    }

    fn move_entry<'a>(&'a self, source: &'a str, destination: &'a str) -> LocalBoxFuture<'a, PortResult<()>> {
        self.record(PortCall::Move {
            source: source.to_string(),
            destination: destination.to_string(),
        });
        Box::pin(async move {
            self.wait_if_paused(PortOp::Move).await;
            self.move_now(source, destination)
        })
    }

    fn create_directory<'a>(&'a self, parent: &'a str, name: &'a str) -> LocalBoxFuture<'a, PortResult<()>> {
        self.record(PortCall::CreateDirectory {
            parent: parent.to_string(),
            name: name.to_string(),
        });
        Box::pin(async move {
            self.wait_if_paused(PortOp::CreateDirectory).await;
            self.create_dir_now(parent, name)
        })
    }

    fn upload_file<'a>(&'a self, file: &'a UploadFile, directory: &'a str) -> LocalBoxFuture<'a, PortResult<()>> {
        self.record(PortCall::Upload {
            name: file.name.clone(),
            directory: directory.to_string(),
        });
        Box::pin(async move {
            self.wait_if_paused(PortOp::Upload).await;
            self.upload_now(file, directory)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_dir("/docs")
            .with_file("/docs/a.txt", 3)
            .with_file("/b.txt", 5)
    }

    #[tokio::test]
    async fn test_list_directory() {
        let store = store();
        let listing = store.list_directory("/").await.unwrap();
        let names: Vec<_> = listing.names().collect();
        assert_eq!(names, vec!["b.txt", "docs"]);

        let err = store.list_directory("/missing").await.unwrap_err();
        assert_eq!(err.kind, PortErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_move_directory_carries_children() {
        let store = store().with_dir("/archive");
        store.move_entry("/docs", "/archive/docs").await.unwrap();
        assert!(store.exists("/archive/docs/a.txt"));
        assert!(!store.exists("/docs"));
        assert_eq!(
            store.entry("/archive/docs/a.txt").map(|e| e.name.to_string()),
            Some("a.txt".to_string())
        );
    }

    #[tokio::test]
    async fn test_move_refuses_existing_destination() {
        let store = store().with_file("/docs/b.txt", 1);
        let err = store.move_entry("/b.txt", "/docs/b.txt").await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_create_directory_twice() {
        let store = store();
        store.create_directory("/", ".trash").await.unwrap();
        let err = store.create_directory("/", ".trash").await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_delete_reports_per_path() {
        let store = store();
        store.fail_path(
            PortOp::Delete,
            "/b.txt",
            PortError::new(PortErrorKind::Server, "locked"),
        );
        let report = store
            .delete_entries(&["/docs".to_string(), "/b.txt".to_string()])
            .await
            .unwrap();
        assert_eq!(report.deleted, vec!["/docs"]);
        assert_eq!(report.failed[0].reason, "locked");
        assert!(!store.exists("/docs/a.txt"));
    }

    #[tokio::test]
    async fn test_fail_next_is_consumed() {
        let store = store();
        store.fail_next(PortOp::List, PortError::new(PortErrorKind::Network, "offline"));
        assert!(store.list_directory("/").await.is_err());
        assert!(store.list_directory("/").await.is_ok());
        assert_eq!(store.calls_of(PortOp::List).len(), 2);
    }

    #[tokio::test]
    async fn test_upload_sets_size() {
        let store = store();
        let file = UploadFile::new("c.bin", vec![0u8; 7]);
        store.upload_file(&file, "/docs").await.unwrap();
        assert_eq!(store.entry("/docs/c.bin").map(|e| e.size), Some(7));
    }

    #[tokio::test]
    async fn test_pause_op_holds_only_that_kind() {
        let store = store();
        store.pause_op(PortOp::Move);

        let (moved, listed) = tokio::join!(store.move_entry("/b.txt", "/docs/b.txt"), async {
            let listed = store.list_directory("/").await.map(|l| l.len());
            assert!(store.exists("/b.txt"));
            store.resume();
            listed
        });
        moved.unwrap();
        assert_eq!(listed.unwrap(), 2);
        assert!(store.exists("/docs/b.txt"));
    }

    #[test]
    fn test_fixture_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("store.json");
        store().save(&file).unwrap();

        let loaded = MemoryStore::load(&file).unwrap();
        assert_eq!(loaded.paths(), vec!["/b.txt", "/docs", "/docs/a.txt"]);
    }
}
