//! Conflict-aware batch moves.
//!
//! A batch is planned against one listing of the destination directory:
//! sources whose name already exists there (or that are the destination
//! itself) are skipped as conflicts. The remaining moves run one after
//! another, and a failed item never stops the ones after it.

use indexmap::IndexSet;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cumulus_core::{path, DirectoryListing, FileDataPort, PortResult, RetryPolicy};

use crate::cache::CachePatch;
use crate::conflict::Conflict;
use crate::retry::list_with_retry;

/// One requested move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Full path of the entry to move.
    pub source_path: String,
    /// Full path the entry should end up at.
    pub destination_path: String,
}

impl MoveRequest {
    /// Create a new move request.
    pub fn new(source_path: impl Into<String>, destination_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            destination_path: destination_path.into(),
        }
    }

    /// Move `source_path` into `directory`, keeping its name.
    pub fn into_directory(source_path: &str, directory: &str) -> Self {
        Self::new(source_path, path::join(directory, path::file_name(source_path)))
    }

    /// Name of the moved entry.
    pub fn name(&self) -> &str {
        path::file_name(&self.source_path)
    }
}

/// A move that the store rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveFailure {
    pub source_path: String,
    pub reason: String,
}

/// Moves to run and conflicts to skip, computed from one destination listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MovePlan {
    /// Destination directory.
    pub destination: String,
    /// Moves that will be executed, in request order.
    pub moves: Vec<MoveRequest>,
    /// Requests skipped before execution.
    pub conflicts: Vec<Conflict>,
}

impl MovePlan {
    /// Check if there is nothing to execute.
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Sources of the moves that will be executed.
    pub fn sources(&self) -> Vec<String> {
        self.moves.iter().map(|m| m.source_path.clone()).collect()
    }

    /// The optimistic cache edit matching this plan.
    pub fn to_patch(&self) -> CachePatch {
        CachePatch::Move {
            moves: self
                .moves
                .iter()
                .map(|m| (m.source_path.clone(), m.destination_path.clone()))
                .collect(),
        }
    }
}

/// Plan moving `sources` into the directory described by `destination`.
///
/// Duplicate source names are collapsed to their first occurrence.
pub fn plan_moves(sources: &[String], destination: &DirectoryListing) -> MovePlan {
    let dir = destination.current_path.as_str();
    let dir_name = path::file_name(dir);
    let existing: IndexSet<&str> = destination.names().collect();

    let mut seen: IndexSet<&str> = IndexSet::new();
    let mut plan = MovePlan {
        destination: dir.to_string(),
        ..MovePlan::default()
    };

    for source in sources {
        let name = path::file_name(source);
        if !seen.insert(name) {
            continue;
        }
        let request = MoveRequest::into_directory(source, dir);
        if source == dir || name == dir_name {
            plan.conflicts
                .push(Conflict::self_move(request.source_path, request.destination_path));
        } else if existing.contains(name) {
            plan.conflicts
                .push(Conflict::name_exists(request.source_path, request.destination_path));
        } else {
            plan.moves.push(request);
        }
    }
    plan
}

/// Aggregate result of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchMoveOutcome {
    /// Moves the store accepted.
    pub success_count: usize,
    /// Moves the store rejected.
    pub failures: Vec<MoveFailure>,
    /// Moves attempted (requested minus conflicts).
    pub total: usize,
    /// Requests skipped as conflicts.
    pub conflicts: usize,
}

impl BatchMoveOutcome {
    /// Check if no attempted move failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Check if some moves succeeded and some failed.
    pub fn is_partial(&self) -> bool {
        self.success_count > 0 && !self.failures.is_empty()
    }

    /// Get a human-readable summary of the batch.
    pub fn summary(&self) -> String {
        format!(
            "{} succeeded, {} failed, {} skipped",
            self.success_count,
            self.failures.len(),
            self.conflicts
        )
    }

    /// Reasons of the failed moves, one per item.
    pub fn failure_message(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("{}: {}", path::file_name(&f.source_path), f.reason))
            .join("; ")
    }

    /// Sources of the failed moves.
    pub fn failed_sources(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.source_path.clone()).collect()
    }
}

/// Runs batch moves through a [`FileDataPort`].
pub struct BatchMoveEngine<'a> {
    port: &'a dyn FileDataPort,
    read_retry: RetryPolicy,
}

impl<'a> BatchMoveEngine<'a> {
    /// Create an engine over a port.
    pub fn new(port: &'a dyn FileDataPort, read_retry: RetryPolicy) -> Self {
        Self { port, read_retry }
    }

    /// The port this engine calls.
    pub fn port(&self) -> &'a dyn FileDataPort {
        self.port
    }

    /// List `destination` once and plan moving `sources` into it.
    pub async fn prepare(&self, sources: &[String], destination: &str) -> PortResult<MovePlan> {
        let listing = list_with_retry(self.port, destination, &self.read_retry).await?;
        let plan = plan_moves(sources, &listing);
        debug!(
            destination,
            moves = plan.moves.len(),
            conflicts = plan.conflicts.len(),
            "Planned batch move"
        );
        Ok(plan)
    }

    /// Execute a plan, counting its conflicts as skipped.
    pub async fn execute_plan(&self, plan: &MovePlan) -> BatchMoveOutcome {
        let mut outcome = self.execute(&plan.moves).await;
        outcome.conflicts = plan.conflicts.len();
        outcome
    }

    /// Execute moves sequentially.
    pub async fn execute(&self, moves: &[MoveRequest]) -> BatchMoveOutcome {
        let mut outcome = BatchMoveOutcome {
            total: moves.len(),
            ..BatchMoveOutcome::default()
        };
        for request in moves {
            match self
                .port
                .move_entry(&request.source_path, &request.destination_path)
                .await
            {
                Ok(()) => {
                    debug!(
                        source = %request.source_path,
                        destination = %request.destination_path,
                        "Moved entry"
                    );
                    outcome.success_count += 1;
                }
                Err(e) => {
                    warn!(source = %request.source_path, error = %e, "Move failed");
                    outcome.failures.push(MoveFailure {
                        source_path: request.source_path.clone(),
                        reason: e.reason,
                    });
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictKind;
    use chrono::Utc;
    use cumulus_core::FileEntry;

    fn dir_listing(dir: &str, names: &[&str]) -> DirectoryListing {
        let entries = names
            .iter()
            .map(|n| FileEntry::file(path::join(dir, n), 1, Utc::now()))
            .collect();
        DirectoryListing::new(dir, entries)
    }

    fn sources(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_plan_skips_existing_names() {
        let destination = dir_listing("/archive", &["a"]);
        let plan = plan_moves(&sources(&["/a", "/b", "/c"]), &destination);

        assert_eq!(plan.sources(), vec!["/b", "/c"]);
        assert_eq!(plan.conflicts.len(), 1);
        assert_eq!(plan.conflicts[0].kind, ConflictKind::NameExists);
        assert_eq!(plan.moves[0].destination_path, "/archive/b");
    }

    #[test]
    fn test_plan_guards_self_move() {
        let destination = dir_listing("/archive", &[]);
        let plan = plan_moves(&sources(&["/archive", "/notes.txt"]), &destination);

        assert_eq!(plan.sources(), vec!["/notes.txt"]);
        assert_eq!(plan.conflicts[0].kind, ConflictKind::SelfMove);
    }

    #[test]
    fn test_plan_collapses_duplicates() {
        let destination = dir_listing("/archive", &[]);
        let plan = plan_moves(&sources(&["/a", "/a", "/b"]), &destination);
        assert_eq!(plan.sources(), vec!["/a", "/b"]);
        assert!(plan.conflicts.is_empty());
    }

    #[test]
    fn test_outcome_summary() {
        let outcome = BatchMoveOutcome {
            success_count: 2,
            failures: vec![],
            total: 2,
            conflicts: 1,
        };
        assert_eq!(outcome.summary(), "2 succeeded, 0 failed, 1 skipped");
        assert!(outcome.is_success());
        assert!(!outcome.is_partial());
    }

    #[test]
    fn test_failure_message_names_items() {
        let outcome = BatchMoveOutcome {
            success_count: 1,
            failures: vec![
                MoveFailure {
                    source_path: "/a.txt".into(),
                    reason: "locked".into(),
                },
                MoveFailure {
                    source_path: "/b.txt".into(),
                    reason: "gone".into(),
                },
            ],
            total: 3,
            conflicts: 0,
        };
        assert_eq!(outcome.failure_message(), "a.txt: locked; b.txt: gone");
        assert!(outcome.is_partial());
    }
}
