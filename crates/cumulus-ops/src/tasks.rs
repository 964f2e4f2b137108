//! Task ledger for remote operations.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::watch;
use tracing::debug;

use cumulus_core::UploadFile;

/// Unique identifier of a task within a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum TaskStatus {
    Running,
    Success,
    Failed,
}

/// A remote operation that can be run again after it failed.
///
/// Descriptors are plain data so a ledger can be serialized; the session
/// turns them back into port calls at retry time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RetryAction {
    /// Move entries into a directory.
    MoveEntries {
        sources: Vec<String>,
        destination: String,
    },
    /// Move entries into the trash.
    MoveToTrash { sources: Vec<String> },
    /// Move trashed entries back to the root.
    RestoreFromTrash { names: Vec<String> },
    /// Permanently delete entries.
    DeleteEntries { paths: Vec<String> },
    /// Create a directory.
    CreateDirectory { parent: String, name: String },
    /// Rename an entry within its parent.
    Rename { path: String, new_name: String },
    /// Upload a file.
    Upload {
        file: UploadFile,
        directory: String,
    },
}

impl RetryAction {
    /// Get a description of what a retry would do.
    pub fn description(&self) -> String {
        match self {
            Self::MoveEntries {
                sources,
                destination,
            } => format!("Move {} item(s) to {}", sources.len(), destination),
            Self::MoveToTrash { sources } => format!("Move {} item(s) to trash", sources.len()),
            Self::RestoreFromTrash { names } => format!("Restore {} item(s)", names.len()),
            Self::DeleteEntries { paths } => format!("Delete {} file(s)", paths.len()),
            Self::CreateDirectory { name, .. } => format!("Create folder {name}"),
            Self::Rename { path, new_name } => {
                format!("Rename {} -> {}", cumulus_core::path::file_name(path), new_name)
            }
            Self::Upload { file, .. } => format!("Upload {}", file.name),
        }
    }
}

/// One entry in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Human-readable label, e.g. "Move 3 item(s) to trash".
    pub label: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Reason of the last failure.
    pub error_message: Option<String>,
    /// Outcome summary, e.g. "2 succeeded, 0 failed, 1 skipped".
    pub summary: Option<String>,
    /// Present only when the operation can safely be run again.
    pub retry: Option<RetryAction>,
}

impl Task {
    fn new(id: TaskId, label: String, retry: Option<RetryAction>) -> Self {
        Self {
            id,
            label,
            status: TaskStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            error_message: None,
            summary: None,
            retry,
        }
    }

    /// Check if the task has finished.
    pub fn is_terminal(&self) -> bool {
        self.status != TaskStatus::Running
    }

    /// Check if [`TaskCenter::begin_retry`] would accept this task.
    pub fn is_retryable(&self) -> bool {
        self.status == TaskStatus::Failed && self.retry.is_some()
    }

    fn finish(&mut self, status: TaskStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

/// Bounded ledger of tasks, newest first.
///
/// Every change publishes a snapshot to receivers obtained from
/// [`subscribe`](Self::subscribe).
#[derive(Debug)]
pub struct TaskCenter {
    tasks: VecDeque<Task>,
    limit: usize,
    next_id: u64,
    tx: watch::Sender<Vec<Task>>,
}

impl Default for TaskCenter {
    fn default() -> Self {
        Self::new(30)
    }
}

impl TaskCenter {
    /// Create a ledger keeping at most `limit` tasks.
    pub fn new(limit: usize) -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            tasks: VecDeque::with_capacity(limit.min(1000)),
            limit: limit.max(1),
            next_id: 1,
            tx,
        }
    }

    /// Record a new running task.
    ///
    /// The oldest task is evicted once the limit is reached, whatever its
    /// status.
    pub fn start_task(&mut self, label: impl Into<String>, retry: Option<RetryAction>) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;

        self.tasks.push_front(Task::new(id, label.into(), retry));
        while self.tasks.len() > self.limit {
            if let Some(evicted) = self.tasks.pop_back() {
                debug!(task_id = %evicted.id, "Evicted task from ledger");
            }
        }

        self.publish();
        id
    }

    /// Mark a running task as succeeded.
    pub fn complete_task(&mut self, id: TaskId, summary: Option<String>) {
        if let Some(task) = self.running_mut(id) {
            task.finish(TaskStatus::Success);
            task.summary = summary;
            self.publish();
        }
    }

    /// Mark a running task as failed.
    pub fn fail_task(&mut self, id: TaskId, message: impl Into<String>) {
        if let Some(task) = self.running_mut(id) {
            task.finish(TaskStatus::Failed);
            task.error_message = Some(message.into());
            self.publish();
        }
    }

    /// Attach an outcome summary to a task in any state.
    pub fn set_summary(&mut self, id: TaskId, summary: impl Into<String>) {
        if let Some(task) = self.get_mut(id) {
            task.summary = Some(summary.into());
            self.publish();
        }
    }

    /// Replace the retry descriptor of a task, e.g. to narrow it to the
    /// items that failed.
    pub fn set_retry(&mut self, id: TaskId, retry: Option<RetryAction>) {
        if let Some(task) = self.get_mut(id) {
            task.retry = retry;
            self.publish();
        }
    }

    /// Move a failed, retryable task back to running.
    ///
    /// Returns the descriptor to execute, or `None` (ledger unchanged) if the
    /// task is missing, not failed, or has no descriptor.
    pub fn begin_retry(&mut self, id: TaskId) -> Option<RetryAction> {
        let task = self.get_mut(id)?;
        if !task.is_retryable() {
            return None;
        }
        task.status = TaskStatus::Running;
        task.finished_at = None;
        task.error_message = None;
        task.summary = None;
        let action = task.retry.clone();
        self.publish();
        action
    }

    /// Remove a task regardless of its status.
    pub fn dismiss_task(&mut self, id: TaskId) -> bool {
        let Some(pos) = self.tasks.iter().position(|t| t.id == id) else {
            return false;
        };
        self.tasks.remove(pos);
        self.publish();
        true
    }

    /// Remove every finished task. Returns how many were removed.
    pub fn clear_finished(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.is_terminal());
        let removed = before - self.tasks.len();
        if removed > 0 {
            self.publish();
        }
        removed
    }

    /// Drop every task.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.publish();
    }

    /// Look up a task.
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Tasks, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Owned copy of the ledger, newest first.
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.iter().cloned().collect()
    }

    /// Receive a snapshot after every ledger change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.tx.subscribe()
    }

    /// Number of tasks in the ledger.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    fn running_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.get_mut(id).filter(|t| !t.is_terminal())
    }

    fn publish(&self) {
        self.tx.send_replace(self.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry() -> Option<RetryAction> {
        Some(RetryAction::DeleteEntries {
            paths: vec!["/a.txt".into()],
        })
    }

    #[test]
    fn test_start_and_complete() {
        let mut center = TaskCenter::new(30);
        let id = center.start_task("Delete 1 file(s)", retry());
        assert_eq!(center.get(id).unwrap().status, TaskStatus::Running);

        center.complete_task(id, Some("done".into()));
        let task = center.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Success);
        assert!(task.finished_at.is_some());
        assert_eq!(task.summary.as_deref(), Some("done"));
    }

    #[test]
    fn test_terminal_transition_happens_once() {
        let mut center = TaskCenter::new(30);
        let id = center.start_task("x", None);
        center.fail_task(id, "boom");
        center.complete_task(id, None);
        let task = center.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_ledger_evicts_oldest_at_limit() {
        let mut center = TaskCenter::new(30);
        let first = center.start_task("task 0", None);
        for i in 1..30 {
            center.start_task(format!("task {i}"), None);
        }
        assert_eq!(center.len(), 30);
        assert!(center.get(first).is_some());

        let newest = center.start_task("task 30", None);
        assert_eq!(center.len(), 30);
        assert!(center.get(first).is_none());
        assert_eq!(center.iter().next().map(|t| t.id), Some(newest));
    }

    #[test]
    fn test_begin_retry_only_for_failed_with_descriptor() {
        let mut center = TaskCenter::new(30);

        let running = center.start_task("running", retry());
        assert!(center.begin_retry(running).is_none());

        let done = center.start_task("done", retry());
        center.complete_task(done, None);
        assert!(center.begin_retry(done).is_none());

        let plain = center.start_task("plain", None);
        center.fail_task(plain, "boom");
        let before = center.snapshot();
        assert!(center.begin_retry(plain).is_none());
        assert_eq!(center.snapshot(), before);

        let failed = center.start_task("failed", retry());
        center.fail_task(failed, "boom");
        assert_eq!(center.begin_retry(failed), retry());
        let task = center.get(failed).unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert!(task.error_message.is_none());
        assert!(task.finished_at.is_none());
    }

    #[test]
    fn test_dismiss_and_clear_finished() {
        let mut center = TaskCenter::new(30);
        let a = center.start_task("a", None);
        let b = center.start_task("b", None);
        let c = center.start_task("c", None);
        center.complete_task(a, None);
        center.fail_task(b, "boom");

        assert_eq!(center.clear_finished(), 2);
        assert_eq!(center.len(), 1);
        assert!(center.get(c).is_some());

        assert!(center.dismiss_task(c));
        assert!(!center.dismiss_task(c));
        assert!(center.is_empty());
    }

    #[test]
    fn test_subscribers_see_changes() {
        let mut center = TaskCenter::new(30);
        let rx = center.subscribe();
        let id = center.start_task("watch me", None);
        assert_eq!(rx.borrow().len(), 1);

        center.fail_task(id, "boom");
        assert_eq!(rx.borrow()[0].status, TaskStatus::Failed);
    }

    #[test]
    fn test_retry_action_serializes() {
        let action = RetryAction::Rename {
            path: "/docs/a.txt".into(),
            new_name: "b.txt".into(),
        };
        let json = serde_json::to_string(&action).unwrap();
        let back: RetryAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
        assert_eq!(action.description(), "Rename a.txt -> b.txt");
    }
}
