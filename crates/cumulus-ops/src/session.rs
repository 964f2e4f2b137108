//! The orchestrator session: state plus the command surface a UI drives.
//!
//! A [`Session`] is created at login and [`reset`](Session::reset) at logout.
//! All state lives behind `RefCell`s and no borrow is held across an
//! `.await`, so several commands can be in flight at once on one thread.
//!
//! Mutations follow the same shape: start a task, apply an optimistic cache
//! patch, call the port, then either commit (and refetch the touched
//! listings) or roll back and fail the task with a retry descriptor.

use std::cell::{Cell, Ref, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use chrono::Utc;
use compact_str::CompactString;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use cumulus_core::{
    path, DirectoryListing, FileDataPort, FileEntry, PortError, PortResult, SessionConfig,
    UploadFile, ValidationError,
};

use crate::batch::{BatchMoveEngine, BatchMoveOutcome, MovePlan};
use crate::cache::{CachePatch, ListingCache};
use crate::gesture::{
    DragGestureController, GestureOutcome, GestureState, Modifiers, PendingMoveConfirmation, Point,
};
use crate::notify::{Notification, Notifications, Severity};
use crate::retry::list_with_retry;
use crate::selection::SelectionController;
use crate::tasks::{RetryAction, Task, TaskCenter, TaskId};
use crate::trash::{TrashCoordinator, ViewKind};
use crate::view::{visible_entries, ViewOptions};

/// Errors returned directly by session commands.
///
/// Remote failures of mutations are not errors here: they are reported
/// through the task ledger and the notification.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to load {path}: {source}")]
    Transport {
        path: String,
        #[source]
        source: PortError,
    },

    #[error("{0} is reserved and cannot be used as a destination")]
    ReservedDestination(String),

    #[error("No items selected")]
    NothingSelected,

    #[error("No move is waiting for confirmation")]
    NoPendingMove,

    #[error("Restoring is only possible from the trash")]
    NotInTrash,

    #[error("Unknown task {0}")]
    UnknownTask(TaskId),
}

/// Which flavour of batch move to run.
#[derive(Debug, Clone)]
enum MoveKind {
    Directory(String),
    Trash,
    Restore,
}

#[derive(Debug)]
struct ViewState {
    current_path: String,
    options: ViewOptions,
    selection: SelectionController,
    focused: Option<CompactString>,
    pending_move: Option<PendingMoveConfirmation>,
    recent_paths: VecDeque<String>,
    loading: bool,
    load_error: Option<String>,
}

impl ViewState {
    fn new(root: &str) -> Self {
        Self {
            current_path: root.to_string(),
            options: ViewOptions::default(),
            selection: SelectionController::new(),
            focused: None,
            pending_move: None,
            recent_paths: VecDeque::new(),
            loading: false,
            load_error: None,
        }
    }
}

/// One user's browsing and file-operation session.
pub struct Session {
    port: Rc<dyn FileDataPort>,
    config: SessionConfig,
    trash: TrashCoordinator,
    state: RefCell<ViewState>,
    cache: RefCell<ListingCache>,
    tasks: RefCell<TaskCenter>,
    notifications: RefCell<Notifications>,
    gesture: RefCell<DragGestureController>,
    generation: Cell<u64>,
}

impl Session {
    /// Create a session over a port.
    pub fn new(port: Rc<dyn FileDataPort>, config: SessionConfig) -> Self {
        Self {
            port,
            trash: TrashCoordinator::new(&config),
            state: RefCell::new(ViewState::new(&config.root_path)),
            cache: RefCell::new(ListingCache::new()),
            tasks: RefCell::new(TaskCenter::new(config.task_history_limit)),
            notifications: RefCell::new(Notifications::new()),
            gesture: RefCell::new(DragGestureController::new(config.drag_threshold_px)),
            generation: Cell::new(0),
            config,
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ==================== Queries ====================

    /// Directory being shown.
    pub fn current_path(&self) -> String {
        self.state.borrow().current_path.clone()
    }

    /// Cached listing of the current directory.
    pub fn listing(&self) -> Option<DirectoryListing> {
        let path = self.current_path();
        self.cache.borrow().get(&path).cloned()
    }

    /// Read access to the listing cache.
    pub fn cache(&self) -> Ref<'_, ListingCache> {
        self.cache.borrow()
    }

    /// Current listing after search, filters and sorting. Selection and
    /// gesture indices refer to this sequence.
    pub fn visible(&self) -> Vec<FileEntry> {
        let state = self.state.borrow();
        let cache = self.cache.borrow();
        match cache.get(&state.current_path) {
            Some(listing) => visible_entries(&listing.entries, &state.options, Utc::now()),
            None => Vec::new(),
        }
    }

    /// Selected names in selection order.
    pub fn selection(&self) -> Vec<String> {
        self.state.borrow().selection.to_vec()
    }

    /// Check if an entry is selected.
    pub fn is_selected(&self, name: &str) -> bool {
        self.state.borrow().selection.contains(name)
    }

    /// Selection anchor index.
    pub fn selection_anchor(&self) -> Option<usize> {
        self.state.borrow().selection.anchor()
    }

    /// Keyboard-focused entry.
    pub fn focused(&self) -> Option<String> {
        self.state.borrow().focused.as_ref().map(|n| n.to_string())
    }

    /// Active view options.
    pub fn view_options(&self) -> ViewOptions {
        self.state.borrow().options.clone()
    }

    /// Recently visited directories, most recent first.
    pub fn recent_paths(&self) -> Vec<String> {
        self.state.borrow().recent_paths.iter().cloned().collect()
    }

    /// Check if a listing fetch for the current directory is in flight.
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Error of the last failed listing fetch for the current directory.
    pub fn load_error(&self) -> Option<String> {
        self.state.borrow().load_error.clone()
    }

    /// Whether the current directory is the trash.
    pub fn view_kind(&self) -> ViewKind {
        self.trash.view_kind(&self.state.borrow().current_path)
    }

    /// Check if the trash is being shown.
    pub fn is_trash_view(&self) -> bool {
        self.view_kind() == ViewKind::Trash
    }

    /// Task ledger, newest first.
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.borrow().snapshot()
    }

    /// Look up one task.
    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.tasks.borrow().get(id).cloned()
    }

    /// Receive a ledger snapshot after every change.
    pub fn subscribe_tasks(&self) -> watch::Receiver<Vec<Task>> {
        self.tasks.borrow().subscribe()
    }

    /// Notification currently shown.
    pub fn notification(&self) -> Option<Notification> {
        self.notifications.borrow().current().cloned()
    }

    /// Drop awaiting confirmation.
    pub fn pending_move(&self) -> Option<PendingMoveConfirmation> {
        self.state.borrow().pending_move.clone()
    }

    /// Pointer gesture state.
    pub fn gesture_state(&self) -> GestureState {
        self.gesture.borrow().state().clone()
    }

    // ==================== Navigation and view ====================

    /// Validate `raw`, switch to it and fetch its listing.
    ///
    /// The selection, focus and pending move are cleared on every path
    /// change. A listing that arrives after a newer navigation is cached but
    /// not made current.
    pub async fn navigate_to(&self, raw: &str) -> Result<(), SessionError> {
        let target = path::normalize(raw)?;
        info!(path = %target, "Navigating");
        {
            let mut state = self.state.borrow_mut();
            state.current_path = target.clone();
            state.selection.clear();
            state.focused = None;
            state.pending_move = None;
            state.load_error = None;
            state.recent_paths.retain(|p| *p != target);
            state.recent_paths.push_front(target.clone());
            state.recent_paths.truncate(self.config.recent_paths_limit);
        }
        self.gesture.borrow_mut().cancel();
        self.load(target).await
    }

    /// Refetch the current directory.
    pub async fn refresh(&self) -> Result<(), SessionError> {
        let path = self.current_path();
        self.load(path).await
    }

    /// Replace the view options and prune the selection to what stays visible.
    pub fn set_view_options(&self, options: ViewOptions) {
        self.state.borrow_mut().options = options;
        self.prune_selection();
    }

    // ==================== Selection ====================

    /// Click on the visible entry at `index`.
    pub fn click(&self, index: usize, modifiers: Modifiers) {
        let visible = self.visible();
        let Some(entry) = visible.get(index) else {
            return;
        };
        let mut state = self.state.borrow_mut();
        state.focused = Some(entry.name.clone());
        if modifiers.shift {
            state.selection.extend_to(index, &visible);
        } else if modifiers.toggle {
            state.selection.toggle(&entry.name, index);
        } else {
            state.selection.select_only(&entry.name, index);
        }
    }

    /// Select every visible entry.
    pub fn select_all(&self) {
        let visible = self.visible();
        self.state.borrow_mut().selection.select_all(&visible);
    }

    /// Select exactly the given names, ignoring ones that are not visible.
    /// Returns how many were selected.
    pub fn select_names<S: AsRef<str>>(&self, names: &[S]) -> usize {
        let visible = self.visible();
        let mut state = self.state.borrow_mut();
        state.selection.clear();
        for name in names {
            if let Some(index) = visible.iter().position(|e| e.name == name.as_ref()) {
                state.selection.ensure_selected(name.as_ref(), index);
            }
        }
        state.selection.len()
    }

    /// Clear the selection.
    pub fn clear_selection(&self) {
        self.state.borrow_mut().selection.clear();
    }

    /// Move keyboard focus by `delta` rows and select only the focused entry.
    pub fn move_focus(&self, delta: isize) {
        let visible = self.visible();
        let Some(last) = visible.len().checked_sub(1) else {
            return;
        };
        let mut state = self.state.borrow_mut();
        let current = state
            .focused
            .as_ref()
            .and_then(|name| visible.iter().position(|e| e.name == *name));
        let next = match current {
            None => 0,
            Some(idx) => idx.saturating_add_signed(delta).min(last),
        };
        let name = visible[next].name.clone();
        state.selection.select_only(&name, next);
        state.focused = Some(name);
    }

    /// Toggle the focused entry.
    pub fn toggle_focused(&self) {
        let visible = self.visible();
        let mut state = self.state.borrow_mut();
        let Some(name) = state.focused.clone() else {
            return;
        };
        if let Some(index) = visible.iter().position(|e| e.name == name) {
            state.selection.toggle(&name, index);
        }
    }

    /// Context-menu intent: focus an entry and add it to the selection.
    pub fn context_select(&self, name: &str) {
        let visible = self.visible();
        let Some(index) = visible.iter().position(|e| e.name == name) else {
            return;
        };
        let mut state = self.state.borrow_mut();
        state.focused = Some(CompactString::from(name));
        state.selection.ensure_selected(name, index);
    }

    // ==================== Pointer gestures ====================

    /// Pointer pressed over the visible entry at `index`.
    pub fn pointer_down(&self, index: usize, at: Point, modifiers: Modifiers) {
        let visible = self.visible();
        if let Some(entry) = visible.get(index) {
            self.gesture
                .borrow_mut()
                .press(&entry.name, index, at, modifiers);
        }
    }

    /// Pointer moved.
    pub fn pointer_move(&self, to: Point) -> GestureOutcome {
        let state = self.state.borrow();
        self.gesture.borrow_mut().pointer_move(to, &state.selection)
    }

    /// Native drag started on the visible entry at `index`.
    pub fn native_drag_start(&self, index: usize) -> GestureOutcome {
        let visible = self.visible();
        let Some(entry) = visible.get(index) else {
            return GestureOutcome::None;
        };
        let state = self.state.borrow();
        self.gesture
            .borrow_mut()
            .native_drag_start(&entry.name, &state.selection)
    }

    /// Dragging over the visible entry at `index`, or over no row.
    pub fn drag_over(&self, index: Option<usize>) {
        let visible = self.visible();
        let entry = index.and_then(|i| visible.get(i));
        self.gesture.borrow_mut().drag_over(entry);
    }

    /// Pointer released. Clicks update the selection; drops become the
    /// pending move.
    pub fn pointer_up(&self) -> GestureOutcome {
        let current = self.current_path();
        let outcome = self.gesture.borrow_mut().release(&current);
        match &outcome {
            GestureOutcome::Click {
                index, modifiers, ..
            } => self.click(*index, *modifiers),
            GestureOutcome::Drop(pending) => {
                debug!(
                    count = pending.source_names.len(),
                    target = %pending.target_path,
                    "Drop awaiting confirmation"
                );
                self.state.borrow_mut().pending_move = Some(pending.clone());
            }
            _ => {}
        }
        outcome
    }

    /// Escape or pointer cancel.
    pub fn cancel_drag(&self) {
        self.gesture.borrow_mut().cancel();
    }

    // ==================== Moves ====================

    /// Run the move waiting for confirmation.
    pub async fn confirm_pending_move(&self) -> Result<TaskId, SessionError> {
        let (pending, current) = {
            let mut state = self.state.borrow_mut();
            let pending = state.pending_move.take().ok_or(SessionError::NoPendingMove)?;
            (pending, state.current_path.clone())
        };
        self.check_destination(&pending.target_path)?;
        let sources = pending
            .source_names
            .iter()
            .map(|name| path::join(&current, name))
            .collect();
        Ok(self
            .start_and_run(RetryAction::MoveEntries {
                sources,
                destination: pending.target_path,
            })
            .await)
    }

    /// Discard the move waiting for confirmation.
    pub fn cancel_pending_move(&self) {
        let pending = self.state.borrow_mut().pending_move.take();
        if let Some(pending) = pending {
            debug!(target = %pending.target_path, "Pending move cancelled");
            self.notify(Severity::Info, "Move cancelled");
        }
    }

    /// Move the selection into `destination`.
    pub async fn move_selection_to(&self, destination: &str) -> Result<TaskId, SessionError> {
        let destination = path::normalize(destination)?;
        self.check_destination(&destination)?;
        let sources = self.selected_paths()?;
        Ok(self
            .start_and_run(RetryAction::MoveEntries {
                sources,
                destination,
            })
            .await)
    }

    // ==================== Trash and delete ====================

    /// Soft-delete the selection.
    pub async fn move_selection_to_trash(&self) -> Result<TaskId, SessionError> {
        let sources = self.selected_paths()?;
        Ok(self.start_and_run(RetryAction::MoveToTrash { sources }).await)
    }

    /// Move the selected trashed entries back to the root.
    ///
    /// Only valid while the trash is shown, since the selection names
    /// entries of the current directory.
    pub async fn restore_from_trash(&self) -> Result<TaskId, SessionError> {
        if !self.is_trash_view() {
            return Err(SessionError::NotInTrash);
        }
        let names = self.selected_names()?;
        Ok(self.start_and_run(RetryAction::RestoreFromTrash { names }).await)
    }

    /// Permanently delete the selection.
    pub async fn delete_permanently(&self) -> Result<TaskId, SessionError> {
        let paths = self.selected_paths()?;
        Ok(self.start_and_run(RetryAction::DeleteEntries { paths }).await)
    }

    /// Delete key: purge inside the trash, soft-delete elsewhere.
    pub async fn delete_selection(&self) -> Result<TaskId, SessionError> {
        match self.view_kind() {
            ViewKind::Trash => self.delete_permanently().await,
            ViewKind::Normal => self.move_selection_to_trash().await,
        }
    }

    // ==================== Create, rename, upload ====================

    /// Create a directory in the current directory.
    pub async fn create_directory(&self, name: &str) -> Result<TaskId, SessionError> {
        let name = path::validate_name(name)?.to_string();
        let parent = self.current_path();
        self.check_destination(&path::join(&parent, &name))?;
        Ok(self
            .start_and_run(RetryAction::CreateDirectory { parent, name })
            .await)
    }

    /// Rename an entry of the current directory.
    ///
    /// Returns `Ok(None)` without starting a task when the name is unchanged.
    pub async fn rename_entry(
        &self,
        name: &str,
        new_name: &str,
    ) -> Result<Option<TaskId>, SessionError> {
        let new_name = path::validate_name(new_name)?.to_string();
        if new_name == name {
            debug!(name, "Rename to the same name ignored");
            return Ok(None);
        }
        let current = self.current_path();
        self.check_destination(&path::join(&current, &new_name))?;
        let id = self
            .start_and_run(RetryAction::Rename {
                path: path::join(&current, name),
                new_name,
            })
            .await;
        Ok(Some(id))
    }

    /// Upload files into the current directory, one task per file.
    pub async fn upload_files(&self, files: Vec<UploadFile>) -> Result<Vec<TaskId>, SessionError> {
        let directory = self.current_path();
        if self.trash.is_reserved(&directory) {
            return Err(SessionError::ReservedDestination(directory));
        }
        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let id = self
                .start_and_run(RetryAction::Upload {
                    file,
                    directory: directory.clone(),
                })
                .await;
            ids.push(id);
        }
        Ok(ids)
    }

    // ==================== Task ledger ====================

    /// Re-run a failed task in place.
    ///
    /// Returns `Ok(false)` without touching the ledger when the task is
    /// running, succeeded, or has no retry descriptor.
    pub async fn retry_task(&self, id: TaskId) -> Result<bool, SessionError> {
        let action = {
            let mut tasks = self.tasks.borrow_mut();
            if tasks.get(id).is_none() {
                return Err(SessionError::UnknownTask(id));
            }
            tasks.begin_retry(id)
        };
        let Some(action) = action else {
            debug!(task_id = %id, "Task is not retryable");
            return Ok(false);
        };
        info!(task_id = %id, "Retrying task");
        self.run(id, action).await;
        Ok(true)
    }

    /// Remove a task from the ledger.
    pub fn dismiss_task(&self, id: TaskId) -> Result<(), SessionError> {
        if self.tasks.borrow_mut().dismiss_task(id) {
            Ok(())
        } else {
            Err(SessionError::UnknownTask(id))
        }
    }

    /// Remove every finished task.
    pub fn clear_finished_tasks(&self) -> usize {
        self.tasks.borrow_mut().clear_finished()
    }

    /// Hide the current notification.
    pub fn dismiss_notification(&self) {
        self.notifications.borrow_mut().dismiss();
    }

    /// Forget everything: listings, tasks, selection and notification.
    pub fn reset(&self) {
        info!("Resetting session");
        self.generation.set(self.generation.get() + 1);
        *self.state.borrow_mut() = ViewState::new(&self.config.root_path);
        self.cache.borrow_mut().clear();
        self.tasks.borrow_mut().clear();
        self.notifications.borrow_mut().dismiss();
        self.gesture.borrow_mut().cancel();
    }

    // ==================== Internals ====================

    async fn fetch(&self, dir: &str) -> PortResult<DirectoryListing> {
        list_with_retry(self.port.as_ref(), dir, &self.config.read_retry).await
    }

    async fn load(&self, target: String) -> Result<(), SessionError> {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.state.borrow_mut().loading = true;

        let result = self.fetch(&target).await;
        let is_current = self.generation.get() == generation;

        match result {
            Ok(listing) => {
                debug!(path = %target, count = listing.len(), "Listing loaded");
                self.cache.borrow_mut().insert(listing);
                if is_current {
                    {
                        let mut state = self.state.borrow_mut();
                        state.loading = false;
                        state.load_error = None;
                    }
                    self.prune_selection();
                } else {
                    debug!(path = %target, "Listing arrived after navigation moved on");
                }
                Ok(())
            }
            Err(e) => {
                warn!(path = %target, error = %e, "Failed to load listing");
                if is_current {
                    {
                        let mut state = self.state.borrow_mut();
                        state.loading = false;
                        state.load_error = Some(e.reason.clone());
                    }
                    self.notify(Severity::Error, format!("Failed to load {target}: {e}"));
                }
                Err(SessionError::Transport {
                    path: target,
                    source: e,
                })
            }
        }
    }

    fn prune_selection(&self) {
        let visible = self.visible();
        let mut state = self.state.borrow_mut();
        state.selection.retain_visible(&visible);
        let focus_gone = state
            .focused
            .as_ref()
            .is_some_and(|name| !visible.iter().any(|e| e.name == *name));
        if focus_gone {
            state.focused = None;
        }
    }

    fn selected_names(&self) -> Result<Vec<String>, SessionError> {
        let names = self.selection();
        if names.is_empty() {
            return Err(SessionError::NothingSelected);
        }
        Ok(names)
    }

    fn selected_paths(&self) -> Result<Vec<String>, SessionError> {
        let current = self.current_path();
        Ok(self
            .selected_names()?
            .iter()
            .map(|name| path::join(&current, name))
            .collect())
    }

    fn check_destination(&self, destination: &str) -> Result<(), SessionError> {
        if self.trash.is_reserved(destination) {
            warn!(path = destination, "Refused reserved destination");
            return Err(SessionError::ReservedDestination(destination.to_string()));
        }
        Ok(())
    }

    fn notify(&self, severity: Severity, message: impl Into<String>) {
        self.notifications.borrow_mut().show(message, severity);
    }

    async fn start_and_run(&self, action: RetryAction) -> TaskId {
        let label = action.description();
        let id = self
            .tasks
            .borrow_mut()
            .start_task(label.clone(), Some(action.clone()));
        info!(task_id = %id, label = %label, "Task started");
        self.run(id, action).await;
        id
    }

    async fn run(&self, id: TaskId, action: RetryAction) {
        match action {
            RetryAction::MoveEntries {
                sources,
                destination,
            } => {
                self.run_batch(id, sources, MoveKind::Directory(destination))
                    .await
            }
            RetryAction::MoveToTrash { sources } => self.run_batch(id, sources, MoveKind::Trash).await,
            RetryAction::RestoreFromTrash { names } => {
                self.run_batch(id, names, MoveKind::Restore).await
            }
            RetryAction::DeleteEntries { paths } => self.run_delete(id, paths).await,
            RetryAction::CreateDirectory { parent, name } => {
                self.run_create_directory(id, parent, name).await
            }
            RetryAction::Rename { path, new_name } => self.run_rename(id, path, new_name).await,
            RetryAction::Upload { file, directory } => self.run_upload(id, file, directory).await,
        }
    }

    /// `sources` are full paths, except for restores where they are names
    /// inside the trash.
    async fn run_batch(&self, id: TaskId, sources: Vec<String>, kind: MoveKind) {
        let label = self.task_label(id);
        let engine = BatchMoveEngine::new(self.port.as_ref(), self.config.read_retry);
        let planned = match &kind {
            MoveKind::Directory(destination) => engine.prepare(&sources, destination).await,
            MoveKind::Trash => self.trash.prepare_trash(&engine, &sources).await,
            MoveKind::Restore => self.trash.prepare_restore(&engine, &sources).await,
        };
        let plan: MovePlan = match planned {
            Ok(plan) => plan,
            Err(e) => {
                self.fail(id, &label, e.reason);
                return;
            }
        };

        if plan.is_empty() {
            let summary = BatchMoveOutcome {
                conflicts: plan.conflicts.len(),
                ..Default::default()
            }
            .summary();
            self.tasks.borrow_mut().complete_task(id, Some(summary.clone()));
            info!(task_id = %id, "Nothing to move");
            self.notify(Severity::Warning, format!("{label}: {summary}"));
            return;
        }

        let patch = plan.to_patch();
        let snapshot = {
            let mut cache = self.cache.borrow_mut();
            let snapshot = cache.begin(cache.scope_for(&patch));
            cache.apply_patch(&patch);
            snapshot
        };
        self.prune_selection();

        let outcome = engine.execute_plan(&plan).await;
        let summary = outcome.summary();

        if outcome.is_success() {
            let refetch = self.cache.borrow_mut().commit(snapshot);
            self.tasks.borrow_mut().complete_task(id, Some(summary.clone()));
            info!(task_id = %id, summary = %summary, "Task succeeded");
            let severity = if outcome.conflicts > 0 {
                Severity::Warning
            } else {
                Severity::Success
            };
            self.notify(severity, format!("{label}: {summary}"));
            self.reconcile(refetch).await;
            return;
        }

        let touched: Vec<String> = snapshot.keys().map(str::to_string).collect();
        self.cache.borrow_mut().rollback(snapshot);
        let failed = outcome.failed_sources();
        let retry = match kind {
            MoveKind::Directory(destination) => RetryAction::MoveEntries {
                sources: failed,
                destination,
            },
            MoveKind::Trash => RetryAction::MoveToTrash { sources: failed },
            MoveKind::Restore => RetryAction::RestoreFromTrash {
                names: failed
                    .iter()
                    .map(|p| path::file_name(p).to_string())
                    .collect(),
            },
        };
        {
            let mut tasks = self.tasks.borrow_mut();
            tasks.fail_task(id, outcome.failure_message());
            tasks.set_summary(id, summary.clone());
            tasks.set_retry(id, Some(retry));
        }
        warn!(task_id = %id, summary = %summary, "Batch move failed");
        self.notify(Severity::Error, format!("{label}: {summary}"));
        if outcome.success_count > 0 {
            self.reconcile(touched).await;
        }
    }

    async fn run_delete(&self, id: TaskId, paths: Vec<String>) {
        let label = self.task_label(id);
        let patch = CachePatch::Remove {
            paths: paths.clone(),
        };
        let snapshot = {
            let mut cache = self.cache.borrow_mut();
            let snapshot = cache.begin(cache.scope_for(&patch));
            cache.apply_patch(&patch);
            snapshot
        };
        self.prune_selection();

        let report = match self.port.delete_entries(&paths).await {
            Ok(report) => report,
            Err(e) => {
                self.cache.borrow_mut().rollback(snapshot);
                self.prune_selection();
                self.fail(id, &label, e.reason);
                return;
            }
        };

        if report.is_complete() {
            let refetch = self.cache.borrow_mut().commit(snapshot);
            let summary = format!("Deleted {} item(s)", report.deleted.len());
            self.tasks.borrow_mut().complete_task(id, Some(summary.clone()));
            info!(task_id = %id, count = report.deleted.len(), "Task succeeded");
            self.notify(Severity::Success, summary);
            self.reconcile(refetch).await;
            return;
        }

        let touched: Vec<String> = snapshot.keys().map(str::to_string).collect();
        self.cache.borrow_mut().rollback(snapshot);
        let message = report
            .failed
            .iter()
            .map(|f| format!("{}: {}", path::file_name(&f.path), f.reason))
            .collect::<Vec<_>>()
            .join("; ");
        let summary = format!(
            "{} deleted, {} failed",
            report.deleted.len(),
            report.failed.len()
        );
        {
            let mut tasks = self.tasks.borrow_mut();
            tasks.fail_task(id, message);
            tasks.set_summary(id, summary.clone());
            tasks.set_retry(
                id,
                Some(RetryAction::DeleteEntries {
                    paths: report.failed.iter().map(|f| f.path.clone()).collect(),
                }),
            );
        }
        warn!(task_id = %id, summary = %summary, "Delete failed");
        self.notify(Severity::Error, format!("{label}: {summary}"));
        if report.deleted.is_empty() {
            self.prune_selection();
        } else {
            self.reconcile(touched).await;
        }
    }

    async fn run_create_directory(&self, id: TaskId, parent: String, name: String) {
        let label = self.task_label(id);
        match self.port.create_directory(&parent, &name).await {
            Ok(()) => {
                self.succeed(id, &label);
                self.reconcile(vec![parent]).await;
            }
            Err(e) => self.fail(id, &label, e.reason),
        }
    }

    async fn run_rename(&self, id: TaskId, from: String, new_name: String) {
        let label = self.task_label(id);
        let to = path::join(path::parent(&from), &new_name);
        let patch = CachePatch::rename(&from, &new_name);
        let snapshot = {
            let mut cache = self.cache.borrow_mut();
            let snapshot = cache.begin(cache.scope_for(&patch));
            cache.apply_patch(&patch);
            snapshot
        };
        self.prune_selection();

        match self.port.move_entry(&from, &to).await {
            Ok(()) => {
                let refetch = self.cache.borrow_mut().commit(snapshot);
                self.succeed(id, &label);
                self.reconcile(refetch).await;
            }
            Err(e) => {
                self.cache.borrow_mut().rollback(snapshot);
                self.fail(id, &label, e.reason);
            }
        }
    }

    async fn run_upload(&self, id: TaskId, file: UploadFile, directory: String) {
        let label = self.task_label(id);
        match self.port.upload_file(&file, &directory).await {
            Ok(()) => {
                self.succeed(id, &label);
                self.reconcile(vec![directory]).await;
            }
            Err(e) => self.fail(id, &label, e.reason),
        }
    }

    fn task_label(&self, id: TaskId) -> String {
        self.tasks
            .borrow()
            .get(id)
            .map(|t| t.label.clone())
            .unwrap_or_default()
    }

    fn succeed(&self, id: TaskId, label: &str) {
        self.tasks.borrow_mut().complete_task(id, None);
        info!(task_id = %id, "Task succeeded");
        self.notify(Severity::Success, label.to_string());
    }

    fn fail(&self, id: TaskId, label: &str, reason: String) {
        warn!(task_id = %id, error = %reason, "Task failed");
        self.notify(Severity::Error, format!("{label} failed: {reason}"));
        self.tasks.borrow_mut().fail_task(id, reason);
    }

    /// Refetch listings a mutation touched. Only keys that are still cached
    /// are fetched; failures are logged and otherwise ignored.
    async fn reconcile(&self, keys: Vec<String>) {
        for key in keys {
            if !self.cache.borrow().contains(&key) {
                continue;
            }
            match self.fetch(&key).await {
                Ok(listing) => {
                    self.cache.borrow_mut().insert(listing);
                }
                Err(e) => warn!(path = %key, error = %e, "Reconciliation fetch failed"),
            }
        }
        self.prune_selection();
    }
}
