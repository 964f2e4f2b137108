//! File-operation orchestrator for cumulus.
//!
//! This crate reconciles optimistic local state against an asynchronous,
//! partially failing remote store. It provides:
//!
//! - [`SelectionController`]: anchor/range/toggle selection over the visible listing
//! - [`DragGestureController`]: click vs. drag disambiguation and drop targets
//! - [`ListingCache`]: cached listings with snapshot/patch/commit/rollback
//! - [`BatchMoveEngine`]: conflict-aware sequential batch moves
//! - [`TrashCoordinator`]: soft delete through a reserved trash directory
//! - [`TaskCenter`]: bounded, observable task ledger with manual retry
//! - [`Session`]: the command surface that wires them together
//!
//! [`MemoryStore`] is an in-memory [`cumulus_core::FileDataPort`] used by the
//! CLI sandbox and the tests.

mod batch;
mod cache;
mod conflict;
mod gesture;
mod memory;
mod notify;
mod retry;
mod selection;
mod session;
mod tasks;
mod trash;
mod view;

pub use batch::{plan_moves, BatchMoveEngine, BatchMoveOutcome, MoveFailure, MovePlan, MoveRequest};
pub use cache::{CachePatch, CacheScope, CacheSnapshot, ListingCache};
pub use conflict::{Conflict, ConflictKind};
pub use gesture::{
    DragGestureController, DropTarget, GestureOutcome, GestureState, Modifiers,
    PendingMoveConfirmation, Point,
};
pub use memory::{FixtureError, MemoryStore, PortCall, PortOp};
pub use notify::{Notification, Notifications, Severity};
pub use retry::list_with_retry;
pub use selection::SelectionController;
pub use session::{Session, SessionError};
pub use tasks::{RetryAction, Task, TaskCenter, TaskId, TaskStatus};
pub use trash::{TrashCoordinator, ViewKind};
pub use view::{visible_entries, FilterPreset, SortMode, ViewOptions};
