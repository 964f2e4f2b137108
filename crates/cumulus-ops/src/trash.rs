//! Soft delete through a reserved trash directory.
//!
//! Trashing an entry is a batch move into the trash directory, which is
//! created on demand. Restoring moves entries from the trash back to the
//! root.

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, info};

use cumulus_core::{path, FileDataPort, PortResult, SessionConfig};

use crate::batch::{BatchMoveEngine, MovePlan};

/// Which kind of directory the session is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
pub enum ViewKind {
    #[default]
    Normal,
    Trash,
}

/// Maps trash, restore and purge intents onto port calls.
#[derive(Debug, Clone)]
pub struct TrashCoordinator {
    trash_path: String,
    root_path: String,
}

impl TrashCoordinator {
    /// Create a coordinator for the configured trash and root paths.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            trash_path: config.trash_path.clone(),
            root_path: config.root_path.clone(),
        }
    }

    /// The trash directory.
    pub fn trash_path(&self) -> &str {
        &self.trash_path
    }

    /// View kind for a directory.
    pub fn view_kind(&self, current_path: &str) -> ViewKind {
        if current_path == self.trash_path {
            ViewKind::Trash
        } else {
            ViewKind::Normal
        }
    }

    /// Check whether a path is the trash directory or inside it.
    ///
    /// Such paths are never valid destinations for user moves or renames.
    pub fn is_reserved(&self, path: &str) -> bool {
        path::is_within(path, &self.trash_path)
    }

    /// Full trash paths for entry names.
    pub fn trash_entries(&self, names: &[String]) -> Vec<String> {
        names.iter().map(|n| path::join(&self.trash_path, n)).collect()
    }

    /// Create the trash directory. An existing trash is not an error.
    pub async fn ensure_trash(&self, port: &dyn FileDataPort) -> PortResult<()> {
        let parent = path::parent(&self.trash_path);
        let name = path::file_name(&self.trash_path);
        match port.create_directory(parent, name).await {
            Ok(()) => {
                info!(path = %self.trash_path, "Created trash directory");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!(path = %self.trash_path, "Trash directory already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Ensure the trash exists and plan moving `sources` into it.
    ///
    /// Names already present in the trash become ordinary conflicts.
    pub async fn prepare_trash(
        &self,
        engine: &BatchMoveEngine<'_>,
        sources: &[String],
    ) -> PortResult<MovePlan> {
        self.ensure_trash(engine.port()).await?;
        engine.prepare(sources, &self.trash_path).await
    }

    /// Plan moving trashed entries back to the root.
    ///
    /// The original parent directory is not tracked, so everything lands in
    /// the root.
    pub async fn prepare_restore(
        &self,
        engine: &BatchMoveEngine<'_>,
        names: &[String],
    ) -> PortResult<MovePlan> {
        let sources = self.trash_entries(names);
        engine.prepare(&sources, &self.root_path).await
    }
}
