//! cumulus - client-side file-operation orchestrator for personal cloud storage.
//!
//! The CLI drives a session against a JSON fixture of the remote store, so
//! every operation (optimistic cache patch, batch move, trash, task ledger)
//! can be exercised without a server.
//!
//! Usage:
//!   cumulus --fixture store.json ls [PATH]
//!   cumulus --fixture store.json mv DIR --into TARGET NAMES...
//!   cumulus --fixture store.json trash DIR NAMES...
//!   cumulus --fixture store.json restore NAMES...
//!   cumulus --help

use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, bail, eyre};

use cumulus_core::{SessionConfig, UploadFile};
use cumulus_ops::{MemoryStore, Session, Task, TaskStatus, ViewOptions};

#[derive(Parser)]
#[command(
    name = "cumulus",
    version,
    about = "Client-side file-operation orchestrator for personal cloud storage",
    long_about = "cumulus runs file operations through the same session a UI would use: \
                  optimistic listing updates, conflict-aware batch moves, a trash \
                  directory and a retryable task ledger.\n\n\
                  The remote store is simulated by a JSON fixture."
)]
struct Cli {
    /// JSON fixture holding the remote store
    #[arg(short, long)]
    fixture: PathBuf,

    /// Write the resulting store back to the fixture
    #[arg(short, long)]
    write: bool,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a directory
    Ls {
        /// Directory to list
        #[arg(default_value = "/")]
        path: String,

        /// Include dotfiles and OS metadata files
        #[arg(short = 'a', long)]
        all: bool,

        /// Only show names containing this text
        #[arg(short, long, default_value = "")]
        search: String,
    },

    /// Create a directory
    Mkdir {
        /// Parent directory
        parent: String,
        /// Name of the new directory
        name: String,
    },

    /// Move entries of a directory into another directory
    Mv {
        /// Directory holding the entries
        dir: String,

        /// Destination directory
        #[arg(long)]
        into: String,

        /// Entry names to move
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Move entries to the trash
    Trash {
        /// Directory holding the entries
        dir: String,

        /// Entry names to trash
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Restore entries from the trash to the root
    Restore {
        /// Names inside the trash
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Permanently delete entries from the trash
    Purge {
        /// Names inside the trash
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Rename an entry
    Rename {
        /// Directory holding the entry
        dir: String,
        /// Current name
        from: String,
        /// New name
        to: String,
    },

    /// Upload local files into a directory
    Upload {
        /// Destination directory
        dir: String,

        /// Local files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let store = Rc::new(
        MemoryStore::load(&cli.fixture)
            .with_context(|| format!("Failed to load fixture {}", cli.fixture.display()))?,
    );
    let session = Session::new(store.clone(), SessionConfig::default());

    match cli.command {
        Command::Ls { path, all, search } => {
            session.navigate_to(&path).await?;
            session.set_view_options(ViewOptions {
                search,
                show_hidden: all,
                ..ViewOptions::default()
            });
            print_listing(&session, cli.json)?;
            return Ok(());
        }
        Command::Mkdir { parent, name } => {
            session.navigate_to(&parent).await?;
            session.create_directory(&name).await?;
        }
        Command::Mv { dir, into, names } => {
            select(&session, &dir, &names).await?;
            session.move_selection_to(&into).await?;
        }
        Command::Trash { dir, names } => {
            select(&session, &dir, &names).await?;
            session.move_selection_to_trash().await?;
        }
        Command::Restore { names } => {
            let trash = session.config().trash_path.clone();
            select(&session, &trash, &names).await?;
            session.restore_from_trash().await?;
        }
        Command::Purge { names } => {
            let trash = session.config().trash_path.clone();
            select(&session, &trash, &names).await?;
            session.delete_permanently().await?;
        }
        Command::Rename { dir, from, to } => {
            session.navigate_to(&dir).await?;
            if session.rename_entry(&from, &to).await?.is_none() {
                eprintln!("{from} already has that name");
            }
        }
        Command::Upload { dir, files } => {
            session.navigate_to(&dir).await?;
            let files = files
                .iter()
                .map(|p| read_upload(p))
                .collect::<Result<Vec<_>>>()?;
            session.upload_files(files).await?;
        }
    }

    let tasks = session.tasks();
    print_tasks(&session, &tasks, cli.json)?;

    if cli.write {
        store
            .save(&cli.fixture)
            .with_context(|| format!("Failed to write fixture {}", cli.fixture.display()))?;
        eprintln!("Wrote {}", cli.fixture.display());
    }

    let failed = tasks.iter().filter(|t| t.status == TaskStatus::Failed).count();
    if failed > 0 {
        bail!("{failed} task(s) failed");
    }

    Ok(())
}

/// Navigate to `dir` and select `names`, warning about names that are missing.
async fn select(session: &Session, dir: &str, names: &[String]) -> Result<()> {
    session.navigate_to(dir).await?;
    let selected = session.select_names(names);
    if selected < names.len() {
        for name in names.iter().filter(|n| !session.is_selected(n)) {
            eprintln!("warning: {name} not found in {dir}");
        }
    }
    Ok(())
}

fn read_upload(path: &Path) -> Result<UploadFile> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| eyre!("Invalid file name: {}", path.display()))?;
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(UploadFile::new(name, data))
}

fn print_listing(session: &Session, json: bool) -> Result<()> {
    let entries = session.visible();
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!();
    println!("{}", "─".repeat(60));
    println!(" {} ({} entries)", session.current_path(), entries.len());
    println!("{}", "─".repeat(60));
    for entry in &entries {
        let size = if entry.is_dir() {
            String::new()
        } else {
            format_size(entry.size)
        };
        let marker = if entry.is_dir() { "/" } else { "" };
        println!(
            "  {:<40} {:>10}  {}",
            truncate(&format!("{}{}", entry.name, marker), 40),
            size,
            entry.modified_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    Ok(())
}

fn print_tasks(session: &Session, tasks: &[Task], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(tasks)?);
        return Ok(());
    }

    for task in tasks.iter().rev() {
        let marker = match task.status {
            TaskStatus::Running => "…",
            TaskStatus::Success => "✓",
            TaskStatus::Failed => "✗",
        };
        println!(" {} {} {}", marker, task.id, task.label);
        if let Some(summary) = &task.summary {
            println!("     {summary}");
        }
        if let Some(error) = &task.error_message {
            println!("     error: {error}");
        }
    }
    if let Some(note) = session.notification() {
        println!();
        println!(" [{}] {}", note.severity, note.message);
    }
    Ok(())
}

/// Format bytes as human-readable size.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
