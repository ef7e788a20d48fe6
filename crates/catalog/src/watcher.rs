//! File-system change source for library folders, built on `notify`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use steamshelf_steam::manifest_id;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::CatalogError;
use crate::events::{ChangeEvent, ChangeKind, Entity};

/// Watches library folders and forwards manifest and library-index changes.
pub struct LibraryWatcher {
    watcher: RecommendedWatcher,
    watched: BTreeSet<PathBuf>,
}

impl LibraryWatcher {
    /// Creates a watcher that sends classified changes into `tx`.
    ///
    /// Nothing is watched until [`watch`](Self::watch) is called.
    pub fn new(tx: mpsc::Sender<ChangeEvent>, library_index_file: String) -> Result<Self, CatalogError> {
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in classify(&event, &library_index_file) {
                    // Runs on the notify thread, outside any async context.
                    if let Err(e) = tx.blocking_send(change) {
                        warn!(error = %e, "change queue closed, dropping event");
                    }
                }
            }
            Err(e) => warn!(error = %e, "file watch error"),
        })
        .map_err(|e| CatalogError::Watch(format!("failed to create watcher: {e}")))?;

        Ok(Self {
            watcher,
            watched: BTreeSet::new(),
        })
    }

    /// Starts watching `dir`. Returns `false` if it was already watched.
    pub fn watch(&mut self, dir: &Path) -> Result<bool, CatalogError> {
        if self.watched.contains(dir) {
            return Ok(false);
        }
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| CatalogError::Watch(format!("failed to watch {}: {e}", dir.display())))?;
        self.watched.insert(dir.to_path_buf());
        info!(path = %dir.display(), "watching library folder");
        Ok(true)
    }

    /// Watches every directory in `dirs` not yet watched. Failures are logged.
    pub fn sync<I, P>(&mut self, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for dir in dirs {
            if let Err(e) = self.watch(dir.as_ref()) {
                warn!(error = %e, "failed to watch library folder");
            }
        }
    }

    /// Directories currently watched.
    pub fn watched(&self) -> impl Iterator<Item = &Path> {
        self.watched.iter().map(PathBuf::as_path)
    }
}

/// Maps a raw notify event to catalog change events.
///
/// A file renamed into place yields `Created` followed by `Modified`, so it
/// is inserted if new and refreshed if already known.
pub fn classify(event: &Event, library_index_file: &str) -> Vec<ChangeEvent> {
    const CREATED: &[ChangeKind] = &[ChangeKind::Created];
    const MODIFIED: &[ChangeKind] = &[ChangeKind::Modified];
    const RENAMED: &[ChangeKind] = &[ChangeKind::Created, ChangeKind::Modified];

    let all = event.paths.as_slice();
    let (kinds, paths) = match event.kind {
        EventKind::Create(_) => (CREATED, all),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => (RENAMED, all),
        // `paths` is [from, to].
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            (RENAMED, all.get(1..).unwrap_or_default())
        }
        EventKind::Modify(ModifyKind::Name(_)) => return Vec::new(),
        EventKind::Modify(_) => (MODIFIED, all),
        _ => return Vec::new(),
    };

    let mut changes = Vec::new();
    for path in paths {
        let Some(entity) = classify_path(path, library_index_file) else {
            continue;
        };
        for &kind in kinds {
            changes.push(ChangeEvent::new(kind, entity.clone()));
        }
    }
    if !changes.is_empty() {
        debug!(count = changes.len(), kind = ?event.kind, "classified file change");
    }
    changes
}

fn classify_path(path: &Path, library_index_file: &str) -> Option<Entity> {
    let name = path.file_name()?.to_str()?;
    if name.eq_ignore_ascii_case(library_index_file) {
        Some(Entity::LibraryIndexFile(path.to_path_buf()))
    } else if manifest_id(path).is_some() {
        Some(Entity::ManifestFile(path.to_path_buf()))
    } else {
        None
    }
}
