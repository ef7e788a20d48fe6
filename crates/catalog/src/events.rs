//! Inbound change events and outbound catalog notifications.

use std::path::{Path, PathBuf};

use steamshelf_steam::{GameRecord, StatusFlags};

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
}

/// Which kind of file changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    /// An `appmanifest_<id>.<ext>` file.
    ManifestFile(PathBuf),
    /// The `libraryfolders.vdf` index.
    LibraryIndexFile(PathBuf),
}

/// A file change reported by a notification source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub entity: Entity,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, entity: Entity) -> Self {
        Self { kind, entity }
    }

    pub fn manifest(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self::new(kind, Entity::ManifestFile(path.into()))
    }

    pub fn library_index(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self::new(kind, Entity::LibraryIndexFile(path.into()))
    }

    /// The path of the changed file.
    pub fn path(&self) -> &Path {
        match &self.entity {
            Entity::ManifestFile(path) | Entity::LibraryIndexFile(path) => path,
        }
    }
}

/// Notifications published by the catalog after a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    /// A game was inserted.
    GameAdded(GameRecord),
    /// A known game was refreshed from its manifest.
    GameChanged(String),
    /// A refresh changed a game's status bits. Sent after `GameChanged`.
    StatusChanged {
        id: String,
        previous: StatusFlags,
        current: StatusFlags,
    },
    /// A library folder was registered.
    LibraryAdded(PathBuf),
}
