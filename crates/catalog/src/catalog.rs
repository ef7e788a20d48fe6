//! The installed-games catalog.
//!
//! All mutations run under one mutex, so each operation sees the state left
//! by the previous one. Readers get clones, never references into the live
//! maps. Games and library folders are only ever added.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use steamshelf_steam::{GameRecord, SteamError, library, manifest, manifest_id};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::events::{CatalogEvent, ChangeEvent, ChangeKind, Entity};

/// Looks up the Steam install directory.
pub type InstallPathResolver = Arc<dyn Fn() -> Option<PathBuf> + Send + Sync>;

/// A non-fatal problem found while scanning.
#[derive(Debug)]
pub enum ScanWarning {
    /// A second manifest claimed an id that is already catalogued. The
    /// existing record was kept.
    DuplicateGameId {
        id: String,
        path: PathBuf,
        existing: PathBuf,
    },
    /// A manifest could not be read or decoded and was skipped.
    Manifest { path: PathBuf, error: SteamError },
    /// The library index could not be read; additional libraries were not
    /// scanned.
    LibraryIndex { path: PathBuf, error: SteamError },
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanWarning::DuplicateGameId { id, path, existing } => write!(
                f,
                "duplicate game id '{id}' in {} (already loaded from {})",
                path.display(),
                existing.display()
            ),
            ScanWarning::Manifest { path, error } => {
                write!(f, "skipped manifest {}: {error}", path.display())
            }
            ScanWarning::LibraryIndex { path, error } => {
                write!(f, "unreadable library index {}: {error}", path.display())
            }
        }
    }
}

/// Outcome of a scan: what was added and what was skipped.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Ids of newly inserted games, in scan order.
    pub added: Vec<String>,
    /// Library folders registered by this scan.
    pub folders: Vec<PathBuf>,
    pub warnings: Vec<ScanWarning>,
}

impl ScanReport {
    fn merge(&mut self, other: ScanReport) {
        self.added.extend(other.added);
        self.folders.extend(other.folders);
        self.warnings.extend(other.warnings);
    }

    /// True if nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

struct CatalogState {
    games: HashMap<String, GameRecord>,
    library_folders: BTreeSet<PathBuf>,
    install_root: Option<PathBuf>,
    events: broadcast::Sender<CatalogEvent>,
}

/// Shared handle to the catalog of installed Steam games.
///
/// Cloning is cheap and every clone operates on the same state.
#[derive(Clone)]
pub struct Catalog {
    state: Arc<Mutex<CatalogState>>,
    config: Arc<CatalogConfig>,
    resolver: InstallPathResolver,
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Catalog {
    /// Creates an empty catalog that locates Steam with the platform resolver.
    pub fn new(config: CatalogConfig) -> Self {
        Self::with_resolver(config, steamshelf_steam::resolve_install_path)
    }

    /// Creates an empty catalog with a custom install-path resolver.
    pub fn with_resolver<F>(config: CatalogConfig, resolver: F) -> Self
    where
        F: Fn() -> Option<PathBuf> + Send + Sync + 'static,
    {
        let (events, _) = broadcast::channel(config.channel_capacity());
        Self {
            state: Arc::new(Mutex::new(CatalogState {
                games: HashMap::new(),
                library_folders: BTreeSet::new(),
                install_root: None,
                events,
            })),
            config: Arc::new(config),
            resolver: Arc::new(resolver),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Subscribes to catalog notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.lock().events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves the install path and runs a full discovery.
    pub fn discover(&self) -> Result<ScanReport, CatalogError> {
        let root = self
            .config
            .install_path
            .clone()
            .or_else(|| (self.resolver)())
            .ok_or(CatalogError::NotInstalled)?;
        Ok(self.discover_all(&root))
    }

    /// Rebuilds the game map from the main library and every library listed
    /// in its index.
    ///
    /// Listed libraries that are already registered are not rescanned.
    pub fn discover_all(&self, root: &Path) -> ScanReport {
        let mut state = self.lock();
        state.games.clear();
        state.install_root = Some(root.to_path_buf());

        let paths = self.config.paths(root);
        let steamapps = paths.steamapps_dir();
        info!(root = %root.display(), "discovering steam libraries");

        let mut report = state.scan_directory(&steamapps);

        let index = steamapps.join(&self.config.library_index_file);
        if index.is_file() {
            let mut scanned = state.library_folders.clone();
            match library::load_scan_roots(&index, &self.config.steamapps_dir) {
                Ok(roots) => report.merge(state.scan_new_roots(roots, &mut scanned)),
                Err(error) => {
                    warn!(path = %index.display(), error = %error, "failed to read library index");
                    report
                        .warnings
                        .push(ScanWarning::LibraryIndex { path: index, error });
                }
            }
        }

        info!(
            games = state.games.len(),
            folders = state.library_folders.len(),
            warnings = report.warnings.len(),
            "discovery complete"
        );
        report
    }

    /// Registers `path` as a library folder and loads its manifests.
    ///
    /// Does nothing if `path` is not a directory.
    pub fn scan_directory(&self, path: &Path) -> ScanReport {
        self.lock().scan_directory(path)
    }

    /// Loads a newly created manifest.
    ///
    /// Returns the inserted record, or `None` if its id was already known.
    pub fn on_manifest_created(&self, path: &Path) -> Result<Option<GameRecord>, CatalogError> {
        let mut state = self.lock();
        let game = manifest::load(path)?;
        Ok(state.insert_game(game).ok())
    }

    /// Refreshes a known game from `path`.
    ///
    /// Returns `false` if `id` is not catalogued; modifications never create
    /// records.
    pub fn on_manifest_modified(&self, id: &str, path: &Path) -> Result<bool, CatalogError> {
        self.lock().refresh_game(id, path)
    }

    /// Re-reads a known game from the manifest it was last loaded from.
    pub fn reload(&self, id: &str) -> Result<bool, CatalogError> {
        let mut state = self.lock();
        let Some(path) = state.games.get(id).map(|g| g.manifest_path.clone()) else {
            return Ok(false);
        };
        state.refresh_game(id, &path)
    }

    /// Scans libraries newly listed in the library index at `path`.
    ///
    /// Libraries already registered are left alone, including ones the
    /// index no longer lists. Once an install root is known, only its own
    /// index is followed; index files in other libraries are ignored.
    pub fn on_library_index_changed(&self, path: &Path) -> Result<ScanReport, CatalogError> {
        let mut state = self.lock();
        if let Some(root) = &state.install_root {
            let main_index = self
                .config
                .paths(root)
                .steamapps_dir()
                .join(&self.config.library_index_file);
            if path != main_index.as_path() {
                debug!(path = %path.display(), "ignoring library index outside the main library");
                return Ok(ScanReport::default());
            }
        }
        let roots = library::load_scan_roots(path, &self.config.steamapps_dir)?;
        let mut scanned = state.library_folders.clone();
        Ok(state.scan_new_roots(roots, &mut scanned))
    }

    /// Dispatches a change event to the matching operation.
    pub fn apply(&self, event: &ChangeEvent) -> Result<(), CatalogError> {
        debug!(kind = ?event.kind, path = %event.path().display(), "applying change");
        match (&event.kind, &event.entity) {
            (ChangeKind::Created, Entity::ManifestFile(path)) => {
                self.on_manifest_created(path)?;
            }
            (ChangeKind::Modified, Entity::ManifestFile(path)) => {
                let id = manifest_id(path).ok_or_else(|| CatalogError::NotAManifest(path.clone()))?;
                self.on_manifest_modified(id, path)?;
            }
            (_, Entity::LibraryIndexFile(path)) => {
                self.on_library_index_changed(path)?;
            }
        }
        Ok(())
    }

    /// Snapshot of all games, sorted by id.
    pub fn games(&self) -> Vec<GameRecord> {
        let mut games: Vec<GameRecord> = self.lock().games.values().cloned().collect();
        games.sort_by(|a, b| a.id.cmp(&b.id));
        games
    }

    /// Snapshot of a single game.
    pub fn game(&self, id: &str) -> Option<GameRecord> {
        self.lock().games.get(id).cloned()
    }

    /// Snapshot of the registered library folders, sorted.
    pub fn library_folders(&self) -> Vec<PathBuf> {
        self.lock().library_folders.iter().cloned().collect()
    }

    /// The install root used by the last discovery.
    pub fn install_root(&self) -> Option<PathBuf> {
        self.lock().install_root.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().games.is_empty()
    }
}

impl CatalogState {
    fn emit(&self, event: CatalogEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn scan_directory(&mut self, path: &Path) -> ScanReport {
        let mut report = ScanReport::default();
        if !path.is_dir() {
            debug!(path = %path.display(), "library folder missing, skipping");
            return report;
        }

        if self.library_folders.insert(path.to_path_buf()) {
            info!(path = %path.display(), "registered library folder");
            report.folders.push(path.to_path_buf());
            self.emit(CatalogEvent::LibraryAdded(path.to_path_buf()));
        }

        let manifests = match list_manifests(path) {
            Ok(manifests) => manifests,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to list library folder");
                return report;
            }
        };

        for manifest_path in manifests {
            match manifest::load(&manifest_path) {
                Ok(game) => match self.insert_game(game) {
                    Ok(game) => report.added.push(game.id),
                    Err(warning) => report.warnings.push(warning),
                },
                Err(error) => {
                    warn!(path = %manifest_path.display(), error = %error, "skipping manifest");
                    report.warnings.push(ScanWarning::Manifest {
                        path: manifest_path,
                        error,
                    });
                }
            }
        }

        debug!(
            path = %path.display(),
            added = report.added.len(),
            "scanned library folder"
        );
        report
    }

    /// Scans each root not yet in `scanned`, recording the ones it visits.
    fn scan_new_roots(&mut self, roots: Vec<PathBuf>, scanned: &mut BTreeSet<PathBuf>) -> ScanReport {
        let mut report = ScanReport::default();
        for root in roots {
            if !scanned.insert(root.clone()) {
                debug!(path = %root.display(), "library already scanned");
                continue;
            }
            report.merge(self.scan_directory(&root));
        }
        report
    }

    /// Inserts a game unless its id is taken; the first record wins.
    fn insert_game(&mut self, game: GameRecord) -> Result<GameRecord, ScanWarning> {
        match self.games.entry(game.id.clone()) {
            Entry::Occupied(existing) => {
                warn!(
                    id = %game.id,
                    path = %game.manifest_path.display(),
                    existing = %existing.get().manifest_path.display(),
                    "duplicate game id, keeping first"
                );
                Err(ScanWarning::DuplicateGameId {
                    existing: existing.get().manifest_path.clone(),
                    id: game.id,
                    path: game.manifest_path,
                })
            }
            Entry::Vacant(slot) => {
                let game = slot.insert(game).clone();
                debug!(id = %game.id, title = %game.title, "game added");
                self.emit(CatalogEvent::GameAdded(game.clone()));
                Ok(game)
            }
        }
    }

    fn refresh_game(&mut self, id: &str, path: &Path) -> Result<bool, CatalogError> {
        let Some(game) = self.games.get_mut(id) else {
            debug!(id, "ignoring change to unknown game");
            return Ok(false);
        };

        let previous = game.status;
        manifest::reload_into(path, game)?;
        let current = game.status;
        debug!(id, title = %game.title, "game refreshed");

        self.emit(CatalogEvent::GameChanged(id.to_owned()));
        if previous != current {
            self.emit(CatalogEvent::StatusChanged {
                id: id.to_owned(),
                previous,
                current,
            });
        }
        Ok(true)
    }
}

/// Lists the manifest files directly inside `dir`, sorted by path.
fn list_manifests(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut manifests: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && manifest_id(path).is_some())
        .collect();
    manifests.sort();
    Ok(manifests)
}
