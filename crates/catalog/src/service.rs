//! Single-consumer processing queue for change events.
//!
//! Notification sources push [`ChangeEvent`]s into a bounded channel; one
//! task drains it and applies each event to the catalog in arrival order.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::CatalogError;
use crate::events::{CatalogEvent, ChangeEvent};
use crate::watcher::LibraryWatcher;

/// Applies queued change events to a [`Catalog`].
///
/// Must be started from within a tokio runtime.
pub struct CatalogService {
    catalog: Catalog,
    events_tx: mpsc::Sender<ChangeEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CatalogService {
    /// Starts draining events pushed through [`sender`](Self::sender).
    pub fn start(catalog: Catalog) -> Self {
        let (events_tx, events_rx) = mpsc::channel(catalog.config().channel_capacity());
        Self::spawn(catalog, events_tx, events_rx, None)
    }

    /// Starts the service with a file watcher on every registered library
    /// folder. Folders registered later, by any catalog operation, are
    /// watched as they appear.
    pub fn start_watching(catalog: Catalog) -> Result<Self, CatalogError> {
        let (events_tx, events_rx) = mpsc::channel(catalog.config().channel_capacity());
        let mut watcher =
            LibraryWatcher::new(events_tx.clone(), catalog.config().library_index_file.clone())?;
        // Subscribe before the first sync so no registration is missed.
        let libraries = catalog.subscribe();
        watcher.sync(catalog.library_folders());
        Ok(Self::spawn(catalog, events_tx, events_rx, Some((watcher, libraries))))
    }

    fn spawn(
        catalog: Catalog,
        events_tx: mpsc::Sender<ChangeEvent>,
        events_rx: mpsc::Receiver<ChangeEvent>,
        watch: Option<Watch>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(catalog.clone(), events_rx, watch, cancel.clone()));
        info!("catalog service started");
        Self {
            catalog,
            events_tx,
            cancel,
            task: Some(task),
        }
    }

    /// Returns a sender for feeding change events into the queue.
    pub fn sender(&self) -> mpsc::Sender<ChangeEvent> {
        self.events_tx.clone()
    }

    /// Queues a change event.
    pub async fn submit(&self, event: ChangeEvent) -> Result<(), CatalogError> {
        self.events_tx
            .send(event)
            .await
            .map_err(|_| CatalogError::Watch("catalog service has stopped".into()))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Stops the service after applying the events already queued.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "catalog service task failed");
            }
        }
        info!("catalog service stopped");
    }
}

impl Drop for CatalogService {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A watcher plus the catalog feed that tells it about new library folders.
type Watch = (LibraryWatcher, broadcast::Receiver<CatalogEvent>);

enum Step {
    Change(ChangeEvent),
    LibrariesChanged,
    FeedClosed,
    Stop,
}

async fn run(
    catalog: Catalog,
    mut events_rx: mpsc::Receiver<ChangeEvent>,
    mut watch: Option<Watch>,
    cancel: CancellationToken,
) {
    loop {
        // Queued events win over cancellation so shutdown drains the queue.
        let step = tokio::select! {
            biased;
            step = next_library_step(&mut watch) => step,
            event = events_rx.recv() => match event {
                Some(event) => Step::Change(event),
                None => Step::Stop,
            },
            _ = cancel.cancelled() => Step::Stop,
        };

        match step {
            Step::Change(event) => {
                let worker = catalog.clone();
                let path = event.path().to_path_buf();
                match tokio::task::spawn_blocking(move || worker.apply(&event)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(path = %path.display(), error = %e, "failed to apply change"),
                    Err(e) => warn!(path = %path.display(), error = %e, "change task failed"),
                }
            }
            Step::LibrariesChanged => {
                if let Some((watcher, _)) = watch.as_mut() {
                    watcher.sync(catalog.library_folders());
                }
            }
            Step::FeedClosed => {
                debug!("catalog feed closed, new library folders will not be watched");
                watch = None;
            }
            Step::Stop => break,
        }
    }
    debug!("catalog event loop exited");
}

/// Waits for a catalog notification that may have registered a library
/// folder. Never resolves when nothing is watched.
async fn next_library_step(watch: &mut Option<Watch>) -> Step {
    let Some((_, libraries)) = watch.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match libraries.recv().await {
            Ok(CatalogEvent::LibraryAdded(_)) => return Step::LibrariesChanged,
            Ok(_) => {}
            // Missed notifications may include new folders.
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "catalog feed lagged, resyncing watches");
                return Step::LibrariesChanged;
            }
            Err(RecvError::Closed) => return Step::FeedClosed,
        }
    }
}
