//! Snapshot polling and fan-out.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use village_core::config::{DashboardConfig, PersistenceConfig};
use village_core::error::Result;
use village_core::{DashboardSnapshot, VillageStore};

/// How often and how much the feed reads.
#[derive(Debug, Clone)]
pub struct FeedOptions {
    /// Time between snapshots.
    pub interval: Duration,
    /// Most-recent interactions and actions per snapshot.
    pub recent_limit: usize,
    /// Snapshots buffered per subscriber before it starts lagging.
    pub channel_capacity: usize,
}

impl From<&DashboardConfig> for FeedOptions {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            recent_limit: config.recent_limit,
            channel_capacity: config.channel_capacity,
        }
    }
}

/// Encode `snapshot` as one server-sent event: `data: <json>\n\n`.
///
/// # Errors
///
/// Returns `VillageError::Serialization` if the snapshot cannot be encoded.
pub fn sse_frame(snapshot: &DashboardSnapshot) -> Result<String> {
    Ok(format!("data: {}\n\n", snapshot.to_json()?))
}

/// Handle to a running feed task.
#[derive(Debug)]
pub struct FeedHandle {
    tx: broadcast::Sender<Arc<DashboardSnapshot>>,
    latest: Arc<Mutex<Option<Arc<DashboardSnapshot>>>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Receive every snapshot published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DashboardSnapshot>> {
        self.tx.subscribe()
    }

    /// The most recent snapshot, if any round has succeeded yet.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<DashboardSnapshot>> {
        self.latest.lock().clone()
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(self) {
        // Err only if the task already exited.
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Dashboard feed task ended abnormally");
        }
    }
}

/// Start polling the database at `db_path`.
///
/// The first round runs immediately. The connection is opened lazily and
/// reopened after any failed round, so the feed may start before the
/// simulation has created the database.
///
/// Must be called from within a tokio runtime.
#[must_use]
pub fn spawn_feed(
    db_path: impl AsRef<Path>,
    persistence: &PersistenceConfig,
    options: &FeedOptions,
) -> FeedHandle {
    let (tx, _) = broadcast::channel(options.channel_capacity.max(1));
    let (shutdown, shutdown_rx) = watch::channel(false);
    let latest = Arc::new(Mutex::new(None));

    let poller = Poller {
        db_path: db_path.as_ref().to_path_buf(),
        persistence: persistence.clone(),
        recent_limit: options.recent_limit,
        reader: None,
        tx: tx.clone(),
        latest: latest.clone(),
    };
    let task = tokio::spawn(poller.run(options.interval, shutdown_rx));

    FeedHandle {
        tx,
        latest,
        shutdown,
        task,
    }
}

struct Poller {
    db_path: PathBuf,
    persistence: PersistenceConfig,
    recent_limit: usize,
    reader: Option<Arc<VillageStore>>,
    tx: broadcast::Sender<Arc<DashboardSnapshot>>,
    latest: Arc<Mutex<Option<Arc<DashboardSnapshot>>>>,
}

impl Poller {
    async fn run(mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            path = %self.db_path.display(),
            interval_ms = interval.as_millis(),
            "Dashboard feed started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => self.round().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Dashboard feed stopped");
    }

    async fn round(&mut self) {
        let start = Instant::now();
        let reader = self.reader.take();
        let path = self.db_path.clone();
        let persistence = self.persistence.clone();
        let limit = self.recent_limit;

        let read = tokio::task::spawn_blocking(move || {
            let store = match reader {
                Some(store) => store,
                None => Arc::new(VillageStore::open_read_only(&path, &persistence)?),
            };
            let snapshot = store.snapshot(limit)?;
            Ok::<_, village_core::VillageError>((store, snapshot))
        })
        .await;

        match read {
            Ok(Ok((store, snapshot))) => {
                self.reader = Some(store);
                let snapshot = Arc::new(snapshot);
                *self.latest.lock() = Some(snapshot.clone());
                let receivers = self.tx.send(snapshot).unwrap_or(0);
                debug!(
                    receivers,
                    elapsed_us = start.elapsed().as_micros(),
                    "Dashboard snapshot published"
                );
            }
            Ok(Err(e)) => {
                warn!(path = %self.db_path.display(), error = %e, "Dashboard snapshot failed; will reopen");
            }
            Err(e) => {
                warn!(error = %e, "Dashboard snapshot task panicked");
            }
        }
    }
}
