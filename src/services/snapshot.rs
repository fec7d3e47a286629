//! Durable book snapshots.
//!
//! After every state-mutating operation the engine nudges the snapshot
//! channel; a single worker coalesces pending nudges, serializes the book
//! and writes two objects per upload: the `current` pointer used for
//! recovery and a timestamped archive for audit. A periodic tick provides a
//! floor so the store never trails the book by more than about a minute.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::RwLock;

use crate::orderbook::OrderBook;

const SNAPSHOT_NAME: &str = "orderbook";

pub fn current_key() -> String {
    format!("{}-current.json", SNAPSHOT_NAME)
}

fn archive_key() -> String {
    format!("{}-{}.json", SNAPSHOT_NAME, Utc::now().timestamp_millis())
}

/// Blob store boundary. The production object-store client implements this
/// trait; the bundled implementation writes a local directory. Futures are
/// `Send` so the upload worker can run on the shared runtime.
pub trait SnapshotStore: Send + Sync {
    fn put(
        &self,
        key: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = anyhow::Result<Option<Vec<u8>>>> + Send;
}

/// Filesystem-backed snapshot store.
pub struct FsSnapshotStore {
    root: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SnapshotStore for FsSnapshotStore {
    async fn put(&self, key: &str, data: &[u8]) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(key), data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.root.join(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Cheap handle the engine holds; nudging it never blocks matching. A full
/// channel is fine: an upload is already pending and will capture this
/// mutation too.
#[derive(Clone)]
pub struct SnapshotHandle {
    tx: mpsc::Sender<()>,
}

impl SnapshotHandle {
    pub fn schedule(&self) {
        let _ = self.tx.try_send(());
    }

    /// A handle wired to nothing. Tests that do not care about snapshots use
    /// this.
    #[cfg(test)]
    pub fn disabled() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }
}

/// Spawn the upload worker. Returns the handle mutations are reported
/// through.
pub fn spawn_snapshot_worker<S>(
    book: Arc<RwLock<OrderBook>>,
    store: Arc<S>,
    period: Duration,
) -> SnapshotHandle
where
    S: SnapshotStore + 'static,
{
    let (tx, mut rx) = mpsc::channel::<()>(16);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // the first tick fires immediately; skip it so boot recovery is not
        // overwritten by an empty book racing the restore
        interval.tick().await;
        loop {
            tokio::select! {
                received = rx.recv() => {
                    if received.is_none() {
                        break;
                    }
                    // coalesce every nudge that arrived while we slept
                    while rx.try_recv().is_ok() {}
                }
                _ = interval.tick() => {}
            }
            upload(&book, store.as_ref()).await;
        }
        tracing::warn!("snapshot worker stopped");
    });
    SnapshotHandle { tx }
}

async fn upload<S: SnapshotStore>(book: &RwLock<OrderBook>, store: &S) {
    let data = {
        let book = book.read().await;
        match book.encode() {
            Ok(data) => data,
            Err(err) => {
                tracing::error!("orderbook encode failed: {}", err);
                return;
            }
        }
    };
    tracing::debug!("uploading orderbook snapshot ({} bytes)", data.len());
    let (archive, current) = futures::future::join(
        store.put(&archive_key(), &data),
        store.put(&current_key(), &data),
    )
    .await;
    if let Err(err) = archive {
        tracing::error!("snapshot archive upload failed: {}", err);
    }
    if let Err(err) = current {
        tracing::error!("snapshot current upload failed: {}", err);
    }
}

/// Fetch and decode the most recent snapshot, if any.
pub async fn recover<S: SnapshotStore>(store: &S) -> anyhow::Result<Option<OrderBook>> {
    match store.get(&current_key()).await? {
        Some(data) => {
            tracing::info!("unmarshalling fetched orderbook");
            Ok(Some(OrderBook::decode(&data)?))
        }
        None => Ok(None),
    }
}
