// lib/src/storage_engine/watch.rs
//
// Live queries. Every write publishes the collection it touched on a
// broadcast channel; a watch task re-runs its query whenever its collection
// changes and forwards the result set. Dropping the `QueryWatch` aborts the
// task, so no snapshot is delivered after the owner lets go of it.

use std::future::Future;

use models::{Collection, Document, HospitalResult};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::storage_engine::query::Query;

const FEED_CAPACITY: usize = 256;
const SNAPSHOT_BUFFER: usize = 16;

pub type Snapshot = HospitalResult<Vec<Document>>;

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Collection>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        ChangeFeed::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        ChangeFeed { tx }
    }

    pub fn publish(&self, collection: Collection) {
        // No receivers is the common case and not an error.
        let _ = self.tx.send(collection);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Collection> {
        self.tx.subscribe()
    }
}

/// Handle to a running live query.
#[derive(Debug)]
pub struct QueryWatch {
    id: Uuid,
    rx: mpsc::Receiver<Snapshot>,
    task: JoinHandle<()>,
}

impl QueryWatch {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the next result set. `None` once the watch has ended.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<Snapshot> {
        self.rx.try_recv().ok()
    }

    pub fn cancel(self) {
        drop(self)
    }
}

impl Drop for QueryWatch {
    fn drop(&mut self) {
        trace!("Cancelling query watch {}", self.id);
        self.task.abort();
    }
}

/// Starts a watch. `changes` must be subscribed before the call so that no
/// write between the first snapshot and the loop is missed.
pub fn spawn_query_watch<F, Fut>(
    query: Query,
    mut changes: broadcast::Receiver<Collection>,
    fetch: F,
) -> QueryWatch
where
    F: Fn(Query) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Snapshot> + Send + 'static,
{
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
    let task = tokio::spawn(async move {
        debug!("Query watch {} started on {}", id, query.collection);
        if tx.send(fetch(query.clone()).await).await.is_err() {
            return;
        }
        loop {
            match changes.recv().await {
                Ok(collection) if collection == query.collection => {}
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Query watch {} lagged by {} changes; resnapshotting", id, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
            if tx.send(fetch(query.clone()).await).await.is_err() {
                break;
            }
        }
        debug!("Query watch {} finished", id);
    });
    QueryWatch { id, rx, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn watch_resnapshots_only_on_its_collection() {
        let feed = ChangeFeed::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut watch = spawn_query_watch(Query::collection(Collection::Appointments), feed.subscribe(), move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(vec![Document::new(n.to_string(), Default::default())]) }
        });

        let first = watch.next().await.unwrap().unwrap();
        assert_eq!(first[0].id, "0");

        feed.publish(Collection::Patients);
        feed.publish(Collection::Appointments);
        let second = watch.next().await.unwrap().unwrap();
        assert_eq!(second[0].id, "1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropping_the_watch_stops_the_task() {
        let feed = ChangeFeed::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut watch = spawn_query_watch(Query::collection(Collection::Patients), feed.subscribe(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Vec::new()) }
        });
        watch.next().await.unwrap().unwrap();
        watch.cancel();
        tokio::task::yield_now().await;

        feed.publish(Collection::Patients);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
