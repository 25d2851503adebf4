//! Live query subscriptions.
//!
//! Every committed write publishes the tables it touched on a
//! [`ChangeFeed`]. A [`Subscription`] owns a background task that runs its
//! query once, pushes the snapshot, and re-runs the query each time one of
//! the tables it depends on changes.
//!
//! ```text
//!  write ──commit──▶ ChangeFeed ──broadcast──▶ subscription task ──mpsc──▶ caller
//!                                                 │
//!                                                 └── re-run query
//! ```
//!
//! Subscriptions are cold: each one runs its own query and shares no
//! iteration state with any other. Notifications are sent after commit, so a
//! snapshot never observes part of a multi-statement write.

use std::future::Future;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::error::StoreResult;

const FEED_CAPACITY: usize = 256;
const SNAPSHOT_BUFFER: usize = 16;

/// Tables whose writes are published on the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    ChassisRef,
    MotorRef,
    GearRatioRef,
    CarProfile,
}

impl Table {
    /// `car_profile` plus every reference table it joins against.
    pub const PROFILE_WITH_REFS: [Table; 4] = [
        Table::CarProfile,
        Table::ChassisRef,
        Table::MotorRef,
        Table::GearRatioRef,
    ];
}

/// Broadcast of table-level change notifications. Cheap to clone; all
/// clones share one channel.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Table>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Announce committed writes. Having no listeners is not an error.
    pub fn publish(&self, tables: &[Table]) {
        for table in tables {
            let _ = self.tx.send(*table);
        }
    }

    /// Start a live query over `tables`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch<T, F, Fut>(&self, tables: &[Table], query: F) -> Subscription<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = StoreResult<T>> + Send + 'static,
    {
        // Subscribe before the first query so a write landing in between
        // still triggers a refresh.
        let mut changes = self.tx.subscribe();
        let tables = tables.to_vec();
        let (snapshot_tx, snapshot_rx) = mpsc::channel(SNAPSHOT_BUFFER);

        let task = tokio::spawn(async move {
            loop {
                let snapshot = query().await;
                if snapshot_tx.send(snapshot).await.is_err() {
                    return;
                }

                loop {
                    match changes.recv().await {
                        Ok(table) if tables.contains(&table) => break,
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(_)) => break,
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }

                // Collapse a burst of notifications into one re-query.
                while let Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) =
                    changes.try_recv()
                {}
            }
        });

        Subscription {
            rx: snapshot_rx,
            task,
            cancelled: false,
        }
    }
}

/// A push stream of query snapshots.
///
/// The first [`next`](Subscription::next) yields the initial snapshot; later
/// calls wait for the next change. Dropping the subscription cancels it.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::Receiver<StoreResult<T>>,
    task: JoinHandle<()>,
    cancelled: bool,
}

impl<T> Subscription<T> {
    /// Next snapshot, or `None` once cancelled or the feed has shut down.
    pub async fn next(&mut self) -> Option<StoreResult<T>> {
        if self.cancelled {
            return None;
        }
        self.rx.recv().await
    }

    /// Stop receiving snapshots. Never blocks and may be called repeatedly.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.task.abort();
        self.rx.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
