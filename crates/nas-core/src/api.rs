//! Upstream data-source seams.
//!
//! Every domain exposes plain request/response calls; the telemetry and
//! app-stats domains also expose a long-lived [`Subscription`]. The dashboard
//! depends only on these traits, never on the transport behind them.

use crate::{
    ApiError, App, AppStats, Dataset, NetworkInterface, Pool, RealtimeUpdate, Snapshot, SystemInfo,
};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

type Closer = Box<dyn FnOnce() + Send + 'static>;

/// A live update channel plus the operation that tears it down upstream.
///
/// Items are `Err` when the source failed mid-stream; `recv` returning `None`
/// means the source closed the stream cleanly. Dropping the handle runs the
/// close operation exactly once.
pub struct Subscription<T> {
    updates: mpsc::Receiver<Result<T, ApiError>>,
    closer: Option<Closer>,
}

impl<T> Subscription<T> {
    pub fn new(updates: mpsc::Receiver<Result<T, ApiError>>) -> Self {
        Self {
            updates,
            closer: None,
        }
    }

    pub fn with_closer(mut self, closer: impl FnOnce() + Send + 'static) -> Self {
        self.closer = Some(Box::new(closer));
        self
    }

    pub async fn recv(&mut self) -> Option<Result<T, ApiError>> {
        self.updates.recv().await
    }

    pub fn close(self) {
        drop(self);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.updates.close();
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("has_closer", &self.closer.is_some())
            .finish()
    }
}

/// Creates a subscription together with the sender that feeds it.
pub fn subscription_channel<T>(
    capacity: usize,
) -> (mpsc::Sender<Result<T, ApiError>>, Subscription<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, Subscription::new(rx))
}

#[async_trait]
pub trait DatasetService: Send + Sync {
    async fn list_pools(&self) -> Result<Vec<Pool>, ApiError>;
    async fn list_datasets(&self) -> Result<Vec<Dataset>, ApiError>;
}

#[async_trait]
pub trait SnapshotService: Send + Sync {
    async fn list_snapshots(&self) -> Result<Vec<Snapshot>, ApiError>;
}

#[async_trait]
pub trait SystemService: Send + Sync {
    async fn info(&self) -> Result<SystemInfo, ApiError>;
    async fn version(&self) -> Result<String, ApiError>;
}

#[async_trait]
pub trait InterfaceService: Send + Sync {
    async fn list_interfaces(&self) -> Result<Vec<NetworkInterface>, ApiError>;
}

#[async_trait]
pub trait ReportingService: Send + Sync {
    async fn subscribe_realtime(&self) -> Result<Subscription<RealtimeUpdate>, ApiError>;
}

#[async_trait]
pub trait AppService: Send + Sync {
    async fn list_apps(&self) -> Result<Vec<App>, ApiError>;
    async fn subscribe_stats(&self) -> Result<Subscription<Vec<AppStats>>, ApiError>;
}

/// The connected service bundle for one appliance.
#[derive(Clone)]
pub struct Services {
    pub datasets: Arc<dyn DatasetService>,
    pub snapshots: Arc<dyn SnapshotService>,
    pub system: Arc<dyn SystemService>,
    pub reporting: Arc<dyn ReportingService>,
    pub interfaces: Arc<dyn InterfaceService>,
    pub apps: Arc<dyn AppService>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Services { .. }")
    }
}
