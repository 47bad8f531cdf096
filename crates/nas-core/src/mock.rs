//! Closure-backed service doubles.
//!
//! Unset handlers answer with empty data, except subscribe calls, which fail
//! with [`ApiError::Unsupported`] so a supervising loop backs off instead of
//! spinning on an empty stream.

use crate::api::{
    AppService, DatasetService, InterfaceService, ReportingService, Services, SnapshotService,
    Subscription, SystemService,
};
use crate::{
    ApiError, App, AppStats, Dataset, NetworkInterface, Pool, RealtimeUpdate, Snapshot, SystemInfo,
};
use async_trait::async_trait;
use std::sync::Arc;

pub type Handler<T> = Arc<dyn Fn() -> Result<T, ApiError> + Send + Sync>;

fn handler<T>(f: impl Fn() -> Result<T, ApiError> + Send + Sync + 'static) -> Option<Handler<T>> {
    Some(Arc::new(f))
}

fn run_or_default<T: Default>(handler: &Option<Handler<T>>) -> Result<T, ApiError> {
    match handler {
        Some(f) => f(),
        None => Ok(T::default()),
    }
}

fn run_subscribe<T>(
    handler: &Option<Handler<Subscription<T>>>,
    name: &str,
) -> Result<Subscription<T>, ApiError> {
    match handler {
        Some(f) => f(),
        None => Err(ApiError::Unsupported(format!("{name} not mocked"))),
    }
}

#[derive(Clone, Default)]
pub struct MockDatasetService {
    pub list_pools: Option<Handler<Vec<Pool>>>,
    pub list_datasets: Option<Handler<Vec<Dataset>>>,
}

impl MockDatasetService {
    pub fn on_list_pools(
        mut self,
        f: impl Fn() -> Result<Vec<Pool>, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.list_pools = handler(f);
        self
    }

    pub fn on_list_datasets(
        mut self,
        f: impl Fn() -> Result<Vec<Dataset>, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.list_datasets = handler(f);
        self
    }
}

#[async_trait]
impl DatasetService for MockDatasetService {
    async fn list_pools(&self) -> Result<Vec<Pool>, ApiError> {
        run_or_default(&self.list_pools)
    }

    async fn list_datasets(&self) -> Result<Vec<Dataset>, ApiError> {
        run_or_default(&self.list_datasets)
    }
}

#[derive(Clone, Default)]
pub struct MockSnapshotService {
    pub list_snapshots: Option<Handler<Vec<Snapshot>>>,
}

impl MockSnapshotService {
    pub fn on_list_snapshots(
        mut self,
        f: impl Fn() -> Result<Vec<Snapshot>, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.list_snapshots = handler(f);
        self
    }
}

#[async_trait]
impl SnapshotService for MockSnapshotService {
    async fn list_snapshots(&self) -> Result<Vec<Snapshot>, ApiError> {
        run_or_default(&self.list_snapshots)
    }
}

#[derive(Clone, Default)]
pub struct MockSystemService {
    pub info: Option<Handler<SystemInfo>>,
    pub version: Option<Handler<String>>,
}

impl MockSystemService {
    pub fn on_info(
        mut self,
        f: impl Fn() -> Result<SystemInfo, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.info = handler(f);
        self
    }

    pub fn on_version(
        mut self,
        f: impl Fn() -> Result<String, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.version = handler(f);
        self
    }
}

#[async_trait]
impl SystemService for MockSystemService {
    async fn info(&self) -> Result<SystemInfo, ApiError> {
        run_or_default(&self.info)
    }

    async fn version(&self) -> Result<String, ApiError> {
        run_or_default(&self.version)
    }
}

#[derive(Clone, Default)]
pub struct MockInterfaceService {
    pub list_interfaces: Option<Handler<Vec<NetworkInterface>>>,
}

impl MockInterfaceService {
    pub fn on_list_interfaces(
        mut self,
        f: impl Fn() -> Result<Vec<NetworkInterface>, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.list_interfaces = handler(f);
        self
    }
}

#[async_trait]
impl InterfaceService for MockInterfaceService {
    async fn list_interfaces(&self) -> Result<Vec<NetworkInterface>, ApiError> {
        run_or_default(&self.list_interfaces)
    }
}

#[derive(Clone, Default)]
pub struct MockReportingService {
    pub subscribe_realtime: Option<Handler<Subscription<RealtimeUpdate>>>,
}

impl MockReportingService {
    pub fn on_subscribe_realtime(
        mut self,
        f: impl Fn() -> Result<Subscription<RealtimeUpdate>, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.subscribe_realtime = handler(f);
        self
    }
}

#[async_trait]
impl ReportingService for MockReportingService {
    async fn subscribe_realtime(&self) -> Result<Subscription<RealtimeUpdate>, ApiError> {
        run_subscribe(&self.subscribe_realtime, "reporting.realtime")
    }
}

#[derive(Clone, Default)]
pub struct MockAppService {
    pub list_apps: Option<Handler<Vec<App>>>,
    pub subscribe_stats: Option<Handler<Subscription<Vec<AppStats>>>>,
}

impl MockAppService {
    pub fn on_list_apps(
        mut self,
        f: impl Fn() -> Result<Vec<App>, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.list_apps = handler(f);
        self
    }

    pub fn on_subscribe_stats(
        mut self,
        f: impl Fn() -> Result<Subscription<Vec<AppStats>>, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.subscribe_stats = handler(f);
        self
    }
}

#[async_trait]
impl AppService for MockAppService {
    async fn list_apps(&self) -> Result<Vec<App>, ApiError> {
        run_or_default(&self.list_apps)
    }

    async fn subscribe_stats(&self) -> Result<Subscription<Vec<AppStats>>, ApiError> {
        run_subscribe(&self.subscribe_stats, "app.stats")
    }
}

/// One double per domain; `build` turns them into a [`Services`] bundle.
#[derive(Clone, Default)]
pub struct MockServices {
    pub datasets: MockDatasetService,
    pub snapshots: MockSnapshotService,
    pub system: MockSystemService,
    pub reporting: MockReportingService,
    pub interfaces: MockInterfaceService,
    pub apps: MockAppService,
}

impl MockServices {
    pub fn build(self) -> Services {
        Services {
            datasets: Arc::new(self.datasets),
            snapshots: Arc::new(self.snapshots),
            system: Arc::new(self.system),
            reporting: Arc::new(self.reporting),
            interfaces: Arc::new(self.interfaces),
            apps: Arc::new(self.apps),
        }
    }
}
