//! Read model shared by the two subscription loops and the dashboard renderer.

use nas_core::{AppStats, RealtimeUpdate};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const CPU_HISTORY_CAPACITY: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Realtime,
    AppStats,
}

impl StreamKind {
    pub fn name(self) -> &'static str {
        match self {
            StreamKind::Realtime => "reporting.realtime",
            StreamKind::AppStats => "app.stats",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamStatus {
    #[default]
    Idle,
    Subscribing,
    Streaming,
    Backoff {
        attempt: u32,
    },
    Stopped,
}

impl StreamStatus {
    pub fn label(self) -> &'static str {
        match self {
            StreamStatus::Idle => "idle",
            StreamStatus::Subscribing => "subscribing",
            StreamStatus::Streaming => "live",
            StreamStatus::Backoff { .. } => "retrying",
            StreamStatus::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    realtime: Option<RealtimeUpdate>,
    app_stats: HashMap<String, AppStats>,
    cpu_history: VecDeque<f64>,
    realtime_status: StreamStatus,
    app_stats_status: StreamStatus,
    realtime_updates: u64,
    app_stats_updates: u64,
}

/// Point-in-time copy handed to the renderer so the lock is never held
/// across a draw.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    pub realtime: Option<RealtimeUpdate>,
    pub app_stats: HashMap<String, AppStats>,
    pub cpu_history: Vec<f64>,
    pub realtime_status: StreamStatus,
    pub app_stats_status: StreamStatus,
}

#[derive(Clone, Default)]
pub struct TelemetryState {
    inner: Arc<Mutex<Inner>>,
}

impl TelemetryState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn merge_realtime(&self, update: RealtimeUpdate) {
        let mean = update.mean_cpu_usage();
        let mut inner = self.lock();
        if let Some(mean) = mean {
            if inner.cpu_history.len() == CPU_HISTORY_CAPACITY {
                inner.cpu_history.pop_front();
            }
            inner.cpu_history.push_back(mean);
        }
        inner.realtime = Some(update);
        inner.realtime_updates += 1;
    }

    pub fn merge_app_stats(&self, stats: Vec<AppStats>) {
        let mut inner = self.lock();
        for entry in stats {
            inner.app_stats.insert(entry.app_name.clone(), entry);
        }
        inner.app_stats_updates += 1;
    }

    pub fn set_status(&self, kind: StreamKind, status: StreamStatus) {
        let mut inner = self.lock();
        match kind {
            StreamKind::Realtime => inner.realtime_status = status,
            StreamKind::AppStats => inner.app_stats_status = status,
        }
    }

    pub fn status(&self, kind: StreamKind) -> StreamStatus {
        let inner = self.lock();
        match kind {
            StreamKind::Realtime => inner.realtime_status,
            StreamKind::AppStats => inner.app_stats_status,
        }
    }

    /// Number of updates merged so far for one stream.
    pub fn update_count(&self, kind: StreamKind) -> u64 {
        let inner = self.lock();
        match kind {
            StreamKind::Realtime => inner.realtime_updates,
            StreamKind::AppStats => inner.app_stats_updates,
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let inner = self.lock();
        TelemetrySnapshot {
            realtime: inner.realtime.clone(),
            app_stats: inner.app_stats.clone(),
            cpu_history: inner.cpu_history.iter().copied().collect(),
            realtime_status: inner.realtime_status,
            app_stats_status: inner.app_stats_status,
        }
    }
}

impl fmt::Debug for TelemetryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("TelemetryState")
            .field("realtime_status", &inner.realtime_status)
            .field("app_stats_status", &inner.app_stats_status)
            .field("cpu_history", &inner.cpu_history.len())
            .finish()
    }
}
