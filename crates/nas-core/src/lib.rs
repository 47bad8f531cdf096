use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub mod api;
pub mod error;
pub mod mock;

pub use api::{
    AppService, DatasetService, InterfaceService, ReportingService, Services, SnapshotService,
    Subscription, SystemService,
};
pub use error::ApiError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: u64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub healthy: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub allocated: u64,
    #[serde(default)]
    pub free: u64,
}

impl Pool {
    pub fn is_online(&self) -> bool {
        self.status.eq_ignore_ascii_case("ONLINE")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub pool: String,
    #[serde(default)]
    pub compression: String,
    #[serde(default)]
    pub used: u64,
    #[serde(default)]
    pub available: u64,
    #[serde(default)]
    pub mountpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub dataset: String,
    pub snapshot_name: String,
    #[serde(default)]
    pub used: u64,
    #[serde(default)]
    pub referenced: u64,
    #[serde(default)]
    pub has_hold: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub cores: u32,
    #[serde(default)]
    pub physical_cores: u32,
    #[serde(default)]
    pub uptime_seconds: f64,
    #[serde(default)]
    pub physical_memory: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    Up,
    Down,
    #[default]
    Unknown,
}

impl LinkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Up => "up",
            LinkState::Down => "down",
            LinkState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub link_state: LinkState,
}

impl NetworkInterface {
    pub fn is_up(&self) -> bool {
        self.link_state == LinkState::Up
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub name: String,
    pub state: String,
}

impl App {
    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("RUNNING")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppStats {
    pub app_name: String,
    #[serde(default)]
    pub cpu_usage: f64,
    #[serde(default)]
    pub memory: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub usage: f64,
    #[serde(default)]
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub physical_total: u64,
    pub physical_available: u64,
    #[serde(default)]
    pub arc_size: u64,
}

impl MemoryStats {
    pub fn used(&self) -> u64 {
        self.physical_total.saturating_sub(self.physical_available)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskStats {
    pub busy_percent: f64,
    pub read_bytes: f64,
    pub write_bytes: f64,
}

/// Per-interface throughput from a realtime update. `speed` is in Mbps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRate {
    pub received_bytes_rate: f64,
    pub sent_bytes_rate: f64,
    #[serde(default)]
    pub speed: u64,
}

/// One push from the realtime reporting stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealtimeUpdate {
    /// Per-core usage, in core order.
    #[serde(default)]
    pub cpu: Vec<CpuUsage>,
    #[serde(default)]
    pub memory: MemoryStats,
    #[serde(default)]
    pub disks: DiskStats,
    #[serde(default)]
    pub interfaces: HashMap<String, InterfaceRate>,
}

impl RealtimeUpdate {
    pub fn mean_cpu_usage(&self) -> Option<f64> {
        if self.cpu.is_empty() {
            return None;
        }
        let total: f64 = self.cpu.iter().map(|core| core.usage).sum();
        Some(total / self.cpu.len() as f64)
    }

    pub fn max_cpu_temperature(&self) -> Option<f64> {
        self.cpu
            .iter()
            .map(|core| core.temperature)
            .filter(|temp| *temp > 0.0)
            .fold(None, |acc: Option<f64>, temp| {
                Some(acc.map_or(temp, |current| current.max(temp)))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_cpu_usage_averages_cores() {
        let update = RealtimeUpdate {
            cpu: vec![
                CpuUsage {
                    usage: 10.0,
                    temperature: 40.0,
                },
                CpuUsage {
                    usage: 30.0,
                    temperature: 55.0,
                },
            ],
            ..Default::default()
        };
        assert_eq!(update.mean_cpu_usage(), Some(20.0));
        assert_eq!(update.max_cpu_temperature(), Some(55.0));
    }

    #[test]
    fn empty_update_has_no_cpu_figures() {
        let update = RealtimeUpdate::default();
        assert_eq!(update.mean_cpu_usage(), None);
        assert_eq!(update.max_cpu_temperature(), None);
    }

    #[test]
    fn memory_used_saturates() {
        let memory = MemoryStats {
            physical_total: 10,
            physical_available: 12,
            arc_size: 0,
        };
        assert_eq!(memory.used(), 0);
    }

    #[test]
    fn status_helpers_are_case_insensitive() {
        let pool = Pool {
            status: "online".to_string(),
            ..Default::default()
        };
        assert!(pool.is_online());
        let app = App {
            name: "sonarr".to_string(),
            state: "STOPPED".to_string(),
        };
        assert!(!app.is_running());
    }
}
