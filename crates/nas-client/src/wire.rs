//! Middleware payload shapes and their translation into `nas_core` types.

use nas_core::{
    ApiError, App, AppStats, CpuUsage, Dataset, DiskStats, InterfaceRate, LinkState,
    MemoryStats, NetworkInterface, Pool, RealtimeUpdate, Snapshot, SystemInfo,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Reads a byte count that may arrive as a number, a numeric string, or a
/// `{ "parsed": .. }` property object.
fn bytes_of(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        Some(Value::Object(map)) => bytes_of(map.get("parsed").or_else(|| map.get("rawvalue"))),
        _ => 0,
    }
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => text_of(map.get("value").or_else(|| map.get("parsed"))),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn float_of(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

#[derive(Debug, Deserialize)]
struct WirePool {
    id: u64,
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    healthy: bool,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    allocated: Option<u64>,
    #[serde(default)]
    free: Option<u64>,
}

pub fn pools(value: Value) -> Result<Vec<Pool>, ApiError> {
    let wire: Vec<WirePool> = serde_json::from_value(value)?;
    Ok(wire
        .into_iter()
        .map(|pool| Pool {
            id: pool.id,
            name: pool.name,
            status: pool.status,
            healthy: pool.healthy,
            size: pool.size.unwrap_or(0),
            allocated: pool.allocated.unwrap_or(0),
            free: pool.free.unwrap_or(0),
        })
        .collect())
}

pub fn datasets(value: Value) -> Result<Vec<Dataset>, ApiError> {
    let wire: Vec<Map<String, Value>> = serde_json::from_value(value)?;
    Ok(wire
        .into_iter()
        .map(|item| {
            let id = text_of(item.get("id"));
            let name = id.rsplit('/').next().unwrap_or_default().to_string();
            Dataset {
                pool: text_of(item.get("pool")),
                compression: text_of(item.get("compression")),
                used: bytes_of(item.get("used")),
                available: bytes_of(item.get("available")),
                mountpoint: text_of(item.get("mountpoint")),
                name,
                id,
            }
        })
        .collect())
}

pub fn snapshots(value: Value) -> Result<Vec<Snapshot>, ApiError> {
    let wire: Vec<Map<String, Value>> = serde_json::from_value(value)?;
    Ok(wire
        .into_iter()
        .map(|item| {
            let id = text_of(item.get("id").or_else(|| item.get("name")));
            let (dataset_from_id, name_from_id) = id.split_once('@').unwrap_or((id.as_str(), ""));
            let dataset = match text_of(item.get("dataset")) {
                d if d.is_empty() => dataset_from_id.to_string(),
                d => d,
            };
            let snapshot_name = match text_of(item.get("snapshot_name")) {
                n if n.is_empty() => name_from_id.to_string(),
                n => n,
            };
            let properties = item.get("properties").and_then(Value::as_object);
            let property = |key: &str| properties.and_then(|props| props.get(key));
            let has_hold = item
                .get("holds")
                .and_then(Value::as_object)
                .is_some_and(|holds| !holds.is_empty())
                || bytes_of(property("userrefs")) > 0;
            Snapshot {
                used: bytes_of(property("used")),
                referenced: bytes_of(property("referenced")),
                has_hold,
                dataset,
                snapshot_name,
                id,
            }
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct WireSystemInfo {
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    cores: u32,
    #[serde(default)]
    physical_cores: u32,
    #[serde(default)]
    uptime_seconds: f64,
    #[serde(default)]
    physmem: u64,
}

pub fn system_info(value: Value) -> Result<SystemInfo, ApiError> {
    let wire: WireSystemInfo = serde_json::from_value(value)?;
    Ok(SystemInfo {
        hostname: wire.hostname,
        model: wire.model,
        cores: wire.cores,
        physical_cores: wire.physical_cores,
        uptime_seconds: wire.uptime_seconds,
        physical_memory: wire.physmem,
    })
}

fn link_state(raw: &str) -> LinkState {
    match raw {
        "LINK_STATE_UP" | "UP" | "up" => LinkState::Up,
        "LINK_STATE_DOWN" | "DOWN" | "down" => LinkState::Down,
        _ => LinkState::Unknown,
    }
}

pub fn interfaces(value: Value) -> Result<Vec<NetworkInterface>, ApiError> {
    let wire: Vec<Map<String, Value>> = serde_json::from_value(value)?;
    Ok(wire
        .into_iter()
        .map(|item| {
            let state = item
                .get("state")
                .and_then(|state| state.get("link_state"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            NetworkInterface {
                id: text_of(item.get("id")),
                name: text_of(item.get("name")),
                kind: text_of(item.get("type")),
                link_state: link_state(state),
            }
        })
        .collect())
}

pub fn apps(value: Value) -> Result<Vec<App>, ApiError> {
    let wire: Vec<Map<String, Value>> = serde_json::from_value(value)?;
    Ok(wire
        .into_iter()
        .map(|item| App {
            name: text_of(item.get("name")),
            state: text_of(item.get("state")),
        })
        .collect())
}

pub fn app_stats(value: Value) -> Result<Vec<AppStats>, ApiError> {
    let wire: Vec<Map<String, Value>> = serde_json::from_value(value)?;
    Ok(wire
        .into_iter()
        .map(|item| AppStats {
            app_name: text_of(item.get("app_name")),
            cpu_usage: float_of(item.get("cpu_usage")),
            memory: bytes_of(item.get("memory")),
        })
        .collect())
}

/// Per-core entries are keyed `cpu0`, `cpu1`, .. (or bare indices on older
/// releases); aggregate keys such as `cpu` and `average` are skipped.
fn cpu_cores(cpu: Option<&Value>) -> Vec<CpuUsage> {
    let Some(map) = cpu.and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut cores: Vec<(u32, CpuUsage)> = map
        .iter()
        .filter_map(|(key, entry)| {
            let index = key.strip_prefix("cpu").unwrap_or(key).parse::<u32>().ok()?;
            let usage = CpuUsage {
                usage: float_of(entry.get("usage")),
                temperature: float_of(entry.get("temp")),
            };
            Some((index, usage))
        })
        .collect();
    cores.sort_by_key(|(index, _)| *index);
    cores.into_iter().map(|(_, usage)| usage).collect()
}

pub fn realtime(value: Value) -> Result<RealtimeUpdate, ApiError> {
    let Value::Object(fields) = value else {
        return Err(ApiError::Decode("realtime update is not an object".to_string()));
    };

    let memory = fields.get("memory");
    let memory_field = |key: &str| bytes_of(memory.and_then(|m| m.get(key)));
    let disks = fields.get("disks");
    let disk_field = |key: &str| float_of(disks.and_then(|d| d.get(key)));

    let mut interfaces = HashMap::new();
    if let Some(map) = fields.get("interfaces").and_then(Value::as_object) {
        for (name, entry) in map {
            interfaces.insert(
                name.clone(),
                InterfaceRate {
                    received_bytes_rate: float_of(entry.get("received_bytes_rate")),
                    sent_bytes_rate: float_of(entry.get("sent_bytes_rate")),
                    speed: bytes_of(entry.get("speed")),
                },
            );
        }
    }

    Ok(RealtimeUpdate {
        cpu: cpu_cores(fields.get("cpu")),
        memory: MemoryStats {
            physical_total: memory_field("physical_memory_total"),
            physical_available: memory_field("physical_memory_available"),
            arc_size: memory_field("arc_size"),
        },
        disks: DiskStats {
            busy_percent: disk_field("busy"),
            read_bytes: disk_field("read_bytes"),
            write_bytes: disk_field("write_bytes"),
        },
        interfaces,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn realtime_orders_cores_and_skips_aggregate() {
        let update = realtime(json!({
            "cpu": {
                "cpu": {"usage": 50.0},
                "cpu1": {"usage": 30.0, "temp": 61.0},
                "cpu0": {"usage": 10.0, "temp": 58.0}
            },
            "memory": {
                "physical_memory_total": 1000,
                "physical_memory_available": 250,
                "arc_size": 400
            },
            "disks": {"busy": 12.5, "read_bytes": 2048.0, "write_bytes": 1024.0},
            "interfaces": {
                "enp24s0": {"received_bytes_rate": 10.0, "sent_bytes_rate": 20.0, "speed": 1000}
            }
        }))
        .expect("decode");

        assert_eq!(update.cpu.len(), 2);
        assert_eq!(update.cpu[0].usage, 10.0);
        assert_eq!(update.cpu[1].temperature, 61.0);
        assert_eq!(update.memory.used(), 750);
        assert_eq!(update.memory.arc_size, 400);
        assert_eq!(update.disks.busy_percent, 12.5);
        assert_eq!(update.interfaces["enp24s0"].speed, 1000);
    }

    #[test]
    fn realtime_rejects_non_object() {
        assert!(matches!(realtime(json!([1, 2])), Err(ApiError::Decode(_))));
    }

    #[test]
    fn datasets_read_property_objects() {
        let list = datasets(json!([{
            "id": "tank/media",
            "pool": "tank",
            "compression": {"value": "LZ4"},
            "used": {"parsed": 4096},
            "available": {"parsed": "8192"},
            "mountpoint": "/mnt/tank/media"
        }]))
        .expect("decode");
        assert_eq!(list[0].name, "media");
        assert_eq!(list[0].compression, "LZ4");
        assert_eq!(list[0].used, 4096);
        assert_eq!(list[0].available, 8192);
    }

    #[test]
    fn snapshots_fall_back_to_id_components() {
        let list = snapshots(json!([{
            "id": "tank/data@auto-2024",
            "properties": {"used": {"parsed": 10}, "referenced": {"parsed": 20}},
            "holds": {"keep": 1}
        }]))
        .expect("decode");
        assert_eq!(list[0].dataset, "tank/data");
        assert_eq!(list[0].snapshot_name, "auto-2024");
        assert_eq!(list[0].referenced, 20);
        assert!(list[0].has_hold);
    }

    #[test]
    fn interfaces_map_link_state() {
        let list = interfaces(json!([
            {"id": "eno1", "name": "eno1", "type": "PHYSICAL", "state": {"link_state": "LINK_STATE_UP"}},
            {"id": "eno2", "name": "eno2", "type": "PHYSICAL", "state": {"link_state": "LINK_STATE_DOWN"}}
        ]))
        .expect("decode");
        assert!(list[0].is_up());
        assert_eq!(list[1].link_state, LinkState::Down);
    }

    #[test]
    fn pools_tolerate_missing_sizes() {
        let list = pools(json!([{"id": 1, "name": "tank", "status": "ONLINE", "size": null}]))
            .expect("decode");
        assert_eq!(list[0].size, 0);
        assert!(list[0].is_online());
    }
}
