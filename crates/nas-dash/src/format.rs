const IEC_UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
const SI_UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];
const SPARK_BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn scaled(bytes: u64, base: f64, units: &[&str; 7]) -> String {
    if (bytes as f64) < base {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= base && unit < units.len() - 1 {
        value /= base;
        unit += 1;
    }
    if value < 10.0 {
        format!("{value:.1} {}", units[unit])
    } else {
        format!("{value:.0} {}", units[unit])
    }
}

/// Powers of 1024: `16 GiB`, `4.2 KiB`.
pub fn iec_bytes(bytes: u64) -> String {
    scaled(bytes, 1024.0, &IEC_UNITS)
}

/// Powers of 1000, used for throughput: `12 MB`.
pub fn si_bytes(bytes: u64) -> String {
    scaled(bytes, 1000.0, &SI_UNITS)
}

pub fn rate(bytes_per_sec: f64) -> String {
    format!("{}/s", si_bytes(bytes_per_sec.max(0.0) as u64))
}

pub fn uptime(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let days = total / 86_400;
    let hours = (total / 3_600) % 24;
    let mins = (total / 60) % 60;
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{mins}m")
    }
}

pub fn link_speed(mbps: u64) -> Option<String> {
    match mbps {
        0 => None,
        m if m >= 1000 => Some(format!("({} Gbps)", m / 1000)),
        m => Some(format!("({m} Mbps)")),
    }
}

/// One block character per value, scaled between the series min and max.
pub fn sparkline(values: &[f64]) -> String {
    let Some(first) = values.first() else {
        return String::new();
    };
    let (min, max) = values
        .iter()
        .fold((*first, *first), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    values
        .iter()
        .map(|v| {
            let level = if max > min {
                (((v - min) / (max - min)) * 7.0).round().clamp(0.0, 7.0) as usize
            } else if max > 0.0 {
                4
            } else {
                0
            };
            SPARK_BLOCKS[level]
        })
        .collect()
}

pub fn ellipsize(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    if max <= 3 {
        return input.chars().take(max).collect();
    }
    let mut out: String = input.chars().take(max - 3).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iec_bytes_picks_precision_by_magnitude() {
        assert_eq!(iec_bytes(0), "0 B");
        assert_eq!(iec_bytes(1023), "1023 B");
        assert_eq!(iec_bytes(4300), "4.2 KiB");
        assert_eq!(iec_bytes(16 * 1024 * 1024 * 1024), "16 GiB");
    }

    #[test]
    fn si_bytes_uses_decimal_units() {
        assert_eq!(si_bytes(999), "999 B");
        assert_eq!(si_bytes(1_500_000), "1.5 MB");
        assert_eq!(rate(12_000_000.0), "12 MB/s");
    }

    #[test]
    fn uptime_drops_minutes_once_days_appear() {
        assert_eq!(uptime(59.0), "0m");
        assert_eq!(uptime(3_660.0), "1h 1m");
        assert_eq!(uptime(90_000.0), "1d 1h");
    }

    #[test]
    fn link_speed_switches_to_gbps() {
        assert_eq!(link_speed(0), None);
        assert_eq!(link_speed(100).as_deref(), Some("(100 Mbps)"));
        assert_eq!(link_speed(10_000).as_deref(), Some("(10 Gbps)"));
    }

    #[test]
    fn sparkline_scales_between_min_and_max() {
        assert_eq!(sparkline(&[]), "");
        assert_eq!(sparkline(&[0.0, 50.0, 100.0]), "▁▅█");
        assert_eq!(sparkline(&[20.0, 20.0]), "▅▅");
        assert_eq!(sparkline(&[0.0, 0.0]), "▁▁");
    }

    #[test]
    fn ellipsize_keeps_short_input() {
        assert_eq!(ellipsize("tank", 10), "tank");
        assert_eq!(ellipsize("tank/media/photos", 10), "tank/me...");
    }
}
