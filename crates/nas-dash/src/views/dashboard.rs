use crossterm::event::KeyEvent;
use nas_core::{App, AppStats, NetworkInterface, RealtimeUpdate, Services, SystemInfo};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Cell, Paragraph, Row, Table, TableState};
use ratatui::Frame;
use std::collections::HashMap;
use tracing::debug;

use super::{panel, render_loading, Fetch, ListCursor, View, ViewData, ViewId};
use crate::format::{ellipsize, iec_bytes, link_speed, rate, sparkline, uptime};
use crate::freshness::Freshness;
use crate::telemetry::{TelemetrySnapshot, TelemetryState};
use crate::theme;

const BAR_WIDTH: usize = 20;

/// Fields fetched once per load; live figures come from [`TelemetryState`].
#[derive(Debug, Clone, Default)]
pub struct DashboardData {
    pub info: SystemInfo,
    pub version: String,
    pub interfaces: Vec<NetworkInterface>,
    pub apps: Vec<App>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppRow {
    pub name: String,
    pub state: String,
    pub cpu_usage: f64,
    pub memory: u64,
}

/// Joins the app list with live stats, busiest first.
pub fn app_rows(apps: &[App], stats: &HashMap<String, AppStats>) -> Vec<AppRow> {
    let mut rows: Vec<AppRow> = apps
        .iter()
        .map(|app| {
            let live = stats.get(&app.name);
            AppRow {
                name: app.name.clone(),
                state: app.state.clone(),
                cpu_usage: live.map_or(0.0, |s| s.cpu_usage),
                memory: live.map_or(0, |s| s.memory),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.cpu_usage.total_cmp(&a.cpu_usage));
    rows
}

#[derive(Debug)]
pub struct DashboardView {
    data: Option<DashboardData>,
    telemetry: TelemetryState,
    cursor: ListCursor,
}

impl DashboardView {
    pub fn new(telemetry: TelemetryState) -> Self {
        Self {
            data: None,
            telemetry,
            cursor: ListCursor::default(),
        }
    }

    pub fn data(&self) -> Option<&DashboardData> {
        self.data.as_ref()
    }

    pub fn telemetry(&self) -> &TelemetryState {
        &self.telemetry
    }

    fn app_count(&self) -> usize {
        self.data.as_ref().map_or(0, |data| data.apps.len())
    }
}

impl View for DashboardView {
    fn id(&self) -> ViewId {
        ViewId::Dashboard
    }

    fn fetch(&self, services: &Services) -> Fetch {
        let system = services.system.clone();
        let interfaces = services.interfaces.clone();
        let apps = services.apps.clone();
        Box::pin(async move {
            let (info, version, interfaces, apps) = tokio::try_join!(
                system.info(),
                system.version(),
                interfaces.list_interfaces(),
                apps.list_apps()
            )?;
            Ok(ViewData::Dashboard(DashboardData {
                info,
                version,
                interfaces,
                apps,
            }))
        })
    }

    fn apply(&mut self, data: ViewData) {
        let ViewData::Dashboard(data) = data else {
            debug!("dashboard view ignored foreign data");
            return;
        };
        self.cursor.clamp(data.apps.len());
        self.data = Some(data);
    }

    fn loaded(&self) -> bool {
        self.data.is_some()
    }

    fn freshness(&self) -> Option<&Freshness> {
        None
    }

    fn freshness_mut(&mut self) -> Option<&mut Freshness> {
        None
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let Some(data) = self.data.as_ref() else {
            render_loading(frame, area, "Dashboard");
            return;
        };
        let live = self.telemetry.snapshot();

        let mut lines = vec![header_line(data), Line::default()];
        lines.extend(gauge_lines(&live));
        let net = network_lines(&data.interfaces, live.realtime.as_ref());
        if !net.is_empty() {
            lines.push(Line::default());
            lines.extend(net);
        }

        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(lines.len() as u16 + 2),
                Constraint::Min(3),
            ])
            .split(area);
        let status = format!(
            "System  realtime:{}  apps:{}",
            live.realtime_status.label(),
            live.app_stats_status.label()
        );
        frame.render_widget(Paragraph::new(lines).block(panel(&status)), sections[0]);
        self.render_apps(frame, sections[1], data, &live);
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let len = self.app_count();
        self.cursor.handle_key(key, len)
    }
}

impl DashboardView {
    fn render_apps(&self, frame: &mut Frame, area: Rect, data: &DashboardData, live: &TelemetrySnapshot) {
        let rows = app_rows(&data.apps, &live.app_stats);
        let running = data.apps.iter().filter(|app| app.is_running()).count();
        let title = format!("APPS ({running} running / {} total)", data.apps.len());

        let header = Row::new(["NAME", "CPU%", "MEM", "STATE"]).style(theme::HEADER_STYLE);
        let name_width = area.width.saturating_sub(36).max(8) as usize;
        let body = rows.iter().map(|row| {
            Row::new(vec![
                Cell::from(ellipsize(&row.name, name_width)),
                Cell::from(format!("{:>7.1}", row.cpu_usage)),
                Cell::from(format!("{:>10}", iec_bytes(row.memory))),
                Cell::from(Span::styled(
                    row.state.clone(),
                    Style::new().fg(theme::app_state_color(&row.state)),
                )),
            ])
        });
        let widths = [
            Constraint::Min(8),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(10),
        ];
        let table = Table::new(body, widths)
            .header(header)
            .block(panel(&title))
            .highlight_style(theme::SELECTED_STYLE);
        let mut state = TableState::default();
        if !rows.is_empty() {
            state.select(Some(self.cursor.selected()));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }
}

fn header_line(data: &DashboardData) -> Line<'static> {
    let mut spans = vec![
        Span::styled(format!("{}  ", data.info.hostname), theme::LABEL_STYLE),
        Span::styled(format!("{}  ", data.version), theme::MUTED_STYLE),
        Span::raw(format!("{}  ", data.info.model)),
    ];
    if data.info.uptime_seconds > 0.0 {
        spans.push(Span::styled(
            format!("Up {}", uptime(data.info.uptime_seconds)),
            theme::MUTED_STYLE,
        ));
    }
    Line::from(spans)
}

/// `CPU  [████████░░░░░░░░░░░░]  42.5%  65°C`
pub(crate) fn gauge_spans(label: &str, percent: f64, suffix: &str) -> Vec<Span<'static>> {
    let percent = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let filled = ((percent / 100.0) * BAR_WIDTH as f64) as usize;
    let mut spans = vec![
        Span::styled(format!("{label:<4} "), theme::LABEL_STYLE),
        Span::raw("["),
        Span::styled(
            "█".repeat(filled),
            Style::new().fg(theme::load_color(percent)),
        ),
        Span::styled(
            "░".repeat(BAR_WIDTH - filled),
            Style::new().fg(theme::EMPTY_BAR),
        ),
        Span::raw("]"),
        Span::raw(format!(" {percent:>5.1}%")),
    ];
    if !suffix.is_empty() {
        spans.push(Span::styled(format!("  {suffix}"), theme::MUTED_STYLE));
    }
    spans
}

fn gauge_lines(live: &TelemetrySnapshot) -> Vec<Line<'static>> {
    let realtime = live.realtime.as_ref();

    let cpu = realtime.and_then(RealtimeUpdate::mean_cpu_usage).unwrap_or(0.0);
    let cpu_suffix = realtime
        .and_then(RealtimeUpdate::max_cpu_temperature)
        .filter(|temp| *temp > 0.0)
        .map(|temp| format!("{temp:.0}°C"))
        .unwrap_or_default();
    let mut cpu_line = gauge_spans("CPU", cpu, &cpu_suffix);
    if !live.cpu_history.is_empty() {
        cpu_line.push(Span::styled(
            format!("  {}", sparkline(&live.cpu_history)),
            Style::new().fg(theme::ACCENT),
        ));
    }

    let (mem, mem_suffix, arc, arc_suffix) = match realtime.map(|rt| &rt.memory) {
        Some(memory) if memory.physical_total > 0 => {
            let total = memory.physical_total as f64;
            let used = memory.used();
            let arc = if memory.arc_size > 0 {
                (memory.arc_size as f64 / total * 100.0, iec_bytes(memory.arc_size))
            } else {
                (0.0, String::new())
            };
            (
                used as f64 / total * 100.0,
                format!("{}/{}", iec_bytes(used), iec_bytes(memory.physical_total)),
                arc.0,
                arc.1,
            )
        }
        _ => (0.0, String::new(), 0.0, String::new()),
    };

    let (disk, disk_suffix) = match realtime.map(|rt| &rt.disks) {
        Some(disks) => (
            disks.busy_percent,
            format!("R:{} W:{}", rate(disks.read_bytes), rate(disks.write_bytes)),
        ),
        None => (0.0, String::new()),
    };

    vec![
        Line::from(cpu_line),
        Line::from(gauge_spans("MEM", mem, &mem_suffix)),
        Line::from(gauge_spans("ARC", arc, &arc_suffix)),
        Line::from(gauge_spans("DISK", disk, &disk_suffix)),
    ]
}

fn network_lines(
    interfaces: &[NetworkInterface],
    realtime: Option<&RealtimeUpdate>,
) -> Vec<Line<'static>> {
    interfaces
        .iter()
        .filter(|iface| iface.is_up())
        .map(|iface| {
            let rates = realtime.and_then(|rt| rt.interfaces.get(&iface.id));
            let rx = rates.map_or(0.0, |r| r.received_bytes_rate);
            let tx = rates.map_or(0.0, |r| r.sent_bytes_rate);
            let mut spans = vec![
                Span::styled(format!("NET  {:<12}", iface.id), theme::LABEL_STYLE),
                Span::styled(format!("▼ {:>10}", rate(rx)), theme::RX_STYLE),
                Span::styled(format!("  ▲ {:>10}", rate(tx)), theme::TX_STYLE),
            ];
            if let Some(speed) = rates.and_then(|r| link_speed(r.speed)) {
                spans.push(Span::styled(format!("  {speed}"), theme::MUTED_STYLE));
            }
            Line::from(spans)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nas_core::LinkState;

    fn app(name: &str, state: &str) -> App {
        App {
            name: name.to_string(),
            state: state.to_string(),
        }
    }

    fn stats(name: &str, cpu: f64) -> (String, AppStats) {
        (
            name.to_string(),
            AppStats {
                app_name: name.to_string(),
                cpu_usage: cpu,
                memory: 1024,
            },
        )
    }

    #[test]
    fn app_rows_sort_by_cpu_descending() {
        let apps = vec![app("a", "RUNNING"), app("b", "RUNNING"), app("c", "STOPPED")];
        let live: HashMap<_, _> = [stats("a", 1.0), stats("b", 9.0)].into_iter().collect();
        let rows = app_rows(&apps, &live);
        let names: Vec<_> = rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c"]);
        assert_eq!(rows[2].memory, 0);
    }

    #[test]
    fn gauge_clamps_out_of_range_values() {
        let text: String = gauge_spans("CPU", 250.0, "")
            .iter()
            .map(|span| span.content.as_ref())
            .collect();
        assert!(text.contains("100.0%"));
        assert_eq!(text.matches('█').count(), BAR_WIDTH);

        let text: String = gauge_spans("MEM", f64::NAN, "")
            .iter()
            .map(|span| span.content.as_ref())
            .collect();
        assert!(text.contains("  0.0%"));
    }

    #[test]
    fn only_linked_interfaces_are_listed() {
        let interfaces = vec![
            NetworkInterface {
                id: "eno1".to_string(),
                name: "eno1".to_string(),
                kind: "PHYSICAL".to_string(),
                link_state: LinkState::Up,
            },
            NetworkInterface {
                id: "eno2".to_string(),
                name: "eno2".to_string(),
                kind: "PHYSICAL".to_string(),
                link_state: LinkState::Down,
            },
        ];
        let lines = network_lines(&interfaces, None);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn dashboard_is_exempt_from_freshness() {
        let mut view = DashboardView::new(TelemetryState::new());
        assert!(view.freshness().is_none());
        assert!(view.freshness_mut().is_none());
        view.apply(ViewData::Dashboard(DashboardData::default()));
        assert!(view.loaded());
    }
}
