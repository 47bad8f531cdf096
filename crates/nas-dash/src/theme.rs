use ratatui::style::{Color, Modifier, Style};

pub const TEXT: Color = Color::Rgb(226, 232, 240);
pub const MUTED: Color = Color::Rgb(148, 163, 184);
pub const ACCENT: Color = Color::Rgb(56, 189, 248);
pub const OK: Color = Color::Rgb(34, 197, 94);
pub const WARN: Color = Color::Rgb(245, 158, 11);
pub const CRITICAL: Color = Color::Rgb(239, 68, 68);
pub const EMPTY_BAR: Color = Color::Rgb(71, 85, 105);

pub const TITLE_STYLE: Style = Style::new()
    .fg(Color::Rgb(191, 219, 254))
    .add_modifier(Modifier::BOLD);
pub const BORDER_STYLE: Style = Style::new().fg(Color::Rgb(71, 85, 105));
pub const HEADER_STYLE: Style = Style::new().fg(MUTED).add_modifier(Modifier::BOLD);
pub const MUTED_STYLE: Style = Style::new().fg(MUTED);
pub const LABEL_STYLE: Style = Style::new().fg(TEXT).add_modifier(Modifier::BOLD);
pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(30, 58, 95))
    .fg(TEXT)
    .add_modifier(Modifier::BOLD);
pub const ACTIVE_TAB_STYLE: Style = Style::new()
    .fg(Color::Black)
    .bg(ACCENT)
    .add_modifier(Modifier::BOLD);
pub const RX_STYLE: Style = Style::new().fg(OK);
pub const TX_STYLE: Style = Style::new().fg(WARN);

/// Green below 60%, amber below 85%, red above.
pub fn load_color(percent: f64) -> Color {
    if percent >= 85.0 {
        CRITICAL
    } else if percent >= 60.0 {
        WARN
    } else {
        OK
    }
}

pub fn pool_status_style(status: &str) -> Style {
    if status == "ONLINE" {
        Style::new().fg(OK)
    } else {
        Style::new().fg(CRITICAL).add_modifier(Modifier::BOLD)
    }
}

pub fn app_state_color(state: &str) -> Color {
    match state {
        "RUNNING" => OK,
        "DEPLOYING" | "STOPPING" => WARN,
        "CRASHED" => CRITICAL,
        _ => MUTED,
    }
}
