use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Frame;

use crate::app::{Connection, Controller};
use crate::theme;
use crate::views::ViewId;

pub fn render(frame: &mut Frame, controller: &Controller) {
    let size = frame.size();
    match controller.connection() {
        Connection::Failed(err) => {
            render_message(frame, size, format!("Connection failed: {err}"));
            return;
        }
        Connection::Connecting => {
            render_message(
                frame,
                size,
                format!("Connecting to {}...", controller.server_name()),
            );
            return;
        }
        Connection::Connected(_) => {}
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(size);
    frame.render_widget(tab_bar(controller), layout[0]);
    controller.view(controller.active()).render(frame, layout[1]);
    frame.render_widget(footer(controller), layout[2]);
}

fn render_message(frame: &mut Frame, area: Rect, text: String) {
    let message = Paragraph::new(Span::styled(text, theme::MUTED_STYLE)).wrap(Wrap { trim: true });
    frame.render_widget(message, area);
}

fn tab_bar(controller: &Controller) -> Paragraph<'static> {
    let mut spans = Vec::with_capacity(ViewId::ALL.len() * 2 + 1);
    for id in ViewId::ALL {
        let label = format!(" {} {} ", id.index() + 1, id.title());
        if id == controller.active() {
            spans.push(Span::styled(label, theme::ACTIVE_TAB_STYLE));
        } else {
            spans.push(Span::styled(label, theme::MUTED_STYLE));
        }
        spans.push(Span::raw(" "));
    }
    if !controller.server_name().is_empty() {
        spans.push(Span::styled(
            format!(" {}", controller.server_name()),
            theme::TITLE_STYLE,
        ));
    }
    Paragraph::new(Line::from(spans))
}

fn footer(controller: &Controller) -> Paragraph<'static> {
    let hints = "q quit  r refresh  1-4/tab switch  j/k move";
    let line = match controller.status_note() {
        Some(note) => Line::from(vec![
            Span::styled(format!("{hints}  "), theme::MUTED_STYLE),
            Span::styled(note.to_string(), ratatui::style::Style::new().fg(theme::WARN)),
        ]),
        None => Line::from(Span::styled(hints, theme::MUTED_STYLE)),
    };
    Paragraph::new(line)
}
