use crossterm::event::KeyEvent;
use nas_core::{Services, Snapshot};
use ratatui::layout::{Constraint, Rect};
use ratatui::text::Span;
use ratatui::widgets::{Cell, Row, Table, TableState};
use ratatui::Frame;
use std::time::Duration;
use tracing::debug;

use super::{panel, render_loading, Fetch, ListCursor, View, ViewData, ViewId};
use crate::format::iec_bytes;
use crate::freshness::Freshness;
use crate::theme;

#[derive(Debug)]
pub struct SnapshotsView {
    snapshots: Vec<Snapshot>,
    freshness: Freshness,
    cursor: ListCursor,
}

impl SnapshotsView {
    pub fn new(stale_ttl: Duration) -> Self {
        Self {
            snapshots: Vec::new(),
            freshness: Freshness::new(stale_ttl),
            cursor: ListCursor::default(),
        }
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn selected(&self) -> Option<&Snapshot> {
        self.snapshots.get(self.cursor.selected())
    }
}

impl View for SnapshotsView {
    fn id(&self) -> ViewId {
        ViewId::Snapshots
    }

    fn fetch(&self, services: &Services) -> Fetch {
        let snapshots = services.snapshots.clone();
        Box::pin(async move { snapshots.list_snapshots().await.map(ViewData::Snapshots) })
    }

    fn apply(&mut self, data: ViewData) {
        let ViewData::Snapshots(snapshots) = data else {
            debug!("snapshots view ignored foreign data");
            return;
        };
        self.snapshots = snapshots;
        self.cursor.clamp(self.snapshots.len());
        self.freshness.mark_loaded();
    }

    fn loaded(&self) -> bool {
        self.freshness.is_loaded()
    }

    fn freshness(&self) -> Option<&Freshness> {
        Some(&self.freshness)
    }

    fn freshness_mut(&mut self) -> Option<&mut Freshness> {
        Some(&mut self.freshness)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        if !self.loaded() {
            render_loading(frame, area, "Snapshots");
            return;
        }
        let header = Row::new(["H", "DATASET", "SNAPSHOT", "USED", "REFER"]).style(theme::HEADER_STYLE);
        let rows = self.snapshots.iter().map(|snapshot| {
            let hold = if snapshot.has_hold {
                Span::styled("H", theme::TITLE_STYLE)
            } else {
                Span::raw(" ")
            };
            Row::new(vec![
                Cell::from(hold),
                Cell::from(snapshot.dataset.clone()),
                Cell::from(snapshot.snapshot_name.clone()),
                Cell::from(format!("{:>10}", iec_bytes(snapshot.used))),
                Cell::from(format!("{:>10}", iec_bytes(snapshot.referenced))),
            ])
        });
        let widths = [
            Constraint::Length(1),
            Constraint::Percentage(35),
            Constraint::Min(16),
            Constraint::Length(10),
            Constraint::Length(10),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(panel(&format!("Snapshots ({})", self.snapshots.len())))
            .highlight_style(theme::SELECTED_STYLE);
        let mut state = TableState::default();
        if !self.snapshots.is_empty() {
            state.select(Some(self.cursor.selected()));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        self.cursor.handle_key(key, self.snapshots.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};

    fn snapshot(name: &str) -> Snapshot {
        Snapshot {
            id: format!("tank@{name}"),
            dataset: "tank".to_string(),
            snapshot_name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn apply_marks_loaded_and_tracks_selection() {
        let mut view = SnapshotsView::new(Duration::from_secs(30));
        assert!(view.selected().is_none());
        view.apply(ViewData::Snapshots(vec![snapshot("a"), snapshot("b")]));
        assert!(view.loaded());
        assert!(!view.freshness.is_stale());
        assert!(view.handle_key(KeyEvent::new(KeyCode::Down, KeyModifiers::NONE)));
        assert_eq!(view.selected().map(|s| s.snapshot_name.as_str()), Some("b"));

        view.apply(ViewData::Snapshots(vec![snapshot("only")]));
        assert_eq!(view.selected().map(|s| s.snapshot_name.as_str()), Some("only"));
    }

    #[test]
    fn foreign_data_is_ignored() {
        let mut view = SnapshotsView::new(Duration::from_secs(30));
        view.apply(ViewData::Pools(Vec::new()));
        assert!(!view.loaded());
    }
}
