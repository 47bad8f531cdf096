use crossterm::event::KeyEvent;
use nas_core::{Dataset, Services};
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
pub struct DatasetsView {
    datasets: Vec<Dataset>,
    freshness: Freshness,
    cursor: ListCursor,
}

impl DatasetsView {
    pub fn new(stale_ttl: Duration) -> Self {
        Self {
            datasets: Vec::new(),
            freshness: Freshness::new(stale_ttl),
            cursor: ListCursor::default(),
        }
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }
}

impl View for DatasetsView {
    fn id(&self) -> ViewId {
        ViewId::Datasets
    }

    fn fetch(&self, services: &Services) -> Fetch {
        let datasets = services.datasets.clone();
        Box::pin(async move { datasets.list_datasets().await.map(ViewData::Datasets) })
    }

    fn apply(&mut self, data: ViewData) {
        let ViewData::Datasets(datasets) = data else {
            debug!("datasets view ignored foreign data");
            return;
        };
        self.datasets = datasets;
        self.cursor.clamp(self.datasets.len());
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
            render_loading(frame, area, "Datasets");
            return;
        }
        let header = Row::new(["DATASET", "COMPRESSION", "USED", "AVAIL", "MOUNTPOINT"])
            .style(theme::HEADER_STYLE);
        let rows = self.datasets.iter().map(|dataset| {
            Row::new(vec![
                Cell::from(dataset.id.clone()),
                Cell::from(Span::styled(dataset.compression.clone(), theme::MUTED_STYLE)),
                Cell::from(format!("{:>10}", iec_bytes(dataset.used))),
                Cell::from(format!("{:>10}", iec_bytes(dataset.available))),
                Cell::from(dataset.mountpoint.clone()),
            ])
        });
        let widths = [
            Constraint::Percentage(35),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Min(10),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(panel(&format!("Datasets ({})", self.datasets.len())))
            .highlight_style(theme::SELECTED_STYLE);
        let mut state = TableState::default();
        if !self.datasets.is_empty() {
            state.select(Some(self.cursor.selected()));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        self.cursor.handle_key(key, self.datasets.len())
    }
}
