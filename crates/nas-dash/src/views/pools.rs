use crossterm::event::KeyEvent;
use nas_core::{Pool, Services};
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
pub struct PoolsView {
    pools: Vec<Pool>,
    freshness: Freshness,
    cursor: ListCursor,
}

impl PoolsView {
    pub fn new(stale_ttl: Duration) -> Self {
        Self {
            pools: Vec::new(),
            freshness: Freshness::new(stale_ttl),
            cursor: ListCursor::default(),
        }
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    pub fn selected(&self) -> Option<&Pool> {
        self.pools.get(self.cursor.selected())
    }
}

impl View for PoolsView {
    fn id(&self) -> ViewId {
        ViewId::Pools
    }

    fn fetch(&self, services: &Services) -> Fetch {
        let datasets = services.datasets.clone();
        Box::pin(async move { datasets.list_pools().await.map(ViewData::Pools) })
    }

    fn apply(&mut self, data: ViewData) {
        let ViewData::Pools(pools) = data else {
            debug!("pools view ignored foreign data");
            return;
        };
        self.pools = pools;
        self.cursor.clamp(self.pools.len());
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
            render_loading(frame, area, "Pools");
            return;
        }
        let header = Row::new(["NAME", "STATUS", "SIZE", "ALLOC", "FREE"]).style(theme::HEADER_STYLE);
        let rows = self.pools.iter().map(|pool| {
            Row::new(vec![
                Cell::from(pool.name.clone()),
                Cell::from(Span::styled(
                    pool.status.clone(),
                    theme::pool_status_style(&pool.status),
                )),
                Cell::from(format!("{:>10}", iec_bytes(pool.size))),
                Cell::from(format!("{:>10}", iec_bytes(pool.allocated))),
                Cell::from(format!("{:>10}", iec_bytes(pool.free))),
            ])
        });
        let widths = [
            Constraint::Min(16),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(10),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(panel(&format!("Pools ({})", self.pools.len())))
            .highlight_style(theme::SELECTED_STYLE);
        let mut state = TableState::default();
        if !self.pools.is_empty() {
            state.select(Some(self.cursor.selected()));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        self.cursor.handle_key(key, self.pools.len())
    }
}
