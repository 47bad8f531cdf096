//! The four tabs and the capability set the controller drives them through.

mod dashboard;
mod datasets;
mod pools;
mod snapshots;

pub use dashboard::{app_rows, AppRow, DashboardData, DashboardView};
pub use datasets::DatasetsView;
pub use pools::PoolsView;
pub use snapshots::SnapshotsView;

use crossterm::event::{KeyCode, KeyEvent};
use futures_util::future::BoxFuture;
use nas_core::{ApiError, Dataset, Pool, Services, Snapshot};
use ratatui::layout::Rect;
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::freshness::Freshness;
use crate::theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewId {
    Dashboard,
    Pools,
    Datasets,
    Snapshots,
}

impl ViewId {
    pub const ALL: [ViewId; 4] = [
        ViewId::Dashboard,
        ViewId::Pools,
        ViewId::Datasets,
        ViewId::Snapshots,
    ];

    pub fn index(self) -> usize {
        match self {
            ViewId::Dashboard => 0,
            ViewId::Pools => 1,
            ViewId::Datasets => 2,
            ViewId::Snapshots => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn title(self) -> &'static str {
        match self {
            ViewId::Dashboard => "Dashboard",
            ViewId::Pools => "Pools",
            ViewId::Datasets => "Datasets",
            ViewId::Snapshots => "Snapshots",
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Result of one successful fetch, applied on the render loop.
#[derive(Debug, Clone)]
pub enum ViewData {
    Dashboard(DashboardData),
    Pools(Vec<Pool>),
    Datasets(Vec<Dataset>),
    Snapshots(Vec<Snapshot>),
}

pub type Fetch = BoxFuture<'static, Result<ViewData, ApiError>>;

pub trait View: Send {
    fn id(&self) -> ViewId;

    /// Builds the load future. It only reads `services`; the data it yields
    /// reaches the view through [`View::apply`].
    fn fetch(&self, services: &Services) -> Fetch;

    /// Installs freshly fetched data and marks the view loaded.
    fn apply(&mut self, data: ViewData);

    fn loaded(&self) -> bool;

    /// `None` for views kept current by a stream rather than by polling.
    fn freshness(&self) -> Option<&Freshness>;

    fn freshness_mut(&mut self) -> Option<&mut Freshness>;

    fn render(&self, frame: &mut Frame, area: Rect);

    /// Returns true if the key was consumed.
    fn handle_key(&mut self, key: KeyEvent) -> bool;
}

/// Cursor over a list whose length changes under it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListCursor {
    selected: usize,
}

impl ListCursor {
    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn clamp(&mut self, len: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    pub fn handle_key(&mut self, key: KeyEvent, len: usize) -> bool {
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected = self.selected.saturating_add(1);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Home | KeyCode::Char('g') => self.selected = 0,
            KeyCode::End | KeyCode::Char('G') => self.selected = len.saturating_sub(1),
            _ => return false,
        }
        self.clamp(len);
        true
    }
}

pub(crate) fn render_loading(frame: &mut Frame, area: Rect, title: &str) {
    let placeholder = Paragraph::new(Span::styled("Loading...", theme::MUTED_STYLE))
        .block(panel(title));
    frame.render_widget(placeholder, area);
}

pub(crate) fn panel(title: &str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(theme::BORDER_STYLE)
        .title(Span::styled(format!(" {title} "), theme::TITLE_STYLE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn view_ids_cycle_both_ways() {
        assert_eq!(ViewId::Snapshots.next(), ViewId::Dashboard);
        assert_eq!(ViewId::Dashboard.prev(), ViewId::Snapshots);
        assert_eq!(ViewId::from_index(2), Some(ViewId::Datasets));
        assert_eq!(ViewId::from_index(4), None);
        for id in ViewId::ALL {
            assert_eq!(ViewId::from_index(id.index()), Some(id));
        }
    }

    #[test]
    fn cursor_is_clamped_to_length() {
        let mut cursor = ListCursor::default();
        assert!(cursor.handle_key(key(KeyCode::Char('j')), 3));
        assert!(cursor.handle_key(key(KeyCode::Down), 3));
        assert!(cursor.handle_key(key(KeyCode::Down), 3));
        assert_eq!(cursor.selected(), 2);
        assert!(cursor.handle_key(key(KeyCode::Char('g')), 3));
        assert_eq!(cursor.selected(), 0);
        assert!(cursor.handle_key(key(KeyCode::End), 3));
        assert_eq!(cursor.selected(), 2);
        cursor.clamp(1);
        assert_eq!(cursor.selected(), 0);
        assert!(!cursor.handle_key(key(KeyCode::Char('x')), 3));
    }

    #[test]
    fn cursor_on_empty_list_stays_at_zero() {
        let mut cursor = ListCursor::default();
        cursor.handle_key(key(KeyCode::Char('G')), 0);
        assert_eq!(cursor.selected(), 0);
    }
}
