//! Root controller: tab selection, bootstrap, loading and stream wiring.
//!
//! Every method runs on the render loop. Background work reports back only
//! through [`AppEvent`]s, so per-view state never needs a lock.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures_util::future::BoxFuture;
use nas_core::{ApiError, Services};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::event::{AppEvent, EventPoster};
use crate::stream::{Backoff, StreamSupervisor};
use crate::telemetry::TelemetryState;
use crate::views::{
    DashboardView, DatasetsView, PoolsView, SnapshotsView, View, ViewData, ViewId,
};

pub const DEFAULT_STALE_TTL: Duration = Duration::from_secs(30);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Dials the backend once; the result is posted back as an [`AppEvent`].
pub type Connector = Box<dyn FnOnce() -> BoxFuture<'static, Result<Services, ApiError>> + Send>;

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub server_name: String,
    pub stale_ttl: Duration,
    pub retry_base: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            server_name: String::new(),
            stale_ttl: DEFAULT_STALE_TTL,
            retry_base: crate::stream::DEFAULT_RETRY_BASE,
        }
    }
}

#[derive(Debug)]
pub enum Connection {
    Connecting,
    Connected(Services),
    Failed(ApiError),
}

/// What the host loop should do after an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Quit,
    Redraw,
    Ignored,
}

pub struct Controller {
    options: ControllerOptions,
    active: ViewId,
    views: Vec<Box<dyn View>>,
    connection: Connection,
    connector: Option<Connector>,
    bootstrapped: bool,
    poster: EventPoster,
    telemetry: TelemetryState,
    streams: Option<StreamSupervisor>,
    lifetime: CancellationToken,
    status_note: Option<(ViewId, String)>,
    load_generations: Vec<u64>,
}

impl Controller {
    fn build(options: ControllerOptions, poster: EventPoster, connection: Connection) -> Self {
        let telemetry = TelemetryState::new();
        let views: Vec<Box<dyn View>> = vec![
            Box::new(DashboardView::new(telemetry.clone())),
            Box::new(PoolsView::new(options.stale_ttl)),
            Box::new(DatasetsView::new(options.stale_ttl)),
            Box::new(SnapshotsView::new(options.stale_ttl)),
        ];
        Self {
            options,
            active: ViewId::Dashboard,
            views,
            connection,
            connector: None,
            bootstrapped: false,
            poster,
            telemetry,
            streams: None,
            lifetime: CancellationToken::new(),
            status_note: None,
            load_generations: vec![0; ViewId::ALL.len()],
        }
    }

    /// Starts in the connecting state; `connector` runs on the first ready
    /// signal.
    pub fn connecting(options: ControllerOptions, poster: EventPoster, connector: Connector) -> Self {
        let mut controller = Self::build(options, poster, Connection::Connecting);
        controller.connector = Some(connector);
        controller
    }

    /// Starts already connected; no bootstrap task is ever spawned.
    pub fn connected(options: ControllerOptions, poster: EventPoster, services: Services) -> Self {
        Self::build(options, poster, Connection::Connected(services))
    }

    pub fn active(&self) -> ViewId {
        self.active
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.connection, Connection::Connected(_))
    }

    pub fn server_name(&self) -> &str {
        &self.options.server_name
    }

    pub fn telemetry(&self) -> &TelemetryState {
        &self.telemetry
    }

    pub fn streams_running(&self) -> bool {
        self.streams.as_ref().is_some_and(StreamSupervisor::is_running)
    }

    pub fn status_note(&self) -> Option<&str> {
        self.status_note.as_ref().map(|(_, note)| note.as_str())
    }

    pub fn view(&self, id: ViewId) -> &dyn View {
        self.views[id.index()].as_ref()
    }

    fn view_mut(&mut self, id: ViewId) -> &mut dyn View {
        self.views[id.index()].as_mut()
    }

    fn services(&self) -> Option<&Services> {
        match &self.connection {
            Connection::Connected(services) => Some(services),
            _ => None,
        }
    }

    /// Host "ready" signal. Bootstraps at most once per controller.
    pub fn on_ready(&mut self) {
        if self.bootstrapped {
            return;
        }
        self.bootstrapped = true;

        if self.is_connected() {
            self.load_all();
            return;
        }
        let Some(connector) = self.connector.take() else {
            return;
        };
        let poster = self.poster.clone();
        info!(server = %self.options.server_name, "connecting");
        tokio::spawn(async move {
            let event = match connector().await {
                Ok(services) => AppEvent::Connected(services),
                Err(err) => AppEvent::ConnectFailed(err),
            };
            poster.post(event);
        });
    }

    /// Spawns one load per view. Returns how many were started; zero while
    /// disconnected.
    pub fn load_all(&mut self) -> usize {
        let Some(services) = self.services().cloned() else {
            return 0;
        };
        for id in ViewId::ALL {
            self.spawn_load(id, &services);
        }
        ViewId::ALL.len()
    }

    /// Starts a new load generation for `id`, superseding any in flight.
    fn next_generation(&mut self, id: ViewId) -> u64 {
        let generation = &mut self.load_generations[id.index()];
        *generation += 1;
        *generation
    }

    fn spawn_load(&mut self, id: ViewId, services: &Services) {
        let generation = self.next_generation(id);
        let fetch = self.view(id).fetch(services);
        let poster = self.poster.clone();
        debug!(view = id.title(), generation, "load started");
        tokio::spawn(async move {
            let outcome = fetch.await;
            poster.post(AppEvent::ViewLoaded {
                view: id,
                generation,
                outcome,
            });
        });
    }

    /// Loads the active view inline. Meant for startup, where waiting is
    /// acceptable.
    pub async fn load_active_view(&mut self) -> Result<(), ApiError> {
        let Some(services) = self.services().cloned() else {
            return Ok(());
        };
        let id = self.active;
        self.next_generation(id);
        let fetch = self.view(id).fetch(&services);
        let outcome = fetch.await;
        let result = outcome.as_ref().map(|_| ()).map_err(|err| err.clone());
        self.apply_outcome(id, outcome);
        result
    }

    /// Reloads the active view in the background. Returns false while
    /// disconnected.
    pub fn refresh_active_view(&mut self) -> bool {
        let Some(services) = self.services().cloned() else {
            return false;
        };
        self.spawn_load(self.active, &services);
        true
    }

    /// Reloads the active view only if it is polled and stale.
    pub fn refetch_if_stale(&mut self) -> bool {
        if !self.is_connected() {
            return false;
        }
        let stale = match self.view(self.active).freshness() {
            Some(freshness) => freshness.is_stale(),
            None => false,
        };
        stale && self.refresh_active_view()
    }

    /// Drops a view's load record so the next staleness check refetches it.
    /// Views without a record are unaffected.
    pub fn invalidate(&mut self, id: ViewId) {
        if let Some(freshness) = self.view_mut(id).freshness_mut() {
            freshness.invalidate();
        }
    }

    pub fn select(&mut self, id: ViewId) {
        if id == self.active {
            return;
        }
        self.active = id;
        self.refetch_if_stale();
    }

    fn apply_outcome(&mut self, id: ViewId, outcome: Result<ViewData, ApiError>) {
        match outcome {
            Ok(data) => {
                self.view_mut(id).apply(data);
                debug!(view = id.title(), "load finished");
                if self
                    .status_note
                    .as_ref()
                    .is_some_and(|(noted, _)| *noted == id)
                {
                    self.status_note = None;
                }
                if id == ViewId::Dashboard {
                    self.start_streams();
                }
            }
            Err(err) => {
                warn!(view = id.title(), "load failed: {err}");
                self.status_note = Some((id, format!("{}: {err}", id.title())));
            }
        }
    }

    fn start_streams(&mut self) {
        if self.streams_running() {
            return;
        }
        let Some(services) = self.services().cloned() else {
            return;
        };
        self.streams = Some(StreamSupervisor::start(
            &services,
            self.telemetry.clone(),
            self.poster.clone(),
            Backoff::new(self.options.retry_base),
            &self.lifetime,
        ));
    }

    /// Applies one background event. Returns true if a redraw is due.
    pub fn handle_event(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::Connected(services) => {
                if self.is_connected() {
                    return false;
                }
                info!(server = %self.options.server_name, "connected");
                self.connection = Connection::Connected(services);
                self.load_all();
                true
            }
            AppEvent::ConnectFailed(err) => {
                if !matches!(self.connection, Connection::Connecting) {
                    return false;
                }
                warn!(server = %self.options.server_name, "connection failed: {err}");
                self.connection = Connection::Failed(err);
                true
            }
            AppEvent::ViewLoaded {
                view,
                generation,
                outcome,
            } => {
                if generation != self.load_generations[view.index()] {
                    debug!(view = view.title(), generation, "dropping superseded load");
                    return false;
                }
                self.apply_outcome(view, outcome);
                true
            }
            AppEvent::TelemetryUpdated(_) => self.active == ViewId::Dashboard,
        }
    }

    /// Global keys first, then the active view.
    pub fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.kind != KeyEventKind::Press {
            return KeyOutcome::Ignored;
        }
        let ctrl_c = key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
        if key.code == KeyCode::Char('q') || ctrl_c {
            return KeyOutcome::Quit;
        }
        if !self.is_connected() {
            return KeyOutcome::Ignored;
        }

        let target = match key.code {
            KeyCode::Char('r') => {
                self.status_note = None;
                self.refresh_active_view();
                return KeyOutcome::Redraw;
            }
            KeyCode::Char(c @ '1'..='4') => ViewId::from_index(c as usize - '1' as usize),
            KeyCode::Tab => Some(self.active.next()),
            KeyCode::BackTab => Some(self.active.prev()),
            _ => None,
        };
        if let Some(id) = target {
            self.select(id);
            return KeyOutcome::Redraw;
        }

        let active = self.active;
        if self.view_mut(active).handle_key(key) {
            KeyOutcome::Redraw
        } else {
            KeyOutcome::Ignored
        }
    }

    /// Cancels the streams and waits briefly for them to wind down.
    pub async fn shutdown(&mut self) {
        self.lifetime.cancel();
        if let Some(streams) = self.streams.take() {
            streams.shutdown(SHUTDOWN_GRACE).await;
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}
