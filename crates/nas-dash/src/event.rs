use nas_core::{ApiError, Services};
use tokio::sync::mpsc;

use crate::telemetry::StreamKind;
use crate::views::{ViewData, ViewId};

/// Everything a background task can tell the render loop.
#[derive(Debug)]
pub enum AppEvent {
    Connected(Services),
    ConnectFailed(ApiError),
    /// `generation` identifies the load; superseded ones are dropped.
    ViewLoaded {
        view: ViewId,
        generation: u64,
        outcome: Result<ViewData, ApiError>,
    },
    TelemetryUpdated(StreamKind),
}

/// Cloneable, non-blocking handle for posting into the render loop.
#[derive(Debug, Clone)]
pub struct EventPoster {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventPoster {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false once the render loop has gone away.
    pub fn post(&self, event: AppEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}
