//! Terminal dashboard for a storage appliance.
//!
//! The [`app::Controller`] owns tab state and turns background outcomes
//! (connection, per-view loads, stream updates) into render-loop mutations.

pub mod app;
pub mod config;
pub mod event;
pub mod format;
pub mod freshness;
pub mod stream;
pub mod telemetry;
pub mod theme;
pub mod ui;
pub mod views;

pub use app::{Connection, Connector, Controller, ControllerOptions, KeyOutcome};
pub use event::{AppEvent, EventPoster};
pub use freshness::Freshness;
pub use stream::{Backoff, StreamLoop, StreamSupervisor};
pub use telemetry::{StreamKind, StreamStatus, TelemetryState};
pub use views::{View, ViewData, ViewId};
