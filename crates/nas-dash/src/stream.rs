//! Supervised subscription loops.
//!
//! Each stream cycles `Subscribing -> Streaming -> Backoff -> Subscribing`
//! until its cancellation token fires. Cancellation is observed while
//! subscribing, while waiting for the next update and while sleeping, so
//! shutdown never waits out a full backoff delay.

use nas_core::{ApiError, Services, Subscription};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::event::{AppEvent, EventPoster};
use crate::telemetry::{StreamKind, StreamStatus, TelemetryState};

pub const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(1);
const MAX_BACKOFF_EXPONENT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
}

impl Backoff {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// `base * 2^min(attempt, 5)`: the first retry waits one base delay.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base
            .saturating_mul(1u32 << attempt.min(MAX_BACKOFF_EXPONENT))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_BASE)
    }
}

/// Sleeps for `delay`; returns false if cancelled first.
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Runtime context shared by one stream's loop.
#[derive(Debug, Clone)]
pub struct StreamLoop {
    pub kind: StreamKind,
    pub telemetry: TelemetryState,
    pub poster: EventPoster,
    pub backoff: Backoff,
    pub cancel: CancellationToken,
}

impl StreamLoop {
    /// Drives one stream until cancelled.
    ///
    /// `subscribe` opens a fresh subscription per attempt; `merge` folds each
    /// update into the shared state before the render loop is notified.
    pub async fn run<T, S, Fut, M>(self, mut subscribe: S, mut merge: M)
    where
        S: FnMut() -> Fut,
        Fut: Future<Output = Result<Subscription<T>, ApiError>>,
        M: FnMut(&TelemetryState, T),
    {
        let kind = self.kind;
        let mut failures: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.telemetry.set_status(kind, StreamStatus::Subscribing);
            let subscribed = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = subscribe() => result,
            };

            let mut subscription = match subscribed {
                Ok(subscription) => subscription,
                Err(err) => {
                    warn!(stream = %kind, attempt = failures + 1, "subscribe failed: {err}");
                    let delay = self.backoff.delay(failures);
                    failures = failures.saturating_add(1);
                    self.telemetry
                        .set_status(kind, StreamStatus::Backoff { attempt: failures });
                    if !pause(delay, &self.cancel).await {
                        break;
                    }
                    continue;
                }
            };
            // The attempt count survives until the stream delivers something,
            // so a subscription that fails before its first update escalates.
            self.telemetry.set_status(kind, StreamStatus::Streaming);
            info!(stream = %kind, "subscription streaming");

            let delay = loop {
                let next = tokio::select! {
                    _ = self.cancel.cancelled() => None,
                    item = subscription.recv() => Some(item),
                };
                match next {
                    None => {
                        subscription.close();
                        self.telemetry.set_status(kind, StreamStatus::Stopped);
                        debug!(stream = %kind, "stream stopped");
                        return;
                    }
                    Some(Some(Ok(update))) => {
                        failures = 0;
                        merge(&self.telemetry, update);
                        self.poster.post(AppEvent::TelemetryUpdated(kind));
                    }
                    Some(Some(Err(err))) => {
                        warn!(stream = %kind, "subscription failed mid-stream: {err}");
                        let delay = self.backoff.delay(failures);
                        failures = failures.saturating_add(1);
                        break delay;
                    }
                    Some(None) => {
                        info!(stream = %kind, "subscription closed, reconnecting");
                        failures = 0;
                        break self.backoff.base();
                    }
                }
            };

            subscription.close();
            self.telemetry
                .set_status(kind, StreamStatus::Backoff { attempt: failures });
            if !pause(delay, &self.cancel).await {
                break;
            }
        }

        self.telemetry.set_status(kind, StreamStatus::Stopped);
        debug!(stream = %kind, "stream stopped");
    }
}

/// Owns the two live streams and their shared cancellation token.
#[derive(Debug)]
pub struct StreamSupervisor {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl StreamSupervisor {
    /// Spawns the realtime and app-stats loops under a child of `parent`.
    pub fn start(
        services: &Services,
        telemetry: TelemetryState,
        poster: EventPoster,
        backoff: Backoff,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let context = |kind| StreamLoop {
            kind,
            telemetry: telemetry.clone(),
            poster: poster.clone(),
            backoff,
            cancel: cancel.clone(),
        };

        let reporting = services.reporting.clone();
        let realtime = tokio::spawn(context(StreamKind::Realtime).run(
            move || {
                let reporting = reporting.clone();
                async move { reporting.subscribe_realtime().await }
            },
            |state, update| state.merge_realtime(update),
        ));

        let apps = services.apps.clone();
        let app_stats = tokio::spawn(context(StreamKind::AppStats).run(
            move || {
                let apps = apps.clone();
                async move { apps.subscribe_stats().await }
            },
            |state, stats| state.merge_app_stats(stats),
        ));

        info!("subscription streams started");
        Self {
            cancel,
            tasks: vec![realtime, app_stats],
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Cancels both loops and waits up to `grace` for each to finish.
    pub async fn shutdown(mut self, grace: Duration) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if tokio::time::timeout(grace, task).await.is_err() {
                warn!("stream task did not stop within {grace:?}");
            }
        }
    }
}

impl Drop for StreamSupervisor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps_at_32x() {
        let backoff = Backoff::new(Duration::from_millis(10));
        assert_eq!(backoff.delay(0), Duration::from_millis(10));
        assert_eq!(backoff.delay(1), Duration::from_millis(20));
        assert_eq!(backoff.delay(5), Duration::from_millis(320));
        assert_eq!(backoff.delay(40), Duration::from_millis(320));
    }

    #[test]
    fn default_base_is_one_second() {
        assert_eq!(Backoff::default().base(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_returns_early_on_cancel() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        });
        let started = tokio::time::Instant::now();
        assert!(!pause(Duration::from_secs(60), &cancel).await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
