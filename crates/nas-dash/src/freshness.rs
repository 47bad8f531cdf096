use std::time::Duration;
use tokio::time::Instant;

/// Load bookkeeping for one polled view.
///
/// Only the controller touches a view's record, and only on the render loop,
/// so plain `&mut` access is the whole synchronization story. A view that has
/// never loaded is always stale; a loaded view goes stale once strictly more
/// than `ttl` has elapsed, so a zero TTL is fresh at the instant of load.
#[derive(Debug, Clone)]
pub struct Freshness {
    loaded_at: Option<Instant>,
    ttl: Duration,
}

impl Freshness {
    pub fn new(ttl: Duration) -> Self {
        Self {
            loaded_at: None,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded_at.is_some()
    }

    pub fn loaded_at(&self) -> Option<Instant> {
        self.loaded_at
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now())
    }

    pub fn is_stale_at(&self, now: Instant) -> bool {
        match self.loaded_at {
            None => true,
            Some(at) => now.saturating_duration_since(at) > self.ttl,
        }
    }

    /// Call only after a successful fetch.
    pub fn mark_loaded(&mut self) {
        self.mark_loaded_at(Instant::now());
    }

    pub fn mark_loaded_at(&mut self, now: Instant) {
        self.loaded_at = Some(now);
    }

    /// Forgets the last load so the next check reports stale.
    pub fn invalidate(&mut self) {
        self.loaded_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_loaded_is_stale() {
        let freshness = Freshness::new(Duration::from_secs(30));
        assert!(!freshness.is_loaded());
        assert!(freshness.is_stale());
    }

    #[test]
    fn fresh_until_ttl_strictly_exceeded() {
        let mut freshness = Freshness::new(Duration::from_secs(30));
        let at = Instant::now();
        freshness.mark_loaded_at(at);
        assert!(!freshness.is_stale_at(at));
        assert!(!freshness.is_stale_at(at + Duration::from_secs(30)));
        assert!(freshness.is_stale_at(at + Duration::from_secs(31)));
    }

    #[test]
    fn zero_ttl_is_fresh_only_at_load_instant() {
        let mut freshness = Freshness::new(Duration::ZERO);
        let at = Instant::now();
        freshness.mark_loaded_at(at);
        assert!(!freshness.is_stale_at(at));
        assert!(freshness.is_stale_at(at + Duration::from_nanos(1)));
    }

    #[test]
    fn clock_running_backwards_does_not_report_stale() {
        let mut freshness = Freshness::new(Duration::from_secs(1));
        let at = Instant::now() + Duration::from_secs(5);
        freshness.mark_loaded_at(at);
        assert!(!freshness.is_stale_at(at - Duration::from_secs(5)));
    }

    #[test]
    fn invalidate_forces_stale() {
        let mut freshness = Freshness::new(Duration::from_secs(30));
        freshness.mark_loaded();
        freshness.invalidate();
        assert!(freshness.is_stale());
    }
}
