use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::status::RoutingStatus;

/// Routing progress and timing for one request.
///
/// Every `started`/`finished` pair adds its delta to `total`, so retries and
/// fan-out routing accumulate. A `finished` without a pending start records
/// the end time only.
#[derive(Debug, Default)]
pub(crate) struct RoutingState {
    pub(crate) status: RoutingStatus,
    pub(crate) url: Option<String>,
    pending: Option<Instant>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    total: Duration,
}

impl RoutingState {
    pub(crate) fn started(&mut self, now: Instant, wall: DateTime<Utc>) {
        self.pending = Some(now);
        self.start_time = Some(wall);
    }

    /// Returns false if routing was never started.
    pub(crate) fn finished(&mut self, now: Instant, wall: DateTime<Utc>) -> bool {
        self.end_time = Some(wall);
        match self.pending.take() {
            Some(start) => {
                self.total += now.saturating_duration_since(start);
                true
            }
            None => false,
        }
    }

    pub(crate) fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub(crate) fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub(crate) fn total(&self) -> Duration {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_accumulate_across_attempts() {
        let mut routing = RoutingState::default();
        let t0 = Instant::now();
        let wall = Utc::now();

        routing.started(t0, wall);
        assert!(routing.finished(t0 + Duration::from_millis(30), wall));
        routing.started(t0 + Duration::from_millis(100), wall);
        assert!(routing.finished(t0 + Duration::from_millis(150), wall));

        assert_eq!(routing.total(), Duration::from_millis(80));
        assert!(routing.start_time().is_some());
        assert!(routing.end_time().is_some());
    }

    #[test]
    fn finish_without_start_adds_nothing() {
        let mut routing = RoutingState::default();
        let t0 = Instant::now();
        assert!(!routing.finished(t0, Utc::now()));
        assert_eq!(routing.total(), Duration::ZERO);
        assert!(routing.end_time().is_some());
        assert!(routing.start_time().is_none());
    }

    #[test]
    fn second_finish_does_not_double_count() {
        let mut routing = RoutingState::default();
        let t0 = Instant::now();
        routing.started(t0, Utc::now());
        routing.finished(t0 + Duration::from_millis(10), Utc::now());
        routing.finished(t0 + Duration::from_millis(50), Utc::now());
        assert_eq!(routing.total(), Duration::from_millis(10));
    }

    #[test]
    fn clock_going_backwards_is_clamped() {
        let mut routing = RoutingState::default();
        let t0 = Instant::now() + Duration::from_secs(1);
        routing.started(t0, Utc::now());
        routing.finished(t0 - Duration::from_millis(500), Utc::now());
        assert_eq!(routing.total(), Duration::ZERO);
    }
}
