// Progress coordinator - throttles per-session progress, never drops the terminal event
use crate::application::aggregation::ChunkReport;
use crate::domain::progress::{ErrorKind, Phase, ProgressEvent};
use std::time::{Duration, Instant};

/// Highest percentage a non-terminal event may report
const MAX_RUNNING_PERCENTAGE: f64 = 99.0;

pub struct ProgressCoordinator {
    request_id: String,
    total: u64,
    min_interval: Duration,
    last_forwarded: Option<Instant>,
    last_percentage: f64,
    processed: u64,
    terminated: bool,
}

impl ProgressCoordinator {
    pub fn new(request_id: &str, total_expected_points: Option<u64>, min_interval: Duration) -> Self {
        Self {
            request_id: request_id.to_string(),
            total: total_expected_points.unwrap_or(0),
            min_interval,
            last_forwarded: None,
            last_percentage: 0.0,
            processed: 0,
            terminated: false,
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn chunk_applied(&mut self, report: &ChunkReport, now: Instant) -> Option<ProgressEvent> {
        self.processed = self.processed.max(report.processed);
        let raw = if self.total > 0 {
            self.processed as f64 / self.total as f64 * 100.0
        } else if report.total_chunks > 0 {
            report.sequence as f64 / report.total_chunks as f64 * 100.0
        } else {
            0.0
        };
        let event = self.event(Phase::Processing, self.running_percentage(raw));
        self.on_progress(event, now)
    }

    pub fn finalizing(&mut self, now: Instant) -> Option<ProgressEvent> {
        let event = self.event(Phase::Finalizing, self.running_percentage(MAX_RUNNING_PERCENTAGE));
        self.on_progress(event, now)
    }

    pub fn complete(&mut self, now: Instant) -> Option<ProgressEvent> {
        let event = self.event(Phase::Complete, 100.0);
        self.on_progress(event, now)
    }

    pub fn failed(&mut self, kind: ErrorKind, message: &str, now: Instant) -> Option<ProgressEvent> {
        let event = self
            .event(Phase::Error, self.last_percentage)
            .with_error(kind, message);
        self.on_progress(event, now)
    }

    pub fn cancelled(&mut self, now: Instant) -> Option<ProgressEvent> {
        let event = self
            .event(Phase::Cancelled, self.last_percentage)
            .with_error(ErrorKind::Cancelled, "cancelled by request");
        self.on_progress(event, now)
    }

    /// Forward `event` if it is terminal or the interval has elapsed since
    /// the last forwarded event. Nothing passes after a terminal event.
    pub fn on_progress(&mut self, event: ProgressEvent, now: Instant) -> Option<ProgressEvent> {
        if self.terminated {
            return None;
        }
        let due = match self.last_forwarded {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        };
        if !event.phase.is_terminal() && !due {
            return None;
        }
        self.terminated = event.phase.is_terminal();
        self.last_forwarded = Some(now);
        self.last_percentage = self.last_percentage.max(event.percentage);
        Some(event)
    }

    fn running_percentage(&self, raw: f64) -> f64 {
        raw.clamp(self.last_percentage, MAX_RUNNING_PERCENTAGE.max(self.last_percentage))
    }

    fn event(&self, phase: Phase, percentage: f64) -> ProgressEvent {
        ProgressEvent::new(&self.request_id, phase, self.processed, self.total, percentage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(sequence: u32, processed: u64) -> ChunkReport {
        ChunkReport {
            sequence,
            total_chunks: 10,
            accepted: 100,
            invalid: 0,
            processed,
        }
    }

    #[test]
    fn test_throttle_drops_events_inside_interval() {
        let start = Instant::now();
        let mut progress = ProgressCoordinator::new("s", Some(1000), Duration::from_millis(200));

        assert!(progress.chunk_applied(&report(1, 100), start).is_some());
        assert!(progress
            .chunk_applied(&report(2, 200), start + Duration::from_millis(50))
            .is_none());
        let forwarded = progress
            .chunk_applied(&report(3, 300), start + Duration::from_millis(250))
            .unwrap();
        assert_eq!(forwarded.processed, 300);
        assert_eq!(forwarded.percentage, 30.0);
    }

    #[test]
    fn test_terminal_event_bypasses_throttle_exactly_once() {
        let start = Instant::now();
        let mut progress = ProgressCoordinator::new("s", Some(1000), Duration::from_secs(60));
        assert!(progress.chunk_applied(&report(1, 100), start).is_some());
        assert!(progress.finalizing(start).is_none());

        let done = progress.complete(start).unwrap();
        assert_eq!(done.phase, Phase::Complete);
        assert_eq!(done.percentage, 100.0);
        assert!(progress.complete(start).is_none());
        assert!(progress.failed(ErrorKind::Execution, "late", start).is_none());
    }

    #[test]
    fn test_percentages_are_monotonic_and_only_terminal_reaches_100() {
        let start = Instant::now();
        // declared total too small: raw percentage overshoots
        let mut progress = ProgressCoordinator::new("s", Some(250), Duration::ZERO);
        let mut seen = Vec::new();
        for (i, processed) in [100u64, 200, 300, 400].into_iter().enumerate() {
            let at = start + Duration::from_millis(i as u64);
            seen.push(progress.chunk_applied(&report(i as u32 + 1, processed), at).unwrap());
        }
        seen.push(progress.complete(start + Duration::from_millis(10)).unwrap());

        let percentages: Vec<f64> = seen.iter().map(|e| e.percentage).collect();
        assert!(percentages.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(percentages.iter().filter(|p| **p >= 100.0).count(), 1);
        assert_eq!(seen.last().unwrap().phase, Phase::Complete);
    }

    #[test]
    fn test_unknown_total_uses_chunk_sequence() {
        let mut progress = ProgressCoordinator::new("s", None, Duration::ZERO);
        let event = progress.chunk_applied(&report(5, 12_345), Instant::now()).unwrap();
        assert_eq!(event.percentage, 50.0);
        assert_eq!(event.total, 0);
    }

    #[test]
    fn test_error_event_carries_kind() {
        let mut progress = ProgressCoordinator::new("s", Some(10), Duration::from_secs(1));
        let event = progress
            .failed(ErrorKind::ResultRead, "no output", Instant::now())
            .unwrap();
        assert_eq!(event.phase, Phase::Error);
        assert_eq!(event.error.unwrap().kind, ErrorKind::ResultRead);
    }
}
