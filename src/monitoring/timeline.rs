//! Phase Timeline
//!
//! Records when a run entered each lifecycle phase, for run summaries
//! and for telling how long preparation and execution took.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::execution::RunnerPhase;

/// A single phase transition.
#[derive(Debug, Clone)]
pub struct PhaseEvent {
    pub phase: RunnerPhase,
    /// Monotonic time, for durations
    pub instant: Instant,
    /// Wall-clock time, for reports
    pub timestamp: DateTime<Utc>,
}

/// Ordered record of the phases a run went through.
#[derive(Debug, Clone)]
pub struct PhaseTimeline {
    events: Vec<PhaseEvent>,
    start_time: Instant,
}

impl PhaseTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn record(&mut self, phase: RunnerPhase) {
        self.events.push(PhaseEvent {
            phase,
            instant: Instant::now(),
            timestamp: Utc::now(),
        });
    }

    pub fn events(&self) -> &[PhaseEvent] {
        &self.events
    }

    /// Phases in the order they were entered.
    pub fn phases(&self) -> Vec<RunnerPhase> {
        self.events.iter().map(|event| event.phase).collect()
    }

    /// The most recently entered phase.
    pub fn current(&self) -> Option<RunnerPhase> {
        self.events.last().map(|event| event.phase)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Time spent in each phase; the last phase runs until now.
    pub fn phase_durations(&self) -> Vec<(RunnerPhase, Duration)> {
        let now = Instant::now();
        self.events
            .iter()
            .enumerate()
            .map(|(i, event)| {
                let end = self.events.get(i + 1).map_or(now, |next| next.instant);
                (event.phase, end.duration_since(event.instant))
            })
            .collect()
    }

    /// One line per phase with its start time and duration.
    pub fn summary(&self) -> String {
        let mut output = String::from("Run Timeline:\n");

        if self.events.is_empty() {
            output.push_str("  (no phases recorded)\n");
            return output;
        }

        for ((phase, duration), event) in self.phase_durations().into_iter().zip(&self.events) {
            let _ = writeln!(
                output,
                "  {:<11} {} ({:.2?})",
                phase.to_string(),
                event.timestamp.format("%H:%M:%S%.3f"),
                duration
            );
        }

        output
    }
}

impl Default for PhaseTimeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_timeline_creation() {
        let timeline = PhaseTimeline::new();
        assert!(timeline.events().is_empty());
        assert!(timeline.current().is_none());
    }

    #[test]
    fn test_record_phases_in_order() {
        let mut timeline = PhaseTimeline::new();
        timeline.record(RunnerPhase::Created);
        timeline.record(RunnerPhase::Preparing);
        timeline.record(RunnerPhase::Executing);

        assert_eq!(
            timeline.phases(),
            vec![RunnerPhase::Created, RunnerPhase::Preparing, RunnerPhase::Executing]
        );
        assert_eq!(timeline.current(), Some(RunnerPhase::Executing));
    }

    #[test]
    fn test_phase_durations() {
        let mut timeline = PhaseTimeline::new();
        timeline.record(RunnerPhase::Preparing);
        thread::sleep(Duration::from_millis(20));
        timeline.record(RunnerPhase::Executing);

        let durations = timeline.phase_durations();
        assert_eq!(durations.len(), 2);
        assert!(durations[0].1 >= Duration::from_millis(20));
        assert!(timeline.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_summary_format() {
        let mut timeline = PhaseTimeline::new();
        assert!(timeline.summary().contains("no phases recorded"));

        timeline.record(RunnerPhase::Created);
        timeline.record(RunnerPhase::Succeeded);
        let summary = timeline.summary();
        assert!(summary.contains("Run Timeline"));
        assert!(summary.contains("created"));
        assert!(summary.contains("succeeded"));
    }
}
