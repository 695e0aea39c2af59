//! Phase Timeline
//!
//! Records when each provisioning phase (download, install, pip, ...)
//! starts and finishes, for the summary printed after a run.

use std::time::{Duration, Instant};

/// Outcome of a finished phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    /// Phase is still running
    Running,
    /// Phase completed successfully
    Completed,
    /// Phase failed
    Failed,
}

/// Timing of a single phase.
#[derive(Debug, Clone)]
pub struct Phase {
    /// Phase name, e.g. `download` or `pip #1`
    pub name: String,
    /// Current status
    pub status: PhaseStatus,
    /// Offset from the timeline start
    pub started: Duration,
    /// Offset from the timeline start, once finished
    pub finished: Option<Duration>,
}

impl Phase {
    /// Time spent in the phase, once finished.
    pub fn duration(&self) -> Option<Duration> {
        self.finished.map(|end| end.saturating_sub(self.started))
    }
}

/// Ordered record of the phases of one provisioning run.
#[derive(Debug, Clone)]
pub struct PhaseTimeline {
    phases: Vec<Phase>,
    start_time: Instant,
}

impl PhaseTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            phases: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Marks a phase as started.
    pub fn start(&mut self, name: impl Into<String>) {
        self.phases.push(Phase {
            name: name.into(),
            status: PhaseStatus::Running,
            started: self.start_time.elapsed(),
            finished: None,
        });
    }

    /// Marks the most recent running phase with this name as completed.
    pub fn complete(&mut self, name: &str) {
        self.finish(name, PhaseStatus::Completed);
    }

    /// Marks the most recent running phase with this name as failed.
    pub fn fail(&mut self, name: &str) {
        self.finish(name, PhaseStatus::Failed);
    }

    fn finish(&mut self, name: &str, status: PhaseStatus) {
        let now = self.start_time.elapsed();
        if let Some(phase) = self
            .phases
            .iter_mut()
            .rev()
            .find(|p| p.name == name && p.status == PhaseStatus::Running)
        {
            phase.status = status;
            phase.finished = Some(now);
        }
    }

    /// Returns all recorded phases in start order.
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Returns the first failed phase, if any.
    pub fn failed_phase(&self) -> Option<&Phase> {
        self.phases.iter().find(|p| p.status == PhaseStatus::Failed)
    }

    /// Returns the total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Renders one bar per finished phase, scaled to 40 columns.
    pub fn summary(&self) -> String {
        let mut output = String::from("\nProvisioning Timeline:\n\n");

        let total_ms = self.elapsed().as_millis();
        if total_ms == 0 {
            return output;
        }
        let scale = 40.0 / total_ms as f64;

        for phase in &self.phases {
            let Some(duration) = phase.duration() else {
                continue;
            };

            let start_pos = (phase.started.as_millis() as f64 * scale) as usize;
            let width = (duration.as_millis() as f64 * scale).max(1.0) as usize;
            let marker = match phase.status {
                PhaseStatus::Failed => "x",
                _ => "#",
            };

            output.push_str(&format!(
                "{:14} |{}{}| {}\n",
                truncate(&phase.name, 14),
                " ".repeat(start_pos),
                marker.repeat(width),
                format_duration(duration)
            ));
        }

        output.push_str(&format!("\nTotal: {}\n", format_duration(self.elapsed())));
        output
    }
}

impl Default for PhaseTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats a duration as `850 ms`, `12.4 s` or `3m 05s`.
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1000 {
        format!("{} ms", ms)
    } else if ms < 60_000 {
        format!("{:.1} s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

/// Pads or truncates a string to a fixed width.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
