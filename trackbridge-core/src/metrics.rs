//! Metric names and descriptions
//!
//! Recording goes through the `metrics` facade; nothing is exported unless the
//! embedding binary installs a recorder.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Register descriptions for every metric the reconciler records
pub fn describe_metrics() {
    describe_counter!("sync.jobs.spawned", "Create or update jobs spawned, by phase");
    describe_counter!("sync.jobs.succeeded", "Jobs that changed the Target, by phase");
    describe_counter!("sync.jobs.failed", "Jobs abandoned after a failed call, by phase");
    describe_counter!("sync.projects", "Project pairs processed, by outcome");
    describe_histogram!("sync.project.duration_ms", "Wall time of one project sync in milliseconds");
}

pub(crate) fn record_project(outcome: &'static str) {
    counter!("sync.projects", "outcome" => outcome).increment(1);
}

/// Records elapsed wall time when stopped
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    pub fn stop(self) {
        let elapsed = self.start.elapsed();
        histogram!(self.name).record(elapsed.as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_without_recorder() {
        describe_metrics();
        record_project("synced");
    }

    #[test]
    fn test_timer() {
        let timer = Timer::new("sync.project.duration_ms");
        std::thread::sleep(std::time::Duration::from_millis(5));
        timer.stop();
    }
}
