use log::{log_enabled, Level};
use std::time::Instant;

const TARGET: &str = "light_clusterer::trace";

/// Trace-level span around one clustering pass.
pub struct TraceSpan {
    stage: &'static str,
    lights: usize,
    start: Instant,
}

impl TraceSpan {
    pub fn new(stage: &'static str, lights: usize) -> Self {
        if log_enabled!(target: TARGET, Level::Trace) {
            log::trace!(target: TARGET, "{stage}: clustering {lights} lights");
        }
        Self {
            stage,
            lights,
            start: Instant::now(),
        }
    }
}

impl Drop for TraceSpan {
    fn drop(&mut self) {
        if log_enabled!(target: TARGET, Level::Trace) {
            log::trace!(
                target: TARGET,
                "{}: {} lights done in {} µs",
                self.stage,
                self.lights,
                self.start.elapsed().as_micros()
            );
        }
    }
}
