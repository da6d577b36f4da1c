use std::time::{Duration, Instant};

use crate::config::ASSIGNMENT_TIMING_HISTORY;

/// Per-frame clustering statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClusterProfiler {
    pub grid_build_time: Duration,
    pub assignment_time: Duration,
    pub packing_time: Duration,
    pub total_frame_time: Duration,

    pub point_light_count: usize,
    pub spot_light_count: usize,
    pub item_count: usize,
    pub cluster_count: usize,
    pub non_empty_cluster_count: usize,
    pub max_items_in_cluster: usize,
}

impl ClusterProfiler {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Average number of light indices per non-empty cluster.
    pub fn average_items_per_active_cluster(&self) -> f32 {
        if self.non_empty_cluster_count == 0 {
            return 0.0;
        }
        self.item_count as f32 / self.non_empty_cluster_count as f32
    }

    pub fn report(&self) {
        let total_us = self.total_frame_time.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }

        log::debug!(
            "Clusters: {} ({} active), Lights: {} point / {} spot, Items: {} (max {} per cluster)",
            self.cluster_count,
            self.non_empty_cluster_count,
            self.point_light_count,
            self.spot_light_count,
            self.item_count,
            self.max_items_in_cluster
        );
        log::debug!(
            "  Grid build: {:.3} ms, Assignment: {:.3} ms ({:.1}%), Packing: {:.3} ms ({:.1}%)",
            self.grid_build_time.as_secs_f32() * 1000.0,
            self.assignment_time.as_secs_f32() * 1000.0,
            (self.assignment_time.as_micros() as f32 / total_us) * 100.0,
            self.packing_time.as_secs_f32() * 1000.0,
            (self.packing_time.as_micros() as f32 / total_us) * 100.0
        );
    }
}

/// Ring buffer over the most recent CPU assignment times, in milliseconds.
#[derive(Debug, Clone)]
pub struct AssignmentTimings {
    samples: [f32; ASSIGNMENT_TIMING_HISTORY],
    next: usize,
    filled: usize,
}

impl Default for AssignmentTimings {
    fn default() -> Self {
        Self {
            samples: [0.0; ASSIGNMENT_TIMING_HISTORY],
            next: 0,
            filled: 0,
        }
    }
}

impl AssignmentTimings {
    pub fn push(&mut self, duration: Duration) {
        self.samples[self.next] = duration.as_secs_f32() * 1000.0;
        self.next = (self.next + 1) % ASSIGNMENT_TIMING_HISTORY;
        self.filled = (self.filled + 1).min(ASSIGNMENT_TIMING_HISTORY);
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn average_ms(&self) -> f32 {
        if self.filled == 0 {
            return 0.0;
        }
        self.samples[..self.filled].iter().sum::<f32>() / self.filled as f32
    }
}

/// Adds the lifetime of the guard to `output`.
pub struct ScopedTimer<'a> {
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(output: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            output,
        }
    }
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        *self.output += self.start.elapsed();
    }
}
