//! Utility helpers including math extensions, logging spans, and profiling.

pub mod logging;
pub mod math;
pub mod profiling;

pub use math::*;
pub use profiling::{AssignmentTimings, ClusterProfiler};
