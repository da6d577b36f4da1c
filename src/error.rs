//! Error types for the light clusterer.
//!
//! This module provides a unified error type [`ClusterError`] and a convenient [`Result`] alias.

use std::fmt;

/// Main error type for clustering setup and per-frame packing.
///
/// Degenerate geometry (a light touching no cell) is not an error; only
/// configuration and hardware-limit violations surface here.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterError {
    /// Grid configuration or camera parameters cannot produce a grid.
    InvalidConfiguration(String),
    /// A GPU-visible buffer would exceed the device's shader storage block limit.
    BufferTooLarge {
        buffer: &'static str,
        requested: usize,
        limit: usize,
    },
    /// A single cluster received more lights of one type than its record can count.
    ClusterOverflow { cluster: usize, count: usize },
    /// The device backend rejected an allocation, mapping, or submission.
    Device(String),
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {msg}"),
            Self::BufferTooLarge {
                buffer,
                requested,
                limit,
            } => write!(
                f,
                "Buffer too large: {buffer} needs {requested} bytes, limit is {limit} bytes"
            ),
            Self::ClusterOverflow { cluster, count } => {
                write!(f, "Cluster overflow: cluster {cluster} holds {count} lights")
            }
            Self::Device(msg) => write!(f, "Device error: {msg}"),
        }
    }
}

impl std::error::Error for ClusterError {}

/// Convenient Result type alias for clustering operations.
pub type Result<T> = std::result::Result<T, ClusterError>;

impl From<ash::vk::Result> for ClusterError {
    fn from(result: ash::vk::Result) -> Self {
        Self::Device(format!("{result:?}"))
    }
}

impl From<ash_renderer::AshError> for ClusterError {
    fn from(err: ash_renderer::AshError) -> Self {
        Self::Device(err.to_string())
    }
}
