//! Light clustering strategies and the per-frame pipeline they share:
//! rebuild the grid when dirty, assign lights, pack the output buffers.

pub mod base;
pub mod gpu_assignment;
pub mod packing;
pub mod plane_array;
pub mod six_plane;

pub use base::ClusterBase;
pub use gpu_assignment::GpuAssignmentClusterer;
pub use packing::{pack_clusters, CellLights, ClusterCache, ItemBuffer, PackedClusters};
pub use plane_array::{walk_cells, PlaneArrayClusterer};
pub use six_plane::SixPlaneClusterer;

use serde::{Deserialize, Serialize};

use crate::core::{ClusterCamera, ClusterRecord, ClustererParameters, LightSet, Viewport};
use crate::error::Result;
use crate::gpu::{AssignmentBackend, ClusterBufferSink};

/// Strategy selection exposed to the lighting front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ClustererType {
    /// No clustering; the shading stage loops over all lights.
    None,
    SixPlane,
    #[default]
    PlaneArrays,
    GpuAssignment,
}

impl ClustererType {
    pub fn default_parameters(self) -> Option<ClustererParameters> {
        match self {
            Self::None => None,
            Self::SixPlane => Some(ClustererParameters::six_plane()),
            Self::PlaneArrays => Some(ClustererParameters::plane_arrays()),
            Self::GpuAssignment => Some(ClustererParameters::gpu_assignment()),
        }
    }
}

/// Closed set of clustering strategies, chosen once per configuration change.
pub enum LightClusterer {
    SixPlane(SixPlaneClusterer),
    PlaneArrays(PlaneArrayClusterer),
    GpuAssignment(GpuAssignmentClusterer),
}

impl LightClusterer {
    /// Builds the strategy for `kind` with its default parameters.
    /// Returns `None` for [`ClustererType::None`].
    pub fn new(
        kind: ClustererType,
        viewport: Viewport,
        sink: Box<dyn ClusterBufferSink>,
        backend: Box<dyn AssignmentBackend>,
    ) -> Option<Self> {
        let params = kind.default_parameters()?;
        Self::with_parameters(kind, params, viewport, sink, backend)
    }

    pub fn with_parameters(
        kind: ClustererType,
        params: ClustererParameters,
        viewport: Viewport,
        sink: Box<dyn ClusterBufferSink>,
        backend: Box<dyn AssignmentBackend>,
    ) -> Option<Self> {
        match kind {
            ClustererType::None => None,
            ClustererType::SixPlane => {
                Some(Self::SixPlane(SixPlaneClusterer::new(params, viewport, sink)))
            }
            ClustererType::PlaneArrays => {
                Some(Self::PlaneArrays(PlaneArrayClusterer::new(params, viewport, sink)))
            }
            ClustererType::GpuAssignment => Some(Self::GpuAssignment(GpuAssignmentClusterer::new(
                params, viewport, backend,
            ))),
        }
    }

    pub fn kind(&self) -> ClustererType {
        match self {
            Self::SixPlane(_) => ClustererType::SixPlane,
            Self::PlaneArrays(_) => ClustererType::PlaneArrays,
            Self::GpuAssignment(_) => ClustererType::GpuAssignment,
        }
    }

    pub fn cluster_lights(
        &mut self,
        camera: &ClusterCamera,
        viewport: Viewport,
        lights: LightSet<'_>,
    ) -> Result<()> {
        match self {
            Self::SixPlane(c) => c.cluster_lights(camera, viewport, lights),
            Self::PlaneArrays(c) => c.cluster_lights(camera, viewport, lights),
            Self::GpuAssignment(c) => c.cluster_lights(camera, viewport, lights),
        }
    }

    pub fn base(&self) -> &ClusterBase {
        match self {
            Self::SixPlane(c) => c.base(),
            Self::PlaneArrays(c) => c.base(),
            Self::GpuAssignment(c) => c.base(),
        }
    }

    pub fn base_mut(&mut self) -> &mut ClusterBase {
        match self {
            Self::SixPlane(c) => c.base_mut(),
            Self::PlaneArrays(c) => c.base_mut(),
            Self::GpuAssignment(c) => c.base_mut(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.base_mut().resize(width, height);
    }

    /// Host copy of the packed cluster list. The GPU strategy keeps its lists on the device.
    pub fn cluster_list(&self) -> Option<&[ClusterRecord]> {
        match self {
            Self::SixPlane(c) => Some(c.cluster_list()),
            Self::PlaneArrays(c) => Some(c.cluster_list()),
            Self::GpuAssignment(_) => None,
        }
    }

    pub fn items(&self) -> Option<&[u32]> {
        match self {
            Self::SixPlane(c) => Some(c.items()),
            Self::PlaneArrays(c) => Some(c.items()),
            Self::GpuAssignment(_) => None,
        }
    }
}
