//! Clustered lighting front end: owns the light lists, clamps them to what
//! the shading stage can hold, and drives the selected clusterer each frame.

use std::mem::size_of;
use std::sync::Arc;

use crate::clustering::{ClustererType, LightClusterer};
use crate::config::{DEFAULT_MAX_POINT_LIGHTS, DEFAULT_MAX_SPOT_LIGHTS};
use crate::core::{
    ClusterCamera, ClustererParameters, GpuPointLight, GpuSpotLight, LightInfo, LightSet,
    PointLight, PointLightClusterData, SpotLight, SpotLightClusterData, Viewport,
};
use crate::error::Result;
use crate::gpu::{AssignmentBackend, BufferBinding, ClusterBufferSink, NoopBackend};

pub struct ClusteredLighting {
    viewport: Viewport,
    sink: Arc<dyn ClusterBufferSink>,
    backend: Arc<dyn AssignmentBackend>,

    point_lights: Vec<PointLight>,
    spot_lights: Vec<SpotLight>,
    max_point_lights: usize,
    max_spot_lights: usize,

    cluster_type: ClustererType,
    clusterer: Option<LightClusterer>,
    light_info: LightInfo,

    point_data: Vec<PointLightClusterData>,
    spot_data: Vec<SpotLightClusterData>,
}

impl ClusteredLighting {
    pub fn new(
        viewport: Viewport,
        sink: Arc<dyn ClusterBufferSink>,
        backend: Arc<dyn AssignmentBackend>,
    ) -> Result<Self> {
        let light_info = LightInfo::default();
        sink.allocate(BufferBinding::LightInfo, bytemuck::bytes_of(&light_info))?;

        let mut lighting = Self {
            viewport,
            sink,
            backend,
            point_lights: Vec::new(),
            spot_lights: Vec::new(),
            max_point_lights: 0,
            max_spot_lights: 0,
            cluster_type: ClustererType::None,
            clusterer: None,
            light_info,
            point_data: Vec::new(),
            spot_data: Vec::new(),
        };
        lighting.set_light_maxima(DEFAULT_MAX_POINT_LIGHTS, DEFAULT_MAX_SPOT_LIGHTS);
        Ok(lighting)
    }

    /// Front end with host-side no-op buffers, for CPU-only use.
    pub fn headless(viewport: Viewport) -> Result<Self> {
        Self::new(viewport, Arc::new(NoopBackend::new()), Arc::new(NoopBackend::new()))
    }

    /// Caps the lights handed to the shading stage, clamped to what one
    /// storage block of shader records can hold.
    pub fn set_light_maxima(&mut self, max_point_lights: usize, max_spot_lights: usize) {
        let block = self.sink.max_storage_block_size();
        self.max_point_lights = max_point_lights.min(block / size_of::<GpuPointLight>());
        self.max_spot_lights = max_spot_lights.min(block / size_of::<GpuSpotLight>());
    }

    pub fn light_maxima(&self) -> (usize, usize) {
        (self.max_point_lights, self.max_spot_lights)
    }

    pub fn add_point_light(&mut self, light: PointLight) -> usize {
        self.point_lights.push(light);
        self.point_lights.len() - 1
    }

    pub fn add_spot_light(&mut self, light: SpotLight) -> usize {
        self.spot_lights.push(light);
        self.spot_lights.len() - 1
    }

    pub fn point_lights_mut(&mut self) -> &mut [PointLight] {
        &mut self.point_lights
    }

    pub fn spot_lights_mut(&mut self) -> &mut [SpotLight] {
        &mut self.spot_lights
    }

    pub fn clear_lights(&mut self) {
        self.point_lights.clear();
        self.spot_lights.clear();
    }

    pub fn cluster_type(&self) -> ClustererType {
        self.cluster_type
    }

    /// Swaps the clusterer; a no-op when `kind` is already selected.
    pub fn set_cluster_type(&mut self, kind: ClustererType) {
        if kind == self.cluster_type && (kind == ClustererType::None || self.clusterer.is_some()) {
            return;
        }
        log::debug!("Switching clusterer {:?} -> {:?}", self.cluster_type, kind);
        self.cluster_type = kind;
        self.clusterer = LightClusterer::new(
            kind,
            self.viewport,
            Box::new(Arc::clone(&self.sink)),
            Box::new(Arc::clone(&self.backend)),
        );
    }

    /// Replaces the active clusterer's parameters; the grid rebuilds next frame.
    pub fn set_cluster_parameters(&mut self, params: ClustererParameters) {
        if let Some(clusterer) = self.clusterer.as_mut() {
            clusterer.base_mut().set_parameters(params);
        }
    }

    pub fn clusterer(&self) -> Option<&LightClusterer> {
        self.clusterer.as_ref()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Viewport::new(width, height);
        if let Some(clusterer) = self.clusterer.as_mut() {
            clusterer.resize(width, height);
        }
    }

    /// Counts the active lights, uploads and binds the light info record.
    pub fn init_render(&mut self) -> Result<LightInfo> {
        let active_points = self.point_lights.iter().filter(|l| l.active).count();
        let active_spots = self.spot_lights.iter().filter(|l| l.active).count();
        if active_points > self.max_point_lights || active_spots > self.max_spot_lights {
            log::warn!(
                "Active lights ({} point / {} spot) exceed maxima ({} / {}), \
                 extra lights are not shaded",
                active_points,
                active_spots,
                self.max_point_lights,
                self.max_spot_lights
            );
        }

        self.light_info = LightInfo {
            point_light_count: active_points.min(self.max_point_lights) as u32,
            spot_light_count: active_spots.min(self.max_spot_lights) as u32,
            cluster_enabled: self.clusterer.is_some() as u32,
            _pad: 0,
        };
        self.sink
            .update(BufferBinding::LightInfo, bytemuck::bytes_of(&self.light_info))?;
        self.sink.bind(BufferBinding::LightInfo)?;
        Ok(self.light_info)
    }

    pub fn light_info(&self) -> LightInfo {
        self.light_info
    }

    pub fn visible_lights(&self) -> usize {
        (self.light_info.point_light_count + self.light_info.spot_light_count) as usize
    }

    /// Shader records of the lights the shading stage sees, in item-index order.
    pub fn point_light_shader_data(&self) -> Vec<GpuPointLight> {
        self.active_points().map(PointLight::shader_data).collect()
    }

    pub fn spot_light_shader_data(&self) -> Vec<GpuSpotLight> {
        self.active_spots().map(SpotLight::shader_data).collect()
    }

    /// Assigns the active lights to clusters for this frame.
    pub fn cluster(&mut self, camera: &ClusterCamera) -> Result<()> {
        let mut point_data = std::mem::take(&mut self.point_data);
        let mut spot_data = std::mem::take(&mut self.spot_data);
        point_data.clear();
        spot_data.clear();
        point_data.extend(self.active_points().map(PointLight::cluster_data));
        spot_data.extend(self.active_spots().map(SpotLight::cluster_data));

        let viewport = self.viewport;
        let result = match self.clusterer.as_mut() {
            Some(clusterer) => {
                clusterer.cluster_lights(camera, viewport, LightSet::new(&point_data, &spot_data))
            }
            None => Ok(()),
        };

        self.point_data = point_data;
        self.spot_data = spot_data;
        result
    }

    /// Frees buffers replaced during earlier frames. Call once the frame
    /// fence shows the shading pass is done with them.
    pub fn release_retired(&self) -> Result<()> {
        self.sink.release_retired()?;
        self.backend.release_retired()
    }

    fn active_points(&self) -> impl Iterator<Item = &PointLight> {
        self.point_lights
            .iter()
            .filter(|l| l.active)
            .take(self.max_point_lights)
    }

    fn active_spots(&self) -> impl Iterator<Item = &SpotLight> {
        self.spot_lights
            .iter()
            .filter(|l| l.active)
            .take(self.max_spot_lights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HostBuffers;
    use glam::Vec3;

    #[test]
    fn maxima_clamp_to_block_size() {
        let sink = Arc::new(HostBuffers::with_limit(32 * 10));
        let mut lighting =
            ClusteredLighting::new(Viewport::new(64, 64), sink, Arc::new(NoopBackend)).unwrap();
        assert_eq!(lighting.light_maxima(), (10, 6));
        lighting.set_light_maxima(3, 100);
        assert_eq!(lighting.light_maxima(), (3, 6));
    }

    #[test]
    fn light_info_counts_active_lights() {
        let sink = Arc::new(HostBuffers::new());
        let mut lighting =
            ClusteredLighting::new(Viewport::new(256, 256), sink.clone(), Arc::new(NoopBackend))
                .unwrap();
        lighting.add_point_light(PointLight::new(Vec3::ZERO, 1.0));
        let hidden = lighting.add_point_light(PointLight::new(Vec3::X, 1.0));
        lighting.point_lights_mut()[hidden].active = false;
        lighting.add_spot_light(SpotLight::new(Vec3::ZERO, Vec3::NEG_Z, 4.0, 25.0));

        let info = lighting.init_render().unwrap();
        assert_eq!(info.point_light_count, 1);
        assert_eq!(info.spot_light_count, 1);
        assert_eq!(info.cluster_enabled, 0);

        lighting.set_cluster_type(ClustererType::PlaneArrays);
        let info = lighting.init_render().unwrap();
        assert_eq!(info.cluster_enabled, 1);
        let uploaded = sink.contents(BufferBinding::LightInfo).unwrap();
        assert_eq!(uploaded, bytemuck::bytes_of(&info));
    }

    #[test]
    fn cluster_type_switch_replaces_clusterer() {
        let mut lighting = ClusteredLighting::headless(Viewport::new(256, 256)).unwrap();
        lighting.set_cluster_type(ClustererType::SixPlane);
        assert_eq!(lighting.clusterer().map(LightClusterer::kind), Some(ClustererType::SixPlane));
        lighting.set_cluster_type(ClustererType::None);
        assert!(lighting.clusterer().is_none());
    }
}
