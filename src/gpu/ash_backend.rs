use crate::core::records::{ClusterInfo, GpuClusterBounds, GpuLightClusterData};
use crate::error::{ClusterError, Result};
use crate::gpu::{AssignmentBackend, BufferBinding, ClusterBufferSink};
use ash::vk;
use ash_renderer::vulkan::{Allocator, ComputePipeline, DeletionQueue, VulkanDevice};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    pub allocation: vk_mem::Allocation,
    pub size: u64,
}

/// Vulkan backend: host-visible buffers through VMA, compute dispatch for the
/// GPU assignment strategy, descriptor writes for the shading stage.
///
/// Buffers replaced on reallocation are queued, not destroyed; call
/// `release_retired` after the fence of the last frame that used them.
pub struct AshBackend {
    pub device: Arc<VulkanDevice>,
    pub allocator: Arc<Allocator>,
    max_storage_block_size: usize,

    // Buffers (using interior mutability)
    pub light_info_buffer: Mutex<Option<GpuBuffer>>,
    pub cluster_info_buffer: Mutex<Option<GpuBuffer>>,
    pub cluster_list_buffer: Mutex<Option<GpuBuffer>>,
    pub item_list_buffer: Mutex<Option<GpuBuffer>>,
    pub light_data_buffer: Mutex<Option<GpuBuffer>>,
    pub cluster_bounds_buffer: Mutex<Option<GpuBuffer>>,

    command_buffer: Mutex<Option<vk::CommandBuffer>>,
    descriptor_set: Mutex<Option<vk::DescriptorSet>>,
    assignment_pipeline: Option<Arc<ComputePipeline>>,
    retired: DeletionQueue,
}

impl AshBackend {
    pub fn new(device: Arc<VulkanDevice>) -> Result<Self> {
        let allocator = unsafe { Allocator::new(&device)? };
        let limits = unsafe {
            device
                .instance
                .instance()
                .get_physical_device_properties(device.physical_device)
                .limits
        };
        log::debug!(
            "Vulkan storage buffer range: {} bytes",
            limits.max_storage_buffer_range
        );
        Ok(Self {
            device,
            allocator: Arc::new(allocator),
            max_storage_block_size: limits.max_storage_buffer_range as usize,
            light_info_buffer: Mutex::new(None),
            cluster_info_buffer: Mutex::new(None),
            cluster_list_buffer: Mutex::new(None),
            item_list_buffer: Mutex::new(None),
            light_data_buffer: Mutex::new(None),
            cluster_bounds_buffer: Mutex::new(None),
            command_buffer: Mutex::new(None),
            descriptor_set: Mutex::new(None),
            assignment_pipeline: None,
            retired: DeletionQueue::new("light_cluster_buffers"),
        })
    }

    /// Compute pipeline and descriptor set used by the assignment dispatch and
    /// updated by [`ClusterBufferSink::bind`].
    pub fn set_assignment_pipeline(
        &mut self,
        pipeline: Arc<ComputePipeline>,
        set: vk::DescriptorSet,
    ) {
        self.assignment_pipeline = Some(pipeline);
        *self.descriptor_set.lock() = Some(set);
    }

    pub fn set_descriptor_set(&self, set: vk::DescriptorSet) {
        *self.descriptor_set.lock() = Some(set);
    }

    /// Command buffer in the recording state that receives dispatches and barriers.
    pub fn set_command_buffer(&self, command_buffer: vk::CommandBuffer) {
        *self.command_buffer.lock() = Some(command_buffer);
    }

    fn slot(&self, binding: BufferBinding) -> &Mutex<Option<GpuBuffer>> {
        match binding {
            BufferBinding::LightInfo => &self.light_info_buffer,
            BufferBinding::ClusterInfo => &self.cluster_info_buffer,
            BufferBinding::ClusterList => &self.cluster_list_buffer,
            BufferBinding::ItemList => &self.item_list_buffer,
            BufferBinding::LightData => &self.light_data_buffer,
            BufferBinding::ClusterBounds => &self.cluster_bounds_buffer,
        }
    }

    fn usage(binding: BufferBinding) -> vk::BufferUsageFlags {
        match binding {
            BufferBinding::LightInfo | BufferBinding::ClusterInfo => {
                vk::BufferUsageFlags::UNIFORM_BUFFER
            }
            _ => vk::BufferUsageFlags::STORAGE_BUFFER,
        }
    }

    fn ensure_buffer(
        &self,
        existing: &mut Option<GpuBuffer>,
        size: u64,
        usage: vk::BufferUsageFlags,
    ) -> Result<()> {
        match existing.take() {
            Some(buf) if buf.size >= size => {
                *existing = Some(buf);
                return Ok(());
            }
            Some(buf) => self.retire(buf),
            None => {}
        }

        let (buffer, allocation) = unsafe {
            self.allocator.create_buffer(
                size.max(4),
                usage | vk::BufferUsageFlags::TRANSFER_DST,
                vk_mem::MemoryUsage::AutoPreferHost,
            )?
        };
        *existing = Some(GpuBuffer {
            buffer,
            allocation,
            size,
        });
        Ok(())
    }

    fn write(&self, binding: BufferBinding, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let mut slot = self.slot(binding).lock();
        self.ensure_buffer(&mut slot, bytes.len() as u64, Self::usage(binding))?;
        if let Some(buf) = slot.as_mut() {
            unsafe {
                let ptr = self.allocator.vma.map_memory(&mut buf.allocation)?;
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
                self.allocator.vma.unmap_memory(&mut buf.allocation);
            }
        }
        Ok(())
    }

    /// Defers destruction of `buf` until frames reading it have completed.
    fn retire(&self, buf: GpuBuffer) {
        let allocator = Arc::clone(&self.allocator);
        let GpuBuffer {
            buffer,
            mut allocation,
            size,
        } = buf;
        log::debug!("Retiring {size} byte cluster buffer");
        self.retired.push(move || unsafe {
            allocator.destroy_buffer(buffer, &mut allocation);
        });
    }

    /// Replaced buffers not yet released.
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    fn recording(&self) -> Result<vk::CommandBuffer> {
        (*self.command_buffer.lock())
            .ok_or_else(|| ClusterError::Device("no command buffer is recording".into()))
    }
}

impl ClusterBufferSink for AshBackend {
    fn name(&self) -> &str {
        "vulkan-ash"
    }

    fn max_storage_block_size(&self) -> usize {
        self.max_storage_block_size
    }

    fn allocate(&self, binding: BufferBinding, bytes: &[u8]) -> Result<()> {
        if let Some(old) = self.slot(binding).lock().take() {
            self.retire(old);
        }
        log::debug!("Allocating {} ({} bytes)", binding.label(), bytes.len());
        self.write(binding, bytes)
    }

    fn update(&self, binding: BufferBinding, bytes: &[u8]) -> Result<()> {
        self.write(binding, bytes)
    }

    fn bind(&self, binding: BufferBinding) -> Result<()> {
        let Some(set) = *self.descriptor_set.lock() else {
            return Ok(());
        };
        let slot = self.slot(binding).lock();
        let Some(buf) = slot.as_ref() else {
            return Ok(());
        };

        let descriptor_type = if Self::usage(binding) == vk::BufferUsageFlags::UNIFORM_BUFFER {
            vk::DescriptorType::UNIFORM_BUFFER
        } else {
            vk::DescriptorType::STORAGE_BUFFER
        };
        let buffer_info = [vk::DescriptorBufferInfo::default()
            .buffer(buf.buffer)
            .offset(0)
            .range(vk::WHOLE_SIZE)];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(binding.binding_point())
            .descriptor_type(descriptor_type)
            .buffer_info(&buffer_info);
        unsafe {
            self.device.device.update_descriptor_sets(&[write], &[]);
        }
        Ok(())
    }

    fn release_retired(&self) -> Result<()> {
        self.retired.flush();
        Ok(())
    }
}

impl AssignmentBackend for AshBackend {
    fn name(&self) -> &str {
        "vulkan-ash"
    }

    fn max_storage_block_size(&self) -> usize {
        self.max_storage_block_size
    }

    fn upload_cluster_bounds(&self, info: &ClusterInfo, bounds: &[GpuClusterBounds]) -> Result<()> {
        ClusterBufferSink::allocate(self, BufferBinding::ClusterInfo, bytemuck::bytes_of(info))?;
        let bounds_bytes: &[u8] = bytemuck::cast_slice(bounds);
        ClusterBufferSink::allocate(self, BufferBinding::ClusterBounds, bounds_bytes)?;
        // The dispatch writes the lists; they only need the right size here.
        let list_bytes =
            info.cluster_list_count as usize * std::mem::size_of::<crate::core::ClusterRecord>();
        ClusterBufferSink::allocate(self, BufferBinding::ClusterList, &vec![0u8; list_bytes])?;
        let item_bytes = info.item_list_count as usize * std::mem::size_of::<u32>();
        ClusterBufferSink::allocate(self, BufferBinding::ItemList, &vec![0u8; item_bytes])?;
        for binding in [
            BufferBinding::ClusterInfo,
            BufferBinding::ClusterBounds,
            BufferBinding::ClusterList,
            BufferBinding::ItemList,
        ] {
            self.bind(binding)?;
        }
        Ok(())
    }

    fn upload_lights(&self, lights: &[GpuLightClusterData], _point_count: usize) -> Result<()> {
        self.write(BufferBinding::LightData, bytemuck::cast_slice(lights))?;
        self.bind(BufferBinding::LightData)
    }

    fn dispatch(&self, groups: [u32; 3]) -> Result<()> {
        let pipeline = self
            .assignment_pipeline
            .as_ref()
            .ok_or_else(|| ClusterError::Device("assignment pipeline not set".into()))?;
        let set = (*self.descriptor_set.lock())
            .ok_or_else(|| ClusterError::Device("assignment descriptor set not set".into()))?;
        let command_buffer = self.recording()?;

        unsafe {
            let device = &self.device.device;
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                pipeline.handle(),
            );
            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                pipeline.layout(),
                0,
                &[set],
                &[],
            );
            device.cmd_dispatch(command_buffer, groups[0], groups[1], groups[2]);
        }
        Ok(())
    }

    fn barrier(&self) -> Result<()> {
        let command_buffer = self.recording()?;
        let lists = [self.cluster_list_buffer.lock(), self.item_list_buffer.lock()];
        let barriers: Vec<_> = lists
            .iter()
            .filter_map(|slot| slot.as_ref())
            .map(|buf| {
                vk::BufferMemoryBarrier::default()
                    .src_access_mask(vk::AccessFlags::SHADER_WRITE)
                    .dst_access_mask(vk::AccessFlags::SHADER_READ)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .buffer(buf.buffer)
                    .offset(0)
                    .size(vk::WHOLE_SIZE)
            })
            .collect();

        unsafe {
            self.device.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &barriers,
                &[],
            );
        }
        Ok(())
    }

    fn release_retired(&self) -> Result<()> {
        self.retired.flush();
        Ok(())
    }
}

impl Drop for AshBackend {
    fn drop(&mut self) {
        self.retired.flush();
        let slots = [
            &self.light_info_buffer,
            &self.cluster_info_buffer,
            &self.cluster_list_buffer,
            &self.item_list_buffer,
            &self.light_data_buffer,
            &self.cluster_bounds_buffer,
        ];
        unsafe {
            for slot in slots {
                if let Some(mut buf) = slot.lock().take() {
                    self.allocator
                        .destroy_buffer(buf.buffer, &mut buf.allocation);
                }
            }
        }
    }
}
