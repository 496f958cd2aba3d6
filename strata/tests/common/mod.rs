//! A `Device` that records what it is asked to do instead of talking to a GPU.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};
use strata::{
    vk::{self, Handle},
    AllocationKind, Buffer, BufferDescription, Device, DeviceError, Image, ImageDescription,
    MemoryAllocationBytes, TexelBuffer, TexelBufferDescription,
};
use tracing_subscriber::filter::LevelFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(LevelFilter::TRACE)
        .try_init();
}

#[derive(Clone, Debug)]
pub struct BufferBarrierRecord {
    pub buffer: vk::Buffer,
    pub src_stage_mask: vk::PipelineStageFlags2,
    pub src_access_mask: vk::AccessFlags2,
    pub dst_stage_mask: vk::PipelineStageFlags2,
    pub dst_access_mask: vk::AccessFlags2,
    pub size: vk::DeviceSize,
}

#[derive(Clone, Debug)]
pub struct ImageBarrierRecord {
    pub image: vk::Image,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_access_mask: vk::AccessFlags2,
    pub dst_access_mask: vk::AccessFlags2,
    pub level_count: u32,
}

/// One recorded `vkCmdPipelineBarrier2`.
#[derive(Clone, Debug)]
pub struct BarrierCommand {
    pub command_buffer: vk::CommandBuffer,
    pub buffers: Vec<BufferBarrierRecord>,
    pub images: Vec<ImageBarrierRecord>,
}

#[derive(Clone, Debug)]
pub struct PoolRecord {
    pub pool: vk::DescriptorPool,
    pub max_sets: u32,
    pub allocated_sets: u32,
    pub resets: u32,
    pub destroyed: bool,
    pub variable_counts: Vec<u32>,
}

#[derive(Default)]
pub struct Recorded {
    pub buffers_created: usize,
    pub buffers_destroyed: usize,
    pub texel_buffers_created: usize,
    pub texel_buffers_destroyed: usize,
    pub images_created: usize,
    pub images_destroyed: usize,
    pub subresource_views_created: usize,
    pub views_destroyed: Vec<vk::ImageView>,
    pub barrier_commands: Vec<BarrierCommand>,
    pub debug_names: HashMap<u64, String>,
    pub pools: Vec<PoolRecord>,
}

pub struct RecordingDevice {
    next_handle: AtomicU64,
    fail_allocations: AtomicBool,
    memory: MemoryAllocationBytes,
    recorded: Mutex<Recorded>,
}

impl RecordingDevice {
    pub fn new() -> Arc<RecordingDevice> {
        Arc::new(RecordingDevice {
            next_handle: AtomicU64::new(1),
            fail_allocations: AtomicBool::new(false),
            memory: MemoryAllocationBytes::default(),
            recorded: Mutex::new(Recorded::default()),
        })
    }

    pub fn recorded(&self) -> MutexGuard<Recorded> {
        self.recorded.lock().unwrap()
    }

    /// Makes every following resource creation fail with `ERROR_OUT_OF_DEVICE_MEMORY`.
    pub fn set_fail_allocations(&self, fail: bool) {
        self.fail_allocations.store(fail, Ordering::SeqCst);
    }

    pub fn debug_name<H: Handle>(&self, handle: H) -> Option<String> {
        self.recorded().debug_names.get(&handle.as_raw()).cloned()
    }

    fn next_raw(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn check_allocation(&self) -> Result<(), DeviceError> {
        if self.fail_allocations.load(Ordering::SeqCst) {
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY.into())
        } else {
            Ok(())
        }
    }

    fn pool_mut<'a>(recorded: &'a mut Recorded, pool: vk::DescriptorPool) -> &'a mut PoolRecord {
        recorded
            .pools
            .iter_mut()
            .find(|record| record.pool == pool)
            .expect("unknown descriptor pool")
    }
}

fn image_byte_size(description: &ImageDescription) -> u64 {
    description.width as u64 * description.height as u64 * description.depth as u64 * 4
}

impl Device for RecordingDevice {
    fn create_buffer(
        &self,
        description: &BufferDescription,
        debug_name: &str,
    ) -> Result<Buffer, DeviceError> {
        self.check_allocation()?;
        let handle = vk::Buffer::from_raw(self.next_raw());
        self.memory.add(AllocationKind::Buffer, description.byte_size);
        let mut recorded = self.recorded();
        recorded.buffers_created += 1;
        recorded
            .debug_names
            .insert(handle.as_raw(), debug_name.to_owned());
        Ok(Buffer::new(handle, description.byte_size, 0, None))
    }

    fn destroy_buffer(&self, buffer: Buffer) {
        self.memory.sub(AllocationKind::Buffer, buffer.byte_size);
        self.recorded().buffers_destroyed += 1;
    }

    fn create_texel_buffer(
        &self,
        description: &TexelBufferDescription,
        debug_name: &str,
    ) -> Result<TexelBuffer, DeviceError> {
        self.check_allocation()?;
        if description.required_format_features().is_empty() {
            return Err(DeviceError::UnsupportedTexelFormat {
                format: description.format,
                usage: description.usage,
            });
        }
        let handle = vk::Buffer::from_raw(self.next_raw());
        let view = vk::BufferView::from_raw(self.next_raw());
        self.memory
            .add(AllocationKind::TexelBuffer, description.byte_size);
        let mut recorded = self.recorded();
        recorded.texel_buffers_created += 1;
        recorded
            .debug_names
            .insert(handle.as_raw(), debug_name.to_owned());
        Ok(TexelBuffer::new(
            handle,
            view,
            description.format,
            description.byte_size,
            None,
        ))
    }

    fn destroy_texel_buffer(&self, buffer: TexelBuffer) {
        self.memory
            .sub(AllocationKind::TexelBuffer, buffer.byte_size);
        self.recorded().texel_buffers_destroyed += 1;
    }

    fn create_image(
        &self,
        description: &ImageDescription,
        debug_name: &str,
    ) -> Result<Image, DeviceError> {
        self.check_allocation()?;
        let handle = vk::Image::from_raw(self.next_raw());
        let view = vk::ImageView::from_raw(self.next_raw());
        let byte_size = image_byte_size(description);
        self.memory.add(AllocationKind::Image, byte_size);
        let mut recorded = self.recorded();
        recorded.images_created += 1;
        recorded
            .debug_names
            .insert(handle.as_raw(), debug_name.to_owned());
        Ok(Image::new(handle, view, description, byte_size, None))
    }

    fn destroy_image(&self, image: Image) {
        self.memory.sub(AllocationKind::Image, image.raw_byte_size);
        let mut recorded = self.recorded();
        recorded.images_destroyed += 1;
        recorded
            .views_destroyed
            .extend(image.subresource_views().iter().copied());
        recorded.views_destroyed.push(image.view);
    }

    fn create_subresource_views(&self, image: &Image) -> Result<Vec<vk::ImageView>, DeviceError> {
        assert_eq!(image.layer_count, 1);
        let views: Vec<_> = (0..image.mip_count)
            .map(|_| vk::ImageView::from_raw(self.next_raw()))
            .collect();
        self.recorded().subresource_views_created += views.len();
        Ok(views)
    }

    fn set_debug_name(&self, _object_type: vk::ObjectType, raw_handle: u64, name: &str) {
        self.recorded()
            .debug_names
            .insert(raw_handle, name.to_owned());
    }

    fn memory_allocations(&self) -> &MemoryAllocationBytes {
        &self.memory
    }

    fn cmd_pipeline_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        buffer_barriers: &[vk::BufferMemoryBarrier2],
        image_barriers: &[vk::ImageMemoryBarrier2],
    ) {
        let buffers = buffer_barriers
            .iter()
            .map(|b| BufferBarrierRecord {
                buffer: b.buffer,
                src_stage_mask: b.src_stage_mask,
                src_access_mask: b.src_access_mask,
                dst_stage_mask: b.dst_stage_mask,
                dst_access_mask: b.dst_access_mask,
                size: b.size,
            })
            .collect();
        let images = image_barriers
            .iter()
            .map(|b| ImageBarrierRecord {
                image: b.image,
                old_layout: b.old_layout,
                new_layout: b.new_layout,
                src_access_mask: b.src_access_mask,
                dst_access_mask: b.dst_access_mask,
                level_count: b.subresource_range.level_count,
            })
            .collect();
        self.recorded().barrier_commands.push(BarrierCommand {
            command_buffer,
            buffers,
            images,
        });
    }

    fn create_descriptor_pool(
        &self,
        _flags: vk::DescriptorPoolCreateFlags,
        max_sets: u32,
        _pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<vk::DescriptorPool, DeviceError> {
        let pool = vk::DescriptorPool::from_raw(self.next_raw());
        self.recorded().pools.push(PoolRecord {
            pool,
            max_sets,
            allocated_sets: 0,
            resets: 0,
            destroyed: false,
            variable_counts: Vec::new(),
        });
        Ok(pool)
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> Result<(), DeviceError> {
        let mut recorded = self.recorded();
        let record = Self::pool_mut(&mut recorded, pool);
        record.allocated_sets = 0;
        record.resets += 1;
        Ok(())
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        let mut recorded = self.recorded();
        Self::pool_mut(&mut recorded, pool).destroyed = true;
    }

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
        variable_descriptor_counts: Option<&[u32]>,
    ) -> Result<Vec<vk::DescriptorSet>, vk::Result> {
        let count = layouts.len() as u32;
        {
            let mut recorded = self.recorded();
            let record = Self::pool_mut(&mut recorded, pool);
            if record.allocated_sets + count > record.max_sets {
                return Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY);
            }
            record.allocated_sets += count;
            if let Some(counts) = variable_descriptor_counts {
                record.variable_counts.extend_from_slice(counts);
            }
        }
        Ok(layouts
            .iter()
            .map(|_| vk::DescriptorSet::from_raw(self.next_raw()))
            .collect())
    }
}

pub fn storage_image_description() -> ImageDescription {
    ImageDescription::new_2d(
        vk::Format::R8G8B8A8_UNORM,
        256,
        256,
        vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
    )
}

pub fn storage_buffer_description(byte_size: u64) -> BufferDescription {
    BufferDescription {
        byte_size,
        usage: vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
        memory: strata::ResourceMemoryInfo::DEVICE_LOCAL,
    }
}
