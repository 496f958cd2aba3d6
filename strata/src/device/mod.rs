//! Device boundary.
//!
//! Collections and the descriptor allocator never talk to Vulkan directly. They go through the
//! [`Device`] trait, which creates and destroys native objects, records barriers and keeps memory
//! totals. [`VulkanDevice`] implements it on top of `ash` and `gpu-allocator`.
use crate::{
    error::DeviceError,
    resource::{
        Buffer, BufferDescription, Image, ImageDescription, TexelBuffer, TexelBufferDescription,
    },
    vk,
};
use std::sync::atomic::{AtomicU64, Ordering};

mod vulkan;

pub use vulkan::{DeviceSettings, VulkanDevice};

/// Bytes currently allocated for each resource kind.
///
/// Updated by device implementations from any thread.
#[derive(Debug, Default)]
pub struct MemoryAllocationBytes {
    images: AtomicU64,
    buffers: AtomicU64,
    texel_buffers: AtomicU64,
}

/// The kind of a tracked allocation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AllocationKind {
    Image,
    Buffer,
    TexelBuffer,
}

impl MemoryAllocationBytes {
    fn counter(&self, kind: AllocationKind) -> &AtomicU64 {
        match kind {
            AllocationKind::Image => &self.images,
            AllocationKind::Buffer => &self.buffers,
            AllocationKind::TexelBuffer => &self.texel_buffers,
        }
    }

    pub fn add(&self, kind: AllocationKind, bytes: u64) {
        self.counter(kind).fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn sub(&self, kind: AllocationKind, bytes: u64) {
        let previous = self.counter(kind).fetch_sub(bytes, Ordering::Relaxed);
        debug_assert!(previous >= bytes, "{:?} allocation total underflow", kind);
    }

    pub fn images(&self) -> u64 {
        self.images.load(Ordering::Relaxed)
    }

    pub fn buffers(&self) -> u64 {
        self.buffers.load(Ordering::Relaxed)
    }

    pub fn texel_buffers(&self) -> u64 {
        self.texel_buffers.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.images() + self.buffers() + self.texel_buffers()
    }
}

/// Native object creation, destruction and command recording.
///
/// Implementations must be usable from several threads: an asset streaming thread may create and
/// destroy resources while the main thread records a frame.
pub trait Device: Send + Sync {
    fn create_buffer(
        &self,
        description: &BufferDescription,
        debug_name: &str,
    ) -> Result<Buffer, DeviceError>;
    fn destroy_buffer(&self, buffer: Buffer);

    fn create_texel_buffer(
        &self,
        description: &TexelBufferDescription,
        debug_name: &str,
    ) -> Result<TexelBuffer, DeviceError>;
    fn destroy_texel_buffer(&self, buffer: TexelBuffer);

    /// Creates an image along with a view over all of its mips and layers.
    fn create_image(
        &self,
        description: &ImageDescription,
        debug_name: &str,
    ) -> Result<Image, DeviceError>;
    /// Destroys an image, its main view and the subresource views created for it.
    fn destroy_image(&self, image: Image);

    /// Creates one view per mip of `image`. The image must have a single layer.
    fn create_subresource_views(&self, image: &Image) -> Result<Vec<vk::ImageView>, DeviceError>;

    /// Names an object for debugging tools. A no-op when debug utils are unavailable.
    fn set_debug_name(&self, object_type: vk::ObjectType, raw_handle: u64, name: &str);

    fn memory_allocations(&self) -> &MemoryAllocationBytes;

    /// Records a single `vkCmdPipelineBarrier2` with the given barriers.
    fn cmd_pipeline_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        buffer_barriers: &[vk::BufferMemoryBarrier2],
        image_barriers: &[vk::ImageMemoryBarrier2],
    );

    fn create_descriptor_pool(
        &self,
        flags: vk::DescriptorPoolCreateFlags,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<vk::DescriptorPool, DeviceError>;
    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> Result<(), DeviceError>;
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);

    /// Allocates one set per layout from `pool`.
    ///
    /// `variable_descriptor_counts`, if present, has one entry per layout. The raw Vulkan result
    /// is returned so that callers can tell pool exhaustion from other failures.
    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
        variable_descriptor_counts: Option<&[u32]>,
    ) -> Result<Vec<vk::DescriptorSet>, vk::Result>;
}
