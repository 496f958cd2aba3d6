use crate::vk;

/// Errors emitted by device operations.
#[derive(thiserror::Error, Debug)]
pub enum DeviceError {
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
    #[error("memory allocation failed")]
    Allocation(#[from] gpu_allocator::AllocationError),
    #[error("format {format:?} does not support texel buffer usage {usage:?}")]
    UnsupportedTexelFormat {
        format: vk::Format,
        usage: vk::BufferUsageFlags,
    },
}

/// Errors emitted by the descriptor set allocator.
#[derive(thiserror::Error, Debug)]
pub enum DescriptorError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// Allocation failed again after switching to a fresh pool.
    #[error("descriptor set allocation failed after pool rollover ({pool_count} pools): {result}")]
    Exhausted { pool_count: usize, result: vk::Result },
}
