//! Transient GPU resources for a frame-based Vulkan renderer.
//!
//! Render passes create images and buffers by description through a [`ResourceCollection`], get
//! generational [`Handle`]s back, declare the state they need each resource in and record the
//! barriers computed from the last recorded state. Released resources are aliased by later
//! requests with the same description.
//!
//! Native objects are created through the [`Device`] trait. [`VulkanDevice`] implements it with
//! `ash` and `gpu-allocator`.
mod barrier;
mod collection;
mod descriptor;
mod device;
mod error;
mod frame;
mod handle;
mod resource;
mod resources;
mod state;

pub use crate::barrier::{buffer_transition_barrier, image_transition_barrier};
pub use crate::collection::{
    BufferCollection, BufferHandle, CollectionConfig, ImageCollection, ImageHandle,
    ResourceCollection, TexelBufferCollection, TexelBufferHandle, TransientResource,
};
pub use crate::descriptor::{DescriptorAllocator, DescriptorPoolConfig};
pub use crate::device::{
    AllocationKind, Device, DeviceSettings, MemoryAllocationBytes, VulkanDevice,
};
pub use crate::error::{DescriptorError, DeviceError};
pub use crate::frame::{FrameIndex, PerFrame, MAX_FRAMES_IN_FLIGHT};
pub use crate::handle::{Handle, NULL_INDEX};
pub use crate::resource::{
    format_aspect_mask, mip_level_count, Buffer, BufferDescription, Image, ImageDescription,
    ResourceMemoryInfo, TexelBuffer, TexelBufferDescription,
};
pub use crate::resources::{RenderResources, Transitions};
pub use crate::state::{BufferState, ImageState};

pub use ash;
pub use ash::vk;
pub use gpu_allocator;
pub use gpu_allocator::MemoryLocation;
