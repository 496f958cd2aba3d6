//! Resource descriptions and native resources.
use crate::{
    state::{BufferState, ImageState},
    vk,
};
use gpu_allocator::{vulkan::Allocation, MemoryLocation};

/// Information about the memory to be allocated for a resource.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResourceMemoryInfo {
    /// Required memory property flags.
    pub required_flags: vk::MemoryPropertyFlags,
    /// Preferred memory property flags. Only `HOST_CACHED` is taken into account, to select
    /// readback memory.
    pub preferred_flags: vk::MemoryPropertyFlags,
}

impl ResourceMemoryInfo {
    pub const fn new() -> ResourceMemoryInfo {
        ResourceMemoryInfo {
            required_flags: vk::MemoryPropertyFlags::empty(),
            preferred_flags: vk::MemoryPropertyFlags::empty(),
        }
    }

    /// Requires that the resource be allocated in DEVICE_LOCAL memory.
    pub const fn device_local(self) -> Self {
        ResourceMemoryInfo {
            required_flags: vk::MemoryPropertyFlags::from_raw(
                self.required_flags.as_raw() | vk::MemoryPropertyFlags::DEVICE_LOCAL.as_raw(),
            ),
            ..self
        }
    }

    /// Requires that the resource be allocated in HOST_VISIBLE memory.
    pub const fn host_visible(self) -> Self {
        ResourceMemoryInfo {
            required_flags: vk::MemoryPropertyFlags::from_raw(
                self.required_flags.as_raw() | vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw(),
            ),
            ..self
        }
    }

    /// Requires that the resource be allocated in HOST_COHERENT memory.
    pub const fn host_coherent(self) -> Self {
        ResourceMemoryInfo {
            required_flags: vk::MemoryPropertyFlags::from_raw(
                self.required_flags.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
            ),
            ..self
        }
    }

    /// Prefers HOST_CACHED memory, for buffers read back on the CPU.
    pub const fn host_cached(self) -> Self {
        ResourceMemoryInfo {
            preferred_flags: vk::MemoryPropertyFlags::from_raw(
                self.preferred_flags.as_raw() | vk::MemoryPropertyFlags::HOST_CACHED.as_raw(),
            ),
            ..self
        }
    }

    /// Device-local resource memory.
    pub const DEVICE_LOCAL: ResourceMemoryInfo = ResourceMemoryInfo::new().device_local();

    /// Host-visible and coherent resource memory (upload buffers without need for flushes).
    pub const HOST_VISIBLE_COHERENT: ResourceMemoryInfo =
        ResourceMemoryInfo::new().host_visible().host_coherent();

    /// Readback memory.
    pub const READBACK: ResourceMemoryInfo = ResourceMemoryInfo::new()
        .host_visible()
        .host_coherent()
        .host_cached();

    /// The allocator location matching these flags.
    pub fn location(&self) -> MemoryLocation {
        if self
            .required_flags
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
        {
            if self
                .preferred_flags
                .contains(vk::MemoryPropertyFlags::HOST_CACHED)
            {
                MemoryLocation::GpuToCpu
            } else {
                MemoryLocation::CpuToGpu
            }
        } else {
            MemoryLocation::GpuOnly
        }
    }
}

/// Shape of a buffer. Buffers with equal descriptions are interchangeable.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BufferDescription {
    pub byte_size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub memory: ResourceMemoryInfo,
}

/// Shape of a texel buffer.
///
/// `usage` must contain `UNIFORM_TEXEL_BUFFER` or `STORAGE_TEXEL_BUFFER`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TexelBufferDescription {
    pub format: vk::Format,
    pub byte_size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub memory: ResourceMemoryInfo,
}

impl TexelBufferDescription {
    /// Format features the device must support for `format` given `usage`.
    pub fn required_format_features(&self) -> vk::FormatFeatureFlags {
        let mut features = vk::FormatFeatureFlags::empty();
        if self
            .usage
            .contains(vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER)
        {
            features |= vk::FormatFeatureFlags::UNIFORM_TEXEL_BUFFER;
        }
        if self
            .usage
            .contains(vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER)
        {
            features |= vk::FormatFeatureFlags::STORAGE_TEXEL_BUFFER;
        }
        features
    }
}

/// Shape of an image.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageDescription {
    pub format: vk::Format,
    pub width: u32,
    pub height: u32,
    /// Depth of a 3D image, 1 otherwise.
    pub depth: u32,
    pub layer_count: u32,
    pub mip_count: u32,
    pub create_flags: vk::ImageCreateFlags,
    pub usage: vk::ImageUsageFlags,
    pub memory: ResourceMemoryInfo,
}

impl Default for ImageDescription {
    fn default() -> Self {
        ImageDescription {
            format: vk::Format::UNDEFINED,
            width: 1,
            height: 1,
            depth: 1,
            layer_count: 1,
            mip_count: 1,
            create_flags: vk::ImageCreateFlags::empty(),
            usage: vk::ImageUsageFlags::empty(),
            memory: ResourceMemoryInfo::DEVICE_LOCAL,
        }
    }
}

impl ImageDescription {
    /// Single-layer, single-mip 2D image in device-local memory.
    pub fn new_2d(
        format: vk::Format,
        width: u32,
        height: u32,
        usage: vk::ImageUsageFlags,
    ) -> ImageDescription {
        ImageDescription {
            format,
            width,
            height,
            usage,
            ..Default::default()
        }
    }

    pub fn with_mip_count(self, mip_count: u32) -> ImageDescription {
        ImageDescription { mip_count, ..self }
    }

    pub fn with_layer_count(self, layer_count: u32) -> ImageDescription {
        ImageDescription {
            layer_count,
            ..self
        }
    }

    pub fn extent(&self) -> vk::Extent3D {
        vk::Extent3D {
            width: self.width,
            height: self.height,
            depth: self.depth,
        }
    }

    pub fn image_type(&self) -> vk::ImageType {
        if self.depth > 1 {
            vk::ImageType::TYPE_3D
        } else {
            vk::ImageType::TYPE_2D
        }
    }

    /// View type of the main view.
    ///
    /// Six layers are viewed as a cube.
    pub fn view_type(&self) -> vk::ImageViewType {
        if self.depth > 1 {
            assert_eq!(self.layer_count, 1, "3D images can't have layers");
            vk::ImageViewType::TYPE_3D
        } else if self.layer_count == 6 {
            vk::ImageViewType::CUBE
        } else if self.layer_count > 1 {
            vk::ImageViewType::TYPE_2D_ARRAY
        } else {
            vk::ImageViewType::TYPE_2D
        }
    }

    /// Range covering every mip and layer of the image.
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: format_aspect_mask(self.format),
            base_mip_level: 0,
            level_count: self.mip_count,
            base_array_layer: 0,
            layer_count: self.layer_count,
        }
    }
}

/// Number of mips in a full chain for the given size.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

fn has_depth(fmt: vk::Format) -> bool {
    matches!(
        fmt,
        vk::Format::D16_UNORM
            | vk::Format::X8_D24_UNORM_PACK32
            | vk::Format::D32_SFLOAT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    )
}

fn has_stencil(fmt: vk::Format) -> bool {
    matches!(
        fmt,
        vk::Format::S8_UINT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    )
}

/// Aspects covered by views and barriers of an image with the given format.
pub fn format_aspect_mask(fmt: vk::Format) -> vk::ImageAspectFlags {
    match (has_depth(fmt), has_stencil(fmt)) {
        (false, false) => vk::ImageAspectFlags::COLOR,
        (true, false) => vk::ImageAspectFlags::DEPTH,
        (false, true) => vk::ImageAspectFlags::STENCIL,
        (true, true) => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
    }
}

/// A buffer and its backing memory.
#[derive(Debug)]
pub struct Buffer {
    pub handle: vk::Buffer,
    pub byte_size: vk::DeviceSize,
    /// Zero unless the buffer was created with `SHADER_DEVICE_ADDRESS` usage.
    pub device_address: vk::DeviceAddress,
    pub allocation: Option<Allocation>,
    pub(crate) state: BufferState,
}

impl Buffer {
    /// Wraps a freshly created buffer. The recorded state starts out unknown.
    pub fn new(
        handle: vk::Buffer,
        byte_size: vk::DeviceSize,
        device_address: vk::DeviceAddress,
        allocation: Option<Allocation>,
    ) -> Buffer {
        Buffer {
            handle,
            byte_size,
            device_address,
            allocation,
            state: BufferState::empty(),
        }
    }

    /// The last state this buffer was transitioned to.
    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Host pointer to the contents, if the memory is host-visible.
    pub fn mapped_slice_mut(&mut self) -> Option<&mut [u8]> {
        self.allocation.as_mut().and_then(|a| a.mapped_slice_mut())
    }
}

/// A buffer with a typed view, used as a uniform or storage texel buffer.
#[derive(Debug)]
pub struct TexelBuffer {
    pub handle: vk::Buffer,
    pub view: vk::BufferView,
    pub format: vk::Format,
    pub byte_size: vk::DeviceSize,
    pub allocation: Option<Allocation>,
    pub(crate) state: BufferState,
}

impl TexelBuffer {
    pub fn new(
        handle: vk::Buffer,
        view: vk::BufferView,
        format: vk::Format,
        byte_size: vk::DeviceSize,
        allocation: Option<Allocation>,
    ) -> TexelBuffer {
        TexelBuffer {
            handle,
            view,
            format,
            byte_size,
            allocation,
            state: BufferState::empty(),
        }
    }

    pub fn state(&self) -> BufferState {
        self.state
    }
}

/// An image, its main view and its backing memory.
#[derive(Debug)]
pub struct Image {
    pub handle: vk::Image,
    /// View over every mip and layer.
    pub view: vk::ImageView,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub image_type: vk::ImageType,
    pub mip_count: u32,
    pub layer_count: u32,
    /// Size of the backing allocation.
    pub raw_byte_size: vk::DeviceSize,
    pub allocation: Option<Allocation>,
    pub(crate) state: ImageState,
    pub(crate) subresource_range: vk::ImageSubresourceRange,
    pub(crate) subresource_views: Vec<vk::ImageView>,
}

impl Image {
    /// Wraps a freshly created image. Shape information is taken from `description`.
    pub fn new(
        handle: vk::Image,
        view: vk::ImageView,
        description: &ImageDescription,
        raw_byte_size: vk::DeviceSize,
        allocation: Option<Allocation>,
    ) -> Image {
        Image {
            handle,
            view,
            format: description.format,
            extent: description.extent(),
            image_type: description.image_type(),
            mip_count: description.mip_count,
            layer_count: description.layer_count,
            raw_byte_size,
            allocation,
            state: ImageState::empty(),
            subresource_range: description.subresource_range(),
            subresource_views: Vec::new(),
        }
    }

    pub fn state(&self) -> ImageState {
        self.state
    }

    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        self.subresource_range.aspect_mask
    }

    /// Range covering every mip and layer.
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        self.subresource_range
    }

    /// Per-mip views created so far. Empty until requested through the owning collection.
    pub fn subresource_views(&self) -> &[vk::ImageView] {
        &self.subresource_views
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_locations() {
        assert_eq!(ResourceMemoryInfo::DEVICE_LOCAL.location(), MemoryLocation::GpuOnly);
        assert_eq!(
            ResourceMemoryInfo::HOST_VISIBLE_COHERENT.location(),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(ResourceMemoryInfo::READBACK.location(), MemoryLocation::GpuToCpu);
    }

    #[test]
    fn mip_chain_length() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(1920, 1080), 11);
    }

    #[test]
    fn view_types() {
        let base = ImageDescription::new_2d(
            vk::Format::R16G16B16A16_SFLOAT,
            64,
            64,
            vk::ImageUsageFlags::SAMPLED,
        );
        assert_eq!(base.view_type(), vk::ImageViewType::TYPE_2D);
        assert_eq!(base.with_layer_count(6).view_type(), vk::ImageViewType::CUBE);
        assert_eq!(base.with_layer_count(4).view_type(), vk::ImageViewType::TYPE_2D_ARRAY);
        let volume = ImageDescription { depth: 32, ..base };
        assert_eq!(volume.view_type(), vk::ImageViewType::TYPE_3D);
        assert_eq!(volume.image_type(), vk::ImageType::TYPE_3D);
    }

    #[test]
    fn depth_range() {
        let desc = ImageDescription::new_2d(
            vk::Format::D32_SFLOAT,
            128,
            128,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        )
        .with_mip_count(3);
        let range = desc.subresource_range();
        assert_eq!(range.aspect_mask, vk::ImageAspectFlags::DEPTH);
        assert_eq!(range.level_count, 3);
        assert_eq!(range.layer_count, 1);
    }

    #[test]
    fn aspect_masks() {
        assert_eq!(format_aspect_mask(vk::Format::R8G8B8A8_UNORM), vk::ImageAspectFlags::COLOR);
        assert_eq!(
            format_aspect_mask(vk::Format::X8_D24_UNORM_PACK32),
            vk::ImageAspectFlags::DEPTH
        );
        assert_eq!(format_aspect_mask(vk::Format::S8_UINT), vk::ImageAspectFlags::STENCIL);
        assert_eq!(
            format_aspect_mask(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
    }

    #[test]
    fn texel_format_features() {
        let desc = TexelBufferDescription {
            format: vk::Format::R32_UINT,
            byte_size: 1024,
            usage: vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            memory: ResourceMemoryInfo::DEVICE_LOCAL,
        };
        assert_eq!(
            desc.required_format_features(),
            vk::FormatFeatureFlags::STORAGE_TEXEL_BUFFER
        );
    }
}
