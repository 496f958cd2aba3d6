//! Resource states.
//!
//! A state is a bitmask combining the pipeline stages that touch a resource with the kind of memory
//! accesses they perform. Image states additionally determine the image layout, which is derived
//! from the mask (see [`ImageState::layout`]) instead of being stored separately.
//!
//! The empty mask is the "unknown" state of a freshly created resource. Transitioning out of it
//! discards the previous contents.
use crate::vk;
use bitflags::bitflags;

bitflags! {
    /// Stage and access mask of a buffer or texel buffer.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct BufferState: u32 {
        const STAGE_FRAGMENT_SHADER = 0x1;
        const STAGE_COMPUTE_SHADER = 0x2;
        const STAGE_TRANSFER = 0x4;
        const ACCESS_SHADER_READ = 0x8;
        const ACCESS_SHADER_WRITE = 0x10;
        const ACCESS_TRANSFER_READ = 0x20;
        const ACCESS_TRANSFER_WRITE = 0x40;

        const FRAGMENT_SHADER_READ = Self::STAGE_FRAGMENT_SHADER.bits() | Self::ACCESS_SHADER_READ.bits();
        const COMPUTE_SHADER_READ = Self::STAGE_COMPUTE_SHADER.bits() | Self::ACCESS_SHADER_READ.bits();
        const COMPUTE_SHADER_WRITE = Self::STAGE_COMPUTE_SHADER.bits() | Self::ACCESS_SHADER_WRITE.bits();
        const COMPUTE_SHADER_READ_WRITE = Self::COMPUTE_SHADER_READ.bits() | Self::COMPUTE_SHADER_WRITE.bits();
        const TRANSFER_SRC = Self::STAGE_TRANSFER.bits() | Self::ACCESS_TRANSFER_READ.bits();
        const TRANSFER_DST = Self::STAGE_TRANSFER.bits() | Self::ACCESS_TRANSFER_WRITE.bits();
    }
}

bitflags! {
    /// Stage and access mask of an image. The layout follows from the accesses.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct ImageState: u32 {
        const STAGE_FRAGMENT_SHADER = 0x1;
        const STAGE_EARLY_FRAGMENT_TESTS = 0x2;
        const STAGE_LATE_FRAGMENT_TESTS = 0x4;
        const STAGE_COLOR_ATTACHMENT_OUTPUT = 0x8;
        const STAGE_COMPUTE_SHADER = 0x10;
        const STAGE_RAY_TRACING_SHADER = 0x20;
        const STAGE_TRANSFER = 0x40;
        const ACCESS_SHADER_READ = 0x80;
        const ACCESS_SHADER_WRITE = 0x100;
        const ACCESS_COLOR_ATTACHMENT_READ = 0x200;
        const ACCESS_COLOR_ATTACHMENT_WRITE = 0x400;
        const ACCESS_DEPTH_ATTACHMENT_READ = 0x800;
        const ACCESS_DEPTH_ATTACHMENT_WRITE = 0x1000;
        const ACCESS_TRANSFER_READ = 0x2000;
        const ACCESS_TRANSFER_WRITE = 0x4000;

        const COLOR_ATTACHMENT_WRITE = Self::STAGE_COLOR_ATTACHMENT_OUTPUT.bits() | Self::ACCESS_COLOR_ATTACHMENT_WRITE.bits();
        const COLOR_ATTACHMENT_READ_WRITE = Self::COLOR_ATTACHMENT_WRITE.bits() | Self::ACCESS_COLOR_ATTACHMENT_READ.bits();
        const DEPTH_ATTACHMENT_READ = Self::STAGE_EARLY_FRAGMENT_TESTS.bits() | Self::ACCESS_DEPTH_ATTACHMENT_READ.bits();
        const DEPTH_ATTACHMENT_WRITE = Self::STAGE_LATE_FRAGMENT_TESTS.bits() | Self::ACCESS_DEPTH_ATTACHMENT_WRITE.bits();
        const DEPTH_ATTACHMENT_READ_WRITE = Self::DEPTH_ATTACHMENT_READ.bits() | Self::DEPTH_ATTACHMENT_WRITE.bits();
        const FRAGMENT_SHADER_READ = Self::STAGE_FRAGMENT_SHADER.bits() | Self::ACCESS_SHADER_READ.bits();
        const COMPUTE_SHADER_READ = Self::STAGE_COMPUTE_SHADER.bits() | Self::ACCESS_SHADER_READ.bits();
        const COMPUTE_SHADER_WRITE = Self::STAGE_COMPUTE_SHADER.bits() | Self::ACCESS_SHADER_WRITE.bits();
        const COMPUTE_SHADER_READ_WRITE = Self::COMPUTE_SHADER_READ.bits() | Self::COMPUTE_SHADER_WRITE.bits();
        const RAY_TRACING_READ = Self::STAGE_RAY_TRACING_SHADER.bits() | Self::ACCESS_SHADER_READ.bits();
        const RAY_TRACING_WRITE = Self::STAGE_RAY_TRACING_SHADER.bits() | Self::ACCESS_SHADER_WRITE.bits();
        const RAY_TRACING_READ_WRITE = Self::RAY_TRACING_READ.bits() | Self::RAY_TRACING_WRITE.bits();
        const TRANSFER_SRC = Self::STAGE_TRANSFER.bits() | Self::ACCESS_TRANSFER_READ.bits();
        const TRANSFER_DST = Self::STAGE_TRANSFER.bits() | Self::ACCESS_TRANSFER_WRITE.bits();
    }
}

impl Default for BufferState {
    fn default() -> Self {
        BufferState::empty()
    }
}

impl Default for ImageState {
    fn default() -> Self {
        ImageState::empty()
    }
}

impl BufferState {
    /// Composite states by name, for diagnostics.
    pub const NAMED: &'static [(&'static str, BufferState)] = &[
        ("FragmentShaderRead", BufferState::FRAGMENT_SHADER_READ),
        ("ComputeShaderRead", BufferState::COMPUTE_SHADER_READ),
        ("ComputeShaderWrite", BufferState::COMPUTE_SHADER_WRITE),
        ("ComputeShaderReadWrite", BufferState::COMPUTE_SHADER_READ_WRITE),
        ("TransferSrc", BufferState::TRANSFER_SRC),
        ("TransferDst", BufferState::TRANSFER_DST),
    ];

    /// Name of the composite state equal to this mask, if any.
    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(_, state)| *state == self)
            .map(|(name, _)| *name)
    }

    pub fn stage_mask(self) -> vk::PipelineStageFlags2 {
        let mut flags = vk::PipelineStageFlags2::empty();
        if self.contains(BufferState::STAGE_FRAGMENT_SHADER) {
            flags |= vk::PipelineStageFlags2::FRAGMENT_SHADER;
        }
        if self.contains(BufferState::STAGE_COMPUTE_SHADER) {
            flags |= vk::PipelineStageFlags2::COMPUTE_SHADER;
        }
        if self.contains(BufferState::STAGE_TRANSFER) {
            flags |= vk::PipelineStageFlags2::TRANSFER;
        }
        flags
    }

    pub fn access_mask(self) -> vk::AccessFlags2 {
        let mut flags = vk::AccessFlags2::empty();
        if self.contains(BufferState::ACCESS_SHADER_READ) {
            flags |= vk::AccessFlags2::SHADER_READ;
        }
        if self.contains(BufferState::ACCESS_SHADER_WRITE) {
            flags |= vk::AccessFlags2::SHADER_WRITE;
        }
        if self.contains(BufferState::ACCESS_TRANSFER_READ) {
            flags |= vk::AccessFlags2::TRANSFER_READ;
        }
        if self.contains(BufferState::ACCESS_TRANSFER_WRITE) {
            flags |= vk::AccessFlags2::TRANSFER_WRITE;
        }
        flags
    }

    /// Whether the state writes to the buffer.
    pub fn has_write_accesses(self) -> bool {
        self.intersects(BufferState::ACCESS_SHADER_WRITE | BufferState::ACCESS_TRANSFER_WRITE)
    }
}

impl ImageState {
    /// Composite states by name, for diagnostics.
    pub const NAMED: &'static [(&'static str, ImageState)] = &[
        ("ColorAttachmentWrite", ImageState::COLOR_ATTACHMENT_WRITE),
        ("ColorAttachmentReadWrite", ImageState::COLOR_ATTACHMENT_READ_WRITE),
        ("DepthAttachmentRead", ImageState::DEPTH_ATTACHMENT_READ),
        ("DepthAttachmentWrite", ImageState::DEPTH_ATTACHMENT_WRITE),
        ("DepthAttachmentReadWrite", ImageState::DEPTH_ATTACHMENT_READ_WRITE),
        ("FragmentShaderRead", ImageState::FRAGMENT_SHADER_READ),
        ("ComputeShaderRead", ImageState::COMPUTE_SHADER_READ),
        ("ComputeShaderWrite", ImageState::COMPUTE_SHADER_WRITE),
        ("ComputeShaderReadWrite", ImageState::COMPUTE_SHADER_READ_WRITE),
        ("RayTracingRead", ImageState::RAY_TRACING_READ),
        ("RayTracingWrite", ImageState::RAY_TRACING_WRITE),
        ("RayTracingReadWrite", ImageState::RAY_TRACING_READ_WRITE),
        ("TransferSrc", ImageState::TRANSFER_SRC),
        ("TransferDst", ImageState::TRANSFER_DST),
    ];

    /// Name of the composite state equal to this mask, if any.
    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(_, state)| *state == self)
            .map(|(name, _)| *name)
    }

    pub fn stage_mask(self) -> vk::PipelineStageFlags2 {
        const STAGES: &[(ImageState, vk::PipelineStageFlags2)] = &[
            (ImageState::STAGE_FRAGMENT_SHADER, vk::PipelineStageFlags2::FRAGMENT_SHADER),
            (ImageState::STAGE_EARLY_FRAGMENT_TESTS, vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS),
            (ImageState::STAGE_LATE_FRAGMENT_TESTS, vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS),
            (
                ImageState::STAGE_COLOR_ATTACHMENT_OUTPUT,
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            ),
            (ImageState::STAGE_COMPUTE_SHADER, vk::PipelineStageFlags2::COMPUTE_SHADER),
            (
                ImageState::STAGE_RAY_TRACING_SHADER,
                vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR,
            ),
            (ImageState::STAGE_TRANSFER, vk::PipelineStageFlags2::TRANSFER),
        ];

        STAGES
            .iter()
            .filter(|(state, _)| self.contains(*state))
            .fold(vk::PipelineStageFlags2::empty(), |acc, (_, flags)| acc | *flags)
    }

    pub fn access_mask(self) -> vk::AccessFlags2 {
        const ACCESSES: &[(ImageState, vk::AccessFlags2)] = &[
            (ImageState::ACCESS_SHADER_READ, vk::AccessFlags2::SHADER_READ),
            (ImageState::ACCESS_SHADER_WRITE, vk::AccessFlags2::SHADER_WRITE),
            (ImageState::ACCESS_TRANSFER_READ, vk::AccessFlags2::TRANSFER_READ),
            (ImageState::ACCESS_TRANSFER_WRITE, vk::AccessFlags2::TRANSFER_WRITE),
            (
                ImageState::ACCESS_COLOR_ATTACHMENT_READ,
                vk::AccessFlags2::COLOR_ATTACHMENT_READ,
            ),
            (
                ImageState::ACCESS_COLOR_ATTACHMENT_WRITE,
                vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            ),
            (
                ImageState::ACCESS_DEPTH_ATTACHMENT_READ,
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
            ),
            (
                ImageState::ACCESS_DEPTH_ATTACHMENT_WRITE,
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ),
        ];

        ACCESSES
            .iter()
            .filter(|(state, _)| self.contains(*state))
            .fold(vk::AccessFlags2::empty(), |acc, (_, flags)| acc | *flags)
    }

    /// Whether the state writes to the image.
    pub fn has_write_accesses(self) -> bool {
        self.intersects(
            ImageState::ACCESS_SHADER_WRITE
                | ImageState::ACCESS_TRANSFER_WRITE
                | ImageState::ACCESS_COLOR_ATTACHMENT_WRITE
                | ImageState::ACCESS_DEPTH_ATTACHMENT_WRITE,
        )
    }

    /// Returns the image layout implied by this state.
    ///
    /// Shader accesses win over everything else since storage images must be in `GENERAL`.
    ///
    /// # Panics
    ///
    /// Panics if the mask is non-empty but carries no access that determines a layout
    /// (e.g. a bare stage bit).
    pub fn layout(self) -> vk::ImageLayout {
        if self.intersects(ImageState::ACCESS_SHADER_READ | ImageState::ACCESS_SHADER_WRITE) {
            return vk::ImageLayout::GENERAL;
        }
        if self.contains(ImageState::STAGE_COLOR_ATTACHMENT_OUTPUT) {
            return vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL;
        }
        if self.contains(ImageState::ACCESS_DEPTH_ATTACHMENT_WRITE) {
            return vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL;
        }
        if self.contains(ImageState::ACCESS_DEPTH_ATTACHMENT_READ) {
            return vk::ImageLayout::DEPTH_READ_ONLY_OPTIMAL;
        }
        if self.contains(ImageState::ACCESS_TRANSFER_READ) {
            return vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
        }
        if self.contains(ImageState::ACCESS_TRANSFER_WRITE) {
            return vk::ImageLayout::TRANSFER_DST_OPTIMAL;
        }

        assert!(
            self.is_empty(),
            "image state {:?} does not determine a layout",
            self
        );
        vk::ImageLayout::UNDEFINED
    }
}
