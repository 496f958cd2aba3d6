use crate::{
    device::{AllocationKind, Device, MemoryAllocationBytes},
    error::DeviceError,
    resource::{
        Buffer, BufferDescription, Image, ImageDescription, ResourceMemoryInfo, TexelBuffer,
        TexelBufferDescription,
    },
    vk,
};
use ash::vk::Handle;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use std::{ffi::CString, sync::Mutex};
use tracing::{trace, warn};

/// Options of a [`VulkanDevice`].
#[derive(Copy, Clone, Debug)]
pub struct DeviceSettings {
    /// Name objects through `VK_EXT_debug_utils`. The extension must be enabled on the instance.
    pub debug_names: bool,
    /// Whether the device was created with the `bufferDeviceAddress` feature.
    pub buffer_device_address: bool,
    /// Lower bound for the alignment of buffer allocations.
    pub min_buffer_alignment: vk::DeviceSize,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            debug_names: cfg!(debug_assertions),
            buffer_device_address: false,
            min_buffer_alignment: 256,
        }
    }
}

/// [`Device`] implementation over an existing `ash` device.
///
/// Memory comes from a `gpu-allocator` allocator behind a mutex, which is the only lock taken on
/// the creation and destruction paths.
///
/// The logical device is not destroyed when this object is dropped. Every resource created through
/// it must be destroyed before the allocator goes away.
pub struct VulkanDevice {
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    debug_utils: Option<ash::ext::debug_utils::Device>,
    allocator: Mutex<Allocator>,
    memory_allocations: MemoryAllocationBytes,
    settings: DeviceSettings,
}

impl VulkanDevice {
    pub fn new(
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        settings: DeviceSettings,
    ) -> Result<VulkanDevice, DeviceError> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: settings.buffer_device_address,
            allocation_sizes: Default::default(),
        })?;

        let debug_utils = if settings.debug_names {
            Some(ash::ext::debug_utils::Device::new(&instance, &device))
        } else {
            None
        };

        Ok(VulkanDevice {
            instance,
            physical_device,
            device,
            debug_utils,
            allocator: Mutex::new(allocator),
            memory_allocations: MemoryAllocationBytes::default(),
            settings,
        })
    }

    /// Returns the underlying `ash::Device`.
    pub fn vulkan_device(&self) -> &ash::Device {
        &self.device
    }

    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        memory: &ResourceMemoryInfo,
        linear: bool,
    ) -> Result<Allocation, DeviceError> {
        let allocation = self
            .allocator
            .lock()
            .unwrap()
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: memory.location(),
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?;
        Ok(allocation)
    }

    fn free(&self, kind: AllocationKind, allocation: Option<Allocation>) {
        let Some(allocation) = allocation else {
            return;
        };
        let size = allocation.size();
        if let Err(err) = self.allocator.lock().unwrap().free(allocation) {
            warn!(?err, ?kind, "failed to free allocation");
            return;
        }
        self.memory_allocations.sub(kind, size);
    }

    /// Creates a buffer and binds fresh memory to it.
    fn create_raw_buffer(
        &self,
        byte_size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        memory: &ResourceMemoryInfo,
        kind: AllocationKind,
        debug_name: &str,
    ) -> Result<(vk::Buffer, Allocation), DeviceError> {
        let create_info = vk::BufferCreateInfo::default()
            .size(byte_size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        unsafe {
            let buffer = self.device.create_buffer(&create_info, None)?;
            let mut requirements = self.device.get_buffer_memory_requirements(buffer);
            requirements.alignment = requirements
                .alignment
                .max(self.settings.min_buffer_alignment);

            let allocation = match self.allocate(debug_name, requirements, memory, true) {
                Ok(allocation) => allocation,
                Err(err) => {
                    self.device.destroy_buffer(buffer, None);
                    return Err(err);
                }
            };
            if let Err(err) =
                self.device
                    .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
            {
                self.device.destroy_buffer(buffer, None);
                let _ = self.allocator.lock().unwrap().free(allocation);
                return Err(err.into());
            }

            self.memory_allocations.add(kind, allocation.size());
            Ok((buffer, allocation))
        }
    }

    fn create_image_view(
        &self,
        image: vk::Image,
        view_type: vk::ImageViewType,
        format: vk::Format,
        subresource_range: vk::ImageSubresourceRange,
    ) -> Result<vk::ImageView, DeviceError> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .subresource_range(subresource_range);
        let view = unsafe { self.device.create_image_view(&create_info, None)? };
        Ok(view)
    }
}

impl Device for VulkanDevice {
    fn create_buffer(
        &self,
        description: &BufferDescription,
        debug_name: &str,
    ) -> Result<Buffer, DeviceError> {
        assert!(description.byte_size > 0, "zero-sized buffer `{}`", debug_name);

        let (buffer, allocation) = self.create_raw_buffer(
            description.byte_size,
            description.usage,
            &description.memory,
            AllocationKind::Buffer,
            debug_name,
        )?;

        let device_address = if description
            .usage
            .contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS)
        {
            let info = vk::BufferDeviceAddressInfo::default().buffer(buffer);
            unsafe { self.device.get_buffer_device_address(&info) }
        } else {
            0
        };

        self.set_debug_name(vk::ObjectType::BUFFER, buffer.as_raw(), debug_name);
        trace!(
            name = debug_name,
            byte_size = description.byte_size,
            "create_buffer"
        );
        Ok(Buffer::new(
            buffer,
            description.byte_size,
            device_address,
            Some(allocation),
        ))
    }

    fn destroy_buffer(&self, buffer: Buffer) {
        unsafe {
            self.device.destroy_buffer(buffer.handle, None);
        }
        self.free(AllocationKind::Buffer, buffer.allocation);
    }

    fn create_texel_buffer(
        &self,
        description: &TexelBufferDescription,
        debug_name: &str,
    ) -> Result<TexelBuffer, DeviceError> {
        let required_features = description.required_format_features();
        assert!(
            !required_features.is_empty(),
            "texel buffer `{}` has no texel buffer usage",
            debug_name
        );

        let properties = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, description.format)
        };
        if !properties.buffer_features.contains(required_features) {
            return Err(DeviceError::UnsupportedTexelFormat {
                format: description.format,
                usage: description.usage,
            });
        }

        let (buffer, allocation) = self.create_raw_buffer(
            description.byte_size,
            description.usage,
            &description.memory,
            AllocationKind::TexelBuffer,
            debug_name,
        )?;

        let view_info = vk::BufferViewCreateInfo::default()
            .buffer(buffer)
            .format(description.format)
            .offset(0)
            .range(vk::WHOLE_SIZE);
        let view = match unsafe { self.device.create_buffer_view(&view_info, None) } {
            Ok(view) => view,
            Err(err) => {
                unsafe {
                    self.device.destroy_buffer(buffer, None);
                }
                self.free(AllocationKind::TexelBuffer, Some(allocation));
                return Err(err.into());
            }
        };

        self.set_debug_name(vk::ObjectType::BUFFER, buffer.as_raw(), debug_name);
        self.set_debug_name(vk::ObjectType::BUFFER_VIEW, view.as_raw(), debug_name);
        trace!(
            name = debug_name,
            format = ?description.format,
            byte_size = description.byte_size,
            "create_texel_buffer"
        );
        Ok(TexelBuffer::new(
            buffer,
            view,
            description.format,
            description.byte_size,
            Some(allocation),
        ))
    }

    fn destroy_texel_buffer(&self, buffer: TexelBuffer) {
        unsafe {
            self.device.destroy_buffer_view(buffer.view, None);
            self.device.destroy_buffer(buffer.handle, None);
        }
        self.free(AllocationKind::TexelBuffer, buffer.allocation);
    }

    fn create_image(
        &self,
        description: &ImageDescription,
        debug_name: &str,
    ) -> Result<Image, DeviceError> {
        assert!(description.mip_count > 0 && description.layer_count > 0);

        let create_info = vk::ImageCreateInfo::default()
            .flags(description.create_flags)
            .image_type(description.image_type())
            .format(description.format)
            .extent(description.extent())
            .mip_levels(description.mip_count)
            .array_layers(description.layer_count)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(description.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let (image, allocation) = unsafe {
            let image = self.device.create_image(&create_info, None)?;
            let requirements = self.device.get_image_memory_requirements(image);
            let allocation =
                match self.allocate(debug_name, requirements, &description.memory, false) {
                    Ok(allocation) => allocation,
                    Err(err) => {
                        self.device.destroy_image(image, None);
                        return Err(err);
                    }
                };
            if let Err(err) =
                self.device
                    .bind_image_memory(image, allocation.memory(), allocation.offset())
            {
                self.device.destroy_image(image, None);
                let _ = self.allocator.lock().unwrap().free(allocation);
                return Err(err.into());
            }
            (image, allocation)
        };
        let raw_byte_size = allocation.size();
        self.memory_allocations
            .add(AllocationKind::Image, raw_byte_size);

        let view = match self.create_image_view(
            image,
            description.view_type(),
            description.format,
            description.subresource_range(),
        ) {
            Ok(view) => view,
            Err(err) => {
                unsafe {
                    self.device.destroy_image(image, None);
                }
                self.free(AllocationKind::Image, Some(allocation));
                return Err(err);
            }
        };

        self.set_debug_name(vk::ObjectType::IMAGE, image.as_raw(), debug_name);
        self.set_debug_name(vk::ObjectType::IMAGE_VIEW, view.as_raw(), debug_name);
        trace!(
            name = debug_name,
            width = description.width,
            height = description.height,
            format = ?description.format,
            "create_image"
        );
        Ok(Image::new(
            image,
            view,
            description,
            raw_byte_size,
            Some(allocation),
        ))
    }

    fn destroy_image(&self, image: Image) {
        unsafe {
            for &view in image.subresource_views() {
                self.device.destroy_image_view(view, None);
            }
            self.device.destroy_image_view(image.view, None);
            self.device.destroy_image(image.handle, None);
        }
        self.free(AllocationKind::Image, image.allocation);
    }

    fn create_subresource_views(&self, image: &Image) -> Result<Vec<vk::ImageView>, DeviceError> {
        assert_eq!(image.layer_count, 1, "layered subresource views are not supported");
        assert!(image.mip_count > 1);

        let view_type = if image.image_type == vk::ImageType::TYPE_3D {
            vk::ImageViewType::TYPE_3D
        } else {
            vk::ImageViewType::TYPE_2D
        };

        let mut views = Vec::with_capacity(image.mip_count as usize);
        for mip in 0..image.mip_count {
            let range = vk::ImageSubresourceRange {
                base_mip_level: mip,
                level_count: 1,
                ..image.subresource_range()
            };
            match self.create_image_view(image.handle, view_type, image.format, range) {
                Ok(view) => views.push(view),
                Err(err) => {
                    unsafe {
                        for view in views {
                            self.device.destroy_image_view(view, None);
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok(views)
    }

    fn set_debug_name(&self, object_type: vk::ObjectType, raw_handle: u64, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };
        let mut info = vk::DebugUtilsObjectNameInfoEXT::default().object_name(&name);
        info.object_type = object_type;
        info.object_handle = raw_handle;
        unsafe {
            if let Err(err) = debug_utils.set_debug_utils_object_name(&info) {
                warn!(?err, ?object_type, "failed to set debug name");
            }
        }
    }

    fn memory_allocations(&self) -> &MemoryAllocationBytes {
        &self.memory_allocations
    }

    fn cmd_pipeline_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        buffer_barriers: &[vk::BufferMemoryBarrier2],
        image_barriers: &[vk::ImageMemoryBarrier2],
    ) {
        let dependency_info = vk::DependencyInfo::default()
            .buffer_memory_barriers(buffer_barriers)
            .image_memory_barriers(image_barriers);
        unsafe {
            self.device
                .cmd_pipeline_barrier2(command_buffer, &dependency_info);
        }
    }

    fn create_descriptor_pool(
        &self,
        flags: vk::DescriptorPoolCreateFlags,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<vk::DescriptorPool, DeviceError> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .flags(flags)
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);
        let pool = unsafe { self.device.create_descriptor_pool(&create_info, None)? };
        Ok(pool)
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> Result<(), DeviceError> {
        unsafe {
            self.device
                .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())?;
        }
        Ok(())
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe {
            self.device.destroy_descriptor_pool(pool, None);
        }
    }

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
        variable_descriptor_counts: Option<&[u32]>,
    ) -> Result<Vec<vk::DescriptorSet>, vk::Result> {
        let mut variable_counts_info =
            vk::DescriptorSetVariableDescriptorCountAllocateInfo::default();
        let mut allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(layouts);
        if let Some(counts) = variable_descriptor_counts {
            assert_eq!(counts.len(), layouts.len());
            variable_counts_info = variable_counts_info.descriptor_counts(counts);
            allocate_info = allocate_info.push_next(&mut variable_counts_info);
        }
        unsafe { self.device.allocate_descriptor_sets(&allocate_info) }
    }
}
