use crate::{
    barrier::image_transition_barrier,
    collection::{ImageHandle, ResourceCollection, TransientResource},
    device::Device,
    error::DeviceError,
    resource::{Image, ImageDescription},
    state::ImageState,
    vk,
};
use tracing::trace;

impl TransientResource for Image {
    type Description = ImageDescription;
    type State = ImageState;
    type Barrier = vk::ImageMemoryBarrier2<'static>;
    type Native = vk::Image;

    const KIND: &'static str = "image";

    fn create(
        device: &dyn Device,
        description: &ImageDescription,
        debug_name: &str,
    ) -> Result<Image, DeviceError> {
        device.create_image(description, debug_name)
    }

    fn destroy(self, device: &dyn Device) {
        device.destroy_image(self)
    }

    fn native(&self) -> vk::Image {
        self.handle
    }

    fn transition_barrier(
        &mut self,
        state: ImageState,
        force: bool,
    ) -> Option<vk::ImageMemoryBarrier2<'static>> {
        image_transition_barrier(
            self.handle,
            self.subresource_range,
            &mut self.state,
            state,
            force,
        )
    }

    fn record_barrier(
        device: &dyn Device,
        command_buffer: vk::CommandBuffer,
        barrier: vk::ImageMemoryBarrier2<'static>,
    ) {
        device.cmd_pipeline_barrier(command_buffer, &[], &[barrier]);
    }
}

impl ResourceCollection<Image> {
    /// Returns one view per mip of the image.
    ///
    /// Views are created on first request and live as long as the image. For a single-mip image
    /// this is just the main view.
    pub fn subresource_views(
        &mut self,
        handle: ImageHandle,
    ) -> Result<&[vk::ImageView], DeviceError> {
        let device = self.device().clone();
        let image = self.resource_mut(handle);
        if image.mip_count == 1 {
            return Ok(std::slice::from_ref(&image.view));
        }
        if image.subresource_views.is_empty() {
            trace!(?handle, mip_count = image.mip_count, "create_subresource_views");
            image.subresource_views = device.create_subresource_views(image)?;
        }
        Ok(&image.subresource_views)
    }
}
