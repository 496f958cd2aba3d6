use crate::{
    barrier::buffer_transition_barrier,
    collection::TransientResource,
    device::Device,
    error::DeviceError,
    resource::{Buffer, BufferDescription, TexelBuffer, TexelBufferDescription},
    state::BufferState,
    vk,
};

impl TransientResource for Buffer {
    type Description = BufferDescription;
    type State = BufferState;
    type Barrier = vk::BufferMemoryBarrier2<'static>;
    type Native = vk::Buffer;

    const KIND: &'static str = "buffer";

    fn create(
        device: &dyn Device,
        description: &BufferDescription,
        debug_name: &str,
    ) -> Result<Buffer, DeviceError> {
        device.create_buffer(description, debug_name)
    }

    fn destroy(self, device: &dyn Device) {
        device.destroy_buffer(self)
    }

    fn native(&self) -> vk::Buffer {
        self.handle
    }

    fn transition_barrier(
        &mut self,
        state: BufferState,
        force: bool,
    ) -> Option<vk::BufferMemoryBarrier2<'static>> {
        buffer_transition_barrier(self.handle, self.byte_size, &mut self.state, state, force)
    }

    fn record_barrier(
        device: &dyn Device,
        command_buffer: vk::CommandBuffer,
        barrier: vk::BufferMemoryBarrier2<'static>,
    ) {
        device.cmd_pipeline_barrier(command_buffer, &[barrier], &[]);
    }
}

impl TransientResource for TexelBuffer {
    type Description = TexelBufferDescription;
    type State = BufferState;
    type Barrier = vk::BufferMemoryBarrier2<'static>;
    type Native = vk::Buffer;

    const KIND: &'static str = "texel buffer";

    fn create(
        device: &dyn Device,
        description: &TexelBufferDescription,
        debug_name: &str,
    ) -> Result<TexelBuffer, DeviceError> {
        device.create_texel_buffer(description, debug_name)
    }

    fn destroy(self, device: &dyn Device) {
        device.destroy_texel_buffer(self)
    }

    fn native(&self) -> vk::Buffer {
        self.handle
    }

    fn transition_barrier(
        &mut self,
        state: BufferState,
        force: bool,
    ) -> Option<vk::BufferMemoryBarrier2<'static>> {
        buffer_transition_barrier(self.handle, self.byte_size, &mut self.state, state, force)
    }

    fn record_barrier(
        device: &dyn Device,
        command_buffer: vk::CommandBuffer,
        barrier: vk::BufferMemoryBarrier2<'static>,
    ) {
        device.cmd_pipeline_barrier(command_buffer, &[barrier], &[]);
    }
}
