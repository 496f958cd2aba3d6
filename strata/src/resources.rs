use crate::{
    collection::{
        BufferCollection, BufferHandle, CollectionConfig, ImageCollection, ImageHandle,
        TexelBufferCollection, TexelBufferHandle,
    },
    device::Device,
    state::{BufferState, ImageState},
    vk,
};
use std::sync::Arc;
use tracing::trace_span;

/// A set of transitions to record with a single barrier command.
#[derive(Copy, Clone, Debug, Default)]
pub struct Transitions<'a> {
    pub images: &'a [(ImageHandle, ImageState)],
    pub buffers: &'a [(BufferHandle, BufferState)],
    pub texel_buffers: &'a [(TexelBufferHandle, BufferState)],
}

impl<'a> Transitions<'a> {
    pub fn images(images: &'a [(ImageHandle, ImageState)]) -> Transitions<'a> {
        Transitions {
            images,
            ..Default::default()
        }
    }

    pub fn buffers(buffers: &'a [(BufferHandle, BufferState)]) -> Transitions<'a> {
        Transitions {
            buffers,
            ..Default::default()
        }
    }

    pub fn texel_buffers(texel_buffers: &'a [(TexelBufferHandle, BufferState)]) -> Transitions<'a> {
        Transitions {
            texel_buffers,
            ..Default::default()
        }
    }

    pub fn with_images(self, images: &'a [(ImageHandle, ImageState)]) -> Transitions<'a> {
        Transitions { images, ..self }
    }

    pub fn with_buffers(self, buffers: &'a [(BufferHandle, BufferState)]) -> Transitions<'a> {
        Transitions { buffers, ..self }
    }

    pub fn with_texel_buffers(
        self,
        texel_buffers: &'a [(TexelBufferHandle, BufferState)],
    ) -> Transitions<'a> {
        Transitions {
            texel_buffers,
            ..self
        }
    }
}

/// The transient images, buffers and texel buffers of a renderer.
pub struct RenderResources {
    device: Arc<dyn Device>,
    pub images: ImageCollection,
    pub buffers: BufferCollection,
    pub texel_buffers: TexelBufferCollection,
}

impl RenderResources {
    pub fn new(device: Arc<dyn Device>, config: CollectionConfig) -> RenderResources {
        RenderResources {
            images: ImageCollection::new(device.clone(), config),
            buffers: BufferCollection::new(device.clone(), config),
            texel_buffers: TexelBufferCollection::new(device.clone(), config),
            device,
        }
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Must be called at the start of every frame, before any resource is created.
    pub fn start_frame(&mut self) {
        let _span = trace_span!("render_resources_start_frame").entered();
        self.images.start_frame();
        self.buffers.start_frame();
        self.texel_buffers.start_frame();
    }

    /// Destroys every transient resource, e.g. when the viewport is resized and all of them will
    /// be recreated with new sizes.
    pub fn destroy_resources(&mut self) {
        self.images.destroy_resources();
        self.buffers.destroy_resources();
        self.texel_buffers.destroy_resources();
    }

    /// Transitions every resource in `transitions` and records the needed barriers as one
    /// pipeline barrier command. Nothing is recorded if no barrier is needed.
    pub fn transition(&mut self, command_buffer: vk::CommandBuffer, transitions: &Transitions) {
        let image_barriers: Vec<_> = transitions
            .images
            .iter()
            .filter_map(|&(handle, state)| self.images.transition_barrier(handle, state, false))
            .collect();

        let mut buffer_barriers: Vec<_> = transitions
            .buffers
            .iter()
            .filter_map(|&(handle, state)| self.buffers.transition_barrier(handle, state, false))
            .collect();
        buffer_barriers.extend(transitions.texel_buffers.iter().filter_map(|&(handle, state)| {
            self.texel_buffers.transition_barrier(handle, state, false)
        }));

        if image_barriers.is_empty() && buffer_barriers.is_empty() {
            return;
        }
        self.device
            .cmd_pipeline_barrier(command_buffer, &buffer_barriers, &image_barriers);
    }
}
