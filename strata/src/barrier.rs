//! Barrier synthesis.
//!
//! These functions compute the pipeline barrier needed to move a resource from its recorded state
//! to a requested one. They always overwrite the recorded state with the requested state, even
//! when no barrier is returned. A caller that requests a transition must record the barrier it
//! gets back, otherwise the recorded state no longer matches what the GPU will see.
use crate::{
    state::{BufferState, ImageState},
    vk,
};

/// Whether a transition between two states needs a barrier.
///
/// Identical read-only states need no synchronization. Identical states with writes still need a
/// barrier to order the two writes.
fn needs_barrier(old_equals_new: bool, old_has_writes: bool, force: bool) -> bool {
    force || !old_equals_new || old_has_writes
}

/// Computes the barrier for a buffer transition and updates `current_state`.
///
/// The barrier covers the whole buffer (`[0, byte_size)`) and does not transfer queue family
/// ownership.
pub fn buffer_transition_barrier(
    buffer: vk::Buffer,
    byte_size: vk::DeviceSize,
    current_state: &mut BufferState,
    new_state: BufferState,
    force: bool,
) -> Option<vk::BufferMemoryBarrier2<'static>> {
    let old_state = *current_state;
    *current_state = new_state;

    if !needs_barrier(old_state == new_state, old_state.has_write_accesses(), force) {
        return None;
    }

    Some(
        vk::BufferMemoryBarrier2::default()
            .src_stage_mask(old_state.stage_mask())
            .src_access_mask(old_state.access_mask())
            .dst_stage_mask(new_state.stage_mask())
            .dst_access_mask(new_state.access_mask())
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(buffer)
            .offset(0)
            .size(byte_size),
    )
}

/// Computes the barrier for an image transition and updates `current_state`.
///
/// The barrier covers `subresource_range`, which callers set to the full range of the image.
pub fn image_transition_barrier(
    image: vk::Image,
    subresource_range: vk::ImageSubresourceRange,
    current_state: &mut ImageState,
    new_state: ImageState,
    force: bool,
) -> Option<vk::ImageMemoryBarrier2<'static>> {
    let old_state = *current_state;
    *current_state = new_state;

    if !needs_barrier(old_state == new_state, old_state.has_write_accesses(), force) {
        return None;
    }

    Some(
        vk::ImageMemoryBarrier2::default()
            .src_stage_mask(old_state.stage_mask())
            .src_access_mask(old_state.access_mask())
            .dst_stage_mask(new_state.stage_mask())
            .dst_access_mask(new_state.access_mask())
            .old_layout(old_state.layout())
            .new_layout(new_state.layout())
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(subresource_range),
    )
}
