//! Transient resource collections.
//!
//! A collection owns every transient resource of one kind and hands out generational handles to
//! them. Resources are created by description; a released resource stays allocated and is handed
//! out again to the next `create` with an equal description, until it has gone unused for a few
//! frames and gets destroyed in [`ResourceCollection::start_frame`].
//!
//! # Reference counts
//!
//! `create` returns a handle holding one reference. `preserve` adds one so that the resource
//! survives the next frame boundary (e.g. temporal history), and every reference is dropped with
//! `release`. When the count reaches zero the slot's generation is bumped, which invalidates all
//! handles to it.
//!
//! Using a released or otherwise stale handle is a bug in the caller and panics.
use crate::{
    device::Device,
    error::DeviceError,
    frame::MAX_FRAMES_IN_FLIGHT,
    handle::Handle,
    resource::{Buffer, Image, TexelBuffer},
    vk,
};
use std::{fmt, sync::Arc};
use tracing::{trace, trace_span};

mod buffer;
mod image;

/// Options of a [`ResourceCollection`].
#[derive(Copy, Clone, Debug)]
pub struct CollectionConfig {
    /// Number of frame starts a released resource is kept around for aliasing before it is
    /// destroyed.
    pub destroy_delay_frames: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        CollectionConfig {
            destroy_delay_frames: 2 * MAX_FRAMES_IN_FLIGHT as u32,
        }
    }
}

/// A native resource that can be managed by a [`ResourceCollection`].
pub trait TransientResource: Sized {
    /// Shape of the resource. Equal descriptions can share a resource.
    type Description: Clone + PartialEq + fmt::Debug;
    type State: Copy + fmt::Debug;
    type Barrier;
    type Native: vk::Handle + Copy;

    /// Human-readable name of the resource kind, for diagnostics.
    const KIND: &'static str;

    fn create(
        device: &dyn Device,
        description: &Self::Description,
        debug_name: &str,
    ) -> Result<Self, DeviceError>;

    fn destroy(self, device: &dyn Device);

    fn native(&self) -> Self::Native;

    /// Computes the barrier to `state` and records `state` as the current one.
    fn transition_barrier(&mut self, state: Self::State, force: bool) -> Option<Self::Barrier>;

    fn record_barrier(
        device: &dyn Device,
        command_buffer: vk::CommandBuffer,
        barrier: Self::Barrier,
    );
}

pub type ImageHandle = Handle<Image>;
pub type BufferHandle = Handle<Buffer>;
pub type TexelBufferHandle = Handle<TexelBuffer>;

pub type ImageCollection = ResourceCollection<Image>;
pub type BufferCollection = ResourceCollection<Buffer>;
pub type TexelBufferCollection = ResourceCollection<TexelBuffer>;

struct Slot<R: TransientResource> {
    /// `None` once destroyed; the index is then on the freelist.
    resource: Option<R>,
    description: Option<R::Description>,
    /// Names of every use of the resource this frame, separated by `|`.
    aliased_debug_name: String,
    generation: u64,
    ref_count: u32,
    /// Preserved this frame, allowed to be referenced at the next frame start.
    preserved: bool,
    unused_frames: u32,
}

impl<R: TransientResource> Slot<R> {
    fn empty() -> Slot<R> {
        Slot {
            resource: None,
            description: None,
            aliased_debug_name: String::new(),
            generation: 0,
            ref_count: 0,
            preserved: false,
            unused_frames: 0,
        }
    }

    /// Whether the last use of this slot this frame was named `name`.
    fn last_named(&self, name: &str) -> bool {
        let aliased = &self.aliased_debug_name;
        aliased == name
            || (aliased.len() > name.len()
                && aliased.ends_with(name)
                && aliased.as_bytes()[aliased.len() - name.len() - 1] == b'|')
    }
}

/// Pool of transient resources of one kind, addressed by generational handles.
pub struct ResourceCollection<R: TransientResource> {
    device: Arc<dyn Device>,
    config: CollectionConfig,
    slots: Vec<Slot<R>>,
    /// Indices of slots whose resource has been destroyed.
    freelist: Vec<u32>,
    /// Every debug name used this frame.
    debug_names: Vec<String>,
    /// Persists until `clear_debug`, across frames and `destroy_resources`.
    marked_debug_name: Option<String>,
    marked_debug_handle: Option<Handle<R>>,
}

impl<R: TransientResource> ResourceCollection<R> {
    pub fn new(device: Arc<dyn Device>, config: CollectionConfig) -> ResourceCollection<R> {
        ResourceCollection {
            device,
            config,
            slots: Vec::new(),
            freelist: Vec::new(),
            debug_names: Vec::new(),
            marked_debug_name: None,
            marked_debug_handle: None,
        }
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Number of slots, including destroyed ones.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of resources currently referenced by at least one handle.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.ref_count > 0).count()
    }

    /// Number of resources allocated, referenced or kept for aliasing.
    pub fn allocated_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.resource.is_some())
            .count()
    }

    /// Prepares the collection for a new frame.
    ///
    /// # Panics
    ///
    /// Panics if a resource that was not preserved during the last frame is still referenced.
    pub fn start_frame(&mut self) {
        let _span = trace_span!("start_frame", kind = R::KIND).entered();

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.preserved {
                slot.preserved = false;
            } else {
                assert!(
                    slot.ref_count == 0,
                    "{} `{}` (slot {}) leaked: still referenced at frame start",
                    R::KIND,
                    slot.aliased_debug_name,
                    index
                );
            }
            slot.aliased_debug_name.clear();
        }
        self.debug_names.clear();

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.ref_count > 0 || slot.resource.is_none() {
                continue;
            }
            slot.unused_frames += 1;
            if slot.unused_frames <= self.config.destroy_delay_frames {
                continue;
            }
            if let Some(resource) = slot.resource.take() {
                trace!(kind = R::KIND, index, description = ?slot.description, "destroy");
                resource.destroy(&*self.device);
            }
            slot.description = None;
            slot.generation += 1;
            slot.unused_frames = 0;
            self.freelist.push(index as u32);
        }

        self.marked_debug_handle = None;
    }

    /// Destroys every resource, whether referenced or not, and invalidates all handles.
    ///
    /// Meant for viewport and swapchain recreation, when every transient changes shape anyway.
    pub fn destroy_resources(&mut self) {
        let _span = trace_span!("destroy_resources", kind = R::KIND).entered();

        for slot in &mut self.slots {
            if let Some(resource) = slot.resource.take() {
                resource.destroy(&*self.device);
            }
            slot.description = None;
            slot.aliased_debug_name.clear();
            slot.ref_count = 0;
            slot.preserved = false;
            slot.unused_frames = 0;
            slot.generation += 1;
        }
        self.freelist = (0..self.slots.len() as u32).rev().collect();
        self.debug_names.clear();
        self.marked_debug_handle = None;
    }

    /// Returns a handle to a resource matching `description`.
    ///
    /// Reuses a released resource with an equal description if there is one, otherwise creates
    /// a new one. Either way the recorded state is whatever the resource was last transitioned to.
    pub fn create(
        &mut self,
        description: &R::Description,
        debug_name: &str,
    ) -> Result<Handle<R>, DeviceError> {
        let marked = self.marked_debug_name.as_deref();
        let reusable = self.slots.iter().position(|slot| {
            slot.ref_count == 0
                && slot.resource.is_some()
                && slot.description.as_ref() == Some(description)
                // don't stomp the resource under inspection
                && !marked.map_or(false, |name| slot.last_named(name))
        });

        let handle = if let Some(index) = reusable {
            let slot = &mut self.slots[index];
            debug_assert!(!slot.preserved);
            slot.ref_count = 1;
            slot.unused_frames = 0;
            let handle = Handle::new(index as u32, slot.generation);
            trace!(kind = R::KIND, ?handle, name = debug_name, "alias");
            handle
        } else {
            let resource = R::create(&*self.device, description, debug_name)?;
            let index = match self.freelist.pop() {
                Some(index) => index as usize,
                None => {
                    self.slots.push(Slot::empty());
                    self.slots.len() - 1
                }
            };
            let slot = &mut self.slots[index];
            debug_assert!(slot.resource.is_none() && slot.ref_count == 0);
            slot.resource = Some(resource);
            slot.description = Some(description.clone());
            slot.aliased_debug_name.clear();
            slot.ref_count = 1;
            slot.preserved = false;
            slot.unused_frames = 0;
            let handle = Handle::new(index as u32, slot.generation);
            trace!(kind = R::KIND, ?handle, name = debug_name, ?description, "create");
            handle
        };

        self.append_debug_name(handle, debug_name);
        Ok(handle)
    }

    /// Whether `handle` refers to a live resource.
    ///
    /// The marked debug resource stays accessible for the rest of the frame after its release.
    pub fn is_valid_handle(&self, handle: Handle<R>) -> bool {
        if !handle.is_valid() {
            return false;
        }
        let Some(slot) = self.slots.get(handle.index() as usize) else {
            return false;
        };
        if slot.resource.is_none() {
            return false;
        }

        if slot.ref_count > 0 {
            return handle.generation() == slot.generation;
        }
        // released marked resource, not yet reused
        self.marked_debug_handle == Some(handle) && handle.generation() + 1 == slot.generation
    }

    fn checked_index(&self, handle: Handle<R>) -> usize {
        assert!(handle.is_valid(), "null {} handle", R::KIND);
        assert!(
            (handle.index() as usize) < self.slots.len(),
            "{} handle {:?} out of range ({} slots)",
            R::KIND,
            handle,
            self.slots.len()
        );
        assert!(
            self.is_valid_handle(handle),
            "stale {} handle {:?}: slot is at generation {}",
            R::KIND,
            handle,
            self.slots[handle.index() as usize].generation
        );
        handle.index() as usize
    }

    /// Index of a handle that holds a reference, for operations that change the reference count.
    fn checked_referenced_index(&self, handle: Handle<R>) -> usize {
        let index = self.checked_index(handle);
        let slot = &self.slots[index];
        assert!(
            slot.ref_count > 0 && slot.generation == handle.generation(),
            "{} handle {:?} was already released",
            R::KIND,
            handle
        );
        index
    }

    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn resource(&self, handle: Handle<R>) -> &R {
        let index = self.checked_index(handle);
        match &self.slots[index].resource {
            Some(resource) => resource,
            None => unreachable!("live slot without a resource"),
        }
    }

    pub fn resource_mut(&mut self, handle: Handle<R>) -> &mut R {
        let index = self.checked_index(handle);
        match &mut self.slots[index].resource {
            Some(resource) => resource,
            None => unreachable!("live slot without a resource"),
        }
    }

    pub fn native_handle(&self, handle: Handle<R>) -> R::Native {
        self.resource(handle).native()
    }

    /// Transitions the resource to `state`, recording a barrier into `command_buffer` if needed.
    pub fn transition(
        &mut self,
        command_buffer: vk::CommandBuffer,
        handle: Handle<R>,
        state: R::State,
    ) {
        if let Some(barrier) = self.transition_barrier(handle, state, false) {
            R::record_barrier(&*self.device, command_buffer, barrier);
        }
    }

    /// Returns the barrier that transitions the resource to `state`.
    ///
    /// The recorded state is set to `state` even if no barrier is returned, and the caller must
    /// record the returned barrier before the resource is used in the new state.
    pub fn transition_barrier(
        &mut self,
        handle: Handle<R>,
        state: R::State,
        force: bool,
    ) -> Option<R::Barrier> {
        self.resource_mut(handle).transition_barrier(state, force)
    }

    /// Adds `name` to the names of the resource and renames the native object accordingly.
    pub fn append_debug_name(&mut self, handle: Handle<R>, name: &str) {
        let index = self.checked_index(handle);
        debug_assert!(
            !self.debug_names.iter().any(|existing| existing == name),
            "{} debug name `{}` used twice in a frame",
            R::KIND,
            name
        );

        let slot = &mut self.slots[index];
        if !slot.aliased_debug_name.is_empty() {
            slot.aliased_debug_name.push('|');
        }
        slot.aliased_debug_name.push_str(name);
        if let Some(resource) = &slot.resource {
            self.device.set_debug_name(
                <R::Native as vk::Handle>::TYPE,
                vk::Handle::as_raw(resource.native()),
                &slot.aliased_debug_name,
            );
        }

        self.debug_names.push(name.to_owned());
        if self.marked_debug_name.as_deref() == Some(name) {
            self.marked_debug_handle = Some(handle);
        }
    }

    /// Keeps the resource alive across the next frame boundary.
    ///
    /// Adds a reference, which the consumer drops with [`release`](Self::release).
    pub fn preserve(&mut self, handle: Handle<R>) {
        let index = self.checked_referenced_index(handle);
        let slot = &mut self.slots[index];
        slot.ref_count += 1;
        slot.preserved = true;
        slot.unused_frames = 0;
        trace!(kind = R::KIND, ?handle, ref_count = slot.ref_count, "preserve");
    }

    /// Drops a reference to the resource.
    ///
    /// When the last reference is dropped the handle becomes stale and the resource is kept for
    /// aliasing.
    pub fn release(&mut self, handle: Handle<R>) {
        let index = self.checked_referenced_index(handle);
        let slot = &mut self.slots[index];
        slot.ref_count -= 1;
        if slot.ref_count == 0 {
            slot.generation += 1;
            slot.preserved = false;
            trace!(kind = R::KIND, ?handle, "release");
        }
    }

    /// Names of every resource created or aliased this frame.
    pub fn debug_names(&self) -> &[String] {
        &self.debug_names
    }

    /// Marks the resource that will be created under `name` for inspection.
    ///
    /// The handle becomes available once a resource is created with that name, usually on the
    /// next frame.
    pub fn mark_for_debug(&mut self, name: &str) {
        self.marked_debug_name = Some(name.to_owned());
        self.marked_debug_handle = None;
    }

    pub fn clear_debug(&mut self) {
        self.marked_debug_name = None;
        self.marked_debug_handle = None;
    }

    /// Handle to the marked resource, or the null handle if it doesn't exist this frame.
    pub fn active_debug_handle(&self) -> Handle<R> {
        match self.marked_debug_handle {
            Some(handle) if self.is_valid_handle(handle) => handle,
            _ => Handle::null(),
        }
    }

    pub fn active_debug_name(&self) -> Option<&str> {
        self.marked_debug_name.as_deref()
    }
}

impl<R: TransientResource> Drop for ResourceCollection<R> {
    fn drop(&mut self) {
        self.destroy_resources();
    }
}
