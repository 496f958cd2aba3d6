//! Descriptor set allocation.
use crate::{
    device::Device,
    error::{DescriptorError, DeviceError},
    vk,
};
use ash::vk::Handle;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_SAMPLER_DESCRIPTOR_COUNT: u32 = 100;
const DEFAULT_DESCRIPTOR_COUNT: u32 = 1000;
const DEFAULT_ACCELERATION_STRUCTURE_COUNT: u32 = 100;
const DEFAULT_DESCRIPTOR_SET_COUNT: u32 = 1000;

/// Capacity of each pool created by a [`DescriptorAllocator`].
#[derive(Clone, Debug)]
pub struct DescriptorPoolConfig {
    pub pool_sizes: Vec<vk::DescriptorPoolSize>,
    pub max_sets: u32,
    pub flags: vk::DescriptorPoolCreateFlags,
}

impl Default for DescriptorPoolConfig {
    fn default() -> Self {
        let pool_size = |ty, descriptor_count| vk::DescriptorPoolSize {
            ty,
            descriptor_count,
        };
        let mut pool_sizes = vec![pool_size(
            vk::DescriptorType::SAMPLER,
            DEFAULT_SAMPLER_DESCRIPTOR_COUNT,
        )];
        pool_sizes.extend(
            [
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::DescriptorType::SAMPLED_IMAGE,
                vk::DescriptorType::STORAGE_IMAGE,
                vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
                vk::DescriptorType::STORAGE_TEXEL_BUFFER,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::DescriptorType::STORAGE_BUFFER,
                vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
                vk::DescriptorType::INPUT_ATTACHMENT,
            ]
            .into_iter()
            .map(|ty| pool_size(ty, DEFAULT_DESCRIPTOR_COUNT)),
        );

        DescriptorPoolConfig {
            pool_sizes,
            max_sets: DEFAULT_DESCRIPTOR_SET_COUNT,
            flags: vk::DescriptorPoolCreateFlags::empty(),
        }
    }
}

impl DescriptorPoolConfig {
    /// Adds acceleration structure descriptors. Requires `VK_KHR_acceleration_structure`.
    pub fn with_acceleration_structures(mut self) -> Self {
        self.pool_sizes.push(vk::DescriptorPoolSize {
            ty: vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
            descriptor_count: DEFAULT_ACCELERATION_STRUCTURE_COUNT,
        });
        self
    }

    pub fn with_flags(mut self, flags: vk::DescriptorPoolCreateFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Allocates descriptor sets from a growing list of pools.
///
/// Sets are never freed individually. When the active pool runs out, allocation moves on to the
/// next pool, creating it if needed. [`reset_pools`](Self::reset_pools) recycles every pool at
/// once, typically when the frame that used them has finished on the GPU.
pub struct DescriptorAllocator {
    device: Arc<dyn Device>,
    config: DescriptorPoolConfig,
    pools: Vec<vk::DescriptorPool>,
    active_pool: usize,
    generation: u64,
}

impl DescriptorAllocator {
    pub fn new(
        device: Arc<dyn Device>,
        config: DescriptorPoolConfig,
    ) -> Result<DescriptorAllocator, DescriptorError> {
        let pool =
            device.create_descriptor_pool(config.flags, config.max_sets, &config.pool_sizes)?;
        debug!(max_sets = config.max_sets, "created descriptor pool");
        Ok(DescriptorAllocator {
            device,
            config,
            pools: vec![pool],
            active_pool: 0,
            generation: 0,
        })
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub fn active_pool_index(&self) -> usize {
        self.active_pool
    }

    /// Incremented by every [`reset_pools`](Self::reset_pools). Sets allocated under an older
    /// generation must not be used anymore.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Resets every pool and starts allocating from the first one again.
    ///
    /// All sets allocated so far become invalid.
    pub fn reset_pools(&mut self) -> Result<(), DescriptorError> {
        for &pool in &self.pools {
            self.device.reset_descriptor_pool(pool)?;
        }
        self.active_pool = 0;
        self.generation += 1;
        debug!(
            pool_count = self.pools.len(),
            generation = self.generation,
            "reset descriptor pools"
        );
        Ok(())
    }

    pub fn allocate(
        &mut self,
        layout: vk::DescriptorSetLayout,
        debug_name: &str,
    ) -> Result<vk::DescriptorSet, DescriptorError> {
        let sets = self.allocate_many(&[layout], &[debug_name], None)?;
        Ok(sets[0])
    }

    /// Allocates a set whose last binding is a variable-count array of
    /// `variable_descriptor_count` descriptors.
    pub fn allocate_variable(
        &mut self,
        layout: vk::DescriptorSetLayout,
        debug_name: &str,
        variable_descriptor_count: u32,
    ) -> Result<vk::DescriptorSet, DescriptorError> {
        let sets = self.allocate_many(
            &[layout],
            &[debug_name],
            Some(std::slice::from_ref(&variable_descriptor_count)),
        )?;
        Ok(sets[0])
    }

    /// Allocates one set per layout.
    ///
    /// # Panics
    ///
    /// Panics if `debug_names` or `variable_descriptor_counts` don't have one entry per layout.
    pub fn allocate_many(
        &mut self,
        layouts: &[vk::DescriptorSetLayout],
        debug_names: &[&str],
        variable_descriptor_counts: Option<&[u32]>,
    ) -> Result<Vec<vk::DescriptorSet>, DescriptorError> {
        assert_eq!(layouts.len(), debug_names.len());
        if let Some(counts) = variable_descriptor_counts {
            assert_eq!(layouts.len(), counts.len());
        }

        let result = self.device.allocate_descriptor_sets(
            self.pools[self.active_pool],
            layouts,
            variable_descriptor_counts,
        );
        let result = match result {
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                self.next_pool()?;
                self.device.allocate_descriptor_sets(
                    self.pools[self.active_pool],
                    layouts,
                    variable_descriptor_counts,
                )
            }
            result => result,
        };

        let sets = match result {
            Ok(sets) => sets,
            Err(
                result @ (vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL),
            ) => {
                return Err(DescriptorError::Exhausted {
                    pool_count: self.pools.len(),
                    result,
                })
            }
            Err(err) => return Err(DeviceError::from(err).into()),
        };

        for (set, name) in sets.iter().zip(debug_names) {
            self.device
                .set_debug_name(vk::ObjectType::DESCRIPTOR_SET, set.as_raw(), name);
        }
        Ok(sets)
    }

    /// Makes the next pool active, creating it if all existing pools have been used.
    fn next_pool(&mut self) -> Result<(), DeviceError> {
        let next = self.active_pool + 1;
        if next == self.pools.len() {
            let pool = self.device.create_descriptor_pool(
                self.config.flags,
                self.config.max_sets,
                &self.config.pool_sizes,
            )?;
            self.pools.push(pool);
            debug!(pool_count = self.pools.len(), "descriptor pool exhausted, created a new one");
        } else {
            debug!(active_pool = next, "descriptor pool exhausted, moving to next");
        }
        self.active_pool = next;
        Ok(())
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        for pool in self.pools.drain(..) {
            self.device.destroy_descriptor_pool(pool);
        }
    }
}
