use std::{fmt, hash, marker::PhantomData};

/// Slot index of the null handle.
pub const NULL_INDEX: u32 = 0xFFFF_FFFF;

/// Generational handle to a resource in a [`ResourceCollection`](crate::ResourceCollection).
///
/// A handle is a slot index plus the generation of the slot at the time the handle was issued.
/// Collections bump the generation of a slot when its resource is released or destroyed, so old
/// handles stop matching and any access through them panics instead of reaching the slot's next
/// occupant.
///
/// `is_valid` only checks that the handle is not null. Liveness is the collection's business, see
/// [`ResourceCollection::is_valid_handle`](crate::ResourceCollection::is_valid_handle).
pub struct Handle<R> {
    index: u32,
    generation: u64,
    _phantom: PhantomData<fn() -> R>,
}

impl<R> Handle<R> {
    pub(crate) const fn new(index: u32, generation: u64) -> Handle<R> {
        Handle {
            index,
            generation,
            _phantom: PhantomData,
        }
    }

    /// The null handle.
    pub const fn null() -> Handle<R> {
        Handle::new(NULL_INDEX, 0)
    }

    pub const fn is_valid(&self) -> bool {
        self.index != NULL_INDEX
    }

    pub const fn index(&self) -> u32 {
        self.index
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

// Manual impls: derives would require `R: Clone` etc.
impl<R> Copy for Handle<R> {}

impl<R> Clone for Handle<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> PartialEq for Handle<R> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<R> Eq for Handle<R> {}

impl<R> hash::Hash for Handle<R> {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<R> Default for Handle<R> {
    fn default() -> Self {
        Handle::null()
    }
}

impl<R> fmt::Debug for Handle<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}v{}", self.index, self.generation)
        } else {
            write!(f, "null")
        }
    }
}
