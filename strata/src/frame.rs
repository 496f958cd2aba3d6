//! Frame-indexed storage.
use std::ops::{Index, IndexMut};

/// Number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Rotating index of a frame in flight, in `0..MAX_FRAMES_IN_FLIGHT`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct FrameIndex(usize);

impl FrameIndex {
    pub const fn get(self) -> usize {
        self.0
    }

    /// Index of the frame after this one.
    #[must_use]
    pub const fn next(self) -> FrameIndex {
        FrameIndex((self.0 + 1) % MAX_FRAMES_IN_FLIGHT)
    }
}

/// One `T` per frame in flight, e.g. per-frame descriptor sets or staging buffers.
#[derive(Clone, Debug, Default)]
pub struct PerFrame<T>([T; MAX_FRAMES_IN_FLIGHT]);

impl<T> PerFrame<T> {
    pub fn new(mut f: impl FnMut(FrameIndex) -> T) -> PerFrame<T> {
        PerFrame(std::array::from_fn(|i| f(FrameIndex(i))))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.0.iter_mut()
    }
}

impl<T> Index<FrameIndex> for PerFrame<T> {
    type Output = T;
    fn index(&self, index: FrameIndex) -> &T {
        &self.0[index.0]
    }
}

impl<T> IndexMut<FrameIndex> for PerFrame<T> {
    fn index_mut(&mut self, index: FrameIndex) -> &mut T {
        &mut self.0[index.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_index_wraps() {
        let mut index = FrameIndex::default();
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            index = index.next();
        }
        assert_eq!(index, FrameIndex::default());
    }

    #[test]
    fn per_frame_indexing() {
        let mut values = PerFrame::new(|i| i.get() * 10);
        let second = FrameIndex::default().next();
        assert_eq!(values[second], 10);
        values[second] += 1;
        assert_eq!(values.iter().copied().collect::<Vec<_>>(), vec![0, 11]);
    }
}
