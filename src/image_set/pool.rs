// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/// A free list of width x height image buffers.
///
/// Deconvolution allocates and drops many same-sized buffers per major
/// iteration; recycling them here avoids re-faulting large allocations.
/// Buffers handed out by [BufferPool::take] are always zeroed.
pub struct BufferPool {
    image_size: usize,
    free: Vec<Vec<f64>>,
}

impl BufferPool {
    pub fn new(image_size: usize) -> BufferPool {
        BufferPool {
            image_size,
            free: vec![],
        }
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// A zeroed buffer of `image_size` elements, recycled if possible.
    pub fn take(&mut self) -> Vec<f64> {
        match self.free.pop() {
            Some(mut buffer) => {
                buffer.fill(0.0);
                buffer
            }
            None => vec![0.0; self.image_size],
        }
    }

    /// Return a buffer to the pool. Wrongly sized buffers are dropped.
    pub fn put(&mut self, buffer: Vec<f64>) {
        if buffer.len() == self.image_size {
            self.free.push(buffer);
        }
    }

    /// Drop all pooled-but-unused buffers.
    pub fn trim(&mut self) {
        self.free.clear();
    }
}
