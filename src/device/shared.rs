use std::marker::PhantomData;
use std::mem::size_of;
use std::slice;

use metal::{Buffer, Device, MTLResourceOptions};

// SharedStorage keeps an array in a metal buffer with shared storage, so the cpu and gpu
// read and write the same memory without a copy
pub(super) struct SharedStorage<T: Copy> {
    device: Device,
    buffer: Buffer,
    capacity: usize,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Copy> SharedStorage<T> {
    pub fn with_capacity(device: &Device, capacity: usize) -> Self {
        // Metal won't hand out a zero length buffer
        let capacity = capacity.max(1);

        // Saturates, an impossible size gets refused by metal instead of wrapping
        let bytes = capacity.saturating_mul(size_of::<T>());

        let buffer = device.new_buffer(
            bytes as u64,
            MTLResourceOptions::StorageModeShared,
        );

        SharedStorage {
            device: device.clone(),
            buffer,
            capacity,
            len: 0,
            _marker: PhantomData,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        unsafe {
            // This is safe because the buffer is page aligned and holds at least `len` T's
            slice::from_raw_parts(self.buffer.contents() as *const T, self.len)
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe {
            // Same as above, and &mut self guarantees there is no other cpu view
            slice::from_raw_parts_mut(self.buffer.contents() as *mut T, self.len)
        }
    }

    pub fn reset(&mut self, len: usize, fill: T) {
        self.grow(len);
        self.len = len;
        self.as_mut_slice().fill(fill);
    }

    pub fn write(&mut self, data: &[T]) {
        self.grow(data.len());
        self.len = data.len();
        self.as_mut_slice().copy_from_slice(data);
    }

    // grow throws away the contents, callers always overwrite afterwards
    fn grow(&mut self, len: usize) {
        if len <= self.capacity {
            return;
        }

        let capacity = len
            .checked_next_power_of_two()
            .filter(|c| c.checked_mul(size_of::<T>()).is_some())
            .unwrap_or(len);

        *self = Self::with_capacity(&self.device, capacity);
    }
}
