use std::fmt;

use tracing::debug;

#[cfg(all(target_os = "macos", feature = "metal"))]
mod shared;

#[cfg(all(target_os = "macos", feature = "metal"))]
use shared::SharedStorage;

// Device is the memory space that index and query buffers live in
#[derive(Clone)]
pub struct Device {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Host,
    #[cfg(all(target_os = "macos", feature = "metal"))]
    Metal(metal::Device),
}

impl Device {
    // host keeps every buffer in ordinary heap memory
    pub fn host() -> Self {
        Device {
            backend: Backend::Host,
        }
    }

    // system_default picks the accelerator when one is compiled in and present
    pub fn system_default() -> Self {
        #[cfg(all(target_os = "macos", feature = "metal"))]
        {
            if let Some(device) = metal::Device::system_default() {
                debug!(device = device.name(), "using metal shared storage");
                return Device {
                    backend: Backend::Metal(device),
                };
            }
        }

        debug!("no accelerator available, using host memory");
        Self::host()
    }

    pub fn name(&self) -> &str {
        match &self.backend {
            Backend::Host => "host",
            #[cfg(all(target_os = "macos", feature = "metal"))]
            Backend::Metal(device) => device.name(),
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self.backend, Backend::Host)
    }

    // alloc creates a buffer of `len` copies of `fill`
    pub fn alloc<T: Copy>(&self, len: usize, fill: T) -> DeviceBuffer<T> {
        let mut buffer = self.empty_buffer(len);
        buffer.reset(len, fill);

        buffer
    }

    // upload copies host data into a new buffer on this device
    pub fn upload<T: Copy>(&self, data: &[T]) -> DeviceBuffer<T> {
        let mut buffer = self.empty_buffer(data.len());
        buffer.write(data);

        buffer
    }

    fn empty_buffer<T: Copy>(&self, capacity: usize) -> DeviceBuffer<T> {
        let storage = match &self.backend {
            Backend::Host => Storage::Host(Vec::with_capacity(capacity)),
            #[cfg(all(target_os = "macos", feature = "metal"))]
            Backend::Metal(device) => Storage::Shared(SharedStorage::with_capacity(device, capacity)),
        };

        DeviceBuffer { storage }
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::system_default()
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device").field("name", &self.name()).finish()
    }
}

enum Storage<T: Copy> {
    Host(Vec<T>),
    #[cfg(all(target_os = "macos", feature = "metal"))]
    Shared(SharedStorage<T>),
}

// DeviceBuffer is a contiguous array resident on a Device. Its length is always exact,
// growing reallocates but shrinking keeps the allocation around for the next call
pub struct DeviceBuffer<T: Copy> {
    storage: Storage<T>,
}

impl<T: Copy> DeviceBuffer<T> {
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[T] {
        match &self.storage {
            Storage::Host(v) => v.as_slice(),
            #[cfg(all(target_os = "macos", feature = "metal"))]
            Storage::Shared(s) => s.as_slice(),
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match &mut self.storage {
            Storage::Host(v) => v.as_mut_slice(),
            #[cfg(all(target_os = "macos", feature = "metal"))]
            Storage::Shared(s) => s.as_mut_slice(),
        }
    }

    // reset resizes the buffer to exactly `len` elements, all set to `fill`
    pub fn reset(&mut self, len: usize, fill: T) {
        match &mut self.storage {
            Storage::Host(v) => {
                v.clear();
                v.resize(len, fill);
            }
            #[cfg(all(target_os = "macos", feature = "metal"))]
            Storage::Shared(s) => s.reset(len, fill),
        }
    }

    // write replaces the contents of the buffer with `data`
    pub fn write(&mut self, data: &[T]) {
        match &mut self.storage {
            Storage::Host(v) => {
                v.clear();
                v.extend_from_slice(data);
            }
            #[cfg(all(target_os = "macos", feature = "metal"))]
            Storage::Shared(s) => s.write(data),
        }
    }

    // to_vec downloads the buffer into host memory
    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }
}

impl<T: Copy> fmt::Debug for DeviceBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("len", &self.len())
            .finish()
    }
}
