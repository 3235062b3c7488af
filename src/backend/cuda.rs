//! Thin CUDA runtime bindings and device memory helpers.
//!
//! Runtime failures here are programmer or environment errors with no
//! sensible recovery path mid-kernel, so every helper panics with the
//! CUDA error code. Capability probing goes through [`device_count`],
//! which reports the code instead so detection can downgrade gracefully.

use std::ffi::c_void;

extern "C" {
    fn cudaGetDeviceCount(count: *mut libc::c_int) -> libc::c_int;
    fn cudaMalloc(dev_ptr: *mut *mut c_void, size: usize) -> libc::c_int;
    fn cudaFree(dev_ptr: *mut c_void) -> libc::c_int;
    fn cudaMemcpy(
        dst: *mut c_void,
        src: *const c_void,
        count: usize,
        kind: libc::c_int,
    ) -> libc::c_int;
    fn cudaDeviceSynchronize() -> libc::c_int;
}

const CUDA_MEMCPY_HOST_TO_DEVICE: libc::c_int = 1;
const CUDA_MEMCPY_DEVICE_TO_HOST: libc::c_int = 2;

/// Number of visible CUDA devices, or the runtime error code.
pub fn device_count() -> Result<i32, i32> {
    let mut count: libc::c_int = 0;
    let result = unsafe { cudaGetDeviceCount(&mut count) };
    if result == 0 {
        Ok(count)
    } else {
        Err(result)
    }
}

pub unsafe fn cuda_malloc<T>(len: usize) -> *mut T {
    let mut ptr: *mut c_void = std::ptr::null_mut();
    let size = len * std::mem::size_of::<T>();
    let result = cudaMalloc(&mut ptr as *mut *mut c_void, size);
    if result != 0 {
        panic!("CUDA malloc failed with error code: {} (size: {} bytes)", result, size);
    }
    ptr as *mut T
}

pub unsafe fn cuda_memcpy_h2d<T>(dst: *mut T, src: *const T, len: usize) {
    let result = cudaMemcpy(
        dst as *mut c_void,
        src as *const c_void,
        len * std::mem::size_of::<T>(),
        CUDA_MEMCPY_HOST_TO_DEVICE,
    );
    if result != 0 {
        panic!("CUDA memcpy H2D failed with error code: {}", result);
    }
}

pub unsafe fn cuda_memcpy_d2h<T>(dst: *mut T, src: *const T, len: usize) {
    let result = cudaMemcpy(
        dst as *mut c_void,
        src as *const c_void,
        len * std::mem::size_of::<T>(),
        CUDA_MEMCPY_DEVICE_TO_HOST,
    );
    if result != 0 {
        panic!("CUDA memcpy D2H failed with error code: {}", result);
    }
}

pub unsafe fn cuda_free<T>(ptr: *mut T) {
    let result = cudaFree(ptr as *mut c_void);
    if result != 0 {
        panic!("CUDA free failed with error code: {}", result);
    }
}

pub unsafe fn cuda_device_synchronize() {
    let result = cudaDeviceSynchronize();
    if result != 0 {
        panic!("CUDA device synchronization failed with error code: {}", result);
    }
}

/// Owned device allocation, freed on drop.
pub struct DeviceBuffer<T> {
    ptr: *mut T,
    len: usize,
}

impl<T: Copy> DeviceBuffer<T> {
    /// Allocate and upload a host slice.
    pub fn from_slice(host: &[T]) -> Self {
        let ptr = unsafe { cuda_malloc::<T>(host.len()) };
        unsafe { cuda_memcpy_h2d(ptr, host.as_ptr(), host.len()) };
        DeviceBuffer { ptr, len: host.len() }
    }

    /// Download back into a host slice of the same length.
    pub fn copy_to(&self, host: &mut [T]) {
        assert_eq!(host.len(), self.len);
        unsafe { cuda_memcpy_d2h(host.as_mut_ptr(), self.ptr, self.len) };
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Drop for DeviceBuffer<T> {
    fn drop(&mut self) {
        unsafe { cuda_free(self.ptr) };
    }
}

// Device pointers are plain addresses; the buffer is the unique owner.
unsafe impl<T: Send> Send for DeviceBuffer<T> {}
unsafe impl<T: Sync> Sync for DeviceBuffer<T> {}
