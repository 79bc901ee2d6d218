//! POSIX shared memory and memory mapping wrappers

use std::ffi::CString;
use std::io;
use std::mem::ManuallyDrop;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr::{self, NonNull};

use crate::drivers::FrequencySource;
use crate::error::{Error, Result};

/// A `MAP_SHARED` mapping, unmapped on drop or by [`Mapping::release`]
#[derive(Debug)]
pub struct Mapping {
    ptr: NonNull<u8>,
    len: usize,
}

// The mapping is plain memory; callers decide how it is accessed.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Mapping {
    /// Maps `len` bytes of `fd` starting at `offset`
    pub fn new(fd: RawFd, len: usize, prot: libc::c_int, offset: libc::off_t) -> Result<Self> {
        let addr = unsafe {
            libc::mmap(ptr::null_mut(), len, prot, libc::MAP_SHARED, fd, offset)
        };
        if addr == libc::MAP_FAILED {
            return Err(Error::Map(io::Error::last_os_error()));
        }
        let ptr = NonNull::new(addr as *mut u8)
            .ok_or_else(|| Error::Map(io::Error::from(io::ErrorKind::AddrNotAvailable)))?;
        Ok(Self { ptr, len })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Unmaps now and reports the result instead of ignoring it in `drop`
    pub fn release(self) -> io::Result<()> {
        let this = ManuallyDrop::new(self);
        unmap(this.ptr, this.len)
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if let Err(e) = unmap(self.ptr, self.len) {
            log::warn!("munmap failed: {}", e);
        }
    }
}

fn unmap(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
    let ret = unsafe { libc::munmap(ptr.as_ptr() as *mut libc::c_void, len) };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Read-only view of a named POSIX shared memory object
#[derive(Debug)]
pub struct SharedRegion {
    name: String,
    map: Mapping,
    fd: OwnedFd,
}

impl SharedRegion {
    /// Opens `name` read-only and maps at most `capacity` bytes of it
    pub fn open(name: &str, capacity: usize) -> Result<Self> {
        let open_err = |source| Error::ShmOpen {
            name: name.to_string(),
            source,
        };
        let c_name = CString::new(name)
            .map_err(|e| open_err(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        let raw = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDONLY, 0o666) };
        if raw < 0 {
            return Err(open_err(io::Error::last_os_error()));
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // Touching pages past the end of the object raises SIGBUS.
        let size = object_size(fd.as_raw_fd()).map_err(open_err)?;
        let len = capacity.min(size);
        if len == 0 {
            return Err(open_err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "shared memory object is empty",
            )));
        }

        let map = Mapping::new(fd.as_raw_fd(), len, libc::PROT_READ, 0)?;
        log::info!("mapped {} ({} bytes)", name, len);
        Ok(Self {
            name: name.to_string(),
            map,
            fd,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Unmaps the region and closes the descriptor
    pub fn close(self) -> Result<()> {
        let SharedRegion { name, map, fd } = self;
        map.release().map_err(Error::Map)?;
        drop(fd);
        log::info!("released {}", name);
        Ok(())
    }
}

impl FrequencySource for SharedRegion {
    fn load(&self, dst: &mut [u8]) -> usize {
        let src = self.map.as_ptr();
        let limit = dst.len().min(self.map.len());
        for i in 0..limit {
            // The producer writes this memory from another process.
            let byte = unsafe { ptr::read_volatile(src.add(i)) };
            if byte == 0 {
                return i;
            }
            dst[i] = byte;
        }
        limit
    }
}

fn object_size(fd: RawFd) -> io::Result<usize> {
    let mut stat = std::mem::MaybeUninit::<libc::stat>::uninit();
    let ret = unsafe { libc::fstat(fd, stat.as_mut_ptr()) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    let stat = unsafe { stat.assume_init() };
    Ok(stat.st_size.max(0) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_region_is_an_open_error() {
        let err = SharedRegion::open("/buzzer-control-does-not-exist", 4096).unwrap_err();
        assert!(matches!(err, Error::ShmOpen { .. }));
    }

    #[test]
    fn interior_nul_is_rejected() {
        let err = SharedRegion::open("/bad\0name", 4096).unwrap_err();
        match err {
            Error::ShmOpen { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::InvalidInput)
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
