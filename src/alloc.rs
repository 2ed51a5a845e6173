//! Memory suitable for window registration.
//!
//! [`Buffer`]s come from [`Mpi::alloc_mem()`](crate::Mpi::alloc_mem) and go back
//! through [`Mpi::free_mem()`](crate::Mpi::free_mem). A buffer is a cheap,
//! cloneable handle to a zero-initialised, address-stable byte region. The
//! number of live handles is its reference count: a window that exposes the
//! buffer holds exactly one of them until it is freed.
//!
//! # Example
//!
//! ```
//! use ferrorma::{Info, Universe};
//!
//! let universe = Universe::new(1).unwrap();
//! universe
//!     .run(|mpi| {
//!         let buf = mpi.alloc_mem(10, &Info::null()).unwrap();
//!         assert_eq!(buf.len(), 10);
//!         assert_eq!(buf.to_vec().unwrap(), vec![0u8; 10]);
//!         mpi.free_mem(buf).unwrap();
//!     })
//!     .unwrap();
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::info::Info;

/// Source of allocator identities, unique across universes.
static NEXT_ALLOCATOR: AtomicU64 = AtomicU64::new(0);

/// The memory behind a [`Buffer`].
struct Region {
    id: u64,
    allocator: u64,
    address: usize,
    bytes: RwLock<Box<[u8]>>,
    registration: Mutex<Registration>,
}

/// Window registrations and free state, changed together under one lock.
#[derive(Default)]
struct Registration {
    windows: usize,
    freed: bool,
}

/// Handle to memory allocated by [`Mpi::alloc_mem()`](crate::Mpi::alloc_mem).
///
/// Cloning a `Buffer` creates another handle to the same memory and raises
/// [`ref_count()`](Self::ref_count) by one.
#[derive(Clone)]
pub struct Buffer {
    region: Arc<Region>,
}

impl Buffer {
    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.region.bytes.read().len()
    }

    /// Whether the buffer has zero length.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address of the first byte. Stable for the lifetime of the buffer.
    pub fn address(&self) -> usize {
        self.region.address
    }

    /// Number of live handles to this buffer, including windows exposing it.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.region)
    }

    /// Number of live windows exposing this buffer.
    pub fn window_refs(&self) -> usize {
        self.region.registration.lock().windows
    }

    /// Whether the buffer was returned to its allocator.
    pub fn is_freed(&self) -> bool {
        self.region.registration.lock().freed
    }

    /// Copy `out.len()` bytes starting at `offset` into `out`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the range is out of bounds or the
    /// buffer was freed.
    pub fn read(&self, offset: usize, out: &mut [u8]) -> Result<()> {
        self.ensure_live()?;
        let bytes = self.region.bytes.read();
        let range = checked_range(offset, out.len(), bytes.len())?;
        out.copy_from_slice(&bytes[range]);
        Ok(())
    }

    /// Copy `data` into the buffer starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the range is out of bounds or the
    /// buffer was freed.
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.ensure_live()?;
        let mut bytes = self.region.bytes.write();
        let range = checked_range(offset, data.len(), bytes.len())?;
        bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Set every byte to `value`.
    pub fn fill(&self, value: u8) -> Result<()> {
        self.ensure_live()?;
        self.region.bytes.write().fill(value);
        Ok(())
    }

    /// Copy the whole buffer out.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        self.ensure_live()?;
        Ok(self.region.bytes.read().to_vec())
    }

    /// Whether two handles refer to the same memory.
    pub fn same_memory(&self, other: &Buffer) -> bool {
        Arc::ptr_eq(&self.region, &other.region)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_freed() {
            return Err(Error::InvalidArgument("buffer was already freed".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.region.id)
            .field("address", &format_args!("{:#x}", self.region.address))
            .field("len", &self.len())
            .field("window_refs", &self.window_refs())
            .finish()
    }
}

fn checked_range(offset: usize, len: usize, size: usize) -> Result<std::ops::Range<usize>> {
    offset
        .checked_add(len)
        .filter(|&end| end <= size)
        .map(|end| offset..end)
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "range {offset}+{len} is out of bounds for a buffer of {size} bytes"
            ))
        })
}

/// One window's reference to the buffer it exposes.
///
/// Holds a buffer handle and counts as a window registration until dropped.
pub(crate) struct Exposure {
    buffer: Buffer,
}

impl Exposure {
    /// Register a window on `buffer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the buffer was already freed.
    pub(crate) fn new(buffer: &Buffer) -> Result<Self> {
        let mut registration = buffer.region.registration.lock();
        if registration.freed {
            return Err(Error::InvalidArgument(
                "cannot expose a freed buffer".into(),
            ));
        }
        registration.windows += 1;
        Ok(Exposure {
            buffer: buffer.clone(),
        })
    }

    pub(crate) fn buffer(&self) -> &Buffer {
        &self.buffer
    }
}

impl Drop for Exposure {
    fn drop(&mut self) {
        self.buffer.region.registration.lock().windows -= 1;
    }
}

/// Allocator behind `alloc_mem`/`free_mem`.
pub(crate) struct Allocator {
    id: u64,
    next_region: AtomicU64,
    live: Mutex<HashSet<u64>>,
}

impl Allocator {
    pub(crate) fn new() -> Self {
        Allocator {
            id: NEXT_ALLOCATOR.fetch_add(1, Ordering::Relaxed),
            next_region: AtomicU64::new(0),
            live: Mutex::new(HashSet::new()),
        }
    }

    /// Allocate `size` zeroed bytes.
    pub(crate) fn allocate(&self, size: i64, info: &Info) -> Result<Buffer> {
        let len = usize::try_from(size)
            .map_err(|_| Error::Other(format!("cannot allocate a negative size ({size})")))?;
        if !info.is_null() {
            log::debug!("alloc_mem: ignoring {} info hint(s)", info.len()?);
        }

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|e| Error::Other(format!("cannot allocate {len} bytes: {e}")))?;
        bytes.resize(len, 0u8);
        let bytes = bytes.into_boxed_slice();

        let id = self.next_region.fetch_add(1, Ordering::Relaxed);
        let region = Region {
            id,
            allocator: self.id,
            address: bytes.as_ptr() as usize,
            bytes: RwLock::new(bytes),
            registration: Mutex::new(Registration::default()),
        };
        self.live.lock().insert(id);
        log::debug!("alloc_mem: buffer {id} of {len} bytes at {:#x}", region.address);
        Ok(Buffer {
            region: Arc::new(region),
        })
    }

    /// Return `buffer` to the allocator.
    pub(crate) fn free(&self, buffer: Buffer) -> Result<()> {
        let region = &buffer.region;
        if region.allocator != self.id {
            return Err(Error::InvalidArgument(
                "buffer was not allocated by this runtime".into(),
            ));
        }
        let mut registration = region.registration.lock();
        if registration.windows > 0 {
            return Err(Error::InvalidArgument(format!(
                "buffer is still exposed by {} window(s)",
                registration.windows
            )));
        }
        if registration.freed || !self.live.lock().remove(&region.id) {
            return Err(Error::InvalidArgument("buffer was already freed".into()));
        }
        registration.freed = true;
        log::debug!("free_mem: buffer {}", region.id);
        Ok(())
    }

    /// Number of buffers allocated and not yet freed.
    pub(crate) fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn allocation_is_zeroed_and_sized() {
        let alloc = Allocator::new();
        let buf = alloc.allocate(10, &Info::null()).unwrap();
        assert_eq!(buf.len(), 10);
        assert!(!buf.is_empty());
        assert_eq!(buf.to_vec().unwrap(), vec![0; 10]);
        assert_eq!(alloc.live_count(), 1);
        alloc.free(buf).unwrap();
        assert_eq!(alloc.live_count(), 0);
    }

    #[test]
    fn negative_size_is_err_other() {
        let alloc = Allocator::new();
        let err = alloc.allocate(-1, &Info::null()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Other);
    }

    #[test]
    fn huge_size_is_err_other() {
        let alloc = Allocator::new();
        let err = alloc.allocate(i64::MAX, &Info::null()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Other);
    }

    #[test]
    fn zero_size_allocation() {
        let alloc = Allocator::new();
        let buf = alloc.allocate(0, &Info::null()).unwrap();
        assert!(buf.is_empty());
        alloc.free(buf).unwrap();
    }

    #[test]
    fn address_is_stable_across_writes() {
        let alloc = Allocator::new();
        let buf = alloc.allocate(16, &Info::null()).unwrap();
        let addr = buf.address();
        buf.write(4, &[1, 2, 3]).unwrap();
        buf.fill(9).unwrap();
        assert_eq!(buf.address(), addr);
        let mut out = [0u8; 2];
        buf.read(14, &mut out).unwrap();
        assert_eq!(out, [9, 9]);
    }

    #[test]
    fn out_of_bounds_access() {
        let alloc = Allocator::new();
        let buf = alloc.allocate(4, &Info::null()).unwrap();
        assert_eq!(buf.write(3, &[0, 0]).unwrap_err().class(), ErrorClass::Arg);
        let mut out = [0u8; 1];
        assert_eq!(buf.read(usize::MAX, &mut out).unwrap_err().class(), ErrorClass::Arg);
    }

    #[test]
    fn clone_raises_ref_count() {
        let alloc = Allocator::new();
        let buf = alloc.allocate(1, &Info::null()).unwrap();
        assert_eq!(buf.ref_count(), 1);
        let other = buf.clone();
        assert_eq!(buf.ref_count(), 2);
        assert!(buf.same_memory(&other));
        drop(other);
        assert_eq!(buf.ref_count(), 1);
    }

    #[test]
    fn double_free_is_err_arg() {
        let alloc = Allocator::new();
        let buf = alloc.allocate(8, &Info::null()).unwrap();
        let alias = buf.clone();
        alloc.free(buf).unwrap();
        assert!(alias.is_freed());
        let err = alloc.free(alias.clone()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Arg);
        assert_eq!(alias.to_vec().unwrap_err().class(), ErrorClass::Arg);
    }

    #[test]
    fn foreign_buffer_is_err_arg() {
        let a = Allocator::new();
        let b = Allocator::new();
        let buf = a.allocate(8, &Info::null()).unwrap();
        let err = b.free(buf.clone()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Arg);
        a.free(buf).unwrap();
    }

    #[test]
    fn exposed_buffer_cannot_be_freed() {
        let alloc = Allocator::new();
        let buf = alloc.allocate(8, &Info::null()).unwrap();
        let exposure = Exposure::new(&buf).unwrap();
        assert_eq!(buf.window_refs(), 1);
        assert_eq!(buf.ref_count(), 2);
        assert!(exposure.buffer().same_memory(&buf));
        let err = alloc.free(buf.clone()).unwrap_err();
        assert!(format!("{err}").contains("exposed"), "got: {err}");
        drop(exposure);
        assert_eq!(buf.window_refs(), 0);
        assert_eq!(buf.ref_count(), 1);
        alloc.free(buf).unwrap();
    }

    #[test]
    fn freed_buffer_cannot_be_exposed() {
        let alloc = Allocator::new();
        let buf = alloc.allocate(8, &Info::null()).unwrap();
        let alias = buf.clone();
        alloc.free(buf).unwrap();
        let err = Exposure::new(&alias).err().unwrap();
        assert_eq!(err.class(), ErrorClass::Arg);
        assert_eq!(alias.window_refs(), 0);
        assert_eq!(alias.ref_count(), 1);
    }
}
