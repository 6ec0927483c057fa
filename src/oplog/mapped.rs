//! Read-only whole-file memory mappings of fixed-width record arrays
//!
//! The mapping is a scoped resource: it is created by [`MappedArray::open`]
//! and released either explicitly with [`MappedArray::close`] (which reports
//! `munmap` failures) or on drop. Either way it is released on every exit path,
//! including when a phase fails.

use crate::error::BenchError;
use crate::Result;
use std::fs::File;
use std::marker::PhantomData;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// Marker for types that can be viewed directly from mapped file bytes
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` (or primitive), contain no pointers or
/// padding-sensitive invariants, and accept every bit pattern as a valid
/// value. Their alignment must not exceed the page size.
pub unsafe trait FixedRecord: Copy + Send + Sync + 'static {}

// SAFETY: every bit pattern is a valid u64.
unsafe impl FixedRecord for u64 {}

/// A file mapped as `&[T]`
pub struct MappedArray<T: FixedRecord> {
    ptr: NonNull<T>,
    len: usize,
    map_len: usize,
    path: PathBuf,
    _marker: PhantomData<T>,
}

// SAFETY: the mapping is read-only and owned; sharing `&[T]` across threads is
// as safe as sharing any other immutable slice of `T: Sync`.
unsafe impl<T: FixedRecord> Send for MappedArray<T> {}
unsafe impl<T: FixedRecord> Sync for MappedArray<T> {}

impl<T: FixedRecord> MappedArray<T> {
    /// Map `path` read-only
    ///
    /// # Errors
    ///
    /// - `Resource` if the file cannot be opened, stat'ed or mapped
    /// - `LogFormat` if it is empty or its length is not a multiple of
    ///   `size_of::<T>()`
    pub fn open(path: &Path) -> Result<Self> {
        let record_size = std::mem::size_of::<T>();

        let file = File::open(path)
            .map_err(|e| BenchError::resource(format!("open {}", path.display()), e))?;
        let size = file
            .metadata()
            .map_err(|e| BenchError::resource(format!("stat {}", path.display()), e))?
            .len() as usize;

        if size == 0 {
            return Err(BenchError::LogFormat(format!("{} is empty", path.display())).into());
        }
        if size % record_size != 0 {
            return Err(BenchError::LogFormat(format!(
                "{} is {} bytes, not a multiple of the {}-byte record size",
                path.display(),
                size,
                record_size
            ))
            .into());
        }

        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(BenchError::last_os(format!("mmap {}", path.display())).into());
        }
        // The mapping outlives the descriptor; `file` closes here.

        let ptr = NonNull::new(addr as *mut T)
            .ok_or_else(|| BenchError::LogFormat(format!("mmap {} returned null", path.display())))?;

        tracing::debug!(
            path = %path.display(),
            bytes = size,
            records = size / record_size,
            "mapped log"
        );

        Ok(Self {
            ptr,
            len: size / record_size,
            map_len: size,
            path: path.to_path_buf(),
            _marker: PhantomData,
        })
    }

    pub fn as_slice(&self) -> &[T] {
        // SAFETY: ptr is a live read-only mapping of exactly len * size_of::<T>()
        // bytes, page aligned, and T accepts any bit pattern.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unmap now, reporting failure
    pub fn close(self) -> Result<()> {
        let mut this = std::mem::ManuallyDrop::new(self);
        let result = this.unmap();
        // Drop is skipped, so release the path buffer by hand.
        drop(std::mem::take(&mut this.path));
        result
    }

    fn unmap(&self) -> Result<()> {
        let rc = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.map_len) };
        if rc == -1 {
            return Err(BenchError::last_os(format!("munmap {}", self.path.display())).into());
        }
        Ok(())
    }
}

impl<T: FixedRecord> std::fmt::Debug for MappedArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedArray")
            .field("path", &self.path)
            .field("len", &self.len)
            .field("map_len", &self.map_len)
            .finish()
    }
}

impl<T: FixedRecord> Drop for MappedArray<T> {
    fn drop(&mut self) {
        if let Err(e) = self.unmap() {
            tracing::error!("{:#}", e);
        }
    }
}

impl<T: FixedRecord> std::ops::Deref for MappedArray<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oplog::{writer, OpKind, OperationRecord};
    use std::io::Write;

    #[test]
    fn test_record_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.bin");
        let records: Vec<OperationRecord> = (0..1000u64)
            .map(|i| {
                let kind = OpKind::ALL[(i % 7) as usize];
                OperationRecord::new(kind, i * 3, u64::MAX - i)
            })
            .collect();

        writer::write_records(&path, &records).unwrap();
        let mapped = MappedArray::<OperationRecord>::open(&path).unwrap();
        assert_eq!(mapped.len(), records.len());
        assert_eq!(mapped.as_slice(), records.as_slice());
        mapped.close().unwrap();
    }

    #[test]
    fn test_keys_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.bin");
        let keys: Vec<u64> = (0..513).map(|i| i * i).collect();

        writer::write_keys(&path, &keys).unwrap();
        let mapped = MappedArray::<u64>::open(&path).unwrap();
        assert_eq!(&*mapped, keys.as_slice());
    }

    #[test]
    fn test_misaligned_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 25]).unwrap();
        file.flush().unwrap();

        let err = MappedArray::<OperationRecord>::open(file.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BenchError>(),
            Some(BenchError::LogFormat(_))
        ));
    }

    #[test]
    fn test_empty_file_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = MappedArray::<u64>::open(file.path()).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_missing_file_is_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MappedArray::<u64>::open(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BenchError>(),
            Some(BenchError::Resource { .. })
        ));
    }

    #[test]
    fn test_debug_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.bin");
        writer::write_keys(&path, &[7, 8, 9]).unwrap();

        let mapped = MappedArray::<u64>::open(&path).unwrap();
        let text = format!("{:?}", mapped);
        assert!(text.contains("keys.bin"));
        assert!(text.contains("len: 3"));
        mapped.close().unwrap();

        // the file can be mapped again once closed
        let again = MappedArray::<u64>::open(&path).unwrap();
        assert_eq!(again.path(), path.as_path());
    }
}
