//! shm.rs
//! SysV shared-memory segments keyed by `ftok(directory, id)`.
//!
//! The first process to open a key creates the segment (and zero-fills it); everyone
//! else attaches to the existing one. Detached on drop, never removed implicitly.

use std::{
    ffi::CString,
    io,
    os::unix::ffi::OsStrExt,
    path::PathBuf,
    ptr::{self, NonNull},
};

use log::debug;

use crate::error::{Result, RuntimeError};

/// Identifies one shared-memory segment: a directory plus a single-character id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentKey {
    pub directory: PathBuf,
    pub id: u8,
}

impl SegmentKey {
    pub fn new(directory: impl Into<PathBuf>, id: u8) -> Self {
        Self {
            directory: directory.into(),
            id,
        }
    }

    fn ipc_key(&self) -> Result<libc::key_t> {
        let path = CString::new(self.directory.as_os_str().as_bytes())
            .map_err(|e| self.error("ftok", io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        let key = unsafe { libc::ftok(path.as_ptr(), libc::c_int::from(self.id)) };
        if key == -1 {
            return Err(self.error("ftok", io::Error::last_os_error()));
        }
        Ok(key)
    }

    fn error(&self, op: &'static str, source: io::Error) -> RuntimeError {
        RuntimeError::SharedMemory {
            id: char::from(self.id),
            op,
            source,
        }
    }
}

/// An attached shared-memory segment.
pub struct ShmSegment {
    key: SegmentKey,
    shmid: libc::c_int,
    base: NonNull<u8>,
    len: usize,
    created: bool,
}

// The mapping is plain bytes; synchronisation is the caller's protocol.
unsafe impl Send for ShmSegment {}
unsafe impl Sync for ShmSegment {}

impl ShmSegment {
    /// Creates the segment exclusively, or attaches to it if it already exists.
    pub fn open(key: &SegmentKey, len: usize) -> Result<Self> {
        let ipc_key = key.ipc_key()?;

        let mut created = true;
        let mut shmid =
            unsafe { libc::shmget(ipc_key, len, libc::IPC_CREAT | libc::IPC_EXCL | 0o666) };
        if shmid == -1 {
            // segment probably exists already; attach as a client
            created = false;
            shmid = unsafe { libc::shmget(ipc_key, len, 0) };
            if shmid == -1 {
                return Err(key.error("shmget", io::Error::last_os_error()));
            }
        }

        let addr = unsafe { libc::shmat(shmid, ptr::null(), 0) };
        if addr as isize == -1 {
            return Err(key.error("shmat", io::Error::last_os_error()));
        }
        let base = NonNull::new(addr as *mut u8)
            .ok_or_else(|| key.error("shmat", io::Error::other("null mapping")))?;

        if created {
            unsafe { ptr::write_bytes(base.as_ptr(), 0, len) };
        }

        debug!(
            "[shm] {} segment '{}' ({} bytes, shmid={})",
            if created { "created" } else { "attached" },
            char::from(key.id),
            len,
            shmid
        );

        Ok(Self {
            key: key.clone(),
            shmid,
            base,
            len,
            created,
        })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True if this handle created (and zero-filled) the segment.
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn key(&self) -> &SegmentKey {
        &self.key
    }

    /// Marks the segment for destruction once every process has detached.
    pub fn remove(&self) -> Result<()> {
        let rc = unsafe { libc::shmctl(self.shmid, libc::IPC_RMID, ptr::null_mut()) };
        if rc == -1 {
            return Err(self.key.error("shmctl", io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        unsafe {
            libc::shmdt(self.base.as_ptr() as *const libc::c_void);
        }
    }
}

impl std::fmt::Debug for ShmSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShmSegment")
            .field("key", &self.key)
            .field("shmid", &self.shmid)
            .field("len", &self.len)
            .field("created", &self.created)
            .finish()
    }
}
