//! ring_buffer.rs
//! Overwrite-oldest circular buffer of fixed-size messages, shared between processes.
//!
//! Layout (identical for shared memory and the in-process heap variant):
//!
//! ```text
//! +-----------------+-------+-------+----------------+-----+------------------+
//! | has_valid_entry | begin |  end  | slot 0 (SIZE)  | ... | slot N-1 (SIZE)  |
//! |      u32        |  u32  |  u32  |                |     |                  |
//! +-----------------+-------+-------+----------------+-----+------------------+
//! ```
//!
//! Exactly one process writes a given buffer; any number read. There is no lock
//! between them: a reader may observe a slot mid-write. Readers always copy the most
//! recently written slot (`end`), never replay older ones.

use std::{
    marker::PhantomData,
    mem,
    ptr::{self, NonNull},
    slice,
    sync::{
        Arc,
        atomic::{Ordering, fence},
    },
};

use log::debug;

use crate::error::{Result, RuntimeError};
use crate::transport::{
    messages::WireMessage,
    shm::{SegmentKey, ShmSegment},
};

#[repr(C)]
struct RingHeader {
    has_valid_entry: u32,
    begin: u32,
    end: u32,
}

const HEADER_SIZE: usize = mem::size_of::<RingHeader>();

/// Word-aligned private allocation used by `RingBuffer::in_process`.
struct HeapRegion {
    ptr: NonNull<u32>,
    words: usize,
}

impl HeapRegion {
    fn zeroed(len: usize) -> Self {
        let words = len.div_ceil(mem::size_of::<u32>()).max(1);
        let boxed: Box<[u32]> = vec![0u32; words].into_boxed_slice();
        let ptr = NonNull::from(Box::leak(boxed)).cast::<u32>();
        Self { ptr, words }
    }
}

impl Drop for HeapRegion {
    fn drop(&mut self) {
        unsafe {
            drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
                self.ptr.as_ptr(),
                self.words,
            )));
        }
    }
}

enum Region {
    Shared(ShmSegment),
    Heap(HeapRegion),
}

// Both variants are raw byte regions; access follows the single-writer protocol above.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    fn base(&self) -> *mut u8 {
        match self {
            Region::Shared(seg) => seg.as_ptr(),
            Region::Heap(heap) => heap.ptr.as_ptr() as *mut u8,
        }
    }
}

/// Handle to one ring buffer. Cloning yields another handle onto the same storage.
pub struct RingBuffer<M: WireMessage> {
    region: Arc<Region>,
    capacity: usize,
    _marker: PhantomData<fn() -> M>,
}

impl<M: WireMessage> Clone for RingBuffer<M> {
    fn clone(&self) -> Self {
        Self {
            region: self.region.clone(),
            capacity: self.capacity,
            _marker: PhantomData,
        }
    }
}

impl<M: WireMessage> RingBuffer<M> {
    /// Bytes needed for a buffer of `capacity` slots.
    pub const fn byte_len(capacity: usize) -> usize {
        HEADER_SIZE + capacity * M::SIZE
    }

    /// Opens the buffer as its (single) writer: attach or create, then invalidate
    /// whatever a previous writer left behind.
    pub fn open_writer(key: &SegmentKey, capacity: usize) -> Result<Self> {
        let rb = Self::attach(key, capacity)?;
        rb.reset();
        Ok(rb)
    }

    /// Opens the buffer as a reader. State is only zeroed if this call created it.
    pub fn open_reader(key: &SegmentKey, capacity: usize) -> Result<Self> {
        Self::attach(key, capacity)
    }

    /// A private, heap-backed buffer with the same protocol. Clones share it.
    pub fn in_process(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RuntimeError::InvalidCapacity(capacity));
        }
        Ok(Self {
            region: Arc::new(Region::Heap(HeapRegion::zeroed(Self::byte_len(capacity)))),
            capacity,
            _marker: PhantomData,
        })
    }

    fn attach(key: &SegmentKey, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RuntimeError::InvalidCapacity(capacity));
        }
        let segment = ShmSegment::open(key, Self::byte_len(capacity))?;
        Ok(Self {
            region: Arc::new(Region::Shared(segment)),
            capacity,
            _marker: PhantomData,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Marks no slot as meaningful.
    pub fn reset(&self) {
        unsafe {
            ptr::write_volatile(ptr::addr_of_mut!((*self.header()).has_valid_entry), 0);
        }
    }

    /// Stores `msg`, overwriting the oldest slot once all slots are in use.
    pub fn write(&self, msg: &M) {
        let h = self.header();
        unsafe {
            let valid = ptr::addr_of_mut!((*h).has_valid_entry);
            let begin = ptr::addr_of_mut!((*h).begin);
            let end = ptr::addr_of_mut!((*h).end);

            if ptr::read_volatile(valid) != 1 {
                msg.encode(self.slot_mut(0));
                ptr::write_volatile(begin, 0);
                ptr::write_volatile(end, 0);
                fence(Ordering::Release);
                ptr::write_volatile(valid, 1);
                return;
            }

            let n = self.capacity as u32;
            let next = (ptr::read_volatile(end) + 1) % n;
            if next == ptr::read_volatile(begin) {
                ptr::write_volatile(begin, (next + 1) % n);
            }
            msg.encode(self.slot_mut(next as usize));
            fence(Ordering::Release);
            ptr::write_volatile(end, next);
        }
    }

    /// Most recent message, or `None` (NO_DATA) if nothing was written since the
    /// writer opened the buffer.
    pub fn read(&self) -> Option<M> {
        let (_, end) = self.window()?;
        self.read_slot(end)
    }

    /// Every retained message, oldest first.
    pub fn snapshot(&self) -> Vec<M> {
        let Some((begin, end)) = self.window() else {
            return Vec::new();
        };
        let count = (end + self.capacity - begin) % self.capacity + 1;
        (0..count)
            .filter_map(|i| self.read_slot((begin + i) % self.capacity))
            .collect()
    }

    /// `(begin, end)` slot indices, or `None` while there is no valid entry.
    pub fn window(&self) -> Option<(usize, usize)> {
        let h = self.header();
        let (valid, begin, end) = unsafe {
            let valid = ptr::read_volatile(ptr::addr_of!((*h).has_valid_entry));
            fence(Ordering::Acquire);
            (
                valid,
                ptr::read_volatile(ptr::addr_of!((*h).begin)) as usize,
                ptr::read_volatile(ptr::addr_of!((*h).end)) as usize,
            )
        };
        if valid != 1 {
            return None;
        }
        if begin >= self.capacity || end >= self.capacity {
            // written by a peer configured with a different capacity
            debug!("[ring] header out of range: begin={} end={}", begin, end);
            return None;
        }
        Some((begin, end))
    }

    /// Marks the backing shared-memory segment for removal. No-op for heap buffers.
    pub fn remove_segment(&self) -> Result<()> {
        match self.region.as_ref() {
            Region::Shared(seg) => seg.remove(),
            Region::Heap(_) => Ok(()),
        }
    }

    fn header(&self) -> *mut RingHeader {
        self.region.base() as *mut RingHeader
    }

    fn slot_ptr(&self, index: usize) -> *mut u8 {
        debug_assert!(index < self.capacity);
        unsafe { self.region.base().add(HEADER_SIZE + index * M::SIZE) }
    }

    #[allow(clippy::mut_from_ref)]
    unsafe fn slot_mut(&self, index: usize) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.slot_ptr(index), M::SIZE) }
    }

    fn read_slot(&self, index: usize) -> Option<M> {
        let mut buf = vec![0u8; M::SIZE];
        unsafe {
            ptr::copy_nonoverlapping(self.slot_ptr(index), buf.as_mut_ptr(), M::SIZE);
        }
        M::decode(&buf).ok()
    }
}
