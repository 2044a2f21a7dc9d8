//! This module provides the raw allocator and its support types.
//!
//! A "raw allocator" is one, that simply gets requests for a specific memory
//! size but does not need to worry about locking (that is layered on top by
//! [`Allocator`](crate::Allocator)). Unlike a boundary-tag allocator, this one
//! keeps its block metadata in a fixed-size pool of [`Descriptor`]s, separate
//! from the byte [`Buffer`](buffer::Buffer) that holds user payloads, and
//! tracks three singly-linked lists threaded through that pool: free, used,
//! and fresh (unused) descriptors.
mod buffer;
mod descriptor;

use buffer::Buffer;
use descriptor::{BlockIndex, Descriptor, SPLIT_THRESHOLD};
pub(crate) use descriptor::ALIGN;

#[cfg(feature = "trace")]
use crate::trace::{self, TraceEvent};

/// An error occurred while allocating memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No free block was large enough and the top watermark could not be
    /// advanced to cover the request, or the requested size overflowed
    /// `usize` arithmetic during rounding/multiplication.
    OutOfMemory,
}

/// An error occurred when calling [`RawAllocator::free`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
    /// A double-free was detected: the pointer names a block that is already
    /// on the free list.
    DoubleFreeDetected,
    /// An invalid pointer was freed up (either outside the managed buffer or
    /// not the start address of any live allocation).
    AllocationNotFound,
}

/// A descriptor-pool-based memory allocator for a fixed-size byte buffer.
///
/// `N` is the size in bytes of the managed heap; `MAX_BLOCKS` is the number
/// of block descriptors available, which bounds the number of simultaneous
/// live allocations plus free fragments. Running out of descriptors before
/// running out of bytes manifests as [`AllocError::OutOfMemory`], exactly
/// like running out of bytes does.
pub(crate) struct RawAllocator<const N: usize, const MAX_BLOCKS: usize> {
    buffer: Buffer<N>,
    descriptors: [Descriptor; MAX_BLOCKS],
    free_head: Option<BlockIndex>,
    used_head: Option<BlockIndex>,
    fresh_head: Option<BlockIndex>,
    /// Smallest offset that has never been handed out.
    top: usize,
}

impl<const N: usize, const MAX_BLOCKS: usize> RawAllocator<N, MAX_BLOCKS> {
    /// Create a new [`RawAllocator`] with every descriptor fresh and the heap
    /// otherwise empty.
    ///
    /// # Panics
    /// This function panics if `N` is smaller than one rounding unit or if
    /// `MAX_BLOCKS` is zero.
    pub(crate) const fn new() -> Self {
        assert!(N >= ALIGN, "too small heap memory: minimum size is 16");
        assert!(MAX_BLOCKS >= 1, "need at least one block descriptor");

        let mut descriptors = [Descriptor::fresh(); MAX_BLOCKS];
        let mut i = 0;
        while i < MAX_BLOCKS {
            descriptors[i].next = if i + 1 < MAX_BLOCKS {
                Some(BlockIndex::new(i + 1))
            } else {
                None
            };
            i += 1;
        }

        Self {
            buffer: Buffer::new(),
            descriptors,
            free_head: None,
            used_head: None,
            fresh_head: Some(BlockIndex::new(0)),
            top: 0,
        }
    }

    /// Allocate a block of at least `n` bytes.
    pub(crate) fn alloc(&mut self, n: usize) -> Result<*mut u8, AllocError> {
        let (_, _, ptr) = self.alloc_raw(n).ok_or(AllocError::OutOfMemory)?;
        Ok(ptr)
    }

    /// Allocate `count * size` bytes and zero the entire returned block
    /// (including any unsplit internal slack).
    pub(crate) fn zero_alloc(&mut self, count: usize, size: usize) -> Result<*mut u8, AllocError> {
        let total = count.checked_mul(size).ok_or(AllocError::OutOfMemory)?;
        let (offset, len, ptr) = self.alloc_raw(total).ok_or(AllocError::OutOfMemory)?;
        self.buffer.zero(offset, len);
        Ok(ptr)
    }

    /// Free the allocation starting at `ptr`.
    pub(crate) fn free(&mut self, ptr: *mut u8) -> Result<(), FreeError> {
        let offset = self
            .buffer
            .offset_of(ptr)
            .ok_or(FreeError::AllocationNotFound)?;

        let mut prev = None;
        let mut cur = self.used_head;
        while let Some(idx) = cur {
            let descriptor = self.descriptors[idx.get()];
            if descriptor.addr == offset {
                match prev {
                    Some(p) => self.descriptors[p.get()].next = descriptor.next,
                    None => self.used_head = descriptor.next,
                }
                self.descriptors[idx.get()].next = None;
                self.insert_free(idx);
                self.compact();
                return Ok(());
            }
            prev = Some(idx);
            cur = descriptor.next;
        }

        if self.find_free(offset).is_some() {
            return Err(FreeError::DoubleFreeDetected);
        }
        Err(FreeError::AllocationNotFound)
    }

    /// Resize the allocation at `ptr` to `n` bytes, migrating if necessary.
    ///
    /// Returns `None` both when `n == 0` (the block is freed instead) and
    /// when no replacement block is available; these cases are
    /// indistinguishable at this layer, matching `realloc`'s C contract.
    pub(crate) fn realloc(&mut self, ptr: *mut u8, n: usize) -> Option<*mut u8> {
        if ptr.is_null() {
            return self.alloc(n).ok();
        }
        if n == 0 {
            let _ = self.free(ptr);
            return None;
        }

        let size = self.size_of(ptr);
        if n <= size && size - n <= SPLIT_THRESHOLD {
            return Some(ptr);
        }

        let (new_offset, _, new_ptr) = self.alloc_raw(n)?;
        let copy_len = size.min(n);
        // SAFETY: `ptr` is the caller's old, live allocation (or a foreign
        // pointer, in which case `size == 0` and `copy_len == 0`); `new_ptr`
        // is a block just carved by `alloc_raw`, disjoint from `ptr`.
        unsafe { self.buffer.copy_from(ptr, new_offset, copy_len) };
        let _ = self.free(ptr);
        Some(new_ptr)
    }

    /// The size of the live allocation at `ptr`, or `0` if `ptr` does not
    /// name one.
    pub(crate) fn size_of(&self, ptr: *mut u8) -> usize {
        let Some(offset) = self.buffer.offset_of(ptr) else {
            return 0;
        };
        let mut cur = self.used_head;
        while let Some(idx) = cur {
            let descriptor = self.descriptors[idx.get()];
            if descriptor.addr == offset {
                return descriptor.size;
            }
            cur = descriptor.next;
        }
        0
    }

    pub(crate) fn count_free(&self) -> usize {
        self.count(self.free_head)
    }

    pub(crate) fn count_used(&self) -> usize {
        self.count(self.used_head)
    }

    pub(crate) fn count_fresh(&self) -> usize {
        self.count(self.fresh_head)
    }

    /// `true` iff the three list cardinalities sum to `MAX_BLOCKS`.
    pub(crate) fn check(&self) -> bool {
        self.count_free() + self.count_used() + self.count_fresh() == MAX_BLOCKS
    }

    fn count(&self, mut head: Option<BlockIndex>) -> usize {
        let mut n = 0;
        while let Some(idx) = head {
            n += 1;
            head = self.descriptors[idx.get()].next;
        }
        n
    }

    /// Round `n` up to a multiple of [`ALIGN`], substituting `ALIGN` for a
    /// zero-size request so every allocation has a unique, non-empty
    /// address. Returns `None` on overflow.
    fn round_up(n: usize) -> Option<usize> {
        if n > usize::MAX - (ALIGN - 1) {
            return None;
        }
        let rounded = (n + ALIGN - 1) & !(ALIGN - 1);
        Some(if rounded == 0 { ALIGN } else { rounded })
    }

    /// Claim (or carve) a block of at least `n` bytes and return its offset,
    /// size, and address as a raw pointer.
    fn alloc_raw(&mut self, n: usize) -> Option<(usize, usize, *mut u8)> {
        let idx = self.alloc_block(n)?;
        let descriptor = self.descriptors[idx.get()];
        Some((
            descriptor.addr,
            descriptor.size,
            self.buffer.ptr_at(descriptor.addr),
        ))
    }

    fn alloc_block(&mut self, n: usize) -> Option<BlockIndex> {
        let n = Self::round_up(n)?;
        let region_end = N;
        let top = self.top;

        let mut prev = None;
        let mut cur = self.free_head;
        while let Some(idx) = cur {
            let descriptor = self.descriptors[idx.get()];
            let is_top = descriptor.end() == top && n <= region_end - descriptor.addr;
            if is_top || descriptor.size >= n {
                match prev {
                    Some(p) => self.descriptors[p.get()].next = descriptor.next,
                    None => self.free_head = descriptor.next,
                }
                self.descriptors[idx.get()].next = self.used_head;
                self.used_head = Some(idx);

                if is_top {
                    self.descriptors[idx.get()].size = n;
                    self.top = descriptor.addr + n;
                    #[cfg(feature = "trace")]
                    trace::emit(TraceEvent::ResizeTopBlock(descriptor.addr));
                } else if descriptor.size > n {
                    let excess = descriptor.size - n;
                    if excess >= SPLIT_THRESHOLD {
                        if let Some(fresh_idx) = self.take_fresh() {
                            self.descriptors[idx.get()].size = n;
                            self.descriptors[fresh_idx.get()] = Descriptor {
                                addr: descriptor.addr + n,
                                size: excess,
                                next: None,
                            };
                            #[cfg(feature = "trace")]
                            trace::emit(TraceEvent::Split(descriptor.addr + n));
                            self.insert_free(fresh_idx);
                            self.compact();
                        }
                    }
                }
                return Some(idx);
            }
            prev = Some(idx);
            cur = descriptor.next;
        }

        // No existing free block fit; try to carve fresh space from the top.
        if n <= region_end - top {
            let idx = self.take_fresh()?;
            self.descriptors[idx.get()] = Descriptor {
                addr: top,
                size: n,
                next: self.used_head,
            };
            self.used_head = Some(idx);
            self.top = top + n;
            return Some(idx);
        }
        None
    }

    fn take_fresh(&mut self) -> Option<BlockIndex> {
        let idx = self.fresh_head?;
        self.fresh_head = self.descriptors[idx.get()].next;
        Some(idx)
    }

    fn find_free(&self, addr: usize) -> Option<BlockIndex> {
        let mut cur = self.free_head;
        while let Some(idx) = cur {
            let descriptor = self.descriptors[idx.get()];
            if descriptor.addr == addr {
                return Some(idx);
            }
            cur = descriptor.next;
        }
        None
    }

    /// Insert `idx` into the free list, keeping it sorted by ascending
    /// address (see spec §4.4: walk until the first existing entry whose
    /// `addr` is >= the inserted block's `addr`, then splice).
    fn insert_free(&mut self, idx: BlockIndex) {
        let addr = self.descriptors[idx.get()].addr;

        let mut prev = None;
        let mut cur = self.free_head;
        while let Some(cidx) = cur {
            if self.descriptors[cidx.get()].addr >= addr {
                break;
            }
            prev = Some(cidx);
            cur = self.descriptors[cidx.get()].next;
        }

        self.descriptors[idx.get()].next = cur;
        match prev {
            Some(p) => {
                self.descriptors[p.get()].next = Some(idx);
                #[cfg(feature = "trace")]
                trace::emit(TraceEvent::Insert(addr));
            }
            None => {
                self.free_head = Some(idx);
                #[cfg(feature = "trace")]
                trace::emit(TraceEvent::NewHead(addr));
            }
        }
        #[cfg(feature = "trace")]
        if cur.is_none() {
            trace::emit(TraceEvent::NewTail(addr));
        }
    }

    /// Scan the free list from the head, absorbing every run of
    /// address-adjacent blocks into their lowest-address member and
    /// releasing the absorbed descriptors back to the fresh list (spec
    /// §4.5).
    fn compact(&mut self) {
        let mut ptr = self.free_head;
        while let Some(ptr_idx) = ptr {
            let mut run_end = ptr_idx;
            let mut scan = self.descriptors[ptr_idx.get()].next;
            while let Some(scan_idx) = scan {
                let run_end_descriptor = self.descriptors[run_end.get()];
                let scan_descriptor = self.descriptors[scan_idx.get()];
                if run_end_descriptor.end() == scan_descriptor.addr {
                    #[cfg(feature = "trace")]
                    trace::emit(TraceEvent::Merge(scan_descriptor.addr));
                    run_end = scan_idx;
                    scan = scan_descriptor.next;
                } else {
                    break;
                }
            }

            if run_end != ptr_idx {
                let new_size =
                    self.descriptors[run_end.get()].end() - self.descriptors[ptr_idx.get()].addr;
                let next_after_run = self.descriptors[run_end.get()].next;
                self.descriptors[ptr_idx.get()].size = new_size;
                #[cfg(feature = "trace")]
                trace::emit(TraceEvent::NewSize(new_size));

                let mut release_cur = self.descriptors[ptr_idx.get()].next;
                while release_cur != next_after_run {
                    let released = release_cur.expect("run bounded by next_after_run");
                    release_cur = self.descriptors[released.get()].next;
                    #[cfg(feature = "trace")]
                    trace::emit(TraceEvent::Release(self.descriptors[released.get()].addr));
                    self.descriptors[released.get()].next = self.fresh_head;
                    self.fresh_head = Some(released);
                    self.descriptors[released.get()].addr = 0;
                    self.descriptors[released.get()].size = 0;
                }
                self.descriptors[ptr_idx.get()].next = next_after_run;
            }
            ptr = self.descriptors[ptr_idx.get()].next;
        }
    }
}
