//! Simple allocator for embedded systems
//!
//! This crate provides a single type called [`Allocator`]. This type implements
//! the [`core::alloc::GlobalAlloc`]-trait, which is required to use the
//! [`alloc`-crate][alloc] on `#![no_std]`-targets. The allocator provided in
//! this crate is relatively simple, but reliable: its design is simple, so that
//! errors in the implementation are unlikely. Furthermore the crate is tested
//! by (unit) tests running under `miri`, so there shouldn't be any undefined
//! behavior.
//!
//! # Usage
//! The usage is simple: just copy and paste the following code snipped into
//! your binary crate and potentially adjust the number of bytes of the heap
//! (here 4K) and the number of block descriptors (here 64):
//! ```no_run
//! #[global_allocator]
//! static ALLOCATOR: microheap::Allocator<4096, 64> = microheap::Allocator::new();
//!
//! extern crate alloc;
//! ```
//! Afterwards you don't need to interact with the crate or the variable
//! `ALLOCATOR` anymore. Now you can just `use alloc::vec::Vec` or even
//! `use alloc::collections::HashMap`, i.e. every fancy collection which is
//! normally provided by the `std`.
//!
//! The minimal buffer size is `16`, which would allow exactly one allocation
//! of that size at a time. Adjust the size as necessary, e.g. by doing a
//! worst case calculation and potentially adding some backup space of 10%
//! (for example). `MAX_BLOCKS` bounds how many simultaneous live allocations
//! plus free fragments the heap can track; running out of descriptors fails
//! an allocation just like running out of bytes does, so size it generously
//! if your workload churns through many small, short-lived allocations.
//!
//! Note to users with things like `MPU`s, `MMU`s, etc.: your device might
//! support things like memory remapping or memory protection with setting
//! read/write/execution rights. This crate _doesn't use_ those features at all!
//! If that is desired, you should take the address of the buffer and use that
//! along with the known size `N` to protect the heap memory. To users with a
//! fully-working MMU: it is recommended, that you use an allocator, that
//! actually supports paging, etc. This crate might still be helpful, e.g.
//! before setting up the MMU.
//!
//! # Implementation
//! Unlike allocators that store a boundary tag at the front of every block,
//! this one keeps block metadata in a fixed-size pool of descriptors, kept
//! separate from the byte buffer holding user payloads. Each descriptor
//! belongs to exactly one of three singly-linked lists: *free*, *used*, or
//! *fresh* (not yet handed out). A watermark, `top`, tracks the smallest
//! offset that has never been carved from. The basic algorithm is as
//! follows:
//! 1.  We start with an empty heap: no free blocks, no used blocks, every
//!     descriptor fresh, `top = 0`.
//! 2.  A block of 16 bytes is allocated. There is no free block to reuse, so
//!     a fresh descriptor is claimed: `addr = 0, size = 16`, and `top`
//!     advances to 16.
//! 3.  Another block of 16 is allocated the same way: `addr = 16, size = 16`,
//!     `top` advances to 32.
//! 4.  The first block is freed. Its descriptor moves from the used list to
//!     the free list (sorted by address); since no free neighbour is
//!     adjacent to it yet, it stays alone: one free block of 16 at offset 0.
//! 5.  A request for 8 bytes comes in. The free block at offset 0 is large
//!     enough (16 >= 8), but the excess (8 bytes) is below the split
//!     threshold, so the whole 16-byte block is handed back as one
//!     allocation; no new descriptor is consumed.
//! 6.  A request for 64 bytes comes in, larger than any free block and more
//!     than is left below `top`. There is not enough free memory, so the
//!     allocation fails.
//! 7.  The second block (at offset 16) is freed. Since its start address
//!     equals the end address of the free block at offset 0, the two are
//!     coalesced into a single free block of 32 bytes at offset 0, and the
//!     now-unused descriptor is released back to the fresh list.
//! 8.  A request for 32 bytes comes in. The coalesced free block happens to
//!     end exactly at `top`, so it is classified as the *top block*: instead
//!     of being matched by size, its size is simply overwritten to 32 (no
//!     change here) and `top` stays where it is. Had the request been for
//!     less than 32 bytes, the top block would shrink and `top` would move
//!     backwards accordingly — the one case in which `top` is allowed to
//!     decrease.
//!
//! Freeing a block never looks past the byte *after* it to merge unless a
//! free-list scan lands there naturally; because the free list is kept
//! sorted by address, each insertion plus a single forward-coalescing pass
//! is enough to maintain the invariant that no two free blocks are ever
//! address-adjacent.
//!
//! Every returned address is a multiple of 16 bytes, which covers the
//! alignment needs of essentially every Rust type. A [`Layout`] asking for
//! a *stricter* alignment than that (e.g. `#[repr(align(32))]`) cannot be
//! satisfied by this allocator and is rejected by returning a null pointer,
//! rather than silently handing back an under-aligned block.
//!
//! [alloc]: https://doc.rust-lang.org/alloc/index.html
//! [`Layout`]: core::alloc::Layout
#![no_std]
#![cfg_attr(test, allow(clippy::undocumented_unsafe_blocks))]

// Brings `std` back for `#[cfg(test)]` code only (e.g. the `quickcheck`
// property tests in `raw_allocator::tests`, which need `std::vec::Vec`).
// The crate itself stays `no_std` for everything outside `cfg(test)`.
#[cfg(test)]
extern crate std;

mod raw_allocator;
#[cfg(feature = "trace")]
pub mod trace;

use core::alloc::{GlobalAlloc, Layout};
use raw_allocator::RawAllocator;
use spin::mutex::SpinMutex;

pub use raw_allocator::{AllocError, FreeError};

/// The memory allocator for embedded systems.
///
/// This is the core type of this crate: it is an allocator with a predefined
/// heap size `N` (in bytes) and a predefined descriptor pool capacity
/// `MAX_BLOCKS`. Therefore the heap memory usage is statically limited to an
/// upper value, which also helps to prevent issues with heap/stack-smashes,
/// as the heap is counted to the static memory (e.g. `.data`/`.bss`-sections).
/// Such a smash might still happen though, if the stack pointer grows into
/// the heap, but the heap cannot grow into the stack pointer.
///
/// Its usage is simple: just copy and paste the following in the binary
/// crate you're developing. The memory size of the heap is `4096` or 4K and
/// the descriptor pool holds `64` entries in this example. Adjust both
/// values to your needs.
/// ```no_run
/// #[global_allocator]
/// static ALLOCATOR: microheap::Allocator<4096, 64> = microheap::Allocator::new();
/// ```
/// Also please refer to the [crate-level](crate)-documentation for
/// recommendations on sizing `N` and `MAX_BLOCKS`.
pub struct Allocator<const N: usize, const MAX_BLOCKS: usize>(SpinMutex<RawAllocator<N, MAX_BLOCKS>>);

impl<const N: usize, const MAX_BLOCKS: usize> Default for Allocator<N, MAX_BLOCKS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, const MAX_BLOCKS: usize> Allocator<N, MAX_BLOCKS> {
    /// Create a new [`Allocator`].
    ///
    /// This function is a `const fn`, therefore you can call it directly when
    /// creating the allocator.
    ///
    /// Please see the [crate-level](crate)-documentation for recommendations on
    /// sizing `N` and `MAX_BLOCKS`.
    ///
    /// # Panics
    /// This function will panic if the supplied buffer size, i.e. `N`, is
    /// less than `16`, or if `MAX_BLOCKS` is `0`.
    #[must_use = "assign the allocator to a static variable and apply the `#[global_allocator]`-attribute to make it the global allocator"]
    pub const fn new() -> Self {
        assert!(N >= 16, "too small heap memory: minimum size is 16");
        assert!(MAX_BLOCKS >= 1, "need at least one block descriptor");
        Self(SpinMutex::new(RawAllocator::new()))
    }

    /// Number of descriptors currently on the free list.
    pub fn count_free(&self) -> usize {
        self.0.lock().count_free()
    }

    /// Number of descriptors currently backing a live allocation.
    pub fn count_used(&self) -> usize {
        self.0.lock().count_used()
    }

    /// Number of descriptors not yet claimed by any allocation.
    pub fn count_fresh(&self) -> usize {
        self.0.lock().count_fresh()
    }

    /// `true` iff the free, used, and fresh counts sum to `MAX_BLOCKS`.
    ///
    /// This should always hold between calls; it is exposed mainly as a
    /// debug/test assertion hook.
    pub fn check(&self) -> bool {
        self.0.lock().check()
    }
}
unsafe impl<const N: usize, const MAX_BLOCKS: usize> GlobalAlloc for Allocator<N, MAX_BLOCKS> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > raw_allocator::ALIGN {
            return core::ptr::null_mut();
        }
        self.0
            .lock()
            .alloc(layout.size())
            .unwrap_or(core::ptr::null_mut())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        let _ = self.0.lock().free(ptr);
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() > raw_allocator::ALIGN {
            return core::ptr::null_mut();
        }
        self.0
            .lock()
            .zero_alloc(1, layout.size())
            .unwrap_or(core::ptr::null_mut())
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > raw_allocator::ALIGN {
            return core::ptr::null_mut();
        }
        self.0
            .lock()
            .realloc(ptr, new_size)
            .unwrap_or(core::ptr::null_mut())
    }
}
