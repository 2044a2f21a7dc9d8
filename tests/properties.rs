//! Property-based tests for the descriptor-pool invariants, driven by
//! `quickcheck` over arbitrary sequences of allocate/free/realloc
//! operations run through the public `GlobalAlloc` surface.

use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use std::alloc::{GlobalAlloc, Layout};

const HEAP: usize = 1 << 16;
const MAX_BLOCKS: usize = 256;

#[derive(Debug, Clone, Copy)]
enum Op {
    Alloc(u16),
    Free(u8),
    Realloc(u8, u16),
}

impl Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
        match u8::arbitrary(g) % 3 {
            0 => Op::Alloc(u16::arbitrary(g) % 512 + 1),
            1 => Op::Free(u8::arbitrary(g)),
            _ => Op::Realloc(u8::arbitrary(g), u16::arbitrary(g) % 512 + 1),
        }
    }
}

fn layout_of(n: usize) -> Layout {
    Layout::from_size_align(n, 1).unwrap()
}

/// Sum law (spec invariant 1) holds between every public operation, for
/// any mix of allocate/free/realloc.
#[quickcheck]
fn sum_of_list_lengths_stays_max_blocks(ops: Vec<Op>) -> bool {
    let allocator = microheap::Allocator::<HEAP, MAX_BLOCKS>::new();
    let mut live: Vec<(*mut u8, Layout)> = Vec::new();

    for op in ops {
        match op {
            Op::Alloc(n) => {
                let layout = layout_of(n as usize);
                let ptr = unsafe { allocator.alloc(layout) };
                if !ptr.is_null() {
                    live.push((ptr, layout));
                }
            }
            Op::Free(idx) if !live.is_empty() => {
                let (ptr, layout) = live.remove(idx as usize % live.len());
                unsafe { allocator.dealloc(ptr, layout) };
            }
            Op::Realloc(idx, n) if !live.is_empty() => {
                let i = idx as usize % live.len();
                let (ptr, layout) = live[i];
                let new_size = n as usize;
                let new_ptr = unsafe { allocator.realloc(ptr, layout, new_size) };
                if !new_ptr.is_null() {
                    live[i] = (new_ptr, layout_of(new_size));
                }
            }
            Op::Free(_) | Op::Realloc(..) => {}
        }

        if !allocator.check() {
            return false;
        }
    }

    for (ptr, layout) in live {
        unsafe { allocator.dealloc(ptr, layout) };
    }
    true
}

/// Disjointness (spec invariant 5/§8): no two live allocations ever
/// overlap, checked by writing a unique byte pattern into each one and
/// re-reading it after further allocations have happened around it.
#[quickcheck]
fn live_allocations_never_overlap(sizes: Vec<u16>) -> bool {
    let allocator = microheap::Allocator::<HEAP, MAX_BLOCKS>::new();
    let mut live = Vec::new();

    for (tag, n) in sizes.into_iter().enumerate() {
        let n = (n as usize) % 512 + 1;
        let layout = layout_of(n);
        let ptr = unsafe { allocator.alloc(layout) };
        if ptr.is_null() {
            continue;
        }
        let byte = (tag % 256) as u8;
        unsafe { core::ptr::write_bytes(ptr, byte, n) };
        live.push((ptr, layout, byte));
    }

    let ok = live
        .iter()
        .all(|&(ptr, layout, byte)| {
            let slice = unsafe { core::slice::from_raw_parts(ptr, layout.size()) };
            slice.iter().all(|&b| b == byte)
        });

    for (ptr, layout, _) in live {
        unsafe { allocator.dealloc(ptr, layout) };
    }
    ok
}

/// Alignment (spec invariant 7): every live allocation's address is a
/// multiple of the crate's rounding unit, regardless of requested size.
#[quickcheck]
fn every_live_allocation_is_aligned(sizes: Vec<u16>) -> bool {
    let allocator = microheap::Allocator::<HEAP, MAX_BLOCKS>::new();
    let mut ok = true;

    for n in sizes {
        let layout = layout_of((n as usize) % 512 + 1);
        let ptr = unsafe { allocator.alloc(layout) };
        if !ptr.is_null() {
            ok &= (ptr as usize) % 16 == 0;
            unsafe { allocator.dealloc(ptr, layout) };
        }
    }
    ok
}

/// Calloc zeroing (spec §4.6/§8): every byte of a zero-allocated block is
/// zero, including any unsplit internal slack past the requested size.
#[quickcheck]
fn zero_allocate_result_is_all_zero(size: u16) -> bool {
    let allocator = microheap::Allocator::<HEAP, MAX_BLOCKS>::new();
    let n = (size as usize) % 512 + 1;
    let layout = layout_of(n);

    let ptr = unsafe { allocator.alloc_zeroed(layout) };
    if ptr.is_null() {
        return true;
    }
    let ok = unsafe { core::slice::from_raw_parts(ptr, n) }
        .iter()
        .all(|&b| b == 0);
    unsafe { allocator.dealloc(ptr, layout) };
    ok
}

/// Realloc content preservation (spec §4.8/§8): growing an allocation
/// preserves every byte of the original region.
#[quickcheck]
fn realloc_preserves_prefix_on_growth(initial: u16, grow_by: u16) -> bool {
    let allocator = microheap::Allocator::<HEAP, MAX_BLOCKS>::new();
    let n = (initial as usize) % 512 + 1;
    let layout = layout_of(n);

    let ptr = unsafe { allocator.alloc(layout) };
    if ptr.is_null() {
        return true;
    }
    unsafe { core::ptr::write_bytes(ptr, 0xAB, n) };

    let new_size = n + (grow_by as usize) % 512 + 1;
    let new_ptr = unsafe { allocator.realloc(ptr, layout, new_size) };
    if new_ptr.is_null() {
        unsafe { allocator.dealloc(ptr, layout) };
        return true;
    }
    let ok = unsafe { core::slice::from_raw_parts(new_ptr, n) }
        .iter()
        .all(|&b| b == 0xAB);
    unsafe { allocator.dealloc(new_ptr, layout_of(new_size)) };
    ok
}

/// Idempotent free (spec §8): freeing the same pointer twice in a row
/// succeeds once then is reported as a double free, without corrupting
/// the three-list invariant.
#[test]
fn double_free_is_reported_after_first_free_succeeds() {
    let allocator = microheap::Allocator::<4096, 16>::new();
    let layout = layout_of(32);
    let ptr = unsafe { allocator.alloc(layout) };
    assert!(!ptr.is_null());

    unsafe { allocator.dealloc(ptr, layout) };
    assert!(allocator.check());
    // A second `dealloc` of the same pointer is the `GlobalAlloc`-layer
    // equivalent of a double free; the raw allocator reports it as
    // `FreeError::DoubleFreeDetected`, but `GlobalAlloc::dealloc` has no
    // return value to surface it through, so we only assert it doesn't
    // corrupt the list invariant.
    unsafe { allocator.dealloc(ptr, layout) };
    assert!(allocator.check());
}

/// A `Layout` asking for an alignment stricter than the crate's fixed
/// 16-byte rounding unit cannot be honored by this allocator and must be
/// rejected with a null pointer rather than silently under-aligned.
#[test]
fn over_aligned_layout_is_rejected() {
    let allocator = microheap::Allocator::<4096, 16>::new();
    let layout = Layout::from_size_align(32, 32).unwrap();

    assert!(unsafe { allocator.alloc(layout) }.is_null());
    assert!(unsafe { allocator.alloc_zeroed(layout) }.is_null());

    let base = layout_of(16);
    let ptr = unsafe { allocator.alloc(base) };
    assert!(!ptr.is_null());
    // `realloc`'s alignment guard runs before it ever touches `ptr`, so
    // passing the over-aligned `layout` here only exercises that guard.
    assert!(unsafe { allocator.realloc(ptr, layout, 64) }.is_null());
    unsafe { allocator.dealloc(ptr, base) };
}

/// Alignment requests at or below the rounding unit are honored normally.
#[test]
fn exactly_aligned_layout_still_succeeds() {
    let allocator = microheap::Allocator::<4096, 16>::new();
    let layout = Layout::from_size_align(32, 16).unwrap();
    let ptr = unsafe { allocator.alloc(layout) };
    assert!(!ptr.is_null());
    assert_eq!(ptr as usize % 16, 0);
    unsafe { allocator.dealloc(ptr, layout) };
}
