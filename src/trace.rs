//! Optional diagnostic trace hook (Cargo feature `trace`).
//!
//! The reference design calls two loosely-typed `extern` functions,
//! `print_s`/`print_i`, at every significant list transition (insertion,
//! merge, split, top-block resize, ...). There is no libc-style symbol pair
//! to link against from `#![no_std]` Rust, so this module reimagines the same
//! idea as a typed callback: register a `fn(TraceEvent)` with [`set_hook`]
//! and it is invoked at the same transition points the reference design
//! marks. The hook is purely diagnostic and never load-bearing for
//! correctness: a build with the `trace` feature disabled compiles every
//! call site away.

use spin::mutex::SpinMutex;

/// A transition event reported by the allocator core.
///
/// The payload is the byte offset (within the managed heap) that the
/// transition concerns, mirroring the pointer value the reference design's
/// `print_i` calls alongside each `print_s` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    /// A block was inserted into the free list at a known predecessor.
    Insert(usize),
    /// A block became the new head of the free list.
    NewHead(usize),
    /// A block became the new tail of the free list.
    NewTail(usize),
    /// A descriptor was released back to the fresh list during compaction.
    Release(usize),
    /// Two adjacent free blocks were merged during compaction.
    Merge(usize),
    /// A merged free block's unified size was written back.
    NewSize(usize),
    /// The top block was resized in place to satisfy an allocation.
    ResizeTopBlock(usize),
    /// A free block was split to satisfy an allocation smaller than it.
    Split(usize),
}

static HOOK: SpinMutex<Option<fn(TraceEvent)>> = SpinMutex::new(None);

/// Register a callback to receive [`TraceEvent`]s from every [`Allocator`]
/// in the program (there is a single, process-wide hook, since embedded
/// targets typically have exactly one diagnostic sink, e.g. a UART).
///
/// [`Allocator`]: crate::Allocator
pub fn set_hook(hook: fn(TraceEvent)) {
    *HOOK.lock() = Some(hook);
}

/// Remove any previously registered hook.
pub fn clear_hook() {
    *HOOK.lock() = None;
}

pub(crate) fn emit(event: TraceEvent) {
    if let Some(hook) = *HOOK.lock() {
        hook(event);
    }
}
