#[test]
fn is_usable_in_const_contexts() {
    const _ALLOCATOR1: microheap::Allocator<32, 4> = microheap::Allocator::new();
    static _ALLOCATOR2: microheap::Allocator<32, 4> = microheap::Allocator::new();
}

#[test]
fn supports_global_alloc() {
    fn assert<T: core::alloc::GlobalAlloc>(_: T) {}
    assert(microheap::Allocator::<64, 4>::new())
}

#[test]
#[should_panic(expected = "too small heap memory")]
fn min_heap_size_of_at_least_16() {
    let _allocator = microheap::Allocator::<4, 4>::new(); // panic here
}

#[test]
#[should_panic(expected = "need at least one block descriptor")]
fn needs_at_least_one_descriptor() {
    let _allocator = microheap::Allocator::<64, 0>::new(); // panic here
}
