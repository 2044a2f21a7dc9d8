#![no_std]

const HEAP_SIZE: usize = 4 * 1024 * 1024;

#[global_allocator]
static ALLOCATOR: microheap::Allocator<HEAP_SIZE, 1024> = microheap::Allocator::new();

extern crate alloc;

#[test]
fn vec() {
    let mut v = alloc::vec![1, 2, 3];
    v.push(4);

    assert_eq!((1..=4).collect::<alloc::vec::Vec<_>>(), v);
}

#[test]
fn map_and_formatting() {
    let mut map = alloc::collections::BTreeMap::new();
    map.insert(10, "Hello");
    map.insert(11, "world");
    map.insert(20, "Hallo");
    map.insert(21, "Welt");
    map.insert(-1, "english");
    map.insert(-2, "german");

    let english = alloc::format!("[{}]: {}, {}!", map[&-1], map[&10], map[&11]);
    let german = alloc::format!("[{}]: {}, {}!", map[&-2], map[&20], map[&21]);
    assert_eq!(english, "[english]: Hello, world!");
    assert_eq!(german, "[german]: Hallo, Welt!");
}

#[test]
fn repeated_grow_and_shrink() {
    let mut v = alloc::vec::Vec::with_capacity(4);
    for i in 0..256 {
        v.push(i);
    }
    v.shrink_to_fit();
    assert_eq!(v.len(), 256);
    assert_eq!(v[255], 255);

    v.truncate(8);
    v.shrink_to_fit();
    assert_eq!(v, alloc::vec![0, 1, 2, 3, 4, 5, 6, 7]);
}
