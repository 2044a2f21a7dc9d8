//! The block descriptor record and the pool index type used to link it into
//! whichever of the free, used, or fresh lists currently owns it.

/// Rounding unit for every live allocation's address and size.
///
/// The reference design takes this as a runtime parameter; here it is fixed
/// at compile time (like the teacher crate's own 4-byte `Entry` rounding) to
/// a width that covers the alignment needs of `u128`/`f64`/pointer pairs.
pub(crate) const ALIGN: usize = 16;

/// Minimum excess, in bytes, required to carve a free remainder instead of
/// leaving it as internal slack of the returned allocation.
pub(crate) const SPLIT_THRESHOLD: usize = 2 * ALIGN;

/// Index of a [`Descriptor`] inside a `RawAllocator`'s fixed descriptor pool.
///
/// This plays the role the reference design gives a raw `Block *`, but as a
/// plain array index: the descriptor pool never moves or reallocates, so an
/// index is as stable as a pointer would be, without the provenance
/// questions of fabricating one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockIndex(usize);

impl BlockIndex {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    pub(crate) const fn get(self) -> usize {
        self.0
    }
}

/// A single block descriptor: the address/size/successor record tracked in
/// exactly one of the free, used, or fresh lists at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Descriptor {
    /// Byte offset into the managed buffer, or `0` for a fresh descriptor.
    pub(crate) addr: usize,
    /// Length of the labelled region, or `0` for a fresh descriptor.
    pub(crate) size: usize,
    /// Successor in whichever list this descriptor currently belongs to.
    pub(crate) next: Option<BlockIndex>,
}

impl Descriptor {
    /// A blank descriptor, as held by the fresh list.
    pub(crate) const fn fresh() -> Self {
        Self {
            addr: 0,
            size: 0,
            next: None,
        }
    }

    /// The first offset past this descriptor's region.
    pub(crate) const fn end(&self) -> usize {
        self.addr + self.size
    }
}
