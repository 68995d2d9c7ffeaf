//! Per-request bump arena.
//!
//! Every node of the serialized tree lives in an [`Arena`] owned by the
//! request being inspected. Allocations are never freed one by one: the whole
//! arena is dropped (or [`reset`](Arena::reset)) when the request ends, and the
//! borrow checker guarantees no node outlives it.
//!
//! # Example
//!
//! ```
//! use inspectgate_core::arena::Arena;
//!
//! let arena = Arena::new();
//! let lower = arena.lowercase_copy(b"Content-Type");
//! assert_eq!(lower, b"content-type");
//! ```

use bumpalo::Bump;

use crate::defaults;

/// Bump allocator scoped to a single request.
#[derive(Debug, Default)]
pub struct Arena {
    bump: Bump,
}

impl Arena {
    /// Creates an arena with a small initial chunk.
    pub fn new() -> Self {
        Self::with_capacity(defaults::ARENA_INITIAL_CAPACITY)
    }

    /// Creates an arena whose first chunk holds at least `bytes` bytes.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bump: Bump::with_capacity(bytes),
        }
    }

    /// Allocates `n` zero-filled bytes.
    pub fn allocate(&self, n: usize) -> &mut [u8] {
        self.bump.alloc_slice_fill_copy(n, 0u8)
    }

    /// Allocates `count` default-constructed objects in one contiguous run.
    pub fn allocate_objects<T: Default>(&self, count: usize) -> &mut [T] {
        self.bump.alloc_slice_fill_default(count)
    }

    /// Copies `bytes` into the arena.
    pub fn copy_bytes(&self, bytes: &[u8]) -> &[u8] {
        self.bump.alloc_slice_copy(bytes)
    }

    /// Copies `bytes` into the arena, folding ASCII upper case to lower case.
    pub fn lowercase_copy(&self, bytes: &[u8]) -> &[u8] {
        let out = self.bump.alloc_slice_copy(bytes);
        out.make_ascii_lowercase();
        out
    }

    /// Total bytes currently reserved by the arena's chunks.
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    /// Invalidates every allocation at once so the arena can serve the next
    /// request without returning its chunks to the system allocator.
    pub fn reset(&mut self) {
        self.bump.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_is_zeroed() {
        let arena = Arena::new();
        let buf = arena.allocate(16);
        assert_eq!(buf.len(), 16);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_allocate_objects_default() {
        let arena = Arena::new();
        let objs: &mut [Option<u32>] = arena.allocate_objects(4);
        assert_eq!(objs.len(), 4);
        assert!(objs.iter().all(Option::is_none));
    }

    #[test]
    fn test_allocate_zero_objects() {
        let arena = Arena::new();
        let objs: &mut [u64] = arena.allocate_objects(0);
        assert!(objs.is_empty());
    }

    #[test]
    fn test_copies_are_independent_of_source() {
        let arena = Arena::new();
        let mut source = b"Value".to_vec();
        let copy = arena.copy_bytes(&source);
        source[0] = b'X';
        assert_eq!(copy, b"Value");
    }

    #[test]
    fn test_lowercase_copy_leaves_non_ascii_alone() {
        let arena = Arena::new();
        assert_eq!(arena.lowercase_copy(b"X-Custom-IP"), b"x-custom-ip");
        assert_eq!(arena.lowercase_copy("ÀB".as_bytes()), "Àb".as_bytes());
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let arena = Arena::with_capacity(16);
        let big = arena.allocate(64 * 1024);
        assert_eq!(big.len(), 64 * 1024);
        assert!(arena.allocated_bytes() >= 64 * 1024);
    }

    #[test]
    fn test_reset_allows_reuse() {
        let mut arena = Arena::new();
        arena.allocate(1024);
        arena.reset();
        let after = arena.copy_bytes(b"fresh");
        assert_eq!(after, b"fresh");
    }
}
