//! Tagged value tree handed to the rules engine.
//!
//! A [`Value`] is one of four kinds: null, string, array or map. Strings are
//! byte spans, either borrowed from the request (the caller vouches that the
//! request outlives the tree) or copied into the [`Arena`]. Arrays and maps
//! own a fixed-capacity run of arena slots plus a live count; capacity is
//! decided up front and never grows.
//!
//! Accessors for a specific kind panic when called on another kind. The tree
//! shape is fully determined by the serializer, so a mismatch is a bug, not
//! input to recover from.
//!
//! # Example
//!
//! ```
//! use inspectgate_core::arena::Arena;
//! use inspectgate_core::value::Value;
//!
//! let arena = Arena::new();
//! let mut root = Value::null();
//! let map = root.make_map(2, &arena);
//! map.push(b"method", Value::string(b"GET"));
//! map.push(b"ip", Value::string_copy(b"10.0.0.1", &arena));
//!
//! assert_eq!(root.as_map().get(b"method").unwrap().as_bytes(), b"GET");
//! ```

use std::fmt;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::arena::Arena;

/// Discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    String,
    Array,
    Map,
}

/// A node of the serialized tree.
#[derive(Default)]
pub enum Value<'a> {
    #[default]
    Null,
    String(&'a [u8]),
    Array(Array<'a>),
    Map(Map<'a>),
}

/// Fixed-capacity arena-backed sequence of values.
pub struct Array<'a> {
    slots: &'a mut [Value<'a>],
    len: usize,
}

/// Fixed-capacity arena-backed sequence of keyed entries.
pub struct Map<'a> {
    slots: &'a mut [Entry<'a>],
    len: usize,
}

/// A map slot: key span plus value.
#[derive(Default)]
pub struct Entry<'a> {
    key: &'a [u8],
    value: Value<'a>,
}

impl<'a> Value<'a> {
    pub fn null() -> Self {
        Value::Null
    }

    /// Borrowed string node.
    pub fn string(bytes: &'a [u8]) -> Self {
        Value::String(bytes)
    }

    /// String node over an arena copy of `bytes`, for sources that do not
    /// outlive the tree (computed values such as the client IP).
    pub fn string_copy(bytes: &[u8], arena: &'a Arena) -> Self {
        Value::String(arena.copy_bytes(bytes))
    }

    pub fn array(capacity: usize, arena: &'a Arena) -> Self {
        Value::Array(Array {
            slots: arena.allocate_objects(capacity),
            len: 0,
        })
    }

    pub fn map(capacity: usize, arena: &'a Arena) -> Self {
        Value::Map(Map {
            slots: arena.allocate_objects(capacity),
            len: 0,
        })
    }

    pub fn make_null(&mut self) {
        *self = Value::Null;
    }

    pub fn make_string(&mut self, bytes: &'a [u8]) {
        *self = Value::String(bytes);
    }

    pub fn make_string_copy(&mut self, bytes: &[u8], arena: &'a Arena) {
        *self = Value::string_copy(bytes, arena);
    }

    /// Turns this node into an empty array of `capacity` slots.
    pub fn make_array(&mut self, capacity: usize, arena: &'a Arena) -> &mut Array<'a> {
        *self = Value::array(capacity, arena);
        self.as_array_mut()
    }

    /// Turns this node into an empty map of `capacity` slots.
    pub fn make_map(&mut self, capacity: usize, arena: &'a Arena) -> &mut Map<'a> {
        *self = Value::map(capacity, arena);
        self.as_map_mut()
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::String(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Map(_) => Kind::Map,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// String contents.
    ///
    /// # Panics
    ///
    /// Panics if the node is not a string.
    pub fn as_bytes(&self) -> &'a [u8] {
        match self {
            Value::String(bytes) => *bytes,
            other => panic!("expected string node, found {:?}", other.kind()),
        }
    }

    /// # Panics
    ///
    /// Panics if the node is not an array.
    pub fn as_array(&self) -> &Array<'a> {
        match self {
            Value::Array(array) => array,
            other => panic!("expected array node, found {:?}", other.kind()),
        }
    }

    /// # Panics
    ///
    /// Panics if the node is not an array.
    pub fn as_array_mut(&mut self) -> &mut Array<'a> {
        match self {
            Value::Array(array) => array,
            other => panic!("expected array node, found {:?}", other.kind()),
        }
    }

    /// # Panics
    ///
    /// Panics if the node is not a map.
    pub fn as_map(&self) -> &Map<'a> {
        match self {
            Value::Map(map) => map,
            other => panic!("expected map node, found {:?}", other.kind()),
        }
    }

    /// # Panics
    ///
    /// Panics if the node is not a map.
    pub fn as_map_mut(&mut self) -> &mut Map<'a> {
        match self {
            Value::Map(map) => map,
            other => panic!("expected map node, found {:?}", other.kind()),
        }
    }
}

impl<'a> Array<'a> {
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot `i` for in-place construction, regardless of the live count.
    ///
    /// # Panics
    ///
    /// Panics if `i >= capacity`.
    pub fn get_entry_unchecked(&mut self, i: usize) -> &mut Value<'a> {
        &mut self.slots[i]
    }

    /// Sets the live count after in-place construction.
    ///
    /// # Panics
    ///
    /// Panics if `len > capacity`.
    pub fn set_len(&mut self, len: usize) {
        assert!(
            len <= self.slots.len(),
            "array live count {len} exceeds capacity {}",
            self.slots.len()
        );
        self.len = len;
    }

    /// Appends a value.
    ///
    /// # Panics
    ///
    /// Panics if the array is already at capacity.
    pub fn push(&mut self, value: Value<'a>) {
        let idx = self.len;
        assert!(idx < self.slots.len(), "array capacity {idx} exhausted");
        self.slots[idx] = value;
        self.len += 1;
    }

    /// Drops every live value; the slots stay allocated.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn get(&self, i: usize) -> Option<&Value<'a>> {
        self.slots[..self.len].get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value<'a>> {
        self.slots[..self.len].iter()
    }
}

impl<'a> Map<'a> {
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot `i` for in-place construction, regardless of the live count.
    ///
    /// # Panics
    ///
    /// Panics if `i >= capacity`.
    pub fn get_entry_unchecked(&mut self, i: usize) -> &mut Entry<'a> {
        &mut self.slots[i]
    }

    /// # Panics
    ///
    /// Panics if `len > capacity`.
    pub fn set_len(&mut self, len: usize) {
        assert!(
            len <= self.slots.len(),
            "map live count {len} exceeds capacity {}",
            self.slots.len()
        );
        self.len = len;
    }

    /// Appends an entry and returns its slot index.
    ///
    /// # Panics
    ///
    /// Panics if the map is already at capacity.
    pub fn push(&mut self, key: &'a [u8], value: Value<'a>) -> usize {
        let idx = self.len;
        assert!(idx < self.slots.len(), "map capacity {idx} exhausted");
        let entry = &mut self.slots[idx];
        entry.key = key;
        entry.value = value;
        self.len += 1;
        idx
    }

    /// Linear lookup of the first live entry with `key`.
    pub fn get(&self, key: &[u8]) -> Option<&Value<'a>> {
        self.entries()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry<'a>> {
        self.slots[..self.len].iter()
    }
}

impl<'a> Entry<'a> {
    pub fn set_key(&mut self, key: &'a [u8]) {
        self.key = key;
    }

    pub fn key(&self) -> &'a [u8] {
        self.key
    }

    pub fn value(&self) -> &Value<'a> {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value<'a> {
        &mut self.value
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::String(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Value::Array(array) => f.debug_list().entries(array.iter()).finish(),
            Value::Map(map) => f
                .debug_map()
                .entries(
                    map.entries()
                        .map(|e| (String::from_utf8_lossy(e.key), &e.value)),
                )
                .finish(),
        }
    }
}

impl fmt::Debug for Array<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl fmt::Debug for Map<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.entries()
                    .map(|e| (String::from_utf8_lossy(e.key), &e.value)),
            )
            .finish()
    }
}

impl fmt::Debug for Entry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &String::from_utf8_lossy(self.key))
            .field("value", &self.value)
            .finish()
    }
}

// Non UTF-8 bytes are replaced with U+FFFD when rendered through serde.
impl Serialize for Value<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::String(bytes) => serializer.serialize_str(&String::from_utf8_lossy(bytes)),
            Value::Array(array) => {
                let mut seq = serializer.serialize_seq(Some(array.len()))?;
                for item in array.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for entry in map.entries() {
                    out.serialize_entry(&String::from_utf8_lossy(entry.key), &entry.value)?;
                }
                out.end()
            }
        }
    }
}
