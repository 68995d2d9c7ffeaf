//! Multiplicity-aware map construction from a [`KeyValueSource`].
//!
//! The tree has no growable containers, so the collector runs in two passes:
//!
//! 1. count the occurrences of every key (delete markers included, since the
//!    writes that preceded a delete still need a slot);
//! 2. rewind and fill a map of exactly `distinct keys` entries. A key seen
//!    once becomes a scalar string; a key seen more often becomes an array
//!    sized to its count. A delete marker empties that key's array.

use std::collections::HashMap;

use crate::arena::Arena;
use crate::kv_iter::KeyValueSource;
use crate::value::Value;

/// Turns `slot` into a map built from every pair of `source`.
///
/// `source` may be in any position; it is reset before each pass.
///
/// # Example
///
/// ```
/// use inspectgate_core::arena::Arena;
/// use inspectgate_core::collector::set_value_from_iter;
/// use inspectgate_core::kv_iter::QueryStringIter;
/// use inspectgate_core::value::Value;
///
/// let arena = Arena::new();
/// let mut slot = Value::null();
/// let mut it = QueryStringIter::query(b"a=1&a=2&b=3", &arena);
/// set_value_from_iter(&mut it, &mut slot, &arena);
///
/// let map = slot.as_map();
/// assert_eq!(map.get(b"a").unwrap().as_array().len(), 2);
/// assert_eq!(map.get(b"b").unwrap().as_bytes(), b"3");
/// ```
pub fn set_value_from_iter<'a, S>(source: &mut S, slot: &mut Value<'a>, arena: &'a Arena)
where
    S: KeyValueSource<'a>,
{
    let mut counts: HashMap<&'a [u8], usize> = HashMap::new();
    source.reset();
    while !source.ended() {
        *counts.entry(source.current_key()).or_insert(0) += 1;
        source.advance();
    }

    let map = slot.make_map(counts.len(), arena);

    // map slot index of every key that occurs more than once
    let mut indexed: HashMap<&'a [u8], usize> = HashMap::new();
    source.reset();
    while !source.ended() {
        let deleted = source.is_delete();
        let (key, value) = source.current();
        let occurrences = counts.get(key).copied().unwrap_or(1);

        if occurrences == 1 {
            let node = if deleted {
                Value::null()
            } else {
                Value::string(value)
            };
            map.push(key, node);
        } else if let Some(&idx) = indexed.get(key) {
            let array = map.get_entry_unchecked(idx).value_mut().as_array_mut();
            if deleted {
                array.clear();
            } else {
                array.push(Value::string(value));
            }
        } else {
            let mut node = Value::array(occurrences, arena);
            if !deleted {
                node.as_array_mut().push(Value::string(value));
            }
            let idx = map.push(key, node);
            indexed.insert(key, idx);
        }

        source.advance();
    }
}
