//! Host-side view of one HTTP transaction.
//!
//! The inspection code does not read hyper types directly: the host copies
//! what it needs into a [`RequestState`] when request headers are ready and a
//! [`ResponseState`] once the upstream response is known. Header records keep
//! insertion order, original key case and a hash marker; a zero hash marks a
//! record that was removed while other filters may still refer to its slot.

use std::net::SocketAddr;

use bytes::Bytes;
use hyper::HeaderMap;
use hyper::http::{request, response};

/// Case-insensitive header-name hash (`h = h * 31 + lowercase(byte)`).
///
/// Never returns zero, which is reserved for deleted records.
pub fn header_hash(name: &[u8]) -> u32 {
    let hash = name.iter().fold(0u32, |h, b| {
        h.wrapping_mul(31).wrapping_add(u32::from(b.to_ascii_lowercase()))
    });
    if hash == 0 { 1 } else { hash }
}

/// One header as the host stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    hash: u32,
    key: Bytes,
    value: Bytes,
}

impl HeaderRecord {
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        let key = key.into();
        Self {
            hash: header_hash(&key),
            key,
            value: value.into(),
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn is_deleted(&self) -> bool {
        self.hash == 0
    }

    /// Case-insensitive name comparison.
    pub fn is_named(&self, name: &[u8]) -> bool {
        self.key.eq_ignore_ascii_case(name)
    }
}

/// Ordered header records, duplicates allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    records: Vec<HeaderRecord>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.records.push(HeaderRecord::new(key, value));
    }

    /// Marks every live record named `name` as deleted without moving any
    /// slot. Returns how many records were marked.
    pub fn remove(&mut self, name: &[u8]) -> usize {
        let mut removed = 0;
        for record in self.records.iter_mut() {
            if !record.is_deleted() && record.is_named(name) {
                record.hash = 0;
                removed += 1;
            }
        }
        removed
    }

    /// First live record named `name`.
    pub fn get(&self, name: &[u8]) -> Option<&HeaderRecord> {
        self.live().find(|record| record.is_named(name))
    }

    /// First live record matching a precomputed hash and lower-case name.
    pub fn get_hashed(&self, hash: u32, lowercase_name: &[u8]) -> Option<&HeaderRecord> {
        self.live()
            .find(|record| record.hash == hash && record.is_named(lowercase_name))
    }

    /// Every live record matching a precomputed hash and lower-case name.
    pub fn get_all_hashed<'s>(
        &'s self,
        hash: u32,
        lowercase_name: &'s [u8],
    ) -> impl Iterator<Item = &'s HeaderRecord> + 's {
        self.live()
            .filter(move |record| record.hash == hash && record.is_named(lowercase_name))
    }

    /// Every live record named `name`, in order.
    pub fn get_all<'s>(&'s self, name: &'s [u8]) -> impl Iterator<Item = &'s HeaderRecord> + 's {
        self.live().filter(move |record| record.is_named(name))
    }

    /// All records, including deleted ones.
    pub fn records(&self) -> &[HeaderRecord] {
        &self.records
    }

    fn live(&self) -> impl Iterator<Item = &HeaderRecord> {
        self.records.iter().filter(|record| !record.is_deleted())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<&HeaderMap> for HeaderList {
    fn from(map: &HeaderMap) -> Self {
        let mut list = HeaderList::new();
        for (name, value) in map.iter() {
            list.push(
                Bytes::copy_from_slice(name.as_str().as_bytes()),
                Bytes::copy_from_slice(value.as_bytes()),
            );
        }
        list
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderList
where
    K: Into<Bytes>,
    V: Into<Bytes>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut list = HeaderList::new();
        for (key, value) in iter {
            list.push(key, value);
        }
        list
    }
}

/// Request attributes captured when request headers are ready.
#[derive(Debug, Clone, Default)]
pub struct RequestState {
    pub method: Bytes,
    pub unparsed_uri: Bytes,
    pub query: Bytes,
    pub headers: HeaderList,
    pub peer_addr: Option<SocketAddr>,
}

impl RequestState {
    /// Captures a hyper request head.
    pub fn from_parts(parts: &request::Parts, peer_addr: Option<SocketAddr>) -> Self {
        let unparsed_uri = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.to_string(), |pq| pq.as_str().to_string());

        Self {
            method: Bytes::copy_from_slice(parts.method.as_str().as_bytes()),
            unparsed_uri: Bytes::from(unparsed_uri),
            query: parts
                .uri
                .query()
                .map(|q| Bytes::copy_from_slice(q.as_bytes()))
                .unwrap_or_default(),
            headers: HeaderList::from(&parts.headers),
            peer_addr,
        }
    }

    /// `Accept` value, if the client sent one.
    pub fn accept(&self) -> Option<&[u8]> {
        self.headers
            .get(crate::headers::ACCEPT.as_bytes())
            .map(HeaderRecord::value)
    }
}

/// Response attributes captured once the response head is known.
#[derive(Debug, Clone, Default)]
pub struct ResponseState {
    /// Status code; `0` when the host has not set one.
    pub status: u16,
    pub headers: HeaderList,
}

impl ResponseState {
    pub fn from_parts(parts: &response::Parts) -> Self {
        Self {
            status: parts.status.as_u16(),
            headers: HeaderList::from(&parts.headers),
        }
    }
}
