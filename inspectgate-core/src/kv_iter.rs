//! Key/value sources feeding the collector.
//!
//! Query strings, cookie headers, request headers and response headers all
//! look the same to [`collector::set_value_from_iter`](crate::collector::set_value_from_iter):
//! a resettable cursor over `(key, value)` byte pairs. Response headers may
//! additionally report a pair as deleted.

use std::collections::HashMap;

use crate::arena::Arena;
use crate::transaction::HeaderRecord;

/// Resettable cursor over key/value pairs whose bytes live at least as long
/// as `'a`.
pub trait KeyValueSource<'a> {
    /// Rewinds to the first pair.
    fn reset(&mut self);

    fn ended(&self) -> bool;

    /// Moves to the next pair. Must not be called once [`ended`](Self::ended).
    fn advance(&mut self);

    fn current_key(&mut self) -> &'a [u8];

    fn current(&mut self) -> (&'a [u8], &'a [u8]);

    /// Whether the current pair is a delete marker.
    fn is_delete(&self) -> bool {
        false
    }
}

/// Whether surrounding whitespace is stripped from keys and values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimMode {
    NoTrim,
    Trim,
}

/// Splits `k1=v1<sep>k2=v2...` into pairs.
///
/// Segments without `=` yield an empty value; empty segments are skipped.
/// Percent escapes are decoded into the arena, and for query strings `+`
/// decodes to a space. Spans without anything to decode are borrowed.
pub struct QueryStringIter<'a> {
    input: &'a [u8],
    arena: &'a Arena,
    separator: u8,
    trim: TrimMode,
    plus_as_space: bool,
    segment: Option<(usize, usize)>,
    next: usize,
}

impl<'a> QueryStringIter<'a> {
    pub fn new(input: &'a [u8], arena: &'a Arena, separator: u8, trim: TrimMode) -> Self {
        let mut iter = Self {
            input,
            arena,
            separator,
            trim,
            plus_as_space: separator == b'&',
            segment: None,
            next: 0,
        };
        iter.seek(0);
        iter
    }

    /// Iterator over a URL query string (`&`-separated, untrimmed).
    pub fn query(input: &'a [u8], arena: &'a Arena) -> Self {
        Self::new(input, arena, b'&', TrimMode::NoTrim)
    }

    /// Iterator over a `Cookie` header value (`;`-separated, trimmed).
    pub fn cookie(input: &'a [u8], arena: &'a Arena) -> Self {
        Self::new(input, arena, b';', TrimMode::Trim)
    }

    fn seek(&mut self, mut from: usize) {
        let input = self.input;
        while from <= input.len() {
            let rest = &input[from..];
            let len = rest
                .iter()
                .position(|&b| b == self.separator)
                .unwrap_or(rest.len());
            let next = from + len + 1;
            if !self.trimmed(&rest[..len]).is_empty() {
                self.segment = Some((from, from + len));
                self.next = next;
                return;
            }
            from = next;
        }
        self.segment = None;
    }

    fn trimmed(&self, bytes: &'a [u8]) -> &'a [u8] {
        match self.trim {
            TrimMode::NoTrim => bytes,
            TrimMode::Trim => bytes.trim_ascii(),
        }
    }

    fn raw_pair(&self) -> (&'a [u8], &'a [u8]) {
        let (start, end) = self
            .segment
            .expect("query string iterator read past its end");
        let input = self.input;
        let segment = &input[start..end];
        match segment.iter().position(|&b| b == b'=') {
            Some(eq) => (
                self.trimmed(&segment[..eq]),
                self.trimmed(&segment[eq + 1..]),
            ),
            None => (self.trimmed(segment), &segment[segment.len()..]),
        }
    }
}

impl<'a> KeyValueSource<'a> for QueryStringIter<'a> {
    fn reset(&mut self) {
        self.seek(0);
    }

    fn ended(&self) -> bool {
        self.segment.is_none()
    }

    fn advance(&mut self) {
        self.seek(self.next);
    }

    fn current_key(&mut self) -> &'a [u8] {
        let (key, _) = self.raw_pair();
        percent_decode(key, self.plus_as_space, self.arena)
    }

    fn current(&mut self) -> (&'a [u8], &'a [u8]) {
        let (key, value) = self.raw_pair();
        (
            percent_decode(key, self.plus_as_space, self.arena),
            percent_decode(value, self.plus_as_space, self.arena),
        )
    }
}

/// Decodes `%XX` escapes (and `+` when `plus_as_space`) into the arena.
///
/// Malformed escapes are kept verbatim. Input with nothing to decode is
/// returned as-is.
pub fn percent_decode<'a>(input: &'a [u8], plus_as_space: bool, arena: &'a Arena) -> &'a [u8] {
    let needs_decoding = input
        .iter()
        .any(|&b| b == b'%' || (plus_as_space && b == b'+'));
    if !needs_decoding {
        return input;
    }

    let out = arena.allocate(input.len());
    let mut written = 0;
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        if b == b'%'
            && let (Some(hi), Some(lo)) = (
                input.get(i + 1).and_then(|&c| hex_value(c)),
                input.get(i + 2).and_then(|&c| hex_value(c)),
            )
        {
            out[written] = hi << 4 | lo;
            i += 3;
        } else {
            out[written] = if plus_as_space && b == b'+' { b' ' } else { b };
            i += 1;
        }
        written += 1;
    }

    let out: &'a [u8] = out;
    &out[..written]
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Chains several sources into one sequence, e.g. one query-string iterator
/// per repeated `Cookie` header.
pub struct AggregateIter<I> {
    iters: Vec<I>,
    idx: usize,
}

impl<I> AggregateIter<I> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            iters: Vec::with_capacity(capacity),
            idx: 0,
        }
    }
}

impl<I> Default for AggregateIter<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, I: KeyValueSource<'a>> AggregateIter<I> {
    /// Appends a source. Sources are expected to be freshly constructed.
    pub fn add(&mut self, iter: I) {
        self.iters.push(iter);
        self.skip_ended();
    }

    fn skip_ended(&mut self) {
        while self.idx < self.iters.len() && self.iters[self.idx].ended() {
            self.idx += 1;
        }
    }
}

impl<'a, I: KeyValueSource<'a>> KeyValueSource<'a> for AggregateIter<I> {
    fn reset(&mut self) {
        for iter in self.iters.iter_mut() {
            iter.reset();
        }
        self.idx = 0;
        self.skip_ended();
    }

    fn ended(&self) -> bool {
        self.idx >= self.iters.len()
    }

    fn advance(&mut self) {
        self.iters[self.idx].advance();
        self.skip_ended();
    }

    fn current_key(&mut self) -> &'a [u8] {
        self.iters[self.idx].current_key()
    }

    fn current(&mut self) -> (&'a [u8], &'a [u8]) {
        self.iters[self.idx].current()
    }

    fn is_delete(&self) -> bool {
        self.iters[self.idx].is_delete()
    }
}

/// Shared cursor over header records with lower-cased keys.
struct HeaderCursor<'a> {
    records: &'a [HeaderRecord],
    exclude: &'a [u8],
    skip_deleted: bool,
    arena: &'a Arena,
    lowercase_keys: HashMap<&'a [u8], &'a [u8]>,
    idx: usize,
}

impl<'a> HeaderCursor<'a> {
    fn new(
        records: &'a [HeaderRecord],
        exclude: &'a [u8],
        skip_deleted: bool,
        arena: &'a Arena,
    ) -> Self {
        let mut cursor = Self {
            records,
            exclude,
            skip_deleted,
            arena,
            lowercase_keys: HashMap::new(),
            idx: 0,
        };
        cursor.seek(0);
        cursor
    }

    fn seek(&mut self, mut idx: usize) {
        while let Some(record) = self.records.get(idx) {
            let skipped = (self.skip_deleted && record.is_deleted())
                || record.key().eq_ignore_ascii_case(self.exclude);
            if !skipped {
                break;
            }
            idx += 1;
        }
        self.idx = idx;
    }

    fn record(&self) -> &'a HeaderRecord {
        let records = self.records;
        &records[self.idx]
    }

    fn lowercase_key(&mut self) -> &'a [u8] {
        let key = self.record().key();
        if !key.iter().any(u8::is_ascii_uppercase) {
            return key;
        }
        let arena = self.arena;
        *self
            .lowercase_keys
            .entry(key)
            .or_insert_with(|| arena.lowercase_copy(key))
    }
}

/// Request headers, keys lower-cased, one key excluded (usually `cookie`).
/// Records already marked deleted are skipped.
pub struct RequestHeaderIter<'a>(HeaderCursor<'a>);

impl<'a> RequestHeaderIter<'a> {
    pub fn new(records: &'a [HeaderRecord], exclude: &'a [u8], arena: &'a Arena) -> Self {
        Self(HeaderCursor::new(records, exclude, true, arena))
    }
}

impl<'a> KeyValueSource<'a> for RequestHeaderIter<'a> {
    fn reset(&mut self) {
        self.0.seek(0);
    }

    fn ended(&self) -> bool {
        self.0.idx >= self.0.records.len()
    }

    fn advance(&mut self) {
        self.0.seek(self.0.idx + 1);
    }

    fn current_key(&mut self) -> &'a [u8] {
        self.0.lowercase_key()
    }

    fn current(&mut self) -> (&'a [u8], &'a [u8]) {
        (self.0.lowercase_key(), self.0.record().value())
    }
}

/// Response headers, keys lower-cased, one key excluded (usually
/// `set-cookie`). Records with a zero hash are reported as delete markers.
pub struct ResponseHeaderIter<'a>(HeaderCursor<'a>);

impl<'a> ResponseHeaderIter<'a> {
    pub fn new(records: &'a [HeaderRecord], exclude: &'a [u8], arena: &'a Arena) -> Self {
        Self(HeaderCursor::new(records, exclude, false, arena))
    }
}

impl<'a> KeyValueSource<'a> for ResponseHeaderIter<'a> {
    fn reset(&mut self) {
        self.0.seek(0);
    }

    fn ended(&self) -> bool {
        self.0.idx >= self.0.records.len()
    }

    fn advance(&mut self) {
        self.0.seek(self.0.idx + 1);
    }

    fn current_key(&mut self) -> &'a [u8] {
        self.0.lowercase_key()
    }

    fn current(&mut self) -> (&'a [u8], &'a [u8]) {
        (self.0.lowercase_key(), self.0.record().value())
    }

    fn is_delete(&self) -> bool {
        self.0.record().is_deleted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::HeaderList;

    fn drain<'a>(iter: &mut impl KeyValueSource<'a>) -> Vec<(String, String, bool)> {
        let mut out = Vec::new();
        while !iter.ended() {
            let deleted = iter.is_delete();
            let (k, v) = iter.current();
            out.push((
                String::from_utf8_lossy(k).into_owned(),
                String::from_utf8_lossy(v).into_owned(),
                deleted,
            ));
            iter.advance();
        }
        out
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String, bool)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string(), false))
            .collect()
    }

    // ===========================================
    // QueryStringIter tests
    // ===========================================

    #[test]
    fn test_query_basic() {
        let arena = Arena::new();
        let mut it = QueryStringIter::query(b"a=1&b=2&a=3", &arena);
        assert_eq!(drain(&mut it), pairs(&[("a", "1"), ("b", "2"), ("a", "3")]));
    }

    #[test]
    fn test_query_missing_value_and_empty_segments() {
        let arena = Arena::new();
        let mut it = QueryStringIter::query(b"&flag&&x=&=y&", &arena);
        assert_eq!(drain(&mut it), pairs(&[("flag", ""), ("x", ""), ("", "y")]));
    }

    #[test]
    fn test_query_splits_on_first_equals() {
        let arena = Arena::new();
        let mut it = QueryStringIter::query(b"q=a=b", &arena);
        assert_eq!(drain(&mut it), pairs(&[("q", "a=b")]));
    }

    #[test]
    fn test_query_is_not_trimmed() {
        let arena = Arena::new();
        let mut it = QueryStringIter::query(b" a = 1 ", &arena);
        assert_eq!(drain(&mut it), pairs(&[(" a ", " 1 ")]));
    }

    #[test]
    fn test_query_percent_and_plus_decoding() {
        let arena = Arena::new();
        let mut it = QueryStringIter::query(b"na%6De=John+Doe&bad=%zz%4", &arena);
        assert_eq!(
            drain(&mut it),
            pairs(&[("name", "John Doe"), ("bad", "%zz%4")])
        );
    }

    #[test]
    fn test_cookie_trimmed_and_plus_preserved() {
        let arena = Arena::new();
        let mut it = QueryStringIter::cookie(b" session = abc ; theme=a+b;  ;last", &arena);
        assert_eq!(
            drain(&mut it),
            pairs(&[("session", "abc"), ("theme", "a+b"), ("last", "")])
        );
    }

    #[test]
    fn test_query_empty_input_is_ended() {
        let arena = Arena::new();
        let it = QueryStringIter::query(b"", &arena);
        assert!(it.ended());
    }

    #[test]
    fn test_query_reset_rewinds() {
        let arena = Arena::new();
        let mut it = QueryStringIter::query(b"a=1&b=2", &arena);
        let first = drain(&mut it);
        it.reset();
        assert_eq!(drain(&mut it), first);
    }

    #[test]
    fn test_undecoded_spans_are_borrowed() {
        let arena = Arena::new();
        let input = b"plain=value";
        let mut it = QueryStringIter::query(input, &arena);
        let (key, _) = it.current();
        assert_eq!(key.as_ptr(), input.as_ptr());
    }

    // ===========================================
    // AggregateIter tests
    // ===========================================

    #[test]
    fn test_aggregate_chains_sources() {
        let arena = Arena::new();
        let mut agg = AggregateIter::new();
        agg.add(QueryStringIter::cookie(b"a=1; b=2", &arena));
        agg.add(QueryStringIter::cookie(b"", &arena));
        agg.add(QueryStringIter::cookie(b"a=3", &arena));

        assert_eq!(drain(&mut agg), pairs(&[("a", "1"), ("b", "2"), ("a", "3")]));
        agg.reset();
        assert_eq!(agg.current_key(), b"a");
    }

    #[test]
    fn test_aggregate_empty() {
        let arena = Arena::new();
        let mut agg: AggregateIter<QueryStringIter<'_>> = AggregateIter::new();
        assert!(agg.ended());
        agg.add(QueryStringIter::cookie(b" ; ", &arena));
        assert!(agg.ended());
    }

    // ===========================================
    // Header iterator tests
    // ===========================================

    #[test]
    fn test_request_headers_lowercased_and_excluded() {
        let arena = Arena::new();
        let list: HeaderList = [
            ("Host", "example.com"),
            ("Cookie", "a=1"),
            ("X-Custom", "1"),
            ("x-custom", "2"),
        ]
        .into_iter()
        .collect();

        let mut it = RequestHeaderIter::new(list.records(), b"cookie", &arena);
        assert_eq!(
            drain(&mut it),
            pairs(&[("host", "example.com"), ("x-custom", "1"), ("x-custom", "2")])
        );
    }

    #[test]
    fn test_request_headers_excluded_first_record() {
        let arena = Arena::new();
        let list: HeaderList = [("COOKIE", "a=1")].into_iter().collect();
        let it = RequestHeaderIter::new(list.records(), b"cookie", &arena);
        assert!(it.ended());
    }

    #[test]
    fn test_lowercase_keys_are_cached() {
        let arena = Arena::new();
        let list: HeaderList = [("X-Dup", "1"), ("X-Dup", "2")].into_iter().collect();
        let mut it = RequestHeaderIter::new(list.records(), b"cookie", &arena);
        let first = it.current_key();
        it.advance();
        let second = it.current_key();
        assert_eq!(first, b"x-dup");
        assert_eq!(first.as_ptr(), second.as_ptr());
    }

    #[test]
    fn test_response_headers_report_deletes() {
        let arena = Arena::new();
        let mut list: HeaderList = [
            ("Content-Type", "text/plain"),
            ("X-Tmp", "1"),
            ("Set-Cookie", "a=1"),
        ]
        .into_iter()
        .collect();
        list.remove(b"x-tmp");

        let mut it = ResponseHeaderIter::new(list.records(), b"set-cookie", &arena);
        assert_eq!(
            drain(&mut it),
            vec![
                ("content-type".to_string(), "text/plain".to_string(), false),
                ("x-tmp".to_string(), "1".to_string(), true),
            ]
        );
    }

    #[test]
    fn test_request_headers_skip_deleted_records() {
        let arena = Arena::new();
        let mut list: HeaderList = [("X-Gone", "1"), ("X-Kept", "2")].into_iter().collect();
        list.remove(b"x-gone");
        let mut it = RequestHeaderIter::new(list.records(), b"cookie", &arena);
        assert_eq!(drain(&mut it), pairs(&[("x-kept", "2")]));
    }
}
