//! Request and response snapshots for the rules engine.
//!
//! [`RequestSerializer::serialize`] runs when request headers are ready and
//! [`RequestSerializer::serialize_end`] once the response head is known. Both
//! only allocate from the arena; submitting the tree is up to the caller.

use tracing::debug;

use crate::arena::Arena;
use crate::client_ip::ClientIpResolver;
use crate::collector::set_value_from_iter;
use crate::headers::{COOKIE, SET_COOKIE};
use crate::kv_iter::{AggregateIter, QueryStringIter, RequestHeaderIter, ResponseHeaderIter};
use crate::transaction::{RequestState, ResponseState};
use crate::value::{Entry, Value};

pub const QUERY: &[u8] = b"server.request.query";
pub const URI_RAW: &[u8] = b"server.request.uri.raw";
pub const METHOD: &[u8] = b"server.request.method";
pub const HEADERS_NO_COOKIES: &[u8] = b"server.request.headers.no_cookies";
pub const COOKIES: &[u8] = b"server.request.cookies";
pub const CLIENT_IP: &[u8] = b"http.client_ip";
pub const STATUS: &[u8] = b"server.response.status";
pub const RESPONSE_HEADERS_NO_COOKIES: &[u8] = b"server.response.headers.no_cookies";

const REQUEST_ENTRIES: usize = 6;
const RESPONSE_ENTRIES: usize = 2;

/// Builds request/response trees in one transaction's arena.
pub struct RequestSerializer<'a> {
    arena: &'a Arena,
    resolver: &'a ClientIpResolver,
}

impl<'a> RequestSerializer<'a> {
    pub fn new(arena: &'a Arena, resolver: &'a ClientIpResolver) -> Self {
        Self { arena, resolver }
    }

    /// Map of query, raw URI, method, headers without cookies, cookies and
    /// client IP, in that order.
    pub fn serialize(&self, request: &'a RequestState) -> Value<'a> {
        let mut root = Value::null();
        let map = root.make_map(REQUEST_ENTRIES, self.arena);
        map.set_len(REQUEST_ENTRIES);

        self.set_query(request, map.get_entry_unchecked(0));
        set_string(map.get_entry_unchecked(1), URI_RAW, &request.unparsed_uri);
        set_string(map.get_entry_unchecked(2), METHOD, &request.method);
        self.set_request_headers(request, map.get_entry_unchecked(3));
        self.set_cookies(request, map.get_entry_unchecked(4));
        self.set_client_ip(request, map.get_entry_unchecked(5));

        debug!(
            arena_bytes = self.arena.allocated_bytes(),
            headers = request.headers.len(),
            "Serialized request"
        );
        root
    }

    /// Map of response status and response headers without `Set-Cookie`.
    pub fn serialize_end(&self, response: &'a ResponseState) -> Value<'a> {
        let mut root = Value::null();
        let map = root.make_map(RESPONSE_ENTRIES, self.arena);

        map.push(
            STATUS,
            Value::string(format_status(response.status, self.arena)),
        );

        let mut it = ResponseHeaderIter::new(
            response.headers.records(),
            SET_COOKIE.as_bytes(),
            self.arena,
        );
        let mut headers = Value::null();
        set_value_from_iter(&mut it, &mut headers, self.arena);
        map.push(RESPONSE_HEADERS_NO_COOKIES, headers);

        debug!(
            arena_bytes = self.arena.allocated_bytes(),
            status = response.status,
            "Serialized response"
        );
        root
    }

    fn set_query(&self, request: &'a RequestState, slot: &mut Entry<'a>) {
        slot.set_key(QUERY);
        let mut it = QueryStringIter::query(&request.query, self.arena);
        set_value_from_iter(&mut it, slot.value_mut(), self.arena);
    }

    fn set_request_headers(&self, request: &'a RequestState, slot: &mut Entry<'a>) {
        slot.set_key(HEADERS_NO_COOKIES);
        let mut it = RequestHeaderIter::new(
            request.headers.records(),
            COOKIE.as_bytes(),
            self.arena,
        );
        set_value_from_iter(&mut it, slot.value_mut(), self.arena);
    }

    fn set_cookies(&self, request: &'a RequestState, slot: &mut Entry<'a>) {
        slot.set_key(COOKIES);
        let mut it = AggregateIter::new();
        for record in request.headers.get_all(COOKIE.as_bytes()) {
            it.add(QueryStringIter::cookie(record.value(), self.arena));
        }
        set_value_from_iter(&mut it, slot.value_mut(), self.arena);
    }

    fn set_client_ip(&self, request: &RequestState, slot: &mut Entry<'a>) {
        slot.set_key(CLIENT_IP);
        match self.resolver.resolve(request) {
            Some(ip) => slot
                .value_mut()
                .make_string_copy(ip.to_string().as_bytes(), self.arena),
            None => slot.value_mut().make_null(),
        }
    }
}

fn set_string<'a>(slot: &mut Entry<'a>, key: &'static [u8], value: &'a [u8]) {
    slot.set_key(key);
    slot.value_mut().make_string(value);
}

/// Status code as a three-digit string, `"0"` outside `100..=599`.
///
/// # Example
///
/// ```
/// use inspectgate_core::arena::Arena;
/// use inspectgate_core::serializer::format_status;
///
/// let arena = Arena::new();
/// assert_eq!(format_status(200, &arena), b"200");
/// assert_eq!(format_status(418, &arena), b"418");
/// assert_eq!(format_status(1200, &arena), b"0");
/// ```
pub fn format_status(status: u16, arena: &Arena) -> &[u8] {
    match status {
        200 => b"200",
        201 => b"201",
        301 => b"301",
        302 => b"302",
        303 => b"303",
        404 => b"404",
        100..=599 => {
            let digits = arena.allocate(3);
            digits[0] = b'0' + (status / 100) as u8;
            digits[1] = b'0' + (status / 10 % 10) as u8;
            digits[2] = b'0' + (status % 10) as u8;
            digits
        }
        _ => b"0",
    }
}
