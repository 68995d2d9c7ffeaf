//! HTTP header constants for InspectGate.
//!
//! This module centralizes all HTTP header names used throughout the codebase,
//! avoiding magic strings and ensuring consistency. All names are lower-case.

/// Accept header - drives content negotiation of block pages.
pub const ACCEPT: &str = "accept";

/// Cookie header - excluded from the serialized request headers.
pub const COOKIE: &str = "cookie";

/// Set-Cookie header - excluded from the serialized response headers.
pub const SET_COOKIE: &str = "set-cookie";

/// Location header - pushed on redirecting block responses.
pub const LOCATION: &str = "location";

/// Content-Type header.
pub const CONTENT_TYPE: &str = "content-type";

/// Content-Length header.
pub const CONTENT_LENGTH: &str = "content-length";

/// Host header.
pub const HOST: &str = "host";

/// X-Forwarded-For header - contains the originating client IP.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// X-Real-IP header.
pub const X_REAL_IP: &str = "x-real-ip";

/// Forwarded header (RFC 7239) - standardized proxy header.
pub const FORWARDED: &str = "forwarded";

/// X-Forwarded header - pre-RFC 7239 variant using `for=` parameters.
pub const X_FORWARDED: &str = "x-forwarded";

/// Headers consulted for the client IP when no custom header is configured,
/// in order of precedence.
pub const CLIENT_IP_HEADERS: &[&str] = &[
    X_FORWARDED_FOR,
    X_REAL_IP,
    "true-client-ip",
    "x-client-ip",
    X_FORWARDED,
    "forwarded-for",
    "x-cluster-client-ip",
    "fastly-client-ip",
    "cf-connecting-ip",
    "cf-connecting-ipv6",
    FORWARDED,
];

/// Connection header (hop-by-hop).
pub const CONNECTION: &str = "connection";

/// Keep-Alive header (hop-by-hop).
pub const KEEP_ALIVE: &str = "keep-alive";

/// Proxy-Authenticate header (hop-by-hop).
pub const PROXY_AUTHENTICATE: &str = "proxy-authenticate";

/// Proxy-Authorization header (hop-by-hop).
pub const PROXY_AUTHORIZATION: &str = "proxy-authorization";

/// TE header (hop-by-hop).
pub const TE: &str = "te";

/// Trailers header (hop-by-hop).
pub const TRAILERS: &str = "trailers";

/// Transfer-Encoding header (hop-by-hop).
pub const TRANSFER_ENCODING: &str = "transfer-encoding";

/// Upgrade header (hop-by-hop).
pub const UPGRADE: &str = "upgrade";

/// List of all hop-by-hop headers that should not be forwarded.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    CONNECTION,
    KEEP_ALIVE,
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    TE,
    TRAILERS,
    TRANSFER_ENCODING,
    UPGRADE,
];

/// Check if a header is a hop-by-hop header that shouldn't be forwarded.
///
/// # Example
///
/// ```
/// use inspectgate_core::headers::is_hop_by_hop;
///
/// assert!(is_hop_by_hop("connection"));
/// assert!(is_hop_by_hop("Transfer-Encoding"));
/// assert!(!is_hop_by_hop("content-type"));
/// ```
pub fn is_hop_by_hop(header_name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(header_name))
}
