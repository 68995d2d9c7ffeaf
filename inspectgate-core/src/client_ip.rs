//! Client IP resolution from forwarding headers.
//!
//! # Resolution order
//!
//! With a custom header configured only that header is read; otherwise the
//! well-known forwarding headers are scanned in [`CLIENT_IP_HEADERS`] order.
//! Every header value is a comma-separated list of RFC 7239 node identifiers
//! (`Forwarded` and `X-Forwarded` carry them in `for=` parameters).
//!
//! 1. the left-most public address found in the headers;
//! 2. the peer address, if public;
//! 3. the first private address found in the headers;
//! 4. the peer address.
//!
//! # Trusted proxies
//!
//! When a trusted-proxy allowlist is configured, forwarding headers are only
//! honored if the TCP peer is on it. Any other peer could forge them, so its
//! own address is used instead.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::headers::{CLIENT_IP_HEADERS, FORWARDED, X_FORWARDED};
use crate::transaction::{RequestState, header_hash};

/// A header name with its precomputed lookup hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIpHeader {
    name: String,
    hash: u32,
}

impl ClientIpHeader {
    /// Lower-cases `name` and hashes it once.
    pub fn new(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        let hash = header_hash(name.as_bytes());
        Self { name, hash }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Whether values use the `for=` parameter syntax.
    fn uses_for_parameter(&self) -> bool {
        self.name == FORWARDED || self.name == X_FORWARDED
    }
}

static DEFAULT_HEADERS: Lazy<Vec<ClientIpHeader>> = Lazy::new(|| {
    CLIENT_IP_HEADERS
        .iter()
        .map(|name| ClientIpHeader::new(name))
        .collect()
});

/// Resolves the address of the client that originated a request.
#[derive(Debug, Clone, Default)]
pub struct ClientIpResolver {
    custom_header: Option<ClientIpHeader>,
    trusted_proxies: Option<Vec<IpAddr>>,
}

impl ClientIpResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads only `header` instead of the default precedence list.
    pub fn with_custom_header(mut self, header: Option<ClientIpHeader>) -> Self {
        self.custom_header = header;
        self
    }

    /// Honors forwarding headers only from these peers.
    pub fn with_trusted_proxies(mut self, proxies: Option<Vec<IpAddr>>) -> Self {
        self.trusted_proxies = proxies;
        self
    }

    pub fn custom_header(&self) -> Option<&ClientIpHeader> {
        self.custom_header.as_ref()
    }

    pub fn resolve(&self, request: &RequestState) -> Option<IpAddr> {
        let peer = request.peer_addr.map(|addr| addr.ip().to_canonical());

        if !self.is_trusted_peer(peer) {
            debug!(peer = ?peer, "Ignoring forwarding headers from untrusted peer");
            return peer;
        }

        let mut found = Candidates::default();
        match &self.custom_header {
            Some(header) => {
                found.scan(request, header);
            }
            None => {
                for header in DEFAULT_HEADERS.iter() {
                    if found.scan(request, header) {
                        break;
                    }
                }
            }
        }

        found
            .public
            .or_else(|| peer.filter(|ip| is_public(*ip)))
            .or(found.private)
            .or(peer)
    }

    fn is_trusted_peer(&self, peer: Option<IpAddr>) -> bool {
        match &self.trusted_proxies {
            Some(allowed) => peer.is_some_and(|ip| allowed.contains(&ip)),
            None => true,
        }
    }
}

#[derive(Debug, Default)]
struct Candidates {
    public: Option<IpAddr>,
    private: Option<IpAddr>,
}

impl Candidates {
    /// Reads every record of `header`. Returns `true` once a public address
    /// is known.
    fn scan(&mut self, request: &RequestState, header: &ClientIpHeader) -> bool {
        let records = request
            .headers
            .get_all_hashed(header.hash(), header.name().as_bytes());

        for record in records {
            let Ok(value) = std::str::from_utf8(record.value()) else {
                continue;
            };
            for element in value.split(',') {
                let node = if header.uses_for_parameter() {
                    for_parameter(element)
                } else {
                    Some(element)
                };
                if let Some(ip) = node.and_then(parse_node_identifier)
                    && self.offer(ip)
                {
                    return true;
                }
            }
        }
        false
    }

    fn offer(&mut self, ip: IpAddr) -> bool {
        if is_public(ip) {
            self.public = Some(ip);
            return true;
        }
        if self.private.is_none() {
            self.private = Some(ip);
        }
        false
    }
}

/// `for=` value of one `Forwarded` element (parameters separated by `;`).
fn for_parameter(element: &str) -> Option<&str> {
    element.split(';').find_map(|param| {
        let (name, value) = param.trim().split_once('=')?;
        name.eq_ignore_ascii_case("for").then_some(value)
    })
}

/// Parses an RFC 7239 node identifier: `IP`, `IP:port`, `[IPv6]`,
/// `[IPv6]:port`, optionally quoted. `unknown` and obfuscated `_...`
/// identifiers yield nothing.
fn parse_node_identifier(value: &str) -> Option<IpAddr> {
    let value = value.trim().trim_matches('"');

    if value.eq_ignore_ascii_case("unknown") || value.starts_with('_') {
        return None;
    }

    if let Some(rest) = value.strip_prefix('[') {
        let end = rest.find(']')?;
        return rest[..end]
            .parse::<Ipv6Addr>()
            .ok()
            .map(|ip| IpAddr::V6(ip).to_canonical());
    }

    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip.to_canonical());
    }

    // IPv4 with port
    let (host, port) = value.rsplit_once(':')?;
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    host.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
}

/// Whether `ip` is globally routable as far as client attribution goes.
///
/// Private, loopback, link-local, carrier-grade NAT, unique-local and
/// unspecified ranges are not.
pub fn is_public(ip: IpAddr) -> bool {
    match ip.to_canonical() {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            let shared = a == 100 && (b & 0xc0) == 64;
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || shared)
        }
        IpAddr::V6(v6) => {
            !(v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_unique_local()
                || v6.is_unicast_link_local())
        }
    }
}
