//! InspectGate Core - inline request/response inspection
//!
//! This crate turns HTTP transactions into a tagged value tree for a rules
//! engine and answers blocked transactions with a negotiated block page.
//!
//! # Overview
//!
//! - [`arena`] and [`value`] - per-request bump arena and the tree built in it
//! - [`kv_iter`] and [`collector`] - key/value sources and the two-pass map
//!   builder that groups repeated keys into arrays
//! - [`serializer`] - request and response snapshots
//! - [`client_ip`] - client IP resolution from forwarding headers
//! - [`negotiation`] and [`blocking`] - `Accept` negotiation and block responses
//! - [`engine`] - the [`RulesEngine`] seam
//! - [`request_handler`] - the inline proxy pipeline built on top of them
//!
//! Configuration is provided via small provider traits aggregated by
//! [`ConfigProvider`], so the crate stays independent of where settings come
//! from.
//!
//! # Example
//!
//! ```
//! use inspectgate_core::arena::Arena;
//! use inspectgate_core::serializer::{self, RequestSerializer};
//! use inspectgate_core::transaction::RequestState;
//! use inspectgate_core::{BlockSpec, ClientIpResolver, Phase, RulesEngine, Verdict, Value};
//!
//! let engine = |snapshot: &Value<'_>, _phase: Phase| {
//!     match snapshot.as_map().get(serializer::METHOD) {
//!         Some(method) if method.as_bytes() == b"TRACE" => Verdict::Block(BlockSpec::new(405)),
//!         _ => Verdict::Pass,
//!     }
//! };
//!
//! let request = RequestState {
//!     method: "TRACE".into(),
//!     unparsed_uri: "/".into(),
//!     ..Default::default()
//! };
//! let arena = Arena::new();
//! let resolver = ClientIpResolver::new();
//! let snapshot = RequestSerializer::new(&arena, &resolver).serialize(&request);
//!
//! assert!(engine.evaluate(&snapshot, Phase::Request).is_block());
//! ```

#![forbid(unsafe_code)]

pub mod arena;
pub mod blocking;
pub mod client_ip;
pub mod collector;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod headers;
pub mod kv_iter;
pub mod negotiation;
pub mod request_handler;
pub mod serializer;
#[cfg(test)]
pub mod test_utils;
pub mod transaction;
pub mod types;
pub mod value;

// Re-export commonly used items at crate root
pub use blocking::{BlockSpec, BlockingService, ContentTypePolicy, HostCode};
pub use client_ip::{ClientIpHeader, ClientIpResolver};
pub use engine::{PassThrough, Phase, RulesEngine, Verdict};
pub use error::{InspectError, Result};
pub use negotiation::ContentType;
pub use request_handler::Inspector;
pub use types::{
    // Aggregated configuration trait
    ConfigProvider,
    // Composable configuration traits
    FilteringProvider,
    InspectionProvider,
    // Configuration structs
    ProxyConfig,
    ProxyProvider,
};
pub use value::Value;
