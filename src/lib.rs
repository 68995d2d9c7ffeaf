//! InspectGate - inline HTTP inspection and blocking
//!
//! A reverse proxy that serializes every request, and every upstream response
//! head, into a tagged value tree for a rules engine. Blocked transactions are
//! answered with a configurable HTML or JSON block page negotiated from the
//! client's `Accept` header.
//!
//! # Overview
//!
//! - Client IP resolution from forwarding headers, with a trusted-peer list
//! - Request and response phase inspection through [`RulesEngine`]
//! - Built-in [`StaticRules`](rules::StaticRules) for IPs, methods, URI
//!   patterns and upstream statuses
//! - Custom block templates, status, content type and redirect location
//! - Structured logging with JSON support
//!
//! # Example
//!
//! ```rust,no_run
//! use inspectgate::{config::EnvVarConfig, rules::StaticRules};
//! use inspectgate::{BlockingService, Inspector};
//!
//! let config = EnvVarConfig::new();
//! let rules = StaticRules::from_config(&config);
//! let inspector = Inspector::from_config(rules, &config, BlockingService::new());
//! ```
//!
//! # Modules
//!
//! - [`config`] - Configuration management from environment variables
//! - [`env_vars`] - Environment variable constants
//! - [`rules`] - Built-in rules engine
//! - [`server`] - Startup banner
//! - [`args`] - Command line argument parsing
//!
//! # Re-exports from inspectgate-core
//!
//! - [`blocking`] - Block templates and responses
//! - [`request_handler`] - Inspection pipeline and request forwarding
//! - [`types`] - Configuration traits

#![forbid(unsafe_code)]

pub mod args;
pub mod config;
pub mod env_vars;
pub mod rules;
pub mod server;

// Re-export inspectgate-core modules
pub use inspectgate_core::blocking;
pub use inspectgate_core::request_handler;
pub use inspectgate_core::types;

// Re-export commonly used items at crate root
pub use config::{
    EnvVarConfig, TemplatePaths, get_block_spec, get_block_templates, get_blocked_ips,
    get_blocked_methods, get_blocked_patterns, get_blocked_response_statuses,
    get_client_ip_header, get_proxy_config, get_trusted_proxy_ips,
};
pub use inspectgate_core::{
    BlockSpec, BlockingService, ConfigProvider, ContentTypePolicy, FilteringProvider,
    InspectError, InspectionProvider, Inspector, Phase, ProxyConfig, ProxyProvider, RulesEngine,
    Verdict,
};
