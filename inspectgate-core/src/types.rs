//! Configuration traits and structs.
//!
//! Configuration reaches the core through small provider traits so that it
//! can come from environment variables, files or test fixtures alike.

use std::net::IpAddr;
use std::time::Duration;

use crate::blocking::BlockSpec;
use crate::client_ip::{ClientIpHeader, ClientIpResolver};

// ============================================================================
// Composable Configuration Traits
// ============================================================================

/// Settings of the inspection itself.
pub trait InspectionProvider: Send + Sync {
    /// Header to read the client IP from instead of the default list.
    fn client_ip_header(&self) -> Option<&ClientIpHeader>;

    /// Peers whose forwarding headers are honored. `None` trusts every peer.
    fn trusted_proxy_ips(&self) -> Option<&[IpAddr]>;

    /// Response used when a rule blocks a transaction.
    fn block_spec(&self) -> &BlockSpec;

    /// Resolver built from [`client_ip_header`](Self::client_ip_header) and
    /// [`trusted_proxy_ips`](Self::trusted_proxy_ips).
    fn client_ip_resolver(&self) -> ClientIpResolver {
        ClientIpResolver::new()
            .with_custom_header(self.client_ip_header().cloned())
            .with_trusted_proxies(self.trusted_proxy_ips().map(<[IpAddr]>::to_vec))
    }
}

/// Upstream proxy settings.
pub trait ProxyProvider: Send + Sync {
    fn proxy_config(&self) -> &ProxyConfig;
}

/// Inputs of the built-in static rules.
pub trait FilteringProvider: Send + Sync {
    /// Client IPs to block.
    fn blocked_ips(&self) -> &[String];

    /// HTTP methods to block (upper-case).
    fn blocked_methods(&self) -> &[String];

    /// Substrings of the raw URI to block.
    fn blocked_patterns(&self) -> &[String];

    /// Upstream statuses to block in the response phase.
    fn blocked_response_statuses(&self) -> &[u16];
}

// ============================================================================
// ConfigProvider - Aggregated trait for full configuration
// ============================================================================

/// Everything the proxy binary needs.
///
/// # Example
///
/// ```
/// use std::net::IpAddr;
/// use inspectgate_core::{
///     BlockSpec, ClientIpHeader, ConfigProvider, FilteringProvider, InspectionProvider,
///     ProxyConfig, ProxyProvider,
/// };
///
/// struct MyConfig {
///     block: BlockSpec,
///     proxy: ProxyConfig,
/// }
///
/// impl InspectionProvider for MyConfig {
///     fn client_ip_header(&self) -> Option<&ClientIpHeader> { None }
///     fn trusted_proxy_ips(&self) -> Option<&[IpAddr]> { None }
///     fn block_spec(&self) -> &BlockSpec { &self.block }
/// }
///
/// impl ProxyProvider for MyConfig {
///     fn proxy_config(&self) -> &ProxyConfig { &self.proxy }
/// }
///
/// impl FilteringProvider for MyConfig {
///     fn blocked_ips(&self) -> &[String] { &[] }
///     fn blocked_methods(&self) -> &[String] { &[] }
///     fn blocked_patterns(&self) -> &[String] { &[] }
///     fn blocked_response_statuses(&self) -> &[u16] { &[] }
/// }
///
/// fn assert_config<C: ConfigProvider>(_: &C) {}
/// assert_config(&MyConfig { block: BlockSpec::default(), proxy: ProxyConfig::default() });
/// ```
pub trait ConfigProvider: InspectionProvider + ProxyProvider + FilteringProvider {}

// Blanket implementation: any type implementing all sub-traits is a ConfigProvider
impl<T> ConfigProvider for T where T: InspectionProvider + ProxyProvider + FilteringProvider {}

/// Upstream timeouts and size limits.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use inspectgate_core::ProxyConfig;
///
/// let config = ProxyConfig {
///     timeout: Duration::from_secs(30),
///     max_body_size: ProxyConfig::mb_to_bytes(100),
/// };
///
/// assert!(config.is_valid());
/// assert_eq!(config.max_body_size_mb(), "100");
/// ```
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    /// Timeout for upstream requests
    pub timeout: Duration,
    /// Maximum request body size in bytes (0 = unlimited)
    pub max_body_size: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout: crate::defaults::PROXY_TIMEOUT,
            max_body_size: crate::defaults::MAX_BODY_SIZE,
        }
    }
}

impl ProxyConfig {
    /// A valid configuration has a non-zero timeout.
    pub fn is_valid(&self) -> bool {
        !self.timeout.is_zero()
    }

    /// Body limit for display: megabytes, or "unlimited".
    pub fn max_body_size_mb(&self) -> String {
        if self.max_body_size == 0 {
            "unlimited".to_string()
        } else {
            (self.max_body_size / 1024 / 1024).to_string()
        }
    }

    /// Converts megabytes to bytes; 0 stays 0 (unlimited).
    pub fn mb_to_bytes(mb: usize) -> usize {
        mb.saturating_mul(1024 * 1024)
    }

    /// Whether `size` bytes exceed the limit.
    pub fn exceeds_body_limit(&self, size: usize) -> bool {
        self.max_body_size > 0 && size > self.max_body_size
    }
}
