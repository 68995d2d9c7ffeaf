//! Test utilities for InspectGate.
//!
//! Shared configuration fixture for unit tests, only compiled with
//! `#[cfg(test)]`.

use std::net::IpAddr;
use std::time::Duration;

use crate::blocking::BlockSpec;
use crate::client_ip::ClientIpHeader;
use crate::types::{FilteringProvider, InspectionProvider, ProxyConfig, ProxyProvider};

/// Configuration implementing every provider trait, with builder methods.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub client_ip_header: Option<ClientIpHeader>,
    pub trusted_proxies: Option<Vec<IpAddr>>,
    pub block: BlockSpec,
    pub proxy: ProxyConfig,
    pub blocked_ips: Vec<String>,
    pub blocked_methods: Vec<String>,
    pub blocked_patterns: Vec<String>,
    pub blocked_response_statuses: Vec<u16>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            client_ip_header: None,
            trusted_proxies: None,
            block: BlockSpec::default(),
            proxy: ProxyConfig {
                timeout: Duration::from_secs(5),
                max_body_size: 1024 * 1024,
            },
            blocked_ips: vec![],
            blocked_methods: vec![],
            blocked_patterns: vec![],
            blocked_response_statuses: vec![],
        }
    }
}

impl TestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_ip_header(mut self, name: &str) -> Self {
        self.client_ip_header = Some(ClientIpHeader::new(name));
        self
    }

    /// # Panics
    ///
    /// Panics on addresses that do not parse.
    pub fn with_trusted_proxies(mut self, proxies: &[&str]) -> Self {
        self.trusted_proxies = Some(
            proxies
                .iter()
                .map(|ip| ip.parse().expect("valid proxy IP"))
                .collect(),
        );
        self
    }

    pub fn with_block_spec(mut self, block: BlockSpec) -> Self {
        self.block = block;
        self
    }

    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.proxy.max_body_size = bytes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.proxy.timeout = timeout;
        self
    }

    pub fn with_blocked_ips(mut self, ips: Vec<&str>) -> Self {
        self.blocked_ips = ips.into_iter().map(String::from).collect();
        self
    }

    pub fn with_blocked_methods(mut self, methods: Vec<&str>) -> Self {
        self.blocked_methods = methods.into_iter().map(String::from).collect();
        self
    }

    pub fn with_blocked_patterns(mut self, patterns: Vec<&str>) -> Self {
        self.blocked_patterns = patterns.into_iter().map(String::from).collect();
        self
    }

    pub fn with_blocked_response_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.blocked_response_statuses = statuses;
        self
    }
}

impl InspectionProvider for TestConfig {
    fn client_ip_header(&self) -> Option<&ClientIpHeader> {
        self.client_ip_header.as_ref()
    }

    fn trusted_proxy_ips(&self) -> Option<&[IpAddr]> {
        self.trusted_proxies.as_deref()
    }

    fn block_spec(&self) -> &BlockSpec {
        &self.block
    }
}

impl ProxyProvider for TestConfig {
    fn proxy_config(&self) -> &ProxyConfig {
        &self.proxy
    }
}

impl FilteringProvider for TestConfig {
    fn blocked_ips(&self) -> &[String] {
        &self.blocked_ips
    }

    fn blocked_methods(&self) -> &[String] {
        &self.blocked_methods
    }

    fn blocked_patterns(&self) -> &[String] {
        &self.blocked_patterns
    }

    fn blocked_response_statuses(&self) -> &[u16] {
        &self.blocked_response_statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocking::ContentTypePolicy;

    #[test]
    fn test_default_config() {
        let config = TestConfig::new();
        assert!(config.client_ip_header().is_none());
        assert!(config.trusted_proxy_ips().is_none());
        assert_eq!(config.block_spec().status, 403);
        assert!(config.blocked_ips.is_empty());
    }

    #[test]
    fn test_builder_methods() {
        let config = TestConfig::new()
            .with_trusted_proxies(&["10.0.0.1", "::1"])
            .with_block_spec(BlockSpec::new(451).with_content_type(ContentTypePolicy::Html))
            .with_blocked_ips(vec!["1.2.3.4"])
            .with_blocked_methods(vec!["TRACE"])
            .with_blocked_patterns(vec![".env"])
            .with_blocked_response_statuses(vec![500]);

        assert_eq!(config.trusted_proxy_ips().unwrap().len(), 2);
        assert_eq!(config.block_spec().status, 451);
        assert_eq!(config.blocked_ips, vec!["1.2.3.4"]);
        assert_eq!(config.blocked_methods, vec!["TRACE"]);
        assert_eq!(config.blocked_patterns, vec![".env"]);
        assert_eq!(config.blocked_response_statuses(), &[500u16]);
    }
}
