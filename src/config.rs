//! Configuration management for InspectGate.
//!
//! This module handles loading and caching configuration from environment variables.
//! All configurations are computed once at first access and cached for the lifetime
//! of the application using `once_cell::sync::Lazy`.
//!
//! Invalid values never abort startup: they are logged with `warn!` and replaced
//! by the default. Missing template files are the exception, reported when the
//! blocking service is initialized.
//!
//! # Example
//!
//! ```
//! use inspectgate::config;
//!
//! let block = config::get_block_spec();
//! println!("Blocking with status {}", block.status);
//!
//! let proxy_config = config::get_proxy_config();
//! println!("Timeout: {:?}", proxy_config.timeout);
//! ```

use std::env::{self, VarError};
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::warn;

use crate::env_vars;
use inspectgate_core::{
    BlockSpec, ClientIpHeader, ContentTypePolicy, FilteringProvider, InspectionProvider,
    ProxyConfig, ProxyProvider, defaults,
};

// ============================================================================
// Cached Configuration (computed once at first access)
// ============================================================================

static BLOCK_TEMPLATES: Lazy<TemplatePaths> = Lazy::new(|| compute_block_templates(process_env));
static CLIENT_IP_HEADER: Lazy<Option<ClientIpHeader>> =
    Lazy::new(|| compute_client_ip_header(process_env));
static TRUSTED_PROXY_IPS: Lazy<Option<Vec<IpAddr>>> =
    Lazy::new(|| compute_trusted_proxy_ips(process_env));
static BLOCK_SPEC: Lazy<BlockSpec> = Lazy::new(|| compute_block_spec(process_env));
static PROXY_CONFIG: Lazy<ProxyConfig> = Lazy::new(|| compute_proxy_config(process_env));
static BLOCKED_IPS: Lazy<Vec<String>> = Lazy::new(|| compute_blocked_ips(process_env));
static BLOCKED_PATTERNS: Lazy<Vec<String>> = Lazy::new(|| compute_blocked_patterns(process_env));
static BLOCKED_METHODS: Lazy<Vec<String>> = Lazy::new(|| compute_blocked_methods(process_env));
static BLOCKED_RESPONSE_STATUSES: Lazy<Vec<u16>> =
    Lazy::new(|| compute_blocked_response_statuses(process_env));

/// Operator-supplied block page templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplatePaths {
    pub html: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

// ============================================================================
// Internal Helpers
// ============================================================================

fn process_env(key: &str) -> Result<String, VarError> {
    env::var(key)
}

/// Reads a variable, treating blank values as unset.
fn non_empty<F>(env_var: &F, var_name: &str) -> Option<String>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    env_var(var_name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parses an environment variable with fallback to a default value.
///
/// Logs a warning if the value exists but cannot be parsed.
fn parse_env_var_or_default<T, F>(env_var: &F, var_name: &str, default: T) -> T
where
    T: FromStr + Copy,
    F: Fn(&str) -> Result<String, VarError>,
{
    match non_empty(env_var, var_name) {
        Some(value) => match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(var = var_name, value = %value, "Invalid env var value, using default");
                default
            }
        },
        None => default,
    }
}

/// Parses a comma-separated string into a Vec of trimmed strings.
///
/// Filters out empty entries after trimming.
fn parse_comma_separated(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parses a comma-separated list of values, skipping (and logging) the ones
/// that do not parse.
fn parse_comma_separated_as<T: FromStr>(var_name: &str, input: &str) -> Vec<T> {
    parse_comma_separated(input)
        .into_iter()
        .filter_map(|entry| match entry.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!(var = var_name, value = %entry, "Ignoring invalid list entry");
                None
            }
        })
        .collect()
}

// ============================================================================
// Public Configuration Getters
// ============================================================================

/// Returns the cached block template paths.
///
/// - `BLOCK_TEMPLATE_HTML`: HTML block page served verbatim
/// - `BLOCK_TEMPLATE_JSON`: JSON block body served verbatim
///
/// Unset variables keep the built-in templates.
pub fn get_block_templates() -> &'static TemplatePaths {
    &BLOCK_TEMPLATES
}

fn compute_block_templates<F>(env_var: F) -> TemplatePaths
where
    F: Fn(&str) -> Result<String, VarError>,
{
    TemplatePaths {
        html: non_empty(&env_var, env_vars::BLOCK_TEMPLATE_HTML).map(PathBuf::from),
        json: non_empty(&env_var, env_vars::BLOCK_TEMPLATE_JSON).map(PathBuf::from),
    }
}

/// Returns the cached custom client IP header, if configured.
///
/// When `CLIENT_IP_HEADER` is set, only that header is consulted; otherwise the
/// built-in list of forwarding headers is scanned.
pub fn get_client_ip_header() -> Option<&'static ClientIpHeader> {
    CLIENT_IP_HEADER.as_ref()
}

fn compute_client_ip_header<F>(env_var: F) -> Option<ClientIpHeader>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    non_empty(&env_var, env_vars::CLIENT_IP_HEADER).map(|name| ClientIpHeader::new(&name))
}

/// Returns the cached list of trusted proxy IPs, if configured.
///
/// # Returns
///
/// - `Some(ips)`: forwarding headers are only honored from these peers
/// - `None`: forwarding headers are honored from any peer
///
/// A set variable without any valid entry yields an empty allowlist, so no
/// peer is trusted.
///
/// # Example
///
/// ```
/// use inspectgate::config::get_trusted_proxy_ips;
///
/// match get_trusted_proxy_ips() {
///     Some(ips) => println!("{} trusted proxies", ips.len()),
///     None => println!("Forwarding headers trusted from any peer"),
/// }
/// ```
pub fn get_trusted_proxy_ips() -> Option<&'static Vec<IpAddr>> {
    TRUSTED_PROXY_IPS.as_ref()
}

fn compute_trusted_proxy_ips<F>(env_var: F) -> Option<Vec<IpAddr>>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let raw = non_empty(&env_var, env_vars::TRUSTED_PROXY_IPS)?;
    let ips: Vec<IpAddr> = parse_comma_separated_as(env_vars::TRUSTED_PROXY_IPS, &raw);
    if ips.is_empty() {
        warn!("TRUSTED_PROXY_IPS has no valid entry, ignoring forwarding headers from every peer");
    }
    Some(ips.into_iter().map(|ip| ip.to_canonical()).collect())
}

/// Returns the cached default block response.
///
/// - `BLOCK_STATUS`: status code, 100-599 (default: 403)
/// - `BLOCK_CONTENT_TYPE`: `auto`, `html`, `json` or `none` (default: auto)
/// - `BLOCK_REDIRECT_LOCATION`: optional `Location` header
pub fn get_block_spec() -> &'static BlockSpec {
    &BLOCK_SPEC
}

fn compute_block_spec<F>(env_var: F) -> BlockSpec
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let mut status =
        parse_env_var_or_default(&env_var, env_vars::BLOCK_STATUS, defaults::BLOCK_STATUS);
    if !(100..=599).contains(&status) {
        warn!(status, "Block status out of range, using default");
        status = defaults::BLOCK_STATUS;
    }

    let content_type = match non_empty(&env_var, env_vars::BLOCK_CONTENT_TYPE) {
        Some(value) => value.parse().unwrap_or_else(|err| {
            warn!(error = %err, "Invalid block content type, using auto");
            ContentTypePolicy::Auto
        }),
        None => ContentTypePolicy::Auto,
    };

    let spec = BlockSpec::new(status).with_content_type(content_type);
    match non_empty(&env_var, env_vars::BLOCK_REDIRECT_LOCATION) {
        Some(location) => spec.with_location(location),
        None => spec,
    }
}

/// Returns the cached proxy configuration.
///
/// Configuration is read from environment variables on first access:
/// - `PROXY_TIMEOUT_SECS`: Upstream request timeout (default: 30)
/// - `MAX_BODY_SIZE_MB`: Maximum request body size (default: 100, 0 = unlimited)
///
/// # Example
///
/// ```
/// use inspectgate::config::get_proxy_config;
///
/// let config = get_proxy_config();
/// println!("Timeout: {:?}, Max body: {}", config.timeout, config.max_body_size_mb());
/// ```
pub fn get_proxy_config() -> &'static ProxyConfig {
    &PROXY_CONFIG
}

fn compute_proxy_config<F>(env_var: F) -> ProxyConfig
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let timeout_secs = parse_env_var_or_default(
        &env_var,
        env_vars::PROXY_TIMEOUT_SECS,
        defaults::PROXY_TIMEOUT_SECS,
    );

    let max_body_mb = parse_env_var_or_default(
        &env_var,
        env_vars::MAX_BODY_SIZE_MB,
        defaults::MAX_BODY_SIZE_MB,
    );

    let config = ProxyConfig {
        timeout: Duration::from_secs(timeout_secs),
        max_body_size: ProxyConfig::mb_to_bytes(max_body_mb),
    };

    if !config.is_valid() {
        warn!("Invalid proxy configuration, using defaults");
        return ProxyConfig::default();
    }

    config
}

/// Returns the cached list of blocked client IPs, in canonical text form.
pub fn get_blocked_ips() -> &'static Vec<String> {
    &BLOCKED_IPS
}

fn compute_blocked_ips<F>(env_var: F) -> Vec<String>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    non_empty(&env_var, env_vars::BLOCKED_IPS)
        .map(|raw| parse_comma_separated_as::<IpAddr>(env_vars::BLOCKED_IPS, &raw))
        .unwrap_or_default()
        .into_iter()
        .map(|ip| ip.to_canonical().to_string())
        .collect()
}

/// Returns the cached list of blocked URI patterns.
///
/// Patterns are matched as substrings of the raw URI and of its percent-decoded
/// form.
pub fn get_blocked_patterns() -> &'static Vec<String> {
    &BLOCKED_PATTERNS
}

fn compute_blocked_patterns<F>(env_var: F) -> Vec<String>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    non_empty(&env_var, env_vars::BLOCKED_PATTERNS)
        .map(|s| parse_comma_separated(&s))
        .unwrap_or_default()
}

/// Returns the cached list of blocked HTTP methods, upper-cased.
///
/// # Example
///
/// ```
/// use inspectgate::config::get_blocked_methods;
///
/// let methods = get_blocked_methods();
/// if methods.contains(&"TRACE".to_string()) {
///     println!("TRACE requests are blocked");
/// }
/// ```
pub fn get_blocked_methods() -> &'static Vec<String> {
    &BLOCKED_METHODS
}

fn compute_blocked_methods<F>(env_var: F) -> Vec<String>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    non_empty(&env_var, env_vars::BLOCKED_METHODS)
        .map(|s| {
            parse_comma_separated(&s)
                .into_iter()
                .map(|method| method.to_uppercase())
                .collect()
        })
        .unwrap_or_default()
}

/// Returns the cached list of upstream statuses blocked in the response phase.
pub fn get_blocked_response_statuses() -> &'static Vec<u16> {
    &BLOCKED_RESPONSE_STATUSES
}

fn compute_blocked_response_statuses<F>(env_var: F) -> Vec<u16>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    non_empty(&env_var, env_vars::BLOCKED_RESPONSE_STATUSES)
        .map(|raw| parse_comma_separated_as(env_vars::BLOCKED_RESPONSE_STATUSES, &raw))
        .unwrap_or_default()
}

// ============================================================================
// EnvVarConfig - ConfigProvider implementation using environment variables
// ============================================================================

/// Configuration provider that reads from environment variables.
///
/// This is the default configuration provider for the InspectGate CLI.
/// Values come from the global lazy statics.
///
/// # Example
///
/// ```
/// use inspectgate::config::EnvVarConfig;
/// use inspectgate::InspectionProvider;
///
/// let config = EnvVarConfig::new();
/// println!("Block status: {}", config.block_spec().status);
/// ```
#[derive(Clone, Debug, Default)]
pub struct EnvVarConfig {
    _private: (),
}

impl EnvVarConfig {
    /// Creates a new configuration provider from environment variables.
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl InspectionProvider for EnvVarConfig {
    fn client_ip_header(&self) -> Option<&ClientIpHeader> {
        get_client_ip_header()
    }

    fn trusted_proxy_ips(&self) -> Option<&[IpAddr]> {
        get_trusted_proxy_ips().map(|v| v.as_slice())
    }

    fn block_spec(&self) -> &BlockSpec {
        get_block_spec()
    }
}

impl ProxyProvider for EnvVarConfig {
    fn proxy_config(&self) -> &ProxyConfig {
        get_proxy_config()
    }
}

impl FilteringProvider for EnvVarConfig {
    fn blocked_ips(&self) -> &[String] {
        get_blocked_ips()
    }

    fn blocked_methods(&self) -> &[String] {
        get_blocked_methods()
    }

    fn blocked_patterns(&self) -> &[String] {
        get_blocked_patterns()
    }

    fn blocked_response_statuses(&self) -> &[u16] {
        get_blocked_response_statuses()
    }
}
