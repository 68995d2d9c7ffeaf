//! Environment variable names used throughout InspectGate configuration

/// Block page templates
pub const BLOCK_TEMPLATE_HTML: &str = "BLOCK_TEMPLATE_HTML";
pub const BLOCK_TEMPLATE_JSON: &str = "BLOCK_TEMPLATE_JSON";

/// Client IP resolution
pub const CLIENT_IP_HEADER: &str = "CLIENT_IP_HEADER";
pub const TRUSTED_PROXY_IPS: &str = "TRUSTED_PROXY_IPS";

/// Default block response
pub const BLOCK_STATUS: &str = "BLOCK_STATUS";
pub const BLOCK_CONTENT_TYPE: &str = "BLOCK_CONTENT_TYPE";
pub const BLOCK_REDIRECT_LOCATION: &str = "BLOCK_REDIRECT_LOCATION";

/// Static rules
pub const BLOCKED_IPS: &str = "BLOCKED_IPS";
pub const BLOCKED_METHODS: &str = "BLOCKED_METHODS";
pub const BLOCKED_PATTERNS: &str = "BLOCKED_PATTERNS";
pub const BLOCKED_RESPONSE_STATUSES: &str = "BLOCKED_RESPONSE_STATUSES";

/// Proxy behavior configuration
pub const PROXY_TIMEOUT_SECS: &str = "PROXY_TIMEOUT_SECS";
pub const MAX_BODY_SIZE_MB: &str = "MAX_BODY_SIZE_MB";

/// Get all environment variable names for documentation/validation
pub fn all_env_vars() -> &'static [&'static str] {
    &[
        BLOCK_TEMPLATE_HTML,
        BLOCK_TEMPLATE_JSON,
        CLIENT_IP_HEADER,
        TRUSTED_PROXY_IPS,
        BLOCK_STATUS,
        BLOCK_CONTENT_TYPE,
        BLOCK_REDIRECT_LOCATION,
        BLOCKED_IPS,
        BLOCKED_METHODS,
        BLOCKED_PATTERNS,
        BLOCKED_RESPONSE_STATUSES,
        PROXY_TIMEOUT_SECS,
        MAX_BODY_SIZE_MB,
    ]
}
