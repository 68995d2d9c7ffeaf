//! Default configuration values for InspectGate.
//!
//! This module centralizes all default values used throughout InspectGate,
//! ensuring consistency between production code and tests.

use std::time::Duration;

/// Initial chunk size of a per-request arena.
pub const ARENA_INITIAL_CAPACITY: usize = 4 * 1024;

/// Default status of a block response.
pub const BLOCK_STATUS: u16 = 403;

/// Content type sent with HTML block pages.
pub const CONTENT_TYPE_HTML: &str = "text/html;charset=utf-8";

/// Content type sent with JSON block bodies.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Built-in HTML block page.
pub const TEMPLATE_HTML: &str = concat!(
    "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"UTF-8\">",
    "<meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">",
    "<title>You've been blocked</title><style>",
    "a,body,div,html,span{margin:0;padding:0;border:0;font-size:100%;font:inherit;vertical-align:baseline}",
    "body{background:radial-gradient(circle at 26% 19%,#fff,#f4f7f9);display:flex;",
    "justify-content:center;align-items:center;align-content:center;width:100%;",
    "min-height:100vh;line-height:1;flex-direction:column}",
    "p{display:block}main{text-align:center;flex:1;display:flex;justify-content:center;",
    "align-items:center;align-content:center;flex-direction:column}",
    "p{font-size:18px;line-height:normal;color:#646464;font-family:sans-serif;font-weight:400}",
    "a{color:#4842b7}footer{width:100%;text-align:center}footer p{font-size:16px}",
    "</style></head><body><main><p>Sorry, you cannot access this page. ",
    "Please contact the customer service team.</p></main>",
    "<footer><p>Security provided by InspectGate</p></footer></body></html>",
);

/// Built-in JSON block body.
pub const TEMPLATE_JSON: &str = concat!(
    "{\"errors\": [{\"title\": \"You've been blocked\", \"detail\": \"Sorry, ",
    "you cannot access this page. Please contact the customer service team. ",
    "Security provided by InspectGate.\"}]}",
);

/// Default proxy timeout in seconds.
pub const PROXY_TIMEOUT_SECS: u64 = 30;

/// Default proxy timeout duration.
pub const PROXY_TIMEOUT: Duration = Duration::from_secs(PROXY_TIMEOUT_SECS);

/// Default maximum body size in megabytes.
pub const MAX_BODY_SIZE_MB: usize = 100;

/// Default maximum body size in bytes.
pub const MAX_BODY_SIZE: usize = MAX_BODY_SIZE_MB * 1024 * 1024;
