//! Command line interface of the InspectGate binary.
//!
//! Ports and addresses come from flags; everything about inspection itself
//! (templates, client IP, static rules) comes from environment variables, see
//! [`config`](crate::config).
//!
//! # Example
//!
//! ```no_run
//! use inspectgate::args::Args;
//! use clap::Parser;
//!
//! let args = Args::parse();
//! if let Err(e) = args.validate() {
//!     eprintln!("Configuration error: {}", e);
//!     std::process::exit(1);
//! }
//! ```

use std::net::{IpAddr, SocketAddr};

use clap::Parser;

/// Command line arguments for InspectGate.
///
/// The proxy listens on `bind:listen` and forwards passing traffic to
/// `bind:forward`, so the protected service is expected on the same host.
#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(
    long_about = "Inline HTTP inspection and blocking in front of your service\nEvery request and upstream response is serialized for a rules engine; blocked\ntransactions get an HTML or JSON block page chosen from the Accept header.\n\nExample usage:\n  inspectgate --listen 8080 --forward 9000\n  inspectgate -l 8080 -f 9000 --verbose"
)]
#[command(
    after_help = "Environment variables:\n  BLOCK_TEMPLATE_HTML       HTML block page file\n  BLOCK_TEMPLATE_JSON       JSON block body file\n  CLIENT_IP_HEADER          Header to read the client IP from\n  TRUSTED_PROXY_IPS         Peers allowed to set forwarding headers\n  BLOCK_STATUS              Block status code (default: 403)\n  BLOCK_CONTENT_TYPE        auto, html, json or none (default: auto)\n  BLOCK_REDIRECT_LOCATION   Location header sent with blocks\n  BLOCKED_IPS               Comma-separated blocked client IPs\n  BLOCKED_METHODS           HTTP methods to block (e.g., TRACE,CONNECT)\n  BLOCKED_PATTERNS          URI patterns to block (e.g., .php,.env)\n  BLOCKED_RESPONSE_STATUSES Upstream statuses to block (e.g., 500,502)\n  PROXY_TIMEOUT_SECS        Upstream timeout (default: 30)\n  MAX_BODY_SIZE_MB          Request body limit, 0 = unlimited (default: 100)"
)]
pub struct Args {
    /// Address to bind to (for both listening and forwarding)
    #[arg(
        long,
        short = 'b',
        help = "Bind address for listening and forwarding",
        value_name = "ADDRESS",
        default_value = "0.0.0.0"
    )]
    pub bind: String,

    /// Port to listen on for incoming requests
    #[arg(
        long,
        short = 'l',
        help = "Listen port for incoming connections",
        value_name = "PORT"
    )]
    pub listen: u16,

    /// Port to forward requests to
    #[arg(
        long,
        short = 'f',
        help = "Destination port for forwarded requests",
        value_name = "PORT"
    )]
    pub forward: u16,

    /// Enable verbose output
    #[arg(
        long,
        short = 'v',
        help = "Show detailed configuration and startup information"
    )]
    pub verbose: bool,

    /// Enable quiet mode (minimal output)
    #[arg(
        long,
        short = 'q',
        help = "Suppress configuration output, show only essential messages",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Output logs in JSON format (for structured logging)
    #[arg(long, help = "Output logs in JSON format for structured logging")]
    pub json_logs: bool,
}

impl Args {
    /// Validates the parsed command line arguments.
    ///
    /// - Listen and forward ports must differ and be non-zero
    /// - Bind address must be a valid IP address
    ///
    /// # Example
    ///
    /// ```
    /// use inspectgate::args::Args;
    /// use clap::Parser;
    ///
    /// let args = Args::try_parse_from(["inspectgate", "-l", "8080", "-f", "8080"]).unwrap();
    /// assert!(args.validate().is_err());
    ///
    /// let args = Args::try_parse_from(["inspectgate", "-l", "8080", "-f", "9000"]).unwrap();
    /// assert!(args.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), String> {
        if self.listen == self.forward {
            return Err("Listen and forward ports cannot be the same".to_string());
        }

        if self.listen == 0 || self.forward == 0 {
            return Err("Ports must be greater than 0".to_string());
        }

        self.bind_ip()?;
        Ok(())
    }

    /// Socket address to accept connections on.
    pub fn listen_addr(&self) -> Result<SocketAddr, String> {
        Ok(SocketAddr::new(self.bind_ip()?, self.listen))
    }

    /// Host part of the upstream URL; `0.0.0.0` and `::` map to loopback.
    pub fn upstream_host(&self) -> String {
        match self.bind_ip() {
            Ok(IpAddr::V4(ip)) if ip.is_unspecified() => "127.0.0.1".to_string(),
            Ok(IpAddr::V6(ip)) if ip.is_unspecified() => "[::1]".to_string(),
            Ok(IpAddr::V6(ip)) => format!("[{ip}]"),
            _ => self.bind.clone(),
        }
    }

    fn bind_ip(&self) -> Result<IpAddr, String> {
        self.bind
            .parse()
            .map_err(|_| format!("Invalid bind address: '{}'", self.bind))
    }
}
