use crate::{args::Args, config, env_vars};
use inspectgate_core::{BlockSpec, ContentTypePolicy};
use std::env;

/// Print startup banner with configuration
pub fn print_startup_info(args: &Args) {
    if args.quiet {
        // Quiet mode: only essential information
        println!(
            "🚀 InspectGate v{} starting on port {}",
            env!("CARGO_PKG_VERSION"),
            args.listen
        );
        return;
    }

    // Normal/verbose mode: full configuration display
    println!("🛡️  {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("   {}", env!("CARGO_PKG_DESCRIPTION"));
    println!();
    println!("📡 Network Configuration:");
    println!("   Listen Port:    {}", args.listen);
    println!("   Forward Port:   {}", args.forward);
    println!();

    let proxy_config = config::get_proxy_config();
    println!("🔧 Proxy Configuration:");
    println!("   Timeout:        {} seconds", proxy_config.timeout.as_secs());
    println!("   Max Body Size:  {} MB", proxy_config.max_body_size_mb());
    println!();

    print_inspection_config();
    print_rules_config();

    // Show environment configuration in verbose mode
    if args.verbose {
        print_env_config();
    }

    println!();
    println!("🚀 Server starting...");
}

/// Short description of the default block response, e.g. `403 (auto)`.
pub fn describe_block(spec: &BlockSpec) -> String {
    let body = match spec.content_type {
        ContentTypePolicy::Auto => "auto",
        ContentTypePolicy::Html => "html",
        ContentTypePolicy::Json => "json",
        ContentTypePolicy::None => "no body",
    };
    match &spec.location {
        Some(location) => format!("{} ({body}) -> {location}", spec.status),
        None => format!("{} ({body})", spec.status),
    }
}

/// Print client IP and block response settings
fn print_inspection_config() {
    let templates = config::get_block_templates();

    println!("🔍 Inspection Configuration:");
    match config::get_client_ip_header() {
        Some(header) => println!("   Client IP:      header '{}'", header.name()),
        None => println!("   Client IP:      default forwarding headers"),
    }
    match config::get_trusted_proxy_ips() {
        Some(ips) => println!("   Trusted Peers:  {} configured", ips.len()),
        None => println!("   Trusted Peers:  any"),
    }
    println!("   Block Response: {}", describe_block(config::get_block_spec()));
    println!(
        "   Templates:      html={}, json={}",
        if templates.html.is_some() { "custom" } else { "built-in" },
        if templates.json.is_some() { "custom" } else { "built-in" },
    );
    println!();
}

/// Print static rules summary
fn print_rules_config() {
    let blocked_ips = config::get_blocked_ips();
    let blocked_methods = config::get_blocked_methods();
    let blocked_patterns = config::get_blocked_patterns();
    let blocked_statuses = config::get_blocked_response_statuses();

    println!("🔒 Static Rules:");

    if !blocked_ips.is_empty() {
        println!("   Blocked IPs:    {} configured", blocked_ips.len());
    }

    if !blocked_methods.is_empty() {
        println!("   Blocked Methods: {}", blocked_methods.join(", "));
    }

    if !blocked_patterns.is_empty() {
        println!("   Blocked Patterns: {} configured", blocked_patterns.len());
    }

    if !blocked_statuses.is_empty() {
        let statuses: Vec<String> = blocked_statuses.iter().map(u16::to_string).collect();
        println!("   Blocked Upstream Statuses: {}", statuses.join(", "));
    }

    if blocked_ips.is_empty()
        && blocked_methods.is_empty()
        && blocked_patterns.is_empty()
        && blocked_statuses.is_empty()
    {
        println!("   Rules:          None configured");
    }
}

/// Print environment variable configuration status (used in verbose mode)
fn print_env_config() {
    println!();
    println!("🔧 Environment Variables:");

    for &var_name in env_vars::all_env_vars() {
        match env::var(var_name) {
            Ok(value) => {
                // Mask addresses and file paths
                let display_value = if var_name.contains("IP") || var_name.contains("TEMPLATE") {
                    "[CONFIGURED]".to_string()
                } else {
                    value
                };
                println!("   {:<27} = {}", var_name, display_value);
            }
            Err(_) => {
                println!("   {:<27} = [NOT SET]", var_name);
            }
        }
    }
}
