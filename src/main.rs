use std::sync::Arc;

use clap::Parser;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use inspectgate::args::Args;
use inspectgate::rules::StaticRules;
use inspectgate::{
    EnvVarConfig, Inspector, ProxyProvider, blocking, config, request_handler, server,
};

/// Installs the global subscriber; `RUST_LOG` overrides the level picked from
/// the verbosity flags.
fn init_tracing(args: &Args) {
    let default_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    if args.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Validate arguments
    if let Err(err) = args.validate() {
        eprintln!("❌ Configuration error: {err}");
        std::process::exit(1);
    }

    init_tracing(&args);
    server::print_startup_info(&args);

    let config = Arc::new(EnvVarConfig::new());

    // Templates are read once; a missing file is fatal
    let templates = config::get_block_templates();
    let blocking_service =
        match blocking::initialize(templates.html.as_deref(), templates.json.as_deref()) {
            Ok(service) => service.clone(),
            Err(err) => {
                eprintln!("❌ {err}");
                std::process::exit(1);
            }
        };

    let rules = StaticRules::from_config(config.as_ref());
    let inspector = Arc::new(Inspector::from_config(
        rules,
        config.as_ref(),
        blocking_service,
    ));

    let http_client = match reqwest::Client::builder()
        .timeout(config.proxy_config().timeout)
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            eprintln!("❌ Failed to build HTTP client: {err}");
            std::process::exit(1);
        }
    };

    let listen_addr = match args.listen_addr() {
        Ok(addr) => addr,
        Err(err) => {
            eprintln!("❌ Configuration error: {err}");
            std::process::exit(1);
        }
    };
    let listener = match TcpListener::bind(listen_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("❌ Failed to bind to port {}: {}", args.listen, err);
            std::process::exit(1);
        }
    };

    let forward_host = args.upstream_host();
    info!(
        listen = %listen_addr,
        upstream = %format!("{}:{}", forward_host, args.forward),
        "InspectGate is running"
    );

    // Accept connections
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                error!(error = %err, "Failed to accept connection");
                continue;
            }
        };

        debug!(peer = %addr, "New connection");

        let io = TokioIo::new(stream);
        let forward_host = forward_host.clone();
        let forward_port = args.forward;
        let inspector = inspector.clone();
        let config = config.clone();
        let http_client = http_client.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                request_handler::handle_request(
                    req,
                    Some(addr),
                    forward_host.clone(),
                    forward_port,
                    inspector.clone(),
                    config.clone(),
                    http_client.clone(),
                )
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                debug!(peer = %addr, error = %err, "Connection error");
            }
        });
    }
}
