use clap::Parser;
use imgrelay::config::Config;
use imgrelay::proxy::ImgRelayProxy;
use pingora_core::server::configuration::{Opt, ServerConf};
use pingora_core::server::Server;
use std::path::PathBuf;

/// imgrelay - Edge image-routing proxy built with Cloudflare's Pingora
#[derive(Parser, Debug)]
#[command(name = "imgrelay")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Upgrade workers gracefully
    #[arg(long)]
    upgrade: bool,
}

fn main() {
    // Initialize logging subsystem
    imgrelay::logging::init_subscriber().expect("Failed to initialize logging subsystem");

    // Parse command-line arguments
    let args = Args::parse();

    // Load configuration from file (with ${ENV_VAR} substitution)
    let config = Config::from_file(&args.config).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    tracing::info!(
        config_file = %args.config.display(),
        server_address = %config.server.address,
        server_port = config.server.port,
        mode = ?config.routing.mode,
        target_domain = %config.routing.target_domain,
        converter_base_url = %config.routing.converter_base_url,
        api_key_enabled = config.routing.has_api_key(),
        "Configuration loaded successfully"
    );

    // Build Pingora server options
    let opt = Opt {
        daemon: args.daemon,
        test: args.test,
        upgrade: args.upgrade,
        ..Default::default()
    };

    // Create Pingora server with the configured worker thread count
    let mut server_conf = ServerConf::new().expect("Failed to build Pingora server configuration");
    server_conf.threads = config.server.threads;
    let mut server = Server::new_with_opt_and_conf(Some(opt), server_conf);
    server.bootstrap();

    // Create proxy instance
    let proxy = ImgRelayProxy::new(config.clone());

    // Create HTTP proxy service
    let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, proxy);

    // Add TCP listener for HTTP
    let listen_addr = format!("{}:{}", config.server.address, config.server.port);
    proxy_service.add_tcp(&listen_addr);

    tracing::info!(
        address = %listen_addr,
        "Starting imgrelay"
    );

    // Register service with server
    server.add_service(proxy_service);

    // Run server forever (blocks until shutdown)
    server.run_forever();
}
