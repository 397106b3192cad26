use std::net::TcpListener;
use std::sync::Arc;

use clap::Parser;
use grover_attack::server::{serve, ServerConfig};
use grover_attack::{Verifier, VerifierConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "verifier_server")]
#[command(about = "Serve the truncated-digest challenge/verify API")]
struct Args {
    #[arg(long, help = "Bind host (overrides VERIFIER_HOST)")]
    host: Option<String>,

    #[arg(long, help = "Bind port (overrides VERIFIER_PORT)")]
    port: Option<u16>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut server = ServerConfig::from_env();
    if let Some(host) = args.host {
        server.host = host;
    }
    if let Some(port) = args.port {
        server.port = port;
    }

    let config = VerifierConfig::from_env();
    tracing::info!(debug = config.debug, ctf = config.ctf, "verifier configured");
    if config.debug {
        tracing::warn!("/challenge_debug is enabled; targets can be disclosed");
    }

    let addr = server.addr();
    let listener = TcpListener::bind(&addr).unwrap_or_else(|e| {
        eprintln!("Failed to bind {}: {}", addr, e);
        std::process::exit(1);
    });

    if let Err(e) = serve(listener, Arc::new(Verifier::new(config)), server.read_timeout) {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
