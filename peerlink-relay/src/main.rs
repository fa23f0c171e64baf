//! `peerlink-relay` binary.
//!
//! ```bash
//! peerlink-relay                         # listens on 0.0.0.0:8080
//! peerlink-relay --bind 127.0.0.1:9100
//! PORT=3000 peerlink-relay               # port only, all interfaces
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use peerlink_relay::config::{RelayCliArgs, RelayConfig};
use peerlink_relay::relay::{self, SignalState};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = RelayCliArgs::parse();

    let config = match RelayConfig::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            // Tracing is not up yet, so this one goes straight to stderr.
            #[allow(clippy::print_stderr)]
            {
                eprintln!("peerlink-relay: {e}");
            }
            return ExitCode::FAILURE;
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let state = Arc::new(SignalState::with_config(config.max_message_size));
    let (bound_addr, server) =
        match relay::start_server_with_state(&config.bind_addr, state).await {
            Ok(started) => started,
            Err(e) => {
                tracing::error!(addr = %config.bind_addr, error = %e, "failed to bind");
                return ExitCode::FAILURE;
            }
        };

    tracing::info!(
        addr = %bound_addr,
        max_message_size = config.max_message_size,
        "signaling relay listening"
    );

    if let Err(e) = server.await {
        tracing::error!(error = %e, "relay server task failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
