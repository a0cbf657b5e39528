//! Packet-Relay server entry point.
//!
//! Loads the TOML configuration, applies command-line overrides, binds the
//! listener, and serves clients until Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! relay-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>   Config file [default: relay-server.toml]
//!   --bind   <ADDR>   Override network.bind_address
//!   --port   <PORT>   Override network.port
//!   --name   <NAME>   Override server.name
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable             | Overrides             |
//! |----------------------|-----------------------|
//! | `RELAY_CONFIG`       | `--config`            |
//! | `RELAY_BIND_ADDRESS` | `--bind`              |
//! | `RELAY_PORT`         | `--port`              |
//! | `RELAY_SERVER_NAME`  | `--name`              |
//! | `RUST_LOG`           | `server.log_level`    |

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relay_server::{RelayServer, ServerConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Packet-Relay server.
///
/// Answers time, name, and client-list requests and relays text messages
/// between connected clients.
#[derive(Debug, Parser)]
#[command(name = "relay-server", about = "Packet-Relay messaging server", version)]
struct Cli {
    /// Path to the TOML configuration file.  A missing file means defaults.
    #[arg(long, default_value = "relay-server.toml", env = "RELAY_CONFIG")]
    config: PathBuf,

    /// IP address to listen on.
    #[arg(long, env = "RELAY_BIND_ADDRESS")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "RELAY_PORT")]
    port: Option<u16>,

    /// Name returned to clients that ask for it.
    #[arg(long, env = "RELAY_SERVER_NAME")]
    name: Option<String>,
}

impl Cli {
    /// Loads the config file and applies the command-line overrides.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = ServerConfig::load_or_default(&self.config)
            .with_context(|| format!("loading config from {}", self.config.display()))?;

        if let Some(bind) = self.bind {
            config.network.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(name) = self.name {
            config.server.name = name;
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_server_config()?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    info!(
        name = %config.server.name,
        addr = %config.listen_addr(),
        "Packet-Relay server starting"
    );

    let listener = RelayServer::bind(&config).await?;
    let server = RelayServer::new(&config);

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    };
    server.run_until(listener, shutdown).await;

    info!("Packet-Relay server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_point_at_local_config_file() {
        let cli = Cli::parse_from(["relay-server"]);
        assert_eq!(cli.config, PathBuf::from("relay-server.toml"));
        assert!(cli.port.is_none());
    }

    #[test]
    fn test_cli_overrides_replace_config_values() {
        // Arrange
        let cli = Cli::parse_from([
            "relay-server",
            "--config",
            "/nonexistent/relay-server.toml",
            "--port",
            "7001",
            "--bind",
            "127.0.0.1",
            "--name",
            "edge",
        ]);

        // Act
        let config = cli.into_server_config().unwrap();

        // Assert
        assert_eq!(config.listen_addr(), "127.0.0.1:7001");
        assert_eq!(config.server.name, "edge");
        assert_eq!(config.server.greeting, "Hello from server");
    }
}
