//! Packet-Relay interactive client.
//!
//! Reads commands from standard input and prints everything the server sends.
//! Type `help` for the command list.
//!
//! # Usage
//!
//! ```text
//! relay-client [OPTIONS]
//!
//! Options:
//!   --host            <HOST>  Server address for `connect` [default: 127.0.0.1]
//!   --port            <PORT>  Server port [default: 6026]
//!   --connect-timeout <SECS>  Connect timeout in seconds [default: 5]
//!   --auto-connect            Connect immediately on start-up
//! ```
//!
//! Logs go to stderr so they do not interleave with server output on stdout.
//! The level is controlled by `RUST_LOG` (default `warn`).

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use relay_core::PacketType;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use relay_client::application::command::{Command, HELP};
use relay_client::application::display::DisplayHandler;
use relay_client::{ClientConfig, ClientError, ClientPipeline, ConnectionState};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Packet-Relay client.
#[derive(Debug, Parser)]
#[command(name = "relay-client", about = "Interactive Packet-Relay client", version)]
struct Cli {
    /// Server host used by a bare `connect`.
    #[arg(long, default_value = "127.0.0.1", env = "RELAY_HOST")]
    host: String,

    /// Server port used by a bare `connect`.
    #[arg(long, default_value_t = 6026, env = "RELAY_PORT")]
    port: u16,

    /// Seconds to wait for the TCP connection before giving up.
    #[arg(long, default_value_t = 5, env = "RELAY_CONNECT_TIMEOUT")]
    connect_timeout: u64,

    /// Connect as soon as the client starts.
    #[arg(long)]
    auto_connect: bool,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server_addr: format!("{}:{}", self.host, self.port),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            ..ClientConfig::default()
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let pipeline = ClientPipeline::spawn(cli.client_config(), Arc::new(DisplayHandler::stdout()));
    spawn_state_watcher(Arc::clone(&pipeline));

    if cli.auto_connect {
        let addr = pipeline.config().server_addr.clone();
        report(pipeline.connect(&addr).await);
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        run(&pipeline, command).await;
    }

    pipeline.shutdown().await;
    Ok(())
}

/// Executes one console command.
async fn run(pipeline: &ClientPipeline, command: Command) {
    let result = match command {
        Command::Connect(addr) => {
            let addr = addr.unwrap_or_else(|| pipeline.config().server_addr.clone());
            let result = pipeline.connect(&addr).await;
            if result.is_ok() {
                println!("Connected to {addr}");
            }
            result
        }
        Command::Disconnect => {
            pipeline.disconnect().await;
            println!("Disconnected");
            Ok(())
        }
        Command::Time => pipeline.send(PacketType::RequestTime, Vec::new()).await,
        Command::Name => pipeline.send(PacketType::RequestName, Vec::new()).await,
        Command::List => pipeline.send(PacketType::RequestClientList, Vec::new()).await,
        Command::Send { target, text } => pipeline.send_message(target, &text).await,
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Quit => Ok(()),
    };
    report(result);
}

fn report(result: Result<(), ClientError>) {
    match result {
        Ok(()) => {}
        Err(ClientError::NotConnected) => println!("Not connected (use 'connect')"),
        Err(e) if e.is_connection_error() => println!("Connection error: {e}"),
        Err(e) => println!("Error: {e}"),
    }
}

/// Cleans up after the server closes the connection on its own.
fn spawn_state_watcher(pipeline: Arc<ClientPipeline>) {
    let mut states = pipeline.subscribe_state();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let closing = *states.borrow_and_update() == ConnectionState::Disconnecting;
            // A user `disconnect` or a newer `connect` makes this a no-op.
            if closing && pipeline.release_if_closed().await {
                println!("Connection closed");
            }
        }
    });
}

// ── Tests ─────────────────────────────────────────────────────────────────────
