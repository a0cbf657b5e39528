//! relay-server library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.

pub mod application;
pub mod error;
pub mod infrastructure;

pub use application::dispatch::Dispatcher;
pub use application::registry::{ClientHandle, ClientRegistry, PacketSink, Registration, SessionId};
pub use error::RouterError;
pub use infrastructure::network::router::RelayServer;
pub use infrastructure::storage::config::{ConfigError, ServerConfig};
