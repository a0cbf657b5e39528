//! relay-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.

pub mod application;
pub mod infrastructure;

pub use application::handler::{dispatch, PacketHandler};
pub use infrastructure::network::connection::{
    ClientConfig, ClientError, ClientPipeline, ConnectionState,
};
pub use infrastructure::network::queue::{MessageQueue, QueueClosed};
