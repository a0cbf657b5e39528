//! Network infrastructure: the TCP listener, per-connection handlers, and
//! the socket-backed [`PacketSink`](crate::application::registry::PacketSink).

pub mod router;
pub mod sink;

pub use router::RelayServer;
pub use sink::{StreamSink, TcpSink};
