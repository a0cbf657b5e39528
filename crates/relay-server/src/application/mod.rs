//! Application layer for the relay server.
//!
//! Nothing in here touches a socket.  Connections are represented by the
//! [`registry::PacketSink`] trait, so both modules are testable with
//! in-memory doubles.
//!
//! # Sub-modules
//!
//! - **`registry`** – The table of live connections and the identifiers the
//!   server issues to them.
//!
//! - **`dispatch`** – Answers time, name, and client-list requests and routes
//!   send-message requests to their target.

pub mod dispatch;
pub mod registry;
