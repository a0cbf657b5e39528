//! Network infrastructure for the client application.
//!
//! Architecture:
//! - `ClientPipeline` owns the TCP connection to the server and its state.
//! - A receive task cuts the inbound byte stream into packets and pushes them
//!   onto a [`MessageQueue`](queue::MessageQueue).
//! - A consumer task pops packets off the queue and hands them to the
//!   application's `PacketHandler`, one at a time.

pub mod connection;
pub mod queue;
