//! Application layer for the client.
//!
//! # Sub-modules
//!
//! - **`handler`** – The [`handler::PacketHandler`] trait through which
//!   received packets reach the user, and the type-based dispatch onto it.
//!
//! - **`display`** – The console implementation of that trait.
//!
//! - **`command`** – Parses the interactive console's commands.

pub mod command;
pub mod display;
pub mod handler;
