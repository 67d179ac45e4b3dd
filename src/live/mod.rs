//! Live-update websocket endpoint.
//!
//! Each client is registered as a broadcast observer, receives one full
//! status snapshot on connect and may send simple JSON commands.

pub mod command;
pub mod server;

pub use command::{handle_command, ClientCommand};
pub use server::LiveServer;
