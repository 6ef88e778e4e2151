//! C1: ordered, reliable message transport with reconnect and replay (spec §4.1).

pub mod backoff;
pub mod client;
pub mod envelope;
pub mod replay_buffer;
pub mod server;
pub mod state;

pub use client::ClientTransport;
pub use envelope::{AudioChunkPayload, Message};
pub use server::ServerConnection;
pub use state::ConnectionState;
