//! Network module.
//!
//! Outbound gateway connections: handshake, heartbeat, read loop and
//! reconnect with backoff.

mod backoff;
mod connection;
mod gateway;

pub use backoff::Backoff;
pub use connection::{
    AUTHORIZATION_HEADER, ConnectionState, ConnectionStatus, LAST_MESSAGE_ID_HEADER,
};
pub use gateway::{Gateway, PRIMARY_KEY};
