pub mod client;
pub mod config;
pub mod credentials;
pub mod keepalive;
pub mod message;
pub mod state;
pub mod stream;

pub use client::{NtripClient, PositionReporter};
pub use config::{ClientConfig, KeepaliveConfig, Timings};
pub use state::ConnectionState;
