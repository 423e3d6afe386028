//! Error types for the NTRIP client

use crate::ntrip::state::ConnectionState;

pub type Result<T> = std::result::Result<T, NtripError>;

#[derive(Debug, thiserror::Error)]
pub enum NtripError {
  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("Client has not been configured")]
  NotConfigured,

  #[error("Could not resolve {host}: {source}")]
  Resolve {
    host: String,
    #[source]
    source: std::io::Error,
  },

  #[error("No IPv4 address found for {0}")]
  NoIpv4Address(String),

  #[error("Could not connect to {addr}: {source}")]
  Connect {
    addr: std::net::SocketAddr,
    #[source]
    source: std::io::Error,
  },

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Remote socket closed")]
  PeerClosed,

  #[error("Caster rejected the request: {status}")]
  Rejected { status: String },

  #[error("No response from caster after {attempts} attempts")]
  HandshakeTimeout { attempts: u32 },

  #[error("Invalid state transition {from:?} -> {to:?}")]
  InvalidTransition {
    from: ConnectionState,
    to: ConnectionState,
  },

  #[error("Streaming loop started in state {0:?}")]
  InvalidState(ConnectionState),

  #[error("Streaming task panicked")]
  TaskPanicked,
}
