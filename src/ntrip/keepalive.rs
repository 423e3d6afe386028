use tokio::net::TcpStream;

use super::config::KeepaliveConfig;

/// Enables TCP keepalive probes on the caster connection. Best effort.
#[cfg(feature = "tcp-keepalive")]
pub fn apply(stream: &TcpStream, config: &KeepaliveConfig) {
  use socket2::{SockRef, TcpKeepalive};

  let keepalive = TcpKeepalive::new().with_time(config.idle);

  #[cfg(any(target_os = "linux", target_os = "android", target_os = "macos", windows))]
  let keepalive = keepalive.with_interval(config.interval);

  #[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
  let keepalive = keepalive.with_retries(config.retries);

  match SockRef::from(stream).set_tcp_keepalive(&keepalive) {
    Ok(()) => tracing::debug!(?config, "TCP keepalive enabled"),
    Err(e) => tracing::debug!("Could not enable TCP keepalive: {}", e),
  }
}

#[cfg(not(feature = "tcp-keepalive"))]
pub fn apply(_stream: &TcpStream, _config: &KeepaliveConfig) {}
