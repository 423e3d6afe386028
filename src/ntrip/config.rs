use std::fmt;
use std::time::Duration;

use crate::error::{NtripError, Result};

pub const DEFAULT_PORT: u16 = 2101;
pub const DEFAULT_USER_AGENT: &str = "NTRIP NTRIPClient/1.2.0";

const HANDSHAKE_ATTEMPTS: u32 = 50;
const HANDSHAKE_POLL_MS: u64 = 100;
const REPORT_INTERVAL_MS: u64 = 1000;
const LOOP_PERIOD_MS: u64 = 10;

/// Connection details for one caster mountpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
  pub host: String,
  pub port: u16,
  pub mountpoint: String,
  pub username: String,
  pub password: String,
}

impl ClientConfig {
  pub fn new(
    host: impl Into<String>,
    port: u16,
    mountpoint: impl Into<String>,
    username: impl Into<String>,
    password: impl Into<String>,
  ) -> Self {
    Self {
      host: host.into(),
      port,
      mountpoint: mountpoint.into(),
      username: username.into(),
      password: password.into(),
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.host.trim().is_empty() {
      return Err(NtripError::InvalidConfig("host is empty".into()));
    }

    if self.mountpoint().is_empty() {
      return Err(NtripError::InvalidConfig("mountpoint is empty".into()));
    }

    Ok(())
  }

  /// Mountpoint without a leading slash.
  pub fn mountpoint(&self) -> &str {
    self.mountpoint.trim_start_matches('/')
  }
}

impl fmt::Debug for ClientConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ClientConfig")
      .field("host", &self.host)
      .field("port", &self.port)
      .field("mountpoint", &self.mountpoint)
      .field("username", &self.username)
      .field("password", &"<redacted>")
      .finish()
  }
}

/// Polling budgets for the handshake and the streaming loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
  /// Receive attempts made while waiting for the caster's reply.
  pub handshake_attempts: u32,
  /// Pause between two handshake receive attempts.
  pub handshake_poll: Duration,
  /// How often the latest position report is sent.
  pub report_interval: Duration,
  /// Sleep between two iterations of the streaming loop.
  pub loop_period: Duration,
}

impl Timings {
  /// Upper bound on how long `run()` waits for the caster.
  pub fn handshake_budget(&self) -> Duration {
    self.handshake_poll * self.handshake_attempts
  }
}

impl Default for Timings {
  fn default() -> Self {
    Self {
      handshake_attempts: HANDSHAKE_ATTEMPTS,
      handshake_poll: Duration::from_millis(HANDSHAKE_POLL_MS),
      report_interval: Duration::from_millis(REPORT_INTERVAL_MS),
      loop_period: Duration::from_millis(LOOP_PERIOD_MS),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
  pub idle: Duration,
  pub interval: Duration,
  pub retries: u32,
}

impl Default for KeepaliveConfig {
  fn default() -> Self {
    Self {
      idle: Duration::from_secs(30),
      interval: Duration::from_secs(5),
      retries: 3,
    }
  }
}
