use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::config::{ClientConfig, KeepaliveConfig, Timings, DEFAULT_USER_AGENT};
use super::keepalive;
use super::message::{handshake_request, HandshakeReply, MAX_REPLY_HEADER, RECV_BUFFER_SIZE};
use super::state::{ConnectionState, StateCell};
use super::stream::{is_transient, StreamingLoop};
use crate::error::{NtripError, Result};

/// Received chunks kept for slow correction subscribers before they lag.
const CORRECTIONS_CAPACITY: usize = 256;

struct StreamingTask {
  cancel: CancellationToken,
  handle: JoinHandle<Result<()>>,
}

/// Cloneable handle for replacing the position report from anywhere.
#[derive(Clone)]
pub struct PositionReporter {
  tx: Arc<watch::Sender<Bytes>>,
}

impl PositionReporter {
  /// Replaces the stored report. Only the latest value is ever sent.
  pub fn update(&self, report: impl Into<String>) {
    self.tx.send_replace(Bytes::from(report.into()));
  }
}

/// NTRIP rover client.
///
/// `run()` connects and authenticates on the caller's task, then hands the
/// socket to a background [`StreamingLoop`] until `stop()` is called or the
/// connection fails.
pub struct NtripClient {
  config: Option<ClientConfig>,
  timings: Timings,
  keepalive: KeepaliveConfig,
  user_agent: String,
  state: StateCell,
  report: PositionReporter,
  corrections: broadcast::Sender<Bytes>,
  task: Option<StreamingTask>,
}

impl NtripClient {
  pub fn new() -> Self {
    let (report_tx, _report_rx) = watch::channel(Bytes::new());
    let (corrections, _) = broadcast::channel(CORRECTIONS_CAPACITY);

    Self {
      config: None,
      timings: Timings::default(),
      keepalive: KeepaliveConfig::default(),
      user_agent: DEFAULT_USER_AGENT.to_string(),
      state: StateCell::new(),
      report: PositionReporter { tx: Arc::new(report_tx) },
      corrections,
      task: None,
    }
  }

  pub fn with_config(config: ClientConfig) -> Self {
    let mut client = Self::new();
    client.config = Some(config);
    client
  }

  pub fn with_timings(mut self, timings: Timings) -> Self {
    self.timings = timings;
    self
  }

  pub fn with_keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
    self.keepalive = keepalive;
    self
  }

  pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
    self.user_agent = user_agent.into();
    self
  }

  /// Stores connection details for the next `run()`.
  pub fn configure(&mut self, config: ClientConfig) -> Result<()> {
    config.validate()?;
    self.config = Some(config);
    Ok(())
  }

  pub fn config(&self) -> Option<&ClientConfig> {
    self.config.as_ref()
  }

  pub fn state(&self) -> ConnectionState {
    self.state.get()
  }

  pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
    self.state.subscribe()
  }

  pub fn is_running(&self) -> bool {
    self.state.get() == ConnectionState::Running
  }

  pub fn update_position_report(&self, report: impl Into<String>) {
    self.report.update(report);
  }

  pub fn position_reporter(&self) -> PositionReporter {
    self.report.clone()
  }

  /// Correction data as received from the caster, uninterpreted.
  pub fn subscribe_corrections(&self) -> broadcast::Receiver<Bytes> {
    self.corrections.subscribe()
  }

  /// Connects, authenticates and starts the streaming task.
  ///
  /// A session that is still running is stopped first. On failure the
  /// socket is closed and nothing keeps running in the background.
  pub async fn run(&mut self) -> Result<()> {
    if self.task.is_some() {
      if let Err(e) = self.stop().await {
        tracing::debug!("Previous session ended with: {}", e);
      }
    }

    let config = self.config.clone().ok_or(NtripError::NotConfigured)?;
    config.validate()?;

    let mut stream = self.connect(&config).await?;

    let pending = match self.authenticate(&mut stream, &config).await {
      Ok(pending) => pending,
      Err(e) => {
        drop(stream);
        self.state.stop();
        return Err(e);
      }
    };

    keepalive::apply(&stream, &self.keepalive);

    if let Err(e) = self.state.advance(ConnectionState::Running) {
      drop(stream);
      self.state.stop();
      return Err(e);
    }

    let cancel = CancellationToken::new();
    let streaming = StreamingLoop::new(
      stream,
      self.report.tx.subscribe(),
      self.corrections.clone(),
      self.state.clone(),
      cancel.clone(),
      self.timings,
    )
    .with_pending(pending);

    self.task = Some(StreamingTask {
      cancel,
      handle: tokio::spawn(streaming.run()),
    });

    Ok(())
  }

  /// Cancels the streaming task and waits for it to close the socket.
  ///
  /// Returns how the session ended. Calling it with nothing running is a no-op.
  pub async fn stop(&mut self) -> Result<()> {
    let Some(task) = self.task.take() else {
      return Ok(());
    };

    task.cancel.cancel();

    let outcome = match task.handle.await {
      Ok(outcome) => outcome,
      Err(e) => {
        tracing::error!("Streaming task failed: {}", e);
        Err(NtripError::TaskPanicked)
      }
    };

    self.state.stop();

    outcome
  }

  async fn connect(&self, config: &ClientConfig) -> Result<TcpStream> {
    let addr = resolve_ipv4(&config.host, config.port).await?;

    tracing::debug!(%addr, "Connecting to caster");

    let stream = TcpStream::connect(addr).await.map_err(|source| {
      tracing::error!(%addr, "Could not connect to caster: {}", source);
      NtripError::Connect { addr, source }
    })?;

    self.state.advance(ConnectionState::Connected)?;

    tracing::info!(%addr, "Connected to caster");

    Ok(stream)
  }

  /// Returns correction bytes that came in behind the reply header.
  async fn authenticate(&self, stream: &mut TcpStream, config: &ClientConfig) -> Result<Bytes> {
    let request = handshake_request(config, &self.user_agent);

    if let Err(e) = stream.write_all(request.as_bytes()).await {
      tracing::error!("Could not send request to caster: {}", e);
      return Err(e.into());
    }

    let pending = self.await_reply(stream, config).await?;
    self.state.advance(ConnectionState::Authenticated)?;

    tracing::info!(mountpoint = config.mountpoint(), "Authenticated with caster");

    let report = self.report.tx.borrow().clone();

    if report.is_empty() {
      tracing::debug!("No position report to send yet");
      return Ok(pending);
    }

    if let Err(e) = stream.write_all(&report).await {
      tracing::error!("Could not send position report: {}", e);
      return Err(e.into());
    }

    tracing::debug!(bytes = report.len(), "position report sent");

    Ok(pending)
  }

  async fn await_reply(&self, stream: &TcpStream, config: &ClientConfig) -> Result<Bytes> {
    let mut buffer = vec![0u8; RECV_BUFFER_SIZE];
    let mut received = Vec::with_capacity(RECV_BUFFER_SIZE);
    let mut reply = HandshakeReply::Incomplete;

    for attempt in 0..self.timings.handshake_attempts {
      match stream.try_read(&mut buffer) {
        Ok(0) => {
          tracing::error!("Remote socket closed during handshake");
          return Err(NtripError::PeerClosed);
        }
        Ok(len) => {
          received.extend_from_slice(&buffer[..len]);
          reply = HandshakeReply::parse(&received);

          match &reply {
            HandshakeReply::Accepted { header_len } => {
              return Ok(Bytes::copy_from_slice(&received[*header_len..]));
            }
            HandshakeReply::Rejected(status) => {
              tracing::error!("Caster rejected request: {}", status);
              return Err(NtripError::Rejected { status: status.clone() });
            }
            HandshakeReply::AwaitingHeaders => {
              tracing::debug!(attempt, bytes = received.len(), "Waiting for the rest of the reply header");
            }
            HandshakeReply::Incomplete => {
              tracing::debug!(attempt, bytes = received.len(), "Partial reply from caster");
            }
          }

          if received.len() >= MAX_REPLY_HEADER {
            break;
          }
        }
        Err(e) if is_transient(&e) => {}
        Err(e) => {
          tracing::error!("Socket error during handshake: {}", e);
          return Err(e.into());
        }
      }

      sleep(self.timings.handshake_poll).await;
    }

    // The stream was granted, only the header block never closed.
    if reply == HandshakeReply::AwaitingHeaders {
      tracing::warn!(bytes = received.len(), "Reply header never completed, streaming anyway");
      return Ok(Bytes::new());
    }

    tracing::error!(
      host = %config.host,
      port = config.port,
      mountpoint = config.mountpoint(),
      username = %config.username,
      "Caster access failed"
    );

    Err(NtripError::HandshakeTimeout {
      attempts: self.timings.handshake_attempts,
    })
  }
}

impl Default for NtripClient {
  fn default() -> Self {
    Self::new()
  }
}

impl Drop for NtripClient {
  fn drop(&mut self) {
    if let Some(task) = &self.task {
      task.cancel.cancel();
    }
  }
}

async fn resolve_ipv4(host: &str, port: u16) -> Result<SocketAddr> {
  let mut addrs = lookup_host((host, port))
    .await
    .map_err(|source| {
      tracing::error!(host, "Could not resolve host address: {}", source);
      NtripError::Resolve { host: host.to_string(), source }
    })?;

  addrs
    .find(SocketAddr::is_ipv4)
    .ok_or_else(|| NtripError::NoIpv4Address(host.to_string()))
}
